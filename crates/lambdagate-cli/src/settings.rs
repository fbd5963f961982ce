// Copyright 2025 LambdaGate Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Turns command-line flags and environment variables into component
//! configurations.

use anyhow::{anyhow, Result};
use lambdagate_gateway::GatewayConfig;
use lambdagate_runtime::{InstallerConfig, ReloadPolicy, ResourceLimits, RuntimeConfig};
use std::net::SocketAddr;
use std::time::Duration;

pub const FUNCTIONS_DIR_VAR: &str = "LAMBDAGATE_FUNCTIONS_DIR";
pub const ROUTES_FILE_VAR: &str = "LAMBDAGATE_ROUTES_FILE";
pub const INSTALLER_VAR: &str = "LAMBDAGATE_INSTALLER";

const DEFAULT_FUNCTIONS_DIR: &str = "lambdas";
const DEFAULT_ROUTES_FILE: &str = "routes.json";

/// Options shared by every command that runs functions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RuntimeOptions {
    pub functions_dir: Option<String>,
    /// Installer command line, e.g. `"npm install"`
    pub installer: Option<String>,
    pub install_timeout_secs: Option<u64>,
    pub max_execution_time_ms: u64,
    pub loop_iteration_limit: Option<u64>,
    pub retry_failed_reloads: bool,
}

impl RuntimeOptions {
    /// Builds the runtime configuration, consulting `env` for unset flags.
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<RuntimeConfig> {
        let functions_dir = self
            .functions_dir
            .clone()
            .or_else(|| env(FUNCTIONS_DIR_VAR))
            .unwrap_or_else(|| DEFAULT_FUNCTIONS_DIR.to_string());

        let mut installer = match self.installer.clone().or_else(|| env(INSTALLER_VAR)) {
            Some(command) => parse_installer(&command)?,
            None => InstallerConfig::default(),
        };
        if let Some(secs) = self.install_timeout_secs {
            installer = installer.with_timeout(Duration::from_secs(secs));
        }

        let mut limits = ResourceLimits::new()
            .with_execution_timeout(Duration::from_millis(self.max_execution_time_ms));
        if let Some(limit) = self.loop_iteration_limit {
            limits = limits.with_loop_iteration_limit(limit);
        }

        let policy = if self.retry_failed_reloads {
            ReloadPolicy::RetryAfterFailure
        } else {
            ReloadPolicy::PinObservedTimestamp
        };

        let config = RuntimeConfig::new(functions_dir)
            .with_installer(installer)
            .with_limits(limits)
            .with_reload_policy(policy);
        config.validate().map_err(|e| anyhow!("Invalid runtime settings: {}", e))?;
        Ok(config)
    }
}

/// Options of the HTTP server.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayOptions {
    pub bind: String,
    pub routes_file: Option<String>,
    pub mount_prefix: String,
}

impl GatewayOptions {
    pub fn resolve(&self, env: impl Fn(&str) -> Option<String>) -> Result<GatewayConfig> {
        let bind: SocketAddr = self
            .bind
            .parse()
            .map_err(|e| anyhow!("Invalid bind address {}: {}", self.bind, e))?;

        let routes_file = self
            .routes_file
            .clone()
            .or_else(|| env(ROUTES_FILE_VAR))
            .unwrap_or_else(|| DEFAULT_ROUTES_FILE.to_string());

        let config = GatewayConfig::new()
            .with_bind(bind)
            .with_routes_file(routes_file)
            .with_mount_prefix(self.mount_prefix.clone());
        config.validate().map_err(|e| anyhow!("Invalid gateway settings: {}", e))?;
        Ok(config)
    }
}

/// Splits an installer command line into program and leading arguments.
pub fn parse_installer(command: &str) -> Result<InstallerConfig> {
    let mut words = command.split_whitespace();
    let program = words
        .next()
        .ok_or_else(|| anyhow!("Installer command must not be empty"))?;
    Ok(InstallerConfig::new(program).with_args(words))
}

/// Reads variables from the process environment.
pub fn process_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn runtime_options() -> RuntimeOptions {
        RuntimeOptions {
            max_execution_time_ms: 30_000,
            ..RuntimeOptions::default()
        }
    }

    #[test]
    fn test_runtime_defaults() {
        let config = runtime_options().resolve(env_from(&[])).unwrap();
        assert_eq!(config.functions_dir, PathBuf::from("lambdas"));
        assert_eq!(config.installer, InstallerConfig::default());
        assert_eq!(config.limits.execution_timeout, Duration::from_secs(30));
        assert_eq!(config.reload_policy, ReloadPolicy::PinObservedTimestamp);
    }

    #[test]
    fn test_environment_fallbacks() {
        let env = env_from(&[(FUNCTIONS_DIR_VAR, "/srv/fns"), (INSTALLER_VAR, "pnpm add --silent")]);
        let config = runtime_options().resolve(env).unwrap();
        assert_eq!(config.functions_dir, PathBuf::from("/srv/fns"));
        assert_eq!(config.installer.program, "pnpm");
        assert_eq!(config.installer.args, vec!["add".to_string(), "--silent".to_string()]);
    }

    #[test]
    fn test_flags_override_environment() {
        let options = RuntimeOptions {
            functions_dir: Some("./mine".to_string()),
            installer: Some("yarn add".to_string()),
            install_timeout_secs: Some(60),
            loop_iteration_limit: Some(1_000_000),
            retry_failed_reloads: true,
            ..runtime_options()
        };
        let env = env_from(&[(FUNCTIONS_DIR_VAR, "/srv/fns"), (INSTALLER_VAR, "pnpm add")]);
        let config = options.resolve(env).unwrap();
        assert_eq!(config.functions_dir, PathBuf::from("./mine"));
        assert_eq!(config.installer.program, "yarn");
        assert_eq!(config.installer.timeout, Some(Duration::from_secs(60)));
        assert_eq!(config.limits.loop_iteration_limit, Some(1_000_000));
        assert_eq!(config.reload_policy, ReloadPolicy::RetryAfterFailure);
    }

    #[test]
    fn test_invalid_runtime_settings() {
        let options = RuntimeOptions {
            max_execution_time_ms: 0,
            ..RuntimeOptions::default()
        };
        assert!(options.resolve(env_from(&[])).is_err());
        assert!(parse_installer("   ").is_err());
    }

    #[test]
    fn test_gateway_options() {
        let options = GatewayOptions {
            bind: "0.0.0.0:8080".to_string(),
            routes_file: None,
            mount_prefix: "/api".to_string(),
        };
        let config = options.resolve(env_from(&[(ROUTES_FILE_VAR, "/var/lib/lg/routes.json")])).unwrap();
        assert_eq!(config.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(config.routes_file, PathBuf::from("/var/lib/lg/routes.json"));

        let bad = GatewayOptions {
            bind: "not-an-address".to_string(),
            ..options
        };
        assert!(bad.resolve(env_from(&[])).is_err());
    }
}
