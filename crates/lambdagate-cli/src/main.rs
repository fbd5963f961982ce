use anyhow::Result;
use argh::FromArgs;
use lambdagate_cli::settings::{process_env, GatewayOptions, RuntimeOptions};
use lambdagate_gateway::{AppState, HttpServer};
use lambdagate_runtime::FunctionRuntime;
use std::sync::Arc;

#[derive(FromArgs)]
/// LambdaGate - serve JavaScript functions behind configurable HTTP routes
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Invoke(InvokeArgs),
}

#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// start the HTTP gateway
struct ServeArgs {
    /// bind address (e.g., 127.0.0.1:3000)
    #[argh(option, short = 'b', default = "\"127.0.0.1:3000\".into()")]
    bind: String,

    /// function store directory (env LAMBDAGATE_FUNCTIONS_DIR, default ./lambdas)
    #[argh(option)]
    functions_dir: Option<String>,

    /// route table file (env LAMBDAGATE_ROUTES_FILE, default ./routes.json)
    #[argh(option)]
    routes_file: Option<String>,

    /// path prefix for dynamic routes
    #[argh(option, default = "\"/api\".into()")]
    mount_prefix: String,

    /// installer command line (env LAMBDAGATE_INSTALLER, default "npm install")
    #[argh(option)]
    installer: Option<String>,

    /// installer timeout in seconds (unbounded when omitted)
    #[argh(option)]
    install_timeout_secs: Option<u64>,

    /// maximum execution time per invocation in milliseconds
    #[argh(option, default = "30000")]
    max_execution_time_ms: u64,

    /// per-loop iteration limit applied to function code (default 10000000)
    #[argh(option)]
    loop_iteration_limit: Option<u64>,

    /// reload a function on the next request after a failed load
    #[argh(switch)]
    retry_failed_reloads: bool,
}

#[derive(FromArgs)]
#[argh(subcommand, name = "invoke")]
/// run a function once and print its result
struct InvokeArgs {
    /// function name
    #[argh(positional)]
    name: String,

    /// JSON arguments (default: {})
    #[argh(option, short = 'a', long = "args", default = "\"{}\".into()")]
    args: String,

    /// function store directory (env LAMBDAGATE_FUNCTIONS_DIR, default ./lambdas)
    #[argh(option)]
    functions_dir: Option<String>,

    /// installer command line (env LAMBDAGATE_INSTALLER, default "npm install")
    #[argh(option)]
    installer: Option<String>,

    /// maximum execution time in milliseconds
    #[argh(option, default = "30000")]
    max_execution_time_ms: u64,
}

impl ServeArgs {
    fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            functions_dir: self.functions_dir.clone(),
            installer: self.installer.clone(),
            install_timeout_secs: self.install_timeout_secs,
            max_execution_time_ms: self.max_execution_time_ms,
            loop_iteration_limit: self.loop_iteration_limit,
            retry_failed_reloads: self.retry_failed_reloads,
        }
    }

    fn gateway_options(&self) -> GatewayOptions {
        GatewayOptions {
            bind: self.bind.clone(),
            routes_file: self.routes_file.clone(),
            mount_prefix: self.mount_prefix.clone(),
        }
    }
}

impl InvokeArgs {
    fn runtime_options(&self) -> RuntimeOptions {
        RuntimeOptions {
            functions_dir: self.functions_dir.clone(),
            installer: self.installer.clone(),
            max_execution_time_ms: self.max_execution_time_ms,
            ..RuntimeOptions::default()
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // Keep invoke output clean for piping
    if !matches!(cli.command, Commands::Invoke(_)) {
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => {
            let runtime_config = args.runtime_options().resolve(process_env)?;
            let gateway_config = args.gateway_options().resolve(process_env)?;

            tokio::fs::create_dir_all(runtime_config.functions_dir()).await?;

            tracing::info!(
                functions_dir = %runtime_config.functions_dir().display(),
                routes_file = %gateway_config.routes_file.display(),
                "Starting LambdaGate"
            );

            let runtime = Arc::new(FunctionRuntime::new(runtime_config)?);
            let state = AppState::open(gateway_config, runtime).await?;
            HttpServer::new(Arc::new(state)).run().await?;
        }
        Commands::Invoke(args) => {
            let payload: serde_json::Value = serde_json::from_str(&args.args)
                .map_err(|e| anyhow::anyhow!("Invalid JSON in args: {}", e))?;

            let runtime_config = args.runtime_options().resolve(process_env)?;
            let runtime = FunctionRuntime::new(runtime_config)?;
            let result = runtime.run(&args.name, payload).await?;

            println!("{}", serde_json::to_string(&result)?);
        }
    }

    Ok(())
}
