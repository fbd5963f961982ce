//! Route persistence.
//!
//! The route table is always persisted as a whole: `save` replaces the stored
//! sequence with the given one, `load` returns it in the same order.

use async_trait::async_trait;
use lambdagate_common::{LambdaError, Result, RouteDefinition};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Load/save capability for the ordered route sequence.
#[async_trait]
pub trait RouteStore: Send + Sync {
    async fn load(&self) -> Result<Vec<RouteDefinition>>;

    async fn save(&self, routes: &[RouteDefinition]) -> Result<()>;
}

/// Stores routes as a pretty-printed JSON array in a single file.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash never leaves a half-written table behind.
#[derive(Debug, Clone)]
pub struct JsonFileRouteStore {
    path: PathBuf,
}

impl JsonFileRouteStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "routes.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl RouteStore for JsonFileRouteStore {
    async fn load(&self) -> Result<Vec<RouteDefinition>> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::info!("No route file at {}, starting empty", self.path.display());
                return Ok(Vec::new());
            }
            Err(e) => {
                return Err(LambdaError::Persistence(format!(
                    "Failed to read {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&text).map_err(|e| {
            LambdaError::Persistence(format!("Failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, routes: &[RouteDefinition]) -> Result<()> {
        let json = serde_json::to_vec_pretty(routes)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                LambdaError::Persistence(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let temp = self.temp_path();
        tokio::fs::write(&temp, &json).await.map_err(|e| {
            LambdaError::Persistence(format!("Failed to write {}: {}", temp.display(), e))
        })?;
        tokio::fs::rename(&temp, &self.path).await.map_err(|e| {
            LambdaError::Persistence(format!(
                "Failed to replace {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("Persisted {} routes to {}", routes.len(), self.path.display());
        Ok(())
    }
}

/// In-memory [`RouteStore`], mostly for tests.
#[derive(Debug, Default)]
pub struct MemoryRouteStore {
    routes: Mutex<Vec<RouteDefinition>>,
    saves: AtomicUsize,
    fail_load: bool,
}

impl MemoryRouteStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_routes(routes: Vec<RouteDefinition>) -> Self {
        Self {
            routes: Mutex::new(routes),
            ..Self::default()
        }
    }

    /// A store whose `load` always fails.
    pub fn unreadable() -> Self {
        Self {
            fail_load: true,
            ..Self::default()
        }
    }

    /// The currently stored sequence.
    pub fn routes(&self) -> Vec<RouteDefinition> {
        self.routes.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Number of successful `save` calls.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RouteStore for MemoryRouteStore {
    async fn load(&self) -> Result<Vec<RouteDefinition>> {
        if self.fail_load {
            return Err(LambdaError::Persistence("store is unreadable".to_string()));
        }
        Ok(self.routes())
    }

    async fn save(&self, routes: &[RouteDefinition]) -> Result<()> {
        let mut stored = self
            .routes
            .lock()
            .map_err(|_| LambdaError::Persistence("store lock poisoned".to_string()))?;
        *stored = routes.to_vec();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
