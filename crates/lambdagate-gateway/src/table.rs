//! The authoritative route table.
//!
//! Every mutation runs under one lock together with the dispatch rebuild and
//! the persist, so the dispatch surface and the persisted file always reflect
//! a complete table, in table order.

use lambdagate_common::{LambdaError, Result, RouteDefinition, RouteSpec};
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::dispatch::RequestDispatcher;
use crate::store::RouteStore;

/// Ordered, persisted collection of route definitions.
pub struct RouteTable {
    routes: Mutex<Vec<RouteDefinition>>,
    store: Arc<dyn RouteStore>,
    dispatcher: Arc<RequestDispatcher>,
}

impl RouteTable {
    /// Loads the persisted routes and mounts them.
    ///
    /// A store that cannot be read yields an empty table; the failure is logged.
    pub async fn open(store: Arc<dyn RouteStore>, dispatcher: Arc<RequestDispatcher>) -> Self {
        let routes = match store.load().await {
            Ok(routes) => {
                tracing::info!("Loaded {} routes", routes.len());
                routes
            }
            Err(e) => {
                tracing::warn!("Failed to load routes, starting with an empty table: {}", e);
                Vec::new()
            }
        };

        dispatcher.rebuild(&routes);

        Self {
            routes: Mutex::new(routes),
            store,
            dispatcher,
        }
    }

    /// Snapshot of the table, in order.
    pub async fn list(&self) -> Vec<RouteDefinition> {
        self.routes.lock().await.clone()
    }

    pub async fn get(&self, id: &str) -> Option<RouteDefinition> {
        self.routes
            .lock()
            .await
            .iter()
            .find(|route| route.id == id)
            .cloned()
    }

    /// Appends a route with a fresh id. The spec is not validated; a route
    /// that cannot be mounted is still stored.
    pub async fn add(&self, spec: RouteSpec) -> Result<RouteDefinition> {
        let mut routes = self.routes.lock().await;

        let mut route = RouteDefinition::create(spec);
        while routes.iter().any(|existing| existing.id == route.id) {
            route = RouteDefinition::create(route.spec());
        }

        tracing::info!(
            "Adding route {}: {} {} -> {}",
            route.id,
            route.method,
            route.path,
            route.lambda
        );
        routes.push(route.clone());
        self.commit(&routes).await?;
        Ok(route)
    }

    /// Overwrites the route `id` in place.
    ///
    /// Returns `false` (and changes nothing) if there is no such route.
    pub async fn save(&self, id: &str, spec: RouteSpec) -> Result<bool> {
        let mut routes = self.routes.lock().await;

        let Some(route) = routes.iter_mut().find(|route| route.id == id) else {
            tracing::debug!("Ignoring update of unknown route {}", id);
            return Ok(false);
        };

        route.apply(spec);
        tracing::info!("Updated route {}: {} {} -> {}", id, route.method, route.path, route.lambda);
        self.commit(&routes).await?;
        Ok(true)
    }

    /// Removes the route `id`.
    ///
    /// # Errors
    ///
    /// `RouteNotFound` if there is no such route; the table is left unchanged.
    pub async fn remove(&self, id: &str) -> Result<RouteDefinition> {
        let mut routes = self.routes.lock().await;

        let index = routes
            .iter()
            .position(|route| route.id == id)
            .ok_or_else(|| LambdaError::RouteNotFound(id.to_string()))?;

        let removed = routes.remove(index);
        tracing::info!("Removed route {}", id);
        self.commit(&routes).await?;
        Ok(removed)
    }

    async fn commit(&self, routes: &[RouteDefinition]) -> Result<()> {
        self.dispatcher.rebuild(routes);
        self.store.save(routes).await.map_err(|e| {
            tracing::error!("Failed to persist routes: {}", e);
            e
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{JsonFileRouteStore, MemoryRouteStore};
    use axum::http::Method;
    use lambdagate_common::RouteMethod;
    use lambdagate_runtime::{FunctionRuntime, RuntimeConfig};
    use std::collections::HashSet;
    use tempfile::TempDir;

    fn dispatcher(dir: &TempDir) -> Arc<RequestDispatcher> {
        let runtime = FunctionRuntime::new(RuntimeConfig::new(dir.path())).unwrap();
        Arc::new(RequestDispatcher::new(Arc::new(runtime)))
    }

    fn spec(path: &str, lambda: &str) -> RouteSpec {
        RouteSpec::new(RouteMethod::Get, path, lambda)
    }

    #[tokio::test]
    async fn test_add_assigns_unique_ids() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryRouteStore::new());
        let table = RouteTable::open(store.clone(), dispatcher(&dir)).await;

        let mut ids = HashSet::new();
        for i in 0..50 {
            let route = table.add(spec(&format!("/r{}", i), "fn")).await.unwrap();
            assert!(ids.insert(route.id));
        }

        assert_eq!(table.list().await.len(), 50);
        assert_eq!(store.save_count(), 50);
    }

    #[tokio::test]
    async fn test_add_mounts_route() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir);
        let table = RouteTable::open(Arc::new(MemoryRouteStore::new()), dispatcher.clone()).await;

        assert!(dispatcher.surface().find(&Method::GET, "/hello").is_none());
        table.add(spec("/hello", "hello")).await.unwrap();
        assert!(dispatcher.surface().find(&Method::GET, "/hello").is_some());
    }

    #[tokio::test]
    async fn test_remove_unknown_leaves_table_unchanged() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryRouteStore::new());
        let table = RouteTable::open(store.clone(), dispatcher(&dir)).await;
        table.add(spec("/a", "a")).await.unwrap();
        let before = table.list().await;

        let err = table.remove("no-such-id").await.unwrap_err();
        assert!(matches!(err, LambdaError::RouteNotFound(_)));
        assert_eq!(table.list().await, before);
        assert_eq!(store.save_count(), 1);
    }

    #[tokio::test]
    async fn test_remove_unmounts_route() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir);
        let store = Arc::new(MemoryRouteStore::new());
        let table = RouteTable::open(store.clone(), dispatcher.clone()).await;
        let route = table.add(spec("/a", "a")).await.unwrap();

        let removed = table.remove(&route.id).await.unwrap();
        assert_eq!(removed, route);
        assert!(table.list().await.is_empty());
        assert!(store.routes().is_empty());
        assert!(dispatcher.surface().is_empty());
    }

    #[tokio::test]
    async fn test_save_preserves_position_and_id() {
        let dir = TempDir::new().unwrap();
        let table = RouteTable::open(Arc::new(MemoryRouteStore::new()), dispatcher(&dir)).await;
        let first = table.add(spec("/a", "a")).await.unwrap();
        let second = table.add(spec("/b", "b")).await.unwrap();
        let third = table.add(spec("/c", "c")).await.unwrap();

        let updated = RouteSpec::new(RouteMethod::Post, "/b2", "b2");
        assert!(table.save(&second.id, updated.clone()).await.unwrap());

        let routes = table.list().await;
        let ids: Vec<_> = routes.iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, vec![first.id, second.id.clone(), third.id]);
        assert_eq!(routes[1].spec(), updated);
        assert_eq!(routes[1].id, second.id);
    }

    #[tokio::test]
    async fn test_save_unknown_is_noop() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(MemoryRouteStore::new());
        let table = RouteTable::open(store.clone(), dispatcher(&dir)).await;

        assert!(!table.save("missing", spec("/x", "x")).await.unwrap());
        assert!(table.list().await.is_empty());
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn test_persisted_table_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("routes.json");

        let table = RouteTable::open(Arc::new(JsonFileRouteStore::new(&path)), dispatcher(&dir)).await;
        table.add(spec("/a", "a")).await.unwrap();
        let b = table.add(spec("/b", "b")).await.unwrap();
        table.add(spec("/c", "c")).await.unwrap();
        table.remove(&b.id).await.unwrap();
        let expected = table.list().await;

        let reopened = RouteTable::open(Arc::new(JsonFileRouteStore::new(&path)), dispatcher(&dir)).await;
        assert_eq!(reopened.list().await, expected);
        assert_eq!(reopened.get(&expected[1].id).await, Some(expected[1].clone()));
    }

    #[tokio::test]
    async fn test_unreadable_store_starts_empty() {
        let dir = TempDir::new().unwrap();
        let table = RouteTable::open(Arc::new(MemoryRouteStore::unreadable()), dispatcher(&dir)).await;
        assert!(table.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_open_mounts_persisted_routes() {
        let dir = TempDir::new().unwrap();
        let dispatcher = dispatcher(&dir);
        let stored = vec![RouteDefinition::create(spec("/hello", "hello"))];
        let table = RouteTable::open(Arc::new(MemoryRouteStore::with_routes(stored.clone())), dispatcher.clone()).await;

        assert_eq!(table.list().await, stored);
        assert!(dispatcher.surface().find(&Method::GET, "/hello").is_some());
    }
}
