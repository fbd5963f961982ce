//! LambdaGate Gateway
//!
//! Maps HTTP requests to functions hosted by [`lambdagate_runtime`].
//!
//! # Architecture
//!
//! - [`RouteTable`]: the ordered, persisted list of route definitions; every
//!   change rebuilds the dispatch surface and persists the table
//! - [`RequestDispatcher`]: holds the current [`DispatchTable`], extracts
//!   function arguments from matched requests and runs the target function
//! - [`RouteStore`]: route persistence ([`JsonFileRouteStore`] for
//!   `routes.json`, [`MemoryRouteStore`] for tests)
//! - [`HttpServer`]: axum server exposing the administrative API, the route
//!   API and the dynamic routes
//!
//! # Example
//!
//! ```no_run
//! use lambdagate_gateway::{AppState, GatewayConfig, HttpServer};
//! use lambdagate_runtime::{FunctionRuntime, RuntimeConfig};
//! use std::sync::Arc;
//!
//! # async fn example() -> lambdagate_common::Result<()> {
//! let runtime = Arc::new(FunctionRuntime::new(RuntimeConfig::new("./lambdas"))?);
//! let state = AppState::open(GatewayConfig::default(), runtime).await?;
//! HttpServer::new(Arc::new(state)).run().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod dispatch;
pub mod error;
pub mod http_server;
pub mod pattern;
pub mod store;
pub mod table;

pub use config::GatewayConfig;
pub use dispatch::{extract_arguments, DispatchTable, InboundRequest, RequestDispatcher, RouteMatch};
pub use error::ApiError;
pub use http_server::{AppState, HttpServer};
pub use pattern::{PatternError, RoutePattern};
pub use store::{JsonFileRouteStore, MemoryRouteStore, RouteStore};
pub use table::RouteTable;
