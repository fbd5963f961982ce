//! LambdaGate Common Types
//!
//! This crate provides the pieces shared by every LambdaGate component:
//!
//! - **Errors**: [`LambdaError`], the single error taxonomy surfaced by the
//!   function runtime, the route table and the HTTP boundary
//! - **Protocol**: the persisted route model ([`RouteDefinition`] and friends),
//!   serialized exactly as it is stored in `routes.json`
//!
//! # Example
//!
//! ```
//! use lambdagate_common::{ParamRule, RequestSource, RouteDefinition, RouteMethod, RouteSpec};
//!
//! let spec = RouteSpec::new(RouteMethod::Get, "/users/:id", "get-user")
//!     .with_param("userId", ParamRule::new(RequestSource::Path, "id"));
//! let route = RouteDefinition::create(spec);
//! assert_eq!(route.lambda, "get-user");
//! ```

pub mod error;
pub mod protocol;

pub use error::{LambdaError, Result};
pub use protocol::*;
