pub mod route;


pub use route::{ParamRule, ParamRules, RequestSource, RouteDefinition, RouteId, RouteMethod, RouteSpec};
