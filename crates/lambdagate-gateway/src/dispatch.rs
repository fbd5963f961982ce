//! Request dispatch.
//!
//! The dispatch surface is an immutable [`DispatchTable`] compiled from the
//! route table. [`RequestDispatcher::rebuild`] compiles a new table and swaps
//! it in atomically; requests in flight keep using the table they loaded.

use arc_swap::ArcSwap;
use axum::http::Method;
use lambdagate_common::{LambdaError, ParamRules, RequestSource, Result, RouteDefinition, RouteMethod};
use lambdagate_runtime::FunctionRuntime;
use serde_json::{Map, Value as JsonValue};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use crate::pattern::RoutePattern;

/// The parts of an HTTP request that parameter rules can read from.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub method: Method,
    /// Path relative to the mount prefix
    pub path: String,
    pub query: HashMap<String, String>,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    /// Parsed body; an empty object when there is none
    pub body: JsonValue,
}

impl InboundRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: HashMap::new(),
            headers: HashMap::new(),
            body: JsonValue::Object(Map::new()),
        }
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.insert(name.to_ascii_lowercase(), value.into());
        self
    }

    pub fn with_body(mut self, body: JsonValue) -> Self {
        self.body = body;
        self
    }
}

#[derive(Debug)]
struct DispatchEntry {
    route: RouteDefinition,
    pattern: RoutePattern,
}

/// A matched route plus the captured path parameters.
#[derive(Debug)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDefinition,
    pub params: BTreeMap<String, String>,
}

/// Compiled, immutable dispatch surface.
#[derive(Debug, Default)]
pub struct DispatchTable {
    entries: Vec<DispatchEntry>,
}

impl DispatchTable {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Compiles `routes` in order.
    ///
    /// Routes with an unknown method or an invalid pattern are skipped. A route
    /// whose method and pattern duplicate an earlier one is skipped too, since
    /// the earlier route always matches first. Each skip is logged.
    pub fn build(routes: &[RouteDefinition]) -> Self {
        let mut entries = Vec::with_capacity(routes.len());
        let mut seen = HashSet::new();

        for route in routes {
            if !route.method.is_known() {
                tracing::warn!(
                    "Not mounting route {}: unknown method '{}'",
                    route.id,
                    route.method
                );
                continue;
            }

            let pattern = match RoutePattern::parse(&route.path) {
                Ok(pattern) => pattern,
                Err(e) => {
                    tracing::warn!(
                        "Not mounting route {}: invalid path '{}': {}",
                        route.id,
                        route.path,
                        e
                    );
                    continue;
                }
            };

            if !seen.insert((route.method.clone(), pattern.canonical())) {
                tracing::warn!(
                    "Route {} ({} {}) is shadowed by an earlier route with the same method and path",
                    route.id,
                    route.method,
                    route.path
                );
                continue;
            }

            entries.push(DispatchEntry {
                route: route.clone(),
                pattern,
            });
        }

        Self { entries }
    }

    /// Number of mounted routes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First mounted route matching `method` and `path`.
    pub fn find(&self, method: &Method, path: &str) -> Option<RouteMatch<'_>> {
        self.entries.iter().find_map(|entry| {
            if !method_matches(&entry.route.method, method) {
                return None;
            }
            entry.pattern.matches(path).map(|params| RouteMatch {
                route: &entry.route,
                params,
            })
        })
    }
}

fn method_matches(route: &RouteMethod, method: &Method) -> bool {
    match route {
        // HEAD is answered by GET routes as well
        RouteMethod::Get => *method == Method::GET || *method == Method::HEAD,
        RouteMethod::Post => *method == Method::POST,
        RouteMethod::Put => *method == Method::PUT,
        RouteMethod::Patch => *method == Method::PATCH,
        RouteMethod::Delete => *method == Method::DELETE,
        RouteMethod::Head => *method == Method::HEAD,
        RouteMethod::Other(_) => false,
    }
}

/// Builds function arguments from `request` according to `rules`.
///
/// # Errors
///
/// `MissingParameter` if a rule names a field the request does not have.
pub fn extract_arguments(
    rules: &ParamRules,
    params: &BTreeMap<String, String>,
    request: &InboundRequest,
) -> Result<JsonValue> {
    let mut args = Map::new();

    for (output_key, rule) in rules {
        let key = rule.key();
        let value = match rule.source() {
            RequestSource::Path => params.get(key).cloned().map(JsonValue::String),
            RequestSource::Query => request.query.get(key).cloned().map(JsonValue::String),
            RequestSource::Headers => request
                .headers
                .get(&key.to_ascii_lowercase())
                .cloned()
                .map(JsonValue::String),
            RequestSource::Body => request.body.get(key).cloned(),
        };

        let value = value.ok_or_else(|| LambdaError::MissingParameter {
            origin: rule.source().to_string(),
            key: key.to_string(),
        })?;
        args.insert(output_key.clone(), value);
    }

    Ok(JsonValue::Object(args))
}

/// Matches requests against the current dispatch surface and runs the target
/// function.
pub struct RequestDispatcher {
    surface: ArcSwap<DispatchTable>,
    runtime: Arc<FunctionRuntime>,
}

impl RequestDispatcher {
    pub fn new(runtime: Arc<FunctionRuntime>) -> Self {
        Self {
            surface: ArcSwap::from_pointee(DispatchTable::empty()),
            runtime,
        }
    }

    pub fn runtime(&self) -> &Arc<FunctionRuntime> {
        &self.runtime
    }

    /// Replaces the dispatch surface with one compiled from `routes`.
    pub fn rebuild(&self, routes: &[RouteDefinition]) {
        let table = DispatchTable::build(routes);
        tracing::info!("Dispatch surface rebuilt: {} of {} routes mounted", table.len(), routes.len());
        self.surface.store(Arc::new(table));
    }

    /// The current dispatch surface.
    pub fn surface(&self) -> Arc<DispatchTable> {
        self.surface.load_full()
    }

    /// Dispatches `request`.
    ///
    /// Returns `None` when no route matches, otherwise the outcome of running
    /// the target function with the extracted arguments.
    pub async fn dispatch(&self, request: &InboundRequest) -> Option<Result<JsonValue>> {
        let surface = self.surface();
        let matched = surface.find(&request.method, &request.path)?;
        let lambda = matched.route.lambda.clone();

        tracing::debug!(
            "Dispatching {} {} to function '{}' (route {})",
            request.method,
            request.path,
            lambda,
            matched.route.id
        );

        let args = match extract_arguments(&matched.route.params, &matched.params, request) {
            Ok(args) => args,
            Err(e) => return Some(Err(e)),
        };

        Some(self.runtime.run(&lambda, args).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lambdagate_common::{ParamRule, RouteSpec};
    use serde_json::json;

    fn route(method: RouteMethod, path: &str, lambda: &str) -> RouteDefinition {
        RouteDefinition::create(RouteSpec::new(method, path, lambda))
    }

    #[test]
    fn test_first_match_wins() {
        let routes = vec![
            route(RouteMethod::Get, "/users/me", "me"),
            route(RouteMethod::Get, "/users/:id", "user"),
        ];
        let table = DispatchTable::build(&routes);

        assert_eq!(table.find(&Method::GET, "/users/me").unwrap().route.lambda, "me");
        let matched = table.find(&Method::GET, "/users/42").unwrap();
        assert_eq!(matched.route.lambda, "user");
        assert_eq!(matched.params["id"], "42");
    }

    #[test]
    fn test_method_must_match() {
        let table = DispatchTable::build(&[route(RouteMethod::Post, "/items", "create")]);
        assert!(table.find(&Method::GET, "/items").is_none());
        assert!(table.find(&Method::POST, "/items").is_some());
    }

    #[test]
    fn test_head_matches_get_routes() {
        let table = DispatchTable::build(&[route(RouteMethod::Get, "/hello", "hello")]);
        assert!(table.find(&Method::HEAD, "/hello").is_some());
    }

    #[test]
    fn test_invalid_routes_are_skipped() {
        let routes = vec![
            route(RouteMethod::Other("fetch".into()), "/a", "a"),
            route(RouteMethod::Get, "no-slash", "b"),
            route(RouteMethod::Get, "/ok", "ok"),
        ];
        let table = DispatchTable::build(&routes);
        assert_eq!(table.len(), 1);
        assert!(table.find(&Method::GET, "/ok").is_some());
    }

    #[test]
    fn test_duplicate_route_is_shadowed() {
        let routes = vec![
            route(RouteMethod::Get, "/users/:id", "first"),
            route(RouteMethod::Get, "/Users/:userId/", "second"),
            route(RouteMethod::Delete, "/users/:id", "remove"),
        ];
        let table = DispatchTable::build(&routes);
        assert_eq!(table.len(), 2);
        assert_eq!(table.find(&Method::GET, "/users/1").unwrap().route.lambda, "first");
        assert_eq!(table.find(&Method::DELETE, "/users/1").unwrap().route.lambda, "remove");
    }

    #[test]
    fn test_extract_from_every_source() {
        let rules: ParamRules = [
            ("userId".to_string(), ParamRule::new(RequestSource::Path, "id")),
            ("page".to_string(), ParamRule::new(RequestSource::Query, "p")),
            ("agent".to_string(), ParamRule::new(RequestSource::Headers, "User-Agent")),
            ("profile".to_string(), ParamRule::new(RequestSource::Body, "profile")),
        ]
        .into_iter()
        .collect();
        let params: BTreeMap<String, String> = [("id".to_string(), "42".to_string())].into_iter().collect();
        let request = InboundRequest::new(Method::POST, "/users/42")
            .with_query("p", "3")
            .with_header("user-agent", "curl/8")
            .with_body(json!({"profile": {"age": 30}}));

        let args = extract_arguments(&rules, &params, &request).unwrap();
        assert_eq!(
            args,
            json!({"userId": "42", "page": "3", "agent": "curl/8", "profile": {"age": 30}})
        );
    }

    #[test]
    fn test_missing_field_is_error() {
        let rules: ParamRules = [("q".to_string(), ParamRule::new(RequestSource::Query, "q"))]
            .into_iter()
            .collect();
        let request = InboundRequest::new(Method::GET, "/search");

        let err = extract_arguments(&rules, &BTreeMap::new(), &request).unwrap_err();
        match err {
            LambdaError::MissingParameter { origin, key } => {
                assert_eq!(origin, "query");
                assert_eq!(key, "q");
            }
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn test_no_rules_gives_empty_object() {
        let request = InboundRequest::new(Method::GET, "/hello").with_query("ignored", "1");
        let args = extract_arguments(&ParamRules::new(), &BTreeMap::new(), &request).unwrap();
        assert_eq!(args, json!({}));
    }
}
