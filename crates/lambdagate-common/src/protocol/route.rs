//! Persisted route model.
//!
//! A route maps an HTTP method and a path pattern to a function, together with
//! the rules used to build the function's arguments from the request. The types
//! here serialize to the layout of `routes.json`:
//!
//! ```json
//! [{"id":"…","method":"get","path":"/users/:id","params":{"userId":["params","id"]},"lambda":"get-user"}]
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub type RouteId = String;

/// Output key → extraction rule.
pub type ParamRules = BTreeMap<String, ParamRule>;

/// HTTP method of a route.
///
/// Parsing is case-insensitive. Unknown methods are kept verbatim in
/// [`RouteMethod::Other`] because adding a route never validates it; such a
/// route is stored and persisted but never mounted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum RouteMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Other(String),
}

impl RouteMethod {
    pub fn as_str(&self) -> &str {
        match self {
            RouteMethod::Get => "get",
            RouteMethod::Post => "post",
            RouteMethod::Put => "put",
            RouteMethod::Patch => "patch",
            RouteMethod::Delete => "delete",
            RouteMethod::Head => "head",
            RouteMethod::Other(raw) => raw,
        }
    }

    /// Whether this is one of the six mountable methods.
    pub fn is_known(&self) -> bool {
        !matches!(self, RouteMethod::Other(_))
    }
}

impl From<String> for RouteMethod {
    fn from(raw: String) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "get" => RouteMethod::Get,
            "post" => RouteMethod::Post,
            "put" => RouteMethod::Put,
            "patch" => RouteMethod::Patch,
            "delete" => RouteMethod::Delete,
            "head" => RouteMethod::Head,
            _ => RouteMethod::Other(raw),
        }
    }
}

impl From<&str> for RouteMethod {
    fn from(raw: &str) -> Self {
        RouteMethod::from(raw.to_string())
    }
}

impl From<RouteMethod> for String {
    fn from(method: RouteMethod) -> Self {
        method.as_str().to_string()
    }
}

impl fmt::Display for RouteMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Part of the request a parameter is read from.
///
/// Wire names follow the request object fields of an Express-style handler
/// (`params`, `query`, `body`, `headers`); descriptive aliases are accepted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestSource {
    #[serde(rename = "params", alias = "path-parameters", alias = "path")]
    Path,
    #[serde(rename = "query", alias = "query-parameters")]
    Query,
    #[serde(rename = "body", alias = "request-body")]
    Body,
    #[serde(rename = "headers", alias = "header")]
    Headers,
}

impl RequestSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestSource::Path => "params",
            RequestSource::Query => "query",
            RequestSource::Body => "body",
            RequestSource::Headers => "headers",
        }
    }
}

impl fmt::Display for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `[source, key]`: read field `key` from `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamRule(pub RequestSource, pub String);

impl ParamRule {
    pub fn new(source: RequestSource, key: impl Into<String>) -> Self {
        ParamRule(source, key.into())
    }

    pub fn source(&self) -> RequestSource {
        self.0
    }

    pub fn key(&self) -> &str {
        &self.1
    }
}

/// Route fields supplied by clients: everything except the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteSpec {
    pub method: RouteMethod,
    pub path: String,
    #[serde(default)]
    pub params: ParamRules,
    pub lambda: String,
}

impl RouteSpec {
    pub fn new(method: RouteMethod, path: impl Into<String>, lambda: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            params: ParamRules::new(),
            lambda: lambda.into(),
        }
    }

    pub fn with_param(mut self, output_key: impl Into<String>, rule: ParamRule) -> Self {
        self.params.insert(output_key.into(), rule);
        self
    }
}

/// A stored route. `id` is assigned once by [`RouteDefinition::create`] and never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteDefinition {
    #[serde(alias = "uuid")]
    pub id: RouteId,
    pub method: RouteMethod,
    pub path: String,
    #[serde(default)]
    pub params: ParamRules,
    pub lambda: String,
}

impl RouteDefinition {
    /// Creates a definition with a fresh v4 UUID.
    pub fn create(spec: RouteSpec) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            method: spec.method,
            path: spec.path,
            params: spec.params,
            lambda: spec.lambda,
        }
    }

    /// Overwrites every field except the id.
    pub fn apply(&mut self, spec: RouteSpec) {
        self.method = spec.method;
        self.path = spec.path;
        self.params = spec.params;
        self.lambda = spec.lambda;
    }

    pub fn spec(&self) -> RouteSpec {
        RouteSpec {
            method: self.method.clone(),
            path: self.path.clone(),
            params: self.params.clone(),
            lambda: self.lambda.clone(),
        }
    }
}
