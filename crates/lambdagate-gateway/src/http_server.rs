//! HTTP server.
//!
//! Serves three surfaces from one axum router:
//!
//! - `/lambda/...` - function administration and direct invocation
//! - `/gateway/...` - route table administration
//! - `<mount prefix>/...` - the dynamic routes (fallback handler consulting
//!   the dispatch surface)
//!
//! plus a health check at `/__health`.

use axum::{
    body::{to_bytes, Body, Bytes},
    extract::{FromRequest, Path, Query, Request, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Form, Json, Router,
};
use lambdagate_common::{LambdaError, RouteDefinition, RouteSpec};
use lambdagate_runtime::FunctionRuntime;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::config::GatewayConfig;
use crate::dispatch::{InboundRequest, RequestDispatcher};
use crate::error::ApiError;
use crate::store::{JsonFileRouteStore, RouteStore};
use crate::table::RouteTable;

type ApiResult<T> = Result<T, ApiError>;

/// Shared state of the HTTP handlers.
pub struct AppState {
    pub config: GatewayConfig,
    pub runtime: Arc<FunctionRuntime>,
    pub dispatcher: Arc<RequestDispatcher>,
    pub routes: Arc<RouteTable>,
}

impl AppState {
    /// Opens the route table persisted at `config.routes_file`.
    pub async fn open(config: GatewayConfig, runtime: Arc<FunctionRuntime>) -> Result<Self, LambdaError> {
        let store = Arc::new(JsonFileRouteStore::new(config.routes_file.clone()));
        Self::with_store(config, runtime, store).await
    }

    /// Opens the route table held by `store`.
    pub async fn with_store(
        config: GatewayConfig,
        runtime: Arc<FunctionRuntime>,
        store: Arc<dyn RouteStore>,
    ) -> Result<Self, LambdaError> {
        config
            .validate()
            .map_err(|e| LambdaError::InvalidRequest(format!("Invalid gateway configuration: {}", e)))?;

        let dispatcher = Arc::new(RequestDispatcher::new(runtime.clone()));
        let routes = Arc::new(RouteTable::open(store, dispatcher.clone()).await);

        Ok(Self {
            config,
            runtime,
            dispatcher,
            routes,
        })
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    state: Arc<AppState>,
}

impl HttpServer {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// The complete axum application.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/lambda", get(list_functions))
            .route("/lambda/", get(list_functions))
            .route(
                "/lambda/:name",
                get(read_function).put(write_function).delete(remove_function),
            )
            .route("/lambda/run/:name", post(run_function))
            .route("/gateway", get(list_routes).post(create_route))
            .route("/gateway/", get(list_routes).post(create_route))
            .route("/gateway/:id", put(update_route).delete(remove_route))
            .route("/__health", get(health_check))
            .fallback(dispatch_dynamic)
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(self.state.clone())
    }

    /// Binds to the configured address and serves until the process stops.
    pub async fn run(self) -> Result<(), LambdaError> {
        let addr: SocketAddr = self.state.config.bind;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| LambdaError::Transport(format!("Failed to bind to {}: {}", addr, e)))?;
        self.serve(listener).await
    }

    /// Serves on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), LambdaError> {
        info!(
            "LambdaGate HTTP server listening on {}",
            listener
                .local_addr()
                .map_err(|e| LambdaError::Transport(format!("Failed to get local addr: {}", e)))?
        );

        axum::serve(listener, self.router())
            .await
            .map_err(|e| LambdaError::Transport(format!("Server error: {}", e)))
    }
}

async fn list_functions(State(state): State<Arc<AppState>>) -> ApiResult<Json<Vec<String>>> {
    Ok(Json(state.runtime.list().await?))
}

async fn read_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<String> {
    Ok(state.runtime.read(&name).await?)
}

async fn write_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    source: String,
) -> ApiResult<StatusCode> {
    state.runtime.write(&name, &source).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> ApiResult<StatusCode> {
    state.runtime.remove(&name).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn run_function(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<JsonValue>> {
    let args = parse_body(&headers, body).await?;
    Ok(Json(state.runtime.run(&name, args).await?))
}

async fn list_routes(State(state): State<Arc<AppState>>) -> Json<Vec<RouteDefinition>> {
    Json(state.routes.list().await)
}

async fn create_route(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<RouteSpec>,
) -> ApiResult<(StatusCode, Json<RouteDefinition>)> {
    let route = state.routes.add(spec).await?;
    Ok((StatusCode::CREATED, Json(route)))
}

async fn update_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<RouteSpec>,
) -> ApiResult<StatusCode> {
    state.routes.save(&id, spec).await?;
    Ok(StatusCode::OK)
}

async fn remove_route(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    state.routes.remove(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// Fallback: match the request against the dynamic routes.
async fn dispatch_dynamic(State(state): State<Arc<AppState>>, request: Request) -> Response {
    let Some(path) = strip_prefix(state.config.normalized_prefix(), request.uri().path()) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let path = path.to_string();

    let (parts, body) = request.into_parts();
    let body = match to_bytes(body, state.config.body_limit).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let err = LambdaError::InvalidRequest(format!("Failed to read body: {}", e));
            return ApiError(err).into_response();
        }
    };

    let query = match Query::<HashMap<String, String>>::try_from_uri(&parts.uri) {
        Ok(Query(query)) => query,
        Err(e) => {
            tracing::debug!("Ignoring malformed query string: {}", e);
            HashMap::new()
        }
    };

    let headers = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();

    let body = match parse_body(&parts.headers, body).await {
        Ok(body) => body,
        Err(e) => return e.into_response(),
    };

    let inbound = InboundRequest {
        method: parts.method,
        path,
        query,
        headers,
        body,
    };

    match state.dispatcher.dispatch(&inbound).await {
        Some(Ok(result)) => Json(result).into_response(),
        Some(Err(e)) => ApiError(e).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// `path` relative to `prefix`, if it lies under it.
fn strip_prefix<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    if prefix.is_empty() {
        return Some(path);
    }
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some("/")
    } else if rest.starts_with('/') {
        Some(rest)
    } else {
        None
    }
}

/// Parses a request body into function arguments.
///
/// JSON and URL-encoded form bodies are understood; anything else, including
/// an empty body, is an empty object.
async fn parse_body(headers: &HeaderMap, body: Bytes) -> Result<JsonValue, ApiError> {
    let empty = JsonValue::Object(Map::new());
    if body.is_empty() {
        return Ok(empty);
    }

    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_ascii_lowercase();

    if content_type.starts_with("application/json") || content_type.ends_with("+json") {
        return serde_json::from_slice(&body)
            .map_err(|e| ApiError(LambdaError::InvalidRequest(format!("Malformed JSON body: {}", e))));
    }

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let request = axum::http::Request::builder()
            .method(Method::POST)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .map_err(|e| ApiError(LambdaError::InvalidRequest(e.to_string())))?;
        let Form(fields) = Form::<HashMap<String, String>>::from_request(request, &())
            .await
            .map_err(|e| ApiError(LambdaError::InvalidRequest(format!("Malformed form body: {}", e))))?;
        let object = fields
            .into_iter()
            .map(|(k, v)| (k, JsonValue::String(v)))
            .collect();
        return Ok(JsonValue::Object(object));
    }

    Ok(empty)
}
