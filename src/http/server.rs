//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the routing handler
//! - Wire up middleware (tracing, body limit, request ID)
//! - Bind server to listener
//! - Dispatch requests to the route table
//! - Forward rewritten requests to resolved instances
//! - Hand unrouted paths to the static asset collaborator
//! - Swap in reloaded route tables

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{Method, Request, StatusCode},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceExt;
use tower_http::{limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer};

use crate::config::RouterConfig;
use crate::http::request::{propagate_request_id_layer, request_id, set_request_id_layer};
use crate::http::response::RouteError;
use crate::observability::metrics;
use crate::routing::rewrite::rewrite_request;
use crate::routing::{Route, RouteTable, SessionKeyExtractor};
use crate::selector::{self, InstanceRegistry, PoolRegistry};

/// Methods forwarded to instances. Unrouted paths accept any method.
fn is_routed_method(method: &Method) -> bool {
    matches!(
        *method,
        Method::GET | Method::POST | Method::PUT | Method::DELETE
    )
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub routes: Arc<ArcSwap<RouteTable>>,
    pub registry: Arc<dyn InstanceRegistry>,
    pub sessions: Arc<SessionKeyExtractor>,
    pub resolve_timeout: Duration,
    pub assets: Option<ServeDir>,
}

/// HTTP server for the container router.
pub struct HttpServer {
    router: Router,
    routes: Arc<ArcSwap<RouteTable>>,
}

impl HttpServer {
    /// Create a new HTTP server backed by the configured instance pool.
    pub fn new(config: RouterConfig) -> Self {
        let registry = Arc::new(PoolRegistry::from_config(&config.registry, &config.timeouts));
        Self::with_registry(config, registry)
    }

    /// Create a new HTTP server resolving instances through `registry`.
    pub fn with_registry(config: RouterConfig, registry: Arc<dyn InstanceRegistry>) -> Self {
        let routes = Arc::new(ArcSwap::from_pointee(RouteTable::from_config(
            config.routes.clone(),
        )));

        let assets = config.assets.dir.as_ref().map(|dir| {
            tracing::info!(dir = %dir, "Serving static assets for unrouted paths");
            ServeDir::new(dir)
        });

        let state = AppState {
            routes: routes.clone(),
            registry,
            sessions: Arc::new(SessionKeyExtractor::new(&config.session)),
            resolve_timeout: Duration::from_millis(config.timeouts.resolve_ms),
            assets,
        };

        let router = Self::build_router(&config, state);
        Self { router, routes }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &RouterConfig, state: AppState) -> Router {
        Router::new()
            .route("/{*path}", any(route_handler))
            .route("/", any(route_handler))
            .with_state(state)
            .layer(RequestBodyLimitLayer::new(config.listener.max_body_bytes))
            .layer(propagate_request_id_layer())
            .layer(TraceLayer::new_for_http())
            .layer(set_request_id_layer())
    }

    /// The assembled router, for serving or in-process testing.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server until `shutdown` fires, applying route updates as they arrive.
    pub async fn run(
        self,
        listener: TcpListener,
        mut config_updates: mpsc::UnboundedReceiver<RouterConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            routes = self.routes.load().len(),
            "HTTP server starting"
        );

        let routes = self.routes.clone();
        let reloader = tokio::spawn(async move {
            while let Some(new_config) = config_updates.recv().await {
                let table = RouteTable::from_config(new_config.routes);
                tracing::info!(routes = table.len(), "Route table reloaded");
                routes.store(Arc::new(table));
            }
        });

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        reloader.abort();
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Main routing handler.
/// Looks up route, derives routing key, resolves an instance and forwards.
async fn route_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let request_id = request_id(&request).to_string();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let matched = state.routes.load().match_path(&path);
    let Some(route) = matched else {
        tracing::debug!(request_id = %request_id, path = %path, "No route matched, serving assets");
        let response = serve_unrouted(&state, request).await;
        metrics::record_request(&method, response.status().as_u16(), "assets", start_time);
        return response;
    };

    if !is_routed_method(request.method()) {
        metrics::record_request(&method, 405, &route.name, start_time);
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let routing_key = state.sessions.extract(&request);

    tracing::debug!(
        request_id = %request_id,
        method = %method,
        path = %path,
        route = %route.name,
        routing_key = %routing_key,
        "Routing request"
    );

    let response = match forward(&state, &route, &routing_key, request).await {
        Ok(response) => response,
        Err(err) => {
            tracing::error!(
                request_id = %request_id,
                route = %route.name,
                routing_key = %routing_key,
                kind = err.kind(),
                error = %err,
                "Container request failed"
            );
            err.into_response()
        }
    };

    metrics::record_request(&method, response.status().as_u16(), &route.name, start_time);
    response
}

/// Rewrite the request for `route`, resolve its instance and forward it.
async fn forward(
    state: &AppState,
    route: &Route,
    routing_key: &str,
    request: Request<Body>,
) -> Result<Response, RouteError> {
    let path = request.uri().path();
    let target = route.target_path(path).unwrap_or(path).to_string();
    let request = rewrite_request(request, &target)?;

    let handle = selector::select(
        state.registry.as_ref(),
        &route.policy,
        routing_key,
        state.resolve_timeout,
    )
    .await?;

    tracing::debug!(instance = %handle.name(), target = %target, "Instance resolved");
    Ok(handle.fetch(request).await?)
}

/// Pass an unrouted request to the static asset collaborator.
/// Without one, `/` lists the routable endpoints and everything else is 404.
async fn serve_unrouted(state: &AppState, request: Request<Body>) -> Response {
    match &state.assets {
        Some(assets) => match assets.clone().oneshot(request).await {
            Ok(response) => response.map(Body::new),
            Err(never) => match never {},
        },
        None if request.uri().path() == "/" => state.routes.load().index().into_response(),
        None => (StatusCode::NOT_FOUND, "Not Found").into_response(),
    }
}
