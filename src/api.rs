use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{
        header::{CACHE_CONTROL, CONTENT_TYPE},
        HeaderMap, StatusCode, Uri,
    },
    middleware::{self, Next},
    response::{IntoResponse, Response},
    Router,
};
use log::{error, info, warn};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::provider::ProviderFactory;
use crate::request::{self, Route, UpdateRequest};
use crate::updater;

pub struct AppState {
    pub config: Config,
    pub provider: Arc<dyn ProviderFactory>,
}

pub fn create_router(config: Config, provider: Arc<dyn ProviderFactory>) -> Router {
    let state = Arc::new(AppState { config, provider });

    // Every path lands in one handler: `/update` is matched by suffix.
    Router::new()
        .fallback(handle)
        .layer(middleware::from_fn_with_state(state.clone(), access_log))
        .with_state(state)
}

async fn access_log(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let start = Instant::now();

    // The query string may carry the API token, so only the path is logged.
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = request
        .headers()
        .get("user-agent")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-")
        .to_string();
    let ip = request
        .headers()
        .get(state.config.update.client_ip_header.to_ascii_lowercase().as_str())
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
        .or_else(|| {
            request
                .headers()
                .get("x-forwarded-for")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.split(',').next().unwrap_or("-").trim().to_string())
        })
        .unwrap_or_else(|| "-".to_string());

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let length = response
        .headers()
        .get("content-length")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("-");

    let duration = start.elapsed();

    // Access log format: method path "user-agent" ip status length duration
    info!(
        target: "access",
        "{} {} \"{}\" {} {} {} {:.3}ms",
        method, path, user_agent, ip, status, length, duration.as_secs_f64() * 1000.0
    );

    response
}

async fn handle(State(state): State<Arc<AppState>>, uri: Uri, headers: HeaderMap) -> Response {
    match process(&state, &uri, &headers).await {
        Ok(Route::Ignored) => StatusCode::NO_CONTENT.into_response(),
        Ok(Route::Update) => plain_text(StatusCode::OK, "good"),
        Err(e) => e.into_response(),
    }
}

async fn process(state: &AppState, uri: &Uri, headers: &HeaderMap) -> Result<Route> {
    let route = request::route(uri.path())?;
    if route == Route::Ignored {
        return Ok(route);
    }

    let request = UpdateRequest::interpret(&state.config.update, uri, headers)?;
    let provider = state.provider.connect(&request.token);
    updater::apply(provider.as_ref(), &request).await?;

    info!(
        "DNS update successful: {} -> {}",
        request.hostnames.join(","),
        request.ips.join(",")
    );
    Ok(route)
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        match &self {
            Error::RoutingMiss => {}
            Error::BadRequest(reason) => warn!("Rejected update request: {}", reason),
            Error::UpstreamNotFound(_) | Error::Upstream { .. } => {
                error!("DNS update failed: {}", self)
            }
        }
        plain_text(self.status(), self.reason())
    }
}

fn plain_text(status: StatusCode, body: impl Into<String>) -> Response {
    (
        status,
        [
            (CONTENT_TYPE, "text/plain;charset=UTF-8"),
            (CACHE_CONTROL, "no-store"),
        ],
        body.into(),
    )
        .into_response()
}
