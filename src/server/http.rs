//! HTTP server implementation
//!
//! Uses hyper http1 with TokioIo for async handling.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::{Body, Incoming};
use hyper::header::{self, HeaderValue};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::error::Error as StdError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::blob::BlobService;
use crate::config::Args;
use crate::display::DisplayClock;
use crate::routes::{self, blob::IMAGE_PATH_PREFIX};
use crate::store::BlobStore;
use crate::types::Result;

/// Shared application state
pub struct AppState {
    pub args: Args,
    /// Submit/retrieve orchestration over the configured store
    pub service: BlobService,
    /// Renders timestamps for responses
    pub clock: DisplayClock,
}

impl AppState {
    pub fn new(args: Args, store: Arc<dyn BlobStore>) -> Result<Self> {
        let clock = DisplayClock::from_offset_minutes(args.display_utc_offset_minutes)?;
        Ok(Self {
            args,
            service: BlobService::new(store),
            clock,
        })
    }
}

/// Run the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let addr = state.args.bind_addr();
    let listener = TcpListener::bind(addr).await?;

    info!(
        "Manna listening on {} (store: {})",
        addr,
        state.service.store().backend()
    );

    if state.args.dev_mode {
        warn!("Development mode enabled - error responses include diagnostic details");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .title_case_headers(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, Infallible> {
    info!("[{}] {} {}", addr, req.method(), req.uri().path());
    Ok(route(state, req).await)
}

/// Dispatch a request to its handler
pub async fn route<B>(state: Arc<AppState>, req: Request<B>) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: Into<Box<dyn StdError + Send + Sync>>,
{
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let mut response = match (method, path.as_str()) {
        // CORS preflight
        (Method::OPTIONS, _) => preflight_response(),

        // Liveness probe
        (Method::GET, "/") | (Method::GET, "/health") | (Method::GET, "/healthz") => {
            routes::liveness(Arc::clone(&state)).await
        }

        (Method::POST, "/upload") => routes::handle_upload_body(Arc::clone(&state), req).await,

        (Method::GET, "/api.img") => routes::handle_upload_query(Arc::clone(&state), req).await,

        (Method::GET, p) if p.starts_with(IMAGE_PATH_PREFIX) => {
            let id = &p[IMAGE_PATH_PREFIX.len()..];
            routes::handle_get_image(Arc::clone(&state), id, false).await
        }

        (Method::HEAD, p) if p.starts_with(IMAGE_PATH_PREFIX) => {
            let id = &p[IMAGE_PATH_PREFIX.len()..];
            routes::handle_get_image(Arc::clone(&state), id, true).await
        }

        (_, "/upload") | (_, "/api.img") => method_not_allowed_response(&path),

        _ => not_found_response(&path),
    };

    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
    response
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    routes::finish(
        Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header("Access-Control-Allow-Headers", "*")
            .header("Access-Control-Allow-Methods", "GET, HEAD, POST, OPTIONS"),
        Bytes::new(),
    )
}

/// Known path, wrong method
fn method_not_allowed_response(path: &str) -> Response<Full<Bytes>> {
    let allow = if path == "/upload" { "POST, OPTIONS" } else { "GET, OPTIONS" };
    let body = serde_json::json!({
        "error": "Method Not Allowed",
        "path": path,
    });

    routes::finish(
        Response::builder()
            .status(StatusCode::METHOD_NOT_ALLOWED)
            .header(header::ALLOW, allow)
            .header(header::CONTENT_TYPE, "application/json"),
        Bytes::from(body.to_string()),
    )
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
        "hint": "POST /upload, GET /api.img?img=..., GET /image/{id}"
    });

    routes::finish(
        Response::builder()
            .status(StatusCode::NOT_FOUND)
            .header(header::CONTENT_TYPE, "application/json"),
        Bytes::from(body.to_string()),
    )
}
