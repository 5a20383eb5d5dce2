//! Liveness probe
//!
//! `GET /` (also `/health`, `/healthz`) answers 200 once the store connection
//! is up, with the current localized time. A store that cannot be reached
//! answers 503.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use super::{error_response, json_response};
use crate::server::AppState;

#[derive(Debug, Serialize)]
pub struct LivenessResponse {
    pub status: &'static str,
    /// Current localized time
    pub hora: String,
    pub store: &'static str,
    pub version: &'static str,
}

pub async fn liveness(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let store = state.service.store();
    if let Err(e) = store.connect().await {
        return error_response(&e, state.args.dev_mode);
    }

    json_response(
        StatusCode::OK,
        &LivenessResponse {
            status: "API Online",
            hora: state.clock.now(),
            store: store.backend(),
            version: env!("CARGO_PKG_VERSION"),
        },
    )
}
