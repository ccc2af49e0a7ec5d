//! `GET /api/engines`

use crate::api::state::AppState;
use axum::{extract::State, Json};
use serde::Serialize;
use xform_core::Mode;

/// One available engine
#[derive(Debug, Serialize)]
pub struct EngineInfo {
    pub mode: Mode,
    pub engine: &'static str,
}

/// Engine listing response
#[derive(Debug, Serialize)]
pub struct EnginesResponse {
    pub engines: Vec<EngineInfo>,
}

/// List the engines and the identifiers they report
pub async fn list_engines(State(state): State<AppState>) -> Json<EnginesResponse> {
    let engines = state
        .dispatcher
        .engines()
        .iter()
        .map(|kind| EngineInfo {
            mode: kind.mode(),
            engine: kind.identifier(),
        })
        .collect();
    Json(EnginesResponse { engines })
}
