//! `POST /api/evaluate`

use crate::api::state::AppState;
use axum::body::Bytes;
use axum::extract::rejection::BytesRejection;
use axum::extract::State;
use axum::Json;
use std::sync::Arc;
use tracing::{error, warn, Span};
use xform_core::EvaluateResponse;

/// Evaluate a request body; always answers 200 with an envelope
pub async fn evaluate(
    State(state): State<AppState>,
    body: Result<Bytes, BytesRejection>,
) -> Json<EvaluateResponse> {
    let body = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "rejected request body");
            return Json(EvaluateResponse::error(rejection.body_text()));
        }
    };

    let dispatcher = Arc::clone(&state.dispatcher);
    let span = Span::current();
    let outcome =
        tokio::task::spawn_blocking(move || span.in_scope(|| dispatcher.evaluate_body(&body))).await;

    match outcome {
        Ok(response) => Json(response),
        Err(err) => {
            error!(error = %err, "evaluation task failed");
            Json(EvaluateResponse::error(
                xform_core::Error::internal("evaluation task failed").to_string(),
            ))
        }
    }
}
