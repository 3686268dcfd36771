//! Stored file delivery

use axum::{
    extract::{Path, State},
    http::header,
    response::IntoResponse,
};

use crate::AppState;
use papervault_common::{errors::Result, storage::FileStore};

/// Serve a stored PDF by its generated filename
pub async fn download(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse> {
    let bytes = state.files.read(&filename).await?;
    tracing::debug!(filename = %filename, bytes = bytes.len(), "Serving stored file");

    Ok(([(header::CONTENT_TYPE, "application/pdf")], bytes))
}
