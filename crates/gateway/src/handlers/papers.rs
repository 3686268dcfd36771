//! Paper upload and search handlers

use axum::{
    extract::{
        multipart::{Field, MultipartError},
        Multipart, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use std::io::SeekFrom;
use tokio::fs::File;
use tokio::io::{AsyncSeekExt, AsyncWriteExt};

use crate::AppState;
use papervault_common::{
    auth::AuthContext,
    errors::{AppError, Result},
    ingest::{IncomingFile, PaperFields, UploadRequest},
    retrieval::DecoratedPaper,
};

#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub message: String,
    pub filename: String,
    pub id: i32,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// Accept a multipart PDF upload from an authenticated admin
pub async fn upload(
    State(state): State<AppState>,
    auth: AuthContext,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<UploadResponse>)> {
    let limit = state.config.storage.max_upload_bytes;
    let mut fields = PaperFields::default();
    let mut admin_name = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e, limit))?
    {
        let name = field.name().unwrap_or_default().to_string();

        if name == "file" {
            let original = field.file_name().unwrap_or_default().to_string();
            let spooled = spool(field, limit).await?;
            file = Some(IncomingFile::new(original, spooled));
            continue;
        }

        let value = field.text().await.map_err(|e| multipart_error(e, limit))?;
        let slot = match name.as_str() {
            "class" => &mut fields.class,
            "subject" => &mut fields.subject,
            "semester" => &mut fields.semester,
            "exam_year" => &mut fields.exam_year,
            "exam_type" => &mut fields.exam_type,
            "paper_code" => &mut fields.paper_code,
            "exam_number" => &mut fields.exam_number,
            "medium" => &mut fields.medium,
            "university" => &mut fields.university,
            "time" => &mut fields.time,
            "max_marks" => &mut fields.max_marks,
            "uploader_name" => &mut fields.uploader_name,
            "admin_name" => &mut admin_name,
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload field");
                continue;
            }
        };
        *slot = Some(value);
    }

    if fields.uploader_name.as_deref().map_or(true, |v| v.trim().is_empty()) {
        fields.uploader_name = admin_name;
    }

    let receipt = state
        .ingest
        .ingest(UploadRequest {
            file,
            fields,
            actor: Some(auth.actor),
        })
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            filename: receipt.filename,
            id: receipt.id,
        }),
    ))
}

/// Search the catalog; no `q` lists every paper
pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<DecoratedPaper>>> {
    let papers = state.retrieval.search(params.q.as_deref()).await?;
    Ok(Json(papers))
}

/// Copy a file part chunk by chunk into an anonymous temp file, rewound
/// for reading. The temp file is gone once the handle drops.
async fn spool(mut field: Field<'_>, limit: usize) -> Result<File> {
    let mut spool = File::from_std(tempfile::tempfile().map_err(spool_error)?);

    while let Some(chunk) = field.chunk().await.map_err(|e| multipart_error(e, limit))? {
        spool.write_all(&chunk).await.map_err(spool_error)?;
    }
    spool.flush().await.map_err(spool_error)?;
    spool.seek(SeekFrom::Start(0)).await.map_err(spool_error)?;

    Ok(spool)
}

fn spool_error(err: std::io::Error) -> AppError {
    AppError::StorageWrite {
        message: format!("failed to buffer upload: {}", err),
    }
}

fn multipart_error(err: MultipartError, limit: usize) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge { limit }
    } else {
        AppError::Validation {
            message: err.body_text(),
            field: None,
        }
    }
}
