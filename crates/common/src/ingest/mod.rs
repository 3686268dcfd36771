//! Ingestion Coordinator
//!
//! Accepts one uploaded PDF plus its metadata and makes it durable in both
//! stores, or in neither:
//!
//! ```text
//! Validating -> NamingAndWriting -> PersistingRecord -> Committed
//!      |               |                   |
//!      v               v                   v
//!   Rejected        Rejected          RollingBack -> Rejected
//! ```
//!
//! The file is written before the record is inserted. If the insert fails
//! the file is deleted again; if that delete fails too the orphan is logged
//! and counted, and the caller still sees the insert error.

use crate::db::models::{NewPaper, NOT_APPLICABLE};
use crate::db::MetadataStore;
use crate::errors::{AppError, Result};
use crate::metrics;
use crate::storage::{unique_filename, FileStore, NameGenerator, RandomSuffix};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::AsyncRead;
use tracing::{error, info, instrument, warn, Span};

/// Where a single upload is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestStage {
    Validating,
    NamingAndWriting,
    PersistingRecord,
    RollingBack,
    Committed,
    Rejected,
}

impl IngestStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            IngestStage::Validating => "validating",
            IngestStage::NamingAndWriting => "naming_and_writing",
            IngestStage::PersistingRecord => "persisting_record",
            IngestStage::RollingBack => "rolling_back",
            IngestStage::Committed => "committed",
            IngestStage::Rejected => "rejected",
        }
    }
}

impl fmt::Display for IngestStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The binary part of an upload
pub struct IncomingFile {
    /// Name the client gave the file
    pub filename: String,
    pub content: Box<dyn AsyncRead + Unpin + Send>,
}

impl IncomingFile {
    pub fn new(filename: impl Into<String>, content: impl AsyncRead + Unpin + Send + 'static) -> Self {
        Self {
            filename: filename.into(),
            content: Box::new(content),
        }
    }
}

impl fmt::Debug for IncomingFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IncomingFile")
            .field("filename", &self.filename)
            .finish_non_exhaustive()
    }
}

/// Metadata fields exactly as submitted; blank counts as absent
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperFields {
    pub class: Option<String>,
    pub subject: Option<String>,
    pub semester: Option<String>,
    pub exam_year: Option<String>,
    pub exam_type: Option<String>,
    pub paper_code: Option<String>,
    pub exam_number: Option<String>,
    pub medium: Option<String>,
    pub university: Option<String>,
    pub time: Option<String>,
    pub max_marks: Option<String>,
    pub uploader_name: Option<String>,
}

/// One upload request
#[derive(Debug, Default)]
pub struct UploadRequest {
    pub file: Option<IncomingFile>,
    pub fields: PaperFields,
    /// Authenticated identity, used when no uploader name is given
    pub actor: Option<String>,
}

/// Result of a committed upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestReceipt {
    pub id: i32,
    pub filename: String,
}

/// Coordinates the file write and the record insert for each upload
pub struct IngestionCoordinator {
    store: Arc<dyn MetadataStore>,
    files: Arc<dyn FileStore>,
    names: Arc<dyn NameGenerator>,
}

impl IngestionCoordinator {
    pub fn new(store: Arc<dyn MetadataStore>, files: Arc<dyn FileStore>) -> Self {
        Self {
            store,
            files,
            names: Arc::new(RandomSuffix),
        }
    }

    /// Replace the source of filename suffixes
    pub fn with_name_generator(mut self, names: Arc<dyn NameGenerator>) -> Self {
        self.names = names;
        self
    }

    /// Run one upload through the pipeline
    #[instrument(
        skip(self, request),
        fields(actor = ?request.actor, filename = tracing::field::Empty)
    )]
    pub async fn ingest(&self, request: UploadRequest) -> Result<IngestReceipt> {
        let started = Instant::now();

        let (mut file, mut paper) = match validate(request) {
            Ok(valid) => valid,
            Err(e) => return Err(reject(IngestStage::Validating, e)),
        };

        let filename = unique_filename(self.names.as_ref(), &file.filename);
        Span::current().record("filename", &filename.as_str());
        let bytes = match self.files.write(&filename, file.content.as_mut()).await {
            Ok(n) => n,
            Err(e) => return Err(reject(IngestStage::NamingAndWriting, e)),
        };

        paper.filename = filename.clone();
        let record = match self.store.insert_paper(paper).await {
            Ok(record) => record,
            Err(e) => {
                self.roll_back(&filename, &e).await;
                return Err(reject(IngestStage::PersistingRecord, e));
            }
        };

        metrics::record_upload(started.elapsed(), bytes);
        info!(
            stage = %IngestStage::Committed,
            id = record.id,
            original = %file.filename,
            bytes,
            uploader = %record.uploader_name,
            "Paper ingested"
        );

        Ok(IngestReceipt {
            id: record.id,
            filename: record.filename,
        })
    }

    /// Delete the file written for a failed insert
    async fn roll_back(&self, filename: &str, cause: &AppError) {
        warn!(
            stage = %IngestStage::RollingBack,
            error = %cause,
            "Record insert failed, removing stored file"
        );

        if let Err(e) = self.files.delete(filename).await {
            let anomaly = AppError::CompensationFailure {
                filename: filename.to_string(),
                message: e.to_string(),
            };
            metrics::record_compensation_failure();
            error!(
                anomaly = "compensation_failure",
                code = ?anomaly.code(),
                stage = %IngestStage::RollingBack,
                filename = %filename,
                error = %anomaly,
                "Orphaned file left in the file store"
            );
        }
    }
}

fn reject(stage: IngestStage, err: AppError) -> AppError {
    metrics::record_upload_rejected(stage.as_str());
    if err.is_server_error() {
        error!(stage = %stage, outcome = %IngestStage::Rejected, error = %err, "Upload rejected");
    } else {
        warn!(stage = %stage, outcome = %IngestStage::Rejected, error = %err, "Upload rejected");
    }
    err
}

const REQUIRED_FIELDS: [&str; 7] = [
    "class",
    "subject",
    "semester",
    "exam_year",
    "exam_type",
    "medium",
    "uploader_name",
];

/// Checks run in order, stopping at the first failure. The filename on
/// the returned record is left empty for the caller to assign.
fn validate(request: UploadRequest) -> Result<(IncomingFile, NewPaper)> {
    let UploadRequest { file, fields, actor } = request;

    let file = file.ok_or_else(|| AppError::invalid_field("file", "no file part in the request"))?;

    if file.filename.trim().is_empty() {
        return Err(AppError::invalid_field("file", "no file selected"));
    }

    if !has_pdf_extension(&file.filename) {
        return Err(AppError::UnsupportedMediaType {
            filename: file.filename,
        });
    }

    let uploader = present(fields.uploader_name).or_else(|| present(actor));
    let required = [
        present(fields.class),
        present(fields.subject),
        present(fields.semester),
        present(fields.exam_year),
        present(fields.exam_type),
        present(fields.medium),
        uploader,
    ];

    let missing: Vec<&str> = REQUIRED_FIELDS
        .iter()
        .zip(&required)
        .filter(|(_, value)| value.is_none())
        .map(|(name, _)| *name)
        .collect();
    if !missing.is_empty() {
        return Err(AppError::Validation {
            message: format!("missing required fields: {}", missing.join(", ")),
            field: Some(missing.join(",")),
        });
    }

    let [class, subject, semester, exam_year, exam_type, medium, uploader_name] =
        required.map(Option::unwrap_or_default);

    if exam_year.len() != 4 || !exam_year.bytes().all(|b| b.is_ascii_digit()) {
        return Err(AppError::invalid_field(
            "exam_year",
            format!("'{}' is not a four-digit year", exam_year),
        ));
    }

    let paper = NewPaper {
        class,
        subject,
        semester,
        exam_year,
        exam_type,
        paper_code: or_not_applicable(fields.paper_code),
        exam_number: or_not_applicable(fields.exam_number),
        medium,
        university: or_not_applicable(fields.university),
        time: or_not_applicable(fields.time),
        max_marks: or_not_applicable(fields.max_marks),
        uploader_name,
        filename: String::new(),
    };

    Ok((file, paper))
}

fn has_pdf_extension(filename: &str) -> bool {
    filename
        .rsplit_once('.')
        .is_some_and(|(_, ext)| ext.eq_ignore_ascii_case("pdf"))
}

/// Trimmed value, or `None` when missing or blank
fn present(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn or_not_applicable(value: Option<String>) -> String {
    present(value).unwrap_or_else(|| NOT_APPLICABLE.to_string())
}
