//! Shared fixtures for unit tests

use crate::config::DatabaseConfig;
use crate::db::models::NewPaper;
use crate::db::{DbPool, Repository};
use crate::ingest::{IncomingFile, PaperFields, UploadRequest};
use std::io::Cursor;
use std::path::Path;

/// Repository over a fresh SQLite file inside `dir`, schema applied
pub async fn scratch_repository(dir: &Path) -> Repository {
    let config = DatabaseConfig {
        url: format!("sqlite://{}?mode=rwc", dir.join("catalog.db").display()),
        max_connections: 2,
        min_connections: 1,
        ..Default::default()
    };
    let pool = DbPool::new(&config).await.unwrap();
    pool.ensure_schema().await.unwrap();
    Repository::new(pool)
}

pub fn new_paper(subject: &str, exam_year: &str, filename: &str) -> NewPaper {
    NewPaper {
        class: "B.Sc".into(),
        subject: subject.into(),
        semester: "Semester III".into(),
        exam_year: exam_year.into(),
        exam_type: "Final".into(),
        paper_code: "N/A".into(),
        exam_number: "N/A".into(),
        medium: "English".into(),
        university: "Delhi University".into(),
        time: "3 hours".into(),
        max_marks: "N/A".into(),
        uploader_name: "Registrar".into(),
        filename: filename.into(),
    }
}

/// Every required field filled in, optional ones left out
pub fn complete_fields() -> PaperFields {
    PaperFields {
        class: Some("B.Sc".into()),
        subject: Some("Physics".into()),
        semester: Some("Semester III".into()),
        exam_year: Some("2023".into()),
        exam_type: Some("Final".into()),
        medium: Some("English".into()),
        uploader_name: Some("Registrar".into()),
        ..Default::default()
    }
}

pub fn pdf_upload(filename: &str, body: Vec<u8>, fields: PaperFields) -> UploadRequest {
    UploadRequest {
        file: Some(IncomingFile::new(filename, Cursor::new(body))),
        fields,
        actor: Some("admin".into()),
    }
}
