//! Retrieval API
//!
//! Read-only search over the catalog. Results carry a download locator and
//! a human-readable label so callers never build file paths themselves.

use crate::db::models::PaperRecord;
use crate::db::MetadataStore;
use crate::errors::Result;
use crate::metrics;
use crate::query::compile;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// A catalog row ready for display
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DecoratedPaper {
    #[serde(flatten)]
    pub paper: PaperRecord,

    /// Where the file can be downloaded from
    pub url: String,

    /// `"{subject} {exam_type} {exam_year}"`
    pub original_name: String,
}

/// Maps stored filenames to public download URLs and back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadLocator {
    base: String,
}

impl DownloadLocator {
    /// `base` is the public path files are served under, e.g. `/uploads`
    pub fn new(base: impl AsRef<str>) -> Self {
        let base = base.as_ref().trim_end_matches('/');
        Self {
            base: base.to_string(),
        }
    }

    pub fn url_for(&self, filename: &str) -> String {
        format!("{}/{}", self.base, filename)
    }

    /// Dereference a locator back to the stored filename
    pub fn filename_from<'a>(&self, url: &'a str) -> Option<&'a str> {
        url.strip_prefix(self.base.as_str())?
            .strip_prefix('/')
            .filter(|name| !name.is_empty() && !name.contains('/'))
    }
}

pub struct RetrievalService {
    store: Arc<dyn MetadataStore>,
    locator: DownloadLocator,
}

impl RetrievalService {
    pub fn new(store: Arc<dyn MetadataStore>, locator: DownloadLocator) -> Self {
        Self { store, locator }
    }

    pub fn locator(&self) -> &DownloadLocator {
        &self.locator
    }

    /// Search the catalog; `None` or a blank query lists everything.
    ///
    /// Results are ordered newest exam year first, then by subject.
    pub async fn search(&self, raw: Option<&str>) -> Result<Vec<DecoratedPaper>> {
        let started = Instant::now();
        let filter = compile(raw.unwrap_or_default());

        let rows = self.store.query_papers(&filter).await?;
        let results: Vec<DecoratedPaper> = rows.into_iter().map(|p| self.decorate(p)).collect();

        metrics::record_search(started.elapsed(), filter.terms().len(), results.len());
        debug!(
            terms = ?filter.terms(),
            results = results.len(),
            "Catalog search"
        );

        Ok(results)
    }

    fn decorate(&self, paper: PaperRecord) -> DecoratedPaper {
        DecoratedPaper {
            url: self.locator.url_for(&paper.filename),
            original_name: format!("{} {} {}", paper.subject, paper.exam_type, paper.exam_year),
            paper,
        }
    }
}
