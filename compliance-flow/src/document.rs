use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};

use crate::error::{FlowError, Result};

/// The media kinds accepted at the upload boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    PlainText,
    Markdown,
    Pdf,
}

impl MediaKind {
    /// Resolve the kind from the declared media type, falling back to the
    /// file extension. Returns `None` for anything outside the allow-list.
    pub fn detect(name: &str, declared_type: Option<&str>) -> Option<Self> {
        let declared = declared_type
            .map(|t| t.split(';').next().unwrap_or("").trim().to_ascii_lowercase())
            .unwrap_or_default();

        match declared.as_str() {
            "text/plain" => return Some(MediaKind::PlainText),
            "text/markdown" | "text/x-markdown" => return Some(MediaKind::Markdown),
            "application/pdf" => return Some(MediaKind::Pdf),
            _ => {}
        }

        let extension = name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())?;
        match extension.as_str() {
            "txt" => Some(MediaKind::PlainText),
            "md" | "markdown" => Some(MediaKind::Markdown),
            "pdf" => Some(MediaKind::Pdf),
            _ => None,
        }
    }
}

/// A file as received from the client, before the allow-list check.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    pub name: String,
    pub media_type: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct UploadedDocument {
    pub name: String,
    pub kind: MediaKind,
    pub bytes: Vec<u8>,
}

/// Outcome of one upload, reported by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntakeReport {
    pub accepted: Vec<String>,
    pub duplicates: Vec<String>,
    pub rejected: Vec<String>,
}

impl IntakeReport {
    pub fn rejection(&self) -> Option<FlowError> {
        if self.rejected.is_empty() {
            return None;
        }
        Some(FlowError::UnsupportedMediaType(self.rejected.join(", ")))
    }

    pub fn rejection_message(&self) -> Option<String> {
        self.rejection().map(|err| err.to_string())
    }

    pub fn changed(&self) -> bool {
        !self.accepted.is_empty()
    }
}

/// Ordered set of uploaded documents keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct DocumentSet {
    documents: Vec<UploadedDocument>,
}

impl DocumentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept the allowed subset of `files`. The first upload of a name wins;
    /// later files with the same name are reported as duplicates.
    pub fn intake(&mut self, files: Vec<IncomingFile>) -> IntakeReport {
        let mut report = IntakeReport::default();
        let mut seen: HashSet<String> = self.documents.iter().map(|d| d.name.clone()).collect();

        for file in files {
            let Some(kind) = MediaKind::detect(&file.name, file.media_type.as_deref()) else {
                warn!(document = %file.name, "Rejected file with unsupported media type");
                report.rejected.push(file.name);
                continue;
            };

            if !seen.insert(file.name.clone()) {
                info!(document = %file.name, "Skipping duplicate upload");
                report.duplicates.push(file.name);
                continue;
            }

            report.accepted.push(file.name.clone());
            self.documents.push(UploadedDocument {
                name: file.name,
                kind,
                bytes: file.bytes,
            });
        }

        report
    }

    pub fn remove(&mut self, name: &str) -> bool {
        let before = self.documents.len();
        self.documents.retain(|d| d.name != name);
        before != self.documents.len()
    }

    pub fn clear(&mut self) {
        self.documents.clear();
    }

    pub fn get(&self, name: &str) -> Option<&UploadedDocument> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.documents.iter().map(|d| d.name.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UploadedDocument> {
        self.documents.iter()
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Every document except `name`, in upload order.
    pub fn others(&self, name: &str) -> Vec<UploadedDocument> {
        self.documents
            .iter()
            .filter(|d| d.name != name)
            .cloned()
            .collect()
    }

    pub fn to_vec(&self) -> Vec<UploadedDocument> {
        self.documents.clone()
    }
}

/// A document's plain-text content, ready for preprocessing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedDocument {
    pub name: String,
    pub text: String,
}

/// Produce the plain text of an uploaded document.
///
/// Text and markdown are decoded as UTF-8 (lossy). PDFs are extracted page by
/// page on a blocking thread; every page is followed by a blank line.
pub async fn load_text(document: &UploadedDocument) -> Result<String> {
    match document.kind {
        MediaKind::PlainText | MediaKind::Markdown => {
            Ok(String::from_utf8_lossy(&document.bytes).into_owned())
        }
        MediaKind::Pdf => {
            let bytes = document.bytes.clone();
            let name = document.name.clone();
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
            })
            .await
            .map_err(|e| FlowError::DocumentRead {
                name: name.clone(),
                reason: format!("extraction task panicked: {}", e),
            })?
            .map_err(|e| FlowError::DocumentRead {
                name: name.clone(),
                reason: e.to_string(),
            })?;

            info!(document = %name, pages = pages.len(), "Extracted text from PDF");

            let mut text = String::new();
            for page in pages {
                text.push_str(&page);
                text.push_str("\n\n");
            }
            Ok(text)
        }
    }
}

pub async fn load_all(documents: &[UploadedDocument]) -> Result<Vec<LoadedDocument>> {
    let reads = documents.iter().map(|doc| async move {
        load_text(doc).await.map(|text| LoadedDocument {
            name: doc.name.clone(),
            text,
        })
    });
    futures::future::try_join_all(reads).await
}
