//! Corpus discovery and per-format document loading.

use crate::processing::types::{IngestError, LoadError};
use std::fmt;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Document formats accepted by the loader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentFormat {
    /// PDF, loaded one document per page.
    Pdf,
    /// Plain UTF-8 text.
    Text,
    /// Markdown, split by headers before size-bounded splitting.
    Markdown,
}

impl DocumentFormat {
    /// Formats in the order the loader processes them.
    pub const ALL: [DocumentFormat; 3] = [Self::Pdf, Self::Text, Self::Markdown];

    /// File extension (without the dot) associated with the format.
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Text => "txt",
            Self::Markdown => "md",
        }
    }

    /// Resolve the format of a path from its extension, case-insensitively.
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == extension)
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Pdf => "pdf",
            Self::Text => "text",
            Self::Markdown => "markdown",
        };
        f.write_str(label)
    }
}

/// Document content as read from disk, before segmentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// Full text content (one page for PDFs).
    pub content: String,
    /// Path of the originating file.
    pub source_path: PathBuf,
    /// Detected format.
    pub format: DocumentFormat,
    /// 1-based page number for PDF documents.
    pub page: Option<u32>,
}

/// Documents discovered under a corpus root plus the files that could not be read.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Successfully loaded documents, grouped by format in load order.
    pub documents: Vec<RawDocument>,
    /// Files skipped because their loader failed.
    pub failures: Vec<LoadError>,
}

/// Load every supported document below `root`.
///
/// Fails only when `root` is missing or not a directory. Individual files that cannot be read are
/// recorded in [`LoadReport::failures`] and skipped; an empty report is a valid outcome.
pub fn load_corpus(root: &Path) -> Result<LoadReport, IngestError> {
    if !root.is_dir() {
        return Err(IngestError::CorpusNotFound(root.to_path_buf()));
    }

    let files = discover_files(root);
    let mut report = LoadReport::default();

    for format in DocumentFormat::ALL {
        let paths: Vec<&PathBuf> = files
            .iter()
            .filter(|(candidate, _)| *candidate == format)
            .map(|(_, path)| path)
            .collect();
        if paths.is_empty() {
            tracing::debug!(%format, root = %root.display(), "No documents found for format");
            continue;
        }

        let before = report.documents.len();
        for path in paths {
            match load_file(path, format) {
                Ok(documents) => report.documents.extend(documents),
                Err(message) => {
                    let error = LoadError {
                        format,
                        path: path.clone(),
                        message,
                    };
                    tracing::warn!(error = %error, "Skipping unreadable document");
                    report.failures.push(error);
                }
            }
        }
        tracing::info!(
            %format,
            documents = report.documents.len() - before,
            "Loaded documents"
        );
    }

    Ok(report)
}

fn discover_files(root: &Path) -> Vec<(DocumentFormat, PathBuf)> {
    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(error = %error, "Failed to read corpus entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter_map(|entry| {
            DocumentFormat::from_path(entry.path()).map(|format| (format, entry.into_path()))
        })
        .collect()
}

fn load_file(path: &Path, format: DocumentFormat) -> Result<Vec<RawDocument>, String> {
    match format {
        DocumentFormat::Pdf => load_pdf(path),
        DocumentFormat::Text | DocumentFormat::Markdown => {
            let content = fs::read_to_string(path).map_err(|error| error.to_string())?;
            Ok(vec![RawDocument {
                content,
                source_path: path.to_path_buf(),
                format,
                page: None,
            }])
        }
    }
}

fn load_pdf(path: &Path) -> Result<Vec<RawDocument>, String> {
    // pdf-extract panics on some malformed files; contain it to this document.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)))
        .map_err(|_| "PDF parser panicked on malformed input".to_string())?
        .map_err(|error| error.to_string())?;

    Ok(pages
        .into_iter()
        .enumerate()
        .map(|(index, content)| RawDocument {
            content,
            source_path: path.to_path_buf(),
            format: DocumentFormat::Pdf,
            page: u32::try_from(index + 1).ok(),
        })
        .collect())
}
