//! Turns raw documents into bounded chunks.

use super::chunking::{ChunkingPolicy, RecursiveSplitter};
use super::loader::{DocumentFormat, RawDocument};
use super::markdown::MarkdownHeaderSplitter;
use super::types::{Chunk, ChunkMetadata, SplitError};

/// Metadata key carrying the 1-based PDF page number.
pub const PAGE_KEY: &str = "page";

/// How a document is cut before size-bounded splitting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentStrategy {
    /// Header sections first, then the recursive splitter within each section.
    Markdown,
    /// Recursive splitter over the whole text.
    PlainText,
}

impl SegmentStrategy {
    /// Strategy used for documents of `format`.
    pub const fn for_format(format: DocumentFormat) -> Self {
        match format {
            DocumentFormat::Markdown => Self::Markdown,
            DocumentFormat::Pdf | DocumentFormat::Text => Self::PlainText,
        }
    }
}

/// Chunks produced for one document.
#[derive(Debug, Clone, Default)]
pub struct Segmented {
    /// Chunks in document order.
    pub chunks: Vec<Chunk>,
    /// Set when Markdown splitting failed and the document was split as plain text.
    pub fallback: Option<SplitError>,
}

/// Splits documents according to a [`ChunkingPolicy`].
#[derive(Debug, Clone)]
pub struct Segmenter {
    policy: ChunkingPolicy,
    markdown: MarkdownHeaderSplitter,
}

impl Segmenter {
    /// Build a segmenter for the given policy.
    pub fn new(policy: ChunkingPolicy) -> Self {
        Self {
            policy,
            markdown: MarkdownHeaderSplitter,
        }
    }

    /// Policy in effect.
    pub fn policy(&self) -> &ChunkingPolicy {
        &self.policy
    }

    /// Segment a single document. Never fails: Markdown errors degrade to plain-text splitting.
    pub fn segment(&self, document: &RawDocument) -> Segmented {
        let base = base_metadata(document);
        match SegmentStrategy::for_format(document.format) {
            SegmentStrategy::PlainText => Segmented {
                chunks: self.split_plain(&document.content, &base),
                fallback: None,
            },
            SegmentStrategy::Markdown => match self.markdown.split(&document.content) {
                Ok(sections) => {
                    let splitter = RecursiveSplitter::new(&self.policy);
                    let chunks = sections
                        .into_iter()
                        .flat_map(|section| {
                            let mut metadata = base.clone();
                            metadata.extend(section.headers);
                            splitter
                                .split(&section.text)
                                .into_iter()
                                .map(move |text| Chunk::new(text, metadata.clone()))
                        })
                        .collect();
                    Segmented {
                        chunks,
                        fallback: None,
                    }
                }
                Err(error) => {
                    tracing::warn!(
                        path = %document.source_path.display(),
                        error = %error,
                        "Markdown header split failed; falling back to plain text"
                    );
                    Segmented {
                        chunks: self.split_plain(&document.content, &base),
                        fallback: Some(error),
                    }
                }
            },
        }
    }

    fn split_plain(&self, text: &str, base: &ChunkMetadata) -> Vec<Chunk> {
        RecursiveSplitter::new(&self.policy)
            .split(text)
            .into_iter()
            .map(|text| Chunk::new(text, base.clone()))
            .collect()
    }
}

fn base_metadata(document: &RawDocument) -> ChunkMetadata {
    let mut metadata = ChunkMetadata::new();
    if let Some(page) = document.page {
        metadata.insert(PAGE_KEY.to_string(), page.to_string());
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn document(content: &str, format: DocumentFormat, page: Option<u32>) -> RawDocument {
        RawDocument {
            content: content.to_string(),
            source_path: PathBuf::from("data/profile.md"),
            format,
            page,
        }
    }

    #[test]
    fn markdown_sections_become_separate_chunks() {
        let segmenter = Segmenter::new(ChunkingPolicy::startup());
        let doc = document(
            "## Experience\nBuilt data platforms.\n\n## Skills\nRust and Python.",
            DocumentFormat::Markdown,
            None,
        );
        let segmented = segmenter.segment(&doc);
        assert!(segmented.fallback.is_none());
        assert_eq!(segmented.chunks.len(), 2);
        assert_eq!(segmented.chunks[0].metadata["Header 2"], "Experience");
        assert_eq!(segmented.chunks[1].metadata["Header 2"], "Skills");
        assert!(segmented.chunks[1].text.starts_with("## Skills"));
    }

    #[test]
    fn unterminated_fence_falls_back_to_plain_text() {
        let segmenter = Segmenter::new(ChunkingPolicy::startup());
        let doc = document("## Code\n```\nlet x = 1;", DocumentFormat::Markdown, None);
        let segmented = segmenter.segment(&doc);
        assert_eq!(
            segmented.fallback,
            Some(SplitError::UnterminatedCodeFence { line: 2 })
        );
        assert_eq!(segmented.chunks.len(), 1);
        assert!(!segmented.chunks[0].metadata.contains_key("Header 2"));
    }

    #[test]
    fn pdf_pages_carry_page_metadata() {
        let segmenter = Segmenter::new(ChunkingPolicy::on_demand());
        let doc = document("Page three text", DocumentFormat::Pdf, Some(3));
        let segmented = segmenter.segment(&doc);
        assert_eq!(segmented.chunks.len(), 1);
        assert_eq!(segmented.chunks[0].metadata[PAGE_KEY], "3");
    }

    #[test]
    fn blank_documents_produce_no_chunks() {
        let segmenter = Segmenter::new(ChunkingPolicy::on_demand());
        let segmented = segmenter.segment(&document(" \n\n ", DocumentFormat::Text, None));
        assert!(segmented.chunks.is_empty());
    }

    #[test]
    fn long_sections_are_split_within_the_section() {
        let policy = ChunkingPolicy::new(30, 0).expect("policy");
        let segmenter = Segmenter::new(policy);
        let body = "alpha beta gamma delta epsilon zeta eta theta iota kappa";
        let doc = document(&format!("# Notes\n{body}"), DocumentFormat::Markdown, None);
        let segmented = segmenter.segment(&doc);
        assert!(segmented.chunks.len() > 1);
        for chunk in &segmented.chunks {
            assert_eq!(chunk.metadata["Header 1"], "Notes");
            assert!(chunk.text.chars().count() <= 30);
        }
    }
}
