//! Markdown header splitting.
//!
//! A document is cut at every `#`, `##`, or `###` header line. Each section keeps its header line
//! and records the active header path as `Header 1`..`Header 3` metadata. Header markers inside
//! fenced code blocks are ordinary content, as are lines indented by four or more spaces.

use super::types::{ChunkMetadata, SplitError};

/// Header markers recognized by the splitter, deepest first, with their metadata keys.
const HEADER_LEVELS: [(&str, &str, usize); 3] = [
    ("###", "Header 3", 3),
    ("##", "Header 2", 2),
    ("#", "Header 1", 1),
];

/// One header-delimited section of a Markdown document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderSection {
    /// Section text, header line included, trimmed.
    pub text: String,
    /// Active header path (`Header 1`..`Header 3`).
    pub headers: ChunkMetadata,
}

#[derive(Debug)]
struct ActiveHeader {
    level: usize,
    key: &'static str,
    title: String,
}

/// Splits Markdown documents on `#`, `##`, and `###` header lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownHeaderSplitter;

impl MarkdownHeaderSplitter {
    /// Split Markdown text into header sections.
    ///
    /// Text before the first header becomes a section without header metadata. Sections that are
    /// blank after trimming are dropped.
    pub fn split(&self, text: &str) -> Result<Vec<HeaderSection>, SplitError> {
        split_by_headers(text)
    }
}

fn split_by_headers(text: &str) -> Result<Vec<HeaderSection>, SplitError> {
    let mut sections = Vec::new();
    let mut stack: Vec<ActiveHeader> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    let mut open_fence: Option<(&str, usize)> = None;

    for (index, line) in text.lines().enumerate() {
        let Some(stripped) = strip_block_indent(line) else {
            current.push(line);
            continue;
        };

        if let Some((fence, _)) = open_fence {
            if stripped.starts_with(fence) {
                open_fence = None;
            }
            current.push(line);
            continue;
        }
        if let Some(fence) = ["```", "~~~"].into_iter().find(|f| stripped.starts_with(f)) {
            open_fence = Some((fence, index + 1));
            current.push(line);
            continue;
        }

        match parse_header(stripped) {
            Some((level, key, title)) => {
                flush(&mut sections, &current, &stack);
                current.clear();
                while stack.last().is_some_and(|header| header.level >= level) {
                    stack.pop();
                }
                stack.push(ActiveHeader {
                    level,
                    key,
                    title: title.to_string(),
                });
                current.push(line);
            }
            None => current.push(line),
        }
    }

    if let Some((_, line)) = open_fence {
        return Err(SplitError::UnterminatedCodeFence { line });
    }
    flush(&mut sections, &current, &stack);
    Ok(sections)
}

/// Drop up to three leading spaces; `None` for indented code lines.
fn strip_block_indent(line: &str) -> Option<&str> {
    let content = line.trim_start_matches(' ');
    if line.len() - content.len() > 3 || content.starts_with('\t') {
        return None;
    }
    Some(content.trim_end())
}

fn parse_header(line: &str) -> Option<(usize, &'static str, &str)> {
    HEADER_LEVELS.iter().find_map(|(marker, key, level)| {
        let rest = line.strip_prefix(marker)?;
        if rest.is_empty() || rest.starts_with(' ') {
            Some((*level, *key, rest.trim()))
        } else {
            None
        }
    })
}

fn flush(sections: &mut Vec<HeaderSection>, lines: &[&str], stack: &[ActiveHeader]) {
    let text = lines.join("\n");
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return;
    }
    let headers = stack
        .iter()
        .map(|header| (header.key.to_string(), header.title.clone()))
        .collect();
    sections.push(HeaderSection {
        text: trimmed.to_string(),
        headers,
    });
}
