//! Size-bounded recursive character splitting.
//!
//! Highlights:
//!
//! - Separators are tried in priority order (paragraph, line, sentence, word, character). Text is
//!   split on the first separator it contains; pieces that still exceed `chunk_size` recurse with
//!   the remaining separators.
//! - Small pieces are merged greedily back up to `chunk_size`, so chunks are as large as the
//!   budget allows without cutting through a higher-priority boundary.
//! - Overlap: chunk *n+1* is prefixed with the tail of chunk *n* so that spans around boundaries
//!   stay visible to retrieval.
//! - Every length is a count of Unicode scalar values; slicing never splits a `char`.

use super::types::ChunkingError;

/// Separators tried in order: paragraph break, line break, sentence break, space, character.
pub const DEFAULT_SEPARATORS: [&str; 5] = ["\n\n", "\n", ". ", " ", ""];

/// Size budget and separator priority for one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkingPolicy {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl ChunkingPolicy {
    /// Build a policy with the default separators.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, ChunkingError> {
        Self::with_separators(
            chunk_size,
            chunk_overlap,
            DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        )
    }

    /// Build a policy with a custom separator priority list.
    pub fn with_separators(
        chunk_size: usize,
        chunk_overlap: usize,
        separators: Vec<String>,
    ) -> Result<Self, ChunkingError> {
        if chunk_size == 0 {
            return Err(ChunkingError::InvalidChunkSize);
        }
        if chunk_overlap >= chunk_size {
            return Err(ChunkingError::OverlapTooLarge {
                overlap: chunk_overlap,
                chunk_size,
            });
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            separators,
        })
    }

    /// Policy used when the corpus is ingested at startup (400 characters, 100 overlap).
    pub fn startup() -> Self {
        Self {
            chunk_size: 400,
            chunk_overlap: 100,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Policy used for on-demand ingestion (100 characters, 25 overlap).
    pub fn on_demand() -> Self {
        Self {
            chunk_size: 100,
            chunk_overlap: 25,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Maximum characters per base chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Characters carried over from the previous chunk.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Separators in priority order.
    pub fn separators(&self) -> &[String] {
        &self.separators
    }
}

/// Recursive character splitter bound to one [`ChunkingPolicy`].
#[derive(Debug, Clone)]
pub struct RecursiveSplitter<'a> {
    policy: &'a ChunkingPolicy,
}

impl<'a> RecursiveSplitter<'a> {
    /// Create a splitter for `policy`.
    pub fn new(policy: &'a ChunkingPolicy) -> Self {
        Self { policy }
    }

    /// Split `text` into ordered, overlapping chunks.
    ///
    /// Whitespace-only text yields nothing; text within the size budget is returned unchanged as
    /// a single chunk.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }
        if char_len(text) <= self.policy.chunk_size {
            return vec![text.to_string()];
        }
        let base = self.split_base(text);
        apply_overlap(base, self.policy.chunk_overlap)
    }

    /// Split without overlap; every returned chunk is at most `chunk_size` characters.
    pub fn split_base(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.policy.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let (separator, remaining) = pick_separator(text, separators);
        let pieces = split_keeping_separator(text, separator);

        let mut chunks = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) <= self.policy.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                chunks.extend(self.merge(&pending));
                pending.clear();
            }
            if remaining.is_empty() {
                chunks.extend(hard_wrap(piece, self.policy.chunk_size));
            } else {
                chunks.extend(self.split_recursive(piece, remaining));
            }
        }
        if !pending.is_empty() {
            chunks.extend(self.merge(&pending));
        }
        chunks
    }

    /// Greedily concatenate pieces while the trimmed result stays within budget.
    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut merged = Vec::new();
        let mut current = String::new();
        let mut current_len = 0;

        for piece in pieces {
            let piece_len = char_len(piece);
            if current_len + piece_len > self.policy.chunk_size && current_len > 0 {
                push_trimmed(&mut merged, &current);
                current.clear();
                current_len = 0;
            }
            current.push_str(piece);
            current_len += piece_len;
        }
        push_trimmed(&mut merged, &current);
        merged
    }
}

/// Prefix each chunk with the tail of its predecessor.
///
/// The carried tail is `min(overlap, chars(previous) - 1)` characters of the previous base
/// chunk, so chunk *n*'s suffix and chunk *n+1*'s prefix are byte-identical.
pub(crate) fn apply_overlap(chunks: Vec<String>, overlap: usize) -> Vec<String> {
    if overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;
    for current in chunks {
        match &previous {
            Some(prev) => {
                let take = overlap.min(char_len(prev).saturating_sub(1));
                let tail = char_suffix(prev, take);
                let mut combined = String::with_capacity(tail.len() + current.len());
                combined.push_str(tail);
                combined.push_str(&current);
                overlapped.push(combined);
            }
            None => overlapped.push(current.clone()),
        }
        previous = Some(current);
    }
    overlapped
}

fn pick_separator<'s>(text: &str, separators: &'s [String]) -> (&'s str, &'s [String]) {
    for (index, separator) in separators.iter().enumerate() {
        if separator.is_empty() {
            return ("", &[]);
        }
        if text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[index + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, attaching each separator to the start of the piece that follows it.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(start, ch)| &text[start..start + ch.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (index, _) in text.match_indices(separator) {
        if index > start {
            pieces.push(&text[start..index]);
        }
        start = index;
    }
    if start < text.len() {
        pieces.push(&text[start..]);
    }
    pieces
}

/// Last-resort split into fixed windows when no separator remains.
fn hard_wrap(text: &str, chunk_size: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(chunk_size)
        .map(|window| window.iter().collect::<String>())
        .filter(|chunk| !chunk.trim().is_empty())
        .collect()
}

fn push_trimmed(target: &mut Vec<String>, text: &str) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        target.push(trimmed.to_string());
    }
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn char_suffix(text: &str, count: usize) -> &str {
    if count == 0 {
        return "";
    }
    match text.char_indices().rev().nth(count - 1) {
        Some((start, _)) => &text[start..],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy(size: usize, overlap: usize) -> ChunkingPolicy {
        ChunkingPolicy::new(size, overlap).expect("valid policy")
    }

    #[test]
    fn policy_rejects_overlap_not_smaller_than_size() {
        assert_eq!(
            ChunkingPolicy::new(10, 10),
            Err(ChunkingError::OverlapTooLarge {
                overlap: 10,
                chunk_size: 10
            })
        );
        assert_eq!(ChunkingPolicy::new(0, 0), Err(ChunkingError::InvalidChunkSize));
        assert!(ChunkingPolicy::new(10, 9).is_ok());
    }

    #[test]
    fn presets_match_startup_and_on_demand_budgets() {
        let startup = ChunkingPolicy::startup();
        assert_eq!((startup.chunk_size(), startup.chunk_overlap()), (400, 100));
        let on_demand = ChunkingPolicy::on_demand();
        assert_eq!((on_demand.chunk_size(), on_demand.chunk_overlap()), (100, 25));
    }

    #[test]
    fn short_text_is_returned_verbatim() {
        let policy = policy(50, 10);
        let text = "  Diego builds data tools.\n";
        assert_eq!(RecursiveSplitter::new(&policy).split(text), vec![text.to_string()]);
    }

    #[test]
    fn whitespace_only_text_yields_nothing() {
        let policy = policy(50, 10);
        assert!(RecursiveSplitter::new(&policy).split(" \n\n\t ").is_empty());
        assert!(RecursiveSplitter::new(&policy).split("").is_empty());
    }

    #[test]
    fn prefers_paragraph_boundaries() {
        let policy = policy(30, 0);
        let text = "First paragraph here.\n\nSecond paragraph here.\n\nThird one.";
        let chunks = RecursiveSplitter::new(&policy).split(text);
        assert_eq!(
            chunks,
            vec![
                "First paragraph here.",
                "Second paragraph here.",
                "Third one."
            ]
        );
    }

    #[test]
    fn merges_small_pieces_up_to_budget() {
        let policy = policy(11, 0);
        let chunks = RecursiveSplitter::new(&policy).split("one two three four five");
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn base_chunks_never_exceed_chunk_size() {
        let policy = policy(16, 4);
        let text = "Rust, Python and TypeScript.\nBuilt APIs with FastAPI and Axum. \
                    Supercalifragilisticexpialidocious words get hard wrapped.\n\nDone.";
        let splitter = RecursiveSplitter::new(&policy);
        let base = splitter.split_base(text);
        assert!(base.len() > 1);
        for chunk in &base {
            assert!(char_len(chunk) <= 16, "chunk too long: {chunk:?}");
        }
    }

    #[test]
    fn overlap_suffix_matches_next_prefix() {
        let policy = policy(20, 5);
        let text = "alpha beta gamma delta epsilon zeta eta theta iota kappa lambda mu";
        let splitter = RecursiveSplitter::new(&policy);
        let base = splitter.split_base(text);
        let chunks = splitter.split(text);
        assert_eq!(chunks.len(), base.len());
        assert_eq!(chunks[0], base[0]);

        for (index, pair) in chunks.windows(2).enumerate() {
            let carried = 5.min(char_len(&base[index]) - 1);
            let suffix = char_suffix(&pair[0], carried);
            assert!(pair[1].starts_with(suffix), "{pair:?}");
            assert!(char_len(&pair[1]) <= 20 + 5);
        }
    }

    #[test]
    fn overlap_is_capped_below_previous_chunk_length() {
        let chunks = apply_overlap(vec!["ab".into(), "cd".into()], 10);
        assert_eq!(chunks, vec!["ab", "bcd"]);
    }

    #[test]
    fn splitting_respects_multibyte_characters() {
        let policy = policy(4, 1);
        let chunks = RecursiveSplitter::new(&policy).split("héllo wörld ñandú");
        assert!(!chunks.is_empty());
        for chunk in RecursiveSplitter::new(&policy).split_base("héllo wörld ñandú") {
            assert!(char_len(&chunk) <= 4);
        }
    }

    #[test]
    fn separator_is_attached_to_following_piece() {
        assert_eq!(
            split_keeping_separator("a. b. c", ". "),
            vec!["a", ". b", ". c"]
        );
        assert_eq!(split_keeping_separator("\n\nx", "\n\n"), vec!["\n\nx"]);
    }
}
