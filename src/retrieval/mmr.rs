//! Maximal Marginal Relevance selection.
//!
//! `score = λ × relevance(query, candidate) - (1 - λ) × max(similarity(candidate, selected))`
//!
//! λ = 1.0 keeps store order (pure relevance), λ = 0.0 maximises diversity. Relevance is the
//! score the vector store returned for the candidate; candidate-to-candidate similarity is cosine
//! over the returned vectors.

/// Cosine similarity of two vectors; zero when either has zero magnitude or lengths differ.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Candidate relevance and vector as seen by [`select`].
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    /// Similarity to the query reported by the store.
    pub relevance: f32,
    /// Candidate embedding.
    pub vector: &'a [f32],
}

/// Pick up to `k` candidate indices in MMR order.
///
/// `candidates` must be in store order; on equal MMR scores the earlier candidate wins.
pub fn select(candidates: &[Candidate<'_>], k: usize, lambda: f32) -> Vec<usize> {
    let k = k.min(candidates.len());
    let mut selected: Vec<usize> = Vec::with_capacity(k);
    let mut remaining: Vec<usize> = (0..candidates.len()).collect();

    while selected.len() < k {
        let mut best: Option<(usize, f32)> = None;
        for (slot, &index) in remaining.iter().enumerate() {
            let candidate = &candidates[index];
            let redundancy = selected
                .iter()
                .map(|&chosen| cosine_similarity(candidate.vector, candidates[chosen].vector))
                .fold(None, |max: Option<f32>, value| {
                    Some(max.map_or(value, |current| current.max(value)))
                })
                .unwrap_or(0.0);
            let score = lambda * candidate.relevance - (1.0 - lambda) * redundancy;
            if best.is_none_or(|(_, best_score)| score > best_score) {
                best = Some((slot, score));
            }
        }
        let Some((slot, _)) = best else {
            break;
        };
        selected.push(remaining.remove(slot));
    }

    selected
}
