//! Deterministic character-trigram embeddings.
//!
//! Content-dependent and fully offline: no model download, no network. The
//! same text always yields the same unit vector, which keeps the local
//! knowledge base reproducible across runs.

use std::collections::{HashMap, HashSet};

/// Default embedding width.
pub const DEFAULT_DIMENSIONS: usize = 384;

const STOP_WORDS: &[&str] = &[
    "the", "is", "at", "which", "on", "a", "an", "as", "are", "was", "were", "for", "to", "of",
    "in", "and", "or", "but", "with", "by", "from", "this", "that", "be", "have", "has", "had",
    "it", "its", "their", "they", "them", "what", "how", "does", "why",
];

#[derive(Debug, Clone)]
pub struct TrigramEmbedder {
    dimensions: usize,
}

impl Default for TrigramEmbedder {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl TrigramEmbedder {
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
        }
    }

    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Embed `text` as a unit vector (all zeros when nothing is left after
    /// stop-word filtering).
    pub fn embed(&self, text: &str) -> Vec<f32> {
        let mut embedding = vec![0.0f32; self.dimensions];
        let stop_words: HashSet<&str> = STOP_WORDS.iter().copied().collect();

        let lower = text.to_lowercase();
        let mut word_freq: HashMap<&str, u32> = HashMap::new();
        for word in lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| w.chars().count() > 2 && !stop_words.contains(w))
        {
            *word_freq.entry(word).or_insert(0) += 1;
        }

        for (word, freq) in &word_freq {
            let chars: Vec<char> = word.chars().collect();
            for window in chars.windows(3) {
                let trigram: String = window.iter().collect();
                let index = (hash(&trigram, 37) as usize) % self.dimensions;
                embedding[index] += (*freq as f32).sqrt();
            }

            let index = (hash(word, 31) as usize) % self.dimensions;
            embedding[index] += *freq as f32;
        }

        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut embedding {
                *value /= norm;
            }
        }
        embedding
    }
}

fn hash(text: &str, multiplier: u64) -> u64 {
    text.bytes()
        .fold(0u64, |acc, b| acc.wrapping_mul(multiplier).wrapping_add(b as u64))
}

/// Cosine similarity; 0.0 for mismatched lengths or zero vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_unit_length_and_deterministic() {
        let embedder = TrigramEmbedder::default();
        let first = embedder.embed("Rust ownership and borrowing rules");
        let second = embedder.embed("Rust ownership and borrowing rules");

        assert_eq!(first.len(), DEFAULT_DIMENSIONS);
        assert_eq!(first, second);
        let norm: f32 = first.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_stop_words_only_gives_zero_vector() {
        let embedding = TrigramEmbedder::new(64).embed("the and of it");
        assert!(embedding.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_related_text_scores_higher() {
        let embedder = TrigramEmbedder::default();
        let query = embedder.embed("borrow checker ownership");
        let related = embedder.embed("The borrow checker enforces ownership rules at compile time.");
        let unrelated = embedder.embed("Sourdough bread needs a long fermentation.");

        assert!(cosine_similarity(&query, &related) > cosine_similarity(&query, &unrelated));
    }

    #[test]
    fn test_cosine_edge_cases() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 2.0], &[1.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_utf8_text() {
        let embedding = TrigramEmbedder::default().embed("Gamedex é um aplicativo brasileiro 🎮");
        let norm: f32 = embedding.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 0.001);
    }
}
