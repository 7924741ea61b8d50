//! TF-IDF (Term Frequency-Inverse Document Frequency) vectorizer.
//!
//! Produces sparse, L2-normalized TF-IDF rows over a dictionary of the
//! `keep_n` tokens with the highest document frequency. It is the first stage
//! of the LSI encoder.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

/// Sparse row: `(feature index, weight)` pairs sorted by index.
pub type SparseRow = Vec<(usize, f32)>;

// Common stop words to filter out
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "can", "her", "was", "one", "our",
    "out", "this", "that", "with", "have", "from", "they", "been", "were", "said", "each",
    "which", "she", "how", "their", "will", "when", "make", "like", "him", "into", "time", "has",
    "look", "is", "it", "to", "of", "in", "on", "at", "as", "be", "by", "an", "or", "if", "so",
    "do", "he", "we", "me", "my", "no", "up", "its", "just", "what", "there", "would", "about",
];

const MIN_TOKEN_LEN: usize = 2;

fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"[\p{L}\p{N}]+").expect("static regex"))
}

fn stop_words() -> &'static HashSet<&'static str> {
    static STOP: OnceLock<HashSet<&'static str>> = OnceLock::new();
    STOP.get_or_init(|| STOP_WORDS.iter().copied().collect())
}

/// Lowercase, split into alphanumeric tokens, drop stop words and tokens
/// shorter than 2 characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowercase = text.to_lowercase();
    token_regex()
        .find_iter(&lowercase)
        .map(|m| m.as_str())
        .filter(|w| {
            w.chars().count() >= MIN_TOKEN_LEN && !stop_words().contains(w)
        })
        .map(str::to_string)
        .collect()
}

/// TF-IDF vectorizer for converting text to numerical features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Word to feature index mapping
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency for each feature
    pub idf: Vec<f64>,
    /// Maximum number of features to keep
    pub max_features: usize,
}

impl TfidfVectorizer {
    pub fn new(max_features: usize) -> Self {
        TfidfVectorizer {
            vocabulary: HashMap::new(),
            idf: Vec::new(),
            max_features,
        }
    }

    pub fn is_fitted(&self) -> bool {
        !self.vocabulary.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Build the vocabulary and IDF table from training documents.
    pub fn fit(&mut self, documents: &[String]) {
        let mut doc_freq: HashMap<String, usize> = HashMap::new();

        for doc in documents {
            let unique_words: HashSet<String> = tokenize(doc).into_iter().collect();
            for word in unique_words {
                *doc_freq.entry(word).or_insert(0) += 1;
            }
        }

        // Top max_features by document frequency, ties broken alphabetically
        let mut ranked: Vec<(&String, &usize)> = doc_freq.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));

        self.vocabulary.clear();
        for (idx, (word, _)) in ranked.iter().take(self.max_features).enumerate() {
            self.vocabulary.insert((*word).clone(), idx);
        }

        self.idf = vec![0.0; self.vocabulary.len()];
        let n_docs = documents.len() as f64;
        for (word, &idx) in &self.vocabulary {
            let df = doc_freq[word] as f64;
            self.idf[idx] = (n_docs / df).ln();
        }
    }

    /// Transform a document into a sparse, L2-normalized TF-IDF row.
    pub fn transform(&self, document: &str) -> SparseRow {
        let mut counts: HashMap<usize, f64> = HashMap::new();
        let mut total = 0.0;
        for word in tokenize(document) {
            if let Some(&idx) = self.vocabulary.get(&word) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
                total += 1.0;
            }
        }
        if total == 0.0 {
            return Vec::new();
        }

        let mut row: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(idx, count)| (idx, count / total * self.idf[idx]))
            .collect();
        row.sort_by_key(|&(idx, _)| idx);

        let norm = row.iter().map(|&(_, x)| x * x).sum::<f64>().sqrt();
        row.into_iter()
            .filter(|&(_, x)| x != 0.0)
            .map(|(idx, x)| (idx, (x / norm) as f32))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_tokenize_filters() {
        assert_eq!(
            tokenize("The QUICK brown fox, is it a fox? x supercalifragilisticexpialidocious"),
            vec!["quick", "brown", "fox", "fox", "supercalifragilisticexpialidocious"]
        );
        assert_eq!(
            tokenize("win 1000 dollars r2d2 mp3 5"),
            vec!["win", "1000", "dollars", "r2d2", "mp3"]
        );
        assert_eq!(tokenize("Grüße aus München"), vec!["grüße", "aus", "münchen"]);
    }

    #[test]
    fn test_vocabulary_keeps_most_frequent() {
        let mut tfidf = TfidfVectorizer::new(2);
        tfidf.fit(&docs(&["apple banana", "apple cherry", "apple banana", "durian"]));

        assert_eq!(tfidf.num_features(), 2);
        assert_eq!(tfidf.vocabulary["apple"], 0);
        assert_eq!(tfidf.vocabulary["banana"], 1);
        assert!(!tfidf.vocabulary.contains_key("durian"));
    }

    #[test]
    fn test_transform_is_normalized() {
        let mut tfidf = TfidfVectorizer::new(100);
        tfidf.fit(&docs(&["spam eggs", "spam ham", "toast"]));

        let row = tfidf.transform("spam eggs eggs");
        let norm: f32 = row.iter().map(|&(_, x)| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert!(row.windows(2).all(|w| w[0].0 < w[1].0));

        assert!(tfidf.transform("nothing known here").is_empty());
    }
}
