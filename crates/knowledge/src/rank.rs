//! Similarity ranking.
//!
//! Pure functions only; embedding work happens in [`crate::retrieval`].

use crate::types::{Document, Match};
use kbase_core::RetrievalSettings;
use std::cmp::Ordering;

/// Denominator floor for cosine similarity.
const EPSILON: f32 = 1e-8;

/// Cosine similarity of two vectors.
///
/// Returns 0.0 when either vector has zero magnitude or the lengths differ.
/// The result is symmetric in its arguments.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = (norm_a.sqrt() * norm_b.sqrt()).max(EPSILON);
    (dot / denom).clamp(-1.0, 1.0)
}

/// The leading slice of `content` that is fed to the embedder.
pub fn embedding_input(content: &str, max_chars: usize) -> &str {
    match content.char_indices().nth(max_chars) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// Whether a document is long enough to ground an answer.
pub fn is_candidate(document: &Document, settings: &RetrievalSettings) -> bool {
    document.content.chars().count() >= settings.min_content_chars
}

/// Rank candidates against a query vector.
///
/// Short documents are dropped, then every match must score strictly above
/// `min_similarity`. Ties on similarity go to the newest document; full
/// ties keep candidate order, which the store yields newest insertion
/// first. At most `top_k` matches are returned.
pub fn rank(
    query: &[f32],
    candidates: impl IntoIterator<Item = (Document, Vec<f32>)>,
    settings: &RetrievalSettings,
) -> Vec<Match> {
    let mut matches: Vec<Match> = candidates
        .into_iter()
        .filter(|(document, _)| is_candidate(document, settings))
        .filter_map(|(document, vector)| {
            let similarity = cosine_similarity(query, &vector);
            tracing::debug!(doc_id = %document.id, similarity, "Scored candidate");
            (similarity > settings.min_similarity).then_some(Match {
                document,
                similarity,
            })
        })
        .collect();

    matches.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.document.created_at.cmp(&a.document.created_at))
    });
    matches.truncate(settings.top_k);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEFAULT_TITLE;
    use chrono::{Duration, TimeZone, Utc};

    const LONG: &str = "Refunds are issued within 30 days of purchase.";

    fn doc(id: &str, content: &str, age_minutes: i64) -> Document {
        let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        Document {
            id: id.to_string(),
            title: DEFAULT_TITLE.to_string(),
            content: content.to_string(),
            content_truncated: false,
            embedding: None,
            embedding_model: None,
            file_ref: None,
            file_kind: None,
            owner_id: "admin-1".to_string(),
            created_at: base - Duration::minutes(age_minutes),
        }
    }

    #[test]
    fn test_cosine_identical_and_opposite() {
        assert!((cosine_similarity(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0]) - 1.0).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
    }

    #[test]
    fn test_cosine_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_length_mismatch() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_cosine_is_symmetric() {
        let pairs: [(&[f32], &[f32]); 3] = [
            (&[0.3, -0.2, 0.9], &[0.1, 0.5, -0.4]),
            (&[1.0, 1.0], &[2.0, -7.5]),
            (&[0.0, 0.0, 1.0], &[0.4, 0.4, 0.2]),
        ];
        for (a, b) in pairs {
            assert_eq!(cosine_similarity(a, b), cosine_similarity(b, a));
        }
    }

    #[test]
    fn test_embedding_input_is_char_safe() {
        let content = "é".repeat(2000);
        let slice = embedding_input(&content, 1800);
        assert_eq!(slice.chars().count(), 1800);
        assert_eq!(embedding_input("short", 1800), "short");
    }

    #[test]
    fn test_short_documents_never_rank() {
        let settings = RetrievalSettings::default();
        let short = "Too short to ground anything";
        assert!(short.chars().count() < 30);

        let ranked = rank(
            &[1.0, 0.0],
            vec![(doc("short", short, 0), vec![1.0, 0.0])],
            &settings,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_threshold_is_strict() {
        let settings = RetrievalSettings {
            min_similarity: 1.0,
            ..Default::default()
        };

        let ranked = rank(
            &[1.0, 0.0],
            vec![(doc("edge", LONG, 0), vec![1.0, 0.0])],
            &settings,
        );
        assert!(ranked.is_empty());
    }

    #[test]
    fn test_rank_orders_and_truncates() {
        let settings = RetrievalSettings::default();
        let candidates = vec![
            (doc("a", LONG, 0), vec![0.6, 0.8]),
            (doc("b", LONG, 0), vec![1.0, 0.0]),
            (doc("c", LONG, 0), vec![0.9, 0.1]),
            (doc("d", LONG, 0), vec![0.7, 0.7]),
            (doc("e", LONG, 0), vec![0.8, 0.3]),
            (doc("f", LONG, 0), vec![0.0, 1.0]),
        ];

        let ranked = rank(&[1.0, 0.0], candidates, &settings);
        assert_eq!(ranked.len(), 4);
        for pair in ranked.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
        assert_eq!(ranked[0].document.id, "b");
        assert!(ranked.iter().all(|m| m.document.id != "f"));
    }

    #[test]
    fn test_ties_prefer_newest_document() {
        let settings = RetrievalSettings::default();
        let candidates = vec![
            (doc("older", LONG, 60), vec![1.0, 0.0]),
            (doc("newest", LONG, 0), vec![1.0, 0.0]),
            (doc("middle", LONG, 30), vec![1.0, 0.0]),
        ];

        let ids: Vec<String> = rank(&[1.0, 0.0], candidates, &settings)
            .into_iter()
            .map(|m| m.document.id)
            .collect();
        assert_eq!(ids, vec!["newest", "middle", "older"]);
    }

    #[test]
    fn test_same_timestamp_keeps_candidate_order() {
        let settings = RetrievalSettings::default();
        let candidates = vec![
            (doc("zz-inserted-last", LONG, 0), vec![1.0, 0.0]),
            (doc("aa-inserted-first", LONG, 0), vec![1.0, 0.0]),
        ];

        let ids: Vec<String> = rank(&[1.0, 0.0], candidates, &settings)
            .into_iter()
            .map(|m| m.document.id)
            .collect();
        assert_eq!(ids, vec!["zz-inserted-last", "aa-inserted-first"]);
    }

    #[test]
    fn test_empty_candidates() {
        assert!(rank(&[1.0], Vec::new(), &RetrievalSettings::default()).is_empty());
    }
}
