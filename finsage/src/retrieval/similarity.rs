//! Cosine-similarity scoring and stable relevance ranking.

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched lengths or a zero-norm side. That is policy,
/// not an oversight: dirty data degrades retrieval gracefully instead of
/// aborting the whole turn.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Scores every candidate against the query and orders by descending score.
///
/// The sort is stable: candidates with equal scores keep their input order,
/// which keeps retrieval deterministic for tests.
pub fn rank_by_similarity<T>(query: &[f32], candidates: Vec<(T, Vec<f32>)>) -> Vec<(T, f32)> {
    let mut scored: Vec<(T, f32)> = candidates
        .into_iter()
        .map(|(item, vector)| {
            let score = cosine_similarity(query, &vector);
            (item, score)
        })
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored
}

/// Drops entries below `threshold`, then truncates to `top_k`.
/// Expects input already ranked by [`rank_by_similarity`].
pub fn filter_ranked<T>(ranked: Vec<(T, f32)>, threshold: f32, top_k: usize) -> Vec<(T, f32)> {
    let mut kept: Vec<(T, f32)> = ranked
        .into_iter()
        .filter(|(_, score)| *score >= threshold)
        .collect();
    kept.truncate(top_k);
    kept
}
