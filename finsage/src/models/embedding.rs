//! Embedding vectors and their at-rest string form.
//!
//! Vectors cross storage and transport boundaries as a bracketed
//! comma-separated string (`"[v1,v2,...,vn]"`), the pgvector text format.

use crate::error::{FinsageError, Result};

/// A stored embedding column as read back from a domain record.
///
/// Parsing failures are explicit states here rather than silent type
/// assertions: `Raw` holds the string exactly as stored, and callers decide
/// what a failed parse means for them.
#[derive(Debug, Clone, PartialEq)]
pub enum StoredEmbedding {
    /// The record has not been embedded yet.
    Absent,
    /// The stored wire string, not yet parsed.
    Raw(String),
    /// A ready-to-use vector.
    Parsed(Vec<f32>),
}

impl StoredEmbedding {
    /// Resolves to a numeric vector, parsing `Raw` on the fly.
    /// `Absent` resolves to `Ok(None)`; an unparseable `Raw` is an error.
    pub fn resolve(&self) -> Result<Option<Vec<f32>>> {
        match self {
            StoredEmbedding::Absent => Ok(None),
            StoredEmbedding::Parsed(vector) => Ok(Some(vector.clone())),
            StoredEmbedding::Raw(raw) => parse_embedding(raw).map(Some),
        }
    }
}

/// Serializes a vector as `"[v1,v2,...,vn]"`.
pub fn format_embedding(vector: &[f32]) -> String {
    let parts: Vec<String> = vector.iter().map(|v| v.to_string()).collect();
    format!("[{}]", parts.join(","))
}

/// Parses the `"[v1,v2,...,vn]"` wire form back into a vector.
pub fn parse_embedding(raw: &str) -> Result<Vec<f32>> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    if trimmed.is_empty() {
        return Err(FinsageError::Embedding(
            "empty embedding string".to_string(),
        ));
    }

    trimmed
        .split(',')
        .map(|part| {
            part.trim().parse::<f32>().map_err(|e| {
                FinsageError::Embedding(format!("failed to parse embedding value '{part}': {e}"))
            })
        })
        .collect()
}
