//! Output extraction: raw output value -> resource identifier
//!
//! The module exposes a URI-shaped output such as
//! `123456789012.dkr.ecr.us-west-1.amazonaws.com/my-repo`. The identifier is
//! the segment after the single delimiter. Anything other than exactly one
//! delimiter is a hard failure.

use crate::error::{LifecycleError, Result};
use serde::{Deserialize, Serialize};

/// Number of segments a well-formed output splits into
pub const EXPECTED_SEGMENTS: usize = 2;

/// Which output to read and how to decompose it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputContract {
    /// Output name declared by the module
    pub key: String,

    pub delimiter: String,

    /// Segment holding the identifier (0-based)
    pub segment_index: usize,
}

impl Default for OutputContract {
    fn default() -> Self {
        Self {
            key: "repository_url".to_string(),
            delimiter: "/".to_string(),
            segment_index: 1,
        }
    }
}

impl OutputContract {
    pub fn new(key: impl Into<String>, delimiter: impl Into<String>, segment_index: usize) -> Self {
        Self {
            key: key.into(),
            delimiter: delimiter.into(),
            segment_index,
        }
    }

    /// Apply this contract to a raw output value
    pub fn extract(&self, raw_output: &str) -> Result<String> {
        extract_identifier(raw_output, &self.delimiter, self.segment_index)
    }
}

/// Split `raw_output` on `delimiter` and return segment `segment_index`.
///
/// Fails with `MalformedOutput` unless the split yields exactly
/// [`EXPECTED_SEGMENTS`] segments and the selected one is non-empty.
pub fn extract_identifier(
    raw_output: &str,
    delimiter: &str,
    segment_index: usize,
) -> Result<String> {
    let malformed = |segments: usize| LifecycleError::MalformedOutput {
        output: raw_output.to_string(),
        delimiter: delimiter.to_string(),
        segments,
    };

    if delimiter.is_empty() {
        return Err(malformed(1));
    }

    let segments: Vec<&str> = raw_output.split(delimiter).collect();
    if segments.len() != EXPECTED_SEGMENTS {
        return Err(malformed(segments.len()));
    }

    match segments.get(segment_index) {
        Some(segment) if !segment.is_empty() => Ok((*segment).to_string()),
        _ => Err(malformed(segments.len())),
    }
}
