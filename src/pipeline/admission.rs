//! Pluggable admissibility filtering for extracted documents.
//!
//! The coordinator does not hard-code any language or content policy; callers inject an
//! [`AdmissionPolicy`] and the pipeline only honors its verdict.

use crate::extract::ExtractedDocument;

/// Last code point of Latin Extended-B; everything at or below counts as Latin script.
const LATIN_SCRIPT_CEILING: char = '\u{024F}';

/// Verdict returned by an admission policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdmissionDecision {
    /// Document proceeds through the pipeline.
    Admit,
    /// Document is dropped, with a reason for the logs.
    Reject {
        /// Human-readable rejection reason.
        reason: String,
    },
}

/// Decides whether an extracted document is worth indexing.
pub trait AdmissionPolicy: Send + Sync {
    /// Judge one extracted document.
    fn admit(&self, document: &ExtractedDocument) -> AdmissionDecision;
}

/// Policy that admits everything.
#[derive(Debug, Default)]
pub struct AllowAll;

impl AdmissionPolicy for AllowAll {
    fn admit(&self, _document: &ExtractedDocument) -> AdmissionDecision {
        AdmissionDecision::Admit
    }
}

/// Rejects pages whose alphabetic text is not predominantly Latin-script.
///
/// Useful when the downstream corpus is limited to Western-European tender portals and
/// crawls occasionally stray into pages in other scripts.
#[derive(Debug, Clone, Copy)]
pub struct LatinRatioPolicy {
    /// Minimum fraction of alphabetic characters that must be Latin script.
    pub min_ratio: f64,
}

impl Default for LatinRatioPolicy {
    fn default() -> Self {
        Self { min_ratio: 0.5 }
    }
}

impl AdmissionPolicy for LatinRatioPolicy {
    fn admit(&self, document: &ExtractedDocument) -> AdmissionDecision {
        let ratio = match latin_ratio(&document.plain_text) {
            // Nothing alphabetic to judge; let later stages decide.
            None => return AdmissionDecision::Admit,
            Some(ratio) => ratio,
        };
        if ratio >= self.min_ratio {
            AdmissionDecision::Admit
        } else {
            AdmissionDecision::Reject {
                reason: format!(
                    "latin-script ratio {ratio:.2} below required {:.2}",
                    self.min_ratio
                ),
            }
        }
    }
}

/// Fraction of alphabetic characters that fall in the Latin blocks, when any exist.
fn latin_ratio(text: &str) -> Option<f64> {
    let mut alphabetic = 0usize;
    let mut latin = 0usize;
    for ch in text.chars().filter(|ch| ch.is_alphabetic()) {
        alphabetic += 1;
        if ch <= LATIN_SCRIPT_CEILING {
            latin += 1;
        }
    }
    if alphabetic == 0 {
        None
    } else {
        Some(latin as f64 / alphabetic as f64)
    }
}
