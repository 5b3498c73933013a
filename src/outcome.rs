//! Per-stage check outcomes and the failure taxonomy.

use serde::Serialize;
use std::fmt;

/// Why a head failed a check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// The signature tool reported that the head is unsigned.
    NoSignatureFound,
    /// The signature tool reported a failure or exited non-zero.
    SignatureError,
    /// Part files exist but the head has no checksum manifest.
    ManifestMissingPartsExist,
    /// The manifest expects no parts but part files exist.
    SpuriousParts,
    /// A part's digest is not among the declared digests.
    WrongChecksum,
    /// The number of part files differs from the declared count.
    WrongPartCount,
    /// The extractor could not list the head's contents.
    ProbeFailed,
    /// The extractor listed files without a checksum.
    ChecksumInfoMismatch,
    /// Test extraction reported corruption.
    ExtractionFailed,
}

impl FailureReason {
    /// Stable snake_case identifier, used in JSON output.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::NoSignatureFound => "no_signature_found",
            Self::SignatureError => "signature_error",
            Self::ManifestMissingPartsExist => "manifest_missing_parts_exist",
            Self::SpuriousParts => "spurious_parts",
            Self::WrongChecksum => "wrong_checksum",
            Self::WrongPartCount => "wrong_part_count",
            Self::ProbeFailed => "probe_failed",
            Self::ChecksumInfoMismatch => "checksum_info_mismatch",
            Self::ExtractionFailed => "extraction_failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::NoSignatureFound => "no digital signature found",
            Self::SignatureError => "digital signature error",
            Self::ManifestMissingPartsExist => "no checksum manifest but part files exist",
            Self::SpuriousParts => "manifest expects no parts but part files exist",
            Self::WrongChecksum => "wrong checksum",
            Self::WrongPartCount => "wrong number of bin files",
            Self::ProbeFailed => "probing failed",
            Self::ChecksumInfoMismatch => "checksum info mismatch",
            Self::ExtractionFailed => "extraction failed",
        };
        f.write_str(text)
    }
}

/// A failed check with optional context such as the offending part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Failure {
    /// Taxonomy entry.
    pub reason: FailureReason,
    /// Extra context for the report.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl Failure {
    /// A failure without detail.
    #[must_use]
    pub const fn new(reason: FailureReason) -> Self {
        Self {
            reason,
            detail: None,
        }
    }

    /// A failure with detail.
    #[must_use]
    pub fn with_detail(reason: FailureReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: Some(detail.into()),
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detail {
            Some(detail) => write!(f, "{} ({detail})", self.reason),
            None => write!(f, "{}", self.reason),
        }
    }
}

/// Result of one check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    /// The check succeeded.
    Passed,
    /// The check failed.
    Failed(Failure),
    /// The check could not run; not an error.
    Skipped(String),
}

impl CheckOutcome {
    /// Shorthand for a detail-less failure.
    #[must_use]
    pub const fn failed(reason: FailureReason) -> Self {
        Self::Failed(Failure::new(reason))
    }

    /// Returns the failure, if any.
    #[must_use]
    pub const fn failure(&self) -> Option<&Failure> {
        match self {
            Self::Failed(failure) => Some(failure),
            Self::Passed | Self::Skipped(_) => None,
        }
    }
}
