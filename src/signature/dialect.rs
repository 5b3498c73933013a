//! Output dialects of external signature verifiers.
//!
//! A dialect knows how to invoke its tool and how to read one line of the
//! tool's text. Supporting a different verifier (or a release that changed
//! its wording) means adding a dialect; the verdict logic stays put.

use camino::Utf8PathBuf;
use std::fmt;

/// Certificate field labels highlighted in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldLabel {
    /// Certificate subject.
    Subject,
    /// Certificate issuer.
    Issuer,
    /// Certificate serial number.
    Serial,
}

impl FieldLabel {
    /// All labels, in the order they are tried.
    pub const ALL: [Self; 3] = [Self::Subject, Self::Issuer, Self::Serial];

    /// Label text as printed by the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Subject => "Subject",
            Self::Issuer => "Issuer",
            Self::Serial => "Serial",
        }
    }
}

impl fmt::Display for FieldLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a single output line means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    /// A certificate field and its trimmed value.
    Field {
        /// Which field.
        label: FieldLabel,
        /// The value after the colon.
        value: String,
    },
    /// Contains a success marker.
    Success,
    /// Contains a failure marker.
    Error,
    /// Metadata or layout hidden unless unfiltered output is requested.
    Noise,
    /// Anything else.
    Plain,
}

/// Inputs for one verifier invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyRequest {
    /// Executable to check.
    pub head: Utf8PathBuf,
    /// CA bundle to trust, if configured.
    pub ca_bundle: Option<Utf8PathBuf>,
}

/// Invocation and line classification for one signature tool.
#[cfg_attr(test, mockall::automock)]
pub trait SignatureDialect {
    /// Arguments passed to the tool for `request`.
    fn command_args(&self, request: &VerifyRequest) -> Vec<String>;

    /// Classifies one line of the tool's combined output.
    fn classify(&self, line: &str) -> LineKind;

    /// Returns `true` when the output says the file carries no signature.
    fn is_unsigned(&self, text: &str) -> bool;
}

const SUCCESS_MARKERS: [&str; 2] = ["Signature verification: ok", "Succeeded"];

const FAILURE_MARKERS: [&str; 4] = [
    "MISMATCH",
    "Signature verification: failed",
    "Failed",
    NO_SIGNATURE_MARKER,
];

const NO_SIGNATURE_MARKER: &str = "No signature found";

const NOISE_PREFIXES: [&str; 7] = [
    "Current PE checksum",
    "Calculated PE checksum",
    "Message digest algorithm",
    "Current message digest",
    "Calculated message digest",
    "Number of verified signatures",
    "Signature Index",
];

/// `osslsigncode verify` output.
///
/// # Examples
///
/// ```
/// use setupcheck::signature::{FieldLabel, LineKind, Osslsigncode, SignatureDialect};
///
/// let dialect = Osslsigncode;
/// assert_eq!(
///     dialect.classify("\tIssuer : /C=US/O=DigiCert Inc"),
///     LineKind::Field {
///         label: FieldLabel::Issuer,
///         value: "/C=US/O=DigiCert Inc".to_owned(),
///     }
/// );
/// assert_eq!(dialect.classify("Signature verification: ok"), LineKind::Success);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Osslsigncode;

impl SignatureDialect for Osslsigncode {
    fn command_args(&self, request: &VerifyRequest) -> Vec<String> {
        let mut args = vec!["verify".to_owned()];
        if let Some(bundle) = &request.ca_bundle {
            args.push("-CAfile".to_owned());
            args.push(bundle.to_string());
        }
        args.push("-in".to_owned());
        args.push(request.head.to_string());
        args
    }

    fn classify(&self, line: &str) -> LineKind {
        let trimmed = line.trim();
        if trimmed.is_empty() || is_separator(trimmed) {
            return LineKind::Noise;
        }
        // Certificate fields never carry a verdict, whatever their value.
        if let Some(field) = parse_field(trimmed) {
            return field;
        }
        // Before noise: the digest lines carry MISMATCH at their end.
        if FAILURE_MARKERS.iter().any(|marker| trimmed.contains(marker)) {
            return LineKind::Error;
        }
        if SUCCESS_MARKERS.iter().any(|marker| trimmed.contains(marker)) {
            return LineKind::Success;
        }
        if NOISE_PREFIXES.iter().any(|prefix| trimmed.starts_with(prefix)) {
            return LineKind::Noise;
        }
        LineKind::Plain
    }

    fn is_unsigned(&self, text: &str) -> bool {
        text.contains(NO_SIGNATURE_MARKER)
    }
}

fn is_separator(line: &str) -> bool {
    ['-', '=', '*']
        .iter()
        .any(|c| line.chars().all(|ch| ch == *c))
}

fn parse_field(line: &str) -> Option<LineKind> {
    FieldLabel::ALL.into_iter().find_map(|label| {
        let rest = line.strip_prefix(label.as_str())?;
        let value = rest.trim_start_matches(' ').strip_prefix(':')?;
        Some(LineKind::Field {
            label,
            value: value.trim().to_owned(),
        })
    })
}
