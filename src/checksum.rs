//! Part file verification against the head's embedded manifest.
//!
//! Plain parts are hashed and tested for membership in the declared digest
//! set; their number must equal the declared count. RAR parts are never
//! recorded in the manifest, so they are reported and otherwise ignored.

use crate::digest::{Md5Digest, file_md5};
use crate::discovery::{InstallerHead, PartFile, PartFormat};
use crate::error::Result;
use crate::outcome::{Failure, FailureReason};
use crate::output::{Output, Style};
use crate::trailer::{ChecksumManifest, read_manifest};
use log::{debug, warn};

/// Whether part digests are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMode {
    /// Hash every plain part and match it against the manifest.
    Compute,
    /// Check part presence and count only.
    Skip,
}

/// Settings for the checksum stage.
#[derive(Debug, Clone)]
pub struct ChecksumSettings {
    /// Trailer marker token.
    pub marker: String,
    /// Trailing bytes of the head searched for the trailer.
    pub window: u64,
    /// Digest computation mode.
    pub mode: DigestMode,
}

/// What the checksum stage found for one head.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChecksumReport {
    /// Declared part count, `None` without a manifest.
    pub expected_parts: Option<usize>,
    /// Plain parts found on disk.
    pub plain_parts: usize,
    /// RAR parts found on disk.
    pub rar_parts: usize,
    /// Failures in the order they were detected.
    pub failures: Vec<Failure>,
}

impl ChecksumReport {
    /// Returns `true` when no failure was recorded.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, out: &mut Output<'_>, failure: Failure) {
        out.error(&failure);
        self.failures.push(failure);
    }
}

/// Reads the head's manifest and verifies its parts.
///
/// A head that cannot be read is treated as having no manifest; if parts
/// exist the resulting failure carries the read error.
///
/// # Errors
///
/// Returns an I/O error if the head's directory cannot be listed.
pub fn check_checksums(
    head: &InstallerHead,
    settings: &ChecksumSettings,
    out: &mut Output<'_>,
) -> Result<ChecksumReport> {
    match read_manifest(head.path(), &settings.marker, settings.window) {
        Ok(manifest) => verify_checksums(head, manifest.as_ref(), settings.mode, out),
        Err(err) => {
            warn!("cannot read trailer of {}: {err}", head.path());
            let mut report = verify_checksums(head, None, settings.mode, out)?;
            for failure in &mut report.failures {
                if failure.reason == FailureReason::ManifestMissingPartsExist {
                    failure.detail = Some(format!("cannot read head: {err}"));
                }
            }
            Ok(report)
        }
    }
}

/// Reconciles `manifest` with the parts on disk.
///
/// # Errors
///
/// Returns an I/O error if the head's directory cannot be listed.
pub fn verify_checksums(
    head: &InstallerHead,
    manifest: Option<&ChecksumManifest>,
    mode: DigestMode,
    out: &mut Output<'_>,
) -> Result<ChecksumReport> {
    let mut report = ChecksumReport::default();
    let plain = split_rar_parts(head.parts()?, &mut report, out);
    report.plain_parts = plain.len();

    let Some(manifest) = manifest else {
        if plain.is_empty() {
            out.success("no checksum manifest and no part files");
        } else {
            let detail = format!("{} part file(s) found", plain.len());
            report.fail(
                out,
                Failure::with_detail(FailureReason::ManifestMissingPartsExist, detail),
            );
        }
        return Ok(report);
    };

    let expected = manifest.expected_parts();
    report.expected_parts = Some(expected);
    out.detail(format!("manifest declares {expected} part(s)"), Style::Plain);
    for (index, digest) in manifest.digests().iter().enumerate() {
        out.detail(format!("  part {:02}: {digest}", index + 1), Style::Plain);
    }

    if expected == 0 {
        if plain.is_empty() {
            out.success("no part files expected or found");
        } else {
            let detail = format!("{} part file(s) found", plain.len());
            report.fail(out, Failure::with_detail(FailureReason::SpuriousParts, detail));
        }
        return Ok(report);
    }

    match mode {
        DigestMode::Compute => {
            for part in &plain {
                match_part(part, manifest, &mut report, out);
            }
        }
        DigestMode::Skip => {
            for part in &plain {
                out.detail(format!("{}: present", part.file_name()), Style::Plain);
            }
        }
    }

    if plain.len() == expected {
        out.success(format!("{expected} part file(s) present"));
    } else {
        let detail = format!("expected {expected}, found {}", plain.len());
        report.fail(out, Failure::with_detail(FailureReason::WrongPartCount, detail));
    }
    Ok(report)
}

fn split_rar_parts(
    parts: Vec<PartFile>,
    report: &mut ChecksumReport,
    out: &mut Output<'_>,
) -> Vec<PartFile> {
    let mut plain = Vec::with_capacity(parts.len());
    for part in parts {
        let format = part.format().unwrap_or_else(|err| {
            debug!("cannot sniff {}: {err}", part.path());
            PartFormat::Plain
        });
        match format {
            PartFormat::Rar => {
                report.rar_parts += 1;
                out.detail(
                    format!("{}: rar part, checksum not recorded in head", part.file_name()),
                    Style::Warning,
                );
            }
            PartFormat::Plain => plain.push(part),
        }
    }
    plain
}

fn match_part(
    part: &PartFile,
    manifest: &ChecksumManifest,
    report: &mut ChecksumReport,
    out: &mut Output<'_>,
) {
    let name = part.file_name();
    match file_md5(part.path()) {
        Ok(digest) if manifest.declares(&digest) => {
            out.success(format!("{name}: {digest} OK"));
        }
        Ok(digest) => {
            debug!("{name} hashes to undeclared {digest}");
            report.fail(out, mismatch(name, &digest));
        }
        Err(err) => {
            let detail = format!("{name}: {err}");
            report.fail(out, Failure::with_detail(FailureReason::WrongChecksum, detail));
        }
    }
}

fn mismatch(name: &str, digest: &Md5Digest) -> Failure {
    Failure::with_detail(FailureReason::WrongChecksum, format!("{name}: {digest}"))
}

#[cfg(test)]
#[path = "checksum_tests.rs"]
mod tests;
