//! Embedded checksum manifest decoding.
//!
//! Installer heads carry an ASCII trailer near the end of the file:
//!
//! ```text
//! <md5 of part 01><md5 of part 02>...<md5 of part NN><NN><marker>
//! ```
//!
//! Each digest is 32 hex characters, `NN` is a two-digit decimal part count
//! and the marker is a fixed token matched case-insensitively. Everything
//! else in the file is arbitrary binary data, so the parser anchors on the
//! *last* marker occurrence and walks backwards from it.

use crate::digest::{DIGEST_HEX_LEN, Md5Digest};
use camino::Utf8Path;
use log::debug;
use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};

/// Marker token written by the installer builder after the part count.
pub const DEFAULT_MARKER: &str = "#GOGCRCSTRING";

/// How many trailing bytes of a head are searched for the marker.
pub const DEFAULT_WINDOW: u64 = 1024 * 1024;

const COUNT_FIELD_LEN: usize = 2;

/// A digest slot from the trailer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExpectedDigest {
    /// A well-formed digest.
    Declared(Md5Digest),
    /// The slot was truncated or malformed. Shown, never matched.
    Empty,
}

impl ExpectedDigest {
    /// Returns the digest when the slot holds one.
    #[must_use]
    pub const fn declared(&self) -> Option<&Md5Digest> {
        match self {
            Self::Declared(digest) => Some(digest),
            Self::Empty => None,
        }
    }
}

impl fmt::Display for ExpectedDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Declared(digest) => write!(f, "{digest}"),
            Self::Empty => write!(f, "<unknown>"),
        }
    }
}

/// Part count and digests decoded from a head's trailer.
///
/// `digests()[0]` belongs to part 01. The number of slots always equals
/// [`Self::expected_parts`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumManifest {
    digests: Vec<ExpectedDigest>,
}

impl ChecksumManifest {
    /// Decodes the manifest that ends at the last occurrence of `marker`.
    ///
    /// Returns `None` when the marker is absent or the count field in front
    /// of it is not two ASCII digits.
    ///
    /// # Examples
    ///
    /// ```
    /// use setupcheck::trailer::ChecksumManifest;
    ///
    /// let trailer = format!("junk{}{}02#GOGCRCSTRING", "aa".repeat(16), "bb".repeat(16));
    /// let manifest = ChecksumManifest::parse(trailer.as_bytes(), "#gogcrcstring").unwrap();
    /// assert_eq!(manifest.expected_parts(), 2);
    /// assert_eq!(manifest.digests()[0].to_string(), "aa".repeat(16));
    /// ```
    #[must_use]
    pub fn parse(bytes: &[u8], marker: &str) -> Option<Self> {
        let marker_at = find_last_marker(bytes, marker.as_bytes())?;
        let Some(count_start) = marker_at.checked_sub(COUNT_FIELD_LEN) else {
            debug!("trailer marker at offset {marker_at} has no room for a part count");
            return None;
        };
        let count = parse_count(bytes.get(count_start..marker_at)?)?;
        let digest_area = bytes.get(..count_start)?;

        // Slices are peeled off back to front: the one touching the count
        // field belongs to the last part.
        let mut digests: Vec<ExpectedDigest> = (0..count)
            .map(|from_end| digest_slot(digest_area, from_end))
            .collect();
        digests.reverse();

        Some(Self { digests })
    }

    /// Builds a manifest directly from its digest slots.
    #[must_use]
    pub const fn from_digests(digests: Vec<ExpectedDigest>) -> Self {
        Self { digests }
    }

    /// Number of parts the head declares.
    #[must_use]
    pub fn expected_parts(&self) -> usize {
        self.digests.len()
    }

    /// Digest slots in part order.
    #[must_use]
    pub fn digests(&self) -> &[ExpectedDigest] {
        &self.digests
    }

    /// Set membership test; position in the trailer is irrelevant.
    #[must_use]
    pub fn declares(&self, digest: &Md5Digest) -> bool {
        self.digests
            .iter()
            .filter_map(ExpectedDigest::declared)
            .any(|candidate| candidate == digest)
    }
}

/// Reads the trailing `window` bytes of `path` and decodes its manifest.
///
/// # Errors
///
/// Returns any I/O error raised while opening, seeking or reading the file.
pub fn read_manifest(
    path: &Utf8Path,
    marker: &str,
    window: u64,
) -> std::io::Result<Option<ChecksumManifest>> {
    let mut file = File::open(path)?;
    let len = file.metadata()?.len();
    let start = len.saturating_sub(window);
    file.seek(SeekFrom::Start(start))?;

    let mut tail = Vec::new();
    file.take(window).read_to_end(&mut tail)?;
    debug!("searching last {} bytes of {path} for trailer", tail.len());

    Ok(ChecksumManifest::parse(&tail, marker))
}

/// Encodes a trailer in the on-disk layout, for building fixtures.
#[cfg(any(test, feature = "test-support"))]
#[must_use]
pub fn encode_trailer(digests: &[Md5Digest], marker: &str) -> Vec<u8> {
    let mut out = String::new();
    for digest in digests {
        out.push_str(digest.as_str());
    }
    out.push_str(&format!("{:02}", digests.len()));
    out.push_str(marker);
    out.into_bytes()
}

fn find_last_marker(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() || marker.len() > haystack.len() {
        return None;
    }
    haystack
        .windows(marker.len())
        .rposition(|window| window.eq_ignore_ascii_case(marker))
}

fn parse_count(field: &[u8]) -> Option<usize> {
    let [tens, units] = field else {
        return None;
    };
    if !tens.is_ascii_digit() || !units.is_ascii_digit() {
        debug!("trailer part count {field:?} is not two decimal digits");
        return None;
    }
    Some(usize::from(tens - b'0') * 10 + usize::from(units - b'0'))
}

fn digest_slot(area: &[u8], from_end: usize) -> ExpectedDigest {
    let slot = area
        .len()
        .checked_sub(from_end * DIGEST_HEX_LEN)
        .and_then(|end| Some((end.checked_sub(DIGEST_HEX_LEN)?, end)))
        .and_then(|(start, end)| area.get(start..end));

    slot.and_then(Md5Digest::from_ascii)
        .map_or(ExpectedDigest::Empty, ExpectedDigest::Declared)
}
