//! MD5 digest newtype for part verification.
//!
//! Installer heads record one MD5 digest per part as 32 lowercase hex
//! characters. [`Md5Digest`] holds such a value after validation, and
//! [`file_md5`] produces one from a file on disk.

use md5::{Digest, Md5};
use serde::Serialize;
use std::fmt;
use std::fs::File;
use std::io::Read;

use camino::Utf8Path;

/// Expected length of a hex-encoded MD5 digest.
pub const DIGEST_HEX_LEN: usize = 32;

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// A validated, lowercase hex-encoded MD5 digest.
///
/// # Examples
///
/// ```
/// use setupcheck::digest::Md5Digest;
///
/// let digest = Md5Digest::parse("D41D8CD98F00B204E9800998ECF8427E").unwrap();
/// assert_eq!(digest.as_str(), "d41d8cd98f00b204e9800998ecf8427e");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Md5Digest(String);

impl Md5Digest {
    /// Parses 32 hex characters, normalising to lowercase.
    ///
    /// Returns `None` for any other length or a non-hex character.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        if value.len() != DIGEST_HEX_LEN || !value.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        Some(Self(value.to_ascii_lowercase()))
    }

    /// Parses raw trailer bytes; see [`Self::parse`].
    #[must_use]
    pub fn from_ascii(bytes: &[u8]) -> Option<Self> {
        std::str::from_utf8(bytes).ok().and_then(Self::parse)
    }

    /// Return the digest as a hex string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Md5Digest {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Computes the MD5 digest of an in-memory buffer.
#[must_use]
pub fn bytes_md5(data: &[u8]) -> Md5Digest {
    Md5Digest(format!("{:x}", Md5::digest(data)))
}

/// Streams a file through MD5.
///
/// # Errors
///
/// Returns any I/O error raised while opening or reading the file.
pub fn file_md5(path: &Utf8Path) -> std::io::Result<Md5Digest> {
    let mut file = File::open(path)?;
    let mut hasher = Md5::new();
    let mut buf = vec![0_u8; READ_BUFFER_SIZE];
    loop {
        let count = file.read(&mut buf)?;
        if count == 0 {
            break;
        }
        hasher.update(buf.get(..count).unwrap_or_default());
    }
    Ok(Md5Digest(format!("{:x}", hasher.finalize())))
}
