//! Test support utilities for setupcheck behavioural tests.
//!
//! Builds throwaway download directories holding installer heads with
//! embedded checksum trailers and their part files.

use camino::{Utf8Path, Utf8PathBuf};
use setupcheck::digest::bytes_md5;
use setupcheck::trailer::{DEFAULT_MARKER, encode_trailer};
use tempfile::TempDir;

/// Leading bytes of a RAR archive.
pub const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07\x01\x00";

/// A temporary directory of installers.
pub struct Downloads {
    _temp: TempDir,
    root: Utf8PathBuf,
}

impl Downloads {
    /// Creates an empty directory.
    pub fn new() -> Self {
        let temp = tempfile::tempdir().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_owned()).expect("utf-8 temp dir");
        Self { _temp: temp, root }
    }

    /// Directory path.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Writes `<name>.exe` whose trailer declares the digests of `payloads`.
    pub fn head(&self, name: &str, payloads: &[String]) -> Utf8PathBuf {
        let digests: Vec<_> = payloads.iter().map(|p| bytes_md5(p.as_bytes())).collect();
        let mut bytes = b"MZ\x90\x00\x03\x00\x00\x00".to_vec();
        bytes.extend(encode_trailer(&digests, DEFAULT_MARKER));
        self.write(&format!("{name}.exe"), &bytes)
    }

    /// Writes a head without any trailer.
    pub fn bare_head(&self, name: &str) -> Utf8PathBuf {
        self.write(&format!("{name}.exe"), b"MZ\x90\x00 no trailer")
    }

    /// Writes part `ordinal` of head `name`.
    pub fn part(&self, name: &str, ordinal: u32, contents: &[u8]) -> Utf8PathBuf {
        self.write(&format!("{name}-{ordinal:02}.bin"), contents)
    }

    /// Writes an arbitrary file.
    pub fn write(&self, file_name: &str, contents: &[u8]) -> Utf8PathBuf {
        let path = self.root.join(file_name);
        std::fs::write(&path, contents).expect("write fixture file");
        path
    }
}

/// Splits a comma-separated step argument into trimmed values.
pub fn list(values: &str) -> Vec<String> {
    values
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
        .collect()
}
