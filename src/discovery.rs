//! Installer head and part file discovery.
//!
//! Heads are `<prefix>*.exe` files (any `.exe` when forced); parts sit next
//! to their head as `<basename>-<NN>.bin`. Both matches are ASCII
//! case-insensitive, since the archives are usually produced on Windows.

use crate::error::{Result, VerifyError};
use camino::{Utf8Path, Utf8PathBuf};
use log::{trace, warn};
use std::collections::BTreeSet;
use std::fs::File;
use std::io::Read;

const HEAD_EXTENSION: &str = "exe";
const PART_EXTENSION: &str = "bin";
const RAR_MAGIC: &[u8] = b"Rar!\x1a\x07";

/// Options controlling which files count as installer heads.
#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Required file-name prefix, compared case-insensitively.
    pub prefix: String,
    /// Accept any `.exe` regardless of prefix.
    pub any_executable: bool,
    /// Descend into subdirectories.
    pub recursive: bool,
}

/// A primary installer executable.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct InstallerHead {
    path: Utf8PathBuf,
}

impl InstallerHead {
    /// Wraps a head path.
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the head executable.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// File name without its extension, e.g. `setup_game` for
    /// `setup_game.exe`.
    #[must_use]
    pub fn base_name(&self) -> &str {
        self.path.file_stem().unwrap_or_else(|| self.path.as_str())
    }

    /// Directory the head (and so its parts) lives in.
    #[must_use]
    pub fn directory(&self) -> &Utf8Path {
        match self.path.parent() {
            Some(parent) if !parent.as_str().is_empty() => parent,
            _ => Utf8Path::new("."),
        }
    }

    /// Finds this head's part files, ordered by ordinal.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the head's directory cannot be listed.
    pub fn parts(&self) -> Result<Vec<PartFile>> {
        let mut parts = Vec::new();
        for entry in std::fs::read_dir(self.directory())? {
            let entry = entry?;
            let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
                warn!("skipping non UTF-8 path {}", entry.path().display());
                continue;
            };
            if !entry.file_type()?.is_file() {
                continue;
            }
            let ordinal = path
                .file_name()
                .and_then(|name| part_ordinal(self.base_name(), name));
            if let Some(ordinal) = ordinal {
                parts.push(PartFile { path, ordinal });
            }
        }
        parts.sort_by_key(|part| part.ordinal);
        trace!("{} has {} part file(s)", self.path, parts.len());
        Ok(parts)
    }

    /// Whether any of the head's parts is a RAR archive.
    ///
    /// A part whose leading bytes cannot be read counts as plain.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the head's directory cannot be listed.
    pub fn has_rar_parts(&self) -> Result<bool> {
        Ok(self
            .parts()?
            .iter()
            .any(|part| part.format().is_ok_and(|format| format == PartFormat::Rar)))
    }
}

/// Container format of a part file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartFormat {
    /// Raw slice of the installer payload; its digest is in the head.
    Plain,
    /// RAR archive; the head never records its digest.
    Rar,
}

/// A numbered data file belonging to a head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartFile {
    path: Utf8PathBuf,
    ordinal: u32,
}

impl PartFile {
    /// Path of the part.
    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Ordinal parsed from the file name, 1 for `-01.bin`.
    #[must_use]
    pub const fn ordinal(&self) -> u32 {
        self.ordinal
    }

    /// File name for display.
    #[must_use]
    pub fn file_name(&self) -> &str {
        self.path.file_name().unwrap_or_else(|| self.path.as_str())
    }

    /// Sniffs the leading bytes for the RAR signature.
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the part cannot be opened or read.
    pub fn format(&self) -> std::io::Result<PartFormat> {
        let mut magic = [0_u8; RAR_MAGIC.len()];
        let mut file = File::open(&self.path)?;
        let mut filled = 0;
        while filled < magic.len() {
            let Some(rest) = magic.get_mut(filled..) else {
                break;
            };
            let count = file.read(rest)?;
            if count == 0 {
                break;
            }
            filled += count;
        }
        if magic.get(..filled) == Some(RAR_MAGIC) {
            Ok(PartFormat::Rar)
        } else {
            Ok(PartFormat::Plain)
        }
    }
}

/// Parses `<base>-<digits>.bin` (case-insensitive) and returns the ordinal.
fn part_ordinal(base_name: &str, file_name: &str) -> Option<u32> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if !extension.eq_ignore_ascii_case(PART_EXTENSION) {
        return None;
    }
    let (base, digits) = stem.rsplit_once('-')?;
    if !base.eq_ignore_ascii_case(base_name)
        || digits.is_empty()
        || digits.len() > 3
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return None;
    }
    digits.parse().ok().filter(|ordinal| *ordinal > 0)
}

fn is_head_name(file_name: &str, options: &DiscoveryOptions) -> bool {
    let Some((_, extension)) = file_name.rsplit_once('.') else {
        return false;
    };
    if !extension.eq_ignore_ascii_case(HEAD_EXTENSION) {
        return false;
    }
    options.any_executable || starts_with_ignore_case(file_name, &options.prefix)
}

fn starts_with_ignore_case(value: &str, prefix: &str) -> bool {
    value
        .as_bytes()
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix.as_bytes()))
}

/// Collects installer heads from files and directories.
///
/// Files named explicitly are always heads. Directories are scanned for
/// matching names, recursively when requested. The result is sorted and
/// free of duplicates so ordinals are stable between runs.
///
/// # Errors
///
/// Returns [`VerifyError::InvalidInput`] for a path that does not exist and
/// an I/O error if a directory cannot be read.
pub fn discover_heads(
    inputs: &[Utf8PathBuf],
    options: &DiscoveryOptions,
) -> Result<Vec<InstallerHead>> {
    let mut found = BTreeSet::new();
    for input in inputs {
        if input.is_file() {
            found.insert(InstallerHead::new(input.clone()));
        } else if input.is_dir() {
            scan_directory(input, options, &mut found)?;
        } else {
            return Err(VerifyError::InvalidInput {
                path: input.clone(),
                reason: "no such file or directory".to_owned(),
            });
        }
    }
    Ok(found.into_iter().collect())
}

fn scan_directory(
    dir: &Utf8Path,
    options: &DiscoveryOptions,
    found: &mut BTreeSet<InstallerHead>,
) -> Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            warn!("skipping non UTF-8 path {}", entry.path().display());
            continue;
        };
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            if options.recursive {
                scan_directory(&path, options, found)?;
            }
        } else if file_type.is_file()
            && path
                .file_name()
                .is_some_and(|name| is_head_name(name, options))
        {
            trace!("found installer head {path}");
            found.insert(InstallerHead::new(path));
        }
    }
    Ok(())
}
