//! Configuration file loading.
//!
//! `setupcheck` reads an optional TOML file naming the external tools, the
//! CA bundle handed to the signature verifier, the trailer marker and the
//! known certificate strings used to highlight signature output. Every field
//! has a default, so an absent file is the same as an empty one.
//!
//! Known strings are organised in named groups per category; the groups only
//! exist for the reader's benefit and are flattened into one set each:
//!
//! ```toml
//! [known.issuers]
//! digicert = ["/C=US/O=DigiCert Inc/CN=DigiCert Code Signing CA"]
//! legacy = """
//! /C=US/O=Thawte/CN=Thawte Code Signing CA
//! /C=US/O=VeriSign/CN=VeriSign Class 3 Code Signing CA
//! """
//! ```

use crate::error::{Result, VerifyError};
use crate::signature::FieldLabel;
use crate::trailer::{DEFAULT_MARKER, DEFAULT_WINDOW};
use camino::{Utf8Path, Utf8PathBuf};
use directories_next::ProjectDirs;
use log::debug;
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

const CONFIG_FILE_NAME: &str = "config.toml";
const DEFAULT_TIMEOUT_SECS: u64 = 1800;

/// Top-level configuration.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// File-name prefix identifying installer heads.
    pub head_prefix: String,
    /// Token terminating the embedded checksum trailer.
    pub trailer_marker: String,
    /// Trailing bytes of each head searched for the trailer.
    pub trailer_window: u64,
    /// Deadline for each external tool run; `0` disables it.
    pub timeout_secs: u64,
    /// External tool settings.
    pub tools: ToolConfig,
    /// Known certificate strings.
    pub known: KnownStringSet,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            head_prefix: "setup_".to_owned(),
            trailer_marker: DEFAULT_MARKER.to_owned(),
            trailer_window: DEFAULT_WINDOW,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            tools: ToolConfig::default(),
            known: KnownStringSet::default(),
        }
    }
}

/// Names and arguments of the external tools.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    /// Signature verifier executable.
    pub signature: String,
    /// Extractor executable.
    pub extractor: String,
    /// Helper the extractor needs for RAR parts.
    pub rar_helper: String,
    /// CA bundle passed to the signature verifier.
    pub ca_bundle: Option<Utf8PathBuf>,
}

impl Default for ToolConfig {
    fn default() -> Self {
        Self {
            signature: "osslsigncode".to_owned(),
            extractor: "innoextract".to_owned(),
            rar_helper: "unrar".to_owned(),
            ca_bundle: None,
        }
    }
}

/// Exact-match strings for the three certificate fields.
///
/// Used only to highlight signature output; never a trust decision. The
/// built-in lists apply only when the `[known]` table is absent; a category
/// left out of a present table is empty.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct KnownStringSet {
    /// Known certificate subjects.
    #[serde(default, deserialize_with = "flatten_groups")]
    pub subjects: BTreeSet<String>,
    /// Known certificate issuers.
    #[serde(default, deserialize_with = "flatten_groups")]
    pub issuers: BTreeSet<String>,
    /// Known certificate serial numbers.
    #[serde(default, deserialize_with = "flatten_groups")]
    pub serials: BTreeSet<String>,
}

impl KnownStringSet {
    /// Returns whether `value` is listed for the given field.
    #[must_use]
    pub fn is_known(&self, label: FieldLabel, value: &str) -> bool {
        let set = match label {
            FieldLabel::Subject => &self.subjects,
            FieldLabel::Issuer => &self.issuers,
            FieldLabel::Serial => &self.serials,
        };
        set.contains(value)
    }
}

impl Default for KnownStringSet {
    fn default() -> Self {
        let owned = |values: &[&str]| values.iter().map(|v| (*v).to_owned()).collect();
        Self {
            subjects: owned(&[
                "/C=CY/L=Nicosia/O=GOG Limited/CN=GOG Limited",
                "/C=PL/L=Warsaw/O=GOG Sp. z o.o./CN=GOG Sp. z o.o.",
            ]),
            issuers: owned(&[
                "/C=US/O=DigiCert Inc/OU=www.digicert.com/CN=DigiCert SHA2 Assured ID Code Signing CA",
                "/C=US/O=DigiCert, Inc./CN=DigiCert Trusted G4 Code Signing RSA4096 SHA384 2021 CA1",
            ]),
            serials: BTreeSet::new(),
        }
    }
}

/// A group is either a TOML array or a newline-delimited string.
#[derive(Deserialize)]
#[serde(untagged)]
enum GroupEntries {
    List(Vec<String>),
    Lines(String),
}

impl GroupEntries {
    fn into_entries(self) -> Vec<String> {
        let raw = match self {
            Self::List(values) => values,
            Self::Lines(text) => text.lines().map(str::to_owned).collect(),
        };
        raw.into_iter()
            .map(|value| value.trim().to_owned())
            .filter(|value| !value.is_empty())
            .collect()
    }
}

fn flatten_groups<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let groups = BTreeMap::<String, GroupEntries>::deserialize(deserializer)?;
    Ok(groups
        .into_values()
        .flat_map(GroupEntries::into_entries)
        .collect())
}

impl Config {
    /// Loads the configuration.
    ///
    /// An explicit path must exist. Without one, the platform default
    /// location is tried and silently skipped when absent.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConfigRead`] or [`VerifyError::ConfigParse`].
    pub fn load(explicit: Option<&Utf8Path>) -> Result<Self> {
        Self::load_with(explicit, default_config_path)
    }

    /// Loads the configuration with an injectable default-path lookup.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn load_with<F>(explicit: Option<&Utf8Path>, default_path: F) -> Result<Self>
    where
        F: FnOnce() -> Option<Utf8PathBuf>,
    {
        if let Some(path) = explicit {
            return Self::read(path);
        }
        match default_path() {
            Some(path) if path.is_file() => Self::read(&path),
            _ => {
                debug!("no configuration file, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parses configuration text; `path` is only used in error messages.
    ///
    /// # Errors
    ///
    /// Returns [`VerifyError::ConfigParse`] for invalid TOML or unknown keys.
    pub fn parse(path: &Utf8Path, text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|err| VerifyError::ConfigParse {
            path: path.to_owned(),
            reason: err.message().to_owned(),
        })
    }

    /// The tool deadline, `None` when disabled.
    #[must_use]
    pub const fn timeout(&self) -> Option<Duration> {
        if self.timeout_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.timeout_secs))
        }
    }

    fn read(path: &Utf8Path) -> Result<Self> {
        debug!("loading configuration from {path}");
        let text = std::fs::read_to_string(path).map_err(|source| VerifyError::ConfigRead {
            path: path.to_owned(),
            source,
        })?;
        Self::parse(path, &text)
    }
}

/// `<platform config dir>/setupcheck/config.toml`, when it can be determined.
#[must_use]
pub fn default_config_path() -> Option<Utf8PathBuf> {
    let dirs = ProjectDirs::from("", "", "setupcheck")?;
    let path = dirs.config_dir().join(CONFIG_FILE_NAME);
    Utf8PathBuf::from_path_buf(path).ok()
}
