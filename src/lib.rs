//! setupcheck library.
//!
//! Verifies multi-part installer archives: an executable head plus numbered
//! `-NN.bin` part files. The head's digital signature is checked with an
//! external verifier, part files are matched against the MD5 manifest the
//! head embeds, and the payload is listed and test-extracted with an
//! external extractor. The `setupcheck` binary is a thin shell over
//! [`pipeline::Verifier`].
//!
//! # Modules
//!
//! - [`checksum`] - Part file reconciliation against the embedded manifest
//! - [`cli`] - Command-line argument definitions
//! - [`config`] - Configuration file loading
//! - [`deps`] - Required external tool checks
//! - [`digest`] - MD5 digest newtype and file hashing
//! - [`discovery`] - Installer head and part file discovery
//! - [`error`] - Run-level error types
//! - [`exec`] - External command execution with deadlines
//! - [`extraction`] - Payload probing and test extraction
//! - [`outcome`] - Stage outcomes and the failure taxonomy
//! - [`output`] - Verbosity-aware user output
//! - [`pipeline`] - Per-head stage orchestration
//! - [`report`] - Aggregated results and exit status
//! - [`signature`] - Signature verification and output classification
//! - [`trailer`] - Embedded checksum manifest decoding

pub mod checksum;
pub mod cli;
pub mod config;
pub mod deps;
pub mod digest;
pub mod discovery;
pub mod error;
pub mod exec;
pub mod extraction;
pub mod outcome;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod signature;
#[cfg(any(test, feature = "test-support"))]
pub mod test_utils;
pub mod trailer;
