//! Pre-flight checks for the external tools the selected stages need.
//!
//! A missing signature verifier or extractor is fatal before any head is
//! processed. The RAR helper is optional and probed per head by the
//! extraction stage instead.

use crate::config::ToolConfig;
use crate::error::{Result, VerifyError};
use crate::exec::{CommandExecutor, tool_exists};
use crate::pipeline::StageSelection;
use log::debug;

const SIGNATURE_HINT: &str = "install osslsigncode from https://github.com/mtrojnar/osslsigncode";
const EXTRACTOR_HINT: &str = "install innoextract from https://constexpr.org/innoextract/";

/// A tool a stage cannot run without.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequiredTool {
    /// Executable name or path.
    pub name: String,
    /// Where to obtain it.
    pub hint: &'static str,
}

/// Lists the tools needed by the selected stages.
///
/// # Examples
///
/// ```
/// use setupcheck::config::ToolConfig;
/// use setupcheck::deps::required_tools;
/// use setupcheck::pipeline::StageSelection;
///
/// let tools = required_tools(&StageSelection::all(), &ToolConfig::default());
/// let names: Vec<_> = tools.iter().map(|tool| tool.name.as_str()).collect();
/// assert_eq!(names, ["osslsigncode", "innoextract"]);
/// ```
#[must_use]
pub fn required_tools(stages: &StageSelection, tools: &ToolConfig) -> Vec<RequiredTool> {
    let mut required = Vec::new();
    if stages.signature {
        required.push(RequiredTool {
            name: tools.signature.clone(),
            hint: SIGNATURE_HINT,
        });
    }
    if stages.extraction.is_some() {
        required.push(RequiredTool {
            name: tools.extractor.clone(),
            hint: EXTRACTOR_HINT,
        });
    }
    required
}

/// Fails on the first required tool that cannot be spawned.
///
/// # Errors
///
/// Returns [`VerifyError::MissingTool`] naming the tool and where to get it.
pub fn check_required_tools(
    executor: &dyn CommandExecutor,
    stages: &StageSelection,
    tools: &ToolConfig,
) -> Result<()> {
    for tool in required_tools(stages, tools) {
        if !tool_exists(executor, &tool.name) {
            return Err(VerifyError::MissingTool {
                tool: tool.name,
                hint: tool.hint,
            });
        }
        debug!("found required tool {}", tool.name);
    }
    Ok(())
}
