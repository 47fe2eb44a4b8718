//! Acceptance of a finished conversion.

use crate::error::ConvertError;
use crate::types::CheckReport;

use super::state::ConversionState;
use super::{ConversionResult, LoopExit};

/// Validate the terminal state and turn it into a result.
///
/// The file set must hold a manifest and a content script, and the last
/// check must have passed. A conversion that never ran a check gets a
/// synthesized failing report, so it fails here too.
pub fn finalize(
    state: ConversionState,
    exit: LoopExit,
    turns: usize,
) -> Result<ConversionResult, ConvertError> {
    if !state.has_core_files() {
        return Err(ConvertError::MissingRequiredFiles);
    }

    let (analysis, files, mut checks, notes) = state.into_parts();
    if checks.is_empty() {
        checks.push(CheckReport::missing());
    }

    if let Some(last) = checks.last().filter(|c| !c.pass) {
        let summary = if last.summary.is_empty() {
            "unknown check failure".to_string()
        } else {
            last.summary.clone()
        };
        return Err(ConvertError::CheckFailed { summary });
    }

    Ok(ConversionResult {
        analysis,
        files,
        checks,
        notes,
        exit,
        turns,
    })
}
