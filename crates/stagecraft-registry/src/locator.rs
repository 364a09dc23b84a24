//! Stage locator conventions

use crate::error::{RegistryError, RegistryResult};

/// Prefix of registry-style stage locators
pub const STAGE_PREFIX: &str = "Stages.";

/// Class name assumed for a module path that is not registered
///
/// The last dotted segment is split on underscores and each word is
/// title-cased, so `app.fluid_dynamics_analysis` becomes
/// `FluidDynamicsAnalysis` and `app.stage2d_analysis` becomes
/// `Stage2DAnalysis`.
#[must_use]
pub fn camel_case_class_name(module_path: &str) -> String {
    let last = module_path.rsplit('.').next().unwrap_or(module_path);
    last.split('_').map(capitalize).collect()
}

/// Title-case a word: a letter is uppercased when it follows a non-letter
/// (or starts the word) and lowercased otherwise, so `2d` becomes `2D`
fn capitalize(word: &str) -> String {
    let mut titled = String::with_capacity(word.len());
    let mut previous_alphabetic = false;
    for c in word.chars() {
        if previous_alphabetic {
            titled.extend(c.to_lowercase());
        } else {
            titled.extend(c.to_uppercase());
        }
        previous_alphabetic = c.is_alphabetic();
    }
    titled
}

/// Module named by a `Stages.<module>.<Class>` locator
///
/// `None` when there is no module segment between prefix and class.
pub(crate) fn stage_module_name(locator: &str) -> Option<String> {
    let rest = locator.strip_prefix(STAGE_PREFIX)?;
    let (module, class) = rest.rsplit_once('.')?;
    if module.is_empty() || class.is_empty() {
        return None;
    }
    Some(module.to_string())
}

/// Check the syntax of a stage locator without resolving it
///
/// `Stages.` locators need a module segment other than `All`; any other
/// string is a module path and is accepted.
///
/// # Errors
/// Returns [`RegistryError::InvalidLocator`] for a malformed `Stages.` locator
pub fn check_stage_locator(locator: &str) -> RegistryResult<()> {
    if locator.starts_with(STAGE_PREFIX) {
        stage_locator_module(locator)?;
    }
    Ok(())
}

/// Module of a `Stages.` locator, validated
pub(crate) fn stage_locator_module(locator: &str) -> RegistryResult<String> {
    let module = stage_module_name(locator).ok_or_else(|| RegistryError::InvalidLocator {
        locator: locator.to_string(),
        reason: "expected 'Stages.<module>.<Class>'".to_string(),
    })?;
    if module == "All" {
        return Err(RegistryError::InvalidLocator {
            locator: locator.to_string(),
            reason: "'Stages.All' cannot be used as a stage locator".to_string(),
        });
    }
    Ok(module)
}

/// Last dotted segment of an identifier
pub(crate) fn last_segment(id: &str) -> &str {
    id.rsplit('.').next().unwrap_or(id)
}
