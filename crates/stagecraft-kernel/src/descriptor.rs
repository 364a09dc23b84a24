//! Stage descriptors
//!
//! A descriptor is one named entry of the `stages` mapping. It is built once
//! at orchestrator construction and never mutated afterwards.

use stagecraft_registry::{check_item, check_stage_locator};
use stagecraft_settings::Settings;

use crate::error::{OrchestratorError, OrchestratorResult};

/// Key holding the stage locator
pub const ANALYSIS_STAGE: &str = "analysis_stage";
/// Section run before the stage
pub const STAGE_PREPROCESS: &str = "stage_preprocess";
/// Section run after the stage
pub const STAGE_POSTPROCESS: &str = "stage_postprocess";
/// Item list of modelers
pub const MODELERS: &str = "modelers";
/// Item list of operations
pub const OPERATIONS: &str = "operations";

/// Named stage entry
#[derive(Debug, Clone, PartialEq)]
pub struct StageDescriptor {
    name: String,
    settings: Settings,
}

impl StageDescriptor {
    /// Descriptor for `name` with its settings subtree
    #[must_use]
    pub fn new(name: impl Into<String>, settings: Settings) -> Self {
        Self {
            name: name.into(),
            settings,
        }
    }

    /// Stage name
    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Stage settings subtree
    #[inline]
    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Stage locator
    ///
    /// # Errors
    /// Missing or non-string `analysis_stage`
    pub fn analysis_stage(&self) -> OrchestratorResult<&str> {
        Ok(self.settings.get_string(ANALYSIS_STAGE)?)
    }

    /// Preprocess modeler items (empty when not declared)
    ///
    /// # Errors
    /// Malformed section
    pub fn preprocess_modelers(&self) -> OrchestratorResult<Vec<Settings>> {
        self.items(STAGE_PREPROCESS, MODELERS)
    }

    /// Preprocess operation items (empty when not declared)
    ///
    /// # Errors
    /// Malformed section
    pub fn preprocess_operations(&self) -> OrchestratorResult<Vec<Settings>> {
        self.items(STAGE_PREPROCESS, OPERATIONS)
    }

    /// Postprocess operation items (empty when not declared)
    ///
    /// # Errors
    /// Malformed section
    pub fn postprocess_operations(&self) -> OrchestratorResult<Vec<Settings>> {
        self.items(STAGE_POSTPROCESS, OPERATIONS)
    }

    fn items(&self, section: &str, list: &str) -> OrchestratorResult<Vec<Settings>> {
        if !self.settings.has(section) {
            return Ok(Vec::new());
        }
        let section = self.settings.get(section)?;
        if !section.has(list) {
            return Ok(Vec::new());
        }
        Ok(section.get_array(list)?)
    }

    /// Structural validation
    ///
    /// Does not construct anything and does not call the stage's own `check`,
    /// which belongs to the stage's `initialize`.
    ///
    /// # Errors
    /// - [`OrchestratorError::StructuralConfig`] for a malformed `Stages.`
    ///   locator, misplaced sections or malformed items, including `modelers`
    ///   under `stage_postprocess`
    /// - [`OrchestratorError::MissingKey`] / [`OrchestratorError::Schema`]
    ///   for a missing or non-string `analysis_stage`
    pub fn check(&self) -> OrchestratorResult<()> {
        if !self.settings.is_object() {
            return Err(OrchestratorError::structural(
                &self.name,
                "stage settings must be an object",
            ));
        }
        let locator = self.analysis_stage()?;
        check_stage_locator(locator)
            .map_err(|err| OrchestratorError::structural(&self.name, err.to_string()))?;

        if self.settings.has(STAGE_POSTPROCESS) {
            let postprocess = self.section(STAGE_POSTPROCESS)?;
            if postprocess.has(MODELERS) {
                return Err(OrchestratorError::structural(
                    &self.name,
                    "found 'modelers' in 'stage_postprocess'; place them in the next stage's 'stage_preprocess'",
                ));
            }
            self.check_section_keys(STAGE_POSTPROCESS, &postprocess, &[OPERATIONS])?;
            self.check_items(STAGE_POSTPROCESS, &postprocess, OPERATIONS)?;
        }

        if self.settings.has(STAGE_PREPROCESS) {
            let preprocess = self.section(STAGE_PREPROCESS)?;
            self.check_section_keys(STAGE_PREPROCESS, &preprocess, &[MODELERS, OPERATIONS])?;
            self.check_items(STAGE_PREPROCESS, &preprocess, MODELERS)?;
            self.check_items(STAGE_PREPROCESS, &preprocess, OPERATIONS)?;
        }
        Ok(())
    }

    fn section(&self, name: &str) -> OrchestratorResult<Settings> {
        let section = self.settings.get(name)?;
        if section.is_object() {
            Ok(section)
        } else {
            Err(OrchestratorError::structural(
                &self.name,
                format!("'{name}' must be an object"),
            ))
        }
    }

    fn check_section_keys(
        &self,
        name: &str,
        section: &Settings,
        allowed: &[&str],
    ) -> OrchestratorResult<()> {
        match section.keys().into_iter().find(|key| !allowed.contains(key)) {
            Some(key) => Err(OrchestratorError::structural(
                &self.name,
                format!("unexpected '{key}' in '{name}'"),
            )),
            None => Ok(()),
        }
    }

    fn check_items(&self, name: &str, section: &Settings, list: &str) -> OrchestratorResult<()> {
        if !section.has(list) {
            return Ok(());
        }
        let items = section.get_array(list).map_err(|_| {
            OrchestratorError::structural(&self.name, format!("'{name}.{list}' must be an array"))
        })?;
        for item in &items {
            if !item.is_object() {
                return Err(OrchestratorError::structural(
                    &self.name,
                    format!("items of '{name}.{list}' must be objects"),
                ));
            }
            check_item(item).map_err(|err| OrchestratorError::structural(&self.name, err.to_string()))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn descriptor(json: &str) -> StageDescriptor {
        StageDescriptor::new("stage", Settings::from_json_str(json).unwrap())
    }

    #[test]
    fn absent_sections_yield_empty_lists() {
        let stage = descriptor(r#"{"analysis_stage": "Stages.app.S"}"#);
        stage.check().unwrap();
        assert!(stage.preprocess_modelers().unwrap().is_empty());
        assert!(stage.postprocess_operations().unwrap().is_empty());
    }

    #[test]
    fn postprocess_modelers_are_structural_errors() {
        let stage = descriptor(
            r#"{"analysis_stage": "Stages.app.S",
                "stage_postprocess": {"modelers": []}}"#,
        );
        assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::StructuralConfig);
    }

    #[test]
    fn unknown_section_key_is_rejected() {
        let stage = descriptor(
            r#"{"analysis_stage": "Stages.app.S",
                "stage_preprocess": {"processes": []}}"#,
        );
        assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::StructuralConfig);
    }

    #[test]
    fn incomplete_item_is_structural() {
        let stage = descriptor(
            r#"{"analysis_stage": "Stages.app.S",
                "stage_preprocess": {"operations": [{"name": "Op"}]}}"#,
        );
        assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::StructuralConfig);
    }

    #[test]
    fn malformed_stage_locator_is_structural() {
        for locator in ["Stages.All.S", "Stages.S"] {
            let stage = descriptor(&format!(r#"{{"analysis_stage": "{locator}"}}"#));
            assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::StructuralConfig, "{locator}");
        }
        descriptor(r#"{"analysis_stage": "app.my_stage"}"#).check().unwrap();
    }

    #[test]
    fn missing_locator_is_missing_key() {
        let stage = descriptor(r#"{"stage_preprocess": {}}"#);
        assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::MissingKey);

        let stage = descriptor(r#"{"analysis_stage": 4}"#);
        assert_eq!(stage.check().unwrap_err().kind(), ErrorKind::Schema);
    }
}
