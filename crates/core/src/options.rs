//! Options sent with a start-analysis request.

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Model used by every stage unless overridden.
pub const DEFAULT_MODEL: &str = "o3-mini";

/// Default budget of fix attempts for generated exploits.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Upper bound accepted for `max_retries`.
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Report format exported alongside the results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    Markdown,
}

/// Per-run configuration of the analysis pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisOptions {
    /// Model for the detection stage.
    pub analyzer_model: String,
    /// Model for the verification stage.
    pub skeptic_model: String,
    /// Model for the exploit-planning stage.
    pub exploiter_model: String,
    /// Model for the proof-of-concept generation stage.
    pub generator_model: String,
    /// Execute generated exploits automatically.
    pub auto_run: bool,
    /// Bounded fix-retry budget for the execution stage.
    pub max_retries: u32,
    /// Use retrieval-augmented context during detection.
    pub use_rag: bool,
    /// Stop after verification without generating exploits.
    pub skip_poc_generation: bool,
    pub export_format: Option<ExportFormat>,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            analyzer_model: DEFAULT_MODEL.to_string(),
            skeptic_model: DEFAULT_MODEL.to_string(),
            exploiter_model: DEFAULT_MODEL.to_string(),
            generator_model: DEFAULT_MODEL.to_string(),
            auto_run: true,
            max_retries: DEFAULT_MAX_RETRIES,
            use_rag: true,
            skip_poc_generation: false,
            export_format: None,
        }
    }
}

impl AnalysisOptions {
    /// Check the options before they are sent.
    ///
    /// All problems are reported together in one validation error.
    pub fn validate(&self) -> Result<(), CoreError> {
        let mut errors = Vec::new();

        let models = [
            ("analyzer_model", &self.analyzer_model),
            ("skeptic_model", &self.skeptic_model),
            ("exploiter_model", &self.exploiter_model),
            ("generator_model", &self.generator_model),
        ];
        for (field, value) in models {
            if value.trim().is_empty() {
                errors.push(format!("{field} must not be empty"));
            }
        }

        if self.max_retries > MAX_RETRIES_LIMIT {
            errors.push(format!(
                "max_retries must be at most {MAX_RETRIES_LIMIT}, got {}",
                self.max_retries
            ));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(CoreError::Validation(errors.join("; ")))
        }
    }

    /// Apply one model to every stage.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        self.analyzer_model = model.clone();
        self.skeptic_model = model.clone();
        self.exploiter_model = model.clone();
        self.generator_model = model;
        self
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn defaults_are_valid() {
        let options = AnalysisOptions::default();
        assert!(options.validate().is_ok());
        assert_eq!(options.analyzer_model, "o3-mini");
        assert!(options.auto_run);
        assert_eq!(options.max_retries, 3);
        assert!(options.use_rag);
        assert!(!options.skip_poc_generation);
        assert!(options.export_format.is_none());
    }

    #[test]
    fn empty_model_is_rejected() {
        let options = AnalysisOptions {
            skeptic_model: "  ".into(),
            ..Default::default()
        };
        assert_matches!(
            options.validate(),
            Err(CoreError::Validation(msg)) if msg.contains("skeptic_model")
        );
    }

    #[test]
    fn retry_budget_is_bounded() {
        let options = AnalysisOptions {
            max_retries: 11,
            ..Default::default()
        };
        assert_matches!(
            options.validate(),
            Err(CoreError::Validation(msg)) if msg.contains("max_retries")
        );
    }

    #[test]
    fn all_problems_are_reported_together() {
        let options = AnalysisOptions {
            analyzer_model: String::new(),
            generator_model: String::new(),
            max_retries: 50,
            ..Default::default()
        };
        let err = options.validate().unwrap_err().to_string();
        assert!(err.contains("analyzer_model"));
        assert!(err.contains("generator_model"));
        assert!(err.contains("max_retries"));
    }

    #[test]
    fn with_model_sets_every_stage() {
        let options = AnalysisOptions::default().with_model("gpt-4o");
        assert_eq!(options.analyzer_model, "gpt-4o");
        assert_eq!(options.skeptic_model, "gpt-4o");
        assert_eq!(options.exploiter_model, "gpt-4o");
        assert_eq!(options.generator_model, "gpt-4o");
    }

    #[test]
    fn export_format_serializes_lowercase() {
        let options = AnalysisOptions {
            export_format: Some(ExportFormat::Markdown),
            ..Default::default()
        };
        let json = serde_json::to_value(&options).unwrap();
        assert_eq!(json["export_format"], "markdown");
    }
}
