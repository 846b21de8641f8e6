//! Final analysis results payload.

use serde::{Deserialize, Serialize};

/// Structured results fetched once after a job completes.
///
/// The payload is opaque to the tracker; the accessors below only pick
/// out the collections the presentation layer lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnalysisResults(serde_json::Value);

impl AnalysisResults {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Vulnerabilities that survived the verification stage.
    pub fn rechecked_vulnerabilities(&self) -> &[serde_json::Value] {
        self.array_field("rechecked_vulnerabilities")
    }

    /// Generated proof-of-concept exploits.
    pub fn generated_pocs(&self) -> &[serde_json::Value] {
        self.array_field("generated_pocs")
    }

    /// Backend marker for a run that found nothing to verify.
    pub fn no_vulnerability_found(&self) -> bool {
        self.0.get("status").and_then(|s| s.as_str()) == Some("no_vulnerability_found")
    }

    fn array_field(&self, key: &str) -> &[serde_json::Value] {
        self.0
            .get(key)
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_pick_out_collections() {
        let results = AnalysisResults::new(serde_json::json!({
            "rechecked_vulnerabilities": [{"vulnerability_type": "reentrancy"}],
            "generated_pocs": [{"exploit_code": "..."}, {"exploit_code": "..."}],
        }));
        assert_eq!(results.rechecked_vulnerabilities().len(), 1);
        assert_eq!(results.generated_pocs().len(), 2);
        assert!(!results.no_vulnerability_found());
    }

    #[test]
    fn missing_collections_are_empty() {
        let results = AnalysisResults::new(serde_json::json!({"status": "no_vulnerability_found"}));
        assert!(results.rechecked_vulnerabilities().is_empty());
        assert!(results.generated_pocs().is_empty());
        assert!(results.no_vulnerability_found());
    }
}
