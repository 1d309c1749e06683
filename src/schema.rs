//! Declared output schema and response parsing.
//!
//! The model is asked for one of two shapes. `List` is the default: an array
//! of `{test_id, relevance, complexity}` records, reshaped here into a
//! mapping keyed by `test_id`. `Map` asks for the mapping directly and is
//! persisted as returned.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::error::AnalysisError;
use crate::models::{ResultMapping, Scores, TestCaseAnalysis};

/// Shape the model is asked to return.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// Array of records carrying their own test id
    #[default]
    List,
    /// Object keyed by test id
    Map,
}

impl ResponseShape {
    /// Fixed instruction sent alongside the two uploaded files.
    pub fn instruction(&self) -> &'static str {
        match self {
            ResponseShape::List => LIST_INSTRUCTION,
            ResponseShape::Map => MAP_INSTRUCTION,
        }
    }

    /// JSON Schema the response is constrained to.
    pub fn json_schema(&self) -> Value {
        let scores = json!({
            "type": "object",
            "properties": {
                "relevance": { "type": "number" },
                "complexity": { "type": "number" }
            },
            "required": ["relevance", "complexity"]
        });

        match self {
            ResponseShape::List => json!({
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "test_id": { "type": "string" },
                        "relevance": { "type": "number" },
                        "complexity": { "type": "number" }
                    },
                    "required": ["test_id", "relevance", "complexity"]
                }
            }),
            ResponseShape::Map => json!({
                "type": "object",
                "additionalProperties": scores
            }),
        }
    }
}

const LIST_INSTRUCTION: &str = "Analyze the attached Git Diff and Test Cases. \
Return a list containing an analysis for every test case found.";

const MAP_INSTRUCTION: &str = "Analyze the attached Git Diff and Test Cases. \
Determine the relevance and complexity of every test case found, keyed by test id.";

/// Parse the model's JSON text under the declared shape.
///
/// An empty result counts as a schema failure: the model answered with
/// valid JSON that carries no analysis.
pub fn parse_response(text: &str, shape: ResponseShape) -> Result<ResultMapping, AnalysisError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AnalysisError::schema("model returned an empty response"));
    }

    let mapping = match shape {
        ResponseShape::List => {
            let records: Vec<TestCaseAnalysis> = serde_json::from_str(text)
                .map_err(|e| AnalysisError::schema(format!("expected a list of analyses: {}", e)))?;
            debug!("Parsed {} analysis records", records.len());
            reshape(records)
        }
        ResponseShape::Map => serde_json::from_str::<ResultMapping>(text).map_err(|e| {
            AnalysisError::schema(format!("expected a mapping of test id to scores: {}", e))
        })?,
    };

    if mapping.is_empty() {
        return Err(AnalysisError::schema(
            "model returned valid JSON but no test case analyses",
        ));
    }

    Ok(mapping)
}

/// Move each record's `test_id` out of the value and into the key.
pub fn reshape(records: Vec<TestCaseAnalysis>) -> ResultMapping {
    let mut mapping = ResultMapping::new();

    for record in records {
        let (id, scores): (String, Scores) = record.into_entry();
        if mapping.insert(id.clone(), scores).is_some() {
            warn!("Duplicate test id {} in response, keeping the last entry", id);
        }
    }

    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reshape_moves_id_into_key() {
        let text = r#"[{"test_id":"TC001","relevance":0.9,"complexity":0.5}]"#;
        let mapping = parse_response(text, ResponseShape::List).unwrap();

        assert_eq!(mapping.len(), 1);
        assert_eq!(
            mapping["TC001"],
            Scores {
                relevance: 0.9,
                complexity: 0.5
            }
        );
        let value = serde_json::to_value(&mapping).unwrap();
        assert_eq!(
            value,
            json!({"TC001": {"relevance": 0.9, "complexity": 0.5}})
        );
    }

    #[test]
    fn test_map_shape_passes_through() {
        let text = r#"{
            "test_login": {"relevance": 1.0, "complexity": 0.8},
            "test_logout": {"relevance": 0.2, "complexity": 0.4}
        }"#;
        let mapping = parse_response(text, ResponseShape::Map).unwrap();

        let expected: Value = serde_json::from_str(text).unwrap();
        assert_eq!(serde_json::to_value(&mapping).unwrap(), expected);
    }

    #[test]
    fn test_duplicate_ids_keep_last() {
        let mapping = reshape(vec![
            TestCaseAnalysis {
                test_id: "a".to_string(),
                relevance: 0.1,
                complexity: 0.1,
            },
            TestCaseAnalysis {
                test_id: "a".to_string(),
                relevance: 0.7,
                complexity: 0.3,
            },
        ]);
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping["a"].relevance, 0.7);
    }

    #[test]
    fn test_wrong_shape_is_schema_error() {
        let text = r#"{"TC001": {"relevance": 0.9, "complexity": 0.5}}"#;
        let err = parse_response(text, ResponseShape::List).unwrap_err();
        assert!(matches!(err, AnalysisError::Schema(_)));
    }

    #[test]
    fn test_non_numeric_score_is_schema_error() {
        let text = r#"[{"test_id":"TC001","relevance":"high","complexity":0.5}]"#;
        let err = parse_response(text, ResponseShape::List).unwrap_err();
        assert!(matches!(err, AnalysisError::Schema(_)));
    }

    #[test]
    fn test_empty_results_are_schema_errors() {
        assert!(matches!(
            parse_response("[]", ResponseShape::List),
            Err(AnalysisError::Schema(_))
        ));
        assert!(matches!(
            parse_response("{}", ResponseShape::Map),
            Err(AnalysisError::Schema(_))
        ));
        assert!(matches!(
            parse_response("  ", ResponseShape::List),
            Err(AnalysisError::Schema(_))
        ));
    }

    #[test]
    fn test_schema_documents() {
        let list = ResponseShape::List.json_schema();
        assert_eq!(list["type"], "array");
        assert_eq!(list["items"]["properties"]["test_id"]["type"], "string");

        let map = ResponseShape::Map.json_schema();
        assert_eq!(map["type"], "object");
        assert_eq!(map["additionalProperties"]["properties"]["relevance"]["type"], "number");
    }

    #[test]
    fn test_instruction_per_shape() {
        assert!(ResponseShape::List.instruction().contains("Return a list"));
        assert!(ResponseShape::Map.instruction().contains("keyed by test id"));
    }
}
