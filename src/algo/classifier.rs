use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::dictionary::{DataType, FieldDictionary, FieldMatch};
use super::inference;
use super::normalize::NormalizedName;

/// Tunables for column classification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Minimum confidence for a suggestion to be kept.
    pub threshold: f64,
    /// Multiplier applied when inferred and expected types agree.
    pub type_bonus: f64,
    /// Max sample values inspected per column. `None` uses every value.
    pub sample_limit: Option<usize>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            type_bonus: 1.2,
            sample_limit: None,
        }
    }
}

/// The classifier's inference for one column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedField {
    pub original_column: String,
    /// `None` when no field clears the threshold.
    pub suggested_field: Option<String>,
    /// Inferred from the values, independent of the keyword match.
    pub data_type: DataType,
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

/// Classify one column against a dictionary snapshot.
///
/// Never fails: unmatched names and odd values degrade to a `None`
/// suggestion with a low confidence.
pub fn classify_column(
    column: &str,
    values: &[String],
    dictionary: &FieldDictionary,
    config: &ClassifierConfig,
) -> DetectedField {
    let sample = match config.sample_limit {
        Some(n) => &values[..n.min(values.len())],
        None => values,
    };
    let name = NormalizedName::new(column);
    let data_type = inference::infer_data_type(sample);

    let best = best_match(dictionary.matches(&name, data_type, config.type_bonus));

    match best {
        Some(m) if m.confidence > 0.0 && m.confidence >= config.threshold => DetectedField {
            original_column: column.to_string(),
            suggested_field: Some(m.field.name.clone()),
            data_type,
            confidence: m.confidence,
            matched_keywords: m.matched_keywords,
        },
        rejected => DetectedField {
            original_column: column.to_string(),
            suggested_field: None,
            data_type,
            confidence: rejected.map(|m| m.confidence).unwrap_or(0.0),
            matched_keywords: Vec::new(),
        },
    }
}

/// Highest confidence wins; ties go to more matched keywords, then to
/// the earlier declaration.
fn best_match(candidates: Vec<FieldMatch<'_>>) -> Option<FieldMatch<'_>> {
    candidates.into_iter().min_by(rank)
}

fn rank(a: &FieldMatch<'_>, b: &FieldMatch<'_>) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| b.matched_keywords.len().cmp(&a.matched_keywords.len()))
        .then_with(|| a.index.cmp(&b.index))
}
