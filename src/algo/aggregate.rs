//! Detection across many files.
//!
//! Every (file, column) pair is classified once, in parallel; results are
//! merged by normalized column name in first-seen order. The merge is
//! sequential so the output never depends on thread scheduling.

use std::collections::{BTreeMap, HashMap};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::classifier::{self, ClassifierConfig, DetectedField};
use super::dictionary::FieldDictionary;
use super::normalize;
use crate::error::{MappingError, Result, ValidationIssue};

/// One column as handed over by the extraction collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSample {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

impl ColumnSample {
    pub fn new(name: impl Into<String>, values: &[&str]) -> Self {
        Self {
            name: name.into(),
            values: values.iter().map(|v| v.to_string()).collect(),
        }
    }
}

/// The parsed columns of one input file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileColumns {
    pub file: String,
    #[serde(default)]
    pub columns: Vec<ColumnSample>,
}

/// Per-file summary kept alongside the aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileSummary {
    pub file: String,
    pub columns: Vec<String>,
    /// Longest sample among the file's columns.
    pub rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_files: usize,
    pub total_columns: usize,
    pub unique_columns: usize,
    pub files_analyzed: Vec<FileSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub detected_fields: Vec<DetectedField>,
    pub statistics: Statistics,
    pub column_frequency: BTreeMap<String, usize>,
    pub dictionary_version: String,
}

/// Run detection over a set of files with one dictionary snapshot.
///
/// Fails only on structurally malformed input: a column with no usable
/// name. Empty files and an empty file set produce zero counts.
pub fn analyze(
    files: &[FileColumns],
    dictionary: &FieldDictionary,
    config: &ClassifierConfig,
) -> Result<AnalysisResult> {
    validate(files)?;

    let pairs: Vec<&ColumnSample> = files.iter().flat_map(|f| &f.columns).collect();
    let classified: Vec<DetectedField> = pairs
        .par_iter()
        .map(|c| classifier::classify_column(&c.name, &c.values, dictionary, config))
        .collect();

    let mut column_frequency: BTreeMap<String, usize> = BTreeMap::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut detected_fields: Vec<DetectedField> = Vec::new();

    for (column, detection) in pairs.iter().zip(classified) {
        let key = normalize::normalize(&column.name);
        *column_frequency.entry(key.clone()).or_insert(0) += 1;

        match slots.get(&key) {
            Some(&i) => {
                if detection.confidence > detected_fields[i].confidence {
                    detected_fields[i] = detection;
                }
            }
            None => {
                slots.insert(key, detected_fields.len());
                detected_fields.push(detection);
            }
        }
    }

    let files_analyzed: Vec<FileSummary> = files
        .iter()
        .map(|f| {
            tracing::debug!(file = %f.file, columns = f.columns.len(), "classified file");
            FileSummary {
                file: f.file.clone(),
                columns: f.columns.iter().map(|c| c.name.clone()).collect(),
                rows: f.columns.iter().map(|c| c.values.len()).max().unwrap_or(0),
            }
        })
        .collect();

    let statistics = Statistics {
        total_files: files.len(),
        total_columns: pairs.len(),
        unique_columns: column_frequency.len(),
        files_analyzed,
    };

    tracing::info!(
        files = statistics.total_files,
        columns = statistics.total_columns,
        unique = statistics.unique_columns,
        suggested = detected_fields
            .iter()
            .filter(|d| d.suggested_field.is_some())
            .count(),
        "analysis complete"
    );

    Ok(AnalysisResult {
        detected_fields,
        statistics,
        column_frequency,
        dictionary_version: dictionary.version().to_string(),
    })
}

fn validate(files: &[FileColumns]) -> Result<()> {
    for f in files {
        for (index, column) in f.columns.iter().enumerate() {
            if normalize::tokenize(&column.name).is_empty() {
                return Err(MappingError::Validation(ValidationIssue::EmptyColumnName {
                    file: f.file.clone(),
                    index,
                }));
            }
        }
    }
    Ok(())
}
