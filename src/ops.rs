//! Shared operation wrappers for every interface.
//!
//! Each `op_*` function is a synchronous wrapper around one or more `algo`
//! modules. Input and output are `serde_json::Value`, so the CLI (or any
//! other front end) only deals with parsing arguments and printing.

use serde_json::{json, Map, Value};

use crate::algo::aggregate::{self, AnalysisResult, ColumnSample, FileColumns};
use crate::algo::classifier::ClassifierConfig;
use crate::algo::dictionary::{FieldDefinition, FieldDictionary};
use crate::algo::profile::ProfileDraft;
use crate::algo::script::{self, BatchJobConfig};
use crate::algo::storage::{JobStore, ProfileStore};
use crate::error::{MappingError, Resource, Result};

// ── Helpers ──────────────────────────────────────────────────────────────────

/// Extract a text field from a JSON object, returning "" if missing.
pub fn get_text(row: &Value, field: &str) -> String {
    row.get(field)
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Stringify a spreadsheet cell. `null` becomes blank.
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Lenient conversion of one `{file, columns: [{name, values}]}` object.
/// A missing column name becomes blank and is rejected by the aggregator.
pub fn parse_file_columns(value: &Value) -> FileColumns {
    let columns = value
        .get("columns")
        .and_then(Value::as_array)
        .map(|cols| {
            cols.iter()
                .map(|c| ColumnSample {
                    name: get_text(c, "name"),
                    values: c
                        .get("values")
                        .and_then(Value::as_array)
                        .map(|vs| vs.iter().map(cell_text).collect())
                        .unwrap_or_default(),
                })
                .collect()
        })
        .unwrap_or_default();

    FileColumns {
        file: get_text(value, "file"),
        columns,
    }
}

fn to_value<T: serde::Serialize>(value: &T) -> Result<Value> {
    Ok(serde_json::to_value(value)?)
}

fn parse_draft(payload: &Value) -> Result<ProfileDraft> {
    let fields: Vec<FieldDefinition> = match payload.get("fields") {
        Some(Value::Null) | None => Vec::new(),
        Some(v) => serde_json::from_value(v.clone())?,
    };
    Ok(ProfileDraft {
        name: get_text(payload, "name"),
        description: payload
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        fields,
    })
}

/// Render an error as the `{"error", "detail"}` object front ends print.
pub fn error_value(err: &MappingError) -> Value {
    json!({"error": err.kind(), "detail": err.to_string()})
}

// ── Detection ────────────────────────────────────────────────────────────────

pub fn op_analyze(
    files: &[Value],
    dictionary: &FieldDictionary,
    config: &ClassifierConfig,
) -> Result<Value> {
    let files: Vec<FileColumns> = files.iter().map(parse_file_columns).collect();
    let result = aggregate::analyze(&files, dictionary, config)?;
    to_value(&result)
}

/// Classify files against a stored profile instead of a dictionary file.
pub fn op_analyze_with_profile(
    store: &ProfileStore,
    files: &[Value],
    profile_name: &str,
    config: &ClassifierConfig,
) -> Result<Value> {
    let profile = store
        .find_by_name(profile_name)?
        .ok_or_else(|| MappingError::not_found(Resource::Profile, profile_name.trim()))?;
    op_analyze(files, &profile.to_dictionary()?, config)
}

pub fn op_dictionary(dictionary: &FieldDictionary) -> Result<Value> {
    to_value(dictionary)
}

// ── Profiles ─────────────────────────────────────────────────────────────────

pub fn op_profile_create(store: &ProfileStore, payload: &Value) -> Result<Value> {
    let profile = store.create(parse_draft(payload)?)?;
    to_value(&profile)
}

pub fn op_profile_get(store: &ProfileStore, id: &str) -> Result<Value> {
    to_value(&store.get(id)?)
}

pub fn op_profile_update(store: &ProfileStore, id: &str, payload: &Value) -> Result<Value> {
    let profile = store.update(id, parse_draft(payload)?)?;
    to_value(&profile)
}

pub fn op_profile_delete(store: &ProfileStore, id: &str) -> Result<Value> {
    store.delete(id)?;
    Ok(json!({"deleted": id}))
}

pub fn op_profile_list(store: &ProfileStore) -> Result<Value> {
    to_value(&store.list()?)
}

pub fn op_profile_search(store: &ProfileStore, query: &str) -> Result<Value> {
    to_value(&store.search(query)?)
}

/// Turn an `analyze` result into a stored profile.
pub fn op_profile_from_analysis(
    store: &ProfileStore,
    analysis: &Value,
    name: &str,
    description: Option<&str>,
) -> Result<Value> {
    let result: AnalysisResult = serde_json::from_value(analysis.clone())?;
    let draft = ProfileDraft::from_analysis(&result, name, description.map(str::to_string));
    let profile = store.create(draft)?;
    to_value(&profile)
}

// ── Batch scripts and jobs ───────────────────────────────────────────────────

pub fn op_generate_script(store: &ProfileStore, config: &Value) -> Result<Value> {
    let config = parse_job_config(config)?;
    to_value(&script::generate(store, &config)?)
}

/// Generate the script for a previously saved job.
pub fn op_job_script(store: &ProfileStore, jobs: &JobStore, name: &str) -> Result<Value> {
    let job = jobs.get_job(name)?;
    to_value(&script::generate(store, &job.config)?)
}

pub fn op_job_save(jobs: &JobStore, name: &str, config: &Value) -> Result<Value> {
    let config = parse_job_config(config)?;
    to_value(&jobs.save_job(name, &config)?)
}

pub fn op_job_get(jobs: &JobStore, name: &str) -> Result<Value> {
    to_value(&jobs.get_job(name)?)
}

pub fn op_job_list(jobs: &JobStore) -> Result<Value> {
    to_value(&jobs.list_jobs()?)
}

/// Missing strings become blank so the generator reports which one.
fn parse_job_config(value: &Value) -> Result<BatchJobConfig> {
    let mut obj = value.as_object().cloned().unwrap_or_else(Map::new);
    if let Some(csv) = obj.remove("csv_path") {
        obj.entry("source_path").or_insert(csv);
    }
    for key in ["profile_name", "source_path", "output_folder"] {
        let entry = obj.entry(key).or_insert(Value::Null);
        if entry.is_null() {
            *entry = Value::String(String::new());
        }
    }
    Ok(serde_json::from_value(Value::Object(obj))?)
}
