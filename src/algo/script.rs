//! Batch script generation.
//!
//! A profile plus a [`BatchJobConfig`] renders to a standalone Python
//! (pandas) script that renames, types and exports every input file. The
//! output is a pure function of its inputs: no timestamps, no randomness.
//!
//! The script matches columns by name only. It folds and tokenizes names
//! like [`normalize::tokenize`] and ranks fields by keyword overlap, then
//! matched-keyword count, then declaration order. It has no sample values
//! at rename time, so the type bonus from detection is not applied, and
//! each field is claimed by at most one column (the first in file order).

use std::hash::{Hash, Hasher};
use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use super::classifier::ClassifierConfig;
use super::dictionary::FieldDefinition;
use super::normalize;
use super::profile::Profile;
use crate::error::{ConfigIssue, MappingError, Resource, Result};

pub const DEFAULT_PREFIX: &str = "procesado";

const FILENAME_STEM: &str = "batch_processor";

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@@([A-Z_]+)@@").expect("placeholder pattern"));

/// Parameters for one batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJobConfig {
    pub profile_name: String,
    /// A directory of spreadsheets, or a CSV manifest with an `input_file` column.
    #[serde(alias = "csv_path")]
    pub source_path: String,
    pub output_folder: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_prefix: Option<String>,
}

impl BatchJobConfig {
    /// The prefix actually used for output files.
    pub fn prefix(&self) -> &str {
        self.file_prefix
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(DEFAULT_PREFIX)
    }

    fn check(&self) -> Result<()> {
        if self.profile_name.trim().is_empty() {
            return Err(MappingError::InvalidConfig(ConfigIssue::MissingProfileName));
        }
        if self.source_path.trim().is_empty() {
            return Err(MappingError::InvalidConfig(ConfigIssue::EmptySourcePath));
        }
        if self.output_folder.trim().is_empty() {
            return Err(MappingError::InvalidConfig(ConfigIssue::EmptyOutputFolder));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedScript {
    pub script: String,
    pub filename: String,
    pub profile_digest: String,
}

/// Resolves a profile by its exact name.
pub trait ProfileLookup {
    fn find_profile(&self, name: &str) -> Result<Option<Profile>>;
}

impl ProfileLookup for [Profile] {
    fn find_profile(&self, name: &str) -> Result<Option<Profile>> {
        let name = name.trim();
        Ok(self.iter().find(|p| p.name == name).cloned())
    }
}

/// Check the config, resolve its profile, and render.
pub fn generate<L>(lookup: &L, config: &BatchJobConfig) -> Result<GeneratedScript>
where
    L: ProfileLookup + ?Sized,
{
    config.check()?;
    let profile = lookup
        .find_profile(&config.profile_name)?
        .ok_or_else(|| MappingError::not_found(Resource::Profile, config.profile_name.trim()))?;
    render(&profile, config)
}

/// Render a script for an already-resolved profile.
pub fn render(profile: &Profile, config: &BatchJobConfig) -> Result<GeneratedScript> {
    config.check()?;
    if profile.fields.is_empty() {
        return Err(MappingError::InvalidConfig(ConfigIssue::EmptyFieldList));
    }

    let fields_json = serde_json::to_string(&profile.fields)?;
    let digest = profile_digest(&profile.fields)?;

    let threshold = format!("{:?}", ClassifierConfig::default().threshold);
    let values = [
        ("DIGEST", digest.clone()),
        ("PROFILE_NAME", py_str(&profile.name)?),
        ("SOURCE_PATH", py_str(config.source_path.trim())?),
        ("OUTPUT_FOLDER", py_str(config.output_folder.trim())?),
        ("FILE_PREFIX", py_str(config.prefix())?),
        ("THRESHOLD", threshold),
        ("FIELDS", py_str(&fields_json)?),
    ];
    let script = fill(TEMPLATE, &values);

    tracing::debug!(profile = %profile.name, digest = %digest, "rendered batch script");

    Ok(GeneratedScript {
        script,
        filename: script_filename(&profile.name),
        profile_digest: digest,
    })
}

/// `batch_processor_<slug>.py`, or `batch_processor.py` when the name has
/// no ASCII-representable tokens.
pub fn script_filename(profile_name: &str) -> String {
    let slug = normalize::slug(profile_name);
    if slug.is_empty() {
        format!("{FILENAME_STEM}.py")
    } else {
        format!("{FILENAME_STEM}_{slug}.py")
    }
}

/// Hex SipHash-1-3 of the serialized field list.
pub fn profile_digest(fields: &[FieldDefinition]) -> Result<String> {
    let json = serde_json::to_string(fields)?;
    let mut hasher = SipHasher13::new();
    json.hash(&mut hasher);
    Ok(format!("{:016x}", hasher.finish()))
}

/// Substitute every `@@NAME@@` slot in a single pass, so values that
/// themselves contain slot markers are copied through untouched.
fn fill(template: &str, values: &[(&str, String)]) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures<'_>| {
            values
                .iter()
                .find(|(key, _)| *key == &caps[1])
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

/// A double-quoted literal that Python reads back as the same string.
fn py_str(value: &str) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

const TEMPLATE: &str = r#"#!/usr/bin/env python3
# Batch processor generated by colmap.
# profile digest: @@DIGEST@@
"""Rename, type and export spreadsheet columns according to a mapping profile."""

import json
import re
import sys
from pathlib import Path

import pandas as pd

PROFILE_NAME = @@PROFILE_NAME@@
SOURCE_PATH = @@SOURCE_PATH@@
OUTPUT_FOLDER = @@OUTPUT_FOLDER@@
FILE_PREFIX = @@FILE_PREFIX@@
THRESHOLD = @@THRESHOLD@@
MIN_SUBSTRING_KEYWORD = 3
EXTENSIONS = (".xlsx", ".xls", ".csv")
FIELDS = json.loads(@@FIELDS@@)
FOLD = str.maketrans("àáâãäåèéêëìíîïòóôõöùúûüñçýÿ", "aaaaaaeeeeiiiiooooouuuuncyy")


def tokenize(text):
    folded = str(text).lower().translate(FOLD)
    return [t for t in re.split(r"[\W_]+", folded) if t]


def contains_tokens(haystack, needle):
    n = len(needle)
    return n > 0 and any(haystack[i:i + n] == needle for i in range(len(haystack) - n + 1))


def keyword_forms(field):
    seen, forms = set(), []
    for keyword in field.get("keywords", []):
        tokens = tokenize(keyword)
        joined = " ".join(tokens)
        if joined and joined not in seen:
            seen.add(joined)
            forms.append((joined, tokens))
    return forms


def score(tokens, field):
    joined = " ".join(tokens)
    compact = "".join(tokens)
    forms = keyword_forms(field)
    matched, exact = 0, False
    for kw_joined, kw_tokens in forms:
        kw_compact = "".join(kw_tokens)
        exact_hit = bool(joined) and (joined == kw_joined or compact == kw_compact)
        exact = exact or exact_hit
        substring = len(kw_joined) >= MIN_SUBSTRING_KEYWORD and (
            kw_joined in joined or kw_compact in compact
        )
        if exact_hit or contains_tokens(tokens, kw_tokens) or substring:
            matched += 1
    if exact:
        return 1.0, matched
    if not forms:
        return 0.0, 0
    return min(matched / len(forms), 1.0), matched


def build_mapping(columns):
    mapping = {}
    taken = set()
    for column in columns:
        tokens = tokenize(column)
        best, best_rank = None, (0.0, 0)
        for field in FIELDS:
            if field["name"] in taken:
                continue
            rank = score(tokens, field)
            if rank > best_rank:
                best, best_rank = field, rank
        if best is not None and best_rank[0] >= THRESHOLD:
            mapping[column] = best["name"]
            taken.add(best["name"])
    return mapping


def to_bool(value):
    key = str(value).strip().lower()
    if key in ("true", "yes", "si", "1", "1.0"):
        return True
    if key in ("false", "no", "0", "0.0"):
        return False
    return None


def coerce(series, data_type):
    if data_type == "number":
        return pd.to_numeric(series, errors="coerce")
    if data_type == "date":
        return pd.to_datetime(series, errors="coerce")
    if data_type == "boolean":
        return series.map(to_bool)
    return series.astype("string")


def input_files():
    source = Path(SOURCE_PATH)
    if source.is_dir():
        return sorted(p for p in source.iterdir() if p.suffix.lower() in EXTENSIONS)
    manifest = pd.read_csv(source)
    if "input_file" not in manifest.columns:
        raise SystemExit(f"manifest {source} has no input_file column")
    return [Path(str(v)) for v in manifest["input_file"] if not pd.isna(v)]


def read_table(path):
    if path.suffix.lower() == ".csv":
        return pd.read_csv(path)
    return pd.read_excel(path)


def process_batch():
    output = Path(OUTPUT_FOLDER)
    output.mkdir(parents=True, exist_ok=True)
    required = [f["name"] for f in FIELDS if f.get("required")]
    types = {f["name"]: f.get("data_type", "text") for f in FIELDS}

    files = input_files()
    print(f"profile {PROFILE_NAME}: {len(files)} file(s)")
    failures = 0
    for n, path in enumerate(files, start=1):
        if not path.exists():
            print(f"  missing: {path}", file=sys.stderr)
            failures += 1
            continue
        try:
            df = read_table(path)
            df.columns = [str(c) for c in df.columns]
            df = df.rename(columns=build_mapping(list(df.columns)))
            for name, data_type in types.items():
                if name in df.columns:
                    df[name] = coerce(df[name], data_type)
            missing = [name for name in required if name not in df.columns]
            if missing:
                print(
                    f"  warning: {path.name} lacks required field(s): {', '.join(missing)}",
                    file=sys.stderr,
                )
            target = output / f"{FILE_PREFIX}_{n}_{path.stem}.xlsx"
            df.to_excel(target, index=False)
            print(f"  {path} -> {target}")
        except Exception as exc:
            failures += 1
            print(f"  error processing {path}: {exc}", file=sys.stderr)
    return failures


if __name__ == "__main__":
    sys.exit(1 if process_batch() else 0)
"#;
