use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::normalize::{self, NormalizedName};
use crate::config;
use crate::error::{MappingError, Result, ValidationIssue};

/// Embedded default dictionary, compiled from `dictionaries/default.json`.
/// Users override by placing a file at `$XDG_DATA_HOME/colmap/dictionary.json`
/// or `$COLMAP_DICTIONARY` env var, or passing `--dictionary <path>`.
const EMBEDDED_DEFAULT: &str = include_str!("../../dictionaries/default.json");

/// Keywords shorter than this only fire on whole-token equality.
const MIN_SUBSTRING_KEYWORD: usize = 3;

/// Expected shape of a field's values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    #[serde(alias = "texto", alias = "email")]
    Text,
    #[serde(alias = "numero")]
    Number,
    #[serde(alias = "fecha")]
    Date,
    #[serde(alias = "booleano")]
    Boolean,
    #[serde(alias = "identificador")]
    Identifier,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Number => "number",
            Self::Date => "date",
            Self::Boolean => "boolean",
            Self::Identifier => "identifier",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical target field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDefinition {
    pub name: String,
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default = "default_data_type")]
    pub data_type: DataType,
    #[serde(default)]
    pub required: bool,
}

fn default_data_type() -> DataType {
    DataType::Text
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, keywords: &[&str], data_type: DataType) -> Self {
        Self {
            name: name.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            data_type,
            required: false,
        }
    }

    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
}

/// Scored candidate for one column against one field.
#[derive(Debug, Clone)]
pub struct FieldMatch<'a> {
    pub field: &'a FieldDefinition,
    /// Declaration index within the dictionary.
    pub index: usize,
    /// Keyword overlap in [0, 1], before the type bonus.
    pub overlap: f64,
    /// Final confidence in [0, 1].
    pub confidence: f64,
    pub matched_keywords: Vec<String>,
}

/// On-disk shape of a dictionary file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DictionaryFile {
    name: String,
    version: String,
    fields: Vec<FieldDefinition>,
}

/// Immutable catalogue of canonical fields.
///
/// Keywords are normalized at construction. Share a snapshot with `Arc`;
/// reloading builds a new value rather than mutating this one.
#[derive(Debug, Clone, Serialize)]
pub struct FieldDictionary {
    name: String,
    version: String,
    fields: Vec<FieldDefinition>,
    #[serde(skip)]
    keyword_tokens: Vec<Vec<Vec<String>>>,
}

impl FieldDictionary {
    pub fn new(
        name: impl Into<String>,
        version: impl Into<String>,
        fields: Vec<FieldDefinition>,
    ) -> Result<Self> {
        validate_fields(&fields)?;

        let fields: Vec<FieldDefinition> = fields
            .into_iter()
            .map(|mut f| {
                f.keywords = normalize_keywords(&f.keywords);
                f
            })
            .collect();

        let keyword_tokens = fields
            .iter()
            .map(|f| f.keywords.iter().map(|k| normalize::tokenize(k)).collect())
            .collect();

        Ok(Self {
            name: name.into(),
            version: version.into(),
            fields,
            keyword_tokens,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Every field, in declaration order.
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Score a column against every field, in declaration order.
    ///
    /// A keyword fires when its tokens appear contiguously in the column's
    /// tokens, or (for keywords of 3+ chars) when it is a substring of the
    /// joined or compact column name. An exact whole-name match scores an
    /// overlap of 1.0; otherwise overlap is matched / total keywords.
    pub fn matches(
        &self,
        column: &NormalizedName,
        inferred: DataType,
        type_bonus: f64,
    ) -> Vec<FieldMatch<'_>> {
        let joined = column.joined();
        let compact = column.compact();

        self.fields
            .iter()
            .zip(&self.keyword_tokens)
            .enumerate()
            .map(|(index, (field, kw_tokens))| {
                let mut matched = Vec::new();
                let mut exact = false;

                for (keyword, tokens) in field.keywords.iter().zip(kw_tokens) {
                    let kw_compact = tokens.concat();
                    let exact_hit =
                        !joined.is_empty() && (joined == *keyword || compact == kw_compact);
                    exact |= exact_hit;
                    let token_hit = column.contains_tokens(tokens);
                    let substring_hit = keyword.chars().count() >= MIN_SUBSTRING_KEYWORD
                        && (joined.contains(keyword.as_str())
                            || compact.contains(kw_compact.as_str()));
                    if exact_hit || token_hit || substring_hit {
                        matched.push(keyword.clone());
                    }
                }

                let overlap = if exact {
                    1.0
                } else if field.keywords.is_empty() {
                    0.0
                } else {
                    (matched.len() as f64 / field.keywords.len() as f64).min(1.0)
                };

                let confidence = if overlap > 0.0 && inferred == field.data_type {
                    (overlap * type_bonus).min(1.0)
                } else {
                    overlap
                };

                FieldMatch {
                    field,
                    index,
                    overlap,
                    confidence,
                    matched_keywords: matched,
                }
            })
            .collect()
    }
}

fn validate_fields(fields: &[FieldDefinition]) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, field) in fields.iter().enumerate() {
        let name = field.name.trim();
        if name.is_empty() {
            return Err(MappingError::Validation(ValidationIssue::EmptyFieldName {
                index,
            }));
        }
        if !seen.insert(name.to_string()) {
            return Err(MappingError::Validation(ValidationIssue::DuplicateField(
                name.to_string(),
            )));
        }
    }
    Ok(())
}

/// Normalize, drop empties, dedupe preserving first occurrence.
pub fn normalize_keywords(keywords: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    keywords
        .iter()
        .map(|k| normalize::normalize(k))
        .filter(|k| !k.is_empty() && seen.insert(k.clone()))
        .collect()
}

/// Load the default dictionary using this resolution order:
///
/// 1. `$COLMAP_DICTIONARY` env var (path to JSON file)
/// 2. `$XDG_DATA_HOME/colmap/dictionary.json` (user override)
/// 3. `~/.local/share/colmap/dictionary.json` (fallback XDG path)
/// 4. Embedded compile-time default from `dictionaries/default.json`
///
/// A failing step is logged and falls through to the next.
pub fn default_dictionary() -> FieldDictionary {
    if let Ok(path) = std::env::var(config::DICTIONARY_ENV) {
        match load_dictionary(&path) {
            Ok(dict) => return dict,
            Err(e) => tracing::warn!(%path, error = %e, "ignoring COLMAP_DICTIONARY"),
        }
    }

    if let Some(path) = xdg_dictionary_path() {
        if path.exists() {
            match load_dictionary(&path.to_string_lossy()) {
                Ok(dict) => return dict,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "ignoring user dictionary")
                }
            }
        }
    }

    embedded_dictionary()
}

/// The compiled-in dictionary, ignoring any override.
pub fn embedded_dictionary() -> FieldDictionary {
    parse_dictionary(EMBEDDED_DEFAULT).expect("embedded default dictionary is invalid")
}

/// Parse a dictionary from a JSON string.
pub fn parse_dictionary(json: &str) -> Result<FieldDictionary> {
    let file: DictionaryFile = serde_json::from_str(json)?;
    FieldDictionary::new(file.name, file.version, file.fields)
}

/// Load a dictionary from a file path.
pub fn load_dictionary(path: &str) -> Result<FieldDictionary> {
    let json = std::fs::read_to_string(path)?;
    let dict = parse_dictionary(&json)?;
    tracing::debug!(path, version = dict.version(), "loaded field dictionary");
    Ok(dict)
}

fn xdg_dictionary_path() -> Option<PathBuf> {
    config::data_dir().map(|d| d.join("dictionary.json"))
}
