//! Mapping profiles: named, persisted field lists.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use super::aggregate::AnalysisResult;
use super::dictionary::{self, FieldDefinition, FieldDictionary};
use super::normalize;
use crate::error::{MappingError, Result, ValidationIssue};

/// Detections at or above this confidence become required fields.
pub const REQUIRED_CONFIDENCE: f64 = 0.8;

/// A stored profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub fields: Vec<FieldDefinition>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied profile content, before an id and timestamps exist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfileDraft {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldDefinition>,
}

impl ProfileDraft {
    pub fn new(name: impl Into<String>, fields: Vec<FieldDefinition>) -> Self {
        Self {
            name: name.into(),
            description: None,
            fields,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Check name, field-name and keyword rules. Returns the draft with its
    /// name and field names trimmed. Keywords are stored as given; matching
    /// normalizes them when the profile becomes a dictionary.
    pub fn validated(mut self) -> Result<Self> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() {
            return Err(MappingError::Validation(ValidationIssue::EmptyProfileName));
        }
        self.description = self
            .description
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty());

        let mut seen = std::collections::HashSet::new();
        for (index, field) in self.fields.iter_mut().enumerate() {
            field.name = field.name.trim().to_string();
            if field.name.is_empty() {
                return Err(MappingError::Validation(ValidationIssue::EmptyFieldName {
                    index,
                }));
            }
            if !seen.insert(field.name.clone()) {
                return Err(MappingError::Validation(ValidationIssue::DuplicateField(
                    field.name.clone(),
                )));
            }
            if let Some(index) = field.keywords.iter().position(|k| k.trim().is_empty()) {
                return Err(MappingError::Validation(ValidationIssue::EmptyKeyword {
                    field: field.name.clone(),
                    index,
                }));
            }
        }
        Ok(self)
    }

    /// Build a draft from detection output.
    ///
    /// Only detections with a suggestion become fields. Keywords are the
    /// matched keywords followed by the normalized source column name.
    /// Several columns suggesting one field merge into a single definition.
    pub fn from_analysis(
        result: &AnalysisResult,
        name: impl Into<String>,
        description: Option<String>,
    ) -> Self {
        let mut fields: Vec<FieldDefinition> = Vec::new();
        let mut by_name: HashMap<String, usize> = HashMap::new();

        for detected in &result.detected_fields {
            let Some(suggested) = &detected.suggested_field else {
                continue;
            };

            let mut keywords = detected.matched_keywords.clone();
            keywords.push(normalize::normalize(&detected.original_column));
            let required = detected.confidence >= REQUIRED_CONFIDENCE;

            match by_name.get(suggested) {
                Some(&i) => {
                    let field = &mut fields[i];
                    field.keywords.extend(keywords);
                    field.keywords = dictionary::normalize_keywords(&field.keywords);
                    field.required |= required;
                }
                None => {
                    by_name.insert(suggested.clone(), fields.len());
                    fields.push(FieldDefinition {
                        name: suggested.clone(),
                        keywords: dictionary::normalize_keywords(&keywords),
                        data_type: detected.data_type,
                        required,
                    });
                }
            }
        }

        Self {
            name: name.into(),
            description,
            fields,
        }
    }
}

impl Profile {
    pub fn draft(&self) -> ProfileDraft {
        ProfileDraft {
            name: self.name.clone(),
            description: self.description.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Use this profile's fields as a dictionary for classifying new files.
    pub fn to_dictionary(&self) -> Result<FieldDictionary> {
        FieldDictionary::new(
            self.name.clone(),
            self.updated_at.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.fields.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algo::aggregate::{self, ColumnSample, FileColumns};
    use crate::algo::classifier::ClassifierConfig;
    use crate::algo::dictionary::{embedded_dictionary, DataType};

    #[test]
    fn validated_trims_names_and_keeps_keywords() {
        let draft = ProfileDraft::new(
            "  clientes ",
            vec![FieldDefinition::new(" email ", &["E-Mail", "correo", "correo"], DataType::Text)],
        )
        .with_description("   ")
        .validated()
        .unwrap();
        assert_eq!(draft.name, "clientes");
        assert_eq!(draft.description, None);
        assert_eq!(draft.fields[0].name, "email");
        assert_eq!(draft.fields[0].keywords, vec!["E-Mail", "correo", "correo"]);
    }

    #[test]
    fn blank_keyword_rejected() {
        let err = ProfileDraft::new(
            "p",
            vec![FieldDefinition::new("email", &["correo", "  "], DataType::Text)],
        )
        .validated()
        .unwrap_err();
        assert!(matches!(
            err,
            MappingError::Validation(ValidationIssue::EmptyKeyword { index: 1, .. })
        ));
    }

    #[test]
    fn blank_name_rejected() {
        let err = ProfileDraft::new(" ", vec![]).validated().unwrap_err();
        assert!(matches!(
            err,
            MappingError::Validation(ValidationIssue::EmptyProfileName)
        ));
    }

    #[test]
    fn duplicate_field_rejected() {
        let err = ProfileDraft::new(
            "p",
            vec![
                FieldDefinition::new("monto", &["monto"], DataType::Number),
                FieldDefinition::new("monto", &["valor"], DataType::Number),
            ],
        )
        .validated()
        .unwrap_err();
        assert_eq!(err.kind(), "validation");
    }

    #[test]
    fn empty_field_list_is_a_valid_draft() {
        assert!(ProfileDraft::new("borrador", vec![]).validated().is_ok());
    }

    #[test]
    fn from_analysis_keeps_only_suggestions() {
        let files = vec![FileColumns {
            file: "a.xlsx".into(),
            columns: vec![
                ColumnSample::new("Correo", &["ana@example.com"]),
                ColumnSample::new("zzz", &["?"]),
                ColumnSample::new("Monto", &["10"]),
            ],
        }];
        let result =
            aggregate::analyze(&files, &embedded_dictionary(), &ClassifierConfig::default())
                .unwrap();
        let draft = ProfileDraft::from_analysis(&result, "ventas", None);

        let names: Vec<&str> = draft.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["email", "monto"]);
        assert_eq!(draft.fields[0].keywords, vec!["correo"]);
        assert_eq!(draft.fields[1].data_type, DataType::Number);
        assert!(draft.fields[1].required);
    }

    #[test]
    fn from_analysis_merges_columns_for_one_field() {
        let files = vec![FileColumns {
            file: "a.xlsx".into(),
            columns: vec![
                ColumnSample::new("Nombre cliente", &["Ana"]),
                ColumnSample::new("Apellido", &["Ruiz"]),
            ],
        }];
        let result =
            aggregate::analyze(&files, &embedded_dictionary(), &ClassifierConfig::default())
                .unwrap();
        let draft = ProfileDraft::from_analysis(&result, "personas", Some("desc".into()));
        assert_eq!(draft.fields.len(), 1);
        assert_eq!(
            draft.fields[0].keywords,
            vec!["nombre", "nombre cliente", "apellido"]
        );
        assert!(draft.fields[0].required);
        assert_eq!(draft.description.as_deref(), Some("desc"));
    }

    #[test]
    fn profile_becomes_dictionary() {
        let now = Utc::now();
        let profile = Profile {
            id: "p1".into(),
            name: "clientes".into(),
            description: None,
            fields: vec![FieldDefinition::new("doc", &["documento"], DataType::Identifier)],
            created_at: now,
            updated_at: now,
        };
        let dict = profile.to_dictionary().unwrap();
        assert_eq!(dict.name(), "clientes");
        assert_eq!(dict.fields().len(), 1);
    }
}
