//! Runtime argument reformatting.
//!
//! Workflow engines hand the runner the flat argument map of the generated
//! declarations. [`Reformatter`] undoes what argument encoding did: it strips
//! the engine's envelope, turns file objects back into paths, re-joins
//! metadata file/column pairs into [`MetadataReference`] records, re-zips
//! key/value collections, and restores reserved names.

// Internal imports (std, crate)
use crate::profiles::LanguageProfile;
use crate::utils::stringify;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// How a metadata source file is stored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MetadataSourceKind {
    /// A tab-separated metadata file
    Tabular,
    /// Metadata viewed from an artifact
    ArtifactPackaged,
}

impl MetadataSourceKind {
    /// Determine the kind from the source's extension
    pub fn from_source(param: &str, source: &str) -> crate::Result<Self> {
        let extension = source.rsplit_once('.').map(|(_, ext)| ext.to_ascii_lowercase());
        match extension.as_deref() {
            Some("tsv") => Ok(Self::Tabular),
            Some("qza") => Ok(Self::ArtifactPackaged),
            _ => Err(crate::Error::MetadataLoad {
                param: param.to_string(),
                source_path: source.to_string(),
                reason: "expected a .tsv or .qza file".to_string(),
            }),
        }
    }
}

/// A metadata source, optionally narrowed to one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataReference {
    #[serde(rename = "type")]
    pub kind: MetadataSourceKind,
    pub source: String,
    /// Column name, or a numeric index as some engines supply it
    #[serde(default)]
    pub column: Option<JsonValue>,
}

impl MetadataReference {
    pub fn new(param: &str, source: &str, column: Option<JsonValue>) -> crate::Result<Self> {
        Ok(Self {
            kind: MetadataSourceKind::from_source(param, source)?,
            source: source.to_string(),
            column,
        })
    }

    fn to_json(&self) -> crate::Result<JsonValue> {
        Ok(serde_json::to_value(self)?)
    }
}

/// Restores native argument structure for one language
pub struct Reformatter<'p> {
    profile: &'p dyn LanguageProfile,
}

impl<'p> Reformatter<'p> {
    pub fn new(profile: &'p dyn LanguageProfile) -> Self {
        Self { profile }
    }

    pub fn reformat(&self, raw: Map<String, JsonValue>) -> crate::Result<Map<String, JsonValue>> {
        let mut args = self.unwrap_envelope(raw);
        for value in args.values_mut() {
            unwrap_path_objects(value);
        }

        let prefix = self.profile.prefix();
        let metafile_prefix = self.profile.metafile_prefix();
        let keys_prefix = self.profile.collection_keys_prefix();
        let reserved_prefix = self.profile.reserved_prefix();

        let special: Vec<String> = args
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();

        // Reserved names go last; metadata and collections may consume them first
        let mut reserved = Vec::new();
        for key in special {
            if let Some(logical) = key.strip_prefix(&metafile_prefix) {
                self.merge_metadata(&mut args, &key, logical)?;
            } else if let Some(logical) = key.strip_prefix(&keys_prefix) {
                self.zip_collection(&mut args, &key, logical)?;
            } else if key.starts_with(&reserved_prefix) {
                reserved.push(key);
            } else {
                return Err(crate::Error::UnrecognizedPrefix(key));
            }
        }
        for key in reserved {
            if let Some(value) = args.remove(&key) {
                let native = key[reserved_prefix.len()..].to_string();
                args.insert(native, value);
            }
        }
        Ok(args)
    }

    fn unwrap_envelope(&self, mut raw: Map<String, JsonValue>) -> Map<String, JsonValue> {
        if let Some(envelope) = self.profile.runtime_envelope() {
            if raw.len() == 1 {
                if let Some(JsonValue::Object(inner)) = raw.remove(envelope) {
                    return inner;
                }
            }
        }
        raw
    }

    fn merge_metadata(
        &self,
        args: &mut Map<String, JsonValue>,
        key: &str,
        logical: &str,
    ) -> crate::Result<()> {
        let files = args.remove(key).unwrap_or(JsonValue::Null);
        let column_key = self.profile.physical_name(logical);

        let merged = match args.remove(&column_key) {
            // A companion column declaration means this is a metadata column
            Some(column) => match (files, column) {
                (JsonValue::Null, JsonValue::Null) => JsonValue::Null,
                (JsonValue::Null, _) => {
                    return Err(crate::Error::PartialMetadata {
                        param: logical.to_string(),
                        present: "column",
                        missing: "source file",
                    })
                }
                (_, JsonValue::Null) => {
                    return Err(crate::Error::PartialMetadata {
                        param: logical.to_string(),
                        present: "source file",
                        missing: "column",
                    })
                }
                (JsonValue::String(source), column) => {
                    MetadataReference::new(logical, &source, Some(column))?.to_json()?
                }
                (other, _) => {
                    return Err(crate::Error::invalid_argument(
                        logical,
                        format!("expected one metadata file, got {other}"),
                    ))
                }
            },
            None => match files {
                JsonValue::Null => JsonValue::Null,
                JsonValue::String(source) => JsonValue::Array(vec![
                    MetadataReference::new(logical, &source, None)?.to_json()?,
                ]),
                JsonValue::Array(items) => {
                    let mut records = Vec::with_capacity(items.len());
                    for item in items {
                        let source = item.as_str().ok_or_else(|| {
                            crate::Error::invalid_argument(
                                logical,
                                format!("expected a metadata file path, got {item}"),
                            )
                        })?;
                        records.push(MetadataReference::new(logical, source, None)?.to_json()?);
                    }
                    JsonValue::Array(records)
                }
                other => {
                    return Err(crate::Error::invalid_argument(
                        logical,
                        format!("expected metadata file paths, got {other}"),
                    ))
                }
            },
        };
        args.insert(logical.to_string(), merged);
        Ok(())
    }

    fn zip_collection(
        &self,
        args: &mut Map<String, JsonValue>,
        key: &str,
        logical: &str,
    ) -> crate::Result<()> {
        let keys = args.remove(key).unwrap_or(JsonValue::Null);
        let values = args
            .remove(&self.profile.physical_name(logical))
            .unwrap_or(JsonValue::Null);

        let zipped = match (keys, values) {
            (JsonValue::Null, JsonValue::Null) => JsonValue::Null,
            (JsonValue::Array(keys), JsonValue::Array(values)) if keys.len() == values.len() => {
                let mapping: Map<String, JsonValue> = keys
                    .iter()
                    .map(stringify)
                    .zip(values)
                    .collect();
                JsonValue::Object(mapping)
            }
            (keys, values) => {
                return Err(crate::Error::LengthMismatch {
                    param: logical.to_string(),
                    keys: element_count(&keys),
                    values: element_count(&values),
                })
            }
        };
        args.insert(logical.to_string(), zipped);
        Ok(())
    }
}

fn element_count(value: &JsonValue) -> usize {
    match value {
        JsonValue::Null => 0,
        JsonValue::Array(items) => items.len(),
        _ => 1,
    }
}

/// Replace `{class: File|Directory, path}` objects with their path
fn unwrap_path_objects(value: &mut JsonValue) {
    match value {
        JsonValue::Array(items) => items.iter_mut().for_each(unwrap_path_objects),
        JsonValue::Object(map) => {
            let is_path = matches!(
                map.get("class").and_then(|c| c.as_str()),
                Some("File") | Some("Directory")
            );
            if !is_path {
                return;
            }
            let path = map
                .get("path")
                .or_else(|| map.get("location"))
                .and_then(|p| p.as_str())
                .map(|p| p.strip_prefix("file://").unwrap_or(p).to_string());
            if let Some(path) = path {
                *value = JsonValue::String(path);
            }
        }
        _ => {}
    }
}
