//! Parameter cases: one per signature entry, each knowing how to declare
//! itself, encode its argument, and describe the outputs it contributes.
//!
//! Cases are language neutral. They speak in [`DeclType`]s and defer anything
//! syntactic (type names, path argument encoding, reserved words) to the
//! [`LanguageProfile`] they were built against.

// Internal imports (std, crate)
use std::path::Path;

use crate::profiles::LanguageProfile;
use crate::signature::ParameterSpec;
use crate::utils::{stringify, stringify_elements};

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Language-neutral declaration type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclType {
    Str,
    Int,
    Float,
    Bool,
    File,
    Directory,
    /// A staged path the engine accepts as either a file or a directory
    FileOrDirectory,
    Array(Box<DeclType>),
}

impl DeclType {
    /// Map a primitive type name
    pub fn from_primitive(name: &str) -> Option<Self> {
        match name {
            "Int" => Some(Self::Int),
            "Float" => Some(Self::Float),
            "Bool" => Some(Self::Bool),
            "Str" | "Color" => Some(Self::Str),
            "Path" => Some(Self::FileOrDirectory),
            _ => None,
        }
    }

    pub fn array(element: DeclType) -> Self {
        Self::Array(Box::new(element))
    }
}

/// One declaration in the generated document
#[derive(Debug, Clone, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub ty: DeclType,
    pub optional: bool,
    /// Non-null default; `None` with `optional` means "defaults to null"
    pub default: Option<JsonValue>,
    pub doc: Option<String>,
}

/// A file or directory the tool produces
#[derive(Debug, Clone, PartialEq)]
pub struct OutputBinding {
    pub name: String,
    /// `DeclType::File` or `DeclType::Directory`
    pub capture: DeclType,
    /// Declaration holding the produced path
    pub source: String,
    pub doc: Option<String>,
}

/// Attributes common to every case
#[derive(Debug, Clone, PartialEq)]
pub struct CaseHeader {
    /// Name in the action signature
    pub logical_name: String,
    /// Name in the generated document
    pub name: String,
    pub spec: ParameterSpec,
    pub arg: Option<JsonValue>,
    pub optional: bool,
    pub default: Option<JsonValue>,
}

impl CaseHeader {
    pub fn new(
        profile: &dyn LanguageProfile,
        logical_name: &str,
        spec: &ParameterSpec,
        arg: Option<JsonValue>,
    ) -> Self {
        Self {
            logical_name: logical_name.to_string(),
            name: profile.physical_name(logical_name),
            spec: spec.clone(),
            arg: arg.filter(|a| !a.is_null()),
            optional: spec.has_default(),
            default: spec.concrete_default().cloned(),
        }
    }

    fn doc(&self) -> Option<String> {
        self.spec.description.clone()
    }

    fn declaration(&self, ty: DeclType, default: Option<JsonValue>) -> Declaration {
        Declaration {
            name: self.name.clone(),
            ty,
            optional: self.optional,
            default,
            doc: self.doc(),
        }
    }

    fn reject_default(&self, what: &str) -> crate::Result<()> {
        match &self.default {
            Some(value) => Err(crate::Error::unsupported_default(
                &self.logical_name,
                format!("{what} declarations cannot default to {value}"),
            )),
            None => Ok(()),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> crate::Error {
        crate::Error::invalid_argument(&self.logical_name, reason)
    }
}

/// How a signature entry is declared and encoded
#[derive(Debug, Clone, PartialEq)]
pub enum ParamCase {
    /// Artifact input, a directory for key/value artifact collections
    Artifact {
        header: CaseHeader,
        multiple: bool,
        directory: bool,
    },
    /// Bool, string or numeric scalar
    Scalar { header: CaseHeader, ty: DeclType },
    /// Primitive union; more than one member collapses to a string
    Union {
        header: CaseHeader,
        members: Vec<String>,
    },
    /// Whole metadata, supplied as one or more files
    MetadataTable { header: CaseHeader, file_name: String },
    /// One metadata column: a file plus a column name
    MetadataColumn { header: CaseHeader, file_name: String },
    /// List or set of primitives
    SimpleCollection {
        header: CaseHeader,
        element: DeclType,
        stringify: bool,
    },
    /// Mapping of string keys to primitives, split into parallel arrays
    KeyValueCollection {
        header: CaseHeader,
        element: DeclType,
        stringify: bool,
        keys_name: String,
    },
    /// Desired name of a produced result
    Output { header: CaseHeader, directory: bool },
    /// A type the target languages cannot express
    Unsupported { header: CaseHeader, reason: String },
}

impl ParamCase {
    pub fn header(&self) -> &CaseHeader {
        match self {
            Self::Artifact { header, .. }
            | Self::Scalar { header, .. }
            | Self::Union { header, .. }
            | Self::MetadataTable { header, .. }
            | Self::MetadataColumn { header, .. }
            | Self::SimpleCollection { header, .. }
            | Self::KeyValueCollection { header, .. }
            | Self::Output { header, .. }
            | Self::Unsupported { header, .. } => header,
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Self::Output { .. })
    }

    /// Declarations this case contributes, in document order
    pub fn declare(&self) -> crate::Result<Vec<Declaration>> {
        let decls = match self {
            Self::Artifact {
                header,
                multiple,
                directory,
            } => {
                header.reject_default("artifact")?;
                let ty = match (multiple, directory) {
                    (_, true) => DeclType::Directory,
                    (true, false) => DeclType::array(DeclType::File),
                    (false, false) => DeclType::File,
                };
                vec![header.declaration(ty, None)]
            }
            Self::Scalar { header, ty } => {
                vec![header.declaration(ty.clone(), header.default.clone())]
            }
            Self::Union { header, members } => {
                let (ty, default) = union_type(header, members)?;
                vec![header.declaration(ty, default)]
            }
            Self::MetadataTable { header, file_name } => {
                header.reject_default("metadata")?;
                vec![Declaration {
                    name: file_name.clone(),
                    ..header.declaration(DeclType::array(DeclType::File), None)
                }]
            }
            Self::MetadataColumn { header, file_name } => {
                header.reject_default("metadata column")?;
                vec![
                    Declaration {
                        name: file_name.clone(),
                        ..header.declaration(DeclType::File, None)
                    },
                    Declaration {
                        doc: Some(format!(
                            "Column name to use from '{}' file",
                            header.logical_name
                        )),
                        ..header.declaration(DeclType::Str, None)
                    },
                ]
            }
            Self::SimpleCollection {
                header,
                element,
                stringify,
            } => {
                let default = header
                    .default
                    .as_ref()
                    .map(|d| collection_values(header, d, *stringify))
                    .transpose()?;
                vec![header.declaration(DeclType::array(element.clone()), default)]
            }
            Self::KeyValueCollection {
                header,
                element,
                stringify,
                keys_name,
            } => {
                let (keys, values) = match &header.default {
                    Some(default) => {
                        let (k, v) = split_mapping(header, default, *stringify)?;
                        (Some(k), Some(v))
                    }
                    None => (None, None),
                };
                vec![
                    Declaration {
                        name: keys_name.clone(),
                        ..header.declaration(DeclType::array(DeclType::Str), keys)
                    },
                    header.declaration(DeclType::array(element.clone()), values),
                ]
            }
            Self::Output { header, .. } => {
                let default = header.default.as_ref().map(|d| JsonValue::String(stringify(d)));
                vec![header.declaration(DeclType::Str, default)]
            }
            Self::Unsupported { header, reason } => {
                return Err(crate::Error::unsupported_type(&header.logical_name, reason));
            }
        };
        Ok(decls)
    }

    /// Encode this case's argument, keyed by declaration name.
    ///
    /// An absent argument encodes to an empty map.
    pub fn encode_argument(
        &self,
        profile: &dyn LanguageProfile,
    ) -> crate::Result<Map<String, JsonValue>> {
        if let Self::Unsupported { header, reason } = self {
            return Err(crate::Error::unsupported_type(&header.logical_name, reason));
        }

        let mut encoded = Map::new();
        let header = self.header();
        let Some(arg) = header.arg.as_ref() else {
            return Ok(encoded);
        };

        match self {
            Self::Artifact {
                multiple,
                directory,
                ..
            } => {
                let ty = if *directory {
                    DeclType::Directory
                } else {
                    DeclType::File
                };
                let value = if *multiple && !*directory {
                    let paths = path_list(header, arg)?;
                    JsonValue::Array(paths.iter().map(|p| profile.path_argument(p, &ty)).collect())
                } else {
                    profile.path_argument(path_str(header, arg)?, &ty)
                };
                encoded.insert(header.name.clone(), value);
            }
            Self::Scalar {
                ty: DeclType::FileOrDirectory,
                ..
            } => {
                let path = path_str(header, arg)?;
                encoded.insert(
                    header.name.clone(),
                    profile.path_argument(path, &staged_path_type(path)),
                );
            }
            Self::Scalar { .. } => {
                encoded.insert(header.name.clone(), arg.clone());
            }
            Self::Union { members, .. } => {
                let value = if members.len() > 1 {
                    JsonValue::String(stringify(arg))
                } else {
                    arg.clone()
                };
                encoded.insert(header.name.clone(), value);
            }
            Self::MetadataTable { file_name, .. } => {
                let files = path_list(header, arg)?
                    .iter()
                    .map(|p| profile.path_argument(p, &DeclType::File))
                    .collect();
                encoded.insert(file_name.clone(), JsonValue::Array(files));
            }
            Self::MetadataColumn { file_name, .. } => {
                let (source, column) = metadata_pair(header, arg)?;
                encoded.insert(
                    file_name.clone(),
                    profile.path_argument(&source, &DeclType::File),
                );
                encoded.insert(header.name.clone(), JsonValue::String(column));
            }
            Self::SimpleCollection { stringify, .. } => {
                encoded.insert(
                    header.name.clone(),
                    collection_values(header, arg, *stringify)?,
                );
            }
            Self::KeyValueCollection {
                stringify,
                keys_name,
                ..
            } => {
                let (keys, values) = split_mapping(header, arg, *stringify)?;
                encoded.insert(keys_name.clone(), keys);
                encoded.insert(header.name.clone(), values);
            }
            Self::Output { .. } => {
                encoded.insert(header.name.clone(), JsonValue::String(stringify(arg)));
            }
            Self::Unsupported { .. } => {}
        }
        Ok(encoded)
    }

    /// Produced files or directories this case contributes
    pub fn describe_outputs(&self) -> crate::Result<Vec<OutputBinding>> {
        match self {
            Self::Output { header, directory } => {
                let (suffix, capture) = if *directory {
                    ("dir", DeclType::Directory)
                } else {
                    ("file", DeclType::File)
                };
                Ok(vec![OutputBinding {
                    name: format!("{}_{}", header.name, suffix),
                    capture,
                    source: header.name.clone(),
                    doc: header.doc(),
                }])
            }
            Self::Unsupported { header, reason } => {
                Err(crate::Error::unsupported_type(&header.logical_name, reason))
            }
            _ => Ok(Vec::new()),
        }
    }
}

fn union_type(
    header: &CaseHeader,
    members: &[String],
) -> crate::Result<(DeclType, Option<JsonValue>)> {
    match members {
        [single] => {
            let ty = DeclType::from_primitive(single).ok_or_else(|| {
                crate::Error::unsupported_type(
                    &header.logical_name,
                    format!("no declaration type for '{single}'"),
                )
            })?;
            Ok((ty, header.default.clone()))
        }
        _ => Ok((
            DeclType::Str,
            header.default.as_ref().map(|d| JsonValue::String(stringify(d))),
        )),
    }
}

/// Whether a file-or-directory argument names a directory
fn staged_path_type(path: &str) -> DeclType {
    if path.ends_with('/') || Path::new(path).is_dir() {
        DeclType::Directory
    } else {
        DeclType::File
    }
}

fn path_str<'a>(header: &CaseHeader, arg: &'a JsonValue) -> crate::Result<&'a str> {
    arg.as_str()
        .ok_or_else(|| header.invalid(format!("expected a path, got {arg}")))
}

/// Paths from an array, or from a whitespace-separated string
fn path_list(header: &CaseHeader, arg: &JsonValue) -> crate::Result<Vec<String>> {
    match arg {
        JsonValue::String(s) => Ok(s.split_whitespace().map(str::to_string).collect()),
        JsonValue::Array(items) => items
            .iter()
            .map(|item| path_str(header, item).map(str::to_string))
            .collect(),
        other => Err(header.invalid(format!("expected a list of paths, got {other}"))),
    }
}

/// Split `[source, column]` or `{source, column}`, rejecting partial pairs
fn metadata_pair(header: &CaseHeader, arg: &JsonValue) -> crate::Result<(String, String)> {
    let (source, column) = match arg {
        JsonValue::Array(items) if items.len() == 2 => (items[0].clone(), items[1].clone()),
        JsonValue::Object(map) => (
            map.get("source").cloned().unwrap_or(JsonValue::Null),
            map.get("column").cloned().unwrap_or(JsonValue::Null),
        ),
        other => {
            return Err(header.invalid(format!(
                "expected [source, column] or {{source, column}}, got {other}"
            )))
        }
    };
    match (source, column) {
        (JsonValue::Null, JsonValue::Null) => Err(header.invalid("empty metadata column reference")),
        (JsonValue::Null, _) => Err(crate::Error::PartialMetadata {
            param: header.logical_name.clone(),
            present: "column",
            missing: "source file",
        }),
        (_, JsonValue::Null) => Err(crate::Error::PartialMetadata {
            param: header.logical_name.clone(),
            present: "source file",
            missing: "column",
        }),
        (source, column) => Ok((stringify(&source), stringify(&column))),
    }
}

fn collection_values(
    header: &CaseHeader,
    value: &JsonValue,
    stringify: bool,
) -> crate::Result<JsonValue> {
    if !value.is_array() {
        return Err(header.invalid(format!("expected a list, got {value}")));
    }
    Ok(if stringify {
        stringify_elements(value)
    } else {
        value.clone()
    })
}

/// Split a mapping into parallel key and value arrays, in insertion order
fn split_mapping(
    header: &CaseHeader,
    value: &JsonValue,
    stringify: bool,
) -> crate::Result<(JsonValue, JsonValue)> {
    let map = value
        .as_object()
        .ok_or_else(|| header.invalid(format!("expected a mapping, got {value}")))?;
    let keys = map.keys().cloned().map(JsonValue::String).collect();
    let values = JsonValue::Array(map.values().cloned().collect());
    let values = if stringify {
        stringify_elements(&values)
    } else {
        values
    };
    Ok((JsonValue::Array(keys), values))
}
