//! Native argument values handed to an action backend.

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use crate::classify::member_names;
use crate::signature::TypeDescriptor;

// External imports (alphabetized)
use serde::Serialize;
use serde_json::Value as JsonValue;

/// A loaded artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Artifact {
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub semantic_type: Option<String>,
}

/// A directory of artifacts keyed by name
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArtifactCollection {
    pub path: PathBuf,
    pub members: Vec<(String, Artifact)>,
}

/// Loaded metadata; several sources are merged into one
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct Metadata {
    pub sources: Vec<PathBuf>,
    /// Data column names, without the ID column; empty when unknown
    pub columns: Vec<String>,
    /// Lower-case column type (`categorical` or `numeric`) of the columns whose type is known
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub column_types: BTreeMap<String, String>,
}

impl Metadata {
    /// Merge another source into this one
    pub fn merge(mut self, other: Metadata) -> Self {
        self.sources.extend(other.sources);
        for column in other.columns {
            if !self.columns.contains(&column) {
                self.columns.push(column);
            }
        }
        for (column, ty) in other.column_types {
            self.column_types.entry(column).or_insert(ty);
        }
        self
    }

    /// Known type of a column
    pub fn column_type(&self, column: &str) -> Option<&str> {
        self.column_types.get(column).map(String::as_str)
    }
}

/// One column selected from metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataColumn {
    pub metadata: Metadata,
    pub column: String,
}

/// An argument value in the form an action receives it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NativeValue {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<NativeValue>),
    Set(Vec<NativeValue>),
    Map(Vec<(String, NativeValue)>),
    Artifact(Artifact),
    Artifacts(Vec<Artifact>),
    ArtifactCollection(ArtifactCollection),
    Metadata(Metadata),
    MetadataColumn(MetadataColumn),
}

/// Named native arguments, in the order they were supplied
pub type NativeArguments = Vec<(String, NativeValue)>;

impl fmt::Display for NativeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn join(f: &mut fmt::Formatter<'_>, items: &[NativeValue], open: &str, close: &str) -> fmt::Result {
            write!(f, "{open}")?;
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{item}")?;
            }
            write!(f, "{close}")
        }

        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Str(s) => write!(f, "{s:?}"),
            Self::List(items) => join(f, items, "[", "]"),
            Self::Set(items) => join(f, items, "{", "}"),
            Self::Map(entries) => {
                write!(f, "{{")?;
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{key:?}: {value}")?;
                }
                write!(f, "}}")
            }
            Self::Artifact(a) => write!(f, "{}", a.path.display()),
            Self::Artifacts(items) => {
                let paths: Vec<_> = items.iter().map(|a| a.path.display().to_string()).collect();
                write!(f, "[{}]", paths.join(", "))
            }
            Self::ArtifactCollection(c) => write!(f, "{}", c.path.display()),
            Self::Metadata(m) => {
                let paths: Vec<_> = m.sources.iter().map(|p| p.display().to_string()).collect();
                write!(f, "metadata({})", paths.join(", "))
            }
            Self::MetadataColumn(c) => write!(f, "{} of metadata", c.column),
        }
    }
}

/// Convert a JSON value without consulting a declared type
pub fn from_json(value: &JsonValue) -> NativeValue {
    match value {
        JsonValue::Null => NativeValue::None,
        JsonValue::Bool(b) => NativeValue::Bool(*b),
        JsonValue::Number(n) => match n.as_i64() {
            Some(i) => NativeValue::Int(i),
            None => NativeValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        JsonValue::String(s) => NativeValue::Str(s.clone()),
        JsonValue::Array(items) => NativeValue::List(items.iter().map(from_json).collect()),
        JsonValue::Object(map) => NativeValue::Map(
            map.iter()
                .map(|(k, v)| (k.clone(), from_json(v)))
                .collect(),
        ),
    }
}

/// Parse a primitive argument against its declared type.
///
/// Strings produced by stringified unions are parsed back with a fixed
/// precedence among the allowed member types: Bool, Int, Float, then Str.
pub fn parse_primitive(param: &str, ty: &TypeDescriptor, value: &JsonValue) -> crate::Result<NativeValue> {
    if value.is_null() {
        return Ok(NativeValue::None);
    }

    if ty.is_collection() {
        let element = ty.members.first().cloned().unwrap_or_default();
        return match (ty.name.as_str(), value) {
            ("Collection", JsonValue::Object(map)) => Ok(NativeValue::Map(
                map.iter()
                    .map(|(k, v)| -> crate::Result<(String, NativeValue)> {
                        Ok((k.clone(), parse_primitive(param, &element, v)?))
                    })
                    .collect::<crate::Result<Vec<_>>>()?,
            )),
            (name, JsonValue::Array(items)) if name != "Collection" => {
                let parsed = items
                    .iter()
                    .map(|v| parse_primitive(param, &element, v))
                    .collect::<crate::Result<Vec<_>>>()?;
                Ok(if name == "Set" {
                    NativeValue::Set(dedup(parsed))
                } else {
                    NativeValue::List(parsed)
                })
            }
            (name, other) => Err(crate::Error::invalid_argument(
                param,
                format!("expected a {name} value, got {other}"),
            )),
        };
    }

    let allowed = member_names(param, ty)?;
    let allows = |name: &str| allowed.iter().any(|a| a == name);
    let allows_str = allows("Str") || allows("Color") || allows("Path");

    let parsed = match value {
        JsonValue::Bool(b) if allows("Bool") => Some(NativeValue::Bool(*b)),
        JsonValue::Number(n) => {
            if let (Some(i), true) = (n.as_i64(), allows("Int")) {
                Some(NativeValue::Int(i))
            } else if allows("Float") {
                n.as_f64().map(NativeValue::Float)
            } else if allows_str {
                Some(NativeValue::Str(n.to_string()))
            } else {
                None
            }
        }
        JsonValue::String(s) => parse_str(s, &allows, allows_str),
        JsonValue::Bool(b) if allows_str => Some(NativeValue::Str(b.to_string())),
        _ => None,
    };
    parsed.ok_or_else(|| {
        crate::Error::invalid_argument(
            param,
            format!("{value} is not a valid {}", allowed.join(" | ")),
        )
    })
}

fn parse_str(s: &str, allows: &dyn Fn(&str) -> bool, allows_str: bool) -> Option<NativeValue> {
    let trimmed = s.trim();
    if allows("Bool") {
        if trimmed.eq_ignore_ascii_case("true") {
            return Some(NativeValue::Bool(true));
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Some(NativeValue::Bool(false));
        }
    }
    if allows("Int") {
        if let Ok(i) = trimmed.parse::<i64>() {
            return Some(NativeValue::Int(i));
        }
    }
    if allows("Float") {
        if let Ok(x) = trimmed.parse::<f64>() {
            return Some(NativeValue::Float(x));
        }
    }
    if allows_str {
        return Some(NativeValue::Str(s.to_string()));
    }
    None
}

fn dedup(values: Vec<NativeValue>) -> Vec<NativeValue> {
    let mut unique: Vec<NativeValue> = Vec::with_capacity(values.len());
    for value in values {
        if !unique.contains(&value) {
            unique.push(value);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn prim(name: &str) -> TypeDescriptor {
        TypeDescriptor::primitive(name)
    }

    #[test]
    fn test_union_precedence() -> crate::Result<()> {
        let union = TypeDescriptor::union(vec![prim("Str"), prim("Int"), prim("Bool")]);
        assert_eq!(parse_primitive("u", &union, &json!("4"))?, NativeValue::Int(4));
        assert_eq!(parse_primitive("u", &union, &json!("TRUE"))?, NativeValue::Bool(true));
        assert_eq!(
            parse_primitive("u", &union, &json!("auto"))?,
            NativeValue::Str("auto".into())
        );
        Ok(())
    }

    #[test]
    fn test_scalars() -> crate::Result<()> {
        assert_eq!(parse_primitive("f", &prim("Float"), &json!(2))?, NativeValue::Float(2.0));
        assert_eq!(parse_primitive("i", &prim("Int"), &json!("12"))?, NativeValue::Int(12));
        assert_eq!(
            parse_primitive("s", &prim("Str"), &json!("12"))?,
            NativeValue::Str("12".into())
        );
        assert!(parse_primitive("i", &prim("Int"), &json!("twelve")).is_err());
        assert_eq!(parse_primitive("i", &prim("Int"), &JsonValue::Null)?, NativeValue::None);
        Ok(())
    }

    #[test]
    fn test_collections() -> crate::Result<()> {
        let set = TypeDescriptor::set(prim("Int"));
        assert_eq!(
            parse_primitive("s", &set, &json!(["1", 2, 2]))?,
            NativeValue::Set(vec![NativeValue::Int(1), NativeValue::Int(2)])
        );
        let mapping = TypeDescriptor::collection(prim("Float"));
        assert_eq!(
            parse_primitive("m", &mapping, &json!({"x": "1.5"}))?,
            NativeValue::Map(vec![("x".into(), NativeValue::Float(1.5))])
        );
        Ok(())
    }

    #[test]
    fn test_metadata_merge() {
        let a = Metadata {
            sources: vec!["a.tsv".into()],
            columns: vec!["site".into()],
            column_types: BTreeMap::from([("site".into(), "categorical".into())]),
        };
        let b = Metadata {
            sources: vec!["b.tsv".into()],
            columns: vec!["site".into(), "depth".into()],
            column_types: BTreeMap::from([
                ("site".into(), "numeric".into()),
                ("depth".into(), "numeric".into()),
            ]),
        };
        let merged = a.merge(b);
        assert_eq!(merged.sources.len(), 2);
        assert_eq!(merged.columns, vec!["site", "depth"]);
        assert_eq!(merged.column_type("site"), Some("categorical"));
        assert_eq!(merged.column_type("depth"), Some("numeric"));
        assert_eq!(merged.column_type("subject"), None);
    }
}
