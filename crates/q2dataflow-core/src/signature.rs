//! Action signatures and the type descriptors they are made of.
//!
//! These types mirror what the plugin registry reports about an action: an
//! ordered list of inputs (artifacts), parameters (primitives, metadata and
//! collections) and outputs, each with a [`TypeDescriptor`] and an optional
//! default. They deserialize from registry files:
//!
//! ```yaml
//! id: diversity
//! version: 2024.5.0
//! actions:
//!   - id: alpha
//!     signature:
//!       inputs:
//!         - name: table
//!           type: {name: FeatureTable, kind: semantic}
//!       parameters:
//!         - name: threads
//!           type: {name: Int}
//!           default: 1
//! ```
//!
//! A missing `default` key means the parameter is required; `default: null`
//! means it is optional and defaults to nothing.

// Internal imports (std, crate)
use std::collections::BTreeSet;

// External imports (alphabetized)
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// Broad family of a type descriptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeKind {
    #[default]
    Primitive,
    Semantic,
    Metadata,
    MetadataColumn,
    Union,
    Collection,
}

/// Structural shape of a collection-bearing type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionStyle {
    /// Not collection shaped
    None,
    /// One concrete element type
    Simple,
    /// A union of collections, each holding one concrete type
    Monomorphic,
    /// One collection whose elements may be any of several types
    Composite,
    /// Anything more involved, such as nested collections
    Complex,
}

/// Refinement attached to a type, e.g. `Range(1, 10)` or `Choices(...)`
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Predicate {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<JsonValue>,
    /// Alternatives when the predicate is itself a union
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub alternatives: Vec<Predicate>,
}

impl Predicate {
    pub fn is_union(&self) -> bool {
        self.alternatives.len() > 1
    }
}

/// Description of a framework type
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeDescriptor {
    /// Type name; empty for anonymous unions
    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub kind: TypeKind,

    /// Union alternatives, the element of a collection, or semantic fields
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub members: Vec<TypeDescriptor>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub predicate: Option<Predicate>,

    /// Preferred view the action receives the value as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view: Option<String>,
}

impl TypeDescriptor {
    fn with_kind(name: impl Into<String>, kind: TypeKind, members: Vec<TypeDescriptor>) -> Self {
        Self {
            name: name.into(),
            kind,
            members,
            predicate: None,
            view: None,
        }
    }

    pub fn primitive(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Primitive, Vec::new())
    }

    pub fn semantic(name: impl Into<String>) -> Self {
        Self::with_kind(name, TypeKind::Semantic, Vec::new())
    }

    /// A semantic type with fields, e.g. `FeatureTable[Frequency]`
    pub fn semantic_with(name: impl Into<String>, fields: Vec<TypeDescriptor>) -> Self {
        Self::with_kind(name, TypeKind::Semantic, fields)
    }

    pub fn metadata() -> Self {
        Self::with_kind("Metadata", TypeKind::Metadata, Vec::new())
    }

    pub fn metadata_column(inner: TypeDescriptor) -> Self {
        Self::with_kind("MetadataColumn", TypeKind::MetadataColumn, vec![inner])
    }

    pub fn union(members: Vec<TypeDescriptor>) -> Self {
        Self::with_kind("", TypeKind::Union, members)
    }

    pub fn list(element: TypeDescriptor) -> Self {
        Self::with_kind("List", TypeKind::Collection, vec![element])
    }

    pub fn set(element: TypeDescriptor) -> Self {
        Self::with_kind("Set", TypeKind::Collection, vec![element])
    }

    /// A key/value collection, e.g. `Collection[Float]`
    pub fn collection(element: TypeDescriptor) -> Self {
        Self::with_kind("Collection", TypeKind::Collection, vec![element])
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn is_union(&self) -> bool {
        self.kind == TypeKind::Union
    }

    pub fn is_collection(&self) -> bool {
        self.kind == TypeKind::Collection
    }

    pub fn is_metadata(&self) -> bool {
        matches!(self.kind, TypeKind::Metadata | TypeKind::MetadataColumn)
    }

    pub fn is_metadata_column(&self) -> bool {
        self.kind == TypeKind::MetadataColumn
    }

    /// True for artifact types, including unions and collections of them
    pub fn is_semantic(&self) -> bool {
        match self.kind {
            TypeKind::Semantic => true,
            TypeKind::Union | TypeKind::Collection => {
                !self.members.is_empty() && self.members.iter().all(|m| m.is_semantic())
            }
            _ => false,
        }
    }

    /// True when the type or any member, element or predicate is a union
    pub fn is_union_anywhere(&self) -> bool {
        self.is_union()
            || self.predicate.as_ref().is_some_and(|p| p.is_union())
            || self.members.iter().any(|m| m.is_union_anywhere())
    }

    /// Distinct member names of a union, in declaration order
    pub fn distinct_member_names(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.members
            .iter()
            .map(|m| m.name.as_str())
            .filter(|name| seen.insert(*name))
            .collect()
    }

    /// Derive the collection style from the type's structure
    pub fn collection_style(&self) -> CollectionStyle {
        match self.kind {
            TypeKind::Collection => match self.members.as_slice() {
                [element] if element.is_collection() => CollectionStyle::Complex,
                [element] if element.is_union() => {
                    if element.members.iter().any(|m| m.is_collection()) {
                        CollectionStyle::Complex
                    } else if element.distinct_member_names().len() > 1 {
                        CollectionStyle::Composite
                    } else {
                        CollectionStyle::Simple
                    }
                }
                [_] => CollectionStyle::Simple,
                _ => CollectionStyle::Complex,
            },
            TypeKind::Union => {
                let collections = self.members.iter().filter(|m| m.is_collection()).count();
                if collections == 0 {
                    CollectionStyle::None
                } else if collections == self.members.len()
                    && self
                        .members
                        .iter()
                        .all(|m| m.collection_style() == CollectionStyle::Simple)
                {
                    CollectionStyle::Monomorphic
                } else {
                    CollectionStyle::Complex
                }
            }
            _ => CollectionStyle::None,
        }
    }
}

/// A parameter's default, distinguishing "no default" from "defaults to null"
#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultValue {
    /// The parameter is required
    #[default]
    NoValue,
    /// The parameter is optional; the value may be JSON `null`
    Value(JsonValue),
}

impl DefaultValue {
    pub fn is_no_value(&self) -> bool {
        matches!(self, Self::NoValue)
    }
}

impl Serialize for DefaultValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::NoValue => serializer.serialize_none(),
            Self::Value(value) => value.serialize(serializer),
        }
    }
}

// Only called when the key is present, so an explicit null becomes `Value(Null)`.
fn deserialize_default<'de, D>(deserializer: D) -> Result<DefaultValue, D::Error>
where
    D: Deserializer<'de>,
{
    JsonValue::deserialize(deserializer).map(DefaultValue::Value)
}

/// Type, default and description of one signature entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSpec {
    #[serde(rename = "type")]
    pub qtype: TypeDescriptor,

    #[serde(
        default,
        deserialize_with = "deserialize_default",
        skip_serializing_if = "DefaultValue::is_no_value"
    )]
    pub default: DefaultValue,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    pub fn new(qtype: TypeDescriptor) -> Self {
        Self {
            qtype,
            default: DefaultValue::NoValue,
            description: None,
        }
    }

    pub fn with_default(mut self, value: JsonValue) -> Self {
        self.default = DefaultValue::Value(value);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// True when any default, including null, was declared
    pub fn has_default(&self) -> bool {
        !self.default.is_no_value()
    }

    /// The declared default unless it is absent or null
    pub fn concrete_default(&self) -> Option<&JsonValue> {
        match &self.default {
            DefaultValue::Value(value) if !value.is_null() => Some(value),
            _ => None,
        }
    }
}

/// A named signature entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    #[serde(flatten)]
    pub spec: ParameterSpec,
}

impl Parameter {
    pub fn new(name: impl Into<String>, spec: ParameterSpec) -> Self {
        Self {
            name: name.into(),
            spec,
        }
    }
}

/// Which section of a signature an entry belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Input,
    Parameter,
    Output,
}

/// Ordered inputs, parameters and outputs of an action
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Signature {
    #[serde(default)]
    pub inputs: Vec<Parameter>,
    #[serde(default)]
    pub parameters: Vec<Parameter>,
    #[serde(default)]
    pub outputs: Vec<Parameter>,
}

impl Signature {
    /// Look up an entry by name across all three sections
    pub fn find(&self, name: &str) -> Option<(Role, &ParameterSpec)> {
        let sections = [
            (Role::Input, &self.inputs),
            (Role::Parameter, &self.parameters),
            (Role::Output, &self.outputs),
        ];
        sections.into_iter().find_map(|(role, entries)| {
            entries
                .iter()
                .find(|p| p.name == name)
                .map(|p| (role, &p.spec))
        })
    }

    pub fn is_output(&self, name: &str) -> bool {
        self.outputs.iter().any(|p| p.name == name)
    }
}

/// A plugin action
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Action {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub signature: Signature,
}

/// A plugin and the actions it registers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plugin {
    pub id: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub actions: Vec<Action>,
}

impl Plugin {
    /// Find an action, treating `-` and `_` as equivalent
    pub fn action(&self, action_id: &str) -> Option<&Action> {
        let wanted = crate::utils::normalize_id(action_id);
        self.actions
            .iter()
            .find(|a| crate::utils::normalize_id(&a.id) == wanted)
    }
}

fn default_version() -> String {
    "0.0.0".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_presence_is_distinguished() -> crate::Result<()> {
        let signature: Signature = serde_yaml::from_str(
            r#"
parameters:
  - name: required
    type: {name: Int}
  - name: nullable
    type: {name: Str}
    default: null
  - name: verbose
    type: {name: Bool}
    default: false
"#,
        )?;
        let specs: Vec<_> = signature.parameters.iter().map(|p| &p.spec).collect();
        assert_eq!(specs[0].default, DefaultValue::NoValue);
        assert_eq!(specs[1].default, DefaultValue::Value(JsonValue::Null));
        assert_eq!(specs[2].default, DefaultValue::Value(json!(false)));
        assert!(!specs[0].has_default());
        assert!(specs[1].has_default());
        assert_eq!(specs[1].concrete_default(), None);
        assert_eq!(specs[2].concrete_default(), Some(&json!(false)));
        Ok(())
    }

    #[test]
    fn test_collection_styles() {
        let int = || TypeDescriptor::primitive("Int");
        let str_ = || TypeDescriptor::primitive("Str");

        assert_eq!(int().collection_style(), CollectionStyle::None);
        assert_eq!(
            TypeDescriptor::union(vec![int(), str_()]).collection_style(),
            CollectionStyle::None
        );
        assert_eq!(
            TypeDescriptor::list(int()).collection_style(),
            CollectionStyle::Simple
        );
        assert_eq!(
            TypeDescriptor::list(TypeDescriptor::union(vec![int(), str_()])).collection_style(),
            CollectionStyle::Composite
        );
        assert_eq!(
            TypeDescriptor::union(vec![TypeDescriptor::list(int()), TypeDescriptor::list(str_())])
                .collection_style(),
            CollectionStyle::Monomorphic
        );
        assert_eq!(
            TypeDescriptor::union(vec![TypeDescriptor::list(int()), str_()]).collection_style(),
            CollectionStyle::Complex
        );
        assert_eq!(
            TypeDescriptor::list(TypeDescriptor::list(int())).collection_style(),
            CollectionStyle::Complex
        );
    }

    #[test]
    fn test_semantic_detection() {
        let table = TypeDescriptor::semantic_with(
            "FeatureTable",
            vec![TypeDescriptor::semantic("Frequency")],
        );
        assert!(table.is_semantic());
        assert!(TypeDescriptor::list(table.clone()).is_semantic());
        assert!(TypeDescriptor::union(vec![table, TypeDescriptor::semantic("Phylogeny")])
            .is_semantic());
        assert!(!TypeDescriptor::list(TypeDescriptor::primitive("Int")).is_semantic());
        assert!(!TypeDescriptor::metadata().is_semantic());
    }

    #[test]
    fn test_predicate_union_counts_as_union_anywhere() {
        let choices = Predicate {
            name: String::new(),
            args: Vec::new(),
            alternatives: vec![
                Predicate {
                    name: "Choices".into(),
                    args: vec![json!("a")],
                    alternatives: Vec::new(),
                },
                Predicate {
                    name: "Choices".into(),
                    args: vec![json!("b")],
                    alternatives: Vec::new(),
                },
            ],
        };
        let ty = TypeDescriptor::primitive("Str").with_predicate(choices);
        assert!(!ty.is_union());
        assert!(ty.is_union_anywhere());
    }

    #[test]
    fn test_signature_lookup() {
        let signature = Signature {
            inputs: vec![Parameter::new(
                "table",
                ParameterSpec::new(TypeDescriptor::semantic("FeatureTable")),
            )],
            parameters: vec![Parameter::new(
                "depth",
                ParameterSpec::new(TypeDescriptor::primitive("Int")),
            )],
            outputs: vec![Parameter::new(
                "rarefied",
                ParameterSpec::new(TypeDescriptor::semantic("FeatureTable")),
            )],
        };
        assert_eq!(signature.find("depth").map(|(r, _)| r), Some(Role::Parameter));
        assert_eq!(signature.find("table").map(|(r, _)| r), Some(Role::Input));
        assert!(signature.is_output("rarefied"));
        assert!(signature.find("missing").is_none());
    }
}
