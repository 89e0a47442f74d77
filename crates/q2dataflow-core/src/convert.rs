//! Conversion of action signatures into parameter cases.

// Internal imports (std, crate)
use crate::case::{CaseHeader, DeclType, ParamCase};
use crate::classify::{classify, member_names, Category};
use crate::profiles::LanguageProfile;
use crate::signature::{ParameterSpec, Signature, TypeDescriptor};

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Turns signature entries into parameter cases for one language
pub struct SignatureConverter<'p> {
    profile: &'p dyn LanguageProfile,
}

impl<'p> SignatureConverter<'p> {
    pub fn new(profile: &'p dyn LanguageProfile) -> Self {
        Self { profile }
    }

    /// Lazily convert a signature: inputs, then parameters, then outputs.
    ///
    /// When `arguments` is given, inputs and parameters it does not mention
    /// are skipped. Errors surface at the entry that caused them.
    pub fn convert<'a>(
        &'a self,
        signature: &'a Signature,
        arguments: Option<&'a Map<String, JsonValue>>,
        include_outputs: bool,
    ) -> impl Iterator<Item = crate::Result<ParamCase>> + 'a {
        let inputs = signature
            .inputs
            .iter()
            .chain(signature.parameters.iter())
            .filter_map(move |p| match arguments {
                None => Some((p, None)),
                Some(args) => args.get(&p.name).map(|arg| (p, Some(arg.clone()))),
            })
            .map(move |(p, arg)| self.identify_case(&p.name, &p.spec, arg));

        let outputs = signature
            .outputs
            .iter()
            .filter(move |_| include_outputs)
            .map(move |p| {
                let arg = arguments.and_then(|args| args.get(&p.name)).cloned();
                Ok::<_, crate::Error>(self.output_case(&p.name, &p.spec, arg))
            });

        inputs.chain(outputs)
    }

    /// Pick the case for an input or parameter
    pub fn identify_case(
        &self,
        name: &str,
        spec: &ParameterSpec,
        arg: Option<JsonValue>,
    ) -> crate::Result<ParamCase> {
        let ty = &spec.qtype;
        let category = classify(name, ty)?;
        let header = CaseHeader::new(self.profile, name, spec, arg);
        log::debug!("Parameter '{}' classified as {:?}", name, category);

        let case = match category {
            Category::Semantic { multiple } => ParamCase::Artifact {
                header,
                multiple,
                directory: ty.name == "Collection",
            },
            Category::ScalarBool => ParamCase::Scalar {
                header,
                ty: DeclType::Bool,
            },
            Category::ScalarStr => ParamCase::Scalar {
                header,
                ty: DeclType::Str,
            },
            Category::ScalarNumeric => match DeclType::from_primitive(&ty.name) {
                Some(decl_type) => ParamCase::Scalar {
                    header,
                    ty: decl_type,
                },
                None => ParamCase::Unsupported {
                    header,
                    reason: format!("no declaration type for '{}'", ty.name),
                },
            },
            Category::PrimitiveUnion => ParamCase::Union {
                members: member_names(name, ty)?,
                header,
            },
            Category::MetadataTable => ParamCase::MetadataTable {
                file_name: format!("{}{}", self.profile.metafile_prefix(), name),
                header,
            },
            Category::MetadataColumn => ParamCase::MetadataColumn {
                file_name: format!("{}{}", self.profile.metafile_prefix(), name),
                header,
            },
            Category::SimpleCollection | Category::CompositeCollection => {
                self.collection_case(name, ty, header)?
            }
            Category::MonomorphicCollection => ParamCase::Unsupported {
                header,
                reason: "unions of collections are not supported".into(),
            },
            Category::ComplexCollection => ParamCase::Unsupported {
                header,
                reason: "nested or mixed collections are not supported".into(),
            },
        };
        Ok(case)
    }

    /// The case for an output
    pub fn output_case(&self, name: &str, spec: &ParameterSpec, arg: Option<JsonValue>) -> ParamCase {
        ParamCase::Output {
            directory: spec.qtype.name == "Collection",
            header: CaseHeader::new(self.profile, name, spec, arg),
        }
    }

    fn collection_case(
        &self,
        name: &str,
        ty: &TypeDescriptor,
        header: CaseHeader,
    ) -> crate::Result<ParamCase> {
        let Some(element_type) = ty.members.first() else {
            return Ok(ParamCase::Unsupported {
                header,
                reason: "collection without an element type".into(),
            });
        };
        let names = member_names(name, element_type)?;
        let (element, stringify) = match names.as_slice() {
            [single] => match DeclType::from_primitive(single) {
                Some(element) => (element, false),
                None => {
                    return Ok(ParamCase::Unsupported {
                        header,
                        reason: format!("no declaration type for collection element '{single}'"),
                    })
                }
            },
            _ => (DeclType::Str, true),
        };

        if ty.name == "Collection" {
            Ok(ParamCase::KeyValueCollection {
                keys_name: format!("{}{}", self.profile.collection_keys_prefix(), name),
                header,
                element,
                stringify,
            })
        } else {
            Ok(ParamCase::SimpleCollection {
                header,
                element,
                stringify,
            })
        }
    }
}
