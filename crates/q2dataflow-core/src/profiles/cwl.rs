//! CWL v1.0 rendering.
//!
//! Each action becomes a `CommandLineTool`. The engine stages the tool's
//! inputs into `inputs.json` through `InitialWorkDirRequirement`, and the
//! tool calls back into the runner with that file.

// Internal imports (std, crate)
use crate::case::{DeclType, Declaration};
use crate::config::{Availability, Environment};
use crate::profiles::{Language, LanguageProfile};
use crate::template::ActionTemplate;
use crate::utils::normalize_id;

// External imports (alphabetized)
use serde_json::{json, Map, Value as JsonValue};

const CWL_VERSION: &str = "v1.0";
const INPUTS_FILE: &str = "inputs.json";

/// Common Workflow Language v1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct CwlProfile;

impl CwlProfile {
    /// The `inputs` entry of one declaration
    pub fn input_entry(&self, decl: &Declaration) -> JsonValue {
        let mut entry = Map::new();
        entry.insert("type".into(), self.input_type(decl));
        if let Some(doc) = &decl.doc {
            entry.insert("doc".into(), JsonValue::String(doc.clone()));
        }
        if let Some(default) = &decl.default {
            entry.insert("default".into(), self.default_value(default, &decl.ty));
        }
        JsonValue::Object(entry)
    }

    // A file-or-directory input has no single type name, so it is declared as a type list
    fn input_type(&self, decl: &Declaration) -> JsonValue {
        if decl.ty != DeclType::FileOrDirectory {
            return JsonValue::String(self.type_label(&decl.ty, decl.optional, decl.default.is_some()));
        }
        let mut types = Vec::new();
        if decl.optional && decl.default.is_none() {
            types.push(json!("null"));
        }
        types.extend([json!("File"), json!("Directory")]);
        JsonValue::Array(types)
    }

    // CWL defaults are native values, but array declarations need arrays
    fn default_value(&self, value: &JsonValue, ty: &DeclType) -> JsonValue {
        match (ty, value) {
            (DeclType::Array(_), JsonValue::Array(_)) => value.clone(),
            (DeclType::Array(_), single) => JsonValue::Array(vec![single.clone()]),
            _ => value.clone(),
        }
    }

    fn requirements(&self, template: &ActionTemplate) -> crate::Result<JsonValue> {
        let mut requirements = Map::new();
        match template.settings.environment()? {
            Environment::Docker(docker) => {
                let mut requirement = Map::new();
                if docker.availability == Availability::Remote {
                    requirement.insert("dockerPull".into(), json!(docker.image_id));
                }
                requirement.insert("dockerImageId".into(), json!(docker.image_id));
                if let Some(dir) = &docker.output_directory {
                    requirement.insert("dockerOutputDirectory".into(), json!(dir));
                }
                requirements.insert("DockerRequirement".into(), JsonValue::Object(requirement));
            }
            Environment::Local(local) => {
                requirements.insert(
                    "EnvVarRequirement".into(),
                    json!({ "envDef": local.variables }),
                );
            }
        }
        requirements.insert(
            "InitialWorkDirRequirement".into(),
            json!({
                "listing": [{
                    "entryname": INPUTS_FILE,
                    "entry": "{\"inputs\": $(inputs)}",
                }]
            }),
        );
        Ok(JsonValue::Object(requirements))
    }
}

impl LanguageProfile for CwlProfile {
    fn language(&self) -> Language {
        Language::Cwl
    }

    fn prefix(&self) -> &'static str {
        "q2cwl_"
    }

    fn is_keyword(&self, _name: &str) -> bool {
        false
    }

    fn type_name(&self, ty: &DeclType) -> String {
        match ty {
            DeclType::Str => "string".to_string(),
            DeclType::Int => "long".to_string(),
            DeclType::Float => "double".to_string(),
            DeclType::Bool => "boolean".to_string(),
            DeclType::File => "File".to_string(),
            DeclType::Directory => "Directory".to_string(),
            // Only spelled out as a full type list by `input_entry`
            DeclType::FileOrDirectory => "File".to_string(),
            DeclType::Array(element) => format!("{}[]", self.type_name(element)),
        }
    }

    fn marks_optional_with_default(&self) -> bool {
        false
    }

    fn path_argument(&self, path: &str, ty: &DeclType) -> JsonValue {
        let class = match ty {
            DeclType::Directory => "Directory",
            _ => "File",
        };
        json!({ "class": class, "path": path })
    }

    fn argument_key(&self, _template: &ActionTemplate, name: &str) -> String {
        name.to_string()
    }

    fn render_document(&self, template: &ActionTemplate) -> crate::Result<String> {
        let mut inputs = Map::new();
        for decl in template.input_declarations()? {
            inputs.insert(decl.name.clone(), self.input_entry(&decl));
        }

        let mut outputs = Map::new();
        for binding in template.output_bindings()? {
            let mut entry = Map::new();
            entry.insert("type".into(), json!(self.type_name(&binding.capture)));
            if let Some(doc) = &binding.doc {
                entry.insert("doc".into(), json!(doc));
            }
            entry.insert(
                "outputBinding".into(),
                json!({ "glob": format!("$(inputs.{})", binding.source) }),
            );
            outputs.insert(binding.name, JsonValue::Object(entry));
        }

        let mut tool = Map::new();
        tool.insert("cwlVersion".into(), json!(CWL_VERSION));
        tool.insert("class".into(), json!("CommandLineTool"));
        tool.insert("id".into(), json!(template.template_id()));
        tool.insert("requirements".into(), self.requirements(template)?);
        if let Some(label) = &template.label {
            tool.insert("label".into(), json!(label));
        }
        if let Some(description) = &template.description {
            tool.insert("doc".into(), json!(description));
        }
        tool.insert("inputs".into(), JsonValue::Object(inputs));
        tool.insert("baseCommand".into(), json!(template.settings.command));
        tool.insert(
            "arguments".into(),
            json!([
                "cwl",
                "run",
                normalize_id(&template.plugin_id),
                template.action_id,
                INPUTS_FILE
            ]),
        );
        tool.insert("outputs".into(), JsonValue::Object(outputs));

        let rendered = serde_yaml::to_string(&JsonValue::Object(tool))?;
        log::debug!("Rendered CWL document for {}", template.template_id());
        Ok(rendered)
    }

    fn dump_arguments(&self, arguments: &Map<String, JsonValue>) -> crate::Result<String> {
        Ok(serde_yaml::to_string(arguments)?)
    }

    fn arguments_suffix(&self) -> &'static str {
        "inputs.yml"
    }

    fn preamble(&self) -> Option<&'static str> {
        Some("#!/usr/bin/env cwl-runner")
    }

    fn runtime_envelope(&self) -> Option<&'static str> {
        Some("inputs")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_labels() {
        let profile = CwlProfile;
        assert_eq!(profile.type_name(&DeclType::Int), "long");
        assert_eq!(profile.type_name(&DeclType::Float), "double");
        assert_eq!(
            profile.type_label(&DeclType::array(DeclType::Str), true, false),
            "string[]?"
        );
        assert_eq!(profile.type_label(&DeclType::Bool, true, true), "boolean");
    }

    #[test]
    fn test_input_entry() {
        let decl = Declaration {
            name: "weights".into(),
            ty: DeclType::array(DeclType::Float),
            optional: true,
            default: Some(json!([1.0, 2.0])),
            doc: Some("Per-key weights".into()),
        };
        assert_eq!(
            CwlProfile.input_entry(&decl),
            json!({"type": "double[]", "doc": "Per-key weights", "default": [1.0, 2.0]})
        );
    }

    #[test]
    fn test_file_or_directory_entry() {
        let decl = Declaration {
            name: "input_data".into(),
            ty: DeclType::FileOrDirectory,
            optional: false,
            default: None,
            doc: None,
        };
        assert_eq!(
            CwlProfile.input_entry(&decl),
            json!({"type": ["File", "Directory"]})
        );

        let optional = Declaration {
            optional: true,
            ..decl
        };
        assert_eq!(
            CwlProfile.input_entry(&optional)["type"],
            json!(["null", "File", "Directory"])
        );
    }

    #[test]
    fn test_path_arguments() {
        assert_eq!(
            CwlProfile.path_argument("out", &DeclType::Directory),
            json!({"class": "Directory", "path": "out"})
        );
        assert_eq!(
            CwlProfile.path_argument("t.qza", &DeclType::File),
            json!({"class": "File", "path": "t.qza"})
        );
    }
}
