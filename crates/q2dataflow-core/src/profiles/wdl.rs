//! WDL 1.0 rendering.
//!
//! Each action becomes a params struct, a task that serializes the struct to
//! JSON and hands it to the runner, and a workflow that wraps the task so the
//! action can be run directly with engines that only execute workflows.

// Internal imports (std, crate)
use std::collections::HashSet;

use crate::case::{DeclType, Declaration};
use crate::config::Environment;
use crate::profiles::{Language, LanguageProfile};
use crate::template::ActionTemplate;
use crate::utils::stringify;

// External imports (alphabetized)
use once_cell::sync::Lazy;
use serde_json::{Map, Value as JsonValue};
use tera::{Context, Tera};

const ACTION_TEMPLATE_NAME: &str = "action.wdl";
const ACTION_TEMPLATE: &str = include_str!("../../templates/wdl/action.wdl.tera");

static KEYWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "Array", "File", "Float", "Int", "Map", "None", "Pair", "String", "alias", "as", "call",
        "command", "else", "false", "if", "import", "input", "left", "meta", "object", "output",
        "parameter_meta", "right", "runtime", "scatter", "struct", "task", "then", "true",
        "workflow", "version", "Boolean", "Object",
    ]
    .into_iter()
    .collect()
});

/// Workflow Description Language 1.0
#[derive(Debug, Clone, Copy, Default)]
pub struct WdlProfile;

impl WdlProfile {
    /// A declaration as it appears in an `input` block
    pub fn declaration(&self, decl: &Declaration, with_default: bool) -> String {
        let ty = self.type_label(&decl.ty, decl.optional, decl.default.is_some());
        match (&decl.default, with_default) {
            (Some(default), true) => {
                format!("{} {} = {}", ty, decl.name, self.literal(default, &decl.ty))
            }
            _ => format!("{} {}", ty, decl.name),
        }
    }

    /// Render a JSON value as a WDL literal of the given type
    pub fn literal(&self, value: &JsonValue, ty: &DeclType) -> String {
        match (ty, value) {
            (DeclType::Array(element), JsonValue::Array(items)) => {
                let items: Vec<_> = items.iter().map(|v| self.literal(v, element)).collect();
                format!("[{}]", items.join(", "))
            }
            (DeclType::Array(element), single) => format!("[{}]", self.literal(single, element)),
            (DeclType::Bool, JsonValue::Bool(b)) => b.to_string(),
            (DeclType::Int | DeclType::Float, JsonValue::Number(n)) => n.to_string(),
            (_, other) => quote(&stringify(other)),
        }
    }
}

/// Double-quote a string literal, escaping backslashes, quotes and newlines
pub fn quote(s: &str) -> String {
    let escaped = s
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{escaped}\"")
}

impl LanguageProfile for WdlProfile {
    fn language(&self) -> Language {
        Language::Wdl
    }

    fn prefix(&self) -> &'static str {
        "q2wdl_"
    }

    fn is_keyword(&self, name: &str) -> bool {
        KEYWORDS.contains(name)
    }

    fn type_name(&self, ty: &DeclType) -> String {
        match ty {
            DeclType::Str => "String".to_string(),
            DeclType::Int => "Int".to_string(),
            DeclType::Float => "Float".to_string(),
            DeclType::Bool => "Boolean".to_string(),
            DeclType::File => "File".to_string(),
            // WDL 1.0 has no Directory input type; the path is passed as text
            DeclType::Directory => "String".to_string(),
            DeclType::FileOrDirectory => "File".to_string(),
            DeclType::Array(element) => format!("Array[{}]", self.type_name(element)),
        }
    }

    fn marks_optional_with_default(&self) -> bool {
        true
    }

    fn path_argument(&self, path: &str, _ty: &DeclType) -> JsonValue {
        JsonValue::String(path.to_string())
    }

    fn argument_key(&self, template: &ActionTemplate, name: &str) -> String {
        format!("{}.{}", template.workflow_id(), name)
    }

    fn render_document(&self, template: &ActionTemplate) -> crate::Result<String> {
        let decls = template.input_declarations()?;
        let bindings = template.output_bindings()?;
        let template_id = template.template_id();

        let mut meta_entries = vec![
            format!("plugin: {}", quote(&template.plugin_id)),
            format!("action: {}", quote(&template.action_id)),
        ];
        if let Some(label) = &template.label {
            meta_entries.push(format!("label: {}", quote(label)));
        }
        if let Some(description) = &template.description {
            meta_entries.push(format!("description: {}", quote(description)));
        }

        let (docker_image, exports): (Option<String>, Vec<String>) =
            match template.settings.environment()? {
                Environment::Docker(docker) => (Some(quote(&docker.image_id)), Vec::new()),
                Environment::Local(local) => (
                    None,
                    local
                        .variables
                        .iter()
                        .map(|(k, v)| format!("export {k}='{}'", v.replace('\'', "'\\''")))
                        .collect(),
                ),
            };

        let outputs: Vec<_> = bindings
            .iter()
            .map(|b| {
                format!(
                    "{} {} = \"~{{{}}}\"",
                    self.type_name(&b.capture),
                    b.name,
                    b.source
                )
            })
            .collect();
        let workflow_outputs: Vec<_> = bindings
            .iter()
            .map(|b| {
                format!(
                    "{} {} = {}.{}",
                    self.type_name(&b.capture),
                    b.name,
                    template_id,
                    b.name
                )
            })
            .collect();

        let mut context = Context::new();
        context.insert("template_id", template_id);
        context.insert("workflow_id", &template.workflow_id());
        context.insert("plugin_id", &template.plugin_id);
        context.insert("action_id", &template.action_id);
        context.insert("command", &template.settings.command);
        context.insert("meta_entries", &meta_entries);
        context.insert(
            "struct_decls",
            &decls
                .iter()
                .map(|d| self.declaration(d, false))
                .collect::<Vec<_>>(),
        );
        context.insert(
            "input_decls",
            &decls
                .iter()
                .map(|d| self.declaration(d, true))
                .collect::<Vec<_>>(),
        );
        context.insert(
            "names",
            &decls.iter().map(|d| d.name.as_str()).collect::<Vec<_>>(),
        );
        context.insert("exports", &exports);
        context.insert("docker_image", &docker_image);
        context.insert("outputs", &outputs);
        context.insert("workflow_outputs", &workflow_outputs);

        let mut tera = Tera::default();
        tera.add_raw_template(ACTION_TEMPLATE_NAME, ACTION_TEMPLATE)?;
        let rendered = tera.render(ACTION_TEMPLATE_NAME, &context)?;
        log::debug!("Rendered WDL document for {}", template_id);
        Ok(rendered)
    }

    fn dump_arguments(&self, arguments: &Map<String, JsonValue>) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(arguments)?)
    }

    fn arguments_suffix(&self) -> &'static str {
        "inputs.json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decl(ty: DeclType, optional: bool, default: Option<JsonValue>) -> Declaration {
        Declaration {
            name: "p".into(),
            ty,
            optional,
            default,
            doc: None,
        }
    }

    #[test]
    fn test_declarations() {
        let profile = WdlProfile;
        assert_eq!(
            profile.declaration(&decl(DeclType::Bool, true, Some(json!(false))), true),
            "Boolean? p = false"
        );
        assert_eq!(
            profile.declaration(&decl(DeclType::Bool, true, Some(json!(false))), false),
            "Boolean? p"
        );
        assert_eq!(
            profile.declaration(&decl(DeclType::array(DeclType::Float), true, Some(json!([1.0, 2.0]))), true),
            "Array[Float]? p = [1.0, 2.0]"
        );
        assert_eq!(
            profile.declaration(&decl(DeclType::Str, false, None), true),
            "String p"
        );
    }

    #[test]
    fn test_literals() {
        let profile = WdlProfile;
        assert_eq!(profile.literal(&json!("a \"b\""), &DeclType::Str), r#""a \"b\"""#);
        assert_eq!(profile.literal(&json!(true), &DeclType::Bool), "true");
        assert_eq!(profile.literal(&json!(4), &DeclType::Int), "4");
        assert_eq!(
            profile.literal(&json!(["x", "y"]), &DeclType::array(DeclType::Str)),
            r#"["x", "y"]"#
        );
    }

    #[test]
    fn test_keywords() {
        assert!(WdlProfile.is_keyword("input"));
        assert!(WdlProfile.is_keyword("output"));
        assert!(!WdlProfile.is_keyword("table"));
    }

    #[test]
    fn test_directory_has_no_wdl_type() {
        assert_eq!(WdlProfile.type_name(&DeclType::Directory), "String");
        assert_eq!(
            WdlProfile.type_name(&DeclType::array(DeclType::File)),
            "Array[File]"
        );
    }

    #[test]
    fn test_embedded_template_parses() -> crate::Result<()> {
        let mut tera = Tera::default();
        tera.add_raw_template(ACTION_TEMPLATE_NAME, ACTION_TEMPLATE)?;
        Ok(())
    }
}
