//! Built-in `tools` actions for moving data in and out of the framework.
//!
//! These are not registered by any plugin, but are templated alongside them
//! so workflows can import raw data as an artifact and export an artifact
//! back to plain files.

// Internal imports (std, crate)
use crate::signature::{Action, Parameter, ParameterSpec, Plugin, Signature, TypeDescriptor};

// External imports (alphabetized)
use serde_json::Value as JsonValue;

/// Plugin id the built-in actions are registered under
pub const BUILTIN_PLUGIN_ID: &str = "tools";

/// The `tools` pseudo-plugin
pub fn plugin() -> Plugin {
    Plugin {
        id: BUILTIN_PLUGIN_ID.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        actions: vec![import_action(), export_action()],
    }
}

/// Import a file or directory as an artifact
pub fn import_action() -> Action {
    Action {
        id: "import".to_string(),
        name: Some("Import data".to_string()),
        description: Some("Import a file or directory as an artifact of the given type".to_string()),
        signature: Signature {
            inputs: Vec::new(),
            parameters: vec![
                Parameter::new(
                    "import_type",
                    ParameterSpec::new(TypeDescriptor::primitive("Str"))
                        .with_description("Semantic type of the imported artifact"),
                ),
                Parameter::new(
                    "input_format",
                    ParameterSpec::new(TypeDescriptor::primitive("Str"))
                        .with_default(JsonValue::Null)
                        .with_description("Format of the data; inferred from the type when omitted"),
                ),
                Parameter::new(
                    "input_data",
                    ParameterSpec::new(TypeDescriptor::primitive("Path"))
                        .with_description("File or directory to import"),
                ),
            ],
            outputs: vec![Parameter::new(
                "imported_data",
                ParameterSpec::new(TypeDescriptor::semantic("Artifact"))
                    .with_default(JsonValue::String("imported.qza".to_string())),
            )],
        },
    }
}

/// Export an artifact's data to a directory
pub fn export_action() -> Action {
    Action {
        id: "export".to_string(),
        name: Some("Export data".to_string()),
        description: Some("Export the data inside an artifact".to_string()),
        signature: Signature {
            inputs: vec![Parameter::new(
                "input_artifact",
                ParameterSpec::new(TypeDescriptor::semantic("Artifact"))
                    .with_description("Artifact to export"),
            )],
            parameters: vec![Parameter::new(
                "output_format",
                ParameterSpec::new(TypeDescriptor::primitive("Str"))
                    .with_default(JsonValue::Null)
                    .with_description("Format to export as; the artifact's own format when omitted"),
            )],
            outputs: vec![Parameter::new(
                "exported_data",
                ParameterSpec::new(TypeDescriptor::collection(TypeDescriptor::semantic("Data")))
                    .with_default(JsonValue::String("exported".to_string())),
            )],
        },
    }
}
