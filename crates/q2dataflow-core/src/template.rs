//! Action templates: the parameter cases of one action, rendered into a tool
//! document and an argument file for a target language.
//!
//! # Examples
//!
//! ```
//! use q2dataflow_core::config::Settings;
//! use q2dataflow_core::profiles::wdl::WdlProfile;
//! use q2dataflow_core::signature::{Action, Parameter, ParameterSpec, Signature, TypeDescriptor};
//! use q2dataflow_core::template::make_action_template;
//!
//! let action = Action {
//!     id: "summarize".into(),
//!     name: Some("Summarize".into()),
//!     description: None,
//!     signature: Signature {
//!         parameters: vec![Parameter::new(
//!             "depth",
//!             ParameterSpec::new(TypeDescriptor::primitive("Int")),
//!         )],
//!         ..Signature::default()
//!     },
//! };
//! let settings = Settings::docker("example/image:latest");
//! let template = make_action_template(&WdlProfile, "demo", &action, &settings, None).unwrap();
//! let rendered = template.render(&WdlProfile).unwrap();
//! assert!(rendered.document.contains("Int depth"));
//! ```

// Internal imports (std, crate)
use crate::case::{Declaration, OutputBinding, ParamCase};
use crate::config::Settings;
use crate::convert::SignatureConverter;
use crate::profiles::LanguageProfile;
use crate::signature::Action;
use crate::utils::{normalize_id, to_identifier};

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

/// Namespace leading every template id
pub const TEMPLATE_NAMESPACE: &str = "q2";

/// Identifier of an action's template, legal in both languages.
///
/// Components are joined with a double underscore so that `a_b`/`c` and
/// `a`/`b_c` stay distinct. An id that would make the join ambiguous (one
/// containing `__`, or starting or ending with `_`) is rejected.
pub fn make_action_template_id(plugin_id: &str, action_id: &str) -> crate::Result<String> {
    Ok(format!(
        "{}_{}__{}",
        TEMPLATE_NAMESPACE,
        template_id_component(plugin_id)?,
        template_id_component(action_id)?
    ))
}

fn template_id_component(id: &str) -> crate::Result<String> {
    let component = to_identifier(&normalize_id(id));
    if component.is_empty()
        || component.contains("__")
        || component.starts_with('_')
        || component.ends_with('_')
    {
        return Err(crate::Error::registry(format!(
            "'{id}' cannot be part of a template id without colliding with another"
        )));
    }
    Ok(component)
}

/// A rendered tool document with its flattened argument map
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedTemplate {
    pub document: String,
    pub arguments: Map<String, JsonValue>,
}

/// The parameter cases of one action plus what is needed to render them
#[derive(Debug, Clone)]
pub struct ActionTemplate {
    pub plugin_id: String,
    pub action_id: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub settings: Settings,
    template_id: String,
    cases: Vec<ParamCase>,
}

impl ActionTemplate {
    pub fn new(
        plugin_id: impl Into<String>,
        action_id: impl Into<String>,
        settings: &Settings,
    ) -> crate::Result<Self> {
        let plugin_id = plugin_id.into();
        let action_id = action_id.into();
        Ok(Self {
            template_id: make_action_template_id(&plugin_id, &action_id)?,
            plugin_id,
            action_id,
            label: None,
            description: None,
            settings: settings.clone(),
            cases: Vec::new(),
        })
    }

    pub fn template_id(&self) -> &str {
        &self.template_id
    }

    /// Name of the WDL workflow wrapping the task
    pub fn workflow_id(&self) -> String {
        format!("{}_workflow", self.template_id)
    }

    pub fn add_case(&mut self, case: ParamCase) {
        self.cases.push(case);
    }

    pub fn cases(&self) -> &[ParamCase] {
        &self.cases
    }

    /// All declarations, in case order
    pub fn input_declarations(&self) -> crate::Result<Vec<Declaration>> {
        let mut decls = Vec::new();
        for case in &self.cases {
            decls.extend(case.declare()?);
        }
        Ok(decls)
    }

    /// All produced files and directories, in case order
    pub fn output_bindings(&self) -> crate::Result<Vec<OutputBinding>> {
        let mut bindings = Vec::new();
        for case in &self.cases {
            bindings.extend(case.describe_outputs()?);
        }
        Ok(bindings)
    }

    /// Encoded arguments of every case, keyed for the language's argument file
    pub fn arguments(&self, profile: &dyn LanguageProfile) -> crate::Result<Map<String, JsonValue>> {
        let mut arguments = Map::new();
        for case in &self.cases {
            for (name, value) in case.encode_argument(profile)? {
                arguments.insert(profile.argument_key(self, &name), value);
            }
        }
        Ok(arguments)
    }

    pub fn render(&self, profile: &dyn LanguageProfile) -> crate::Result<RenderedTemplate> {
        Ok(RenderedTemplate {
            document: profile.render_document(self)?,
            arguments: self.arguments(profile)?,
        })
    }
}

/// Build the template of an action.
///
/// With `arguments`, only the inputs and parameters they mention are
/// declared, and their values become the template's argument map.
pub fn make_action_template(
    profile: &dyn LanguageProfile,
    plugin_id: &str,
    action: &Action,
    settings: &Settings,
    arguments: Option<&Map<String, JsonValue>>,
) -> crate::Result<ActionTemplate> {
    let mut template = ActionTemplate::new(plugin_id, &action.id, settings)?;
    template.label = action.name.clone();
    template.description = action.description.clone();

    let converter = SignatureConverter::new(profile);
    for case in converter.convert(&action.signature, arguments, true) {
        template.add_case(case?);
    }
    Ok(template)
}
