//! Running an action from a generated tool's argument file.
//!
//! [`ActionRunner::run`] is the entry point generated tools call back into.
//! Given the raw argument map an engine produced, it:
//!
//! 1. reformats the arguments for the tool's language,
//! 2. finds the action (the `tools` plugin resolves to the built-ins),
//! 3. pulls out the desired output locations,
//! 4. converts the remaining arguments into [`NativeValue`]s,
//! 5. invokes the action through an [`ActionBackend`], and
//! 6. saves every result.
//!
//! Everything printed along the way is buffered in a [`RunLog`]. When a stage
//! fails, the stage's header and the error go to the front of both output
//! streams, followed by the buffered log, so the cause is the first thing an
//! engine's log viewer shows.

pub mod native;

// Internal imports (std, crate)
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::builtins::{self, BUILTIN_PLUGIN_ID};
use crate::config::{ColumnIndexing, Settings};
use crate::profiles::LanguageProfile;
use crate::reformat::{MetadataReference, Reformatter};
use crate::registry::ActionRegistry;
use crate::signature::{Action, ParameterSpec, Role, TypeDescriptor};
use crate::utils::normalize_id;

pub use native::{
    Artifact, ArtifactCollection, Metadata, MetadataColumn, NativeArguments, NativeValue,
};

// External imports (alphabetized)
use serde_json::{Map, Value as JsonValue};

pub const REFORMAT_HEADER: &str = "Unexpected error reformatting the arguments:\n";
pub const FIND_ACTION_HEADER: &str = "Unexpected error finding the action:\n";
pub const OUTPUTS_HEADER: &str = "Unexpected error extracting output arguments:\n";
pub const LOAD_HEADER: &str = "Unexpected error loading arguments:\n";
pub const PLUGIN_HEADER: &str = "This plugin encountered an error:\n";
pub const SAVE_HEADER: &str = "Unexpected error saving results:\n";

/// A result produced by an action, before it is saved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResult {
    /// Output name in the action signature
    pub name: String,
    pub semantic_type: String,
    /// Where the backend left the result
    pub path: PathBuf,
}

/// A result after it was saved to its requested location
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedResult {
    pub name: String,
    pub semantic_type: String,
    pub location: PathBuf,
}

/// Buffered output of one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunLog {
    stdout: Vec<String>,
    stderr: Vec<String>,
}

impl RunLog {
    pub fn out(&mut self, line: impl Into<String>) {
        self.stdout.push(line.into());
    }

    pub fn err(&mut self, line: impl Into<String>) {
        self.stderr.push(line.into());
    }

    /// Buffer captured standard output, one entry per line
    pub fn capture_stdout(&mut self, text: &str) {
        self.stdout.extend(text.lines().map(str::to_string));
    }

    /// Buffer captured standard error, one entry per line
    pub fn capture_stderr(&mut self, text: &str) {
        self.stderr.extend(text.lines().map(str::to_string));
    }

    pub fn stdout_lines(&self) -> &[String] {
        &self.stdout
    }

    pub fn stderr_lines(&self) -> &[String] {
        &self.stderr
    }

    fn flush(&self, out: &mut dyn Write, err: &mut dyn Write) -> std::io::Result<()> {
        for line in &self.stdout {
            writeln!(out, "{line}")?;
        }
        for line in &self.stderr {
            writeln!(err, "{line}")?;
        }
        out.flush()?;
        err.flush()
    }
}

/// Loads inputs, invokes actions and persists results
pub trait ActionBackend {
    fn load_artifact(&self, path: &Path) -> crate::Result<Artifact>;

    /// Load a directory of artifacts
    fn load_artifact_collection(&self, path: &Path) -> crate::Result<ArtifactCollection>;

    fn load_metadata(&self, reference: &MetadataReference) -> crate::Result<Metadata>;

    /// Invoke an action, buffering anything it prints into `log`
    fn invoke(
        &self,
        plugin_id: &str,
        action: &Action,
        arguments: &NativeArguments,
        log: &mut RunLog,
    ) -> crate::Result<Vec<ActionResult>>;

    /// Save a result, returning the location it was written to
    fn save_result(&self, result: &ActionResult, location: &Path) -> crate::Result<PathBuf>;
}

/// Switches that affect argument conversion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunOptions {
    pub parse_primitives: bool,
    pub column_indexing: ColumnIndexing,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            parse_primitives: true,
            column_indexing: ColumnIndexing::default(),
        }
    }
}

impl From<&Settings> for RunOptions {
    fn from(settings: &Settings) -> Self {
        Self {
            parse_primitives: settings.parse_primitives,
            column_indexing: settings.column_indexing,
        }
    }
}

/// Runs actions for one tool language
pub struct ActionRunner<'a> {
    registry: &'a dyn ActionRegistry,
    backend: &'a dyn ActionBackend,
    profile: &'a dyn LanguageProfile,
    options: RunOptions,
}

fn stage<T>(header: &str, f: impl FnOnce() -> crate::Result<T>) -> crate::Result<T> {
    f().map_err(|e| crate::Error::stage(header, e))
}

impl<'a> ActionRunner<'a> {
    pub fn new(
        registry: &'a dyn ActionRegistry,
        backend: &'a dyn ActionBackend,
        profile: &'a dyn LanguageProfile,
        options: RunOptions,
    ) -> Self {
        Self {
            registry,
            backend,
            profile,
            options,
        }
    }

    /// Run an action from the raw argument map of a generated tool
    pub fn run(
        &self,
        plugin_id: &str,
        action_id: &str,
        raw: Map<String, JsonValue>,
        out: &mut dyn Write,
        err: &mut dyn Write,
    ) -> crate::Result<Vec<SavedResult>> {
        let mut log = RunLog::default();
        match self.run_stages(plugin_id, action_id, raw, &mut log) {
            Ok(saved) => {
                log.flush(out, err)?;
                Ok(saved)
            }
            Err(e) => {
                writeln!(out, "{e}\n")?;
                writeln!(err, "{e}\n")?;
                log.flush(out, err)?;
                Err(e)
            }
        }
    }

    fn run_stages(
        &self,
        plugin_id: &str,
        action_id: &str,
        raw: Map<String, JsonValue>,
        log: &mut RunLog,
    ) -> crate::Result<Vec<SavedResult>> {
        let arguments = stage(REFORMAT_HEADER, || {
            Reformatter::new(self.profile).reformat(raw)
        })?;
        let action = stage(FIND_ACTION_HEADER, || self.find_action(plugin_id, action_id))?;
        let (outputs, inputs) =
            stage(OUTPUTS_HEADER, || Ok(extract_output_arguments(&action, arguments)))?;
        let native = stage(LOAD_HEADER, || self.convert_arguments(&action, inputs, log))?;

        log::info!("Invoking {}.{}", plugin_id, action.id);
        let results = stage(PLUGIN_HEADER, || {
            self.backend.invoke(plugin_id, &action, &native, log)
        })?;

        stage(SAVE_HEADER, || {
            let mut saved = Vec::with_capacity(results.len());
            for result in results {
                let location = outputs
                    .iter()
                    .find(|(name, _)| *name == result.name)
                    .map(|(_, location)| location.clone())
                    .unwrap_or_else(|| PathBuf::from(&result.name));
                let location = self.backend.save_result(&result, &location)?;
                log.out(format!(
                    "Saved {} to: {}",
                    result.semantic_type,
                    location.display()
                ));
                saved.push(SavedResult {
                    name: result.name,
                    semantic_type: result.semantic_type,
                    location,
                });
            }
            Ok(saved)
        })
    }

    fn find_action(&self, plugin_id: &str, action_id: &str) -> crate::Result<Action> {
        if normalize_id(plugin_id) == BUILTIN_PLUGIN_ID {
            let plugin = builtins::plugin();
            return plugin.action(action_id).cloned().ok_or_else(|| {
                crate::Error::registry(format!("No built-in action '{action_id}'"))
            });
        }
        let (_, action) = self.registry.action(plugin_id, action_id)?;
        Ok(action.clone())
    }

    /// Convert reformatted arguments into native values, logging each one
    pub fn convert_arguments(
        &self,
        action: &Action,
        arguments: Map<String, JsonValue>,
        log: &mut RunLog,
    ) -> crate::Result<NativeArguments> {
        let mut native = Vec::with_capacity(arguments.len());
        for (name, value) in arguments {
            let (role, spec) = action.signature.find(&name).ok_or_else(|| {
                crate::Error::invalid_argument(&name, "not part of the action signature")
            })?;
            let converted = self.convert_argument(&name, role, spec, &value)?;
            log.out(format!("｢{name}: {converted}｣"));
            native.push((name, converted));
        }
        Ok(native)
    }

    fn convert_argument(
        &self,
        name: &str,
        role: Role,
        spec: &ParameterSpec,
        value: &JsonValue,
    ) -> crate::Result<NativeValue> {
        let ty = &spec.qtype;
        let empty = match value {
            JsonValue::Null => true,
            JsonValue::Array(items) => items.is_empty(),
            JsonValue::Object(map) => map.is_empty(),
            _ => false,
        };

        if role == Role::Input {
            if empty {
                return Ok(NativeValue::None);
            }
            return self.load_artifacts(name, spec, value);
        }

        if empty {
            if let Some(default) = spec.concrete_default() {
                return self.parse(name, spec, default);
            }
            if value.is_null() {
                return Ok(NativeValue::None);
            }
        }

        if ty.is_metadata() {
            return self.convert_metadata(name, spec, value);
        }
        self.parse(name, spec, value)
    }

    fn parse(&self, name: &str, spec: &ParameterSpec, value: &JsonValue) -> crate::Result<NativeValue> {
        if self.options.parse_primitives {
            native::parse_primitive(name, &spec.qtype, value)
        } else {
            Ok(native::from_json(value))
        }
    }

    fn load_artifacts(
        &self,
        name: &str,
        spec: &ParameterSpec,
        value: &JsonValue,
    ) -> crate::Result<NativeValue> {
        let ty = &spec.qtype;
        if ty.is_collection() && ty.name == "Collection" {
            let path = value
                .as_str()
                .ok_or_else(|| crate::Error::invalid_argument(name, "expected a directory path"))?;
            let collection = self.backend.load_artifact_collection(Path::new(path))?;
            if collection.members.is_empty() {
                return Ok(NativeValue::None);
            }
            return Ok(NativeValue::ArtifactCollection(collection));
        }

        if ty.is_collection() {
            let paths: Vec<&str> = match value {
                JsonValue::Array(items) => items.iter().filter_map(|v| v.as_str()).collect(),
                JsonValue::String(s) => s.split_whitespace().collect(),
                other => {
                    return Err(crate::Error::invalid_argument(
                        name,
                        format!("expected artifact paths, got {other}"),
                    ))
                }
            };
            if paths.is_empty() {
                return Ok(NativeValue::None);
            }
            let artifacts = paths
                .into_iter()
                .map(|p| self.backend.load_artifact(Path::new(p)))
                .collect::<crate::Result<Vec<_>>>()?;
            return Ok(NativeValue::Artifacts(artifacts));
        }

        let path = value
            .as_str()
            .ok_or_else(|| crate::Error::invalid_argument(name, "expected an artifact path"))?;
        Ok(NativeValue::Artifact(self.backend.load_artifact(Path::new(path))?))
    }

    fn convert_metadata(
        &self,
        name: &str,
        spec: &ParameterSpec,
        value: &JsonValue,
    ) -> crate::Result<NativeValue> {
        let records: Vec<MetadataReference> = match value {
            JsonValue::Array(_) => serde_json::from_value(value.clone())?,
            JsonValue::Object(_) => vec![serde_json::from_value(value.clone())?],
            other => {
                return Err(crate::Error::invalid_argument(
                    name,
                    format!("expected a metadata reference, got {other}"),
                ))
            }
        };

        let mut metadata: Option<Metadata> = None;
        for record in &records {
            let loaded = self.load_metadata(name, record)?;
            metadata = Some(match metadata {
                Some(merged) => merged.merge(loaded),
                None => loaded,
            });
        }
        let Some(metadata) = metadata else {
            return Ok(NativeValue::None);
        };

        if !spec.qtype.is_metadata_column() {
            return Ok(NativeValue::Metadata(metadata));
        }
        let column = records.iter().find_map(|r| r.column.clone());
        let column = resolve_column(name, &metadata, column, self.options.column_indexing)?;
        check_column_type(name, &spec.qtype, &metadata, &column)?;
        Ok(NativeValue::MetadataColumn(MetadataColumn { metadata, column }))
    }

    fn load_metadata(&self, name: &str, record: &MetadataReference) -> crate::Result<Metadata> {
        self.backend.load_metadata(record).map_err(|e| match e {
            crate::Error::MetadataLoad {
                source_path, reason, ..
            } => crate::Error::MetadataLoad {
                param: name.to_string(),
                source_path,
                reason,
            },
            other => crate::Error::MetadataLoad {
                param: name.to_string(),
                source_path: record.source.clone(),
                reason: other.to_string(),
            },
        })
    }
}

/// Split the desired output locations from the other arguments.
///
/// An output without a location is saved under its default, else its name.
pub fn extract_output_arguments(
    action: &Action,
    mut arguments: Map<String, JsonValue>,
) -> (Vec<(String, PathBuf)>, Map<String, JsonValue>) {
    let outputs = action
        .signature
        .outputs
        .iter()
        .map(|output| {
            let location = match arguments.remove(&output.name) {
                Some(JsonValue::String(s)) if !s.is_empty() => s,
                _ => output
                    .spec
                    .concrete_default()
                    .and_then(|d| d.as_str())
                    .unwrap_or(&output.name)
                    .to_string(),
            };
            (output.name.clone(), PathBuf::from(location))
        })
        .collect();
    (outputs, arguments)
}

/// Check a resolved column against the column type a parameter declares.
///
/// Columns whose type the backend could not determine are accepted.
pub fn check_column_type(
    param: &str,
    ty: &TypeDescriptor,
    metadata: &Metadata,
    column: &str,
) -> crate::Result<()> {
    let Some(actual) = metadata.column_type(column) else {
        return Ok(());
    };
    let declared: Vec<&str> = match ty.members.first() {
        Some(inner) if inner.is_union() => inner.members.iter().map(|m| m.name.as_str()).collect(),
        Some(inner) => vec![inner.name.as_str()],
        None => Vec::new(),
    };
    if declared.is_empty() || declared.iter().any(|d| d.eq_ignore_ascii_case(actual)) {
        return Ok(());
    }
    Err(crate::Error::MetadataColumn {
        param: param.to_string(),
        column: column.to_string(),
        reason: format!(
            "column is of type {actual}, expected {}",
            declared.join(" | ").to_lowercase()
        ),
    })
}

/// Resolve a column reference to a column name.
///
/// Names are used as given. Numbers, or one-element lists of numbers, are
/// positions interpreted according to `indexing`.
pub fn resolve_column(
    param: &str,
    metadata: &Metadata,
    column: Option<JsonValue>,
    indexing: ColumnIndexing,
) -> crate::Result<String> {
    let error = |column: &JsonValue, reason: &str| crate::Error::MetadataColumn {
        param: param.to_string(),
        column: column.to_string(),
        reason: reason.to_string(),
    };
    let column = column.ok_or_else(|| error(&JsonValue::Null, "no column was given"))?;

    let index = match &column {
        JsonValue::String(name) => {
            if metadata.columns.is_empty() || metadata.columns.contains(name) {
                return Ok(name.clone());
            }
            name.trim()
                .parse::<i64>()
                .map_err(|_| error(&column, "no such column"))?
        }
        JsonValue::Number(n) => n.as_i64().ok_or_else(|| error(&column, "not an integer"))?,
        JsonValue::Array(items) if items.len() == 1 => match &items[0] {
            JsonValue::Number(n) => n.as_i64().ok_or_else(|| error(&column, "not an integer"))?,
            JsonValue::String(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| error(&column, "not an integer"))?,
            _ => return Err(error(&column, "not a column reference")),
        },
        _ => return Err(error(&column, "not a column reference")),
    };

    let position = match indexing {
        ColumnIndexing::ByNameOrZeroBased => index,
        ColumnIndexing::OneBasedWithIdColumn => index - 2,
    };
    usize::try_from(position)
        .ok()
        .and_then(|p| metadata.columns.get(p))
        .cloned()
        .ok_or_else(|| error(&column, "index does not refer to a data column"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profiles::wdl::WdlProfile;
    use crate::reformat::MetadataSourceKind;
    use crate::registry::PluginRegistry;
    use crate::signature::{Parameter, Plugin, Signature, TypeDescriptor};
    use serde_json::json;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    #[derive(Default)]
    struct FakeBackend {
        invoked: RefCell<Vec<NativeArguments>>,
        fail_with: Option<String>,
        column_types: BTreeMap<String, String>,
    }

    impl ActionBackend for FakeBackend {
        fn load_artifact(&self, path: &Path) -> crate::Result<Artifact> {
            Ok(Artifact {
                path: path.to_path_buf(),
                semantic_type: None,
            })
        }

        fn load_artifact_collection(&self, path: &Path) -> crate::Result<ArtifactCollection> {
            Ok(ArtifactCollection {
                path: path.to_path_buf(),
                members: Vec::new(),
            })
        }

        fn load_metadata(&self, reference: &MetadataReference) -> crate::Result<Metadata> {
            Ok(Metadata {
                sources: vec![PathBuf::from(&reference.source)],
                columns: vec!["body-site".into(), "subject".into()],
                column_types: self.column_types.clone(),
            })
        }

        fn invoke(
            &self,
            _plugin_id: &str,
            action: &Action,
            arguments: &NativeArguments,
            log: &mut RunLog,
        ) -> crate::Result<Vec<ActionResult>> {
            self.invoked.borrow_mut().push(arguments.clone());
            log.capture_stdout("running\n");
            if let Some(message) = &self.fail_with {
                log.capture_stderr("traceback line");
                return Err(crate::Error::ActionInvocation(message.clone()));
            }
            Ok(action
                .signature
                .outputs
                .iter()
                .map(|o| ActionResult {
                    name: o.name.clone(),
                    semantic_type: "FeatureTable[Frequency]".into(),
                    path: PathBuf::from("/tmp/result.qza"),
                })
                .collect())
        }

        fn save_result(&self, _result: &ActionResult, location: &Path) -> crate::Result<PathBuf> {
            Ok(location.with_extension("qza"))
        }
    }

    fn registry() -> PluginRegistry {
        PluginRegistry::new(vec![Plugin {
            id: "diversity".into(),
            version: "1.0.0".into(),
            actions: vec![Action {
                id: "core".into(),
                name: None,
                description: None,
                signature: Signature {
                    inputs: vec![Parameter::new(
                        "table",
                        ParameterSpec::new(TypeDescriptor::semantic("FeatureTable")),
                    )],
                    parameters: vec![
                        Parameter::new(
                            "depth",
                            ParameterSpec::new(TypeDescriptor::primitive("Int")),
                        ),
                        Parameter::new(
                            "group",
                            ParameterSpec::new(TypeDescriptor::metadata_column(
                                TypeDescriptor::primitive("Categorical"),
                            ))
                            .with_default(JsonValue::Null),
                        ),
                        Parameter::new(
                            "metrics",
                            ParameterSpec::new(TypeDescriptor::set(TypeDescriptor::primitive(
                                "Str",
                            )))
                            .with_default(json!(["shannon"])),
                        ),
                    ],
                    outputs: vec![Parameter::new(
                        "summary",
                        ParameterSpec::new(TypeDescriptor::semantic("FeatureTable")),
                    )],
                },
            }],
        }])
    }

    fn raw(value: JsonValue) -> Map<String, JsonValue> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_successful_run() -> crate::Result<()> {
        let registry = registry();
        let backend = FakeBackend::default();
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let saved = runner.run(
            "diversity",
            "core",
            raw(json!({
                "table": "t.qza",
                "depth": "100",
                "q2wdl_metafile_group": "md.tsv",
                "group": "body-site",
                "metrics": [],
                "summary": "out/summary"
            })),
            &mut out,
            &mut err,
        )?;

        assert_eq!(saved[0].location, PathBuf::from("out/summary.qza"));
        let invoked = backend.invoked.borrow();
        let args: Vec<_> = invoked[0].iter().map(|(n, _)| n.as_str()).collect();
        assert!(args.contains(&"depth"));
        assert!(!args.contains(&"summary"));
        let depth = invoked[0].iter().find(|(n, _)| n == "depth").map(|(_, v)| v.clone());
        assert_eq!(depth, Some(NativeValue::Int(100)));
        let metrics = invoked[0].iter().find(|(n, _)| n == "metrics").map(|(_, v)| v.clone());
        assert_eq!(
            metrics,
            Some(NativeValue::Set(vec![NativeValue::Str("shannon".into())]))
        );

        let out = String::from_utf8_lossy(&out);
        assert!(out.contains("｢depth: 100｣"));
        assert!(out.contains("running"));
        assert!(out.contains("Saved FeatureTable[Frequency] to: out/summary.qza"));
        Ok(())
    }

    #[test]
    fn test_failure_prints_header_before_buffered_output() {
        let registry = registry();
        let backend = FakeBackend {
            fail_with: Some("bad depth".into()),
            ..FakeBackend::default()
        };
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());

        let result = runner.run(
            "diversity",
            "core",
            raw(json!({"table": "t.qza", "depth": 1})),
            &mut out,
            &mut err,
        );
        assert!(matches!(result, Err(crate::Error::Stage { ref header, .. }) if header == PLUGIN_HEADER));

        let out = String::from_utf8_lossy(&out);
        let err = String::from_utf8_lossy(&err);
        assert!(out.starts_with(PLUGIN_HEADER));
        assert!(err.starts_with(PLUGIN_HEADER));
        assert!(out.find("bad depth") < out.find("running"));
        assert!(err.contains("traceback line"));
    }

    #[test]
    fn test_unknown_action_uses_find_header() {
        let registry = registry();
        let backend = FakeBackend::default();
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let result = runner.run("diversity", "missing", Map::new(), &mut out, &mut err);
        assert!(matches!(result, Err(crate::Error::Stage { ref header, .. }) if header == FIND_ACTION_HEADER));
        assert!(backend.invoked.borrow().is_empty());
    }

    #[test]
    fn test_builtin_actions_resolve() {
        let registry = PluginRegistry::default();
        let backend = FakeBackend::default();
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        let saved = runner
            .run(
                "tools",
                "import",
                raw(json!({"import_type": "FeatureTable", "input_data": "table.biom"})),
                &mut out,
                &mut err,
            )
            .unwrap();
        assert_eq!(saved[0].location, PathBuf::from("imported.qza"));
    }

    #[test]
    fn test_resolve_column_strategies() -> crate::Result<()> {
        let metadata = Metadata {
            sources: vec!["md.tsv".into()],
            columns: vec!["body-site".into(), "subject".into()],
            ..Metadata::default()
        };
        let by_name = ColumnIndexing::ByNameOrZeroBased;
        let display = ColumnIndexing::OneBasedWithIdColumn;

        assert_eq!(resolve_column("c", &metadata, Some(json!("subject")), by_name)?, "subject");
        assert_eq!(resolve_column("c", &metadata, Some(json!(1)), by_name)?, "subject");
        assert_eq!(resolve_column("c", &metadata, Some(json!([2])), display)?, "body-site");
        assert_eq!(resolve_column("c", &metadata, Some(json!("3")), display)?, "subject");
        assert!(matches!(
            resolve_column("c", &metadata, Some(json!(1)), display),
            Err(crate::Error::MetadataColumn { .. })
        ));
        assert!(resolve_column("c", &metadata, Some(json!("missing")), by_name).is_err());
        Ok(())
    }

    #[test]
    fn test_column_of_the_wrong_type_fails_loading() -> crate::Result<()> {
        let registry = registry();
        let backend = FakeBackend {
            column_types: BTreeMap::from([
                ("body-site".to_string(), "categorical".to_string()),
                ("subject".to_string(), "numeric".to_string()),
            ]),
            ..FakeBackend::default()
        };
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let action = Action {
            id: "group".into(),
            name: None,
            description: None,
            signature: Signature {
                parameters: vec![Parameter::new(
                    "group_column",
                    ParameterSpec::new(TypeDescriptor::metadata_column(
                        TypeDescriptor::primitive("Categorical"),
                    )),
                )],
                ..Signature::default()
            },
        };
        let argument = |column: &str| -> crate::Result<Map<String, JsonValue>> {
            let reference = MetadataReference::new("group_column", "md.tsv", Some(json!(column)))?;
            Ok(raw(json!({ "group_column": serde_json::to_value(reference)? })))
        };

        let mut log = RunLog::default();
        let native = runner.convert_arguments(&action, argument("body-site")?, &mut log)?;
        assert!(matches!(&native[0].1, NativeValue::MetadataColumn(c) if c.column == "body-site"));

        match runner.convert_arguments(&action, argument("subject")?, &mut log) {
            Err(crate::Error::MetadataColumn { column, reason, .. }) => {
                assert_eq!(column, "subject");
                assert_eq!(reason, "column is of type numeric, expected categorical");
            }
            other => panic!("expected a column type error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_extract_outputs_defaults_to_name() {
        let registry = registry();
        let (_, action) = registry.action("diversity", "core").unwrap();
        let (outputs, rest) = extract_output_arguments(action, raw(json!({"depth": 1})));
        assert_eq!(outputs, vec![("summary".to_string(), PathBuf::from("summary"))]);
        assert!(rest.contains_key("depth"));
    }

    #[test]
    fn test_metadata_sources_are_merged() -> crate::Result<()> {
        let registry = registry();
        let backend = FakeBackend::default();
        let runner = ActionRunner::new(&registry, &backend, &WdlProfile, RunOptions::default());
        let action = Action {
            id: "annotate".into(),
            name: None,
            description: None,
            signature: Signature {
                parameters: vec![Parameter::new(
                    "metadata",
                    ParameterSpec::new(TypeDescriptor::metadata()),
                )],
                ..Signature::default()
            },
        };
        let records = serde_json::to_value(vec![
            MetadataReference::new("metadata", "a.tsv", None)?,
            MetadataReference {
                kind: MetadataSourceKind::ArtifactPackaged,
                source: "b.qza".into(),
                column: None,
            },
        ])?;

        let mut log = RunLog::default();
        let native =
            runner.convert_arguments(&action, raw(json!({ "metadata": records })), &mut log)?;
        match &native[0].1 {
            NativeValue::Metadata(metadata) => assert_eq!(
                metadata.sources,
                vec![PathBuf::from("a.tsv"), PathBuf::from("b.qza")]
            ),
            other => panic!("expected merged metadata, got {other:?}"),
        }
        assert_eq!(log.stdout_lines(), ["｢metadata: metadata(a.tsv, b.qza)｣"]);
        Ok(())
    }
}
