//! Writing templates to disk.
//!
//! The [`TemplateStore`] materializes rendered templates and argument files
//! and reports each file or directory it touches as a [`StatusEvent`]. Bulk
//! operations return lazy iterators: nothing is written until the caller
//! pulls the next event, and an action that fails to template produces an
//! error event without stopping the rest of the batch.

// Internal imports (std, crate)
use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::builtins;
use crate::config::Settings;
use crate::profiles::{profile_for, Language, LanguageProfile};
use crate::registry::ActionRegistry;
use crate::signature::{Action, Plugin};
use crate::template::make_action_template;
use crate::utils::{normalize_id, to_identifier};

// External imports (alphabetized)
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Outcome of materializing one path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Updated,
    Error,
}

/// What kind of path an event is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// One line of templating progress
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub status: Status,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    pub path: String,
}

impl StatusEvent {
    fn new(status: Status, kind: EntryKind, path: &Path) -> Self {
        Self {
            status,
            kind,
            path: path.display().to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == Status::Error
    }
}

/// Directory a plugin's templates are written to
pub fn suite_dir_name(plugin_id: &str) -> String {
    format!("suite_q2_{}", to_identifier(&normalize_id(plugin_id)).replace('_', "-"))
}

/// Materializes templates for one language
pub struct TemplateStore {
    profile: Box<dyn LanguageProfile>,
    settings: Settings,
}

impl TemplateStore {
    pub fn new(language: Language, settings: Settings) -> Self {
        Self {
            profile: profile_for(language),
            settings,
        }
    }

    pub fn profile(&self) -> &dyn LanguageProfile {
        self.profile.as_ref()
    }

    /// Create a directory if it is missing; an existing one reports nothing
    pub fn ensure_dir(&self, path: &Path) -> crate::Result<Option<StatusEvent>> {
        if path.is_dir() {
            return Ok(None);
        }
        fs::create_dir_all(path)?;
        log::debug!("Created directory {}", path.display());
        Ok(Some(StatusEvent::new(
            Status::Created,
            EntryKind::Directory,
            path,
        )))
    }

    /// Write a file, reporting whether it was created or overwritten
    pub fn write_file(&self, path: &Path, content: &str) -> crate::Result<StatusEvent> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let status = if path.exists() {
            Status::Updated
        } else {
            Status::Created
        };
        fs::write(path, content)?;
        log::debug!("Wrote {}", path.display());
        Ok(StatusEvent::new(status, EntryKind::File, path))
    }

    /// Comment header placed at the top of every generated document
    pub fn header(&self, plugin: &Plugin) -> String {
        let comment = self.profile.comment();
        let mut lines = Vec::new();
        if let Some(preamble) = self.profile.preamble() {
            lines.push(preamble.to_string());
            lines.push(String::new());
        }
        lines.push(format!("{comment} This file was automatically generated by:"));
        lines.push(format!(
            "{comment}     q2dataflow (version: {})",
            env!("CARGO_PKG_VERSION")
        ));
        lines.push(format!("{comment} for:"));
        lines.push(format!(
            "{comment}     {} (version: {})",
            plugin.id, plugin.version
        ));
        if let Some(version) = &self.settings.framework_version {
            lines.push(format!("{comment} framework version: {version}"));
        }
        lines.push(String::new());
        lines.join("\n") + "\n"
    }

    /// Template one action into `suite_dir`.
    ///
    /// Writes the tool document and makes sure the suite's `test-data`
    /// directory exists. With `arguments`, the encoded argument file is
    /// written into `test-data` as well.
    pub fn template_action(
        &self,
        plugin: &Plugin,
        action: &Action,
        suite_dir: &Path,
        arguments: Option<&Map<String, JsonValue>>,
    ) -> crate::Result<Vec<StatusEvent>> {
        let template = make_action_template(
            self.profile(),
            &plugin.id,
            action,
            &self.settings,
            arguments,
        )?;
        let rendered = template.render(self.profile())?;

        let mut events = Vec::new();
        let document_path = suite_dir.join(format!(
            "{}.{}",
            template.template_id(),
            self.profile.language().extension()
        ));
        let document = self.header(plugin) + &rendered.document;
        events.push(self.write_file(&document_path, &document)?);

        let test_data = suite_dir.join("test-data");
        events.extend(self.ensure_dir(&test_data)?);

        if arguments.is_some() {
            let arguments_path = test_data.join(format!(
                "{}.{}",
                template.template_id(),
                self.profile.arguments_suffix()
            ));
            let content = self.profile.dump_arguments(&rendered.arguments)?;
            events.push(self.write_file(&arguments_path, &content)?);
        }
        Ok(events)
    }

    /// Template one action, turning a failure into an error event
    pub fn template_action_events(
        &self,
        plugin: &Plugin,
        action: &Action,
        suite_dir: &Path,
        arguments: Option<&Map<String, JsonValue>>,
    ) -> Vec<StatusEvent> {
        match self.template_action(plugin, action, suite_dir, arguments) {
            Ok(events) => events,
            Err(e) => {
                log::warn!("Failed to template {}.{}: {}", plugin.id, action.id, e);
                vec![StatusEvent {
                    status: Status::Error,
                    kind: EntryKind::File,
                    path: format!("{}.{}", plugin.id, action.id),
                }]
            }
        }
    }

    /// Lazily template every action of a plugin into its suite directory
    pub fn template_plugin<'a>(
        &'a self,
        plugin: &'a Plugin,
        output_dir: &Path,
    ) -> impl Iterator<Item = StatusEvent> + 'a {
        self.suite_events(Cow::Borrowed(plugin), output_dir.to_path_buf())
    }

    /// Like [`TemplateStore::template_plugin`], for a plugin the iterator takes over
    pub fn template_owned_plugin<'a>(
        &'a self,
        plugin: Plugin,
        output_dir: &Path,
    ) -> impl Iterator<Item = StatusEvent> + 'a {
        self.suite_events(Cow::Owned(plugin), output_dir.to_path_buf())
    }

    /// Lazily template the built-in `tools` actions
    pub fn template_builtins<'a>(
        &'a self,
        output_dir: &Path,
    ) -> impl Iterator<Item = StatusEvent> + 'a {
        self.template_owned_plugin(builtins::plugin(), output_dir)
    }

    fn suite_events<'a>(
        &'a self,
        plugin: Cow<'a, Plugin>,
        output_dir: PathBuf,
    ) -> impl Iterator<Item = StatusEvent> + 'a {
        let suite_dir = output_dir.join(suite_dir_name(&plugin.id));
        log::info!(
            "Templating {} action(s) of {} into {}",
            plugin.actions.len(),
            plugin.id,
            suite_dir.display()
        );

        // The suite directory is created when the first action is pulled
        let mut suite_ready = false;
        (0..plugin.actions.len()).flat_map(move |index| {
            let mut events = Vec::new();
            if !suite_ready {
                suite_ready = true;
                match self.ensure_dir(&suite_dir) {
                    Ok(event) => events.extend(event),
                    Err(e) => {
                        log::warn!("Failed to create {}: {}", suite_dir.display(), e);
                        events.push(StatusEvent::new(
                            Status::Error,
                            EntryKind::Directory,
                            &suite_dir,
                        ));
                    }
                }
            }
            events.extend(self.template_action_events(
                &plugin,
                &plugin.actions[index],
                &suite_dir,
                None,
            ));
            events
        })
    }

    /// Lazily template every registered plugin, then the built-in actions
    pub fn template_all<'a>(
        &'a self,
        registry: &'a dyn ActionRegistry,
        output_dir: &'a Path,
    ) -> impl Iterator<Item = StatusEvent> + 'a {
        registry
            .plugins()
            .iter()
            .flat_map(move |plugin| self.template_plugin(plugin, output_dir))
            .chain(self.template_builtins(output_dir))
    }
}
