//! q2dataflow CLI entrypoint
//! Parses command-line arguments and dispatches to templating or to the action runner.

mod backend;

// Internal imports (std, crate)
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

// External imports (alphabetized)
use anyhow::Context;
use clap::Parser;
use q2dataflow_core::builtins::{self, BUILTIN_PLUGIN_ID};
use q2dataflow_core::store::suite_dir_name;
use q2dataflow_core::utils::normalize_id;
use q2dataflow_core::{
    profile_for, ActionRegistry, ActionRunner, Language, Plugin, PluginRegistry, RunOptions,
    Settings, StatusEvent, TemplateStore,
};
use serde_json::{Map, Value as JsonValue};
use tracing_subscriber::EnvFilter;

use crate::backend::ProcessBackend;

#[derive(Parser)]
#[command(name = "q2dataflow")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Plugin registry: one plugin description file, or a directory of them
    #[arg(long, global = true, env = "Q2DATAFLOW_REGISTRY")]
    registry: Option<PathBuf>,

    /// Settings file (YAML, JSON or TOML); tools run locally when omitted
    #[arg(long, global = true, env = "Q2DATAFLOW_SETTINGS")]
    settings: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Generate or run WDL tools
    Wdl {
        #[command(subcommand)]
        command: LanguageCommand,
    },
    /// Generate or run CWL tools
    Cwl {
        #[command(subcommand)]
        command: LanguageCommand,
    },
    /// Print the version of a registered plugin
    Version {
        /// Plugin id (`tools` for the built-in actions)
        plugin: String,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum LanguageCommand {
    /// Write tool templates
    Template {
        #[command(subcommand)]
        target: TemplateTarget,
    },
    /// Run an action from a generated tool's argument file
    Run {
        plugin: String,
        action: String,
        /// Argument file written by the workflow engine (JSON or YAML)
        inputs: PathBuf,
    },
}

#[derive(clap::Subcommand, Debug)]
pub enum TemplateTarget {
    /// Every action of one plugin
    Plugin {
        plugin: String,
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// The built-in import and export actions
    Builtins {
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// Every registered plugin, then the built-in actions
    All {
        #[arg(long, default_value = ".")]
        output: PathBuf,
    },
    /// A single action, optionally bound to example arguments
    Action {
        plugin: String,
        action: String,
        #[arg(long, default_value = ".")]
        output: PathBuf,
        /// Arguments (JSON or YAML) to declare and write as a test-data file
        #[arg(long)]
        arguments: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<ExitCode> {
    // Initialize logging; stdout is reserved for status events and action output
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let registry = load_registry(cli.registry.as_deref())?;
    let settings = load_settings(cli.settings.as_deref())?;

    match cli.command {
        Commands::Wdl { command } => run_language(Language::Wdl, command, &registry, settings),
        Commands::Cwl { command } => run_language(Language::Cwl, command, &registry, settings),
        Commands::Version { plugin } => {
            let plugin = find_plugin(&registry, &plugin)?;
            println!("{}", plugin.version);
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_registry(path: Option<&Path>) -> anyhow::Result<PluginRegistry> {
    match path {
        Some(path) => PluginRegistry::load(path)
            .with_context(|| format!("Failed to load plugin registry from {}", path.display())),
        None => Ok(PluginRegistry::default()),
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(path) => Settings::from_file(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Ok(Settings::local()),
    }
}

/// Resolve a plugin id, with `tools` naming the built-in actions
fn find_plugin(registry: &PluginRegistry, plugin_id: &str) -> anyhow::Result<Plugin> {
    if normalize_id(plugin_id) == BUILTIN_PLUGIN_ID {
        return Ok(builtins::plugin());
    }
    Ok(registry.plugin(plugin_id)?.clone())
}

fn read_arguments(path: &Path) -> anyhow::Result<Map<String, JsonValue>> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read arguments from {}", path.display()))?;
    // YAML is a superset of JSON, so one parser covers both formats
    let arguments: Map<String, JsonValue> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse arguments in {}", path.display()))?;
    Ok(arguments)
}

fn run_language(
    language: Language,
    command: LanguageCommand,
    registry: &PluginRegistry,
    settings: Settings,
) -> anyhow::Result<ExitCode> {
    match command {
        LanguageCommand::Template { target } => {
            let store = TemplateStore::new(language, settings);
            let events: Box<dyn Iterator<Item = StatusEvent> + '_> = match &target {
                TemplateTarget::Plugin { plugin, output } => {
                    let plugin = find_plugin(registry, plugin)?;
                    tracing::info!("Templating {} as {}", plugin.id, language);
                    Box::new(store.template_owned_plugin(plugin, output))
                }
                TemplateTarget::Builtins { output } => Box::new(store.template_builtins(output)),
                TemplateTarget::All { output } => {
                    tracing::info!(
                        "Templating {} plugin(s) as {}",
                        registry.plugins().len(),
                        language
                    );
                    Box::new(store.template_all(registry, output))
                }
                TemplateTarget::Action {
                    plugin,
                    action,
                    output,
                    arguments,
                } => {
                    let plugin = find_plugin(registry, plugin)?;
                    let action = plugin.action(action).with_context(|| {
                        format!("Plugin {} has no action {}", plugin.id, action)
                    })?;
                    let arguments = arguments.as_deref().map(read_arguments).transpose()?;
                    let suite_dir = output.join(suite_dir_name(&plugin.id));
                    let events = store
                        .template_action(&plugin, action, &suite_dir, arguments.as_ref())
                        .with_context(|| {
                            format!("Failed to template {}.{}", plugin.id, action.id)
                        })?;
                    Box::new(events.into_iter())
                }
            };
            report(events)
        }
        LanguageCommand::Run {
            plugin,
            action,
            inputs,
        } => {
            let raw = read_arguments(&inputs)?;
            let profile = profile_for(language);
            let backend = ProcessBackend::new(settings.backend_command.clone());
            let runner = ActionRunner::new(
                registry,
                &backend,
                profile.as_ref(),
                RunOptions::from(&settings),
            );

            tracing::info!("Running {}.{} from {}", plugin, action, inputs.display());
            let result = runner.run(
                &plugin,
                &action,
                raw,
                &mut io::stdout().lock(),
                &mut io::stderr().lock(),
            );
            match result {
                Ok(_) => Ok(ExitCode::SUCCESS),
                Err(e) => {
                    tracing::debug!("Run failed: {:?}", e);
                    Ok(ExitCode::FAILURE)
                }
            }
        }
    }
}

/// Print status events as JSON lines; errors go to stderr
fn report(events: impl Iterator<Item = StatusEvent>) -> anyhow::Result<ExitCode> {
    let mut failed = false;
    for event in events {
        let line = serde_json::to_string(&event)?;
        if event.is_error() {
            failed = true;
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
    }
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
