//! Settings for template generation and action execution.
//!
//! `Settings` is an immutable record handed down the call chain: the template
//! renderers read the execution environment from it, and the runner reads the
//! column indexing convention and primitive parsing switch. It can be built
//! programmatically or loaded from a YAML, JSON or TOML file.
//!
//! # Examples
//!
//! ```
//! use q2dataflow_core::config::{Environment, Settings};
//!
//! let settings = Settings::docker("quay.io/example/plugin:2024.5");
//! assert!(matches!(settings.environment().unwrap(), Environment::Docker(_)));
//!
//! let local = Settings::local();
//! assert_eq!(local.local.unwrap().variables["MPLBACKEND"], "Agg");
//! ```

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

// External imports (alphabetized)
use serde::{Deserialize, Serialize};

/// Where a Docker image is pulled from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Availability {
    /// Published on a registry; generated tools pull it
    #[default]
    Remote,
    /// Only present in the local image cache
    Local,
}

/// Container execution settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockerSettings {
    /// Image reference, e.g. `quay.io/org/image:tag`
    pub image_id: String,

    #[serde(default)]
    pub availability: Availability,

    /// Working directory results are written to inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_directory: Option<String>,
}

/// Settings for running inside an already provisioned local environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalEnvironment {
    /// Environment variables exported before the command runs
    #[serde(default = "default_variables")]
    pub variables: BTreeMap<String, String>,
}

impl Default for LocalEnvironment {
    fn default() -> Self {
        Self {
            variables: default_variables(),
        }
    }
}

/// How a numeric metadata column reference is turned into a column position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnIndexing {
    /// Numbers are 0-based positions among the data columns
    #[default]
    ByNameOrZeroBased,
    /// Numbers are 1-based display positions that count the ID column
    OneBasedWithIdColumn,
}

/// The validated execution environment of generated tools
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment<'a> {
    Docker(&'a DockerSettings),
    Local(&'a LocalEnvironment),
}

/// Settings for q2dataflow generation and execution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Run generated tools inside a container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docker: Option<DockerSettings>,

    /// Run generated tools in a local environment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local: Option<LocalEnvironment>,

    /// Executable generated tools call back into
    #[serde(default = "default_command")]
    pub command: String,

    /// External command the CLI hands native arguments to when running an action
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backend_command: Option<String>,

    #[serde(default)]
    pub column_indexing: ColumnIndexing,

    /// Parse primitive arguments against their declared types before invoking
    #[serde(default = "default_parse_primitives")]
    pub parse_primitives: bool,

    /// Framework release recorded in generated headers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub framework_version: Option<String>,
}

impl Settings {
    /// Settings for tools that run inside the given image
    pub fn docker(image_id: impl Into<String>) -> Self {
        Self {
            docker: Some(DockerSettings {
                image_id: image_id.into(),
                availability: Availability::Remote,
                output_directory: None,
            }),
            ..Self::empty()
        }
    }

    /// Settings for tools that run in a local environment
    pub fn local() -> Self {
        Self {
            local: Some(LocalEnvironment::default()),
            ..Self::empty()
        }
    }

    fn empty() -> Self {
        Self {
            docker: None,
            local: None,
            command: default_command(),
            backend_command: None,
            column_indexing: ColumnIndexing::default(),
            parse_primitives: default_parse_primitives(),
            framework_version: None,
        }
    }

    /// Returns the execution environment, which must be exactly one of docker or local
    pub fn environment(&self) -> crate::Result<Environment<'_>> {
        match (&self.docker, &self.local) {
            (Some(docker), None) => Ok(Environment::Docker(docker)),
            (None, Some(local)) => Ok(Environment::Local(local)),
            (Some(_), Some(_)) => Err(crate::Error::config(
                "docker and local settings are mutually exclusive",
            )),
            (None, None) => Err(crate::Error::config(
                "no execution environment configured; set either docker or local",
            )),
        }
    }

    /// Load settings from a file, picking the format from its extension
    pub fn from_file<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let settings: Self = match extension(path).as_deref() {
            Some("json") => serde_json::from_str(&content)?,
            Some("toml") => toml::from_str(&content)?,
            _ => serde_yaml::from_str(&content)?,
        };
        settings.environment()?;
        Ok(settings)
    }

    /// Save settings to a file in the format implied by its extension
    pub fn save<P: AsRef<Path>>(&self, path: P) -> crate::Result<()> {
        let path = path.as_ref();
        let content = match extension(path).as_deref() {
            Some("json") => serde_json::to_string_pretty(self)?,
            Some("toml") => toml::to_string(self)
                .map_err(|e| crate::Error::config(format!("Failed to encode settings: {e}")))?,
            _ => serde_yaml::to_string(self)?,
        };
        fs::write(path, content)?;
        Ok(())
    }
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
}

fn default_command() -> String {
    "q2dataflow".to_string()
}

fn default_parse_primitives() -> bool {
    true
}

fn default_variables() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("LC_ALL".to_string(), "C.UTF-8".to_string()),
        ("MPLBACKEND".to_string(), "Agg".to_string()),
    ])
}
