//! Plugin registry access.
//!
//! The converter never talks to a live framework installation. It asks an
//! [`ActionRegistry`] for plugins and actions instead. [`PluginRegistry`] is the
//! file-backed implementation: one plugin description per JSON or YAML file.

// Internal imports (std, crate)
use std::fs;
use std::path::Path;

use crate::signature::{Action, Plugin};
use crate::utils::normalize_id;

/// Source of plugin and action descriptions
pub trait ActionRegistry {
    /// All registered plugins, in registration order
    fn plugins(&self) -> &[Plugin];

    /// Look up a plugin, treating `-` and `_` as equivalent
    fn plugin(&self, plugin_id: &str) -> crate::Result<&Plugin> {
        let wanted = normalize_id(plugin_id);
        self.plugins()
            .iter()
            .find(|p| normalize_id(&p.id) == wanted)
            .ok_or_else(|| crate::Error::registry(format!("Unknown plugin '{plugin_id}'")))
    }

    /// Look up an action of a plugin
    fn action(&self, plugin_id: &str, action_id: &str) -> crate::Result<(&Plugin, &Action)> {
        let plugin = self.plugin(plugin_id)?;
        let action = plugin.action(action_id).ok_or_else(|| {
            crate::Error::registry(format!(
                "Plugin '{}' has no action '{action_id}'",
                plugin.id
            ))
        })?;
        Ok((plugin, action))
    }
}

/// Registry backed by plugin description files
#[derive(Debug, Clone, Default)]
pub struct PluginRegistry {
    plugins: Vec<Plugin>,
}

impl PluginRegistry {
    pub fn new(plugins: Vec<Plugin>) -> Self {
        Self { plugins }
    }

    /// Load from a single file, or from every description file in a directory
    pub fn load<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        if path.is_dir() {
            Self::from_dir(path)
        } else {
            Ok(Self::new(vec![Self::read_plugin(path)?]))
        }
    }

    /// Load every `*.json`, `*.yaml` and `*.yml` file in a directory, sorted by name
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> crate::Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            let is_description = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| matches!(e, "json" | "yaml" | "yml"));
            if path.is_file() && is_description {
                paths.push(path);
            }
        }
        paths.sort();

        let plugins = paths
            .iter()
            .map(|p| Self::read_plugin(p))
            .collect::<crate::Result<Vec<_>>>()?;
        log::debug!("Loaded {} plugin(s) from {}", plugins.len(), dir.as_ref().display());
        Ok(Self::new(plugins))
    }

    fn read_plugin(path: &Path) -> crate::Result<Plugin> {
        let content = fs::read_to_string(path)?;
        Self::parse_content(&content).map_err(|e| {
            crate::Error::registry(format!(
                "Failed to parse plugin description {}: {e}",
                path.display()
            ))
        })
    }

    /// Parse a plugin description, trying JSON first and then YAML
    pub fn parse_content(content: &str) -> crate::Result<Plugin> {
        if let Ok(plugin) = serde_json::from_str(content) {
            return Ok(plugin);
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

impl ActionRegistry for PluginRegistry {
    fn plugins(&self) -> &[Plugin] {
        &self.plugins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const PLUGIN_YAML: &str = r#"
id: feature-table
version: 2024.5.0
actions:
  - id: rarefy
    name: Rarefy table
    signature:
      inputs:
        - name: table
          type: {name: FeatureTable, kind: semantic}
      parameters:
        - name: sampling_depth
          type: {name: Int}
      outputs:
        - name: rarefied_table
          type: {name: FeatureTable, kind: semantic}
"#;

    #[test]
    fn test_parse_yaml_and_lookup() -> crate::Result<()> {
        let registry = PluginRegistry::new(vec![PluginRegistry::parse_content(PLUGIN_YAML)?]);
        let (plugin, action) = registry.action("feature_table", "rarefy")?;
        assert_eq!(plugin.version, "2024.5.0");
        assert_eq!(action.signature.parameters[0].name, "sampling_depth");
        assert!(matches!(
            registry.plugin("missing"),
            Err(crate::Error::Registry(_))
        ));
        assert!(registry.action("feature-table", "nope").is_err());
        Ok(())
    }

    #[test]
    fn test_load_directory() -> crate::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("a.yaml"), PLUGIN_YAML)?;
        fs::write(
            dir.path().join("b.json"),
            r#"{"id": "empty", "actions": []}"#,
        )?;
        fs::write(dir.path().join("notes.txt"), "ignored")?;

        let registry = PluginRegistry::load(dir.path())?;
        let ids: Vec<_> = registry.plugins().iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["feature-table", "empty"]);
        assert_eq!(registry.plugins()[1].version, "0.0.0");
        Ok(())
    }
}
