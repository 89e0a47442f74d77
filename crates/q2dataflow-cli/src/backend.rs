//! Action backend that hands native arguments to an external command.
//!
//! The command is run through `sh -c` with a JSON payload on stdin:
//! `{"plugin": ..., "action": ..., "arguments": {name: {kind, value}}}`. It
//! reports its results by writing a JSON list of
//! `{"name", "semantic_type", "path"}` records to the file named by the
//! `Q2DATAFLOW_RESULTS` environment variable. Whatever it prints is captured
//! into the run log.

// Internal imports (std, crate)
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

// External imports (alphabetized)
use q2dataflow_core::reformat::{MetadataReference, MetadataSourceKind};
use q2dataflow_core::runner::{
    ActionBackend, ActionResult, Artifact, ArtifactCollection, Metadata, NativeArguments, RunLog,
};
use q2dataflow_core::{Action, Error, Result};
use serde::Deserialize;
use serde_json::{json, Map};

/// Environment variable naming the file the command writes its results to
pub const RESULTS_ENV: &str = "Q2DATAFLOW_RESULTS";

#[derive(Debug, Deserialize)]
struct ResultRecord {
    name: String,
    semantic_type: String,
    path: PathBuf,
}

pub struct ProcessBackend {
    command: Option<String>,
}

impl ProcessBackend {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    fn payload(plugin_id: &str, action: &Action, arguments: &NativeArguments) -> Result<String> {
        let mut encoded = Map::new();
        for (name, value) in arguments {
            encoded.insert(name.clone(), serde_json::to_value(value)?);
        }
        let payload = json!({
            "plugin": plugin_id,
            "action": action.id,
            "arguments": encoded,
        });
        Ok(serde_json::to_string(&payload)?)
    }
}

impl ActionBackend for ProcessBackend {
    fn load_artifact(&self, path: &Path) -> Result<Artifact> {
        if !path.is_file() {
            return Err(Error::invalid_argument(
                path.display().to_string(),
                "artifact file does not exist",
            ));
        }
        Ok(Artifact {
            path: path.to_path_buf(),
            semantic_type: None,
        })
    }

    fn load_artifact_collection(&self, path: &Path) -> Result<ArtifactCollection> {
        let mut entries: Vec<PathBuf> = fs::read_dir(path)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| p.is_file())
            .collect();
        entries.sort();

        let members = entries
            .into_iter()
            .filter_map(|p| {
                let key = p.file_stem()?.to_string_lossy().to_string();
                Some((
                    key,
                    Artifact {
                        path: p,
                        semantic_type: None,
                    },
                ))
            })
            .collect();
        Ok(ArtifactCollection {
            path: path.to_path_buf(),
            members,
        })
    }

    fn load_metadata(&self, reference: &MetadataReference) -> Result<Metadata> {
        let source = PathBuf::from(&reference.source);
        let failure = |reason: String| Error::MetadataLoad {
            param: String::new(),
            source_path: reference.source.clone(),
            reason,
        };
        if !source.is_file() {
            return Err(failure("file does not exist".to_string()));
        }

        let (columns, column_types) = match reference.kind {
            MetadataSourceKind::Tabular => read_tabular_columns(&source)
                .map_err(|e| failure(e.to_string()))?
                .ok_or_else(|| failure("file is empty".to_string()))?,
            // Viewing an artifact as metadata needs the framework; columns stay unknown
            MetadataSourceKind::ArtifactPackaged => (Vec::new(), BTreeMap::new()),
        };
        Ok(Metadata {
            sources: vec![source],
            columns,
            column_types,
        })
    }

    fn invoke(
        &self,
        plugin_id: &str,
        action: &Action,
        arguments: &NativeArguments,
        log: &mut RunLog,
    ) -> Result<Vec<ActionResult>> {
        let command = self.command.as_deref().ok_or_else(|| {
            Error::config("No backend_command is configured to run actions with")
        })?;
        let payload = Self::payload(plugin_id, action, arguments)?;
        let results_file = tempfile::NamedTempFile::new()?;

        tracing::debug!("Invoking `{}` for {}.{}", command, plugin_id, action.id);
        let mut child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .env(RESULTS_ENV, results_file.path())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        // Feed stdin from a thread so a chatty command cannot fill its output pipes first
        let writer = child.stdin.take().map(|mut stdin| {
            thread::spawn(move || stdin.write_all(payload.as_bytes()))
        });
        let output = child.wait_with_output()?;
        if let Some(writer) = writer {
            if let Ok(Err(e)) = writer.join() {
                // A command that ignores its payload closes stdin early
                if e.kind() != std::io::ErrorKind::BrokenPipe {
                    return Err(e.into());
                }
            }
        }

        log.capture_stdout(&String::from_utf8_lossy(&output.stdout));
        log.capture_stderr(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(Error::ActionInvocation(format!(
                "`{}` exited with {}",
                command, output.status
            )));
        }

        let content = fs::read_to_string(results_file.path())?;
        if content.trim().is_empty() {
            return Ok(Vec::new());
        }
        let records: Vec<ResultRecord> = serde_json::from_str(&content)?;
        Ok(records
            .into_iter()
            .map(|r| ActionResult {
                name: r.name,
                semantic_type: r.semantic_type,
                path: r.path,
            })
            .collect())
    }

    fn save_result(&self, result: &ActionResult, location: &Path) -> Result<PathBuf> {
        if let Some(parent) = location.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        if result.path.is_dir() {
            copy_dir(&result.path, location)?;
            return Ok(location.to_path_buf());
        }

        // Results keep their own extension when the location has none
        let location = match (location.extension(), result.path.extension()) {
            (None, Some(ext)) => location.with_extension(ext),
            _ => location.to_path_buf(),
        };
        fs::copy(&result.path, &location)?;
        Ok(location)
    }
}

/// Data column names of a tab-separated metadata file, with the column types
/// a `#q2:types` directive declares or that the values imply.
///
/// The first non-blank row is the header and its first field the ID column.
/// Fields may be quoted. `None` for a file without a header.
fn read_tabular_columns(
    path: &Path,
) -> csv::Result<Option<(Vec<String>, BTreeMap<String, String>)>> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut rows = reader
        .records()
        .filter(|row| !matches!(row, Ok(r) if r.iter().all(|f| f.trim().is_empty())));

    let Some(header) = rows.next().transpose()? else {
        return Ok(None);
    };
    let columns: Vec<String> = header.iter().skip(1).map(|c| c.trim().to_string()).collect();

    let mut declared: Vec<Option<String>> = vec![None; columns.len()];
    // Per column: whether any value was seen, and whether all of them were numbers
    let mut observed = vec![(false, true); columns.len()];
    for row in rows {
        let row = row?;
        let id = row.get(0).unwrap_or_default().trim();
        if id.eq_ignore_ascii_case("#q2:types") {
            for (slot, ty) in declared.iter_mut().zip(row.iter().skip(1)) {
                let ty = ty.trim().to_lowercase();
                *slot = (!ty.is_empty()).then_some(ty);
            }
            continue;
        }
        if id.starts_with('#') {
            continue;
        }
        for (state, value) in observed.iter_mut().zip(row.iter().skip(1)) {
            let value = value.trim();
            if !value.is_empty() {
                state.0 = true;
                state.1 &= value.parse::<f64>().is_ok();
            }
        }
    }

    let column_types = columns
        .iter()
        .zip(declared.into_iter().zip(observed))
        .filter_map(|(column, (declared, (seen, numeric)))| {
            let ty = match declared {
                Some(ty) => ty,
                None if seen && numeric => "numeric".to_string(),
                None if seen => "categorical".to_string(),
                // No values to judge by
                None => return None,
            };
            Some((column.clone(), ty))
        })
        .collect();
    Ok(Some((columns, column_types)))
}

fn copy_dir(from: &Path, to: &Path) -> Result<()> {
    fs::create_dir_all(to)?;
    for entry in fs::read_dir(from)? {
        let entry = entry?;
        let target = to.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_dir(&entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), target)?;
        }
    }
    Ok(())
}
