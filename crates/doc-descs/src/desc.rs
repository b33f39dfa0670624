//! The description document: `globals` plus scheduled or unscheduled
//! experiments.

use std::fs;
use std::path::{Path, PathBuf};

use doc_core::{stable_hash_string, to_yaml_string, DocError, ErrorInfo};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::factory::{expand, GenerateOpts};
use crate::naming::NameTemplates;
use crate::plan::Plan;
use crate::run::{Experiment, Run};
use crate::testbed::Globals;

/// File name descriptions are written to inside the script directory.
pub const DESCS_FILE_NAME: &str = "descs.yaml";

/// How experiments appear in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Keyed by the id of a running testbed experiment.
    Scheduled(u64),
    /// Listed under `unscheduled` with derived ids.
    Unscheduled,
}

/// A generated experiment description.
#[derive(Debug, Clone, PartialEq)]
pub struct Description {
    /// Shared configuration.
    pub globals: Globals,
    /// Experiments in emission order.
    pub experiments: Vec<Experiment>,
    /// Top-level layout.
    pub schedule: Schedule,
}

#[derive(Serialize, Deserialize)]
struct Entry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp_id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<u64>,
    runs: Vec<Run>,
}

/// Expands `plan` and assembles its description.
pub fn generate(plan: &Plan, opts: &GenerateOpts) -> Result<Description, DocError> {
    let expansion = expand(plan, opts)?;
    let names = NameTemplates::for_axes(&plan.axes);
    let mut globals = plan.testbed.globals(
        &plan.name,
        &plan.tmux_session,
        plan.primary_link_layer(),
        plan.axes.query_count,
        &names,
    )?;
    if let Some(first) = expansion.first_run() {
        globals.env.extend(&first.env);
    }
    globals.duration = expansion.duration_minutes(&plan.timing);

    let mut experiments = expansion.experiments;
    let schedule = match opts.exp_id {
        Some(exp_id) => {
            let runs = experiments.drain(..).flat_map(|exp| exp.runs).collect();
            experiments.push(Experiment {
                exp_id,
                name: plan.name.clone(),
                duration: None,
                runs,
            });
            Schedule::Scheduled(exp_id)
        }
        None => Schedule::Unscheduled,
    };
    let desc = Description {
        globals,
        experiments,
        schedule,
    };
    info!(
        plan = %plan.name,
        experiments = desc.experiments.len(),
        runs = desc.runs().count(),
        "description generated"
    );
    Ok(desc)
}

fn yaml_error(code: &str, err: impl ToString) -> DocError {
    DocError::Serde(ErrorInfo::new(code, err.to_string()))
}

fn to_value<T: Serialize>(value: &T) -> Result<Value, DocError> {
    serde_yaml::to_value(value).map_err(|err| yaml_error("yaml-serialize", err))
}

impl Description {
    /// Every run of every experiment.
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.experiments.iter().flat_map(|exp| exp.runs.iter())
    }

    /// The document as a YAML value, `globals` first.
    pub fn to_value(&self) -> Result<Value, DocError> {
        let mut doc = Mapping::new();
        doc.insert(Value::from("globals"), to_value(&self.globals)?);
        match self.schedule {
            Schedule::Scheduled(exp_id) => {
                let runs = self.runs().cloned().collect();
                let entry = Entry {
                    exp_id: None,
                    duration: None,
                    runs,
                };
                doc.insert(Value::from(exp_id), to_value(&entry)?);
            }
            Schedule::Unscheduled => {
                let entries = self
                    .experiments
                    .iter()
                    .map(|exp| {
                        to_value(&Entry {
                            exp_id: Some(exp.exp_id),
                            duration: exp.duration,
                            runs: exp.runs.clone(),
                        })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                doc.insert(Value::from("unscheduled"), Value::Sequence(entries));
            }
        }
        Ok(Value::Mapping(doc))
    }

    /// Renders the document, quoting switch values like `y` for YAML 1.1 readers.
    pub fn to_yaml_string(&self) -> Result<String, DocError> {
        to_yaml_string(&self.to_value()?)
    }

    /// Parses a document in either layout.
    pub fn from_yaml_str(text: &str) -> Result<Self, DocError> {
        let doc: Mapping =
            serde_yaml::from_str(text).map_err(|err| yaml_error("yaml-deserialize", err))?;
        let globals: Globals = doc
            .get("globals")
            .cloned()
            .ok_or_else(|| {
                DocError::Serde(ErrorInfo::new("missing-globals", "description has no globals"))
            })
            .and_then(|value| {
                serde_yaml::from_value(value).map_err(|err| yaml_error("yaml-deserialize", err))
            })?;
        let entry = |value: &Value| -> Result<Entry, DocError> {
            serde_yaml::from_value(value.clone()).map_err(|err| yaml_error("yaml-deserialize", err))
        };

        if let Some(unscheduled) = doc.get("unscheduled") {
            let list = unscheduled.as_sequence().ok_or_else(|| {
                DocError::Serde(ErrorInfo::new("invalid-unscheduled", "unscheduled is not a list"))
            })?;
            let mut experiments = Vec::with_capacity(list.len());
            for value in list {
                let parsed = entry(value)?;
                let exp_id = parsed.exp_id.ok_or_else(|| {
                    DocError::Serde(ErrorInfo::new(
                        "missing-exp-id",
                        "unscheduled experiment without exp_id",
                    ))
                })?;
                experiments.push(Experiment {
                    exp_id,
                    name: globals.name.clone(),
                    duration: parsed.duration,
                    runs: parsed.runs,
                });
            }
            return Ok(Self {
                globals,
                experiments,
                schedule: Schedule::Unscheduled,
            });
        }

        let (exp_id, value) = doc
            .iter()
            .find_map(|(key, value)| key.as_u64().map(|exp_id| (exp_id, value)))
            .ok_or_else(|| {
                DocError::Serde(ErrorInfo::new(
                    "missing-experiments",
                    "description has neither unscheduled nor scheduled experiments",
                ))
            })?;
        let parsed = entry(value)?;
        Ok(Self {
            experiments: vec![Experiment {
                exp_id,
                name: globals.name.clone(),
                duration: parsed.duration,
                runs: parsed.runs,
            }],
            globals,
            schedule: Schedule::Scheduled(exp_id),
        })
    }

    /// SHA-256 of the document.
    pub fn fingerprint(&self) -> Result<String, DocError> {
        stable_hash_string(&self.to_value()?)
    }

    /// Writes the document to `path`.
    pub fn write_to(&self, path: &Path) -> Result<(), DocError> {
        let yaml = self.to_yaml_string()?;
        fs::write(path, yaml).map_err(|err| DocError::io("descs-write", path.display(), err))?;
        info!(path = %path.display(), "description written");
        Ok(())
    }

    /// Writes the document to `<dir>/descs.yaml`.
    pub fn write_to_dir(&self, dir: &Path) -> Result<PathBuf, DocError> {
        let path = dir.join(DESCS_FILE_NAME);
        self.write_to(&path)?;
        Ok(path)
    }
}
