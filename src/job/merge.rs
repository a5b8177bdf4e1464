//! Parallel composition of independent units

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

use super::{IntoUnit, Job, JobUnit, Structure, UnitRef};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::recipe::Recipe;
use crate::tag::{Contract, TagKind};

/// Members run as one batch; no member may produce what another produces or reads
#[derive(Debug, Clone)]
pub struct Merge {
    name: String,
    steps: Vec<UnitRef>,
    contract: Contract,
}

impl Merge {
    pub fn new(steps: Vec<UnitRef>) -> Result<Self> {
        if steps.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_EMPTY_COMPOSITION,
                "Cannot merge an empty list of units",
            ));
        }

        let mut inputs: BTreeMap<String, TagKind> = BTreeMap::new();
        let mut outputs: BTreeMap<String, (TagKind, &str)> = BTreeMap::new();

        for step in &steps {
            for (tag, kind) in step.contract().outputs() {
                if let Some((_, producer)) = outputs.get(tag) {
                    return Err(HearthError::config_with_code(
                        ErrorCode::CONFIG_DUPLICATE_PRODUCER,
                        format!(
                            "Output '{}' is produced by both {} and {}",
                            tag,
                            producer,
                            step.name()
                        ),
                    ));
                }
                outputs.insert(tag.clone(), (*kind, step.name()));
            }

            for (tag, kind) in step.contract().inputs() {
                match inputs.get(tag) {
                    Some(existing) if existing != kind => {
                        return Err(HearthError::config_with_code(
                            ErrorCode::CONFIG_TAG_KIND,
                            format!(
                                "Input '{}' is read as {} by one member and as {} by {}",
                                tag,
                                existing,
                                kind,
                                step.name()
                            ),
                        ));
                    }
                    _ => {
                        inputs.insert(tag.clone(), *kind);
                    }
                }
            }
        }

        let crossing: Vec<&str> = inputs
            .keys()
            .filter(|tag| outputs.contains_key(*tag))
            .map(String::as_str)
            .collect();
        if !crossing.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_TAG_CONFLICT,
                format!(
                    "Merged members depend on each other through: {}; use a sequence instead",
                    crossing.join(", ")
                ),
            ));
        }

        let outputs = outputs
            .into_iter()
            .map(|(tag, (kind, _))| (tag, kind))
            .collect();
        let contract = Contract::from_parts(inputs, outputs)?;
        let name = format!(
            "Merge({})",
            steps.iter().map(|s| s.name()).collect::<Vec<_>>().join(",")
        );

        Ok(Self {
            name,
            steps,
            contract,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn steps(&self) -> &[UnitRef] {
        &self.steps
    }
}

/// Merge units under the default `Merge(..)` name
pub fn merge(steps: Vec<UnitRef>) -> Result<UnitRef> {
    Ok(Merge::new(steps)?.into_unit())
}

#[async_trait]
impl JobUnit for Merge {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &Contract {
        &self.contract
    }

    fn structure(&self) -> Structure {
        Structure::Merge {
            name: self.name.clone(),
            input_tags: self.contract.input_names(),
            output_tags: self.contract.output_names(),
            steps: self.steps.iter().map(|s| s.structure()).collect(),
        }
    }

    fn recipe(&self) -> Recipe {
        Recipe::Merge {
            name: self.name.clone(),
            steps: self.steps.iter().map(|s| s.recipe()).collect(),
        }
    }

    async fn run(&self, job: &Job, worker: &Arc<WorkerContext>) -> Result<()> {
        let children = self
            .steps
            .iter()
            .map(|step| job.child(Arc::clone(step), job.bindings().restrict_to(step.contract())))
            .collect::<Result<Vec<_>>>()?;

        info!("{}: running {} members", self.name, children.len());
        worker.run_batch(children).await
    }
}
