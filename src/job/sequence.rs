//! Serial composition with lexical scoping of intermediates

use async_trait::async_trait;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use super::{IntoUnit, Job, JobUnit, Structure, UnitRef};
use crate::binding::{Bindings, PathBinding, PathMap};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::recipe::Recipe;
use crate::tag::{Contract, TagKind};

/// Where a tag first enters a sequence's scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Supplied from outside the sequence
    External,
    /// Produced by the step at this index
    Step(usize),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeEntry {
    pub origin: Origin,
    pub kind: TagKind,
    /// Number of later steps that read the tag
    pub references: usize,
}

/// Every tag seen by a sequence, with origin and reference count
#[derive(Debug, Clone, Default)]
pub struct ScopeDiagram {
    entries: BTreeMap<String, ScopeEntry>,
}

impl ScopeDiagram {
    pub fn build(steps: &[UnitRef]) -> Result<Self> {
        let mut entries: BTreeMap<String, ScopeEntry> = BTreeMap::new();

        for (index, step) in steps.iter().enumerate() {
            for (tag, kind) in step.contract().inputs() {
                match entries.get_mut(tag) {
                    Some(entry) => {
                        if entry.kind != *kind {
                            return Err(HearthError::config_with_code(
                                ErrorCode::CONFIG_TAG_KIND,
                                format!(
                                    "{} reads '{}' as {} but it is {} in scope",
                                    step.name(),
                                    tag,
                                    kind,
                                    entry.kind
                                ),
                            ));
                        }
                        if let Origin::Step(_) = entry.origin {
                            entry.references += 1;
                        }
                    }
                    None => {
                        entries.insert(
                            tag.clone(),
                            ScopeEntry {
                                origin: Origin::External,
                                kind: *kind,
                                references: 0,
                            },
                        );
                    }
                }
            }

            for (tag, kind) in step.contract().outputs() {
                if let Some(entry) = entries.get(tag) {
                    return Err(match entry.origin {
                        Origin::External => HearthError::config_with_code(
                            ErrorCode::CONFIG_CONSUMED_BEFORE_PRODUCED,
                            format!(
                                "'{}' is produced by {} after an earlier step already read it",
                                tag,
                                step.name()
                            ),
                        ),
                        Origin::Step(producer) => HearthError::config_with_code(
                            ErrorCode::CONFIG_DUPLICATE_PRODUCER,
                            format!(
                                "'{}' is produced by both {} and {}",
                                tag,
                                steps[producer].name(),
                                step.name()
                            ),
                        ),
                    });
                }
                entries.insert(
                    tag.clone(),
                    ScopeEntry {
                        origin: Origin::Step(index),
                        kind: *kind,
                        references: 0,
                    },
                );
            }
        }

        Ok(Self { entries })
    }

    pub fn get(&self, tag: &str) -> Option<&ScopeEntry> {
        self.entries.get(tag)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&String, &ScopeEntry)> {
        self.entries.iter()
    }
}

/// Steps run in order; later steps may read what earlier steps produced
#[derive(Debug, Clone)]
pub struct Sequence {
    name: String,
    steps: Vec<UnitRef>,
    exposed: BTreeSet<String>,
    internal: BTreeSet<String>,
    contract: Contract,
}

impl Sequence {
    /// `exposed` names intermediates that should also be sequence outputs
    pub fn new<I, S>(steps: Vec<UnitRef>, exposed: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if steps.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_EMPTY_COMPOSITION,
                "Cannot sequence an empty list of units",
            ));
        }

        let exposed: BTreeSet<String> = exposed.into_iter().map(Into::into).collect();
        let diagram = ScopeDiagram::build(&steps)?;

        let invalid: Vec<&str> = exposed
            .iter()
            .filter(|tag| {
                !matches!(diagram.get(tag), Some(ScopeEntry { origin: Origin::Step(_), .. }))
            })
            .map(String::as_str)
            .collect();
        if !invalid.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_INVALID_EXPOSED,
                format!(
                    "Exposed intermediates are not produced by any step: {}",
                    invalid.join(", ")
                ),
            ));
        }

        let mut inputs = BTreeMap::new();
        let mut outputs = BTreeMap::new();
        let mut internal = BTreeSet::new();

        for (tag, entry) in diagram.entries() {
            match entry.origin {
                Origin::External => {
                    inputs.insert(tag.clone(), entry.kind);
                }
                Origin::Step(_) if entry.references == 0 || exposed.contains(tag) => {
                    outputs.insert(tag.clone(), entry.kind);
                }
                Origin::Step(_) => {
                    if entry.kind == TagKind::Set {
                        return Err(HearthError::config_with_code(
                            ErrorCode::CONFIG_TAG_KIND,
                            format!(
                                "Set-kind intermediate '{}' cannot be placed automatically; expose it",
                                tag
                            ),
                        ));
                    }
                    internal.insert(tag.clone());
                }
            }
        }

        let contract = Contract::from_parts(inputs, outputs)?;
        let name = format!(
            "Seq({})",
            steps.iter().map(|s| s.name()).collect::<Vec<_>>().join(",")
        );

        Ok(Self {
            name,
            steps,
            exposed,
            internal,
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

    /// Tags produced and consumed inside the sequence and not exposed
    pub fn internal_tags(&self) -> &BTreeSet<String> {
        &self.internal
    }

    pub fn exposed(&self) -> &BTreeSet<String> {
        &self.exposed
    }
}

/// Sequence units under the default `Seq(..)` name, exposing nothing
pub fn sequence(steps: Vec<UnitRef>) -> Result<UnitRef> {
    Ok(Sequence::new(steps, std::iter::empty::<String>())?.into_unit())
}

#[async_trait]
impl JobUnit for Sequence {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &Contract {
        &self.contract
    }

    fn structure(&self) -> Structure {
        Structure::Sequence {
            name: self.name.clone(),
            input_tags: self.contract.input_names(),
            output_tags: self.contract.output_names(),
            steps: self.steps.iter().map(|s| s.structure()).collect(),
        }
    }

    fn recipe(&self) -> Recipe {
        Recipe::Sequence {
            name: self.name.clone(),
            steps: self.steps.iter().map(|s| s.recipe()).collect(),
            exposed: self.exposed.clone(),
        }
    }

    async fn run(&self, job: &Job, worker: &Arc<WorkerContext>) -> Result<()> {
        let mut scope: PathMap = job.bindings().inputs.clone();

        for (index, step) in self.steps.iter().enumerate() {
            let mut inputs = PathMap::new();
            for tag in step.contract().inputs().keys() {
                let binding = scope.get(tag).cloned().ok_or_else(|| {
                    HearthError::execution(format!(
                        "'{}' is not in scope for step {} of {}",
                        tag, index, self.name
                    ))
                })?;
                inputs.insert(tag.clone(), binding);
            }

            let mut outputs = PathMap::new();
            for tag in step.contract().outputs().keys() {
                let binding = match job.bindings().outputs.get(tag) {
                    Some(binding) => binding.clone(),
                    None => PathBinding::Single(worker.scratch_path()),
                };
                outputs.insert(tag.clone(), binding);
            }

            debug!(
                "{}: step {}/{} {}",
                self.name,
                index + 1,
                self.steps.len(),
                step.name()
            );
            let child = job.child(Arc::clone(step), Bindings::new(inputs, outputs.clone()))?;
            worker.run_batch(vec![child]).await?;
            scope.extend(outputs);
        }

        Ok(())
    }
}
