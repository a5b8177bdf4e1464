//! Job units and job instances
//!
//! A job unit ([`JobUnit`]) is a contract plus behavior: a leaf [`Transform`]
//! or a combinator built from other units ([`Rename`], [`Merge`],
//! [`Sequence`]). A [`Job`] binds a unit to concrete paths and runs through the
//! same validate-then-run lifecycle whatever the unit kind.

pub mod merge;
pub mod rename;
pub mod sequence;
pub mod transform;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, trace};

pub use merge::{merge, Merge};
pub use rename::{rename, Rename};
pub use sequence::{sequence, ScopeDiagram, Sequence};
pub use transform::{Script, Transform, TransformBuilder};

use crate::binding::{Bindings, PathMap};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::fileref::{Access, FileRef};
use crate::recipe::{JobRecipe, Recipe};
use crate::tag::Contract;

/// Shared handle to a job unit
pub type UnitRef = Arc<dyn JobUnit>;

/// A unit of work with a declared tag contract
#[async_trait]
pub trait JobUnit: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;

    fn contract(&self) -> &Contract;

    /// Description of this unit and its members, for tooling
    fn structure(&self) -> Structure;

    /// Plain-data description used to rebuild this unit in another process
    fn recipe(&self) -> Recipe;

    /// Run the unit's behavior; `job` has already passed path validation
    async fn run(&self, job: &Job, worker: &Arc<WorkerContext>) -> Result<()>;
}

/// Wrap a concrete unit into a [`UnitRef`]
pub trait IntoUnit {
    fn into_unit(self) -> UnitRef;
}

impl<T: JobUnit + 'static> IntoUnit for T {
    fn into_unit(self) -> UnitRef {
        Arc::new(self)
    }
}

/// Structural description of a unit, serialized as a tagged record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Structure {
    Leaf {
        name: String,
        input_tags: Vec<String>,
        output_tags: Vec<String>,
    },
    Rename {
        name: String,
        input_tags: Vec<String>,
        output_tags: Vec<String>,
        base_step: Box<Structure>,
    },
    Merge {
        name: String,
        input_tags: Vec<String>,
        output_tags: Vec<String>,
        steps: Vec<Structure>,
    },
    Sequence {
        name: String,
        input_tags: Vec<String>,
        output_tags: Vec<String>,
        steps: Vec<Structure>,
    },
}

/// A job unit bound to concrete paths
#[derive(Debug, Clone)]
pub struct Job {
    unit: UnitRef,
    bindings: Bindings,
    overwrite: bool,
}

impl Job {
    /// Bind a unit to paths; key sets and kinds must match its contract
    pub fn new(unit: UnitRef, inputs: PathMap, outputs: PathMap) -> Result<Self> {
        Self::from_bindings(unit, Bindings::new(inputs, outputs))
    }

    pub fn from_bindings(unit: UnitRef, bindings: Bindings) -> Result<Self> {
        bindings.validate(unit.contract())?;
        Ok(Self {
            unit,
            bindings,
            overwrite: false,
        })
    }

    /// Allow outputs that already exist to be replaced
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    pub fn unit(&self) -> &UnitRef {
        &self.unit
    }

    pub fn name(&self) -> &str {
        self.unit.name()
    }

    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }

    pub fn overwrite(&self) -> bool {
        self.overwrite
    }

    pub fn recipe(&self) -> JobRecipe {
        JobRecipe {
            unit: self.unit.recipe(),
            bindings: self.bindings.clone(),
            overwrite: self.overwrite,
        }
    }

    /// Build a substep instance that inherits this job's overwrite policy
    pub(crate) fn child(&self, unit: UnitRef, bindings: Bindings) -> Result<Job> {
        Ok(Job::from_bindings(unit, bindings)?.with_overwrite(self.overwrite))
    }

    /// Validate paths, then run the unit
    pub async fn execute(&self, worker: &Arc<WorkerContext>) -> Result<()> {
        debug!("Executing {} in run {}", self.name(), worker.run_id());
        trace!("Bindings for {}: {:?}", self.name(), self.bindings);
        self.validate_paths(worker)?;
        self.unit.run(self, worker).await
    }

    /// Checks done once, right before the unit runs, so a failure has no side effects
    fn validate_paths(&self, worker: &WorkerContext) -> Result<()> {
        let inputs = self.bindings.input_paths();
        let outputs = self.bindings.output_paths();

        let stores = worker.stores();
        let input_ids: HashSet<_> = inputs.iter().map(|p| stores.identity(p)).collect();
        let shared: Vec<&str> = outputs
            .iter()
            .filter(|p| input_ids.contains(&stores.identity(p)))
            .map(String::as_str)
            .collect();
        if !shared.is_empty() {
            return Err(HearthError::execution_with_code(
                ErrorCode::EXEC_CIRCULAR_FILE_SET,
                format!(
                    "File included as both input and output: {}",
                    shared.join(", ")
                ),
                shared.first().map(|p| p.to_string()),
            ));
        }

        for path in &inputs {
            let file = FileRef::new(path.as_str(), Access::Read, worker.stores());
            if !file.exists()? {
                return Err(HearthError::execution_with_code(
                    ErrorCode::EXEC_MISSING_INPUT,
                    format!("Referenced input path {} does not exist", path),
                    Some(path.clone()),
                ));
            }
        }

        if !self.overwrite {
            for path in &outputs {
                let file = FileRef::new(path.as_str(), Access::Write, worker.stores());
                if file.exists()? {
                    return Err(HearthError::execution_with_code(
                        ErrorCode::EXEC_OUTPUT_EXISTS,
                        format!(
                            "Referenced output path {} already exists, and overwrite is not enabled",
                            path
                        ),
                        Some(path.clone()),
                    ));
                }
            }
        }

        Ok(())
    }
}
