//! Leaf job units backed by a script

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{Job, JobUnit, Structure, UnitRef};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::fileref::Files;
use crate::recipe::Recipe;
use crate::tag::{Contract, ContractBuilder};

/// Body of a transform; receives the bound file references by tag
pub type Script = Arc<dyn Fn(&Files) -> anyhow::Result<()> + Send + Sync>;

/// A leaf unit: a named contract plus a script
#[derive(Clone)]
pub struct Transform {
    name: String,
    contract: Contract,
    script: Script,
}

impl fmt::Debug for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transform")
            .field("name", &self.name)
            .field("contract", &self.contract)
            .finish_non_exhaustive()
    }
}

impl Transform {
    pub fn builder(name: impl Into<String>) -> TransformBuilder {
        TransformBuilder {
            name: name.into(),
            contract: Contract::builder(),
            script: None,
        }
    }

    pub fn new(name: impl Into<String>, contract: Contract, script: Script) -> Self {
        Self {
            name: name.into(),
            contract,
            script,
        }
    }
}

pub struct TransformBuilder {
    name: String,
    contract: ContractBuilder,
    script: Option<Script>,
}

impl TransformBuilder {
    pub fn input(mut self, tag: impl Into<String>) -> Self {
        self.contract = self.contract.input(tag);
        self
    }

    pub fn input_set(mut self, tag: impl Into<String>) -> Self {
        self.contract = self.contract.input_set(tag);
        self
    }

    pub fn output(mut self, tag: impl Into<String>) -> Self {
        self.contract = self.contract.output(tag);
        self
    }

    pub fn output_set(mut self, tag: impl Into<String>) -> Self {
        self.contract = self.contract.output_set(tag);
        self
    }

    pub fn script<F>(mut self, script: F) -> Self
    where
        F: Fn(&Files) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.script = Some(Arc::new(script));
        self
    }

    pub fn build(self) -> Result<UnitRef> {
        Ok(Arc::new(self.build_transform()?))
    }

    pub fn build_transform(self) -> Result<Transform> {
        let contract = self.contract.build()?;
        let script = self.script.ok_or_else(|| {
            HearthError::config(format!("Transform '{}' has no script", self.name))
        })?;
        Ok(Transform::new(self.name, contract, script))
    }
}

#[async_trait]
impl JobUnit for Transform {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &Contract {
        &self.contract
    }

    fn structure(&self) -> Structure {
        Structure::Leaf {
            name: self.name.clone(),
            input_tags: self.contract.input_names(),
            output_tags: self.contract.output_names(),
        }
    }

    fn recipe(&self) -> Recipe {
        Recipe::Leaf {
            name: self.name.clone(),
        }
    }

    async fn run(&self, job: &Job, worker: &Arc<WorkerContext>) -> Result<()> {
        let files = Files::bind(self.name.clone(), job.bindings(), worker.stores());
        let script = Arc::clone(&self.script);
        let name = self.name.clone();

        debug!("Running script for {}", name);
        let (result, files) = tokio::task::spawn_blocking(move || {
            let result = script(&files);
            (result, files)
        })
        .await
        .map_err(|e| {
            HearthError::script_with_code(
                ErrorCode::SCRIPT_PANICKED,
                format!("Script for {} did not complete: {}", name, e),
                Some(name.clone()),
            )
        })?;

        result.map_err(|e| script_error(e, &name))?;

        for tag in files.untouched() {
            warn!("Tag '{}' of {} was never opened or touched", tag, name);
        }
        Ok(())
    }
}

/// Keep library errors raised inside a script as they are; wrap anything else
fn script_error(error: anyhow::Error, job: &str) -> HearthError {
    match error.downcast::<HearthError>() {
        Ok(error) => error,
        Err(error) => HearthError::script_with_code(
            ErrorCode::SCRIPT_FAILED,
            format!("{:#}", error),
            Some(job.to_string()),
        )
        .with_source(error),
    }
}
