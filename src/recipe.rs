//! Serializable descriptions of units and job instances
//!
//! A [`Recipe`] names leaves and records combinator structure, so a worker
//! process holding the same [`Registry`] can rebuild an equivalent unit.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

use crate::binding::Bindings;
use crate::error::{ErrorCode, HearthError, Result};
use crate::job::{IntoUnit, Job, Merge, Rename, Sequence, UnitRef};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recipe {
    Leaf {
        name: String,
    },
    Rename {
        name: String,
        base: Box<Recipe>,
        input_map: BTreeMap<String, String>,
        output_map: BTreeMap<String, String>,
    },
    Merge {
        name: String,
        steps: Vec<Recipe>,
    },
    Sequence {
        name: String,
        steps: Vec<Recipe>,
        #[serde(default)]
        exposed: BTreeSet<String>,
    },
}

impl Recipe {
    pub fn name(&self) -> &str {
        match self {
            Recipe::Leaf { name }
            | Recipe::Rename { name, .. }
            | Recipe::Merge { name, .. }
            | Recipe::Sequence { name, .. } => name,
        }
    }
}

/// A job instance in transferable form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecipe {
    pub unit: Recipe,
    pub bindings: Bindings,
    #[serde(default)]
    pub overwrite: bool,
}

impl JobRecipe {
    pub fn rebuild(&self, registry: &Registry) -> Result<Job> {
        let unit = registry.build(&self.unit)?;
        Ok(Job::from_bindings(unit, self.bindings.clone())?.with_overwrite(self.overwrite))
    }
}

/// Known units by name: leaves that recipes refer to, plus named pipelines
#[derive(Debug, Clone, Default)]
pub struct Registry {
    leaves: BTreeMap<String, UnitRef>,
    pipelines: BTreeMap<String, UnitRef>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a unit under its name; leaves become buildable from recipes
    pub fn register(&mut self, unit: UnitRef) -> Result<()> {
        let name = unit.name().to_string();
        if self.leaves.contains_key(&name) || self.pipelines.contains_key(&name) {
            return Err(HearthError::config(format!(
                "A unit named '{}' is already registered",
                name
            )));
        }

        match unit.recipe() {
            Recipe::Leaf { .. } => self.leaves.insert(name, unit),
            _ => self.pipelines.insert(name, unit),
        };
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<UnitRef> {
        self.pipelines
            .get(name)
            .or_else(|| self.leaves.get(name))
            .cloned()
    }

    /// Look a unit up by name, failing with a config error
    pub fn require(&self, name: &str) -> Result<UnitRef> {
        self.get(name).ok_or_else(|| {
            HearthError::config_with_code(
                ErrorCode::CONFIG_UNKNOWN_UNIT,
                format!("No unit named '{}'; known units: {}", name, self.names().join(", ")),
            )
        })
    }

    /// All registered names, pipelines and leaves, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .leaves
            .keys()
            .chain(self.pipelines.keys())
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Rebuild a unit from its recipe
    pub fn build(&self, recipe: &Recipe) -> Result<UnitRef> {
        debug!("Building unit '{}' from recipe", recipe.name());
        match recipe {
            Recipe::Leaf { name } => self.leaves.get(name).cloned().ok_or_else(|| {
                HearthError::config_with_code(
                    ErrorCode::CONFIG_UNKNOWN_UNIT,
                    format!("No leaf unit named '{}' is registered", name),
                )
            }),
            Recipe::Rename {
                name,
                base,
                input_map,
                output_map,
            } => Ok(Rename::new(self.build(base)?, input_map.clone(), output_map.clone())?
                .with_name(name.clone())
                .into_unit()),
            Recipe::Merge { name, steps } => Ok(Merge::new(self.build_all(steps)?)?
                .with_name(name.clone())
                .into_unit()),
            Recipe::Sequence {
                name,
                steps,
                exposed,
            } => Ok(Sequence::new(self.build_all(steps)?, exposed.iter().cloned())?
                .with_name(name.clone())
                .into_unit()),
        }
    }

    fn build_all(&self, recipes: &[Recipe]) -> Result<Vec<UnitRef>> {
        recipes.iter().map(|recipe| self.build(recipe)).collect()
    }
}
