//! Tag renaming over a base unit

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

use super::{IntoUnit, Job, JobUnit, Structure, UnitRef};
use crate::binding::{Bindings, PathMap};
use crate::context::WorkerContext;
use crate::error::{ErrorCode, HearthError, Result};
use crate::recipe::Recipe;
use crate::tag::{Contract, TagKind};

/// Presents a base unit under different tag names; behavior is the base's
#[derive(Debug, Clone)]
pub struct Rename {
    name: String,
    base: UnitRef,
    input_map: BTreeMap<String, String>,
    output_map: BTreeMap<String, String>,
    contract: Contract,
}

impl Rename {
    /// Maps are keyed by the base unit's tag names; unmapped tags keep their name
    pub fn new(
        base: UnitRef,
        input_map: BTreeMap<String, String>,
        output_map: BTreeMap<String, String>,
    ) -> Result<Self> {
        let inputs = renamed_tags(base.name(), base.contract().inputs(), &input_map, "input")?;
        let outputs = renamed_tags(base.name(), base.contract().outputs(), &output_map, "output")?;
        let contract = Contract::from_parts(inputs, outputs)?;

        Ok(Self {
            name: base.name().to_string(),
            base,
            input_map,
            output_map,
            contract,
        })
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn base(&self) -> &UnitRef {
        &self.base
    }

    fn exposed_input(&self, base_tag: &str) -> String {
        self.input_map
            .get(base_tag)
            .cloned()
            .unwrap_or_else(|| base_tag.to_string())
    }

    fn exposed_output(&self, base_tag: &str) -> String {
        self.output_map
            .get(base_tag)
            .cloned()
            .unwrap_or_else(|| base_tag.to_string())
    }

    /// Translate bindings keyed by exposed names back to the base's names
    fn base_bindings(&self, bindings: &Bindings) -> Result<Bindings> {
        let mut inputs = PathMap::new();
        for tag in self.base.contract().inputs().keys() {
            let exposed = self.exposed_input(tag);
            let binding = bindings.inputs.get(&exposed).ok_or_else(|| {
                HearthError::execution(format!("No binding for input '{}' of {}", exposed, self.name))
            })?;
            inputs.insert(tag.clone(), binding.clone());
        }

        let mut outputs = PathMap::new();
        for tag in self.base.contract().outputs().keys() {
            let exposed = self.exposed_output(tag);
            let binding = bindings.outputs.get(&exposed).ok_or_else(|| {
                HearthError::execution(format!("No binding for output '{}' of {}", exposed, self.name))
            })?;
            outputs.insert(tag.clone(), binding.clone());
        }

        Ok(Bindings::new(inputs, outputs))
    }
}

/// Rename a unit's tags with its default name
pub fn rename<I, O, K, V>(base: UnitRef, input_map: I, output_map: O) -> Result<UnitRef>
where
    I: IntoIterator<Item = (K, V)>,
    O: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let collect = |entries: Vec<(K, V)>| -> BTreeMap<String, String> {
        entries
            .into_iter()
            .map(|(from, to)| (from.into(), to.into()))
            .collect()
    };
    let input_map = collect(input_map.into_iter().collect());
    let output_map = collect(output_map.into_iter().collect());
    Ok(Rename::new(base, input_map, output_map)?.into_unit())
}

fn renamed_tags(
    base: &str,
    tags: &BTreeMap<String, TagKind>,
    map: &BTreeMap<String, String>,
    direction: &str,
) -> Result<BTreeMap<String, TagKind>> {
    let unknown: Vec<&str> = map
        .keys()
        .filter(|tag| !tags.contains_key(*tag))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        return Err(HearthError::config_with_code(
            ErrorCode::CONFIG_UNKNOWN_RENAME,
            format!(
                "Cannot rename {} tags of {} it does not declare: {}",
                direction,
                base,
                unknown.join(", ")
            ),
        ));
    }

    let mut renamed = BTreeMap::new();
    for (tag, kind) in tags {
        let new_name = map.get(tag).unwrap_or(tag);
        if renamed.insert(new_name.clone(), *kind).is_some() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_TAG_CONFLICT,
                format!(
                    "Renaming {} tags of {} maps two tags onto '{}'",
                    direction, base, new_name
                ),
            ));
        }
    }
    Ok(renamed)
}

#[async_trait]
impl JobUnit for Rename {
    fn name(&self) -> &str {
        &self.name
    }

    fn contract(&self) -> &Contract {
        &self.contract
    }

    fn structure(&self) -> Structure {
        Structure::Rename {
            name: self.name.clone(),
            input_tags: self.contract.input_names(),
            output_tags: self.contract.output_names(),
            base_step: Box::new(self.base.structure()),
        }
    }

    fn recipe(&self) -> Recipe {
        Recipe::Rename {
            name: self.name.clone(),
            base: Box::new(self.base.recipe()),
            input_map: self.input_map.clone(),
            output_map: self.output_map.clone(),
        }
    }

    async fn run(&self, job: &Job, worker: &Arc<WorkerContext>) -> Result<()> {
        let child = job.child(Arc::clone(&self.base), self.base_bindings(job.bindings())?)?;
        debug!("{} delegating to {}", self.name, self.base.name());
        worker.run_batch(vec![child]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Transform;

    fn base() -> UnitRef {
        Transform::builder("Base")
            .input("in")
            .input("other")
            .output("out")
            .script(|_| Ok(()))
            .build()
            .unwrap()
    }

    #[test]
    fn test_rename_exposes_new_tags_and_keeps_name() {
        let unit = rename(base(), [("in", "source")], [("out", "target")]).unwrap();

        assert_eq!(unit.name(), "Base");
        assert_eq!(unit.contract().input_names(), vec!["other", "source"]);
        assert_eq!(unit.contract().output_names(), vec!["target"]);
    }

    #[test]
    fn test_rename_unknown_tag() {
        let err = rename(base(), [("missing", "x")], Vec::<(&str, &str)>::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_UNKNOWN_RENAME);
    }

    #[test]
    fn test_rename_rejects_collisions() {
        let err = rename(base(), [("in", "other")], Vec::<(&str, &str)>::new()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_TAG_CONFLICT);

        let err = rename(base(), [("in", "x")], [("out", "x")]).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_TAG_CONFLICT);
    }

    #[test]
    fn test_base_bindings_translate_names() {
        let unit = Rename::new(
            base(),
            BTreeMap::from([("in".to_string(), "source".to_string())]),
            BTreeMap::new(),
        )
        .unwrap()
        .with_name("Renamed");
        let bindings = Bindings::new(
            crate::binding::path_map([("source", "a.txt"), ("other", "b.txt")]),
            crate::binding::path_map([("out", "c.txt")]),
        );

        let translated = unit.base_bindings(&bindings).unwrap();
        assert_eq!(translated.inputs["in"].paths(), vec!["a.txt"]);
        assert_eq!(translated.outputs["out"].paths(), vec!["c.txt"]);
        assert_eq!(unit.name(), "Renamed");
    }
}
