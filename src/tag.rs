//! Tags and contracts
//!
//! A tag is a named file slot. A contract is the set of input and output tags a
//! job unit declares. Contracts are immutable once built and keep input and
//! output names disjoint.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{ErrorCode, HearthError, Result};

/// Whether a tag binds one path or a collection of paths
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagKind {
    Single,
    Set,
}

impl fmt::Display for TagKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagKind::Single => write!(f, "single"),
            TagKind::Set => write!(f, "set"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Input,
    Output,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Input => write!(f, "input"),
            Direction::Output => write!(f, "output"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub name: String,
    pub kind: TagKind,
    pub direction: Direction,
}

/// Declared input and output tags of a job unit
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Contract {
    inputs: BTreeMap<String, TagKind>,
    outputs: BTreeMap<String, TagKind>,
}

impl Contract {
    pub fn builder() -> ContractBuilder {
        ContractBuilder::default()
    }

    /// Build a contract from already-collected tag maps, enforcing disjointness
    pub fn from_parts(
        inputs: BTreeMap<String, TagKind>,
        outputs: BTreeMap<String, TagKind>,
    ) -> Result<Self> {
        let both: Vec<String> = inputs
            .keys()
            .filter(|name| outputs.contains_key(*name))
            .cloned()
            .collect();
        if !both.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_TAG_CONFLICT,
                format!(
                    "Tags declared as both input and output: {}",
                    both.join(", ")
                ),
            ));
        }
        Ok(Self { inputs, outputs })
    }

    pub fn inputs(&self) -> &BTreeMap<String, TagKind> {
        &self.inputs
    }

    pub fn outputs(&self) -> &BTreeMap<String, TagKind> {
        &self.outputs
    }

    /// Sorted input tag names
    pub fn input_names(&self) -> Vec<String> {
        self.inputs.keys().cloned().collect()
    }

    /// Sorted output tag names
    pub fn output_names(&self) -> Vec<String> {
        self.outputs.keys().cloned().collect()
    }

    pub fn input_kind(&self, name: &str) -> Option<TagKind> {
        self.inputs.get(name).copied()
    }

    pub fn output_kind(&self, name: &str) -> Option<TagKind> {
        self.outputs.get(name).copied()
    }

    pub fn has_input(&self, name: &str) -> bool {
        self.inputs.contains_key(name)
    }

    pub fn has_output(&self, name: &str) -> bool {
        self.outputs.contains_key(name)
    }

    /// Every declared tag, inputs first
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        let inputs = self.inputs.iter().map(|(name, kind)| Tag {
            name: name.clone(),
            kind: *kind,
            direction: Direction::Input,
        });
        let outputs = self.outputs.iter().map(|(name, kind)| Tag {
            name: name.clone(),
            kind: *kind,
            direction: Direction::Output,
        });
        inputs.chain(outputs)
    }
}

#[derive(Debug, Default)]
pub struct ContractBuilder {
    inputs: BTreeMap<String, TagKind>,
    outputs: BTreeMap<String, TagKind>,
    duplicates: Vec<String>,
}

impl ContractBuilder {
    pub fn input(self, name: impl Into<String>) -> Self {
        self.tag(name, TagKind::Single, Direction::Input)
    }

    pub fn input_set(self, name: impl Into<String>) -> Self {
        self.tag(name, TagKind::Set, Direction::Input)
    }

    pub fn output(self, name: impl Into<String>) -> Self {
        self.tag(name, TagKind::Single, Direction::Output)
    }

    pub fn output_set(self, name: impl Into<String>) -> Self {
        self.tag(name, TagKind::Set, Direction::Output)
    }

    pub fn tag(mut self, name: impl Into<String>, kind: TagKind, direction: Direction) -> Self {
        let name = name.into();
        let map = match direction {
            Direction::Input => &mut self.inputs,
            Direction::Output => &mut self.outputs,
        };
        if map.insert(name.clone(), kind).is_some() {
            self.duplicates.push(name);
        }
        self
    }

    pub fn build(self) -> Result<Contract> {
        if !self.duplicates.is_empty() {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_DUPLICATE_TAG,
                format!("Tags declared more than once: {}", self.duplicates.join(", ")),
            ));
        }
        Contract::from_parts(self.inputs, self.outputs)
    }
}
