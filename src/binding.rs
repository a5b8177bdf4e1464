//! Concrete path bindings for one job instance

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{ErrorCode, HearthError, Result};
use crate::tag::{Contract, Direction, TagKind};

/// Path(s) bound to a single tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathBinding {
    Single(String),
    Set(Vec<String>),
}

impl PathBinding {
    pub fn kind(&self) -> TagKind {
        match self {
            PathBinding::Single(_) => TagKind::Single,
            PathBinding::Set(_) => TagKind::Set,
        }
    }

    pub fn paths(&self) -> Vec<&str> {
        match self {
            PathBinding::Single(path) => vec![path.as_str()],
            PathBinding::Set(paths) => paths.iter().map(String::as_str).collect(),
        }
    }
}

impl From<&str> for PathBinding {
    fn from(path: &str) -> Self {
        PathBinding::Single(path.to_string())
    }
}

impl From<String> for PathBinding {
    fn from(path: String) -> Self {
        PathBinding::Single(path)
    }
}

impl From<&String> for PathBinding {
    fn from(path: &String) -> Self {
        PathBinding::Single(path.clone())
    }
}

impl From<std::path::PathBuf> for PathBinding {
    fn from(path: std::path::PathBuf) -> Self {
        PathBinding::Single(path.to_string_lossy().into_owned())
    }
}

impl From<&std::path::Path> for PathBinding {
    fn from(path: &std::path::Path) -> Self {
        PathBinding::Single(path.to_string_lossy().into_owned())
    }
}

impl<S: Into<String>> From<Vec<S>> for PathBinding {
    fn from(paths: Vec<S>) -> Self {
        PathBinding::Set(paths.into_iter().map(Into::into).collect())
    }
}

pub type PathMap = BTreeMap<String, PathBinding>;

/// Build a [`PathMap`] from `(tag, binding)` pairs
pub fn path_map<I, K, V>(entries: I) -> PathMap
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<PathBinding>,
{
    entries
        .into_iter()
        .map(|(tag, binding)| (tag.into(), binding.into()))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bindings {
    pub inputs: PathMap,
    pub outputs: PathMap,
}

impl Bindings {
    pub fn new(inputs: PathMap, outputs: PathMap) -> Self {
        Self { inputs, outputs }
    }

    /// Check key sets and binding shapes against a contract
    pub fn validate(&self, contract: &Contract) -> Result<()> {
        check_key_set(Direction::Input, &self.inputs, contract.inputs())?;
        check_key_set(Direction::Output, &self.outputs, contract.outputs())?;
        check_kinds(&self.inputs, contract.inputs())?;
        check_kinds(&self.outputs, contract.outputs())?;
        Ok(())
    }

    /// Every concrete input path, set members flattened
    pub fn input_paths(&self) -> BTreeSet<String> {
        flatten(&self.inputs)
    }

    /// Every concrete output path, set members flattened
    pub fn output_paths(&self) -> BTreeSet<String> {
        flatten(&self.outputs)
    }

    /// Every concrete path this instance touches
    pub fn all_paths(&self) -> BTreeSet<String> {
        let mut paths = self.input_paths();
        paths.extend(self.output_paths());
        paths
    }

    /// Keep only the entries a contract declares
    pub fn restrict_to(&self, contract: &Contract) -> Bindings {
        Bindings {
            inputs: self
                .inputs
                .iter()
                .filter(|(tag, _)| contract.has_input(tag))
                .map(|(tag, binding)| (tag.clone(), binding.clone()))
                .collect(),
            outputs: self
                .outputs
                .iter()
                .filter(|(tag, _)| contract.has_output(tag))
                .map(|(tag, binding)| (tag.clone(), binding.clone()))
                .collect(),
        }
    }
}

fn flatten(map: &PathMap) -> BTreeSet<String> {
    map.values()
        .flat_map(|binding| binding.paths())
        .map(str::to_string)
        .collect()
}

fn check_key_set(
    direction: Direction,
    actual: &PathMap,
    expected: &BTreeMap<String, TagKind>,
) -> Result<()> {
    let extra: Vec<String> = actual
        .keys()
        .filter(|tag| !expected.contains_key(*tag))
        .cloned()
        .collect();
    let missing: Vec<String> = expected
        .keys()
        .filter(|tag| !actual.contains_key(*tag))
        .cloned()
        .collect();

    if extra.is_empty() && missing.is_empty() {
        Ok(())
    } else {
        Err(HearthError::file_set(direction, extra, missing))
    }
}

fn check_kinds(actual: &PathMap, expected: &BTreeMap<String, TagKind>) -> Result<()> {
    for (tag, binding) in actual {
        let Some(kind) = expected.get(tag) else {
            continue;
        };
        if binding.kind() != *kind {
            return Err(HearthError::config_with_code(
                ErrorCode::CONFIG_TAG_KIND,
                format!(
                    "Tag '{}' is declared {} but was bound to a {} binding",
                    tag,
                    kind,
                    binding.kind()
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HearthError;

    fn contract() -> Contract {
        Contract::builder()
            .input("foo")
            .input("bar")
            .output("baz")
            .build()
            .unwrap()
    }

    #[test]
    fn test_exact_key_set_validates() {
        let bindings = Bindings::new(
            path_map([("foo", "foo/path"), ("bar", "bar/path")]),
            path_map([("baz", "baz/path")]),
        );
        assert!(bindings.validate(&contract()).is_ok());
    }

    #[test]
    fn test_extra_and_missing_reported_together() {
        let bindings = Bindings::new(
            path_map([("foo", "foo/path"), ("faux", "bar/path")]),
            path_map([("baz", "baz/path")]),
        );

        match bindings.validate(&contract()).unwrap_err() {
            HearthError::FileSet {
                direction,
                extra,
                missing,
                ..
            } => {
                assert_eq!(direction, Direction::Input);
                assert_eq!(extra, vec!["faux"]);
                assert_eq!(missing, vec!["bar"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_outputs_fail() {
        let bindings = Bindings::new(
            path_map([("foo", "foo/path"), ("bar", "bar/path")]),
            PathMap::new(),
        );
        let err = bindings.validate(&contract()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_FILE_SET);
    }

    #[test]
    fn test_set_tag_requires_collection() {
        let contract = Contract::builder()
            .input_set("files")
            .output("joined")
            .build()
            .unwrap();
        let bindings = Bindings::new(
            path_map([("files", "one.txt")]),
            path_map([("joined", "out.txt")]),
        );

        let err = bindings.validate(&contract).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_TAG_KIND);
    }

    #[test]
    fn test_single_tag_rejects_collection() {
        let bindings = Bindings::new(
            path_map([
                ("foo", PathBinding::from(vec!["a", "b"])),
                ("bar", PathBinding::from("bar")),
            ]),
            path_map([("baz", "baz")]),
        );

        let err = bindings.validate(&contract()).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_TAG_KIND);
    }

    #[test]
    fn test_paths_flatten_sets() {
        let bindings = Bindings::new(
            path_map([("files", PathBinding::from(vec!["a", "b"]))]),
            path_map([("out", "c")]),
        );
        assert_eq!(bindings.input_paths().len(), 2);
        assert_eq!(bindings.all_paths().len(), 3);
    }
}
