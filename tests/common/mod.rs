//! Common test utilities and helpers
#![allow(dead_code)]

use anyhow::Result;
use hearth::{ContextConfig, Transform, UnitRef};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Test workspace builder for setting up input files
pub struct TestWorkspaceBuilder {
    temp_dir: TempDir,
    initial_files: Vec<(PathBuf, String)>,
}

impl TestWorkspaceBuilder {
    pub fn new() -> Result<Self> {
        Ok(Self {
            temp_dir: TempDir::new()?,
            initial_files: Vec::new(),
        })
    }

    /// Add an initial file
    pub fn with_file(mut self, path: impl AsRef<Path>, content: &str) -> Self {
        self.initial_files
            .push((path.as_ref().to_path_buf(), content.to_string()));
        self
    }

    pub fn build(self) -> Result<TestWorkspace> {
        let path = self.temp_dir.path();
        fs::create_dir_all(path.join("scratch"))?;

        for (file_path, content) in self.initial_files {
            let full_path = path.join(file_path);
            if let Some(parent) = full_path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(full_path, content)?;
        }

        Ok(TestWorkspace {
            temp_dir: self.temp_dir,
        })
    }
}

/// Temporary directory holding a test's inputs, outputs and scratch root
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Absolute path of a file in the workspace, as a binding string
    pub fn file(&self, name: &str) -> String {
        self.temp_dir.path().join(name).to_string_lossy().into_owned()
    }

    pub fn create_file(&self, name: &str, content: &str) -> Result<String> {
        let full_path = self.temp_dir.path().join(name);
        if let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&full_path, content)?;
        Ok(full_path.to_string_lossy().into_owned())
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        Ok(fs::read_to_string(self.temp_dir.path().join(name))?)
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.temp_dir.path().join(name).exists()
    }

    pub fn scratch_root(&self) -> PathBuf {
        self.temp_dir.path().join("scratch")
    }

    /// Entries left under the scratch root
    pub fn scratch_entries(&self) -> usize {
        fs::read_dir(self.scratch_root())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Serial config whose scratch areas live inside this workspace
    pub fn config(&self) -> ContextConfig {
        ContextConfig::serial().with_scratch_root(self.scratch_root())
    }
}

/// Leaf that appends a suffix to its single input
pub fn suffix(name: &str, input: &str, output: &str, suffix: &str) -> UnitRef {
    let (input, output, suffix) = (input.to_string(), output.to_string(), suffix.to_string());
    Transform::builder(name)
        .input(input.clone())
        .output(output.clone())
        .script(move |files| {
            let text = files.input(&input)?.read_to_string()?;
            files
                .output(&output)?
                .write_str(&format!("{}{}", text, suffix))?;
            Ok(())
        })
        .build()
        .expect("valid leaf")
}

/// Tracks how many scripts are running at once
#[derive(Debug, Default)]
pub struct ConcurrencyGauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyGauge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Leaf that copies its input while recording overlap with other gauged leaves
pub fn gauged_copy(name: &str, input: &str, output: &str, gauge: Arc<ConcurrencyGauge>) -> UnitRef {
    let (input, output) = (input.to_string(), output.to_string());
    Transform::builder(name)
        .input(input.clone())
        .output(output.clone())
        .script(move |files| {
            gauge.enter();
            std::thread::sleep(Duration::from_millis(150));
            let text = files.input(&input)?.read_to_string();
            let written = text.and_then(|text| files.output(&output)?.write_str(&text));
            gauge.exit();
            written?;
            Ok(())
        })
        .build()
        .expect("valid leaf")
}
