//! File references bound to a run's stores
//!
//! A [`FileRef`] is created per binding entry right before a transform runs and
//! dropped when it finishes. Scripts reach them through [`Files`], keyed by tag.

pub mod store;

use std::collections::BTreeMap;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use store::{
    DataLiteralStore, LocalStore, MemoryStore, ScratchStore, Store, StoreReader, StoreSet,
    StoreWriter, DATA_SCHEME, FILE_SCHEME, MEMORY_SCHEME, TEMP_SCHEME,
};

use crate::binding::{Bindings, PathBinding, PathMap};
use crate::error::{ErrorCode, HearthError, Result};
use crate::tag::Direction;

/// Which way a reference may be opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl From<Direction> for Access {
    fn from(direction: Direction) -> Self {
        match direction {
            Direction::Input => Access::Read,
            Direction::Output => Access::Write,
        }
    }
}

#[derive(Debug)]
pub struct FileRef {
    path: String,
    key: String,
    access: Access,
    store: Arc<dyn Store>,
    touched: AtomicBool,
}

impl FileRef {
    pub fn new(path: impl Into<String>, access: Access, stores: &StoreSet) -> Self {
        let path = path.into();
        let (store, key) = stores.resolve(&path);
        Self {
            path,
            key,
            access,
            store,
            touched: AtomicBool::new(false),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn access(&self) -> Access {
        self.access
    }

    pub fn exists(&self) -> Result<bool> {
        self.store.exists(&self.key)
    }

    /// Open for reading; only valid on input references
    pub fn reader(&self) -> Result<StoreReader> {
        self.require(Access::Read)?;
        self.touch();
        self.store.reader(&self.key)
    }

    /// Open for writing; only valid on output references
    pub fn writer(&self) -> Result<StoreWriter> {
        self.require(Access::Write)?;
        self.touch();
        self.store.writer(&self.key)
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        self.reader()?.read_to_end(&mut bytes)?;
        Ok(bytes)
    }

    pub fn read_to_string(&self) -> Result<String> {
        let mut text = String::new();
        self.reader()?.read_to_string(&mut text)?;
        Ok(text)
    }

    pub fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let mut writer = self.writer()?;
        writer.write_all(bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn write_str(&self, text: &str) -> Result<()> {
        self.write_bytes(text.as_bytes())
    }

    /// Mark as used when the file is changed outside this abstraction
    pub fn touch(&self) {
        self.touched.store(true, Ordering::Relaxed);
    }

    pub fn is_touched(&self) -> bool {
        self.touched.load(Ordering::Relaxed)
    }

    fn require(&self, access: Access) -> Result<()> {
        if self.access == access {
            return Ok(());
        }
        Err(HearthError::storage_with_code(
            ErrorCode::STORAGE_ACCESS_DENIED,
            format!("Reference is bound for {:?} access", self.access),
            Some(self.path.clone()),
        ))
    }
}

#[derive(Debug)]
enum FileSlot {
    Single(FileRef),
    Set(Vec<FileRef>),
}

impl FileSlot {
    fn bind(binding: &PathBinding, access: Access, stores: &StoreSet) -> Self {
        match binding {
            PathBinding::Single(path) => FileSlot::Single(FileRef::new(path, access, stores)),
            PathBinding::Set(paths) => FileSlot::Set(
                paths
                    .iter()
                    .map(|path| FileRef::new(path, access, stores))
                    .collect(),
            ),
        }
    }

    fn refs(&self) -> &[FileRef] {
        match self {
            FileSlot::Single(file) => std::slice::from_ref(file),
            FileSlot::Set(files) => files,
        }
    }
}

/// File references for one transform execution, keyed by tag
#[derive(Debug)]
pub struct Files {
    job: String,
    inputs: BTreeMap<String, FileSlot>,
    outputs: BTreeMap<String, FileSlot>,
}

impl Files {
    pub fn bind(job: impl Into<String>, bindings: &Bindings, stores: &StoreSet) -> Self {
        fn slots(map: &PathMap, access: Access, stores: &StoreSet) -> BTreeMap<String, FileSlot> {
            map.iter()
                .map(|(tag, binding)| (tag.clone(), FileSlot::bind(binding, access, stores)))
                .collect()
        }

        Self {
            job: job.into(),
            inputs: slots(&bindings.inputs, Access::Read, stores),
            outputs: slots(&bindings.outputs, Access::Write, stores),
        }
    }

    pub fn input(&self, tag: &str) -> Result<&FileRef> {
        match self.inputs.get(tag) {
            Some(FileSlot::Single(file)) => Ok(file),
            Some(FileSlot::Set(_)) => Err(self.wrong_kind(tag, "input_set")),
            None => Err(self.unknown(tag, Direction::Input)),
        }
    }

    pub fn input_set(&self, tag: &str) -> Result<&[FileRef]> {
        match self.inputs.get(tag) {
            Some(FileSlot::Set(files)) => Ok(files),
            Some(FileSlot::Single(_)) => Err(self.wrong_kind(tag, "input")),
            None => Err(self.unknown(tag, Direction::Input)),
        }
    }

    pub fn output(&self, tag: &str) -> Result<&FileRef> {
        match self.outputs.get(tag) {
            Some(FileSlot::Single(file)) => Ok(file),
            Some(FileSlot::Set(_)) => Err(self.wrong_kind(tag, "output_set")),
            None => Err(self.unknown(tag, Direction::Output)),
        }
    }

    pub fn output_set(&self, tag: &str) -> Result<&[FileRef]> {
        match self.outputs.get(tag) {
            Some(FileSlot::Set(files)) => Ok(files),
            Some(FileSlot::Single(_)) => Err(self.wrong_kind(tag, "output")),
            None => Err(self.unknown(tag, Direction::Output)),
        }
    }

    /// Tags none of whose references were opened or touched
    pub fn untouched(&self) -> Vec<String> {
        self.inputs
            .iter()
            .chain(self.outputs.iter())
            .filter(|(_, slot)| slot.refs().iter().all(|file| !file.is_touched()))
            .map(|(tag, _)| tag.clone())
            .collect()
    }

    fn unknown(&self, tag: &str, direction: Direction) -> HearthError {
        HearthError::script_with_code(
            ErrorCode::SCRIPT_UNKNOWN_TAG,
            format!("No {} tag named '{}'", direction, tag),
            Some(self.job.clone()),
        )
    }

    fn wrong_kind(&self, tag: &str, accessor: &str) -> HearthError {
        HearthError::script_with_code(
            ErrorCode::SCRIPT_UNKNOWN_TAG,
            format!("Tag '{}' must be read with {}()", tag, accessor),
            Some(self.job.clone()),
        )
    }
}
