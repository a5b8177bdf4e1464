//! Storage backends a file reference can open against
//!
//! The backend is picked from the path scheme:
//! - plain paths and `file://` go to local disk
//! - `temp://` goes to the run's scratch area
//! - `mem://` goes to the in-process memory store
//! - `data://<base64>` is a read-only inline literal

use base64::Engine as _;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::error::{ErrorCode, HearthError, Result};

pub const FILE_SCHEME: &str = "file://";
pub const TEMP_SCHEME: &str = "temp://";
pub const MEMORY_SCHEME: &str = "mem://";
pub const DATA_SCHEME: &str = "data://";

pub type StoreReader = Box<dyn Read + Send>;
pub type StoreWriter = Box<dyn Write + Send>;

/// Byte-stream access to one backing store
pub trait Store: Send + Sync + fmt::Debug {
    fn name(&self) -> &'static str;

    fn exists(&self, key: &str) -> Result<bool>;

    fn reader(&self, key: &str) -> Result<StoreReader>;

    fn writer(&self, key: &str) -> Result<StoreWriter>;

    /// Whether other processes can see what this store holds
    fn is_durable(&self) -> bool;

    /// The key in the form used to decide whether two paths name the same entry
    fn normalize_key(&self, key: &str) -> String {
        key.to_string()
    }
}

fn io_error(err: std::io::Error, path: impl Into<String>) -> HearthError {
    let path = path.into();
    let message = format!("{} failed for {}", err.kind(), path);
    let code = match err.kind() {
        std::io::ErrorKind::NotFound => ErrorCode::STORAGE_NOT_FOUND,
        std::io::ErrorKind::PermissionDenied => ErrorCode::STORAGE_PERMISSION_DENIED,
        _ => ErrorCode::STORAGE_IO_ERROR,
    };
    HearthError::storage_with_code(code, message, Some(path)).with_source(err)
}

#[derive(Debug, Default)]
pub struct LocalStore;

impl Store for LocalStore {
    fn name(&self) -> &'static str {
        "local"
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(Path::new(key).exists())
    }

    fn reader(&self, key: &str) -> Result<StoreReader> {
        let file = fs::File::open(key).map_err(|e| io_error(e, key))?;
        Ok(Box::new(file))
    }

    fn writer(&self, key: &str) -> Result<StoreWriter> {
        let file = fs::File::create(key).map_err(|e| io_error(e, key))?;
        Ok(Box::new(file))
    }

    fn is_durable(&self) -> bool {
        true
    }

    /// Absolute and lexically cleaned, so `./a`, `a` and `file:///cwd/a` agree
    fn normalize_key(&self, key: &str) -> String {
        let path = Path::new(key);
        let absolute = if path.is_absolute() {
            path.to_path_buf()
        } else {
            std::env::current_dir()
                .map(|cwd| cwd.join(path))
                .unwrap_or_else(|_| path.to_path_buf())
        };

        let mut normal = PathBuf::new();
        for component in absolute.components() {
            match component {
                Component::CurDir => {}
                Component::ParentDir => {
                    normal.pop();
                }
                other => normal.push(other.as_os_str()),
            }
        }
        normal.display().to_string()
    }
}

/// Files under one run's scratch directory
#[derive(Debug)]
pub struct ScratchStore {
    root: PathBuf,
}

impl ScratchStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn locate(&self, key: &str) -> Result<PathBuf> {
        let relative = Path::new(key);
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes || key.is_empty() {
            return Err(HearthError::storage_with_code(
                ErrorCode::STORAGE_ACCESS_DENIED,
                "Scratch paths must be plain relative names",
                Some(format!("{}{}", TEMP_SCHEME, key)),
            ));
        }
        Ok(self.root.join(relative))
    }
}

impl Store for ScratchStore {
    fn name(&self) -> &'static str {
        "scratch"
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.locate(key)?.exists())
    }

    fn reader(&self, key: &str) -> Result<StoreReader> {
        let path = self.locate(key)?;
        let file = fs::File::open(&path).map_err(|e| io_error(e, path.display().to_string()))?;
        Ok(Box::new(file))
    }

    fn writer(&self, key: &str) -> Result<StoreWriter> {
        let path = self.locate(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| io_error(e, parent.display().to_string()))?;
        }
        let file = fs::File::create(&path).map_err(|e| io_error(e, path.display().to_string()))?;
        Ok(Box::new(file))
    }

    fn is_durable(&self) -> bool {
        true
    }
}

type MemoryEntries = Arc<Mutex<HashMap<String, Vec<u8>>>>;

/// In-process store; contents vanish with the worker context
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: MemoryEntries,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Store for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn exists(&self, key: &str) -> Result<bool> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.contains_key(key))
    }

    fn reader(&self, key: &str) -> Result<StoreReader> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let bytes = entries.get(key).cloned().ok_or_else(|| {
            HearthError::storage_with_code(
                ErrorCode::STORAGE_NOT_FOUND,
                "No such entry in memory store",
                Some(format!("{}{}", MEMORY_SCHEME, key)),
            )
        })?;
        Ok(Box::new(Cursor::new(bytes)))
    }

    fn writer(&self, key: &str) -> Result<StoreWriter> {
        Ok(Box::new(MemoryWriter {
            key: key.to_string(),
            buffer: Vec::new(),
            entries: Arc::clone(&self.entries),
        }))
    }

    fn is_durable(&self) -> bool {
        false
    }
}

/// Buffers writes and publishes them on flush and on drop
struct MemoryWriter {
    key: String,
    buffer: Vec<u8>,
    entries: MemoryEntries,
}

impl MemoryWriter {
    fn publish(&self) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(self.key.clone(), self.buffer.clone());
    }
}

impl Write for MemoryWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.publish();
        Ok(())
    }
}

impl Drop for MemoryWriter {
    fn drop(&mut self) {
        self.publish();
    }
}

/// Inline `data://` literals, decoded with the standard base64 alphabet
#[derive(Debug, Default)]
pub struct DataLiteralStore;

impl DataLiteralStore {
    fn decode(key: &str) -> Result<Vec<u8>> {
        base64::engine::general_purpose::STANDARD
            .decode(key)
            .map_err(|e| {
                HearthError::storage_with_code(
                    ErrorCode::STORAGE_INVALID_DATA_LITERAL,
                    "Data literal is not valid base64",
                    Some(format!("{}{}", DATA_SCHEME, key)),
                )
                .with_source(e)
            })
    }
}

impl Store for DataLiteralStore {
    fn name(&self) -> &'static str {
        "data"
    }

    fn exists(&self, key: &str) -> Result<bool> {
        Self::decode(key).map(|_| true)
    }

    fn reader(&self, key: &str) -> Result<StoreReader> {
        Ok(Box::new(Cursor::new(Self::decode(key)?)))
    }

    fn writer(&self, key: &str) -> Result<StoreWriter> {
        Err(HearthError::storage_with_code(
            ErrorCode::STORAGE_READ_ONLY,
            "Data literals cannot be written",
            Some(format!("{}{}", DATA_SCHEME, key)),
        ))
    }

    fn is_durable(&self) -> bool {
        true
    }
}

/// The stores visible to one worker context
#[derive(Debug, Clone)]
pub struct StoreSet {
    local: Arc<LocalStore>,
    scratch: Arc<ScratchStore>,
    memory: Arc<MemoryStore>,
    data: Arc<DataLiteralStore>,
}

impl StoreSet {
    pub fn new(scratch_root: impl Into<PathBuf>) -> Self {
        Self {
            local: Arc::new(LocalStore),
            scratch: Arc::new(ScratchStore::new(scratch_root)),
            memory: Arc::new(MemoryStore::new()),
            data: Arc::new(DataLiteralStore),
        }
    }

    pub fn scratch(&self) -> &ScratchStore {
        &self.scratch
    }

    pub fn memory(&self) -> &MemoryStore {
        &self.memory
    }

    /// Store name and normalized key; equal identities address the same entry
    pub fn identity(&self, path: &str) -> (&'static str, String) {
        let (store, key) = self.resolve(path);
        (store.name(), store.normalize_key(&key))
    }

    /// Pick the store for a path and strip its scheme
    pub fn resolve(&self, path: &str) -> (Arc<dyn Store>, String) {
        if let Some(key) = path.strip_prefix(TEMP_SCHEME) {
            (self.scratch.clone() as Arc<dyn Store>, key.to_string())
        } else if let Some(key) = path.strip_prefix(MEMORY_SCHEME) {
            (self.memory.clone() as Arc<dyn Store>, key.to_string())
        } else if let Some(key) = path.strip_prefix(DATA_SCHEME) {
            (self.data.clone() as Arc<dyn Store>, key.to_string())
        } else if let Some(key) = path.strip_prefix(FILE_SCHEME) {
            (self.local.clone() as Arc<dyn Store>, key.to_string())
        } else {
            (self.local.clone() as Arc<dyn Store>, path.to_string())
        }
    }
}
