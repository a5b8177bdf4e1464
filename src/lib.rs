//! # Hearth
//!
//! A file-to-file build engine. Small transforms declare the tags they read
//! and write; combinators compose them into pipelines whose tag contracts are
//! checked when the pipeline is built, before anything runs.
//!
//! ## Usage
//!
//! ```bash
//! hearth run shout --source notes.txt --target NOTES.txt [--overwrite]
//! ```
//!
//! ## Modules
//!
//! - `tag` - Tag kinds, directions and unit contracts
//! - `binding` - Concrete paths bound to a job's tags
//! - `job` - Job units (transforms, rename, merge, sequence) and job instances
//! - `fileref` - File references and the stores behind path schemes
//! - `context` - Execution and worker contexts, run configuration
//! - `scheduler` - Serial, thread-pool and process-pool batch execution
//! - `recipe` - Serializable unit descriptions and the unit registry
//! - `worker` - Process-pool worker protocol
//! - `subprocess` - Child process execution behind a mockable runner
//! - `builtin` - Built-in transforms and pipelines
//! - `cli` - Command-line argument handling
//! - `error` - Error types and codes
pub mod binding;
pub mod builtin;
pub mod cli;
pub mod context;
pub mod error;
pub mod fileref;
pub mod job;
pub mod recipe;
pub mod scheduler;
pub mod subprocess;
pub mod tag;
pub mod worker;

pub use binding::{path_map, Bindings, PathBinding, PathMap};
pub use context::{ContextConfig, ExecutionContext, RunSummary, WorkerContext};
pub use error::{ErrorCode, ErrorKind, HearthError, Result};
pub use fileref::{FileRef, Files};
pub use job::{merge, rename, sequence, IntoUnit, Job, JobUnit, Structure, Transform, UnitRef};
pub use recipe::{JobRecipe, Recipe, Registry};
pub use tag::{Contract, Direction, TagKind};
