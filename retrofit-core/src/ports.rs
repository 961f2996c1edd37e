//! Port traits abstracting all I/O away from the pipeline.

use camino::{Utf8Path, Utf8PathBuf};
use retrofit_types::syntax::Module;
use retrofit_types::{LineMap, ModuleId};

/// Why a tree could not be loaded. The module is reported as failed and the
/// run continues with the others.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeLoadError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("invalid syntax tree: {message}")]
    Json { message: String },
}

/// One input module as handed over by the parser side.
#[derive(Debug, Clone)]
pub struct LoadedModule {
    pub id: ModuleId,
    /// Output location relative to the output directory, e.g. `pkg/mod.py`.
    pub output_path: Utf8PathBuf,
    pub lines: LineMap,
    /// Serialized tree, hashed for the cache key.
    pub bytes: Vec<u8>,
    pub tree: Result<Module, TreeLoadError>,
}

/// Source of parsed modules.
pub trait ModuleSource {
    fn load_modules(&self) -> anyhow::Result<Vec<LoadedModule>>;
}

/// File-system write operations.
pub trait WritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()>;
    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()>;
}

/// Store of rendered outputs keyed by a content hash.
pub trait OutputCache {
    fn get(&self, key: &str) -> Option<String>;
    fn put(&self, key: &str, output: &str) -> anyhow::Result<()>;
}
