//! Default filesystem-backed port implementations.

use crate::ports::{LoadedModule, ModuleSource, OutputCache, TreeLoadError, WritePort};
use anyhow::Context;
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use glob::glob;
use retrofit_types::syntax::Module;
use retrofit_types::{LineMap, ModuleId};
use serde::Deserialize;
use tracing::debug;

/// On-disk shape of a parsed module: the tree plus the parser's line offset.
#[derive(Debug, Deserialize)]
struct TreeFile {
    #[serde(default)]
    line_offset: u32,
    #[serde(flatten)]
    module: Module,
}

/// Loads JSON syntax trees from files and directories.
///
/// A directory is scanned for `**/*.json`; module names follow the relative
/// path, so `pkg/sub/__init__.json` is `pkg.sub` and writes `pkg/sub/__init__.py`.
#[derive(Debug, Clone)]
pub struct FsModuleSource {
    pub inputs: Vec<Utf8PathBuf>,
}

impl FsModuleSource {
    pub fn new(inputs: Vec<Utf8PathBuf>) -> Self {
        Self { inputs }
    }
}

impl ModuleSource for FsModuleSource {
    fn load_modules(&self) -> anyhow::Result<Vec<LoadedModule>> {
        let mut out = Vec::new();
        for input in &self.inputs {
            if input.is_dir() {
                let pattern = input.join("**/*.json");
                debug!(pattern = %pattern, "scanning for syntax trees");
                for entry in glob(pattern.as_str()).with_context(|| format!("glob {pattern}"))? {
                    let path = entry.map_err(|e| anyhow::anyhow!("glob error: {e}"))?;
                    let path = Utf8PathBuf::try_from(path).context("non UTF-8 path")?;
                    let rel = path
                        .strip_prefix(input)
                        .with_context(|| format!("{path} outside {input}"))?
                        .to_path_buf();
                    out.push(load_tree(&path, &rel));
                }
            } else {
                let rel = Utf8PathBuf::from(
                    input
                        .file_name()
                        .with_context(|| format!("input {input} has no file name"))?,
                );
                out.push(load_tree(input, &rel));
            }
        }
        out.sort_by(|a, b| a.output_path.cmp(&b.output_path));
        Ok(out)
    }
}

fn load_tree(path: &Utf8Path, rel: &Utf8Path) -> LoadedModule {
    let output_path = output_path(rel);
    let id = ModuleId::with_path(module_name(rel), output_path.clone());

    let (bytes, parsed) = match fs::read(path) {
        Ok(bytes) => {
            let parsed = serde_json::from_slice::<TreeFile>(&bytes).map_err(|e| {
                TreeLoadError::Json {
                    message: e.to_string(),
                }
            });
            (bytes, parsed)
        }
        Err(e) => (
            Vec::new(),
            Err(TreeLoadError::Io {
                message: e.to_string(),
            }),
        ),
    };

    let (lines, tree) = match parsed {
        Ok(file) => (LineMap::new(file.line_offset), Ok(file.module)),
        Err(err) => (LineMap::default(), Err(err)),
    };
    LoadedModule {
        id,
        output_path,
        lines,
        bytes,
        tree,
    }
}

fn stem_path(rel: &Utf8Path) -> Utf8PathBuf {
    let mut stem = rel.with_extension("");
    if stem.extension() == Some("py") {
        stem = stem.with_extension("");
    }
    stem
}

/// `pkg/mod.json` (or `pkg/mod.py.json`) -> `pkg/mod.py`.
pub fn output_path(rel: &Utf8Path) -> Utf8PathBuf {
    stem_path(rel).with_extension("py")
}

/// `pkg/sub/__init__.json` -> `pkg.sub`, `pkg/mod.json` -> `pkg.mod`.
pub fn module_name(rel: &Utf8Path) -> String {
    let stem = stem_path(rel);
    let mut parts: Vec<&str> = stem.components().map(|c| c.as_str()).collect();
    if parts.len() > 1 && parts.last() == Some(&"__init__") {
        parts.pop();
    }
    parts.join(".")
}

/// Pre-loaded modules for embedding and testing, sorted by name.
#[derive(Debug, Clone)]
pub struct InMemoryModuleSource {
    modules: Vec<LoadedModule>,
}

impl InMemoryModuleSource {
    pub fn new(mut modules: Vec<LoadedModule>) -> Self {
        modules.sort_by(|a, b| a.id.name.cmp(&b.id.name));
        Self { modules }
    }

    /// Wraps an already parsed tree. The cache key then hashes its JSON form.
    pub fn loaded(name: &str, tree: Module) -> LoadedModule {
        let rel = Utf8PathBuf::from(format!("{}.py", name.replace('.', "/")));
        LoadedModule {
            id: ModuleId::with_path(name, rel.clone()),
            output_path: rel,
            lines: LineMap::default(),
            bytes: serde_json::to_vec(&tree).unwrap_or_default(),
            tree: Ok(tree),
        }
    }
}

impl ModuleSource for InMemoryModuleSource {
    fn load_modules(&self) -> anyhow::Result<Vec<LoadedModule>> {
        Ok(self.modules.clone())
    }
}

/// Filesystem write operations.
#[derive(Debug, Clone, Default)]
pub struct FsWritePort;

impl WritePort for FsWritePort {
    fn write_file(&self, path: &Utf8Path, contents: &[u8]) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("create parent dir for {}", path))?;
        }
        fs::write(path, contents).with_context(|| format!("write {}", path))
    }

    fn create_dir_all(&self, path: &Utf8Path) -> anyhow::Result<()> {
        fs::create_dir_all(path).with_context(|| format!("create_dir_all {}", path))
    }
}

/// Rendered outputs stored as `<dir>/<key>.py`.
#[derive(Debug, Clone)]
pub struct TranspileCache {
    pub dir: Utf8PathBuf,
}

impl TranspileCache {
    pub fn new(dir: Utf8PathBuf) -> Self {
        Self { dir }
    }

    fn entry(&self, key: &str) -> Utf8PathBuf {
        self.dir.join(format!("{key}.py"))
    }
}

impl OutputCache for TranspileCache {
    fn get(&self, key: &str) -> Option<String> {
        match fs::read_to_string(self.entry(key)) {
            Ok(output) => Some(output),
            Err(err) => {
                debug!(key, error = %err, "cache miss");
                None
            }
        }
    }

    fn put(&self, key: &str, output: &str) -> anyhow::Result<()> {
        fs::create_dir_all(&self.dir).with_context(|| format!("create cache dir {}", self.dir))?;
        fs::write(self.entry(key), output).with_context(|| format!("write cache entry {key}"))
    }
}
