//! Document import linker
//!
//! Walks a [`Node`] tree depth-first and replaces every import marker, a
//! mapping with the single key `import`, by the parsed content of the file it
//! names.
//!
//! ```yaml
//! steps:
//!   - id: align
//!     run: {import: tools/bwa-mem.yaml}
//! ```
//!
//! By default substitution is shallow: imported content is returned as parsed,
//! markers inside it included. [`LinkOptions::recursive`] resolves those too,
//! relative to the imported file. Import cycles fail with
//! [`DoclinkError::CyclicImport`] in either mode.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, trace, warn};

use crate::document::{Mapping, Node, Scalar};
use crate::error::{DoclinkError, Result};

/// Key that turns a single-entry mapping into an import marker
pub const IMPORT_KEY: &str = "import";

/// Default limit on nested imports in progress
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Base directory for relative import paths
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImportBase {
    /// Directory of the file containing the marker
    #[default]
    Document,

    /// Process working directory
    #[serde(rename = "cwd")]
    #[value(name = "cwd")]
    WorkingDir,
}

/// Linker behaviour switches
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct LinkOptions {
    /// Resolve markers inside imported files as well
    pub recursive: bool,
    pub relative_to: ImportBase,
    /// Maximum number of nested imports
    pub max_depth: usize,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            relative_to: ImportBase::Document,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Stateful linker for one run: owns the parse cache and the import stack
#[derive(Debug, Default)]
pub struct Linker {
    options: LinkOptions,
    /// Canonical path -> parsed root node
    cache: HashMap<PathBuf, Node>,
    /// Canonical paths currently being resolved, outermost first
    in_progress: Vec<PathBuf>,
}

impl Linker {
    pub fn new(options: LinkOptions) -> Self {
        Self {
            options,
            cache: HashMap::new(),
            in_progress: Vec::new(),
        }
    }

    pub fn options(&self) -> &LinkOptions {
        &self.options
    }

    /// Parse the file at `path` and resolve its imports.
    #[instrument(skip(self), fields(path = %path.display(), recursive = self.options.recursive))]
    pub fn link(&mut self, path: &Path) -> Result<Node> {
        let canonical = canonicalize(path)?;
        let root = self.load(&canonical, path)?;
        let base = self.base_dir(path)?;

        self.in_progress.push(canonical);
        let linked = self.resolve(&root, &base);
        self.in_progress.pop();
        linked
    }

    /// Resolve every import marker reachable from `node`.
    ///
    /// Relative import paths are joined onto `base`. The input tree is left
    /// untouched; the result is a fresh tree.
    pub fn resolve(&mut self, node: &Node, base: &Path) -> Result<Node> {
        match node {
            Node::Sequence(items) => items
                .iter()
                .map(|item| self.resolve(item, base))
                .collect::<Result<Vec<_>>>()
                .map(Node::Sequence),
            Node::Mapping(mapping) => match import_target(mapping)? {
                Some(target) => self.import(target, base),
                None => {
                    let mut resolved = Mapping::with_capacity(mapping.len());
                    for (key, value) in mapping {
                        resolved.insert(key.clone(), self.resolve(value, base)?);
                    }
                    Ok(Node::Mapping(resolved))
                }
            },
            Node::Scalar(scalar) => Ok(Node::Scalar(scalar.clone())),
        }
    }

    fn import(&mut self, target: &str, base: &Path) -> Result<Node> {
        let requested = base.join(target);
        let canonical = canonicalize(&requested)?;

        if let Some(start) = self.in_progress.iter().position(|p| *p == canonical) {
            let mut chain: Vec<String> = self.in_progress[start..]
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            chain.push(canonical.display().to_string());
            return Err(DoclinkError::CyclicImport {
                chain: chain.join(" -> "),
            });
        }
        if self.in_progress.len() > self.options.max_depth {
            return Err(DoclinkError::ImportDepthExceeded {
                path: requested.display().to_string(),
                max_depth: self.options.max_depth,
            });
        }

        debug!(path = %requested.display(), "importing");
        let content = self.load(&canonical, &requested)?;

        if !self.options.recursive {
            if contains_import_marker(&content) {
                warn!(
                    path = %requested.display(),
                    "imported document contains nested imports; left unresolved (use --recursive)"
                );
            }
            return Ok(content);
        }

        let nested_base = self.base_dir(&requested)?;
        self.in_progress.push(canonical);
        let resolved = self.resolve(&content, &nested_base);
        self.in_progress.pop();
        resolved
    }

    /// Read and parse a file, reusing earlier parses from this run
    fn load(&mut self, canonical: &Path, shown: &Path) -> Result<Node> {
        if let Some(cached) = self.cache.get(canonical) {
            trace!(path = %shown.display(), "parse cache hit");
            return Ok(cached.clone());
        }

        let text = fs::read_to_string(canonical).map_err(|source| DoclinkError::PathNotFound {
            path: shown.display().to_string(),
            source,
        })?;
        let node = Node::parse_str(&text).map_err(|details| DoclinkError::ParseError {
            path: shown.display().to_string(),
            details,
        })?;

        self.cache.insert(canonical.to_path_buf(), node.clone());
        Ok(node)
    }

    fn base_dir(&self, file: &Path) -> Result<PathBuf> {
        match self.options.relative_to {
            ImportBase::Document => Ok(file.parent().map(Path::to_path_buf).unwrap_or_default()),
            ImportBase::WorkingDir => Ok(std::env::current_dir()?),
        }
    }
}

fn canonicalize(path: &Path) -> Result<PathBuf> {
    fs::canonicalize(path).map_err(|source| DoclinkError::PathNotFound {
        path: path.display().to_string(),
        source,
    })
}

/// Return the import path if `mapping` is an import marker.
///
/// A marker has exactly one key, `import`. A `null` or empty value is not a
/// marker and the mapping is treated as ordinary data; any other non-string
/// value is an error.
pub fn import_target(mapping: &Mapping) -> Result<Option<&str>> {
    if mapping.len() != 1 {
        return Ok(None);
    }
    match mapping.get(IMPORT_KEY) {
        None => Ok(None),
        Some(Node::Scalar(Scalar::String(path))) if !path.is_empty() => Ok(Some(path.as_str())),
        Some(Node::Scalar(Scalar::String(_) | Scalar::Null)) => Ok(None),
        Some(other) => Err(DoclinkError::InvalidImportReference {
            found: other.kind(),
        }),
    }
}

/// Whether any import marker is reachable from `node`
pub fn contains_import_marker(node: &Node) -> bool {
    match node {
        Node::Sequence(items) => items.iter().any(contains_import_marker),
        Node::Mapping(mapping) => {
            matches!(import_target(mapping), Ok(Some(_)))
                || mapping.values().any(contains_import_marker)
        }
        Node::Scalar(_) => false,
    }
}

/// Link the document at `path` with the given options
pub fn link(path: &Path, options: &LinkOptions) -> Result<Node> {
    Linker::new(options.clone()).link(path)
}

/// Resolve `node` against `base` with default (shallow) options
pub fn resolve(node: &Node, base: &Path) -> Result<Node> {
    Linker::new(LinkOptions::default()).resolve(node, base)
}
