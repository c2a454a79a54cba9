//! This module provides the `GraphLoader` struct, responsible for loading composition
//! graphs from JSON files and strings.

use crate::types::{ComposerError, Graph};
use std::fs;
use std::path::{Path, PathBuf};

/// `GraphLoader` loads serialized node/edge collections.
///
/// Every loaded graph has the pseudocode of its custom blocks sanitized, so documents
/// edited by hand behave the same as ones produced by an editor.
pub struct GraphLoader;

impl GraphLoader {
    /// Loads a single graph from the specified file path.
    ///
    /// # Returns
    ///
    /// * `Err(ComposerError::FileError)` if the file cannot be read.
    /// * `Err(ComposerError::ParseError)` if the content is not a valid graph document.
    pub fn load_graph(path: &Path) -> Result<Graph, ComposerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            ComposerError::FileError(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        Self::load_graph_from_string(&content).map_err(|e| match e {
            ComposerError::ParseError(message) => {
                ComposerError::ParseError(format!("{}: {}", path.display(), message))
            }
            other => other,
        })
    }

    /// Loads a single graph from JSON text.
    ///
    /// Both flat node records and editor exports (block fields nested under `data`,
    /// with `version` and `exportedAt` alongside) are accepted.
    pub fn load_graph_from_string(content: &str) -> Result<Graph, ComposerError> {
        let graph: Graph = serde_json::from_str(content)?;
        Ok(graph.sanitized())
    }

    /// Loads every graph file (`.json` extension) from a directory, ordered by path.
    ///
    /// Subdirectories and other files are skipped. A file that fails to load yields an
    /// error in its place; the remaining files are still loaded.
    pub fn load_graphs(directory: &Path) -> Vec<Result<(PathBuf, Graph), ComposerError>> {
        match Self::graph_paths(directory) {
            Ok(paths) => paths
                .into_iter()
                .map(|path| Self::load_graph(&path).map(|graph| (path, graph)))
                .collect(),
            Err(e) => vec![Err(e)],
        }
    }

    fn graph_paths(directory: &Path) -> Result<Vec<PathBuf>, ComposerError> {
        let unreadable = |e: std::io::Error| {
            ComposerError::FileError(format!(
                "Cannot list graphs in {}: {}",
                directory.display(),
                e
            ))
        };

        let mut paths = Vec::new();
        for entry in fs::read_dir(directory).map_err(unreadable)? {
            let path = entry.map_err(unreadable)?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }

        paths.sort();
        Ok(paths)
    }
}
