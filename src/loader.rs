//! Template source loaders.
//!
//! The engine never opens files directly: every `extends`, `include` and
//! `import` goes through a [`Loader`], which resolves a template name to an
//! absolute path and returns the raw source.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::LoaderError;

pub trait Loader: Send + Sync {
    /// Returns the raw source for a template name.
    ///
    /// # Errors
    ///
    /// Returns [`LoaderError::NotFound`] when no template exists at the
    /// path, or an I/O-flavoured error when it exists but cannot be read.
    fn get(&self, path: &str) -> Result<String, LoaderError>;

    /// Resolves a relative template reference against the loader's base.
    ///
    /// # Errors
    ///
    /// Returns an error when the base directory cannot be determined.
    fn path(&self, name: &str) -> Result<String, LoaderError>;
}

/// Loads templates from the local filesystem, optionally rooted at a base
/// directory.
#[derive(Debug, Default)]
pub struct FileSystemLoader {
    root: Option<PathBuf>,
}

impl FileSystemLoader {
    /// A loader rooted at `root`; an empty path defers to the current
    /// working directory at resolution time.
    ///
    /// # Errors
    ///
    /// Fails when `root` is non-empty and does not name an existing
    /// directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self, LoaderError> {
        let root = root.as_ref();
        if root.as_os_str().is_empty() {
            return Ok(FileSystemLoader { root: None });
        }
        let metadata = std::fs::metadata(root).map_err(|err| LoaderError::Io {
            name: root.display().to_string(),
            message: err.to_string(),
        })?;
        if !metadata.is_dir() {
            return Err(LoaderError::Io {
                name: root.display().to_string(),
                message: "not a directory".to_string(),
            });
        }
        Ok(FileSystemLoader {
            root: Some(root.to_path_buf()),
        })
    }
}

impl Loader for FileSystemLoader {
    fn get(&self, path: &str) -> Result<String, LoaderError> {
        std::fs::read_to_string(path).map_err(|err| {
            if err.kind() == std::io::ErrorKind::NotFound {
                LoaderError::NotFound {
                    name: path.to_string(),
                }
            } else {
                LoaderError::Io {
                    name: path.to_string(),
                    message: err.to_string(),
                }
            }
        })
    }

    fn path(&self, name: &str) -> Result<String, LoaderError> {
        let candidate = Path::new(name);
        if candidate.is_absolute() {
            return Ok(name.to_string());
        }
        let base = match &self.root {
            Some(root) => root.clone(),
            None => std::env::current_dir().map_err(|err| LoaderError::Io {
                name: name.to_string(),
                message: err.to_string(),
            })?,
        };
        Ok(base.join(candidate).display().to_string())
    }
}

/// Serves templates from an in-memory name → source map. The natural
/// loader for tests and for applications that assemble templates at
/// runtime.
#[derive(Debug, Default, Clone)]
pub struct MemoryLoader {
    templates: HashMap<String, String>,
}

impl MemoryLoader {
    pub fn new() -> Self {
        MemoryLoader::default()
    }

    /// Adds (or replaces) a template source under the given name.
    ///
    /// # Examples
    ///
    /// ```
    /// use ginger::{Loader, MemoryLoader};
    ///
    /// let mut loader = MemoryLoader::new();
    /// loader.add_template("greeting.tpl", "Hello!");
    /// assert_eq!(loader.get("greeting.tpl").unwrap(), "Hello!");
    /// ```
    pub fn add_template(&mut self, name: impl Into<String>, source: impl Into<String>) {
        self.templates.insert(name.into(), source.into());
    }
}

impl Loader for MemoryLoader {
    fn get(&self, path: &str) -> Result<String, LoaderError> {
        self.templates
            .get(path)
            .cloned()
            .ok_or_else(|| LoaderError::NotFound {
                name: path.to_string(),
            })
    }

    fn path(&self, name: &str) -> Result<String, LoaderError> {
        Ok(name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_loader() {
        let mut loader = MemoryLoader::new();
        loader.add_template("a.tpl", "hello");
        assert_eq!(loader.get("a.tpl").unwrap(), "hello");
        assert!(matches!(
            loader.get("missing.tpl"),
            Err(LoaderError::NotFound { .. })
        ));
        assert_eq!(loader.path("a.tpl").unwrap(), "a.tpl");
    }
}
