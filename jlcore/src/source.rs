//! Where class-file bytes come from.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::trace;
use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Lookup of class-file bytes by internal class name (`com/acme/Main`).
pub trait ClassSource: Send + Sync + fmt::Debug {
    fn load(&self, class: &str) -> Result<Arc<[u8]>>;
}

impl<T: ClassSource + ?Sized> ClassSource for Arc<T> {
    fn load(&self, class: &str) -> Result<Arc<[u8]>> {
        (**self).load(class)
    }
}

/// Name of the class file dumped for a closure class: the hidden-class suffix
/// after `/` is dropped and the binary name is turned into an internal one.
pub fn proxy_class_file(binary_name: &str) -> String {
    let name = match binary_name.rsplit_once('/') {
        Some((name, suffix)) if suffix.starts_with("0x") => name,
        _ => binary_name,
    };
    name.replace('.', "/")
}

/// A directory tree of `.class` files laid out by package.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_of(&self, class: &str) -> PathBuf {
        let mut path = self.root.clone();
        let mut segments = class.split('/').peekable();
        while let Some(segment) = segments.next() {
            if segments.peek().is_some() {
                path.push(segment);
            } else {
                path.push(format!("{segment}.class"));
            }
        }
        path
    }
}

impl ClassSource for DirectorySource {
    fn load(&self, class: &str) -> Result<Arc<[u8]>> {
        let path = self.path_of(class);
        trace!("Reading `{class}` from {}", path.display());
        std::fs::read(&path)
            .map(Arc::from)
            .map_err(|e| Error::unavailable(class, format!("{}: {e}", path.display())))
    }
}

/// Pre-fetched class bytes.
#[derive(Debug, Default)]
pub struct MemorySource {
    classes: RwLock<HashMap<String, Arc<[u8]>>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, class: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.insert(class, bytes);
        self
    }

    pub fn insert(&self, class: impl Into<String>, bytes: impl Into<Arc<[u8]>>) {
        self.classes.write().insert(class.into(), bytes.into());
    }

    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}

impl ClassSource for MemorySource {
    fn load(&self, class: &str) -> Result<Arc<[u8]>> {
        self.classes
            .read()
            .get(class)
            .cloned()
            .ok_or_else(|| Error::unavailable(class, "not in memory"))
    }
}

/// Tries each source in order and returns the first hit.
#[derive(Debug, Default)]
pub struct CompositeSource {
    sources: Vec<Box<dyn ClassSource>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: impl ClassSource + 'static) {
        self.sources.push(Box::new(source));
    }

    pub fn with(mut self, source: impl ClassSource + 'static) -> Self {
        self.push(source);
        self
    }
}

impl ClassSource for CompositeSource {
    fn load(&self, class: &str) -> Result<Arc<[u8]>> {
        let mut reasons = Vec::new();
        for source in &self.sources {
            match source.load(class) {
                Ok(bytes) => return Ok(bytes),
                Err(Error::ResourceUnavailable { reason, .. }) => reasons.push(reason),
                Err(other) => return Err(other),
            }
        }
        if reasons.is_empty() {
            return Err(Error::unavailable(class, "no class source is configured"));
        }
        Err(Error::unavailable(class, reasons.join("; ")))
    }
}
