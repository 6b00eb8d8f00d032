//! Descriptor registry: tag name to layout.
//!
//! Built once (built-ins plus caller-supplied documents), then handed by reference to a
//! [`Codec`](crate::codec::Codec). Later registrations shadow earlier ones with the same tag.

use crate::ast::Descriptor;
use crate::error::TreError;
use crate::parser;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Descriptors shipped with the crate.
pub const STANDARD_DESCRIPTORS: &str = include_str!("../descriptors/standard.tre");

/// File extension picked up by [`Registry::register_dir`].
pub const DESCRIPTOR_EXTENSION: &str = "tre";

#[derive(Debug, Clone, Default)]
pub struct Registry {
    descriptors: HashMap<String, Descriptor>,
}

impl Registry {
    /// Empty registry: every tag decodes raw.
    pub fn new() -> Self {
        Registry::default()
    }

    /// Registry preloaded with [`STANDARD_DESCRIPTORS`].
    pub fn with_builtins() -> Result<Self, TreError> {
        let mut registry = Registry::new();
        registry.register(STANDARD_DESCRIPTORS)?;
        Ok(registry)
    }

    /// Parse and validate a descriptor document, then add every descriptor in it.
    /// Returns the registered tags. On error nothing is registered.
    pub fn register(&mut self, source: &str) -> Result<Vec<String>, TreError> {
        let descriptors = parser::parse(source)?;
        let mut tags = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if self.descriptors.contains_key(&d.tag) {
                debug!(tag = %d.tag, "descriptor shadows an earlier registration");
            }
            tags.push(d.tag.clone());
            self.descriptors.insert(d.tag.clone(), d);
        }
        debug!(count = tags.len(), "registered TRE descriptors");
        Ok(tags)
    }

    /// Add an already-built descriptor (programmatic authoring).
    pub fn insert(&mut self, descriptor: Descriptor) {
        self.descriptors.insert(descriptor.tag.clone(), descriptor);
    }

    pub fn register_file(&mut self, path: &Path) -> Result<Vec<String>, TreError> {
        let source = std::fs::read_to_string(path)?;
        self.register(&source).map_err(|e| match e {
            TreError::Schema(msg) => TreError::Schema(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Register every `*.tre` file in a directory, in file-name order.
    pub fn register_dir(&mut self, dir: &Path) -> Result<Vec<String>, TreError> {
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && path.extension().map_or(false, |e| e == DESCRIPTOR_EXTENSION) {
                paths.push(path);
            }
        }
        paths.sort();
        let mut tags = Vec::new();
        for path in paths {
            tags.extend(self.register_file(&path)?);
        }
        Ok(tags)
    }

    /// Register a file, or every descriptor file of a directory.
    pub fn register_path(&mut self, path: &Path) -> Result<Vec<String>, TreError> {
        if path.is_dir() {
            self.register_dir(path)
        } else {
            self.register_file(path)
        }
    }

    /// Look up a tag; trailing spaces from the 6-byte TAG field are ignored.
    pub fn resolve(&self, tag: &str) -> Option<&Descriptor> {
        self.descriptors.get(tag.trim_end())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registered tags, sorted.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.descriptors.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }
}
