//! Spec paths and spec kinds.

use serde::{Deserialize, Serialize};

/// Hierarchical path of a spec inside a layer, `/`-separated and absolute.
///
/// The layer root is `/`; every other path is `/seg/seg/...` with non-empty
/// segments.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpecPath(String);

impl SpecPath {
    /// The layer root path `/`.
    pub fn root() -> Self {
        SpecPath("/".to_string())
    }

    /// Build a path from a string, normalizing a missing leading slash.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        if path.is_empty() {
            return Self::root();
        }
        if path.starts_with('/') {
            SpecPath(path)
        } else {
            SpecPath(format!("/{path}"))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parent path, or `None` for the root.
    pub fn parent(&self) -> Option<SpecPath> {
        if self.is_root() {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(idx) => Some(SpecPath(self.0[..idx].to_string())),
            None => None,
        }
    }

    /// Last path segment; empty for the root.
    pub fn name(&self) -> &str {
        if self.is_root() {
            ""
        } else {
            self.0.rsplit('/').next().unwrap_or("")
        }
    }

    /// Child of this path.
    pub fn child(&self, name: &str) -> SpecPath {
        if self.is_root() {
            SpecPath(format!("/{name}"))
        } else {
            SpecPath(format!("{}/{name}", self.0))
        }
    }

    /// True when `self` equals `ancestor` or lies below it.
    pub fn has_prefix(&self, ancestor: &SpecPath) -> bool {
        if ancestor.is_root() {
            return true;
        }
        self.0 == ancestor.0 || self.0.starts_with(&format!("{}/", ancestor.0))
    }

    /// Re-anchor this path from `old_prefix` to `new_prefix`.
    ///
    /// Returns `None` when `self` is not under `old_prefix`.
    pub fn replace_prefix(&self, old_prefix: &SpecPath, new_prefix: &SpecPath) -> Option<SpecPath> {
        if !self.has_prefix(old_prefix) {
            return None;
        }
        if self.0 == old_prefix.0 {
            return Some(new_prefix.clone());
        }
        let suffix = if old_prefix.is_root() {
            &self.0
        } else {
            &self.0[old_prefix.0.len()..]
        };
        if new_prefix.is_root() {
            Some(SpecPath(suffix.to_string()))
        } else {
            Some(SpecPath(format!("{}{suffix}", new_prefix.0)))
        }
    }
}

impl std::fmt::Display for SpecPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SpecPath {
    fn from(s: &str) -> Self {
        SpecPath::new(s)
    }
}

/// Kind of a spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpecType {
    Root,
    Prim,
    Attribute,
    Relationship,
}
