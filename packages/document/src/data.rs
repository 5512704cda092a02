//! # Layer Data
//!
//! Raw storage behind a layer: a map of specs keyed by path, each carrying
//! plain fields, dictionary-valued fields, time samples and ordered child
//! lists. This is the primitive mutation vocabulary the interceptors observe;
//! none of these operations notify anything; [`crate::Layer`] wraps them and
//! routes the callbacks.

use crate::errors::DocumentError;
use crate::path::{SpecPath, SpecType};
use crate::value::{TimeCode, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Root field holding the layer's declared sublayer identifiers.
pub const FIELD_SUBLAYERS: &str = "sublayers";

/// One spec: fields, time samples and ordered child lists.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Spec {
    pub spec_type: Option<SpecType>,
    pub fields: BTreeMap<String, Value>,
    pub time_samples: BTreeMap<TimeCode, Value>,
    pub child_lists: BTreeMap<String, Vec<String>>,
}

impl Spec {
    fn new(spec_type: SpecType) -> Self {
        Spec {
            spec_type: Some(spec_type),
            ..Default::default()
        }
    }
}

/// Spec storage for one layer. The root spec always exists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerData {
    specs: BTreeMap<SpecPath, Spec>,
}

impl LayerData {
    pub fn new() -> Self {
        let mut specs = BTreeMap::new();
        specs.insert(SpecPath::root(), Spec::new(SpecType::Root));
        LayerData { specs }
    }

    pub fn has_spec(&self, path: &SpecPath) -> bool {
        self.specs.contains_key(path)
    }

    pub fn spec_type(&self, path: &SpecPath) -> Option<SpecType> {
        self.specs.get(path).and_then(|s| s.spec_type)
    }

    pub fn spec_count(&self) -> usize {
        self.specs.len()
    }

    /// Visit `path` and all specs below it, parents before children.
    pub fn traverse(&self, path: &SpecPath, mut visit: impl FnMut(&SpecPath, &Spec)) {
        for (p, spec) in self.specs.range(path.clone()..).filter(|(p, _)| p.has_prefix(path)) {
            visit(p, spec);
        }
    }

    pub fn field(&self, path: &SpecPath, field: &str) -> Option<Value> {
        self.specs.get(path).and_then(|s| s.fields.get(field)).cloned()
    }

    pub fn field_dict_key(&self, path: &SpecPath, field: &str, key: &str) -> Option<Value> {
        match self.specs.get(path).and_then(|s| s.fields.get(field)) {
            Some(Value::Dict(dict)) => dict.get(key).cloned(),
            _ => None,
        }
    }

    pub fn time_sample(&self, path: &SpecPath, time: TimeCode) -> Option<Value> {
        self.specs.get(path).and_then(|s| s.time_samples.get(&time)).cloned()
    }

    pub fn child_list(&self, path: &SpecPath, field: &str) -> Vec<String> {
        self.specs
            .get(path)
            .and_then(|s| s.child_lists.get(field))
            .cloned()
            .unwrap_or_default()
    }

    /// Set `field` on the spec at `path`. `Value::Null` erases the field.
    pub fn set_field(
        &mut self,
        path: &SpecPath,
        field: &str,
        value: Value,
    ) -> Result<(), DocumentError> {
        let spec = self
            .specs
            .get_mut(path)
            .ok_or_else(|| DocumentError::SpecNotFound(path.clone()))?;
        if value.is_null() {
            spec.fields.remove(field);
        } else {
            spec.fields.insert(field.to_string(), value);
        }
        Ok(())
    }

    /// Set one key of a dictionary-valued field. `Value::Null` erases the key;
    /// erasing the last key erases the field. A missing field is created.
    pub fn set_field_dict_key(
        &mut self,
        path: &SpecPath,
        field: &str,
        key: &str,
        value: Value,
    ) -> Result<(), DocumentError> {
        let spec = self
            .specs
            .get_mut(path)
            .ok_or_else(|| DocumentError::SpecNotFound(path.clone()))?;
        let entry = spec
            .fields
            .entry(field.to_string())
            .or_insert_with(|| Value::Dict(BTreeMap::new()));
        let Value::Dict(dict) = entry else {
            return Err(DocumentError::NotADict(path.clone(), field.to_string()));
        };
        if value.is_null() {
            dict.remove(key);
            if dict.is_empty() {
                spec.fields.remove(field);
            }
        } else {
            dict.insert(key.to_string(), value);
        }
        Ok(())
    }

    /// Set the sample at `time`. `Value::Null` erases the sample.
    pub fn set_time_sample(
        &mut self,
        path: &SpecPath,
        time: TimeCode,
        value: Value,
    ) -> Result<(), DocumentError> {
        let spec = self
            .specs
            .get_mut(path)
            .ok_or_else(|| DocumentError::SpecNotFound(path.clone()))?;
        if value.is_null() {
            spec.time_samples.remove(&time);
        } else {
            spec.time_samples.insert(time, value);
        }
        Ok(())
    }

    /// Create an empty spec at `path`; the parent must already exist.
    pub fn create_spec(&mut self, path: &SpecPath, spec_type: SpecType) -> Result<(), DocumentError> {
        if self.specs.contains_key(path) {
            return Err(DocumentError::SpecExists(path.clone()));
        }
        if let Some(parent) = path.parent() {
            if !self.specs.contains_key(&parent) {
                return Err(DocumentError::ParentNotFound(parent));
            }
        }
        self.specs.insert(path.clone(), Spec::new(spec_type));
        Ok(())
    }

    /// Delete the spec at `path` and everything below it, returning the
    /// removed subtree parents-first so callers can snapshot it.
    pub fn delete_spec(&mut self, path: &SpecPath) -> Result<Vec<(SpecPath, Spec)>, DocumentError> {
        if path.is_root() || !self.specs.contains_key(path) {
            return Err(DocumentError::SpecNotFound(path.clone()));
        }
        let doomed: Vec<SpecPath> = self
            .specs
            .range(path.clone()..)
            .filter(|(p, _)| p.has_prefix(path))
            .map(|(p, _)| p.clone())
            .collect();
        let mut removed = Vec::with_capacity(doomed.len());
        for p in doomed {
            if let Some(spec) = self.specs.remove(&p) {
                removed.push((p, spec));
            }
        }
        Ok(removed)
    }

    /// Collect a copy of the subtree at `path`, parents-first.
    pub fn collect_subtree(&self, path: &SpecPath) -> Vec<(SpecPath, Spec)> {
        let mut out = Vec::new();
        self.traverse(path, |p, spec| out.push((p.clone(), spec.clone())));
        out
    }

    /// Re-key the spec at `old_path` (and its subtree) to `new_path`.
    pub fn move_spec(&mut self, old_path: &SpecPath, new_path: &SpecPath) -> Result<(), DocumentError> {
        if old_path.is_root() || !self.specs.contains_key(old_path) {
            return Err(DocumentError::SpecNotFound(old_path.clone()));
        }
        if self.specs.contains_key(new_path) {
            return Err(DocumentError::SpecExists(new_path.clone()));
        }
        if let Some(parent) = new_path.parent() {
            if !self.specs.contains_key(&parent) {
                return Err(DocumentError::ParentNotFound(parent));
            }
        }
        let moved = self.delete_spec(old_path)?;
        for (p, spec) in moved {
            let rekeyed = p
                .replace_prefix(old_path, new_path)
                .expect("subtree paths share the moved prefix");
            self.specs.insert(rekeyed, spec);
        }
        Ok(())
    }

    /// Append `value` to the ordered child list `field` of the spec at `parent`.
    pub fn push_child(
        &mut self,
        parent: &SpecPath,
        field: &str,
        value: &str,
    ) -> Result<(), DocumentError> {
        let spec = self
            .specs
            .get_mut(parent)
            .ok_or_else(|| DocumentError::SpecNotFound(parent.clone()))?;
        spec.child_lists
            .entry(field.to_string())
            .or_default()
            .push(value.to_string());
        Ok(())
    }

    /// Pop the last entry of the ordered child list `field`, returning it.
    pub fn pop_child(&mut self, parent: &SpecPath, field: &str) -> Result<Option<String>, DocumentError> {
        let spec = self
            .specs
            .get_mut(parent)
            .ok_or_else(|| DocumentError::SpecNotFound(parent.clone()))?;
        let Some(list) = spec.child_lists.get_mut(field) else {
            return Ok(None);
        };
        let popped = list.pop();
        if list.is_empty() {
            spec.child_lists.remove(field);
        }
        Ok(popped)
    }
}

impl Default for LayerData {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_spec_always_exists() {
        let data = LayerData::new();
        assert!(data.has_spec(&SpecPath::root()));
        assert_eq!(data.spec_type(&SpecPath::root()), Some(SpecType::Root));
    }

    #[test]
    fn test_set_field_requires_spec() {
        let mut data = LayerData::new();
        let missing = SpecPath::new("/missing");
        assert_eq!(
            data.set_field(&missing, "x", Value::Int(1)),
            Err(DocumentError::SpecNotFound(missing))
        );
    }

    #[test]
    fn test_null_erases_field() {
        let mut data = LayerData::new();
        data.set_field(&SpecPath::root(), "x", Value::Int(1)).unwrap();
        assert_eq!(data.field(&SpecPath::root(), "x"), Some(Value::Int(1)));
        data.set_field(&SpecPath::root(), "x", Value::Null).unwrap();
        assert_eq!(data.field(&SpecPath::root(), "x"), None);
    }

    #[test]
    fn test_dict_key_set_and_erase() {
        let mut data = LayerData::new();
        let root = SpecPath::root();
        data.set_field_dict_key(&root, "meta", "author", Value::from("jo")).unwrap();
        assert_eq!(
            data.field_dict_key(&root, "meta", "author"),
            Some(Value::from("jo"))
        );
        data.set_field_dict_key(&root, "meta", "author", Value::Null).unwrap();
        // Last key removed drops the whole field.
        assert_eq!(data.field(&root, "meta"), None);
    }

    #[test]
    fn test_delete_spec_returns_subtree_parents_first() {
        let mut data = LayerData::new();
        let a = SpecPath::new("/a");
        let ab = SpecPath::new("/a/b");
        data.create_spec(&a, SpecType::Prim).unwrap();
        data.create_spec(&ab, SpecType::Attribute).unwrap();
        data.set_field(&ab, "v", Value::Int(3)).unwrap();

        let removed = data.delete_spec(&a).unwrap();
        let paths: Vec<_> = removed.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(paths, vec![a.clone(), ab.clone()]);
        assert!(!data.has_spec(&a));
        assert!(!data.has_spec(&ab));
    }

    #[test]
    fn test_delete_spec_boundary() {
        let mut data = LayerData::new();
        data.create_spec(&SpecPath::new("/a"), SpecType::Prim).unwrap();
        data.create_spec(&SpecPath::new("/ab"), SpecType::Prim).unwrap();
        data.delete_spec(&SpecPath::new("/a")).unwrap();
        assert!(data.has_spec(&SpecPath::new("/ab")));
    }

    #[test]
    fn test_move_spec_rekeys_subtree() {
        let mut data = LayerData::new();
        data.create_spec(&SpecPath::new("/a"), SpecType::Prim).unwrap();
        data.create_spec(&SpecPath::new("/a/x"), SpecType::Attribute).unwrap();
        data.move_spec(&SpecPath::new("/a"), &SpecPath::new("/b")).unwrap();
        assert!(data.has_spec(&SpecPath::new("/b")));
        assert!(data.has_spec(&SpecPath::new("/b/x")));
        assert!(!data.has_spec(&SpecPath::new("/a")));
    }

    #[test]
    fn test_push_pop_child_round_trip() {
        let mut data = LayerData::new();
        let root = SpecPath::root();
        data.push_child(&root, "order", "a").unwrap();
        data.push_child(&root, "order", "b").unwrap();
        assert_eq!(data.child_list(&root, "order"), vec!["a", "b"]);
        assert_eq!(data.pop_child(&root, "order").unwrap(), Some("b".to_string()));
        assert_eq!(data.pop_child(&root, "order").unwrap(), Some("a".to_string()));
        assert_eq!(data.pop_child(&root, "order").unwrap(), None);
    }

    #[test]
    fn test_time_samples_ordered() {
        let mut data = LayerData::new();
        let root = SpecPath::root();
        data.set_time_sample(&root, TimeCode(2.0), Value::Int(2)).unwrap();
        data.set_time_sample(&root, TimeCode(1.0), Value::Int(1)).unwrap();
        assert_eq!(data.time_sample(&root, TimeCode(1.0)), Some(Value::Int(1)));
        data.set_time_sample(&root, TimeCode(1.0), Value::Null).unwrap();
        assert_eq!(data.time_sample(&root, TimeCode(1.0)), None);
    }
}
