/// In-memory `StateStore` used by tests and `--dry-run`.

use std::collections::BTreeMap;

use super::{check_writable, is_descendant, ObjectKind, ObjectSpec, StateStore, StateValue, StoreError};

#[derive(Debug, Clone, PartialEq)]
struct StoredObject {
    spec: ObjectSpec,
    value: Option<StateValue>,
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    objects: BTreeMap<String, StoredObject>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every state that currently holds a value, keyed by path.
    pub fn snapshot(&self) -> BTreeMap<String, StateValue> {
        self.objects
            .iter()
            .filter_map(|(path, obj)| obj.value.clone().map(|v| (path.clone(), v)))
            .collect()
    }

    pub fn spec(&self, path: &str) -> Option<&ObjectSpec> {
        self.objects.get(path).map(|obj| &obj.spec)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.objects.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

impl StateStore for MemoryStore {
    fn ensure_exists(&mut self, path: &str, spec: &ObjectSpec) -> Result<bool, StoreError> {
        if self.objects.contains_key(path) {
            return Ok(false);
        }
        self.objects.insert(
            path.to_string(),
            StoredObject {
                spec: spec.clone(),
                value: None,
            },
        );
        Ok(true)
    }

    fn write(&mut self, path: &str, value: StateValue) -> Result<(), StoreError> {
        let obj = self
            .objects
            .get_mut(path)
            .ok_or_else(|| StoreError::UnknownPath(path.to_string()))?;
        check_writable(path, &obj.spec, &value)?;
        obj.value = Some(value);
        Ok(())
    }

    fn read(&mut self, path: &str) -> Result<Option<StateValue>, StoreError> {
        Ok(self.objects.get(path).and_then(|obj| obj.value.clone()))
    }

    fn delete(&mut self, path: &str, recursive: bool) -> Result<usize, StoreError> {
        let before = self.objects.len();
        if recursive {
            self.objects
                .retain(|candidate, _| candidate != path && !is_descendant(candidate, path));
        } else {
            self.objects.remove(path);
        }
        Ok(before - self.objects.len())
    }

    fn list_where(&mut self, prefix: &str, kind: ObjectKind) -> Result<Vec<String>, StoreError> {
        Ok(self
            .objects
            .iter()
            .filter(|(path, obj)| obj.spec.kind() == kind && is_descendant(path, prefix))
            .map(|(path, _)| path.clone())
            .collect())
    }
}
