//! Template store boundary.

use crate::error::StorageError;
use crate::types::{Identity, Template};
use std::sync::{Arc, RwLock};

/// Durable identity → template mapping.
///
/// `get_all` must return templates in a stable order; the matcher's
/// tie-break depends on it. Implementations must allow concurrent readers.
/// Failures are returned unchanged to the caller, with no retry.
pub trait TemplateStore {
    fn get_all(&self) -> Result<Vec<(Identity, Template)>, StorageError>;

    /// Store one template atomically. Writing an identity that already
    /// exists replaces its template and keeps its position in `get_all`.
    fn put(&self, identity: &Identity, template: &Template) -> Result<(), StorageError>;

    /// Returns `true` if the identity existed.
    fn remove(&self, identity: &Identity) -> Result<bool, StorageError>;
}

impl<T: TemplateStore + ?Sized> TemplateStore for &T {
    fn get_all(&self) -> Result<Vec<(Identity, Template)>, StorageError> {
        (**self).get_all()
    }

    fn put(&self, identity: &Identity, template: &Template) -> Result<(), StorageError> {
        (**self).put(identity, template)
    }

    fn remove(&self, identity: &Identity) -> Result<bool, StorageError> {
        (**self).remove(identity)
    }
}

impl<T: TemplateStore + ?Sized> TemplateStore for Arc<T> {
    fn get_all(&self) -> Result<Vec<(Identity, Template)>, StorageError> {
        (**self).get_all()
    }

    fn put(&self, identity: &Identity, template: &Template) -> Result<(), StorageError> {
        (**self).put(identity, template)
    }

    fn remove(&self, identity: &Identity) -> Result<bool, StorageError> {
        (**self).remove(identity)
    }
}

/// Process-local store in insertion order.
#[derive(Default)]
pub struct MemoryTemplateStore {
    entries: RwLock<Vec<(Identity, Template)>>,
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> StorageError {
    StorageError::new("template store lock poisoned")
}

impl TemplateStore for MemoryTemplateStore {
    fn get_all(&self) -> Result<Vec<(Identity, Template)>, StorageError> {
        Ok(self.entries.read().map_err(poisoned)?.clone())
    }

    fn put(&self, identity: &Identity, template: &Template) -> Result<(), StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        match entries.iter_mut().find(|(id, _)| id == identity) {
            Some((_, existing)) => *existing = template.clone(),
            None => entries.push((identity.clone(), template.clone())),
        }
        Ok(())
    }

    fn remove(&self, identity: &Identity) -> Result<bool, StorageError> {
        let mut entries = self.entries.write().map_err(poisoned)?;
        let before = entries.len();
        entries.retain(|(id, _)| id != identity);
        Ok(entries.len() != before)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_keeps_insertion_order() {
        let store = MemoryTemplateStore::new();
        store.put(&"b".into(), &Template::new(vec![1.0])).unwrap();
        store.put(&"a".into(), &Template::new(vec![2.0])).unwrap();
        let names: Vec<_> = store
            .get_all()
            .unwrap()
            .into_iter()
            .map(|(id, _)| id.name().to_string())
            .collect();
        assert_eq!(names, ["b", "a"]);
    }

    #[test]
    fn test_put_existing_replaces_in_place() {
        let store = MemoryTemplateStore::new();
        store.put(&"a".into(), &Template::new(vec![1.0])).unwrap();
        store.put(&"b".into(), &Template::new(vec![2.0])).unwrap();
        store.put(&"a".into(), &Template::new(vec![3.0])).unwrap();

        let all = store.get_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].0.name(), "a");
        assert_eq!(all[0].1.values(), &[3.0]);
    }

    #[test]
    fn test_remove() {
        let store = MemoryTemplateStore::new();
        store.put(&"a".into(), &Template::new(vec![1.0])).unwrap();
        assert!(store.remove(&"a".into()).unwrap());
        assert!(!store.remove(&"a".into()).unwrap());
        assert!(store.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_concurrent_readers() {
        let store = Arc::new(MemoryTemplateStore::new());
        store.put(&"a".into(), &Template::new(vec![1.0, 0.0])).unwrap();

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || store.get_all().unwrap().len())
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), 1);
        }
    }
}
