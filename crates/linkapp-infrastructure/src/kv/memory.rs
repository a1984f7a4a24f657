use linkapp_core::storage::KeyValueStore;
use linkapp_core::{LinkAppError, Result};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// In-process store, optionally capped at a byte quota.
///
/// The quota counts key and value lengths, the way browser storage does,
/// so tests can reproduce a quota-exceeded write.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_quota(quota: usize) -> Self {
        Self {
            items: Mutex::default(),
            quota: Some(quota),
        }
    }

    fn items(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bytes in use.
    pub fn used(&self) -> usize {
        self.items().iter().map(|(k, v)| k.len() + v.len()).sum()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        Ok(self.items().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items();
        if let Some(quota) = self.quota {
            let others: usize = items
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = others + key.len() + value.len();
            if needed > quota {
                return Err(LinkAppError::storage(format!(
                    "quota exceeded writing '{key}' ({needed} of {quota} bytes)"
                )));
            }
        }
        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items().keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_crud() {
        let store = MemoryKeyValueStore::new();
        assert_eq!(store.get_item("a").unwrap(), None);
        store.set_item("a", "1").unwrap();
        store.set_item("a", "2").unwrap();
        assert_eq!(store.get_item("a").unwrap().as_deref(), Some("2"));
        assert_eq!(store.keys().unwrap(), vec!["a".to_string()]);
        store.remove_item("a").unwrap();
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_quota_rejects_and_keeps_old_value() {
        let store = MemoryKeyValueStore::with_quota(10);
        store.set_item("k", "12345").unwrap();
        let err = store.set_item("k", "0123456789").unwrap_err();
        assert!(err.is_storage());
        assert_eq!(store.get_item("k").unwrap().as_deref(), Some("12345"));
        // overwriting counts only the new value
        store.set_item("k", "123456789").unwrap();
        assert_eq!(store.used(), 10);
    }
}
