use common::domain::{DeviceRepository, DomainError, DomainResult, KeyValueEntry, Tag};
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, instrument};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResolverTarget {
    Params,
    Tags,
}

/// Stages key-value updates against a known list and writes the merge once.
///
/// Writes that leave a key unchanged are never staged, so `apply` is a no-op
/// when every staged value matches what the entity already holds.
pub struct KeyValueResolver {
    store: Arc<dyn DeviceRepository>,
    target: ResolverTarget,
    existing: Vec<KeyValueEntry>,
    staged: Vec<KeyValueEntry>,
}

impl KeyValueResolver {
    /// Resolver over a device's parameter list
    pub fn params(store: Arc<dyn DeviceRepository>, existing: Vec<KeyValueEntry>) -> Self {
        Self {
            store,
            target: ResolverTarget::Params,
            existing,
            staged: Vec::new(),
        }
    }

    /// Resolver over a device's tag list
    pub fn tags(store: Arc<dyn DeviceRepository>, existing: Vec<Tag>) -> Self {
        Self {
            store,
            target: ResolverTarget::Tags,
            existing: existing.into_iter().map(KeyValueEntry::from).collect(),
            staged: Vec::new(),
        }
    }

    /// Current value of `key`, staged changes first
    pub fn get(&self, key: &str) -> Option<&KeyValueEntry> {
        self.staged
            .iter()
            .find(|e| e.key == key)
            .or_else(|| self.existing.iter().find(|e| e.key == key))
    }

    /// Entries the entity held when the resolver was created or last applied
    pub fn existing(&self) -> &[KeyValueEntry] {
        &self.existing
    }

    /// Stage `key = value`; a real change clears the `sent` flag
    pub fn set(&mut self, key: &str, value: &str) -> DomainResult<()> {
        validate_key(key)?;
        let unchanged = self.existing_entry(key).is_some_and(|e| e.value == value);
        self.stage(KeyValueEntry::new(key, value), unchanged);
        Ok(())
    }

    /// Stage `key = value` with an explicit `sent` flag
    pub fn set_with_sent(&mut self, key: &str, value: &str, sent: bool) -> DomainResult<()> {
        validate_key(key)?;
        let unchanged = self
            .existing_entry(key)
            .is_some_and(|e| e.value == value && e.sent == sent);
        self.stage(KeyValueEntry::new(key, value).with_sent(sent), unchanged);
        Ok(())
    }

    /// Stage a value taken from an event record; only JSON strings are accepted
    pub fn set_json(&mut self, key: &str, value: &Value) -> DomainResult<()> {
        match value {
            Value::String(s) => self.set(key, s),
            other => Err(DomainError::InvalidArgument(format!(
                "value for {} must be a string, got {}",
                key, other
            ))),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Existing entries with staged changes replaced in place and new keys appended
    pub fn merged(&self) -> Vec<KeyValueEntry> {
        let mut merged = self.existing.clone();
        for change in &self.staged {
            match merged.iter_mut().find(|e| e.key == change.key) {
                Some(entry) => {
                    entry.value = change.value.clone();
                    entry.sent = change.sent;
                }
                None => merged.push(change.clone()),
            }
        }
        merged
    }

    /// Write the merged list in one call when anything changed.
    ///
    /// Returns whether a write happened.
    #[instrument(skip(self), fields(target = ?self.target, staged = self.staged.len()))]
    pub async fn apply(&mut self, target_id: &str) -> DomainResult<bool> {
        if !self.has_changes() {
            debug!(target_id = %target_id, "no key-value changes to apply");
            return Ok(false);
        }

        let merged = self.merged();
        match self.target {
            ResolverTarget::Params => self.store.set_params(target_id, merged.clone()).await?,
            ResolverTarget::Tags => {
                let tags = merged.iter().cloned().map(Tag::from).collect();
                self.store.set_tags(target_id, tags).await?
            }
        }

        debug!(target_id = %target_id, changed = self.staged.len(), "key-value changes applied");
        self.existing = merged;
        self.staged.clear();
        Ok(true)
    }

    fn existing_entry(&self, key: &str) -> Option<&KeyValueEntry> {
        self.existing.iter().find(|e| e.key == key)
    }

    fn stage(&mut self, entry: KeyValueEntry, unchanged: bool) {
        self.staged.retain(|e| e.key != entry.key);
        if !unchanged {
            self.staged.push(entry);
        }
    }
}

fn validate_key(key: &str) -> DomainResult<()> {
    if key.trim().is_empty() {
        return Err(DomainError::InvalidArgument(
            "key must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::MockDeviceRepository;
    use serde_json::json;

    fn existing() -> Vec<KeyValueEntry> {
        vec![
            KeyValueEntry::new("threshold", "10").with_id("X"),
            KeyValueEntry::new("geofence_zone-1", "red")
                .with_id("Y")
                .with_sent(true),
        ]
    }

    #[tokio::test]
    async fn test_identical_values_cause_no_write() {
        let mut store = MockDeviceRepository::new();
        store.expect_set_params().times(0);

        let mut resolver = KeyValueResolver::params(Arc::new(store), existing());
        resolver.set("threshold", "10").unwrap();
        resolver.set("geofence_zone-1", "red").unwrap();

        assert!(!resolver.has_changes());
        assert!(!resolver.apply("dev-1").await.unwrap());
    }

    #[tokio::test]
    async fn test_apply_preserves_id_and_writes_once() {
        let mut store = MockDeviceRepository::new();
        store
            .expect_set_params()
            .withf(|device_id: &str, entries: &Vec<KeyValueEntry>| {
                device_id == "dev-1"
                    && entries.len() == 3
                    && entries[0] == KeyValueEntry::new("threshold", "20").with_id("X")
                    && entries[1].id.as_deref() == Some("Y")
                    && entries[2] == KeyValueEntry::new("interval", "5")
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut resolver = KeyValueResolver::params(Arc::new(store), existing());
        resolver.set("threshold", "20").unwrap();
        resolver.set("interval", "5").unwrap();

        assert!(resolver.apply("dev-1").await.unwrap());
        assert!(!resolver.has_changes());
        assert_eq!(resolver.existing().len(), 3);
    }

    #[tokio::test]
    async fn test_tags_are_written_as_tags() {
        let mut store = MockDeviceRepository::new();
        store
            .expect_set_tags()
            .withf(|device_id: &str, tags: &Vec<Tag>| {
                device_id == "dev-1"
                    && tags == &vec![Tag::new("organization_id", "org-1"), Tag::new("type", "sensor")]
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut resolver = KeyValueResolver::tags(
            Arc::new(store),
            vec![Tag::new("organization_id", "org-1"), Tag::new("type", "device")],
        );
        resolver.set("type", "sensor").unwrap();
        resolver.set("organization_id", "org-1").unwrap();

        assert!(resolver.apply("dev-1").await.unwrap());
    }

    #[test]
    fn test_restaging_replaces_previous_value() {
        let mut resolver = KeyValueResolver::params(Arc::new(MockDeviceRepository::new()), existing());
        resolver.set("threshold", "20").unwrap();
        resolver.set("threshold", "30").unwrap();
        assert_eq!(resolver.get("threshold").map(|e| e.value.as_str()), Some("30"));

        resolver.set("threshold", "10").unwrap();
        assert!(!resolver.has_changes());
    }

    #[test]
    fn test_set_clears_sent_only_on_change() {
        let mut resolver = KeyValueResolver::params(Arc::new(MockDeviceRepository::new()), existing());
        resolver.set("geofence_zone-1", "green").unwrap();

        let merged = resolver.merged();
        let entry = merged.iter().find(|e| e.key == "geofence_zone-1").unwrap();
        assert_eq!(entry.value, "green");
        assert!(!entry.sent);
        assert_eq!(entry.id.as_deref(), Some("Y"));
    }

    #[test]
    fn test_explicit_sent_flag_is_a_change() {
        let mut resolver = KeyValueResolver::params(Arc::new(MockDeviceRepository::new()), existing());
        resolver.set_with_sent("geofence_zone-1", "red", true).unwrap();
        assert!(!resolver.has_changes());

        resolver.set_with_sent("geofence_zone-1", "red", false).unwrap();
        assert!(resolver.has_changes());
    }

    #[test]
    fn test_invalid_input_fails_before_any_call() {
        let mut resolver = KeyValueResolver::params(Arc::new(MockDeviceRepository::new()), existing());

        assert!(matches!(
            resolver.set(" ", "1"),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolver.set_json("threshold", &json!(12)),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(matches!(
            resolver.set_json("threshold", &json!(null)),
            Err(DomainError::InvalidArgument(_))
        ));
        assert!(!resolver.has_changes());

        resolver.set_json("threshold", &json!("12")).unwrap();
        assert!(resolver.has_changes());
    }
}
