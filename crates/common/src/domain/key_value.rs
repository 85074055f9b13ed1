use serde::{Deserialize, Serialize};

/// Tag attached to a device, action or user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    pub key: String,
    pub value: String,
}

impl Tag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Key-value entry of a device parameter or tag list
///
/// `id` links a parameter to its platform record and must survive edits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub key: String,
    pub value: String,
    #[serde(default)]
    pub sent: bool,
}

impl KeyValueEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            id: None,
            key: key.into(),
            value: value.into(),
            sent: false,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_sent(mut self, sent: bool) -> Self {
        self.sent = sent;
        self
    }
}

impl From<Tag> for KeyValueEntry {
    fn from(tag: Tag) -> Self {
        KeyValueEntry::new(tag.key, tag.value)
    }
}

impl From<KeyValueEntry> for Tag {
    fn from(entry: KeyValueEntry) -> Self {
        Tag::new(entry.key, entry.value)
    }
}

/// First entry with `key`
pub fn find_entry<'a>(entries: &'a [KeyValueEntry], key: &str) -> Option<&'a KeyValueEntry> {
    entries.iter().find(|e| e.key == key)
}

/// Value of the first tag with `key`
pub fn find_tag<'a>(tags: &'a [Tag], key: &str) -> Option<&'a str> {
    tags.iter()
        .find(|t| t.key == key)
        .map(|t| t.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_defaults_sent_false_when_absent() {
        let entry: KeyValueEntry =
            serde_json::from_str(r#"{"key": "checkin_a", "value": "24,2024-01-01T00:00:00Z"}"#)
                .unwrap();
        assert!(!entry.sent);
        assert!(entry.id.is_none());
    }

    #[test]
    fn test_entry_without_id_omits_field() {
        let json = serde_json::to_value(KeyValueEntry::new("k", "v")).unwrap();
        assert!(json.get("id").is_none());
        assert_eq!(json["sent"], false);
    }

    #[test]
    fn test_find_tag() {
        let tags = vec![Tag::new("organization_id", "org-1"), Tag::new("group_id", "grp-1")];
        assert_eq!(find_tag(&tags, "group_id"), Some("grp-1"));
        assert_eq!(find_tag(&tags, "subgroup_id"), None);
    }
}
