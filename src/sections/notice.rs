//! Transient user-facing notices, keyed so that repeated operations replace
//! rather than stack their status.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoticeLevel {
    Loading,
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub key: String,
    pub level: NoticeLevel,
    pub message: String,
}

/// Ordered board of notices, at most one per key.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Notices {
    items: Vec<Notice>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Post a notice, replacing any existing notice with the same key.
    pub fn push(&mut self, key: impl Into<String>, level: NoticeLevel, message: impl Into<String>) {
        let notice = Notice {
            key: key.into(),
            level,
            message: message.into(),
        };

        match notice.level {
            NoticeLevel::Error => tracing::error!(key = %notice.key, "{}", notice.message),
            NoticeLevel::Loading => tracing::debug!(key = %notice.key, "{}", notice.message),
            NoticeLevel::Success | NoticeLevel::Info => {
                tracing::info!(key = %notice.key, "{}", notice.message)
            }
        }

        match self.items.iter_mut().find(|n| n.key == notice.key) {
            Some(existing) => *existing = notice,
            None => self.items.push(notice),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Notice> {
        self.items.iter().find(|n| n.key == key)
    }

    /// Last notice in first-insertion order. Replacing keeps the slot.
    pub fn last(&self) -> Option<&Notice> {
        self.items.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Notice> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Remove and return every notice.
    pub fn drain(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_key_replaces() {
        let mut notices = Notices::new();
        notices.push("move-section", NoticeLevel::Loading, "Moving section...");
        notices.push("move-section", NoticeLevel::Success, "Section moved");
        assert_eq!(notices.len(), 1);
        assert_eq!(notices.get("move-section").unwrap().level, NoticeLevel::Success);
    }

    #[test]
    fn test_distinct_keys_stack() {
        let mut notices = Notices::new();
        notices.push("add-section", NoticeLevel::Success, "Section added");
        notices.push("remove-section", NoticeLevel::Error, "Failed to remove");
        assert_eq!(notices.len(), 2);
        assert_eq!(notices.last().unwrap().key, "remove-section");
    }

    #[test]
    fn test_serializes_as_array() {
        let mut notices = Notices::new();
        notices.push("k", NoticeLevel::Info, "hello");
        let json = serde_json::to_value(&notices).unwrap();
        assert_eq!(json[0]["level"], "info");
        assert_eq!(json[0]["message"], "hello");
    }

    #[test]
    fn test_drain_empties_board() {
        let mut notices = Notices::new();
        notices.push("k", NoticeLevel::Info, "hello");
        assert_eq!(notices.drain().len(), 1);
        assert!(notices.is_empty());
    }
}
