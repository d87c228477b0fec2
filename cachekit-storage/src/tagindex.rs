//! Bidirectional tag index used by the coordinator to resolve
//! `removeByTag`/`removeByTagPattern` into concrete keys.
//!
//! Forward key→tags and reverse tag→keys maps are kept in lockstep so both
//! directions stay O(1) average lookups.

use std::collections::HashSet;

use dashmap::DashMap;

use cachekit_core::{Key, Tag};

/// Maintains `Key -> {Tag}` and `Tag -> {Key}` in lockstep so both
/// "what tags does this key have" and "what keys have this tag" are O(1)
/// average lookups.
#[derive(Debug, Default)]
pub struct TagIndex {
    by_key: DashMap<Key, HashSet<Tag>>,
    by_tag: DashMap<Tag, HashSet<Key>>,
}

impl TagIndex {
    /// Builds an empty index.
    pub fn new() -> Self {
        TagIndex::default()
    }

    /// Records that `key` carries `tags`, replacing any tags previously
    /// recorded for it.
    ///
    /// Updates the forward map first, then the reverse map, so a reader
    /// racing this call never observes a reverse entry without its
    /// corresponding forward entry.
    pub fn record(&self, key: &Key, tags: &[Tag]) {
        self.forget(key);
        if tags.is_empty() {
            return;
        }
        let tag_set: HashSet<Tag> = tags.iter().cloned().collect();
        self.by_key.insert(key.clone(), tag_set);
        for tag in tags {
            self.by_tag.entry(tag.clone()).or_default().insert(key.clone());
        }
    }

    /// Removes all tag associations for `key`.
    pub fn forget(&self, key: &Key) {
        if let Some((_, tags)) = self.by_key.remove(key) {
            for tag in tags {
                if let Some(mut keys) = self.by_tag.get_mut(&tag) {
                    keys.remove(key);
                    let is_empty = keys.is_empty();
                    drop(keys);
                    if is_empty {
                        self.by_tag.remove(&tag);
                    }
                }
            }
        }
    }

    /// Every key currently tagged with `tag`.
    pub fn keys_for_tag(&self, tag: &Tag) -> Vec<Key> {
        self.by_tag
            .get(tag)
            .map(|keys| keys.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Every key whose tags include at least one matching `pattern`
    /// (`*`-glob, see [`Tag::matches_pattern`]).
    pub fn keys_for_tag_pattern(&self, pattern: &str) -> Vec<Key> {
        let mut matched = HashSet::new();
        for entry in self.by_tag.iter() {
            if entry.key().matches_pattern(pattern) {
                matched.extend(entry.value().iter().cloned());
            }
        }
        matched.into_iter().collect()
    }

    /// Tags currently recorded for `key`.
    pub fn tags_for_key(&self, key: &Key) -> Vec<Tag> {
        self.by_key
            .get(key)
            .map(|tags| tags.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Drops every recorded association in both directions.
    pub fn clear(&self) {
        self.by_key.clear();
        self.by_tag.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_for_tag_reflects_recorded_entries() {
        let index = TagIndex::new();
        index.record(&Key::new("k1"), &[Tag::new("a"), Tag::new("b")]);
        index.record(&Key::new("k2"), &[Tag::new("b")]);

        let mut keys_for_b = index.keys_for_tag(&Tag::new("b"));
        keys_for_b.sort();
        assert_eq!(keys_for_b, vec![Key::new("k1"), Key::new("k2")]);
    }

    #[test]
    fn forget_removes_reverse_entries_too() {
        let index = TagIndex::new();
        let key = Key::new("k1");
        index.record(&key, &[Tag::new("a")]);
        index.forget(&key);
        assert!(index.keys_for_tag(&Tag::new("a")).is_empty());
        assert!(index.tags_for_key(&key).is_empty());
    }

    #[test]
    fn re_recording_a_key_replaces_its_old_tags() {
        let index = TagIndex::new();
        let key = Key::new("k1");
        index.record(&key, &[Tag::new("a")]);
        index.record(&key, &[Tag::new("b")]);
        assert!(index.keys_for_tag(&Tag::new("a")).is_empty());
        assert_eq!(index.keys_for_tag(&Tag::new("b")), vec![key]);
    }

    #[test]
    fn pattern_match_aggregates_across_matching_tags() {
        let index = TagIndex::new();
        index.record(&Key::new("k1"), &[Tag::new("user:1")]);
        index.record(&Key::new("k2"), &[Tag::new("user:2")]);
        index.record(&Key::new("k3"), &[Tag::new("order:1")]);

        let mut matched = index.keys_for_tag_pattern("user:*");
        matched.sort();
        assert_eq!(matched, vec![Key::new("k1"), Key::new("k2")]);
    }

    #[test]
    fn clear_drops_both_directions() {
        let index = TagIndex::new();
        index.record(&Key::new("k1"), &[Tag::new("a"), Tag::new("b")]);
        index.record(&Key::new("k2"), &[Tag::new("b")]);

        index.clear();

        assert!(index.keys_for_tag(&Tag::new("a")).is_empty());
        assert!(index.keys_for_tag(&Tag::new("b")).is_empty());
        assert!(index.tags_for_key(&Key::new("k1")).is_empty());
        assert!(index.tags_for_key(&Key::new("k2")).is_empty());
    }
}
