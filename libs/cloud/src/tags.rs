//! Tag conventions and mapping helpers.
//!
//! The stable human name of a resource is stored as a provider tag; these
//! helpers translate between the provider's tag-list shape and the map
//! shape the descriptors use.

use std::collections::BTreeMap;

use crate::provider::Tag;

/// Tag key carrying the stable human name of a resource.
pub const NAME_TAG: &str = "Name";

/// Convert a provider tag list into a key/value map.
pub fn tag_map(tags: &[Tag]) -> BTreeMap<String, String> {
    tags.iter()
        .map(|tag| (tag.key.clone(), tag.value.clone()))
        .collect()
}

/// Extract the stable name from a provider tag list.
pub fn name_tag(tags: &[Tag]) -> Option<String> {
    tags.iter()
        .find(|tag| tag.key == NAME_TAG)
        .map(|tag| tag.value.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_tag_present() {
        let tags = vec![Tag::new("role", "worker"), Tag::new(NAME_TAG, "node-1")];
        assert_eq!(name_tag(&tags), Some("node-1".to_string()));
    }

    #[test]
    fn test_name_tag_absent() {
        let tags = vec![Tag::new("role", "worker")];
        assert_eq!(name_tag(&tags), None);
    }

    #[test]
    fn test_tag_map_keys_unique() {
        let tags = vec![Tag::new("a", "1"), Tag::new("a", "2"), Tag::new("b", "3")];
        let map = tag_map(&tags);
        assert_eq!(map.len(), 2);
        // Later entries win, matching how the provider reports tag updates.
        assert_eq!(map["a"], "2");
    }
}
