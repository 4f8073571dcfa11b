//! Configuration for the cloud capability layer.

use std::collections::BTreeMap;

use crate::provider::Filter;
use crate::tags::NAME_TAG;

/// Cloud layer configuration.
///
/// Common tags identify resources owned by this deployment. They are folded
/// into every list filter and every tag assertion, so discovery never picks
/// up a same-named resource belonging to someone else.
#[derive(Debug, Clone, Default)]
pub struct CloudConfig {
    /// Provider region.
    pub region: String,

    /// Tags applied to, and required of, every owned resource.
    pub common_tags: BTreeMap<String, String>,
}

impl CloudConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let region = std::env::var("STRATUS_REGION").unwrap_or_else(|_| "us-east-1".to_string());

        let common_tags = std::env::var("STRATUS_COMMON_TAGS")
            .map(|raw| parse_tag_list(&raw))
            .unwrap_or_default();

        Self {
            region,
            common_tags,
        }
    }

    /// Build list filters locating the uniquely-named resource owned by
    /// this deployment.
    pub fn name_filters(&self, name: &str) -> Vec<Filter> {
        let mut filters: Vec<Filter> = self
            .common_tags
            .iter()
            .map(|(key, value)| Filter::tag(key, value.clone()))
            .collect();
        filters.push(Filter::tag(NAME_TAG, name));
        filters
    }

    /// Merge common tags into a resource tag map.
    ///
    /// Resource-specific values win over the common set.
    pub fn merge_common_tags(&self, tags: &mut BTreeMap<String, String>) {
        for (key, value) in &self.common_tags {
            tags.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }
}

/// Parse a `key=value,key=value` tag list.
fn parse_tag_list(raw: &str) -> BTreeMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let pair = pair.trim();
            if pair.is_empty() {
                return None;
            }
            let (key, value) = pair.split_once('=')?;
            Some((key.trim().to_string(), value.trim().to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tag_list() {
        let tags = parse_tag_list("stratus/cluster=test, env=dev,,malformed");
        assert_eq!(tags.len(), 2);
        assert_eq!(tags["stratus/cluster"], "test");
        assert_eq!(tags["env"], "dev");
    }

    #[test]
    fn test_name_filters_include_common_tags() {
        let config = CloudConfig {
            region: "us-east-1".to_string(),
            common_tags: BTreeMap::from([("stratus/cluster".to_string(), "test".to_string())]),
        };

        let filters = config.name_filters("node-1");
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].name, "tag:stratus/cluster");
        assert_eq!(filters[1].name, "tag:Name");
        assert_eq!(filters[1].values, ["node-1"]);
    }

    #[test]
    fn test_merge_common_tags_resource_wins() {
        let config = CloudConfig {
            region: String::new(),
            common_tags: BTreeMap::from([
                ("env".to_string(), "dev".to_string()),
                ("owner".to_string(), "stratus".to_string()),
            ]),
        };

        let mut tags = BTreeMap::from([("env".to_string(), "prod".to_string())]);
        config.merge_common_tags(&mut tags);

        assert_eq!(tags["env"], "prod");
        assert_eq!(tags["owner"], "stratus");
    }
}
