//! Live provisioning execution target.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::debug;

use crate::config::CloudConfig;
use crate::error::CloudError;
use crate::provider::CloudApi;

/// Execution target that realizes changes through live provider calls.
pub struct ApiTarget {
    cloud: Arc<dyn CloudApi>,
    config: CloudConfig,
}

impl ApiTarget {
    pub fn new(cloud: Arc<dyn CloudApi>, config: CloudConfig) -> Self {
        Self { cloud, config }
    }

    /// Provider capability handle.
    pub fn cloud(&self) -> &Arc<dyn CloudApi> {
        &self.cloud
    }

    /// Assert tags on a resource, merging in the configured common tags.
    ///
    /// Re-asserted on every pass whether or not anything else changed, so
    /// tag drift self-heals.
    pub async fn ensure_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        let mut merged = tags.clone();
        self.config.merge_common_tags(&mut merged);

        debug!(
            resource_id = %resource_id,
            tag_count = merged.len(),
            "Asserting tags"
        );
        self.cloud.create_tags(resource_id, &merged).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockCloud;
    use crate::provider::{InstanceDescription, InstanceLifecycle};

    #[tokio::test]
    async fn test_ensure_tags_merges_common_tags() {
        let mock = Arc::new(MockCloud::new());
        mock.seed_instance(InstanceDescription::new("i-1", InstanceLifecycle::Running));

        let config = CloudConfig {
            region: "us-east-1".to_string(),
            common_tags: BTreeMap::from([("stratus/cluster".to_string(), "test".to_string())]),
        };
        let target = ApiTarget::new(mock.clone(), config);

        let tags = BTreeMap::from([("Name".to_string(), "node-1".to_string())]);
        target.ensure_tags("i-1", &tags).await.unwrap();

        let calls = mock.tag_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "i-1");
        assert_eq!(calls[0].1["Name"], "node-1");
        assert_eq!(calls[0].1["stratus/cluster"], "test");
    }
}
