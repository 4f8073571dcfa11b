//! In-memory provider for tests and development.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use tracing::debug;

use crate::error::CloudError;
use crate::provider::{
    CloudApi, Filter, Image, InstanceDescription, InstanceLifecycle, NetworkInterface,
    RunInstancesRequest, Tag,
};

/// Mock provider backed by in-memory state.
///
/// Supports seeding instances and images, recording launch, tag, and
/// image-resolution calls for assertions, and failure injection.
#[derive(Default)]
pub struct MockCloud {
    state: Mutex<MockState>,
    id_counter: AtomicU64,
    fail_describe: bool,
    fail_resolve_image: bool,
}

#[derive(Default)]
struct MockState {
    instances: Vec<InstanceDescription>,
    user_data: BTreeMap<String, String>,
    images: Vec<Image>,
    run_requests: Vec<RunInstancesRequest>,
    tag_calls: Vec<(String, BTreeMap<String, String>)>,
    resolve_calls: Vec<String>,
}

impl MockCloud {
    /// Create an empty mock provider.
    pub fn new() -> Self {
        Self::default()
    }

    /// Mock whose list queries fail.
    pub fn failing_describe() -> Self {
        Self {
            fail_describe: true,
            ..Self::default()
        }
    }

    /// Mock whose image resolution fails.
    pub fn failing_resolve_image() -> Self {
        Self {
            fail_resolve_image: true,
            ..Self::default()
        }
    }

    /// Seed a live instance.
    pub fn seed_instance(&self, description: InstanceDescription) {
        self.state.lock().unwrap().instances.push(description);
    }

    /// Seed the startup payload side channel for an instance, pre-encoded.
    pub fn seed_user_data(&self, instance_id: impl Into<String>, encoded: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .user_data
            .insert(instance_id.into(), encoded.into());
    }

    /// Seed a resolvable image.
    pub fn seed_image(&self, image: Image) {
        self.state.lock().unwrap().images.push(image);
    }

    /// Launch requests received so far.
    pub fn run_requests(&self) -> Vec<RunInstancesRequest> {
        self.state.lock().unwrap().run_requests.clone()
    }

    /// Tag-apply calls received so far.
    pub fn tag_calls(&self) -> Vec<(String, BTreeMap<String, String>)> {
        self.state.lock().unwrap().tag_calls.clone()
    }

    /// Image references passed to resolution so far.
    pub fn resolve_calls(&self) -> Vec<String> {
        self.state.lock().unwrap().resolve_calls.clone()
    }

    fn next_instance_id(&self) -> String {
        let counter = self.id_counter.fetch_add(1, Ordering::SeqCst);
        format!("i-{counter:017x}")
    }
}

fn matches_filter(instance: &InstanceDescription, filter: &Filter) -> Result<bool, CloudError> {
    if let Some(key) = filter.name.strip_prefix("tag:") {
        let value = instance
            .tags
            .iter()
            .find(|tag| tag.key == key)
            .map(|tag| tag.value.as_str());
        return Ok(value.is_some_and(|v| filter.values.iter().any(|want| want == v)));
    }

    if filter.name == "instance-state-name" {
        return Ok(filter
            .values
            .iter()
            .any(|want| want == instance.state.as_str()));
    }

    Err(CloudError::api(
        "describe_instances",
        format!("unsupported filter: {}", filter.name),
    ))
}

#[async_trait]
impl CloudApi for MockCloud {
    async fn describe_instances(
        &self,
        filters: &[Filter],
    ) -> Result<Vec<InstanceDescription>, CloudError> {
        if self.fail_describe {
            return Err(CloudError::api("describe_instances", "injected failure"));
        }

        let state = self.state.lock().unwrap();
        let mut matches = Vec::new();
        for instance in &state.instances {
            let mut matched = true;
            for filter in filters {
                if !matches_filter(instance, filter)? {
                    matched = false;
                    break;
                }
            }
            if matched {
                matches.push(instance.clone());
            }
        }

        debug!(count = matches.len(), "[MOCK] Listed instances");
        Ok(matches)
    }

    async fn describe_user_data(&self, instance_id: &str) -> Result<Option<String>, CloudError> {
        Ok(self.state.lock().unwrap().user_data.get(instance_id).cloned())
    }

    async fn resolve_image(&self, name_or_id: &str) -> Result<Option<Image>, CloudError> {
        {
            let mut state = self.state.lock().unwrap();
            state.resolve_calls.push(name_or_id.to_string());
        }

        if self.fail_resolve_image {
            return Err(CloudError::api("resolve_image", "injected failure"));
        }

        let state = self.state.lock().unwrap();
        Ok(state
            .images
            .iter()
            .find(|image| image.image_id == name_or_id || image.name.as_deref() == Some(name_or_id))
            .cloned())
    }

    async fn run_instances(
        &self,
        request: RunInstancesRequest,
    ) -> Result<Vec<InstanceDescription>, CloudError> {
        let instance_id = self.next_instance_id();
        let primary = request.network_interfaces.first();

        let mut description = InstanceDescription::new(&instance_id, InstanceLifecycle::Running);
        description.instance_type = request.instance_type.clone();
        description.image_id = Some(request.image_id.clone());
        description.subnet_id = primary.and_then(|ni| ni.subnet_id.clone());
        description.private_ip_address = primary.and_then(|ni| ni.private_ip_address.clone());
        description.key_name = request.key_name.clone();
        description.security_group_ids = primary.map(|ni| ni.groups.clone()).unwrap_or_default();
        description.network_interfaces = vec![NetworkInterface {
            public_ip: primary
                .and_then(|ni| ni.associate_public_ip)
                .unwrap_or(false)
                .then(|| "203.0.113.10".to_string()),
        }];
        description.iam_instance_profile_arn = request
            .iam_instance_profile
            .as_ref()
            .map(|name| format!("arn:aws:iam::123456789012:instance-profile/{name}"));

        debug!(instance_id = %instance_id, "[MOCK] Launched instance");

        let mut state = self.state.lock().unwrap();
        if let Some(encoded) = &request.user_data {
            state.user_data.insert(instance_id.clone(), encoded.clone());
        }
        state.instances.push(description.clone());
        state.run_requests.push(request);

        Ok(vec![description])
    }

    async fn create_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError> {
        let mut state = self.state.lock().unwrap();
        state
            .tag_calls
            .push((resource_id.to_string(), tags.clone()));

        let Some(instance) = state
            .instances
            .iter_mut()
            .find(|instance| instance.instance_id == resource_id)
        else {
            return Err(CloudError::api(
                "create_tags",
                format!("no such resource: {resource_id}"),
            ));
        };

        for (key, value) in tags {
            match instance.tags.iter_mut().find(|tag| &tag.key == key) {
                Some(tag) => tag.value = value.clone(),
                None => instance.tags.push(Tag::new(key.clone(), value.clone())),
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_describe_filters_by_tag_and_state() {
        let mock = MockCloud::new();

        let mut live = InstanceDescription::new("i-1", InstanceLifecycle::Running);
        live.tags = vec![Tag::new("Name", "node-1")];
        mock.seed_instance(live);

        let mut terminated = InstanceDescription::new("i-2", InstanceLifecycle::Terminated);
        terminated.tags = vec![Tag::new("Name", "node-1")];
        mock.seed_instance(terminated);

        let filters = vec![Filter::tag("Name", "node-1"), Filter::non_terminated()];
        let matches = mock.describe_instances(&filters).await.unwrap();

        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].instance_id, "i-1");
    }

    #[tokio::test]
    async fn test_unsupported_filter_is_an_error() {
        let mock = MockCloud::new();
        mock.seed_instance(InstanceDescription::new("i-1", InstanceLifecycle::Running));

        let filters = vec![Filter::new("launch-time", vec!["now".to_string()])];
        let err = mock.describe_instances(&filters).await.unwrap_err();
        assert!(err.to_string().contains("unsupported filter"));
    }

    #[tokio::test]
    async fn test_run_instances_assigns_distinct_ids() {
        let mock = MockCloud::new();

        let first = mock
            .run_instances(RunInstancesRequest::default())
            .await
            .unwrap();
        let second = mock
            .run_instances(RunInstancesRequest::default())
            .await
            .unwrap();

        assert_ne!(first[0].instance_id, second[0].instance_id);
        assert!(first[0].instance_id.starts_with("i-"));
        assert_eq!(mock.run_requests().len(), 2);
    }

    #[tokio::test]
    async fn test_create_tags_merges_into_instance() {
        let mock = MockCloud::new();
        let mut seeded = InstanceDescription::new("i-1", InstanceLifecycle::Running);
        seeded.tags = vec![Tag::new("env", "dev")];
        mock.seed_instance(seeded);

        let tags = BTreeMap::from([
            ("env".to_string(), "prod".to_string()),
            ("Name".to_string(), "node-1".to_string()),
        ]);
        mock.create_tags("i-1", &tags).await.unwrap();

        let matches = mock
            .describe_instances(&[Filter::tag("Name", "node-1")])
            .await
            .unwrap();
        assert_eq!(matches.len(), 1);
        let env = matches[0].tags.iter().find(|t| t.key == "env").unwrap();
        assert_eq!(env.value, "prod");
    }

    #[tokio::test]
    async fn test_create_tags_unknown_resource_fails() {
        let mock = MockCloud::new();
        let err = mock
            .create_tags("i-missing", &BTreeMap::new())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no such resource"));
    }
}
