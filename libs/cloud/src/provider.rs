//! Provider wire types and the [`CloudApi`] capability trait.
//!
//! The types here mirror the provider's API shapes closely enough that a
//! real SDK adapter is a thin translation layer, while staying small enough
//! for the in-memory mock to implement faithfully.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CloudError;

/// Lifecycle state of a provider-side instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceLifecycle {
    Pending,
    Running,
    ShuttingDown,
    Stopping,
    Stopped,
    Terminated,
}

impl InstanceLifecycle {
    /// States a convergence pass considers live.
    ///
    /// Terminated instances are treated as absent so a new instance can be
    /// created under the same name.
    pub const NON_TERMINATED: [InstanceLifecycle; 4] = [
        Self::Pending,
        Self::Running,
        Self::Stopping,
        Self::Stopped,
    ];

    /// Provider wire name for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::ShuttingDown => "shutting-down",
            Self::Stopping => "stopping",
            Self::Stopped => "stopped",
            Self::Terminated => "terminated",
        }
    }
}

/// A provider resource tag.
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

/// A list-query filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
    pub name: String,
    pub values: Vec<String>,
}

impl Filter {
    pub fn new(name: impl Into<String>, values: Vec<String>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// Filter on a tag key/value pair.
    pub fn tag(key: &str, value: impl Into<String>) -> Self {
        Self::new(format!("tag:{key}"), vec![value.into()])
    }

    /// Filter restricting results to non-terminated lifecycle states.
    pub fn non_terminated() -> Self {
        Self::new(
            "instance-state-name",
            InstanceLifecycle::NON_TERMINATED
                .iter()
                .map(|state| state.as_str().to_string())
                .collect(),
        )
    }
}

/// One network attachment on a live instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterface {
    /// Assigned public address, if the provider allocated one.
    pub public_ip: Option<String>,
}

/// Description of a live instance, as returned by list queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceDescription {
    pub instance_id: String,
    pub state: InstanceLifecycle,
    pub private_ip_address: Option<String>,
    pub instance_type: Option<String>,
    pub image_id: Option<String>,
    pub subnet_id: Option<String>,
    pub key_name: Option<String>,
    pub security_group_ids: Vec<String>,
    pub network_interfaces: Vec<NetworkInterface>,
    pub iam_instance_profile_arn: Option<String>,
    pub tags: Vec<Tag>,
}

impl InstanceDescription {
    /// Description with only identity and state set.
    pub fn new(instance_id: impl Into<String>, state: InstanceLifecycle) -> Self {
        Self {
            instance_id: instance_id.into(),
            state,
            private_ip_address: None,
            instance_type: None,
            image_id: None,
            subnet_id: None,
            key_name: None,
            security_group_ids: Vec::new(),
            network_interfaces: Vec::new(),
            iam_instance_profile_arn: None,
            tags: Vec::new(),
        }
    }
}

/// An image known to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Image {
    /// Concrete, immutable identifier.
    pub image_id: String,

    /// Symbolic name the image can be located by, when it has one.
    pub name: Option<String>,
}

/// Block device mapping entry for a launch request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub virtual_name: Option<String>,
}

/// Network interface specification for a launch request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkInterfaceSpec {
    pub device_index: i64,
    pub subnet_id: Option<String>,
    pub private_ip_address: Option<String>,
    pub associate_public_ip: Option<bool>,
    pub groups: Vec<String>,
}

/// Launch request for a single instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunInstancesRequest {
    pub image_id: String,
    pub instance_type: Option<String>,
    pub min_count: i64,
    pub max_count: i64,
    pub key_name: Option<String>,
    pub network_interfaces: Vec<NetworkInterfaceSpec>,
    pub block_device_mappings: Vec<BlockDeviceMapping>,

    /// Base64-encoded startup payload.
    pub user_data: Option<String>,

    pub iam_instance_profile: Option<String>,
}

/// Capability surface the convergence tasks consume from the provider.
///
/// Every call is a synchronous round-trip from the caller's perspective:
/// no retry layer is added here, and failures surface as [`CloudError`]
/// values naming the operation.
#[async_trait]
pub trait CloudApi: Send + Sync {
    /// Filtered list query over instances.
    async fn describe_instances(
        &self,
        filters: &[Filter],
    ) -> Result<Vec<InstanceDescription>, CloudError>;

    /// Side-channel attribute query for an instance's startup payload.
    ///
    /// Returns the payload still in its base64 wire encoding.
    async fn describe_user_data(&self, instance_id: &str) -> Result<Option<String>, CloudError>;

    /// Resolve a symbolic or concrete image reference.
    ///
    /// Returns `None` when the reference matches nothing.
    async fn resolve_image(&self, name_or_id: &str) -> Result<Option<Image>, CloudError>;

    /// Create instances. Returns the created descriptions.
    async fn run_instances(
        &self,
        request: RunInstancesRequest,
    ) -> Result<Vec<InstanceDescription>, CloudError>;

    /// Apply tags to a resource. Existing keys are overwritten.
    async fn create_tags(
        &self,
        resource_id: &str,
        tags: &BTreeMap<String, String>,
    ) -> Result<(), CloudError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_terminated_filter_values() {
        let filter = Filter::non_terminated();
        assert_eq!(filter.name, "instance-state-name");
        assert_eq!(filter.values, ["pending", "running", "stopping", "stopped"]);
    }

    #[test]
    fn test_tag_filter_shape() {
        let filter = Filter::tag("Name", "node-1");
        assert_eq!(filter.name, "tag:Name");
        assert_eq!(filter.values, ["node-1"]);
    }

    #[test]
    fn test_lifecycle_wire_names() {
        assert_eq!(InstanceLifecycle::ShuttingDown.as_str(), "shutting-down");
        assert_eq!(InstanceLifecycle::Terminated.as_str(), "terminated");
    }
}
