//! The compute instance task.
//!
//! Converges one named instance: discovers the unique live match by stable
//! name, validates the transition, and renders a create-or-tag-assert
//! through the active execution target.
//!
//! Existing instances are not mutated in place beyond their tags; a delta
//! naming any other field fails the pass so the driver can decide on
//! replacement.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stratus_cloud::tags::{name_tag, tag_map, NAME_TAG};
use stratus_cloud::{
    ephemeral_devices, ApiTarget, CloudError, Filter, InstanceDescription, NetworkInterfaceSpec,
    RunInstancesRequest,
};
use stratus_codegen::{CodegenTarget, Literal};
use tracing::{debug, info, warn};

use crate::error::{TaskError, TaskResult};
use crate::target::Target;
use crate::task::{CompareWithId, Context, FindOutcome, FindWarning, Task};
use crate::user_data::UserData;

/// Resource kind used for generated code references.
pub const CODEGEN_KIND: &str = "aws_instance";

/// Reference stub for the subnet an instance is placed in.
///
/// Identity only; the full subnet object is a separate task and is never
/// fetched here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubnetRef {
    pub id: String,
}

/// Reference stub for a security group attached to an instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityGroupRef {
    pub id: String,
}

/// Reference stub for the SSH key pair bound at launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SshKeyRef {
    pub name: String,
}

/// Reference stub for the IAM instance profile bound at launch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IamProfileRef {
    pub name: String,
}

impl SubnetRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl SecurityGroupRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

impl SshKeyRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl IamProfileRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

/// Desired or discovered configuration of one compute instance.
///
/// Desired descriptors come from configuration; actual descriptors come
/// from discovery and are never mutated after construction. The provider
/// assigns identity exactly once, and discovery captures it back into the
/// desired descriptor so later passes keyed by the same name agree.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Instance {
    /// Provider-assigned identity; absent before creation.
    pub id: Option<String>,

    /// Stable human name, correlated through the provider name tag.
    pub name: Option<String>,

    /// Resource tags, keyed uniquely.
    pub tags: BTreeMap<String, String>,

    /// Image reference: a pinned identifier or a mutable alias.
    pub image_id: Option<String>,

    /// Instance class.
    pub instance_type: Option<String>,

    /// Opaque startup payload.
    pub user_data: Option<UserData>,

    /// Subnet placement.
    pub subnet: Option<SubnetRef>,

    /// Static private address, when pinned.
    pub private_ip_address: Option<String>,

    /// Whether a public address should be associated at launch.
    pub associate_public_ip: Option<bool>,

    /// Security boundary references, in attachment order.
    pub security_groups: Vec<SecurityGroupRef>,

    /// Credential binding.
    pub ssh_key: Option<SshKeyRef>,

    /// Privilege binding.
    pub iam_instance_profile: Option<IamProfileRef>,
}

impl Instance {
    /// Descriptor with just a stable name set.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Fold the name tag and configured common tags into the desired tag
    /// set, so the delta the driver computes covers tag drift.
    pub fn prepare(&mut self, ctx: &Context) {
        if let Some(name) = &self.name {
            self.tags
                .entry(NAME_TAG.to_string())
                .or_insert_with(|| name.clone());
        }
        ctx.config.merge_common_tags(&mut self.tags);
    }

    /// Stable symbolic reference for generated infrastructure code.
    ///
    /// Same name, same reference — downstream documents can link to the
    /// instance before it exists.
    pub fn codegen_link(&self) -> TaskResult<Literal> {
        let name = self.name.as_deref().ok_or(TaskError::RequiredField("name"))?;
        Ok(Literal::self_link(CODEGEN_KIND, name))
    }

    /// Normalize a provider description into a descriptor.
    fn from_description(desc: &InstanceDescription, warnings: &mut Vec<FindWarning>) -> Self {
        let mut actual = Instance {
            id: Some(desc.instance_id.clone()),
            name: name_tag(&desc.tags),
            tags: tag_map(&desc.tags),
            image_id: desc.image_id.clone(),
            instance_type: desc.instance_type.clone(),
            private_ip_address: desc.private_ip_address.clone(),
            ..Instance::default()
        };

        actual.subnet = desc.subnet_id.clone().map(SubnetRef::new);
        actual.ssh_key = desc.key_name.clone().map(SshKeyRef::new);
        actual.security_groups = desc
            .security_group_ids
            .iter()
            .cloned()
            .map(SecurityGroupRef::new)
            .collect();

        // The provider may allocate differently than requested, so the flag
        // reflects what is actually attached.
        let has_public_ip = desc
            .network_interfaces
            .iter()
            .any(|ni| ni.public_ip.as_deref().is_some_and(|ip| !ip.is_empty()));
        actual.associate_public_ip = Some(has_public_ip);

        if let Some(arn) = &desc.iam_instance_profile_arn {
            let (name, expected_format) = profile_name_from_arn(arn);
            if !expected_format {
                warn!(arn = %arn, "Unexpected instance profile ARN format");
                warnings.push(FindWarning::UnexpectedProfileArn { arn: arn.clone() });
            }
            actual.iam_instance_profile = Some(IamProfileRef { name });
        }

        actual
    }

    /// Names of delta fields an existing instance cannot absorb in place.
    ///
    /// Tags are excluded: tag drift is healed by the per-pass tag assert.
    fn changed_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.image_id.is_some() {
            fields.push("image_id");
        }
        if self.instance_type.is_some() {
            fields.push("instance_type");
        }
        if self.user_data.is_some() {
            fields.push("user_data");
        }
        if self.subnet.is_some() {
            fields.push("subnet");
        }
        if self.private_ip_address.is_some() {
            fields.push("private_ip_address");
        }
        if self.associate_public_ip.is_some() {
            fields.push("associate_public_ip");
        }
        if !self.security_groups.is_empty() {
            fields.push("security_groups");
        }
        if self.ssh_key.is_some() {
            fields.push("ssh_key");
        }
        if self.iam_instance_profile.is_some() {
            fields.push("iam_instance_profile");
        }
        fields
    }

    async fn render_api(
        &mut self,
        target: &ApiTarget,
        actual: Option<&Self>,
        changes: &Self,
    ) -> TaskResult<()> {
        if actual.is_none() {
            let image_ref = self
                .image_id
                .as_deref()
                .ok_or(TaskError::RequiredField("image_id"))?;

            // Encode the payload up front so an oversized payload never
            // reaches the provider at all.
            let encoded_user_data = self
                .user_data
                .as_ref()
                .map(UserData::encode_for_launch)
                .transpose()?;

            let image = target
                .cloud()
                .resolve_image(image_ref)
                .await?
                .ok_or_else(|| TaskError::ImageNotFound(image_ref.to_string()))?;

            let mut request = RunInstancesRequest {
                image_id: image.image_id.clone(),
                instance_type: self.instance_type.clone(),
                min_count: 1,
                max_count: 1,
                user_data: encoded_user_data,
                ..RunInstancesRequest::default()
            };

            if let Some(key) = &self.ssh_key {
                request.key_name = Some(key.name.clone());
            }

            request.network_interfaces = vec![NetworkInterfaceSpec {
                device_index: 0,
                subnet_id: self.subnet.as_ref().map(|subnet| subnet.id.clone()),
                private_ip_address: self.private_ip_address.clone(),
                associate_public_ip: self.associate_public_ip,
                groups: self
                    .security_groups
                    .iter()
                    .map(|group| group.id.clone())
                    .collect(),
            }];

            if let Some(instance_type) = &self.instance_type {
                request.block_device_mappings = ephemeral_devices(instance_type)?;
            }

            if let Some(profile) = &self.iam_instance_profile {
                request.iam_instance_profile = Some(profile.name.clone());
            }

            info!(name = ?self.name, image_id = %image.image_id, "Creating instance");
            let created = target.cloud().run_instances(request).await?;
            let first = created.first().ok_or_else(|| {
                TaskError::from(CloudError::api("run_instances", "no instances returned"))
            })?;

            // Identity is now fixed for this pass and every future pass
            // keyed by this name.
            self.id = Some(first.instance_id.clone());
        } else {
            // Existing instances only ever get their tags re-asserted; any
            // other requested change cannot be realized in place.
            let fields = changes.changed_fields();
            if !fields.is_empty() {
                return Err(TaskError::UnsupportedChange { fields });
            }
        }

        let id = self
            .id
            .clone()
            .or_else(|| actual.and_then(|a| a.id.clone()))
            .ok_or(TaskError::RequiredField("id"))?;

        // Always re-asserted, even when nothing else changed.
        target.ensure_tags(&id, &self.tags).await?;
        Ok(())
    }

    fn render_codegen(&self, target: &mut CodegenTarget) -> TaskResult<()> {
        let name = self.name.as_deref().ok_or(TaskError::RequiredField("name"))?;
        target.record_self_link(CODEGEN_KIND, name);
        Ok(())
    }
}

#[async_trait]
impl Task for Instance {
    async fn find(&mut self, ctx: &Context) -> TaskResult<FindOutcome<Self>> {
        let name = self
            .name
            .clone()
            .ok_or(TaskError::RequiredField("name"))?;

        let mut filters = ctx.config.name_filters(&name);
        filters.push(Filter::non_terminated());

        let matches = ctx.cloud.describe_instances(&filters).await?;

        if matches.is_empty() {
            debug!(name = %name, "No live instance found");
            return Ok(FindOutcome::absent());
        }
        if matches.len() != 1 {
            return Err(TaskError::MultipleMatches {
                name,
                count: matches.len(),
            });
        }

        let desc = &matches[0];
        debug!(name = %name, instance_id = %desc.instance_id, "Found existing instance");

        let mut warnings = Vec::new();
        let mut actual = Instance::from_description(desc, &mut warnings);

        // Startup payload travels on a side channel, base64-encoded.
        if let Some(encoded) = ctx.cloud.describe_user_data(&desc.instance_id).await? {
            let payload =
                UserData::from_base64(&encoded).map_err(|source| TaskError::UserDataDecode {
                    instance_id: desc.instance_id.clone(),
                    source,
                })?;
            actual.user_data = Some(payload);
        }

        // Identity is immutable once assigned; capture it into the desired
        // descriptor so the rest of the pass works against it.
        self.id = actual.id.clone();

        // A mutable alias that resolves to the running image is not drift.
        if let (Some(desired_image), Some(actual_image)) =
            (self.image_id.clone(), actual.image_id.clone())
        {
            if desired_image != actual_image {
                match ctx.cloud.resolve_image(&desired_image).await {
                    Ok(Some(image)) if image.image_id == actual_image => {
                        debug!(
                            alias = %desired_image,
                            image_id = %actual_image,
                            "Image alias matches running image"
                        );
                        actual.image_id = Some(desired_image);
                    }
                    Ok(Some(_)) => {}
                    Ok(None) => {
                        warn!(image = %desired_image, "Unable to resolve image: not found");
                        warnings.push(FindWarning::ImageResolution {
                            image: desired_image,
                            reason: "not found".to_string(),
                        });
                    }
                    Err(err) => {
                        warn!(image = %desired_image, error = %err, "Unable to resolve image");
                        warnings.push(FindWarning::ImageResolution {
                            image: desired_image,
                            reason: err.to_string(),
                        });
                    }
                }
            }
        }

        Ok(FindOutcome {
            actual: Some(actual),
            warnings,
        })
    }

    fn check_changes(actual: Option<&Self>, desired: &Self, _changes: &Self) -> TaskResult<()> {
        if actual.is_some() && desired.name.is_none() {
            return Err(TaskError::RequiredField("name"));
        }
        Ok(())
    }

    async fn render(
        &mut self,
        target: &mut Target,
        actual: Option<&Self>,
        changes: &Self,
    ) -> TaskResult<()> {
        debug!(backend = target.kind(), name = ?self.name, "Rendering instance");
        match target {
            Target::Api(api) => self.render_api(api, actual, changes).await,
            Target::Codegen(codegen) => self.render_codegen(codegen),
        }
    }
}

impl CompareWithId for Instance {
    fn compare_with_id(&self) -> Option<&str> {
        self.id.as_deref()
    }
}

/// Extract the profile name from a structured reference string.
///
/// The trailing `:`-separated segment is expected to look like
/// `instance-profile/<name>`; other shapes still yield the trailing segment
/// but are reported to the caller.
fn profile_name_from_arn(arn: &str) -> (String, bool) {
    let last = arn.rsplit(':').next().unwrap_or(arn);
    let expected_format = last.starts_with("instance-profile/");
    let name = last.strip_prefix("instance-profile/").unwrap_or(last);
    (name.to_string(), expected_format)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_name_from_well_formed_arn() {
        let (name, expected) =
            profile_name_from_arn("arn:aws:iam::123456789012:instance-profile/nodes");
        assert_eq!(name, "nodes");
        assert!(expected);
    }

    #[test]
    fn test_profile_name_from_unexpected_arn() {
        let (name, expected) = profile_name_from_arn("arn:aws:iam::123456789012:role/nodes");
        assert_eq!(name, "role/nodes");
        assert!(!expected);
    }

    #[test]
    fn test_check_changes_requires_name_for_updates() {
        let actual = Instance::named("node-1");
        let desired = Instance::default();
        let err = Instance::check_changes(Some(&actual), &desired, &Instance::default());
        assert!(matches!(err, Err(TaskError::RequiredField("name"))));
    }

    #[test]
    fn test_check_changes_allows_creation_without_actual() {
        let desired = Instance::default();
        assert!(Instance::check_changes(None, &desired, &Instance::default()).is_ok());
    }

    #[test]
    fn test_changed_fields_ignores_identity_and_tags() {
        let mut changes = Instance::named("node-1");
        changes.id = Some("i-1".to_string());
        changes
            .tags
            .insert("env".to_string(), "prod".to_string());
        assert!(changes.changed_fields().is_empty());

        changes.instance_type = Some("m5.xlarge".to_string());
        changes.ssh_key = Some(SshKeyRef::new("ops"));
        assert_eq!(changes.changed_fields(), ["instance_type", "ssh_key"]);
    }

    #[test]
    fn test_codegen_link_is_deterministic() {
        let instance = Instance::named("node-1");
        let first = instance.codegen_link().unwrap();
        let second = instance.codegen_link().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.expression(), "${aws_instance.node-1.id}");
    }

    #[test]
    fn test_codegen_link_requires_name() {
        let instance = Instance::default();
        assert!(matches!(
            instance.codegen_link(),
            Err(TaskError::RequiredField("name"))
        ));
    }

    #[test]
    fn test_public_ip_derived_from_attachments() {
        use stratus_cloud::{InstanceLifecycle, NetworkInterface};

        let mut desc = InstanceDescription::new("i-1", InstanceLifecycle::Running);
        desc.network_interfaces = vec![
            NetworkInterface { public_ip: None },
            NetworkInterface {
                public_ip: Some("198.51.100.7".to_string()),
            },
        ];

        let mut warnings = Vec::new();
        let actual = Instance::from_description(&desc, &mut warnings);
        assert_eq!(actual.associate_public_ip, Some(true));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_empty_public_ip_does_not_count() {
        use stratus_cloud::{InstanceLifecycle, NetworkInterface};

        let mut desc = InstanceDescription::new("i-1", InstanceLifecycle::Running);
        desc.network_interfaces = vec![NetworkInterface {
            public_ip: Some(String::new()),
        }];

        let mut warnings = Vec::new();
        let actual = Instance::from_description(&desc, &mut warnings);
        assert_eq!(actual.associate_public_ip, Some(false));
    }
}
