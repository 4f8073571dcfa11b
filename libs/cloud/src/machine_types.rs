//! Instance class capability table.
//!
//! Launch requests must map an instance class's ephemeral local storage to
//! block devices up front; the provider does not attach them implicitly.
//! The table below covers the classes this tool provisions.

use crate::error::CloudError;
use crate::provider::BlockDeviceMapping;

/// Known capabilities of one instance class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MachineTypeInfo {
    /// Class name, e.g. `m5.large`.
    pub name: &'static str,

    /// Number of ephemeral local-storage disks.
    pub ephemeral_disks: usize,
}

const MACHINE_TYPES: &[MachineTypeInfo] = &[
    MachineTypeInfo { name: "t3.micro", ephemeral_disks: 0 },
    MachineTypeInfo { name: "t3.small", ephemeral_disks: 0 },
    MachineTypeInfo { name: "t3.medium", ephemeral_disks: 0 },
    MachineTypeInfo { name: "m3.medium", ephemeral_disks: 1 },
    MachineTypeInfo { name: "m3.large", ephemeral_disks: 1 },
    MachineTypeInfo { name: "m3.xlarge", ephemeral_disks: 2 },
    MachineTypeInfo { name: "m3.2xlarge", ephemeral_disks: 2 },
    MachineTypeInfo { name: "m4.large", ephemeral_disks: 0 },
    MachineTypeInfo { name: "m4.xlarge", ephemeral_disks: 0 },
    MachineTypeInfo { name: "m5.large", ephemeral_disks: 0 },
    MachineTypeInfo { name: "m5.xlarge", ephemeral_disks: 0 },
    MachineTypeInfo { name: "m5.2xlarge", ephemeral_disks: 0 },
    MachineTypeInfo { name: "c3.large", ephemeral_disks: 2 },
    MachineTypeInfo { name: "c3.xlarge", ephemeral_disks: 2 },
    MachineTypeInfo { name: "c4.large", ephemeral_disks: 0 },
    MachineTypeInfo { name: "c5.large", ephemeral_disks: 0 },
    MachineTypeInfo { name: "c5.xlarge", ephemeral_disks: 0 },
    MachineTypeInfo { name: "i3.large", ephemeral_disks: 1 },
    MachineTypeInfo { name: "i3.xlarge", ephemeral_disks: 1 },
    MachineTypeInfo { name: "d2.xlarge", ephemeral_disks: 3 },
    MachineTypeInfo { name: "d2.2xlarge", ephemeral_disks: 6 },
    MachineTypeInfo { name: "r4.large", ephemeral_disks: 0 },
];

/// Look up a machine type by class name.
pub fn machine_type_info(instance_type: &str) -> Option<&'static MachineTypeInfo> {
    MACHINE_TYPES.iter().find(|mt| mt.name == instance_type)
}

/// Block device mappings for an instance class's ephemeral disks.
///
/// Devices are named `/dev/sdc` onward with `ephemeral<N>` virtual names.
pub fn ephemeral_devices(instance_type: &str) -> Result<Vec<BlockDeviceMapping>, CloudError> {
    let info = machine_type_info(instance_type)
        .ok_or_else(|| CloudError::UnknownInstanceType(instance_type.to_string()))?;

    let mappings = (0..info.ephemeral_disks)
        .map(|i| BlockDeviceMapping {
            device_name: format!("/dev/sd{}", (b'c' + i as u8) as char),
            virtual_name: Some(format!("ephemeral{i}")),
        })
        .collect();

    Ok(mappings)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("t3.micro", 0)]
    #[case("m5.large", 0)]
    #[case("m3.xlarge", 2)]
    #[case("i3.large", 1)]
    #[case("d2.xlarge", 3)]
    fn test_ephemeral_disk_counts(#[case] instance_type: &str, #[case] expected: usize) {
        let devices = ephemeral_devices(instance_type).unwrap();
        assert_eq!(devices.len(), expected);
    }

    #[test]
    fn test_device_naming() {
        let devices = ephemeral_devices("m3.xlarge").unwrap();
        assert_eq!(devices[0].device_name, "/dev/sdc");
        assert_eq!(devices[0].virtual_name.as_deref(), Some("ephemeral0"));
        assert_eq!(devices[1].device_name, "/dev/sdd");
        assert_eq!(devices[1].virtual_name.as_deref(), Some("ephemeral1"));
    }

    #[test]
    fn test_unknown_instance_type() {
        let err = ephemeral_devices("z9.mega").unwrap_err();
        assert!(matches!(err, CloudError::UnknownInstanceType(t) if t == "z9.mega"));
    }
}
