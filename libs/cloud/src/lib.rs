//! # stratus-cloud
//!
//! Cloud provider capability layer for the stratus convergence engine.
//!
//! This crate owns everything that faces the provider SDK:
//!
//! - Wire types for list queries, launch requests, and tags
//! - The [`CloudApi`] trait the convergence tasks consume
//! - A [`MockCloud`] implementation for tests and development
//! - The live [`ApiTarget`] execution backend plumbing
//! - Environment-driven [`CloudConfig`] (region, common tag set)
//!
//! All provider calls are blocking round-trips with the SDK's own
//! retry/timeout policy; this layer adds no retry of its own and treats
//! every call as at-most-once with a synchronous error return.

mod config;
mod error;
pub mod machine_types;
mod mock;
mod provider;
pub mod tags;
mod target;

pub use config::CloudConfig;
pub use error::CloudError;
pub use machine_types::{ephemeral_devices, machine_type_info, MachineTypeInfo};
pub use mock::MockCloud;
pub use provider::{
    BlockDeviceMapping, CloudApi, Filter, Image, InstanceDescription, InstanceLifecycle,
    NetworkInterface, NetworkInterfaceSpec, RunInstancesRequest, Tag,
};
pub use target::ApiTarget;
