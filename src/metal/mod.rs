//! metal-api v1 integration module.
//!
//! This module provides the REST client for networks, IPs, machines,
//! firewalls and projects, plus the request authentication it needs.

mod auth;
mod client;
mod types;

pub use auth::{DATE_HEADER, auth_headers};
pub use client::{MetalClient, path_segment};
pub use types::{
    Image, Ip, IpAllocateRequest, IpFindRequest, IpType, IpUpdateRequest, Machine,
    MachineAllocateRequest, MachineAllocation, MachineAllocationNetwork, MachineEvent,
    MachineEvents, MachineFindRequest, MachineNetwork, MachineUpdateRequest, Meta, Network,
    NetworkAllocateRequest, NetworkFindRequest, NetworkUpdateRequest, Project,
    ProjectCreateRequest, ProjectFindRequest, ProjectUpdateRequest, Reference,
};
