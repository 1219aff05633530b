//! metal-apiserver v2 integration module.
//!
//! Connect/JSON client for tenants, projects and API tokens.

mod client;
mod types;

pub use client::ApiV2Client;
pub use types::{
    Labels, Meta, MethodPermission, OPTIMISTIC_LOCKING, Project, ProjectCreateRequest,
    ProjectListRequest, ProjectUpdateRequest, TOKEN_TYPE_API, Tenant, TenantCreateRequest,
    TenantListRequest, TenantUpdateRequest, Token, TokenCreateRequest, TokenCreateResponse,
    TokenUpdateRequest, UpdateLabels, UpdateMeta,
};
