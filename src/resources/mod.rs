//! Resource modules.
//!
//! One adapter per remote entity type. Each module parses its parameters,
//! builds the API client from the resolved connection settings and hands the
//! adapter to the generic [`Reconciler`].

pub mod api_token;
pub mod firewall;
pub mod ip;
pub mod machine;
pub mod network;
pub mod project;
pub mod project_v2;
pub mod tenant;

use std::fmt;

use crate::apiv2::ApiV2Client;
use crate::config::ModuleArgs;
use crate::error::Result;
use crate::metal::MetalClient;
use crate::reconciler::{Outcome, Reconciler, Resource, TargetState};

pub use api_token::{ApiTokenParams, ApiTokenResource};
pub use firewall::{FirewallParams, FirewallResource};
pub use ip::{IpParams, IpResource};
pub use machine::{MachineParams, MachineResource};
pub use network::{NetworkParams, NetworkResource};
pub use project::{ProjectParams, ProjectResource};
pub use project_v2::{ProjectV2Params, ProjectV2Resource};
pub use tenant::{TenantParams, TenantResource};

/// The available resource modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleKind {
    /// Child networks.
    Network,
    /// IP addresses.
    Ip,
    /// Machine allocations.
    Machine,
    /// Firewall allocations.
    Firewall,
    /// Projects (v1 API).
    Project,
    /// Tenants (v2 API).
    Tenant,
    /// Projects (v2 API).
    ProjectV2,
    /// API tokens (v2 API).
    ApiToken,
}

impl ModuleKind {
    /// All modules.
    pub const ALL: [Self; 8] = [
        Self::Network,
        Self::Ip,
        Self::Machine,
        Self::Firewall,
        Self::Project,
        Self::Tenant,
        Self::ProjectV2,
        Self::ApiToken,
    ];

    /// Ansible module name, also accepted as program name.
    #[must_use]
    pub const fn module_name(self) -> &'static str {
        match self {
            Self::Network => "metal_network",
            Self::Ip => "metal_ip",
            Self::Machine => "metal_machine",
            Self::Firewall => "metal_firewall",
            Self::Project => "metal_project",
            Self::Tenant => "metal_v2_tenant",
            Self::ProjectV2 => "metal_v2_project",
            Self::ApiToken => "metal_v2_api_token",
        }
    }

    /// Resolves a module from the name the binary was invoked as.
    #[must_use]
    pub fn from_program_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.module_name() == name)
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.module_name())
    }
}

/// Runs a resource module with parsed arguments.
///
/// # Errors
///
/// Returns configuration errors before any remote call, then any
/// reconciliation error.
pub async fn run_module(kind: ModuleKind, args: &ModuleArgs) -> Result<Outcome> {
    let check_mode = args.check_mode();

    match kind {
        ModuleKind::Network => {
            let params: NetworkParams = args.params()?;
            let client = MetalClient::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&NetworkResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::Ip => {
            let params: IpParams = args.params()?;
            let client = MetalClient::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&IpResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::Machine => {
            let params: MachineParams = args.params()?;
            let client = MetalClient::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&MachineResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::Firewall => {
            let params: FirewallParams = args.params()?;
            let client = MetalClient::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&FirewallResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::Project => {
            let params: ProjectParams = args.params()?;
            let client = MetalClient::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&ProjectResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::Tenant => {
            let params: TenantParams = args.params()?;
            let client = ApiV2Client::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&TenantResource::new(&client, params), state, check_mode).await
        }
        ModuleKind::ProjectV2 => {
            let params: ProjectV2Params = args.params()?;
            let client = ApiV2Client::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&ProjectV2Resource::new(&client, params), state, check_mode).await
        }
        ModuleKind::ApiToken => {
            let params: ApiTokenParams = args.params()?;
            let client = ApiV2Client::new(&params.api.resolve()?)?;
            let state = params.state;
            reconcile(&ApiTokenResource::new(&client, params), state, check_mode).await
        }
    }
}

async fn reconcile<R: Resource>(
    resource: &R,
    state: TargetState,
    check_mode: bool,
) -> Result<Outcome> {
    Reconciler::new(resource)
        .with_check_mode(check_mode)
        .reconcile(state)
        .await
}

#[cfg(test)]
pub(crate) mod test_support {
    use wiremock::MockServer;

    use crate::apiv2::ApiV2Client;
    use crate::config::{ApiConfig, Credentials};
    use crate::metal::MetalClient;

    pub const OWN: &str = "ci.metal-stack.io/manager=ansible";

    pub fn config(server: &MockServer) -> ApiConfig {
        ApiConfig {
            url: server.uri(),
            credentials: Credentials::Token(String::from("test-token")),
            timeout_secs: 5,
        }
    }

    pub fn metal_client(server: &MockServer) -> MetalClient {
        MetalClient::new(&config(server)).unwrap()
    }

    pub fn v2_client(server: &MockServer) -> ApiV2Client {
        ApiV2Client::new(&config(server)).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_program_name_dispatch() {
        assert_eq!(
            ModuleKind::from_program_name("metal_v2_api_token"),
            Some(ModuleKind::ApiToken)
        );
        assert_eq!(ModuleKind::from_program_name("metal_ip"), Some(ModuleKind::Ip));
        assert_eq!(ModuleKind::from_program_name("metal-ansible"), None);
    }

    #[tokio::test]
    async fn test_missing_credentials_fail_before_reconciling() {
        let args = ModuleArgs::parse(
            r#"{"ANSIBLE_MODULE_ARGS": {"name": "t", "api_url": "http://127.0.0.1:1"}}"#,
        )
        .unwrap();

        // No token in the parameters; the environment of the test runner
        // must not provide one either.
        if std::env::var("METALCTLV2_API_TOKEN").is_ok() {
            return;
        }
        let err = run_module(ModuleKind::Tenant, &args).await.unwrap_err();
        assert_eq!(err.kind(), "ConfigurationError");
    }
}
