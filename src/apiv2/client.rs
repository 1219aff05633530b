//! metal-apiserver v2 client implementation.
//!
//! The v2 API speaks the connect protocol. Every call is a JSON `POST` to
//! `/<package>.<Service>/<Method>`; errors come back as `{code, message}`.

use std::time::Duration;

use reqwest::{Client, header};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::trace;

use crate::config::{ApiConfig, Credentials};
use crate::error::{ApiError, ConfigError, Result};

use super::types::{
    Project, ProjectCreateRequest, ProjectListRequest, ProjectUpdateRequest, Tenant,
    TenantCreateRequest, TenantListRequest, TenantUpdateRequest, Token, TokenCreateRequest,
    TokenCreateResponse, TokenUpdateRequest,
};

/// Protobuf package of the v2 services.
const PACKAGE: &str = "metalstack.api.v2";

/// metal-apiserver v2 client.
#[derive(Debug, Clone)]
pub struct ApiV2Client {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Bearer token.
    token: String,
}

/// Connect error body.
#[derive(Debug, Deserialize)]
struct ConnectError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    message: String,
}

impl ApiV2Client {
    /// Creates a new v2 client.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the credentials are not a token, or
    /// an error if the HTTP client cannot be created.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let Credentials::Token(token) = &config.credentials else {
            return Err(ConfigError::MissingSetting {
                name: String::from("api_token"),
                env: String::from("METALCTLV2_API_TOKEN"),
            }
            .into());
        };

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            token: token.clone(),
        })
    }

    /// Calls a unary RPC.
    async fn call<Req, Resp>(&self, service: &str, method: &str, request: &Req) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let url = format!("{}/{PACKAGE}.{service}/{method}", self.base_url);
        trace!("POST {url}");

        let response = self
            .client
            .post(&url)
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .header("Connect-Protocol-Version", "1")
            .json(request)
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(connect_error(status.as_u16(), &body).into());
        }

        let value = response
            .json::<Resp>()
            .await
            .map_err(|e| ApiError::invalid_response(format!("Failed to parse response: {e}")))?;
        Ok(value)
    }

    // ---------------------------------------------------------------------
    // Tenants
    // ---------------------------------------------------------------------

    /// Lists tenants.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_tenants(&self, request: &TenantListRequest) -> Result<Vec<Tenant>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            tenants: Vec<Tenant>,
        }

        let response: Response = self.call("TenantService", "List", request).await?;
        Ok(response.tenants)
    }

    /// Creates a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_tenant(&self, request: &TenantCreateRequest) -> Result<Tenant> {
        self.call_tenant("Create", request).await
    }

    /// Updates a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_tenant(&self, request: &TenantUpdateRequest) -> Result<Tenant> {
        self.call_tenant("Update", request).await
    }

    /// Deletes a tenant.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_tenant(&self, login: &str) -> Result<Tenant> {
        self.call_tenant("Delete", &json!({ "login": login })).await
    }

    async fn call_tenant<Req: Serialize + Sync + ?Sized>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Tenant> {
        #[derive(Deserialize)]
        struct Response {
            tenant: Tenant,
        }

        let response: Response = self.call("TenantService", method, request).await?;
        Ok(response.tenant)
    }

    // ---------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------

    /// Lists projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_projects(&self, request: &ProjectListRequest) -> Result<Vec<Project>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            projects: Vec<Project>,
        }

        let response: Response = self.call("ProjectService", "List", request).await?;
        Ok(response.projects)
    }

    /// Creates a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_project(&self, request: &ProjectCreateRequest) -> Result<Project> {
        self.call_project("Create", request).await
    }

    /// Updates a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_project(&self, request: &ProjectUpdateRequest) -> Result<Project> {
        self.call_project("Update", request).await
    }

    /// Deletes a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_project(&self, uuid: &str) -> Result<Project> {
        self.call_project("Delete", &json!({ "project": uuid })).await
    }

    async fn call_project<Req: Serialize + Sync + ?Sized>(
        &self,
        method: &str,
        request: &Req,
    ) -> Result<Project> {
        #[derive(Deserialize)]
        struct Response {
            project: Project,
        }

        let response: Response = self.call("ProjectService", method, request).await?;
        Ok(response.project)
    }

    // ---------------------------------------------------------------------
    // Tokens
    // ---------------------------------------------------------------------

    /// Lists the tokens of the calling user.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_tokens(&self) -> Result<Vec<Token>> {
        #[derive(Deserialize)]
        struct Response {
            #[serde(default)]
            tokens: Vec<Token>,
        }

        let response: Response = self.call("TokenService", "List", &json!({})).await?;
        Ok(response.tokens)
    }

    /// Creates a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_token(&self, request: &TokenCreateRequest) -> Result<TokenCreateResponse> {
        self.call("TokenService", "Create", request).await
    }

    /// Updates a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_token(&self, request: &TokenUpdateRequest) -> Result<Token> {
        #[derive(Deserialize)]
        struct Response {
            token: Token,
        }

        let response: Response = self.call("TokenService", "Update", request).await?;
        Ok(response.token)
    }

    /// Revokes a token.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn revoke_token(&self, uuid: &str) -> Result<()> {
        let _: serde_json::Value = self
            .call("TokenService", "Revoke", &json!({ "uuid": uuid }))
            .await?;
        Ok(())
    }
}

/// Maps a connect error body to a typed error.
fn connect_error(status: u16, body: &str) -> ApiError {
    let parsed = serde_json::from_str::<ConnectError>(body).ok();
    let (code, message) = parsed.map_or_else(
        || (String::new(), body.trim().to_string()),
        |e| (e.code, e.message),
    );

    match (status, code.as_str()) {
        (_, "aborted") | (409, _) => ApiError::Conflict { message },
        (_, "unauthenticated" | "permission_denied") | (401 | 403, _) => {
            ApiError::AuthenticationFailed { status, message }
        }
        _ if code.is_empty() => ApiError::api_error(status, message),
        _ => ApiError::api_error(status, format!("{code}: {message}")),
    }
}
