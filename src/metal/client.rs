//! metal-api v1 client implementation.
//!
//! This module provides the HTTP client for the metal-api REST interface.
//! Requests are never retried; every failure is returned to the caller.

use std::borrow::Cow;
use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, Method, Response, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, trace};

use crate::config::{ApiConfig, Credentials};
use crate::error::{ApiError, Result};

use super::auth::{DATE_HEADER, auth_headers};
use super::types::{
    Ip, IpAllocateRequest, IpFindRequest, IpUpdateRequest, Machine, MachineAllocateRequest,
    MachineFindRequest, MachineUpdateRequest, Network, NetworkAllocateRequest, NetworkFindRequest,
    NetworkUpdateRequest, Project, ProjectCreateRequest, ProjectFindRequest, ProjectUpdateRequest,
};

/// metal-api client.
#[derive(Debug, Clone)]
pub struct MetalClient {
    /// HTTP client.
    client: Client,
    /// Base URL without trailing slash.
    base_url: String,
    /// Credentials.
    credentials: Credentials,
}

impl MetalClient {
    /// Creates a new metal-api client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be created.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ApiError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.url.clone(),
            credentials: config.credentials.clone(),
        })
    }

    /// Sends a single request with authentication headers.
    async fn send<B: Serialize + Sync + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<Response> {
        let url = format!("{}{path}", self.base_url);
        trace!("{method} {url}");

        let (authorization, date) = auth_headers(&self.credentials, method.as_str(), Utc::now())?;

        let mut request = self
            .client
            .request(method, &url)
            .header(header::AUTHORIZATION, authorization);
        if let Some(date) = date {
            request = request.header(DATE_HEADER, date);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| ApiError::network(format!("Request failed: {e}")))?;
        Ok(response)
    }

    /// Executes a request and decodes the JSON response.
    async fn execute<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + Sync + ?Sized,
    {
        let response = check_status(self.send(method, path, body).await?).await?;
        decode(response).await
    }

    /// Executes a GET and maps 404 to `None`.
    async fn get_optional<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let response = self.send::<()>(Method::GET, path, None).await?;
        if response.status() == StatusCode::NOT_FOUND {
            debug!("GET {path} returned 404");
            return Ok(None);
        }
        let response = check_status(response).await?;
        decode(response).await.map(Some)
    }

    /// GETs a path and returns the raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn get_json(&self, path: &str) -> Result<Value> {
        self.execute::<Value, ()>(Method::GET, path, None).await
    }

    /// POSTs a JSON body and returns the raw JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn post_json(&self, path: &str, body: &Value) -> Result<Value> {
        self.execute(Method::POST, path, Some(body)).await
    }

    // ---------------------------------------------------------------------
    // Networks
    // ---------------------------------------------------------------------

    /// Gets a network by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_network(&self, id: &str) -> Result<Option<Network>> {
        self.get_optional(&format!("/v1/network/{}", path_segment(id))).await
    }

    /// Searches networks.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_networks(&self, query: &NetworkFindRequest) -> Result<Vec<Network>> {
        self.execute(Method::POST, "/v1/network/find", Some(query))
            .await
    }

    /// Allocates a child network.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn allocate_network(&self, request: &NetworkAllocateRequest) -> Result<Network> {
        self.execute(Method::POST, "/v1/network/allocate", Some(request))
            .await
    }

    /// Updates a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_network(&self, request: &NetworkUpdateRequest) -> Result<Network> {
        self.execute(Method::POST, "/v1/network", Some(request)).await
    }

    /// Frees a network.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn free_network(&self, id: &str) -> Result<Network> {
        let path = format!("/v1/network/free/{}", path_segment(id));
        self.execute::<_, ()>(Method::DELETE, &path, None).await
    }

    // ---------------------------------------------------------------------
    // IPs
    // ---------------------------------------------------------------------

    /// Gets an IP by address.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_ip(&self, ip: &str) -> Result<Option<Ip>> {
        self.get_optional(&format!("/v1/ip/{}", path_segment(ip))).await
    }

    /// Searches IPs.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_ips(&self, query: &IpFindRequest) -> Result<Vec<Ip>> {
        self.execute(Method::POST, "/v1/ip/find", Some(query)).await
    }

    /// Allocates an IP, a specific address if `ip` is given.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn allocate_ip(&self, request: &IpAllocateRequest, ip: Option<&str>) -> Result<Ip> {
        let path = ip.map_or_else(
            || String::from("/v1/ip/allocate"),
            |ip| format!("/v1/ip/allocate/{}", path_segment(ip)),
        );
        self.execute(Method::POST, &path, Some(request)).await
    }

    /// Updates an IP.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_ip(&self, request: &IpUpdateRequest) -> Result<Ip> {
        self.execute(Method::POST, "/v1/ip", Some(request)).await
    }

    /// Frees an IP.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn free_ip(&self, ip: &str) -> Result<Ip> {
        self.execute::<_, ()>(Method::DELETE, &format!("/v1/ip/free/{}", path_segment(ip)), None)
            .await
    }

    // ---------------------------------------------------------------------
    // Machines and firewalls
    // ---------------------------------------------------------------------

    /// Gets a machine by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_machine(&self, id: &str) -> Result<Option<Machine>> {
        self.get_optional(&format!("/v1/machine/{}", path_segment(id))).await
    }

    /// Searches machines with an arbitrary search body.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_machines<Q: Serialize + Sync + ?Sized>(
        &self,
        query: &Q,
    ) -> Result<Vec<Machine>> {
        self.execute(Method::POST, "/v1/machine/find", Some(query))
            .await
    }

    /// Allocates a machine.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn allocate_machine(&self, request: &MachineAllocateRequest) -> Result<Machine> {
        self.execute(Method::POST, "/v1/machine/allocate", Some(request))
            .await
    }

    /// Updates description and tags of a machine or firewall.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_machine(&self, request: &MachineUpdateRequest) -> Result<Machine> {
        self.execute(Method::POST, "/v1/machine", Some(request)).await
    }

    /// Frees a machine or firewall.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn free_machine(&self, id: &str) -> Result<Machine> {
        let path = format!("/v1/machine/{}/free", path_segment(id));
        self.execute::<_, ()>(Method::DELETE, &path, None).await
    }

    /// Gets a firewall by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_firewall(&self, id: &str) -> Result<Option<Machine>> {
        self.get_optional(&format!("/v1/firewall/{}", path_segment(id))).await
    }

    /// Searches firewalls.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_firewalls(&self, query: &MachineFindRequest) -> Result<Vec<Machine>> {
        self.execute(Method::POST, "/v1/firewall/find", Some(query))
            .await
    }

    /// Allocates a firewall.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn allocate_firewall(&self, request: &MachineAllocateRequest) -> Result<Machine> {
        self.execute(Method::POST, "/v1/firewall/allocate", Some(request))
            .await
    }

    // ---------------------------------------------------------------------
    // Projects
    // ---------------------------------------------------------------------

    /// Gets a project by id.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_project(&self, id: &str) -> Result<Option<Project>> {
        self.get_optional(&format!("/v1/project/{}", path_segment(id))).await
    }

    /// Lists all projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        self.execute::<_, ()>(Method::GET, "/v1/project", None).await
    }

    /// Searches projects.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn find_projects(&self, query: &ProjectFindRequest) -> Result<Vec<Project>> {
        self.execute(Method::POST, "/v1/project/find", Some(query))
            .await
    }

    /// Creates a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn create_project(&self, request: &ProjectCreateRequest) -> Result<Project> {
        self.execute(Method::PUT, "/v1/project", Some(request)).await
    }

    /// Updates a project. A stale `meta.version` yields a conflict.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn update_project(&self, request: &ProjectUpdateRequest) -> Result<Project> {
        self.execute(Method::POST, "/v1/project", Some(request)).await
    }

    /// Deletes a project.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails.
    pub async fn delete_project(&self, id: &str) -> Result<Project> {
        self.execute::<_, ()>(Method::DELETE, &format!("/v1/project/{}", path_segment(id)), None)
            .await
    }
}

/// Percent-encodes an identifier for use as a single URL path segment.
#[must_use]
pub fn path_segment(value: &str) -> Cow<'_, str> {
    urlencoding::encode(value)
}

/// Maps non-success responses to typed errors.
async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = error_message(&body);

    let err = match status.as_u16() {
        401 | 403 => ApiError::AuthenticationFailed {
            status: status.as_u16(),
            message,
        },
        409 => ApiError::Conflict { message },
        code => ApiError::api_error(code, message),
    };
    Err(err.into())
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let value = response
        .json::<T>()
        .await
        .map_err(|e| ApiError::invalid_response(format!("Failed to parse response: {e}")))?;
    Ok(value)
}

/// Extracts `message` from a metal-api error body, falling back to the raw text.
fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}
