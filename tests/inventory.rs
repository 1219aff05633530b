//! Dynamic inventory and lookup against a mocked metal-api.

use metal_ansible_modules::config::{ApiConfig, Credentials, InventoryConfig};
use metal_ansible_modules::inventory;
use metal_ansible_modules::lookup::{self, EntityKind, RequestKind};
use metal_ansible_modules::metal::MetalClient;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWN: &str = "ci.metal-stack.io/manager=ansible";

fn client(server: &MockServer) -> MetalClient {
    MetalClient::new(&ApiConfig {
        url: server.uri(),
        credentials: Credentials::Token(String::from("test-token")),
        timeout_secs: 5,
    })
    .unwrap()
}

#[tokio::test]
async fn inventory_lists_managed_machines_in_scope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/machine/find"))
        .and(body_json(json!({ "partition_id": "fra-equ01" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "id": "m-1",
                "partition": { "id": "fra-equ01" },
                "size": { "id": "c1-xlarge-x86" },
                "rackid": "rack-1",
                "tags": [OWN],
                "allocation": {
                    "name": "web",
                    "hostname": "web-1",
                    "project": "p1",
                    "succeeded": true,
                    "image": { "id": "ubuntu-24.04", "features": ["machine"] },
                    "networks": [
                        { "networkid": "internet", "ips": ["212.34.89.10"] },
                        { "networkid": "tenant-net", "ips": ["10.0.0.5"], "private": true }
                    ]
                }
            },
            {
                "id": "m-2",
                "tags": [],
                "allocation": { "name": "foreign", "hostname": "foreign-1" }
            }
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/project"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "meta": { "id": "p1" }, "name": "web", "tenant_id": "acme" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let config = InventoryConfig::parse_yaml(
        "scope_filters:\n  - name: partition_id\n    value: fra-equ01\n",
    )
    .unwrap();
    let inventory = inventory::fetch(&client(&server), &config).await.unwrap();

    assert_eq!(inventory.hostvars.len(), 1);
    let vars = &inventory.hostvars["web-1"];
    assert_eq!(vars.ansible_host, "212.34.89.10");
    assert_eq!(vars.metal_internal_ip.as_deref(), Some("10.0.0.5"));
    assert_eq!(vars.metal_tenant.as_deref(), Some("acme"));
    assert!(vars.metal_is_machine);

    for group in ["metal", "p1", "c1-xlarge-x86", "fra-equ01", "ubuntu-24.04", "rack-1"] {
        assert_eq!(inventory.groups[group], vec![String::from("web-1")], "group {group}");
    }

    let rendered = inventory.render().unwrap();
    assert!(rendered.starts_with("{\n    \"_meta\": {\n        \"hostvars\""));
}

#[tokio::test]
async fn lookup_search_posts_query_to_find_endpoint() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ip/find"))
        .and(body_json(json!({ "projectid": "p1" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "ipaddress": "212.34.89.212", "projectid": "p1" }
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let query = lookup::parse_query(&["_projectid=p1"]).unwrap();
    let result = lookup::lookup(&client(&server), RequestKind::Search, EntityKind::Ip, &query)
        .await
        .unwrap();

    assert_eq!(
        result,
        json!([[{ "ipaddress": "212.34.89.212", "projectid": "p1" }]])
    );
}

#[tokio::test]
async fn lookup_get_surfaces_missing_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/size/unknown"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "size not found" })))
        .mount(&server)
        .await;

    let query = lookup::parse_query(&["id=unknown"]).unwrap();
    let err = lookup::lookup(&client(&server), RequestKind::Get, EntityKind::Size, &query)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "RemoteServiceError");
    assert_eq!(err.context()["status"], 404);
}
