//! End-to-end module runs against a mocked metal-stack API.

use metal_ansible_modules::config::ModuleArgs;
use metal_ansible_modules::resources::{ModuleKind, run_module};
use serde_json::{Value, json};
use wiremock::matchers::{body_json, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const OWN_KEY: &str = "ci.metal-stack.io/manager";
const OWN: &str = "ci.metal-stack.io/manager=ansible";

fn args(server: &MockServer, params: Value) -> ModuleArgs {
    let mut params = params;
    params["api_url"] = json!(server.uri());
    if params.get("api_hmac").is_none() {
        params["api_token"] = json!("test-token");
    }
    ModuleArgs::from_value(json!({ "ANSIBLE_MODULE_ARGS": params })).unwrap()
}

#[tokio::test]
async fn network_is_allocated_with_ownership_label() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/network/find"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/network/allocate"))
        .and(body_json(json!({
            "name": "test2",
            "partitionid": "fra-equ01",
            "projectid": "a-uuid",
            "labels": { OWN_KEY: "ansible" }
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": "a-uuid",
            "name": "test2",
            "partitionid": "fra-equ01",
            "projectid": "a-uuid",
            "prefixes": ["10.0.0.0/22"],
            "labels": { OWN_KEY: "ansible" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let args = args(
        &server,
        json!({ "name": "test2", "partition": "fra-equ01", "project": "a-uuid" }),
    );
    let outcome = run_module(ModuleKind::Network, &args).await.unwrap();

    assert_eq!(
        outcome.to_json(),
        json!({ "changed": true, "id": "a-uuid", "prefixes": ["10.0.0.0/22"] })
    );
}

#[tokio::test]
async fn tagged_ip_is_freed() {
    let server = MockServer::start().await;
    let record = json!({
        "ipaddress": "212.34.89.212",
        "name": "web",
        "networkid": "internet",
        "projectid": "p1",
        "type": "static",
        "tags": [OWN]
    });
    Mock::given(method("GET"))
        .and(path("/v1/ip/212.34.89.212"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record.clone()))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/v1/ip/free/212.34.89.212"))
        .respond_with(ResponseTemplate::new(200).set_body_json(record))
        .expect(1)
        .mount(&server)
        .await;

    let args = args(&server, json!({ "ip": "212.34.89.212", "state": "absent" }));
    let outcome = run_module(ModuleKind::Ip, &args).await.unwrap();

    assert_eq!(
        outcome.to_json(),
        json!({ "changed": true, "ip": "212.34.89.212" })
    );
}

#[tokio::test]
async fn missing_ip_is_not_freed() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/ip/212.34.89.212"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "message": "not found" })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let args = args(&server, json!({ "ip": "212.34.89.212", "state": "absent" }));
    let outcome = run_module(ModuleKind::Ip, &args).await.unwrap();

    assert_eq!(outcome.to_json(), json!({ "changed": false }));
}

#[tokio::test]
async fn check_mode_never_frees() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/network/n1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "n1",
            "prefixes": ["10.0.0.0/22"],
            "labels": { OWN_KEY: "ansible" }
        })))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let mut params = json!({ "id": "n1", "state": "absent", "_ansible_check_mode": true });
    params["api_url"] = json!(server.uri());
    params["api_token"] = json!("test-token");
    let args = ModuleArgs::from_value(json!({ "ANSIBLE_MODULE_ARGS": params })).unwrap();
    assert!(args.check_mode());

    let outcome = run_module(ModuleKind::Network, &args).await.unwrap();
    assert!(outcome.changed);
    assert_eq!(outcome.get("id"), Some(&json!("n1")));
}

#[tokio::test]
async fn hmac_requests_carry_date_header() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/ip/find"))
        .and(header_exists("x-date"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "ipaddress": "10.0.0.5",
            "name": "db",
            "networkid": "n1",
            "projectid": "p1",
            "type": "ephemeral",
            "tags": [OWN]
        }])))
        .expect(1)
        .mount(&server)
        .await;

    let args = args(
        &server,
        json!({ "name": "db", "project": "p1", "network": "n1", "api_hmac": "secret" }),
    );
    let outcome = run_module(ModuleKind::Ip, &args).await.unwrap();

    assert_eq!(outcome.to_json(), json!({ "changed": false, "ip": "10.0.0.5" }));

    let requests = server.received_requests().await.unwrap();
    let authorization = requests[0].headers.get("authorization").unwrap();
    assert!(authorization.to_str().unwrap().starts_with("Metal-Edit "));
}

#[tokio::test]
async fn remote_failure_is_reported_with_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/network/find"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "message": "database unavailable" })),
        )
        .mount(&server)
        .await;

    let args = args(
        &server,
        json!({ "name": "test2", "partition": "fra-equ01", "project": "a-uuid" }),
    );
    let err = run_module(ModuleKind::Network, &args).await.unwrap_err();

    assert_eq!(err.kind(), "RemoteServiceError");
    assert_eq!(err.context()["status"], 500);
    assert!(err.to_string().contains("database unavailable"));
}

#[tokio::test]
async fn v2_project_is_unchanged_on_second_run() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/metalstack.api.v2.ProjectService/List"))
        .and(header("connect-protocol-version", "1"))
        .and(body_json(json!({ "name": "backend", "tenant": "acme" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "projects": [{
                "uuid": "p-1",
                "name": "backend",
                "tenant": "acme",
                "description": "backend services",
                "meta": { "labels": { "labels": { OWN_KEY: "ansible" } } }
            }]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/metalstack.api.v2.ProjectService/Update"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let args = args(
        &server,
        json!({ "name": "backend", "tenant": "acme", "description": "backend services" }),
    );
    let outcome = run_module(ModuleKind::ProjectV2, &args).await.unwrap();

    assert!(!outcome.changed);
    assert_eq!(outcome.get("id"), Some(&json!("p-1")));
    assert_eq!(outcome.get("project").unwrap()["tenant"], "acme");
}

#[tokio::test]
async fn invalid_arguments_issue_no_requests() {
    let server = MockServer::start().await;

    let args = args(&server, json!({ "name": "test2", "project": "a-uuid" }));
    let err = run_module(ModuleKind::Network, &args).await.unwrap_err();

    assert_eq!(err.kind(), "InvalidArguments");
    assert!(server.received_requests().await.unwrap().is_empty());
}
