use consul_io_core::{ConsulClient, ConsulError, StatusCode};
use serde_json::json;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn verify_sends_token_to_agent_self() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/agent/self"))
        .and(header("x-consul-token", "secret-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Config": { "Datacenter": "dc1", "NodeName": "node-a" }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), Some("secret-token".into())).unwrap();
    let info = client.verify().await.unwrap();

    assert_eq!(info.config.datacenter.as_deref(), Some("dc1"));
    assert_eq!(info.config.node_name.as_deref(), Some("node-a"));
}

#[tokio::test]
async fn verify_reports_rejected_token() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/agent/self"))
        .respond_with(ResponseTemplate::new(403).set_body_string("ACL not found"))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), Some("bad".into())).unwrap();
    let err = client.verify().await.unwrap_err();

    match err {
        ConsulError::Api { status, body } => {
            assert_eq!(status, StatusCode::FORBIDDEN);
            assert_eq!(body, "ACL not found");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn get_decodes_base64_value() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/app/settings.yml"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {
                "Key": "app/settings.yml",
                "Value": "aGVsbG8=",
                "Flags": 0,
                "CreateIndex": 10,
                "ModifyIndex": 12,
                "LockIndex": 0
            }
        ])))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    let value = client.get("app/settings.yml").await.unwrap();

    assert_eq!(value.as_deref(), Some(&b"hello"[..]));
}

#[tokio::test]
async fn get_missing_key_returns_none() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/missing.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    assert_eq!(client.get("missing.txt").await.unwrap(), None);
}

#[tokio::test]
async fn get_server_error_keeps_status_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/a.txt"))
        .respond_with(ResponseTemplate::new(500).set_body_string("rpc error"))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    let err = client.get("a.txt").await.unwrap_err();

    assert!(matches!(
        err,
        ConsulError::Api { status, ref body } if status == StatusCode::INTERNAL_SERVER_ERROR && body == "rpc error"
    ));
}

#[tokio::test]
async fn put_sends_raw_body() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/kv/b/c.txt"))
        .and(body_bytes(b"payload"))
        .respond_with(ResponseTemplate::new(200).set_body_string("true"))
        .expect(1)
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    client.put("b/c.txt", b"payload").await.unwrap();
}

#[tokio::test]
async fn put_false_response_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/v1/kv/locked"))
        .respond_with(ResponseTemplate::new(200).set_body_string("false"))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    let err = client.put("locked", b"x").await.unwrap_err();

    assert!(matches!(err, ConsulError::Rejected(key) if key == "locked"));
}

#[tokio::test]
async fn list_recurses_and_marks_folders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/"))
        .and(query_param("recurse", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "Key": "app/", "Value": null, "ModifyIndex": 1 },
            { "Key": "app/a.txt", "Value": "WA==", "ModifyIndex": 2 }
        ])))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    let pairs = client.list("").await.unwrap();

    assert_eq!(pairs.len(), 2);
    assert!(pairs[0].is_dir());
    assert!(!pairs[1].is_dir());
    assert_eq!(pairs[1].value, b"X");
    assert_eq!(pairs[1].modify_index, 2);
}

#[tokio::test]
async fn list_of_empty_store_is_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let client = ConsulClient::new(&server.uri(), None).unwrap();
    assert!(client.list("").await.unwrap().is_empty());
}
