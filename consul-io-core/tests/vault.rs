use consul_io_core::{AuthMethod, KvVersion, VaultClient, VaultError};
use serde_json::json;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn login_stores_client_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/ldap/login/alice"))
        .and(body_json(json!({ "password": "hunter2" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "auth": { "client_token": "s.issued", "policies": ["default"] }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/auth/token/lookup-self"))
        .and(header("x-vault-token", "s.issued"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "display_name": "ldap-alice", "policies": ["default"] }
        })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).unwrap();
    client
        .login(AuthMethod::Ldap, "alice", "hunter2")
        .await
        .unwrap();
    let info = client.lookup_self().await.unwrap();

    assert_eq!(client.token(), Some("s.issued"));
    assert_eq!(info.display_name.as_deref(), Some("ldap-alice"));
}

#[tokio::test]
async fn login_without_auth_block_fails() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/auth/userpass/login/bob"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "auth": null })))
        .mount(&server)
        .await;

    let mut client = VaultClient::new(&server.uri()).unwrap();
    let err = client
        .login(AuthMethod::Userpass, "bob", "pw")
        .await
        .unwrap_err();

    assert!(matches!(err, VaultError::MissingAuth));
    assert_eq!(client.token(), None);
}

#[tokio::test]
async fn list_and_read_use_token_header() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/metadata/app"))
        .and(query_param("list", "true"))
        .and(header("x-vault-token", "root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "keys": ["db", "nested/"] }
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/kv/data/app/db"))
        .and(header("x-vault-token", "root"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "data": { "password": "s3cret" }, "metadata": { "version": 1 } }
        })))
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).unwrap().with_token("root");
    let keys = client.list("kv/metadata/app/").await.unwrap();
    let secret = client.read("kv/data/app/db").await.unwrap().unwrap();

    assert_eq!(keys, vec!["db".to_string(), "nested/".to_string()]);
    assert_eq!(secret["data"]["password"], "s3cret");
}

#[tokio::test]
async fn missing_paths_are_empty() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({ "errors": [] })))
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).unwrap().with_token("root");

    assert!(client.list("secret/none").await.unwrap().is_empty());
    assert!(client.read("secret/none").await.unwrap().is_none());
}

#[tokio::test]
async fn list_mounts_reports_kv_versions() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v1/sys/mounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {
                "kv/": { "type": "kv", "options": { "version": "2" } },
                "cubbyhole/": { "type": "cubbyhole", "options": null }
            }
        })))
        .mount(&server)
        .await;

    let client = VaultClient::new(&server.uri()).unwrap().with_token("root");
    let mounts = client.list_mounts().await.unwrap();

    assert_eq!(mounts.len(), 2);
    let kv = mounts.iter().find(|m| m.path == "kv/").unwrap();
    assert_eq!(kv.kv_version, Some(KvVersion::V2));
}
