//! Lifecycle workflows end to end against a mock control plane

use std::sync::Arc;
use std::time::{Duration, Instant};

use infractl_core::{
    CoreError, Endpoint, ErrorKind, Orchestrator, Resource, Transport, WaitConfig, WaitOptions,
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Clone, PartialEq, Deserialize)]
struct FloatingIp {
    id: String,
    name: String,
    status: String,
}

impl Resource for FloatingIp {
    const KIND: &'static str = "floating ip";

    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

fn fip(id: &str, name: &str, status: &str) -> serde_json::Value {
    json!({"id": id, "name": name, "status": status})
}

fn floating_ips() -> Endpoint {
    Endpoint::new("/floating-ips")
}

fn orchestrator(server: &MockServer) -> Orchestrator {
    let transport = Transport::builder()
        .endpoint(format!("{}/v1", server.uri()))
        .token("tok")
        .region("eu-1")
        .build()
        .unwrap();
    Orchestrator::new(Arc::new(transport))
}

fn fast() -> WaitConfig {
    WaitConfig {
        timeout: Duration::from_secs(5),
        delay: Duration::from_millis(20),
        min_interval: Duration::from_millis(20),
        not_found_budget: 5,
    }
}

async fn mount_get_once(server: &MockServer, id: &str, body: serde_json::Value) {
    Mock::given(method("GET"))
        .and(path(format!("/v1/floating-ips/{id}")))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
}

// ============================================================================
// Create
// ============================================================================

#[tokio::test]
async fn test_create_waits_through_pending_states() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/floating-ips"))
        .and(body_json(json!({"name": "fip-1", "region": "eu-1"})))
        .respond_with(ResponseTemplate::new(202).set_body_json(fip("fip-1", "fip-1", "IN_ACTIVE")))
        .expect(1)
        .mount(&server)
        .await;
    mount_get_once(&server, "fip-1", fip("fip-1", "fip-1", "IN_ACTIVE")).await;
    mount_get_once(&server, "fip-1", fip("fip-1", "fip-1", "PENDING")).await;
    Mock::given(method("GET"))
        .and(path("/v1/floating-ips/fip-1"))
        .and(query_param("region", "eu-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fip("fip-1", "fip-1", "ACTIVE")))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server);
    let start = Instant::now();
    let created: FloatingIp = orchestrator
        .create(
            &floating_ips(),
            &json!({"name": "fip-1", "region": "eu-1"}),
            WaitOptions::new(),
        )
        .await
        .unwrap();

    assert_eq!(created.status, "ACTIVE");
    assert!(start.elapsed() >= Duration::from_secs(9));

    let gets = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.method.as_str() == "GET")
        .count();
    assert_eq!(gets, 3);

    let reread: FloatingIp = orchestrator.read(&floating_ips(), "fip-1").await.unwrap();
    assert_eq!(reread.id, created.id);
    assert_eq!(reread.status, "ACTIVE");
}

#[tokio::test]
async fn test_rejected_submission_is_not_polled() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"message":"bad cidr"}"#))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = orchestrator(&server)
        .create::<FloatingIp, _>(
            &floating_ips(),
            &json!({"name": "fip-1"}),
            WaitOptions::new().config(fast()),
        )
        .await
        .unwrap_err();

    assert_eq!(err.http_status(), Some(400));
    assert!(
        err.to_string()
            .starts_with("failed to create floating ip: HTTP 400"),
        "{err}"
    );
}

#[tokio::test]
async fn test_failure_state_names_operation_and_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_body_json(fip("fip-9", "edge", "PENDING")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/floating-ips/fip-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fip("fip-9", "edge", "ERROR")))
        .mount(&server)
        .await;

    let err = orchestrator(&server)
        .create::<FloatingIp, _>(
            &floating_ips(),
            &json!({"name": "edge"}),
            WaitOptions::new().config(fast()),
        )
        .await
        .unwrap_err();

    assert_eq!(
        err.to_string(),
        "failed to create floating ip fip-9: object reached failure state 'ERROR'"
    );
}

#[tokio::test]
async fn test_object_that_never_appears_exhausts_budget() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(202).set_body_json(fip("fip-3", "edge", "PENDING")))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;

    let err = orchestrator(&server)
        .create::<FloatingIp, _>(
            &floating_ips(),
            &json!({"name": "edge"}),
            WaitOptions::new().config(WaitConfig {
                not_found_budget: 2,
                ..fast()
            }),
        )
        .await
        .unwrap_err();

    assert!(err.chain().any(|e| matches!(e, CoreError::NotFoundExceeded { attempts: 2 })));
    assert!(err.to_string().contains("fip-3"));
}

#[tokio::test]
async fn test_concurrent_creates_share_one_transport() {
    let server = MockServer::start().await;
    for id in ["fip-a", "fip-b"] {
        Mock::given(method("POST"))
            .and(body_json(json!({"name": id})))
            .respond_with(ResponseTemplate::new(202).set_body_json(fip(id, id, "CREATING")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/v1/floating-ips/{id}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(fip(id, id, "ACTIVE")))
            .mount(&server)
            .await;
    }

    let orchestrator = orchestrator(&server);
    let endpoint = floating_ips();
    let body_a = json!({"name": "fip-a"});
    let body_b = json!({"name": "fip-b"});
    let (a, b) = tokio::join!(
        orchestrator.create::<FloatingIp, _>(&endpoint, &body_a, WaitOptions::new().config(fast())),
        orchestrator.create::<FloatingIp, _>(&endpoint, &body_b, WaitOptions::new().config(fast())),
    );

    assert_eq!(a.unwrap().id, "fip-a");
    assert_eq!(b.unwrap().id, "fip-b");
}

// ============================================================================
// Update and delete
// ============================================================================

#[tokio::test]
async fn test_update_waits_for_active() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/v1/floating-ips/fip-1"))
        .and(body_json(json!({"name": "renamed"})))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    mount_get_once(&server, "fip-1", fip("fip-1", "renamed", "UPDATING")).await;
    Mock::given(method("GET"))
        .and(path("/v1/floating-ips/fip-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fip("fip-1", "renamed", "ACTIVE")))
        .mount(&server)
        .await;

    let updated: FloatingIp = orchestrator(&server)
        .update(
            &floating_ips(),
            "fip-1",
            &json!({"name": "renamed"}),
            WaitOptions::new().config(fast()),
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "renamed");
    assert_eq!(updated.status, "ACTIVE");
}

#[tokio::test]
async fn test_delete_converges_when_object_is_gone() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/v1/floating-ips/fip-1"))
        .and(query_param("region", "eu-1"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;
    mount_get_once(&server, "fip-1", fip("fip-1", "edge", "DELETING")).await;
    Mock::given(method("GET"))
        .and(path("/v1/floating-ips/fip-1"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    orchestrator(&server)
        .delete::<FloatingIp>(&floating_ips(), "fip-1", WaitOptions::new().config(fast()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_delete_of_missing_object_succeeds_without_polling() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(0)
        .mount(&server)
        .await;

    orchestrator(&server)
        .delete::<FloatingIp>(&floating_ips(), "fip-1", WaitOptions::new().config(fast()))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancelled_delete_reports_cancellation() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(fip("fip-1", "edge", "DELETING")))
        .mount(&server)
        .await;

    let token = CancellationToken::new();
    let canceller = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let err = orchestrator(&server)
        .delete::<FloatingIp>(
            &floating_ips(),
            "fip-1",
            WaitOptions::new().config(fast()).cancel(token),
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(
        err.to_string(),
        "failed to delete floating ip fip-1: polling was cancelled"
    );
}

// ============================================================================
// Lookup
// ============================================================================

async fn mount_listing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/floating-ips"))
        .and(query_param("region", "eu-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                fip("fip-1", "edge", "ACTIVE"),
                fip("fip-2", "edge", "ACTIVE"),
                fip("fip-3", "core", "ACTIVE"),
            ]
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_find_one_returns_single_match() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let found: FloatingIp = orchestrator(&server)
        .find_one(&floating_ips(), |f: &FloatingIp| f.name == "core")
        .await
        .unwrap();
    assert_eq!(found.id, "fip-3");
}

#[tokio::test]
async fn test_find_one_without_match_is_zero_matches() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let err = orchestrator(&server)
        .find_one::<FloatingIp, _>(&floating_ips(), |f| f.name == "missing")
        .await
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::ZeroMatches));
    assert!(!err.is_kind(ErrorKind::MultipleMatches));
    assert!(err.to_string().starts_with("failed to look up floating ip"));
}

#[tokio::test]
async fn test_find_one_with_duplicates_is_multiple_matches() {
    let server = MockServer::start().await;
    mount_listing(&server).await;

    let err = orchestrator(&server)
        .find_one::<FloatingIp, _>(&floating_ips(), |f| f.name == "edge")
        .await
        .unwrap_err();
    assert!(err.is_kind(ErrorKind::MultipleMatches));
    assert_eq!(err.kind(), ErrorKind::MultipleMatches);
    assert!(err.to_string().contains("fip-1, fip-2"));
}
