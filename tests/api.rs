//! Integration tests for the REST client.
//!
//! These tests use wiremock to simulate the local platform service and
//! verify request shapes, parsing and error-body handling.

use idm_monitor::{
    ApiError, LocalApiClient, SimulationQuery, Status,
    api::SERVICE_UNAVAILABLE,
    config::NetworkConfig,
};
use serde_json::json;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_json, method, path, query_param},
};

fn test_config() -> NetworkConfig {
    NetworkConfig {
        request_timeout_secs: 10,
        connect_timeout_secs: 5,
    }
}

async fn client_for(server: &MockServer) -> LocalApiClient {
    LocalApiClient::new(&server.uri(), &test_config()).expect("Client creation should succeed")
}

// ==================== Experiment Tests ====================

#[tokio::test]
async fn test_fetch_experiments_success() {
    let mock_server = MockServer::start().await;

    let body = r#"[
        {
            "experiment_id": "EXP1",
            "status": "in_progress",
            "created": "2024-03-01T09:15:00Z",
            "updated": "2024-03-01T09:45:00Z",
            "data_path": "/data/EXP1",
            "tags": {"model": "sir", "seed": 3},
            "progress": [{"done": 4, "in_progress": 2}]
        },
        {
            "id": "EXP2",
            "status": "done",
            "created": "Fri, 01 Mar 2024 07:00:00 GMT",
            "updated": "2024-03-01 08:00:00",
            "data_path": null,
            "tags": null
        }
    ]"#;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let experiments = client.fetch_experiments().await.unwrap();

    assert_eq!(experiments.len(), 2);
    assert_eq!(experiments[0].id, "EXP1");
    assert_eq!(experiments[0].status, Status::InProgress);
    assert_eq!(experiments[0].tags.get("seed").map(String::as_str), Some("3"));
    assert_eq!(experiments[0].progress_count(Status::Done), 4);

    assert_eq!(experiments[1].id, "EXP2");
    assert!(experiments[1].data_path.is_empty());
    assert!(experiments[1].tags.is_empty());
}

#[tokio::test]
async fn test_delete_experiment_without_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/experiments/EXP1"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    assert!(client.delete_experiment("EXP1", false).await.is_ok());

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
}

#[tokio::test]
async fn test_delete_experiment_with_data() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/experiments/EXP1"))
        .and(query_param("data", "true"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    assert!(client.delete_experiment("EXP1", true).await.is_ok());
}

#[tokio::test]
async fn test_delete_experiment_not_found_uses_message_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("DELETE"))
        .and(path("/api/experiments/NOPE"))
        .respond_with(
            ResponseTemplate::new(404)
                .set_body_string(r#"{"message": "No experiment with id of NOPE"}"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let err = client.delete_experiment("NOPE", false).await.unwrap_err();

    match &err {
        ApiError::Status { status, message } => {
            assert_eq!(status.as_u16(), 404);
            assert_eq!(message, "No experiment with id of NOPE");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.user_message(), "No experiment with id of NOPE");
}

// ==================== Simulation Tests ====================

#[tokio::test]
async fn test_fetch_simulations_requests_single_page() {
    let mock_server = MockServer::start().await;

    let body = r#"[{
        "simulation_uid": "SIM1",
        "experiment_id": "EXP1",
        "status": "in progress",
        "created": "2024-03-01T09:15:00Z",
        "updated": "2024-03-01T09:20:00Z",
        "data_path": "/data/EXP1/SIM1",
        "tags": {"a": "1"},
        "extra_details": {"command": "python model.py --seed 1"}
    }]"#;

    Mock::given(method("GET"))
        .and(path("/api/simulations"))
        .and(query_param("per_page", "9999"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let simulations = client
        .fetch_simulations(&SimulationQuery::default())
        .await
        .unwrap();

    assert_eq!(simulations.len(), 1);
    assert_eq!(simulations[0].id, "SIM1");
    assert_eq!(simulations[0].experiment_id, "EXP1");
    assert_eq!(simulations[0].status, Status::InProgress);
    assert_eq!(simulations[0].command(), Some("python model.py --seed 1"));
}

#[tokio::test]
async fn test_fetch_simulations_with_filters() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/simulations"))
        .and(query_param("per_page", "9999"))
        .and(query_param("experiment_id", "EXP1"))
        .and(query_param("status", "done"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let query = SimulationQuery {
        experiment_id: Some("EXP1".to_string()),
        status: Some(Status::Done),
        tags: vec![
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "2".to_string()),
        ],
    };
    let simulations = client.fetch_simulations(&query).await.unwrap();
    assert!(simulations.is_empty());

    let requests = mock_server.received_requests().await.unwrap();
    let tags: Vec<String> = requests[0]
        .url
        .query_pairs()
        .filter(|(k, _)| k == "tags")
        .map(|(_, v)| v.into_owned())
        .collect();
    assert_eq!(tags, vec!["a,1", "b,2"]);
}

#[tokio::test]
async fn test_cancel_simulation_sends_status_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/simulations/SIM1"))
        .and(body_json(json!({ "status": "canceled" })))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    assert!(client.cancel_simulation("SIM1").await.is_ok());
}

#[tokio::test]
async fn test_cancel_simulation_messages_field() {
    let mock_server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/simulations/SIM1"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"messages": {"status": ["Not a valid choice."]}}"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let err = client.cancel_simulation("SIM1").await.unwrap_err();
    assert_eq!(
        err.user_message(),
        r#"{"status":["Not a valid choice."]}"#
    );
}

// ==================== Error Handling Tests ====================

#[tokio::test]
async fn test_server_error_plain_text_body() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let err = client.fetch_experiments().await.unwrap_err();
    assert_eq!(err.user_message(), "Internal Server Error");
}

#[tokio::test]
async fn test_server_error_malformed_marker() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(
            ResponseTemplate::new(500)
                .set_body_string(r#"{"message": "Unexpected token E in JSON at position 0"}"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let err = client.fetch_experiments().await.unwrap_err();
    assert_eq!(err.user_message(), SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_server_error_empty_body_names_status() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/simulations"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let err = client
        .fetch_simulations(&SimulationQuery::default())
        .await
        .unwrap_err();
    assert!(err.user_message().contains("503"), "got: {}", err.user_message());
}

#[tokio::test]
async fn test_invalid_json_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let result = client.fetch_experiments().await;
    assert!(matches!(result, Err(ApiError::Malformed(_))));
}

#[tokio::test]
async fn test_missing_required_field_is_malformed() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(r#"[{"experiment_id": "EXP1"}]"#),
        )
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    assert!(matches!(
        client.fetch_experiments().await,
        Err(ApiError::Malformed(_))
    ));
}

#[tokio::test]
async fn test_request_timeout_is_network_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("[]")
                .set_delay(std::time::Duration::from_secs(2)),
        )
        .mount(&mock_server)
        .await;

    let config = NetworkConfig {
        request_timeout_secs: 1,
        connect_timeout_secs: 1,
    };
    let client = LocalApiClient::new(&mock_server.uri(), &config).unwrap();

    let result = client.fetch_experiments().await;
    assert!(matches!(result, Err(ApiError::Network(_))), "Should timeout");
}

#[tokio::test]
async fn test_connection_refused_is_network_error() {
    // Port 1 is reserved and never accepts connections here.
    let client = LocalApiClient::new("http://127.0.0.1:1", &test_config()).unwrap();
    assert!(matches!(
        client.fetch_experiments().await,
        Err(ApiError::Network(_))
    ));
}

#[tokio::test]
async fn test_api_client_clone_and_concurrent_use() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/experiments"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .mount(&mock_server)
        .await;

    let client = client_for(&mock_server).await;
    let client2 = client.clone();
    let client3 = client.clone();

    let (r1, r2, r3) = tokio::join!(
        client.fetch_experiments(),
        client2.fetch_experiments(),
        client3.fetch_experiments()
    );

    assert!(r1.is_ok());
    assert!(r2.is_ok());
    assert!(r3.is_ok());
}
