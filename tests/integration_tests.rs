use httpmock::prelude::*;
use open_monitor_client::core::output::{write_page, OutputFormat};
use open_monitor_client::{
    ClientConfig, ClientError, CredentialsMode, DashboardClient, FetchRequest, ReqwestTransport,
    RetryPolicy, RetryableFetch, SortDirection, TableQuery,
};
use std::io::Write;
use std::time::{Duration, Instant};
use tempfile::NamedTempFile;
use tokio_test::{assert_err, assert_ok};

fn client_for(server: &MockServer, policy: RetryPolicy) -> DashboardClient<ReqwestTransport> {
    let transport = ReqwestTransport::new()
        .with_timeout(Duration::from_secs(5))
        .with_origin(&server.base_url())
        .unwrap();
    DashboardClient::new(server.base_url(), transport, policy)
}

#[tokio::test]
async fn test_end_to_end_fetch_and_query() {
    let server = MockServer::start();
    let mock_data = serde_json::json!({
        "count": 4,
        "results": [
            {"cve_id": "CVE-2024-0001", "vendor": "Acme", "cvss": 9.8},
            {"cve_id": "CVE-2024-0002", "vendor": "Globex", "cvss": 4.0},
            {"cve_id": "CVE-2024-0003", "vendor": "Acme", "cvss": 6.1},
            {"cve_id": "CVE-2024-0004", "vendor": "Acme", "cvss": 8.2}
        ]
    });

    let api_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/api/vulnerabilities")
            .header("Accept", "application/json");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(mock_data);
    });

    let client = client_for(&server, RetryPolicy::default());
    let query = TableQuery::new()
        .with_filter("acme")
        .in_column("vendor")
        .sorted_by("cvss", SortDirection::Descending)
        .page_size(2);

    let page = assert_ok!(client.fetch_table("/api/vulnerabilities", &query).await);

    api_mock.assert();
    assert_eq!(page.total_items, 3);
    assert_eq!(page.total_pages, 2);
    let ids: Vec<&str> = page
        .items
        .iter()
        .map(|r| r.get("cve_id").and_then(|v| v.as_str()).unwrap())
        .collect();
    assert_eq!(ids, vec!["CVE-2024-0001", "CVE-2024-0004"]);

    let mut csv_out = Vec::new();
    write_page(&page, OutputFormat::Csv, &mut csv_out).unwrap();
    let csv_text = String::from_utf8(csv_out).unwrap();
    assert!(csv_text.starts_with("cve_id,cvss,vendor\n"));
    assert!(csv_text.contains("CVE-2024-0004,8.2,Acme"));
}

#[tokio::test]
async fn test_server_errors_are_retried_until_budget_runs_out() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/api/stats");
        then.status(503).body("maintenance");
    });

    let client = client_for(&server, RetryPolicy::new(2, 20));
    let started = Instant::now();
    let err = assert_err!(client.fetch_records("/api/stats").await);

    // One attempt plus two retries, waiting 20ms then 40ms.
    api_mock.assert_hits(3);
    assert!(started.elapsed() >= Duration::from_millis(60));
    match err {
        ClientError::HttpStatus { status, body } => {
            assert_eq!(status, 503);
            assert_eq!(body, "maintenance");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn test_rate_limited_responses_are_retried() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/api/feed");
        then.status(429);
    });

    let transport = ReqwestTransport::new();
    let fetch = RetryableFetch::new(transport, RetryPolicy::new(1, 10));
    let response = assert_ok!(fetch.fetch(&FetchRequest::get(server.url("/api/feed"))).await);

    // The last response comes back as-is for the caller to inspect.
    assert_eq!(response.status, 429);
    api_mock.assert_hits(2);
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/api/missing");
        then.status(404).body("not found");
    });

    let client = client_for(&server, RetryPolicy::new(3, 10));
    let err = assert_err!(client.fetch_records("/api/missing").await);

    api_mock.assert_hits(1);
    assert!(matches!(err, ClientError::HttpStatus { status: 404, .. }));
}

#[tokio::test]
async fn test_post_json_with_included_credentials() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/api/chat")
            .header("Content-Type", "application/json")
            .header("Cookie", "sessionid=s3cr3t")
            .json_body(serde_json::json!({"message": "Which CVEs affect openssl?"}));
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!({"reply": "3 matches"}));
    });

    let transport = ReqwestTransport::new().with_session_cookie("sessionid=s3cr3t");
    let client = DashboardClient::new(server.base_url(), transport, RetryPolicy::default())
        .with_credentials(CredentialsMode::Include);

    let reply = assert_ok!(
        client
            .post_json(
                "/api/chat",
                &serde_json::json!({"message": "Which CVEs affect openssl?"})
            )
            .await
    );

    api_mock.assert();
    assert_eq!(reply["reply"], "3 matches");
}

#[tokio::test]
async fn test_client_built_from_config_file() {
    let server = MockServer::start();
    let api_mock = server.mock(|when, then| {
        when.method(GET).path("/api/assets").header("Authorization", "Bearer abc123");
        then.status(200)
            .json_body(serde_json::json!([{"asset": "web-01"}, {"asset": "db-01"}]));
    });

    let mut config_file = NamedTempFile::new().unwrap();
    write!(
        config_file,
        r#"
[client]
base_url = "{}"
bearer_token = "abc123"

[retry]
max_retries = 1
backoff_ms = 10

[table]
page_size = 1
"#,
        server.base_url()
    )
    .unwrap();

    let config = ClientConfig::from_file(config_file.path()).unwrap();
    let transport = ReqwestTransport::new()
        .with_origin(config.base_url())
        .unwrap()
        .with_bearer_token(config.client.bearer_token.clone().unwrap());
    let client = DashboardClient::new(config.base_url(), transport, config.retry_policy())
        .with_credentials(config.credentials());

    let query = TableQuery::new()
        .page_size(config.page_size())
        .sorted_by("asset", SortDirection::Ascending);
    let page = client.fetch_table("/api/assets", &query).await.unwrap();

    api_mock.assert();
    assert_eq!(page.total_pages, 2);
    assert_eq!(page.items[0].get("asset").unwrap(), "db-01");
}
