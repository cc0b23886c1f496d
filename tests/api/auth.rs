use crate::{api_path, init_logging};
use dynamics_odata::api::{ApiError, AzureAdTokenSource, DynamicsClient, TokenCache};
use dynamics_odata::config::{AuthSettings, ClientConfig};
use serde_json::{json, Value};
use std::sync::Arc;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_token_endpoint(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "expires_in": 3599,
            "access_token": "token-abc"
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn token_cache_for(server: &MockServer) -> TokenCache {
    TokenCache::new(AzureAdTokenSource::with_authority(
        &server.uri(),
        "tenant-1",
        "client-1",
        "secret-1",
        format!("{}/.default", server.uri()),
    ))
}

fn client_with_token_cache(server: &MockServer) -> DynamicsClient {
    DynamicsClient::with_http_client(
        server.uri(),
        reqwest::Client::new(),
        Arc::new(token_cache_for(server)),
    )
}

#[tokio::test]
async fn test_token_is_fetched_once_for_many_requests() {
    init_logging();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(api_path("WhoAmI")))
        .and(header("Authorization", "Bearer token-abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"UserId": "u1"})))
        .expect(3)
        .mount(&server)
        .await;

    let client = client_with_token_cache(&server);

    for _ in 0..3 {
        let who: Value = client.get("WhoAmI").await.unwrap();
        assert_eq!(who["UserId"], "u1");
    }
}

#[tokio::test]
async fn test_concurrent_requests_share_one_refresh() {
    init_logging();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(api_path("WhoAmI")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"UserId": "u1"})))
        .expect(8)
        .mount(&server)
        .await;

    let client = client_with_token_cache(&server);

    let requests = (0..8).map(|_| client.get::<Value>("WhoAmI"));
    let results = futures::future::join_all(requests).await;

    assert!(results.iter().all(Result::is_ok));
}

#[tokio::test]
async fn test_token_failure_stops_the_request() {
    init_logging();
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant-1/oauth2/v2.0/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": "invalid_client",
            "error_description": "AADSTS7000215: Invalid client secret provided."
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = client_with_token_cache(&server);
    let error = client.get::<Value>("accounts").await.unwrap_err();

    match error {
        ApiError::Authentication(source) => assert!(source.to_string().contains("invalid_client")),
        other => panic!("expected authentication error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_client_from_config() {
    init_logging();
    let server = MockServer::start().await;
    mount_token_endpoint(&server, 1).await;
    Mock::given(method("GET"))
        .and(path("/api/data/v9.1/accounts"))
        .and(header("Authorization", "Bearer token-abc"))
        .and(|req: &wiremock::Request| {
            req.headers.get("Prefer").and_then(|v| v.to_str().ok())
                == Some("odata.include-annotations=\"*\", odata.maxpagesize=25")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://org/api/data/v9.1/$metadata#accounts",
            "value": [{"name": "Contoso"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = ClientConfig::new(
        server.uri(),
        AuthSettings::ClientCredentials {
            tenant_id: "tenant-1".to_string(),
            client_id: "client-1".to_string(),
            client_secret: "secret-1".to_string(),
            scope: None,
            authority: server.uri(),
        },
    );
    config.api_suffix = "api/data/v9.1/".to_string();
    config.max_page_size = Some(25);

    let client = DynamicsClient::from_config(&config).unwrap();
    let accounts: Vec<Value> = client.retrieve_all("accounts", None).await.unwrap();

    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0]["name"], "Contoso");
}
