use crate::{api_path, client_for, BASIC_HEADER};
use dynamics_odata::api::{ApiError, EntityCollection};
use serde::Deserialize;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

#[derive(Debug, Default, Deserialize)]
struct Account {
    name: String,
    #[serde(rename = "revenue@OData.Community.Display.V1.FormattedValue")]
    revenue_formatted: Option<String>,
}

/// Collection row without a `Default` impl
#[derive(Debug, Deserialize)]
struct Contact {
    fullname: String,
}

#[tokio::test]
async fn test_read_sends_standard_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("accounts(1)")))
        .and(header("Authorization", BASIC_HEADER))
        .and(header("Accept", "application/json"))
        .and(header("OData-MaxVersion", "4.0"))
        .and(header("OData-Version", "4.0"))
        .and(|req: &Request| {
            req.headers.get("Prefer").and_then(|v| v.to_str().ok())
                == Some("odata.include-annotations=\"*\"")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://org/api/data/v9.2/$metadata#accounts/$entity",
            "name": "Contoso",
            "revenue@OData.Community.Display.V1.FormattedValue": "$1,000.00"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let account: Account = client.retrieve("accounts", "1").await.unwrap();

    assert_eq!(account.name, "Contoso");
    assert_eq!(account.revenue_formatted.as_deref(), Some("$1,000.00"));
}

#[tokio::test]
async fn test_paged_read_follows_next_links() {
    let server = MockServer::start().await;
    let next_link = format!("{}{}?$skiptoken=2", server.uri(), api_path("accounts"));

    Mock::given(method("GET"))
        .and(path(api_path("accounts")))
        .and(|req: &Request| req.url.query().is_none())
        .and(|req: &Request| {
            req.headers.get("Prefer").and_then(|v| v.to_str().ok())
                == Some("odata.include-annotations=\"*\", odata.maxpagesize=2")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://org/api/data/v9.2/$metadata#accounts(name)",
            "@odata.nextLink": next_link,
            "value": [{"name": "A"}, {"name": "B"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(api_path("accounts")))
        .and(query_param("$skiptoken", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://org/api/data/v9.2/$metadata#accounts(name)",
            "value": [{"name": "C"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let accounts: Vec<Account> = client.retrieve_all("accounts", Some(2)).await.unwrap();

    let names: Vec<&str> = accounts.iter().map(|a| a.name.as_str()).collect();
    assert_eq!(names, vec!["A", "B", "C"]);
}

#[tokio::test]
async fn test_configured_page_size_is_used() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(|req: &Request| {
            req.headers.get("Prefer").and_then(|v| v.to_str().ok())
                == Some("odata.include-annotations=\"*\", odata.maxpagesize=500")
        })
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "@odata.context": "https://org/api/data/v9.2/$metadata#contacts",
            "value": [{"fullname": "Ada Lovelace"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server).with_max_page_size(500);
    let page: EntityCollection<Contact> = client.retrieve_page("contacts", None).await.unwrap();

    assert_eq!(page.value.len(), 1);
    assert_eq!(page.value[0].fullname, "Ada Lovelace");
    assert_eq!(page.entity_set(), Some("contacts"));
}

#[tokio::test]
async fn test_no_content_yields_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(api_path("accounts")))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(api_path("contacts")))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let client = client_for(&server);

    let accounts: Vec<Value> = client.get("accounts").await.unwrap();
    assert!(accounts.is_empty());

    let contacts: EntityCollection<Contact> = client.retrieve_multiple("contacts").await.unwrap();
    assert!(contacts.value.is_empty());
    assert!(!contacts.has_more());
}

#[tokio::test]
async fn test_error_status_keeps_raw_body() {
    let server = MockServer::start().await;
    let raw = "{\"error\":{\"code\":\"0x80040217\",\"message\":\"account With Id = 1 Does Not Exist\"}}  ";
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404).set_body_string(raw))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.retrieve::<Account>("accounts", "1").await.unwrap_err();

    assert_eq!(error.status_code(), Some(404));
    let client_error = error.client_error().unwrap();
    assert!(client_error.is_not_found());
    assert_eq!(client_error.raw_body, raw);
    assert_eq!(client_error.odata_error().unwrap().code, "0x80040217");
}

#[tokio::test]
async fn test_error_status_never_parses_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(503).set_body_string("<html>Service Unavailable</html>"),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.get::<Value>("accounts").await.unwrap_err();

    match error {
        ApiError::Client(e) => {
            assert_eq!(e.status_code, 503);
            assert_eq!(e.raw_body, "<html>Service Unavailable</html>");
        }
        other => panic!("expected client error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_shape_mismatch_is_parse_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"unexpected": true})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let error = client.retrieve::<Account>("accounts", "1").await.unwrap_err();

    assert!(matches!(error, ApiError::Parse { .. }));
    assert_eq!(error.status_code(), None);
}

#[tokio::test]
async fn test_transport_failure_is_surfaced() {
    let client = dynamics_odata::api::DynamicsClient::with_http_client(
        "http://127.0.0.1:1",
        reqwest::Client::new(),
        std::sync::Arc::new(dynamics_odata::api::BasicCredentials::new("admin", "pw")),
    );

    let error = client.get::<Value>("accounts").await.unwrap_err();
    assert!(matches!(error, ApiError::Transport(_)));
}
