use super::auth::{AzureAdTokenSource, BasicCredentials, CredentialProvider, TokenCache};
use super::constants::{self, headers};
use super::error::{ApiError, ApiResult, ClientError};
use super::logging::ApiLogger;
use super::models::EntityCollection;
use super::operations::{BatchOperation, BatchRequestBuilder, BatchResponseParser, BatchResult};
use super::payload;
use crate::config::{AuthSettings, ClientConfig};
use reqwest::header::{HeaderMap, ACCEPT, AUTHORIZATION, CONTENT_TYPE, IF_MATCH};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Header directives of one request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Directives {
    pub include_annotations: bool,
    pub max_page_size: Option<u32>,
    pub return_representation: bool,
    pub if_match_any: bool,
}

impl Directives {
    /// Plain read: include every annotation
    pub fn read() -> Self {
        Self {
            include_annotations: true,
            ..Self::default()
        }
    }

    pub fn paged_read(max_page_size: u32) -> Self {
        Self {
            include_annotations: true,
            max_page_size: Some(max_page_size),
            ..Self::default()
        }
    }

    pub fn write() -> Self {
        Self::default()
    }

    /// Write that returns the created/updated record
    pub fn write_returning() -> Self {
        Self {
            return_representation: true,
            ..Self::default()
        }
    }

    pub fn with_if_match_any(mut self) -> Self {
        self.if_match_any = true;
        self
    }

    /// Value of the `Prefer` header, if any preference applies
    pub fn prefer_header(&self) -> Option<String> {
        let mut preferences = Vec::new();
        if self.include_annotations || self.max_page_size.is_some() {
            preferences.push(headers::PREFER_INCLUDE_ANNOTATIONS.to_string());
        }
        if let Some(size) = self.max_page_size {
            preferences.push(format!("odata.maxpagesize={}", size));
        }
        if self.return_representation {
            preferences.push(headers::PREFER_RETURN_REPRESENTATION.to_string());
        }

        if preferences.is_empty() {
            None
        } else {
            Some(preferences.join(", "))
        }
    }
}

enum RequestBody {
    Empty,
    Json(Value),
    Multipart { content_type: String, body: String },
}

/// Fully read response of a successful exchange
struct RawResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: String,
}

/// Dynamics 365 Web API client.
///
/// Cheap to clone; clones share the connection pool and the credential provider.
#[derive(Clone)]
pub struct DynamicsClient {
    base_url: String,
    api_suffix: String,
    http_client: reqwest::Client,
    credentials: Arc<dyn CredentialProvider>,
    api_logger: ApiLogger,
    max_page_size: Option<u32>,
}

impl DynamicsClient {
    /// Client with the default transport settings
    pub fn new(
        base_url: impl Into<String>,
        credentials: Arc<dyn CredentialProvider>,
    ) -> ApiResult<Self> {
        let http_client = Self::build_http_client(
            Duration::from_secs(60),
            Duration::from_secs(10),
            &format!("dynamics-odata/{}", env!("CARGO_PKG_VERSION")),
        )?;
        Ok(Self::with_http_client(base_url, http_client, credentials))
    }

    /// Create a new client with custom HTTP client configuration
    pub fn with_http_client(
        base_url: impl Into<String>,
        http_client: reqwest::Client,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            api_suffix: constants::DEFAULT_API_SUFFIX.to_string(),
            http_client,
            credentials,
            api_logger: ApiLogger::default(),
            max_page_size: None,
        }
    }

    /// Build the transport and the credential provider described by `config`
    pub fn from_config(config: &ClientConfig) -> ApiResult<Self> {
        config.validate()?;

        let http_client = Self::build_http_client(
            Duration::from_secs(config.timeout_secs),
            Duration::from_secs(config.connect_timeout_secs),
            &config.user_agent,
        )?;

        let credentials: Arc<dyn CredentialProvider> = match &config.auth {
            AuthSettings::ClientCredentials {
                tenant_id,
                client_id,
                client_secret,
                authority,
                ..
            } => {
                let scope = config.scope().unwrap_or_default();
                let source = AzureAdTokenSource::with_authority(
                    authority,
                    tenant_id,
                    client_id,
                    client_secret,
                    scope,
                )
                .with_http_client(http_client.clone());
                Arc::new(TokenCache::new(source))
            }
            AuthSettings::Basic { username, password } => {
                Arc::new(BasicCredentials::new(username, password))
            }
        };

        let mut client = Self::with_http_client(&config.base_url, http_client, credentials)
            .with_api_suffix(&config.api_suffix)
            .with_logger(ApiLogger::new(config.logging.clone()));
        client.max_page_size = config.max_page_size;
        Ok(client)
    }

    fn build_http_client(
        timeout: Duration,
        connect_timeout: Duration,
        user_agent: &str,
    ) -> ApiResult<reqwest::Client> {
        reqwest::Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(timeout)
            .connect_timeout(connect_timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to build HTTP client: {}", e)))
    }

    pub fn with_api_suffix(mut self, api_suffix: impl Into<String>) -> Self {
        self.api_suffix = api_suffix.into();
        self
    }

    pub fn with_max_page_size(mut self, max_page_size: u32) -> Self {
        self.max_page_size = Some(max_page_size);
        self
    }

    pub fn with_logger(mut self, api_logger: ApiLogger) -> Self {
        self.api_logger = api_logger;
        self
    }

    /// Absolute URL of a path relative to the Web API root
    pub fn url(&self, path: &str) -> String {
        constants::absolute_url(&self.base_url, &self.api_suffix, path)
    }

    /// Send one request and decode the JSON answer into `T`.
    ///
    /// 204 and empty bodies decode to `T::default()`.
    pub async fn send<T, B>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        directives: Directives,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        self.send_to_url(method, &url, body, directives).await
    }

    async fn send_to_url<T, B>(
        &self,
        method: Method,
        url: &str,
        body: Option<&B>,
        directives: Directives,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize + ?Sized,
    {
        let body = match body {
            Some(body) => {
                RequestBody::Json(payload::to_payload(body).map_err(ApiError::Serialize)?)
            }
            None => RequestBody::Empty,
        };
        let response = self.execute(method, url, body, directives).await?;
        Self::decode(response)
    }

    fn decode<T: DeserializeOwned + Default>(response: RawResponse) -> ApiResult<T> {
        if response.status == StatusCode::NO_CONTENT || response.body.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&response.body).map_err(|e| ApiError::parse(e, response.body))
    }

    /// Run one exchange: attach credentials, send, read the full body, check the status
    async fn execute(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        directives: Directives,
    ) -> ApiResult<RawResponse> {
        let context = self.api_logger.start_operation(method.as_str(), url);

        let result = self.exchange(method, url, body, directives, &context).await;
        match &result {
            Ok(response) => self
                .api_logger
                .complete_operation(&context, response.status.as_u16()),
            Err(error) => self.api_logger.fail_operation(&context, error),
        }
        result
    }

    async fn exchange(
        &self,
        method: Method,
        url: &str,
        body: RequestBody,
        directives: Directives,
        context: &super::logging::OperationContext,
    ) -> ApiResult<RawResponse> {
        let credential = self.credentials.acquire().await?;

        let mut request_headers = HashMap::new();
        request_headers.insert(AUTHORIZATION.to_string(), credential.header_value());
        request_headers.insert(ACCEPT.to_string(), headers::CONTENT_TYPE_JSON.to_string());
        request_headers.insert(
            headers::ODATA_MAX_VERSION_HEADER.to_string(),
            headers::ODATA_VERSION.to_string(),
        );
        request_headers.insert(
            headers::ODATA_VERSION_HEADER.to_string(),
            headers::ODATA_VERSION.to_string(),
        );
        if let Some(prefer) = directives.prefer_header() {
            request_headers.insert(headers::PREFER.to_string(), prefer);
        }
        if directives.if_match_any {
            request_headers.insert(IF_MATCH.to_string(), headers::IF_MATCH_ANY.to_string());
        }

        let body = match body {
            RequestBody::Empty => None,
            RequestBody::Json(value) => {
                request_headers.insert(
                    CONTENT_TYPE.to_string(),
                    headers::CONTENT_TYPE_JSON.to_string(),
                );
                Some(serde_json::to_vec(&value).map_err(ApiError::Serialize)?)
            }
            RequestBody::Multipart { content_type, body } => {
                request_headers.insert(CONTENT_TYPE.to_string(), content_type);
                Some(body.into_bytes())
            }
        };
        self.api_logger.log_headers(context, &request_headers);

        let mut request = self.http_client.request(method, url);
        for (name, value) in &request_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(ClientError::new(status.as_u16(), body).into());
        }

        Ok(RawResponse {
            status,
            headers: response_headers,
            body,
        })
    }

    /// GET any path with annotations included
    pub async fn get<T: DeserializeOwned + Default>(&self, path: &str) -> ApiResult<T> {
        self.send::<T, Value>(Method::GET, path, None, Directives::read()).await
    }

    /// Retrieve one record by key
    pub async fn retrieve<T: DeserializeOwned + Default>(
        &self,
        entity_set: &str,
        key: &str,
    ) -> ApiResult<T> {
        self.get(&constants::record_path(entity_set, key)).await
    }

    /// Retrieve a collection (the server decides the page size)
    pub async fn retrieve_multiple<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> ApiResult<EntityCollection<T>> {
        self.get(path).await
    }

    /// Retrieve the first page of a collection.
    ///
    /// Falls back to the configured `max_page_size`; without either, this is a plain read.
    pub async fn retrieve_page<T: DeserializeOwned>(
        &self,
        path: &str,
        page_size: Option<u32>,
    ) -> ApiResult<EntityCollection<T>> {
        let directives = match page_size.or(self.max_page_size) {
            Some(size) => Directives::paged_read(size),
            None => Directives::read(),
        };
        self.send::<_, Value>(Method::GET, path, None, directives).await
    }

    /// Follow an absolute `@odata.nextLink`
    pub async fn next_page<T: DeserializeOwned>(
        &self,
        next_link: &str,
        page_size: Option<u32>,
    ) -> ApiResult<EntityCollection<T>> {
        let directives = match page_size.or(self.max_page_size) {
            Some(size) => Directives::paged_read(size),
            None => Directives::read(),
        };
        self.send_to_url::<_, Value>(Method::GET, next_link, None, directives)
            .await
    }

    /// Read every page of a collection
    pub async fn retrieve_all<T: DeserializeOwned>(
        &self,
        path: &str,
        page_size: Option<u32>,
    ) -> ApiResult<Vec<T>> {
        let mut page: EntityCollection<T> = self.retrieve_page(path, page_size).await?;
        let mut records = std::mem::take(&mut page.value);

        while let Some(next_link) = page.next_link.take() {
            log::debug!(
                "Following next link for {} ({} records so far)",
                path,
                records.len()
            );
            page = self.next_page(&next_link, page_size).await?;
            records.append(&mut page.value);
        }

        Ok(records)
    }

    /// Create a record and return its id, taken from the `OData-EntityId` header
    pub async fn create<B: Serialize + ?Sized>(
        &self,
        entity_set: &str,
        body: &B,
    ) -> ApiResult<Option<String>> {
        let data = payload::to_payload(body).map_err(ApiError::Serialize)?;
        let url = self.url(entity_set);
        let response = self
            .execute(Method::POST, &url, RequestBody::Json(data), Directives::write())
            .await?;

        Ok(response
            .headers
            .get(headers::ODATA_ENTITY_ID)
            .and_then(|value| value.to_str().ok())
            .and_then(record_id_from_url))
    }

    /// Create a record and return the stored representation
    pub async fn create_returning<T, B>(&self, entity_set: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize + ?Sized,
    {
        self.send(Method::POST, entity_set, Some(body), Directives::write_returning())
            .await
    }

    /// Update an existing record; fails with 404 instead of creating one
    pub async fn update<B: Serialize + ?Sized>(
        &self,
        entity_set: &str,
        key: &str,
        body: &B,
    ) -> ApiResult<()> {
        let data = payload::to_payload(body).map_err(ApiError::Serialize)?;
        let url = self.url(&constants::record_path(entity_set, key));
        let directives = Directives::write().with_if_match_any();
        self.execute(Method::PATCH, &url, RequestBody::Json(data), directives)
            .await?;
        Ok(())
    }

    /// Update an existing record and return the stored representation
    pub async fn update_returning<T, B>(
        &self,
        entity_set: &str,
        key: &str,
        body: &B,
    ) -> ApiResult<T>
    where
        T: DeserializeOwned + Default,
        B: Serialize + ?Sized,
    {
        let path = constants::record_path(entity_set, key);
        let directives = Directives::write_returning().with_if_match_any();
        self.send(Method::PATCH, &path, Some(body), directives).await
    }

    /// Create or update a record by key (or alternate key, e.g. `emailaddress1='a@b.c'`)
    pub async fn upsert<B: Serialize + ?Sized>(
        &self,
        entity_set: &str,
        key: &str,
        body: &B,
    ) -> ApiResult<()> {
        let data = payload::to_payload(body).map_err(ApiError::Serialize)?;
        let url = self.url(&constants::record_path(entity_set, key));
        self.execute(Method::PATCH, &url, RequestBody::Json(data), Directives::write())
            .await?;
        Ok(())
    }

    pub async fn delete(&self, entity_set: &str, key: &str) -> ApiResult<()> {
        let url = self.url(&constants::record_path(entity_set, key));
        self.execute(Method::DELETE, &url, RequestBody::Empty, Directives::write())
            .await?;
        Ok(())
    }

    /// Link `related` (a path such as `contacts(<id>)`) to `parent` through a navigation property
    pub async fn associate(
        &self,
        parent: &str,
        navigation_property: &str,
        related: &str,
    ) -> ApiResult<()> {
        let url = self.url(&constants::reference_path(parent, navigation_property));
        let body = json!({ "@odata.id": self.url(related) });
        self.execute(Method::POST, &url, RequestBody::Json(body), Directives::write())
            .await?;
        Ok(())
    }

    /// Remove a link; `related_key` is required for collection-valued navigation properties
    pub async fn disassociate(
        &self,
        parent: &str,
        navigation_property: &str,
        related_key: Option<&str>,
    ) -> ApiResult<()> {
        let path = constants::disassociate_path(parent, navigation_property, related_key);
        self.execute(Method::DELETE, &self.url(&path), RequestBody::Empty, Directives::write())
            .await?;
        Ok(())
    }

    /// Execute operations using the $batch endpoint.
    ///
    /// Per-operation failures come back as unsuccessful [`BatchResult`]s; only a failure of
    /// the batch exchange itself is an error.
    pub async fn execute_batch(
        &self,
        operations: &[BatchOperation],
    ) -> ApiResult<Vec<BatchResult>> {
        if operations.is_empty() {
            return Ok(Vec::new());
        }

        let started = Instant::now();
        let batch_request = BatchRequestBuilder::new(&self.base_url, &self.api_suffix)
            .add_operations(operations)
            .build();

        let url = self.url(constants::BATCH_ENDPOINT);
        let body = RequestBody::Multipart {
            content_type: batch_request.content_type,
            body: batch_request.body,
        };
        let response = self.execute(Method::POST, &url, body, Directives::write()).await?;

        let content_type = response
            .headers
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok());
        let results = BatchResponseParser::parse(content_type, &response.body)?;

        let failures = results.iter().filter(|result| result.is_error()).count();
        self.api_logger.log_batch_operation(
            operations.len(),
            results.len(),
            failures,
            started.elapsed(),
        );

        Ok(results)
    }
}

/// Pull the key out of `https://org/api/data/v9.2/accounts(<key>)`
fn record_id_from_url(url: &str) -> Option<String> {
    let start = url.rfind('(')?;
    let end = url[start..].find(')')? + start;
    let key = &url[start + 1..end];
    (!key.is_empty()).then(|| key.to_string())
}
