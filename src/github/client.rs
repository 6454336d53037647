use crate::error::{ReportError, Result};
use crate::github::link;
use http::header::{ACCEPT, LINK};
use http::StatusCode;
use octocrab::service::middleware::retry::RetryConfig;
use octocrab::Octocrab;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

const REST_ACCEPT: &str = "application/vnd.github+json";

/// Everything a [`GithubClient`] needs, passed in explicitly and never
/// mutated after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub token: String,
    pub api_url: String,
    pub graphql_url: String,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
}

impl ClientSettings {
    pub fn new(token: impl Into<String>, api_url: impl Into<String>) -> Self {
        let api_url = api_url.into().trim_end_matches('/').to_string();
        Self {
            token: token.into(),
            graphql_url: format!("{api_url}/graphql"),
            api_url,
            connect_timeout: None,
            read_timeout: None,
        }
    }
}

impl ClientSettings {
    /// The token is only attached to requests on the API URL's origin, so
    /// the GraphQL endpoint must share it.
    pub fn ensure_same_origin(&self) -> Result<()> {
        if origin(&self.graphql_url) != origin(&self.api_url) {
            return Err(ReportError::Config(format!(
                "GraphQL URL `{}` must share scheme, host and port with API URL `{}`",
                self.graphql_url, self.api_url
            )));
        }
        Ok(())
    }
}

/// `scheme://host[:port]` of an absolute URL, lower-cased.
fn origin(url: &str) -> String {
    let (scheme, rest) = url.split_once("://").unwrap_or(("", url));
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    format!("{scheme}://{authority}").to_ascii_lowercase()
}

impl fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientSettings")
            .field("token", &"<redacted>")
            .field("api_url", &self.api_url)
            .field("graphql_url", &self.graphql_url)
            .field("connect_timeout", &self.connect_timeout)
            .field("read_timeout", &self.read_timeout)
            .finish()
    }
}

/// A raw REST response: status, the `rel="next"` target and the body text.
#[derive(Debug)]
pub struct ApiResponse {
    pub status: StatusCode,
    pub next: Option<String>,
    pub body: String,
}

pub struct GithubClient {
    octocrab: Octocrab,
    settings: ClientSettings,
}

impl GithubClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        settings.ensure_same_origin()?;
        let octocrab = Octocrab::builder()
            .personal_token(settings.token.clone())
            .base_uri(settings.api_url.as_str())
            .map_err(|e| ReportError::Config(format!("Invalid API URL: {e}")))?
            .add_header(ACCEPT, REST_ACCEPT.to_string())
            .add_retry_config(RetryConfig::None)
            .set_connect_timeout(settings.connect_timeout)
            .set_read_timeout(settings.read_timeout)
            .build()
            .map_err(|e| ReportError::GitHub(e.to_string()))?;
        Ok(Self {
            octocrab,
            settings: settings.clone(),
        })
    }

    /// Builds an absolute REST URL from a path such as `/users/alice`.
    pub fn rest_url(&self, path: &str) -> String {
        format!("{}{path}", self.settings.api_url)
    }

    /// Issues a GET and returns the response whatever its status.
    pub async fn get(&self, url: &str) -> Result<ApiResponse> {
        debug!(%url, "GET");
        let response = self.octocrab._get(url).await?;
        let status = response.status();
        let next = response
            .headers()
            .get(LINK)
            .and_then(|value| value.to_str().ok())
            .and_then(link::next_link);
        let body = self.octocrab.body_to_string(response).await?;
        Ok(ApiResponse { status, next, body })
    }

    /// Follows `rel="next"` links from `start`, concatenating every page's
    /// JSON array in order.
    ///
    /// Stops on a page without a next link, on 204, or on any other non-200
    /// status. Failures are logged and whatever was collected so far is
    /// returned.
    pub async fn paginate<T: DeserializeOwned>(&self, start: String) -> Vec<T> {
        let mut items = Vec::new();
        let mut visited = HashSet::new();
        let mut next = Some(start);

        while let Some(url) = next.take() {
            if !visited.insert(url.clone()) {
                warn!(%url, "next link points at an already fetched page, stopping");
                break;
            }

            let response = match self.get(&url).await {
                Ok(response) => response,
                Err(e) => {
                    warn!(%url, error = %e, "Failed to fetch data");
                    break;
                }
            };

            if response.status == StatusCode::NO_CONTENT {
                debug!(%url, "no content");
                break;
            }
            if response.status != StatusCode::OK {
                warn!(%url, status = response.status.as_u16(), "Failed to fetch data");
                break;
            }

            match serde_json::from_str::<Vec<T>>(&response.body) {
                Ok(page) => items.extend(page),
                Err(e) => {
                    warn!(%url, error = %e, "Unexpected page body");
                    break;
                }
            }
            next = response.next;
        }

        items
    }

    /// Posts `{query, variables}` to the GraphQL endpoint and returns the
    /// parsed body.
    pub async fn graphql(&self, query: &str, variables: Value) -> Result<Value> {
        let url = self.settings.graphql_url.as_str();
        debug!(%url, "POST graphql");
        let payload = json!({ "query": query, "variables": variables });
        let response = self.octocrab._post(url, Some(&payload)).await?;
        let status = response.status();
        let body = self.octocrab.body_to_string(response).await?;

        if status != StatusCode::OK {
            return Err(ReportError::QueryExecution {
                status: status.as_u16(),
                body,
            });
        }

        let value: Value = serde_json::from_str(&body)?;
        if value.get("data").map_or(true, Value::is_null) {
            let messages: Vec<&str> = value
                .get("errors")
                .and_then(Value::as_array)
                .map(|errors| {
                    errors
                        .iter()
                        .filter_map(|e| e.get("message").and_then(Value::as_str))
                        .collect()
                })
                .unwrap_or_default();
            if !messages.is_empty() {
                return Err(ReportError::GraphQl(messages.join("; ")));
            }
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::github::test_support::client_for;
    use wiremock::matchers::{body_json, header, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const API_VERSION: &str = "2022-11-28";

    fn next_header(server: &MockServer, page: u32) -> String {
        format!("<{}/items?page={page}>; rel=\"next\"", server.uri())
    }

    #[test]
    fn settings_debug_redacts_token() {
        let settings = ClientSettings::new("ghp_secret", "https://api.github.com/");
        let rendered = format!("{settings:?}");
        assert!(!rendered.contains("ghp_secret"));
        assert_eq!(settings.api_url, "https://api.github.com");
        assert_eq!(settings.graphql_url, "https://api.github.com/graphql");
    }

    #[tokio::test]
    async fn paginate_concatenates_pages_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([3, 4]))
                    .insert_header("link", next_header(&server, 3).as_str()),
            )
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([5])))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([1, 2]))
                    .insert_header("link", next_header(&server, 2).as_str()),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let items: Vec<u32> = client.paginate(client.rest_url("/items")).await;
        assert_eq!(items, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn paginate_keeps_partial_result_on_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(403).set_body_string("forbidden"))
            .with_priority(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!(["a"]))
                    .insert_header("link", next_header(&server, 2).as_str()),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let items: Vec<String> = client.paginate(client.rest_url("/items")).await;
        assert_eq!(items, vec!["a".to_string()]);
    }

    #[tokio::test]
    async fn paginate_stops_on_no_content() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let items: Vec<Value> = client.paginate(client.rest_url("/items")).await;
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn paginate_does_not_loop_on_self_link() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([1]))
                    .insert_header(
                        "link",
                        format!("<{}/items>; rel=\"next\"", server.uri()).as_str(),
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let items: Vec<u32> = client.paginate(client.rest_url("/items")).await;
        assert_eq!(items, vec![1]);
    }

    #[tokio::test]
    async fn requests_carry_auth_and_accept_headers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(header_exists("authorization"))
            .and(header("x-github-api-version", API_VERSION))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let response = client.get(&client.rest_url("/items")).await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.next, None);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(
            requests[0].headers.get_all("x-github-api-version").iter().count(),
            1
        );
    }

    #[test]
    fn client_rejects_graphql_on_another_origin() {
        let mut settings = ClientSettings::new("ghp_abc", "http://127.0.0.1:8080");
        settings.graphql_url = "http://127.0.0.1:9090/graphql".into();
        assert!(matches!(
            GithubClient::new(&settings),
            Err(ReportError::Config(_))
        ));

        settings.graphql_url = "HTTP://127.0.0.1:8080/api/graphql".into();
        assert!(settings.ensure_same_origin().is_ok());
    }

    #[tokio::test]
    async fn graphql_request_carries_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        client.graphql("query {}", json!({})).await.unwrap();
    }

    #[tokio::test]
    async fn graphql_posts_query_and_variables() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .and(body_json(json!({
                "query": "query { viewer { login } }",
                "variables": { "owner": "acme" }
            })))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "data": { "viewer": { "login": "bot" } } })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let value = client
            .graphql("query { viewer { login } }", json!({ "owner": "acme" }))
            .await
            .unwrap();
        assert_eq!(value["data"]["viewer"]["login"], "bot");
    }

    #[tokio::test]
    async fn graphql_non_200_is_query_execution_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Bad credentials"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.graphql("query {}", json!({})).await.unwrap_err();
        match err {
            ReportError::QueryExecution { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "Bad credentials");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn graphql_errors_without_data_fail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/graphql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "errors": [{ "message": "Could not resolve to a Repository" }]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client.graphql("query {}", json!({})).await.unwrap_err();
        assert!(err.to_string().contains("Could not resolve to a Repository"));
    }
}
