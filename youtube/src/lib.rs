pub mod models;

use std::fmt;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/youtube/v3/";

#[derive(Clone)]
pub enum Authorization {
    Bearer(String),
    ApiKey(String),
}

impl fmt::Debug for Authorization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Authorization::Bearer(_) => f.write_str("Bearer(..)"),
            Authorization::ApiKey(_) => f.write_str("ApiKey(..)"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Client {
    auth: Authorization,
    reqwest: reqwest::Client,
    base_url: Url,
}

impl Client {
    /// # Panics
    /// Never, the default base url is a valid constant.
    #[must_use]
    pub fn new(auth: Authorization, reqwest: reqwest::Client) -> Self {
        #[allow(clippy::expect_used)]
        let base_url = DEFAULT_BASE_URL.parse().expect("default base url is valid");
        Client {
            auth,
            reqwest,
            base_url,
        }
    }

    /// Point the client at another host, the url should end with a `/`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path)?)
    }

    async fn get<T: DeserializeOwned>(&self, mut url: Url) -> Result<T, Error> {
        let request = match &self.auth {
            Authorization::ApiKey(key) => {
                url.query_pairs_mut().append_pair("key", key);
                self.reqwest.get(url)
            }
            Authorization::Bearer(token) => self.reqwest.get(url).bearer_auth(token),
        };
        let response = request.send().await?;
        handle_response(response).await
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("The provided authorization is invalid")]
    Unauthorized,
    #[error("The request was refused, the quota may be exhausted")]
    Forbidden,
    #[error("The requested resource could not be found")]
    NotFound,
    #[error("request failed with status code: {0}")]
    Status(StatusCode),
    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),
    #[error(transparent)]
    ReqwestError(#[from] reqwest::Error),
    #[error(transparent)]
    DeserializationError(#[from] serde_json::Error),
}

async fn handle_response<T: DeserializeOwned>(res: reqwest::Response) -> Result<T, Error> {
    match res.status() {
        StatusCode::UNAUTHORIZED => return Err(Error::Unauthorized),
        StatusCode::FORBIDDEN => return Err(Error::Forbidden),
        StatusCode::NOT_FOUND => return Err(Error::NotFound),
        status if !status.is_success() => return Err(Error::Status(status)),
        _ => {}
    }
    let body = res.text().await?;
    match serde_json::from_str(&body) {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::trace!(body = body, "error deserializing response: {}", e);
            Err(Error::DeserializationError(e))
        }
    }
}

pub mod search {
    use chrono::{DateTime, SecondsFormat, Utc};
    use url::Url;

    use crate::models::ListResponse;
    use crate::{Client, Error};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum Order {
        Date,
        Rating,
        Relevance,
        Title,
        VideoCount,
        ViewCount,
    }

    impl Order {
        #[must_use]
        pub fn as_str(self) -> &'static str {
            match self {
                Order::Date => "date",
                Order::Rating => "rating",
                Order::Relevance => "relevance",
                Order::Title => "title",
                Order::VideoCount => "videoCount",
                Order::ViewCount => "viewCount",
            }
        }
    }

    #[derive(Debug, Clone, Default)]
    pub struct Params<S: AsRef<str> = String> {
        pub channel_id: Option<S>,
        pub published_after: Option<DateTime<Utc>>,
        pub max_results: Option<u32>,
        pub order: Option<Order>,
        pub page_token: Option<S>,
    }

    impl<S: AsRef<str>> Params<S> {
        fn append_query_params(&self, url: &mut Url) {
            let mut pairs = url.query_pairs_mut();
            if let Some(channel_id) = &self.channel_id {
                pairs.append_pair("channelId", channel_id.as_ref());
            }
            if let Some(published_after) = &self.published_after {
                let formatted = published_after.to_rfc3339_opts(SecondsFormat::Secs, true);
                pairs.append_pair("publishedAfter", &formatted);
            }
            if let Some(max_results) = &self.max_results {
                pairs.append_pair("maxResults", &max_results.to_string());
            }
            if let Some(order) = &self.order {
                pairs.append_pair("order", order.as_str());
            }
            if let Some(page_token) = &self.page_token {
                pairs.append_pair("pageToken", page_token.as_ref());
            }
        }
    }

    /// Fetch a single page of search results, always with the `snippet` part.
    ///
    /// # Errors
    /// [`Error::Unauthorized`]: If the client is not authorized to make the request.
    /// [`Error::Forbidden`]: If the request was refused, usually an exhausted quota.
    /// [`Error::DeserializationError`]: If the response does not match the expected format.
    pub async fn list<S>(client: &Client, params: &Params<S>) -> Result<ListResponse, Error>
    where
        S: AsRef<str>,
    {
        let mut url = client.endpoint("search")?;
        url.query_pairs_mut().append_pair("part", "snippet");
        params.append_query_params(&mut url);
        tracing::debug!(%url, "searching");
        client.get(url).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn client_for(server: &MockServer, auth: Authorization) -> Client {
        let base_url = format!("{}/", server.uri()).parse().unwrap();
        Client::new(auth, reqwest::Client::new()).with_base_url(base_url)
    }

    fn page() -> serde_json::Value {
        json!({
            "kind": "youtube#searchListResponse",
            "nextPageToken": "CDIQAA",
            "pageInfo": { "totalResults": 51, "resultsPerPage": 50 },
            "items": [{
                "kind": "youtube#searchResult",
                "id": { "kind": "youtube#video", "videoId": "v1" },
                "snippet": {
                    "publishedAt": "2024-01-02T10:00:00Z",
                    "channelId": "C1",
                    "title": "Show Ep 1",
                    "description": "",
                    "channelTitle": "Channel"
                }
            }]
        })
    }

    #[tokio::test]
    async fn test_search_sends_query_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("part", "snippet"))
            .and(query_param("channelId", "C1"))
            .and(query_param("publishedAfter", "2024-01-01T00:00:00Z"))
            .and(query_param("maxResults", "50"))
            .and(query_param("order", "date"))
            .and(query_param("key", "secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Authorization::ApiKey("secret".into()));
        let params = search::Params {
            channel_id: Some("C1"),
            published_after: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            max_results: Some(50),
            order: Some(search::Order::Date),
            page_token: None,
        };
        let response = search::list(&client, &params).await.unwrap();

        assert_eq!(response.next_page_token.as_deref(), Some("CDIQAA"));
        assert_eq!(response.page_info.total_results, 51);
        assert_eq!(response.items.len(), 1);
        let item = &response.items[0];
        assert_eq!(item.id.video_id.as_deref(), Some("v1"));
        assert_eq!(item.snippet.title, "Show Ep 1");
        assert_eq!(
            item.snippet.published_at,
            Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_bearer_token_is_sent_as_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(header("authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(page()))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Authorization::Bearer("token".into()));
        let params = search::Params::<String>::default();
        assert!(search::list(&client, &params).await.is_ok());
    }

    #[tokio::test]
    async fn test_unauthorized_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server, Authorization::ApiKey("bad".into()));
        let result = search::list(&client, &search::Params::<String>::default()).await;
        assert!(matches!(result, Err(Error::Unauthorized)));
    }

    #[tokio::test]
    async fn test_server_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = client_for(&server, Authorization::ApiKey("key".into()));
        let result = search::list(&client, &search::Params::<String>::default()).await;
        assert!(matches!(result, Err(Error::Status(s)) if s == StatusCode::SERVICE_UNAVAILABLE));
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"items\": 3}"))
            .mount(&server)
            .await;

        let client = client_for(&server, Authorization::ApiKey("key".into()));
        let result = search::list(&client, &search::Params::<String>::default()).await;
        assert!(matches!(result, Err(Error::DeserializationError(_))));
    }

    #[test]
    fn test_authorization_debug_hides_secret() {
        let auth = Authorization::ApiKey("secret".into());
        assert_eq!(format!("{auth:?}"), "ApiKey(..)");
        let bearer = Authorization::Bearer("secret".into());
        assert_eq!(format!("{bearer:?}"), "Bearer(..)");
    }
}
