// Blog HTTP client.
// Fetches listing pages, post pages and images over HTTP.

use async_trait::async_trait;
use reqwest::{
    Client, Response,
    header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT},
};

use crate::error::{FeedError, Result};

/// Network access used by every component that talks to the blog.
#[async_trait]
pub trait Transport: Send + Sync {
    /// GET `url` and decode the body as text.
    async fn fetch_text(&self, url: &str) -> Result<String>;

    /// GET `url` and return the raw body.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// reqwest-backed transport.
pub struct BlogClient {
    client: Client,
}

impl BlogClient {
    /// Create a client sending the given user agent.
    pub fn new(user_agent: &str) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,image/*;q=0.9,*/*;q=0.8"),
        );
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(user_agent).map_err(|e| FeedError::Other(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(FeedError::Http)?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<Response> {
        let response = self.client.get(url).send().await?;
        check_response(response)
    }
}

#[async_trait]
impl Transport for BlogClient {
    async fn fetch_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.get(url).await?;
        Ok(response.bytes().await?.to_vec())
    }
}

/// Check response status and convert errors.
fn check_response(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    Err(FeedError::Status {
        status: status.as_u16(),
        url: response.url().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn fetch_text_returns_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/post.html"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<p>hello</p>"))
            .mount(&server)
            .await;

        let client = BlogClient::new("feedreel-test").unwrap();
        let body = client
            .fetch_text(&format!("{}/post.html", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<p>hello</p>");
    }

    #[tokio::test]
    async fn error_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.html"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = BlogClient::new("feedreel-test").unwrap();
        let err = client
            .fetch_text(&format!("{}/missing.html", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, FeedError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn fetch_bytes_returns_raw_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![0xFF, 0xD8, 0xFF]))
            .mount(&server)
            .await;

        let client = BlogClient::new("feedreel-test").unwrap();
        let bytes = client
            .fetch_bytes(&format!("{}/img.jpg", server.uri()))
            .await
            .unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }
}
