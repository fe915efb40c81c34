//! HTTP plumbing shared by the adapters.
//!
//! Every adapter owns its own [`reqwest::Client`] built here: a fixed desktop
//! browser user agent, no proxy, and a per-request timeout.

use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use super::SourceError;

pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36";

/// Timeout for HTML page fetches.
pub const PAGE_TIMEOUT: Duration = Duration::from_secs(15);
/// Timeout for the curated feed endpoint, which is slower to answer.
pub const FEED_TIMEOUT: Duration = Duration::from_secs(30);

pub fn browser_client(timeout: Duration) -> Result<Client, SourceError> {
    Ok(Client::builder()
        .user_agent(USER_AGENT)
        .no_proxy()
        .timeout(timeout)
        .build()?)
}

/// GET `url` and return the body, treating non-2xx statuses as errors.
pub async fn get_text(client: &Client, url: &str) -> Result<String, SourceError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(SourceError::Status {
            url: url.to_string(),
            status: status.as_u16(),
        });
    }
    let body = resp.text().await?;
    debug!(%url, bytes = body.len(), "Fetched page");
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Match, Mock, MockServer, Request, ResponseTemplate};

    /// Compares the raw header value; the user agent contains commas.
    struct RawHeader(&'static str, &'static str);

    impl Match for RawHeader {
        fn matches(&self, request: &Request) -> bool {
            request
                .headers
                .get(self.0)
                .and_then(|v| v.to_str().ok())
                .is_some_and(|v| v == self.1)
        }
    }

    #[tokio::test]
    async fn test_get_text_sends_browser_user_agent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .and(RawHeader("user-agent", USER_AGENT))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = browser_client(PAGE_TIMEOUT).unwrap();
        let body = get_text(&client, &format!("{}/page", server.uri())).await.unwrap();
        assert_eq!(body, "<html></html>");
    }

    #[tokio::test]
    async fn test_get_text_rejects_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = browser_client(PAGE_TIMEOUT).unwrap();
        let err = get_text(&client, &server.uri()).await.unwrap_err();
        assert!(matches!(err, SourceError::Status { status: 503, .. }));
    }
}
