use chrono::{Duration as ChronoDuration, SecondsFormat, Utc};
use futures::StreamExt;
use serde_json::Value;
use thiserror::Error;
use url::Url;

use crate::config::Config;

const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB

/// Properties requested for each change-log entry.
const RC_PROPS: &str = "title|ids|user|timestamp|comment|tags";

/// Errors that can occur while talking to the wiki.
///
/// These cover the transport only: network issues, HTTP errors and oversized
/// or truncated bodies. Interpreting the bytes is the parsers' job.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network-level error (DNS, connection, TLS, timeout, etc.)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// HTTP response with non-2xx status code
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    /// A configured endpoint is not a valid URL
    #[error("Invalid endpoint URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    /// JSON body could not be decoded
    #[error("Invalid JSON response: {0}")]
    Json(#[from] serde_json::Error),
    /// Response body exceeded the 10MB size limit
    #[error("Response too large")]
    ResponseTooLarge,
    /// Response was incomplete (received fewer bytes than Content-Length)
    #[error("Incomplete response: expected {expected} bytes, received {received}")]
    IncompleteResponse { expected: u64, received: usize },
}

/// Narrows a digest to part of the wiki.
///
/// The default (no namespace) is the unfiltered view, the only one that is
/// cached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DigestFilter {
    pub namespace: Option<i64>,
}

impl DigestFilter {
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Diff of one revision against its parent, as returned by the revision API.
///
/// `body` is `None` when the revision is deleted or suppressed.
#[derive(Debug, Clone, PartialEq)]
pub struct RevisionDiff {
    pub revid: u64,
    pub body: Option<String>,
}

/// HTTP client for the four wiki endpoints the digest reads.
///
/// Holds no state besides the endpoints and request parameters, so it is
/// cheap to clone and safe to share between digests.
#[derive(Debug, Clone)]
pub struct WikiClient {
    http: reqwest::Client,
    index_url: Url,
    api_url: Url,
    tag: String,
    limit: u32,
    days: u32,
}

impl WikiClient {
    pub fn new(http: reqwest::Client, config: &Config) -> Result<Self, FetchError> {
        Ok(Self {
            http,
            index_url: Url::parse(&config.index_url)?,
            api_url: Url::parse(&config.api_url)?,
            tag: config.tag.clone(),
            limit: config.limit,
            days: config.days,
        })
    }

    /// RecentChanges syndication feed, raw bytes.
    pub async fn fetch_feed(&self, filter: &DigestFilter) -> Result<Vec<u8>, FetchError> {
        let mut url = self.index_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("title", "Special:RecentChanges")
                .append_pair("feed", "rss")
                .append_pair("tagfilter", &self.tag)
                .append_pair("days", &self.days.to_string())
                .append_pair("limit", &self.limit.to_string());
            if let Some(ns) = filter.namespace {
                query.append_pair("namespace", &ns.to_string());
            }
        }
        self.get(url).await
    }

    /// RecentChanges API listing over the same window as the feed, raw bytes.
    pub async fn fetch_change_log(&self, filter: &DigestFilter) -> Result<Vec<u8>, FetchError> {
        let window_start = (Utc::now() - ChronoDuration::days(i64::from(self.days)))
            .to_rfc3339_opts(SecondsFormat::Secs, true);

        let mut url = self.api_url.clone();
        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("action", "query")
                .append_pair("list", "recentchanges")
                .append_pair("format", "json")
                .append_pair("formatversion", "2")
                .append_pair("rcprop", RC_PROPS)
                .append_pair("rctag", &self.tag)
                .append_pair("rclimit", &self.limit.to_string())
                .append_pair("rcend", &window_start);
            if let Some(ns) = filter.namespace {
                query.append_pair("rcnamespace", &ns.to_string());
            }
        }
        self.get(url).await
    }

    /// Diffs against the previous revision for each id in `revids`.
    ///
    /// Revisions the API omits entirely are simply absent from the result.
    pub async fn fetch_revision_diffs(
        &self,
        revids: &[u64],
    ) -> Result<Vec<RevisionDiff>, FetchError> {
        let ids = revids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join("|");

        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("action", "query")
            .append_pair("prop", "revisions")
            .append_pair("format", "json")
            .append_pair("formatversion", "2")
            .append_pair("rvprop", "ids")
            .append_pair("rvdiffto", "prev")
            .append_pair("revids", &ids);

        let bytes = self.get(url).await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(revision_diffs_from_response(&body))
    }

    /// Diff between an explicit revision pair.
    ///
    /// A `from` of 0 (page creation) has no earlier revision to compare
    /// against, so the creation is fetched as its own diff against the empty
    /// page through the revision API instead.
    pub async fn fetch_comparison(&self, from: u64, to: u64) -> Result<Option<String>, FetchError> {
        if from == 0 {
            let diffs = self.fetch_revision_diffs(&[to]).await?;
            return Ok(diffs
                .into_iter()
                .find(|diff| diff.revid == to)
                .and_then(|diff| diff.body));
        }

        let mut url = self.api_url.clone();
        url.query_pairs_mut()
            .append_pair("action", "compare")
            .append_pair("format", "json")
            .append_pair("formatversion", "2")
            .append_pair("fromrev", &from.to_string())
            .append_pair("torev", &to.to_string());

        let bytes = self.get(url).await?;
        let body: Value = serde_json::from_slice(&bytes)?;
        Ok(body
            .get("compare")
            .and_then(|c| c.get("body"))
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string))
    }

    async fn get(&self, url: Url) -> Result<Vec<u8>, FetchError> {
        tracing::debug!(url = %url, "Fetching");
        let response = self.http.get(url.clone()).send().await?;

        if !response.status().is_success() {
            tracing::warn!(url = %url, status = %response.status(), "Wiki request failed");
            return Err(FetchError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_RESPONSE_SIZE).await
    }
}

/// Flattens `query.pages[].revisions[]` into per-revision diffs.
fn revision_diffs_from_response(body: &Value) -> Vec<RevisionDiff> {
    let Some(pages) = body
        .get("query")
        .and_then(|q| q.get("pages"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    pages
        .iter()
        .filter_map(|page| page.get("revisions").and_then(Value::as_array))
        .flatten()
        .filter_map(|rev| {
            let revid = rev.get("revid").and_then(Value::as_u64)?;
            let body = rev
                .get("diff")
                .and_then(|d| d.get("body"))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string);
            Some(RevisionDiff { revid, body })
        })
        .collect()
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    let expected_length = response.content_length();

    if let Some(len) = expected_length {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(FetchError::Network)?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    if let Some(expected) = expected_length {
        if (bytes.len() as u64) < expected {
            return Err(FetchError::IncompleteResponse {
                expected,
                received: bytes.len(),
            });
        }
    }

    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WikiClient {
        let config = Config {
            index_url: format!("{}/w/index.php", server.uri()),
            api_url: format!("{}/w/api.php", server.uri()),
            ..Config::default()
        };
        WikiClient::new(reqwest::Client::new(), &config).unwrap()
    }

    #[tokio::test]
    async fn test_feed_request_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/index.php"))
            .and(query_param("title", "Special:RecentChanges"))
            .and(query_param("feed", "rss"))
            .and(query_param("namespace", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<rss/>"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client
            .fetch_feed(&DigestFilter { namespace: Some(1) })
            .await
            .unwrap();
        assert_eq!(body, b"<rss/>");
    }

    #[tokio::test]
    async fn test_change_log_request_parameters() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/w/api.php"))
            .and(query_param("list", "recentchanges"))
            .and(query_param("rcprop", RC_PROPS))
            .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client
            .fetch_change_log(&DigestFilter::default())
            .await
            .unwrap();
        assert_eq!(body, b"{}");
    }

    #[tokio::test]
    async fn test_http_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1) // no retries at this layer
            .mount(&server)
            .await;

        let client = client_for(&server);
        match client.fetch_feed(&DigestFilter::default()).await {
            Err(FetchError::HttpStatus(503)) => {}
            other => panic!("Expected HttpStatus(503), got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_revision_diffs() {
        let server = MockServer::start().await;
        let body = serde_json::json!({
            "query": { "pages": [
                { "pageid": 1, "revisions": [
                    { "revid": 11, "parentid": 10, "diff": { "from": 10, "to": 11, "body": "<tr></tr>" } },
                    { "revid": 12, "parentid": 11, "diff": { "from": 11, "to": 12, "body": "" } }
                ]},
                { "pageid": 2, "revisions": [
                    { "revid": 21, "parentid": 20, "diff": { "notcached": true } }
                ]}
            ]}
        });
        Mock::given(method("GET"))
            .and(query_param("revids", "11|12|21"))
            .and(query_param("rvdiffto", "prev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let diffs = client.fetch_revision_diffs(&[11, 12, 21]).await.unwrap();
        assert_eq!(
            diffs,
            vec![
                RevisionDiff { revid: 11, body: Some("<tr></tr>".to_string()) },
                RevisionDiff { revid: 12, body: None },
                RevisionDiff { revid: 21, body: None },
            ]
        );
    }

    #[tokio::test]
    async fn test_comparison() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "compare"))
            .and(query_param("fromrev", "5"))
            .and(query_param("torev", "6"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "compare": { "fromrevid": 5, "torevid": 6, "body": "<tr><td>x</td></tr>" }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let body = client.fetch_comparison(5, 6).await.unwrap();
        assert_eq!(body.as_deref(), Some("<tr><td>x</td></tr>"));
    }

    #[tokio::test]
    async fn test_comparison_of_page_creation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("action", "compare"))
            .respond_with(ResponseTemplate::new(500))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("prop", "revisions"))
            .and(query_param("revids", "9"))
            .and(query_param("rvdiffto", "prev"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": { "pages": [ { "pageid": 3, "revisions": [
                    { "revid": 9, "parentid": 0, "diff": { "to": 9, "body": "<tr><td>created</td></tr>" } }
                ]}]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.fetch_comparison(0, 9).await.unwrap().as_deref(),
            Some("<tr><td>created</td></tr>")
        );
    }

    #[tokio::test]
    async fn test_comparison_of_deleted_creation() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("revids", "9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": { "badrevids": { "9": { "revid": 9 } } }
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(client.fetch_comparison(0, 9).await.unwrap(), None);
    }
}
