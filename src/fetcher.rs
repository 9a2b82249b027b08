//! Outbound calls: the two traits the engine depends on, the wire parsing,
//! and the reqwest-backed client that implements both.

use crate::config::ReconOptions;
use crate::error::FetchError;
use crate::model::{ContentId, ContinuationCursor, Page, ReplierRecord, Username};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Value;

/// Fetches one page of replies for a piece of content.
pub trait PageFetcher: Send + Sync {
    /// `cursor == None` requests the first page.
    fn fetch_page(&self, content_id: &ContentId, cursor: Option<&ContinuationCursor>) -> Result<Page, FetchError>;
}

/// Looks up a user's pinned content.
pub trait PinnedLookup: Send + Sync {
    fn pinned_content_id(&self, username: &Username) -> Result<Option<ContentId>, FetchError>;
}

#[derive(Deserialize)]
struct WireReply {
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct WireUser {
    username: Option<String>,
    name: Option<String>,
    profile_pic_url: Option<String>,
    follower_count: Option<u64>,
}

/// Turn a replies payload into a page. Missing `replies` is `Malformed`;
/// individual replies without a username are skipped.
pub fn parse_replies_page(content_id: &ContentId, body: &Value) -> Result<Page, FetchError> {
    let replies = body
        .get("replies")
        .and_then(Value::as_array)
        .ok_or_else(|| FetchError::Malformed(format!("no replies array for {content_id}")))?;

    let records = replies
        .iter()
        .filter_map(|r| serde_json::from_value::<WireReply>(r.clone()).ok())
        .filter_map(|r| r.user)
        .filter_map(|u| {
            let name = u.username.filter(|s| !s.trim().is_empty())?;
            Some(ReplierRecord {
                username: Username::new(name),
                display_name: u.name.unwrap_or_default(),
                profile_picture_url: u.profile_pic_url.unwrap_or_default(),
                follower_count: u.follower_count.unwrap_or(0),
            })
        })
        .collect();

    let next = body
        .get("continuation_token")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| ContinuationCursor::new(content_id.clone(), t));

    Ok(Page { replies: records, next })
}

/// Only the first pinned ID is used; absent or empty means none.
pub fn parse_pinned(body: &Value) -> Option<ContentId> {
    body.pointer("/result/data/user/result/legacy/pinned_tweet_ids_str/0")
        .and_then(Value::as_str)
        .and_then(|s| ContentId::parse(s).ok())
}

fn classify_status(status: StatusCode, body: String) -> FetchError {
    match status.as_u16() {
        401 | 403 => FetchError::Auth(format!("{status}: {body}")),
        408 | 429 => FetchError::Transient(format!("{status}")),
        s if status.is_server_error() => FetchError::Transient(format!("{s}")),
        s => FetchError::Http { status: s, body },
    }
}

/// Blocking HTTP client for the replies and profile endpoints.
/// The credential is owned here and sent per request; nothing is global.
pub struct HttpFetcher {
    client: Client,
    replies_url: String,
    continuation_url: String,
    profile_url: String,
    api_key: String,
}

impl HttpFetcher {
    pub fn new(opts: &ReconOptions) -> Result<Self> {
        for (name, url) in [
            ("replies", &opts.replies_url),
            ("continuation", &opts.continuation_url),
            ("profile", &opts.profile_url),
        ] {
            reqwest::Url::parse(url).with_context(|| format!("invalid {name} endpoint {url:?}"))?;
        }
        let client = Client::builder()
            .timeout(opts.request_timeout())
            .user_agent(concat!("replyrecon/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            replies_url: opts.replies_url.clone(),
            continuation_url: opts.continuation_url.clone(),
            profile_url: opts.profile_url.clone(),
            api_key: opts.api_key.clone(),
        })
    }

    fn get_json(&self, url: &str, params: &[(&str, &str)]) -> Result<Value, FetchError> {
        let host = reqwest::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_default();
        let resp = self
            .client
            .get(url)
            .query(params)
            .header("x-rapidapi-key", &self.api_key)
            .header("x-rapidapi-host", host)
            .send()?;
        let status = resp.status();
        let text = resp.text()?;
        if !status.is_success() {
            return Err(classify_status(status, text));
        }
        serde_json::from_str(&text).map_err(|e| FetchError::Malformed(format!("{url}: {e}")))
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch_page(&self, content_id: &ContentId, cursor: Option<&ContinuationCursor>) -> Result<Page, FetchError> {
        let body = match cursor {
            Some(c) => {
                if !c.issued_for(content_id) {
                    return Err(FetchError::CursorMismatch {
                        issued_for: c.content_id().clone(),
                        used_with: content_id.clone(),
                    });
                }
                tracing::debug!(%content_id, "fetching continuation page");
                self.get_json(
                    &self.continuation_url,
                    &[("tweet_id", content_id.as_str()), ("continuation_token", c.token())],
                )?
            }
            None => {
                tracing::debug!(%content_id, "fetching first page");
                self.get_json(&self.replies_url, &[("tweet_id", content_id.as_str())])?
            }
        };
        parse_replies_page(content_id, &body)
    }
}

impl PinnedLookup for HttpFetcher {
    fn pinned_content_id(&self, username: &Username) -> Result<Option<ContentId>, FetchError> {
        let body = self.get_json(&self.profile_url, &[("username", username.as_str())])?;
        Ok(parse_pinned(&body))
    }
}
