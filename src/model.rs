//! Subjects, replier records, and the ordered first-seen replier set.

use ahash::AHashMap;
use anyhow::{anyhow, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Identifier of one piece of content (a post/tweet ID).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentId(String);

fn status_url_re() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(?:https?://)?(?:www\.|mobile\.)?(?:x|twitter)\.com/[^/]+/status(?:es)?/([0-9A-Za-z_]+)").ok()
    })
    .as_ref()
}

impl ContentId {
    /// Accepts a bare ID or a status URL (`https://x.com/<user>/status/<id>`).
    pub fn parse(raw: &str) -> Result<Self> {
        let s = raw.trim();
        if s.is_empty() {
            return Err(anyhow!("content id must not be empty"));
        }
        if let Some(caps) = status_url_re().and_then(|re| re.captures(s)) {
            if let Some(id) = caps.get(1) {
                return Ok(Self(id.as_str().to_string()));
            }
        }
        if s.contains('/') || s.chars().any(char::is_whitespace) {
            return Err(anyhow!("not a content id or status url: {s}"));
        }
        Ok(Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A user handle. Leading `@` and surrounding whitespace are stripped;
/// comparison is exact, matching the upstream API.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Username(String);

impl Username {
    pub fn new(raw: impl AsRef<str>) -> Self {
        let s = raw.as_ref().trim();
        Self(s.strip_prefix('@').unwrap_or(s).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Username {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// One user seen replying to a piece of content. Identity is `username`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplierRecord {
    pub username: Username,
    pub display_name: String,
    pub profile_picture_url: String,
    pub follower_count: u64,
}

impl ReplierRecord {
    pub fn new(username: impl AsRef<str>) -> Self {
        Self {
            username: Username::new(username),
            display_name: String::new(),
            profile_picture_url: String::new(),
            follower_count: 0,
        }
    }

    pub fn profile_url(&self) -> String {
        format!("https://x.com/{}", self.username)
    }
}

/// Opaque pagination token, bound to the content it was issued for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContinuationCursor {
    content_id: ContentId,
    token: String,
}

impl ContinuationCursor {
    pub fn new(content_id: ContentId, token: impl Into<String>) -> Self {
        Self { content_id, token: token.into() }
    }

    pub fn content_id(&self) -> &ContentId {
        &self.content_id
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    /// True if this cursor may be used to continue `content_id`.
    pub fn issued_for(&self, content_id: &ContentId) -> bool {
        &self.content_id == content_id
    }
}

/// One page of replies. `next == None` means the thread is exhausted.
#[derive(Clone, Debug, Default)]
pub struct Page {
    pub replies: Vec<ReplierRecord>,
    pub next: Option<ContinuationCursor>,
}

impl Page {
    pub fn last(replies: Vec<ReplierRecord>) -> Self {
        Self { replies, next: None }
    }
}

/// Ordered, username-unique set of repliers. Order is first-seen order;
/// a later sighting of the same username is dropped, not merged.
#[derive(Clone, Debug, Default)]
pub struct ReplierSet {
    records: Vec<ReplierRecord>,
    index: AHashMap<Username, usize>,
}

impl ReplierSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the username was already present.
    pub fn insert(&mut self, record: ReplierRecord) -> bool {
        if self.index.contains_key(&record.username) {
            return false;
        }
        self.index.insert(record.username.clone(), self.records.len());
        self.records.push(record);
        true
    }

    /// Append a page in order; returns how many records were new.
    pub fn extend_page(&mut self, replies: impl IntoIterator<Item = ReplierRecord>) -> usize {
        let mut added = 0;
        for r in replies {
            if self.insert(r) {
                added += 1;
            }
        }
        added
    }

    pub fn contains(&self, username: &Username) -> bool {
        self.index.contains_key(username)
    }

    pub fn get(&self, username: &Username) -> Option<&ReplierRecord> {
        self.index.get(username).and_then(|&i| self.records.get(i))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplierRecord> {
        self.records.iter()
    }

    pub fn usernames(&self) -> impl Iterator<Item = &Username> {
        self.records.iter().map(|r| &r.username)
    }

    /// Records of `self` whose username is absent from `other`, in `self` order.
    pub fn difference<'a>(&'a self, other: &ReplierSet) -> Vec<&'a ReplierRecord> {
        self.records.iter().filter(|r| !other.contains(&r.username)).collect()
    }
}

impl FromIterator<ReplierRecord> for ReplierSet {
    fn from_iter<I: IntoIterator<Item = ReplierRecord>>(iter: I) -> Self {
        let mut set = ReplierSet::new();
        set.extend_page(iter);
        set
    }
}

impl<'a> IntoIterator for &'a ReplierSet {
    type Item = &'a ReplierRecord;
    type IntoIter = std::slice::Iter<'a, ReplierRecord>;
    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_id_from_status_url() {
        let id = ContentId::parse("https://x.com/someone/status/1845501234567890123?s=20").unwrap();
        assert_eq!(id.as_str(), "1845501234567890123");
        let id = ContentId::parse("  twitter.com/a_b/status/42 ").unwrap();
        assert_eq!(id.as_str(), "42");
        assert_eq!(ContentId::parse("987").unwrap().as_str(), "987");
    }

    #[test]
    fn content_id_rejects_empty_and_paths() {
        assert!(ContentId::parse("   ").is_err());
        assert!(ContentId::parse("https://example.com/foo").is_err());
    }

    #[test]
    fn username_strips_at() {
        assert_eq!(Username::new(" @alice ").as_str(), "alice");
    }

    #[test]
    fn first_occurrence_wins() {
        let mut set = ReplierSet::new();
        let mut first = ReplierRecord::new("alice");
        first.follower_count = 10;
        let mut second = ReplierRecord::new("alice");
        second.follower_count = 99;
        assert!(set.insert(first));
        assert!(!set.insert(second));
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(&Username::new("alice")).unwrap().follower_count, 10);
    }

    #[test]
    fn difference_keeps_self_order() {
        let a: ReplierSet = ["c", "a", "b"].into_iter().map(ReplierRecord::new).collect();
        let b: ReplierSet = ["a"].into_iter().map(ReplierRecord::new).collect();
        let d: Vec<&str> = a.difference(&b).iter().map(|r| r.username.as_str()).collect();
        assert_eq!(d, vec!["c", "b"]);
    }
}
