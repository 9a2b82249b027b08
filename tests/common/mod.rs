#![allow(dead_code)]

use parking_lot::Mutex;
use replyrecon::{
    ContentId, ContinuationCursor, FetchError, Page, PageFetcher, PinnedLookup, ReconOptions, ReplierRecord, ReplierSet,
    Username,
};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

type Key = (String, Option<String>);
type ErrFn = fn() -> FetchError;

pub fn id(s: &str) -> ContentId {
    ContentId::parse(s).unwrap()
}

pub fn rec(name: &str) -> ReplierRecord {
    ReplierRecord::new(name)
}

pub fn names(set: &ReplierSet) -> Vec<String> {
    set.usernames().map(|u| u.to_string()).collect()
}

/// Options for tests: no pacing, no progress bars, instant retries.
pub fn quiet_opts() -> ReconOptions {
    ReconOptions::default()
        .with_api_key("test-key")
        .unpaced()
        .with_progress(false)
        .with_retry_delay_ms(0)
}

pub fn transient() -> FetchError {
    FetchError::Transient("connection reset".into())
}

pub fn auth() -> FetchError {
    FetchError::Auth("401 Unauthorized".into())
}

pub fn malformed() -> FetchError {
    FetchError::Malformed("no replies array".into())
}

pub fn server_404() -> FetchError {
    FetchError::Http { status: 404, body: "not found".into() }
}

/// In-memory replies API. Threads are scripted page by page; cursor tokens
/// are `<content>#<n>`. Unknown content answers with one empty final page.
#[derive(Default)]
pub struct StubFetcher {
    pages: HashMap<Key, (Vec<ReplierRecord>, Option<String>)>,
    queued: Mutex<HashMap<Key, VecDeque<ErrFn>>>,
    always: HashMap<String, ErrFn>,
    calls: Mutex<Vec<Key>>,
    total: AtomicUsize,
    on_call: Option<Box<dyn Fn(usize) + Send + Sync>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script a thread: one inner slice per page, in order.
    pub fn thread(mut self, content: &str, pages: &[&[&str]]) -> Self {
        for (i, page) in pages.iter().enumerate() {
            let key = (content.to_string(), if i == 0 { None } else { Some(format!("{content}#{i}")) });
            let next = if i + 1 < pages.len() { Some(format!("{content}#{}", i + 1)) } else { None };
            self.pages.insert(key, (page.iter().map(|n| rec(n)).collect(), next));
        }
        self
    }

    /// Script a single page with full records and an explicit next token.
    pub fn page(mut self, content: &str, cursor: Option<&str>, replies: Vec<ReplierRecord>, next: Option<&str>) -> Self {
        self.pages.insert((content.to_string(), cursor.map(str::to_string)), (replies, next.map(str::to_string)));
        self
    }

    /// The next call for `content` at page `index` (0 = first page) fails with `err` first.
    pub fn fail_once(self, content: &str, index: usize, err: ErrFn) -> Self {
        let key = (content.to_string(), if index == 0 { None } else { Some(format!("{content}#{index}")) });
        self.queued.lock().entry(key).or_default().push_back(err);
        self
    }

    /// Every call for `content` fails with `err`.
    pub fn fail_always(mut self, content: &str, err: ErrFn) -> Self {
        self.always.insert(content.to_string(), err);
        self
    }

    /// Invoked after each call with the running call count.
    pub fn on_call(mut self, f: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.on_call = Some(Box::new(f));
        self
    }

    pub fn total_calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, content: &str) -> usize {
        self.calls.lock().iter().filter(|(c, _)| c == content).count()
    }

    pub fn call_log(&self) -> Vec<(String, Option<String>)> {
        self.calls.lock().clone()
    }

    fn answer(&self, key: &Key, content_id: &ContentId) -> Result<Page, FetchError> {
        if let Some(err) = self.always.get(&key.0) {
            return Err(err());
        }
        if let Some(err) = self.queued.lock().get_mut(key).and_then(|q| q.pop_front()) {
            return Err(err());
        }
        match self.pages.get(key) {
            Some((replies, next)) => Ok(Page {
                replies: replies.clone(),
                next: next.as_ref().map(|t| ContinuationCursor::new(content_id.clone(), t.clone())),
            }),
            None => Ok(Page::default()),
        }
    }
}

impl PageFetcher for StubFetcher {
    fn fetch_page(&self, content_id: &ContentId, cursor: Option<&ContinuationCursor>) -> Result<Page, FetchError> {
        let key = (content_id.to_string(), cursor.map(|c| c.token().to_string()));
        self.calls.lock().push(key.clone());
        let out = self.answer(&key, content_id);
        let n = self.total.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(f) = &self.on_call {
            f(n);
        }
        out
    }
}

/// In-memory profile API: username to pinned content, or a scripted failure.
#[derive(Default)]
pub struct StubLookup {
    pinned: HashMap<String, String>,
    always: HashMap<String, ErrFn>,
    calls: AtomicUsize,
}

impl StubLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pin(mut self, user: &str, content: &str) -> Self {
        self.pinned.insert(user.to_string(), content.to_string());
        self
    }

    pub fn fail_always(mut self, user: &str, err: ErrFn) -> Self {
        self.always.insert(user.to_string(), err);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl PinnedLookup for StubLookup {
    fn pinned_content_id(&self, username: &Username) -> Result<Option<ContentId>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.always.get(username.as_str()) {
            return Err(err());
        }
        Ok(self.pinned.get(username.as_str()).map(|c| id(c)))
    }
}
