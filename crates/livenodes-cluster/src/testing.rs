//! In-memory transport for unit tests

use crate::discovery::NodeListTransport;
use livenodes_core::DiscoveryFailure;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;

type Reply = Result<Value, DiscoveryFailure>;

#[derive(Default)]
struct Inner {
    replies: Mutex<VecDeque<Reply>>,
    /// Answer given once `replies` runs dry
    fallback: Mutex<Option<Reply>>,
    requests: Mutex<Vec<String>>,
}

/// Replays queued replies and records every requested URL
#[derive(Clone, Default)]
pub(crate) struct MockTransport {
    inner: Arc<Inner>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push_ok(&self, body: Value) {
        self.inner.replies.lock().push_back(Ok(body));
    }

    pub(crate) fn push_err(&self, failure: DiscoveryFailure) {
        self.inner.replies.lock().push_back(Err(failure));
    }

    pub(crate) fn set_fallback(&self, reply: Reply) {
        *self.inner.fallback.lock() = Some(reply);
    }

    pub(crate) fn requests(&self) -> Vec<String> {
        self.inner.requests.lock().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.inner.requests.lock().len()
    }
}

impl NodeListTransport for MockTransport {
    async fn get_json(&self, url: &str) -> Reply {
        self.inner.requests.lock().push(url.to_string());

        if let Some(reply) = self.inner.replies.lock().pop_front() {
            return reply;
        }
        self.inner
            .fallback
            .lock()
            .clone()
            .unwrap_or_else(|| Err(DiscoveryFailure::Transport("no reply queued".into())))
    }
}
