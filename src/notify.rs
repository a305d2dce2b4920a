//! Transient user-facing notices ("toasts").
//!
//! Search failures and player fail-safe resets push a notice here; the UI
//! shows the most recent one for a short while.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const MAX_NOTICES: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Info,
    Error,
}

#[derive(Debug, Clone)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
    pub at: Instant,
}

#[derive(Debug, Clone, Default)]
pub struct Notices {
    inner: Arc<Mutex<VecDeque<Notice>>>,
}

impl Notices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_info(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Info, message.into());
    }

    pub fn push_error(&self, message: impl Into<String>) {
        self.push(NoticeLevel::Error, message.into());
    }

    fn push(&self, level: NoticeLevel, message: String) {
        if let Ok(mut q) = self.inner.lock() {
            if q.len() == MAX_NOTICES {
                q.pop_front();
            }
            q.push_back(Notice {
                level,
                message,
                at: Instant::now(),
            });
        }
    }

    /// The newest notice, if it was pushed less than `ttl` ago.
    pub fn latest(&self, ttl: Duration) -> Option<Notice> {
        let q = self.inner.lock().ok()?;
        q.back().filter(|n| n.at.elapsed() < ttl).cloned()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|q| q.len()).unwrap_or(0)
    }
}
