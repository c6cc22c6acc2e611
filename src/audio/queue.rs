use chrono::{DateTime, Utc};
use serenity::model::id::UserId;
use std::{collections::VecDeque, fmt};

use crate::{
    error::{MusicError, MusicResult},
    sources::youtube::is_youtube_url,
};

/// How a request will be resolved. Decided once, when the command arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Url,
    Search,
}

impl RequestKind {
    pub fn classify(query: &str) -> Self {
        if is_youtube_url(query) {
            RequestKind::Url
        } else {
            RequestKind::Search
        }
    }
}

/// A song request as typed by the user.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackRequest {
    query: String,
    kind: RequestKind,
    requested_by: UserId,
    requested_at: DateTime<Utc>,
}

impl PlaybackRequest {
    pub fn new(query: impl Into<String>, requested_by: UserId) -> Self {
        let query = query.into();
        Self {
            kind: RequestKind::classify(&query),
            query,
            requested_by,
            requested_at: Utc::now(),
        }
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn kind(&self) -> RequestKind {
        self.kind
    }

    pub fn requested_by(&self) -> UserId {
        self.requested_by
    }

    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }
}

impl fmt::Display for PlaybackRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.query)
    }
}

/// FIFO of pending requests for one session.
///
/// Not synchronised: the owning session serialises every access.
#[derive(Debug, Default)]
pub struct RequestQueue {
    items: VecDeque<PlaybackRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, request: PlaybackRequest) {
        self.items.push_back(request);
    }

    pub fn dequeue_front(&mut self) -> MusicResult<PlaybackRequest> {
        self.items.pop_front().ok_or(MusicError::EmptyQueue)
    }

    /// Read-only view of the pending items, front first.
    ///
    /// The iterator is `Clone`, so a caller can walk it more than once.
    pub fn snapshot(&self) -> impl Iterator<Item = &PlaybackRequest> + Clone + '_ {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
