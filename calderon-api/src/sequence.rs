//! Request sequencing for views that refetch on every filter change.
//!
//! Each fetch takes a [`RequestTicket`] before it starts. When the response
//! arrives, it is only applied if its ticket is still the latest one issued;
//! anything older lost the race to a newer request and is discarded.

use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic id of one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestTicket(u64);

impl RequestTicket {
    pub fn id(&self) -> u64 {
        self.0
    }
}

/// Issues tickets and answers whether a ticket is still current.
///
/// Safe to share between tasks (`Arc<RequestSequencer>`).
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue the next ticket; it supersedes every ticket issued before it.
    pub fn issue(&self) -> RequestTicket {
        RequestTicket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Latest ticket issued, if any.
    pub fn latest(&self) -> Option<RequestTicket> {
        match self.latest.load(Ordering::SeqCst) {
            0 => None,
            id => Some(RequestTicket(id)),
        }
    }

    pub fn is_current(&self, ticket: RequestTicket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}
