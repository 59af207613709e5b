use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

/// One user's pass from configuration to generated video.
///
/// Cloning shares the same session. Components receive it explicitly
/// instead of reaching for global state.
#[derive(Debug, Clone)]
pub struct Session {
    id: Uuid,
    view_epoch: Arc<AtomicU64>,
}

/// Snapshot of which view was active when some async work began.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewTicket(u64);

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            view_epoch: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn ticket(&self) -> ViewTicket {
        ViewTicket(self.view_epoch.load(Ordering::Acquire))
    }

    /// Whether the view that issued `ticket` is still the active one.
    pub fn is_current(&self, ticket: ViewTicket) -> bool {
        self.ticket() == ticket
    }

    /// The user navigated away; results for earlier tickets are stale.
    pub fn leave_view(&self) {
        let epoch = self.view_epoch.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(session = %self.id, epoch, "View left");
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_goes_stale_after_leaving() {
        let session = Session::new();
        let ticket = session.ticket();
        assert!(session.is_current(ticket));

        let shared = session.clone();
        shared.leave_view();
        assert!(!session.is_current(ticket));
        assert!(session.is_current(session.ticket()));
        assert_eq!(shared.id(), session.id());
    }
}
