//! Session bookkeeping
//!
//! A session is one run of the target process, or the span between two
//! resets. Timestamps are epoch milliseconds.

use chrono::Utc;
use types::SessionInfo;

/// Current wall clock time in epoch milliseconds
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Mutable session state owned by the store
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    start: i64,
}

impl Session {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            start: now_millis(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = id.into();
    }

    pub fn start_time(&self) -> i64 {
        self.start
    }

    /// Start a new measurement span at the current time
    pub fn restart(&mut self) {
        self.start = now_millis();
    }

    /// Session record for a dump taken now
    pub fn info(&self) -> SessionInfo {
        SessionInfo::new(self.id.clone(), self.start, now_millis().max(self.start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_info_times() {
        let session = Session::new("host-1");
        let info = session.info();
        assert_eq!(info.id(), "host-1");
        assert_eq!(info.start_time(), session.start_time());
        assert!(info.dump_time() >= info.start_time());
    }

    #[test]
    fn test_restart_moves_start_forward() {
        let mut session = Session::new("s");
        let before = session.start_time();
        session.restart();
        assert!(session.start_time() >= before);
        session.set_id("t");
        assert_eq!(session.id(), "t");
    }
}
