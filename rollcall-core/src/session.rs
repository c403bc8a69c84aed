use std::collections::BTreeSet;
use std::fmt;

use chrono::{DateTime, Utc};

/// Displayed accuracy for a recognizer distance: `clamp(100 - distance, 0, 100)`.
pub fn display_accuracy(distance: f64) -> f64 {
    if distance.is_nan() {
        return 0.0;
    }
    (100.0 - distance).clamp(0.0, 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Counters {
    pub recognized: usize,
    pub remaining: usize,
}

impl Counters {
    pub fn new(roster_len: usize, recognized: usize) -> Self {
        Self {
            recognized,
            remaining: roster_len.saturating_sub(recognized),
        }
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Recognized: {} / Remaining: {}", self.recognized, self.remaining)
    }
}

/// Names recognized during one run of the loop.
#[derive(Debug, Clone)]
pub struct Session {
    roster_len: usize,
    recognized: BTreeSet<String>,
    started_at: DateTime<Utc>,
}

impl Session {
    pub fn new(roster_len: usize) -> Self {
        Self {
            roster_len,
            recognized: BTreeSet::new(),
            started_at: Utc::now(),
        }
    }

    /// Returns `true` the first time a name is seen.
    pub fn record(&mut self, name: &str) -> bool {
        // Names repeat on almost every frame; skip the allocation once seen.
        if self.recognized.contains(name) {
            return false;
        }
        self.recognized.insert(name.to_string())
    }

    pub fn recognized(&self) -> &BTreeSet<String> {
        &self.recognized
    }

    pub fn counters(&self) -> Counters {
        Counters::new(self.roster_len, self.recognized.len())
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accuracy_bounds() {
        assert_eq!(display_accuracy(0.0), 100.0);
        assert_eq!(display_accuracy(100.0), 0.0);
        assert_eq!(display_accuracy(250.0), 0.0);
        assert_eq!(display_accuracy(-20.0), 100.0);
        assert!((display_accuracy(12.5) - 87.5).abs() < f64::EPSILON);
        assert_eq!(display_accuracy(f64::NAN), 0.0);
    }

    #[test]
    fn test_fresh_session_counters() {
        let session = Session::new(4);
        assert_eq!(session.counters(), Counters { recognized: 0, remaining: 4 });
        assert_eq!(session.counters().to_string(), "Recognized: 0 / Remaining: 4");
    }

    #[test]
    fn test_record_is_idempotent() {
        let mut session = Session::new(3);
        assert!(session.record("Ada"));
        assert!(session.record("Lin"));
        assert!(!session.record("Ada"));
        assert_eq!(session.counters(), Counters { recognized: 2, remaining: 1 });
        assert!(session.recognized().contains("Lin"));
        assert!(!session.recognized().contains("Grace"));
    }

    #[test]
    fn test_remaining_never_negative() {
        let mut session = Session::new(1);
        session.record("Ada");
        session.record("Ada Lovelace");
        assert_eq!(session.counters().remaining, 0);
    }
}
