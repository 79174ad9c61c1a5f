use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_ACTIVITY_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Info,
    Prediction,
    Chat,
    Error,
}

#[derive(Debug, Clone)]
pub struct Entry {
    pub text: String,
    pub kind: Kind,
}

/// Bounded ring of recent entries; oldest entries fall off the front.
#[derive(Debug)]
pub struct ActivityLog {
    buf: VecDeque<Entry>,
    capacity: usize,
}

impl ActivityLog {
    pub fn with_capacity(capacity: usize) -> Self {
        ActivityLog {
            buf: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, entry: Entry) {
        if self.buf.len() >= self.capacity { self.buf.pop_front(); }
        self.buf.push_back(entry);
    }

    pub fn recent(&self, n: usize) -> Vec<Entry> {
        let len = self.buf.len();
        let take = n.min(len);
        self.buf.iter().skip(len - take).cloned().collect()
    }
}

static ACTIVITY_LOG: Lazy<Mutex<ActivityLog>> =
    Lazy::new(|| Mutex::new(ActivityLog::with_capacity(MAX_ACTIVITY_LINES)));

/// Record an event for the status footer and forward it to the `log` facade.
pub fn record<T: Into<String>>(kind: Kind, line: T) {
    let text = line.into();
    match kind {
        Kind::Error => log::warn!("{}", text),
        _ => log::info!("{}", text),
    }

    if let Ok(mut activity) = ACTIVITY_LOG.lock() {
        activity.push(Entry { text, kind });
    }
}

pub fn recent(n: usize) -> Vec<Entry> {
    match ACTIVITY_LOG.lock() {
        Ok(activity) => activity.recent(n),
        Err(_) => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(text: &str) -> Entry {
        Entry { text: text.to_string(), kind: Kind::Info }
    }

    #[test]
    fn test_ring_is_bounded() {
        let mut activity = ActivityLog::with_capacity(3);
        for text in ["a", "b", "c", "d", "e"] {
            activity.push(entry(text));
        }

        let texts: Vec<String> = activity.recent(10).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["c", "d", "e"]);
    }

    #[test]
    fn test_recent_takes_newest() {
        let mut activity = ActivityLog::with_capacity(10);
        for text in ["a", "b", "c"] {
            activity.push(entry(text));
        }

        let texts: Vec<String> = activity.recent(2).into_iter().map(|e| e.text).collect();
        assert_eq!(texts, vec!["b", "c"]);
        assert!(ActivityLog::with_capacity(4).recent(3).is_empty());
    }

    #[test]
    fn test_record_reaches_global_log() {
        record(Kind::Prediction, "activity-global-marker");
        assert!(recent(MAX_ACTIVITY_LINES)
            .iter()
            .any(|e| e.text == "activity-global-marker" && e.kind == Kind::Prediction));
    }
}
