use once_cell::sync::Lazy;
use std::collections::VecDeque;
use std::sync::Mutex;

const MAX_LOG_LINES: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Info,
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub text: String,
    pub kind: Kind,
}

static ACTIVITY_LOG: Lazy<Mutex<VecDeque<Entry>>> =
    Lazy::new(|| Mutex::new(VecDeque::with_capacity(MAX_LOG_LINES)));

pub fn log<T: Into<String>>(line: T) {
    log_with(Kind::Info, line);
}

pub fn success<T: Into<String>>(line: T) {
    log_with(Kind::Success, line);
}

pub fn error<T: Into<String>>(line: T) {
    log_with(Kind::Error, line);
}

pub fn log_with<T: Into<String>>(kind: Kind, line: T) {
    if let Ok(mut buf) = ACTIVITY_LOG.lock() {
        let s = line.into();
        if kind == Kind::Error {
            eprintln!("[rag-desk] {}", s);
        }
        if buf.len() >= MAX_LOG_LINES {
            buf.pop_front();
        }
        buf.push_back(Entry { text: s, kind });
    }
}

/// Last `n` entries, oldest first. The sidebar shows these as status history.
pub fn recent(n: usize) -> Vec<Entry> {
    if let Ok(buf) = ACTIVITY_LOG.lock() {
        let len = buf.len();
        let take = n.min(len);
        buf.iter().skip(len - take).cloned().collect()
    } else {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The log is process-wide, so one test covers ordering and the bound.
    #[test]
    fn test_ring_buffer() {
        for i in 0..(MAX_LOG_LINES + 5) {
            log(format!("line {}", i));
        }
        success("Ingested: a.pdf");
        error("Failed to clear documents");

        let latest = recent(1).pop().unwrap();
        assert_eq!(latest.kind, Kind::Error);
        assert_eq!(latest.text, "Failed to clear documents");

        let all = recent(usize::MAX);
        assert!(all.len() <= MAX_LOG_LINES);
        let tail = recent(2);
        assert_eq!(tail[0].text, "Ingested: a.pdf");
        assert_eq!(tail[0].kind, Kind::Success);
    }
}
