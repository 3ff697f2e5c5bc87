use std::time::{Duration, Instant};

/// Wall-clock timer for one in-flight query.
#[derive(Debug, Clone, Copy)]
pub struct ExchangeTimer {
    started: Instant,
}

impl ExchangeTimer {
    pub fn start() -> Self {
        ExchangeTimer {
            started: Instant::now(),
        }
    }

    #[allow(dead_code)]
    pub fn started_at(started: Instant) -> Self {
        ExchangeTimer { started }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// Whole seconds under a minute (`"45s"`), otherwise minutes to one decimal (`"2.1m"`).
pub fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs < 60.0 {
        format!("{}s", secs.round() as u64)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}
