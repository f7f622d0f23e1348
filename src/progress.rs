use tracing::info;

/// One-way progress notifications, consumed by whatever drives the core.
/// Calls are synchronous; a slow sink stalls the operation.
pub trait ProgressSink {
    fn on_message(&mut self, text: &str);

    fn on_progress(&mut self, text: &str, percent: u8) {
        let _ = percent;
        self.on_message(text);
    }
}

/// Prints to stdout and mirrors into the log.
#[derive(Debug, Default)]
pub struct ConsoleSink {
    pub quiet: bool,
}

impl ProgressSink for ConsoleSink {
    fn on_message(&mut self, text: &str) {
        info!("{text}");
        if !self.quiet {
            println!("{text}");
        }
    }

    fn on_progress(&mut self, text: &str, percent: u8) {
        info!(percent, "{text}");
        if !self.quiet {
            println!("[{percent:>3}%] {text}");
        }
    }
}

/// Percentage of `done` out of `total`, clamped to 0..=100.
pub fn percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 100;
    }
    ((done.min(total) * 100) / total) as u8
}
