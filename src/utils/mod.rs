use std::time::{Duration, Instant};
use tracing::info;

/// Wall-clock timer for a batch run. Logs total time on drop, plus the
/// average per listing once the processed count is known.
pub struct BatchTimer {
    label: String,
    start: Instant,
    listings: usize,
}

impl BatchTimer {
    pub fn start(label: impl Into<String>) -> Self {
        let label = label.into();
        info!("⏱  Starting: {}", label);
        Self {
            label,
            start: Instant::now(),
            listings: 0,
        }
    }

    pub fn set_listings(&mut self, listings: usize) {
        self.listings = listings;
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    pub fn per_listing(&self) -> Option<Duration> {
        u32::try_from(self.listings)
            .ok()
            .filter(|n| *n > 0)
            .map(|n| self.elapsed() / n)
    }
}

impl Drop for BatchTimer {
    fn drop(&mut self) {
        match self.per_listing() {
            Some(avg) => info!(
                "⏱  Finished: {} (took {:.2?}, {} listings, {:.2?} each)",
                self.label,
                self.elapsed(),
                self.listings,
                avg
            ),
            None => info!("⏱  Finished: {} (took {:.2?})", self.label, self.elapsed()),
        }
    }
}
