use std::time::Duration;

/// Weight of the newest sample
const RTT_ALPHA: f64 = 0.2;

/// Exponentially weighted moving average of heartbeat round-trip times
#[derive(Debug, Default)]
pub(crate) struct RttSmoother {
    average: Option<Duration>,
}

impl RttSmoother {
    /// Fold in a new sample and return the updated average
    ///
    /// The first sample becomes the average as is.
    pub(crate) fn update(&mut self, sample: Duration) -> Duration {
        let average = match self.average {
            None => sample,
            Some(prev) => {
                let nanos = RTT_ALPHA * sample.as_nanos() as f64
                    + (1.0 - RTT_ALPHA) * prev.as_nanos() as f64;
                Duration::from_nanos(nanos.round() as u64)
            }
        };
        self.average = Some(average);
        average
    }

    #[cfg(test)]
    pub(crate) fn average(&self) -> Option<Duration> {
        self.average
    }
}
