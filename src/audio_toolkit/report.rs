use std::fmt;

/// Counts produced by one decode-and-smooth run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmoothingReport {
    pub original_samples: usize,
    pub processed_samples: usize,
    pub window: usize,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

impl SmoothingReport {
    /// Approximate duration of the decoded audio in seconds, when the stream
    /// advertised its format.
    pub fn duration_secs(&self) -> Option<f64> {
        match self.sample_rate {
            Some(rate) if rate > 0 => Some(self.original_samples as f64 / rate as f64),
            _ => None,
        }
    }
}

impl fmt::Display for SmoothingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Original samples: {}", self.original_samples)?;
        write!(f, "Processed samples: {}", self.processed_samples)
    }
}
