use crate::error::{Error, Result};

/// Sliding arithmetic mean over `window` consecutive samples.
///
/// Output element `i` is the mean of `samples[i..i + window]`, so the output
/// holds `samples.len() - window + 1` values, or none when the window is
/// longer than the input. A zero window is rejected.
///
/// Runs in O(n) with a running sum. The sum is recomputed from scratch every
/// `RESYNC_INTERVAL` steps so rounding drift stays bounded on long inputs.
pub fn moving_average(samples: &[f64], window: usize) -> Result<Vec<f64>> {
    if window == 0 {
        return Err(Error::InvalidArgument(
            "window size must be at least 1".to_string(),
        ));
    }
    if window > samples.len() {
        log::debug!(
            "Window {} exceeds {} samples, nothing to smooth",
            window,
            samples.len()
        );
        return Ok(Vec::new());
    }

    const RESYNC_INTERVAL: usize = 4096;

    let divisor = window as f64;
    let out_len = samples.len() - window + 1;
    let mut out = Vec::with_capacity(out_len);

    let mut sum: f64 = samples[..window].iter().sum();
    out.push(sum / divisor);

    for start in 1..out_len {
        if start % RESYNC_INTERVAL == 0 {
            sum = samples[start..start + window].iter().sum();
        } else {
            sum += samples[start + window - 1] - samples[start - 1];
        }
        out.push(sum / divisor);
    }

    Ok(out)
}
