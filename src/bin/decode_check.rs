use std::env;
use std::time::Instant;
use wavesmooth::audio_toolkit::{load_samples, moving_average, SmoothingReport};

fn sample_stats(samples: &[f64]) -> (f64, f64, f64) {
    if samples.is_empty() {
        return (0.0, 0.0, 0.0);
    }
    let mut min = f64::MAX;
    let mut max = f64::MIN;
    let mut sum_sq = 0.0;
    for &s in samples {
        min = min.min(s);
        max = max.max(s);
        sum_sq += s * s;
    }
    (min, max, (sum_sq / samples.len() as f64).sqrt())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    wavesmooth::init_logging();

    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: decode_check <audio_path> [window]");
        std::process::exit(2);
    }
    let path = &args[1];
    let window: usize = match args.get(2) {
        Some(raw) => raw.parse()?,
        None => 100,
    };
    println!("Loading: {}", path);

    let t0 = Instant::now();
    let decoded = load_samples(path, false)?;
    let t_decode = t0.elapsed();
    println!(
        "Decode: samples={}, rate={:?}, channels={:?}, wall_time={:.2}s",
        decoded.samples.len(),
        decoded.sample_rate,
        decoded.channels,
        t_decode.as_secs_f64()
    );

    let t1 = Instant::now();
    let smoothed = moving_average(&decoded.samples, window)?;
    let t_smooth = t1.elapsed();

    let (in_min, in_max, in_rms) = sample_stats(&decoded.samples);
    let (out_min, out_max, out_rms) = sample_stats(&smoothed);
    let report = SmoothingReport {
        original_samples: decoded.samples.len(),
        processed_samples: smoothed.len(),
        window,
        sample_rate: decoded.sample_rate,
        channels: decoded.channels,
    };
    println!(
        "Smooth: window={}, samples={}, approx_seconds={:.2}, smooth_time={:.3}s",
        report.window,
        report.processed_samples,
        report.duration_secs().unwrap_or(0.0),
        t_smooth.as_secs_f64()
    );
    println!(
        "Levels: in[min={:.4}, max={:.4}, rms={:.4}] out[min={:.4}, max={:.4}, rms={:.4}]",
        in_min, in_max, in_rms, out_min, out_max, out_rms
    );

    Ok(())
}
