use super::{AudioFrame, CaptureSource, FrameSink};
use crate::error::{Error, Result};
use log::{debug, info, warn};
use std::time::{Duration, Instant};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Capturing,
    Stopped,
}

/// What one recording pass produced.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecordingSummary {
    pub frames_written: usize,
    pub samples_written: usize,
    /// Grabs that returned no frame or an empty one.
    pub frames_skipped: usize,
    pub elapsed: Duration,
}

/// Pulls frames from a capture source and forwards them to a sink until the
/// requested wall-clock duration has passed. One recorder records once.
pub struct MicrophoneRecorder<S, W> {
    source: S,
    sink: W,
    state: RecorderState,
}

impl<S: CaptureSource, W: FrameSink> MicrophoneRecorder<S, W> {
    pub fn new(source: S, sink: W) -> Self {
        Self {
            source,
            sink,
            state: RecorderState::Idle,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn into_parts(self) -> (S, W) {
        (self.source, self.sink)
    }

    /// Record for `duration`. The elapsed time is checked once per grab, so
    /// the pass can overrun by up to one blocking grab.
    pub fn record(&mut self, duration: Duration) -> Result<RecordingSummary> {
        if self.state != RecorderState::Idle {
            return Err(Error::InvalidArgument(format!(
                "recorder is {:?}, expected Idle",
                self.state
            )));
        }

        if let Err(e) = self.setup() {
            self.abort();
            return Err(e);
        }
        self.state = RecorderState::Capturing;
        debug!("Recorder capturing for {:?}", duration);

        let summary = match self.capture_loop(duration) {
            Ok(summary) => summary,
            Err(e) => {
                warn!("Recording aborted: {}", e);
                self.abort();
                return Err(e);
            }
        };

        self.source.stop();
        let finished = self.sink.finish();
        self.state = RecorderState::Stopped;
        if let Err(e) = finished {
            self.sink.abort();
            return Err(e);
        }

        info!(
            "Recording complete: frames={}, samples={}, skipped={}, elapsed={:.2}s",
            summary.frames_written,
            summary.samples_written,
            summary.frames_skipped,
            summary.elapsed.as_secs_f64()
        );
        Ok(summary)
    }

    fn setup(&mut self) -> Result<()> {
        self.source.start()?;
        self.sink.start()
    }

    fn capture_loop(&mut self, duration: Duration) -> Result<RecordingSummary> {
        let start_time = Instant::now();
        let mut summary = RecordingSummary::default();

        while start_time.elapsed() < duration {
            match self.source.grab()? {
                Some(frame) => self.forward(&frame, &mut summary)?,
                None => summary.frames_skipped += 1,
            }
        }
        summary.elapsed = start_time.elapsed();

        for frame in self.source.drain() {
            self.forward(&frame, &mut summary)?;
        }
        Ok(summary)
    }

    fn forward(
        &mut self,
        frame: &AudioFrame,
        summary: &mut RecordingSummary,
    ) -> Result<()> {
        if frame.samples.is_empty() {
            summary.frames_skipped += 1;
            return Ok(());
        }
        self.sink.write_frame(frame)?;
        summary.frames_written += 1;
        summary.samples_written += frame.samples.len();
        Ok(())
    }

    /// Best-effort release after a failure.
    fn abort(&mut self) {
        self.source.stop();
        self.sink.abort();
        self.state = RecorderState::Stopped;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct FakeSource {
        script: VecDeque<Result<Option<AudioFrame>>>,
        queued: Vec<AudioFrame>,
        fail_start: bool,
        started: bool,
        stopped: bool,
    }

    impl FakeSource {
        fn with_script(script: Vec<Result<Option<AudioFrame>>>) -> Self {
            Self {
                script: script.into(),
                ..Default::default()
            }
        }
    }

    impl CaptureSource for FakeSource {
        fn start(&mut self) -> Result<()> {
            if self.fail_start {
                return Err(Error::Capture("no device".to_string()));
            }
            self.started = true;
            Ok(())
        }

        fn grab(&mut self) -> Result<Option<AudioFrame>> {
            std::thread::sleep(Duration::from_millis(1));
            self.script.pop_front().unwrap_or(Ok(None))
        }

        fn drain(&mut self) -> Vec<AudioFrame> {
            std::mem::take(&mut self.queued)
        }

        fn stop(&mut self) {
            self.stopped = true;
        }
    }

    #[derive(Default)]
    struct FakeSink {
        frames: Vec<AudioFrame>,
        fail_write: bool,
        started: bool,
        finished: bool,
        aborted: bool,
    }

    impl FrameSink for FakeSink {
        fn start(&mut self) -> Result<()> {
            self.started = true;
            Ok(())
        }

        fn write_frame(&mut self, frame: &AudioFrame) -> Result<()> {
            if self.fail_write {
                return Err(Error::Encode("disk full".to_string()));
            }
            self.frames.push(frame.clone());
            Ok(())
        }

        fn finish(&mut self) -> Result<()> {
            self.finished = true;
            Ok(())
        }

        fn abort(&mut self) {
            self.aborted = true;
        }
    }

    fn frame(samples: Vec<i16>) -> AudioFrame {
        AudioFrame {
            samples,
            channels: 2,
            sample_rate: 44_100,
        }
    }

    #[test]
    fn test_forwards_only_non_empty_frames() {
        let source = FakeSource::with_script(vec![
            Ok(Some(frame(vec![1, 2]))),
            Ok(None),
            Ok(Some(frame(vec![]))),
            Ok(Some(frame(vec![3, 4, 5, 6]))),
        ]);
        let mut recorder = MicrophoneRecorder::new(source, FakeSink::default());
        assert_eq!(recorder.state(), RecorderState::Idle);

        let summary = recorder.record(Duration::from_millis(50)).unwrap();
        assert_eq!(recorder.state(), RecorderState::Stopped);
        assert_eq!(summary.frames_written, 2);
        assert_eq!(summary.samples_written, 6);
        assert!(summary.frames_skipped >= 2);
        assert!(summary.elapsed >= Duration::from_millis(50));

        let (source, sink) = recorder.into_parts();
        assert!(source.started && source.stopped);
        assert!(sink.started && sink.finished && !sink.aborted);
        assert_eq!(sink.frames[0].samples, vec![1, 2]);
        assert_eq!(sink.frames[1].samples, vec![3, 4, 5, 6]);
    }

    #[test]
    fn test_zero_duration_captures_nothing() {
        let source = FakeSource::with_script(vec![Ok(Some(frame(vec![1, 2])))]);
        let mut recorder = MicrophoneRecorder::new(source, FakeSink::default());
        let summary = recorder.record(Duration::ZERO).unwrap();
        assert_eq!(summary.frames_written, 0);

        let (_, sink) = recorder.into_parts();
        assert!(sink.finished);
    }

    #[test]
    fn test_queued_tail_is_written_before_finish() {
        let source = FakeSource {
            queued: vec![frame(vec![7, 8]), frame(vec![]), frame(vec![9, 10, 11, 12])],
            ..FakeSource::with_script(vec![Ok(Some(frame(vec![1, 2])))])
        };
        let mut recorder = MicrophoneRecorder::new(source, FakeSink::default());
        let summary = recorder.record(Duration::from_millis(20)).unwrap();
        assert_eq!(summary.frames_written, 3);
        assert_eq!(summary.samples_written, 8);

        let (source, sink) = recorder.into_parts();
        assert!(source.queued.is_empty() && source.stopped);
        assert!(sink.finished);
        let written: Vec<Vec<i16>> = sink.frames.into_iter().map(|f| f.samples).collect();
        assert_eq!(written, vec![vec![1, 2], vec![7, 8], vec![9, 10, 11, 12]]);
    }

    #[test]
    fn test_setup_failure_stops_without_sink() {
        let source = FakeSource {
            fail_start: true,
            ..Default::default()
        };
        let mut recorder = MicrophoneRecorder::new(source, FakeSink::default());
        let err = recorder.record(Duration::from_millis(10)).unwrap_err();
        assert!(matches!(err, Error::Capture(_)));
        assert_eq!(recorder.state(), RecorderState::Stopped);

        let (source, sink) = recorder.into_parts();
        assert!(source.stopped);
        assert!(!sink.started && sink.aborted && !sink.finished);
    }

    #[test]
    fn test_capture_error_aborts() {
        let source = FakeSource::with_script(vec![
            Ok(Some(frame(vec![1, 2]))),
            Err(Error::Capture("unplugged".to_string())),
            Ok(Some(frame(vec![3, 4]))),
        ]);
        let mut recorder = MicrophoneRecorder::new(source, FakeSink::default());
        assert!(matches!(
            recorder.record(Duration::from_secs(5)),
            Err(Error::Capture(_))
        ));
        assert_eq!(recorder.state(), RecorderState::Stopped);

        let (source, sink) = recorder.into_parts();
        assert!(source.stopped);
        assert_eq!(sink.frames.len(), 1);
        assert!(sink.aborted && !sink.finished);
    }

    #[test]
    fn test_encode_error_aborts() {
        let source = FakeSource::with_script(vec![Ok(Some(frame(vec![1, 2])))]);
        let sink = FakeSink {
            fail_write: true,
            ..Default::default()
        };
        let mut recorder = MicrophoneRecorder::new(source, sink);
        assert!(matches!(
            recorder.record(Duration::from_secs(5)),
            Err(Error::Encode(_))
        ));
        let (source, sink) = recorder.into_parts();
        assert!(source.stopped && sink.aborted);
    }

    #[test]
    fn test_recorder_is_single_use() {
        let mut recorder = MicrophoneRecorder::new(FakeSource::default(), FakeSink::default());
        recorder.record(Duration::ZERO).unwrap();
        assert!(matches!(
            recorder.record(Duration::ZERO),
            Err(Error::InvalidArgument(_))
        ));
    }
}
