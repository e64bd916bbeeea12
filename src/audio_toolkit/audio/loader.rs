use crate::error::{Error, Result};
use std::fs::File;
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, Track};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

/// Signed 16-bit little-endian PCM.
pub const BYTES_PER_SAMPLE: usize = 2;

/// One decoded chunk of 16-bit little-endian PCM from the first channel of
/// the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    /// Samples per channel in this chunk, which is also the number of
    /// values in `data`.
    pub sample_count: usize,
    pub data: Vec<u8>,
    /// Channel count of the source stream.
    pub channels: u16,
    pub sample_rate: u32,
}

impl PcmFrame {
    /// Build a frame from first-channel samples of a `channels`-channel stream.
    pub fn from_samples(samples: &[i16], channels: u16, sample_rate: u32) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self {
            sample_count: samples.len(),
            data,
            channels,
            sample_rate,
        }
    }
}

/// The audio stream chosen for decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioStream {
    pub track_id: u32,
    pub sample_rate: Option<u32>,
    pub channels: Option<u16>,
}

/// An opened media container.
pub struct MediaReader {
    path: PathBuf,
    format: Box<dyn FormatReader>,
}

impl MediaReader {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let file = File::open(path_ref).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::FileNotFound(path_ref.to_path_buf()),
            _ => Error::Io(e),
        })?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = path_ref.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| {
                Error::UnsupportedFormat(format!("{}: {}", path_ref.display(), e))
            })?;

        log::debug!(
            "Opened container: path={}, tracks={}",
            path_ref.display(),
            probed.format.tracks().len()
        );

        Ok(Self {
            path: path_ref.to_path_buf(),
            format: probed.format,
        })
    }

    /// Pick the first stream that carries decodable audio.
    pub fn select_audio_stream(&self) -> Result<AudioStream> {
        let track = first_audio_track(self.format.tracks()).ok_or(Error::NoAudioStream)?;
        let stream = AudioStream {
            track_id: track.id,
            sample_rate: track.codec_params.sample_rate,
            channels: track.codec_params.channels.map(|c| c.count() as u16),
        };

        log::info!(
            "Selected audio stream: path={}, track={}, codec={:?}, channels={:?}, in_rate={:?} Hz",
            self.path.display(),
            stream.track_id,
            track.codec_params.codec,
            stream.channels,
            stream.sample_rate
        );

        Ok(stream)
    }

    /// Consume the reader and decode `stream` lazily. Reopen the file to
    /// read it again.
    pub fn into_frames(self, stream: AudioStream, skip_decode_errors: bool) -> Result<FrameReader> {
        let track = self
            .format
            .tracks()
            .iter()
            .find(|t| t.id == stream.track_id)
            .ok_or(Error::NoAudioStream)?;

        let decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .map_err(|e| Error::UnsupportedFormat(format!("no decoder for stream: {}", e)))?;

        Ok(FrameReader::new(
            self.format,
            decoder,
            stream.track_id,
            skip_decode_errors,
        ))
    }
}

pub(crate) fn first_audio_track(tracks: &[Track]) -> Option<&Track> {
    tracks.iter().find(|t| {
        t.codec_params.codec != CODEC_TYPE_NULL
            && (t.codec_params.sample_rate.is_some() || t.codec_params.channels.is_some())
    })
}

/// Lazy sequence of decoded frames from one audio stream.
pub struct FrameReader {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_buf: Option<SampleBuffer<i16>>,
    skip_decode_errors: bool,
    skipped_packets: usize,
    finished: bool,
}

impl FrameReader {
    fn new(
        format: Box<dyn FormatReader>,
        decoder: Box<dyn Decoder>,
        track_id: u32,
        skip_decode_errors: bool,
    ) -> Self {
        Self {
            format,
            decoder,
            track_id,
            sample_buf: None,
            skip_decode_errors,
            skipped_packets: 0,
            finished: false,
        }
    }

    /// Packets dropped because the codec rejected them.
    pub fn skipped_packets(&self) -> usize {
        self.skipped_packets
    }

    fn next_frame(&mut self) -> Result<Option<PcmFrame>> {
        loop {
            let packet = match self.format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::ResetRequired) => {
                    self.decoder.reset();
                    continue;
                }
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    return Ok(None);
                }
                Err(SymphoniaError::IoError(err))
                    if err.kind() == std::io::ErrorKind::Interrupted =>
                {
                    continue;
                }
                Err(e) => return Err(Error::Decode(format!("read error: {}", e))),
            };

            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(msg)) if self.skip_decode_errors => {
                    self.skipped_packets += 1;
                    log::warn!("Skipping corrupt packet at ts={}: {}", packet.ts(), msg);
                    continue;
                }
                Err(e) => return Err(Error::Decode(e.to_string())),
            };

            if decoded.frames() == 0 {
                continue;
            }

            let spec = *decoded.spec();
            let capacity = decoded.capacity() as u64;
            let needs_new_buf = self
                .sample_buf
                .as_ref()
                .map_or(true, |buf| buf.capacity() < decoded.capacity() * spec.channels.count());
            if needs_new_buf {
                self.sample_buf = Some(SampleBuffer::<i16>::new(capacity, spec));
            }

            let Some(buf) = self.sample_buf.as_mut() else {
                continue;
            };
            buf.copy_interleaved_ref(decoded);

            let channels = spec.channels.count().max(1);
            let first_channel: Vec<i16> =
                buf.samples().iter().step_by(channels).copied().collect();

            return Ok(Some(PcmFrame::from_samples(
                &first_channel,
                channels as u16,
                spec.rate,
            )));
        }
    }
}

impl Iterator for FrameReader {
    type Item = Result<PcmFrame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        match self.next_frame() {
            Ok(Some(frame)) => Some(Ok(frame)),
            Ok(None) => {
                self.finished = true;
                if self.skipped_packets > 0 {
                    log::warn!("Reached end of stream, {} packets skipped", self.skipped_packets);
                } else {
                    log::debug!("Reached end of stream");
                }
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hound::{SampleFormat, WavSpec, WavWriter};
    use symphonia::core::audio::AudioBufferRef;
    use symphonia::core::codecs::{CodecDescriptor, CodecParameters, FinalizeResult, CODEC_TYPE_MP3};
    use symphonia::core::errors::Result as SymphoniaResult;
    use symphonia::core::formats::{Cue, Packet, SeekMode, SeekTo, SeekedTo};
    use symphonia::core::meta::Metadata;
    use tempfile::TempDir;

    fn write_wav(path: &Path, samples: &[i16], channels: u16) {
        let spec = WavSpec {
            channels,
            sample_rate: 8_000,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    fn ramp(len: usize) -> Vec<i16> {
        (0..len).map(|i| (i % 30_000) as i16).collect()
    }

    fn frame_values(frames: &[PcmFrame]) -> Vec<i16> {
        frames
            .iter()
            .flat_map(|f| {
                f.data
                    .chunks_exact(BYTES_PER_SAMPLE)
                    .map(|b| i16::from_le_bytes([b[0], b[1]]))
                    .collect::<Vec<_>>()
            })
            .collect()
    }

    /// Delegates to a real decoder but rejects the packets at the given
    /// positions as corrupt.
    struct FlakyDecoder {
        inner: Box<dyn Decoder>,
        reject: Vec<usize>,
        seen: usize,
    }

    impl Decoder for FlakyDecoder {
        fn try_new(_: &CodecParameters, _: &DecoderOptions) -> SymphoniaResult<Self> {
            Err(SymphoniaError::Unsupported("built by hand in tests"))
        }

        fn supported_codecs() -> &'static [CodecDescriptor] {
            &[]
        }

        fn reset(&mut self) {
            self.inner.reset()
        }

        fn codec_params(&self) -> &CodecParameters {
            self.inner.codec_params()
        }

        fn decode(&mut self, packet: &Packet) -> SymphoniaResult<AudioBufferRef<'_>> {
            let index = self.seen;
            self.seen += 1;
            if self.reject.contains(&index) {
                return Err(SymphoniaError::DecodeError("corrupt frame"));
            }
            self.inner.decode(packet)
        }

        fn finalize(&mut self) -> FinalizeResult {
            self.inner.finalize()
        }

        fn last_decoded(&self) -> AudioBufferRef<'_> {
            self.inner.last_decoded()
        }
    }

    fn flaky_frames(path: &Path, reject: Vec<usize>, skip_decode_errors: bool) -> FrameReader {
        let reader = MediaReader::open(path).unwrap();
        let stream = reader.select_audio_stream().unwrap();
        let track = first_audio_track(reader.format.tracks()).unwrap();
        let inner = symphonia::default::get_codecs()
            .make(&track.codec_params, &DecoderOptions::default())
            .unwrap();
        let decoder = FlakyDecoder {
            inner,
            reject,
            seen: 0,
        };
        FrameReader::new(
            reader.format,
            Box::new(decoder),
            stream.track_id,
            skip_decode_errors,
        )
    }

    const OTHER_TRACK: u32 = 7;

    /// Interleaves packets of an undeclared second stream between the real
    /// ones.
    struct WithOtherTrack {
        inner: Box<dyn FormatReader>,
        other_next: bool,
    }

    impl FormatReader for WithOtherTrack {
        fn try_new(_: MediaSourceStream, _: &FormatOptions) -> SymphoniaResult<Self> {
            Err(SymphoniaError::Unsupported("built by hand in tests"))
        }

        fn cues(&self) -> &[Cue] {
            self.inner.cues()
        }

        fn metadata(&mut self) -> Metadata<'_> {
            self.inner.metadata()
        }

        fn seek(&mut self, mode: SeekMode, to: SeekTo) -> SymphoniaResult<SeekedTo> {
            self.inner.seek(mode, to)
        }

        fn tracks(&self) -> &[Track] {
            self.inner.tracks()
        }

        fn next_packet(&mut self) -> SymphoniaResult<Packet> {
            self.other_next = !self.other_next;
            if self.other_next {
                return Ok(Packet::new_from_slice(OTHER_TRACK, 0, 64, &[0x7F; 128]));
            }
            self.inner.next_packet()
        }

        fn into_inner(self: Box<Self>) -> MediaSourceStream {
            self.inner.into_inner()
        }
    }

    #[test]
    fn test_open_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("missing.mp3");
        match MediaReader::open(&missing) {
            Err(Error::FileNotFound(path)) => assert_eq!(path, missing),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("opening a missing file should fail"),
        }
    }

    #[test]
    fn test_open_garbage_is_unsupported() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("notes.txt");
        std::fs::write(&path, "this is not audio at all").unwrap();
        assert!(matches!(
            MediaReader::open(&path),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_first_audio_track_skips_null_codec() {
        let mut audio = CodecParameters::new();
        audio.for_codec(CODEC_TYPE_MP3).with_sample_rate(44_100);
        let tracks = vec![
            Track::new(0, CodecParameters::new()),
            Track::new(1, audio),
        ];
        assert_eq!(first_audio_track(&tracks).map(|t| t.id), Some(1));
        assert!(first_audio_track(&tracks[..1]).is_none());
    }

    #[test]
    fn test_decode_wav_frames() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tone.wav");
        let samples: Vec<i16> = vec![0, 32767, -32768, 16384, -1, 1];
        write_wav(&path, &samples, 1);

        let reader = MediaReader::open(&path).unwrap();
        let stream = reader.select_audio_stream().unwrap();
        assert_eq!(stream.sample_rate, Some(8_000));
        assert_eq!(stream.channels, Some(1));

        let frames: Vec<PcmFrame> = reader
            .into_frames(stream, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frame_values(&frames), samples);
        assert!(frames.iter().all(|f| f.channels == 1 && f.sample_rate == 8_000));
        assert!(frames.iter().all(|f| f.data.len() == f.sample_count * BYTES_PER_SAMPLE));
    }

    #[test]
    fn test_stereo_counts_frames_and_keeps_first_channel() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("stereo.wav");
        let left: Vec<i16> = (0..1_000).map(|i| i as i16).collect();
        let interleaved: Vec<i16> = left.iter().flat_map(|&l| [l, -l - 1]).collect();
        write_wav(&path, &interleaved, 2);

        let reader = MediaReader::open(&path).unwrap();
        let stream = reader.select_audio_stream().unwrap();
        let frames: Vec<PcmFrame> = reader
            .into_frames(stream, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        let total: usize = frames.iter().map(|f| f.sample_count).sum();
        assert_eq!(total, 1_000);
        assert!(frames.iter().all(|f| f.channels == 2));
        assert_eq!(frame_values(&frames), left);
    }

    #[test]
    fn test_frame_reader_is_fused() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("short.wav");
        write_wav(&path, &[1, 2, 3, 4], 1);

        let reader = MediaReader::open(&path).unwrap();
        let stream = reader.select_audio_stream().unwrap();
        let mut frames = reader.into_frames(stream, false).unwrap();
        while let Some(frame) = frames.next() {
            frame.unwrap();
        }
        assert!(frames.next().is_none());
        assert_eq!(frames.skipped_packets(), 0);
    }

    #[test]
    fn test_corrupt_packet_aborts_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("long.wav");
        write_wav(&path, &ramp(20_000), 1);

        let mut frames = flaky_frames(&path, vec![1], false);
        assert!(frames.next().unwrap().is_ok());
        match frames.next() {
            Some(Err(Error::Decode(msg))) => assert!(msg.contains("corrupt frame")),
            other => panic!("expected a decode error, got {:?}", other),
        }
        assert!(frames.next().is_none());
        assert_eq!(frames.skipped_packets(), 0);
    }

    #[test]
    fn test_corrupt_packet_skipped_when_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("long.wav");
        let samples = ramp(20_000);
        write_wav(&path, &samples, 1);

        let mut reader = flaky_frames(&path, vec![1], true);
        let frames: Vec<PcmFrame> = reader.by_ref().collect::<Result<_>>().unwrap();
        assert_eq!(reader.skipped_packets(), 1);

        let decoded = frame_values(&frames);
        let first_len = frames[0].sample_count;
        assert!(decoded.len() < samples.len());
        assert_eq!(decoded.len() + first_len, samples.len());
        // the packet after the rejected one resumes where the stream left off
        assert_eq!(&decoded[..first_len], &samples[..first_len]);
        assert_eq!(&decoded[first_len..], &samples[2 * first_len..]);
    }

    #[test]
    fn test_packets_of_other_streams_are_discarded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("main.wav");
        let samples = ramp(5_000);
        write_wav(&path, &samples, 1);

        let opened = MediaReader::open(&path).unwrap();
        let reader = MediaReader {
            path: opened.path,
            format: Box::new(WithOtherTrack {
                inner: opened.format,
                other_next: false,
            }),
        };
        let stream = reader.select_audio_stream().unwrap();
        assert_ne!(stream.track_id, OTHER_TRACK);

        let frames: Vec<PcmFrame> = reader
            .into_frames(stream, false)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(frame_values(&frames), samples);
    }

    #[test]
    fn test_pcm_frame_from_samples_is_little_endian() {
        let frame = PcmFrame::from_samples(&[0x0102, -2], 1, 44_100);
        assert_eq!(frame.sample_count, 2);
        assert_eq!(frame.data, vec![0x02, 0x01, 0xFE, 0xFF]);
    }
}
