use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::AudioError;

/// A decoded recording, one sample vector per channel.
#[derive(Clone, Debug, PartialEq)]
pub struct Recording {
    /// De-interleaved samples, `channels[c][frame]`.
    pub channels: Vec<Vec<f32>>,
    /// Sample rate reported by the container.
    pub sample_rate: u32,
}

impl Recording {
    /// Number of channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel.
    #[must_use]
    pub fn frames(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    /// Total samples over all channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Decode an audio file into per-channel f32 samples.
///
/// Supports WAV and FLAC via symphonia. Integer PCM is scaled to [-1, 1].
///
/// # Errors
/// Returns an error if the file cannot be opened, probed, or has no track,
/// or if reading the container fails before the end of the stream.
///
/// # Example
/// ```no_run
/// use bm_audio::decode::load_recording;
/// let rec = load_recording("data/steel_nuts_01.wav").unwrap();
/// assert_eq!(rec.channel_count(), 2);
/// ```
pub fn load_recording(path: impl AsRef<Path>) -> Result<Recording> {
    let path = path.as_ref();
    let file =
        File::open(path).with_context(|| format!("Cannot open audio file: {}", path.display()))?;
    let mss = MediaSourceStream::new(
        Box::new(file),
        symphonia::core::io::MediaSourceStreamOptions::default(),
    );

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Failed to probe audio format: {}", path.display()))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AudioError::NoTrack(path.display().to_string()))?;

    let sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
    // Provisional until the first decoded buffer reports its own layout.
    let channel_count = track
        .codec_params
        .channels
        .map_or(1, symphonia::core::audio::Channels::count);

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::DecodeError(e.to_string()))?;

    let track_id = track.id;
    let mut channels: Vec<Vec<f32>> = vec![Vec::new(); channel_count];
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut max_sample_frames: usize = 0;

    loop {
        let Some(packet) = next_or_end(format.next_packet(), path)? else {
            break;
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(e) => {
                log::warn!("Audio decode frame error in {}: {e}", path.display());
                continue;
            }
        };

        let spec = *decoded.spec();
        let num_frames = decoded.capacity();
        // Reuse SampleBuffer: only reallocate if this packet is bigger than current capacity
        if sample_buf.is_none() || num_frames > max_sample_frames {
            sample_buf = Some(SampleBuffer::<f32>::new(num_frames as u64, spec));
            max_sample_frames = num_frames;
        }
        let Some(buf) = sample_buf.as_mut() else {
            continue;
        };
        buf.copy_interleaved_ref(decoded);
        push_interleaved(&mut channels, buf.samples(), spec.channels.count())?;
    }

    let recording = Recording {
        channels,
        sample_rate,
    };

    log::debug!(
        "Decoded {} frames x {} channels @ {}Hz from {}",
        recording.frames(),
        recording.channel_count(),
        sample_rate,
        path.display()
    );

    Ok(recording)
}

/// Packet read outcome: `None` at end of stream, an error for anything else.
fn next_or_end<T>(
    result: symphonia::core::errors::Result<T>,
    path: &Path,
) -> Result<Option<T>, AudioError> {
    match result {
        Ok(packet) => Ok(Some(packet)),
        Err(symphonia::core::errors::Error::IoError(ref e))
            if e.kind() == std::io::ErrorKind::UnexpectedEof =>
        {
            Ok(None)
        }
        Err(e) => Err(AudioError::DecodeError(format!("{}: {e}", path.display()))),
    }
}

/// Append interleaved frames of `stride` channels to `channels`.
///
/// While nothing has been pushed yet, `channels` is resized to `stride`.
/// A layout change once samples exist is an error.
fn push_interleaved(
    channels: &mut Vec<Vec<f32>>,
    samples: &[f32],
    stride: usize,
) -> Result<(), AudioError> {
    if stride == 0 {
        return Err(AudioError::DecodeError("buffer sans canal".into()));
    }
    if channels.len() != stride {
        if channels.iter().any(|c| !c.is_empty()) {
            return Err(AudioError::DecodeError(format!(
                "nombre de canaux modifié en cours de flux : {} -> {stride}",
                channels.len()
            )));
        }
        *channels = vec![Vec::new(); stride];
    }
    for frame in samples.chunks(stride) {
        for (channel, &sample) in channels.iter_mut().zip(frame) {
            channel.push(sample);
        }
    }
    Ok(())
}
