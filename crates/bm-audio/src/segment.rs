use bm_core::config::SegmentationConfig;
use bm_core::dataset::{Dataset, one_hot};
use bm_core::error::CoreError;
use ndarray::Array2;

use crate::decode::Recording;

/// Scale a recording by its own peak absolute amplitude.
///
/// After scaling, the largest `|sample|` is 1.0. A silent recording (peak 0)
/// is returned as-is, all zeros.
///
/// # Example
/// ```
/// use bm_audio::decode::Recording;
/// use bm_audio::segment::normalize_peak;
///
/// let rec = Recording { channels: vec![vec![0.25, -0.5], vec![0.1, 0.0]], sample_rate: 44100 };
/// let norm = normalize_peak(&rec);
/// assert_eq!(norm.channels[0], vec![0.5, -1.0]);
/// ```
#[must_use]
pub fn normalize_peak(recording: &Recording) -> Recording {
    let peak = recording
        .channels
        .iter()
        .flatten()
        .fold(0.0f32, |acc, s| acc.max(s.abs()));

    if peak <= 0.0 {
        log::warn!("Enregistrement silencieux : normalisation ignorée");
        return recording.clone();
    }

    Recording {
        channels: recording
            .channels
            .iter()
            .map(|ch| ch.iter().map(|s| s / peak).collect())
            .collect(),
        sample_rate: recording.sample_rate,
    }
}

/// Concatenate channels in channel-major order: `[ch0..., ch1..., ...]`.
///
/// # Example
/// ```
/// use bm_audio::decode::Recording;
/// use bm_audio::segment::flatten_channels;
///
/// let rec = Recording { channels: vec![vec![1.0, 2.0], vec![3.0, 4.0]], sample_rate: 8000 };
/// assert_eq!(flatten_channels(&rec), vec![1.0, 2.0, 3.0, 4.0]);
/// ```
#[must_use]
pub fn flatten_channels(recording: &Recording) -> Vec<f32> {
    let mut flat = Vec::with_capacity(recording.len());
    for channel in &recording.channels {
        flat.extend_from_slice(channel);
    }
    flat
}

/// Number of windows cut from `len` samples: `ceil((len - size) / step)`.
///
/// Zero when `len <= size`. Window `k` starts at `k * step`; with this count
/// the last start is strictly below `len - size`, so every window fits in
/// the signal and none is padded. Samples after the last window are dropped.
///
/// # Example
/// ```
/// use bm_audio::segment::segment_count;
/// assert_eq!(segment_count(2048, 512, 128), 12);
/// assert_eq!(segment_count(512, 512, 128), 0);
/// assert_eq!(segment_count(100, 512, 128), 0);
/// ```
#[must_use]
pub fn segment_count(len: usize, size: usize, step: usize) -> usize {
    if len <= size || step == 0 {
        return 0;
    }
    (len - size).div_ceil(step)
}

/// Cut `signal` into overlapping windows, one per row.
///
/// # Example
/// ```
/// use bm_audio::segment::windows;
/// let signal: Vec<f32> = (0..10).map(|i| i as f32).collect();
/// let w = windows(&signal, 4, 2);
/// assert_eq!(w.nrows(), 3);
/// assert_eq!(w.row(2).to_vec(), vec![4.0, 5.0, 6.0, 7.0]);
/// ```
#[must_use]
pub fn windows(signal: &[f32], size: usize, step: usize) -> Array2<f32> {
    let count = segment_count(signal.len(), size, step);
    Array2::from_shape_fn((count, size), |(k, i)| signal[k * step + i])
}

/// Segment one recording into raw windows with one-hot labels.
///
/// Normalizes by peak, flattens channels, windows the result and replicates
/// the one-hot vector of `label` per window. The input is not modified.
///
/// # Errors
/// Returns [`CoreError::InvalidLabel`] if `label >= n_classes`.
///
/// # Example
/// ```
/// use bm_audio::decode::Recording;
/// use bm_audio::segment::segment_recording;
/// use bm_core::config::SegmentationConfig;
///
/// let rec = Recording { channels: vec![vec![0.5; 1024], vec![-0.5; 1024]], sample_rate: 44100 };
/// let seg = SegmentationConfig { segment_size: 512, segment_step: 128 };
/// let ds = segment_recording(&rec, 2, 4, &seg).unwrap();
/// assert_eq!(ds.rows(), 12);
/// assert_eq!(ds.width(), 512);
/// ```
pub fn segment_recording(
    recording: &Recording,
    label: usize,
    n_classes: usize,
    seg: &SegmentationConfig,
) -> Result<Dataset, CoreError> {
    if label >= n_classes {
        return Err(CoreError::InvalidLabel { label, n_classes });
    }

    let normalized = normalize_peak(recording);
    let flat = flatten_channels(&normalized);
    let segments = windows(&flat, seg.segment_size, seg.segment_step);
    let labels = one_hot(label, n_classes, segments.nrows());
    Dataset::new(segments, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use bm_core::dataset::argmax_rows;
    use rstest::rstest;

    fn ramp(channels: usize, frames: usize) -> Recording {
        Recording {
            channels: (0..channels)
                .map(|c| {
                    (0..frames)
                        .map(|i| ((i + c * 7) as f32 * 0.013).sin() * 0.3)
                        .collect()
                })
                .collect(),
            sample_rate: 48000,
        }
    }

    #[rstest]
    #[case(2048, 512, 128, 12)]
    #[case(2049, 512, 128, 13)]
    #[case(640, 512, 128, 1)]
    #[case(641, 512, 128, 2)]
    #[case(513, 512, 1, 1)]
    #[case(0, 512, 128, 0)]
    fn count_matches_ceil_formula(
        #[case] len: usize,
        #[case] size: usize,
        #[case] step: usize,
        #[case] expected: usize,
    ) {
        assert_eq!(segment_count(len, size, step), expected);
    }

    #[rstest]
    #[case(2048, 512, 128)]
    #[case(3001, 400, 96)]
    #[case(1000, 256, 255)]
    fn windows_never_overrun(#[case] len: usize, #[case] size: usize, #[case] step: usize) {
        let count = segment_count(len, size, step);
        assert!(count > 0);
        assert!((count - 1) * step + size <= len);
    }

    #[test]
    fn normalized_peak_is_one() {
        let rec = ramp(2, 4000);
        let norm = normalize_peak(&rec);
        let peak = norm
            .channels
            .iter()
            .flatten()
            .fold(0.0f32, |a, s| a.max(s.abs()));
        assert_abs_diff_eq!(peak, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn peak_is_global_across_channels() {
        let rec = Recording {
            channels: vec![vec![0.1, 0.2], vec![0.8, -0.4]],
            sample_rate: 8000,
        };
        let norm = normalize_peak(&rec);
        assert_abs_diff_eq!(norm.channels[0][1], 0.25, epsilon = 1e-6);
        assert_abs_diff_eq!(norm.channels[1][0], 1.0, epsilon = 1e-6);
    }

    #[test]
    fn silent_recording_stays_zero() {
        let rec = Recording {
            channels: vec![vec![0.0; 600], vec![0.0; 600]],
            sample_rate: 8000,
        };
        let norm = normalize_peak(&rec);
        assert!(norm.channels.iter().flatten().all(|s| *s == 0.0));
    }

    #[test]
    fn flatten_is_channel_contiguous() {
        let rec = ramp(2, 5);
        let flat = flatten_channels(&rec);
        assert_eq!(&flat[..5], rec.channels[0].as_slice());
        assert_eq!(&flat[5..], rec.channels[1].as_slice());
    }

    #[test]
    fn segment_rows_follow_stride() -> Result<(), CoreError> {
        let rec = ramp(2, 1024);
        let seg = SegmentationConfig {
            segment_size: 512,
            segment_step: 128,
        };
        let ds = segment_recording(&rec, 1, 4, &seg)?;
        assert_eq!(ds.rows(), 12);

        let flat = flatten_channels(&normalize_peak(&rec));
        for k in 0..ds.rows() {
            assert_abs_diff_eq!(ds.features()[[k, 0]], flat[k * 128], epsilon = 1e-7);
            assert_abs_diff_eq!(ds.features()[[k, 511]], flat[k * 128 + 511], epsilon = 1e-7);
        }
        Ok(())
    }

    #[test]
    fn every_window_carries_recording_label() -> Result<(), CoreError> {
        let seg = SegmentationConfig::default();
        let ds = segment_recording(&ramp(2, 5000), 3, 4, &seg)?;
        assert!(ds.rows() > 0);
        assert!(argmax_rows(ds.labels()).iter().all(|&c| c == 3));
        Ok(())
    }

    #[test]
    fn short_recording_yields_no_rows() -> Result<(), CoreError> {
        let seg = SegmentationConfig::default();
        let ds = segment_recording(&ramp(2, 200), 0, 4, &seg)?;
        assert!(ds.is_empty());
        assert_eq!(ds.n_classes(), 4);
        Ok(())
    }

    #[test]
    fn input_is_not_mutated() -> Result<(), CoreError> {
        let rec = ramp(2, 1024);
        let before = rec.clone();
        let _ = segment_recording(&rec, 0, 2, &SegmentationConfig::default())?;
        assert_eq!(rec, before);
        Ok(())
    }

    #[test]
    fn bad_label_is_rejected() {
        let res = segment_recording(&ramp(1, 1024), 4, 4, &SegmentationConfig::default());
        assert!(matches!(res, Err(CoreError::InvalidLabel { .. })));
    }
}
