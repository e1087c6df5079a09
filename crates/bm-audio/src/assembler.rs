use std::path::Path;

use anyhow::{Context, Result};
use bm_core::config::{PipelineConfig, SegmentationConfig};
use bm_core::dataset::Dataset;
use bm_core::error::CoreError;

use crate::decode::{Recording, load_recording};
use crate::error::AudioError;
use crate::segment::segment_recording;
use crate::spectrum::magnitude_spectra;

/// Assembleur du jeu de données : enregistrements étiquetés → matrice de spectres.
///
/// Per-recording segment matrices are collected in order and concatenated
/// once in [`finish`](Self::finish), which then applies the magnitude
/// spectrum to every row.
///
/// # Example
/// ```
/// use bm_audio::assembler::DatasetAssembler;
/// use bm_audio::decode::Recording;
/// use bm_core::config::SegmentationConfig;
///
/// let mut asm = DatasetAssembler::new(SegmentationConfig::default(), 4, 2);
/// let rec = Recording { channels: vec![vec![0.3; 1024], vec![-0.2; 1024]], sample_rate: 44100 };
/// asm.add_recording(&rec, 1).unwrap();
/// let ds = asm.finish().unwrap();
/// assert_eq!(ds.rows(), 12);
/// assert_eq!(ds.width(), 257);
/// ```
pub struct DatasetAssembler {
    seg: SegmentationConfig,
    n_classes: usize,
    channels: usize,
    parts: Vec<Dataset>,
    skipped: usize,
}

impl DatasetAssembler {
    /// Crée un assembleur vide.
    #[must_use]
    pub fn new(seg: SegmentationConfig, n_classes: usize, channels: usize) -> Self {
        Self {
            seg,
            n_classes,
            channels,
            parts: Vec::new(),
            skipped: 0,
        }
    }

    /// Assembler configured from a full pipeline config.
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(
            config.segmentation,
            config.dataset.n_classes,
            config.dataset.channels,
        )
    }

    /// Segment one decoded recording and queue its windows.
    ///
    /// Returns the number of windows added. A recording too short for a
    /// single window adds none and is counted as skipped.
    ///
    /// # Errors
    /// Returns [`AudioError::ChannelMismatch`] if the channel count differs
    /// from the configured one, or [`CoreError::InvalidLabel`].
    pub fn add_recording(&mut self, recording: &Recording, label: usize) -> Result<usize> {
        self.check_channels(recording, "<memory>")?;
        self.push(recording, label)
    }

    /// Decode `path` and queue its windows.
    ///
    /// # Errors
    /// Returns an error if the file cannot be decoded, has the wrong channel
    /// count, or `label` is out of range.
    pub fn add_file(&mut self, path: &Path, label: usize) -> Result<usize> {
        let recording = load_recording(path)?;
        self.check_channels(&recording, &path.display().to_string())?;
        let added = self
            .push(&recording, label)
            .with_context(|| format!("Segmentation impossible : {}", path.display()))?;
        if added == 0 {
            log::warn!(
                "{} ignoré : {} échantillons, moins qu'une fenêtre de {}",
                path.display(),
                recording.len(),
                self.seg.segment_size
            );
        } else {
            log::info!("{} : {added} fenêtres (classe {label})", path.display());
        }
        Ok(added)
    }

    /// Windows queued so far.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.parts.iter().map(Dataset::rows).sum()
    }

    /// Recordings that produced no window.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Concatenate the queued windows and convert each to its magnitude spectrum.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyDataset`] if no window was queued.
    pub fn finish(self) -> Result<Dataset> {
        if self.rows() == 0 {
            return Err(CoreError::EmptyDataset.into());
        }
        let segments = Dataset::concat(&self.parts)?;
        let bins = self.seg.spectrum_width();
        log::debug!(
            "Segments assemblés : {} x {}, calcul des spectres ({bins} bins)",
            segments.rows(),
            segments.width()
        );
        let spectra = segments.map_features(|raw| magnitude_spectra(&raw))?;
        if spectra.width() != bins {
            return Err(CoreError::WidthMismatch {
                expected: bins,
                found: spectra.width(),
            }
            .into());
        }
        Ok(spectra)
    }

    fn check_channels(&self, recording: &Recording, origin: &str) -> Result<(), AudioError> {
        if recording.channel_count() == self.channels {
            Ok(())
        } else {
            Err(AudioError::ChannelMismatch {
                path: origin.to_string(),
                expected: self.channels,
                found: recording.channel_count(),
            })
        }
    }

    fn push(&mut self, recording: &Recording, label: usize) -> Result<usize> {
        let part = segment_recording(recording, label, self.n_classes, &self.seg)?;
        let added = part.rows();
        if added == 0 {
            self.skipped += 1;
        } else {
            self.parts.push(part);
        }
        Ok(added)
    }
}

/// Read every configured recording, in list order, into one spectral dataset.
///
/// # Errors
/// Fails on the first unreadable file, on a channel mismatch, or if no
/// recording yields a window.
///
/// # Example
/// ```no_run
/// use bm_audio::assembler::assemble;
/// use bm_core::config::load_config;
/// use std::path::Path;
///
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// let dataset = assemble(&config).unwrap();
/// println!("{} windows", dataset.rows());
/// ```
pub fn assemble(config: &PipelineConfig) -> Result<Dataset> {
    let mut assembler = DatasetAssembler::from_config(config);
    for entry in &config.dataset.recordings {
        let path = config.dataset.path_of(entry);
        assembler.add_file(&path, entry.label)?;
    }
    if assembler.skipped() > 0 {
        log::warn!("{} enregistrement(s) trop court(s) ignoré(s)", assembler.skipped());
    }
    log::info!(
        "{} fenêtres au total depuis {} enregistrement(s)",
        assembler.rows(),
        config.dataset.recordings.len() - assembler.skipped()
    );
    assembler.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bm_core::config::RecordingEntry;
    use bm_core::dataset::argmax_rows;

    fn write_stereo(path: &Path, frames: usize, freq: f32) -> Result<()> {
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: 8000,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        for n in 0..frames {
            let x = (2.0 * std::f32::consts::PI * freq * n as f32 / 8000.0).sin();
            writer.write_sample((x * 12000.0) as i16)?;
            writer.write_sample((x * 6000.0) as i16)?;
        }
        writer.finalize()?;
        Ok(())
    }

    fn synthetic(frames: usize) -> Recording {
        Recording {
            channels: vec![
                (0..frames).map(|i| (i as f32 * 0.1).sin()).collect(),
                (0..frames).map(|i| (i as f32 * 0.05).cos() * 0.5).collect(),
            ],
            sample_rate: 44100,
        }
    }

    #[test]
    fn synthetic_stereo_yields_twelve_spectra() -> Result<()> {
        let mut asm = DatasetAssembler::new(
            SegmentationConfig {
                segment_size: 512,
                segment_step: 128,
            },
            1,
            2,
        );
        assert_eq!(asm.add_recording(&synthetic(1024), 0)?, 12);
        let ds = asm.finish()?;
        assert_eq!(ds.rows(), 12);
        assert_eq!(ds.width(), 257);
        assert_eq!(ds.labels().nrows(), ds.features().nrows());
        assert!(ds.features().iter().all(|&m| m >= 0.0));
        Ok(())
    }

    #[test]
    fn spectrum_width_follows_segment_size() -> Result<()> {
        let seg = SegmentationConfig {
            segment_size: 256,
            segment_step: 64,
        };
        let mut asm = DatasetAssembler::new(seg, 2, 2);
        // 2 x 1024 samples -> ceil((2048 - 256) / 64) = 28 windows.
        assert_eq!(asm.add_recording(&synthetic(1024), 1)?, 28);
        let ds = asm.finish()?;
        assert_eq!(ds.width(), seg.spectrum_width());
        assert_eq!(ds.width(), 129);
        Ok(())
    }

    #[test]
    fn rows_follow_insertion_order() -> Result<()> {
        let mut asm = DatasetAssembler::new(SegmentationConfig::default(), 3, 2);
        asm.add_recording(&synthetic(1024), 2)?;
        asm.add_recording(&synthetic(640), 0)?;
        asm.add_recording(&synthetic(1024), 1)?;
        let ds = asm.finish()?;
        let mut expected = vec![2; 12];
        expected.extend(std::iter::repeat_n(0, 6));
        expected.extend(std::iter::repeat_n(1, 12));
        assert_eq!(argmax_rows(ds.labels()), expected);
        Ok(())
    }

    #[test]
    fn short_recordings_are_skipped() -> Result<()> {
        let mut asm = DatasetAssembler::new(SegmentationConfig::default(), 2, 2);
        assert_eq!(asm.add_recording(&synthetic(100), 0)?, 0);
        assert_eq!(asm.add_recording(&synthetic(1024), 1)?, 12);
        assert_eq!(asm.skipped(), 1);
        assert_eq!(asm.finish()?.rows(), 12);
        Ok(())
    }

    #[test]
    fn nothing_queued_is_an_error() {
        let asm = DatasetAssembler::new(SegmentationConfig::default(), 2, 2);
        assert!(asm.finish().is_err());
    }

    #[test]
    fn mono_recording_is_rejected_for_stereo_config() {
        let mono = Recording {
            channels: vec![vec![0.1; 4096]],
            sample_rate: 44100,
        };
        let mut asm = DatasetAssembler::new(SegmentationConfig::default(), 2, 2);
        let err = asm.add_recording(&mono, 0);
        assert!(err.is_err());
    }

    #[test]
    fn assemble_reads_listed_files_in_order() -> Result<()> {
        let dir = tempfile::tempdir()?;
        write_stereo(&dir.path().join("plastic.wav"), 1024, 440.0)?;
        write_stereo(&dir.path().join("screws.wav"), 2048, 1200.0)?;

        let mut config = PipelineConfig::default();
        config.dataset.data_dir = dir.path().to_path_buf();
        config.dataset.recordings = vec![
            RecordingEntry {
                file: "screws.wav".into(),
                label: 3,
            },
            RecordingEntry {
                file: "plastic.wav".into(),
                label: 0,
            },
            RecordingEntry {
                file: "screws.wav".into(),
                label: 3,
            },
        ];

        let ds = assemble(&config)?;
        // 2048 frames x 2 = 4096 samples -> 28 windows; 1024 x 2 -> 12.
        assert_eq!(ds.rows(), 28 + 12 + 28);
        let classes = argmax_rows(ds.labels());
        assert!(classes[..28].iter().all(|&c| c == 3));
        assert!(classes[28..40].iter().all(|&c| c == 0));
        assert!(classes[40..].iter().all(|&c| c == 3));
        assert_eq!(ds.n_classes(), 4);
        Ok(())
    }

    #[test]
    fn assemble_fails_on_missing_file() {
        let mut config = PipelineConfig::default();
        config.dataset.data_dir = "/nonexistent".into();
        config.dataset.recordings = vec![RecordingEntry {
            file: "ghost.wav".into(),
            label: 0,
        }];
        assert!(assemble(&config).is_err());
    }
}
