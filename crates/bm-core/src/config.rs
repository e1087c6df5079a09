use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Configuration complète d'une exécution du pipeline.
///
/// Sérialisable en TOML. Chaque champ a une valeur par défaut saine ;
/// seule la liste des enregistrements doit être fournie.
///
/// # Example
/// ```
/// use bm_core::config::PipelineConfig;
/// let config = PipelineConfig::default();
/// assert_eq!(config.segmentation.segment_size, 512);
/// assert_eq!(config.training.epochs, 200);
/// ```
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct PipelineConfig {
    /// Window length and stride.
    pub segmentation: SegmentationConfig,
    /// Input files, classes and train/test split.
    pub dataset: DatasetConfig,
    /// Dense network hyperparameters.
    pub training: TrainingConfig,
}

/// Window geometry applied to every recording.
#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct SegmentationConfig {
    /// Samples per window (L).
    pub segment_size: usize,
    /// Samples between consecutive window starts (S, strictly below L).
    pub segment_step: usize,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            segment_size: 512,
            segment_step: 128,
        }
    }
}

impl SegmentationConfig {
    /// Width of the magnitude spectrum of one window (L/2 + 1).
    ///
    /// # Example
    /// ```
    /// use bm_core::config::SegmentationConfig;
    /// let seg = SegmentationConfig { segment_size: 512, segment_step: 128 };
    /// assert_eq!(seg.spectrum_width(), 257);
    /// ```
    #[must_use]
    pub fn spectrum_width(&self) -> usize {
        self.segment_size / 2 + 1
    }
}

/// One labelled input file.
///
/// # Example
/// ```
/// use bm_core::config::RecordingEntry;
/// let e = RecordingEntry { file: "steel_nuts_01.wav".into(), label: 1 };
/// assert_eq!(e.label, 1);
/// ```
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct RecordingEntry {
    /// File name, relative to `DatasetConfig::data_dir`.
    pub file: PathBuf,
    /// Class index in `0..n_classes`.
    pub label: usize,
}

/// Input set description.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DatasetConfig {
    /// Directory holding the recordings.
    pub data_dir: PathBuf,
    /// Channels every recording must carry (2 = stereo).
    pub channels: usize,
    /// Number of material classes.
    pub n_classes: usize,
    /// Display names, indexed by class. Missing names fall back to the index.
    pub class_names: Vec<String>,
    /// Ordered list of labelled files. Duplicates are kept, in order.
    pub recordings: Vec<RecordingEntry>,
    /// Held-out fraction for the test partition, in (0, 1).
    pub test_fraction: f32,
    /// Shuffle seed of the train/test split.
    pub split_seed: u64,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            channels: 2,
            n_classes: 4,
            class_names: vec![
                "plastic spheres".into(),
                "steel nuts".into(),
                "brass nuts".into(),
                "screws".into(),
            ],
            recordings: Vec::new(),
            test_fraction: 0.25,
            split_seed: 42,
        }
    }
}

impl DatasetConfig {
    /// Display name of a class.
    ///
    /// # Example
    /// ```
    /// use bm_core::config::DatasetConfig;
    /// let d = DatasetConfig::default();
    /// assert_eq!(d.class_name(1), "steel nuts");
    /// assert_eq!(d.class_name(9), "9");
    /// ```
    #[must_use]
    pub fn class_name(&self, class: usize) -> String {
        self.class_names
            .get(class)
            .cloned()
            .unwrap_or_else(|| class.to_string())
    }

    /// Absolute-or-relative path of an entry's file.
    #[must_use]
    pub fn path_of(&self, entry: &RecordingEntry) -> PathBuf {
        self.data_dir.join(&entry.file)
    }
}

/// Dense network hyperparameters.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct TrainingConfig {
    /// Units of each hidden layer, in order.
    pub hidden_units: Vec<usize>,
    /// L2 kernel penalty of the hidden layers.
    pub l2: f32,
    /// Adam step size.
    pub learning_rate: f32,
    /// Passes over the training partition.
    pub epochs: usize,
    /// Rows per gradient step.
    pub batch_size: usize,
    /// Seed of weight init and per-epoch shuffling.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            hidden_units: vec![64, 64],
            l2: 0.01,
            learning_rate: 0.001,
            epochs: 200,
            batch_size: 128,
            seed: 42,
        }
    }
}

impl PipelineConfig {
    /// Reject configurations the pipeline cannot run with.
    ///
    /// # Errors
    /// Returns [`CoreError::Config`] for invalid geometry, split or training
    /// parameters, and [`CoreError::InvalidLabel`] for out-of-range labels.
    ///
    /// # Example
    /// ```
    /// use bm_core::config::PipelineConfig;
    /// let mut config = PipelineConfig::default();
    /// assert!(config.validate().is_ok());
    /// config.segmentation.segment_step = 512;
    /// assert!(config.validate().is_err());
    /// ```
    pub fn validate(&self) -> Result<(), CoreError> {
        let seg = &self.segmentation;
        if seg.segment_size == 0 {
            return Err(CoreError::Config("segment_size doit être > 0".into()));
        }
        if seg.segment_step == 0 || seg.segment_step >= seg.segment_size {
            return Err(CoreError::Config(format!(
                "segment_step doit être dans 1..{} (reçu {})",
                seg.segment_size, seg.segment_step
            )));
        }

        let ds = &self.dataset;
        if ds.channels == 0 {
            return Err(CoreError::Config("channels doit être > 0".into()));
        }
        if ds.n_classes == 0 {
            return Err(CoreError::Config("n_classes doit être > 0".into()));
        }
        if ds.test_fraction.is_nan() || ds.test_fraction <= 0.0 || ds.test_fraction >= 1.0 {
            return Err(CoreError::Config(format!(
                "test_fraction doit être dans ]0, 1[ (reçu {})",
                ds.test_fraction
            )));
        }
        if let Some(bad) = ds.recordings.iter().find(|e| e.label >= ds.n_classes) {
            return Err(CoreError::InvalidLabel {
                label: bad.label,
                n_classes: ds.n_classes,
            });
        }

        let tr = &self.training;
        if tr.epochs == 0 || tr.batch_size == 0 {
            return Err(CoreError::Config(
                "epochs et batch_size doivent être > 0".into(),
            ));
        }
        if tr.hidden_units.contains(&0) {
            return Err(CoreError::Config(
                "hidden_units ne peut contenir de couche vide".into(),
            ));
        }
        if tr.learning_rate.is_nan() || tr.learning_rate <= 0.0 || tr.l2.is_nan() || tr.l2 < 0.0 {
            return Err(CoreError::Config(format!(
                "learning_rate > 0 et l2 >= 0 requis (reçu {} / {})",
                tr.learning_rate, tr.l2
            )));
        }
        Ok(())
    }
}

/// Structure TOML intermédiaire pour désérialisation avec valeurs optionnelles.
#[derive(Deserialize)]
struct ConfigFile {
    segmentation: Option<SegmentationSection>,
    dataset: Option<DatasetSection>,
    training: Option<TrainingSection>,
}

#[derive(Deserialize)]
struct SegmentationSection {
    segment_size: Option<usize>,
    segment_step: Option<usize>,
}

#[derive(Deserialize)]
struct DatasetSection {
    data_dir: Option<PathBuf>,
    channels: Option<usize>,
    n_classes: Option<usize>,
    class_names: Option<Vec<String>>,
    recordings: Option<Vec<RecordingEntry>>,
    test_fraction: Option<f32>,
    split_seed: Option<u64>,
}

#[derive(Deserialize)]
struct TrainingSection {
    hidden_units: Option<Vec<usize>>,
    l2: Option<f32>,
    learning_rate: Option<f32>,
    epochs: Option<usize>,
    batch_size: Option<usize>,
    seed: Option<u64>,
}

/// Parse un document TOML et fusionne avec les valeurs par défaut.
///
/// `data_dir` relatif est conservé tel quel ; [`load_config`] le résout
/// par rapport au dossier du fichier.
///
/// # Errors
/// Returns an error if the document is not valid TOML or fails validation.
///
/// # Example
/// ```
/// use bm_core::config::parse_config;
/// let config = parse_config(r#"
/// [segmentation]
/// segment_size = 1024
/// segment_step = 256
///
/// [[dataset.recordings]]
/// file = "screws.wav"
/// label = 3
/// "#).unwrap();
/// assert_eq!(config.segmentation.segment_size, 1024);
/// assert_eq!(config.dataset.recordings.len(), 1);
/// assert_eq!(config.training.batch_size, 128);
/// ```
pub fn parse_config(content: &str) -> Result<PipelineConfig> {
    let file: ConfigFile = toml::from_str(content).context("Erreur de parsing TOML")?;
    let mut config = PipelineConfig::default();

    if let Some(s) = file.segmentation {
        if let Some(v) = s.segment_size {
            config.segmentation.segment_size = v;
        }
        if let Some(v) = s.segment_step {
            config.segmentation.segment_step = v;
        }
    }

    if let Some(d) = file.dataset {
        if let Some(v) = d.data_dir {
            config.dataset.data_dir = v;
        }
        if let Some(v) = d.channels {
            config.dataset.channels = v;
        }
        if let Some(v) = d.n_classes {
            config.dataset.n_classes = v;
        }
        if let Some(v) = d.class_names {
            config.dataset.class_names = v;
        }
        if let Some(v) = d.recordings {
            config.dataset.recordings = v;
        }
        if let Some(v) = d.test_fraction {
            config.dataset.test_fraction = v;
        }
        if let Some(v) = d.split_seed {
            config.dataset.split_seed = v;
        }
    }

    if let Some(t) = file.training {
        if let Some(v) = t.hidden_units {
            config.training.hidden_units = v;
        }
        if let Some(v) = t.l2 {
            config.training.l2 = v;
        }
        if let Some(v) = t.learning_rate {
            config.training.learning_rate = v;
        }
        if let Some(v) = t.epochs {
            config.training.epochs = v;
        }
        if let Some(v) = t.batch_size {
            config.training.batch_size = v;
        }
        if let Some(v) = t.seed {
            config.training.seed = v;
        }
    }

    warn_duplicates(&config.dataset.recordings);
    config.validate()?;
    Ok(config)
}

/// Charge un fichier TOML et fusionne avec les valeurs par défaut.
///
/// A relative `data_dir` is resolved against the config file's directory.
///
/// # Errors
/// Returns an error if the file cannot be read, parsed, or validated.
///
/// # Example
/// ```no_run
/// use bm_core::config::load_config;
/// use std::path::Path;
/// let config = load_config(Path::new("config/default.toml")).unwrap();
/// ```
pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Impossible de lire {}", path.display()))?;
    let mut config =
        parse_config(&content).with_context(|| format!("Config invalide : {}", path.display()))?;

    if config.dataset.data_dir.is_relative()
        && let Some(parent) = path.parent()
    {
        config.dataset.data_dir = parent.join(&config.dataset.data_dir);
    }
    Ok(config)
}

/// The list is ordered on purpose: a repeated file is read twice, never dropped.
fn warn_duplicates(entries: &[RecordingEntry]) {
    for (i, entry) in entries.iter().enumerate() {
        if entries[..i].iter().any(|e| e.file == entry.file) {
            log::warn!(
                "Enregistrement en double dans la liste : {} (label {})",
                entry.file.display(),
                entry.label
            );
        }
    }
}
