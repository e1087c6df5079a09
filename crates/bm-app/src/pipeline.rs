use anyhow::{Context, Result};
use bm_audio::assembler::assemble;
use bm_core::config::PipelineConfig;
use bm_core::dataset::{Dataset, argmax_rows};
use bm_core::traits::{Classifier, TrainingHistory};
use bm_learn::metrics::ClassificationReport;
use bm_learn::network::DenseClassifier;

/// Everything the run reports once training and evaluation are done.
#[derive(Debug)]
pub struct RunSummary {
    /// Rows used for training.
    pub train_rows: usize,
    /// Rows held out for evaluation.
    pub test_rows: usize,
    /// Spectral feature width.
    pub feature_width: usize,
    /// Per-epoch loss and accuracy.
    pub history: TrainingHistory,
    /// Scores on the held-out partition.
    pub report: ClassificationReport,
}

/// Lance le pipeline complet : chargement, segmentation, spectres, entraînement, évaluation.
///
/// # Errors
/// Returns an error if any recording cannot be read, no window is produced,
/// the split leaves a partition empty, or training fails.
pub fn run(config: &PipelineConfig) -> Result<RunSummary> {
    log::info!(
        "Étape 1/3 : Assemblage de {} enregistrement(s) depuis {}",
        config.dataset.recordings.len(),
        config.dataset.data_dir.display()
    );
    let dataset = assemble(config).context("Assemblage du jeu de données")?;

    let mut model = DenseClassifier::new(config.training.clone());
    train_and_evaluate(config, &dataset, &mut model)
}

/// Split, fit `model` on the training rows and score it on the test rows.
///
/// # Errors
/// Returns an error if the split fails or the classifier rejects the data.
pub fn train_and_evaluate<C: Classifier>(
    config: &PipelineConfig,
    dataset: &Dataset,
    model: &mut C,
) -> Result<RunSummary> {
    let (train, test) = dataset
        .train_test_split(config.dataset.test_fraction, config.dataset.split_seed)
        .context("Split train/test")?;
    log::info!(
        "Étape 2/3 : Entraînement sur {} x {} ({} classes), test sur {}",
        train.rows(),
        train.width(),
        train.n_classes(),
        test.rows()
    );
    let history = model.fit(&train)?;

    log::info!("Étape 3/3 : Évaluation");
    let probs = model.predict_proba(test.features())?;
    let predicted = argmax_rows(&probs);
    let truth = argmax_rows(test.labels());
    let report = ClassificationReport::new(&truth, &predicted, config.dataset.n_classes)
        .with_names(&class_labels(config));
    log::info!("Accuracy sur le test : {:.4}", report.accuracy());

    Ok(RunSummary {
        train_rows: train.rows(),
        test_rows: test.rows(),
        feature_width: train.width(),
        history,
        report,
    })
}

/// One display name per class; classes without a configured name show their index.
fn class_labels(config: &PipelineConfig) -> Vec<String> {
    (0..config.dataset.n_classes)
        .map(|class| config.dataset.class_name(class))
        .collect()
}
