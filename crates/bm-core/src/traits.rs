use anyhow::Result;
use ndarray::Array2;

use crate::dataset::Dataset;

/// Per-epoch metrics recorded while fitting.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingHistory {
    /// Mean training loss of each epoch (objective + regularization).
    pub loss: Vec<f32>,
    /// Element-wise binary accuracy of each epoch, threshold 0.5.
    pub accuracy: Vec<f32>,
}

impl TrainingHistory {
    /// Number of completed epochs.
    #[must_use]
    pub fn epochs(&self) -> usize {
        self.loss.len()
    }

    /// Loss of the last epoch, if any ran.
    #[must_use]
    pub fn final_loss(&self) -> Option<f32> {
        self.loss.last().copied()
    }
}

/// Entraîne un modèle sur des features étiquetées et prédit des probabilités.
///
/// Implémenté par : `DenseClassifier`.
///
/// # Example
/// ```
/// use bm_core::dataset::Dataset;
/// use bm_core::traits::{Classifier, TrainingHistory};
/// use ndarray::Array2;
///
/// /// Always predicts the first class.
/// struct FirstClass(usize);
/// impl Classifier for FirstClass {
///     fn fit(&mut self, train: &Dataset) -> anyhow::Result<TrainingHistory> {
///         self.0 = train.n_classes();
///         Ok(TrainingHistory::default())
///     }
///     fn predict_proba(&self, features: &Array2<f32>) -> anyhow::Result<Array2<f32>> {
///         let mut p = Array2::zeros((features.nrows(), self.0));
///         p.column_mut(0).fill(1.0);
///         Ok(p)
///     }
/// }
/// ```
pub trait Classifier {
    /// Fit on `train` (features + one-hot labels, equal row counts).
    ///
    /// # Errors
    /// Returns an error if the dataset shape does not match the model.
    fn fit(&mut self, train: &Dataset) -> Result<TrainingHistory>;

    /// One probability vector per input row (columns = classes).
    ///
    /// # Errors
    /// Returns an error if the feature width does not match the model.
    fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>>;
}
