use anyhow::{Result, bail};
use bm_core::config::TrainingConfig;
use bm_core::dataset::Dataset;
use bm_core::traits::{Classifier, TrainingHistory};
use ndarray::{Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::layer::{Activation, Adam, Dense};

/// Clipping applied to probabilities inside the cross-entropy.
const PROB_EPSILON: f32 = 1e-7;

/// Réseau dense feed-forward : couches cachées ReLU (L2), sortie sigmoïde.
///
/// Trained on binary cross-entropy with Adam, mini-batches reshuffled every
/// epoch. Layers are built lazily on the first [`fit`](Classifier::fit),
/// once the input width and class count are known.
///
/// # Example
/// ```
/// use bm_core::config::TrainingConfig;
/// use bm_core::dataset::{Dataset, one_hot};
/// use bm_core::traits::Classifier;
/// use bm_learn::network::DenseClassifier;
/// use ndarray::{Array2, concatenate, Axis};
///
/// let x = Array2::from_shape_fn((40, 4), |(r, c)| if (r < 20) == (c < 2) { 1.0 } else { 0.0 });
/// let y = concatenate(Axis(0), &[one_hot(0, 2, 20).view(), one_hot(1, 2, 20).view()]).unwrap();
/// let train = Dataset::new(x, y).unwrap();
///
/// let config = TrainingConfig { epochs: 50, batch_size: 8, ..TrainingConfig::default() };
/// let mut model = DenseClassifier::new(config);
/// let history = model.fit(&train).unwrap();
/// assert_eq!(history.epochs(), 50);
/// let p = model.predict_proba(train.features()).unwrap();
/// assert_eq!(p.dim(), (40, 2));
/// ```
pub struct DenseClassifier {
    config: TrainingConfig,
    layers: Vec<Dense>,
    rng: StdRng,
}

impl DenseClassifier {
    /// Untrained network with the given hyperparameters.
    #[must_use]
    pub fn new(config: TrainingConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.seed);
        Self {
            config,
            layers: Vec::new(),
            rng,
        }
    }

    /// Layer widths as `[input, hidden..., output]`, empty before fitting.
    #[must_use]
    pub fn topology(&self) -> Vec<usize> {
        let Some(first) = self.layers.first() else {
            return Vec::new();
        };
        std::iter::once(first.inputs())
            .chain(self.layers.iter().map(Dense::units))
            .collect()
    }

    fn build(&mut self, inputs: usize, n_classes: usize) {
        let mut layers = Vec::with_capacity(self.config.hidden_units.len() + 1);
        let mut width = inputs;
        for &units in &self.config.hidden_units {
            layers.push(Dense::new(
                width,
                units,
                Activation::Relu,
                self.config.l2,
                &mut self.rng,
            ));
            width = units;
        }
        layers.push(Dense::new(
            width,
            n_classes,
            Activation::Sigmoid,
            0.0,
            &mut self.rng,
        ));
        log::info!(
            "Réseau dense : {} paramètres, topologie {:?}",
            layers
                .iter()
                .map(|l| l.inputs() * l.units() + l.units())
                .sum::<usize>(),
            std::iter::once(inputs)
                .chain(layers.iter().map(Dense::units))
                .collect::<Vec<_>>()
        );
        self.layers = layers;
    }

    fn penalty(&self) -> f32 {
        self.layers.iter().map(Dense::penalty).sum()
    }

    /// One Adam step on a mini-batch. Returns (loss, correct element count).
    fn train_batch(&mut self, adam: &Adam, x: Array2<f32>, y: &Array2<f32>) -> (f32, usize) {
        let mut caches = Vec::with_capacity(self.layers.len());
        let mut activ = x;
        for layer in &self.layers {
            let cache = layer.forward_train(activ);
            activ = cache.output().clone();
            caches.push(cache);
        }
        let probs = activ;

        let loss = binary_cross_entropy(&probs, y) + self.penalty();
        let correct = binary_matches(&probs, y);

        // Sigmoid + mean BCE: dL/dZ = (p - y) / (rows * classes).
        let scale = 1.0 / (probs.len().max(1)) as f32;
        let mut grad = (&probs - y) * scale;
        for (layer, cache) in self.layers.iter_mut().zip(caches).rev() {
            grad = layer.backward(cache, grad, adam);
        }
        (loss, correct)
    }
}

impl Classifier for DenseClassifier {
    fn fit(&mut self, train: &Dataset) -> Result<TrainingHistory> {
        if train.is_empty() {
            bail!("Impossible d'entraîner sur un jeu vide");
        }
        if self.layers.is_empty() {
            self.build(train.width(), train.n_classes());
        } else if self.topology().first() != Some(&train.width())
            || self.topology().last() != Some(&train.n_classes())
        {
            bail!(
                "Dimensions incompatibles : modèle {:?}, données {} -> {}",
                self.topology(),
                train.width(),
                train.n_classes()
            );
        }

        let rows = train.rows();
        let batch_size = self.config.batch_size.max(1);
        let mut adam = Adam::new(self.config.learning_rate);
        let mut history = TrainingHistory::default();
        let mut order: Vec<usize> = (0..rows).collect();

        for epoch in 0..self.config.epochs {
            order.shuffle(&mut self.rng);
            let mut loss_sum = 0.0f64;
            let mut correct = 0usize;

            for batch in order.chunks(batch_size) {
                let x = train.features().select(Axis(0), batch);
                let y = train.labels().select(Axis(0), batch);
                adam.tick();
                let (loss, hits) = self.train_batch(&adam, x, &y);
                loss_sum += f64::from(loss) * batch.len() as f64;
                correct += hits;
            }

            let epoch_loss = (loss_sum / rows as f64) as f32;
            let epoch_acc = correct as f32 / (rows * train.n_classes()) as f32;
            history.loss.push(epoch_loss);
            history.accuracy.push(epoch_acc);

            if epoch == 0 || (epoch + 1) % 20 == 0 || epoch + 1 == self.config.epochs {
                log::info!(
                    "Epoch {}/{} - loss {epoch_loss:.4} - accuracy {epoch_acc:.4}",
                    epoch + 1,
                    self.config.epochs
                );
            } else {
                log::debug!(
                    "Epoch {}/{} - loss {epoch_loss:.4} - accuracy {epoch_acc:.4}",
                    epoch + 1,
                    self.config.epochs
                );
            }
            if !epoch_loss.is_finite() {
                bail!("Perte non finie à l'epoch {}", epoch + 1);
            }
        }

        Ok(history)
    }

    fn predict_proba(&self, features: &Array2<f32>) -> Result<Array2<f32>> {
        let Some(first) = self.layers.first() else {
            bail!("Modèle non entraîné");
        };
        if features.ncols() != first.inputs() {
            bail!(
                "Largeur de features {} incompatible avec le modèle ({})",
                features.ncols(),
                first.inputs()
            );
        }

        let mut activ = features.clone();
        for layer in &self.layers {
            activ = layer.forward(activ.view());
        }
        Ok(activ)
    }
}

/// Mean binary cross-entropy over every element, probabilities clipped.
///
/// # Example
/// ```
/// use bm_learn::network::binary_cross_entropy;
/// use ndarray::array;
/// let p = array![[0.5f32, 0.5]];
/// let y = array![[1.0f32, 0.0]];
/// assert!((binary_cross_entropy(&p, &y) - std::f32::consts::LN_2).abs() < 1e-6);
/// ```
#[must_use]
pub fn binary_cross_entropy(probs: &Array2<f32>, targets: &Array2<f32>) -> f32 {
    if probs.is_empty() {
        return 0.0;
    }
    let sum: f32 = probs
        .iter()
        .zip(targets.iter())
        .map(|(&p, &y)| {
            let p = p.clamp(PROB_EPSILON, 1.0 - PROB_EPSILON);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    sum / probs.len() as f32
}

/// Elements where `p > 0.5` agrees with the 0/1 target.
fn binary_matches(probs: &Array2<f32>, targets: &Array2<f32>) -> usize {
    probs
        .iter()
        .zip(targets.iter())
        .filter(|&(&p, &y)| (p > 0.5) == (y > 0.5))
        .count()
}
