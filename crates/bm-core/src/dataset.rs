use ndarray::{Array2, Axis, concatenate};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::CoreError;

/// Row-aligned feature and one-hot label matrices.
///
/// Row `i` of `labels` is the class of row `i` of `features`. The
/// constructor is the only way in, so the row counts always agree.
///
/// # Example
/// ```
/// use bm_core::dataset::{Dataset, one_hot};
/// use ndarray::Array2;
///
/// let features = Array2::<f32>::zeros((3, 8));
/// let ds = Dataset::new(features, one_hot(2, 4, 3)).unwrap();
/// assert_eq!(ds.rows(), 3);
/// assert_eq!(ds.n_classes(), 4);
/// ```
#[derive(Clone, Debug, PartialEq)]
pub struct Dataset {
    features: Array2<f32>,
    labels: Array2<f32>,
}

impl Dataset {
    /// Pair a feature matrix with its label matrix.
    ///
    /// # Errors
    /// Returns [`CoreError::RowMismatch`] if the row counts differ.
    pub fn new(features: Array2<f32>, labels: Array2<f32>) -> Result<Self, CoreError> {
        if features.nrows() != labels.nrows() {
            return Err(CoreError::RowMismatch {
                features: features.nrows(),
                labels: labels.nrows(),
            });
        }
        Ok(Self { features, labels })
    }

    /// Feature matrix (rows = windows).
    #[must_use]
    pub fn features(&self) -> &Array2<f32> {
        &self.features
    }

    /// One-hot label matrix (columns = classes).
    #[must_use]
    pub fn labels(&self) -> &Array2<f32> {
        &self.labels
    }

    /// Number of rows.
    #[must_use]
    pub fn rows(&self) -> usize {
        self.features.nrows()
    }

    /// Columns of the feature matrix.
    #[must_use]
    pub fn width(&self) -> usize {
        self.features.ncols()
    }

    /// Columns of the label matrix.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.labels.ncols()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows() == 0
    }

    /// Rebuild with a transformed feature matrix, keeping the labels.
    ///
    /// # Errors
    /// Returns [`CoreError::RowMismatch`] if `f` changes the row count.
    pub fn map_features<F>(self, f: F) -> Result<Self, CoreError>
    where
        F: FnOnce(Array2<f32>) -> Array2<f32>,
    {
        Self::new(f(self.features), self.labels)
    }

    /// Concatenate datasets once, in order.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptyDataset`] for an empty slice and
    /// [`CoreError::WidthMismatch`] when feature or label widths differ.
    ///
    /// # Example
    /// ```
    /// use bm_core::dataset::{Dataset, one_hot};
    /// use ndarray::Array2;
    ///
    /// let a = Dataset::new(Array2::zeros((2, 4)), one_hot(0, 3, 2)).unwrap();
    /// let b = Dataset::new(Array2::ones((5, 4)), one_hot(2, 3, 5)).unwrap();
    /// let all = Dataset::concat(&[a, b]).unwrap();
    /// assert_eq!(all.rows(), 7);
    /// assert_eq!(all.labels()[[6, 2]], 1.0);
    /// ```
    pub fn concat(parts: &[Dataset]) -> Result<Self, CoreError> {
        let first = parts.first().ok_or(CoreError::EmptyDataset)?;
        for part in parts {
            if part.width() != first.width() {
                return Err(CoreError::WidthMismatch {
                    expected: first.width(),
                    found: part.width(),
                });
            }
            if part.n_classes() != first.n_classes() {
                return Err(CoreError::WidthMismatch {
                    expected: first.n_classes(),
                    found: part.n_classes(),
                });
            }
        }

        let feature_views: Vec<_> = parts.iter().map(|p| p.features.view()).collect();
        let label_views: Vec<_> = parts.iter().map(|p| p.labels.view()).collect();
        let features = concatenate(Axis(0), &feature_views)?;
        let labels = concatenate(Axis(0), &label_views)?;
        Self::new(features, labels)
    }

    /// Rows at `indices`, in that order.
    #[must_use]
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: self.labels.select(Axis(0), indices),
        }
    }

    /// Shuffle-split into `(train, test)`.
    ///
    /// The test partition holds `ceil(rows × test_fraction)` rows taken from
    /// the front of a permutation seeded with `seed`; the training partition
    /// holds the rest. Feature and label rows move together.
    ///
    /// # Errors
    /// Returns [`CoreError::EmptySplit`] if either partition would be empty.
    ///
    /// # Example
    /// ```
    /// use bm_core::dataset::{Dataset, one_hot};
    /// use ndarray::Array2;
    ///
    /// let ds = Dataset::new(Array2::zeros((12, 3)), one_hot(1, 2, 12)).unwrap();
    /// let (train, test) = ds.train_test_split(0.25, 42).unwrap();
    /// assert_eq!((train.rows(), test.rows()), (9, 3));
    /// ```
    pub fn train_test_split(
        &self,
        test_fraction: f32,
        seed: u64,
    ) -> Result<(Self, Self), CoreError> {
        let rows = self.rows();
        let n_test = test_rows(rows, test_fraction);
        if n_test == 0 || n_test >= rows {
            return Err(CoreError::EmptySplit {
                rows,
                test_fraction,
            });
        }

        let mut permutation: Vec<usize> = (0..rows).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        permutation.shuffle(&mut rng);

        let (test_idx, train_idx) = permutation.split_at(n_test);
        Ok((self.select(train_idx), self.select(test_idx)))
    }
}

/// `ceil(rows × test_fraction)`, computed against the decimal value of the fraction.
///
/// An `f32` fraction such as 0.1 is stored slightly above its decimal value;
/// the product is pulled back by that representation error before `ceil`.
fn test_rows(rows: usize, test_fraction: f32) -> usize {
    let scaled = rows as f64 * f64::from(test_fraction);
    (scaled - scaled * f64::from(f32::EPSILON)).ceil().max(0.0) as usize
}

/// `rows` copies of the one-hot vector of `class` over `n_classes` columns.
///
/// # Panics
/// Panics if `class >= n_classes`; labels are validated with the config.
///
/// # Example
/// ```
/// use bm_core::dataset::one_hot;
/// let y = one_hot(1, 3, 2);
/// assert_eq!(y.row(0).to_vec(), vec![0.0, 1.0, 0.0]);
/// assert_eq!(y.nrows(), 2);
/// ```
#[must_use]
pub fn one_hot(class: usize, n_classes: usize, rows: usize) -> Array2<f32> {
    assert!(class < n_classes, "class {class} out of 0..{n_classes}");
    let mut labels = Array2::zeros((rows, n_classes));
    labels.column_mut(class).fill(1.0);
    labels
}

/// Index of the largest value of each row; ties go to the lowest index.
///
/// # Example
/// ```
/// use bm_core::dataset::argmax_rows;
/// use ndarray::array;
/// let p = array![[0.1, 0.7, 0.2], [0.9, 0.05, 0.05]];
/// assert_eq!(argmax_rows(&p), vec![1, 0]);
/// ```
#[must_use]
pub fn argmax_rows(matrix: &Array2<f32>) -> Vec<usize> {
    matrix
        .rows()
        .into_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |(best, max), (i, &v)| {
                    if v > max { (i, v) } else { (best, max) }
                })
                .0
        })
        .collect()
}
