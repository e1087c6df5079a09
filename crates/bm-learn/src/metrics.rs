use std::fmt;

/// Counts of (true class, predicted class) pairs.
///
/// # Example
/// ```
/// use bm_learn::metrics::ConfusionMatrix;
/// let cm = ConfusionMatrix::new(&[0, 1, 1], &[0, 1, 0], 2);
/// assert_eq!(cm.count(1, 0), 1);
/// assert_eq!(cm.total(), 3);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfusionMatrix {
    n_classes: usize,
    /// Row-major, `counts[truth * n_classes + predicted]`.
    counts: Vec<usize>,
}

impl ConfusionMatrix {
    /// Tally paired labels. Pairs with an index `>= n_classes` are ignored.
    #[must_use]
    pub fn new(truth: &[usize], predicted: &[usize], n_classes: usize) -> Self {
        let mut counts = vec![0; n_classes * n_classes];
        for (&t, &p) in truth.iter().zip(predicted) {
            if t < n_classes && p < n_classes {
                counts[t * n_classes + p] += 1;
            }
        }
        Self { n_classes, counts }
    }

    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// Rows with true class `truth` predicted as `predicted`.
    #[must_use]
    pub fn count(&self, truth: usize, predicted: usize) -> usize {
        self.counts[truth * self.n_classes + predicted]
    }

    /// Total pairs tallied.
    #[must_use]
    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }

    /// Rows whose true class is `class`.
    #[must_use]
    pub fn support(&self, class: usize) -> usize {
        (0..self.n_classes).map(|p| self.count(class, p)).sum()
    }

    /// Rows predicted as `class`.
    #[must_use]
    pub fn predicted(&self, class: usize) -> usize {
        (0..self.n_classes).map(|t| self.count(t, class)).sum()
    }

    /// Diagonal sum.
    #[must_use]
    pub fn correct(&self) -> usize {
        (0..self.n_classes).map(|c| self.count(c, c)).sum()
    }
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:>8}", "true\\pred")?;
        for p in 0..self.n_classes {
            write!(f, "{p:>7}")?;
        }
        writeln!(f)?;
        for t in 0..self.n_classes {
            write!(f, "{t:>9}")?;
            for p in 0..self.n_classes {
                write!(f, "{:>7}", self.count(t, p))?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

/// Precision, recall, F1 and support of one class.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassScores {
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    pub support: usize,
}

/// Per-class precision/recall/F1 with accuracy and macro/weighted averages.
///
/// A ratio with a zero denominator is reported as 0.0.
///
/// # Example
/// ```
/// use bm_learn::metrics::ClassificationReport;
/// let report = ClassificationReport::new(&[0, 0, 1, 1], &[0, 1, 1, 1], 2);
/// assert!((report.accuracy() - 0.75).abs() < 1e-6);
/// assert!((report.class(1).precision - 2.0 / 3.0).abs() < 1e-6);
/// assert!((report.class(0).recall - 0.5).abs() < 1e-6);
/// ```
#[derive(Clone, Debug)]
pub struct ClassificationReport {
    classes: Vec<ClassScores>,
    names: Vec<String>,
    confusion: ConfusionMatrix,
}

impl ClassificationReport {
    /// Score `predicted` against `truth` over `n_classes` classes.
    #[must_use]
    pub fn new(truth: &[usize], predicted: &[usize], n_classes: usize) -> Self {
        let confusion = ConfusionMatrix::new(truth, predicted, n_classes);
        let classes = (0..n_classes)
            .map(|c| {
                let tp = confusion.count(c, c) as f32;
                let support = confusion.support(c);
                let precision = ratio(tp, confusion.predicted(c) as f32);
                let recall = ratio(tp, support as f32);
                let f1 = ratio(2.0 * precision * recall, precision + recall);
                ClassScores {
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();
        Self {
            classes,
            names: (0..n_classes).map(|c| c.to_string()).collect(),
            confusion,
        }
    }

    /// Replace the row labels used by `Display`. Missing names keep the index.
    #[must_use]
    pub fn with_names(mut self, names: &[String]) -> Self {
        for (slot, name) in self.names.iter_mut().zip(names) {
            slot.clone_from(name);
        }
        self
    }

    /// Scores of one class.
    #[must_use]
    pub fn class(&self, class: usize) -> &ClassScores {
        &self.classes[class]
    }

    /// Underlying confusion matrix.
    #[must_use]
    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    /// Fraction of rows predicted correctly.
    #[must_use]
    pub fn accuracy(&self) -> f32 {
        ratio(self.confusion.correct() as f32, self.confusion.total() as f32)
    }

    /// Unweighted mean over classes.
    #[must_use]
    pub fn macro_avg(&self) -> ClassScores {
        let n = self.classes.len().max(1) as f32;
        ClassScores {
            precision: self.classes.iter().map(|c| c.precision).sum::<f32>() / n,
            recall: self.classes.iter().map(|c| c.recall).sum::<f32>() / n,
            f1: self.classes.iter().map(|c| c.f1).sum::<f32>() / n,
            support: self.confusion.total(),
        }
    }

    /// Mean over classes weighted by support.
    #[must_use]
    pub fn weighted_avg(&self) -> ClassScores {
        let total = self.confusion.total() as f32;
        let weighted = |score: fn(&ClassScores) -> f32| {
            ratio(
                self.classes
                    .iter()
                    .map(|c| score(c) * c.support as f32)
                    .sum::<f32>(),
                total,
            )
        };
        ClassScores {
            precision: weighted(|c| c.precision),
            recall: weighted(|c| c.recall),
            f1: weighted(|c| c.f1),
            support: self.confusion.total(),
        }
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .names
            .iter()
            .map(String::len)
            .chain(["weighted avg".len()])
            .max()
            .unwrap_or(12);

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for (name, c) in self.names.iter().zip(&self.classes) {
            writeln!(
                f,
                "{name:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                c.precision, c.recall, c.f1, c.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy",
            "",
            "",
            self.accuracy(),
            self.confusion.total()
        )?;
        for (label, avg) in [
            ("macro avg", self.macro_avg()),
            ("weighted avg", self.weighted_avg()),
        ] {
            writeln!(
                f,
                "{label:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }
        Ok(())
    }
}

#[inline]
fn ratio(num: f32, den: f32) -> f32 {
    if den > 0.0 { num / den } else { 0.0 }
}
