use thiserror::Error;

/// Errors originating from the core module.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Invalid configuration value or structure.
    #[error("Configuration invalide : {0}")]
    Config(String),

    /// Class index outside `0..n_classes`.
    #[error("Label invalide : {label} (n_classes = {n_classes})")]
    InvalidLabel {
        /// Offending class index.
        label: usize,
        /// Number of classes configured.
        n_classes: usize,
    },

    /// Feature and label matrices disagree on row count.
    #[error("Nombre de lignes incohérent : {features} features / {labels} labels")]
    RowMismatch {
        /// Rows in the feature matrix.
        features: usize,
        /// Rows in the label matrix.
        labels: usize,
    },

    /// Datasets with different column widths cannot be concatenated.
    #[error("Largeurs incompatibles : attendu {expected}, trouvé {found}")]
    WidthMismatch {
        /// Width of the first dataset.
        expected: usize,
        /// Width of the offending dataset.
        found: usize,
    },

    /// Matrix construction or concatenation rejected by ndarray.
    #[error("Forme de matrice invalide : {0}")]
    Shape(#[from] ndarray::ShapeError),

    /// No recording produced a single window.
    #[error("Jeu de données vide : aucune fenêtre extraite")]
    EmptyDataset,

    /// The train/test split would leave one partition empty.
    #[error("Partition vide : {rows} lignes avec test_fraction = {test_fraction}")]
    EmptySplit {
        /// Total rows available.
        rows: usize,
        /// Requested held-out fraction.
        test_fraction: f32,
    },
}
