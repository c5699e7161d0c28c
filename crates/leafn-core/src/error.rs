use thiserror::Error;

/// Every failure aborts the analysis run; variants exist so the operator can
/// see which input or fold broke it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("column `{0}` not found in CSV header")]
    MissingColumn(String),

    #[error("row {row}: cannot parse `{value}` in column `{column}`")]
    ParseValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("test set is empty")]
    EmptyTestSet,

    #[error("row {0} is in both the training and the test set")]
    OverlappingFold(usize),

    #[error("row index {index} out of range for a table of {len} rows")]
    RowOutOfRange { index: usize, len: usize },

    #[error("k-means with k = {k} needs at least {k} points, got {n}")]
    TooFewPoints { k: usize, n: usize },

    #[error("non-finite value in {0}")]
    NonFinite(String),

    #[error("invalid parameter: {0}")]
    InvalidParams(String),

    #[error("model library: {0}")]
    Model(String),

    #[error("folds do not cover the table exactly once: {0}")]
    InvalidFolds(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
