use thiserror::Error;

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, Error)]
pub enum DashboardError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("file is empty or has no data rows")]
    EmptyFile,

    #[error("missing required columns: {}", .field.join(", "))]
    MissingField { field: Vec<String> },

    #[error("line {line}: column {field} has invalid value {value:?}")]
    TypeMismatch {
        line: usize,
        field: String,
        value: String,
    },

    #[error("forecasting needs at least 2 usable rows, got {rows}")]
    InsufficientHistory { rows: usize },

    #[error("forecast horizon of {periods} days is out of range")]
    ForecastHorizon { periods: usize },

    #[error("Please enter an incident description.")]
    EmptyIncident,

    #[error("no classifier credentials: set HF_API_TOKEN or HUGGINGFACEHUB_API_TOKEN")]
    MissingCredentials,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("classifier returned status {status}: {body}")]
    Classifier { status: u16, body: String },
}
