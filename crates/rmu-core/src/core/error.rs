use thiserror::Error;

pub type RmuResult<T> = Result<T, RmuError>;

#[derive(Error, Debug)]
pub enum RmuError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Path error: {0}")]
    Path(String),

    #[error("Configuration error: {0}")]
    Config(String),

    /// The binary's metadata could not be read (foreign or malformed image).
    #[error("Metadata parse error: {0}")]
    Parse(String),

    /// No type deriving from the marker type exposes the link accessor.
    #[error("no reference found")]
    MarkerNotFound,

    /// A string was found but it is not a usable repository URL.
    #[error("Invalid reference URL '{url}': {reason}")]
    ReferenceInvalid { url: String, reason: String },

    /// The hosting service kept refusing requests and the retry policy gave up.
    #[error("Rate limited by {0} after {1} retries")]
    RateLimited(String, u32),

    #[error("No asset named '{asset}' in {repo}")]
    AssetNotFound { asset: String, repo: String },

    #[error("Network error: {0}")]
    Network(String),

    /// Tag feed empty, unreachable or malformed.
    #[error("Tag feed error: {0}")]
    Feed(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl RmuError {
    /// True when the error came from the run being cancelled rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RmuError::Cancelled)
    }
}
