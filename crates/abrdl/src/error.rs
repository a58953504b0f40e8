use thiserror::Error;

#[derive(Error, Debug)]
pub enum AbrError {
    // Configuration errors
    #[error("Adaptation set contains no representation")]
    EmptyCatalog,

    #[error("Media template {template:?} of representation {representation} lacks ${placeholder}$")]
    MissingPlaceholder {
        representation: String,
        template: String,
        placeholder: &'static str,
    },

    #[error("Representation {0} has no SegmentTemplate")]
    NoSegmentTemplate(String),

    #[error("Representation {0} has no bandwidth")]
    MissingBandwidth(String),

    #[error("Period {0} not found in manifest")]
    NoSuchPeriod(usize),

    #[error("Adaptation set {0} not found in period")]
    NoSuchAdaptationSet(usize),

    #[error("Representation {0} not found in adaptation set")]
    UnknownRepresentation(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error(transparent)]
    MpdParseError(#[from] dash_mpd::DashMpdError),

    #[error(transparent)]
    UrlParseError(#[from] url::ParseError),

    // Segment errors
    #[error("HTTP error: {0}")]
    HttpError(reqwest::StatusCode),

    #[error("Request timed out")]
    Timeout,

    #[error(transparent)]
    RequestError(reqwest::Error),

    #[error("Segment too small: {size} bytes, expected more than {min}")]
    SegmentTooSmall { size: usize, min: usize },

    #[error(transparent)]
    IOError(#[from] std::io::Error),

    #[error("Cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for AbrError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            AbrError::Timeout
        } else if let Some(status) = e.status() {
            AbrError::HttpError(status)
        } else {
            AbrError::RequestError(e)
        }
    }
}

/// Coarse classification used by the session to decide whether an error ends it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Parse,
    Transport,
    Validation,
    Storage,
    Cancelled,
}

impl AbrError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AbrError::EmptyCatalog
            | AbrError::MissingPlaceholder { .. }
            | AbrError::NoSegmentTemplate(_)
            | AbrError::MissingBandwidth(_)
            | AbrError::NoSuchPeriod(_)
            | AbrError::NoSuchAdaptationSet(_)
            | AbrError::UnknownRepresentation(_)
            | AbrError::InvalidConfig(_) => ErrorKind::Configuration,
            AbrError::ManifestFetch(_) | AbrError::MpdParseError(_) | AbrError::UrlParseError(_) => {
                ErrorKind::Parse
            }
            AbrError::HttpError(_) | AbrError::Timeout | AbrError::RequestError(_) => {
                ErrorKind::Transport
            }
            AbrError::SegmentTooSmall { .. } => ErrorKind::Validation,
            AbrError::IOError(_) => ErrorKind::Storage,
            AbrError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Configuration and parse errors stop a session before it starts.
    pub fn is_fatal(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration | ErrorKind::Parse)
    }

    /// Whether fetching the same address again could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AbrError::HttpError(status) => *status != reqwest::StatusCode::NOT_FOUND,
            AbrError::Timeout | AbrError::RequestError(_) => true,
            _ => false,
        }
    }
}

pub type AbrResult<T> = Result<T, AbrError>;
