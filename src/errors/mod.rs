use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    // Input errors
    #[error("cannot parse URL {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0} not supported site")]
    UnsupportedSite(String),

    #[error("{site}:invalid input: {reason}")]
    InvalidInput { site: &'static str, reason: String },

    // Cache validation signal, not a failure
    #[error("content not modified")]
    NotModified,

    // Network errors
    #[error("HTTP/GET error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("HTTP status {status} from {url}")]
    HttpStatus { status: u16, url: String },

    // Decode errors
    #[error("charset detect error: {0}")]
    CharsetDetect(String),

    #[error("charset convert error: {0}")]
    CharsetDecode(String),

    #[error("invalid selector {0}")]
    Selector(String),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cannot parse timestamp [{value}]: {reason}")]
    Timestamp { value: String, reason: String },

    // Schema errors
    #[error("{site}:{field} not found")]
    MissingField {
        site: &'static str,
        field: &'static str,
    },

    #[error("{site}:{what} not found")]
    DataNotFound { site: &'static str, what: String },

    #[error("{site}:no episode entry")]
    EmptyResult { site: &'static str },

    // Propagation wrapper: "<site>:<stage>:<cause>"
    #[error("{site}:{stage}:{source}")]
    Stage {
        site: &'static str,
        stage: &'static str,
        #[source]
        source: Box<FeedError>,
    },

    // Front-end errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialize error: {0}")]
    Serialize(String),
}

impl FeedError {
    pub fn stage(site: &'static str, stage: &'static str) -> impl FnOnce(FeedError) -> FeedError {
        move |source| FeedError::Stage {
            site,
            stage,
            source: Box::new(source),
        }
    }

    /// Like [`FeedError::stage`], but errors that already name their site pass
    /// through untouched so the prefix is never doubled.
    pub fn within(site: &'static str, stage: &'static str) -> impl FnOnce(FeedError) -> FeedError {
        move |source| {
            if source.site().is_some() {
                source
            } else {
                FeedError::stage(site, stage)(source)
            }
        }
    }

    /// Site named by the error's own message, if any.
    pub fn site(&self) -> Option<&'static str> {
        match self {
            FeedError::InvalidInput { site, .. }
            | FeedError::MissingField { site, .. }
            | FeedError::DataNotFound { site, .. }
            | FeedError::EmptyResult { site }
            | FeedError::Stage { site, .. } => Some(*site),
            _ => None,
        }
    }

    pub fn missing(site: &'static str, field: &'static str) -> FeedError {
        FeedError::MissingField { site, field }
    }

    /// True when the upstream answered 304, however deeply the signal was wrapped.
    pub fn is_not_modified(&self) -> bool {
        match self {
            FeedError::NotModified => true,
            FeedError::Stage { source, .. } => source.is_not_modified(),
            _ => false,
        }
    }

    /// Innermost error beneath any stage wrappers.
    pub fn root(&self) -> &FeedError {
        match self {
            FeedError::Stage { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type FeedResult<T> = Result<T, FeedError>;
