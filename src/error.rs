use thiserror::Error;

/// Errors that can occur while resolving a schema fragment against its root.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("Schema reference '{reference}' exceeded the maximum resolution depth of {max_depth}")]
    RefCycle { reference: String, max_depth: usize },

    #[error("Schema reference '{0}' is not a local pointer")]
    UnsupportedRef(String),
}

/// Errors returned by a block catalog or schema source.
#[derive(Error, Debug, Clone)]
pub enum FetchError {
    #[error("Request to '{url}' failed: {message}")]
    Transport { url: String, message: String },

    #[error("Server responded to '{url}' with HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("Could not decode the response from '{url}': {message}")]
    Decode { url: String, message: String },

    #[error("Block '{0}' is not known to the catalog")]
    UnknownBlock(String),

    #[error("Schema load for '{0}' was abandoned before it completed")]
    Abandoned(String),
}

/// A failure to turn JSON or YAML text into a document value.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Invalid JSON: {0}")]
    Json(String),

    #[error("Invalid YAML: {0}")]
    Yaml(String),
}

/// Errors raised by structural operations on the field value store.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    #[error("Value at '{0}' is not a sequence")]
    NotASequence(String),

    #[error("Index {index} is out of bounds for '{path}' (length {len})")]
    IndexOutOfBounds {
        path: String,
        index: usize,
        len: usize,
    },

    #[error("Index {index} under '{path}' is too far past the end of a sequence of length {len}")]
    IndexTooFar {
        path: String,
        index: usize,
        len: usize,
    },
}

/// Client-side validation failures that block a submission.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Required key '{0}' is missing")]
    KeyMissing(&'static str),

    #[error("Key '{0}' already exists")]
    DuplicateKey(String),

    #[error("Key must not be empty")]
    EmptyKey,
}

/// Errors surfaced by a module editor.
#[derive(Error, Debug, Clone)]
pub enum EditorError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Path '{0}' does not hold a block instance")]
    NotABlock(String),
}

/// Errors from calls to the HTTP collaborator that validate before sending.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
