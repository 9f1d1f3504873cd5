use thiserror::Error;

/// Unified error type for hdl-mirror operations
#[derive(Error, Debug)]
pub enum MirrorError {
    #[error("Git operation failed: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Malformed tag '{tag}': {reason}")]
    MalformedTag { tag: String, reason: String },

    #[error("Ambiguous describe '{description}': expected exactly one version, found {found}")]
    AmbiguousDescribe { description: String, found: usize },

    #[error("No matching tag reachable from '{reference}'")]
    DescribeUnavailable { reference: String },

    #[error("Tag error: {0}")]
    Tag(String),

    #[error("Template error: {0}")]
    Template(String),

    #[error("Hosting API error: {0}")]
    Hosting(String),

    #[error("License error: {0}")]
    License(String),

    #[error("Vendoring failed: {0}")]
    Vendor(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience type alias for Results in hdl-mirror
pub type Result<T> = std::result::Result<T, MirrorError>;

impl MirrorError {
    /// Create a configuration error with context
    pub fn config(msg: impl Into<String>) -> Self {
        MirrorError::Config(msg.into())
    }

    /// Create a tag error with context
    pub fn tag(msg: impl Into<String>) -> Self {
        MirrorError::Tag(msg.into())
    }

    /// Create a template error with context
    pub fn template(msg: impl Into<String>) -> Self {
        MirrorError::Template(msg.into())
    }

    /// Create a hosting error with context
    pub fn hosting(msg: impl Into<String>) -> Self {
        MirrorError::Hosting(msg.into())
    }

    /// Create a license error with context
    pub fn license(msg: impl Into<String>) -> Self {
        MirrorError::License(msg.into())
    }

    /// Create a vendoring error with context
    pub fn vendor(msg: impl Into<String>) -> Self {
        MirrorError::Vendor(msg.into())
    }

    pub fn malformed(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        MirrorError::MalformedTag {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}
