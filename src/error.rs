use thiserror::Error;

/// Failures reported by a [`crate::storage::KeyValueStore`] or by blob
/// (de)serialization around it.
///
/// All of these are recoverable: the in-memory repository stays authoritative
/// and the next flush writes the full snapshot again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    #[error("reading `{key}` failed: {message}")]
    Read { key: String, message: String },

    #[error("writing `{key}` failed: {message}")]
    Write { key: String, message: String },

    #[error("encoding `{key}` failed: {message}")]
    Encode { key: String, message: String },

    #[error("stored `{key}` is not a valid file list: {message}")]
    Decode { key: String, message: String },

    /// The stored blob was never loaded, so writing would replace files the
    /// repository does not know about.
    #[error("not overwriting `{key}` until its stored files are loaded")]
    Held { key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EditorError {
    /// The id is not in the collection the operation works on.
    #[error("no such file: {id}")]
    NotFound { id: String },

    #[error(transparent)]
    Persistence(#[from] StoreError),
}

impl EditorError {
    pub(crate) fn not_found(id: &str) -> Self {
        Self::NotFound { id: id.to_string() }
    }
}

pub type EditorResult<T> = Result<T, EditorError>;
