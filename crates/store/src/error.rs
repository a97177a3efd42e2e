/// All errors that can be returned by the local store or a storage provider.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store was torn down; no further reads or writes are accepted.
    #[error("store has been torn down")]
    TornDown,

    /// A key passed to a collection operation does not carry the collection prefix.
    #[error("key {key} is not a member of collection {prefix}")]
    InvalidCollectionMember { key: String, prefix: String },

    /// A backend-specific persistence error (file I/O, locking, etc.).
    #[error("storage provider error: {0}")]
    Provider(String),

    /// A persisted document could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
