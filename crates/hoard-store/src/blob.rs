use std::collections::BTreeMap;

use bytes::Bytes;
use hoard_types::BlobId;

/// Blob headers: small string metadata stored next to the content.
pub type Headers = BTreeMap<String, String>;

/// Well-known header carrying the logical name of a blob.
pub const BLOB_NAME_HEADER: &str = "BlobStore.blob-name";
/// Well-known header naming the principal that wrote the blob.
pub const CREATED_BY_HEADER: &str = "BlobStore.created-by";
/// Well-known header carrying the content type.
pub const CONTENT_TYPE_HEADER: &str = "BlobStore.content-type";

// ---------------------------------------------------------------------------
// Blob
// ---------------------------------------------------------------------------

/// An immutable unit of binary content plus its headers.
///
/// The store never interprets `data`. The id always equals
/// `BlobId::for_content(&data)`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Blob {
    pub id: BlobId,
    pub data: Bytes,
    pub headers: Headers,
}

impl Blob {
    /// Create a blob, computing its content-addressed id.
    pub fn new(data: impl Into<Bytes>, headers: Headers) -> Self {
        let data = data.into();
        Self {
            id: BlobId::for_content(&data),
            data,
            headers,
        }
    }

    /// Content size in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// The `BlobStore.blob-name` header, if present.
    pub fn blob_name(&self) -> Option<&str> {
        self.headers.get(BLOB_NAME_HEADER).map(String::as_str)
    }

    /// Returns `true` if the content still hashes to the stored id.
    pub fn verify(&self) -> bool {
        BlobId::for_content(&self.data) == self.id
    }
}

/// Build a header map from `(key, value)` pairs.
pub fn headers<I, K, V>(pairs: I) -> Headers
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
