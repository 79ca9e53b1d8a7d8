//! Storage Gateway capability
//!
//! Object storage is an external collaborator: this crate only defines the
//! capability surface the resolution pipeline and the retention engine need
//! — upload, streamed download, single-key delete, prefix delete, signed-URL
//! issuance, and existence checks. Concrete backends (S3, GCS, local disk,
//! ...) live outside this crate and implement [`Storage`].
//!
//! Storage keys follow the convention `{owner}/{name}/commits/{commitSha}/{path}`
//! for commit-scoped assets and `{owner}/{name}/uploads/{date}/{name}` for
//! upload-scoped assets; callers are responsible for percent-decoding and
//! stripping `..` and control characters before constructing a key.

use std::future::Future;
use std::pin::Pin;

use axum::body::Bytes;
use futures::Stream;
use thiserror::Error;

/// Error surfaced by a [`Storage`] implementation.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    #[error("storage I/O error: {0}")]
    Io(String),
}

/// A byte stream read from storage, boxed for object safety.
pub type ByteStream =
    Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send + 'static>>;

/// Abstract object store with streaming read and prefix delete.
///
/// Every method is fallible and async; implementations are expected to be
/// cheap to clone (an `Arc`-wrapped client) and safe to share across tasks.
pub trait Storage: Send + Sync {
    /// Upload `body` to `key`, overwriting any existing object.
    fn upload(
        &self,
        key: &str,
        body: Bytes,
        content_type: Option<&str>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Open a streaming read of the object at `key`.
    fn download(&self, key: &str) -> impl Future<Output = Result<ByteStream, StorageError>> + Send;

    /// Delete a single object. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Delete every object whose key begins with `prefix`.
    ///
    /// Used by the retention engine for full-commit deletion
    /// (`{owner}/{name}/commits/{commitSha}/`).
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Issue a time-limited signed URL for direct client access to `key`.
    fn get_url(
        &self,
        key: &str,
        expires_in_secs: u64,
    ) -> impl Future<Output = Result<String, StorageError>> + Send;

    /// Check whether an object exists at `key` without downloading it.
    fn exists(&self, key: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}

/// Build the canonical commit-scoped storage key.
///
/// `{owner}/{name}/commits/{commitSha}/{publicPath-or-basename}`
pub fn commit_storage_key(owner: &str, name: &str, commit_sha: &str, path: &str) -> String {
    format!(
        "{}/{}/commits/{}/{}",
        owner,
        name,
        commit_sha,
        sanitize_path_component(path)
    )
}

/// Build the canonical upload-scoped storage key.
///
/// `{owner}/{name}/uploads/{YYYY-MM-DD}/{uuid-or-name}`
pub fn upload_storage_key(owner: &str, name: &str, date: &str, file_name: &str) -> String {
    format!(
        "{}/{}/uploads/{}/{}",
        owner,
        name,
        date,
        sanitize_path_component(file_name)
    )
}

/// Percent-decode a path component and strip `..` segments and control
/// characters, per the storage-key convention invariant.
fn sanitize_path_component(raw: &str) -> String {
    let decoded = percent_decode(raw);
    decoded
        .split('/')
        .filter(|segment| !segment.is_empty() && *segment != ".." && *segment != ".")
        .map(|segment| {
            segment
                .chars()
                .filter(|c| !c.is_control())
                .collect::<String>()
        })
        .collect::<Vec<_>>()
        .join("/")
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let Ok(hex) = std::str::from_utf8(&bytes[i + 1..i + 3]) {
                if let Ok(byte) = u8::from_str_radix(hex, 16) {
                    out.push(byte);
                    i += 3;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_key_follows_convention() {
        let key = commit_storage_key("acme", "docs-site", "abc123", "index.html");
        assert_eq!(key, "acme/docs-site/commits/abc123/index.html");
    }

    #[test]
    fn upload_key_follows_convention() {
        let key = upload_storage_key("acme", "docs-site", "2026-07-27", "logo.png");
        assert_eq!(key, "acme/docs-site/uploads/2026-07-27/logo.png");
    }

    #[test]
    fn sanitize_strips_parent_traversal() {
        assert_eq!(sanitize_path_component("../../etc/passwd"), "etc/passwd");
    }

    #[test]
    fn sanitize_strips_control_characters() {
        assert_eq!(sanitize_path_component("foo\u{0000}bar"), "foobar");
    }

    #[test]
    fn sanitize_percent_decodes() {
        assert_eq!(sanitize_path_component("my%20file.txt"), "my file.txt");
    }
}
