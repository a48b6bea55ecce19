use std::io;
use std::path::Path;

use bytes::BytesMut;
use opendal::{ErrorKind, Operator};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_encode};
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

// https://github.com/seanmonstar/reqwest/blob/61b1b2b5e6dace3733cdba291801378dd974386a/src/async_impl/multipart.rs#L438
const ATTR_CHAR: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'!')
    .remove(b'#')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b'-')
    .remove(b'.')
    .remove(b'^')
    .remove(b'_')
    .remove(b'`')
    .remove(b'|')
    .remove(b'~');

/// Read chunk size of the source file.
const CHUNK_SIZE: usize = 8 * 1024 * 1024;

/// Why an upload failed, so callers can branch on cause instead of parsing a
/// flattened report.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Source file missing or unreadable. Nothing has been sent.
    #[error("cannot read source file: {path}")]
    SourceNotFound {
        path: String,
        #[source]
        source: io::Error,
    },
    /// The endpoint rejected our credentials.
    #[error("credentials rejected by endpoint")]
    Auth(#[source] opendal::Error),
    /// The target bucket does not exist on the endpoint.
    #[error("target bucket not found")]
    BucketNotFound(#[source] opendal::Error),
    /// The endpoint is unreachable, or the transfer timed out.
    #[error("endpoint unreachable or transfer timed out")]
    Connectivity(#[source] opendal::Error),
    /// Any other storage failure.
    #[error(transparent)]
    Storage(opendal::Error),
}

fn classify(err: opendal::Error) -> UploadError {
    match err.kind() {
        // The object key is being created, so a 404 here can only mean the
        // bucket itself is missing.
        ErrorKind::NotFound => UploadError::BucketNotFound(err),
        ErrorKind::PermissionDenied => UploadError::Auth(err),
        ErrorKind::Unexpected if err.is_temporary() => UploadError::Connectivity(err),
        _ => UploadError::Storage(err),
    }
}

/// Summary of a finished upload.
#[derive(Debug, Clone)]
pub struct Uploaded {
    pub key: String,
    pub bytes: u64,
}

/// Upload a local file to `key` on the target operator.
///
/// Contents are streamed in `CHUNK_SIZE` blocks, so arbitrarily large files
/// are fine. An existing object under the same key is overwritten.
///
/// The stored object carries a content type guessed from the source file
/// extension and a content disposition preserving the original file name.
///
/// # Errors
/// Returns an [`UploadError`] naming the failure cause. On error no complete
/// object is left behind under `key`.
pub async fn upload(op: &Operator, source: &Path, key: &str) -> Result<Uploaded, UploadError> {
    let unreadable = |source_err| UploadError::SourceNotFound {
        path: source.display().to_string(),
        source: source_err,
    };
    let mut file = File::open(source).await.map_err(unreadable)?;

    let content_type = mime_guess::from_path(source).first_or_octet_stream();
    let content_disposition = source.file_name().map(|name| {
        let encoded = percent_encode(name.as_encoded_bytes(), ATTR_CHAR);
        format!("attachment; filename=\"{encoded}\"; filename*=UTF-8''{encoded}")
    });

    // Not every backend takes these hints (the in-memory one used in tests
    // doesn't), and passing them unsupported is a hard error.
    let cap = op.info().full_capability();
    let mut writer = op.writer_with(key);
    if cap.write_with_content_type {
        writer = writer.content_type(content_type.as_ref());
    }
    if let (true, Some(content_disposition)) =
        (cap.write_with_content_disposition, &content_disposition)
    {
        writer = writer.content_disposition(content_disposition);
    }
    let mut writer = writer.await.map_err(classify)?;

    let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
    let mut bytes = 0;
    loop {
        let n = file.read_buf(&mut buf).await.map_err(unreadable)?;
        if n == 0 {
            break;
        }
        bytes += n as u64;
        writer.write(buf.split().freeze()).await.map_err(classify)?;
    }
    writer.close().await.map_err(classify)?;

    debug!(key, bytes, "object written");
    Ok(Uploaded {
        key: key.to_string(),
        bytes,
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::path::Path;

    use opendal::services::Memory;
    use opendal::{ErrorKind, Operator};
    use tempfile::NamedTempFile;

    use super::{UploadError, Uploaded, classify, upload};

    fn memory_op() -> Operator {
        Operator::new(Memory::default()).expect("operator").finish()
    }

    fn source_file(contents: &[u8]) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("temp file");
        file.write_all(contents).expect("write");
        file.flush().expect("flush");
        file
    }

    #[tokio::test]
    async fn must_store_identical_contents() {
        let op = memory_op();
        let contents = b"Start uploading\x00\xff\xfe binary tail".to_vec();
        let file = source_file(&contents);

        let Uploaded { key, bytes } = upload(&op, file.path(), "demo-object")
            .await
            .expect("upload");
        assert_eq!(key, "demo-object");
        assert_eq!(bytes, contents.len() as u64);

        let stored = op.read("demo-object").await.expect("read").to_vec();
        assert_eq!(stored, contents);
    }

    #[tokio::test]
    async fn must_overwrite_same_key() {
        let op = memory_op();
        let first = source_file(b"first revision");
        let second = source_file(b"second revision, longer than the first");

        upload(&op, first.path(), "obj").await.expect("upload");
        upload(&op, second.path(), "obj").await.expect("upload");

        let stored = op.read("obj").await.expect("read").to_vec();
        assert_eq!(stored, b"second revision, longer than the first");
    }

    #[tokio::test]
    async fn must_fail_on_missing_source() {
        let op = memory_op();
        let err = upload(&op, Path::new("no/such/file.txt"), "obj")
            .await
            .expect_err("should fail");
        assert!(matches!(err, UploadError::SourceNotFound { .. }));
        assert!(!op.exists("obj").await.expect("exists"));
    }

    #[tokio::test]
    async fn must_upload_empty_file() {
        let op = memory_op();
        let file = source_file(b"");

        let uploaded = upload(&op, file.path(), "empty").await.expect("upload");
        assert_eq!(uploaded.bytes, 0);
        assert!(op.exists("empty").await.expect("exists"));
    }

    #[test]
    fn must_classify_storage_errors() {
        let err = classify(opendal::Error::new(ErrorKind::NotFound, "no such bucket"));
        assert!(matches!(err, UploadError::BucketNotFound(_)));

        let err = classify(opendal::Error::new(
            ErrorKind::PermissionDenied,
            "signature mismatch",
        ));
        assert!(matches!(err, UploadError::Auth(_)));

        let err = classify(
            opendal::Error::new(ErrorKind::Unexpected, "connection refused").set_temporary(),
        );
        assert!(matches!(err, UploadError::Connectivity(_)));

        let err = classify(opendal::Error::new(ErrorKind::Unsupported, "nope"));
        assert!(matches!(err, UploadError::Storage(_)));
    }
}
