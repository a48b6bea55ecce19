use std::fmt;
use std::time::Duration;

use eyre::Result;
use opendal::Operator;
use opendal::layers::{TimeoutLayer, TracingLayer};
use opendal::services::S3;
use url::Url;

/// S3 connection options.
///
/// Credentials are supplied by the caller (command line or environment) and
/// are never read from anywhere else.
#[derive(Clone)]
pub struct S3Opts {
    pub region: String,
    pub url: Url,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Upper bound on the whole transfer.
    pub timeout: Duration,
}

impl fmt::Debug for S3Opts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("S3Opts")
            .field("region", &self.region)
            .field("url", &self.url.as_str())
            .field("bucket", &self.bucket)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Build S3 operator.
///
/// Operations through the operator are bounded by `opts.timeout`. There's no
/// retry layer: a failed transfer surfaces immediately.
///
/// # Errors
/// Returns error if failed to build operator.
pub fn build_operator(opts: &S3Opts) -> Result<Operator> {
    let builder = S3::default()
        .endpoint(opts.url.as_str())
        .region(&opts.region)
        .bucket(&opts.bucket)
        .access_key_id(&opts.access_key_id)
        .secret_access_key(&opts.secret_access_key);
    Ok(Operator::new(builder)?
        .layer(TimeoutLayer::new().with_timeout(opts.timeout))
        .layer(TracingLayer)
        .finish())
}
