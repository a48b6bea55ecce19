use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use eyre::{Result, eyre};
use url::Url;

use s3up_core::s3::S3Opts;

/// Upload a single file to an S3-compatible object store.
#[derive(Parser, Debug)]
pub struct Opts {
    /// Local file to upload.
    pub source: PathBuf,
    /// Object key to store the file under. Defaults to the source file name.
    #[clap(long)]
    pub key: Option<String>,
    /// S3 endpoint url.
    #[clap(long, env = "S3_ENDPOINT")]
    pub s3_url: Url,
    /// S3 storage region.
    #[clap(long, env = "S3_REGION", default_value = "us-east-1")]
    pub s3_region: String,
    /// S3 storage bucket. Must already exist on the endpoint.
    #[clap(long, env = "S3_BUCKET")]
    pub s3_bucket: String,
    /// Access key id for the endpoint.
    #[clap(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub access_key_id: String,
    /// Secret access key for the endpoint.
    #[clap(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secret_access_key: String,
    /// Abort the upload if it does not finish within this many seconds.
    #[clap(long, default_value_t = 60)]
    pub timeout: u64,
}

impl Opts {
    /// Destination object key, derived from the source file name unless given
    /// explicitly.
    ///
    /// # Errors
    /// Returns an error if no key is given and the source path has no file
    /// name to derive one from.
    pub fn object_key(&self) -> Result<String> {
        self.key.clone().map_or_else(
            || {
                self.source
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .ok_or_else(|| {
                        eyre!(
                            "cannot derive object key from `{}`, pass --key",
                            self.source.display()
                        )
                    })
            },
            Ok,
        )
    }
}

impl From<&Opts> for S3Opts {
    fn from(opts: &Opts) -> Self {
        Self {
            region: opts.s3_region.clone(),
            url: opts.s3_url.clone(),
            bucket: opts.s3_bucket.clone(),
            access_key_id: opts.access_key_id.clone(),
            secret_access_key: opts.secret_access_key.clone(),
            timeout: Duration::from_secs(opts.timeout),
        }
    }
}
