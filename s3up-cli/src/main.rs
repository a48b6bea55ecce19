#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::future_not_send
)]

use clap::Parser;
use eyre::Result;
use mimalloc::MiMalloc;
use tracing::info;

use s3up_core::logging::{init_color_eyre, init_logger};
use s3up_core::s3::{S3Opts, build_operator};
use s3up_core::upload::upload;

use crate::opts::Opts;

mod opts;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    drop(dotenvy::dotenv());
    init_color_eyre()?;
    init_logger();

    let opts = Opts::parse();
    let s3_opts = S3Opts::from(&opts);
    let key = opts.object_key()?;

    let s3 = build_operator(&s3_opts)?;

    info!(
        source = %opts.source.display(),
        bucket = %s3_opts.bucket,
        key = %key,
        "uploading"
    );
    let uploaded = upload(&s3, &opts.source, &key).await?;
    info!(bytes = uploaded.bytes, "done, file is uploaded");

    Ok(())
}
