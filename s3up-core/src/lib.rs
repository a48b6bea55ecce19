#![allow(
    clippy::module_name_repetitions,
    clippy::default_trait_access,
    clippy::future_not_send
)]

pub mod logging;
pub mod s3;
pub mod upload;
