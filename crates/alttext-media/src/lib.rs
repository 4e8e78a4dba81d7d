#![forbid(unsafe_code)]
#![deny(unused_must_use)]
#![warn(missing_docs, unreachable_pub, clippy::all, clippy::pedantic)]

//! Image normalization and the file-backed asset catalog.

pub mod catalog;
pub mod error;
pub mod normalize;

pub use catalog::FsAssetStore;
pub use error::{MediaError, MediaResult};
pub use normalize::{JPEG_QUALITY, JpegNormalizer, MAX_DIMENSION};
