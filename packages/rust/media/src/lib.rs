//! Featured-image sideloading.
//!
//! This crate provides:
//! - [`MediaFetcher`]: the seam tool handlers use to obtain media
//! - [`Sideloader`]: an HTTP implementation with SSRF and size guards

pub mod sideload;

pub use sideload::{MediaFetcher, Sideloader};
