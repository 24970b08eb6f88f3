//! Popfreqs library main entry point.

pub mod common;
pub mod conf;
pub mod err;
pub mod freqs;
pub mod metadata;
