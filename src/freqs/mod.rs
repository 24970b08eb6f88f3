//! Per-population allele frequencies from genotype VCF files.

pub mod accumulate;
pub mod calculate;
pub mod custom_args;
pub mod input;
pub mod root;
pub mod summary;
