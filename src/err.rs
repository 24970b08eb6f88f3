//! Error taxonomy of the frequency pipeline.
//!
//! Only [`Error::Configuration`] is fatal.  Everything else is caught at the
//! species or collection level, logged, and processing continues.

use std::path::PathBuf;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// Required INI section/key or collection config is missing or malformed.
    #[error("configuration error in {path}: {msg}")]
    Configuration { path: String, msg: String },
    /// No readable genotype VCF could be formed for a collection.
    #[error("no valid input file can be formed for {species}: {msg}")]
    Resolution { species: String, msg: String },
    /// The species has no population rows in the metadata store.
    #[error("could not find any population information for {0}")]
    NoPopulationData(String),
    /// None of the samples of a genotype VCF belongs to a known population.
    #[error("no samples in {path:?} have population configured in database for {species}")]
    NoSamplePopulations { species: String, path: PathBuf },
    /// The observed populations do not have exactly one root.
    #[error("cannot determine root population name ({candidates} candidates)")]
    AmbiguousRootPopulation { candidates: usize },
    /// Writing the annotated VCF failed mid-stream.
    #[error("problem writing {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// Compression or indexing of a finished output failed.
    #[error("failed to {step} {path:?}: {msg}")]
    PostProcessing {
        step: &'static str,
        path: PathBuf,
        msg: String,
    },
    /// An external tool could not be run or exited with non-zero status.
    #[error("running {program} failed: {msg}")]
    Tool { program: String, msg: String },
}

impl Error {
    /// Shortcut for building a configuration error.
    pub fn configuration<P: AsRef<std::path::Path>, M: Into<String>>(path: P, msg: M) -> Self {
        Error::Configuration {
            path: path.as_ref().display().to_string(),
            msg: msg.into(),
        }
    }

    /// Whether the error must terminate the whole run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }
}
