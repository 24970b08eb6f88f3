//! Metadata store backed by a directory of TSV dumps.
//!
//! The layout is `<root>/<database>/<table>.tsv`, one file per [`MetadataQuery`],
//! with the same two columns the SQL query would return.

use std::path::{Path, PathBuf};

use crate::err::Error;

use super::{DatabaseKind, MetadataQuery, MetadataStore};

/// Offline [`MetadataStore`] reading TSV dumps below `root`.
#[derive(Debug, Clone)]
pub struct TsvDirStore {
    root: PathBuf,
}

impl TsvDirStore {
    /// Store over the database directories in `root`.
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl MetadataStore for TsvDirStore {
    /// Same matching as `SHOW DATABASES LIKE '<species>_<kind>%<version>%'`.
    fn database_name(
        &self,
        species: &str,
        version: &str,
        kind: DatabaseKind,
    ) -> Result<Option<String>, Error> {
        let pattern = regex::Regex::new(&format!(
            "^{}_{}.*{}.*$",
            regex::escape(species),
            kind,
            regex::escape(version)
        ))
        .map_err(|e| Error::configuration(&self.root, e.to_string()))?;

        let mut names = std::fs::read_dir(&self.root)
            .map_err(|e| Error::configuration(&self.root, format!("cannot list: {}", e)))?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
            .filter(|name| pattern.is_match(name))
            .collect::<Vec<_>>();
        names.sort();

        Ok(super::mysql::first_database(&names.join("\n"), kind))
    }

    fn fetch(&self, database: &str, query: MetadataQuery) -> Result<String, Error> {
        let path = self
            .root
            .join(database)
            .join(format!("{}.tsv", query.table()));
        std::fs::read_to_string(&path).map_err(|e| Error::Tool {
            program: String::from("read"),
            msg: format!("{:?}: {}", path, e),
        })
    }
}
