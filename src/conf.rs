//! Run configuration: database server INI and genotype collection configs.

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::err::Error;

/// Name of the collection config file that takes precedence within a directory.
pub const VCF_CONFIG_FILE: &str = "vcf_config.json";

/// Connection parameters of a database server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: String,
    pub user: String,
    pub password: Option<String>,
}

impl ServerConfig {
    /// Read the server in `section` of the INI file at `path`.
    ///
    /// A missing file, section or one of `host`, `port`, `user` is a configuration error.
    pub fn from_ini<P: AsRef<Path>>(path: P, section: &str) -> Result<Self, Error> {
        let path = path.as_ref();
        let ini = ini::Ini::load_from_file(path)
            .map_err(|e| Error::configuration(path, format!("cannot read ini file: {}", e)))?;
        let properties = ini.section(Some(section)).ok_or_else(|| {
            Error::configuration(path, format!("could not find {} config in ini file", section))
        })?;
        let get = |key: &str| {
            properties.get(key).map(str::to_string).ok_or_else(|| {
                Error::configuration(path, format!("missing key {:?} in section [{}]", key, section))
            })
        };

        Ok(Self {
            host: get("host")?,
            port: get("port")?,
            user: get("user")?,
            password: properties.get("password").map(str::to_string),
        })
    }
}

/// Description of one genotype source file.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionConfig {
    /// Species production name, e.g., `ovis_aries`.
    pub species: String,
    /// Local path, path below the data root, or remote URL of the VCF.
    pub filename_template: String,
    /// Prefix to prepend to VCF sample names before membership lookup.
    pub sample_prefix: Option<String>,
    /// Source / project name, used in the output path.
    pub source_name: Option<String>,
    /// Assembly label, used in the output path.
    pub assembly: Option<String>,
}

impl CollectionConfig {
    /// Project path component, defaults to `frequency_projects`.
    pub fn project(&self) -> &str {
        self.source_name
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("frequency_projects")
    }

    /// Assembly path component, defaults to `ASSEMBLY_DEFAULT`.
    pub fn assembly(&self) -> &str {
        self.assembly
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or("ASSEMBLY_DEFAULT")
    }

    /// Check the required fields are set.
    pub fn validate(&self) -> Result<(), String> {
        if self.species.trim().is_empty() {
            return Err(String::from("collection without species"));
        }
        if self.filename_template.trim().is_empty() {
            return Err(format!(
                "collection of species {} without filename_template",
                &self.species
            ));
        }
        Ok(())
    }
}

/// Top level of a collection config JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CollectionFile {
    pub collections: Vec<CollectionConfig>,
}

impl CollectionFile {
    /// Load and validate a collection config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = crate::common::io::open_read_maybe_gz(path)
            .map_err(|e| Error::configuration(path, e.to_string()))?;
        let result: Self = serde_json::from_reader(reader)
            .map_err(|e| Error::configuration(path, format!("invalid collection config: {}", e)))?;
        for collection in &result.collections {
            collection
                .validate()
                .map_err(|msg| Error::configuration(path, msg))?;
        }
        Ok(result)
    }
}

/// The config files to read from `dir`.
///
/// If `vcf_config.json` exists, only that file is used, otherwise all regular files.
pub fn collection_files<P: AsRef<Path>>(dir: P) -> Result<Vec<PathBuf>, Error> {
    let dir = dir.as_ref();
    let preferred = dir.join(VCF_CONFIG_FILE);
    if preferred.is_file() {
        return Ok(vec![preferred]);
    }

    let mut result = std::fs::read_dir(dir)
        .map_err(|e| Error::configuration(dir, format!("cannot list directory: {}", e)))?
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .collect::<Vec<_>>();
    result.sort();
    Ok(result)
}

/// Load all collections from `dir`, grouped by species in order of appearance.
pub fn load_collections<P: AsRef<Path>>(
    dir: P,
) -> Result<IndexMap<String, Vec<CollectionConfig>>, Error> {
    let mut result: IndexMap<String, Vec<CollectionConfig>> = IndexMap::new();
    for path in collection_files(dir)? {
        tracing::debug!("reading collection config {:?}", &path);
        for collection in CollectionFile::from_path(&path)?.collections {
            result
                .entry(collection.species.clone())
                .or_default()
                .push(collection);
        }
    }
    Ok(result)
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn server_from_ini() -> Result<(), anyhow::Error> {
        let server = ServerConfig::from_ini("tests/data/conf/DEFAULT.ini", "variation")?;
        assert_eq!(
            server,
            ServerConfig {
                host: String::from("mysql-ens-var-prod-1"),
                port: String::from("4449"),
                user: String::from("ensro"),
                password: None,
            }
        );

        Ok(())
    }

    #[rstest::rstest]
    #[case("tests/data/conf/DEFAULT.ini", "core")]
    #[case("tests/data/conf/incomplete.ini", "variation")]
    #[case("tests/data/conf/does-not-exist.ini", "variation")]
    fn server_from_ini_fails(#[case] path: &str, #[case] section: &str) {
        let err = ServerConfig::from_ini(path, section).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn collection_defaults() {
        let collection = CollectionConfig {
            species: String::from("ovis_aries"),
            filename_template: String::from("/ovis_aries/genotypes.vcf.gz"),
            sample_prefix: None,
            source_name: Some(String::new()),
            assembly: None,
        };
        assert_eq!(collection.project(), "frequency_projects");
        assert_eq!(collection.assembly(), "ASSEMBLY_DEFAULT");
    }

    #[test]
    fn load_collections_prefers_vcf_config() -> Result<(), anyhow::Error> {
        let collections = load_collections("tests/data/conf/collections")?;
        assert_eq!(
            collections.keys().collect::<Vec<_>>(),
            vec!["ovis_aries", "triticum_aestivum"]
        );
        assert_eq!(collections["ovis_aries"].len(), 2);
        assert_eq!(
            collections["ovis_aries"][1].sample_prefix.as_deref(),
            Some("NextGen_")
        );

        Ok(())
    }

    #[test]
    fn load_collections_all_files() -> Result<(), anyhow::Error> {
        let collections = load_collections("tests/data/conf/collections_split")?;
        assert_eq!(
            collections.keys().collect::<Vec<_>>(),
            vec!["bos_taurus", "sus_scrofa"]
        );

        Ok(())
    }

    #[test]
    fn load_collections_invalid() {
        let err = load_collections("tests/data/conf/collections_invalid").unwrap_err();
        assert!(err.is_fatal());
    }
}
