//! The population data summary consumed by the VEP config generation.

use std::path::Path;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::err::Error;

/// Names of the INFO fields of one population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldNames {
    pub af: String,
    pub ac: String,
    pub an: String,
}

impl FieldNames {
    /// Field names in `af`, `ac`, `an` order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        [self.af.as_str(), self.ac.as_str(), self.an.as_str()].into_iter()
    }
}

/// One population of an output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeField {
    /// Display name of the population.
    pub name: String,
    pub fields: FieldNames,
}

/// One annotated output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    pub file_location: String,
    pub short_name: String,
    pub include_fields: Vec<IncludeField>,
}

/// One processed collection, named after its escaped root population.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopulationEntry {
    pub name: String,
    pub files: Vec<FileEntry>,
}

/// Entries by species, in order of processing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PopulationDataSummary(pub IndexMap<String, Vec<PopulationEntry>>);

impl PopulationDataSummary {
    /// Register `species`, keeping it in the output even without entries.
    pub fn add_species(&mut self, species: &str) {
        self.0.entry(species.to_string()).or_default();
    }

    /// Append `entry` to the list of `species`.
    pub fn push(&mut self, species: &str, entry: PopulationEntry) {
        self.0.entry(species.to_string()).or_default().push(entry);
    }

    /// Species keys with their entries, in insertion order.
    pub fn species(&self) -> impl Iterator<Item = (&String, &Vec<PopulationEntry>)> {
        self.0.iter()
    }

    /// Check that all names, locations, and field names are non-empty.
    pub fn validate(&self) -> Result<(), String> {
        for (species, entries) in &self.0 {
            if species.is_empty() {
                return Err(String::from("empty species name"));
            }
            for entry in entries {
                if entry.name.is_empty() {
                    return Err(format!("entry without name for {}", species));
                }
                for file in &entry.files {
                    if file.file_location.is_empty() || file.short_name.is_empty() {
                        return Err(format!(
                            "file without location or short name in {} of {}",
                            &entry.name, species
                        ));
                    }
                    for field in &file.include_fields {
                        if field.name.is_empty() || field.fields.iter().any(str::is_empty) {
                            return Err(format!(
                                "incomplete include_fields in {} of {}",
                                &file.file_location, species
                            ));
                        }
                    }
                }
            }
        }
        Ok(())
    }

    /// Serialize as JSON with four spaces of indentation.
    pub fn to_writer<W: std::io::Write>(&self, writer: W) -> Result<(), serde_json::Error> {
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(writer, formatter);
        self.serialize(&mut serializer)
    }

    /// Validate and write to `path`.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        self.validate()
            .map_err(|msg| Error::configuration(path, msg))?;
        let write_err = |source: std::io::Error| Error::Write {
            path: path.to_path_buf(),
            source,
        };
        let mut writer = crate::common::io::create_with_parents(path).map_err(write_err)?;
        self.to_writer(&mut writer)
            .map_err(|e| write_err(std::io::Error::other(e)))?;
        crate::common::io::finalize_buf_writer(writer).map_err(write_err)
    }

    /// Read and validate from `path`.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let reader = crate::common::io::open_read_maybe_gz(path)
            .map_err(|e| Error::configuration(path, e.to_string()))?;
        let result: Self = serde_json::from_reader(reader)
            .map_err(|e| Error::configuration(path, format!("invalid population data: {}", e)))?;
        result
            .validate()
            .map_err(|msg| Error::configuration(path, msg))?;
        Ok(result)
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn example() -> PopulationDataSummary {
        let mut result = PopulationDataSummary::default();
        result.add_species("ovis_aries");
        result.push(
            "ovis_aries",
            PopulationEntry {
                name: String::from("ALL"),
                files: vec![FileEntry {
                    file_location: String::from(
                        "/custom_data/frequency_projects/ovis_aries/ASSEMBLY_DEFAULT/genotypes_freq.vcf.gz",
                    ),
                    short_name: String::from("ALL"),
                    include_fields: vec![
                        IncludeField {
                            name: String::from("ALL"),
                            fields: FieldNames {
                                af: String::from("ALL_AF"),
                                ac: String::from("ALL_AC"),
                                an: String::from("ALL_AN"),
                            },
                        },
                        IncludeField {
                            name: String::from("East,Asian"),
                            fields: FieldNames {
                                af: String::from("East_2CAsian_AF"),
                                ac: String::from("East_2CAsian_AC"),
                                an: String::from("East_2CAsian_AN"),
                            },
                        },
                    ],
                }],
            },
        );
        result.add_species("bos_taurus");
        result
    }

    #[test]
    fn to_writer() -> Result<(), anyhow::Error> {
        let mut buf = Vec::new();
        example().to_writer(&mut buf)?;
        insta::assert_snapshot!(String::from_utf8(buf)?);

        Ok(())
    }

    #[test]
    fn save_and_load() -> Result<(), anyhow::Error> {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("out").join("population_data_vertebrates.json");

        example().save(&path)?;
        let loaded = PopulationDataSummary::load(&path)?;

        assert_eq!(loaded, example());
        assert_eq!(
            loaded.species().map(|(species, _)| species.as_str()).collect::<Vec<_>>(),
            vec!["ovis_aries", "bos_taurus"]
        );

        Ok(())
    }

    #[test]
    fn validate() {
        assert!(example().validate().is_ok());

        let mut summary = example();
        summary.push(
            "bos_taurus",
            PopulationEntry {
                name: String::new(),
                files: vec![],
            },
        );
        assert!(summary.validate().is_err());

        let mut summary = example();
        summary.0["ovis_aries"][0].files[0].include_fields[0].fields.an = String::new();
        assert!(summary.validate().is_err());
    }

    #[test]
    fn load_invalid() {
        let tmp_dir = temp_testdir::TempDir::default();
        let path = tmp_dir.join("population_data.json");
        std::fs::write(&path, r#"{"ovis_aries": [{"name": "ALL"}]}"#).unwrap();

        let err = PopulationDataSummary::load(&path).unwrap_err();
        assert!(err.is_fatal());
    }
}
