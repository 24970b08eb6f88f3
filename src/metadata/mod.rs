//! Population membership lookups against the variation metadata store.
//!
//! The store is only queried through the closed set of [`MetadataQuery`] values,
//! each yielding a two-column tab-separated result.

use std::collections::{BTreeMap, HashMap};

use serde::de::DeserializeOwned;

use crate::err::Error;

pub mod mysql;
pub mod tsv;

/// The queries that are run against a variation database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetadataQuery {
    /// Pairs of `(population_id, name)`.
    Populations,
    /// Pairs of `(super_population_id, sub_population_id)`.
    PopulationStructure,
    /// Pairs of `(sample_id, name)`.
    Samples,
    /// Pairs of `(sample_id, population_id)`.
    SamplePopulations,
}

impl MetadataQuery {
    /// Name of the table that is queried.
    pub fn table(&self) -> &'static str {
        match self {
            MetadataQuery::Populations => "population",
            MetadataQuery::PopulationStructure => "population_structure",
            MetadataQuery::Samples => "sample",
            MetadataQuery::SamplePopulations => "sample_population",
        }
    }

    /// SQL text of the query.
    pub fn sql(&self) -> &'static str {
        match self {
            MetadataQuery::Populations => "SELECT population_id, name FROM population;",
            MetadataQuery::PopulationStructure => {
                "SELECT super_population_id, sub_population_id FROM population_structure;"
            }
            MetadataQuery::Samples => "SELECT sample_id, name FROM sample;",
            MetadataQuery::SamplePopulations => {
                "SELECT sample_id, population_id FROM sample_population;"
            }
        }
    }
}

/// Kind of an Ensembl database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum DatabaseKind {
    Core,
    Variation,
}

/// Read-only access to the metadata store.
pub trait MetadataStore {
    /// Name of the database of `kind` for `species` in release `version`, if any.
    fn database_name(
        &self,
        species: &str,
        version: &str,
        kind: DatabaseKind,
    ) -> Result<Option<String>, Error>;

    /// Run `query` against `database` and return the raw tab-separated rows.
    fn fetch(&self, database: &str, query: MetadataQuery) -> Result<String, Error>;
}

/// Parse tab-separated two-column rows, `None` if any row is malformed.
pub fn parse_pairs<A, B>(tsv: &str) -> Option<Vec<(A, B)>>
where
    A: DeserializeOwned,
    B: DeserializeOwned,
{
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .from_reader(tsv.as_bytes());
    rdr.deserialize::<(A, B)>()
        .collect::<Result<Vec<_>, _>>()
        .ok()
}

/// Run `query` and parse the result, any failure yields an empty result.
fn fetch_pairs<A, B>(store: &dyn MetadataStore, database: &str, query: MetadataQuery) -> Vec<(A, B)>
where
    A: DeserializeOwned,
    B: DeserializeOwned,
{
    match store.fetch(database, query) {
        Ok(tsv) => parse_pairs(&tsv).unwrap_or_else(|| {
            tracing::warn!(
                "unexpected result from {} in {}, treating as empty",
                query.table(),
                database
            );
            Vec::new()
        }),
        Err(e) => {
            tracing::warn!(
                "could not query {} in {}, treating as empty: {}",
                query.table(),
                database,
                e
            );
            Vec::new()
        }
    }
}

/// Populations, sample memberships, and population hierarchy of one species.
///
/// Loaded once per species and only queried afterwards.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PopulationData {
    /// Population name by population id.
    pub populations_by_id: BTreeMap<u32, String>,
    /// Population names by sample name.
    pub sample_populations: HashMap<String, Vec<String>>,
    /// Super-population id by sub-population id.
    pub super_populations: HashMap<u32, u32>,
}

impl PopulationData {
    /// Query all mappings for `database` from `store`.
    pub fn load(store: &dyn MetadataStore, database: &str) -> Self {
        let populations: Vec<(u32, String)> =
            fetch_pairs(store, database, MetadataQuery::Populations);
        let structure: Vec<(u32, u32)> =
            fetch_pairs(store, database, MetadataQuery::PopulationStructure);
        let samples: Vec<(u32, String)> = fetch_pairs(store, database, MetadataQuery::Samples);
        let sample_populations: Vec<(u32, u32)> =
            fetch_pairs(store, database, MetadataQuery::SamplePopulations);

        Self::from_rows(&populations, &structure, &samples, &sample_populations)
    }

    /// Build from the raw query rows.
    pub fn from_rows(
        populations: &[(u32, String)],
        structure: &[(u32, u32)],
        samples: &[(u32, String)],
        sample_populations: &[(u32, u32)],
    ) -> Self {
        let populations_by_id = populations
            .iter()
            .cloned()
            .collect::<BTreeMap<u32, String>>();

        let mut population_ids_by_sample: HashMap<u32, Vec<u32>> = HashMap::new();
        for (sample_id, population_id) in sample_populations {
            population_ids_by_sample
                .entry(*sample_id)
                .or_default()
                .push(*population_id);
        }

        let mut by_sample_name: HashMap<String, Vec<String>> = HashMap::new();
        for (sample_id, sample) in samples {
            let entry = by_sample_name.entry(sample.clone()).or_default();
            for population_id in population_ids_by_sample
                .get(sample_id)
                .map(|ids| ids.as_slice())
                .unwrap_or_default()
            {
                if let Some(population) = populations_by_id.get(population_id) {
                    if !entry.contains(population) {
                        entry.push(population.clone());
                    }
                } else {
                    tracing::debug!(
                        "sample {} refers to unknown population id {}",
                        sample,
                        population_id
                    );
                }
            }
        }

        let super_populations = structure
            .iter()
            .map(|(super_id, sub_id)| (*sub_id, *super_id))
            .collect();

        Self {
            populations_by_id,
            sample_populations: by_sample_name,
            super_populations,
        }
    }

    /// Whether the species has no populations at all.
    pub fn is_empty(&self) -> bool {
        self.populations_by_id.is_empty()
    }

    /// Population names of the given sample, empty if unknown.
    pub fn populations_of(&self, sample: &str) -> &[String] {
        self.sample_populations
            .get(sample)
            .map(|pops| pops.as_slice())
            .unwrap_or_default()
    }

    /// Population id by population name; names are unique within a database.
    pub fn population_ids_by_name(&self) -> HashMap<&str, u32> {
        self.populations_by_id
            .iter()
            .map(|(id, name)| (name.as_str(), *id))
            .collect()
    }
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;

    use super::*;

    /// Store answering from fixed strings.
    struct StaticStore(HashMap<MetadataQuery, Result<String, ()>>);

    impl MetadataStore for StaticStore {
        fn database_name(
            &self,
            species: &str,
            version: &str,
            kind: DatabaseKind,
        ) -> Result<Option<String>, Error> {
            Ok(Some(format!("{}_{}_{}_1", species, kind, version)))
        }

        fn fetch(&self, _database: &str, query: MetadataQuery) -> Result<String, Error> {
            match self.0.get(&query) {
                Some(Ok(tsv)) => Ok(tsv.clone()),
                _ => Err(Error::Tool {
                    program: String::from("mysql"),
                    msg: String::from("connection refused"),
                }),
            }
        }
    }

    #[test]
    fn parse_pairs() {
        let rows: Vec<(u32, String)> = super::parse_pairs("1\tALL\n2\tEast,Asian\n").unwrap();
        assert_eq!(
            rows,
            vec![(1, String::from("ALL")), (2, String::from("East,Asian"))]
        );

        assert!(super::parse_pairs::<u32, String>("").unwrap().is_empty());
        assert!(super::parse_pairs::<u32, String>("1\tALL\nfoo\n").is_none());
        assert!(super::parse_pairs::<u32, u32>("x\t1\n").is_none());
    }

    #[test]
    fn query_table_and_sql() {
        assert_eq!(MetadataQuery::PopulationStructure.table(), "population_structure");
        assert!(MetadataQuery::Samples.sql().contains("FROM sample;"));
        assert_eq!(DatabaseKind::Variation.to_string(), "variation");
    }

    #[test]
    fn load() {
        let store = StaticStore(HashMap::from([
            (
                MetadataQuery::Populations,
                Ok(String::from("1\tALL\n2\tPopA\n3\tPopB\n")),
            ),
            (MetadataQuery::PopulationStructure, Ok(String::from("1\t2\n1\t3\n"))),
            (MetadataQuery::Samples, Ok(String::from("10\tS1\n11\tS2\n12\tS3\n"))),
            (
                MetadataQuery::SamplePopulations,
                Ok(String::from("10\t1\n10\t2\n11\t2\n12\t3\n12\t99\n")),
            ),
        ]));

        let data = PopulationData::load(&store, "ovis_aries_variation_114_4");

        assert_eq!(data.populations_by_id.len(), 3);
        assert_eq!(data.populations_of("S1"), &["ALL", "PopA"]);
        assert_eq!(data.populations_of("S2"), &["PopA"]);
        assert_eq!(data.populations_of("S3"), &["PopB"]);
        assert!(data.populations_of("S4").is_empty());
        assert_eq!(data.super_populations.get(&2), Some(&1));
        assert_eq!(data.super_populations.get(&1), None);
        assert_eq!(data.population_ids_by_name().get("PopB"), Some(&3));
    }

    #[test]
    fn load_tolerates_failures() {
        let store = StaticStore(HashMap::from([
            (MetadataQuery::Populations, Ok(String::from("1\tALL\n"))),
            (MetadataQuery::Samples, Ok(String::from("malformed\n"))),
        ]));

        let data = PopulationData::load(&store, "db");

        assert!(!data.is_empty());
        assert!(data.sample_populations.is_empty());
        assert!(data.super_populations.is_empty());
    }

    #[test]
    fn load_empty() {
        let store = StaticStore(HashMap::new());
        let data = PopulationData::load(&store, "db");
        assert!(data.is_empty());
        assert_eq!(data, PopulationData::default());
    }
}
