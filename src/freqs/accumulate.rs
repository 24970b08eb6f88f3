//! Per-population AC/AN/AF computation from sample genotypes.

use std::collections::{BTreeSet, HashMap};

use noodles::vcf::header::record::value::map::{format, info, Format, Info, Map};
use noodles::vcf::variant::record_buf::info::field::{value::Array, Value};
use noodles::vcf::variant::RecordBuf;

use crate::common::noodles::{alt_allele_count, VcfRecord, GENOTYPE};
use crate::metadata::PopulationData;

use super::root::info_key;
use super::summary::{FieldNames, IncludeField};

/// A population that gets frequency fields in the output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PopulationFields {
    /// Display name from the metadata store.
    pub name: String,
    /// Field-safe prefix of the INFO keys.
    pub key: String,
}

impl PopulationFields {
    /// Fields for the population `name`, keyed by [`info_key`].
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key: info_key(name),
        }
    }

    /// INFO key of the alternate allele counts.
    pub fn ac(&self) -> String {
        format!("{}_AC", self.key)
    }

    /// INFO key of the called allele count.
    pub fn an(&self) -> String {
        format!("{}_AN", self.key)
    }

    /// INFO key of the allele frequencies.
    pub fn af(&self) -> String {
        format!("{}_AF", self.key)
    }
}

/// VCF integers are signed 32 bit, counts beyond that are clamped.
fn saturating_i32(count: u32) -> i32 {
    i32::try_from(count).unwrap_or(i32::MAX)
}

/// Allele counts of one population at one variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrequencyRecord {
    /// Count per alternate allele.
    pub ac: Vec<u32>,
    /// Number of called allele copies.
    pub an: u32,
}

impl FrequencyRecord {
    /// Zero counts for `n_alt` alternate alleles.
    pub fn new(n_alt: usize) -> Self {
        Self {
            ac: vec![0; n_alt],
            an: 0,
        }
    }

    /// Allele frequencies, `None` if there are no called alleles.
    pub fn af(&self) -> Option<Vec<f64>> {
        if self.an == 0 {
            None
        } else {
            Some(
                self.ac
                    .iter()
                    .map(|ac| f64::from(*ac) / f64::from(self.an))
                    .collect(),
            )
        }
    }

    /// The INFO values for `<key>_AC`, `<key>_AN`, and `<key>_AF`.
    ///
    /// AC and AF are all-missing if AN is zero and absent for records without ALT.
    pub fn info_values(&self) -> (Option<Value>, Value, Option<Value>) {
        let an = Value::Integer(saturating_i32(self.an));
        if self.ac.is_empty() {
            return (None, an, None);
        }
        let (ac, af) = match self.af() {
            None => (
                Array::Integer(vec![None; self.ac.len()]),
                Array::String(vec![None; self.ac.len()]),
            ),
            Some(af) => (
                Array::Integer(self.ac.iter().map(|ac| Some(saturating_i32(*ac))).collect()),
                Array::String(af.iter().map(|af| Some(af.to_string())).collect()),
            ),
        };
        (Some(Value::Array(ac)), an, Some(Value::Array(af)))
    }
}

/// Maps VCF samples to the populations they count towards.
#[derive(Debug, Clone, Default)]
pub struct FrequencyAccumulator {
    /// Output populations, sorted by name.
    populations: Vec<PopulationFields>,
    /// Indices into `populations` by VCF sample index.
    sample_populations: Vec<Vec<usize>>,
}

impl FrequencyAccumulator {
    /// Build for the VCF `sample_names`, already carrying any configured prefix.
    ///
    /// Populations whose INFO key collides with an earlier one are dropped.
    pub fn new<S: AsRef<str>>(sample_names: &[S], data: &PopulationData) -> Self {
        let observed = sample_names
            .iter()
            .flat_map(|sample| data.populations_of(sample.as_ref()))
            .cloned()
            .collect::<BTreeSet<String>>();

        let mut populations: Vec<PopulationFields> = Vec::new();
        let mut idx_by_name: HashMap<String, usize> = HashMap::new();
        let mut keys: HashMap<String, String> = HashMap::new();
        for name in &observed {
            let fields = PopulationFields::new(name);
            if let Some(other) = keys.get(&fields.key) {
                tracing::warn!(
                    "populations {:?} and {:?} both map to INFO key prefix {}, skipping {:?}",
                    other,
                    name,
                    &fields.key,
                    name
                );
                continue;
            }
            keys.insert(fields.key.clone(), name.clone());
            idx_by_name.insert(name.clone(), populations.len());
            populations.push(fields);
        }

        let sample_populations = sample_names
            .iter()
            .map(|sample| {
                data.populations_of(sample.as_ref())
                    .iter()
                    .filter_map(|name| idx_by_name.get(name).copied())
                    .collect()
            })
            .collect();

        Self {
            populations,
            sample_populations,
        }
    }

    /// The output populations.
    pub fn populations(&self) -> &[PopulationFields] {
        &self.populations
    }

    /// Display names of the output populations.
    pub fn population_names(&self) -> BTreeSet<String> {
        self.populations.iter().map(|p| p.name.clone()).collect()
    }

    /// Summary field triples, one per output population.
    pub fn include_fields(&self) -> Vec<IncludeField> {
        self.populations
            .iter()
            .map(|p| IncludeField {
                name: p.name.clone(),
                fields: FieldNames {
                    af: p.af(),
                    ac: p.ac(),
                    an: p.an(),
                },
            })
            .collect()
    }

    /// Declare the standard and per-population fields in `header`.
    pub fn extend_header(&self, header: &mut noodles::vcf::Header) {
        if !header.formats().contains_key(GENOTYPE) {
            header.formats_mut().insert(
                GENOTYPE.to_string(),
                Map::<Format>::new(format::Number::Count(1), format::Type::String, "Genotype"),
            );
        }
        let standard = [
            (
                "AC",
                info::Number::AlternateBases,
                info::Type::Integer,
                "Total number of alternate alleles in called genotypes",
            ),
            (
                "AN",
                info::Number::Count(1),
                info::Type::Integer,
                "Total number of alleles in called genotypes",
            ),
            (
                "AF",
                info::Number::AlternateBases,
                info::Type::Float,
                "Estimated Allele Frequencies",
            ),
        ];
        for (key, number, ty, description) in standard {
            if !header.infos().contains_key(key) {
                header
                    .infos_mut()
                    .insert(key.to_string(), Map::<Info>::new(number, ty, description));
            }
        }

        for population in &self.populations {
            let name = &population.name;
            header.infos_mut().insert(
                population.ac(),
                Map::<Info>::new(
                    info::Number::AlternateBases,
                    info::Type::Integer,
                    format!("Total number of alternate alleles in {} population", name),
                ),
            );
            header.infos_mut().insert(
                population.an(),
                Map::<Info>::new(
                    info::Number::Count(1),
                    info::Type::Integer,
                    format!("Total number of alleles in {} population", name),
                ),
            );
            header.infos_mut().insert(
                population.af(),
                Map::<Info>::new(
                    info::Number::AlternateBases,
                    info::Type::Float,
                    format!("Estimated Allele Frequencies in {} population", name),
                ),
            );
        }
    }

    /// Count alleles for a variant with `n_alt` alternate alleles.
    ///
    /// `calls` yields the allele indices of each sample in VCF order.  Missing
    /// alleles are skipped, indices beyond `n_alt` only count towards AN.
    pub fn count<I>(&self, n_alt: usize, calls: I) -> Vec<FrequencyRecord>
    where
        I: IntoIterator<Item = Vec<Option<usize>>>,
    {
        let mut result = vec![FrequencyRecord::new(n_alt); self.populations.len()];
        for (populations, alleles) in self.sample_populations.iter().zip(calls) {
            if populations.is_empty() {
                continue;
            }
            for allele in alleles.into_iter().flatten() {
                for idx in populations {
                    let freqs = &mut result[*idx];
                    freqs.an += 1;
                    if allele > 0 {
                        if let Some(ac) = freqs.ac.get_mut(allele - 1) {
                            *ac += 1;
                        }
                    }
                }
            }
        }
        result
    }

    /// Compute and set the per-population INFO fields of `record`.
    pub fn annotate(&self, record: &mut RecordBuf) {
        let n_alt = alt_allele_count(record);
        let n_samples = self.sample_populations.len();
        let freqs = self.count(
            n_alt,
            (0..n_samples).map(|sample_idx| record.genotype_alleles(sample_idx)),
        );

        let info = record.info_mut();
        for (population, freq) in self.populations.iter().zip(freqs) {
            let (ac, an, af) = freq.info_values();
            if let Some(ac) = ac {
                info.insert(population.ac(), Some(ac));
            }
            info.insert(population.an(), Some(an));
            if let Some(af) = af {
                info.insert(population.af(), Some(af));
            }
        }
    }
}
