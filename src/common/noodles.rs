//! Helper code for using noodles.

use std::fs::File;
use std::io::{BufRead, BufWriter};
use std::path::Path;

use noodles::vcf;
use noodles::vcf::variant::record_buf::samples::sample::Value;
use noodles::vcf::variant::RecordBuf;

/// Key of the genotype FORMAT field.
pub const GENOTYPE: &str = "GT";

/// Alias for the vcf reader type that we will use.
pub type VcfReader = vcf::io::Reader<Box<dyn BufRead>>;

/// Alias for the vcf writer that we use.
pub type VcfWriter = vcf::io::Writer<BufWriter<File>>;

/// Helper function that opens one VCF reader at the given path.
///
/// Compressed input is detected from the file extension.
pub fn open_vcf_reader(path: impl AsRef<Path>) -> Result<VcfReader, anyhow::Error> {
    vcf::io::reader::Builder::default()
        .build_from_path(path.as_ref())
        .map_err(|e| anyhow::anyhow!("could not build VCF reader for {:?}: {}", path.as_ref(), e))
}

/// Helper function that opens one plain-text VCF writer at the given path.
pub fn open_vcf_writer(path: impl AsRef<Path>) -> std::io::Result<VcfWriter> {
    crate::common::io::create_with_parents(path).map(vcf::io::Writer::new)
}

/// Access to per-sample FORMAT values by sample index.
pub trait VcfRecord {
    fn get_format_value_by_sample_index(
        &self,
        key: &str,
        sample_idx: usize,
    ) -> Option<Option<&Value>>;

    /// The allele indices called for the sample, `None` for missing alleles.
    ///
    /// Returns an empty list if the sample has no `GT` value at all.
    fn genotype_alleles(&self, sample_idx: usize) -> Vec<Option<usize>> {
        match self.get_format_value_by_sample_index(GENOTYPE, sample_idx) {
            Some(Some(Value::Genotype(gt))) => gt
                .as_ref()
                .iter()
                .map(|allele| allele.position())
                .collect(),
            Some(Some(Value::String(gt))) => parse_genotype(gt),
            _ => Vec::new(),
        }
    }
}

impl VcfRecord for RecordBuf {
    fn get_format_value_by_sample_index(
        &self,
        key: &str,
        sample_idx: usize,
    ) -> Option<Option<&Value>> {
        self.samples()
            .get_index(sample_idx)
            .and_then(|v| v.get(key))
    }
}

/// Parse a textual genotype such as `0/1`, `1|1` or `./.` into allele indices.
///
/// Phasing separators are not alleles; unparsable alleles count as missing.
pub fn parse_genotype(gt: &str) -> Vec<Option<usize>> {
    gt.split(['/', '|'])
        .filter(|allele| !allele.is_empty())
        .map(|allele| allele.parse::<usize>().ok())
        .collect()
}

/// Number of alternate alleles of the record; a lone `.` ALT counts as none.
pub fn alt_allele_count(record: &RecordBuf) -> usize {
    record
        .alternate_bases()
        .as_ref()
        .iter()
        .filter(|allele| allele.as_str() != ".")
        .count()
}
