//! Implementation of `freqs calculate` sub command.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Parser;
use noodles::vcf::variant::io::Write as _;
use thousands::Separable;

use crate::common::io::{finalize_buf_writer, remove_if_exists};
use crate::common::noodles::{open_vcf_reader, open_vcf_writer, VcfReader};
use crate::common::tools::Tools;
use crate::conf::{load_collections, CollectionConfig, ServerConfig};
use crate::err::Error;
use crate::metadata::mysql::MysqlStore;
use crate::metadata::tsv::TsvDirStore;
use crate::metadata::{DatabaseKind, MetadataStore, PopulationData};

use super::accumulate::FrequencyAccumulator;
use super::input::{output_path, resolve_input, InputContext};
use super::root::resolve_root;
use super::summary::{FileEntry, PopulationDataSummary, PopulationEntry};

/// Command line arguments for `freqs calculate` sub command.
#[derive(Parser, Debug, Clone)]
#[command(about = "Compute per-population allele frequencies", long_about = None)]
pub struct Args {
    /// Species production names to process, defaults to all configured species.
    #[arg(long, value_delimiter = ',')]
    pub species: Vec<String>,
    /// Ensembl release version.
    #[arg(long, default_value = "114")]
    pub version: String,
    /// Path to the database configuration file.
    #[arg(short = 'I', long, default_value = "DEFAULT.ini")]
    pub ini_file: PathBuf,
    /// Directory with the collection config JSON file(s).
    #[arg(long)]
    pub vcf_config_dir: Option<PathBuf>,
    /// Root directory of the genotype files.
    #[arg(
        long,
        default_value = "/nfs/production/flicek/ensembl/production/ensemblftp/data_files"
    )]
    pub data_root_dir: PathBuf,
    /// Ensembl division, e.g., `vertebrates` or `plants`.
    #[arg(long, default_value = "vertebrates")]
    pub division: String,
    /// Base output directory.
    #[arg(
        long,
        default_value = "/nfs/production/flicek/ensembl/variation/new_website/vep/custom_data/"
    )]
    pub base_outdir: PathBuf,
    /// Write the annotated VCF files, otherwise only the summary is written.
    #[arg(long)]
    pub write_output: bool,
    /// Directory for downloading remote genotype files.
    #[arg(long, default_value = "tmp")]
    pub path_tmp_dir: PathBuf,
    /// Directory to write `population_data_<division>.json` to.
    #[arg(long, default_value = ".")]
    pub path_summary_dir: PathBuf,
    /// Read population metadata from TSV dumps instead of the database server.
    #[arg(long)]
    pub path_metadata_dir: Option<PathBuf>,

    /// For debug purposes, maximal number of variants to write per file.
    #[arg(long)]
    pub max_var_count: Option<usize>,

    #[command(flatten)]
    pub tools: Tools,
}

/// Stream all records of `reader` to `path_out`, adding the frequency fields.
fn write_annotated(
    reader: &mut VcfReader,
    header_in: &noodles::vcf::Header,
    header_out: &noodles::vcf::Header,
    accumulator: &FrequencyAccumulator,
    path_out: &Path,
    max_var_count: Option<usize>,
) -> Result<usize, Error> {
    let write_err = |source: std::io::Error| Error::Write {
        path: path_out.to_path_buf(),
        source,
    };

    let mut writer = open_vcf_writer(path_out).map_err(write_err)?;
    writer.write_header(header_out).map_err(write_err)?;

    tracing::info!("Writing {:?} ...", path_out);
    let start = Instant::now();
    let mut prev = Instant::now();
    let mut total_written = 0usize;
    for result in reader.record_bufs(header_in) {
        let mut record = result.map_err(write_err)?;
        accumulator.annotate(&mut record);
        writer
            .write_variant_record(header_out, &record)
            .map_err(write_err)?;

        total_written += 1;
        if prev.elapsed().as_secs() >= 60 {
            tracing::info!(
                "at {}:{} ({} records)",
                record.reference_sequence_name(),
                record.variant_start().map(usize::from).unwrap_or_default(),
                total_written.separate_with_commas()
            );
            prev = Instant::now();
        }
        if let Some(max_var_count) = max_var_count {
            if total_written >= max_var_count {
                tracing::warn!(
                    "Stopping after {} records as requested by --max-var-count",
                    total_written
                );
                break;
            }
        }
    }
    finalize_buf_writer(writer.into_inner()).map_err(write_err)?;

    tracing::info!(
        "... wrote {} records in {:?}",
        total_written.separate_with_commas(),
        start.elapsed()
    );
    Ok(total_written)
}

/// Compress and index `path_out`; failures are only logged.
fn post_process(tools: &Tools, path_out: &Path) {
    match tools.bgzip(path_out) {
        Ok(path_gz) => {
            if let Err(e) = tools.tabix_csi(&path_gz) {
                tracing::warn!("{}", e);
            }
        }
        Err(e) => tracing::warn!("{}", e),
    }
}

/// Process one collection of `species` and return its summary entry.
fn process_collection(
    args: &Args,
    ctx: &InputContext,
    collection: &CollectionConfig,
    data: &PopulationData,
) -> Result<PopulationEntry, Error> {
    let species = &collection.species;
    let path_in = resolve_input(collection, ctx)?;

    let resolution_err = |msg: String| Error::Resolution {
        species: species.clone(),
        msg,
    };
    let mut reader = open_vcf_reader(&path_in).map_err(|e| {
        resolution_err(format!("cannot open VCF reader for {:?}: {}", &path_in, e))
    })?;
    let header_in = reader
        .read_header()
        .map_err(|e| resolution_err(format!("cannot read header of {:?}: {}", &path_in, e)))?;

    let prefix = collection.sample_prefix.as_deref().unwrap_or_default();
    let sample_names = header_in
        .sample_names()
        .iter()
        .map(|sample| format!("{}{}", prefix, sample))
        .collect::<Vec<_>>();
    let accumulator = FrequencyAccumulator::new(&sample_names, data);
    if accumulator.populations().is_empty() {
        return Err(Error::NoSamplePopulations {
            species: species.clone(),
            path: path_in,
        });
    }
    tracing::debug!(
        "{} samples in {} populations",
        sample_names.len(),
        accumulator.populations().len()
    );

    let root = resolve_root(&accumulator.population_names(), data);
    let path_out = output_path(&args.base_outdir, collection);
    let mut file_location = path_out.clone().into_os_string();
    file_location.push(".gz");
    let entry = PopulationEntry {
        name: root.escaped_name(),
        files: vec![FileEntry {
            file_location: file_location.to_string_lossy().into_owned(),
            short_name: root.escaped_name(),
            include_fields: accumulator.include_fields(),
        }],
    };

    if !args.write_output {
        return Ok(entry);
    }

    let mut header_out = header_in.clone();
    accumulator.extend_header(&mut header_out);
    if let Err(e) = write_annotated(
        &mut reader,
        &header_in,
        &header_out,
        &accumulator,
        &path_out,
        args.max_var_count,
    ) {
        if let Err(e) = remove_if_exists(&path_out) {
            tracing::warn!("could not remove partial output {:?}: {}", &path_out, e);
        }
        return Err(e);
    }
    post_process(&args.tools, &path_out);

    Ok(entry)
}

/// Process all `collections` of `species`.
///
/// Only fatal errors are returned, everything else skips the species or collection.
fn process_species(
    args: &Args,
    store: &dyn MetadataStore,
    ctx: &InputContext,
    species: &str,
    collections: &[CollectionConfig],
) -> Result<Vec<PopulationEntry>, Error> {
    let database = match store.database_name(species, &args.version, DatabaseKind::Variation) {
        Ok(Some(database)) => database,
        Ok(None) => {
            tracing::warn!(
                "{} (no variation database for release {}), skipping",
                Error::NoPopulationData(species.to_string()),
                &args.version
            );
            return Ok(Vec::new());
        }
        Err(e) => {
            tracing::error!("could not look up variation database: {}, skipping", e);
            return Ok(Vec::new());
        }
    };
    tracing::info!("Loading population data of {} from {} ...", species, &database);
    let data = PopulationData::load(store, &database);
    if data.is_empty() {
        tracing::warn!(
            "{}, skipping",
            Error::NoPopulationData(species.to_string())
        );
        return Ok(Vec::new());
    }
    tracing::info!(
        "... loaded {} populations and {} samples",
        data.populations_by_id.len().separate_with_commas(),
        data.sample_populations.len().separate_with_commas()
    );
    if collections.is_empty() {
        tracing::warn!("no collections configured for {}", species);
    }

    let mut result = Vec::new();
    for collection in collections {
        match process_collection(args, ctx, collection, &data) {
            Ok(entry) => result.push(entry),
            Err(e) if e.is_fatal() => return Err(e),
            Err(e) => tracing::error!("{}, skipping", e),
        }
    }
    Ok(result)
}

/// Main entry point for `freqs calculate` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args = {:?}", &args);

    let store: Box<dyn MetadataStore> = match &args.path_metadata_dir {
        Some(path_metadata_dir) => Box::new(TsvDirStore::new(path_metadata_dir)),
        None => Box::new(MysqlStore::new(
            ServerConfig::from_ini(&args.ini_file, "variation")?,
            &args.tools.mysql,
        )),
    };
    let collections = match &args.vcf_config_dir {
        Some(vcf_config_dir) => load_collections(vcf_config_dir)?,
        None => Default::default(),
    };
    let species_list = if args.species.is_empty() {
        collections.keys().cloned().collect::<Vec<_>>()
    } else {
        args.species.clone()
    };

    let ctx = InputContext {
        data_root_dir: &args.data_root_dir,
        division: &args.division,
        tmp_dir: &args.path_tmp_dir,
        tools: &args.tools,
    };
    let start = Instant::now();
    let mut summary = PopulationDataSummary::default();
    let mut total_entries = 0usize;
    for species in &species_list {
        tracing::info!("Processing species {} ...", species);
        summary.add_species(species);
        let collections = collections
            .get(species)
            .map(Vec::as_slice)
            .unwrap_or_default();
        for entry in process_species(args, store.as_ref(), &ctx, species, collections)? {
            summary.push(species, entry);
            total_entries += 1;
        }
    }

    let path_summary = args
        .path_summary_dir
        .join(format!("population_data_{}.json", &args.division));
    summary.save(&path_summary)?;
    tracing::info!(
        "Wrote {} entries for {} species to {:?} in {:?}",
        total_entries.separate_with_commas(),
        species_list.len(),
        &path_summary,
        start.elapsed()
    );

    Ok(())
}
