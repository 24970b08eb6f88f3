//! Implementation of `freqs custom-args` sub command.
//!
//! Renders the VEP `custom` lines for the frequency files of one species.

use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use itertools::Itertools;

use crate::err::Error;

use super::summary::{FileEntry, PopulationDataSummary};

/// Placeholder for the assembly accession in file locations.
pub const ASSEMBLY_ACC: &str = "ASSEMBLY_ACC";
/// Placeholder for the chromosome in per-chromosome file locations.
pub const CHR_PLACEHOLDER: &str = "##CHR##";

/// Command line arguments for `freqs custom-args` sub command.
#[derive(Parser, Debug, Clone)]
#[command(about = "Render VEP custom annotation lines", long_about = None)]
pub struct Args {
    /// Path to the `population_data_<division>.json` file.
    #[arg(long)]
    pub population_data_file: PathBuf,
    /// Species production name.
    #[arg(long)]
    pub species: String,
    /// Value for the `ASSEMBLY_ACC` placeholder.
    #[arg(long)]
    pub assembly_acc: Option<String>,
    /// Do not check that the annotation files exist.
    #[arg(long)]
    pub skip_file_check: bool,
    /// Output file, defaults to stdout.
    #[arg(long)]
    pub path_output: Option<PathBuf>,
}

/// Whether a file exists for `location`, with `##CHR##` matching any chromosome.
pub fn location_exists(location: &str) -> bool {
    if !location.contains(CHR_PLACEHOLDER) {
        return Path::new(location).exists();
    }

    let path = Path::new(location);
    let (Some(dir), Some(file_name)) = (path.parent(), path.file_name()) else {
        return false;
    };
    let pattern = format!(
        "^{}$",
        file_name
            .to_string_lossy()
            .split(CHR_PLACEHOLDER)
            .map(regex::escape)
            .join(".*")
    );
    let Ok(pattern) = regex::Regex::new(&pattern) else {
        return false;
    };
    let dir = if dir.as_os_str().is_empty() {
        Path::new(".")
    } else {
        dir
    };
    match std::fs::read_dir(dir) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .any(|entry| pattern.is_match(&entry.file_name().to_string_lossy())),
        Err(_) => false,
    }
}

/// File location with the `ASSEMBLY_ACC` placeholder replaced.
pub fn file_location(file: &FileEntry, assembly_acc: Option<&str>) -> String {
    match assembly_acc {
        Some(acc) => file.file_location.replace(ASSEMBLY_ACC, acc),
        None => file.file_location.clone(),
    }
}

/// The `custom` line for one frequency file.
pub fn custom_line(file: &FileEntry, assembly_acc: Option<&str>) -> String {
    let location = file_location(file, assembly_acc);
    let fields = file
        .include_fields
        .iter()
        .flat_map(|field| field.fields.iter())
        .join("%");
    format!(
        "custom file={},short_name={},format=vcf,type=exact,coords=0,fields={}",
        location, &file.short_name, fields
    )
}

/// All lines for `species`.
///
/// Species keys of the summary are matched as regular expressions against
/// the whole species name.
pub fn custom_lines(
    summary: &PopulationDataSummary,
    species: &str,
    assembly_acc: Option<&str>,
    check_files: bool,
) -> Result<Vec<String>, Error> {
    let mut result = Vec::new();
    for (pattern, entries) in summary.species() {
        let re = regex::Regex::new(&format!("^(?:{})$", pattern))
            .map_err(|e| Error::configuration(pattern, e.to_string()))?;
        if !re.is_match(species) {
            continue;
        }
        for file in entries.iter().flat_map(|entry| entry.files.iter()) {
            if check_files {
                let location = file_location(file, assembly_acc);
                if !location_exists(&location) {
                    return Err(Error::configuration(
                        &location,
                        "custom annotation file does not exist",
                    ));
                }
            }
            result.push(custom_line(file, assembly_acc));
        }
    }

    // 1000 Genomes frequencies come from the VEP cache for human
    if species == "homo_sapiens" || species == "homo_sapiens_37" {
        result.push(String::from("af_1kg 1"));
    }

    Ok(result)
}

/// Main entry point for `freqs custom-args` sub command.
pub fn run(_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args = {:?}", &args);

    let summary = PopulationDataSummary::load(&args.population_data_file)?;
    let lines = custom_lines(
        &summary,
        &args.species,
        args.assembly_acc.as_deref(),
        !args.skip_file_check,
    )?;
    if lines.is_empty() {
        tracing::warn!("no frequency files configured for {}", &args.species);
    }

    let mut writer: Box<dyn Write> = match &args.path_output {
        Some(path) => Box::new(crate::common::io::create_with_parents(path)?),
        None => Box::new(std::io::stdout().lock()),
    };
    for line in &lines {
        writeln!(writer, "{}", line)?;
    }
    writer.flush()?;

    Ok(())
}
