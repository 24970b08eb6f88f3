//! Locating the genotype VCF of a collection, and its output path.

use std::path::{Path, PathBuf};

use crate::common::tools::Tools;
use crate::conf::CollectionConfig;
use crate::err::Error;

/// Known broken template of the wheat Watkins collection.
const WATKINS_TEMPLATE: &str = "/triticum_aestivum/Watkins/combined_watkins_nochr.INFO.vcf.gz";
/// Corrected location of the wheat Watkins collection.
const WATKINS_CORRECTED: &str =
    "/triticum_aestivum/IWGSC/variation_genotype/combined_watkins_nochr.INFO.vcf.gz";

/// Where to look for input files.
#[derive(Debug, Clone)]
pub struct InputContext<'a> {
    /// Root of the division-specific data directories.
    pub data_root_dir: &'a Path,
    /// Division, e.g., `vertebrates` or `plants`.
    pub division: &'a str,
    /// Download directory for remote files.
    pub tmp_dir: &'a Path,
    pub tools: &'a Tools,
}

/// Whether the template refers to a remote file.
pub fn is_remote(template: &str) -> bool {
    ["http://", "https://", "ftp://"]
        .iter()
        .any(|scheme| template.starts_with(scheme))
}

/// The template of `collection` with known broken locations fixed.
pub fn filename_template(collection: &CollectionConfig) -> &str {
    if collection.filename_template == WATKINS_TEMPLATE {
        tracing::debug!(
            "replacing {} with {}",
            &collection.filename_template,
            WATKINS_CORRECTED
        );
        WATKINS_CORRECTED
    } else {
        &collection.filename_template
    }
}

/// Resolve the local path of the genotype VCF of `collection`.
///
/// Remote files are downloaded into the temporary directory.  Local paths
/// that do not exist are looked up below `<data_root_dir>/<division>`.
pub fn resolve_input(collection: &CollectionConfig, ctx: &InputContext) -> Result<PathBuf, Error> {
    let resolution_err = |msg: String| Error::Resolution {
        species: collection.species.clone(),
        msg,
    };

    let template = filename_template(collection);
    let path = if is_remote(template) {
        std::fs::create_dir_all(ctx.tmp_dir).map_err(|e| {
            resolution_err(format!(
                "cannot create tmp dir to download remote files {:?}: {}",
                ctx.tmp_dir, e
            ))
        })?;
        tracing::info!("downloading {} ...", template);
        let path = ctx
            .tools
            .download(template, ctx.tmp_dir)
            .map_err(|e| resolution_err(format!("cannot download file {}: {}", template, e)))?;
        tracing::info!("... done downloading to {:?}", &path);
        path
    } else {
        let path = Path::new(template);
        if path.is_absolute() && path.is_file() {
            path.to_path_buf()
        } else {
            ctx.data_root_dir
                .join(ctx.division)
                .join(template.trim_start_matches('/'))
        }
    };

    if path.is_file() {
        Ok(path)
    } else {
        Err(resolution_err(format!("{:?} is not a file", path)))
    }
}

/// Output VCF path of `collection`, before compression.
///
/// `<base>/<project>/<species>/<assembly>/<name>_freq.vcf` where `<name>` is
/// the file name of the template without its VCF extension.
pub fn output_path<P: AsRef<Path>>(base_outdir: P, collection: &CollectionConfig) -> PathBuf {
    let template = filename_template(collection);
    let file_name = template
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default();
    let stem = [".vcf.gz", ".vcf.bgz", ".vcf"]
        .iter()
        .find_map(|suffix| file_name.strip_suffix(suffix))
        .unwrap_or(file_name);

    base_outdir
        .as_ref()
        .join(collection.project())
        .join(&collection.species)
        .join(collection.assembly())
        .join(format!("{}_freq.vcf", stem))
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn collection(template: &str) -> CollectionConfig {
        CollectionConfig {
            species: String::from("ovis_aries"),
            filename_template: template.to_string(),
            sample_prefix: None,
            source_name: None,
            assembly: None,
        }
    }

    #[rstest::rstest]
    #[case("https://ftp.example.org/genotypes.vcf.gz", true)]
    #[case("http://ftp.example.org/genotypes.vcf.gz", true)]
    #[case("ftp://ftp.example.org/genotypes.vcf.gz", true)]
    #[case("/nfs/genotypes.vcf.gz", false)]
    #[case("genotypes.vcf.gz", false)]
    fn is_remote(#[case] template: &str, #[case] expected: bool) {
        assert_eq!(super::is_remote(template), expected);
    }

    #[test]
    fn watkins_remap() {
        let mut wheat = collection(WATKINS_TEMPLATE);
        wheat.species = String::from("triticum_aestivum");
        assert_eq!(filename_template(&wheat), WATKINS_CORRECTED);
        assert_eq!(
            filename_template(&collection("/ovis_aries/x.vcf.gz")),
            "/ovis_aries/x.vcf.gz"
        );
    }

    #[test]
    fn resolve_input_local() -> Result<(), anyhow::Error> {
        let tools = Tools::default();
        let tmp_dir = temp_testdir::TempDir::default();
        let ctx = InputContext {
            data_root_dir: Path::new("tests/data/freqs/data_files"),
            division: "vertebrates",
            tmp_dir: &tmp_dir,
            tools: &tools,
        };

        // absolute template re-rooted below the data directory
        assert_eq!(
            resolve_input(&collection("/ovis_aries/genotypes.vcf"), &ctx)?,
            PathBuf::from("tests/data/freqs/data_files/vertebrates/ovis_aries/genotypes.vcf")
        );
        // relative template
        assert_eq!(
            resolve_input(&collection("ovis_aries/genotypes.vcf"), &ctx)?,
            PathBuf::from("tests/data/freqs/data_files/vertebrates/ovis_aries/genotypes.vcf")
        );
        // existing absolute path used as is
        let absolute = std::fs::canonicalize("tests/data/freqs/simple.vcf")?;
        assert_eq!(
            resolve_input(&collection(&absolute.to_string_lossy()), &ctx)?,
            absolute
        );

        let err = resolve_input(&collection("/ovis_aries/missing.vcf.gz"), &ctx).unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        assert!(!err.is_fatal());

        Ok(())
    }

    #[test]
    fn resolve_input_download_failure() {
        let tools = Tools {
            wget: String::from("false"),
            ..Default::default()
        };
        let tmp_dir = temp_testdir::TempDir::default();
        let ctx = InputContext {
            data_root_dir: Path::new("tests/data/freqs/data_files"),
            division: "vertebrates",
            tmp_dir: &tmp_dir.join("downloads"),
            tools: &tools,
        };

        let err = resolve_input(
            &collection("ftp://ftp.example.org/pub/genotypes.vcf.gz"),
            &ctx,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Resolution { .. }));
        // the download directory is created nevertheless
        assert!(tmp_dir.join("downloads").is_dir());
    }

    #[rstest::rstest]
    #[case("/ovis_aries/genotypes.vcf.gz", "genotypes_freq.vcf")]
    #[case("/ovis_aries/genotypes.vcf.bgz", "genotypes_freq.vcf")]
    #[case("/ovis_aries/genotypes.vcf", "genotypes_freq.vcf")]
    #[case("https://ftp.example.org/pub/NextGen.vcf.gz", "NextGen_freq.vcf")]
    #[case("/ovis_aries/genotypes.txt", "genotypes.txt_freq.vcf")]
    fn output_path(#[case] template: &str, #[case] file_name: &str) {
        let mut collection = collection(template);
        assert_eq!(
            super::output_path("/out", &collection),
            Path::new("/out/frequency_projects/ovis_aries/ASSEMBLY_DEFAULT").join(file_name)
        );

        collection.source_name = Some(String::from("NextGen"));
        collection.assembly = Some(String::from("Oar_v3.1"));
        assert_eq!(
            super::output_path("/out", &collection),
            Path::new("/out/NextGen/ovis_aries/Oar_v3.1").join(file_name)
        );
    }
}
