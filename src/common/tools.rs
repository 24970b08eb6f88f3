//! Blocking invocation of external command line tools.
//!
//! Each tool call is a synchronous operation that either succeeds or yields an
//! [`Error::Tool`] carrying the tool's stderr.

use std::path::{Path, PathBuf};
use std::process::Command;

use itertools::Itertools;

use crate::err::Error;

/// Names or paths of the external programs that are used.
#[derive(Debug, Clone, clap::Args)]
pub struct Tools {
    /// Path to the `bgzip` executable.
    #[arg(long, default_value = "bgzip")]
    pub bgzip: String,
    /// Path to the `tabix` executable.
    #[arg(long, default_value = "tabix")]
    pub tabix: String,
    /// Path to the `wget` executable.
    #[arg(long, default_value = "wget")]
    pub wget: String,
    /// Path to the `mysql` client executable.
    #[arg(long, default_value = "mysql")]
    pub mysql: String,
}

impl Default for Tools {
    fn default() -> Self {
        Self {
            bgzip: String::from("bgzip"),
            tabix: String::from("tabix"),
            wget: String::from("wget"),
            mysql: String::from("mysql"),
        }
    }
}

/// Run `program` with `args` to completion and return its stdout.
pub fn run_tool<S: AsRef<std::ffi::OsStr>>(program: &str, args: &[S]) -> Result<String, Error> {
    tracing::debug!(
        "running {} {}",
        program,
        args.iter()
            .map(|arg| arg.as_ref().to_string_lossy())
            .join(" ")
    );
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::Tool {
            program: program.to_string(),
            msg: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(Error::Tool {
            program: program.to_string(),
            msg: format!(
                "{}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

impl Tools {
    /// Compress `path` in place with `bgzip -f`, returning the path of the `.gz` file.
    pub fn bgzip<P: AsRef<Path>>(&self, path: P) -> Result<PathBuf, Error> {
        let path = path.as_ref();
        run_tool(&self.bgzip, &[Path::new("-f").as_os_str(), path.as_os_str()]).map_err(
            |e| Error::PostProcessing {
                step: "bgzip",
                path: path.to_path_buf(),
                msg: e.to_string(),
            },
        )?;
        let mut gz = path.as_os_str().to_owned();
        gz.push(".gz");
        Ok(PathBuf::from(gz))
    }

    /// Build a CSI index for the bgzip-ed VCF file at `path`.
    pub fn tabix_csi<P: AsRef<Path>>(&self, path: P) -> Result<(), Error> {
        let path = path.as_ref();
        let mut args: Vec<std::ffi::OsString> = ["-f", "-C", "-p", "vcf"]
            .iter()
            .map(std::ffi::OsString::from)
            .collect();
        args.push(path.as_os_str().to_owned());
        run_tool(&self.tabix, &args).map_err(|e| Error::PostProcessing {
            step: "create tabix index for",
            path: path.to_path_buf(),
            msg: e.to_string(),
        })?;
        Ok(())
    }

    /// Download `url` into `dest_dir`, keeping the file name of the URL.
    pub fn download<P: AsRef<Path>>(&self, url: &str, dest_dir: P) -> Result<PathBuf, Error> {
        let file_name = url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::Tool {
                program: self.wget.clone(),
                msg: format!("cannot derive file name from URL {}", url),
            })?;
        let dest = dest_dir.as_ref().join(file_name);
        let mut args: Vec<std::ffi::OsString> = vec![std::ffi::OsString::from("-q"), "-O".into()];
        args.push(dest.as_os_str().to_owned());
        args.push(url.into());
        run_tool(&self.wget, &args)?;
        Ok(dest)
    }
}

#[cfg(test)]
mod test {
    use crate::err::Error;

    #[test]
    fn run_tool_success() -> Result<(), anyhow::Error> {
        let out = super::run_tool("echo", &["hello"])?;
        assert_eq!(out.trim(), "hello");

        Ok(())
    }

    #[test]
    fn run_tool_failure_status() {
        let res = super::run_tool("false", &[] as &[&str]);
        assert!(matches!(res, Err(Error::Tool { .. })));
    }

    #[test]
    fn run_tool_missing_program() {
        let res = super::run_tool("this-program-does-not-exist-42", &["x"]);
        assert!(matches!(res, Err(Error::Tool { .. })));
    }

    #[test]
    fn bgzip_failure_is_post_processing() {
        let tools = super::Tools {
            bgzip: String::from("false"),
            ..Default::default()
        };
        let res = tools.bgzip("out.vcf");
        assert!(matches!(res, Err(Error::PostProcessing { step: "bgzip", .. })));
    }

    #[test]
    fn download_unreachable() {
        let tmp_dir = temp_testdir::TempDir::default();
        let tools = super::Tools {
            wget: String::from("false"),
            ..Default::default()
        };
        let res = tools.download("ftp://ftp.example.org/pub/genotypes.vcf.gz", &*tmp_dir);
        assert!(matches!(res, Err(Error::Tool { .. })));
    }
}
