//! Metadata store backed by the `mysql` command line client.

use crate::common::tools::run_tool;
use crate::conf::ServerConfig;
use crate::err::Error;

use super::{DatabaseKind, MetadataQuery, MetadataStore};

/// Runs queries through `mysql -N --execute`.
#[derive(Debug, Clone)]
pub struct MysqlStore {
    /// Server to connect to.
    pub server: ServerConfig,
    /// Path to the `mysql` executable.
    pub program: String,
}

impl MysqlStore {
    pub fn new(server: ServerConfig, program: &str) -> Self {
        Self {
            server,
            program: program.to_string(),
        }
    }

    /// Command line arguments for running `sql`, optionally within `database`.
    fn args(&self, database: Option<&str>, sql: &str) -> Vec<String> {
        let mut args = vec![
            String::from("--host"),
            self.server.host.clone(),
            String::from("--port"),
            self.server.port.clone(),
            String::from("--user"),
            self.server.user.clone(),
        ];
        if let Some(password) = &self.server.password {
            args.push(format!("--password={}", password));
        }
        if let Some(database) = database {
            args.push(String::from("--database"));
            args.push(database.to_string());
        }
        args.push(String::from("-N"));
        args.push(String::from("--execute"));
        args.push(sql.to_string());
        args
    }
}

/// The `SHOW DATABASES` statement for finding a species database.
pub fn show_databases_sql(species: &str, version: &str, kind: DatabaseKind) -> String {
    format!("SHOW DATABASES LIKE '{}_{}%{}%';", species, kind, version)
}

/// Pick the first database from `SHOW DATABASES` output.
pub fn first_database(output: &str, kind: DatabaseKind) -> Option<String> {
    let names = output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>();
    if names.len() > 1 {
        tracing::warn!(
            "Multiple {} database found - returning the first match only",
            kind
        );
    }
    names.first().map(|name| name.to_string())
}

impl MetadataStore for MysqlStore {
    fn database_name(
        &self,
        species: &str,
        version: &str,
        kind: DatabaseKind,
    ) -> Result<Option<String>, Error> {
        let output = run_tool(
            &self.program,
            &self.args(None, &show_databases_sql(species, version, kind)),
        )?;
        Ok(first_database(&output, kind))
    }

    fn fetch(&self, database: &str, query: MetadataQuery) -> Result<String, Error> {
        run_tool(&self.program, &self.args(Some(database), query.sql()))
    }
}
