//! PostgreSQL target using the bulk `COPY ... FROM STDIN` protocol.

use std::io::Write;

use anyhow::{Context, Result};
use log::debug;
use postgres::{Client, NoTls};

use crate::{
    ddl,
    load::{LoadJob, Target},
};

/// One connection reused for every file of a run. Each file is loaded in its
/// own transaction; dropping an uncommitted transaction rolls it back.
pub struct PostgresTarget {
    client: Client,
    host: String,
}

impl PostgresTarget {
    pub fn connect(uri: &str) -> Result<Self> {
        let client = Client::connect(uri, NoTls).context("Connecting to PostgreSQL")?;
        Ok(Self {
            client,
            host: redact_uri(uri),
        })
    }
}

/// Drops credentials from a connection URI for log output.
pub fn redact_uri(uri: &str) -> String {
    match uri.split_once("://") {
        Some((scheme, rest)) => {
            let location = rest.rsplit_once('@').map_or(rest, |(_, host)| host);
            format!("{scheme}://{location}")
        }
        None => uri.to_string(),
    }
}

impl Target for PostgresTarget {
    fn describe(&self) -> String {
        self.host.clone()
    }

    fn load(&mut self, job: &LoadJob<'_>) -> Result<u64> {
        let mut transaction = self.client.transaction().context("Starting transaction")?;
        if let Some(statement) = job.ddl {
            debug!("Creating table {}", job.table);
            transaction
                .batch_execute(statement)
                .with_context(|| format!("Creating table {}", job.table))?;
        }

        let query = ddl::copy_statement(job.table, job.column_names);
        debug!("{query}");
        let mut writer = transaction
            .copy_in(query.as_str())
            .context("Starting COPY")?;
        writer
            .write_all(job.content.as_bytes())
            .context("Streaming CSV data")?;
        writer.write_all(b"\n").context("Streaming CSV data")?;
        let rows = writer.finish().context("Finishing COPY")?;

        transaction.commit().context("Committing transaction")?;
        Ok(rows)
    }
}
