//! PostgreSQL DDL and COPY text generation.

use std::fmt::Write as _;

use itertools::Itertools;
use log::warn;

use crate::{
    schema::ColumnSchema,
    table::{comment_lines, schema_as_table},
};

/// Options shaping the generated `CREATE TABLE`/`CREATE INDEX` text.
#[derive(Debug, Clone, Default)]
pub struct DdlOptions<'a> {
    pub primary_key: Option<&'a str>,
    /// SQL column names that receive an index when present.
    pub indexed_columns: &'a [String],
}

pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub fn create_table_ddl(columns: &[ColumnSchema], table: &str, options: &DdlOptions<'_>) -> String {
    let quoted_table = quote_ident(table);
    if columns.is_empty() {
        return format!("CREATE TABLE {quoted_table} (); -- No columns inferred from schema.");
    }

    let mut definitions = columns
        .iter()
        .map(|column| format!("    {} {}", quote_ident(&column.sql_name), column.sql_declaration()))
        .collect::<Vec<_>>();

    if let Some(key) = options.primary_key {
        if columns.iter().any(|column| column.sql_name == key) {
            definitions.push(format!("    PRIMARY KEY ({})", quote_ident(key)));
        } else {
            warn!("Primary key column '{key}' not found in inferred SQL names of {table}");
        }
    }

    let mut ddl = format!("CREATE TABLE {quoted_table} (\n{}\n);\n\n", definitions.join(",\n"));
    for column in columns
        .iter()
        .filter(|column| options.indexed_columns.contains(&column.sql_name))
    {
        let index_name = quote_ident(&format!("idx_{table}_{}", column.sql_name));
        let _ = writeln!(
            ddl,
            "CREATE INDEX {index_name} ON {quoted_table} ({});",
            quote_ident(&column.sql_name)
        );
    }
    ddl
}

/// `COPY` statement reading CSV with a header row from the client.
pub fn copy_statement<S: AsRef<str>>(table: &str, columns: &[S]) -> String {
    let column_list = columns.iter().map(|c| quote_ident(c.as_ref())).join(",");
    format!(
        "COPY {} ({column_list}) FROM STDIN WITH (FORMAT CSV, HEADER)",
        quote_ident(table)
    )
}

/// A `psql` script that loads `content` through `COPY ... FROM STDIN`.
pub fn copy_script<S: AsRef<str>>(table: &str, columns: &[S], content: &str) -> String {
    format!("{};\n{content}\n\\.\n", copy_statement(table, columns))
}

/// Commented schema table followed by the DDL for one source.
pub fn schema_report(
    source_name: &str,
    table: &str,
    columns: &[ColumnSchema],
    options: &DdlOptions<'_>,
) -> String {
    format!(
        "-- Schema inferred from {source_name}\n{}\n{}",
        comment_lines(&schema_as_table(columns)),
        create_table_ddl(columns, table, options)
    )
}
