//! BigQuery target backed by load jobs over the v2 REST API.
//!
//! A file is uploaded through a resumable upload session that creates a CSV
//! load job; the job is then polled until BigQuery reports it done. Load jobs
//! are atomic, so a failed job leaves the destination table unchanged.

use std::{env, thread, time::Duration};

use anyhow::{Context, Result, anyhow, bail};
use log::debug;
use reqwest::{
    blocking::{Client, Response},
    header::{CONTENT_TYPE, LOCATION},
};
use serde_json::{Value, json};
use url::Url;

use crate::{
    config::BigQueryConfig,
    load::{LoadJob, Target},
    schema::{ColumnSchema, SqlType},
};

pub const ACCESS_TOKEN_ENV: &str = "BIGQUERY_ACCESS_TOKEN";
const API_ROOT: &str = "https://bigquery.googleapis.com";
// NUMERIC holds 29 integer digits and 9 fractional digits.
const NUMERIC_MAX_INTEGER_DIGITS: u32 = 29;
const NUMERIC_MAX_SCALE: u32 = 9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Destination {
    pub project: String,
    pub dataset: String,
    pub location: Option<String>,
}

impl Destination {
    /// Parses `bigquery://<project>/<dataset>[?location=<region>]`.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).with_context(|| format!("Parsing BigQuery URI '{uri}'"))?;
        let project = url
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| anyhow!("BigQuery URI '{uri}' is missing a project"))?
            .to_string();
        let dataset = url
            .path_segments()
            .and_then(|mut segments| segments.find(|s| !s.is_empty()))
            .ok_or_else(|| anyhow!("BigQuery URI '{uri}' is missing a dataset"))?
            .to_string();
        let location = url
            .query_pairs()
            .find(|(key, _)| key == "location")
            .map(|(_, value)| value.into_owned());
        Ok(Self {
            project,
            dataset,
            location,
        })
    }
}

pub struct BigQueryTarget {
    http: Client,
    destination: Destination,
    token: String,
    poll_interval: Duration,
}

impl BigQueryTarget {
    pub fn from_uri(uri: &str, config: &BigQueryConfig) -> Result<Self> {
        let mut destination = Destination::parse(uri)?;
        if destination.location.is_none() {
            destination.location = config.location.clone();
        }
        let token = env::var(ACCESS_TOKEN_ENV)
            .ok()
            .or_else(|| config.access_token.clone())
            .ok_or_else(|| {
                anyhow!("No BigQuery access token; set {ACCESS_TOKEN_ENV} or bigquery.access_token")
            })?;
        let http = Client::builder()
            .build()
            .context("Building BigQuery HTTP client")?;
        Ok(Self {
            http,
            destination,
            token,
            poll_interval: Duration::from_millis(config.poll_interval_ms),
        })
    }

    fn start_upload(&self, configuration: &Value) -> Result<String> {
        let url = format!(
            "{API_ROOT}/upload/bigquery/v2/projects/{}/jobs?uploadType=resumable",
            self.destination.project
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.token)
            .json(configuration)
            .send()
            .context("Starting load job upload")?;
        let response = check_status(response)?;
        let session = response
            .headers()
            .get(LOCATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| anyhow!("Upload session response has no Location header"))?;
        Ok(session.to_string())
    }

    fn upload(&self, session: &str, content: &str) -> Result<Value> {
        let mut body = content.as_bytes().to_vec();
        body.push(b'\n');
        let response = self
            .http
            .put(session)
            .bearer_auth(&self.token)
            .header(CONTENT_TYPE, "application/octet-stream")
            .body(body)
            .send()
            .context("Uploading CSV data")?;
        check_status(response)?
            .json::<Value>()
            .context("Decoding load job response")
    }

    fn fetch_job(&self, job_id: &str, location: Option<&str>) -> Result<Value> {
        let url = format!(
            "{API_ROOT}/bigquery/v2/projects/{}/jobs/{job_id}",
            self.destination.project
        );
        let mut request = self.http.get(&url).bearer_auth(&self.token);
        if let Some(location) = location {
            request = request.query(&[("location", location)]);
        }
        let response = request.send().context("Polling load job")?;
        check_status(response)?
            .json::<Value>()
            .context("Decoding load job status")
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    bail!("BigQuery request failed with {status}: {body}")
}

impl Target for BigQueryTarget {
    fn describe(&self) -> String {
        format!(
            "bigquery://{}/{}",
            self.destination.project, self.destination.dataset
        )
    }

    fn load(&mut self, job: &LoadJob<'_>) -> Result<u64> {
        let configuration = load_job_configuration(&self.destination, job);
        debug!("BigQuery load configuration: {configuration}");
        let session = self.start_upload(&configuration)?;
        let mut status = self.upload(&session, job.content)?;
        let job_id = status
            .pointer("/jobReference/jobId")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Load job response has no job id"))?
            .to_string();
        let location = status
            .pointer("/jobReference/location")
            .and_then(Value::as_str)
            .map(str::to_string);
        loop {
            if let Some(rows) = job_outcome(&status)? {
                return Ok(rows);
            }
            debug!("Waiting for load job {job_id}");
            thread::sleep(self.poll_interval);
            status = self.fetch_job(&job_id, location.as_deref())?;
        }
    }
}

/// BigQuery column type for a resolved PostgreSQL type.
pub fn bigquery_type(sql_type: SqlType) -> &'static str {
    match sql_type {
        SqlType::SmallInt | SqlType::Integer | SqlType::BigInt => "INT64",
        SqlType::Numeric(Some((precision, scale)))
            if scale <= NUMERIC_MAX_SCALE
                && precision.saturating_sub(scale) <= NUMERIC_MAX_INTEGER_DIGITS =>
        {
            "NUMERIC"
        }
        SqlType::Numeric(_) => "BIGNUMERIC",
        SqlType::Real | SqlType::DoublePrecision => "FLOAT64",
        SqlType::Boolean => "BOOL",
        SqlType::Date => "DATE",
        SqlType::Timestamp => "DATETIME",
        SqlType::Time => "TIME",
        SqlType::Jsonb => "JSON",
        SqlType::Text => "STRING",
    }
}

fn schema_fields(columns: &[ColumnSchema]) -> Value {
    let fields = columns
        .iter()
        .map(|column| {
            let mode = if column.is_nullable { "NULLABLE" } else { "REQUIRED" };
            // CSV loads parse TIME and DATETIME only with seconds present.
            let field_type = if column.seconds_omitted {
                "STRING"
            } else {
                bigquery_type(column.sql_type)
            };
            json!({
                "name": column.sql_name,
                "type": field_type,
                "mode": mode,
            })
        })
        .collect::<Vec<_>>();
    json!({ "fields": fields })
}

/// Job resource for a CSV load; a schema is attached when the job may create
/// the table.
pub fn load_job_configuration(destination: &Destination, job: &LoadJob<'_>) -> Value {
    let mut load = json!({
        "destinationTable": {
            "projectId": destination.project,
            "datasetId": destination.dataset,
            "tableId": job.table,
        },
        "sourceFormat": "CSV",
        "encoding": "UTF-8",
        "skipLeadingRows": 1,
        "allowQuotedNewlines": true,
        "writeDisposition": "WRITE_APPEND",
        "createDisposition": "CREATE_NEVER",
    });
    if let Some(columns) = job.columns {
        load["createDisposition"] = json!("CREATE_IF_NEEDED");
        load["schema"] = schema_fields(columns);
    }
    let mut resource = json!({ "configuration": { "load": load } });
    if let Some(location) = &destination.location {
        resource["jobReference"] = json!({
            "projectId": destination.project,
            "location": location,
        });
    }
    resource
}

/// `Ok(Some(rows))` once the job is done, `Ok(None)` while it is running and
/// an error when BigQuery reports one.
pub fn job_outcome(job: &Value) -> Result<Option<u64>> {
    let state = job.pointer("/status/state").and_then(Value::as_str);
    if state != Some("DONE") {
        return Ok(None);
    }
    if let Some(error) = job.pointer("/status/errorResult") {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error");
        let details = job
            .pointer("/status/errors")
            .and_then(Value::as_array)
            .map(|errors| {
                errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("; ")
            })
            .unwrap_or_default();
        if details.is_empty() {
            bail!("Load job failed: {message}");
        }
        bail!("Load job failed: {message} ({details})");
    }
    let rows = job
        .pointer("/statistics/load/outputRows")
        .and_then(|value| match value {
            Value::String(s) => s.parse::<u64>().ok(),
            other => other.as_u64(),
        })
        .unwrap_or(0);
    Ok(Some(rows))
}
