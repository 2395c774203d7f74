//! BigQuery sink
//!
//! Submits one load job through the REST upload endpoint with the table as
//! newline-delimited JSON, then polls the job until BigQuery reports it done.

use super::Backend;
use crate::client::{Auth, HttpClient};
use crate::codec::Format;
use crate::credentials::Credentials;
use crate::error::EtlError;
use crate::etl::Loader;
use crate::table::{ColumnKind, Table};
use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use regex::Regex;
use reqwest::Response;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

const DEFAULT_BASE_URL: &str = "https://bigquery.googleapis.com/";

/// Column and table names BigQuery accepts without quoting
const FIELD_NAME_PATTERN: &str = r"^[A-Za-z_][A-Za-z0-9_]{0,299}$";
const DATASET_ID_PATTERN: &str = r"^[A-Za-z0-9_]{1,1024}$";

fn pattern(source: &str) -> Result<Regex> {
    Regex::new(source).map_err(|e| eyre!("Invalid name pattern '{}': {}", source, e))
}

/// The parts of a BigQuery job resource the sink reads
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
    statistics: Option<JobStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    error_result: Option<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

/// Body of a failed API call
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorProto,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    load: Option<LoadStatistics>,
}

/// Counts are int64 values, which BigQuery sends as strings
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    output_rows: Option<String>,
}

impl Job {
    fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }

    fn output_rows(&self) -> Option<usize> {
        self.statistics
            .as_ref()?
            .load
            .as_ref()?
            .output_rows
            .as_deref()?
            .parse()
            .ok()
    }
}

/// Appends a table to `project.dataset.table` with a load job
pub struct BigQuerySink {
    client: HttpClient,
    project: String,
    dataset: String,
    table: String,
    field_name: Regex,
    poll_interval: Duration,
}

impl BigQuerySink {
    pub fn try_new(credentials: &Credentials, table: &str) -> Result<Self> {
        let base = Url::parse(DEFAULT_BASE_URL)?;
        Self::with_base_url(credentials, table, base)
    }

    /// Build a sink against another API root (an emulator, for instance)
    pub fn with_base_url(credentials: &Credentials, table: &str, base: Url) -> Result<Self> {
        let project = credentials.require(Backend::BigQuery, "project_id")?;
        let dataset = credentials.require(Backend::BigQuery, "dataset_id")?;
        let token = credentials.require(Backend::BigQuery, "token")?;

        let field_name = pattern(FIELD_NAME_PATTERN)?;
        if !pattern(DATASET_ID_PATTERN)?.is_match(dataset) {
            return Err(EtlError::InvalidArgument(format!("invalid dataset id '{}'", dataset)).into());
        }
        if !field_name.is_match(table) {
            return Err(EtlError::InvalidArgument(format!("invalid table name '{}'", table)).into());
        }

        let client = HttpClient::try_new(base, Auth::Bearer(token.to_string()), &[])?;
        Ok(Self {
            client,
            project: project.to_string(),
            dataset: dataset.to_string(),
            table: table.to_string(),
            field_name,
            poll_interval: Duration::from_secs(1),
        })
    }

    /// Fully qualified `project.dataset.table`
    pub fn table_id(&self) -> String {
        format!("{}.{}.{}", self.project, self.dataset, self.table)
    }

    fn job_config(&self, table: &Table) -> Result<Value> {
        let mut fields = Vec::with_capacity(table.num_columns());
        for column in table.columns() {
            if !self.field_name.is_match(&column.name) {
                return Err(EtlError::InvalidArgument(format!(
                    "'{}' is not a valid BigQuery column name",
                    column.name
                ))
                .into());
            }
            fields.push(json!({
                "name": column.name,
                "type": field_type(column.kind()),
                "mode": "NULLABLE",
            }));
        }

        Ok(json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project,
                        "datasetId": self.dataset,
                        "tableId": self.table,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "schema": { "fields": fields },
                    "createDisposition": "CREATE_IF_NEEDED",
                    "writeDisposition": "WRITE_APPEND",
                }
            }
        }))
    }

    async fn submit(&self, table: &Table) -> Result<Job> {
        let boundary = format!("stagehand-{}", uuid::Uuid::new_v4().simple());
        let config = serde_json::to_vec(&self.job_config(table)?)?;
        let data = Format::Json.encode(table)?;

        let mut body = Vec::with_capacity(config.len() + data.len() + 256);
        body.extend_from_slice(
            format!("--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n")
                .as_bytes(),
        );
        body.extend_from_slice(&config);
        body.extend_from_slice(
            format!("\r\n--{boundary}\r\nContent-Type: application/octet-stream\r\n\r\n").as_bytes(),
        );
        body.extend_from_slice(&data);
        body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

        let path = format!(
            "upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.project
        );
        let response = self
            .client
            .post_bytes(
                &path,
                &format!("multipart/related; boundary={}", boundary),
                body,
            )
            .await
            .wrap_err("Failed to submit BigQuery load job")?;
        job_body(response).await
    }

    async fn wait(&self, mut job: Job) -> Result<Job> {
        loop {
            if job.is_done() {
                return Ok(job);
            }
            let job_id = job.job_reference.job_id.clone();
            let mut path = format!("bigquery/v2/projects/{}/jobs/{}", self.project, job_id);
            if let Some(location) = &job.job_reference.location {
                path.push_str(&format!("?location={}", location));
            }

            log::debug!("Job {} is {}", job_id, job.status.state);
            tokio::time::sleep(self.poll_interval).await;
            let response = self
                .client
                .get(&path)
                .await
                .with_context(|| format!("Failed to poll BigQuery job {}", job_id))?;
            job = job_body(response).await?;
        }
    }
}

fn field_type(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::Int => "INTEGER",
        ColumnKind::Float => "FLOAT",
        ColumnKind::Bool => "BOOLEAN",
        ColumnKind::Str | ColumnKind::Null => "STRING",
    }
}

fn write_failure(detail: String) -> EtlError {
    EtlError::RemoteWriteFailure {
        backend: Backend::BigQuery.to_string(),
        detail,
    }
}

/// Decode a job resource, turning API errors into write failures
async fn job_body(response: Response) -> Result<Job> {
    let status = response.status();
    let text = response
        .text()
        .await
        .wrap_err("Failed to read BigQuery response")?;
    if !status.is_success() {
        let detail = serde_json::from_str::<ErrorEnvelope>(&text)
            .map(|body| body.error.message)
            .ok()
            .filter(|message| !message.is_empty())
            .unwrap_or_else(|| format!("HTTP {}: {}", status, text.trim()));
        return Err(write_failure(detail).into());
    }
    serde_json::from_str(&text).wrap_err("BigQuery returned a body that is not a job")
}

#[async_trait]
impl Loader for BigQuerySink {
    fn target(&self) -> String {
        format!("bigquery -> {}", self.table_id())
    }

    async fn load(&self, table: &Table) -> Result<usize> {
        let job = self.submit(table).await?;
        let job = self.wait(job).await?;

        if let Some(error) = job.status.error_result {
            let detail = match error.message.is_empty() {
                true => "load job failed".to_string(),
                false => error.message,
            };
            return Err(write_failure(detail).into());
        }

        Ok(job.output_rows().unwrap_or(table.num_rows()))
    }
}
