//! Snowflake sink
//!
//! Logs in over the Snowflake REST protocol, then runs parameterized
//! multi-row `INSERT`s into `schema.table` inside an explicit transaction.

use super::Backend;
use super::ddl::{SqlValue, bind_rows};
use crate::client::{Auth, HttpClient};
use crate::credentials::Credentials;
use crate::error::EtlError;
use crate::etl::Loader;
use crate::table::Table;
use async_trait::async_trait;
use eyre::{Context, Result, eyre};
use regex::Regex;
use reqwest::Method;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use url::Url;

const DOMAIN: &str = "snowflakecomputing.com";
const CLIENT_APP_ID: &str = "stagehand";

/// Bind variables per statement
const MAX_BINDINGS: usize = 16_384;

/// Envelope of every Snowflake REST reply
#[derive(Debug, Deserialize)]
struct Reply {
    #[serde(default)]
    success: bool,
    message: Option<String>,
    #[serde(default)]
    data: Value,
}

#[derive(Debug, Deserialize)]
struct LoginData {
    token: String,
}

#[derive(Debug, Default, Deserialize)]
struct QueryData {
    #[serde(default)]
    rowset: Vec<Vec<Value>>,
}

impl QueryData {
    /// First cell of the first row; DML replies carry the affected row count there
    fn first_count(&self) -> Option<usize> {
        match self.rowset.first()?.first()? {
            Value::String(n) => n.parse().ok(),
            Value::Number(n) => n.as_u64().map(|n| n as usize),
            _ => None,
        }
    }
}

/// Inserts a table into an existing Snowflake table
pub struct SnowflakeSink {
    base: Url,
    account: String,
    user: String,
    password: String,
    database: String,
    schema: String,
    table: String,
}

impl SnowflakeSink {
    pub fn try_new(credentials: &Credentials, table: &str) -> Result<Self> {
        let account = credentials.require(Backend::Snowflake, "account")?;
        let base = account_url(account)?;
        Self::with_base_url(credentials, table, base)
    }

    /// Build a sink against an explicit service root
    pub fn with_base_url(credentials: &Credentials, table: &str, base: Url) -> Result<Self> {
        let field = |name: &str| credentials.require(Backend::Snowflake, name).map(str::to_string);
        Ok(Self {
            base,
            account: account_name(&field("account")?),
            user: field("user")?,
            password: field("password")?,
            database: field("database")?,
            schema: field("schema")?,
            table: table.to_string(),
        })
    }

    /// `schema.table`, quoting parts that are not plain identifiers
    fn qualified_table(&self, plain: &Regex) -> String {
        format!(
            "{}.{}",
            identifier(plain, &self.schema),
            identifier(plain, &self.table)
        )
    }

    async fn login(&self) -> Result<Session> {
        let client = HttpClient::try_new(self.base.clone(), Auth::None, &[])?;
        let mut url = client.endpoint("session/v1/login-request")?;
        url.query_pairs_mut()
            .append_pair("databaseName", &self.database)
            .append_pair("schemaName", &self.schema);

        let body = json!({
            "data": {
                "CLIENT_APP_ID": CLIENT_APP_ID,
                "CLIENT_APP_VERSION": env!("CARGO_PKG_VERSION"),
                "ACCOUNT_NAME": self.account,
                "LOGIN_NAME": self.user,
                "PASSWORD": self.password,
            }
        });
        log::debug!("Logging in to {} as {}", self.base, self.user);
        let response = client
            .request(
                Method::POST,
                url,
                Some("application/json"),
                Some(serde_json::to_vec(&body)?),
            )
            .await
            .wrap_err("Failed to reach Snowflake login endpoint")?;
        let reply = reply_body(response).await?;

        let login: LoginData = serde_json::from_value(reply.data)
            .map_err(|_| write_failure("login response has no session token".to_string()))?;
        let token = login.token;
        let headers = [("Accept".to_string(), "application/snowflake".to_string())];
        let client = HttpClient::try_new(
            self.base.clone(),
            Auth::Snowflake(token),
            &headers,
        )?;
        Ok(Session {
            client,
            sequence: 0,
        })
    }
}

/// Service root for an account locator or host name
fn account_url(account: &str) -> Result<Url> {
    let host = if account.contains(DOMAIN) {
        account.to_string()
    } else {
        format!("{}.{}", account, DOMAIN)
    };
    Url::parse(&format!("https://{}/", host))
        .map_err(|e| EtlError::InvalidArgument(format!("account '{}': {}", account, e)).into())
}

/// Account name sent at login: the first label of the locator
fn account_name(account: &str) -> String {
    account
        .split('.')
        .next()
        .unwrap_or(account)
        .to_uppercase()
}

fn identifier(plain: &Regex, name: &str) -> String {
    if plain.is_match(name) {
        name.to_string()
    } else {
        format!("\"{}\"", name.replace('"', "\"\""))
    }
}

/// Snowflake binding for one value
fn binding(value: SqlValue) -> Value {
    let (kind, text) = match value {
        SqlValue::Int(v) => ("FIXED", v.map(|i| i.to_string())),
        SqlValue::Float(v) => ("REAL", v.map(|f| f.to_string())),
        SqlValue::Bool(v) => ("BOOLEAN", v.map(|b| b.to_string())),
        SqlValue::Text(v) => ("TEXT", v),
    };
    json!({ "type": kind, "value": text })
}

fn write_failure(detail: String) -> EtlError {
    EtlError::RemoteWriteFailure {
        backend: Backend::Snowflake.to_string(),
        detail,
    }
}

/// Decode a Snowflake reply, turning `success: false` into a write failure
async fn reply_body(response: reqwest::Response) -> Result<Reply> {
    let status = response.status();
    let text = response
        .text()
        .await
        .wrap_err("Failed to read Snowflake response")?;
    let body: Reply = match serde_json::from_str(&text) {
        Ok(body) => body,
        Err(_) if !status.is_success() => {
            return Err(write_failure(format!("HTTP {}: {}", status, text.trim())).into());
        }
        Err(e) => return Err(eyre!("Snowflake returned a body that is not JSON: {}", e)),
    };
    if !status.is_success() || !body.success {
        let detail = body
            .message
            .unwrap_or_else(|| format!("HTTP {}", status));
        return Err(write_failure(detail).into());
    }
    Ok(body)
}

/// An authenticated Snowflake session
struct Session {
    client: HttpClient,
    sequence: u64,
}

impl Session {
    async fn execute(&mut self, sql: &str, bindings: Option<Map<String, Value>>) -> Result<Reply> {
        self.sequence += 1;
        let mut url = self.client.endpoint("queries/v1/query-request")?;
        url.query_pairs_mut()
            .append_pair("requestId", &uuid::Uuid::new_v4().to_string());

        let mut body = json!({
            "sqlText": sql,
            "sequenceId": self.sequence,
            "asyncExec": false,
        });
        if let Some(bindings) = bindings {
            body["bindings"] = Value::Object(bindings);
        }

        log::trace!("Snowflake query {}: {}", self.sequence, sql);
        let response = self
            .client
            .request(
                Method::POST,
                url,
                Some("application/json"),
                Some(serde_json::to_vec(&body)?),
            )
            .await
            .wrap_err("Failed to reach Snowflake query endpoint")?;
        reply_body(response).await
    }

    async fn insert_all(&mut self, target: &str, columns: &[String], table: &Table) -> Result<usize> {
        let width = columns.len();
        let batch = (MAX_BINDINGS / width.max(1)).max(1);
        let tuple = format!("({})", vec!["?"; width].join(", "));

        let mut written = 0;
        let mut start = 0;
        while start < table.num_rows() {
            let end = (start + batch).min(table.num_rows());
            let sql = format!(
                "INSERT INTO {} ({}) VALUES {}",
                target,
                columns.join(", "),
                vec![tuple.as_str(); end - start].join(", ")
            );
            let bindings: Map<String, Value> = bind_rows(table, start, end)
                .into_iter()
                .enumerate()
                .map(|(i, value)| ((i + 1).to_string(), binding(value)))
                .collect();

            let reply = self.execute(&sql, Some(bindings)).await?;
            let data: QueryData = serde_json::from_value(reply.data).unwrap_or_default();
            written += data.first_count().unwrap_or(end - start);
            start = end;
        }
        Ok(written)
    }
}

#[async_trait]
impl Loader for SnowflakeSink {
    fn target(&self) -> String {
        format!("snowflake -> {}.{}", self.schema, self.table)
    }

    async fn load(&self, table: &Table) -> Result<usize> {
        if table.num_columns() == 0 {
            return Err(EtlError::MalformedInput("table has no columns to load".to_string()).into());
        }
        let plain = Regex::new(r"^[A-Za-z_][A-Za-z0-9_$]*$")
            .map_err(|e| eyre!("Invalid identifier pattern: {}", e))?;
        let target = self.qualified_table(&plain);
        let columns: Vec<String> = table
            .column_names()
            .into_iter()
            .map(|c| identifier(&plain, c))
            .collect();

        let mut session = self.login().await?;
        session.execute("BEGIN", None).await?;
        match session.insert_all(&target, &columns, table).await {
            Ok(written) => {
                session.execute("COMMIT", None).await?;
                Ok(written)
            }
            Err(e) => {
                if let Err(rollback) = session.execute("ROLLBACK", None).await {
                    log::warn!("Rollback failed: {:#}", rollback);
                }
                Err(e)
            }
        }
    }
}
