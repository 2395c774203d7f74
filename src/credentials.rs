//! Backend credentials and where they come from
//!
//! Values are taken, in order, from what the caller supplied (command-line
//! flags), from `STAGEHAND_<FIELD>` environment variables, and then either
//! from an interactive prompt or, when prompting is not allowed, from the
//! field's default. Anything still missing is reported as
//! `MissingCredentials`.

use crate::error::EtlError;
use crate::load::Backend;
use eyre::{Context, Result, bail};
use owo_colors::OwoColorize;
use std::collections::BTreeMap;
use std::io::{self, BufRead, Write};

/// Prefix of credential environment variables
pub const ENV_PREFIX: &str = "STAGEHAND_";

/// Description of one credential a backend needs
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub prompt: &'static str,
    pub default: Option<&'static str>,
    pub secret: bool,
}

impl FieldSpec {
    const fn new(name: &'static str, prompt: &'static str) -> Self {
        Self {
            name,
            prompt,
            default: None,
            secret: false,
        }
    }

    const fn defaulting(mut self, default: &'static str) -> Self {
        self.default = Some(default);
        self
    }

    const fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    /// Environment variable consulted for this field
    pub fn env_var(&self) -> String {
        format!("{}{}", ENV_PREFIX, self.name.to_uppercase())
    }

    /// Prompt line; secret defaults are never shown
    fn label(&self) -> String {
        match self.default.filter(|_| !self.secret) {
            Some(default) => format!("{} [{}]: ", self.prompt.bold(), default),
            None => format!("{}: ", self.prompt.bold()),
        }
    }
}

/// Field definitions shared by the backends
pub mod fields {
    use super::FieldSpec;

    pub const HOST: FieldSpec = FieldSpec::new("host", "Database host").defaulting("localhost");
    pub const POSTGRES_PORT: FieldSpec = FieldSpec::new("port", "Port").defaulting("5432");
    pub const MYSQL_PORT: FieldSpec = FieldSpec::new("port", "Port").defaulting("3306");
    pub const DATABASE: FieldSpec = FieldSpec::new("database", "Database name");
    pub const USER: FieldSpec = FieldSpec::new("user", "Username");
    pub const PASSWORD: FieldSpec = FieldSpec::new("password", "Password").secret();
    pub const SCHEMA: FieldSpec = FieldSpec::new("schema", "Schema");
    pub const SQLITE_FILE: FieldSpec =
        FieldSpec::new("database", "SQLite file path").defaulting("data_eng.sqlite");
    pub const DUCKDB_FILE: FieldSpec =
        FieldSpec::new("database", "DuckDB file path").defaulting("data_eng.duckdb");
    pub const PROJECT_ID: FieldSpec = FieldSpec::new("project_id", "GCP project ID");
    pub const DATASET_ID: FieldSpec = FieldSpec::new("dataset_id", "BigQuery dataset ID");
    pub const TOKEN: FieldSpec = FieldSpec::new("token", "OAuth access token").secret();
    pub const ACCOUNT: FieldSpec =
        FieldSpec::new("account", "Snowflake account (e.g. xyz123.snowflakecomputing.com)");
}

/// Credential values keyed by field name.
///
/// `Debug` output masks `password` and `token`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    values: BTreeMap<String, String>,
}

impl Credentials {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, ignoring `None` and empty strings
    pub fn set(&mut self, name: &str, value: Option<impl Into<String>>) {
        if let Some(value) = value.map(Into::into).filter(|v: &String| !v.is_empty()) {
            self.values.insert(name.to_string(), value);
        }
    }

    pub fn with(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set(name, Some(value));
        self
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// A value `backend` cannot work without
    pub fn require(&self, backend: Backend, name: &str) -> Result<&str> {
        self.get(name).ok_or_else(|| {
            EtlError::MissingCredentials {
                backend: backend.to_string(),
                fields: vec![name.to_string()],
            }
            .into()
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let masked: BTreeMap<&str, &str> = self
            .values
            .iter()
            .map(|(k, v)| {
                let shown = if is_secret(k) { "***" } else { v.as_str() };
                (k.as_str(), shown)
            })
            .collect();
        f.debug_tuple("Credentials").field(&masked).finish()
    }
}

fn is_secret(name: &str) -> bool {
    matches!(name, "password" | "token")
}

/// Asks the user for a credential value
pub trait Prompter: Send + Sync {
    fn prompt(&self, field: &FieldSpec) -> Result<String>;
}

type VisibleReader = Box<dyn Fn(&str) -> io::Result<Option<String>> + Send + Sync>;
type HiddenReader = Box<dyn Fn(&str) -> io::Result<String> + Send + Sync>;

/// Asks on the terminal.
///
/// Ordinary fields echo as typed, prompted on stderr and read from stdin.
/// Secret fields are read through `rpassword` with echo turned off.
pub struct TerminalPrompter {
    visible: VisibleReader,
    hidden: HiddenReader,
}

impl TerminalPrompter {
    pub fn new() -> Self {
        Self {
            visible: Box::new(read_visible),
            hidden: Box::new(|label: &str| rpassword::prompt_password(label)),
        }
    }

    /// One answer, or `None` once input is closed
    fn read(&self, field: &FieldSpec) -> Result<Option<String>> {
        let label = field.label();
        let answer = match field.secret {
            true => Some((self.hidden)(&label)?),
            false => (self.visible)(&label)?,
        };
        Ok(answer)
    }
}

impl Default for TerminalPrompter {
    fn default() -> Self {
        Self::new()
    }
}

fn read_visible(label: &str) -> io::Result<Option<String>> {
    let mut stderr = io::stderr();
    write!(stderr, "{}", label)?;
    stderr.flush()?;

    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim_end_matches(['\r', '\n']).to_string()))
}

impl Prompter for TerminalPrompter {
    fn prompt(&self, field: &FieldSpec) -> Result<String> {
        loop {
            let answer = self
                .read(field)
                .with_context(|| format!("Failed to read {}", field.name))?;
            let Some(answer) = answer else {
                bail!("Input closed while asking for {}", field.name);
            };

            match (answer.is_empty(), field.default) {
                (false, _) => return Ok(answer),
                (true, Some(default)) => return Ok(default.to_string()),
                (true, None) => continue,
            }
        }
    }
}

/// Where missing credential values may come from
pub enum CredentialSource {
    /// Only supplied values, environment variables and defaults
    NonInteractive,
    /// Ask for anything not supplied
    Interactive(Box<dyn Prompter>),
}

impl CredentialSource {
    /// Prompt on the terminal
    pub fn terminal() -> Self {
        Self::Interactive(Box::new(TerminalPrompter::new()))
    }

    /// Fill in every field `backend` needs, or name the ones that are missing
    pub fn resolve(&self, backend: Backend, supplied: Credentials) -> Result<Credentials> {
        let mut resolved = Credentials::new();
        let mut missing = Vec::new();

        for field in backend.credential_fields() {
            let value = supplied
                .get(field.name)
                .map(str::to_string)
                .or_else(|| std::env::var(field.env_var()).ok().filter(|v| !v.is_empty()));

            let value = match (value, self) {
                (Some(value), _) => Some(value),
                (None, Self::Interactive(prompter)) => Some(prompter.prompt(field)?),
                (None, Self::NonInteractive) => field.default.map(str::to_string),
            };

            match value {
                Some(value) => resolved.set(field.name, Some(value)),
                None => missing.push(field.name.to_string()),
            }
        }

        if !missing.is_empty() {
            return Err(EtlError::MissingCredentials {
                backend: backend.to_string(),
                fields: missing,
            }
            .into());
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::classify;
    use serial_test::serial;
    use std::sync::{Arc, Mutex};

    /// Answers prompts from a fixed list and records what was asked
    struct ScriptedPrompter {
        answers: Mutex<Vec<String>>,
        asked: Mutex<Vec<String>>,
    }

    impl ScriptedPrompter {
        fn new(answers: &[&str]) -> Self {
            Self {
                answers: Mutex::new(answers.iter().rev().map(|s| s.to_string()).collect()),
                asked: Mutex::new(Vec::new()),
            }
        }
    }

    impl Prompter for Arc<ScriptedPrompter> {
        fn prompt(&self, field: &FieldSpec) -> Result<String> {
            self.asked.lock().unwrap().push(field.name.to_string());
            self.answers
                .lock()
                .unwrap()
                .pop()
                .ok_or_else(|| eyre::eyre!("no scripted answer"))
        }
    }

    fn clear_env() {
        for backend in Backend::ALL {
            for field in backend.credential_fields() {
                // SAFETY: tests touching the environment run serially
                unsafe { std::env::remove_var(field.env_var()) };
            }
        }
    }

    #[test]
    #[serial]
    fn test_non_interactive_names_missing_fields() {
        clear_env();
        let supplied = Credentials::new().with("user", "admin");
        let err = CredentialSource::NonInteractive
            .resolve(Backend::Postgres, supplied)
            .unwrap_err();
        match classify(&err) {
            Some(EtlError::MissingCredentials { backend, fields }) => {
                assert_eq!(backend, "postgres");
                assert_eq!(fields, &vec!["database".to_string(), "password".to_string()]);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    #[serial]
    fn test_defaults_fill_non_interactive() {
        clear_env();
        let creds = CredentialSource::NonInteractive
            .resolve(Backend::Sqlite, Credentials::new())
            .unwrap();
        assert_eq!(creds.get("database"), Some("data_eng.sqlite"));
    }

    #[test]
    #[serial]
    fn test_env_fallback() {
        clear_env();
        // SAFETY: tests touching the environment run serially
        unsafe { std::env::set_var("STAGEHAND_DATABASE", "/tmp/from-env.duckdb") };
        let creds = CredentialSource::NonInteractive
            .resolve(Backend::DuckDb, Credentials::new())
            .unwrap();
        assert_eq!(creds.get("database"), Some("/tmp/from-env.duckdb"));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_prompts_only_for_missing() {
        clear_env();
        let prompter = Arc::new(ScriptedPrompter::new(&["db", "secret"]));
        let source = CredentialSource::Interactive(Box::new(prompter.clone()));
        let supplied = Credentials::new()
            .with("host", "pg.internal")
            .with("port", "6543")
            .with("user", "etl");

        let creds = source.resolve(Backend::Postgres, supplied).unwrap();
        assert_eq!(creds.get("database"), Some("db"));
        assert_eq!(creds.get("password"), Some("secret"));
        assert_eq!(creds.get("port"), Some("6543"));
        assert_eq!(*prompter.asked.lock().unwrap(), vec!["database", "password"]);
    }

    #[test]
    fn test_debug_masks_secrets() {
        let creds = Credentials::new()
            .with("user", "admin")
            .with("password", "hunter2");
        let shown = format!("{:?}", creds);
        assert!(shown.contains("admin"));
        assert!(!shown.contains("hunter2"));
    }

    #[test]
    fn test_require_names_backend() {
        let err = Credentials::new()
            .require(Backend::Snowflake, "account")
            .unwrap_err();
        assert_eq!(err.to_string(), "missing credentials for snowflake: account");
    }

    fn recording_prompter(log: Arc<Mutex<Vec<String>>>) -> TerminalPrompter {
        let visible_log = log.clone();
        TerminalPrompter {
            visible: Box::new(move |label: &str| {
                visible_log.lock().unwrap().push(format!("visible {}", label));
                Ok(Some(String::new()))
            }),
            hidden: Box::new(move |label: &str| {
                log.lock().unwrap().push(format!("hidden {}", label));
                Ok("s3cret".to_string())
            }),
        }
    }

    #[test]
    fn test_terminal_reads_secrets_without_echo() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let prompter = recording_prompter(log.clone());

        assert_eq!(prompter.prompt(&fields::PASSWORD).unwrap(), "s3cret");
        assert_eq!(prompter.prompt(&fields::TOKEN).unwrap(), "s3cret");
        assert_eq!(prompter.prompt(&fields::HOST).unwrap(), "localhost");

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 3);
        assert!(log[0].starts_with("hidden ") && log[0].contains("Password"));
        assert!(log[1].starts_with("hidden ") && log[1].contains("OAuth access token"));
        assert!(log[2].starts_with("visible ") && log[2].contains("[localhost]"));
    }

    #[test]
    fn test_terminal_input_closed() {
        let prompter = TerminalPrompter {
            visible: Box::new(|_: &str| Ok(None)),
            hidden: Box::new(|_: &str| Err(io::Error::from(io::ErrorKind::UnexpectedEof))),
        };
        let err = prompter.prompt(&fields::USER).unwrap_err();
        assert!(err.to_string().contains("Input closed"));
        assert!(prompter.prompt(&fields::PASSWORD).is_err());
    }

    #[test]
    fn test_empty_values_ignored() {
        let mut creds = Credentials::new();
        creds.set("user", Some(""));
        creds.set("host", None::<String>);
        assert!(!creds.contains("user"));
        assert!(!creds.contains("host"));
    }
}
