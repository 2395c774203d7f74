use clap::{Args, Parser, Subcommand, builder::styling};
use eyre::Result;
use owo_colors::OwoColorize;
use stagehand::{
    Credentials, Format, StagingConfig, cli,
    config::load_env_file,
    load::{DEFAULT_TABLE, LoadRequest},
    transform::{RenamePair, TransformOptions},
};
use std::path::PathBuf;
use std::process::ExitCode;

// CLI Styling
const STYLES: styling::Styles = styling::Styles::styled()
    .header(styling::AnsiColor::BrightWhite.on_default())
    .usage(styling::AnsiColor::BrightWhite.on_default())
    .literal(styling::AnsiColor::Green.on_default())
    .placeholder(styling::AnsiColor::Cyan.on_default());

/// Stagehand: extract tables into a staging directory, transform them, and load them into databases
#[derive(Parser)]
#[command(name = "stagehand", version, styles = STYLES)]
struct Cli {
    /// The dotenv file to source settings and credentials from
    #[arg(short, long, global = true, default_value = ".env")]
    env: String,

    /// Directory holding staged files [env: STAGEHAND_STAGING_DIR] [default: temp_data]
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,

    /// More verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Never prompt for credentials
    #[arg(long, global = true)]
    no_input: bool,

    /// Command to execute
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stage a CSV, JSON or Parquet file
    ExtractFile {
        /// File to extract
        path: PathBuf,
    },

    /// Stage every CSV, JSON and Parquet file in a directory
    ExtractDirectory {
        /// Directory to scan (not recursive)
        dir: PathBuf,
    },

    /// Fetch a URL and stage the response as api_data.<format>
    ExtractApi {
        /// URL to fetch with GET
        url: String,

        /// How to decode the response body
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,

        /// Extra request header, as 'Name: value' (repeatable)
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },

    /// Transform a staged file into transformed_<filename>
    Transform {
        /// Staged filename to transform
        filename: String,

        /// Drop rows with any missing value
        #[arg(long)]
        dropna: bool,

        /// Rename a column, as old:new (repeatable)
        #[arg(long, value_name = "OLD:NEW")]
        rename: Vec<RenamePair>,

        /// Keep rows where this column...
        #[arg(long, requires = "filter_val")]
        filter_col: Option<String>,

        /// ...equals this value
        #[arg(long, requires = "filter_col")]
        filter_val: Option<String>,

        /// Fail when a renamed column does not exist
        #[arg(long)]
        strict: bool,
    },

    /// Load a file or staged file into a database
    LoadData(LoadArgs),

    /// List staged files
    List,
}

#[derive(Args)]
struct LoadArgs {
    /// File path, or the name of a staged file
    filename: String,

    /// postgres, mysql, sqlite, duckdb, bigquery or snowflake
    backend: String,

    /// Target table name
    #[arg(long, default_value = DEFAULT_TABLE)]
    table: String,

    /// Database host
    #[arg(long)]
    host: Option<String>,

    /// Database port
    #[arg(long)]
    port: Option<u16>,

    /// Database name, or file path for sqlite and duckdb
    #[arg(long)]
    database: Option<String>,

    /// Database username
    #[arg(long)]
    user: Option<String>,

    /// Database password
    #[arg(long)]
    password: Option<String>,

    /// Schema name (Snowflake)
    #[arg(long)]
    schema: Option<String>,

    /// Account locator (Snowflake)
    #[arg(long)]
    account: Option<String>,

    /// GCP project ID (BigQuery)
    #[arg(long)]
    project: Option<String>,

    /// Dataset ID (BigQuery)
    #[arg(long)]
    dataset: Option<String>,

    /// OAuth access token (BigQuery)
    #[arg(long)]
    token: Option<String>,
}

impl LoadArgs {
    fn credentials(&self) -> Credentials {
        let mut credentials = Credentials::new();
        credentials.set("host", self.host.clone());
        credentials.set("port", self.port.map(|p| p.to_string()));
        credentials.set("database", self.database.clone());
        credentials.set("user", self.user.clone());
        credentials.set("password", self.password.clone());
        credentials.set("schema", self.schema.clone());
        credentials.set("account", self.account.clone());
        credentials.set("project_id", self.project.clone());
        credentials.set("dataset_id", self.dataset.clone());
        credentials.set("token", self.token.clone());
        credentials
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let env_loaded = load_env_file(&cli.env);

    let log_level = match cli.debug {
        true => "debug",
        false => "info",
    };
    let env = env_logger::Env::default().filter_or("LOG_LEVEL", log_level);
    env_logger::Builder::from_env(env)
        .format_timestamp_millis()
        .init();

    let result = match env_loaded {
        Ok(_) => run(cli).await,
        Err(e) => Err(e),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = StagingConfig::resolve(cli.staging_dir, cli.no_input);
    let store = config.store();
    log::debug!("Staging directory: {}", store.root().display());

    match cli.command {
        Commands::ExtractFile { path } => {
            let staged = cli::extract_file(&store, &path).await?;
            log::info!(
                "Extracted {} to {}",
                path.display().bright_black(),
                staged.green()
            );
        }
        Commands::ExtractDirectory { dir } => {
            let staged = cli::extract_directory(&store, &dir).await?;
            log::info!(
                "Extracted {} file(s) from {}",
                staged.len().cyan(),
                dir.display().bright_black()
            );
        }
        Commands::ExtractApi {
            url,
            format,
            headers,
        } => {
            let staged = cli::extract_api(&store, &url, format, &headers).await?;
            log::info!("Extracted {} to {}", url.bright_black(), staged.green());
        }
        Commands::Transform {
            filename,
            dropna,
            rename,
            filter_col,
            filter_val,
            strict,
        } => {
            let options = TransformOptions {
                drop_missing: dropna,
                rename,
                strict_rename: strict,
                filter_column: filter_col,
                filter_value: filter_val,
            };
            let staged = cli::transform(&store, &filename, &options)?;
            log::info!("Transformed {} to {}", filename.bright_black(), staged.green());
        }
        Commands::LoadData(args) => {
            let request = LoadRequest {
                path: &args.filename,
                backend: &args.backend,
                table: &args.table,
                supplied: args.credentials(),
            };
            let report = cli::load_data(&store, request, &config.credential_source()).await?;
            log::info!(
                "Loaded {} row(s) into {}",
                report.rows_written.cyan(),
                report.target.green()
            );
        }
        Commands::List => {
            for staged in cli::list_staged(&store)? {
                println!("{}\t{}", staged.format.cyan(), staged.name);
            }
        }
    }

    Ok(())
}
