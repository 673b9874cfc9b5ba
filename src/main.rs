use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use sqlizer::config::{default_config_path, DbConfig};
use sqlizer::error::SqlizerError;
use sqlizer::introspect::DEFAULT_LOOKUP_CATALOG;
use sqlizer::prompt::{ask_init_answers, PasswordSource};

#[derive(Parser, Debug)]
#[command(name = "sqlizer")]
#[command(version, about = "sqlizer generates Rust types from your SQL Server tables", long_about = None)]
struct Cli {
    /// Config file path (default: ~/.sqlizer.yaml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to .env file with DB_* overrides
    #[arg(long, global = true, default_value = "./.env")]
    env_file: PathBuf,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Manage sqlizer config
    #[command(subcommand)]
    Config(ConfigCommand),

    /// Read a table's structure and generate a Rust type for it
    ///
    /// Example: sqlizer generate -d {YourDatabase} -t {YourTable}
    Generate(GenerateArgs),
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Interactively write connection settings to the config file
    Init {
        /// Overwrite an existing config file
        #[arg(long)]
        force: bool,
    },
    /// Print the effective connection settings (password redacted)
    Show,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    /// The database name
    #[arg(short, long)]
    database: String,

    /// The target table
    #[arg(short, long)]
    table: String,

    /// Only read columns from this schema (e.g. dbo)
    #[arg(long)]
    schema: Option<String>,

    /// Catalog whose INFORMATION_SCHEMA.TABLES is checked for the table
    #[arg(long, default_value = DEFAULT_LOOKUP_CATALOG)]
    lookup_catalog: String,

    /// Directory the per-table output directory is created in
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,
}

fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(e) = run(cli) {
        match e.downcast_ref::<SqlizerError>() {
            Some(err) => {
                error!("While {}: {:#}", err.phase(), e);
                if err.is_partial_write() {
                    warn!("The formatted file was left on disk without import normalization");
                }
            }
            None => error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    info!("sqlizer v{}", env!("CARGO_PKG_VERSION"));

    let config_path = match cli.config {
        Some(path) => path,
        None => default_config_path()?,
    };
    debug!(config = ?config_path, env_file = ?cli.env_file, "Config locations");

    match cli.command {
        Command::Config(ConfigCommand::Init { force }) => config_init(&config_path, force),
        Command::Config(ConfigCommand::Show) => config_show(&config_path, &cli.env_file),
        Command::Generate(args) => {
            let config = DbConfig::load(&config_path, &cli.env_file)
                .context("Failed to load database configuration")?;
            debug!(connection = ?config.redacted_connection_string(), "Loaded configuration");

            let path = generate(&config, &args)?;
            println!("{}", path.display());
            Ok(())
        }
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");
}

fn config_init(config_path: &Path, force: bool) -> Result<()> {
    if config_path.exists() && !force {
        return Err(SqlizerError::Config(format!(
            "Config file {} already exists (use --force to overwrite)",
            config_path.display()
        ))
        .into());
    }

    let stdin = io::stdin();
    let password_source = if stdin.is_terminal() {
        PasswordSource::Terminal
    } else {
        PasswordSource::Input
    };
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let answers = ask_init_answers(&mut input, &mut output, password_source)?;

    answers
        .into_config_file()
        .save_new(config_path, force)
        .context("Failed to write config")?;

    info!(path = ?config_path, "Config written");
    Ok(())
}

fn config_show(config_path: &Path, env_file: &Path) -> Result<()> {
    let config = DbConfig::load(config_path, env_file)
        .context("Failed to load database configuration")?;

    match &config.source {
        Some(source) => println!("config file: {}", source.display()),
        None => println!("config file: (none, environment only)"),
    }
    println!("connection:  {}", config.redacted_connection_string());
    Ok(())
}

#[cfg(feature = "mssql")]
fn generate(config: &DbConfig, args: &GenerateArgs) -> Result<PathBuf> {
    use sqlizer::codegen::{CodeGenConfig, RustGenerator};
    use sqlizer::introspect::{TableIntrospector, TableTarget};
    use sqlizer::MssqlExecutor;

    info!(
        database = ?args.database,
        table = ?args.table,
        output = ?args.output_dir,
        "Starting code generation"
    );

    let generator = RustGenerator::new()?;

    let executor = MssqlExecutor::connect(&config.params).with_context(|| {
        format!(
            "Failed to connect to SQL Server at {}",
            config.redacted_connection_string()
        )
    })?;

    let target = TableTarget::new(&args.database, &args.table)
        .with_lookup_catalog(&args.lookup_catalog)
        .with_schema(args.schema.clone());

    let mut introspector = TableIntrospector::new(executor);
    let path = sqlizer::pipeline::generate(
        &mut introspector,
        &target,
        &generator,
        &CodeGenConfig::new(args.output_dir.clone()),
    )?;

    Ok(path)
}

#[cfg(not(feature = "mssql"))]
fn generate(_config: &DbConfig, _args: &GenerateArgs) -> Result<PathBuf> {
    anyhow::bail!("SQL Server support not enabled. Rebuild with --features mssql")
}
