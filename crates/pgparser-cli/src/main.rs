use clap::{Parser, Subcommand};
use colored::Colorize;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pgparser_analysis::Analyzer;
use pgparser_core::{Config, ParseError, SchemaMap};
use pgparser_sql::parse_sql_with_options;

/// pgparser - PostgreSQL SQL to IR
#[derive(Parser)]
#[command(name = "pgparser")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to config file (default: pgparser.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pretty-print JSON output
    #[arg(short, long, global = true)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse the first statement into the IR
    Parse {
        /// SQL file to read (stdin when omitted or "-")
        input: Option<PathBuf>,
    },

    /// Parse and analyze the first statement
    Analyze {
        /// SQL file to read (stdin when omitted or "-")
        input: Option<PathBuf>,

        /// JSON schema map used for join relationship inference
        #[arg(short, long)]
        schema: Option<PathBuf>,
    },

    /// Write a default pgparser.toml
    InitConfig {
        /// Output path
        #[arg(default_value = "pgparser.toml")]
        output: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    let config = load_config(cli.config.as_deref(), cli.verbose)?;

    match cli.command {
        Commands::Parse { input } => parse_command(&config, input.as_deref(), cli.pretty),
        Commands::Analyze { input, schema } => {
            analyze_command(&config, input.as_deref(), schema.as_deref(), cli.pretty, cli.verbose)
        }
        Commands::InitConfig { output } => init_config_command(&output),
    }
}

fn load_config(path: Option<&Path>, verbose: bool) -> Result<Config> {
    let config = if let Some(config_path) = path {
        Config::from_file(config_path)?
    } else if Path::new("pgparser.toml").exists() {
        Config::from_file(Path::new("pgparser.toml"))?
    } else {
        if verbose {
            eprintln!("{}", "No config file found, using defaults".yellow());
        }
        Config::default()
    };

    if verbose {
        eprintln!(
            "{} recursion limit {}, ? placeholders {}",
            "Using".cyan(),
            config.parser.recursion_limit,
            config.parser.question_mark_placeholders
        );
    }

    Ok(config)
}

/// Parse command - print the IR as JSON
fn parse_command(config: &Config, input: Option<&Path>, pretty: bool) -> Result<()> {
    let sql = read_input(input)?;

    match parse_sql_with_options(&sql, config.parser.clone()) {
        Ok(ir) => print_json(&ir, pretty),
        Err(e) => fail(&e),
    }
}

/// Analyze command - print the IR plus conditions and join relationships
fn analyze_command(
    config: &Config,
    input: Option<&Path>,
    schema: Option<&Path>,
    pretty: bool,
    verbose: bool,
) -> Result<()> {
    let sql = read_input(input)?;

    let mut analyzer = Analyzer::from_config(config);
    if let Some(schema_path) = schema {
        if verbose {
            eprintln!("{} {}", "Loading schema from:".cyan(), schema_path.display());
        }

        let schema = SchemaMap::from_file(schema_path)
            .map_err(|e| anyhow::anyhow!("Failed to load schema: {}", e))?;
        analyzer = analyzer.with_schema(schema);
    }

    match analyzer.analyze(&sql) {
        Ok(result) => {
            if verbose {
                eprintln!(
                    "{} {} conditions, {} join relationships",
                    "Found".green(),
                    result.where_conditions.len(),
                    result.join_relationships.len()
                );
            }
            print_json(&result, pretty)
        }
        Err(e) => fail(&e),
    }
}

/// Init config command - write the default configuration
fn init_config_command(output: &Path) -> Result<()> {
    if output.exists() {
        return Err(anyhow::anyhow!("{} already exists", output.display()));
    }

    Config::default().save_to_file(output)?;
    eprintln!("{} {}", "Config written to:".green(), output.display());

    Ok(())
}

fn read_input(input: Option<&Path>) -> Result<String> {
    match input {
        Some(path) if path != Path::new("-") => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display())),
        _ => {
            let mut sql = String::new();
            std::io::stdin()
                .read_to_string(&mut sql)
                .context("Failed to read SQL from stdin")?;
            Ok(sql)
        }
    }
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };

    println!("{}", json);
    Ok(())
}

/// Print syntax errors and exit with a failure code
fn fail(error: &ParseError) -> ! {
    eprintln!("{}", "✗ Syntax error".red().bold());
    for e in error.errors() {
        eprintln!("  {} {}", format!("{}:{}", e.line, e.column).yellow(), e.message);
    }

    std::process::exit(1);
}
