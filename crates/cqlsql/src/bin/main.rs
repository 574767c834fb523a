//! cqlsql command-line interface

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use cqlsql::Backend;
use cqlsql::cli::{compile, output, translate, validate};
use std::path::PathBuf;

/// CQL to SQL compiler
#[derive(Parser)]
#[command(name = "cqlsql")]
#[command(author, version, about = "Compile CQL measure libraries into SQL", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Compiler options (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Color output (auto, always, never)
    #[arg(long, default_value = "auto", global = true)]
    color: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a CQL file to SQL
    Compile {
        /// CQL file to compile
        file: PathBuf,

        /// Tree the SQL is generated from
        #[arg(short, long, value_enum)]
        backend: Option<Backend>,

        /// First day of the measurement period (YYYY-MM-DD)
        #[arg(long)]
        period_start: Option<NaiveDate>,

        /// Last day of the measurement period (YYYY-MM-DD)
        #[arg(long)]
        period_end: Option<NaiveDate>,
    },

    /// Validate CQL syntax, naming and references
    Validate {
        /// CQL files to validate
        files: Vec<PathBuf>,

        /// Strict mode (warnings as errors)
        #[arg(short, long)]
        strict: bool,
    },

    /// Print the intermediate representation as JSON
    Translate {
        /// CQL file to translate
        file: PathBuf,

        /// Pretty-print output
        #[arg(short, long)]
        pretty: bool,
    },
}

fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(&cli.color);

    let mut logger = env_logger::Builder::from_default_env();
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    let result = match cli.command {
        Commands::Compile {
            file,
            backend,
            period_start,
            period_end,
        } => compile::compile(compile::CompileConfig {
            file,
            config: cli.config,
            backend,
            period_start,
            period_end,
            output_file: cli.output,
            verbose: cli.verbose,
        }),

        Commands::Validate { files, strict } => validate::validate(validate::ValidateConfig {
            files,
            config: cli.config,
            strict,
            verbose: cli.verbose,
        }),

        Commands::Translate { file, pretty } => translate::translate(translate::TranslateConfig {
            file,
            pretty,
            output_file: cli.output,
        }),
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_is_accepted_by_every_command() {
        for args in [
            ["cqlsql", "compile", "m.cql", "--config", "opts.json"],
            ["cqlsql", "validate", "m.cql", "--config", "opts.json"],
            ["cqlsql", "--config", "opts.json", "translate", "m.cql"],
        ] {
            let cli = Cli::try_parse_from(args).unwrap();
            assert_eq!(cli.config, Some(PathBuf::from("opts.json")));
        }
    }

    #[test]
    fn test_compile_flags() {
        let cli = Cli::try_parse_from([
            "cqlsql", "compile", "m.cql", "-b", "ir", "--period-start", "2025-01-01",
        ])
        .unwrap();
        match cli.command {
            Commands::Compile {
                backend,
                period_start,
                ..
            } => {
                assert_eq!(backend, Some(Backend::Ir));
                assert_eq!(period_start, NaiveDate::from_ymd_opt(2025, 1, 1));
            }
            _ => panic!("expected compile"),
        }
    }
}
