//! Cohort specification command-line interface

use clap::{Args, Parser, Subcommand};
use cohortspec::cli::load::LoadOptions;
use cohortspec::cli::output::{self, ColorMode, OutputFormat};
use cohortspec::cli::{codelists, columns, inspect, validate};
use std::path::PathBuf;

/// Cohort specification command-line tool
#[derive(Parser)]
#[command(name = "cohortspec")]
#[command(author, version, about = "Load, validate and inspect cohort specification documents", long_about = None)]
struct Cli {
    /// Verbose output (repeat for debug logging)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Output format
    #[arg(short = 'f', long, value_enum, global = true)]
    format: Option<OutputFormat>,

    /// Output file (default: stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Color output
    #[arg(long, value_enum, default_value_t = ColorMode::Auto, global = true)]
    color: ColorMode,

    #[command(subcommand)]
    command: Commands,
}

/// Options controlling how documents are loaded
#[derive(Args)]
struct LoadArgs {
    /// Extra directories searched for codelist CSV files
    #[arg(short = 'L', long = "codelist-path")]
    codelist_paths: Vec<PathBuf>,

    /// Date `today` resolves to (YYYY-MM-DD, default: the current date)
    #[arg(long)]
    today: Option<String>,
}

impl LoadArgs {
    fn into_options(self, strict: bool) -> LoadOptions {
        LoadOptions {
            codelist_paths: self.codelist_paths,
            today: self.today,
            strict,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate cohort specification documents
    Validate {
        /// Documents to validate
        files: Vec<PathBuf>,

        /// Strict mode (warnings as errors)
        #[arg(short, long)]
        strict: bool,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// Show a loaded study
    Inspect {
        /// Document to inspect
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// List the output columns of a study
    Columns {
        /// Document to read
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },

    /// List the codelists of a study
    Codelists {
        /// Document to read
        file: PathBuf,

        #[command(flatten)]
        load: LoadArgs,
    },
}

fn init_logging(verbosity: u8) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

#[tokio::main]
async fn main() {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    output::setup_colors(cli.color);
    init_logging(cli.verbose);

    let verbose = cli.verbose > 0;
    let format = cli.format.unwrap_or_default();

    let result = match cli.command {
        Commands::Validate { files, strict, load } => {
            let config = validate::ValidateConfig {
                files,
                options: load.into_options(strict),
                verbose,
                output_format: cli.format,
                output_file: cli.output,
            };
            validate::validate(config).await
        }

        Commands::Inspect { file, load } => {
            let config = inspect::InspectConfig {
                file,
                options: load.into_options(false),
                verbose,
                output_format: format,
                output_file: cli.output,
            };
            inspect::inspect(config).await
        }

        Commands::Columns { file, load } => {
            let config = columns::ColumnsConfig {
                file,
                options: load.into_options(false),
                verbose,
                output_format: format,
                output_file: cli.output,
            };
            columns::columns(config).await
        }

        Commands::Codelists { file, load } => {
            let config = codelists::CodelistsConfig {
                file,
                options: load.into_options(false),
                verbose,
                output_format: format,
                output_file: cli.output,
            };
            codelists::codelists(config).await
        }
    };

    if let Err(e) = result {
        eprintln!("{}", output::format_error(&e));
        std::process::exit(1);
    }
}
