//! Binary entry point for the boltline client.
#![forbid(unsafe_code)]

use std::io::IsTerminal;
use std::process;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use signal_hook::consts::{SIGINT, SIGTERM};

use boltline::config::{
    BoltConfig, CsvOptions, ImportMode, ImportOptions, OutputFormat, OutputOptions,
};
use boltline::error::{ClientError, Result};
use boltline::logging::init_logging;
use boltline::mode::repl::ReplOptions;
use boltline::mode::{parallel, parser, repl, serial};

#[derive(Parser, Debug)]
#[command(
    name = "boltline",
    version,
    about = "Bolt client for graph databases.\n\
             The client can be run in interactive or non-interactive mode.",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        default_value = "127.0.0.1",
        help = "Server address; may be a DNS resolvable hostname"
    )]
    host: String,

    #[arg(long, default_value_t = 7687, help = "Server port")]
    port: u16,

    #[arg(long, default_value = "", help = "Database username")]
    username: String,

    #[arg(long, default_value = "", help = "Database password")]
    password: String,

    #[arg(long, help = "Use SSL when connecting to the server")]
    use_ssl: bool,

    #[arg(long, value_enum, default_value = "tabular", help = "Query output format")]
    output_format: OutputFormatArg,

    #[arg(long, default_value = ",", help = "Character used to separate CSV fields")]
    csv_delimiter: String,

    #[arg(
        long,
        default_value = "",
        help = "Character used to escape the quote character when --csv-doublequote is false"
    )]
    csv_escapechar: String,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Double quote characters inside CSV fields instead of escaping them"
    )]
    csv_doublequote: bool,

    #[arg(
        long,
        default_value = "~/.boltline",
        help = "Directory used to save the shell history"
    )]
    history: String,

    #[arg(long, help = "Do not save the shell history")]
    no_history: bool,

    #[arg(
        long,
        help = "Print additional query metadata such as planning and execution times"
    )]
    verbose_execution_info: bool,

    #[arg(
        long,
        value_enum,
        default_value = "serial",
        help = "How piped-in queries are executed: `serial` keeps the input \
                order, `batched-parallel` batches and parallelizes node and \
                edge creation, `parser` only classifies queries without \
                executing anything"
    )]
    import_mode: ImportModeArg,

    #[arg(
        long,
        default_value_t = 1000,
        help = "Queries per batch, only with --import-mode=batched-parallel"
    )]
    batch_size: usize,

    #[arg(
        long,
        default_value_t = 32,
        help = "Worker threads executing batches in parallel, only with --import-mode=batched-parallel"
    )]
    workers_number: usize,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Collect classification statistics, only with --import-mode=parser"
    )]
    collect_parser_stats: bool,

    #[arg(
        long,
        default_value_t = true,
        action = clap::ArgAction::Set,
        help = "Print per-query classification, only with --import-mode=parser"
    )]
    print_parser_stats: bool,

    #[arg(
        long,
        default_value = "warn",
        help = "Log filter in tracing env-filter syntax"
    )]
    log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum OutputFormatArg {
    Tabular,
    Csv,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(arg: OutputFormatArg) -> Self {
        match arg {
            OutputFormatArg::Tabular => OutputFormat::Tabular,
            OutputFormatArg::Csv => OutputFormat::Csv,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum ImportModeArg {
    Serial,
    BatchedParallel,
    Parser,
}

impl From<ImportModeArg> for ImportMode {
    fn from(arg: ImportModeArg) -> Self {
        match arg {
            ImportModeArg::Serial => ImportMode::Serial,
            ImportModeArg::BatchedParallel => ImportMode::BatchedParallel,
            ImportModeArg::Parser => ImportMode::Parser,
        }
    }
}

fn single_char(flag: &str, value: &str) -> Result<char> {
    let mut chars = value.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(ClientError::InvalidArgument(format!(
            "{flag} must be exactly one character"
        ))),
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging(&cli.log_level)?;

    let csv_opts = CsvOptions {
        delimiter: single_char("--csv-delimiter", &cli.csv_delimiter)?,
        escapechar: if cli.csv_escapechar.is_empty() {
            None
        } else {
            Some(single_char("--csv-escapechar", &cli.csv_escapechar)?)
        },
        doublequote: cli.csv_doublequote,
    };
    if !csv_opts.validate() {
        return Err(ClientError::InvalidArgument(
            "--csv-doublequote=false requires --csv-escapechar".into(),
        ));
    }
    let output_opts = OutputOptions {
        format: cli.output_format.into(),
    };
    let bolt_config = BoltConfig {
        host: cli.host,
        port: cli.port,
        username: cli.username,
        password: cli.password,
        use_ssl: cli.use_ssl,
    };

    if std::io::stdin().is_terminal() {
        let repl_opts = ReplOptions {
            history_dir: cli.history,
            no_history: cli.no_history,
            verbose_execution_info: cli.verbose_execution_info,
        };
        return repl::run(&bolt_config, &repl_opts, &output_opts, &csv_opts);
    }

    match ImportMode::from(cli.import_mode) {
        ImportMode::Parser => parser::run(cli.collect_parser_stats, cli.print_parser_stats),
        ImportMode::Serial => serial::run(&bolt_config, &output_opts, &csv_opts),
        ImportMode::BatchedParallel => {
            if cli.workers_number == 0 {
                return Err(ClientError::InvalidArgument(
                    "--workers-number must be at least 1".into(),
                ));
            }
            if cli.batch_size == 0 {
                return Err(ClientError::InvalidArgument(
                    "--batch-size must be at least 1".into(),
                ));
            }
            let opts = ImportOptions {
                batch_size: cli.batch_size,
                workers: cli.workers_number,
                max_batches: cli.workers_number,
            };
            let shutdown = install_shutdown_flag()?;
            parallel::run(&bolt_config, &opts, shutdown)
        }
    }
}

/// First SIGINT/SIGTERM asks the import to stop at the next window; a
/// second one terminates the process.
fn install_shutdown_flag() -> Result<Arc<AtomicBool>> {
    let shutdown = Arc::new(AtomicBool::new(false));
    for signal in [SIGINT, SIGTERM] {
        signal_hook::flag::register_conditional_shutdown(signal, 1, Arc::clone(&shutdown))?;
        signal_hook::flag::register(signal, Arc::clone(&shutdown))?;
    }
    Ok(shutdown)
}

fn main() {
    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        eprintln!("{err}");
        process::exit(1);
    }
}
