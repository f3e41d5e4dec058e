mod output;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use flagcap_core::{FlagFile, Program};
use tracing_subscriber::{EnvFilter, fmt};

use crate::output::{OutputFormat, Report, format_report};

#[derive(Debug, Parser)]
#[command(name = "flagcap", disable_help_subcommand = true)]
#[command(about = "Tokenize an argument vector against declared flags", version)]
struct Cli {
    /// Log capture decisions to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Tokenize arguments and print captured values and rest.
    Parse(ParseArgs),
    /// Print the help text rendered from a declaration file.
    Help(DeclArgs),
    /// Check a declaration file for conflicting flags.
    Check(DeclArgs),
}

#[derive(Debug, Args)]
struct DeclArgs {
    /// Flag declaration file (YAML, or JSON with a .json extension).
    #[arg(long)]
    decl: PathBuf,
}

#[derive(Debug, Args)]
struct ParseArgs {
    #[command(flatten)]
    decl: DeclArgs,
    /// Output format.
    #[arg(long, default_value = "json")]
    format: OutputFormat,
    /// Only report flags that were present and satisfy their arity.
    #[arg(long)]
    satisfied: bool,
    /// Arguments to tokenize (pass them after `--`).
    #[arg(last = true, allow_hyphen_values = true)]
    args: Vec<String>,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Command::Parse(args) => run_parse(args),
        Command::Help(args) => run_help(args),
        Command::Check(args) => run_check(args),
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn load_program(args: &DeclArgs) -> Result<Program, String> {
    let file = FlagFile::load(&args.decl)
        .map_err(|err| format!("Failed to load '{}': {err}", args.decl.display()))?;
    tracing::debug!(path = %args.decl.display(), flags = file.flags.len(), "loaded declarations");
    file.into_program()
        .map_err(|err| format!("Invalid declarations in '{}': {err}", args.decl.display()))
}

fn run_parse(args: ParseArgs) -> Result<(), String> {
    let program = load_program(&args.decl)?;
    let eval = program.eval(args.args.as_slice()).map_err(|err| err.to_string())?;

    if let Some(help) = &eval.help {
        print!("{help}");
        return Ok(());
    }

    let report = Report::new(&eval.result, args.satisfied);
    let rendered = format_report(&report, args.format)?;
    println!("{}", rendered.trim_end());
    Ok(())
}

fn run_help(args: DeclArgs) -> Result<(), String> {
    let program = load_program(&args)?;
    print!("{}", program.help());
    Ok(())
}

fn run_check(args: DeclArgs) -> Result<(), String> {
    let program = load_program(&args)?;
    let registry = program.registry().map_err(|err| err.to_string())?;
    println!("ok: {} flag(s) registered", registry.len());
    Ok(())
}
