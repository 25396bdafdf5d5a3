use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use docx_theme::{Theme, apply_theme_to_file, schema_document};
use serde_json::{Map, Value};

#[derive(Parser)]
#[command(name = "docx-theme", version, about = "Apply a visual theme to a DOCX file")]
struct Cli {
    /// Log every stage at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Theme a DOCX file
    Apply {
        /// Input DOCX file
        input: PathBuf,

        /// Output DOCX file (defaults to <input>.themed.docx)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Theme JSON file (flat object of theme keys)
        #[arg(long)]
        theme: Option<PathBuf>,

        /// Override one theme key, e.g. --set tableAltRowEnabled=true
        #[arg(long = "set", value_name = "KEY=VALUE")]
        overrides: Vec<String>,
    },
    /// Print the theme schema and defaults as JSON
    Schema,
}

fn parse_overrides(pairs: &[String]) -> Result<Map<String, Value>, String> {
    pairs
        .iter()
        .map(|pair| {
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| format!("expected KEY=VALUE, got {pair:?}"))?;
            let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            Ok((key.trim().to_string(), value))
        })
        .collect()
}

fn run(cli: Cli) -> Result<(), String> {
    match cli.command {
        Command::Schema => {
            let doc = serde_json::to_string_pretty(&schema_document()).map_err(|e| e.to_string())?;
            println!("{doc}");
            Ok(())
        }
        Command::Apply {
            input,
            output,
            theme,
            overrides,
        } => {
            let base = match theme {
                Some(path) => {
                    let json = std::fs::read_to_string(&path)
                        .map_err(|e| format!("{}: {e}", path.display()))?;
                    Theme::from_json_str(&json)
                }
                None => Theme::default(),
            };
            let theme = base.merged(&parse_overrides(&overrides)?);
            let output = output.unwrap_or_else(|| input.with_extension("themed.docx"));

            let report = apply_theme_to_file(&input, &output, &theme).map_err(|e| e.to_string())?;
            log::info!("Tables: {:?}", report.tables);
            log::info!("Fonts: {:?}", report.fonts);
            println!("{}", output.display());
            Ok(())
        }
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
