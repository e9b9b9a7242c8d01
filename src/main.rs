use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand, ValueEnum};
use erf_digest::dispatch::dispatch;
use erf_digest::io::excel_write;
use erf_digest::model::DispatchMode;
use erf_digest::pipeline;
use erf_digest::resolve::{EmailResolver, WorkbookDirectory};
use erf_digest::select::SheetEvaluation;
use erf_digest::settings::{REQUIRED_COLUMNS, Settings};
use erf_digest::transport::{MailTransport, NullTransport, SmtpConfig, SmtpMailer};
use erf_digest::{DigestError, Result};

fn main() {
    let cli = Cli::parse();
    if let Err(error) = run(cli) {
        eprintln!("error: {error}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    init_logging()?;
    match cli.command {
        Command::Send(args) => execute_send(args),
        Command::Inspect(args) => execute_inspect(args),
        Command::MapTemplate(args) => execute_map_template(args),
    }
}

fn init_logging() -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|error| DigestError::Logging(error.to_string()))
}

fn execute_send(args: SendArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(DigestError::MissingInput(args.input));
    }

    let settings = match &args.settings {
        Some(path) => Settings::load(path)?,
        None => Settings::default(),
    };

    let prepared = pipeline::prepare(&args.input, &settings)?;
    println!("Selected sheet: '{}'", prepared.dataset.sheet.name);
    println!(
        "  score {}/{} required columns",
        prepared.dataset.score.score,
        REQUIRED_COLUMNS.len()
    );
    println!("  total rows: {}", prepared.total_rows);
    println!("  filtered rows: {}", prepared.filtered_rows);
    for (status, count) in &prepared.status_breakdown {
        println!("    {status}: {count}");
    }
    println!("  requesters: {}", prepared.groups.len());

    let mut resolver = match &args.mapping {
        Some(path) => EmailResolver::from_mapping_file(path),
        None => EmailResolver::new(),
    };
    if let Some(path) = &args.manual_mappings {
        let added = resolver.import_manual_mappings(path)?;
        println!("Merged {added} manual mapping(s) from {}", path.display());
    }
    if let Some(path) = &args.directory {
        let directory = WorkbookDirectory::load(path)?;
        resolver = resolver.with_directory(
            Box::new(directory),
            Duration::from_millis(settings.directory_pause_ms),
        );
    }
    println!("Email mappings loaded: {}", resolver.mapping_len());

    let mode = DispatchMode::from(args.mode);
    let mut transport: Box<dyn MailTransport> = match mode {
        DispatchMode::Preview => Box::new(NullTransport),
        DispatchMode::Demo | DispatchMode::Live => {
            let config = SmtpConfig::from_env().ok_or(DigestError::SmtpNotConfigured)?;
            Box::new(SmtpMailer::connect(&config)?)
        }
    };

    let result = dispatch(
        &prepared.dataset.sheet,
        &prepared.groups,
        mode,
        &args.test_recipients,
        &mut resolver,
        transport.as_mut(),
        &settings,
    )?;

    match mode {
        DispatchMode::Preview => {
            println!(
                "\nWould-send summary ({} requesters):",
                result.per_recipient.len()
            );
            for outcome in &result.per_recipient {
                match &outcome.resolved_address {
                    Some(address) => println!("  {} -> {address}", outcome.group_key),
                    None => println!("  {} -> NOT RESOLVED", outcome.group_key),
                }
            }
        }
        DispatchMode::Demo | DispatchMode::Live => {
            println!("\nDispatch finished:");
            println!("  successful: {}", result.successful);
            println!("  failed: {}", result.failed);
        }
    }

    let stats = resolver.stats();
    println!("\nResolution stats:");
    println!("  mapped via dictionary: {}", stats.mapped);
    println!("  directory resolved: {}", stats.directory_resolved);
    println!("  resolution failed: {}", stats.failed);

    if !resolver.unmapped().is_empty() {
        println!("\nUnresolved identifiers ({}):", resolver.unmapped().len());
        for identifier in resolver.unmapped().iter().take(10) {
            println!("  - {identifier}");
        }
        if resolver.unmapped().len() > 10 {
            println!("  ... and {} more", resolver.unmapped().len() - 10);
        }
    }

    Ok(())
}

fn execute_inspect(args: InspectArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(DigestError::MissingInput(args.input));
    }

    let reports = pipeline::inspect_workbook(&args.input)?;
    println!("Analysed {} sheet(s):", reports.len());
    for report in &reports {
        match &report.evaluation {
            SheetEvaluation::NoRows => {
                println!("  SKIP '{}': no rows", report.sheet_name);
            }
            SheetEvaluation::Pivot => {
                println!("  SKIP '{}': pivot/summary sheet", report.sheet_name);
            }
            SheetEvaluation::MissingMandatory(missing) => {
                println!(
                    "  SKIP '{}': missing mandatory column(s) {}",
                    report.sheet_name,
                    missing.join(", ")
                );
            }
            SheetEvaluation::Eligible(score) => {
                println!(
                    "  OK   '{}': score {}/{}, {} rows",
                    report.sheet_name,
                    score.score,
                    REQUIRED_COLUMNS.len(),
                    report.rows
                );
            }
        }
    }

    let workbook = erf_digest::io::excel_read::load_workbook(&args.input)?;
    match erf_digest::select::select(&workbook) {
        Ok(selected) => println!("\nRecommended sheet: '{}'", selected.sheet.name),
        Err(_) => println!("\nNo suitable data sheet found."),
    }
    Ok(())
}

fn execute_map_template(args: MapTemplateArgs) -> Result<()> {
    if !args.input.exists() {
        return Err(DigestError::MissingInput(args.input));
    }

    let requesters = pipeline::extract_requesters(&args.input)?;
    excel_write::write_mapping_template(&args.output, &requesters)?;
    println!(
        "Wrote mapping template with {} requester(s) to {}",
        requesters.len(),
        args.output.display()
    );
    Ok(())
}

#[derive(Parser)]
#[command(
    author,
    version,
    about = "Select, resolve, and dispatch ERF status digests."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve recipients and dispatch one digest per requester.
    Send(SendArgs),
    /// Analyse every sheet of a workbook and report selection verdicts.
    Inspect(InspectArgs),
    /// Write a mapping-template workbook for manual completion.
    MapTemplate(MapTemplateArgs),
}

#[derive(clap::Args)]
struct SendArgs {
    /// ERF workbook to process.
    #[arg(long)]
    input: PathBuf,

    /// Dispatch behaviour.
    #[arg(long, value_enum)]
    mode: SendMode,

    /// Mapping workbook (identifier and address columns).
    #[arg(long)]
    mapping: Option<PathBuf>,

    /// Manually completed mapping workbook to merge in.
    #[arg(long)]
    manual_mappings: Option<PathBuf>,

    /// Directory export searched as the final resolution tier.
    #[arg(long)]
    directory: Option<PathBuf>,

    /// Address receiving demo copies; repeatable.
    #[arg(long = "test-recipient")]
    test_recipients: Vec<String>,

    /// Optional JSON settings overrides.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(clap::Args)]
struct InspectArgs {
    /// Workbook to analyse.
    #[arg(long)]
    input: PathBuf,
}

#[derive(clap::Args)]
struct MapTemplateArgs {
    /// Workbook the requester identifiers are read from.
    #[arg(long)]
    input: PathBuf,

    /// Where the template workbook is written.
    #[arg(long, default_value = "email_mapping_template.xlsx")]
    output: PathBuf,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SendMode {
    Preview,
    Demo,
    Live,
}

impl From<SendMode> for DispatchMode {
    fn from(mode: SendMode) -> Self {
        match mode {
            SendMode::Preview => DispatchMode::Preview,
            SendMode::Demo => DispatchMode::Demo,
            SendMode::Live => DispatchMode::Live,
        }
    }
}
