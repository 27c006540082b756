//! postenrich CLI - Enrich POST production workbooks
//!
//! # Main Commands
//!
//! ```bash
//! postenrich run post.xlsx --tubs tubs.xlsx --demand demand.xlsx --beam-balance beam.xlsx
//! postenrich serve                  # Start HTTP server (port 3000)
//! ```
//!
//! # Helper Commands
//!
//! ```bash
//! postenrich sheets post.xlsx       # List sheet names
//! postenrich inspect post.xlsx      # Columns, row count and first rows as JSON
//! postenrich config --profile classic   # Print the effective config
//! ```

use clap::{Args, Parser, Subcommand};
use postenrich::{
    parser::{read_table_file, SheetSource},
    render_outputs, run_pipeline, EnrichResponse, PipelineConfig, PipelineInputs, Profile,
    TableSummary,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "postenrich")]
#[command(about = "Enrich POST workbooks with Demand, TUBS and BeamBalance lookups", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Config selection shared by the pipeline commands.
#[derive(Args)]
struct ConfigArgs {
    /// JSON config file (default: $POSTENRICH_CONFIG)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Named profile: classic or full
    #[arg(short, long)]
    profile: Option<Profile>,
}

impl ConfigArgs {
    fn load(&self) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
        Ok(PipelineConfig::load(self.config.as_deref(), self.profile)?)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Full pipeline: enrich POST and write modified/filtered workbooks
    Run {
        /// POST workbook or CSV
        post: PathBuf,

        /// POST sheet (default: first)
        #[arg(long)]
        post_sheet: Option<String>,

        /// TUBS workbook (adds TT_CODE)
        #[arg(long)]
        tubs: Option<PathBuf>,

        #[arg(long)]
        tubs_sheet: Option<String>,

        /// Demand workbook (adds Project)
        #[arg(long)]
        demand: Option<PathBuf>,

        #[arg(long)]
        demand_sheet: Option<String>,

        /// BeamBalance workbook (adds IT / Phy whs)
        #[arg(long)]
        beam_balance: Option<PathBuf>,

        #[arg(long)]
        beam_balance_sheet: Option<String>,

        /// Directory for the output workbooks
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Also write the JSON report here
        #[arg(long)]
        report: Option<PathBuf>,

        #[command(flatten)]
        config: ConfigArgs,
    },

    /// List the sheet names of a workbook
    Sheets {
        /// Input workbook or CSV
        input: PathBuf,
    },

    /// Print columns, row count and the first rows of a sheet as JSON
    Inspect {
        /// Input workbook or CSV
        input: PathBuf,

        /// Sheet to read (default: first)
        #[arg(short, long)]
        sheet: Option<String>,

        /// Number of preview rows
        #[arg(short, long, default_value = "5")]
        rows: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print the effective pipeline config as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "3000")]
        port: u16,

        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run {
            post,
            post_sheet,
            tubs,
            tubs_sheet,
            demand,
            demand_sheet,
            beam_balance,
            beam_balance_sheet,
            out_dir,
            report,
            config,
        } => {
            let sources = RunSources {
                post: (post, post_sheet),
                tubs: tubs.map(|p| (p, tubs_sheet)),
                demand: demand.map(|p| (p, demand_sheet)),
                beam_balance: beam_balance.map(|p| (p, beam_balance_sheet)),
            };
            cmd_run(sources, &out_dir, report.as_deref(), &config)
        }

        Commands::Sheets { input } => cmd_sheets(&input),

        Commands::Inspect {
            input,
            sheet,
            rows,
            output,
        } => cmd_inspect(&input, sheet.as_deref(), rows, output.as_deref()),

        Commands::Config { config, output } => cmd_config(&config, output.as_deref()),

        Commands::Serve { port, config } => cmd_serve(port, &config).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

/// Input paths with their optional sheet names.
struct RunSources {
    post: (PathBuf, Option<String>),
    tubs: Option<(PathBuf, Option<String>)>,
    demand: Option<(PathBuf, Option<String>)>,
    beam_balance: Option<(PathBuf, Option<String>)>,
}

fn open_source(path: &Path, sheet: Option<String>) -> Result<SheetSource, Box<dyn std::error::Error>> {
    Ok(SheetSource::from_path(path)?.with_sheet(sheet))
}

fn cmd_run(
    sources: RunSources,
    out_dir: &Path,
    report: Option<&Path>,
    config_args: &ConfigArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_args.load()?;
    eprintln!("📄 Processing: {}", sources.post.0.display());

    let mut inputs = PipelineInputs::new(open_source(&sources.post.0, sources.post.1)?);
    if let Some((path, sheet)) = sources.tubs {
        inputs = inputs.with_tubs(open_source(&path, sheet)?);
    }
    if let Some((path, sheet)) = sources.demand {
        inputs = inputs.with_demand(open_source(&path, sheet)?);
    }
    if let Some((path, sheet)) = sources.beam_balance {
        inputs = inputs.with_beam_balance(open_source(&path, sheet)?);
    }

    let result = run_pipeline(&inputs, &config)?;
    let outputs = render_outputs(&result, &config)?;

    fs::create_dir_all(out_dir)?;
    for artifact in outputs.artifacts() {
        let path = artifact.save_in(out_dir)?;
        eprintln!("💾 Written: {}", path.display());
    }

    let summary = result.summary();
    eprintln!("\n📊 Summary:");
    eprintln!("   Rows:     {}", summary.original_rows);
    eprintln!("   Columns:  {}", summary.columns);
    match (summary.filtered_rows, summary.removed_rows) {
        (Some(filtered), Some(removed)) => {
            eprintln!("   Filtered: {} ({} removed)", filtered, removed);
        }
        _ => eprintln!("   Filtered: not produced"),
    }

    if let Some(path) = report {
        let json = serde_json::to_string_pretty(&EnrichResponse::new(&result, &config))?;
        write_output(&json, Some(path))?;
    }

    Ok(())
}

fn cmd_sheets(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let sheets = SheetSource::from_path(input)?.sheet_names()?;
    for (i, name) in sheets.iter().enumerate() {
        println!("[{:2}] {}", i + 1, name);
    }
    Ok(())
}

fn cmd_inspect(
    input: &Path,
    sheet: Option<&str>,
    rows: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Reading: {}", input.display());
    let parsed = read_table_file(input, sheet)?;
    eprintln!("   Sheet: {} (of {})", parsed.sheet, parsed.sheets.join(", "));
    if let Some(ref encoding) = parsed.encoding {
        eprintln!("   Encoding: {}", encoding);
    }
    if let Some(delimiter) = parsed.delimiter {
        eprintln!("   Delimiter: '{}'", format_delimiter(delimiter));
    }
    eprintln!("✅ {} rows, {} columns", parsed.table.row_count(), parsed.table.width());

    let json = serde_json::to_string_pretty(&TableSummary::new(&parsed.table, rows))?;
    write_output(&json, output)
}

fn cmd_config(config_args: &ConfigArgs, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_args.load()?;
    write_output(&config.to_json()?, output)
}

async fn cmd_serve(port: u16, config_args: &ConfigArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = config_args.load()?;
    postenrich::server::start_server(port, config).await
}

fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
