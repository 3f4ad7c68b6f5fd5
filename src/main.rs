use chrono::{Local, NaiveDateTime};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::fs::{self, File};
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

mod cache;
mod config;
mod downsample;
mod error;
mod export;
mod loader;
mod log;
mod merge;
mod model;
mod process;
mod render;
mod table;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "perflog-viz")]
#[command(about = "Performance-counter log merger and report generator", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Args)]
struct InputArgs {
    /// Log files to load; `-` reads one file from stdin. Defaults to every
    /// CSV in the configured log directory.
    files: Vec<PathBuf>,

    /// File name used to classify stdin input.
    #[arg(long, default_value = "stdin.csv")]
    stdin_name: String,

    #[arg(long)]
    config: Option<PathBuf>,

    /// Ignore and do not write cache artifacts.
    #[arg(long)]
    no_cache: bool,

    /// Keep rows at or after this time.
    #[arg(long, value_parser = parse_time)]
    from: Option<NaiveDateTime>,

    /// Keep rows at or before this time.
    #[arg(long, value_parser = parse_time)]
    to: Option<NaiveDateTime>,

    /// Merge tolerance in seconds (overrides the config file).
    #[arg(long)]
    tolerance: Option<f64>,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate an HTML report of the merged logs.
    Report {
        #[command(flatten)]
        input: InputArgs,

        #[arg(short = 'o', long, default_value = "report.html")]
        out: PathBuf,

        #[arg(long, value_enum, default_value_t = QualityOpt::Medium)]
        quality: QualityOpt,
    },
    /// Write the merged table as CSV.
    Export {
        #[command(flatten)]
        input: InputArgs,

        /// Defaults to `Merged_Log_<YYYYMMDD_HHMM>.csv`.
        #[arg(short = 'o', long)]
        out: Option<PathBuf>,
    },
    /// Print per-process peaks of a packed column.
    Peaks {
        #[command(flatten)]
        input: InputArgs,

        #[arg(long, default_value = model::MEMORY_PACKED)]
        column: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum QualityOpt {
    Low,
    Medium,
    High,
    Full,
}

impl From<QualityOpt> for downsample::Quality {
    fn from(value: QualityOpt) -> Self {
        match value {
            QualityOpt::Low => downsample::Quality::Low,
            QualityOpt::Medium => downsample::Quality::Medium,
            QualityOpt::High => downsample::Quality::High,
            QualityOpt::Full => downsample::Quality::Full,
        }
    }
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let input = match &cli.cmd {
        Commands::Report { input, .. }
        | Commands::Export { input, .. }
        | Commands::Peaks { input, .. } => input,
    };

    let default_level = if input.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let cfg = config::load_config(input.config.as_deref())?;

    // 1) Load, normalize and merge.
    let Some(master) = load_master(input, &cfg)? else {
        eprintln!("no data");
        return Ok(ExitCode::FAILURE);
    };

    let parser = process::PackedParser::new()?;

    match cli.cmd {
        Commands::Report { out, quality, .. } => {
            // 2) Aggregate.
            let data = model::build_report_data(&master, &parser, quality.into(), &cfg.render);

            // 3) Render HTML.
            let html = render::render_html_report(&data)?;
            fs::write(&out, html)?;
            println!("Wrote {}", out.display());
        }
        Commands::Export { out, .. } => {
            let out = out.unwrap_or_else(|| {
                PathBuf::from(export::merged_file_name(Local::now().naive_local()))
            });
            export::write_merged_csv(&master, BufWriter::new(File::create(&out)?))?;
            println!("Wrote {} ({} rows)", out.display(), master.len());
        }
        Commands::Peaks { column, .. } => {
            let peaks = master
                .column(&column)
                .map(|data| parser.peak_table(data))
                .unwrap_or_default();
            if peaks.is_empty() {
                println!("{}: no activity", column);
            }
            for p in peaks {
                println!("{:<40} {:>12.2}", p.process, p.max_value);
            }
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn load_master(input: &InputArgs, cfg: &config::AppConfig) -> Result<Option<table::NormalizedTable>> {
    let files = if input.files.is_empty() {
        loader::discover_logs(Path::new(&cfg.log_dir))?
    } else {
        input.files.clone()
    };

    let mut sources = Vec::with_capacity(files.len());
    for path in files {
        if path.as_os_str() == "-" {
            let mut bytes = Vec::new();
            io::stdin().read_to_end(&mut bytes)?;
            sources.push(log::Source::Upload {
                name: input.stdin_name.clone(),
                bytes,
            });
        } else {
            sources.push(log::Source::File(path));
        }
    }

    let normalizer = log::Normalizer::new(&cfg.normalize)?;
    let merger = merge::Merger::new(input.tolerance.unwrap_or(cfg.merge.tolerance_seconds))?;
    let workers = cfg.loader.max_workers;

    let master = if cfg.cache.enabled && !input.no_cache {
        let store = cache::FsStore::new(cfg.cache.extension.clone());
        loader::Loader::new(normalizer, merger, store, workers).load(&sources)?
    } else {
        loader::Loader::new(normalizer, merger, cache::NoCache, workers).load(&sources)?
    };

    Ok(master
        .map(|m| m.filter_range(input.from, input.to))
        .filter(|m| !m.is_empty()))
}

fn parse_time(s: &str) -> std::result::Result<NaiveDateTime, String> {
    log::time::parse_lenient(s).ok_or_else(|| format!("unrecognized time: {}", s))
}
