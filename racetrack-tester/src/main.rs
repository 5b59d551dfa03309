mod logic;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use racetrack_env::{EnvConfig, MapKind, ShaperRegistry};
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{CurriculumRun, DriverKind, LogicTester, ScenarioResult, run_curriculum};
use util::{parse_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "racetrack-tester", version = "0.1.0")]
#[command(about = "Headless QA harness for the racetrack environment")]
struct Args {
    /// Maps to drive (comma-separated, or "all")
    #[arg(long, default_value = "corridor,curve,circle")]
    maps: String,

    /// Scripted drivers to run (comma-separated, or "all")
    #[arg(long, default_value = "throttle,seeker")]
    drivers: String,

    /// List all available drivers and exit
    #[arg(long)]
    list_drivers: bool,

    /// Seeds to run (comma-separated, decimal or 0x-hex)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Episodes per (map, driver, seed) run
    #[arg(long, default_value_t = 3)]
    episodes: usize,

    /// Reward shaper to use instead of the configured one
    #[arg(long)]
    shaper: Option<String>,

    /// JSON file with environment settings
    #[arg(long)]
    config: Option<PathBuf>,

    /// Also drive the seeker through the training curriculum
    #[arg(long)]
    curriculum: bool,

    /// Episode budget for the curriculum run
    #[arg(long, default_value_t = 60)]
    curriculum_episodes: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_drivers(&args)? {
        return Ok(());
    }

    if args.report == "console" {
        announce_banner();
    }

    let start_time = Instant::now();
    let base = load_base_config(&args)?;
    let maps = expand_maps(&args.maps);
    let drivers = expand_drivers(&args.drivers);
    let seeds = parse_seeds(&args.seeds)?;
    if seeds.is_empty() {
        bail!("no seeds given");
    }

    let tester = LogicTester::new(base.clone(), args.episodes, args.verbose);
    let results = tester.run_matrix(&maps, &drivers, &seeds);

    let curriculum = if args.curriculum {
        Some(
            run_curriculum(&base, seeds[0], args.curriculum_episodes)
                .context("curriculum run failed")?,
        )
    } else {
        None
    };

    write_reports(&args, &results, curriculum.as_ref(), start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_drivers(args: &Args) -> Result<bool> {
    if !args.list_drivers {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available drivers:")?;
    for kind in DriverKind::ALL {
        writeln!(output_target.writer(), "  {:10} - {}", kind.label(), kind.description())?;
    }
    writeln!(output_target.writer(), "Available shapers:")?;
    for name in ShaperRegistry::with_builtins().names() {
        writeln!(output_target.writer(), "  {name}")?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🏎️  Racetrack Automated Tester".bright_cyan().bold());
    println!("{}", "================================".cyan());
}

fn load_base_config(args: &Args) -> Result<EnvConfig> {
    let mut config = match &args.config {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            EnvConfig::from_json(&json)
                .with_context(|| format!("invalid environment config in {}", path.display()))?
        }
        None => EnvConfig::default(),
    };
    if let Some(shaper) = &args.shaper {
        let registry = ShaperRegistry::with_builtins();
        if !registry.contains(shaper) {
            bail!(
                "unknown shaper '{shaper}' (available: {})",
                registry.names().join(", ")
            );
        }
        config.shaper.clone_from(shaper);
    }
    Ok(config)
}

fn expand_maps(maps_arg: &str) -> Vec<MapKind> {
    let mut maps = Vec::new();
    for token in split_csv(maps_arg) {
        if token == "all" {
            for kind in MapKind::ALL {
                push_unique(&mut maps, kind);
            }
        } else {
            push_unique(&mut maps, MapKind::from_name(&token));
        }
    }
    maps
}

fn expand_drivers(drivers_arg: &str) -> Vec<DriverKind> {
    let mut drivers = Vec::new();
    for token in split_csv(drivers_arg) {
        if token == "all" {
            for kind in DriverKind::ALL {
                push_unique(&mut drivers, kind);
            }
        } else if let Some(kind) = DriverKind::from_name(&token) {
            push_unique(&mut drivers, kind);
        } else {
            eprintln!("⚠️  Unknown driver: {}", token.yellow());
        }
    }
    drivers
}

fn push_unique<T: PartialEq>(items: &mut Vec<T>, item: T) {
    if !items.contains(&item) {
        items.push(item);
    }
}

fn write_reports(
    args: &Args,
    results: &[ScenarioResult],
    curriculum: Option<&CurriculumRun>,
    start_time: Instant,
) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results, curriculum)?,
        "markdown" => {
            logic::reports::generate_markdown_report(&mut output_target, results, curriculum)?;
        }
        _ => {
            let duration = start_time.elapsed();
            logic::reports::generate_console_report(
                &mut output_target,
                results,
                curriculum,
                duration,
            )?;
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
