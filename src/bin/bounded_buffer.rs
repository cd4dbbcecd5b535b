use bounded_buffer::{
    telemetry, Simulation, SimulationConfig, SimulationConfigBuilder, SimulationError, SimulationReport,
};
use clap::{ArgAction, Parser};
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;

/// Run producers and consumers against one shared bounded buffer.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// TOML config file; flags below override its values
    #[arg(long)]
    config: Option<PathBuf>,

    /// Buffer capacity
    #[arg(short, long)]
    capacity: Option<usize>,

    /// Number of producer threads
    #[arg(short, long)]
    producers: Option<usize>,

    /// Number of consumer threads
    #[arg(short = 'C', long)]
    consumers: Option<usize>,

    /// Items produced by each producer
    #[arg(short = 'n', long)]
    items: Option<usize>,

    #[arg(long)]
    min_delay_ms: Option<u64>,

    #[arg(long)]
    max_delay_ms: Option<u64>,

    /// Explicit quota for the next consumer (repeat once per consumer)
    #[arg(long = "quota", value_name = "N")]
    quotas: Vec<usize>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Args {
    fn into_config(self) -> Result<SimulationConfig, SimulationError> {
        let base = match &self.config {
            Some(path) => SimulationConfig::from_file(path)?,
            None => SimulationConfig::default(),
        };

        let mut builder = SimulationConfigBuilder::from_config(base);
        if let Some(capacity) = self.capacity {
            builder = builder.capacity(capacity);
        }
        if let Some(producers) = self.producers {
            builder = builder.producers(producers);
        }
        if let Some(consumers) = self.consumers {
            builder = builder.consumers(consumers);
        }
        if let Some(items) = self.items {
            builder = builder.items_per_producer(items);
        }
        if let Some(min_ms) = self.min_delay_ms {
            builder = builder.min_delay_ms(min_ms);
        }
        if let Some(max_ms) = self.max_delay_ms {
            builder = builder.max_delay_ms(max_ms);
        }
        if !self.quotas.is_empty() {
            builder = builder.quotas(self.quotas);
        }
        Ok(builder.build()?)
    }
}

fn render_json(report: &SimulationReport) -> Result<String, SimulationError> {
    Ok(serde_json::to_string_pretty(report)?)
}

fn run(args: Args) -> Result<(), SimulationError> {
    let json = args.json;
    let config = args.into_config()?;
    let report = Simulation::new(config)?.run()?;

    if json {
        println!("{}", render_json(&report)?);
        return Ok(());
    }

    println!(
        "{} {} produced, {} consumed in {:?} (peak occupancy {}/{})",
        "Simulation finished.".green().bold(),
        report.produced,
        report.consumed,
        report.elapsed,
        report.buffer.high_water,
        report.buffer.capacity
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    // Keep stdout clean for the JSON report.
    let level = if args.json {
        "warn"
    } else {
        telemetry::level_for(args.verbose, args.quiet)
    };
    telemetry::init(level);

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{} {err}", "error:".red().bold());
            ExitCode::FAILURE
        }
    }
}
