//! Command-line front-end for the TRIAX planning core.
//!
//! Loads an instrument definition, runs the pipeline, and answers path
//! queries from the shell:
//!
//! ```bash
//! triax plan instrument.yaml 40 70 60 110 --format nicos -o path.py
//! ```

use clap::{Parser, Subcommand, ValueEnum};
use std::io::Write;
use std::path::PathBuf;

use triax_core::builder::{PathStrategy, PathsBuilder};
use triax_core::config::PlannerConfig;
use triax_core::core::to_radians;
use triax_core::export::{NicosExporter, NomadExporter, PathExporter, RawExporter};
use triax_core::instrument::load_instrument_file;

#[derive(Parser)]
#[command(name = "triax", version, about = "Triple-axis spectrometer path planning")]
struct Cli {
    /// Planner configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ExportFormat {
    Raw,
    Nomad,
    Nicos,
}

#[derive(Subcommand)]
enum Command {
    /// Plan a collision-free path between two angular positions
    Plan {
        /// Instrument definition file (YAML)
        instrument: PathBuf,
        /// Current a2, degrees
        a2_cur: f64,
        /// Current a4, degrees
        a4_cur: f64,
        /// Target a2, degrees
        a2_tgt: f64,
        /// Target a4, degrees
        a4_tgt: f64,
        /// Penalise roadmap edges close to walls
        #[arg(long)]
        penalise_walls: bool,
        /// Smooth the path by corner cutting
        #[arg(long)]
        smooth: bool,
        /// Export format
        #[arg(long, value_enum, default_value_t = ExportFormat::Raw)]
        format: ExportFormat,
        /// Output file; stdout when omitted
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print pipeline statistics for an instrument definition
    Info {
        /// Instrument definition file (YAML)
        instrument: PathBuf,
    },
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(err) = run(cli) {
        log::error!("{err}");
        std::process::exit(-1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let config = match &cli.config {
        Some(path) => PlannerConfig::load(path)?,
        None => PlannerConfig::default(),
    };

    match cli.command {
        Command::Plan {
            instrument,
            a2_cur,
            a4_cur,
            a2_tgt,
            a4_tgt,
            penalise_walls,
            smooth,
            format,
            output,
        } => {
            let (_file, model) = load_instrument_file(&instrument)?;
            let builder = PathsBuilder::new(&model, config);
            builder.recalculate()?;

            let strategy = if penalise_walls {
                PathStrategy::PenaliseWalls
            } else {
                PathStrategy::Shortest
            };
            let path = builder.find_path(
                to_radians(a2_cur),
                to_radians(a4_cur),
                to_radians(a2_tgt),
                to_radians(a4_tgt),
                strategy,
            );
            if !path.ok {
                return Err("no collision-free path found".into());
            }
            log::info!("path found over {} roadmap vertices", path.vertices.len());

            let vertices = builder.path_vertices(&path, true, smooth);
            let exporter: Box<dyn PathExporter> = match format {
                ExportFormat::Raw => Box::new(RawExporter),
                ExportFormat::Nomad => Box::new(NomadExporter::default()),
                ExportFormat::Nicos => Box::new(NicosExporter::default()),
            };

            let mut sink: Box<dyn Write> = match output {
                Some(path) => Box::new(std::fs::File::create(path)?),
                None => Box::new(std::io::stdout()),
            };
            builder.accept_exporter(exporter.as_ref(), &vertices, &mut sink)?;
            sink.flush()?;
        }

        Command::Info { instrument } => {
            let (file, model) = load_instrument_file(&instrument)?;
            let builder = PathsBuilder::new(&model, config);
            builder.recalculate()?;

            println!("instrument: {} ({})", instrument.display(), file.timestamp);
            if let Some((w, h)) = builder.with_raster(|r| (r.width(), r.height())) {
                println!("configuration space: {w} x {h} cells");
            }
            println!("line segment groups: {}", builder.num_line_groups());
            if let Some((v, l, p)) = builder.with_voronoi(|v| {
                (
                    v.vertices.len(),
                    v.linear_edges.len(),
                    v.parabolic_edges.len(),
                )
            }) {
                println!("voronoi: {v} vertices, {l} linear edges, {p} parabolic edges");
            }
        }
    }

    Ok(())
}
