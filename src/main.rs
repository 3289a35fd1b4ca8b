use std::collections::HashMap;
use std::error::Error;
use std::fs::File;
use std::io::{BufReader, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use serde::Serialize;

use freightdesk::conditions::Conditions;
use freightdesk::data::{load_config, load_dataset};
use freightdesk::parse;
use freightdesk::portfolio::{Objective, OptimizeOptions, SpeedMode};
use freightdesk::scenario::{standard_sensitivities, Parameter, ParameterRange};
use freightdesk::termination::Termination;
use freightdesk::{Desk, Scope};

/// Voyage economics, portfolio optimization and scenario search for a dry bulk desk
#[derive(Parser, Debug)]
#[clap(name = "freightdesk", version)]
struct Args {
    /// Dataset with vessels, cargoes, distances and bunker prices
    #[clap(short, long, parse(from_os_str), default_value = "data/sample.json")]
    data: PathBuf,

    /// Configuration overriding the one in the dataset
    #[clap(short, long, parse(from_os_str))]
    config: Option<PathBuf>,

    /// JSON object of predicted delay days per port
    #[clap(long, parse(from_os_str))]
    delays: Option<PathBuf>,

    /// Extra delay days, charged at each cargo's discharge port
    #[clap(long, default_value = "0")]
    delay: f64,

    /// Factor applied to every bunker price
    #[clap(long, default_value = "1")]
    bunker: f64,

    /// eco, warranted or dual
    #[clap(long, default_value = "dual")]
    speed: SpeedMode,

    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Economics of one vessel carrying one cargo
    Voyage { vessel: String, cargo: String },
    /// Every vessel against every cargo
    Matrix,
    /// Best assignment of the own fleet
    Optimize {
        /// profit or tce
        #[clap(long, default_value = "profit")]
        objective: Objective,
        /// Number of portfolios to list, best first
        #[clap(short = 'k', long, default_value = "1")]
        alternatives: usize,
        /// Also make assignments that lose money, if that covers more cargoes
        #[clap(long)]
        include_non_positive: bool,
    },
    /// Best joint portfolio of own and market vessels
    Portfolio {
        #[clap(short = 'k', long, default_value = "1")]
        alternatives: usize,
    },
    /// The optimal portfolio across a range of one parameter
    Sweep {
        /// bunker, delay or delay:PORT,PORT
        parameter: Parameter,
        /// 'start..end step' or 'start..=end step'
        range: String,
        /// own or joint
        #[clap(long, default_value = "own")]
        scope: Scope,
        /// When to stop, e.g. '20 samples 30 timeout |'
        #[clap(long, default_value = "never")]
        terminate: String,
    },
    /// Where in a range the optimal portfolio changes
    Tipping {
        parameter: Parameter,
        /// Defaults to the standard range of the parameter
        range: Option<String>,
        #[clap(long, default_value = "own")]
        scope: Scope,
        /// Width of the final bracket, defaults to the configured one
        #[clap(long, parse(try_from_str = parse::tolerance))]
        tolerance: Option<f64>,
    },
    /// Bunker and delay sweeps with their tipping points
    Sensitivities {
        #[clap(long, default_value = "own")]
        scope: Scope,
    },
}

fn emit<T: Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    serde_json::to_writer_pretty(&mut out, value)?;
    writeln!(out)?;
    Ok(())
}

fn conditions(args: &Args, desk: &Desk) -> Result<Conditions, Box<dyn Error>> {
    let mut delays = match &args.delays {
        Some(path) => {
            let predicted: HashMap<String, f64> =
                serde_json::from_reader(BufReader::new(File::open(path)?))?;
            desk.delays_from(&predicted)
        }
        None => Default::default(),
    };
    delays.uniform = args.delay;

    Ok(Conditions {
        bunker_multiplier: args.bunker,
        delays,
    })
}

fn default_range(desk: &Desk, parameter: &Parameter) -> Option<ParameterRange> {
    let standard = standard_sensitivities(&desk.config().search);
    standard
        .into_iter()
        .find(|(p, _)| std::mem::discriminant(p) == std::mem::discriminant(parameter))
        .map(|(_, range)| range)
}

pub fn main() -> Result<(), Box<dyn Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut dataset = load_dataset(&args.data)?;
    if let Some(path) = &args.config {
        dataset.config = load_config(path)?;
    }
    let desk = Desk::new(dataset)?;

    let options = OptimizeOptions {
        speed: args.speed,
        conditions: conditions(&args, &desk)?,
        ..OptimizeOptions::default()
    };

    match &args.command {
        Command::Voyage { vessel, cargo } => {
            let voyages = args
                .speed
                .regimes()
                .iter()
                .map(|&regime| desk.voyage(vessel, cargo, regime, &options))
                .collect::<Result<Vec<_>, _>>()?;
            emit(&voyages)
        }
        Command::Matrix => emit(&desk.matrix(&options).entries()),
        Command::Optimize {
            objective,
            alternatives,
            include_non_positive,
        } => {
            let options = OptimizeOptions {
                objective: *objective,
                include_non_positive: *include_non_positive,
                ..options
            };
            emit(&desk.optimize(&options, *alternatives))
        }
        Command::Portfolio { alternatives } => emit(&desk.optimize_full(&options, *alternatives)),
        Command::Sweep {
            parameter,
            range,
            scope,
            terminate,
        } => {
            let range = ParameterRange::try_from(range.as_str())?;
            let termination = Termination::try_from(terminate.as_str())?;
            info!("sweeping {} over {:?} until {}", parameter, range, termination);
            emit(&desk.sweep(*scope, parameter, &range, &options, &termination))
        }
        Command::Tipping {
            parameter,
            range,
            scope,
            tolerance,
        } => {
            let range = match range {
                Some(range) => ParameterRange::try_from(range.as_str())?,
                None => default_range(&desk, parameter).ok_or("no standard range for parameter")?,
            };
            emit(&desk.tipping_point(*scope, parameter, &range, &options, *tolerance))
        }
        Command::Sensitivities { scope } => emit(&desk.sensitivities(*scope, &options)),
    }
}
