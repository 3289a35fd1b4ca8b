//! The desk: one dataset, and every question asked of it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use derive_more::Display;
use itertools::Itertools;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bunker::BunkerPrices;
use crate::conditions::{DelaySource, PortDelays};
use crate::config::Config;
use crate::data::{load_dataset, Dataset, LoadError};
use crate::distance::PortDistances;
use crate::portfolio::matrix::UnknownVariant;
use crate::portfolio::{
    self, Evaluator, JointProblem, OptimizeOptions, PortfolioResult, VoyageMatrix,
};
use crate::problem::{Cargo, Commitment, Fleet, SpeedRegime, Vessel};
use crate::scenario::{
    self, Joint, Parameter, ParameterRange, ScenarioPoint, SingleSided, Solver, TippingOutcome,
};
use crate::termination::Termination;
use crate::voyage::{calculate_both, calculate_voyage, Context, VoyageError, VoyageResult};

#[derive(Debug, Display)]
pub enum QueryError {
    #[display(fmt = "no vessel named '{}'", _0)]
    UnknownVessel(String),
    #[display(fmt = "no cargo named '{}'", _0)]
    UnknownCargo(String),
    /// The voyage can not be calculated at all
    #[display(fmt = "{}", _0)]
    Voyage(VoyageError),
    #[display(fmt = "{}", _0)]
    Load(LoadError),
}

impl std::error::Error for QueryError {}

impl From<VoyageError> for QueryError {
    fn from(e: VoyageError) -> Self {
        QueryError::Voyage(e)
    }
}

impl From<LoadError> for QueryError {
    fn from(e: LoadError) -> Self {
        QueryError::Load(e)
    }
}

/// Which side of the book a portfolio question is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// Own vessels against every cargo
    Own,
    /// Own and market vessels against committed and market cargoes
    Joint,
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Own => write!(f, "own"),
            Scope::Joint => write!(f, "joint"),
        }
    }
}

impl FromStr for Scope {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "own" => Ok(Scope::Own),
            "joint" | "full" => Ok(Scope::Joint),
            _ => Err(UnknownVariant {
                kind: "scope",
                value: s.to_string(),
                expected: "own, joint",
            }),
        }
    }
}

/// One standard sensitivity: the sweep over a parameter and where the portfolio tips
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensitivity {
    pub parameter: Parameter,
    pub range: ParameterRange,
    pub points: Vec<ScenarioPoint>,
    pub tipping: TippingOutcome,
}

/// A dataset ready to be queried. Vessels and cargoes are split by side once, up front.
#[derive(Debug)]
pub struct Desk {
    vessels: Vec<Vessel>,
    cargoes: Vec<Cargo>,
    own: Vec<Vessel>,
    market_vessels: Vec<Vessel>,
    committed: Vec<Cargo>,
    market_cargoes: Vec<Cargo>,
    distances: PortDistances,
    prices: BunkerPrices,
    config: Config,
}

impl Desk {
    pub fn new(dataset: Dataset) -> Result<Desk, QueryError> {
        let distances = dataset.port_distances()?;
        let prices = dataset.bunker_prices()?;

        let (own, market_vessels) = dataset
            .vessels
            .iter()
            .cloned()
            .partition::<Vec<_>, _>(Vessel::is_own);
        let (committed, market_cargoes) = dataset
            .cargoes
            .iter()
            .cloned()
            .partition::<Vec<_>, _>(Cargo::is_committed);

        info!(
            "desk: {} own and {} market vessels, {} committed and {} market cargoes",
            own.len(),
            market_vessels.len(),
            committed.len(),
            market_cargoes.len()
        );

        Ok(Desk {
            vessels: dataset.vessels,
            cargoes: dataset.cargoes,
            own,
            market_vessels,
            committed,
            market_cargoes,
            distances,
            prices,
            config: dataset.config,
        })
    }

    /// Loads a dataset file and builds a desk on it
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Desk, QueryError> {
        Desk::new(load_dataset(path)?)
    }

    /// Replaces the configuration the dataset came with
    pub fn with_config(mut self, config: Config) -> Desk {
        self.config = config;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn context(&self) -> Context<'_> {
        Context {
            distances: &self.distances,
            prices: &self.prices,
            config: &self.config,
        }
    }

    /// A fresh voyage cache over this desk's data
    pub fn evaluator(&self) -> Evaluator<'_> {
        Evaluator::new(self.context())
    }

    /// Vessels, all of them or only one side of the fleet
    pub fn vessels(&self, fleet: Option<Fleet>) -> Vec<&Vessel> {
        self.vessels
            .iter()
            .filter(|v| fleet.map_or(true, |f| v.fleet() == f))
            .collect()
    }

    /// Cargoes, all of them or only committed or market ones
    pub fn cargoes(&self, commitment: Option<Commitment>) -> Vec<&Cargo> {
        self.cargoes
            .iter()
            .filter(|c| commitment.map_or(true, |k| c.commitment() == k))
            .collect()
    }

    /// The vessel called `name`. Names match ignoring case.
    pub fn vessel(&self, name: &str) -> Result<&Vessel, QueryError> {
        self.vessels
            .iter()
            .find(|v| v.name() == name)
            .or_else(|| self.vessels.iter().find(|v| v.name().eq_ignore_ascii_case(name)))
            .ok_or_else(|| QueryError::UnknownVessel(name.to_string()))
    }

    /// The cargo called `name`. Names match ignoring case.
    pub fn cargo(&self, name: &str) -> Result<&Cargo, QueryError> {
        self.cargoes
            .iter()
            .find(|c| c.name() == name)
            .or_else(|| self.cargoes.iter().find(|c| c.name().eq_ignore_ascii_case(name)))
            .ok_or_else(|| QueryError::UnknownCargo(name.to_string()))
    }

    /// One voyage, under the given options' conditions
    pub fn voyage(
        &self,
        vessel: &str,
        cargo: &str,
        regime: SpeedRegime,
        options: &OptimizeOptions,
    ) -> Result<VoyageResult, QueryError> {
        let (vessel, cargo) = (self.vessel(vessel)?, self.cargo(cargo)?);
        let adjustments = options.conditions.adjustments(cargo);
        Ok(calculate_voyage(self.context(), vessel, cargo, regime, adjustments)?)
    }

    /// The voyage at both speed regimes, economical first
    pub fn voyage_both(
        &self,
        vessel: &str,
        cargo: &str,
        options: &OptimizeOptions,
    ) -> Result<Vec<VoyageResult>, QueryError> {
        let (vessel, cargo) = (self.vessel(vessel)?, self.cargo(cargo)?);
        let adjustments = options.conditions.adjustments(cargo);
        let both = calculate_both(self.context(), vessel, cargo, adjustments);
        Ok(both.into_iter().collect::<Result<Vec<_>, _>>()?)
    }

    /// Every vessel against every cargo
    pub fn matrix(&self, options: &OptimizeOptions) -> VoyageMatrix {
        let evaluator = self.evaluator();
        let matrix = VoyageMatrix::build(
            &evaluator,
            &self.vessels,
            &self.cargoes,
            options.speed,
            &options.conditions,
        );
        debug!(
            "matrix {:?}: {} feasible cells",
            matrix.dim(),
            matrix.feasible_cells()
        );
        matrix
    }

    /// The best own-fleet portfolios over every cargo, best first
    pub fn optimize(&self, options: &OptimizeOptions, k: usize) -> Vec<PortfolioResult> {
        let evaluator = self.evaluator();
        portfolio::optimize_ranked(&evaluator, &self.own, &self.cargoes, options, k)
    }

    /// The best joint portfolios, best first
    pub fn optimize_full(&self, options: &OptimizeOptions, k: usize) -> Vec<PortfolioResult> {
        let evaluator = self.evaluator();
        self.joint().ranked(&evaluator, options, k)
    }

    fn joint(&self) -> JointProblem<'_> {
        JointProblem::new(
            &self.own,
            &self.market_vessels,
            &self.committed,
            &self.market_cargoes,
        )
    }

    /// Runs `f` against the solver for `scope`
    fn with_solver<T>(
        &self,
        scope: Scope,
        options: &OptimizeOptions,
        f: impl FnOnce(&dyn Solver) -> T,
    ) -> T {
        let evaluator = self.evaluator();
        let result = match scope {
            Scope::Own => f(&SingleSided {
                evaluator: &evaluator,
                vessels: &self.own,
                cargoes: &self.cargoes,
                options: options.clone(),
            }),
            Scope::Joint => f(&Joint {
                evaluator: &evaluator,
                problem: self.joint(),
                options: options.clone(),
            }),
        };

        let (hits, misses) = evaluator.cache_stats();
        debug!("{} voyages calculated, {} served from cache", misses, hits);
        result
    }

    /// The optimal portfolio at each value of `range`
    pub fn sweep(
        &self,
        scope: Scope,
        parameter: &Parameter,
        range: &ParameterRange,
        options: &OptimizeOptions,
        termination: &Termination,
    ) -> Vec<ScenarioPoint> {
        self.with_solver(scope, options, |solver| {
            scenario::sweep(range, parameter, solver, termination)
        })
    }

    /// Where in `range` the optimal portfolio first changes. `tolerance` defaults to the
    /// configured search tolerance.
    pub fn tipping_point(
        &self,
        scope: Scope,
        parameter: &Parameter,
        range: &ParameterRange,
        options: &OptimizeOptions,
        tolerance: Option<f64>,
    ) -> TippingOutcome {
        let tolerance = tolerance.unwrap_or(self.config.search.tolerance);
        self.with_solver(scope, options, |solver| {
            scenario::find_tipping_point(range, parameter, solver, tolerance)
        })
    }

    /// The bunker and delay sensitivities of the portfolio
    pub fn sensitivities(&self, scope: Scope, options: &OptimizeOptions) -> Vec<Sensitivity> {
        let tolerance = self.config.search.tolerance;
        self.with_solver(scope, options, |solver| {
            scenario::standard_sensitivities(&self.config.search)
                .into_iter()
                .map(|(parameter, range)| Sensitivity {
                    points: scenario::sweep(&range, &parameter, solver, &Termination::Never),
                    tipping: scenario::find_tipping_point(&range, &parameter, solver, tolerance),
                    parameter,
                    range,
                })
                .collect()
        })
    }

    /// Ports where cargoes load or discharge, deduplicated
    pub fn ports(&self) -> Vec<&str> {
        self.cargoes
            .iter()
            .flat_map(|c| [c.load().port.as_str(), c.discharge().port.as_str()])
            .unique()
            .collect()
    }

    /// Samples an external delay prediction at every port the cargo book calls at
    pub fn delays_from(&self, source: &dyn DelaySource) -> PortDelays {
        let delays = PortDelays::from_source(source, self.ports());
        debug!(
            "delays at {} port(s): {}",
            delays.ports.len(),
            delays.ports.iter().map(|(p, d)| format!("{p}={d:.1}")).join(", ")
        );
        delays
    }
}
