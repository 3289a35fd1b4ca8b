//! Re-solving a portfolio while one market parameter moves, and finding where the best portfolio
//! changes.

use std::fmt;

use derive_more::Display;
use log::{debug, info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::conditions::Conditions;
use crate::config::SearchConfig;
use crate::distance::normalize;
use crate::portfolio::{
    self, AssignmentSet, Evaluator, JointProblem, OptimizeOptions, PortfolioResult,
};
use crate::problem::{Cargo, Cost, Vessel};
use crate::termination::Termination;

/// Differences in objective below this are ties
const TIE: f64 = 1e-6;

/// Something that can find the best portfolio under given conditions and value a fixed one
pub trait Solver: Sync {
    /// The conditions parameters are applied on top of
    fn base(&self) -> &Conditions;

    fn solve(&self, conditions: &Conditions) -> PortfolioResult;

    /// Objective value of `set` under `conditions`, or None if it can no longer be assigned
    fn price(&self, set: &AssignmentSet, conditions: &Conditions) -> Option<f64>;
}

/// Own vessels against cargoes, without the market side
pub struct SingleSided<'a> {
    pub evaluator: &'a Evaluator<'a>,
    pub vessels: &'a [Vessel],
    pub cargoes: &'a [Cargo],
    pub options: OptimizeOptions,
}

impl<'a> SingleSided<'a> {
    fn options(&self, conditions: &Conditions) -> OptimizeOptions {
        OptimizeOptions {
            conditions: conditions.clone(),
            ..self.options.clone()
        }
    }
}

impl<'a> Solver for SingleSided<'a> {
    fn base(&self) -> &Conditions {
        &self.options.conditions
    }

    fn solve(&self, conditions: &Conditions) -> PortfolioResult {
        portfolio::optimize(self.evaluator, self.vessels, self.cargoes, &self.options(conditions))
    }

    fn price(&self, set: &AssignmentSet, conditions: &Conditions) -> Option<f64> {
        portfolio::price(
            self.evaluator,
            self.vessels,
            self.cargoes,
            &self.options(conditions),
            set,
        )
    }
}

/// The full book: own and market vessels against committed and market cargoes
pub struct Joint<'a> {
    pub evaluator: &'a Evaluator<'a>,
    pub problem: JointProblem<'a>,
    pub options: OptimizeOptions,
}

impl<'a> Joint<'a> {
    fn options(&self, conditions: &Conditions) -> OptimizeOptions {
        OptimizeOptions {
            conditions: conditions.clone(),
            ..self.options.clone()
        }
    }
}

impl<'a> Solver for Joint<'a> {
    fn base(&self) -> &Conditions {
        &self.options.conditions
    }

    fn solve(&self, conditions: &Conditions) -> PortfolioResult {
        self.problem.optimize(self.evaluator, &self.options(conditions))
    }

    fn price(&self, set: &AssignmentSet, conditions: &Conditions) -> Option<f64> {
        self.problem.price(self.evaluator, &self.options(conditions), set)
    }
}

/// The market parameter a sweep moves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    /// Factor applied to every bunker price
    BunkerMultiplier,
    /// Congestion days at every discharge port if `ports` is None, else only at the listed ones
    PortDelay { ports: Option<Vec<String>> },
}

impl Parameter {
    /// `base` with this parameter set to `value`
    pub fn apply(&self, base: &Conditions, value: f64) -> Conditions {
        let mut conditions = base.clone();
        match self {
            Parameter::BunkerMultiplier => conditions.bunker_multiplier = value,
            Parameter::PortDelay { ports: None } => conditions.delays.uniform = value,
            Parameter::PortDelay { ports: Some(ports) } => {
                for port in ports {
                    conditions.delays.ports.insert(normalize(port), value);
                }
            }
        }
        conditions
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Parameter::BunkerMultiplier => write!(f, "bunker"),
            Parameter::PortDelay { ports: None } => write!(f, "delay"),
            Parameter::PortDelay { ports: Some(ports) } => write!(f, "delay:{}", ports.join(",")),
        }
    }
}

/// Evenly spaced values from `start` to `end`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParameterRange {
    pub start: f64,
    pub end: f64,
    pub step: f64,
    /// Whether `end` itself is sampled
    pub inclusive: bool,
}

impl ParameterRange {
    /// `start..end`, stepping by `step`
    pub fn new(start: f64, end: f64, step: f64) -> ParameterRange {
        ParameterRange {
            start,
            end,
            step,
            inclusive: false,
        }
    }

    /// `start..=end`, stepping by `step`
    pub fn inclusive(start: f64, end: f64, step: f64) -> ParameterRange {
        ParameterRange {
            start,
            end,
            step,
            inclusive: true,
        }
    }

    /// The sampled values in increasing order. Values are computed from their index, so long
    /// ranges do not accumulate rounding error.
    pub fn samples(&self) -> Vec<f64> {
        if !(self.step > 0.0) || self.end < self.start {
            return Vec::new();
        }

        let slack = self.step * 1e-9;
        let count = ((self.end - self.start) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| self.start + i as f64 * self.step)
            .filter(|&v| match self.inclusive {
                true => v <= self.end + slack,
                false => v < self.end - slack,
            })
            .collect()
    }
}

/// The optimal portfolio at one sampled value
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioPoint {
    pub value: f64,
    pub total_profit: Cost,
    pub average_tce: Cost,
    pub objective_value: f64,
    pub assignments: usize,
    pub unassigned_cargoes: Vec<String>,
    pub assignment_set: AssignmentSet,
}

impl ScenarioPoint {
    fn new(value: f64, result: &PortfolioResult) -> Self {
        Self {
            value,
            total_profit: result.total_profit,
            average_tce: result.average_tce,
            objective_value: result.objective_value,
            assignments: result.assignments.len(),
            unassigned_cargoes: result.unassigned_cargoes.clone(),
            assignment_set: result.assignment_set(),
        }
    }
}

/// Solves at every value of `range`, in parallel, stopping early once `termination` says so.
/// Points come back in increasing order of value.
///
/// Samples are solved in batches of `rayon::current_num_threads()` and `termination` is checked
/// as each batch is collected, so a timeout or interrupt can overshoot by up to one batch of
/// solves. Points past the stop are discarded.
pub fn sweep<S>(
    range: &ParameterRange,
    parameter: &Parameter,
    solver: &S,
    termination: &Termination,
) -> Vec<ScenarioPoint>
where
    S: Solver + ?Sized,
{
    let samples = range.samples();
    let batch = rayon::current_num_threads().max(1);
    let mut points = Vec::with_capacity(samples.len());

    'batches: for values in samples.chunks(batch) {
        let solved = values
            .par_iter()
            .map(|&value| {
                let result = solver.solve(&parameter.apply(solver.base(), value));
                ScenarioPoint::new(value, &result)
            })
            .collect::<Vec<_>>();

        for point in solved {
            if termination.should_terminate(points.len() as u64) {
                info!(
                    "{} sweep stopped by '{}' after {} of {} samples",
                    parameter,
                    termination,
                    points.len(),
                    samples.len()
                );
                break 'batches;
            }
            trace!("{} = {}: {}", parameter, point.value, point.assignment_set);
            points.push(point);
        }
    }

    debug!("{} sweep took {} samples", parameter, points.len());
    points
}

/// The boundary where the optimal portfolio changes
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TippingPoint {
    pub parameter: Parameter,
    /// Largest value known to keep the baseline optimal
    pub lower: f64,
    /// Smallest value known to favor the alternative
    pub upper: f64,
    /// The optimal assignment at the start of the range
    pub baseline: AssignmentSet,
    /// The optimal assignment past the boundary
    pub alternative: AssignmentSet,
    /// The baseline re-priced at `upper`; None if it can no longer be assigned
    pub baseline_value_at_upper: Option<f64>,
    pub alternative_value_at_upper: f64,
    /// Optimal portfolio at `lower`
    pub before: PortfolioResult,
    /// Optimal portfolio at `upper`
    pub after: PortfolioResult,
}

impl TippingPoint {
    /// Midpoint of the bracketing interval
    pub fn value(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TippingOutcome {
    Found(Box<TippingPoint>),
    /// No verified change anywhere in the range
    NotInRange { samples: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Display)]
enum Verdict {
    #[display(fmt = "baseline")]
    Baseline,
    #[display(fmt = "tie")]
    Tie,
    #[display(fmt = "changed")]
    Changed,
}

/// Whether `result`, optimal at `conditions`, is a real improvement over `baseline` there
fn verdict<S>(solver: &S, baseline: &AssignmentSet, result: &PortfolioResult, conditions: &Conditions) -> Verdict
where
    S: Solver + ?Sized,
{
    if result.assignment_set() == *baseline {
        return Verdict::Baseline;
    }
    match solver.price(baseline, conditions) {
        // The baseline can no longer be flown as is
        None => Verdict::Changed,
        Some(value) if result.objective_value > value + TIE => Verdict::Changed,
        Some(_) => Verdict::Tie,
    }
}

/// Finds the smallest value in `range` where the optimal portfolio stops being the one optimal at
/// `range.start`, to within `tolerance`. A tolerance of zero or less bisects down to adjacent
/// floats.
///
/// The change is verified by re-pricing the starting portfolio at the new value: a different
/// assignment that merely ties does not count.
pub fn find_tipping_point<S>(
    range: &ParameterRange,
    parameter: &Parameter,
    solver: &S,
    tolerance: f64,
) -> TippingOutcome
where
    S: Solver + ?Sized,
{
    let samples = range.samples();
    let at = |value: f64| parameter.apply(solver.base(), value);

    let (first, rest) = match samples.split_first() {
        Some(split) => split,
        None => return TippingOutcome::NotInRange { samples: 0 },
    };

    let mut before = solver.solve(&at(*first));
    let baseline = before.assignment_set();
    let mut lower = *first;
    debug!("{} baseline at {}: {}", parameter, first, baseline);

    // Coarse scan for the first verified change
    let mut bracket = None;
    for &value in rest {
        let result = solver.solve(&at(value));
        match verdict(solver, &baseline, &result, &at(value)) {
            Verdict::Changed => {
                bracket = Some((value, result));
                break;
            }
            v => {
                trace!("{} = {}: {}", parameter, value, v);
                lower = value;
                before = result;
            }
        }
    }

    let (mut upper, mut after) = match bracket {
        Some(found) => found,
        None => {
            info!("{}: no change of portfolio in {} samples", parameter, samples.len());
            return TippingOutcome::NotInRange {
                samples: samples.len(),
            };
        }
    };

    // Bisection between the last unchanged sample and the first changed one. Stops at the
    // resolution of f64 when the tolerance is finer than that.
    while upper - lower > tolerance {
        let mid = (lower + upper) / 2.0;
        if mid <= lower || mid >= upper {
            break;
        }
        let result = solver.solve(&at(mid));
        match verdict(solver, &baseline, &result, &at(mid)) {
            Verdict::Changed => {
                upper = mid;
                after = result;
            }
            _ => {
                lower = mid;
                before = result;
            }
        }
    }

    let alternative = after.assignment_set();
    if before.assignment_set() == alternative {
        debug!("portfolio at {} already equals the alternative, differing from it only by a tie", lower);
    }

    let point = TippingPoint {
        parameter: parameter.clone(),
        lower,
        upper,
        baseline_value_at_upper: solver.price(&baseline, &at(upper)),
        alternative_value_at_upper: after.objective_value,
        baseline,
        alternative,
        before,
        after,
    };

    info!(
        "{} tipping point in [{:.6}, {:.6}]: {} -> {}",
        parameter, point.lower, point.upper, point.baseline, point.alternative
    );

    TippingOutcome::Found(Box::new(point))
}

/// Bunker multiplier and uniform delay ranges every desk report includes
pub fn standard_sensitivities(search: &SearchConfig) -> Vec<(Parameter, ParameterRange)> {
    vec![
        (
            Parameter::BunkerMultiplier,
            ParameterRange::inclusive(0.8, 1.5, search.bunker_step),
        ),
        (
            Parameter::PortDelay { ports: None },
            ParameterRange::inclusive(0.0, 15.0, search.delay_step),
        ),
    ]
}
