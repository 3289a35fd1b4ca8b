//! Assigning vessels to cargoes.
//!
//! Every vessel/cargo pair is priced by the voyage engine ([`matrix`]). Each pair is reduced to a
//! single value, and the resulting assignment problem is solved exactly ([`hungarian`]), or ranked
//! to give the next best alternatives. [`joint`] layers the market side on top: chartering in
//! market vessels for committed cargoes and bidding own vessels on market cargoes.

pub mod hungarian;
pub mod joint;
pub mod matrix;

use std::collections::BTreeSet;
use std::fmt;

use derive_more::Display;
use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::conditions::Conditions;
use crate::market::{self, FreightBid, HireOffer};
use crate::problem::{Cargo, Cost, Days, Fleet, SpeedRegime, Vessel};
use crate::voyage::VoyageResult;

pub use joint::{optimize_full_portfolio, optimize_full_ranked, JointProblem};
pub use matrix::{Cell, Evaluator, Objective, SpeedMode, VoyageMatrix};

use hungarian::FORBIDDEN;

/// Added to the value of cells the solver must prefer over any amount of profit. Large enough to
/// dominate the profit of a whole portfolio, small enough to keep sums exact to the cent.
pub const COVERAGE_BONUS: f64 = 1e9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizeOptions {
    pub speed: SpeedMode,
    pub objective: Objective,
    /// Allow assignments with a non-positive objective value. Covering more cargoes then takes
    /// priority over the objective.
    pub include_non_positive: bool,
    pub conditions: Conditions,
}

impl Default for OptimizeOptions {
    fn default() -> Self {
        Self {
            speed: SpeedMode::Dual,
            objective: Objective::Profit,
            include_non_positive: false,
            conditions: Conditions::default(),
        }
    }
}

/// How a vessel ended up on a cargo
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentKind {
    /// Own vessel on a committed cargo
    #[display(fmt = "committed")]
    Committed,
    /// Own vessel on a market cargo
    #[display(fmt = "arbitrage")]
    Arbitrage,
    /// Chartered-in market vessel on a committed cargo
    #[display(fmt = "hire-in")]
    HireIn,
    /// Market vessel on a market cargo
    #[display(fmt = "relet")]
    Relet,
}

impl AssignmentKind {
    pub fn new(fleet: Fleet, committed: bool) -> AssignmentKind {
        match (fleet, committed) {
            (Fleet::Own, true) => AssignmentKind::Committed,
            (Fleet::Own, false) => AssignmentKind::Arbitrage,
            (Fleet::Market, true) => AssignmentKind::HireIn,
            (Fleet::Market, false) => AssignmentKind::Relet,
        }
    }

    pub fn of(vessel: &Vessel, cargo: &Cargo) -> AssignmentKind {
        AssignmentKind::new(vessel.fleet(), cargo.is_committed())
    }
}

/// One vessel carrying one cargo in a portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub vessel: String,
    pub cargo: String,
    pub kind: AssignmentKind,
    pub regime: SpeedRegime,
    /// Profit this assignment contributes to the portfolio
    pub profit: Cost,
    pub tce: Cost,
    pub days: Days,
    /// The most a chartered-in vessel can be paid while earning the target TCE
    pub max_hire_rate: Option<Cost>,
    pub voyage: VoyageResult,
}

/// The identity of a portfolio: which vessel carries which cargo
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AssignmentSet(BTreeSet<(String, String)>);

impl AssignmentSet {
    pub fn new() -> AssignmentSet {
        AssignmentSet::default()
    }

    pub fn insert(&mut self, vessel: &str, cargo: &str) -> bool {
        self.0.insert((vessel.to_string(), cargo.to_string()))
    }

    pub fn contains(&self, vessel: &str, cargo: &str) -> bool {
        self.0.contains(&(vessel.to_string(), cargo.to_string()))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// (vessel, cargo) pairs, ordered by vessel name
    pub fn pairs(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(v, c)| (v.as_str(), c.as_str()))
    }
}

impl<'a> FromIterator<(&'a str, &'a str)> for AssignmentSet {
    fn from_iter<T: IntoIterator<Item = (&'a str, &'a str)>>(iter: T) -> Self {
        let mut set = AssignmentSet::new();
        for (vessel, cargo) in iter {
            set.insert(vessel, cargo);
        }
        set
    }
}

impl fmt::Display for AssignmentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "(empty)");
        }
        let pairs = self.0.iter().map(|(v, c)| format!("{} -> {}", v, c)).join(", ");
        write!(f, "{}", pairs)
    }
}

/// An optimized portfolio
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioResult {
    pub assignments: Vec<Assignment>,
    pub unassigned_vessels: Vec<String>,
    pub unassigned_cargoes: Vec<String>,
    pub total_profit: Cost,
    pub total_tce: Cost,
    pub average_tce: Cost,
    pub objective: Objective,
    /// Sum of the objective over all assignments
    pub objective_value: f64,
    pub conditions: Conditions,
    /// Committed cargoes nobody carries
    pub coverage_gaps: Vec<String>,
    pub hire_offers: Vec<HireOffer>,
    pub freight_bids: Vec<FreightBid>,
}

impl PortfolioResult {
    pub fn assignment_set(&self) -> AssignmentSet {
        self.assignments
            .iter()
            .map(|a| (a.vessel.as_str(), a.cargo.as_str()))
            .collect()
    }

    /// The assignment of `vessel`, if it has one
    pub fn assignment(&self, vessel: &str) -> Option<&Assignment> {
        self.assignments.iter().find(|a| a.vessel == vessel)
    }

    pub fn of_kind(&self, kind: AssignmentKind) -> impl Iterator<Item = &Assignment> {
        self.assignments.iter().filter(move |a| a.kind == kind)
    }
}

/// The option picked for one cell of the matrix
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Choice {
    /// Index into the cell's options
    pub option: usize,
    /// Objective value
    pub value: f64,
    /// What the solver maximizes; the value plus any bonus
    pub weight: f64,
}

/// The best option of `cell` that makes the laycan and that `rule` accepts. `rule` gives the
/// (value, weight) of an option, or None if it may not be used. Earlier options win ties.
pub(crate) fn choose<F>(cell: &Cell, rule: F) -> Option<Choice>
where
    F: Fn(&VoyageResult) -> Option<(f64, f64)>,
{
    cell.options
        .iter()
        .enumerate()
        .filter(|(_, voyage)| voyage.can_make_laycan)
        .filter_map(|(option, voyage)| {
            rule(voyage).map(|(value, weight)| Choice {
                option,
                value,
                weight,
            })
        })
        .fold(None, |best, choice| match best {
            Some(b) if b.weight >= choice.weight => Some(b),
            _ => Some(choice),
        })
}

/// The `k` best sets of (vessel, cargo) index pairs for `choices`, best first.
///
/// Each vessel gets a private idle column costing `idle_cost`, so leaving it idle is always
/// possible. A positive idle cost makes the solver prefer covering more cargoes.
pub(crate) fn rank(choices: &Array2<Option<Choice>>, idle_cost: f64, k: usize) -> Vec<Vec<(usize, usize)>> {
    let (n, m) = choices.dim();
    let costs = Array2::from_shape_fn((n, m + n), |(i, j)| {
        if j < m {
            choices[[i, j]].map(|c| -c.weight).unwrap_or(FORBIDDEN)
        } else if j - m == i {
            idle_cost
        } else {
            FORBIDDEN
        }
    });

    hungarian::k_best(&costs, k)
        .into_iter()
        .map(|solution| {
            solution
                .columns
                .iter()
                .enumerate()
                .filter(|&(_, &j)| j < m)
                .map(|(i, &j)| (i, j))
                .collect()
        })
        .collect()
}

/// Builds the portfolio for `pairs`. `assign` turns a chosen voyage into an assignment.
pub(crate) fn assemble<F>(
    matrix: &VoyageMatrix,
    choices: &Array2<Option<Choice>>,
    pairs: &[(usize, usize)],
    objective: Objective,
    conditions: &Conditions,
    assign: F,
) -> PortfolioResult
where
    F: Fn(usize, usize, &VoyageResult) -> Assignment,
{
    let mut assignments = Vec::with_capacity(pairs.len());
    let mut objective_value = 0.0;
    for &(v, c) in pairs {
        if let Some(choice) = choices[[v, c]] {
            let voyage = &matrix.cell(v, c).options[choice.option];
            objective_value += choice.value;
            assignments.push(assign(v, c, voyage));
        }
    }

    let unassigned_vessels = (0..matrix.vessels().len())
        .filter(|v| !pairs.iter().any(|(pv, _)| pv == v))
        .map(|v| matrix.vessels()[v].clone())
        .collect();
    let unassigned_cargoes = (0..matrix.cargoes().len())
        .filter(|c| !pairs.iter().any(|(_, pc)| pc == c))
        .map(|c| matrix.cargoes()[c].clone())
        .collect();

    let total_profit = assignments.iter().map(|a| a.profit).sum();
    let total_tce: Cost = assignments.iter().map(|a| a.tce).sum();
    let average_tce = if assignments.is_empty() {
        0.0
    } else {
        total_tce / assignments.len() as f64
    };

    PortfolioResult {
        assignments,
        unassigned_vessels,
        unassigned_cargoes,
        total_profit,
        total_tce,
        average_tce,
        objective,
        objective_value,
        conditions: conditions.clone(),
        coverage_gaps: Vec::new(),
        hire_offers: Vec::new(),
        freight_bids: Vec::new(),
    }
}

/// Reduces every cell to the option the single-sided optimizer would use
fn single_sided_choices(matrix: &VoyageMatrix, options: &OptimizeOptions) -> Array2<Option<Choice>> {
    let objective = options.objective;
    let include = options.include_non_positive;
    matrix.cells().map(|cell| {
        choose(cell, |voyage| {
            let value = objective.value(voyage);
            (include || value > 0.0).then(|| (value, value))
        })
    })
}

fn single_sided_assignment(
    vessel: &Vessel,
    cargo: &Cargo,
    voyage: &VoyageResult,
    target_tce: Cost,
) -> Assignment {
    let kind = AssignmentKind::of(vessel, cargo);
    Assignment {
        vessel: vessel.name().to_string(),
        cargo: cargo.name().to_string(),
        kind,
        regime: voyage.regime,
        profit: voyage.net_profit,
        tce: voyage.tce,
        days: voyage.total_days,
        max_hire_rate: (!vessel.is_own()).then(|| market::max_hire_rate(voyage, target_tce)),
        voyage: voyage.clone(),
    }
}

/// The best assignment of `vessels` to `cargoes`
pub fn optimize(
    evaluator: &Evaluator,
    vessels: &[Vessel],
    cargoes: &[Cargo],
    options: &OptimizeOptions,
) -> PortfolioResult {
    let mut ranked = optimize_ranked(evaluator, vessels, cargoes, options, 1);
    // optimize_ranked never returns an empty ranking
    ranked.swap_remove(0)
}

/// The best portfolio followed by the next `k - 1` best distinct portfolios
pub fn optimize_ranked(
    evaluator: &Evaluator,
    vessels: &[Vessel],
    cargoes: &[Cargo],
    options: &OptimizeOptions,
    k: usize,
) -> Vec<PortfolioResult> {
    let matrix = VoyageMatrix::build(evaluator, vessels, cargoes, options.speed, &options.conditions);
    let choices = single_sided_choices(&matrix, options);
    let idle_cost = if options.include_non_positive {
        COVERAGE_BONUS
    } else {
        0.0
    };
    let target_tce = evaluator.context().config.market.target_tce;

    let mut sets = rank(&choices, idle_cost, k.max(1));
    if sets.is_empty() {
        warn!("assignment solver found no solution, leaving every vessel idle");
        sets.push(Vec::new());
    }

    let portfolios = sets
        .iter()
        .map(|pairs| {
            assemble(&matrix, &choices, pairs, options.objective, &options.conditions, |v, c, voyage| {
                single_sided_assignment(&vessels[v], &cargoes[c], voyage, target_tce)
            })
        })
        .collect::<Vec<_>>();

    if let Some(best) = portfolios.first() {
        info!(
            "best of {} portfolio(s): {} assignments, {} {:.0}, profit {:.0}",
            portfolios.len(),
            best.assignments.len(),
            options.objective,
            best.objective_value,
            best.total_profit
        );
        debug!("unassigned cargoes: {:?}", best.unassigned_cargoes);
    }

    portfolios
}

/// The objective value of a fixed assignment set, or None if any of its pairs is unknown or may
/// not be assigned under `options`.
pub fn price(
    evaluator: &Evaluator,
    vessels: &[Vessel],
    cargoes: &[Cargo],
    options: &OptimizeOptions,
    set: &AssignmentSet,
) -> Option<f64> {
    let objective = options.objective;
    let include = options.include_non_positive;
    set.pairs()
        .map(|(v, c)| {
            let vessel = vessels.iter().find(|x| x.name() == v)?;
            let cargo = cargoes.iter().find(|x| x.name() == c)?;
            let cell = evaluate_pair(evaluator, vessel, cargo, options.speed, &options.conditions);
            choose(&cell, |voyage| {
                let value = objective.value(voyage);
                (include || value > 0.0).then(|| (value, value))
            })
            .map(|choice| choice.value)
        })
        .sum()
}

/// The cell of a single pair, as [`VoyageMatrix::build`] would compute it
pub(crate) fn evaluate_pair(
    evaluator: &Evaluator,
    vessel: &Vessel,
    cargo: &Cargo,
    speed: SpeedMode,
    conditions: &Conditions,
) -> Cell {
    let adjustments = conditions.adjustments(cargo);
    let mut cell = Cell::default();
    for &regime in speed.regimes() {
        match evaluator.voyage(vessel, cargo, regime, adjustments) {
            Ok(voyage) => cell.options.push(voyage),
            Err(e) => cell.errors.push(e),
        }
    }
    cell
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use rand::rngs::StdRng;
    use rand::seq::SliceRandom;
    use rand::SeedableRng;

    fn fleet() -> (Vec<Vessel>, Vec<Cargo>) {
        let vessels = vec![
            fixtures::vessel("ANN", "QINGDAO"),
            fixtures::vessel("DRY", "MAP TA PHUT"),
            fixtures::vessel("GLORY", "GWANGYANG"),
            fixtures::vessel("FAR", "ROTTERDAM"),
        ];
        let cargoes = vec![
            fixtures::cargo("ORE", "PORT HEDLAND", "LIANYUNGANG"),
            fixtures::cargo("BAUXITE", "KAMSAR ANCHORAGE", "QINGDAO"),
            fixtures::cargo("COAL", "DAMPIER", "QINGDAO").with_freight_rate(12.0),
        ];
        (vessels, cargoes)
    }

    /// Assigns pairs in random order, skipping anything already taken
    fn random_greedy(choices: &Array2<Option<Choice>>, rng: &mut StdRng) -> f64 {
        let (n, m) = choices.dim();
        let mut pairs = itertools::iproduct!(0..n, 0..m).collect::<Vec<_>>();
        pairs.shuffle(rng);
        let (mut vessels, mut cargoes) = (vec![false; n], vec![false; m]);
        let mut total = 0.0;
        for (v, c) in pairs {
            if let Some(choice) = choices[[v, c]] {
                if !vessels[v] && !cargoes[c] {
                    vessels[v] = true;
                    cargoes[c] = true;
                    total += choice.value;
                }
            }
        }
        total
    }

    #[test]
    fn beats_any_greedy_assignment() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let (vessels, cargoes) = fleet();
        let options = OptimizeOptions::default();

        let best = optimize(&evaluator, &vessels, &cargoes, &options);
        let matrix = VoyageMatrix::build(&evaluator, &vessels, &cargoes, options.speed, &options.conditions);
        let choices = single_sided_choices(&matrix, &options);

        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            assert!(best.total_profit >= random_greedy(&choices, &mut rng) - 1e-6);
        }
    }

    #[test]
    fn every_vessel_and_cargo_is_accounted_for() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let (vessels, cargoes) = fleet();

        let best = optimize(&evaluator, &vessels, &cargoes, &OptimizeOptions::default());
        assert_eq!(best.assignments.len() + best.unassigned_vessels.len(), vessels.len());
        assert_eq!(best.assignments.len() + best.unassigned_cargoes.len(), cargoes.len());
        assert!(best.assignments.iter().all(|a| a.voyage.can_make_laycan && a.profit > 0.0));
        assert!(best.assignments.iter().map(|a| &a.cargo).all_unique());
        // Only the vessel in Rotterdam reaches Kamsar within the laycan
        assert_eq!(best.assignment("FAR").map(|a| a.cargo.as_str()), Some("BAUXITE"));
    }

    #[test]
    fn is_deterministic() {
        let (distances, prices, config) = fixtures::world();
        let (vessels, cargoes) = fleet();
        let options = OptimizeOptions::default();

        let first = optimize(
            &Evaluator::new(fixtures::context(&distances, &prices, &config)),
            &vessels,
            &cargoes,
            &options,
        );
        let second = optimize(
            &Evaluator::new(fixtures::context(&distances, &prices, &config)),
            &vessels,
            &cargoes,
            &options,
        );
        assert_eq!(first, second);
    }

    #[test]
    fn ranked_alternatives_are_distinct_and_non_increasing() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let (vessels, cargoes) = fleet();
        let options = OptimizeOptions::default();

        let ranked = optimize_ranked(&evaluator, &vessels, &cargoes, &options, 5);
        assert!(!ranked.is_empty());
        assert_eq!(ranked[0], optimize(&evaluator, &vessels, &cargoes, &options));
        for pair in ranked.windows(2) {
            assert!(pair[0].objective_value >= pair[1].objective_value - 1e-6);
        }
        assert!(ranked.iter().map(|p| p.assignment_set()).all_unique());
    }

    #[test]
    fn non_positive_mode_covers_more() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let vessels = vec![fixtures::vessel("ANN", "QINGDAO")];
        let cargoes = vec![fixtures::cargo("ORE", "PORT HEDLAND", "LIANYUNGANG").with_freight_rate(1.0)];

        let strict = optimize(&evaluator, &vessels, &cargoes, &OptimizeOptions::default());
        assert!(strict.assignments.is_empty());
        assert_eq!(strict.unassigned_cargoes, vec!["ORE".to_string()]);

        let options = OptimizeOptions {
            include_non_positive: true,
            ..OptimizeOptions::default()
        };
        let loose = optimize(&evaluator, &vessels, &cargoes, &options);
        assert_eq!(loose.assignments.len(), 1);
        assert!(loose.total_profit < 0.0);
    }

    #[test]
    fn assignments_are_labelled_by_side() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let vessels = vec![fixtures::market_vessel("SPOT", "QINGDAO")];
        let cargoes = vec![fixtures::market_cargo("ORE", "PORT HEDLAND", "LIANYUNGANG", Some(1.0))];
        let options = OptimizeOptions {
            include_non_positive: true,
            ..OptimizeOptions::default()
        };

        let result = optimize(&evaluator, &vessels, &cargoes, &options);
        assert_eq!(result.assignments.len(), 1);
        assert_eq!(result.assignments[0].kind, AssignmentKind::Relet);
        assert!(result.assignments[0].max_hire_rate.is_some());
        assert_eq!(result.of_kind(AssignmentKind::Relet).count(), 1);
    }

    #[test]
    fn empty_inputs_give_an_empty_portfolio() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let (vessels, _) = fleet();

        let result = optimize(&evaluator, &vessels, &[], &OptimizeOptions::default());
        assert!(result.assignments.is_empty());
        assert_eq!(result.unassigned_vessels.len(), vessels.len());
        assert_eq!(result.average_tce, 0.0);
    }

    #[test]
    fn pricing_the_optimum_reproduces_its_value() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let (vessels, cargoes) = fleet();
        let options = OptimizeOptions::default();

        let best = optimize(&evaluator, &vessels, &cargoes, &options);
        let priced = price(&evaluator, &vessels, &cargoes, &options, &best.assignment_set()).unwrap();
        assert!((priced - best.objective_value).abs() < 1e-6);

        let unknown: AssignmentSet = [("ANN", "NOTHING")].into_iter().collect();
        assert_eq!(price(&evaluator, &vessels, &cargoes, &options, &unknown), None);
    }
}
