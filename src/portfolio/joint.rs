//! Joint optimization of own and market vessels against committed and market cargoes.
//!
//! Committed cargoes must be carried, by an own vessel or by a vessel chartered in from the
//! market. Own vessels left over may take market cargoes if the voyage pays well enough. A market
//! vessel is never matched with a market cargo.

use itertools::Itertools;
use log::{debug, info, warn};
use ndarray::Array2;

use crate::config::MarketConfig;
use crate::market::{self, FreightBid, HireOffer};
use crate::problem::{Cargo, Cost, Fleet, Vessel};
use crate::voyage::VoyageResult;

use super::{
    assemble, choose, evaluate_pair, rank, Assignment, AssignmentKind, AssignmentSet, Evaluator,
    Objective, OptimizeOptions, PortfolioResult, VoyageMatrix, COVERAGE_BONUS,
};

/// The four sides of the joint problem. Whether a vessel is own or chartered in, and whether a
/// cargo is committed, follows from the list it is in.
#[derive(Debug, Clone, Copy)]
pub struct JointProblem<'a> {
    pub own: &'a [Vessel],
    pub market_vessels: &'a [Vessel],
    pub committed: &'a [Cargo],
    pub market_cargoes: &'a [Cargo],
}

/// (profit, solver weight) of `voyage` in a cell of the joint matrix, or None if the combination
/// is not allowed
fn cell_value(own: bool, committed: bool, voyage: &VoyageResult, market: &MarketConfig) -> Option<(Cost, f64)> {
    match (own, committed) {
        (true, true) => Some((voyage.net_profit, voyage.net_profit + COVERAGE_BONUS)),
        (true, false) => {
            let daily = if voyage.total_days > 0.0 {
                voyage.net_profit / voyage.total_days
            } else {
                0.0
            };
            let worth_it = voyage.net_profit > market.min_arbitrage_profit.max(0.0)
                && daily >= market.min_arbitrage_daily_profit;
            worth_it.then(|| (voyage.net_profit, voyage.net_profit))
        }
        (false, true) => {
            let profit = market::hired_profit(voyage, market.market_hire_rate);
            Some((profit, profit + COVERAGE_BONUS))
        }
        (false, false) => None,
    }
}

impl<'a> JointProblem<'a> {
    pub fn new(
        own: &'a [Vessel],
        market_vessels: &'a [Vessel],
        committed: &'a [Cargo],
        market_cargoes: &'a [Cargo],
    ) -> Self {
        Self {
            own,
            market_vessels,
            committed,
            market_cargoes,
        }
    }

    /// Own vessels first, then market vessels
    pub fn vessels(&self) -> Vec<Vessel> {
        self.own.iter().chain(self.market_vessels).cloned().collect()
    }

    /// Committed cargoes first, then market cargoes
    pub fn cargoes(&self) -> Vec<Cargo> {
        self.committed.iter().chain(self.market_cargoes).cloned().collect()
    }

    fn is_own(&self, vessel: usize) -> bool {
        vessel < self.own.len()
    }

    fn is_committed(&self, cargo: usize) -> bool {
        cargo < self.committed.len()
    }

    fn assignment(&self, v: usize, c: usize, voyage: &VoyageResult, market: &MarketConfig) -> Assignment {
        let own = self.is_own(v);
        let fleet = if own { Fleet::Own } else { Fleet::Market };
        let (profit, max_hire_rate) = if own {
            (voyage.net_profit, None)
        } else {
            (
                market::hired_profit(voyage, market.market_hire_rate),
                Some(market::max_hire_rate(voyage, market.target_tce)),
            )
        };

        Assignment {
            vessel: voyage.vessel.clone(),
            cargo: voyage.cargo.clone(),
            kind: AssignmentKind::new(fleet, self.is_committed(c)),
            regime: voyage.regime,
            profit,
            tce: voyage.tce,
            days: voyage.total_days,
            max_hire_rate,
            voyage: voyage.clone(),
        }
    }

    /// The most every market vessel can be paid for every committed cargo it can reach in time,
    /// where that is more than nothing
    fn hire_offers(&self, matrix: &VoyageMatrix, market: &MarketConfig) -> Vec<HireOffer> {
        let own = self.own.len();
        (own..matrix.vessels().len())
            .cartesian_product(0..self.committed.len())
            .filter_map(|(v, c)| {
                let cell = matrix.cell(v, c);
                let choice = choose(cell, |voyage| cell_value(false, true, voyage, market))?;
                let voyage = &cell.options[choice.option];
                let max_hire_rate = market::max_hire_rate(voyage, market.target_tce);
                // Nothing to offer if the cargo can not even pay the target TCE
                if max_hire_rate <= 0.0 {
                    return None;
                }
                Some(HireOffer {
                    vessel: voyage.vessel.clone(),
                    cargo: voyage.cargo.clone(),
                    max_hire_rate,
                    days: voyage.total_days,
                    profit_at_market_rate: choice.value,
                })
            })
            .collect()
    }

    /// The lowest freight every own vessel should bid for every market cargo it can reach in time
    fn freight_bids(&self, matrix: &VoyageMatrix, vessels: &[Vessel], cargoes: &[Cargo], market: &MarketConfig) -> Vec<FreightBid> {
        let committed = self.committed.len();
        (0..self.own.len())
            .cartesian_product(committed..matrix.cargoes().len())
            .filter_map(|(v, c)| {
                let cell = matrix.cell(v, c);
                let choice = choose(cell, |voyage| Some((voyage.net_profit, voyage.net_profit)))?;
                let voyage = &cell.options[choice.option];
                Some(FreightBid {
                    vessel: voyage.vessel.clone(),
                    cargo: voyage.cargo.clone(),
                    min_rate: market::min_freight_bid(
                        voyage,
                        cargoes[c].commission(),
                        vessels[v].hire_rate(),
                        market.target_tce,
                    ),
                    reference_rate: voyage.freight_rate,
                    reference_estimated: voyage.freight_estimated,
                })
            })
            .collect()
    }

    /// The best joint portfolio followed by the next `k - 1` best. The joint problem always
    /// maximizes profit; `options.objective` and `options.include_non_positive` are not used.
    pub fn ranked(&self, evaluator: &Evaluator, options: &OptimizeOptions, k: usize) -> Vec<PortfolioResult> {
        let vessels = self.vessels();
        let cargoes = self.cargoes();
        let market = &evaluator.context().config.market;

        let matrix = VoyageMatrix::build(evaluator, &vessels, &cargoes, options.speed, &options.conditions);
        let choices = Array2::from_shape_fn(matrix.dim(), |(v, c)| {
            let (own, committed) = (self.is_own(v), self.is_committed(c));
            choose(matrix.cell(v, c), |voyage| cell_value(own, committed, voyage, market))
        });

        let uncoverable = (0..self.committed.len())
            .filter(|&c| (0..vessels.len()).all(|v| choices[[v, c]].is_none()))
            .map(|c| cargoes[c].name())
            .collect::<Vec<_>>();
        if !uncoverable.is_empty() {
            warn!("no vessel can carry committed cargo(es) {:?}", uncoverable);
        }

        let hire_offers = self.hire_offers(&matrix, market);
        let freight_bids = self.freight_bids(&matrix, &vessels, &cargoes, market);
        debug!("{} hire offers, {} freight bids", hire_offers.len(), freight_bids.len());

        let mut sets = rank(&choices, 0.0, k.max(1));
        if sets.is_empty() {
            warn!("assignment solver found no solution, leaving every vessel idle");
            sets.push(Vec::new());
        }

        let portfolios = sets
            .iter()
            .map(|pairs| {
                let mut result = assemble(
                    &matrix,
                    &choices,
                    pairs,
                    Objective::Profit,
                    &options.conditions,
                    |v, c, voyage| self.assignment(v, c, voyage, market),
                );
                result.coverage_gaps = self
                    .committed
                    .iter()
                    .filter(|cargo| result.assignments.iter().all(|a| a.cargo != cargo.name()))
                    .map(|cargo| cargo.name().to_string())
                    .collect();
                result.hire_offers = hire_offers.clone();
                result.freight_bids = freight_bids.clone();
                result
            })
            .collect::<Vec<_>>();

        if let Some(best) = portfolios.first() {
            info!(
                "joint portfolio: {} committed, {} arbitrage, {} hire-in, profit {:.0}, {} coverage gap(s)",
                best.of_kind(AssignmentKind::Committed).count(),
                best.of_kind(AssignmentKind::Arbitrage).count(),
                best.of_kind(AssignmentKind::HireIn).count(),
                best.total_profit,
                best.coverage_gaps.len()
            );
        }

        portfolios
    }

    pub fn optimize(&self, evaluator: &Evaluator, options: &OptimizeOptions) -> PortfolioResult {
        let mut ranked = self.ranked(evaluator, options, 1);
        // ranked never returns an empty ranking
        ranked.swap_remove(0)
    }

    /// Total profit of a fixed assignment set, or None if any of its pairs is unknown or not
    /// allowed under `options`
    pub fn price(&self, evaluator: &Evaluator, options: &OptimizeOptions, set: &AssignmentSet) -> Option<Cost> {
        let market = &evaluator.context().config.market;
        let vessels = self.vessels();
        let cargoes = self.cargoes();

        set.pairs()
            .map(|(vessel, cargo)| {
                let v = vessels.iter().position(|x| x.name() == vessel)?;
                let c = cargoes.iter().position(|x| x.name() == cargo)?;
                let (own, committed) = (self.is_own(v), self.is_committed(c));
                let cell = evaluate_pair(evaluator, &vessels[v], &cargoes[c], options.speed, &options.conditions);
                choose(&cell, |voyage| cell_value(own, committed, voyage, market)).map(|choice| choice.value)
            })
            .sum()
    }
}

/// The best joint portfolio of own and market vessels over committed and market cargoes
pub fn optimize_full_portfolio(
    evaluator: &Evaluator,
    own: &[Vessel],
    market_vessels: &[Vessel],
    committed: &[Cargo],
    market_cargoes: &[Cargo],
    options: &OptimizeOptions,
) -> PortfolioResult {
    JointProblem::new(own, market_vessels, committed, market_cargoes).optimize(evaluator, options)
}

/// The `k` best joint portfolios, best first
pub fn optimize_full_ranked(
    evaluator: &Evaluator,
    own: &[Vessel],
    market_vessels: &[Vessel],
    committed: &[Cargo],
    market_cargoes: &[Cargo],
    options: &OptimizeOptions,
    k: usize,
) -> Vec<PortfolioResult> {
    JointProblem::new(own, market_vessels, committed, market_cargoes).ranked(evaluator, options, k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::fixtures;

    struct Book {
        own: Vec<Vessel>,
        market_vessels: Vec<Vessel>,
        committed: Vec<Cargo>,
        market_cargoes: Vec<Cargo>,
    }

    impl Book {
        fn problem(&self) -> JointProblem<'_> {
            JointProblem::new(&self.own, &self.market_vessels, &self.committed, &self.market_cargoes)
        }
    }

    fn book() -> Book {
        Book {
            own: vec![fixtures::vessel("ANN", "QINGDAO")],
            market_vessels: vec![fixtures::market_vessel("FAR", "ROTTERDAM")],
            committed: vec![
                fixtures::cargo("ORE", "PORT HEDLAND", "LIANYUNGANG"),
                fixtures::cargo("BAUXITE", "KAMSAR ANCHORAGE", "QINGDAO"),
            ],
            market_cargoes: vec![fixtures::market_cargo("COAL", "DAMPIER", "QINGDAO", Some(12.0))],
        }
    }

    #[test]
    fn covers_committed_cargoes_with_hired_tonnage() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let book = book();

        let result = book.problem().optimize(&evaluator, &OptimizeOptions::default());
        assert!(result.coverage_gaps.is_empty());
        assert_eq!(result.assignments.len(), 2);

        let ann = result.assignment("ANN").unwrap();
        assert_eq!((ann.cargo.as_str(), ann.kind), ("ORE", AssignmentKind::Committed));
        assert_eq!(ann.max_hire_rate, None);

        let far = result.assignment("FAR").unwrap();
        assert_eq!((far.cargo.as_str(), far.kind), ("BAUXITE", AssignmentKind::HireIn));
        assert!(far.max_hire_rate.unwrap() >= 0.0);
        let hired = far.voyage.net_freight - far.voyage.voyage_costs() - 18_000.0 * far.days;
        assert!((far.profit - hired).abs() < 1e-6);

        // The market cargo has nobody left to carry it
        assert_eq!(result.unassigned_cargoes, vec!["COAL".to_string()]);
        assert!(result
            .hire_offers
            .iter()
            .any(|o| o.vessel == "FAR" && o.cargo == "BAUXITE"));
        assert!(result
            .freight_bids
            .iter()
            .any(|b| b.vessel == "ANN" && b.cargo == "COAL" && b.min_rate > 0.0));
    }

    #[test]
    fn covers_committed_cargo_at_a_loss() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let own = vec![fixtures::vessel("ANN", "QINGDAO")];
        let committed = vec![fixtures::cargo("ORE", "PORT HEDLAND", "LIANYUNGANG").with_freight_rate(1.0)];
        let market_cargoes = vec![fixtures::market_cargo("COAL", "DAMPIER", "QINGDAO", Some(12.0))];

        let result = optimize_full_portfolio(
            &evaluator,
            &own,
            &[],
            &committed,
            &market_cargoes,
            &OptimizeOptions::default(),
        );
        assert!(result.coverage_gaps.is_empty());
        assert_eq!(result.assignment("ANN").map(|a| a.cargo.as_str()), Some("ORE"));
        assert!(result.total_profit < 0.0);
    }

    #[test]
    fn arbitrage_needs_the_minimum_daily_profit() {
        let (distances, prices, _) = fixtures::world();
        let own = vec![fixtures::vessel("ANN", "QINGDAO")];
        let market_cargoes = vec![fixtures::market_cargo("COAL", "DAMPIER", "QINGDAO", Some(12.0))];

        let config = Config::default();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let result = optimize_full_portfolio(&evaluator, &own, &[], &[], &market_cargoes, &OptimizeOptions::default());
        let ann = result.assignment("ANN").unwrap();
        assert_eq!(ann.kind, AssignmentKind::Arbitrage);
        assert!(ann.profit / ann.days >= 5_000.0);

        let mut strict = Config::default();
        strict.market.min_arbitrage_daily_profit = 1e7;
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &strict));
        let result = optimize_full_portfolio(&evaluator, &own, &[], &[], &market_cargoes, &OptimizeOptions::default());
        assert!(result.assignments.is_empty());
        assert!(result.coverage_gaps.is_empty());

        // A good day rate is not enough if the voyage as a whole earns too little
        let mut strict = Config::default();
        strict.market.min_arbitrage_profit = ann.profit;
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &strict));
        let result = optimize_full_portfolio(&evaluator, &own, &[], &[], &market_cargoes, &OptimizeOptions::default());
        assert!(result.assignments.is_empty());
    }

    #[test]
    fn hire_offers_are_only_made_when_positive() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let market_vessels = vec![fixtures::market_vessel("FAR", "ROTTERDAM")];
        let committed = vec![fixtures::cargo("BAUXITE", "KAMSAR ANCHORAGE", "QINGDAO").with_freight_rate(1.0)];

        let result = optimize_full_portfolio(
            &evaluator,
            &[],
            &market_vessels,
            &committed,
            &[],
            &OptimizeOptions::default(),
        );
        // Still hired to cover the cargo, but the cargo can not pay anything for the vessel
        let far = result.assignment("FAR").unwrap();
        assert_eq!(far.kind, AssignmentKind::HireIn);
        assert_eq!(far.max_hire_rate, Some(0.0));
        assert!(result.hire_offers.is_empty());

        let result = book().problem().optimize(&evaluator, &OptimizeOptions::default());
        assert!(!result.hire_offers.is_empty());
        assert!(result.hire_offers.iter().all(|o| o.max_hire_rate > 0.0));
    }

    #[test]
    fn market_vessels_never_take_market_cargoes() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let market_vessels = vec![fixtures::market_vessel("SPOT", "QINGDAO")];
        let market_cargoes = vec![fixtures::market_cargo("COAL", "DAMPIER", "QINGDAO", Some(30.0))];

        let result = optimize_full_portfolio(
            &evaluator,
            &[],
            &market_vessels,
            &[],
            &market_cargoes,
            &OptimizeOptions::default(),
        );
        assert!(result.assignments.is_empty());
        assert_eq!(result.unassigned_vessels, vec!["SPOT".to_string()]);
    }

    #[test]
    fn reports_gaps_nobody_can_fill() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let own = vec![fixtures::vessel("ANN", "QINGDAO")];
        // Nobody in Qingdao reaches Kamsar in ten days
        let committed = vec![fixtures::cargo("BAUXITE", "KAMSAR ANCHORAGE", "QINGDAO")];

        let result = optimize_full_portfolio(&evaluator, &own, &[], &committed, &[], &OptimizeOptions::default());
        assert_eq!(result.coverage_gaps, vec!["BAUXITE".to_string()]);
    }

    #[test]
    fn ranking_and_pricing_agree() {
        let (distances, prices, config) = fixtures::world();
        let evaluator = Evaluator::new(fixtures::context(&distances, &prices, &config));
        let mut book = book();
        book.own.push(fixtures::vessel("DRY", "MAP TA PHUT"));
        let options = OptimizeOptions::default();

        let ranked = book.problem().ranked(&evaluator, &options, 4);
        assert!(ranked.iter().map(|p| p.assignment_set()).all_unique());
        for portfolio in &ranked {
            let priced = book.problem().price(&evaluator, &options, &portfolio.assignment_set()).unwrap();
            assert!((priced - portfolio.total_profit).abs() < 1e-6);
        }
        assert_eq!(ranked[0], book.problem().optimize(&evaluator, &options));
    }
}
