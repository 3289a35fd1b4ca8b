//! Market side economics: benchmark freight for unpriced cargoes, what a chartered-in vessel
//! can be paid, and what freight an own vessel needs to bid.

use serde::Serialize;

use crate::config::MarketConfig;
use crate::distance::normalize;
use crate::problem::{Cargo, Cost};
use crate::voyage::VoyageResult;

/// The freight rate of `cargo`, and whether it is a benchmark estimate
pub fn freight_rate(cargo: &Cargo, config: &MarketConfig) -> (f64, bool) {
    match cargo.freight_rate() {
        Some(rate) if rate > 0.0 => (rate, false),
        _ => (estimate_freight_rate(cargo, config), true),
    }
}

/// The benchmark rate for the region `cargo` loads in
pub fn estimate_freight_rate(cargo: &Cargo, config: &MarketConfig) -> f64 {
    let port = normalize(&cargo.load().port);
    config
        .freight_regions
        .iter()
        .find(|region| region.ports.iter().any(|p| port.contains(&normalize(p))))
        .map(|region| region.rate)
        .unwrap_or(config.default_freight_rate)
}

/// The highest daily hire a chartered-in vessel can be paid while the voyage still earns
/// `target_tce` per day. Never negative.
pub fn max_hire_rate(voyage: &VoyageResult, target_tce: Cost) -> Cost {
    if voyage.total_days <= 0.0 {
        return 0.0;
    }
    ((voyage.net_freight - voyage.voyage_costs() - target_tce * voyage.total_days)
        / voyage.total_days)
        .max(0.0)
}

/// Profit of a voyage by a chartered-in vessel paid `hire_rate` per day
pub fn hired_profit(voyage: &VoyageResult, hire_rate: Cost) -> Cost {
    voyage.net_freight - voyage.voyage_costs() - hire_rate * voyage.total_days
}

/// The lowest freight rate per tonne that covers voyage costs, hire and `target_tce` per day.
/// `hire_rate` is the daily cost of the vessel carrying the cargo.
pub fn min_freight_bid(voyage: &VoyageResult, commission: f64, hire_rate: Cost, target_tce: Cost) -> f64 {
    let required =
        voyage.voyage_costs() + hire_rate * voyage.total_days + target_tce * voyage.total_days;
    required / (1.0 - commission) / voyage.quantity
}

/// The most a market vessel can be paid to carry a committed cargo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HireOffer {
    pub vessel: String,
    pub cargo: String,
    pub max_hire_rate: Cost,
    pub days: f64,
    /// Profit at the assumed market hire rate
    pub profit_at_market_rate: Cost,
}

/// The lowest freight an own vessel should bid for a market cargo
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FreightBid {
    pub vessel: String,
    pub cargo: String,
    pub min_rate: f64,
    /// The rate the voyage was valued at
    pub reference_rate: f64,
    pub reference_estimated: bool,
}
