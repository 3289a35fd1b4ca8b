use derive_more::Display;
use serde::{Deserialize, Serialize};

use crate::problem::{Cost, Days, Quantity};

/// Constants of the voyage economics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoyageConfig {
    /// Fixed miscellaneous costs per voyage
    pub misc_costs: Cost,
    /// Stores, fresh water and bunkers on board that reduce the cargo intake below deadweight
    pub vessel_constants: Quantity,
    /// A bunkering stop is only made if the fuel shortfall exceeds this many tonnes
    pub bunker_threshold: Quantity,
    /// Lumpsum fee for a bunkering stop
    pub bunkering_fee: Cost,
    /// Idle days spent on a bunkering stop
    pub bunkering_stop_days: Days,
    /// Bunkering options whose total cost is within this of the cheapest are ranked by distance
    pub bunker_tie_epsilon: Cost,
    /// Voyages shorter than this report a TCE of zero
    pub min_voyage_days: Days,
}

impl Default for VoyageConfig {
    fn default() -> Self {
        Self {
            misc_costs: 15_000.0,
            vessel_constants: 3_500.0,
            bunker_threshold: 50.0,
            bunkering_fee: 5_000.0,
            bunkering_stop_days: 1.0,
            bunker_tie_epsilon: 1_000.0,
            min_voyage_days: 0.001,
        }
    }
}

/// A benchmark freight rate for cargoes loading in a region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreightRegion {
    pub name: String,
    /// Substrings matched against the normalized load port
    pub ports: Vec<String>,
    /// USD per tonne
    pub rate: f64,
}

/// Parameters of the market side: unpriced cargoes, chartered-in vessels and arbitrage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketConfig {
    /// Benchmark rates for market cargoes without a freight rate
    pub freight_regions: Vec<FreightRegion>,
    /// Benchmark rate when no region matches
    pub default_freight_rate: f64,
    /// Daily earnings a voyage must at least make to be worth doing
    pub target_tce: Cost,
    /// Daily hire assumed when chartering in a market vessel
    pub market_hire_rate: Cost,
    /// Own vessels only take market cargoes that earn at least this much profit per day
    pub min_arbitrage_daily_profit: Cost,
    /// and more than this much over the whole voyage
    pub min_arbitrage_profit: Cost,
}

impl Default for MarketConfig {
    fn default() -> Self {
        let region = |name: &str, ports: &[&str], rate| FreightRegion {
            name: name.to_string(),
            ports: ports.iter().map(|p| p.to_string()).collect(),
            rate,
        };

        Self {
            freight_regions: vec![
                region("Brazil", &["TUBARAO", "PONTA DA MADEIRA", "ITAGUAI"], 21.0),
                region("West Australia", &["HEDLAND", "DAMPIER"], 9.0),
            ],
            default_freight_rate: 15.0,
            target_tce: 18_000.0,
            market_hire_rate: 18_000.0,
            min_arbitrage_daily_profit: 5_000.0,
            min_arbitrage_profit: 150_000.0,
        }
    }
}

/// Defaults for the scenario search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Step of the coarse scan over the bunker multiplier
    pub bunker_step: f64,
    /// Step of the coarse scan over delay days
    pub delay_step: f64,
    /// Width below which the tipping point bisection stops
    pub tolerance: f64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            bunker_step: 0.01,
            delay_step: 1.0,
            tolerance: 1e-4,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub voyage: VoyageConfig,
    pub market: MarketConfig,
    pub search: SearchConfig,
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum ConfigError {
    #[display(fmt = "{} must be positive, got {}", field, value)]
    NotPositive { field: &'static str, value: f64 },
}

impl std::error::Error for ConfigError {}

impl SearchConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields = [
            ("search.bunker_step", self.bunker_step),
            ("search.delay_step", self.delay_step),
            ("search.tolerance", self.tolerance),
        ];
        // NaN fails the comparison too
        match fields.iter().find(|(_, value)| !(*value > 0.0)) {
            Some(&(field, value)) => Err(ConfigError::NotPositive { field, value }),
            None => Ok(()),
        }
    }
}

impl Config {
    /// Rejects settings the scenario search can not work with
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.search.validate()
    }
}
