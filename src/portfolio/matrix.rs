//! The voyage option matrix: every vessel against every cargo at the requested speed regimes.
//!
//! Cells are evaluated in parallel and every voyage goes through a shared [`Evaluator`], which
//! memoizes results so sweeps and rankings do not recompute the same voyage twice.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use derive_more::Display;
use itertools::iproduct;
use log::{debug, trace};
use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize, Serializer};

use crate::conditions::Conditions;
use crate::problem::{Cargo, SpeedRegime, Vessel};
use crate::voyage::{calculate_voyage, Adjustments, Context, VoyageError, VoyageResult};

/// Which speed regimes are considered for each vessel/cargo pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum SpeedMode {
    #[display(fmt = "eco")]
    Economical,
    #[display(fmt = "warranted")]
    Warranted,
    /// Both regimes, keeping the better one per pair
    #[display(fmt = "dual")]
    Dual,
}

impl SpeedMode {
    pub fn regimes(&self) -> &'static [SpeedRegime] {
        match self {
            SpeedMode::Economical => &[SpeedRegime::Economical],
            SpeedMode::Warranted => &[SpeedRegime::Warranted],
            SpeedMode::Dual => &SpeedRegime::ALL,
        }
    }
}

/// What the optimizer maximizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Objective {
    #[display(fmt = "profit")]
    Profit,
    #[display(fmt = "tce")]
    Tce,
}

impl Objective {
    pub fn value(&self, voyage: &VoyageResult) -> f64 {
        match self {
            Objective::Profit => voyage.net_profit,
            Objective::Tce => voyage.tce,
        }
    }
}

/// A name on the command line or in a config that does not match any variant
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "unknown {} '{}', expected one of: {}", kind, value, expected)]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
    pub expected: &'static str,
}

impl std::error::Error for UnknownVariant {}

impl FromStr for SpeedMode {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "eco" | "economical" => Ok(SpeedMode::Economical),
            "warranted" => Ok(SpeedMode::Warranted),
            "dual" | "both" => Ok(SpeedMode::Dual),
            _ => Err(UnknownVariant {
                kind: "speed mode",
                value: s.to_string(),
                expected: "eco, warranted, dual",
            }),
        }
    }
}

impl FromStr for Objective {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "profit" => Ok(Objective::Profit),
            "tce" => Ok(Objective::Tce),
            _ => Err(UnknownVariant {
                kind: "objective",
                value: s.to_string(),
                expected: "profit, tce",
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    vessel: String,
    cargo: String,
    freight_rate: Option<u64>,
    regime: SpeedRegime,
    multiplier: u64,
    delay: u64,
}

impl CacheKey {
    fn new(vessel: &Vessel, cargo: &Cargo, regime: SpeedRegime, adjustments: Adjustments) -> Self {
        Self {
            vessel: vessel.name().to_string(),
            cargo: cargo.name().to_string(),
            freight_rate: cargo.freight_rate().map(f64::to_bits),
            regime,
            multiplier: adjustments.bunker_multiplier.to_bits(),
            delay: adjustments.delay_days.to_bits(),
        }
    }
}

/// Calculates voyages against a fixed context, remembering every result.
///
/// Vessels and cargoes are identified by name, so names must be unique within one evaluator.
#[derive(Debug)]
pub struct Evaluator<'a> {
    ctx: Context<'a>,
    cache: RwLock<HashMap<CacheKey, Result<VoyageResult, VoyageError>>>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl<'a> Evaluator<'a> {
    pub fn new(ctx: Context<'a>) -> Self {
        Self {
            ctx,
            cache: RwLock::new(HashMap::new()),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// The context voyages are calculated in
    pub fn context(&self) -> Context<'a> {
        self.ctx
    }

    /// The voyage of `vessel` carrying `cargo`, from the cache if it has been calculated before
    pub fn voyage(
        &self,
        vessel: &Vessel,
        cargo: &Cargo,
        regime: SpeedRegime,
        adjustments: Adjustments,
    ) -> Result<VoyageResult, VoyageError> {
        let key = CacheKey::new(vessel, cargo, regime, adjustments);

        // A poisoned lock only means another thread panicked mid-insert; skip the cache then.
        if let Ok(cache) = self.cache.read() {
            if let Some(result) = cache.get(&key) {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return result.clone();
            }
        }

        self.misses.fetch_add(1, Ordering::Relaxed);
        let result = calculate_voyage(self.ctx, vessel, cargo, regime, adjustments);
        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, result.clone());
        }
        result
    }

    /// Number of distinct voyages calculated so far
    pub fn cached(&self) -> usize {
        self.cache.read().map(|c| c.len()).unwrap_or(0)
    }

    /// (hits, misses) of the cache
    pub fn cache_stats(&self) -> (u64, u64) {
        (
            self.hits.load(Ordering::Relaxed),
            self.misses.load(Ordering::Relaxed),
        )
    }
}

fn display_all<S: Serializer>(errors: &[VoyageError], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_seq(errors.iter().map(|e| e.to_string()))
}

/// The voyage options of one vessel/cargo pair, one per regime that could be calculated
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Cell {
    pub options: Vec<VoyageResult>,
    /// Regimes that could not be calculated at all
    #[serde(serialize_with = "display_all")]
    pub errors: Vec<VoyageError>,
}

impl Cell {
    /// Options that make the laycan
    pub fn feasible(&self) -> impl Iterator<Item = &VoyageResult> {
        self.options.iter().filter(|v| v.can_make_laycan)
    }

    pub fn is_feasible(&self) -> bool {
        self.feasible().next().is_some()
    }
}

/// One cell of the matrix together with the pair it belongs to
#[derive(Debug, Serialize)]
pub struct MatrixEntry<'m> {
    pub vessel: &'m str,
    pub cargo: &'m str,
    #[serde(flatten)]
    pub cell: &'m Cell,
}

/// Voyage options of every vessel (rows) against every cargo (columns)
#[derive(Debug, Clone)]
pub struct VoyageMatrix {
    vessels: Vec<String>,
    cargoes: Vec<String>,
    speed: SpeedMode,
    cells: Array2<Cell>,
}

impl VoyageMatrix {
    pub fn build(
        evaluator: &Evaluator,
        vessels: &[Vessel],
        cargoes: &[Cargo],
        speed: SpeedMode,
        conditions: &Conditions,
    ) -> VoyageMatrix {
        let (n, m) = (vessels.len(), cargoes.len());
        let pairs = iproduct!(0..n, 0..m).collect::<Vec<_>>();

        let cells = pairs
            .into_par_iter()
            .map(|(v, c)| {
                let (vessel, cargo) = (&vessels[v], &cargoes[c]);
                let adjustments = conditions.adjustments(cargo);
                let mut cell = Cell::default();
                for &regime in speed.regimes() {
                    match evaluator.voyage(vessel, cargo, regime, adjustments) {
                        Ok(voyage) => cell.options.push(voyage),
                        Err(e) => {
                            trace!("{} -> {} at {}: {}", vessel.name(), cargo.name(), regime, e);
                            cell.errors.push(e)
                        }
                    }
                }
                cell
            })
            .collect::<Vec<_>>();

        // The parallel collect preserves order, so cells are in row-major order
        let mut cells = cells.into_iter();
        let cells = Array2::from_shape_simple_fn((n, m), || cells.next().unwrap_or_default());

        let matrix = VoyageMatrix {
            vessels: vessels.iter().map(|v| v.name().to_string()).collect(),
            cargoes: cargoes.iter().map(|c| c.name().to_string()).collect(),
            speed,
            cells,
        };

        let (hits, misses) = evaluator.cache_stats();
        debug!(
            "built {}x{} matrix at {} speed, {} feasible cells (cache {} hits, {} misses)",
            n,
            m,
            speed,
            matrix.feasible_cells(),
            hits,
            misses
        );

        matrix
    }

    pub fn vessels(&self) -> &[String] {
        &self.vessels
    }

    pub fn cargoes(&self) -> &[String] {
        &self.cargoes
    }

    pub fn speed(&self) -> SpeedMode {
        self.speed
    }

    /// (vessels, cargoes)
    pub fn dim(&self) -> (usize, usize) {
        self.cells.dim()
    }

    pub fn cells(&self) -> &Array2<Cell> {
        &self.cells
    }

    pub fn cell(&self, vessel: usize, cargo: usize) -> &Cell {
        &self.cells[[vessel, cargo]]
    }

    /// Number of pairs with at least one option that makes the laycan
    pub fn feasible_cells(&self) -> usize {
        self.cells.iter().filter(|c| c.is_feasible()).count()
    }

    /// Every cell labelled with its pair, row by row
    pub fn entries(&self) -> Vec<MatrixEntry<'_>> {
        self.cells
            .indexed_iter()
            .map(|((v, c), cell)| MatrixEntry {
                vessel: &self.vessels[v],
                cargo: &self.cargoes[c],
                cell,
            })
            .collect()
    }
}
