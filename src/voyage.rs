//! Economics of a single vessel carrying a single cargo.

use chrono::{Duration, NaiveDate};
use derive_more::Display;
use float_ord::FloatOrd;
use log::{debug, trace};
use serde::Serialize;

use crate::bunker::{self, BunkerLocation, BunkerPlan, BunkerPrices, BunkerRequest, Period};
use crate::config::Config;
use crate::distance::{normalize, DistanceUnavailable, PortDistances, Route};
use crate::market;
use crate::problem::{Cargo, Cost, Days, Distance, Fuel, Quantity, SpeedRegime, Vessel};

/// The read-only inputs shared by every voyage calculation
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    pub distances: &'a PortDistances,
    pub prices: &'a BunkerPrices,
    pub config: &'a Config,
}

/// Scenario adjustments applied on top of the base data
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Adjustments {
    /// Extra port congestion, in days of idle time
    pub delay_days: Days,
    /// Factor applied to every bunker price
    pub bunker_multiplier: f64,
}

impl Default for Adjustments {
    fn default() -> Self {
        Self {
            delay_days: 0.0,
            bunker_multiplier: 1.0,
        }
    }
}

/// Where the days of a voyage go
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct VoyageDays {
    pub ballast: Days,
    pub laden: Days,
    /// Cargo handling and turn time at the load port
    pub load: Days,
    /// Cargo handling and turn time at the discharge port
    pub discharge: Days,
    /// Waiting for the laycan to open
    pub waiting: Days,
    /// Port congestion
    pub congestion: Days,
    /// A dedicated bunkering stop
    pub bunkering: Days,
}

impl VoyageDays {
    pub fn total(&self) -> Days {
        self.ballast
            + self.laden
            + self.load
            + self.discharge
            + self.waiting
            + self.congestion
            + self.bunkering
    }
}

#[derive(Debug, Clone, PartialEq, Display)]
pub enum VoyageError {
    /// The ballast or laden leg has no known distance
    #[display(fmt = "{}", _0)]
    Distance(DistanceUnavailable),
    /// The vessel can not lift the smallest quantity the cargo's tolerance allows
    #[display(
        fmt = "vessel {} can lift at most {} t, cargo {} needs at least {} t",
        vessel,
        capacity,
        cargo,
        minimum
    )]
    Capacity {
        vessel: String,
        cargo: String,
        capacity: Quantity,
        minimum: Quantity,
    },
}

impl std::error::Error for VoyageError {}

impl From<DistanceUnavailable> for VoyageError {
    fn from(e: DistanceUnavailable) -> Self {
        VoyageError::Distance(e)
    }
}

/// The fully resolved economics of one vessel, cargo, speed regime and set of adjustments.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VoyageResult {
    pub vessel: String,
    pub cargo: String,
    pub regime: SpeedRegime,
    pub adjustments: Adjustments,

    pub ballast_route: Route,
    pub laden_route: Route,
    /// Ballast distance sailed, including any detour to a bunkering hub
    pub ballast_nm: Distance,
    pub laden_nm: Distance,

    /// Days from ETD until arrival at the load port
    pub arrival_days: Days,
    pub arrival: NaiveDate,
    pub laycan_end: NaiveDate,
    pub can_make_laycan: bool,
    /// Days between arrival and laycan end. Negative when the laycan is missed.
    pub days_margin: Days,

    pub days: VoyageDays,
    pub total_days: Days,

    pub quantity: Quantity,
    pub freight_rate: f64,
    /// The freight rate is a market estimate rather than agreed
    pub freight_estimated: bool,
    pub gross_freight: Cost,
    pub commission: Cost,
    pub net_freight: Cost,

    pub sea_fuel: Fuel,
    /// MGO burnt in port
    pub port_fuel: Fuel,
    pub consumption: Fuel,
    /// Fuel that has to be bought beyond what is on board
    pub shortfall: Fuel,
    /// Prices the consumption is valued at
    pub bunker_prices: Fuel,

    pub bunker_cost: Cost,
    pub hire_cost: Cost,
    pub port_costs: Cost,
    pub misc_costs: Cost,
    pub bunkering_fee: Cost,
    pub total_costs: Cost,
    pub net_profit: Cost,
    /// Time charter equivalent, USD/day
    pub tce: Cost,

    /// Set when a dedicated bunkering stop is made
    pub bunkering: Option<BunkerPlan>,
}

impl VoyageResult {
    /// All costs except hire
    pub fn voyage_costs(&self) -> Cost {
        self.bunker_cost + self.port_costs + self.misc_costs + self.bunkering_fee
    }

    /// Where bunkers are bought, if a stop is made
    pub fn bunker_port(&self) -> Option<&str> {
        self.bunkering.as_ref().map(|p| p.chosen.location.port())
    }

    /// Savings of the chosen bunkering location over bunkering at the load port
    pub fn bunker_savings(&self) -> Cost {
        self.bunkering.as_ref().map(|p| p.savings).unwrap_or(0.0)
    }
}

/// The resolved legs of a voyage
struct Legs {
    ballast: Route,
    laden: Route,
    ballast_nm: Distance,
    laden_nm: Distance,
}

/// Computes the economics of `vessel` carrying `cargo` at the given speed regime.
///
/// Fails only if the voyage can not be described at all: a leg without distance, or a
/// vessel too small for the cargo. A missed laycan is reported on the result.
pub fn calculate_voyage(
    ctx: Context,
    vessel: &Vessel,
    cargo: &Cargo,
    regime: SpeedRegime,
    adjustments: Adjustments,
) -> Result<VoyageResult, VoyageError> {
    let ballast = ctx
        .distances
        .distance(vessel.current_port(), &cargo.load().port);
    let laden = ctx
        .distances
        .distance(&cargo.load().port, &cargo.discharge().port);

    let legs = Legs {
        ballast_nm: ballast.nm().ok_or_else(|| DistanceUnavailable {
            from: normalize(vessel.current_port()),
            to: normalize(&cargo.load().port),
        })?,
        laden_nm: laden.nm().ok_or_else(|| DistanceUnavailable {
            from: normalize(&cargo.load().port),
            to: normalize(&cargo.discharge().port),
        })?,
        ballast,
        laden,
    };

    let (minimum, maximum) = cargo.quantity_band();
    let capacity = (vessel.dwt() - ctx.config.voyage.vessel_constants).floor();
    if capacity < minimum {
        return Err(VoyageError::Capacity {
            vessel: vessel.name().to_string(),
            cargo: cargo.name().to_string(),
            capacity,
            minimum,
        });
    }
    let maximum = maximum.min(capacity);

    // Profit is piecewise linear in the quantity, with a kink where half freight starts,
    // so the best quantity is one of the band edges, that kink or the bunkering boundary below.
    let mut quantities = vec![maximum, minimum];
    if let Some(threshold) = cargo.half_freight_threshold() {
        if threshold > minimum && threshold < maximum {
            quantities.push(threshold.floor());
        }
    }

    // A bunkering stop adds a lump sum, so profit also jumps where the fuel shortfall first
    // exceeds the bunker threshold.
    let stops = |q: Quantity| {
        evaluate(ctx, vessel, cargo, regime, adjustments, &legs, q)
            .bunkering
            .is_some()
    };
    if let Some(quantity) = largest_without_stop(minimum, maximum, stops) {
        quantities.push(quantity);
    }

    let best = quantities
        .into_iter()
        .map(|q| evaluate(ctx, vessel, cargo, regime, adjustments, &legs, q))
        .max_by_key(|r| (FloatOrd(r.net_profit), FloatOrd(r.quantity)));

    // `quantities` is never empty, but propagate instead of panicking.
    let result = best.ok_or(VoyageError::Capacity {
        vessel: vessel.name().to_string(),
        cargo: cargo.name().to_string(),
        capacity,
        minimum,
    })?;

    trace!(
        "{} -> {} ({}): profit {:.0}, tce {:.0}, laycan {}",
        result.vessel,
        result.cargo,
        regime,
        result.net_profit,
        result.tce,
        result.can_make_laycan
    );

    Ok(result)
}

/// The largest whole tonnage in `[minimum, maximum]` loaded without a bunkering stop, if a stop
/// is needed at `maximum` but not at `minimum`. Port time grows with the quantity, so `stops` is
/// monotone and a bisection over whole tonnes finds the boundary.
fn largest_without_stop<F>(minimum: Quantity, maximum: Quantity, stops: F) -> Option<Quantity>
where
    F: Fn(Quantity) -> bool,
{
    if maximum <= minimum || stops(minimum) || !stops(maximum) {
        return None;
    }

    let (mut lower, mut upper) = (minimum, maximum);
    while upper - lower > 1.0 {
        let mid = ((lower + upper) / 2.0).floor();
        if stops(mid) {
            upper = mid;
        } else {
            lower = mid;
        }
    }
    Some(lower)
}

/// Time spent before loading, relative to ETD
struct Approach {
    ballast_days: Days,
    /// A bunkering stop made on the way, delaying arrival
    stop_en_route: Days,
    /// A bunkering stop made at the load port
    stop_at_load: Days,
}

impl Approach {
    fn arrival(&self) -> Days {
        self.ballast_days + self.stop_en_route
    }
}

fn evaluate(
    ctx: Context,
    vessel: &Vessel,
    cargo: &Cargo,
    regime: SpeedRegime,
    adjustments: Adjustments,
    legs: &Legs,
    quantity: Quantity,
) -> VoyageResult {
    let config = &ctx.config.voyage;
    let profile = vessel.profile(regime);
    let load = cargo.load();
    let discharge = cargo.discharge();

    let (freight_rate, freight_estimated) = market::freight_rate(cargo, &ctx.config.market);
    let (full, half) = match cargo.half_freight_threshold() {
        Some(threshold) if quantity > threshold => (threshold, quantity - threshold),
        _ => (quantity, 0.0),
    };
    let gross_freight = full * freight_rate + half * freight_rate * 0.5;
    let commission = gross_freight * cargo.commission();
    let net_freight = gross_freight - commission;

    let laycan_open = (cargo.laycan_start() - vessel.etd()).num_days() as f64;
    let laycan_close = (cargo.laycan_end() - vessel.etd()).num_days() as f64;
    let delay = adjustments.delay_days.max(0.0);
    let laden_days = profile.laden.days(legs.laden_nm);

    let days_for = |approach: &Approach| VoyageDays {
        ballast: approach.ballast_days,
        laden: laden_days,
        load: load.handling_days(quantity) + load.turn_days(),
        discharge: discharge.handling_days(quantity) + discharge.turn_days(),
        waiting: (laycan_open - approach.arrival()).max(0.0),
        congestion: delay,
        bunkering: approach.stop_en_route + approach.stop_at_load,
    };

    let consumption_for = |days: &VoyageDays, ballast_days: Days| {
        let sea = profile.ballast.fuel.scale(ballast_days) + profile.laden.fuel.scale(days.laden);
        let working = load.handling_days(quantity) + discharge.handling_days(quantity);
        let idle = load.turn_days()
            + discharge.turn_days()
            + days.waiting
            + days.congestion
            + days.bunkering;
        let port = Fuel::mgo(working * vessel.port_working_mgo() + idle * vessel.port_idle_mgo());
        (sea, port)
    };

    let mut ballast_nm = legs.ballast_nm;
    let mut approach = Approach {
        ballast_days: profile.ballast.days(ballast_nm),
        stop_en_route: 0.0,
        stop_at_load: 0.0,
    };
    let mut days = days_for(&approach);
    let (mut sea_fuel, mut port_fuel) = consumption_for(&days, approach.ballast_days);
    let mut shortfall = (sea_fuel + port_fuel).shortfall(&vessel.rob());

    let period = Period::of(vessel.etd());
    let mut bunker_prices = ctx
        .prices
        .prices_at(&load.port, period)
        .scale(adjustments.bunker_multiplier);
    let mut bunkering = None;
    let mut bunkering_fee = 0.0;

    if shortfall.total() > config.bunker_threshold {
        let plan = bunker::plan_bunkering(
            &BunkerRequest {
                origin: vessel.current_port(),
                load_port: &load.port,
                direct_nm: legs.ballast_nm,
                shortfall,
                ballast: profile.ballast,
                hire_rate: vessel.hire_rate(),
                period,
                multiplier: adjustments.bunker_multiplier,
            },
            ctx.distances,
            ctx.prices,
            config,
        );

        match &plan.chosen.location {
            BunkerLocation::Hub(hub) => {
                debug!(
                    "{} bunkers at {} on the way to {}, saving {:.0}",
                    vessel.name(),
                    hub,
                    load.port,
                    plan.savings
                );
                ballast_nm = plan.chosen.ballast_nm;
                approach = Approach {
                    ballast_days: profile.ballast.days(ballast_nm),
                    stop_en_route: config.bunkering_stop_days,
                    stop_at_load: 0.0,
                };
            }
            BunkerLocation::LoadPort(_) => {
                approach.stop_at_load = config.bunkering_stop_days;
            }
        }

        days = days_for(&approach);
        let (sea, port) = consumption_for(&days, approach.ballast_days);
        sea_fuel = sea;
        port_fuel = port;
        shortfall = (sea_fuel + port_fuel).shortfall(&vessel.rob());
        bunker_prices = plan.chosen.prices;
        bunkering_fee = plan.chosen.fee;
        bunkering = Some(plan);
    }

    let consumption = sea_fuel + port_fuel;
    let total_days = days.total();
    let arrival_days = approach.arrival();
    let days_margin = laycan_close - arrival_days;

    let bunker_cost = consumption.priced(&bunker_prices);
    let hire_cost = if vessel.is_own() {
        total_days * vessel.hire_rate()
    } else {
        0.0
    };
    let port_costs = load.cost + discharge.cost;
    let misc_costs = config.misc_costs;
    let total_costs = bunker_cost + hire_cost + port_costs + misc_costs + bunkering_fee;
    let net_profit = net_freight - total_costs;
    let tce = if total_days >= config.min_voyage_days {
        (net_freight - (bunker_cost + port_costs + misc_costs + bunkering_fee)) / total_days
    } else {
        0.0
    };

    VoyageResult {
        vessel: vessel.name().to_string(),
        cargo: cargo.name().to_string(),
        regime,
        adjustments,
        ballast_route: legs.ballast,
        laden_route: legs.laden,
        ballast_nm,
        laden_nm: legs.laden_nm,
        arrival_days,
        arrival: vessel.etd() + Duration::days(arrival_days.floor() as i64),
        laycan_end: cargo.laycan_end(),
        can_make_laycan: days_margin >= 0.0,
        days_margin,
        days,
        total_days,
        quantity,
        freight_rate,
        freight_estimated,
        gross_freight,
        commission,
        net_freight,
        sea_fuel,
        port_fuel,
        consumption,
        shortfall,
        bunker_prices,
        bunker_cost,
        hire_cost,
        port_costs,
        misc_costs,
        bunkering_fee,
        total_costs,
        net_profit,
        tce,
        bunkering,
    }
}

/// The voyage at both speed regimes, economical first
pub fn calculate_both(
    ctx: Context,
    vessel: &Vessel,
    cargo: &Cargo,
    adjustments: Adjustments,
) -> [Result<VoyageResult, VoyageError>; 2] {
    SpeedRegime::ALL.map(|regime| calculate_voyage(ctx, vessel, cargo, regime, adjustments))
}
