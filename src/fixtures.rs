//! Small, hand-checked inputs for the unit tests.

use chrono::NaiveDate;

use crate::bunker::{default_regions, BunkerPrices, PriceRow};
use crate::config::Config;
use crate::distance::{DistanceRow, PortDistances};
use crate::problem::{
    Cargo, CargoData, Commitment, Fleet, Fuel, FuelGrade, PortCall, SeaRate, SpeedProfile, Vessel,
    VesselData,
};
use crate::voyage::Context;

pub fn date(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

pub fn row(from: &str, to: &str, nm: f64) -> DistanceRow {
    DistanceRow {
        from: from.to_string(),
        to: to.to_string(),
        nm,
    }
}

pub fn vessel_data(name: &str, port: &str) -> VesselData {
    let rate = |speed, vlsfo| SeaRate {
        speed,
        fuel: Fuel::new(vlsfo, 2.0),
    };

    VesselData {
        name: name.to_string(),
        dwt: 180000.0,
        hire_rate: 12_000.0,
        warranted: SpeedProfile {
            laden: rate(13.5, 60.0),
            ballast: rate(14.5, 55.0),
        },
        economical: SpeedProfile {
            laden: rate(12.0, 42.0),
            ballast: rate(12.5, 38.0),
        },
        port_idle_mgo: 2.0,
        port_working_mgo: 3.0,
        current_port: port.to_string(),
        etd: date(2026, 3, 1),
        rob: Fuel::new(5_000.0, 500.0),
        fleet: Fleet::Own,
    }
}

pub fn vessel(name: &str, port: &str) -> Vessel {
    Vessel::new(vessel_data(name, port)).unwrap()
}

pub fn cargo_data(name: &str, load: &str, discharge: &str) -> CargoData {
    CargoData {
        name: name.to_string(),
        customer: "Customer".to_string(),
        commodity: "Iron Ore".to_string(),
        quantity: 160_000.0,
        tolerance: 0.1,
        laycan_start: date(2026, 3, 10),
        laycan_end: date(2026, 3, 20),
        freight_rate: Some(20.0),
        half_freight_threshold: None,
        load: PortCall {
            port: load.to_string(),
            rate: 80_000.0,
            turn_hours: 12.0,
            cost: 100_000.0,
        },
        discharge: PortCall {
            port: discharge.to_string(),
            rate: 30_000.0,
            turn_hours: 24.0,
            cost: 100_000.0,
        },
        commission: 0.0375,
        commitment: Commitment::Committed,
    }
}

pub fn cargo(name: &str, load: &str, discharge: &str) -> Cargo {
    Cargo::new(cargo_data(name, load, discharge)).unwrap()
}

/// March 2026 quotes at the nine bunkering hubs
pub fn prices() -> BunkerPrices {
    let quotes = [
        ("SINGAPORE", 490.0, 649.0),
        ("FUJAIRAH", 478.0, 638.0),
        ("DURBAN", 437.0, 510.0),
        ("ROTTERDAM", 467.0, 613.0),
        ("GIBRALTAR", 474.0, 623.0),
        ("PORT LOUIS", 454.0, 583.0),
        ("QINGDAO", 643.0, 833.0),
        ("SHANGHAI", 645.0, 836.0),
        ("RICHARDS BAY", 441.0, 519.0),
    ];
    let period = "2026-03".parse().unwrap();
    let rows = quotes.iter().flat_map(|(hub, vlsfo, mgo)| {
        [
            PriceRow {
                hub: hub.to_string(),
                grade: FuelGrade::Vlsfo,
                period,
                price: *vlsfo,
            },
            PriceRow {
                hub: hub.to_string(),
                grade: FuelGrade::Mgo,
                period,
                price: *mgo,
            },
        ]
    });

    BunkerPrices::new(rows, default_regions(), "SINGAPORE").unwrap()
}

/// The curated estimates plus a few tabulated cargo lanes
pub fn distances() -> PortDistances {
    PortDistances::with_builtin_estimates()
        .unwrap()
        .with_table(vec![
            row("PORT HEDLAND", "LIANYUNGANG", 3_600.0),
            row("ITAGUAI", "QINGDAO", 11_100.0),
            row("DAMPIER", "QINGDAO", 3_450.0),
        ])
}

pub fn world() -> (PortDistances, BunkerPrices, Config) {
    (distances(), prices(), Config::default())
}

pub fn context<'a>(
    distances: &'a PortDistances,
    prices: &'a BunkerPrices,
    config: &'a Config,
) -> Context<'a> {
    Context {
        distances,
        prices,
        config,
    }
}

pub fn market_vessel(name: &str, port: &str) -> Vessel {
    let mut data = vessel_data(name, port);
    data.fleet = Fleet::Market;
    data.hire_rate = 0.0;
    Vessel::new(data).unwrap()
}

pub fn market_cargo(name: &str, load: &str, discharge: &str, rate: Option<f64>) -> Cargo {
    let mut data = cargo_data(name, load, discharge);
    data.commitment = Commitment::Market;
    data.freight_rate = rate;
    Cargo::new(data).unwrap()
}
