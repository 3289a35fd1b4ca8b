//! A small, fully tabulated book shared by the integration tests.

#![allow(dead_code)]

use chrono::NaiveDate;

use freightdesk::bunker::PriceRow;
use freightdesk::config::Config;
use freightdesk::data::Dataset;
use freightdesk::distance::DistanceRow;
use freightdesk::problem::{
    Cargo, CargoData, Commitment, Fleet, Fuel, FuelGrade, PortCall, SeaRate, SpeedProfile, Vessel,
    VesselData,
};

pub fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2026, month, day).unwrap()
}

pub fn vessel(name: &str, port: &str, hire_rate: f64, fleet: Fleet) -> Vessel {
    let rate = |speed, vlsfo| SeaRate {
        speed,
        fuel: Fuel::new(vlsfo, 2.0),
    };

    Vessel::new(VesselData {
        name: name.to_string(),
        dwt: 181_000.0,
        hire_rate,
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
        etd: date(3, 1),
        rob: Fuel::new(5_000.0, 500.0),
        fleet,
    })
    .unwrap()
}

pub fn cargo(
    name: &str,
    (load, discharge): (&str, &str),
    rate: f64,
    quantity: f64,
    (laycan_start, laycan_end): (NaiveDate, NaiveDate),
    commitment: Commitment,
) -> Cargo {
    let call = |port: &str, rate| PortCall {
        port: port.to_string(),
        rate,
        turn_hours: 12.0,
        cost: 90_000.0,
    };

    Cargo::new(CargoData {
        name: name.to_string(),
        customer: "Customer".to_string(),
        commodity: "Iron Ore".to_string(),
        quantity,
        tolerance: 0.1,
        laycan_start,
        laycan_end,
        freight_rate: Some(rate),
        half_freight_threshold: None,
        load: call(load, 60_000.0),
        discharge: call(discharge, 30_000.0),
        commission: 0.0375,
        commitment,
    })
    .unwrap()
}

fn row(from: &str, to: &str, nm: f64) -> DistanceRow {
    DistanceRow {
        from: from.to_string(),
        to: to.to_string(),
        nm,
    }
}

fn prices() -> Vec<PriceRow> {
    let period = "2026-03".parse().unwrap();
    [("SINGAPORE", 490.0, 649.0), ("QINGDAO", 643.0, 833.0)]
        .iter()
        .flat_map(|&(hub, vlsfo, mgo)| {
            [
                PriceRow {
                    hub: hub.to_string(),
                    grade: FuelGrade::Vlsfo,
                    period,
                    price: vlsfo,
                },
                PriceRow {
                    hub: hub.to_string(),
                    grade: FuelGrade::Mgo,
                    period,
                    price: mgo,
                },
            ]
        })
        .collect()
}

/// Four own vessels, three committed and four market cargoes, with every lane tabulated
pub fn book() -> Dataset {
    let committed = Commitment::Committed;
    let market = Commitment::Market;

    Dataset {
        vessels: vec![
            vessel("ANN BELL", "QINGDAO", 11_750.0, Fleet::Own),
            vessel("OCEAN HORIZON", "MAP TA PHUT", 15_750.0, Fleet::Own),
            vessel("PACIFIC GLORY", "GWANGYANG", 14_800.0, Fleet::Own),
            vessel("GOLDEN ASCENT", "FANGCHENG", 13_950.0, Fleet::Own),
        ],
        cargoes: vec![
            cargo(
                "HEDLAND ORE",
                ("PORT HEDLAND", "LIANYUNGANG"),
                9.5,
                170_000.0,
                (date(3, 12), date(3, 22)),
                committed,
            ),
            cargo(
                "DAMPIER ORE",
                ("DAMPIER", "QINGDAO"),
                10.0,
                165_000.0,
                (date(3, 14), date(3, 24)),
                committed,
            ),
            cargo(
                "NEWCASTLE COAL",
                ("NEWCASTLE", "GWANGYANG"),
                14.0,
                160_000.0,
                (date(3, 15), date(3, 28)),
                committed,
            ),
            cargo(
                "TABONEO COAL",
                ("TABONEO", "KRISHNAPATNAM"),
                12.0,
                150_000.0,
                (date(3, 10), date(3, 22)),
                market,
            ),
            cargo(
                "SALDANHA ORE",
                ("SALDANHA BAY", "TIANJIN"),
                22.0,
                175_000.0,
                (date(3, 25), date(4, 8)),
                market,
            ),
            cargo(
                "VANCOUVER COAL",
                ("VANCOUVER", "FANGCHENG"),
                24.0,
                160_000.0,
                (date(3, 20), date(4, 2)),
                market,
            ),
            cargo(
                "GLADSTONE COAL",
                ("GLADSTONE", "MUNDRA"),
                15.0,
                150_000.0,
                (date(3, 15), date(3, 26)),
                market,
            ),
        ],
        distances: vec![
            row("QINGDAO", "PORT HEDLAND", 3_500.0),
            row("QINGDAO", "DAMPIER", 3_450.0),
            row("QINGDAO", "NEWCASTLE", 4_600.0),
            row("QINGDAO", "TABONEO", 2_900.0),
            row("QINGDAO", "SALDANHA BAY", 8_300.0),
            row("QINGDAO", "VANCOUVER", 4_900.0),
            row("QINGDAO", "GLADSTONE", 3_900.0),
            row("MAP TA PHUT", "PORT HEDLAND", 2_600.0),
            row("MAP TA PHUT", "DAMPIER", 2_500.0),
            row("MAP TA PHUT", "NEWCASTLE", 4_800.0),
            row("MAP TA PHUT", "TABONEO", 1_400.0),
            row("MAP TA PHUT", "SALDANHA BAY", 6_100.0),
            row("MAP TA PHUT", "VANCOUVER", 6_900.0),
            row("MAP TA PHUT", "GLADSTONE", 4_300.0),
            row("GWANGYANG", "PORT HEDLAND", 3_700.0),
            row("GWANGYANG", "DAMPIER", 3_650.0),
            row("GWANGYANG", "NEWCASTLE", 4_500.0),
            row("GWANGYANG", "TABONEO", 3_100.0),
            row("GWANGYANG", "SALDANHA BAY", 8_600.0),
            row("GWANGYANG", "VANCOUVER", 4_500.0),
            row("GWANGYANG", "GLADSTONE", 3_800.0),
            row("FANGCHENG", "PORT HEDLAND", 2_900.0),
            row("FANGCHENG", "DAMPIER", 2_850.0),
            row("FANGCHENG", "NEWCASTLE", 4_400.0),
            row("FANGCHENG", "TABONEO", 1_600.0),
            row("FANGCHENG", "SALDANHA BAY", 7_100.0),
            row("FANGCHENG", "VANCOUVER", 5_800.0),
            row("FANGCHENG", "GLADSTONE", 3_700.0),
            row("PORT HEDLAND", "LIANYUNGANG", 3_600.0),
            row("DAMPIER", "QINGDAO", 3_450.0),
            row("NEWCASTLE", "GWANGYANG", 4_500.0),
            row("TABONEO", "KRISHNAPATNAM", 2_900.0),
            row("SALDANHA BAY", "TIANJIN", 9_200.0),
            row("VANCOUVER", "FANGCHENG", 5_800.0),
            row("GLADSTONE", "MUNDRA", 6_300.0),
        ],
        builtin_estimates: false,
        default_distance: Some(4_000.0),
        prices: prices(),
        price_regions: None,
        default_hub: "SINGAPORE".to_string(),
        config: Config::default(),
    }
}

/// [`book`] with market tonnage: one vessel sitting at the load port of a committed cargo
/// nobody in the own fleet can reach in time, and one far away.
pub fn book_with_market_fleet() -> Dataset {
    let mut data = book();
    data.vessels.push(vessel("IRON CENTURY", "PORT HEDLAND", 0.0, Fleet::Market));
    data.vessels.push(vessel("CORAL EMPEROR", "ROTTERDAM", 0.0, Fleet::Market));
    data.cargoes.push(cargo(
        "EARLY ORE",
        ("PORT HEDLAND", "QINGDAO"),
        9.0,
        160_000.0,
        (date(3, 2), date(3, 4)),
        Commitment::Committed,
    ));
    data.distances.push(row("PORT HEDLAND", "QINGDAO", 3_500.0));
    data.distances.push(row("ROTTERDAM", "PORT HEDLAND", 11_000.0));
    data
}
