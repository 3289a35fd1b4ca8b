//! Bunker prices and the choice of where to refuel.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, NaiveDate};
use derive_more::Display;
use float_ord::FloatOrd;
use log::{debug, trace, warn};
use serde::{Deserialize, Serialize};

use crate::config::VoyageConfig;
use crate::distance::{normalize, PortDistances, Route};
use crate::problem::{Cost, Days, Distance, Fuel, FuelGrade, SeaRate};

/// A calendar month that prices are quoted for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Period {
    pub year: i32,
    pub month: u32,
}

impl Period {
    pub fn of(date: NaiveDate) -> Period {
        Period {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "expected a period of the form YYYY-MM, got {:?}", _0)]
pub struct ParsePeriodError(String);

impl std::error::Error for ParsePeriodError {}

impl FromStr for Period {
    type Err = ParsePeriodError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParsePeriodError(s.to_string());
        let (year, month) = s.trim().split_once('-').ok_or_else(err)?;
        let year: i32 = year.parse().map_err(|_| err())?;
        let month: u32 = month.parse().map_err(|_| err())?;
        match month {
            1..=12 => Ok(Period { year, month }),
            _ => Err(err()),
        }
    }
}

impl TryFrom<String> for Period {
    type Error = ParsePeriodError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Period> for String {
    fn from(p: Period) -> Self {
        p.to_string()
    }
}

/// One quoted price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub hub: String,
    pub grade: FuelGrade,
    pub period: Period,
    /// USD per tonne
    pub price: f64,
}

/// Ports that are priced as a given hub when they have no quote of their own
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRegion {
    pub hub: String,
    /// Substrings matched against the normalized port name
    pub ports: Vec<String>,
}

/// The regional fallbacks used unless a dataset supplies its own
pub fn default_regions() -> Vec<PriceRegion> {
    let region = |hub: &str, ports: &[&str]| PriceRegion {
        hub: hub.to_string(),
        ports: ports.iter().map(|p| p.to_string()).collect(),
    };

    vec![
        region(
            "QINGDAO",
            &[
                "CHINA",
                "QINGDAO",
                "FANGCHENG",
                "CAOFEIDIAN",
                "LIANYUNGANG",
                "RIZHAO",
                "TIANJIN",
                "DALIAN",
                "JINGTANG",
                "XIAMEN",
            ],
        ),
        region(
            "SINGAPORE",
            &[
                "SINGAPORE",
                "THAILAND",
                "MAP TA PHUT",
                "AUSTRALIA",
                "HEDLAND",
                "DAMPIER",
                "TABONEO",
                "TELUK RUBIAH",
            ],
        ),
        region(
            "GIBRALTAR",
            &[
                "BRAZIL", "ITAGUAI", "TUBARAO", "MADEIRA", "GUINEA", "KAMSAR", "AFRICA",
            ],
        ),
        region(
            "FUJAIRAH",
            &[
                "INDIA",
                "PARADIP",
                "MUNDRA",
                "KANDLA",
                "VIZAG",
                "MANGALORE",
                "KRISHNAPATNAM",
                "JUBAIL",
            ],
        ),
    ]
}

/// Inconsistent price tables
#[derive(Debug, Clone, PartialEq, Display)]
pub enum PriceBookError {
    /// The default hub must quote every fuel grade
    #[display(fmt = "default hub {} has no {} price", hub, grade)]
    DefaultHubUnpriced { hub: String, grade: FuelGrade },
    #[display(fmt = "price {} for {} {} in {} is not a positive number", price, hub, grade, period)]
    InvalidPrice {
        hub: String,
        grade: FuelGrade,
        period: Period,
        price: f64,
    },
}

impl std::error::Error for PriceBookError {}

/// Bunker prices keyed by (hub, grade, period)
#[derive(Debug, Clone)]
pub struct BunkerPrices {
    prices: HashMap<(String, FuelGrade), BTreeMap<Period, f64>>,
    /// Hubs with at least one quote, in the order they were first quoted
    hubs: Vec<String>,
    regions: Vec<PriceRegion>,
    default_hub: String,
}

impl BunkerPrices {
    pub fn new(
        rows: impl IntoIterator<Item = PriceRow>,
        regions: Vec<PriceRegion>,
        default_hub: &str,
    ) -> Result<BunkerPrices, PriceBookError> {
        let mut prices: HashMap<(String, FuelGrade), BTreeMap<Period, f64>> = HashMap::new();
        let mut hubs = Vec::new();

        for row in rows {
            let hub = normalize(&row.hub);
            if !(row.price.is_finite() && row.price > 0.0) {
                return Err(PriceBookError::InvalidPrice {
                    hub,
                    grade: row.grade,
                    period: row.period,
                    price: row.price,
                });
            }
            if !hubs.contains(&hub) {
                hubs.push(hub.clone());
            }
            prices
                .entry((hub, row.grade))
                .or_default()
                .insert(row.period, row.price);
        }

        let regions = regions
            .into_iter()
            .map(|r| PriceRegion {
                hub: normalize(&r.hub),
                ports: r.ports.iter().map(|p| normalize(p)).collect(),
            })
            .collect();

        let default_hub = normalize(default_hub);
        for grade in FuelGrade::ALL {
            if !prices.contains_key(&(default_hub.clone(), grade)) {
                return Err(PriceBookError::DefaultHubUnpriced {
                    hub: default_hub,
                    grade,
                });
            }
        }

        Ok(BunkerPrices {
            prices,
            hubs,
            regions,
            default_hub,
        })
    }

    /// Every hub that has been quoted. These are the candidate bunkering locations.
    pub fn hubs(&self) -> &[String] {
        &self.hubs
    }

    pub fn default_hub(&self) -> &str {
        &self.default_hub
    }

    /// The quote for `hub`, using the latest period not after `period`, or else the earliest one.
    pub fn quote(&self, hub: &str, grade: FuelGrade, period: Period) -> Option<f64> {
        let series = self.prices.get(&(normalize(hub), grade))?;
        series
            .range(..=period)
            .next_back()
            .or_else(|| series.iter().next())
            .map(|(_, price)| *price)
    }

    /// The hub whose prices apply at `port`: the port itself if it is a hub, else its region.
    pub fn hub_for(&self, port: &str) -> &str {
        let port = normalize(port);

        if let Some(hub) = self
            .hubs
            .iter()
            .find(|hub| port.contains(hub.as_str()))
        {
            return hub;
        }

        self.regions
            .iter()
            .find(|r| r.ports.iter().any(|p| port.contains(p.as_str())))
            .map(|r| r.hub.as_str())
            .unwrap_or(&self.default_hub)
    }

    /// Per-grade prices at `port` in `period`. Falls back to the default hub for missing grades.
    pub fn prices_at(&self, port: &str, period: Period) -> Fuel {
        let hub = self.hub_for(port);
        let price = |grade| match self.quote(hub, grade, period) {
            Some(p) => p,
            None => {
                warn!(
                    "no {} price for {} (via {}), using {}",
                    grade, port, hub, self.default_hub
                );
                // The default hub quotes every grade, checked in `new`.
                self.quote(&self.default_hub, grade, period).unwrap_or_default()
            }
        };

        Fuel::new(price(FuelGrade::Vlsfo), price(FuelGrade::Mgo))
    }
}

/// Where a bunkering stop is made
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "port", rename_all = "snake_case")]
pub enum BunkerLocation {
    LoadPort(String),
    Hub(String),
}

impl BunkerLocation {
    pub fn port(&self) -> &str {
        match self {
            BunkerLocation::LoadPort(p) | BunkerLocation::Hub(p) => p,
        }
    }
}

/// A costed bunkering location
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BunkerPortOption {
    pub location: BunkerLocation,
    /// Prices at the location, after any scenario multiplier
    pub prices: Fuel,
    /// Origin to bunkering location. `None` for the load port baseline.
    pub to_hub: Option<Route>,
    /// Bunkering location to load port. `None` for the load port baseline.
    pub from_hub: Option<Route>,
    /// Extra ballast distance compared to sailing direct. Negative when the hub is en route.
    pub detour_nm: Distance,
    pub detour_days: Days,
    /// The shortfall bought at this location
    pub fuel_cost: Cost,
    /// Fuel and hire spent on the detour
    pub detour_cost: Cost,
    pub fee: Cost,
    pub total_cost: Cost,
    /// Total ballast distance when bunkering here
    pub ballast_nm: Distance,
}

/// The outcome of the bunkering location choice
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BunkerPlan {
    pub chosen: BunkerPortOption,
    /// Bunkering at the load port with no detour
    pub baseline: BunkerPortOption,
    /// Every hub with both legs resolvable
    pub candidates: Vec<BunkerPortOption>,
    /// Baseline cost minus chosen cost
    pub savings: Cost,
}

/// What the bunkering decision needs to know about a voyage
#[derive(Debug, Clone, Copy)]
pub struct BunkerRequest<'a> {
    pub origin: &'a str,
    pub load_port: &'a str,
    /// Direct ballast distance
    pub direct_nm: Distance,
    /// Fuel that has to be bought
    pub shortfall: Fuel,
    /// Ballast speed and consumption, used to cost the detour
    pub ballast: SeaRate,
    pub hire_rate: Cost,
    pub period: Period,
    pub multiplier: f64,
}

/// Chooses the cheapest place to buy the shortfall: the load port or any hub reachable
/// on both legs. Options within `bunker_tie_epsilon` of the cheapest are ranked by ballast distance.
pub fn plan_bunkering(
    request: &BunkerRequest,
    distances: &PortDistances,
    prices: &BunkerPrices,
    config: &VoyageConfig,
) -> BunkerPlan {
    let load_prices = prices
        .prices_at(request.load_port, request.period)
        .scale(request.multiplier);
    let fuel_cost = request.shortfall.priced(&load_prices);
    let baseline = BunkerPortOption {
        location: BunkerLocation::LoadPort(normalize(request.load_port)),
        prices: load_prices,
        to_hub: None,
        from_hub: None,
        detour_nm: 0.0,
        detour_days: 0.0,
        fuel_cost,
        detour_cost: 0.0,
        fee: config.bunkering_fee,
        total_cost: fuel_cost + config.bunkering_fee,
        ballast_nm: request.direct_nm,
    };

    let candidates: Vec<BunkerPortOption> = prices
        .hubs()
        .iter()
        .filter_map(|hub| {
            let to_hub = distances.distance(request.origin, hub);
            let from_hub = distances.distance(hub, request.load_port);
            let (leg1, leg2) = match (to_hub.nm(), from_hub.nm()) {
                (Some(a), Some(b)) => (a, b),
                _ => {
                    debug!(
                        "skipping bunker hub {} for {} -> {}: route unavailable",
                        hub, request.origin, request.load_port
                    );
                    return None;
                }
            };

            let hub_prices = prices
                .quote_all(hub, request.period)
                .scale(request.multiplier);
            let detour_nm = leg1 + leg2 - request.direct_nm;
            let detour_days = request.ballast.days(detour_nm);
            let fuel_cost = request.shortfall.priced(&hub_prices);
            let detour_cost = detour_days * request.ballast.fuel.priced(&hub_prices)
                + detour_days * request.hire_rate;
            let total_cost = fuel_cost + detour_cost + config.bunkering_fee;
            trace!("bunker hub {}: total cost {:.0}", hub, total_cost);

            Some(BunkerPortOption {
                location: BunkerLocation::Hub(hub.clone()),
                prices: hub_prices,
                to_hub: Some(to_hub),
                from_hub: Some(from_hub),
                detour_nm,
                detour_days,
                fuel_cost,
                detour_cost,
                fee: config.bunkering_fee,
                total_cost,
                ballast_nm: leg1 + leg2,
            })
        })
        .collect();

    let cheapest = std::iter::once(&baseline)
        .chain(&candidates)
        .map(|o| FloatOrd(o.total_cost))
        .min()
        .map(|c| c.0)
        .unwrap_or(baseline.total_cost);

    // Near ties go to the shortest ballast, so the chosen option may cost up to
    // `bunker_tie_epsilon` more than the cheapest one. The baseline comes first, so it wins
    // exact ties on both keys.
    let chosen = std::iter::once(&baseline)
        .chain(&candidates)
        .filter(|o| o.total_cost <= cheapest + config.bunker_tie_epsilon)
        .min_by_key(|o| (FloatOrd(o.ballast_nm), FloatOrd(o.total_cost)))
        .cloned()
        .unwrap_or_else(|| baseline.clone());

    let savings = match chosen.location {
        BunkerLocation::LoadPort(_) => 0.0,
        BunkerLocation::Hub(_) => baseline.total_cost - chosen.total_cost,
    };

    BunkerPlan {
        chosen,
        baseline,
        candidates,
        savings,
    }
}

impl BunkerPrices {
    /// Both grades quoted at `hub` itself, falling back like [`BunkerPrices::prices_at`]
    fn quote_all(&self, hub: &str, period: Period) -> Fuel {
        match (
            self.quote(hub, FuelGrade::Vlsfo, period),
            self.quote(hub, FuelGrade::Mgo, period),
        ) {
            (Some(vlsfo), Some(mgo)) => Fuel::new(vlsfo, mgo),
            _ => self.prices_at(hub, period),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    fn march() -> Period {
        "2026-03".parse().unwrap()
    }

    #[test]
    fn period_parsing() {
        assert_eq!(march(), Period { year: 2026, month: 3 });
        assert!("2026-13".parse::<Period>().is_err());
        assert!("march".parse::<Period>().is_err());
        assert_eq!(march().to_string(), "2026-03");
    }

    #[test]
    fn quotes_use_latest_period_not_after_request() {
        let rows = vec![
            PriceRow {
                hub: "Singapore".into(),
                grade: FuelGrade::Vlsfo,
                period: "2026-01".parse().unwrap(),
                price: 480.0,
            },
            PriceRow {
                hub: "Singapore".into(),
                grade: FuelGrade::Vlsfo,
                period: "2026-04".parse().unwrap(),
                price: 520.0,
            },
            PriceRow {
                hub: "Singapore".into(),
                grade: FuelGrade::Mgo,
                period: "2026-04".parse().unwrap(),
                price: 650.0,
            },
        ];
        let prices = BunkerPrices::new(rows, default_regions(), "SINGAPORE").unwrap();

        assert_eq!(prices.quote("SINGAPORE", FuelGrade::Vlsfo, march()), Some(480.0));
        assert_eq!(
            prices.quote("singapore", FuelGrade::Vlsfo, "2026-06".parse().unwrap()),
            Some(520.0)
        );
        // Nothing quoted at or before March, so the earliest quote is used.
        assert_eq!(prices.quote("SINGAPORE", FuelGrade::Mgo, march()), Some(650.0));
    }

    #[test]
    fn regional_fallback_and_default_hub() {
        let prices = fixtures::prices();
        assert_eq!(prices.hub_for("LIANYUNGANG"), "QINGDAO");
        assert_eq!(prices.hub_for("Kamsar Anchorage"), "GIBRALTAR");
        assert_eq!(prices.hub_for("FUJAIRAH"), "FUJAIRAH");
        assert_eq!(prices.hub_for("ATLANTIS"), "SINGAPORE");
        assert_eq!(prices.prices_at("PORT HEDLAND", march()), Fuel::new(490.0, 649.0));
    }

    #[test]
    fn default_hub_must_be_priced() {
        let err = BunkerPrices::new(Vec::new(), default_regions(), "SINGAPORE").unwrap_err();
        assert_eq!(
            err,
            PriceBookError::DefaultHubUnpriced {
                hub: "SINGAPORE".into(),
                grade: FuelGrade::Vlsfo
            }
        );
    }

    fn request<'a>(origin: &'a str, load_port: &'a str, direct_nm: f64) -> BunkerRequest<'a> {
        BunkerRequest {
            origin,
            load_port,
            direct_nm,
            shortfall: Fuel::new(800.0, 40.0),
            ballast: fixtures::vessel("V", origin)
                .profile(crate::problem::SpeedRegime::Economical)
                .ballast,
            hire_rate: 12_000.0,
            period: march(),
            multiplier: 1.0,
        }
    }

    #[test]
    fn chosen_option_is_within_epsilon_of_every_option() {
        let distances = fixtures::distances();
        let prices = fixtures::prices();
        let config = VoyageConfig::default();
        let direct = distances.require("MAP TA PHUT", "KAMSAR ANCHORAGE").unwrap();
        let plan = plan_bunkering(
            &request("MAP TA PHUT", "KAMSAR ANCHORAGE", direct),
            &distances,
            &prices,
            &config,
        );

        assert!(!plan.candidates.is_empty());
        for option in plan.candidates.iter().chain(std::iter::once(&plan.baseline)) {
            assert!(plan.chosen.total_cost <= option.total_cost + config.bunker_tie_epsilon);
        }
        match plan.chosen.location {
            BunkerLocation::Hub(_) => assert_eq!(
                plan.savings,
                plan.baseline.total_cost - plan.chosen.total_cost
            ),
            BunkerLocation::LoadPort(_) => assert_eq!(plan.savings, 0.0),
        }
    }

    #[test]
    fn planning_is_idempotent() {
        let distances = fixtures::distances();
        let prices = fixtures::prices();
        let config = VoyageConfig::default();
        let direct = distances.require("QINGDAO", "PORT HEDLAND").unwrap();
        let req = request("QINGDAO", "PORT HEDLAND", direct);
        let first = plan_bunkering(&req, &distances, &prices, &config);
        let second = plan_bunkering(&req, &distances, &prices, &config);
        assert_eq!(first, second);
    }

    #[test]
    fn falls_back_to_load_port_without_routes() {
        let distances = PortDistances::new();
        let prices = fixtures::prices();
        let config = VoyageConfig::default();
        let plan = plan_bunkering(
            &request("ATLANTIS", "PORT HEDLAND", 3000.0),
            &distances,
            &prices,
            &config,
        );

        assert!(plan.candidates.is_empty());
        assert_eq!(
            plan.chosen.location,
            BunkerLocation::LoadPort("PORT HEDLAND".into())
        );
        assert_eq!(plan.savings, 0.0);
        assert_eq!(plan.chosen.detour_nm, 0.0);
    }

    #[test]
    fn near_ties_go_to_the_shorter_ballast() {
        let distances = PortDistances::new().with_table(vec![
            fixtures::row("ORIGIN", "DEST", 1000.0),
            fixtures::row("ORIGIN", "GIBRALTAR", 500.0),
            fixtures::row("GIBRALTAR", "DEST", 500.0),
            fixtures::row("ORIGIN", "ROTTERDAM", 600.0),
            fixtures::row("ROTTERDAM", "DEST", 600.0),
        ]);
        let prices = fixtures::prices();
        let config = VoyageConfig::default();
        let mut req = request("ORIGIN", "DEST", 1000.0);

        // Rotterdam VLSFO is 7 cheaper than Gibraltar. Buy just enough that this pays for the
        // 200 nm detour with 500 to spare.
        let detour_days = req.ballast.days(200.0);
        let rotterdam = Fuel::new(467.0, 613.0);
        let detour_rate = req.ballast.fuel.priced(&rotterdam) + req.hire_rate;
        req.shortfall = Fuel::new((detour_days * detour_rate + 500.0) / 7.0, 0.0);

        let plan = plan_bunkering(&req, &distances, &prices, &config);
        let cheapest = plan
            .candidates
            .iter()
            .find(|o| o.location == BunkerLocation::Hub("ROTTERDAM".into()))
            .unwrap();
        assert_eq!(plan.chosen.location, BunkerLocation::Hub("GIBRALTAR".into()));
        assert!((plan.chosen.total_cost - cheapest.total_cost - 500.0).abs() < 1e-6);
        assert!(plan.chosen.ballast_nm < cheapest.ballast_nm);
    }

    #[test]
    fn en_route_hub_can_have_negative_detour() {
        // The hub is on the way and cheaper, so it must be chosen.
        let distances = PortDistances::new().with_table(vec![
            fixtures::row("ORIGIN", "DEST", 1000.0),
            fixtures::row("ORIGIN", "FUJAIRAH", 400.0),
            fixtures::row("FUJAIRAH", "DEST", 550.0),
        ]);
        let prices = fixtures::prices();
        let config = VoyageConfig::default();
        let mut req = request("ORIGIN", "DEST", 1000.0);
        req.shortfall = Fuel::new(1000.0, 0.0);

        let plan = plan_bunkering(&req, &distances, &prices, &config);
        assert_eq!(plan.chosen.location, BunkerLocation::Hub("FUJAIRAH".into()));
        assert!(plan.chosen.detour_nm < 0.0);
        assert!(plan.chosen.detour_cost < 0.0);
        assert!(plan.savings > 0.0);
    }
}
