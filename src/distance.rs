//! Port-to-port distances.
//!
//! Lookups go through a fallback chain: the tabulated distance table in either direction,
//! then the curated estimates, then an optional default estimate. The result is a tagged
//! [`Route`] so callers can tell how much to trust the number.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use derive_more::Display;
use itertools::iproduct;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::problem::Distance;

/// Alias groups for ports that appear under several names in the source data
const ALIASES: &[&[&str]] = &[
    &["QINGDAO", "DAGANG (QINGDAO)"],
    &["KAMSAR ANCHORAGE", "KAMSAR", "PORT KAMSAR"],
    &["GWANGYANG", "GWANGYANG LNG TERMINAL"],
    &["PONTA DA MADEIRA", "SAO LUIS"],
    &["TIANJIN", "XINGANG"],
    &["VANCOUVER", "VANCOUVER (CANADA)"],
    &["MANGALORE", "NEW MANGALORE"],
    &["VIZAG", "VISAKHAPATNAM"],
];

const BUILTIN_ESTIMATES: &str = include_str!("../data/estimates.json");

/// Case-folds and trims a port name, collapsing repeated whitespace.
pub fn normalize(port: &str) -> String {
    port.split_whitespace()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join(" ")
}

/// One row of a distance table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistanceRow {
    pub from: String,
    pub to: String,
    pub nm: Distance,
}

/// The outcome of a distance lookup
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum Route {
    /// Found in the distance table. `reversed` if only the opposite direction was listed.
    Tabulated { nm: Distance, reversed: bool },
    /// Taken from the curated estimates
    Estimated { nm: Distance },
    /// Nothing known about the pair, the configured default estimate was used
    Default { nm: Distance },
    /// No distance is available
    Unavailable,
}

impl Route {
    /// The distance, if one is available
    pub fn nm(&self) -> Option<Distance> {
        match *self {
            Route::Tabulated { nm, .. } | Route::Estimated { nm } | Route::Default { nm } => {
                Some(nm)
            }
            Route::Unavailable => None,
        }
    }

    /// Whether the distance is an estimate of some kind
    pub fn is_estimate(&self) -> bool {
        matches!(self, Route::Estimated { .. } | Route::Default { .. })
    }
}

/// A route that can not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Display)]
#[display(fmt = "no distance available between {} and {}", from, to)]
pub struct DistanceUnavailable {
    pub from: String,
    pub to: String,
}

impl std::error::Error for DistanceUnavailable {}

#[derive(Debug, Default)]
struct LookupStats {
    tabulated: AtomicUsize,
    reversed: AtomicUsize,
    estimated: AtomicUsize,
    defaulted: AtomicUsize,
    unavailable: AtomicUsize,
}

/// How lookups have been resolved so far
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LookupCounts {
    pub tabulated: usize,
    pub reversed: usize,
    pub estimated: usize,
    pub defaulted: usize,
    pub unavailable: usize,
}

/// Distances between ports. Read-only once built, and safe to share between threads.
#[derive(Debug, Default)]
pub struct PortDistances {
    /// Authoritative distances, keyed by normalized (from, to)
    table: HashMap<(String, String), Distance>,
    /// Curated estimates for routes missing from the table
    estimates: HashMap<(String, String), Distance>,
    /// Maps a normalized port name to every name it is known under
    aliases: HashMap<String, Vec<String>>,
    /// Used when neither the table nor the estimates know a route
    default_estimate: Option<Distance>,
    stats: LookupStats,
}

impl PortDistances {
    /// An empty resolver that knows the standard port aliases
    pub fn new() -> PortDistances {
        let mut aliases = HashMap::new();
        for group in ALIASES {
            let names: Vec<String> = group.iter().map(|n| n.to_string()).collect();
            for name in &names {
                aliases.insert(name.clone(), names.clone());
            }
        }

        PortDistances {
            aliases,
            ..Default::default()
        }
    }

    /// A resolver with the standard aliases and the curated estimates that ship with the crate
    pub fn with_builtin_estimates() -> Result<PortDistances, serde_json::Error> {
        let rows: Vec<DistanceRow> = serde_json::from_str(BUILTIN_ESTIMATES)?;
        Ok(PortDistances::new().with_estimates(rows))
    }

    /// Adds authoritative rows. Later rows overwrite earlier ones for the same ordered pair.
    pub fn with_table(mut self, rows: impl IntoIterator<Item = DistanceRow>) -> Self {
        for row in rows {
            self.table
                .insert((normalize(&row.from), normalize(&row.to)), row.nm);
        }
        self
    }

    pub fn with_estimates(mut self, rows: impl IntoIterator<Item = DistanceRow>) -> Self {
        for row in rows {
            self.estimates
                .insert((normalize(&row.from), normalize(&row.to)), row.nm);
        }
        self
    }

    pub fn with_default_estimate(mut self, nm: Distance) -> Self {
        self.default_estimate = Some(nm);
        self
    }

    /// Every name `port` may be listed under, starting with its own normalized name
    fn names(&self, port: &str) -> Vec<String> {
        let port = normalize(port);
        match self.aliases.get(&port) {
            Some(group) => std::iter::once(port.clone())
                .chain(group.iter().filter(|n| **n != port).cloned())
                .collect(),
            None => vec![port],
        }
    }

    /// Whether `a` and `b` refer to the same port
    pub fn same_port(&self, a: &str, b: &str) -> bool {
        let b = normalize(b);
        self.names(a).contains(&b)
    }

    /// Resolves the distance from `from` to `to` through the fallback chain
    pub fn distance(&self, from: &str, to: &str) -> Route {
        if self.same_port(from, to) {
            self.stats.tabulated.fetch_add(1, Ordering::Relaxed);
            return Route::Tabulated {
                nm: 0.0,
                reversed: false,
            };
        }

        let a = self.names(from);
        let b = self.names(to);

        if let Some(nm) = Self::find(&self.table, &a, &b) {
            self.stats.tabulated.fetch_add(1, Ordering::Relaxed);
            return Route::Tabulated {
                nm,
                reversed: false,
            };
        }

        if let Some(nm) = Self::find(&self.table, &b, &a) {
            self.stats.reversed.fetch_add(1, Ordering::Relaxed);
            return Route::Tabulated { nm, reversed: true };
        }

        if let Some(nm) =
            Self::find(&self.estimates, &a, &b).or_else(|| Self::find(&self.estimates, &b, &a))
        {
            self.stats.estimated.fetch_add(1, Ordering::Relaxed);
            debug!("estimated distance {} -> {} = {} nm", a[0], b[0], nm);
            return Route::Estimated { nm };
        }

        if let Some(nm) = self.default_estimate {
            self.stats.defaulted.fetch_add(1, Ordering::Relaxed);
            info!(
                "no distance known for {} -> {}, using default estimate {} nm",
                a[0], b[0], nm
            );
            return Route::Default { nm };
        }

        self.stats.unavailable.fetch_add(1, Ordering::Relaxed);
        warn!("no distance available for {} -> {}", a[0], b[0]);
        Route::Unavailable
    }

    /// Like [`PortDistances::distance`], but an unavailable route is an error
    pub fn require(&self, from: &str, to: &str) -> Result<Distance, DistanceUnavailable> {
        self.distance(from, to)
            .nm()
            .ok_or_else(|| DistanceUnavailable {
                from: normalize(from),
                to: normalize(to),
            })
    }

    fn find(
        map: &HashMap<(String, String), Distance>,
        from: &[String],
        to: &[String],
    ) -> Option<Distance> {
        iproduct!(from, to).find_map(|(a, b)| map.get(&(a.clone(), b.clone())).copied())
    }

    /// How lookups have been resolved since construction
    pub fn lookup_counts(&self) -> LookupCounts {
        LookupCounts {
            tabulated: self.stats.tabulated.load(Ordering::Relaxed),
            reversed: self.stats.reversed.load(Ordering::Relaxed),
            estimated: self.stats.estimated.load(Ordering::Relaxed),
            defaulted: self.stats.defaulted.load(Ordering::Relaxed),
            unavailable: self.stats.unavailable.load(Ordering::Relaxed),
        }
    }

    /// The number of tabulated rows
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(from: &str, to: &str, nm: f64) -> DistanceRow {
        DistanceRow {
            from: from.to_string(),
            to: to.to_string(),
            nm,
        }
    }

    #[test]
    fn table_wins_over_estimates_in_both_directions() {
        let distances = PortDistances::new()
            .with_table([row("port hedland", "Qingdao", 3500.0)])
            .with_estimates([row("PORT HEDLAND", "QINGDAO", 9999.0)]);

        assert_eq!(
            distances.distance("PORT HEDLAND", "QINGDAO"),
            Route::Tabulated {
                nm: 3500.0,
                reversed: false
            }
        );
        assert_eq!(
            distances.distance("qingdao ", "port  hedland"),
            Route::Tabulated {
                nm: 3500.0,
                reversed: true
            }
        );
    }

    #[test]
    fn aliases_resolve_to_the_same_route() {
        let distances =
            PortDistances::new().with_table([row("PORT KAMSAR", "DAGANG (QINGDAO)", 11124.0)]);

        assert_eq!(distances.require("KAMSAR ANCHORAGE", "QINGDAO"), Ok(11124.0));
        assert_eq!(distances.require("Kamsar", "qingdao"), Ok(11124.0));
        assert_eq!(distances.require("KAMSAR", "KAMSAR ANCHORAGE"), Ok(0.0));
    }

    #[test]
    fn estimates_and_default_are_tagged() {
        let distances = PortDistances::new()
            .with_estimates([row("SINGAPORE", "PORT HEDLAND", 1678.0)])
            .with_default_estimate(5000.0);

        assert_eq!(
            distances.distance("PORT HEDLAND", "SINGAPORE"),
            Route::Estimated { nm: 1678.0 }
        );
        assert_eq!(
            distances.distance("ATLANTIS", "SINGAPORE"),
            Route::Default { nm: 5000.0 }
        );
        assert!(distances.distance("ATLANTIS", "SINGAPORE").is_estimate());
    }

    #[test]
    fn unknown_route_is_unavailable_not_fatal() {
        let distances = PortDistances::new();
        assert_eq!(distances.distance("ATLANTIS", "LEMURIA"), Route::Unavailable);
        let err = distances.require("atlantis", "lemuria").unwrap_err();
        assert_eq!(err.to_string(), "no distance available between ATLANTIS and LEMURIA");

        let counts = distances.lookup_counts();
        assert_eq!(counts.unavailable, 2);
        assert_eq!(counts.tabulated, 0);
    }

    #[test]
    fn builtin_estimates_cover_hub_legs() {
        let distances = PortDistances::with_builtin_estimates().unwrap();
        assert_eq!(distances.require("SINGAPORE", "PORT HEDLAND"), Ok(1678.0));
        assert_eq!(distances.require("GIBRALTAR", "KAMSAR ANCHORAGE"), Ok(2500.0));
        assert!(distances.is_empty());
    }
}
