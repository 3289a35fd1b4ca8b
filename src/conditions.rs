//! Market conditions a portfolio is evaluated under: the bunker price level and port delays.
//!
//! Port delays come from outside the crate (a congestion model, an analyst, a constant). Any
//! [`DelaySource`] can be turned into [`PortDelays`], and equal numbers always give equal results.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::distance::normalize;
use crate::problem::{Cargo, Days};
use crate::voyage::Adjustments;

/// Anything that predicts congestion delay at a port, in days
pub trait DelaySource {
    /// The predicted delay at `port`, if the source knows it
    fn delay_days(&self, port: &str) -> Option<Days>;
}

/// The same delay at every port
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantDelay(pub Days);

impl DelaySource for ConstantDelay {
    fn delay_days(&self, _: &str) -> Option<Days> {
        Some(self.0)
    }
}

impl DelaySource for HashMap<String, Days> {
    fn delay_days(&self, port: &str) -> Option<Days> {
        let port = normalize(port);
        self.iter()
            .find(|(p, _)| normalize(p) == port)
            .map(|(_, d)| *d)
    }
}

/// Congestion delay per port, plus a uniform delay. A voyage is charged the delay at its
/// cargo's discharge port.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortDelays {
    /// Added to the delay at any port, so charged once per voyage at the discharge port
    pub uniform: Days,
    /// Added at the named ports, keyed by normalized name
    pub ports: BTreeMap<String, Days>,
}

impl PortDelays {
    pub fn none() -> PortDelays {
        PortDelays::default()
    }

    pub fn uniform(days: Days) -> PortDelays {
        PortDelays {
            uniform: days,
            ports: BTreeMap::new(),
        }
    }

    pub fn with_port(mut self, port: &str, days: Days) -> PortDelays {
        self.ports.insert(normalize(port), days);
        self
    }

    /// Samples `source` at the given ports. Ports the source knows nothing about get no delay.
    pub fn from_source<'a, S>(source: &S, ports: impl IntoIterator<Item = &'a str>) -> PortDelays
    where
        S: DelaySource + ?Sized,
    {
        let mut delays = PortDelays::none();
        for port in ports {
            if let Some(days) = source.delay_days(port) {
                delays.ports.insert(normalize(port), days.max(0.0));
            }
        }
        delays
    }

    /// Delay expected at one port call
    pub fn at(&self, port: &str) -> Days {
        let specific = self.ports.get(&normalize(port)).copied().unwrap_or(0.0);
        (self.uniform + specific).max(0.0)
    }

    /// Delay expected on a voyage carrying `cargo`. Congestion is charged at the discharge port.
    pub fn for_cargo(&self, cargo: &Cargo) -> Days {
        self.at(&cargo.discharge().port)
    }
}

impl DelaySource for PortDelays {
    fn delay_days(&self, port: &str) -> Option<Days> {
        Some(self.at(port))
    }
}

/// The conditions a portfolio is evaluated under
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Conditions {
    /// Factor applied to every bunker price
    pub bunker_multiplier: f64,
    pub delays: PortDelays,
}

impl Default for Conditions {
    fn default() -> Self {
        Self {
            bunker_multiplier: 1.0,
            delays: PortDelays::none(),
        }
    }
}

impl Conditions {
    /// The voyage adjustments for `cargo` under these conditions
    pub fn adjustments(&self, cargo: &Cargo) -> Adjustments {
        Adjustments {
            delay_days: self.delays.for_cargo(cargo),
            bunker_multiplier: self.bunker_multiplier,
        }
    }
}
