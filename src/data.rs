//! Loading datasets and configuration from JSON.

use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use derive_more::Display;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::bunker::{default_regions, BunkerPrices, PriceBookError, PriceRegion, PriceRow};
use crate::config::{Config, ConfigError};
use crate::distance::{DistanceRow, PortDistances};
use crate::problem::{Cargo, ConstructionError, Distance, Vessel};

#[derive(Debug, Display)]
pub enum LoadError {
    #[display(fmt = "could not read {}: {}", path, source)]
    Io { path: String, source: std::io::Error },
    #[display(fmt = "{}", _0)]
    Json(serde_json::Error),
    /// The dataset parsed, but is inconsistent
    #[display(fmt = "{}", _0)]
    Invalid(ConstructionError),
    #[display(fmt = "{}", _0)]
    Prices(PriceBookError),
    #[display(fmt = "{}", _0)]
    Config(ConfigError),
}

impl std::error::Error for LoadError {}

impl From<serde_json::Error> for LoadError {
    fn from(e: serde_json::Error) -> Self {
        LoadError::Json(e)
    }
}

impl From<ConfigError> for LoadError {
    fn from(e: ConfigError) -> Self {
        LoadError::Config(e)
    }
}

impl From<PriceBookError> for LoadError {
    fn from(e: PriceBookError) -> Self {
        LoadError::Prices(e)
    }
}

fn yes() -> bool {
    true
}

fn singapore() -> String {
    "SINGAPORE".to_string()
}

/// Everything a desk needs: the fleet, the cargo book, distances, bunker prices and settings.
///
/// Vessels and cargoes are validated as they are deserialized.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub vessels: Vec<Vessel>,
    pub cargoes: Vec<Cargo>,
    /// Authoritative port to port distances
    #[serde(default)]
    pub distances: Vec<DistanceRow>,
    /// Fall back on the curated estimates shipped with the crate
    #[serde(default = "yes")]
    pub builtin_estimates: bool,
    /// Distance used when a route is known nowhere
    #[serde(default)]
    pub default_distance: Option<Distance>,
    pub prices: Vec<PriceRow>,
    #[serde(default)]
    pub price_regions: Option<Vec<PriceRegion>>,
    #[serde(default = "singapore")]
    pub default_hub: String,
    #[serde(default)]
    pub config: Config,
}

impl Dataset {
    pub fn from_reader<R: Read>(reader: R) -> Result<Dataset, LoadError> {
        let dataset: Dataset = serde_json::from_reader(reader)?;
        dataset.validate()?;
        Ok(dataset)
    }

    /// Checks what the vessel and cargo constructors can not see on their own
    pub fn validate(&self) -> Result<(), LoadError> {
        let mut seen = HashSet::new();
        for name in self.vessels.iter().map(|v| v.name()) {
            if !seen.insert(name) {
                return Err(LoadError::Invalid(ConstructionError::DuplicateName {
                    name: name.to_string(),
                }));
            }
        }

        let mut seen = HashSet::new();
        for name in self.cargoes.iter().map(|c| c.name()) {
            if !seen.insert(name) {
                return Err(LoadError::Invalid(ConstructionError::DuplicateName {
                    name: name.to_string(),
                }));
            }
        }

        self.config.validate()?;
        Ok(())
    }

    /// The distance resolver described by this dataset
    pub fn port_distances(&self) -> Result<PortDistances, LoadError> {
        let distances = match self.builtin_estimates {
            true => PortDistances::with_builtin_estimates()?,
            false => PortDistances::new(),
        };
        let distances = distances.with_table(self.distances.clone());
        Ok(match self.default_distance {
            Some(nm) => distances.with_default_estimate(nm),
            None => distances,
        })
    }

    /// The bunker price book described by this dataset
    pub fn bunker_prices(&self) -> Result<BunkerPrices, LoadError> {
        let regions = self.price_regions.clone().unwrap_or_else(default_regions);
        Ok(BunkerPrices::new(
            self.prices.iter().cloned(),
            regions,
            &self.default_hub,
        )?)
    }
}

/// Reads a dataset from a JSON file
pub fn load_dataset<P: AsRef<Path>>(path: P) -> Result<Dataset, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let dataset = Dataset::from_reader(BufReader::new(file))?;
    info!(
        "loaded {} vessels and {} cargoes from {}",
        dataset.vessels.len(),
        dataset.cargoes.len(),
        path.display()
    );
    Ok(dataset)
}

/// Reads a configuration file. Missing fields take their default values.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, LoadError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| LoadError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config: Config = serde_json::from_reader(BufReader::new(file))?;
    config.validate()?;
    debug!("config from {}: {:?}", path.display(), config);
    Ok(config)
}
