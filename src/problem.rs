use std::ops::{Add, Sub};

use chrono::NaiveDate;
use derive_more::Display;
use serde::{Deserialize, Serialize};

/// The type used for cargo quantities, in metric tonnes
pub type Quantity = f64;
/// The type used for distance, in nautical miles
pub type Distance = f64;
/// The type used for cost, in USD
pub type Cost = f64;
/// The type used for durations, in fractional days
pub type Days = f64;

/// The two fuel grades burnt on board. Sea passages burn both, port time burns MGO only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "UPPERCASE")]
pub enum FuelGrade {
    #[display(fmt = "VLSFO")]
    Vlsfo,
    #[display(fmt = "MGO")]
    Mgo,
}

impl FuelGrade {
    pub const ALL: [FuelGrade; 2] = [FuelGrade::Vlsfo, FuelGrade::Mgo];
}

/// An amount per fuel grade. Used both for quantities (MT, MT/day) and for prices (USD/MT).
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Fuel {
    pub vlsfo: f64,
    pub mgo: f64,
}

impl Fuel {
    pub fn new(vlsfo: f64, mgo: f64) -> Fuel {
        Fuel { vlsfo, mgo }
    }

    /// Only MGO, as burnt in port
    pub fn mgo(mgo: f64) -> Fuel {
        Fuel { vlsfo: 0.0, mgo }
    }

    pub fn total(&self) -> f64 {
        self.vlsfo + self.mgo
    }

    pub fn scale(&self, factor: f64) -> Fuel {
        Fuel::new(self.vlsfo * factor, self.mgo * factor)
    }

    /// Component-wise `max(0, self - other)`
    pub fn shortfall(&self, other: &Fuel) -> Fuel {
        Fuel::new(
            (self.vlsfo - other.vlsfo).max(0.0),
            (self.mgo - other.mgo).max(0.0),
        )
    }

    /// The cost of this quantity at the given per-grade `prices`
    pub fn priced(&self, prices: &Fuel) -> Cost {
        self.vlsfo * prices.vlsfo + self.mgo * prices.mgo
    }

    fn is_valid(&self) -> bool {
        self.vlsfo.is_finite() && self.mgo.is_finite() && self.vlsfo >= 0.0 && self.mgo >= 0.0
    }
}

impl Add for Fuel {
    type Output = Fuel;

    fn add(self, rhs: Fuel) -> Fuel {
        Fuel::new(self.vlsfo + rhs.vlsfo, self.mgo + rhs.mgo)
    }
}

impl Sub for Fuel {
    type Output = Fuel;

    fn sub(self, rhs: Fuel) -> Fuel {
        Fuel::new(self.vlsfo - rhs.vlsfo, self.mgo - rhs.mgo)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum SpeedRegime {
    /// Slow steaming at reduced consumption
    #[display(fmt = "eco")]
    Economical,
    /// The speed warranted in the charter party
    #[display(fmt = "warranted")]
    Warranted,
}

impl SpeedRegime {
    pub const ALL: [SpeedRegime; 2] = [SpeedRegime::Economical, SpeedRegime::Warranted];
}

/// Whether a vessel belongs to the own fleet or has to be chartered in from the market
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Fleet {
    Own,
    Market,
}

/// Whether a cargo is a contractual obligation or an optional market opportunity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Committed,
    Market,
}

/// Speed and daily consumption while at sea
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeaRate {
    /// Speed in knots
    pub speed: f64,
    /// Consumption per day at this speed
    pub fuel: Fuel,
}

impl SeaRate {
    /// The number of days needed to sail `distance` nautical miles
    pub fn days(&self, distance: Distance) -> Days {
        distance / (self.speed * 24.0)
    }
}

/// Laden and ballast sea rates for one speed regime
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedProfile {
    pub laden: SeaRate,
    pub ballast: SeaRate,
}

/// The raw, unvalidated description of a vessel. Turned into a [`Vessel`] by [`Vessel::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VesselData {
    pub name: String,
    pub dwt: Quantity,
    pub hire_rate: Cost,
    pub warranted: SpeedProfile,
    pub economical: SpeedProfile,
    pub port_idle_mgo: f64,
    pub port_working_mgo: f64,
    pub current_port: String,
    pub etd: NaiveDate,
    pub rob: Fuel,
    pub fleet: Fleet,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "VesselData", into = "VesselData")]
pub struct Vessel {
    /// The name of the vessel, used as its identity
    name: String,
    /// Deadweight capacity
    dwt: Quantity,
    /// Daily hire rate paid for the vessel
    hire_rate: Cost,
    /// Sea rates at the charter party warranted speed
    warranted: SpeedProfile,
    /// Sea rates when slow steaming
    economical: SpeedProfile,
    /// MGO per day while idle in port
    port_idle_mgo: f64,
    /// MGO per day while loading or discharging
    port_working_mgo: f64,
    /// Where the vessel opens
    current_port: String,
    /// The earliest date the vessel can sail
    etd: NaiveDate,
    /// Fuel remaining on board
    rob: Fuel,
    fleet: Fleet,
}

impl Vessel {
    pub fn new(data: VesselData) -> Result<Vessel, ConstructionError> {
        let vessel = || data.name.clone();

        if !(data.dwt.is_finite() && data.dwt > 0.0) {
            return Err(ConstructionError::NonPositiveCapacity { vessel: vessel() });
        }
        if !(data.hire_rate.is_finite() && data.hire_rate >= 0.0) {
            return Err(ConstructionError::NegativeHireRate { vessel: vessel() });
        }
        for regime in SpeedRegime::ALL {
            let profile = match regime {
                SpeedRegime::Economical => &data.economical,
                SpeedRegime::Warranted => &data.warranted,
            };
            for rate in [&profile.laden, &profile.ballast] {
                if !(rate.speed.is_finite() && rate.speed > 0.0) {
                    return Err(ConstructionError::SpeedIsZero {
                        vessel: vessel(),
                        regime,
                    });
                }
                if !rate.fuel.is_valid() {
                    return Err(ConstructionError::NegativeConsumption { vessel: vessel() });
                }
            }
        }
        if !Fuel::new(data.port_idle_mgo, data.port_working_mgo).is_valid() {
            return Err(ConstructionError::NegativeConsumption { vessel: vessel() });
        }
        if !data.rob.is_valid() {
            return Err(ConstructionError::NegativeRob { vessel: vessel() });
        }
        if data.current_port.trim().is_empty() {
            return Err(ConstructionError::MissingPort { name: vessel() });
        }

        Ok(Vessel {
            name: data.name,
            dwt: data.dwt,
            hire_rate: data.hire_rate,
            warranted: data.warranted,
            economical: data.economical,
            port_idle_mgo: data.port_idle_mgo,
            port_working_mgo: data.port_working_mgo,
            current_port: data.current_port,
            etd: data.etd,
            rob: data.rob,
            fleet: data.fleet,
        })
    }

    /// The name of the vessel, used as its identity
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Deadweight capacity
    pub fn dwt(&self) -> Quantity {
        self.dwt
    }

    /// Daily hire rate paid for the vessel
    pub fn hire_rate(&self) -> Cost {
        self.hire_rate
    }

    /// Laden and ballast sea rates under the given speed regime
    pub fn profile(&self, regime: SpeedRegime) -> &SpeedProfile {
        match regime {
            SpeedRegime::Economical => &self.economical,
            SpeedRegime::Warranted => &self.warranted,
        }
    }

    /// MGO per day while idle in port
    pub fn port_idle_mgo(&self) -> f64 {
        self.port_idle_mgo
    }

    /// MGO per day while loading or discharging
    pub fn port_working_mgo(&self) -> f64 {
        self.port_working_mgo
    }

    /// Where the vessel opens
    pub fn current_port(&self) -> &str {
        &self.current_port
    }

    /// The earliest date the vessel can sail
    pub fn etd(&self) -> NaiveDate {
        self.etd
    }

    /// Fuel remaining on board
    pub fn rob(&self) -> Fuel {
        self.rob
    }

    pub fn fleet(&self) -> Fleet {
        self.fleet
    }

    pub fn is_own(&self) -> bool {
        self.fleet == Fleet::Own
    }
}

impl From<Vessel> for VesselData {
    fn from(v: Vessel) -> Self {
        VesselData {
            name: v.name,
            dwt: v.dwt,
            hire_rate: v.hire_rate,
            warranted: v.warranted,
            economical: v.economical,
            port_idle_mgo: v.port_idle_mgo,
            port_working_mgo: v.port_working_mgo,
            current_port: v.current_port,
            etd: v.etd,
            rob: v.rob,
            fleet: v.fleet,
        }
    }
}

impl TryFrom<VesselData> for Vessel {
    type Error = ConstructionError;

    fn try_from(data: VesselData) -> Result<Self, Self::Error> {
        Vessel::new(data)
    }
}

/// One end of a cargo's voyage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortCall {
    pub port: String,
    /// Cargo handled per day, in tonnes
    pub rate: Quantity,
    /// Fixed turn time, in hours
    #[serde(default)]
    pub turn_hours: f64,
    /// Fixed port disbursements
    #[serde(default)]
    pub cost: Cost,
}

impl PortCall {
    /// Days spent handling `quantity`, excluding turn time
    pub fn handling_days(&self, quantity: Quantity) -> Days {
        quantity / self.rate
    }

    pub fn turn_days(&self) -> Days {
        self.turn_hours / 24.0
    }
}

/// The raw, unvalidated description of a cargo. Turned into a [`Cargo`] by [`Cargo::new`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CargoData {
    pub name: String,
    #[serde(default)]
    pub customer: String,
    #[serde(default)]
    pub commodity: String,
    pub quantity: Quantity,
    #[serde(default)]
    pub tolerance: f64,
    pub laycan_start: NaiveDate,
    pub laycan_end: NaiveDate,
    #[serde(default)]
    pub freight_rate: Option<f64>,
    #[serde(default)]
    pub half_freight_threshold: Option<Quantity>,
    pub load: PortCall,
    pub discharge: PortCall,
    #[serde(default)]
    pub commission: f64,
    pub commitment: Commitment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "CargoData", into = "CargoData")]
pub struct Cargo {
    name: String,
    customer: String,
    commodity: String,
    /// Contract quantity
    quantity: Quantity,
    /// Fraction by which the lifted quantity may deviate from the contract quantity
    tolerance: f64,
    laycan_start: NaiveDate,
    laycan_end: NaiveDate,
    /// Freight per tonne. `None` for market cargoes that have not been priced yet.
    freight_rate: Option<f64>,
    /// Tonnes above this quantity are paid at half the freight rate
    half_freight_threshold: Option<Quantity>,
    load: PortCall,
    discharge: PortCall,
    commission: f64,
    commitment: Commitment,
}

impl Cargo {
    pub fn new(data: CargoData) -> Result<Cargo, ConstructionError> {
        let cargo = || data.name.clone();
        let finite_non_negative = |x: f64| x.is_finite() && x >= 0.0;

        if !(data.quantity.is_finite() && data.quantity > 0.0) {
            return Err(ConstructionError::NonPositiveQuantity { cargo: cargo() });
        }
        if !(finite_non_negative(data.tolerance) && data.tolerance < 1.0) {
            return Err(ConstructionError::ToleranceOutOfRange {
                cargo: cargo(),
                tolerance: data.tolerance,
            });
        }
        if data.laycan_start > data.laycan_end {
            return Err(ConstructionError::LaycanReversed { cargo: cargo() });
        }
        if let Some(rate) = data.freight_rate {
            if !finite_non_negative(rate) {
                return Err(ConstructionError::NegativeFreightRate { cargo: cargo() });
            }
        }
        if let Some(threshold) = data.half_freight_threshold {
            if !(threshold.is_finite() && threshold > 0.0) {
                return Err(ConstructionError::NonPositiveQuantity { cargo: cargo() });
            }
        }
        for call in [&data.load, &data.discharge] {
            if call.port.trim().is_empty() {
                return Err(ConstructionError::MissingPort { name: cargo() });
            }
            if !(call.rate.is_finite() && call.rate > 0.0) {
                return Err(ConstructionError::NonPositiveHandlingRate {
                    cargo: cargo(),
                    port: call.port.clone(),
                });
            }
            if !finite_non_negative(call.turn_hours) {
                return Err(ConstructionError::NegativeTurnTime {
                    cargo: cargo(),
                    port: call.port.clone(),
                });
            }
            if !finite_non_negative(call.cost) {
                return Err(ConstructionError::NegativePortCost {
                    cargo: cargo(),
                    port: call.port.clone(),
                });
            }
        }
        if !(finite_non_negative(data.commission) && data.commission < 1.0) {
            return Err(ConstructionError::CommissionOutOfRange {
                cargo: cargo(),
                commission: data.commission,
            });
        }

        Ok(Cargo {
            name: data.name,
            customer: data.customer,
            commodity: data.commodity,
            quantity: data.quantity,
            tolerance: data.tolerance,
            laycan_start: data.laycan_start,
            laycan_end: data.laycan_end,
            freight_rate: data.freight_rate,
            half_freight_threshold: data.half_freight_threshold,
            load: data.load,
            discharge: data.discharge,
            commission: data.commission,
            commitment: data.commitment,
        })
    }

    /// The name of the cargo, used as its identity
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn customer(&self) -> &str {
        &self.customer
    }

    pub fn commodity(&self) -> &str {
        &self.commodity
    }

    /// Contract quantity
    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    /// Fraction by which the lifted quantity may deviate from the contract quantity
    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn laycan_start(&self) -> NaiveDate {
        self.laycan_start
    }

    pub fn laycan_end(&self) -> NaiveDate {
        self.laycan_end
    }

    /// Freight per tonne, if the cargo has been priced
    pub fn freight_rate(&self) -> Option<f64> {
        self.freight_rate
    }

    /// Tonnes above this quantity are paid at half the freight rate
    pub fn half_freight_threshold(&self) -> Option<Quantity> {
        self.half_freight_threshold
    }

    pub fn load(&self) -> &PortCall {
        &self.load
    }

    pub fn discharge(&self) -> &PortCall {
        &self.discharge
    }

    /// Address and brokerage commission, as a fraction of gross freight
    pub fn commission(&self) -> f64 {
        self.commission
    }

    pub fn commitment(&self) -> Commitment {
        self.commitment
    }

    pub fn is_committed(&self) -> bool {
        self.commitment == Commitment::Committed
    }

    /// The smallest and largest quantity the tolerance band allows, in whole tonnes
    pub fn quantity_band(&self) -> (Quantity, Quantity) {
        (
            (self.quantity * (1.0 - self.tolerance)).floor(),
            (self.quantity * (1.0 + self.tolerance)).floor(),
        )
    }

    /// A copy of this cargo with the given freight rate
    pub fn with_freight_rate(&self, rate: f64) -> Cargo {
        Cargo {
            freight_rate: Some(rate),
            ..self.clone()
        }
    }
}

impl From<Cargo> for CargoData {
    fn from(c: Cargo) -> Self {
        CargoData {
            name: c.name,
            customer: c.customer,
            commodity: c.commodity,
            quantity: c.quantity,
            tolerance: c.tolerance,
            laycan_start: c.laycan_start,
            laycan_end: c.laycan_end,
            freight_rate: c.freight_rate,
            half_freight_threshold: c.half_freight_threshold,
            load: c.load,
            discharge: c.discharge,
            commission: c.commission,
            commitment: c.commitment,
        }
    }
}

impl TryFrom<CargoData> for Cargo {
    type Error = ConstructionError;

    fn try_from(data: CargoData) -> Result<Self, Self::Error> {
        Cargo::new(data)
    }
}

/// Rejected vessel or cargo descriptions
#[derive(Debug, Clone, PartialEq, Display)]
pub enum ConstructionError {
    /// Deadweight must be strictly positive
    #[display(fmt = "vessel {} has non-positive deadweight", vessel)]
    NonPositiveCapacity { vessel: String },
    /// Hire rates can not be negative
    #[display(fmt = "vessel {} has a negative hire rate", vessel)]
    NegativeHireRate { vessel: String },
    /// Speed of vessel is zero (or negative) in one of the regimes
    #[display(fmt = "vessel {} has zero speed at {} speed", vessel, regime)]
    SpeedIsZero { vessel: String, regime: SpeedRegime },
    /// Some fuel consumption rate is negative
    #[display(fmt = "vessel {} has a negative consumption rate", vessel)]
    NegativeConsumption { vessel: String },
    #[display(fmt = "vessel {} has negative fuel remaining on board", vessel)]
    NegativeRob { vessel: String },
    /// A vessel or cargo refers to a blank port name
    #[display(fmt = "{} refers to an empty port name", name)]
    MissingPort { name: String },
    #[display(fmt = "cargo {} has a non-positive quantity", cargo)]
    NonPositiveQuantity { cargo: String },
    /// Tolerance must lie in [0, 1)
    #[display(fmt = "cargo {} has tolerance {} outside [0, 1)", cargo, tolerance)]
    ToleranceOutOfRange { cargo: String, tolerance: f64 },
    #[display(fmt = "cargo {} has a laycan that closes before it opens", cargo)]
    LaycanReversed { cargo: String },
    #[display(fmt = "cargo {} has a negative freight rate", cargo)]
    NegativeFreightRate { cargo: String },
    #[display(fmt = "cargo {} has a non-positive handling rate at {}", cargo, port)]
    NonPositiveHandlingRate { cargo: String, port: String },
    #[display(fmt = "cargo {} has a negative turn time at {}", cargo, port)]
    NegativeTurnTime { cargo: String, port: String },
    #[display(fmt = "cargo {} has negative port costs at {}", cargo, port)]
    NegativePortCost { cargo: String, port: String },
    /// Commission must lie in [0, 1)
    #[display(fmt = "cargo {} has commission {} outside [0, 1)", cargo, commission)]
    CommissionOutOfRange { cargo: String, commission: f64 },
    /// Vessel and cargo names are identities and must be unique
    #[display(fmt = "the name {} is used more than once", name)]
    DuplicateName { name: String },
}

impl std::error::Error for ConstructionError {}
