//! Policy and claim data structures matching the MTPL portfolio format

use serde::{Deserialize, Serialize};

/// Area code of the policyholder's home, ordered from rural (A) to urban (F)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Area {
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Area {
    pub const ALL: [Area; 6] = [Area::A, Area::B, Area::C, Area::D, Area::E, Area::F];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "A" => Some(Area::A),
            "B" => Some(Area::B),
            "C" => Some(Area::C),
            "D" => Some(Area::D),
            "E" => Some(Area::E),
            "F" => Some(Area::F),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Area::A => "A",
            Area::B => "B",
            Area::C => "C",
            Area::D => "D",
            Area::E => "E",
            Area::F => "F",
        }
    }
}

/// Fuel type of the insured vehicle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehGas {
    Regular,
    Diesel,
}

impl VehGas {
    pub const ALL: [VehGas; 2] = [VehGas::Regular, VehGas::Diesel];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Regular" => Some(VehGas::Regular),
            "Diesel" => Some(VehGas::Diesel),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehGas::Regular => "Regular",
            VehGas::Diesel => "Diesel",
        }
    }
}

/// Vehicle brand group (anonymized codes; B7-B9 do not occur in the portfolio)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehBrand {
    B1,
    B2,
    B3,
    B4,
    B5,
    B6,
    B10,
    B11,
    B12,
    B13,
    B14,
}

impl VehBrand {
    pub const ALL: [VehBrand; 11] = [
        VehBrand::B1,
        VehBrand::B2,
        VehBrand::B3,
        VehBrand::B4,
        VehBrand::B5,
        VehBrand::B6,
        VehBrand::B10,
        VehBrand::B11,
        VehBrand::B12,
        VehBrand::B13,
        VehBrand::B14,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "B1" => Some(VehBrand::B1),
            "B2" => Some(VehBrand::B2),
            "B3" => Some(VehBrand::B3),
            "B4" => Some(VehBrand::B4),
            "B5" => Some(VehBrand::B5),
            "B6" => Some(VehBrand::B6),
            "B10" => Some(VehBrand::B10),
            "B11" => Some(VehBrand::B11),
            "B12" => Some(VehBrand::B12),
            "B13" => Some(VehBrand::B13),
            "B14" => Some(VehBrand::B14),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehBrand::B1 => "B1",
            VehBrand::B2 => "B2",
            VehBrand::B3 => "B3",
            VehBrand::B4 => "B4",
            VehBrand::B5 => "B5",
            VehBrand::B6 => "B6",
            VehBrand::B10 => "B10",
            VehBrand::B11 => "B11",
            VehBrand::B12 => "B12",
            VehBrand::B13 => "B13",
            VehBrand::B14 => "B14",
        }
    }
}

/// French administrative region (pre-2016 boundaries, INSEE R-codes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Region {
    R11,
    R21,
    R22,
    R23,
    R24,
    R25,
    R26,
    R31,
    R41,
    R42,
    R43,
    R52,
    R53,
    R54,
    R72,
    R73,
    R74,
    R82,
    R83,
    R91,
    R93,
    R94,
}

impl Region {
    pub const ALL: [Region; 22] = [
        Region::R11,
        Region::R21,
        Region::R22,
        Region::R23,
        Region::R24,
        Region::R25,
        Region::R26,
        Region::R31,
        Region::R41,
        Region::R42,
        Region::R43,
        Region::R52,
        Region::R53,
        Region::R54,
        Region::R72,
        Region::R73,
        Region::R74,
        Region::R82,
        Region::R83,
        Region::R91,
        Region::R93,
        Region::R94,
    ];

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "R11" => Some(Region::R11),
            "R21" => Some(Region::R21),
            "R22" => Some(Region::R22),
            "R23" => Some(Region::R23),
            "R24" => Some(Region::R24),
            "R25" => Some(Region::R25),
            "R26" => Some(Region::R26),
            "R31" => Some(Region::R31),
            "R41" => Some(Region::R41),
            "R42" => Some(Region::R42),
            "R43" => Some(Region::R43),
            "R52" => Some(Region::R52),
            "R53" => Some(Region::R53),
            "R54" => Some(Region::R54),
            "R72" => Some(Region::R72),
            "R73" => Some(Region::R73),
            "R74" => Some(Region::R74),
            "R82" => Some(Region::R82),
            "R83" => Some(Region::R83),
            "R91" => Some(Region::R91),
            "R93" => Some(Region::R93),
            "R94" => Some(Region::R94),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Region::R11 => "R11",
            Region::R21 => "R21",
            Region::R22 => "R22",
            Region::R23 => "R23",
            Region::R24 => "R24",
            Region::R25 => "R25",
            Region::R26 => "R26",
            Region::R31 => "R31",
            Region::R41 => "R41",
            Region::R42 => "R42",
            Region::R43 => "R43",
            Region::R52 => "R52",
            Region::R53 => "R53",
            Region::R54 => "R54",
            Region::R72 => "R72",
            Region::R73 => "R73",
            Region::R74 => "R74",
            Region::R82 => "R82",
            Region::R83 => "R83",
            Region::R91 => "R91",
            Region::R93 => "R93",
            Region::R94 => "R94",
        }
    }

    /// Display name used in regional report tables (the attribute a
    /// choropleth joins onto boundary geometry)
    pub fn name(&self) -> &'static str {
        match self {
            Region::R11 => "Ile-de-France",
            Region::R21 => "Champagne-Ardenne",
            Region::R22 => "Picardie",
            Region::R23 => "Haute-Normandie",
            Region::R24 => "Centre",
            Region::R25 => "Basse-Normandie",
            Region::R26 => "Bourgogne",
            Region::R31 => "Nord-Pas-de-Calais",
            Region::R41 => "Lorraine",
            Region::R42 => "Alsace",
            Region::R43 => "Franche-Comte",
            Region::R52 => "Pays-de-la-Loire",
            Region::R53 => "Bretagne",
            Region::R54 => "Poitou-Charentes",
            Region::R72 => "Aquitaine",
            Region::R73 => "Midi-Pyrenees",
            Region::R74 => "Limousin",
            Region::R82 => "Rhone-Alpes",
            Region::R83 => "Auvergne",
            Region::R91 => "Languedoc-Roussillon",
            Region::R93 => "Provence-Alpes-Cote-d'Azur",
            Region::R94 => "Corse",
        }
    }
}

/// Vehicle power band for rating segmentation (raw power runs 4-15)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehPowerBand {
    P4,
    P5,
    P6,
    P7,
    P8,
    NinePlus,
}

impl VehPowerBand {
    pub const ALL: [VehPowerBand; 6] = [
        VehPowerBand::P4,
        VehPowerBand::P5,
        VehPowerBand::P6,
        VehPowerBand::P7,
        VehPowerBand::P8,
        VehPowerBand::NinePlus,
    ];

    /// Determine band from raw vehicle power
    pub fn from_power(power: u8) -> Self {
        match power {
            0..=4 => VehPowerBand::P4,
            5 => VehPowerBand::P5,
            6 => VehPowerBand::P6,
            7 => VehPowerBand::P7,
            8 => VehPowerBand::P8,
            _ => VehPowerBand::NinePlus,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehPowerBand::P4 => "4",
            VehPowerBand::P5 => "5",
            VehPowerBand::P6 => "6",
            VehPowerBand::P7 => "7",
            VehPowerBand::P8 => "8",
            VehPowerBand::NinePlus => "9+",
        }
    }
}

/// Vehicle age band: new vehicles behave differently from the 1-10 bulk and
/// the old tail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VehAgeBand {
    New,
    OneToTen,
    OverTen,
}

impl VehAgeBand {
    pub const ALL: [VehAgeBand; 3] =
        [VehAgeBand::New, VehAgeBand::OneToTen, VehAgeBand::OverTen];

    pub fn from_age(age: u32) -> Self {
        match age {
            0 => VehAgeBand::New,
            1..=10 => VehAgeBand::OneToTen,
            _ => VehAgeBand::OverTen,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VehAgeBand::New => "0",
            VehAgeBand::OneToTen => "1-10",
            VehAgeBand::OverTen => "11+",
        }
    }
}

/// Driver age band (licensing age in France is 18)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DrivAgeBand {
    D18To20,
    D21To25,
    D26To30,
    D31To40,
    D41To50,
    D51To70,
    Over70,
}

impl DrivAgeBand {
    pub const ALL: [DrivAgeBand; 7] = [
        DrivAgeBand::D18To20,
        DrivAgeBand::D21To25,
        DrivAgeBand::D26To30,
        DrivAgeBand::D31To40,
        DrivAgeBand::D41To50,
        DrivAgeBand::D51To70,
        DrivAgeBand::Over70,
    ];

    pub fn from_age(age: u32) -> Self {
        match age {
            0..=20 => DrivAgeBand::D18To20,
            21..=25 => DrivAgeBand::D21To25,
            26..=30 => DrivAgeBand::D26To30,
            31..=40 => DrivAgeBand::D31To40,
            41..=50 => DrivAgeBand::D41To50,
            51..=70 => DrivAgeBand::D51To70,
            _ => DrivAgeBand::Over70,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DrivAgeBand::D18To20 => "18-20",
            DrivAgeBand::D21To25 => "21-25",
            DrivAgeBand::D26To30 => "26-30",
            DrivAgeBand::D31To40 => "31-40",
            DrivAgeBand::D41To50 => "41-50",
            DrivAgeBand::D51To70 => "51-70",
            DrivAgeBand::Over70 => "71+",
        }
    }
}

/// Bonus-malus band: 50 is the best attainable level, above 100 means a
/// surcharge is in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BonusMalusBand {
    Base,
    UpTo100,
    Above100,
}

impl BonusMalusBand {
    pub const ALL: [BonusMalusBand; 3] = [
        BonusMalusBand::Base,
        BonusMalusBand::UpTo100,
        BonusMalusBand::Above100,
    ];

    pub fn from_level(level: u32) -> Self {
        match level {
            0..=50 => BonusMalusBand::Base,
            51..=100 => BonusMalusBand::UpTo100,
            _ => BonusMalusBand::Above100,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BonusMalusBand::Base => "50",
            BonusMalusBand::UpTo100 => "51-100",
            BonusMalusBand::Above100 => "101+",
        }
    }
}

/// A single claim line-item from the severity table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claim {
    /// Policy the claim was filed against
    pub policy_id: u64,

    /// Claim amount in euros
    pub amount: f64,
}

/// A single policy record from the merged portfolio
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    /// Unique policy identifier
    pub policy_id: u64,

    /// Time at risk as a fraction of a year, in (0, 1]
    pub exposure: f64,

    /// Area code of the policyholder's home
    pub area: Area,

    /// Raw vehicle power (administrative scale, 4-15)
    pub veh_power: u8,

    /// Vehicle age in years at the start of the exposure period
    pub veh_age: u32,

    /// Driver age in years
    pub driv_age: u32,

    /// Bonus-malus level (50 best, 350 worst; 100 is the entry level)
    pub bonus_malus: u32,

    /// Vehicle brand group
    pub veh_brand: VehBrand,

    /// Fuel type
    pub veh_gas: VehGas,

    /// Population density of the home municipality (inhabitants per km2);
    /// missing in a handful of records
    pub density: Option<f64>,

    /// Administrative region of the policy
    pub region: Region,

    /// Claim count as reported in the raw policy table
    pub reported_claim_count: u32,

    /// Claim count derived from the joined severity records
    #[serde(default)]
    pub claim_count: u32,

    /// Total claim amount derived from the joined severity records
    #[serde(default)]
    pub claim_total: f64,

    /// Whether this record was patched in for claims with no base policy
    #[serde(default)]
    pub patched: bool,

    /// Joined claim line-items (carried in memory, flattened on disk)
    #[serde(skip)]
    pub claims: Vec<Claim>,
}

impl Policy {
    /// Placeholder record for a claim whose key has no base policy.
    ///
    /// Risk factors are set to the portfolio's typical levels and exposure
    /// to a full year; the record carries no reported claim history.
    pub fn placeholder(policy_id: u64) -> Self {
        Self {
            policy_id,
            exposure: 1.0,
            area: Area::C,
            veh_power: 6,
            veh_age: 5,
            driv_age: 44,
            bonus_malus: 50,
            veh_brand: VehBrand::B12,
            veh_gas: VehGas::Regular,
            density: None,
            region: Region::R24,
            reported_claim_count: 0,
            claim_count: 0,
            claim_total: 0.0,
            patched: true,
            claims: Vec::new(),
        }
    }

    /// Observed claim rate: derived claim count per unit exposure
    pub fn claim_rate(&self) -> f64 {
        self.claim_count as f64 / self.exposure
    }

    pub fn veh_power_band(&self) -> VehPowerBand {
        VehPowerBand::from_power(self.veh_power)
    }

    pub fn veh_age_band(&self) -> VehAgeBand {
        VehAgeBand::from_age(self.veh_age)
    }

    pub fn driv_age_band(&self) -> DrivAgeBand {
        DrivAgeBand::from_age(self.driv_age)
    }

    pub fn bonus_malus_band(&self) -> BonusMalusBand {
        BonusMalusBand::from_level(self.bonus_malus)
    }
}

/// A groupable risk dimension of the portfolio.
///
/// Aggregation and report tables address columns through this enum rather
/// than by string name, so every grouping request is checked at compile
/// time; `from_name` covers the CLI surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Dimension {
    Area,
    VehPower,
    VehAge,
    DrivAge,
    BonusMalus,
    VehBrand,
    VehGas,
    Region,
}

impl Dimension {
    pub const ALL: [Dimension; 8] = [
        Dimension::Area,
        Dimension::VehPower,
        Dimension::VehAge,
        Dimension::DrivAge,
        Dimension::BonusMalus,
        Dimension::VehBrand,
        Dimension::VehGas,
        Dimension::Region,
    ];

    /// Column name used in CLI flags and report headers
    pub fn name(&self) -> &'static str {
        match self {
            Dimension::Area => "area",
            Dimension::VehPower => "veh_power",
            Dimension::VehAge => "veh_age",
            Dimension::DrivAge => "driv_age",
            Dimension::BonusMalus => "bonus_malus",
            Dimension::VehBrand => "veh_brand",
            Dimension::VehGas => "veh_gas",
            Dimension::Region => "region",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Dimension::ALL.iter().copied().find(|d| d.name() == name)
    }

    /// Level ordering used for reports and dummy coding; the first level is
    /// the reference
    pub fn levels(&self) -> Vec<&'static str> {
        match self {
            Dimension::Area => Area::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::VehPower => VehPowerBand::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::VehAge => VehAgeBand::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::DrivAge => DrivAgeBand::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::BonusMalus => BonusMalusBand::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::VehBrand => VehBrand::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::VehGas => VehGas::ALL.iter().map(|v| v.as_str()).collect(),
            Dimension::Region => Region::ALL.iter().map(|v| v.as_str()).collect(),
        }
    }

    /// The level a policy falls into on this dimension
    pub fn level_of(&self, policy: &Policy) -> &'static str {
        match self {
            Dimension::Area => policy.area.as_str(),
            Dimension::VehPower => policy.veh_power_band().as_str(),
            Dimension::VehAge => policy.veh_age_band().as_str(),
            Dimension::DrivAge => policy.driv_age_band().as_str(),
            Dimension::BonusMalus => policy.bonus_malus_band().as_str(),
            Dimension::VehBrand => policy.veh_brand.as_str(),
            Dimension::VehGas => policy.veh_gas.as_str(),
            Dimension::Region => policy.region.as_str(),
        }
    }
}

/// A numeric covariate available to model formulas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Covariate {
    /// Bonus-malus level used as a continuous regressor, in contrast to the
    /// banded `bonus_malus` factor
    BonusMalus,
    /// Natural log of municipality density; missing when density is missing
    LogDensity,
}

impl Covariate {
    pub const ALL: [Covariate; 2] = [Covariate::BonusMalus, Covariate::LogDensity];

    pub fn name(&self) -> &'static str {
        match self {
            Covariate::BonusMalus => "bonus_malus_level",
            Covariate::LogDensity => "log_density",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Covariate::ALL.iter().copied().find(|c| c.name() == name)
    }

    /// Covariate value for a policy, `None` when the source field is missing
    pub fn value(&self, policy: &Policy) -> Option<f64> {
        match self {
            Covariate::BonusMalus => Some(policy.bonus_malus as f64),
            Covariate::LogDensity => policy.density.map(|d| d.max(1.0).ln()),
        }
    }
}
