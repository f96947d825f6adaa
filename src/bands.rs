//! Satellite agnostic band vocabulary.
//!
//! Every product maps a subset of [Band]s to something it can read from disk.
//! A band outside that subset is unsupported for the product, it is not nodata.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::SensorioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Band {
    CoastalAerosol,
    Blue,
    Green,
    Red,
    Vre1,
    Vre2,
    Vre3,
    Nir,
    NarrowNir,
    WaterVapour,
    SwirCirrus,
    Swir1,
    Swir2,
    Tir1,
    Tir2,
    Pan,
    Vv,
    Vh,
    Hh,
    Hv,
    VvDspk,
    VhDspk,
    HhDspk,
    HvDspk,
    Dem,
    Slope,
    Hillshade,
    Clouds,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BandKind {
    Optical,
    Sar,
    Dem,
    /// Categorical flags, 1 where set and 0 elsewhere.
    Mask,
}

impl Band {
    pub const ALL: [Band; 28] = [
        Band::CoastalAerosol,
        Band::Blue,
        Band::Green,
        Band::Red,
        Band::Vre1,
        Band::Vre2,
        Band::Vre3,
        Band::Nir,
        Band::NarrowNir,
        Band::WaterVapour,
        Band::SwirCirrus,
        Band::Swir1,
        Band::Swir2,
        Band::Tir1,
        Band::Tir2,
        Band::Pan,
        Band::Vv,
        Band::Vh,
        Band::Hh,
        Band::Hv,
        Band::VvDspk,
        Band::VhDspk,
        Band::HhDspk,
        Band::HvDspk,
        Band::Dem,
        Band::Slope,
        Band::Hillshade,
        Band::Clouds,
    ];

    pub fn kind(&self) -> BandKind {
        match self {
            Band::Vv
            | Band::Vh
            | Band::Hh
            | Band::Hv
            | Band::VvDspk
            | Band::VhDspk
            | Band::HhDspk
            | Band::HvDspk => BandKind::Sar,
            Band::Dem | Band::Slope | Band::Hillshade => BandKind::Dem,
            Band::Clouds => BandKind::Mask,
            _ => BandKind::Optical,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Band::CoastalAerosol => "COASTAL_AEROSOL",
            Band::Blue => "BLUE",
            Band::Green => "GREEN",
            Band::Red => "RED",
            Band::Vre1 => "VRE_1",
            Band::Vre2 => "VRE_2",
            Band::Vre3 => "VRE_3",
            Band::Nir => "NIR",
            Band::NarrowNir => "NARROW_NIR",
            Band::WaterVapour => "WATER_VAPOUR",
            Band::SwirCirrus => "SWIR_CIRRUS",
            Band::Swir1 => "SWIR_1",
            Band::Swir2 => "SWIR_2",
            Band::Tir1 => "TIR_1",
            Band::Tir2 => "TIR_2",
            Band::Pan => "PAN",
            Band::Vv => "VV",
            Band::Vh => "VH",
            Band::Hh => "HH",
            Band::Hv => "HV",
            Band::VvDspk => "VV_DSPK",
            Band::VhDspk => "VH_DSPK",
            Band::HhDspk => "HH_DSPK",
            Band::HvDspk => "HV_DSPK",
            Band::Dem => "DEM",
            Band::Slope => "SLOPE",
            Band::Hillshade => "HILLSHADE",
            Band::Clouds => "CLOUDS",
        }
    }

    /// Polarisation a despeckled band is filtered from.
    pub fn speckled(&self) -> Option<Band> {
        match self {
            Band::VvDspk => Some(Band::Vv),
            Band::VhDspk => Some(Band::Vh),
            Band::HhDspk => Some(Band::Hh),
            Band::HvDspk => Some(Band::Hv),
            _ => None,
        }
    }

    /// Polarisation read from a two letter code such as `vv` or `HH`.
    pub fn from_polarisation(code: &str) -> Option<Band> {
        match code.to_ascii_uppercase().as_str() {
            "VV" => Some(Band::Vv),
            "VH" => Some(Band::Vh),
            "HH" => Some(Band::Hh),
            "HV" => Some(Band::Hv),
            _ => None,
        }
    }
}

impl Display for Band {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Band {
    type Err = SensorioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Band::ALL
            .into_iter()
            .find(|band| band.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SensorioError::InvalidProduct(format!("unknown band name {s}")))
    }
}
