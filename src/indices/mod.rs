//! Spectral indices and their evaluation over masked bands.
//!
//! Each [SpectralIndex] is bound to a declarative [Expr] formula over
//! reflectance bands. Evaluation checks every referenced band before
//! computing anything.

pub mod formula;

use log::debug;
use ndarray::Zip;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fmt::Display, str::FromStr};

use crate::{
    bands::Band::{self, *},
    components::raster::MaskedBand,
    errors::{Result, SensorioError},
};
pub use formula::Expr;
use formula::{band, normalized_difference};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SpectralIndex {
    Ndvi,
    Ndwi,
    Mndwi,
    Ndmi,
    Nbr,
    Gndvi,
    Ndre,
    Ndgri,
    Savi,
    Evi,
    Bsi,
    AweiNsh,
    Srswir,
    Rdi,
    Cig,
    Gli,
}

impl SpectralIndex {
    pub const ALL: [SpectralIndex; 16] = [
        SpectralIndex::Ndvi,
        SpectralIndex::Ndwi,
        SpectralIndex::Mndwi,
        SpectralIndex::Ndmi,
        SpectralIndex::Nbr,
        SpectralIndex::Gndvi,
        SpectralIndex::Ndre,
        SpectralIndex::Ndgri,
        SpectralIndex::Savi,
        SpectralIndex::Evi,
        SpectralIndex::Bsi,
        SpectralIndex::AweiNsh,
        SpectralIndex::Srswir,
        SpectralIndex::Rdi,
        SpectralIndex::Cig,
        SpectralIndex::Gli,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            SpectralIndex::Ndvi => "NDVI",
            SpectralIndex::Ndwi => "NDWI",
            SpectralIndex::Mndwi => "MNDWI",
            SpectralIndex::Ndmi => "NDMI",
            SpectralIndex::Nbr => "NBR",
            SpectralIndex::Gndvi => "GNDVI",
            SpectralIndex::Ndre => "NDRE",
            SpectralIndex::Ndgri => "NDGRI",
            SpectralIndex::Savi => "SAVI",
            SpectralIndex::Evi => "EVI",
            SpectralIndex::Bsi => "BSI",
            SpectralIndex::AweiNsh => "AWEI_NSH",
            SpectralIndex::Srswir => "SRSWIR",
            SpectralIndex::Rdi => "RDI",
            SpectralIndex::Cig => "CIG",
            SpectralIndex::Gli => "GLI",
        }
    }

    pub fn formula(&self) -> Expr {
        match self {
            SpectralIndex::Ndvi => normalized_difference(Nir, Red),
            SpectralIndex::Ndwi => normalized_difference(Green, Nir),
            SpectralIndex::Mndwi => normalized_difference(Green, Swir1),
            SpectralIndex::Ndmi => normalized_difference(Nir, Swir1),
            SpectralIndex::Nbr => normalized_difference(Nir, Swir2),
            SpectralIndex::Gndvi => normalized_difference(Nir, Green),
            SpectralIndex::Ndre => normalized_difference(Nir, Vre1),
            SpectralIndex::Ndgri => normalized_difference(Green, Red),
            SpectralIndex::Savi => {
                1.5 * (band(Nir) - band(Red)) / (band(Nir) + band(Red) + 0.5)
            }
            SpectralIndex::Evi => {
                2.5 * (band(Nir) - band(Red))
                    / (band(Nir) + 6. * band(Red) - 7.5 * band(Blue) + 1.)
            }
            SpectralIndex::Bsi => {
                ((band(Swir1) + band(Red)) - (band(Nir) + band(Blue)))
                    / ((band(Swir1) + band(Red)) + (band(Nir) + band(Blue)))
            }
            SpectralIndex::AweiNsh => {
                4. * (band(Green) - band(Swir1)) - (0.25 * band(Nir) + 2.75 * band(Swir2))
            }
            SpectralIndex::Srswir => band(Swir1) / band(Swir2),
            SpectralIndex::Rdi => band(Swir2) / band(Nir),
            SpectralIndex::Cig => band(Nir) / band(Green) - 1.,
            SpectralIndex::Gli => {
                (2. * band(Green) - band(Red) - band(Blue))
                    / (2. * band(Green) + band(Red) + band(Blue))
            }
        }
    }

    pub fn required_bands(&self) -> Vec<Band> {
        self.formula().bands()
    }
}

impl Display for SpectralIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SpectralIndex {
    type Err = SensorioError;

    fn from_str(s: &str) -> Result<Self> {
        SpectralIndex::ALL
            .into_iter()
            .find(|index| index.name().eq_ignore_ascii_case(s))
            .ok_or_else(|| SensorioError::InvalidProduct(format!("unknown index name {s}")))
    }
}

/// First band required by `index` that is not in `available`.
pub fn missing_band(index: SpectralIndex, available: impl Fn(&Band) -> bool) -> Option<Band> {
    index
        .required_bands()
        .into_iter()
        .find(|band| !available(band))
}

/// Evaluates `index` over `available_bands`.
///
/// The result is invalid where any input band is invalid, and where the
/// arithmetic itself yields a non finite value.
pub fn evaluate(
    index: SpectralIndex,
    available_bands: &HashMap<Band, MaskedBand>,
) -> Result<MaskedBand> {
    let formula = index.formula();
    let required = formula.bands();
    if let Some(band) = required
        .iter()
        .find(|band| !available_bands.contains_key(*band))
    {
        return Err(SensorioError::MissingBandForIndex { index, band: *band });
    }

    let inputs: Vec<&MaskedBand> = required
        .iter()
        .filter_map(|band| available_bands.get(band))
        .collect();
    let Some(reference) = inputs.first() else {
        return Err(SensorioError::InvalidProduct(format!("{index} references no band")));
    };
    let grid = reference.grid().clone();
    for input in inputs.iter().skip(1) {
        grid.ensure_matches(input.grid())?;
    }
    debug!("evaluate {index} from {required:?} on {:?}", grid.shape);

    let arrays = required
        .iter()
        .zip(inputs.iter())
        .map(|(band, input)| (*band, input.data().to_owned()))
        .collect();
    let data = formula.eval(&arrays, grid.shape);

    let mut mask = data.mapv(|value| !value.is_finite());
    for input in inputs.iter() {
        Zip::from(&mut mask)
            .and(input.mask())
            .for_each(|masked, input_masked| *masked |= *input_masked);
    }
    MaskedBand::new(data, mask, grid)
}
