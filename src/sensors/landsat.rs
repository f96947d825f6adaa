use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

use crate::{
    bands::Band,
    components::{
        archive::ProductTree,
        metadata::{parse_datetime, parse_odl, Metadata, ProductMetadata},
    },
    errors::Result,
    sensors::{
        group, name_captures, BandSource, CloudFlag, Context, NodataRule, OpticalLayout, Sensor,
        SensorType,
    },
};

const FILL: f32 = 0.;
const SR_SCALE: f32 = 2.75e-5;
const SR_OFFSET: f32 = -0.2;
const ST_SCALE: f32 = 0.003_418_02;
const ST_OFFSET: f32 = 149.;
/// QA_PIXEL dilated cloud, cirrus and cloud bits.
const QA_CLOUD_BITS: CloudFlag = CloudFlag::AnyBit(0b1110);
/// QA_PIXEL value of fill pixels, only the fill bit set.
const QA_FILL: f32 = 1.;

const OLI: &[(&str, Band)] = &[
    ("B1", Band::CoastalAerosol),
    ("B2", Band::Blue),
    ("B3", Band::Green),
    ("B4", Band::Red),
    ("B5", Band::Nir),
    ("B6", Band::Swir1),
    ("B7", Band::Swir2),
    ("B8", Band::Pan),
    ("B9", Band::SwirCirrus),
    ("B10", Band::Tir1),
    ("B11", Band::Tir2),
];

const TIRS: &[(&str, Band)] = &[("B10", Band::Tir1), ("B11", Band::Tir2)];

const TM: &[(&str, Band)] = &[
    ("B1", Band::Blue),
    ("B2", Band::Green),
    ("B3", Band::Red),
    ("B4", Band::Nir),
    ("B5", Band::Swir1),
    ("B6", Band::Tir1),
    ("B7", Band::Swir2),
];

const ETM: &[(&str, Band)] = &[
    ("B1", Band::Blue),
    ("B2", Band::Green),
    ("B3", Band::Red),
    ("B4", Band::Nir),
    ("B5", Band::Swir1),
    ("B6_VCID_1", Band::Tir1),
    ("B6_VCID_2", Band::Tir2),
    ("B7", Band::Swir2),
    ("B8", Band::Pan),
];

const MSS_1_3: &[(&str, Band)] = &[
    ("B4", Band::Green),
    ("B5", Band::Red),
    ("B6", Band::Vre1),
    ("B6", Band::Vre2),
    ("B6", Band::Vre3),
    ("B7", Band::Nir),
    ("B7", Band::NarrowNir),
];

const MSS_4_5: &[(&str, Band)] = &[
    ("B1", Band::Green),
    ("B2", Band::Red),
    ("B3", Band::Vre1),
    ("B3", Band::Vre2),
    ("B3", Band::Vre3),
    ("B4", Band::Nir),
    ("B4", Band::NarrowNir),
];

/// Instrument deduced from the sensor letter and the mission number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instrument {
    Oli,
    Tirs,
    Etm,
    Tm,
    Mss,
}

impl Instrument {
    fn new(sensor: &str, mission: u8) -> Self {
        match (sensor, mission) {
            ("C" | "O", _) => Instrument::Oli,
            ("T", 8..) => Instrument::Tirs,
            ("T", _) => Instrument::Tm,
            ("E", _) => Instrument::Etm,
            _ => Instrument::Mss,
        }
    }

    fn bands(&self, mission: u8) -> &'static [(&'static str, Band)] {
        match self {
            Instrument::Oli => OLI,
            Instrument::Tirs => TIRS,
            Instrument::Etm => ETM,
            Instrument::Tm => TM,
            Instrument::Mss if mission <= 3 => MSS_1_3,
            Instrument::Mss => MSS_4_5,
        }
    }

    fn default_resolution(&self) -> f64 {
        match self {
            Instrument::Mss => 60.,
            _ => 30.,
        }
    }
}

fn is_thermal(band: Band) -> bool {
    matches!(band, Band::Tir1 | Band::Tir2)
}

/// USGS Landsat Collection 2 product, Level-1 or Level-2, Landsat 1 to 9.
#[derive(Debug)]
pub struct Landsat;

impl Sensor for Landsat {
    type Layout = OpticalLayout;

    const SENSOR_TYPE: SensorType = SensorType::Optical;
    const NAME_PATTERN: &'static str =
        r"^L([COTEM])(0[1-9])_(L1TP|L1GT|L1GS|L2SP|L2SR)_(\d{6})_(\d{8})_(\d{8})_(\d{2})_(T1|T2|RT)$";
    const METADATA_PATTERN: &'static str = r"_MTL\.txt$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<OpticalLayout> {
        let id = tree.name();
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let mission: u8 = group(&captures, 2)?.parse().unwrap_or_default();
        let instrument = Instrument::new(group(&captures, 1)?, mission);
        let product_type = group(&captures, 3)?.to_string();
        let level2 = product_type.starts_with("L2");
        let path_row = group(&captures, 4)?.to_string();

        let mtl_entry = tree.require(&Regex::new(Self::METADATA_PATTERN)?)?;
        let mtl = parse_odl(&tree.read_to_string(mtl_entry)?, mtl_entry);
        let datetime = match (mtl.get("DATE_ACQUIRED"), mtl.get("SCENE_CENTER_TIME")) {
            (Ok(date), Ok(time)) => parse_datetime(&format!("{date}T{time}"))?,
            _ => parse_datetime(group(&captures, 5)?)?,
        };

        let mut sources = BTreeMap::new();
        for &(code, band) in instrument.bands(mission) {
            let thermal = is_thermal(band);
            let pattern = match (level2, thermal) {
                // Level-2 keeps one surface temperature band
                (true, true) if code.contains("VCID_2") => continue,
                (true, true) => {
                    format!(r"(?i)_ST_{}\.TIF$", code.split('_').next().unwrap_or(code))
                }
                (true, false) => format!(r"(?i)_SR_{code}\.TIF$"),
                (false, _) => format!(r"(?i)_{code}\.TIF$"),
            };
            let Some(entry) = tree.find(&Regex::new(&pattern)?) else {
                debug!("{id} has no {code}");
                continue;
            };
            let (scale, offset) = match (level2, thermal) {
                (true, true) => (ST_SCALE, ST_OFFSET),
                (true, false) => (SR_SCALE, SR_OFFSET),
                (false, _) => level1_factors(&mtl, code, thermal)?,
            };
            sources.insert(
                band,
                BandSource::new(entry, scale, offset, NodataRule::Fill(FILL)),
            );
        }
        if let Some(entry) = tree.find(&Regex::new(r"(?i)_QA_PIXEL\.TIF$")?) {
            sources.insert(
                Band::Clouds,
                BandSource::cloud_mask(entry, QA_CLOUD_BITS, NodataRule::Fill(QA_FILL)),
            );
        }

        Ok(OpticalLayout {
            metadata: ProductMetadata {
                platform: id[..4].to_string(),
                id,
                sensor_type: Self::SENSOR_TYPE,
                product_type,
                datetime,
                tile_or_orbit: Some(path_row),
            },
            sources,
            reference: Band::Red,
            default_resolution: instrument.default_resolution(),
        })
    }
}

/// TOA reflectance factors, radiance for thermal bands.
fn level1_factors(mtl: &Metadata, code: &str, thermal: bool) -> Result<(f32, f32)> {
    let quantity = if thermal { "RADIANCE" } else { "REFLECTANCE" };
    let suffix = code.trim_start_matches('B');
    Ok((
        mtl.get_parsed(&format!("{quantity}_MULT_BAND_{suffix}"))?,
        mtl.get_parsed(&format!("{quantity}_ADD_BAND_{suffix}"))?,
    ))
}
