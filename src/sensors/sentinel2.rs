use chrono::{DateTime, Utc};
use log::debug;
use regex::Regex;
use std::{collections::BTreeMap, path::Path};

use crate::{
    bands::Band,
    components::{
        archive::{product_name, ProductTree},
        metadata::{parse_datetime, require_xml_text, xml_elements, xml_text, ProductMetadata},
    },
    errors::{Result, SensorioError},
    sensors::{
        group, name_captures, BandSource, CloudFlag, Context, NodataRule, OpticalLayout, Sensor,
        SensorType,
    },
};

/// Raw value of pixels outside the swath.
const FILL: f32 = 0.;

/// Cloud probability, in percent, from which an L2A pixel is cloudy.
const CLOUD_PROBABILITY: f32 = 50.;

/// `(file band code, band, native resolution, radiometric band id)`
const BANDS: [(&str, Band, u32, u8); 13] = [
    ("B01", Band::CoastalAerosol, 60, 0),
    ("B02", Band::Blue, 10, 1),
    ("B03", Band::Green, 10, 2),
    ("B04", Band::Red, 10, 3),
    ("B05", Band::Vre1, 20, 4),
    ("B06", Band::Vre2, 20, 5),
    ("B07", Band::Vre3, 20, 6),
    ("B08", Band::Nir, 10, 7),
    ("B8A", Band::NarrowNir, 20, 8),
    ("B09", Band::WaterVapour, 60, 9),
    ("B10", Band::SwirCirrus, 60, 10),
    ("B11", Band::Swir1, 20, 11),
    ("B12", Band::Swir2, 20, 12),
];

/// Processing level of a Sentinel-2 SAFE product.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    L1C,
    L2A,
}

impl Level {
    fn from_product_type(product_type: &str) -> Self {
        if product_type.ends_with("2A") {
            Level::L2A
        } else {
            Level::L1C
        }
    }

    fn quantification_key(&self) -> &'static str {
        match self {
            Level::L1C => "QUANTIFICATION_VALUE",
            Level::L2A => "BOA_QUANTIFICATION_VALUE",
        }
    }

    fn offset_key(&self) -> &'static str {
        match self {
            Level::L1C => "RADIO_ADD_OFFSET",
            Level::L2A => "BOA_ADD_OFFSET",
        }
    }

    /// Image entries of L2A products are split per resolution.
    fn image_pattern(&self, code: &str, resolution: u32) -> String {
        match self {
            Level::L1C => format!(r"IMG_DATA/[^/]*_{code}\.(jp2|tif)$"),
            Level::L2A => {
                format!(r"IMG_DATA/R{resolution}m/[^/]*_{code}_{resolution}m\.(jp2|tif)$")
            }
        }
    }

    /// Cloud probability for L2A, the opaque cloud layer of the
    /// classification mask for L1C.
    fn cloud_layer(&self) -> (&'static str, CloudFlag) {
        match self {
            Level::L1C => (r"QI_DATA/MSK_CLASSI_B00\.(jp2|tif)$", CloudFlag::NonZero),
            Level::L2A => (
                r"QI_DATA/MSK_CLDPRB_20m\.(jp2|tif)$",
                CloudFlag::AtLeast(CLOUD_PROBABILITY),
            ),
        }
    }
}

/// ESA Sentinel-2 L1C / L2A SAFE product.
#[derive(Debug)]
pub struct Sentinel2;

impl Sensor for Sentinel2 {
    type Layout = OpticalLayout;

    const SENSOR_TYPE: SensorType = SensorType::Optical;
    const NAME_PATTERN: &'static str =
        r"^S2[ABCD]_MSIL(1C|2A)_(\d{8}T\d{6})_N(\d{4})_R(\d{3})_T(\w{5})_(\d{8}T\d{6})$";
    const METADATA_PATTERN: &'static str = r"(^|/)MTD_MSIL(1C|2A)\.xml$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<OpticalLayout> {
        let metadata_entry = tree.require(&Regex::new(Self::METADATA_PATTERN)?)?;
        let xml = tree.read_to_string(metadata_entry)?;

        let id = match xml_text(&xml, "PRODUCT_URI")? {
            Some(uri) => product_name(Path::new(uri.trim())),
            None => tree.name(),
        };
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let product_type = format!("MSIL{}", group(&captures, 1)?);
        let level = Level::from_product_type(&product_type);
        let datetime: DateTime<Utc> = parse_datetime(group(&captures, 2)?)?;
        let tile = group(&captures, 5)?.to_string();

        let quantification: f32 =
            require_xml_text(&xml, level.quantification_key(), metadata_entry)?
                .trim()
                .parse()
                .map_err(|_| {
                    SensorioError::InvalidProduct(format!(
                        "{} of {metadata_entry} is not a number",
                        level.quantification_key()
                    ))
                })?;
        let offsets = radiometric_offsets(&xml, level.offset_key())?;

        let mut sources = BTreeMap::new();
        for (code, band, resolution, band_id) in BANDS {
            let Some(entry) = tree.find(&Regex::new(&level.image_pattern(code, resolution))?) else {
                debug!("{id} has no {code}");
                continue;
            };
            let offset = offsets.get(&band_id).copied().unwrap_or(0.);
            sources.insert(
                band,
                BandSource::new(
                    entry,
                    1. / quantification,
                    offset / quantification,
                    NodataRule::Fill(FILL),
                ),
            );
        }
        let (cloud_pattern, flag) = level.cloud_layer();
        match tree.find(&Regex::new(cloud_pattern)?) {
            Some(entry) => {
                sources.insert(
                    Band::Clouds,
                    BandSource::cloud_mask(entry, flag, NodataRule::Never),
                );
            }
            None => debug!("{id} has no cloud layer"),
        }

        Ok(OpticalLayout {
            metadata: ProductMetadata {
                platform: id[..3].to_string(),
                id,
                sensor_type: Self::SENSOR_TYPE,
                product_type,
                datetime,
                tile_or_orbit: Some(tile),
            },
            sources,
            reference: Band::Red,
            default_resolution: 10.,
        })
    }
}

/// Offsets per radiometric band id, absent before processing baseline 04.00.
fn radiometric_offsets(xml: &str, key: &str) -> Result<BTreeMap<u8, f32>> {
    let mut offsets = BTreeMap::new();
    for element in xml_elements(xml, key)? {
        let band_id = element.attributes.get("band_id").and_then(|id| id.parse().ok());
        let offset = element.text.trim().parse().ok();
        if let (Some(band_id), Some(offset)) = (band_id, offset) {
            offsets.insert(band_id, offset);
        }
    }
    Ok(offsets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("S2B_MSIL2A_20241126T093239_N0511_R136_T33PTM_20241126T120342", true)]
    #[case("S2A_MSIL1C_20200101T103431_N0208_R108_T31TCJ_20200101T122315", true)]
    #[case("S2B_MSIL2A_20241126T093239_N0511_R136_T33PTM", false)]
    #[case("S2E_MSIL2A_20241126T093239_N0511_R136_T33PTM_20241126T120342", false)]
    fn name_pattern(#[case] name: &str, #[case] valid: bool) {
        let pattern = Regex::new(Sentinel2::NAME_PATTERN).unwrap();
        assert_eq!(pattern.is_match(name), valid);
    }

    #[test]
    fn offsets_by_band_id() {
        let xml = r#"<Radiometric_Offset_List>
            <BOA_ADD_OFFSET band_id="0">-1000</BOA_ADD_OFFSET>
            <BOA_ADD_OFFSET band_id="12">-1000</BOA_ADD_OFFSET>
        </Radiometric_Offset_List>"#;
        let offsets = radiometric_offsets(xml, "BOA_ADD_OFFSET").unwrap();
        assert_eq!(offsets.len(), 2);
        assert_eq!(offsets[&12], -1000.);
        assert!(radiometric_offsets(xml, "RADIO_ADD_OFFSET").unwrap().is_empty());
    }

    #[rstest]
    #[case(Level::L1C, "B8A", 20, "GRANULE/L1C_T31TCJ/IMG_DATA/T31TCJ_20200101T103431_B8A.jp2", true)]
    #[case(Level::L2A, "B04", 10, "GRANULE/L2A_T33PTM/IMG_DATA/R10m/T33PTM_20241126T093239_B04_10m.jp2", true)]
    #[case(Level::L2A, "B04", 10, "GRANULE/L2A_T33PTM/IMG_DATA/R20m/T33PTM_20241126T093239_B04_20m.jp2", false)]
    fn image_entries(
        #[case] level: Level,
        #[case] code: &str,
        #[case] resolution: u32,
        #[case] entry: &str,
        #[case] found: bool,
    ) {
        let pattern = Regex::new(&level.image_pattern(code, resolution)).unwrap();
        assert_eq!(pattern.is_match(entry), found);
    }
}
