use chrono::NaiveDateTime;
use log::debug;
use regex::Regex;
use std::collections::BTreeMap;

use crate::{
    bands::Band,
    components::{archive::ProductTree, metadata::ProductMetadata},
    errors::Result,
    sensors::{
        group, name_captures, BandSource, CloudFlag, Context, NodataRule, OpticalLayout, Sensor,
        SensorType,
    },
};

const SCALE: f32 = 1e-4;
const FILL: f32 = -10_000.;

/// `(file band code, band, edge mask resolution group)`
const BANDS: [(&str, Band, u8); 10] = [
    ("B2", Band::Blue, 1),
    ("B3", Band::Green, 1),
    ("B4", Band::Red, 1),
    ("B5", Band::Vre1, 2),
    ("B6", Band::Vre2, 2),
    ("B7", Band::Vre3, 2),
    ("B8", Band::Nir, 1),
    ("B8A", Band::NarrowNir, 2),
    ("B11", Band::Swir1, 2),
    ("B12", Band::Swir2, 2),
];

/// THEIA (CNES) Sentinel-2 L2A / L3A product.
#[derive(Debug)]
pub struct Sentinel2Theia;

impl Sensor for Sentinel2Theia {
    type Layout = OpticalLayout;

    const SENSOR_TYPE: SensorType = SensorType::Optical;
    const NAME_PATTERN: &'static str =
        r"^SENTINEL2([ABCD])_(\d{8}-\d{6}-\d{3})_(L2A|L3A)_T(\w{5})_[CD](_V\d+-\d+)?$";
    const METADATA_PATTERN: &'static str = r"_MTD_ALL\.xml$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<OpticalLayout> {
        let id = tree.name();
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let platform = format!("S2{}", group(&captures, 1)?);
        // 20200101-105844-123, milliseconds dropped
        let stamp = group(&captures, 2)?;
        let datetime = NaiveDateTime::parse_from_str(&stamp[..15], "%Y%m%d-%H%M%S")?.and_utc();
        let product_type = group(&captures, 3)?.to_string();
        let tile = group(&captures, 4)?.to_string();

        let mut sources = BTreeMap::new();
        for (code, band, mask_group) in BANDS {
            let Some(entry) = tree.find(&Regex::new(&format!(r"_FRE_{code}\.tif$"))?) else {
                debug!("{id} has no {code}");
                continue;
            };
            let mask = tree
                .require(&Regex::new(&format!(r"MASKS/[^/]*_EDG_R{mask_group}\.tif$"))?)?
                .to_string();
            sources.insert(
                band,
                BandSource::new(entry, SCALE, 0., NodataRule::FillAndMaskLayer(FILL, mask)),
            );
        }
        // Cloud bits of the 10 m mask, any of them set is a cloud.
        if let (Some(clouds), Some(edge)) = (
            tree.find(&Regex::new(r"MASKS/[^/]*_CLM_R1\.tif$")?),
            tree.find(&Regex::new(r"MASKS/[^/]*_EDG_R1\.tif$")?),
        ) {
            sources.insert(
                Band::Clouds,
                BandSource::cloud_mask(
                    clouds,
                    CloudFlag::NonZero,
                    NodataRule::MaskLayer(edge.to_string()),
                ),
            );
        }

        Ok(OpticalLayout {
            metadata: ProductMetadata {
                id,
                platform,
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

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("SENTINEL2B_20200101-105844-123_L2A_T31TCJ_C_V2-2", true)]
    #[case("SENTINEL2A_20190315-104837-457_L3A_T31TCJ_D", true)]
    #[case("SENTINEL2A_20190315-104837-457_L1C_T31TCJ_D", false)]
    #[case("S2B_MSIL2A_20241126T093239_N0511_R136_T33PTM_20241126T120342", false)]
    fn name_pattern(#[case] name: &str, #[case] valid: bool) {
        let pattern = Regex::new(Sentinel2Theia::NAME_PATTERN).unwrap();
        assert_eq!(pattern.is_match(name), valid);
    }

    #[test]
    fn fre_entries_only() {
        let pattern = Regex::new(r"_FRE_B8\.tif$").unwrap();
        assert!(pattern.is_match("SENTINEL2B_X/SENTINEL2B_X_FRE_B8.tif"));
        assert!(!pattern.is_match("SENTINEL2B_X/SENTINEL2B_X_SRE_B8.tif"));
        assert!(!pattern.is_match("SENTINEL2B_X/SENTINEL2B_X_FRE_B8A.tif"));
    }
}
