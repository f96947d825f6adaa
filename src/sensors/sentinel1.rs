use regex::Regex;

use crate::{
    bands::Band,
    components::{
        archive::ProductTree,
        metadata::{parse_datetime, require_xml_text, ProductMetadata},
    },
    errors::{Result, SensorioError},
    sensors::{group, name_captures, sar::scene_footprint, Context, SarLayout, Sensor, SensorType},
};

const ORBITS_PER_CYCLE: i64 = 175;

/// ESA Sentinel-1 SAFE product.
#[derive(Debug)]
pub struct Sentinel1;

impl Sensor for Sentinel1 {
    type Layout = SarLayout;

    const SENSOR_TYPE: SensorType = SensorType::Sar;
    const NAME_PATTERN: &'static str = r"^S1[ABC]_(IW|EW|SM|WV|S[1-6])_(GRD[FHM]|SLC_|RAW_|OCN_)_[12]S(SH|SV|DH|DV|HH|VV|HV|VH)_(\d{8}T\d{6})_(\d{8}T\d{6})_(\d{6})_([0-9A-F]{6})_([0-9A-F]{4})$";
    const METADATA_PATTERN: &'static str = r"(^|/)annotation/s1[abc]-[^/]*\.xml$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<SarLayout> {
        let id = tree.name();
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let platform = id[..3].to_string();
        let product_type = format!(
            "{}_{}",
            group(&captures, 1)?,
            group(&captures, 2)?.trim_end_matches('_')
        );
        let polarisations = polarisations(group(&captures, 3)?);
        let datetime = parse_datetime(group(&captures, 4)?)?;
        let absolute_orbit: i64 = group(&captures, 6)?.parse().unwrap_or_default();
        let orbit = relative_orbit(&platform, absolute_orbit).unwrap_or(absolute_orbit);

        let manifest = tree.require(&Regex::new(r"(^|/)manifest\.safe$")?)?;
        let coordinates =
            require_xml_text(&tree.read_to_string(manifest)?, "coordinates", manifest)?;

        Ok(SarLayout {
            metadata: ProductMetadata {
                id,
                platform,
                sensor_type: Self::SENSOR_TYPE,
                product_type,
                datetime,
                tile_or_orbit: Some(format!("{orbit:03}")),
            },
            polarisations,
            footprint: scene_footprint(lat_lon_pairs(&coordinates)?)?,
            default_resolution: 10.,
        })
    }
}

/// Bands of the polarisation code of the product name.
fn polarisations(code: &str) -> Vec<Band> {
    match code {
        "SH" => vec![Band::Hh],
        "SV" => vec![Band::Vv],
        "DH" => vec![Band::Hh, Band::Hv],
        "DV" => vec![Band::Vv, Band::Vh],
        single => Band::from_polarisation(single).into_iter().collect(),
    }
}

fn relative_orbit(platform: &str, absolute_orbit: i64) -> Option<i64> {
    let offset = match platform {
        "S1A" => 73,
        "S1B" => 27,
        _ => return None,
    };
    Some((absolute_orbit - offset).rem_euclid(ORBITS_PER_CYCLE) + 1)
}

/// `(lon, lat)` points of a GML `lat,lon lat,lon ...` coordinate list.
fn lat_lon_pairs(coordinates: &str) -> Result<Vec<(f64, f64)>> {
    coordinates
        .split_whitespace()
        .map(|pair| {
            let parsed = pair
                .split_once(',')
                .and_then(|(lat, lon)| Some((lon.parse::<f64>().ok()?, lat.parse::<f64>().ok()?)));
            parsed.ok_or_else(|| {
                SensorioError::InvalidProduct(format!("invalid coordinate {pair:?}"))
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("S1A_IW_GRDH_1SDV_20200101T054123_20200101T054148_030622_038245_1A2B", true)]
    #[case("S1B_EW_SLC__1SSH_20191231T000000_20191231T000100_019000_023456_ABCD", true)]
    #[case("S1A_IW_GRDH_1SDV_20200101T054123_20200101T054148_030622_038245", false)]
    #[case("S1D_IW_GRDH_1SDV_20200101T054123_20200101T054148_030622_038245_1A2B", false)]
    fn name_pattern(#[case] name: &str, #[case] valid: bool) {
        let pattern = Regex::new(Sentinel1::NAME_PATTERN).unwrap();
        assert_eq!(pattern.is_match(name), valid);
    }

    #[rstest]
    #[case("DV", vec![Band::Vv, Band::Vh])]
    #[case("DH", vec![Band::Hh, Band::Hv])]
    #[case("SV", vec![Band::Vv])]
    #[case("HV", vec![Band::Hv])]
    fn polarisation_codes(#[case] code: &str, #[case] bands: Vec<Band>) {
        assert_eq!(polarisations(code), bands);
    }

    #[rstest]
    #[case("S1A", 30622, Some(100))]
    #[case("S1B", 19000, Some(74))]
    #[case("S1C", 100, None)]
    fn relative_orbits(#[case] platform: &str, #[case] absolute: i64, #[case] relative: Option<i64>) {
        assert_eq!(relative_orbit(platform, absolute), relative);
    }

    #[test]
    fn gml_coordinates() {
        let points = lat_lon_pairs("45.1,7.2 45.3,8.4\n46.0,8.1").unwrap();
        assert_eq!(points, vec![(7.2, 45.1), (8.4, 45.3), (8.1, 46.0)]);
        assert!(lat_lon_pairs("45.1;7.2").is_err());
    }
}
