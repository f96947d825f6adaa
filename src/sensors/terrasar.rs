use itertools::Itertools;
use regex::Regex;

use crate::{
    bands::Band,
    components::{
        archive::ProductTree,
        metadata::{parse_datetime, xml_elements, xml_text, ProductMetadata, XmlElement},
    },
    errors::{Result, SensorioError},
    sensors::{group, name_captures, sar::scene_footprint, Context, SarLayout, Sensor, SensorType},
};

/// DLR TerraSAR-X, TanDEM-X and PAZ product.
#[derive(Debug)]
pub struct TerraSarX;

impl Sensor for TerraSarX {
    type Layout = SarLayout;

    const SENSOR_TYPE: SensorType = SensorType::Sar;
    const NAME_PATTERN: &'static str =
        r"^(TSX1|TDX1|PAZ1)_SAR__(SSC|MGD|GEC|EEC)_\w+?_(\d{8}T\d{6})_\d{8}T\d{6}$";
    const METADATA_PATTERN: &'static str = r"(^|/)(TSX1|TDX1|PAZ1)_SAR__[^/]*\.xml$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<SarLayout> {
        let id = tree.name();
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let platform = group(&captures, 1)?.to_string();
        let product_type = group(&captures, 2)?.to_string();
        let datetime = parse_datetime(group(&captures, 3)?)?;

        let entry = tree.require(&Regex::new(Self::METADATA_PATTERN)?)?;
        let xml = tree.read_to_string(entry)?;
        let polarisations: Vec<Band> = xml_elements(&xml, "polLayer")?
            .iter()
            .filter_map(|layer| Band::from_polarisation(layer.text.trim()))
            .unique()
            .collect();
        if polarisations.is_empty() {
            return Err(SensorioError::InvalidProduct(format!("{entry} lists no polLayer")));
        }
        let corners = xml_elements(&xml, "sceneCornerCoord")?
            .iter()
            .map(corner)
            .collect::<Result<Vec<_>>>()?;
        let orbit = xml_text(&xml, "absOrbit")?.map(|orbit| orbit.trim().to_string());

        Ok(SarLayout {
            metadata: ProductMetadata {
                id,
                platform,
                sensor_type: Self::SENSOR_TYPE,
                product_type,
                datetime,
                tile_or_orbit: orbit,
            },
            polarisations,
            footprint: scene_footprint(corners)?,
            default_resolution: 10.,
        })
    }
}

/// `(lon, lat)` of a `sceneCornerCoord` element.
fn corner(element: &XmlElement) -> Result<(f64, f64)> {
    let coordinate = |name: &str| {
        element
            .child(name)
            .and_then(|value| value.trim().parse::<f64>().ok())
            .ok_or_else(|| {
                SensorioError::InvalidProduct(format!("sceneCornerCoord without {name}"))
            })
    };
    Ok((coordinate("lon")?, coordinate("lat")?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("TSX1_SAR__MGD_SE___SM_S_SRA_20200101T054123_20200101T054131", true)]
    #[case("PAZ1_SAR__SSC______SM_S_SRA_20210601T180000_20210601T180008", true)]
    #[case("TSX1_SAR__XXX_SE___SM_S_SRA_20200101T054123_20200101T054131", false)]
    #[case("S1A_IW_GRDH_1SDV_20200101T054123_20200101T054148_030622_038245_1A2B", false)]
    fn name_pattern(#[case] name: &str, #[case] valid: bool) {
        let pattern = Regex::new(TerraSarX::NAME_PATTERN).unwrap();
        assert_eq!(pattern.is_match(name), valid);
    }

    #[test]
    fn corners() {
        let xml = "<sceneInfo><sceneCornerCoord><lat>45.5</lat><lon>7.25</lon></sceneCornerCoord>\
                   <sceneCornerCoord><lat>46.0</lat></sceneCornerCoord></sceneInfo>";
        let elements = xml_elements(xml, "sceneCornerCoord").unwrap();
        assert_eq!(corner(&elements[0]).unwrap(), (7.25, 45.5));
        assert!(corner(&elements[1]).is_err());
    }
}
