use regex::Regex;

use crate::{
    bands::Band,
    components::{
        archive::ProductTree,
        metadata::{parse_datetime, xml_elements, ProductMetadata},
    },
    errors::{Result, SensorioError},
    sensors::{group, name_captures, sar::scene_footprint, Context, SarLayout, Sensor, SensorType},
};

/// MDA RADARSAT-2 product.
#[derive(Debug)]
pub struct Radarsat2;

impl Sensor for Radarsat2 {
    type Layout = SarLayout;

    const SENSOR_TYPE: SensorType = SensorType::Sar;
    const NAME_PATTERN: &'static str = r"^RS2_OK\d+_PK\d+_DK\d+_(\w+?)_(\d{8})_(\d{6})_((?:(?:HH|HV|VH|VV)_)+)(SLC|SGX|SGF|SCN|SCW|SCF|SSG|SPG)$";
    const METADATA_PATTERN: &'static str = r"(^|/)product\.xml$";

    fn layout(tree: &ProductTree, _context: &Context) -> Result<SarLayout> {
        let id = tree.name();
        let captures = name_captures(Self::NAME_PATTERN, &id)?;
        let mode = group(&captures, 1)?;
        let datetime =
            parse_datetime(&format!("{}T{}", group(&captures, 2)?, group(&captures, 3)?))?;
        let polarisations: Vec<Band> = group(&captures, 4)?
            .split('_')
            .filter_map(Band::from_polarisation)
            .collect();
        let product_type = format!("{mode}_{}", group(&captures, 5)?);

        let entry = tree.require(&Regex::new(Self::METADATA_PATTERN)?)?;
        let xml = tree.read_to_string(entry)?;
        let tie_points = tie_points(&xml)?;

        Ok(SarLayout {
            metadata: ProductMetadata {
                id,
                platform: "RS2".to_string(),
                sensor_type: Self::SENSOR_TYPE,
                product_type,
                datetime,
                tile_or_orbit: None,
            },
            polarisations,
            footprint: scene_footprint(tie_points)?,
            default_resolution: 10.,
        })
    }
}

/// `(lon, lat)` of the geolocation grid tie points, in document order.
fn tie_points(xml: &str) -> Result<Vec<(f64, f64)>> {
    let values = |tag: &str| -> Result<Vec<f64>> {
        xml_elements(xml, tag)?
            .iter()
            .map(|element| {
                element.text.trim().parse::<f64>().map_err(|_| {
                    SensorioError::InvalidProduct(format!(
                        "{tag} {:?} is not a number",
                        element.text
                    ))
                })
            })
            .collect()
    };
    let (latitudes, longitudes) = (values("latitude")?, values("longitude")?);
    if latitudes.len() != longitudes.len() {
        return Err(SensorioError::InvalidProduct(format!(
            "{} latitudes for {} longitudes",
            latitudes.len(),
            longitudes.len()
        )));
    }
    Ok(longitudes.into_iter().zip(latitudes).collect())
}
