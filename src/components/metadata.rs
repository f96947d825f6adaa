use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use quick_xml::{
    events::{BytesStart, Event},
    Reader as XmlReader,
};
use serde::Serialize;
use std::{collections::HashMap, fmt::Display, str::FromStr};

use crate::{
    components::bounds::Grid,
    errors::{Result, SensorioError},
    sensors::SensorType,
};

/// Flat key/value metadata of some described object.
#[derive(Debug, Default, Clone)]
pub struct Metadata {
    description: String,
    hashmap: HashMap<String, String>,
}

impl Metadata {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            hashmap: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.hashmap.insert(key.into(), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.hashmap.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Result<&String> {
        self.hashmap
            .get(key)
            .ok_or_else(|| SensorioError::MetadataKeyNotFound {
                object_desc: self.description.clone(),
                key: key.into(),
            })
    }

    pub fn get_parsed<T: FromStr>(&self, key: &str) -> Result<T> {
        let value = self.get(key)?;
        value.trim().parse().map_err(|_| {
            SensorioError::InvalidProduct(format!(
                "{key} = {value:?} in {} can not be parsed",
                self.description
            ))
        })
    }

    pub fn len(&self) -> usize {
        self.hashmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hashmap.is_empty()
    }
}

/// Identity of an opened product, fixed at creation.
#[derive(Debug, Clone, Serialize)]
pub struct ProductMetadata {
    pub id: String,
    pub platform: String,
    pub sensor_type: SensorType,
    pub product_type: String,
    pub datetime: DateTime<Utc>,
    /// Tile for gridded optical products, relative orbit for SAR.
    pub tile_or_orbit: Option<String>,
}

impl ProductMetadata {
    /// `{YYYYMMDDTHHMMSS}_{PLATFORM}_{TILE-or-ORBIT}_{PRODUCT_TYPE}`
    pub fn condensed_name(&self) -> String {
        let mut parts = vec![
            self.datetime.format("%Y%m%dT%H%M%S").to_string(),
            self.platform.clone(),
        ];
        parts.extend(self.tile_or_orbit.clone());
        parts.push(self.product_type.clone());
        parts.join("_")
    }
}

impl Display for ProductMetadata {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.condensed_name())
    }
}

/// Metadata returned along with loaded or stacked rasters.
#[derive(Debug, Clone, Serialize)]
pub struct RasterMetadata {
    pub crs: String,
    /// GDAL ordered geo transform.
    pub transform: [f64; 6],
    pub resolution: f64,
    pub shape: (usize, usize),
    pub datetime: DateTime<Utc>,
    pub product_id: String,
    pub condensed_name: String,
    /// Ordered layer labels, empty for `load`.
    pub labels: Vec<String>,
}

impl RasterMetadata {
    pub fn new(product: &ProductMetadata, grid: &Grid) -> Self {
        Self {
            crs: grid.crs.definition().to_string(),
            transform: grid.transform.to_gdal(),
            resolution: grid.resolution(),
            shape: grid.shape,
            datetime: product.datetime,
            product_id: product.id.clone(),
            condensed_name: product.condensed_name(),
            labels: Vec::new(),
        }
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }
}

/// Accepts the datetime spellings found in vendor metadata.
pub fn parse_datetime(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim().trim_matches('"');
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Ok(datetime.with_timezone(&Utc));
    }
    let value = value.trim_end_matches('Z');
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y%m%dT%H%M%S"] {
        if let Ok(datetime) = NaiveDateTime::parse_from_str(value, format) {
            return Ok(datetime.and_utc());
        }
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(value, "%Y%m%d"))?;
    date.and_hms_opt(0, 0, 0)
        .map(|datetime| datetime.and_utc())
        .ok_or_else(|| SensorioError::InvalidProduct(format!("invalid date {value}")))
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct XmlElement {
    pub attributes: HashMap<String, String>,
    /// Text of the element and all its descendants.
    pub text: String,
    /// Direct children as `(local name, text)`, in document order.
    pub children: Vec<(String, String)>,
}

impl XmlElement {
    pub fn child(&self, name: &str) -> Option<&str> {
        self.children
            .iter()
            .find(|(child, _)| child == name)
            .map(|(_, text)| text.as_str())
    }
}

fn attributes_of(start: &BytesStart) -> Result<HashMap<String, String>> {
    let mut attributes = HashMap::new();
    for attribute in start.attributes() {
        let attribute = attribute.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attribute.key.local_name().as_ref()).into_owned();
        attributes.insert(key, attribute.unescape_value()?.into_owned());
    }
    Ok(attributes)
}

/// All elements with local name `tag`, in document order.
pub fn xml_elements(xml: &str, tag: &str) -> Result<Vec<XmlElement>> {
    let mut reader = XmlReader::from_str(xml);
    reader.trim_text(true);

    let mut elements = Vec::new();
    let mut current: Option<(XmlElement, usize)> = None;
    let mut depth = 0usize;
    loop {
        match reader.read_event()? {
            Event::Start(start) => {
                depth += 1;
                match current.as_mut() {
                    None if start.local_name().as_ref() == tag.as_bytes() => {
                        let element = XmlElement {
                            attributes: attributes_of(&start)?,
                            ..Default::default()
                        };
                        current = Some((element, depth));
                    }
                    Some((element, start_depth)) if depth == *start_depth + 1 => {
                        let name =
                            String::from_utf8_lossy(start.local_name().as_ref()).into_owned();
                        element.children.push((name, String::new()));
                    }
                    _ => (),
                }
            }
            Event::Empty(empty) => {
                if current.is_none() && empty.local_name().as_ref() == tag.as_bytes() {
                    elements.push(XmlElement {
                        attributes: attributes_of(&empty)?,
                        ..Default::default()
                    });
                }
            }
            Event::Text(text) => {
                if let Some((element, start_depth)) = current.as_mut() {
                    let text = text.unescape()?;
                    element.text.push_str(&text);
                    if depth > *start_depth {
                        if let Some((_, child_text)) = element.children.last_mut() {
                            child_text.push_str(&text);
                        }
                    }
                }
            }
            Event::End(_) => {
                if matches!(current, Some((_, start_depth)) if start_depth == depth) {
                    elements.extend(current.take().map(|(element, _)| element));
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => (),
        }
    }
    Ok(elements)
}

/// Text of the first element with local name `tag`.
pub fn xml_text(xml: &str, tag: &str) -> Result<Option<String>> {
    Ok(xml_elements(xml, tag)?
        .into_iter()
        .next()
        .map(|element| element.text))
}

/// Like [xml_text] but a missing element is an error.
pub fn require_xml_text(xml: &str, tag: &str, object_desc: &str) -> Result<String> {
    xml_text(xml, tag)?.ok_or_else(|| SensorioError::MetadataKeyNotFound {
        object_desc: object_desc.into(),
        key: tag.into(),
    })
}

/// Flattens an ODL style `KEY = value` text file (e.g. Landsat MTL).
pub fn parse_odl(text: &str, description: &str) -> Metadata {
    let mut metadata = Metadata::new(description);
    for line in text.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let key = key.trim();
        if matches!(key, "GROUP" | "END_GROUP") {
            continue;
        }
        metadata.insert(key, value.trim().trim_matches('"'));
    }
    metadata
}
