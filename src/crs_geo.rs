use std::{fmt::Display, sync::Arc};

use gdal::spatial_ref::SpatialRef;
use geo::{BoundingRect, CoordNum, Polygon, Rect};
use shrinkwraprs::Shrinkwrap;

use crate::{
    errors::{Result, SensorioError},
    intersection::Intersection,
};

/// Coordinate reference system as given by the source,
/// either a WKT string or a definition such as `EPSG:32633`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Crs(Arc<str>);

impl Crs {
    pub fn new(definition: &str) -> Self {
        Self(Arc::from(definition))
    }

    pub fn from_epsg(code: u32) -> Self {
        Self::new(&format!("EPSG:{code}"))
    }

    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    pub fn definition(&self) -> &str {
        self.0.as_ref()
    }

    pub fn spatial_ref(&self) -> Result<SpatialRef> {
        Ok(SpatialRef::from_definition(self.definition())?)
    }

    /// Authority code, when the definition carries one.
    pub fn epsg(&self) -> Option<i32> {
        self.spatial_ref()
            .and_then(|srs| Ok(srs.auth_code()?))
            .ok()
    }

    /// Textual equality first, then semantic comparison of the two definitions.
    pub fn same_as(&self, other: &Crs) -> bool {
        if self.0 == other.0 {
            return true;
        }
        match (self.spatial_ref(), other.spatial_ref()) {
            (Ok(lhs), Ok(rhs)) => lhs == rhs,
            _ => false,
        }
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.epsg() {
            Some(code) => write!(f, "EPSG:{code}"),
            None => f.write_str(self.definition()),
        }
    }
}

#[derive(Shrinkwrap, Debug, Clone)]
pub struct CrsGeometry<G> {
    crs: Crs,
    #[shrinkwrap(main_field)]
    geometry: G,
}

impl<G> CrsGeometry<G> {
    pub fn new(crs: Crs, geometry: G) -> Self {
        Self { crs, geometry }
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn geometry(&self) -> &G {
        &self.geometry
    }

    pub fn into_inner(self) -> (Crs, G) {
        (self.crs, self.geometry)
    }
}

impl<G> CrsGeometry<G> {
    pub fn bounding_rect<T: CoordNum>(&self) -> Option<CrsGeometry<Rect<T>>>
    where
        G: BoundingRect<T>,
    {
        let geometry = self.geometry.bounding_rect().into()?;
        Some(CrsGeometry::new(self.crs.clone(), geometry))
    }
}

impl Intersection for CrsGeometry<Rect> {
    type Output = CrsGeometry<Rect>;

    fn intersection(&self, rhs: &Self) -> Result<Self::Output> {
        if !self.crs.same_as(&rhs.crs) {
            return Err(SensorioError::GridMismatch(format!(
                "can not intersect geometries in {} and {}",
                self.crs, rhs.crs
            )));
        }
        let geometry = self.geometry.intersection(&rhs.geometry)?;
        Ok(CrsGeometry::new(self.crs.clone(), geometry))
    }

    fn covers(&self, rhs: &Self) -> bool {
        self.crs.same_as(&rhs.crs) && self.geometry.covers(&rhs.geometry)
    }
}

/// Valid, actually imaged area of a product.
pub type Footprint = CrsGeometry<Polygon>;

/// Envelope of the full raster grid of a product.
pub type Extent = CrsGeometry<Rect>;

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, polygon};

    #[test]
    fn same_definitions_match_without_parsing() {
        let crs = Crs::new("not a crs");
        assert!(crs.same_as(&Crs::new("not a crs")));
        assert!(!crs.same_as(&Crs::wgs84()));
    }

    #[test]
    fn footprint_bounding_rect_keeps_crs() {
        let footprint = Footprint::new(
            Crs::from_epsg(32633),
            polygon![(x: 0., y: 0.), (x: 4., y: 1.), (x: 2., y: 3.)],
        );
        let extent = footprint.bounding_rect().unwrap();
        assert_eq!(extent.crs(), &Crs::from_epsg(32633));
        assert_eq!(extent.min(), coord! { x: 0., y: 0. });
        assert_eq!(extent.max(), coord! { x: 4., y: 3. });
    }
}
