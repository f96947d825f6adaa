use geo::{CoordNum, Rect};

use crate::errors::{Result, SensorioError};

pub trait Intersection {
    type Output;
    fn intersection(&self, rhs: &Self) -> Result<Self::Output>;
    /// `rhs` lies entirely inside `self`.
    fn covers(&self, rhs: &Self) -> bool;
}

impl<T: CoordNum> Intersection for Rect<T> {
    type Output = Rect<T>;

    fn intersection(&self, rhs: &Self) -> Result<Rect<T>> {
        let (lhs_min, lhs_max) = (self.min(), self.max());
        let (rhs_min, rhs_max) = (rhs.min(), rhs.max());
        if (lhs_max.x < rhs_min.x) | (lhs_max.y < rhs_min.y) {
            return Err(SensorioError::NoIntersection);
        }
        if (lhs_min.x > rhs_max.x) | (lhs_min.y > rhs_max.y) {
            return Err(SensorioError::NoIntersection);
        }

        let max_of = |x: T, y: T| if x > y { x } else { y };
        let min_of = |x: T, y: T| if x < y { x } else { y };
        let min = (max_of(lhs_min.x, rhs_min.x), max_of(lhs_min.y, rhs_min.y));
        let max = (min_of(lhs_max.x, rhs_max.x), min_of(lhs_max.y, rhs_max.y));

        Ok(Self::new(min, max))
    }

    fn covers(&self, rhs: &Self) -> bool {
        let (lhs_min, lhs_max) = (self.min(), self.max());
        let (rhs_min, rhs_max) = (rhs.min(), rhs.max());
        lhs_min.x <= rhs_min.x
            && lhs_min.y <= rhs_min.y
            && lhs_max.x >= rhs_max.x
            && lhs_max.y >= rhs_max.y
    }
}
