use std::{
    collections::HashMap,
    ops::{Add, Div, Mul, Neg, Sub},
};

use ndarray::{Array2, Zip};

use crate::bands::Band;

/// Pure elementwise expression over bands.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Band(Band),
    Const(f32),
    Add(Box<Expr>, Box<Expr>),
    Sub(Box<Expr>, Box<Expr>),
    Mul(Box<Expr>, Box<Expr>),
    Div(Box<Expr>, Box<Expr>),
    Neg(Box<Expr>),
}

pub fn band(band: Band) -> Expr {
    Expr::Band(band)
}

/// `(lhs - rhs) / (lhs + rhs)`
pub fn normalized_difference(lhs: Band, rhs: Band) -> Expr {
    (band(lhs) - band(rhs)) / (band(lhs) + band(rhs))
}

impl Expr {
    /// Referenced bands, deduplicated, in order of first appearance.
    pub fn bands(&self) -> Vec<Band> {
        let mut bands = Vec::new();
        self.collect_bands(&mut bands);
        bands
    }

    fn collect_bands(&self, bands: &mut Vec<Band>) {
        match self {
            Expr::Band(band) => {
                if !bands.contains(band) {
                    bands.push(*band)
                }
            }
            Expr::Const(_) => (),
            Expr::Add(lhs, rhs)
            | Expr::Sub(lhs, rhs)
            | Expr::Mul(lhs, rhs)
            | Expr::Div(lhs, rhs) => {
                lhs.collect_bands(bands);
                rhs.collect_bands(bands);
            }
            Expr::Neg(inner) => inner.collect_bands(bands),
        }
    }

    /// Evaluates over arrays of identical shape.
    ///
    /// Every referenced band must be present in `arrays`, which
    /// callers check beforehand with [Expr::bands].
    pub(crate) fn eval(
        &self,
        arrays: &HashMap<Band, Array2<f32>>,
        shape: (usize, usize),
    ) -> Array2<f32> {
        match self {
            Expr::Band(band) => arrays
                .get(band)
                .cloned()
                .unwrap_or_else(|| Array2::from_elem(shape, f32::NAN)),
            Expr::Const(value) => Array2::from_elem(shape, *value),
            Expr::Add(lhs, rhs) => binary(lhs, rhs, arrays, shape, |l, r| l + r),
            Expr::Sub(lhs, rhs) => binary(lhs, rhs, arrays, shape, |l, r| l - r),
            Expr::Mul(lhs, rhs) => binary(lhs, rhs, arrays, shape, |l, r| l * r),
            Expr::Div(lhs, rhs) => binary(lhs, rhs, arrays, shape, |l, r| l / r),
            Expr::Neg(inner) => inner.eval(arrays, shape).mapv_into(|value| -value),
        }
    }
}

fn binary(
    lhs: &Expr,
    rhs: &Expr,
    arrays: &HashMap<Band, Array2<f32>>,
    shape: (usize, usize),
    f: impl Fn(f32, f32) -> f32,
) -> Array2<f32> {
    let mut lhs = lhs.eval(arrays, shape);
    let rhs = rhs.eval(arrays, shape);
    Zip::from(&mut lhs).and(&rhs).for_each(|l, r| *l = f(*l, *r));
    lhs
}

macro_rules! impl_binary_op {
    ($trait:ident, $method:ident, $variant:ident) => {
        impl $trait for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(self), Box::new(rhs))
            }
        }

        impl $trait<Expr> for f32 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                Expr::$variant(Box::new(Expr::Const(self)), Box::new(rhs))
            }
        }

        impl $trait<f32> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f32) -> Expr {
                Expr::$variant(Box::new(self), Box::new(Expr::Const(rhs)))
            }
        }
    };
}

impl_binary_op!(Add, add, Add);
impl_binary_op!(Sub, sub, Sub);
impl_binary_op!(Mul, mul, Mul);
impl_binary_op!(Div, div, Div);

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::Neg(Box::new(self))
    }
}
