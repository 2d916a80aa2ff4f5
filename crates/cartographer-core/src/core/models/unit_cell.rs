use nalgebra::{Matrix3, Point3, Vector3};
use std::fmt;

/// Crystallographic unit cell with derived orthogonalization matrices.
///
/// Orthogonal coordinates follow the PDB convention: `a` lies along x and `b`
/// lies in the xy-plane.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitCell {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    orth: Matrix3<f64>,
    frac: Matrix3<f64>,
    volume: f64,
}

impl UnitCell {
    /// Builds a cell from lengths in Å and angles in degrees.
    ///
    /// Returns `None` if the parameters do not describe a cell with positive volume.
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Option<Self> {
        if !(a > 0.0 && b > 0.0 && c > 0.0) {
            return None;
        }
        let (cos_a, cos_b, cos_g) = (
            alpha.to_radians().cos(),
            beta.to_radians().cos(),
            gamma.to_radians().cos(),
        );
        let sin_g = gamma.to_radians().sin();
        let factor = 1.0 - cos_a * cos_a - cos_b * cos_b - cos_g * cos_g + 2.0 * cos_a * cos_b * cos_g;
        if factor <= 0.0 || sin_g.abs() < f64::EPSILON {
            return None;
        }
        let volume = a * b * c * factor.sqrt();

        let orth = Matrix3::new(
            a,
            b * cos_g,
            c * cos_b,
            0.0,
            b * sin_g,
            c * (cos_a - cos_b * cos_g) / sin_g,
            0.0,
            0.0,
            volume / (a * b * sin_g),
        );
        let frac = orth.try_inverse()?;

        Some(Self {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            orth,
            frac,
            volume,
        })
    }

    /// Rectangular box cell (all angles 90°).
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Option<Self> {
        Self::new(a, b, c, 90.0, 90.0, 90.0)
    }

    pub fn volume(&self) -> f64 {
        self.volume
    }

    pub fn parameters(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    pub fn orthogonalize(&self, fractional: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.orth * fractional.coords)
    }

    pub fn fractionalize(&self, position: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.frac * position.coords)
    }

    /// Returns `1/d²` for the reflection with Miller indices `hkl`.
    pub fn inverse_d_squared(&self, hkl: [i32; 3]) -> f64 {
        let h = Vector3::new(f64::from(hkl[0]), f64::from(hkl[1]), f64::from(hkl[2]));
        let s = self.frac.transpose() * h;
        s.norm_squared()
    }

    /// Returns the resolution `d` (Å) of the reflection `hkl`.
    pub fn d_spacing(&self, hkl: [i32; 3]) -> f64 {
        let inv = self.inverse_d_squared(hkl);
        if inv > 0.0 { 1.0 / inv.sqrt() } else { f64::INFINITY }
    }

    /// Orthogonal bounding box `(minimum, maximum)` of the eight cell corners.
    pub fn bounding_box(&self) -> (Point3<f64>, Point3<f64>) {
        let mut min = Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY);
        let mut max = Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY);
        for corner in 0..8u8 {
            let fractional = Point3::new(
                f64::from(corner & 1),
                f64::from((corner >> 1) & 1),
                f64::from((corner >> 2) & 1),
            );
            let p = self.orthogonalize(&fractional);
            for i in 0..3 {
                min[i] = min[i].min(p[i]);
                max[i] = max[i].max(p[i]);
            }
        }
        (min, max)
    }
}

impl fmt::Display for UnitCell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<UnitCell({:.3}, {:.3}, {:.3}, {:.2}, {:.2}, {:.2})>",
            self.a, self.b, self.c, self.alpha, self.beta, self.gamma
        )
    }
}
