use nalgebra::{DMatrix, Matrix3, Vector3};
use rand::Rng;
use thiserror::Error;

const MIN_CELL_VOLUME: f64 = 1e-8;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum LatticeError {
    #[error("Lattice vectors describe a degenerate cell (volume {volume})")]
    Degenerate { volume: f64 },
    #[error("Invalid lattice parameter '{name}': {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("Invalid range for lattice parameter '{name}': min {min} > max {max}")]
    InvalidRange { name: &'static str, min: f64, max: f64 },
}

/// A periodic simulation cell.
///
/// The columns of the cell matrix are the lattice vectors `a`, `b` and `c` in Angstroms, so that
/// a fractional coordinate `f` maps to the Cartesian position `M * f`.
#[derive(Debug, Clone, PartialEq)]
pub struct Lattice {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl Lattice {
    /// Builds a lattice from a cell matrix whose columns are the lattice vectors.
    ///
    /// # Errors
    ///
    /// Returns [`LatticeError::Degenerate`] if the vectors are (nearly) coplanar or non-finite.
    pub fn from_matrix(matrix: Matrix3<f64>) -> Result<Self, LatticeError> {
        let volume = matrix.determinant();
        if !volume.is_finite() || volume.abs() < MIN_CELL_VOLUME {
            return Err(LatticeError::Degenerate { volume });
        }
        let inverse = matrix
            .try_inverse()
            .ok_or(LatticeError::Degenerate { volume })?;
        Ok(Self { matrix, inverse })
    }

    /// Builds a lattice from its six cell parameters.
    ///
    /// Lengths are in Angstroms and angles in degrees. The vector `c` is aligned with the
    /// Cartesian z axis and `a` lies in the xz plane.
    ///
    /// # Errors
    ///
    /// Returns an error if a length is not positive, an angle lies outside `(0, 180)`, or the
    /// resulting cell is degenerate.
    pub fn from_parameters(
        a: f64,
        b: f64,
        c: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> Result<Self, LatticeError> {
        for (name, value) in [("a", a), ("b", b), ("c", c)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(LatticeError::InvalidParameter { name, value });
            }
        }
        for (name, value) in [("alpha", alpha), ("beta", beta), ("gamma", gamma)] {
            if !value.is_finite() || value <= 0.0 || value >= 180.0 {
                return Err(LatticeError::InvalidParameter { name, value });
            }
        }

        let (sin_alpha, cos_alpha) = alpha.to_radians().sin_cos();
        let (sin_beta, cos_beta) = beta.to_radians().sin_cos();
        let cos_gamma = gamma.to_radians().cos();

        let cos_gamma_star =
            ((cos_alpha * cos_beta - cos_gamma) / (sin_alpha * sin_beta)).clamp(-1.0, 1.0);
        let gamma_star = cos_gamma_star.acos();

        let va = Vector3::new(a * sin_beta, 0.0, a * cos_beta);
        let vb = Vector3::new(
            -b * sin_alpha * gamma_star.cos(),
            b * sin_alpha * gamma_star.sin(),
            b * cos_alpha,
        );
        let vc = Vector3::new(0.0, 0.0, c);

        Self::from_matrix(Matrix3::from_columns(&[va, vb, vc]))
    }

    pub fn cubic(a: f64) -> Result<Self, LatticeError> {
        Self::from_parameters(a, a, a, 90.0, 90.0, 90.0)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn vector(&self, index: usize) -> Vector3<f64> {
        self.matrix.column(index).into_owned()
    }

    pub fn lengths(&self) -> [f64; 3] {
        [0, 1, 2].map(|i| self.matrix.column(i).norm())
    }

    /// Cell angles `[alpha, beta, gamma]` in degrees.
    pub fn angles(&self) -> [f64; 3] {
        let angle = |i: usize, j: usize| {
            let u = self.matrix.column(i);
            let v = self.matrix.column(j);
            (u.dot(&v) / (u.norm() * v.norm()))
                .clamp(-1.0, 1.0)
                .acos()
                .to_degrees()
        };
        [angle(1, 2), angle(0, 2), angle(0, 1)]
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    #[inline]
    pub fn to_cartesian(&self, fractional: &Vector3<f64>) -> Vector3<f64> {
        self.matrix * fractional
    }

    #[inline]
    pub fn to_fractional(&self, cartesian: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * cartesian
    }

    /// Cartesian position of the cell centre (fractional `(0.5, 0.5, 0.5)`).
    pub fn centre(&self) -> Vector3<f64> {
        self.matrix * Vector3::repeat(0.5)
    }

    /// Shortest Cartesian displacement from `from` to any periodic image of `to`.
    ///
    /// The fractional difference is first wrapped into `[-0.5, 0.5]` and then the 27 neighbouring
    /// images are scanned, which gives the exact minimum image for skewed cells as well.
    pub fn minimum_image(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> Vector3<f64> {
        let wrapped = (to - from).map(|x| x - x.round());

        let mut best = self.matrix * wrapped;
        let mut best_norm = best.norm_squared();
        for i in -1..=1 {
            for j in -1..=1 {
                for k in -1..=1 {
                    if i == 0 && j == 0 && k == 0 {
                        continue;
                    }
                    let shift = Vector3::new(f64::from(i), f64::from(j), f64::from(k));
                    let candidate = self.matrix * (wrapped + shift);
                    let norm = candidate.norm_squared();
                    if norm < best_norm {
                        best = candidate;
                        best_norm = norm;
                    }
                }
            }
        }
        best
    }

    #[inline]
    pub fn periodic_distance(&self, from: &Vector3<f64>, to: &Vector3<f64>) -> f64 {
        self.minimum_image(from, to).norm()
    }

    /// Symmetric matrix of minimum-image distances between fractional coordinates.
    ///
    /// The diagonal is set to `f64::INFINITY` so that self-distances never trip a
    /// minimum-distance threshold.
    pub fn distance_matrix(&self, fractional: &[Vector3<f64>]) -> DMatrix<f64> {
        let n = fractional.len();
        let mut distances = DMatrix::from_element(n, n, f64::INFINITY);
        for i in 0..n {
            for j in (i + 1)..n {
                let d = self.periodic_distance(&fractional[i], &fractional[j]);
                distances[(i, j)] = d;
                distances[(j, i)] = d;
            }
        }
        distances
    }
}

/// Sampling range for one cell parameter.
///
/// `pad` is added twice (once per side) to sampled lengths and is ignored for angles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub pad: f64,
}

impl ParameterRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max, pad: 0.0 }
    }

    pub fn with_pad(mut self, pad: f64) -> Self {
        self.pad = pad;
        self
    }

    pub fn fixed(value: f64) -> Self {
        Self::new(value, value)
    }

    fn validate(&self, name: &'static str) -> Result<(), LatticeError> {
        for value in [self.min, self.max, self.pad] {
            if !value.is_finite() {
                return Err(LatticeError::InvalidParameter { name, value });
            }
        }
        if self.min > self.max {
            return Err(LatticeError::InvalidRange {
                name,
                min: self.min,
                max: self.max,
            });
        }
        if self.pad < 0.0 {
            return Err(LatticeError::InvalidParameter {
                name,
                value: self.pad,
            });
        }
        Ok(())
    }

    fn sample(&self, rng: &mut impl Rng) -> f64 {
        if self.min == self.max {
            self.min
        } else {
            rng.gen_range(self.min..=self.max)
        }
    }
}

/// Bounds from which random periodic cells are drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct LatticeBounds {
    pub a: ParameterRange,
    pub b: ParameterRange,
    pub c: ParameterRange,
    pub alpha: ParameterRange,
    pub beta: ParameterRange,
    pub gamma: ParameterRange,
}

impl LatticeBounds {
    /// Orthorhombic bounds with the same length range on every axis.
    pub fn cubic(min: f64, max: f64, pad: f64) -> Self {
        let length = ParameterRange::new(min, max).with_pad(pad);
        Self {
            a: length,
            b: length,
            c: length,
            alpha: ParameterRange::fixed(90.0),
            beta: ParameterRange::fixed(90.0),
            gamma: ParameterRange::fixed(90.0),
        }
    }

    pub fn validate(&self) -> Result<(), LatticeError> {
        for (name, range) in [("a", &self.a), ("b", &self.b), ("c", &self.c)] {
            range.validate(name)?;
            if range.min <= 0.0 {
                return Err(LatticeError::InvalidParameter {
                    name,
                    value: range.min,
                });
            }
        }
        for (name, range) in [
            ("alpha", &self.alpha),
            ("beta", &self.beta),
            ("gamma", &self.gamma),
        ] {
            range.validate(name)?;
            if range.min <= 0.0 || range.max >= 180.0 {
                return Err(LatticeError::InvalidRange {
                    name,
                    min: range.min,
                    max: range.max,
                });
            }
        }
        Ok(())
    }

    /// Draws a random cell: lengths uniform in `[min, max]` plus `2 * pad`, angles uniform in
    /// `[min, max]`.
    pub fn sample(&self, rng: &mut impl Rng) -> Result<Lattice, LatticeError> {
        let a = self.a.sample(rng) + 2.0 * self.a.pad;
        let b = self.b.sample(rng) + 2.0 * self.b.pad;
        let c = self.c.sample(rng) + 2.0 * self.c.pad;
        let alpha = self.alpha.sample(rng);
        let beta = self.beta.sample(rng);
        let gamma = self.gamma.sample(rng);
        Lattice::from_parameters(a, b, c, alpha, beta, gamma)
    }
}
