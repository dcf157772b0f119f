const MIN_DISTANCE: f64 = 1e-6;
const CLASH_ENERGY: f64 = 1e10;

/// Lennard-Jones 12-6 in the `r_min` form: `E = D * ((r0/r)^12 - 2 (r0/r)^6)`, with the minimum
/// `-D` at `r = r0`.
#[inline]
pub fn lennard_jones_12_6(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < MIN_DISTANCE {
        return CLASH_ENERGY;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    well_depth * (rho12 - 2.0 * rho6)
}

#[inline]
pub fn lennard_jones_12_6_derivative(dist: f64, r_min: f64, well_depth: f64) -> f64 {
    if dist < MIN_DISTANCE {
        return 0.0;
    }
    let rho = r_min / dist;
    let rho6 = rho.powi(6);
    let rho12 = rho6 * rho6;
    12.0 * well_depth * (rho6 - rho12) / dist
}

/// Morse potential shifted so the well bottom is `-D`: `E = D * ((1 - e^(-a (r - r0)))^2 - 1)`.
#[inline]
pub fn morse(dist: f64, r_min: f64, well_depth: f64, alpha: f64) -> f64 {
    if dist < MIN_DISTANCE {
        return CLASH_ENERGY;
    }
    let x = 1.0 - (-alpha * (dist - r_min)).exp();
    well_depth * (x * x - 1.0)
}

#[inline]
pub fn morse_derivative(dist: f64, r_min: f64, well_depth: f64, alpha: f64) -> f64 {
    if dist < MIN_DISTANCE {
        return 0.0;
    }
    let e = (-alpha * (dist - r_min)).exp();
    2.0 * well_depth * alpha * e * (1.0 - e)
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOLERANCE: f64 = 1e-9;

    fn f64_approx_equal(a: f64, b: f64) -> bool {
        (a - b).abs() < TOLERANCE
    }

    fn numeric_derivative(f: impl Fn(f64) -> f64, x: f64) -> f64 {
        let h = 1e-6;
        (f(x + h) - f(x - h)) / (2.0 * h)
    }

    #[test]
    fn lennard_jones_at_minimum_distance_returns_negative_well_depth() {
        let energy = lennard_jones_12_6(2.0, 2.0, 10.0);
        assert!(f64_approx_equal(energy, -10.0));
        assert!(f64_approx_equal(lennard_jones_12_6_derivative(2.0, 2.0, 10.0), 0.0));
    }

    #[test]
    fn lennard_jones_at_very_small_distance_returns_large_positive_energy() {
        let energy = lennard_jones_12_6(1e-7, 2.0, 10.0);
        assert!(f64_approx_equal(energy, 1e10));
    }

    #[test]
    fn lennard_jones_derivative_matches_finite_difference() {
        for r in [1.8, 2.3, 3.1, 5.0] {
            let analytic = lennard_jones_12_6_derivative(r, 2.5, 0.7);
            let numeric = numeric_derivative(|d| lennard_jones_12_6(d, 2.5, 0.7), r);
            assert!((analytic - numeric).abs() < 1e-5, "r = {r}");
        }
    }

    #[test]
    fn morse_at_minimum_distance_returns_negative_well_depth() {
        let energy = morse(2.5, 2.5, 0.34, 1.4);
        assert!(f64_approx_equal(energy, -0.34));
        assert!(f64_approx_equal(morse_derivative(2.5, 2.5, 0.34, 1.4), 0.0));
    }

    #[test]
    fn morse_vanishes_at_long_range() {
        assert!(morse(50.0, 2.5, 0.34, 1.4).abs() < 1e-12);
    }

    #[test]
    fn morse_derivative_matches_finite_difference() {
        for r in [1.9, 2.4, 3.0, 4.5] {
            let analytic = morse_derivative(r, 2.5, 0.34, 1.4);
            let numeric = numeric_derivative(|d| morse(d, 2.5, 0.34, 1.4), r);
            assert!((analytic - numeric).abs() < 1e-6, "r = {r}");
        }
    }
}
