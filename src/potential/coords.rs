//! Interleaved coordinate helpers.
//!
//! A charge ensemble is stored as `[x0, y0, x1, y1, ...]`; these helpers split
//! and rebuild it without reordering charges.

use serde::{Deserialize, Serialize};

/// Split an interleaved ensemble into x and y components.
pub fn r2xy(r: &[f64]) -> (Vec<f64>, Vec<f64>) {
    debug_assert!(r.len() % 2 == 0, "ensemble length must be even");
    let x = r.iter().step_by(2).copied().collect();
    let y = r.iter().skip(1).step_by(2).copied().collect();
    (x, y)
}

/// Interleave x and y components into an ensemble.
pub fn xy2r(x: &[f64], y: &[f64]) -> Vec<f64> {
    debug_assert_eq!(x.len(), y.len());
    x.iter().zip(y).flat_map(|(&xi, &yi)| [xi, yi]).collect()
}

/// Periodic strip `[lower, upper)` along y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct YDomain {
    pub lower: f64,
    pub upper: f64,
}

impl YDomain {
    /// Strip of length `box_length` centred on y = 0.
    pub fn centered(box_length: f64) -> Self {
        Self { lower: -box_length / 2.0, upper: box_length / 2.0 }
    }

    pub fn length(&self) -> f64 {
        self.upper - self.lower
    }

    /// Fold a single y coordinate into the strip.
    ///
    /// Values already inside are returned bit-for-bit, so folding is idempotent.
    pub fn map_y(&self, y: f64) -> f64 {
        if y >= self.lower && y < self.upper {
            return y;
        }
        let folded = self.lower + (y - self.lower).rem_euclid(self.length());
        if folded >= self.upper || folded < self.lower {
            self.lower
        } else {
            folded
        }
    }

    /// Fold every y coordinate of an interleaved ensemble into the strip.
    pub fn map_y_into_domain(&self, r: &[f64]) -> Vec<f64> {
        let (x, y) = r2xy(r);
        let y_new: Vec<f64> = y.iter().map(|&yi| self.map_y(yi)).collect();
        xy2r(&x, &y_new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_r2xy_roundtrip_preserves_order() {
        let r = vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0];
        let (x, y) = r2xy(&r);
        assert_eq!(x, vec![1.0, 2.0, 3.0]);
        assert_eq!(y, vec![-1.0, -2.0, -3.0]);
        assert_eq!(xy2r(&x, &y), r);
    }

    #[test]
    fn test_map_y_folds_into_strip() {
        let domain = YDomain::centered(4.0);
        assert_eq!(domain.map_y(0.5), 0.5);
        assert_eq!(domain.map_y(2.5), -1.5);
        assert_eq!(domain.map_y(-2.5), 1.5);
        assert_eq!(domain.map_y(2.0), -2.0);
        assert_eq!(domain.map_y(10.25), -1.75);
    }

    #[test]
    fn test_map_y_into_domain_is_idempotent() {
        let domain = YDomain::centered(40e-6);
        let r: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { i as f64 * 1e-7 } else { (i as f64 - 20.0) * 7.3e-6 })
            .collect();
        let once = domain.map_y_into_domain(&r);
        let twice = domain.map_y_into_domain(&once);
        assert_eq!(once, twice);
        for (i, (&a, &b)) in r.iter().zip(&once).enumerate() {
            if i % 2 == 0 {
                assert_eq!(a, b, "x coordinates must be untouched");
            } else {
                assert!(b >= domain.lower && b < domain.upper);
            }
        }
    }
}
