//! Initial electron placement.

use crate::error::{Result, SweepError};
use crate::io::GeometryConfig;

/// Reject lattices that do not fit the box or cannot hold every electron.
pub fn validate_geometry(geometry: &GeometryConfig) -> Result<()> {
    let GeometryConfig { box_length, n_electrons, n_rows, n_cols, row_spacing, col_spacing, .. } = *geometry;
    if n_rows == 0 || n_cols == 0 {
        return Err(SweepError::Geometry("the initial lattice needs at least one row and one column".into()));
    }
    if n_cols as f64 * col_spacing > box_length {
        return Err(SweepError::Geometry(format!(
            "{} columns at {:.3e} m spacing do not fit in a box of length {:.3e} m; use more rows",
            n_cols, col_spacing, box_length
        )));
    }
    if n_electrons > n_rows * n_cols {
        return Err(SweepError::Geometry(format!(
            "{} electrons do not fit on a {} x {} lattice",
            n_electrons, n_rows, n_cols
        )));
    }
    if !(row_spacing >= 0.0 && col_spacing > 0.0) {
        return Err(SweepError::Geometry("lattice spacings must be positive".into()));
    }
    Ok(())
}

/// Rectangular lattice centred on `origin`, rows along x and columns along y.
///
/// Electrons fill the lattice one row at a time; a partially filled last
/// row is allowed.
pub fn get_rectangular_initial_condition(geometry: &GeometryConfig) -> Result<Vec<f64>> {
    validate_geometry(geometry)?;
    let (x0, y0) = geometry.origin;
    let x_offset = (geometry.n_rows as f64 - 1.0) / 2.0;
    let y_offset = (geometry.n_cols as f64 - 1.0) / 2.0;

    Ok((0..geometry.n_electrons)
        .flat_map(|i| {
            let row = (i / geometry.n_cols) as f64;
            let col = (i % geometry.n_cols) as f64;
            [
                x0 + (row - x_offset) * geometry.row_spacing,
                y0 + (col - y_offset) * geometry.col_spacing,
            ]
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn geometry() -> GeometryConfig {
        GeometryConfig {
            box_length: 40e-6,
            n_electrons: 150,
            n_rows: 3,
            row_spacing: 0.2e-6,
            n_cols: 50,
            col_spacing: 0.2e-6,
            origin: (0.0, 0.0),
            periodic_y: true,
        }
    }

    #[test]
    fn test_lattice_is_centred() {
        let r = get_rectangular_initial_condition(&geometry()).unwrap();
        assert_eq!(r.len(), 300);
        let (sx, sy) = r.chunks_exact(2).fold((0.0, 0.0), |(sx, sy), p| (sx + p[0], sy + p[1]));
        assert_relative_eq!(sx, 0.0, epsilon = 1e-18);
        assert_relative_eq!(sy, 0.0, epsilon = 1e-18);
        assert_relative_eq!(r[0], -0.2e-6);
        assert_relative_eq!(r[1], -4.9e-6, epsilon = 1e-18);
    }

    #[test]
    fn test_partial_last_row() {
        let g = GeometryConfig { n_electrons: 4, n_rows: 2, n_cols: 3, origin: (1.0, 2.0), ..geometry() };
        let r = get_rectangular_initial_condition(&g).unwrap();
        assert_eq!(r.len(), 8);
        // Fourth electron starts the second row.
        assert_relative_eq!(r[6], 1.0 + 0.1e-6);
        assert_relative_eq!(r[7], 2.0 - 0.2e-6);
    }

    #[test]
    fn test_columns_longer_than_box_are_rejected() {
        let g = GeometryConfig { n_cols: 250, n_rows: 1, n_electrons: 250, ..geometry() };
        assert!(matches!(get_rectangular_initial_condition(&g), Err(SweepError::Geometry(_))));
    }

    #[test]
    fn test_too_many_electrons_are_rejected() {
        let g = GeometryConfig { n_electrons: 151, ..geometry() };
        assert!(matches!(validate_geometry(&g), Err(SweepError::Geometry(_))));
    }
}
