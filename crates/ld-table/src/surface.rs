//! 2D lookup: a monotonic outer axis over rows of 1D tables.

use crate::table::Table;
use tracing::warn;

/// A row of [`Table`]s indexed by a second monotonic axis.
///
/// Used for speed/throttle field-change schedules: the outer axis is the
/// throttle fraction, each row lists speed boundaries against factor values.
/// The lookup is a compound last-match, not a bilinear interpolation: only
/// the inner *boundaries* are blended between the bracketing rows, the
/// returned value is always an actual sample.
///
/// The outer-axis cursor is an explicit field owned by this instance and is
/// revalidated against the current shape before every use, so a stale cursor
/// can never read out of bounds.
#[derive(Clone, Debug)]
pub struct Surface {
    x: Vec<f64>,
    rows: Vec<Table>,
    prev_row: usize,
}

impl Surface {
    /// Build from (outer x, row) pairs.
    ///
    /// A non-increasing outer axis is tolerated with a warning.
    pub fn from_rows(rows: Vec<(f64, Table)>) -> Self {
        let (x, rows): (Vec<f64>, Vec<Table>) = rows.into_iter().unzip();
        if x.windows(2).any(|w| w[0] >= w[1]) {
            warn!("surface outer axis values are not strictly increasing");
        }
        Self {
            x,
            rows,
            prev_row: 0,
        }
    }

    /// Build from a structured tabular block: one outer value per row, each
    /// row holding `declared_cols` (x, y) pairs laid out row-major in
    /// `cells`.
    ///
    /// Row/column counts are validated against the declared header; any
    /// mismatch warns and degrades best-effort (surplus truncated, short
    /// rows dropped).
    pub fn from_grid(
        outer: &[f64],
        declared_rows: usize,
        declared_cols: usize,
        cells: &[f64],
    ) -> Self {
        if outer.len() != declared_rows {
            warn!(
                declared = declared_rows,
                actual = outer.len(),
                "surface row count does not match declared header"
            );
        }
        let expected_cells = declared_rows * declared_cols * 2;
        if cells.len() != expected_cells {
            warn!(
                declared = expected_cells,
                actual = cells.len(),
                "surface cell count does not match declared header"
            );
        }
        let rows_present = outer.len().min(declared_rows);
        let mut rows = Vec::with_capacity(rows_present);
        for r in 0..rows_present {
            let start = r * declared_cols * 2;
            let end = start + declared_cols * 2;
            if end > cells.len() {
                warn!(row = r, "dropping short surface row");
                break;
            }
            rows.push((outer[r], Table::from_pairs(&cells[start..end])));
        }
        Self::from_rows(rows)
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn min_x(&self) -> f64 {
        self.x.first().copied().unwrap_or(0.0)
    }

    pub fn max_x(&self) -> f64 {
        self.x.last().copied().unwrap_or(0.0)
    }

    /// Compound 2D lookup.
    ///
    /// Binary-searches the outer axis for the row bracket `[i, i + 1]`,
    /// reusing the cached row when the query still falls inside it. Within
    /// the bracket, walks the inner samples backward to the largest index
    /// whose boundary (the lower row's inner x blended toward the upper
    /// row's by the outer fraction) is exceeded by `y`, and returns the
    /// lower row's y at that index. When no boundary is exceeded the first
    /// inner sample's y is returned, the analogue of the 1D below-range rule.
    pub fn get(&mut self, x: f64, y: f64) -> f64 {
        let n = self.x.len();
        if n == 0 {
            return 0.0;
        }
        if n == 1 {
            self.prev_row = 0;
            return Self::walk_row(&self.rows[0], &self.rows[0], 0.0, y);
        }

        // Cursor guard: shape may have changed since the last query.
        if self.prev_row + 1 >= n {
            self.prev_row = 0;
        }
        let i = if x >= self.x[self.prev_row] && x <= self.x[self.prev_row + 1] {
            self.prev_row
        } else {
            // partition_point gives the first index with x[i] > query;
            // the bracket lower bound is one before, clamped to a valid pair.
            let upper = self.x.partition_point(|&v| v <= x);
            upper.saturating_sub(1).min(n - 2)
        };
        self.prev_row = i;

        let span = self.x[i + 1] - self.x[i];
        let frac = if span > 0.0 {
            ((x - self.x[i]) / span).clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self::walk_row(&self.rows[i], &self.rows[i + 1], frac, y)
    }

    fn walk_row(lo: &Table, hi: &Table, frac: f64, y: f64) -> f64 {
        let m = lo.len().min(hi.len());
        if m == 0 {
            return 0.0;
        }
        let (lx, ly) = (lo.xs(), lo.ys());
        let hx = hi.xs();
        for j in (0..m).rev() {
            let boundary = lx[j] + frac * (hx[j] - lx[j]);
            if y > boundary {
                return ly[j];
            }
        }
        ly[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Field-change style surface: outer = throttle fraction, inner x =
    /// speed boundaries (m/s), inner y = field factor.
    fn field_surface() -> Surface {
        Surface::from_rows(vec![
            (
                0.0,
                Table::new(vec![0.0, 10.0, 20.0], vec![1.0, 0.8, 0.6]).unwrap(),
            ),
            (
                1.0,
                Table::new(vec![0.0, 14.0, 26.0], vec![1.0, 0.8, 0.6]).unwrap(),
            ),
        ])
    }

    #[test]
    fn below_all_boundaries_returns_first_value() {
        let mut s = field_surface();
        // Below every boundary the first inner sample wins.
        assert_eq!(s.get(0.0, -1.0), 1.0);
    }

    #[test]
    fn boundaries_blend_with_outer_fraction() {
        let mut s = field_surface();
        // At zero throttle the second stage starts at 10 m/s.
        assert_eq!(s.get(0.0, 12.0), 0.8);
        // At full throttle it starts at 14 m/s, so 12 m/s is still stage 0.
        assert_eq!(s.get(1.0, 12.0), 1.0);
        // Halfway the boundary interpolates to 12 m/s; 12 does not exceed it.
        assert_eq!(s.get(0.5, 12.0), 1.0);
        assert_eq!(s.get(0.5, 12.1), 0.8);
    }

    #[test]
    fn last_match_walks_from_the_top() {
        let mut s = field_surface();
        assert_eq!(s.get(0.0, 25.0), 0.6);
    }

    #[test]
    fn cursor_reuse_and_reseek() {
        let mut s = Surface::from_rows(vec![
            (0.0, Table::new(vec![0.0], vec![10.0]).unwrap()),
            (1.0, Table::new(vec![0.0], vec![20.0]).unwrap()),
            (2.0, Table::new(vec![0.0], vec![30.0]).unwrap()),
        ]);
        assert_eq!(s.get(1.5, 5.0), 20.0);
        assert_eq!(s.get(1.6, 5.0), 20.0); // cached bracket still valid
        assert_eq!(s.get(0.2, 5.0), 10.0); // reseek below
        assert_eq!(s.get(5.0, 5.0), 20.0); // clamped to last bracket, lower row
    }

    #[test]
    fn grid_shape_mismatch_degrades() {
        // Declared 2 rows x 2 cols but only one full row of cells present.
        let s = Surface::from_grid(&[0.0, 1.0], 2, 2, &[0.0, 1.0, 10.0, 0.5]);
        assert_eq!(s.len(), 1);
    }

    #[test]
    fn grid_builds_rows() {
        let cells = [
            0.0, 1.0, 10.0, 0.8, // row 0
            0.0, 1.0, 14.0, 0.8, // row 1
        ];
        let mut s = Surface::from_grid(&[0.0, 1.0], 2, 2, &cells);
        assert_eq!(s.len(), 2);
        assert_eq!(s.get(0.0, 12.0), 0.8);
        assert_eq!(s.get(1.0, 12.0), 1.0);
    }

    #[test]
    fn empty_surface_is_guarded() {
        let mut s = Surface::from_rows(vec![]);
        assert_eq!(s.get(0.5, 1.0), 0.0);
    }
}
