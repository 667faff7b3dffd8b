//! 1D lookup table with step-interpolation semantics.

use crate::error::{TableError, TableResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Ordered (x, y) samples, x increasing.
///
/// Lookup is deliberately a "last value ≤ x" step lookup, not a smooth
/// interpolation: tractive-effort-by-throttle tables hold the previous
/// plateau until the next sample is reached. An optional natural or clamped
/// cubic-spline second-derivative array can be computed once for consumers
/// that need derivative/smoothness queries; it does not change [`Table::get`].
#[derive(Clone, Debug, PartialEq)]
pub struct Table {
    x: Vec<f64>,
    y: Vec<f64>,
    y2: Option<Vec<f64>>,
}

/// Persisted form of a [`Table`].
///
/// Field order mirrors the save order: samples (count + interleaved pairs),
/// then the optional spline array behind its presence flag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TableSnapshot {
    pub samples: Vec<(f64, f64)>,
    pub spline: Option<Vec<f64>>,
}

impl Table {
    /// Create a table from parallel x and y sample arrays.
    ///
    /// # Errors
    /// Returns `InvalidArg` if the arrays differ in length. A non-increasing
    /// x axis is tolerated with a warning; lookups then return degraded
    /// results.
    pub fn new(x: Vec<f64>, y: Vec<f64>) -> TableResult<Self> {
        if x.len() != y.len() {
            return Err(TableError::InvalidArg {
                what: "x and y arrays must have equal length",
            });
        }
        if x.windows(2).any(|w| w[0] >= w[1]) {
            warn!("table x values are not strictly increasing");
        }
        Ok(Self { x, y, y2: None })
    }

    /// Build a table from a flat list of interleaved (x, y) values, as handed
    /// over by a configuration block.
    ///
    /// An odd value count drops the trailing value with a warning; fewer than
    /// two pairs leaves a degenerate table (lookups are guarded, not
    /// out-of-bounds).
    pub fn from_pairs(values: &[f64]) -> Self {
        if values.len() % 2 == 1 {
            warn!("ignoring extra odd value in table pair list");
        }
        let n = values.len() / 2;
        if n < 2 {
            warn!("table should have at least two value pairs");
        }
        let mut x = Vec::with_capacity(n);
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            x.push(values[2 * i]);
            y.push(values[2 * i + 1]);
        }
        if x.windows(2).any(|w| w[0] >= w[1]) {
            warn!("table x values are not strictly increasing");
        }
        Self { x, y, y2: None }
    }

    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }

    pub fn xs(&self) -> &[f64] {
        &self.x
    }

    pub fn ys(&self) -> &[f64] {
        &self.y
    }

    /// Step lookup: the y of the last sample whose x ≤ the query x, scanning
    /// from sample 0. Below the first sample this returns the first sample's
    /// y; an empty table returns 0.
    pub fn get(&self, x: f64) -> f64 {
        if self.x.is_empty() {
            return 0.0;
        }
        let mut value = self.y[0];
        for i in 0..self.x.len() {
            if x >= self.x[i] {
                value = self.y[i];
            }
        }
        value
    }

    /// First sample's x; 0 for an empty table.
    pub fn min_x(&self) -> f64 {
        self.x.first().copied().unwrap_or(0.0)
    }

    /// Last sample's x; 0 for an empty table.
    pub fn max_x(&self) -> f64 {
        self.x.last().copied().unwrap_or(0.0)
    }

    /// Largest y and the x where it occurs, ties resolved to the first
    /// occurrence. (0, 0) for an empty table.
    pub fn max_y(&self) -> (f64, f64) {
        if self.y.is_empty() {
            return (0.0, 0.0);
        }
        let mut maxi = 0;
        for i in 1..self.y.len() {
            if self.y[maxi] < self.y[i] {
                maxi = i;
            }
        }
        (self.y[maxi], self.x[maxi])
    }

    pub fn has_negative_value(&self) -> bool {
        self.y.iter().skip(1).any(|&v| v < 0.0)
    }

    /// In-place unit conversion of the x axis.
    pub fn scale_x(&mut self, factor: f64) {
        for v in &mut self.x {
            *v *= factor;
        }
    }

    /// In-place unit conversion of the y axis; also rescales the spline
    /// array when present.
    pub fn scale_y(&mut self, factor: f64) {
        for v in &mut self.y {
            *v *= factor;
        }
        if let Some(y2) = &mut self.y2 {
            for v in y2 {
                *v *= factor;
            }
        }
    }

    /// Solve the tri-diagonal system for cubic-spline second derivatives.
    ///
    /// Natural boundary conditions by default; supplying an endpoint slope
    /// clamps that end. Callable at most once per table.
    ///
    /// # Errors
    /// `Invariant` if the spline was already computed, `InvalidArg` with
    /// fewer than two samples.
    pub fn compute_spline(
        &mut self,
        slope_start: Option<f64>,
        slope_end: Option<f64>,
    ) -> TableResult<()> {
        if self.y2.is_some() {
            return Err(TableError::Invariant {
                what: "spline already computed for this table",
            });
        }
        let n = self.x.len();
        if n < 2 {
            return Err(TableError::InvalidArg {
                what: "spline needs at least two samples",
            });
        }
        let (x, y) = (&self.x, &self.y);
        let mut y2 = vec![0.0; n];
        let mut u = vec![0.0; n];

        match slope_start {
            None => {
                y2[0] = 0.0;
                u[0] = 0.0;
            }
            Some(yp) => {
                y2[0] = -0.5;
                let d = x[1] - x[0];
                u[0] = 3.0 / d * ((y[1] - y[0]) / d - yp);
            }
        }
        for i in 1..n - 1 {
            let sig = (x[i] - x[i - 1]) / (x[i + 1] - x[i - 1]);
            let p = sig * y2[i - 1] + 2.0;
            y2[i] = (sig - 1.0) / p;
            u[i] = (6.0
                * ((y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]))
                / (x[i + 1] - x[i - 1])
                - sig * u[i - 1])
                / p;
        }
        match slope_end {
            None => y2[n - 1] = 0.0,
            Some(yp) => {
                let d = x[n - 1] - x[n - 2];
                y2[n - 1] = (3.0 / d * (yp - (y[n - 1] - y[n - 2]) / d) - 0.5 * u[n - 2])
                    / (0.5 * y2[n - 2] + 1.0);
            }
        }
        for i in (0..n - 1).rev() {
            y2[i] = y2[i] * y2[i + 1] + u[i];
        }
        self.y2 = Some(y2);
        Ok(())
    }

    /// Spline second derivatives, if [`Table::compute_spline`] has run.
    pub fn spline(&self) -> Option<&[f64]> {
        self.y2.as_deref()
    }

    /// Capture persisted state.
    pub fn snapshot(&self) -> TableSnapshot {
        TableSnapshot {
            samples: self.x.iter().copied().zip(self.y.iter().copied()).collect(),
            spline: self.y2.clone(),
        }
    }

    /// Rebuild from persisted state.
    pub fn restore(snapshot: TableSnapshot) -> Self {
        let (x, y) = snapshot.samples.into_iter().unzip();
        Self {
            x,
            y,
            y2: snapshot.spline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_table() -> Table {
        Table::new(vec![0.0, 10.0, 20.0], vec![0.0, 5.0, 15.0]).unwrap()
    }

    #[test]
    fn step_lookup_last_value_at_or_below() {
        let t = sample_table();
        assert_eq!(t.get(5.0), 0.0);
        assert_eq!(t.get(10.0), 5.0);
        assert_eq!(t.get(15.0), 5.0);
        assert_eq!(t.get(25.0), 15.0);
    }

    #[test]
    fn step_lookup_below_range_returns_first() {
        let t = sample_table();
        assert_eq!(t.get(-1.0), 0.0);
    }

    #[test]
    fn empty_table_lookup_is_guarded() {
        let t = Table::from_pairs(&[]);
        assert_eq!(t.get(1.0), 0.0);
        assert_eq!(t.min_x(), 0.0);
        assert_eq!(t.max_y(), (0.0, 0.0));
    }

    #[test]
    fn from_pairs_drops_trailing_odd_value() {
        let t = Table::from_pairs(&[0.0, 1.0, 2.0, 3.0, 99.0]);
        assert_eq!(t.len(), 2);
        assert_eq!(t.get(2.0), 3.0);
    }

    #[test]
    fn max_y_ties_to_first_occurrence() {
        let t = Table::new(vec![0.0, 1.0, 2.0], vec![7.0, 7.0, 3.0]).unwrap();
        assert_eq!(t.max_y(), (7.0, 0.0));
    }

    #[test]
    fn mismatched_lengths_rejected() {
        assert!(Table::new(vec![0.0, 1.0], vec![0.0]).is_err());
    }

    #[test]
    fn scale_y_rescales_spline() {
        let mut t = Table::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 4.0, 9.0]).unwrap();
        t.compute_spline(None, None).unwrap();
        let before = t.spline().unwrap()[1];
        t.scale_y(2.0);
        assert!((t.spline().unwrap()[1] - 2.0 * before).abs() < 1e-12);
    }

    #[test]
    fn spline_is_single_shot() {
        let mut t = sample_table();
        t.compute_spline(None, None).unwrap();
        assert!(t.compute_spline(None, None).is_err());
    }

    #[test]
    fn spline_natural_endpoints_zero() {
        let mut t = Table::new(vec![0.0, 1.0, 2.0, 3.0], vec![0.0, 1.0, 4.0, 9.0]).unwrap();
        t.compute_spline(None, None).unwrap();
        let y2 = t.spline().unwrap();
        assert_eq!(y2[0], 0.0);
        assert_eq!(y2[3], 0.0);
    }

    #[test]
    fn spline_residual_small_at_interior_points() {
        let x = vec![0.0, 0.7, 1.5, 2.2, 3.9, 5.0];
        let y = vec![1.0, -0.5, 2.0, 0.0, 3.5, 1.0];
        let mut t = Table::new(x.clone(), y.clone()).unwrap();
        t.compute_spline(None, None).unwrap();
        let y2 = t.spline().unwrap();
        for i in 1..x.len() - 1 {
            let lhs = (x[i] - x[i - 1]) / 6.0 * y2[i - 1]
                + (x[i + 1] - x[i - 1]) / 3.0 * y2[i]
                + (x[i + 1] - x[i]) / 6.0 * y2[i + 1];
            let rhs = (y[i + 1] - y[i]) / (x[i + 1] - x[i]) - (y[i] - y[i - 1]) / (x[i] - x[i - 1]);
            assert!((lhs - rhs).abs() < 1e-4, "residual too large at {i}");
        }
    }

    #[test]
    fn snapshot_round_trip() {
        let mut t = sample_table();
        t.compute_spline(None, None).unwrap();
        let json = serde_json::to_string(&t.snapshot()).unwrap();
        let restored = Table::restore(serde_json::from_str(&json).unwrap());
        assert_eq!(restored, t);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn step_lookup_matches_reference_scan(
                mut xs in proptest::collection::vec(-1e3f64..1e3, 2..24),
                q in -1.5e3f64..1.5e3,
            ) {
                xs.sort_by(|a, b| a.partial_cmp(b).unwrap());
                xs.dedup();
                prop_assume!(xs.len() >= 2);
                let ys: Vec<f64> = (0..xs.len()).map(|i| i as f64).collect();
                let t = Table::new(xs.clone(), ys.clone()).unwrap();
                // reference: last index with x[i] <= q, else first
                let expected = xs
                    .iter()
                    .rposition(|&x| q >= x)
                    .map(|i| ys[i])
                    .unwrap_or(ys[0]);
                prop_assert_eq!(t.get(q), expected);
            }
        }
    }
}
