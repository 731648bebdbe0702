use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A single `[x, y]` point on a liquidity curve.
pub type Point = [f64; 2];

/// A piecewise-linear, non-decreasing liquidity curve.
///
/// Serialized as a bare list of `[x, y]` points, e.g. `[[0, 0], [1000, 2000]]`.
/// The x axis is the amount entering a hop and the y axis the amount leaving it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LiquidityCurve {
    points: Vec<Point>,
}

impl LiquidityCurve {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Output amount for an input of `x`.
    ///
    /// Below the first point the curve yields nothing; beyond the last point it
    /// saturates at the last y value.
    pub fn amount_at(&self, x: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if x < first[0] {
            return 0.0;
        }
        if x == first[0] {
            return first[1];
        }
        if x >= last[0] {
            return last[1];
        }
        self.interpolate(x, 0, 1)
    }

    /// Smallest input that yields `y`, the inverse of [`amount_at`](Self::amount_at).
    pub fn amount_reverse(&self, y: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };
        if y <= first[1] {
            return first[0];
        }
        if y >= last[1] {
            return last[0];
        }
        self.interpolate(y, 1, 0)
    }

    /// Linear interpolation along the first segment whose `from` coordinate
    /// reaches `value`. Callers guarantee `value` lies strictly inside the range.
    fn interpolate(&self, value: f64, from: usize, to: usize) -> f64 {
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if b[from] < value {
                continue;
            }
            let span = b[from] - a[from];
            if span == 0.0 {
                return b[to];
            }
            return a[to] + (value - a[from]) * (b[to] - a[to]) / span;
        }
        self.points.last().map_or(0.0, |p| p[to])
    }

    /// Compose two curves in sequence: the result maps `x` to `next(self(x))`.
    pub fn join(&self, next: &LiquidityCurve) -> LiquidityCurve {
        if self.points.is_empty() || next.points.is_empty() {
            return LiquidityCurve::default();
        }
        let (min_y, max_y) = (self.points[0][1], self.points[self.points.len() - 1][1]);

        let mut points: Vec<Point> = self
            .points
            .iter()
            .map(|p| [p[0], next.amount_at(p[1])])
            .chain(
                next.points
                    .iter()
                    .filter(|p| p[0] >= min_y && p[0] <= max_y)
                    .map(|p| [self.amount_reverse(p[0]), p[1]]),
            )
            .collect();

        points.sort_by(|a, b| a[0].total_cmp(&b[0]).then(a[1].total_cmp(&b[1])));
        points.dedup();
        LiquidityCurve { points }
    }

    /// Check that the curve is usable for composition.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.points.is_empty() {
            return Err(CoreError::InvalidCurve("curve has no points".into()));
        }
        for p in &self.points {
            if !p[0].is_finite() || !p[1].is_finite() {
                return Err(CoreError::InvalidCurve(format!(
                    "non-finite point [{}, {}]",
                    p[0], p[1]
                )));
            }
        }
        for pair in self.points.windows(2) {
            if pair[1][0] < pair[0][0] {
                return Err(CoreError::InvalidCurve(format!(
                    "x must be non-decreasing: {} after {}",
                    pair[1][0], pair[0][0]
                )));
            }
            if pair[1][1] < pair[0][1] {
                return Err(CoreError::InvalidCurve(format!(
                    "y must be non-decreasing: {} after {}",
                    pair[1][1], pair[0][1]
                )));
            }
        }
        Ok(())
    }
}

impl From<Vec<Point>> for LiquidityCurve {
    fn from(points: Vec<Point>) -> Self {
        Self::new(points)
    }
}

/// Compose two optional curves. A missing curve is the identity.
pub fn join_optional(
    first: Option<&LiquidityCurve>,
    second: Option<&LiquidityCurve>,
) -> Option<LiquidityCurve> {
    match (first, second) {
        (Some(a), Some(b)) => Some(a.join(b)),
        (Some(a), None) => Some(a.clone()),
        (None, Some(b)) => Some(b.clone()),
        (None, None) => None,
    }
}
