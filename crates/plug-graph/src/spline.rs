//! Spline definitions
//!
//! `SplineDefinition` is the user-editable value of a spline plug: control
//! points sorted by x plus an interpolation mode, with no duplicated end
//! points. `SplineDefinition::spline` expands it into a `Spline` carrying
//! the end-point repetition the chosen basis needs, which is what actually
//! gets evaluated.

use serde::{Deserialize, Serialize};

use crate::error::{PlugGraphError, Result};
use crate::value::PlugValue;

/// Interpolation modes, stored on the plug as their index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SplineInterpolation {
    Linear,
    #[default]
    CatmullRom,
    BSpline,
    MonotoneCubic,
    Constant,
}

impl SplineInterpolation {
    pub fn index(&self) -> i64 {
        match self {
            SplineInterpolation::Linear => 0,
            SplineInterpolation::CatmullRom => 1,
            SplineInterpolation::BSpline => 2,
            SplineInterpolation::MonotoneCubic => 3,
            SplineInterpolation::Constant => 4,
        }
    }

    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(SplineInterpolation::Linear),
            1 => Some(SplineInterpolation::CatmullRom),
            2 => Some(SplineInterpolation::BSpline),
            3 => Some(SplineInterpolation::MonotoneCubic),
            4 => Some(SplineInterpolation::Constant),
            _ => None,
        }
    }

    /// How many times each end point appears in the expanded spline
    pub fn end_point_multiplicity(&self) -> usize {
        match self {
            SplineInterpolation::Linear
            | SplineInterpolation::Constant
            | SplineInterpolation::MonotoneCubic => 1,
            SplineInterpolation::CatmullRom => 2,
            SplineInterpolation::BSpline => 3,
        }
    }
}

/// Editable spline value: sorted control points and an interpolation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SplineDefinition {
    points: Vec<(f64, f64)>,
    interpolation: SplineInterpolation,
}

impl SplineDefinition {
    /// Create a definition; points are stably sorted by x
    pub fn new(points: impl IntoIterator<Item = (f64, f64)>, interpolation: SplineInterpolation) -> Self {
        let mut points: Vec<(f64, f64)> = points.into_iter().collect();
        points.sort_by(|a, b| a.0.total_cmp(&b.0));
        Self {
            points,
            interpolation,
        }
    }

    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn interpolation(&self) -> SplineInterpolation {
        self.interpolation
    }

    /// Remove end points duplicated for the interpolation's basis.
    ///
    /// Returns false, leaving the points untouched, if the ends do not carry
    /// the expected repetition.
    pub fn trim_end_points(&mut self) -> bool {
        let multiplicity = self.interpolation.end_point_multiplicity();
        if multiplicity == 1 {
            return true;
        }
        if self.points.len() < multiplicity * 2 {
            return false;
        }

        let first = self.points[0];
        let last = self.points[self.points.len() - 1];
        let head_repeated = self.points[..multiplicity].iter().all(|p| *p == first);
        let tail_repeated = self.points[self.points.len() - multiplicity..]
            .iter()
            .all(|p| *p == last);
        if !head_repeated || !tail_repeated {
            return false;
        }

        let end = self.points.len() - (multiplicity - 1);
        self.points = self.points[multiplicity - 1..end].to_vec();
        true
    }

    /// Expand into an evaluable spline with repeated end points
    pub fn spline(&self) -> Spline {
        let multiplicity = self.interpolation.end_point_multiplicity();
        let mut points = Vec::with_capacity(self.points.len() + 2 * (multiplicity - 1));
        if let (Some(first), Some(last)) = (self.points.first(), self.points.last()) {
            points.extend(std::iter::repeat(*first).take(multiplicity - 1));
            points.extend_from_slice(&self.points);
            points.extend(std::iter::repeat(*last).take(multiplicity - 1));
        }
        Spline {
            points,
            interpolation: self.interpolation,
        }
    }

    /// Rebuild a definition from a spline plug's synthesized value
    pub fn from_plug_value(value: &PlugValue) -> Result<Self> {
        let children = value.as_compound().ok_or_else(|| PlugGraphError::InvalidValue {
            plug: "spline".to_string(),
            message: format!("expected compound value, got {}", value.plug_type().name()),
        })?;

        let mut interpolation = SplineInterpolation::default();
        let mut points = Vec::new();
        for (name, child) in children {
            if name == crate::spline_plug::INTERPOLATION {
                let index = child.as_int().unwrap_or(-1);
                interpolation = SplineInterpolation::from_index(index).ok_or_else(|| {
                    PlugGraphError::InvalidValue {
                        plug: name.clone(),
                        message: format!("unknown interpolation {index}"),
                    }
                })?;
                continue;
            }
            let coordinate = |axis: &str| {
                child
                    .child(axis)
                    .and_then(PlugValue::as_float)
                    .ok_or_else(|| PlugGraphError::InvalidValue {
                        plug: format!("{name}.{axis}"),
                        message: "expected float".to_string(),
                    })
            };
            points.push((coordinate("x")?, coordinate("y")?));
        }
        Ok(Self::new(points, interpolation))
    }
}

/// An expanded spline ready for evaluation
#[derive(Debug, Clone, PartialEq)]
pub struct Spline {
    points: Vec<(f64, f64)>,
    interpolation: SplineInterpolation,
}

fn x_of(p: &(f64, f64)) -> f64 {
    p.0
}

fn y_of(p: &(f64, f64)) -> f64 {
    p.1
}

/// One coordinate of a cubic basis segment at parameter `t`
fn blend(basis: &[[f64; 4]; 4], window: &[(f64, f64)], t: f64, axis: fn(&(f64, f64)) -> f64) -> f64 {
    let powers = [t * t * t, t * t, t, 1.0];
    let mut result = 0.0;
    for (row, power) in basis.iter().zip(powers) {
        for (coefficient, point) in row.iter().zip(window) {
            result += power * coefficient * axis(point);
        }
    }
    result
}

const CATMULL_ROM: [[f64; 4]; 4] = [
    [-0.5, 1.5, -1.5, 0.5],
    [1.0, -2.5, 2.0, -0.5],
    [-0.5, 0.0, 0.5, 0.0],
    [0.0, 1.0, 0.0, 0.0],
];

const B_SPLINE: [[f64; 4]; 4] = [
    [-1.0 / 6.0, 3.0 / 6.0, -3.0 / 6.0, 1.0 / 6.0],
    [3.0 / 6.0, -6.0 / 6.0, 3.0 / 6.0, 0.0],
    [-3.0 / 6.0, 0.0, 3.0 / 6.0, 0.0],
    [1.0 / 6.0, 4.0 / 6.0, 1.0 / 6.0, 0.0],
];

impl Spline {
    pub fn points(&self) -> &[(f64, f64)] {
        &self.points
    }

    pub fn interpolation(&self) -> SplineInterpolation {
        self.interpolation
    }

    /// Evaluate y at `x`, clamping outside the point range.
    ///
    /// An empty spline evaluates to 0.
    pub fn evaluate(&self, x: f64) -> f64 {
        let points = &self.points;
        match points.len() {
            0 => return 0.0,
            1 => return points[0].1,
            _ => {}
        }
        let first = points[0];
        let last = points[points.len() - 1];
        if x <= first.0 {
            return first.1;
        }
        if x >= last.0 {
            return last.1;
        }

        match self.interpolation {
            SplineInterpolation::Linear => self.evaluate_linear(x),
            SplineInterpolation::Constant => self.evaluate_constant(x),
            SplineInterpolation::MonotoneCubic => self.evaluate_monotone(x),
            SplineInterpolation::CatmullRom => self.evaluate_cubic(x, &CATMULL_ROM),
            SplineInterpolation::BSpline => self.evaluate_cubic(x, &B_SPLINE),
        }
    }

    /// Index of the segment [i, i+1] containing x
    fn segment(&self, x: f64) -> usize {
        let upper = self.points.partition_point(|p| p.0 <= x);
        upper.saturating_sub(1).min(self.points.len() - 2)
    }

    fn evaluate_linear(&self, x: f64) -> f64 {
        let i = self.segment(x);
        let (x0, y0) = self.points[i];
        let (x1, y1) = self.points[i + 1];
        if x1 == x0 {
            return y1;
        }
        y0 + (y1 - y0) * (x - x0) / (x1 - x0)
    }

    fn evaluate_constant(&self, x: f64) -> f64 {
        self.points[self.segment(x)].1
    }

    /// Fritsch–Carlson monotone cubic Hermite interpolation
    fn evaluate_monotone(&self, x: f64) -> f64 {
        let points = &self.points;
        let n = points.len();
        let secants: Vec<f64> = points
            .windows(2)
            .map(|w| {
                let dx = w[1].0 - w[0].0;
                if dx == 0.0 {
                    0.0
                } else {
                    (w[1].1 - w[0].1) / dx
                }
            })
            .collect();

        let mut tangents = vec![0.0; n];
        tangents[0] = secants[0];
        tangents[n - 1] = secants[n - 2];
        for i in 1..n - 1 {
            tangents[i] = if secants[i - 1] * secants[i] <= 0.0 {
                0.0
            } else {
                (secants[i - 1] + secants[i]) / 2.0
            };
        }
        for i in 0..n - 1 {
            if secants[i] == 0.0 {
                tangents[i] = 0.0;
                tangents[i + 1] = 0.0;
                continue;
            }
            let a = tangents[i] / secants[i];
            let b = tangents[i + 1] / secants[i];
            let s = a * a + b * b;
            if s > 9.0 {
                let t = 3.0 / s.sqrt();
                tangents[i] = t * a * secants[i];
                tangents[i + 1] = t * b * secants[i];
            }
        }

        let i = self.segment(x);
        let (x0, y0) = points[i];
        let (x1, y1) = points[i + 1];
        let h = x1 - x0;
        if h == 0.0 {
            return y1;
        }
        let t = (x - x0) / h;
        let t2 = t * t;
        let t3 = t2 * t;
        let h00 = 2.0 * t3 - 3.0 * t2 + 1.0;
        let h10 = t3 - 2.0 * t2 + t;
        let h01 = -2.0 * t3 + 3.0 * t2;
        let h11 = t3 - t2;
        h00 * y0 + h10 * h * tangents[i] + h01 * y1 + h11 * h * tangents[i + 1]
    }

    /// Cubic basis evaluation over 4-point windows, solving x(t) = x by
    /// bisection. x(t) must be monotonic, which sorted points guarantee.
    fn evaluate_cubic(&self, x: f64, basis: &[[f64; 4]; 4]) -> f64 {
        if self.points.len() < 4 {
            return self.evaluate_linear(x);
        }

        // Pick the segment whose x range contains x
        let segments = self.points.len() - 3;
        let mut window = &self.points[0..4];
        for s in 0..segments {
            let candidate = &self.points[s..s + 4];
            window = candidate;
            if blend(basis, candidate, 1.0, x_of) >= x {
                break;
            }
        }

        let (mut lo, mut hi) = (0.0, 1.0);
        for _ in 0..64 {
            let mid = 0.5 * (lo + hi);
            if blend(basis, window, mid, x_of) < x {
                lo = mid;
            } else {
                hi = mid;
            }
        }
        blend(basis, window, 0.5 * (lo + hi), y_of)
    }
}
