use crate::expr::{compile, Program};
use crate::grid::SolveStatus;
use serde::{Deserialize, Serialize};

/// Inputs for the 2D vector-field page.
///
/// `fx`/`fy` are the user-typed formulas for dx/dt and dy/dt over the grid
/// variables X and Y. Defaults are the page's initial form values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub fx: String,
    pub fy: String,
    /// Half-width of the symmetric x range [-x_max, x_max].
    pub x_max: f64,
    /// Half-width of the symmetric y range [-y_max, y_max].
    pub y_max: f64,
    /// Nodes per axis.
    pub resolution: usize,
}

impl Default for FieldSpec {
    fn default() -> Self {
        Self {
            fx: "np.sin(X)".to_string(),
            fy: "np.cos(X)".to_string(),
            x_max: 5.0,
            y_max: 5.0,
            resolution: 15,
        }
    }
}

/// One grid node: start point plus displacement vector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Arrow {
    pub x: f64,
    pub y: f64,
    pub dx: f64,
    pub dy: f64,
}

impl Arrow {
    pub fn magnitude(&self) -> f64 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Evaluated field, row-major over the grid (y rows, x columns).
///
/// A degraded field keeps the grid shape with every vector zeroed and the
/// status carrying a human-readable message, matching the page's behavior
/// of drawing an empty field plus an error line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorField {
    pub arrows: Vec<Arrow>,
    pub magnitude_min: f64,
    pub magnitude_max: f64,
    pub status: SolveStatus,
}

const DEFAULT_RANGE: f64 = 5.0;
const MIN_RESOLUTION: usize = 2;

fn axis(max: f64, n: usize) -> Vec<f64> {
    let max = if max.is_finite() && max > 0.0 {
        max
    } else {
        DEFAULT_RANGE
    };
    let step = 2.0 * max / (n - 1) as f64;
    (0..n).map(|i| -max + i as f64 * step).collect()
}

fn zero_field(xs: &[f64], ys: &[f64], message: String) -> VectorField {
    tracing::warn!(%message, "vector field degraded to zeros");
    let arrows = ys
        .iter()
        .flat_map(|&y| {
            xs.iter().map(move |&x| Arrow {
                x,
                y,
                dx: 0.0,
                dy: 0.0,
            })
        })
        .collect();
    VectorField {
        arrows,
        magnitude_min: 0.0,
        magnitude_max: 0.0,
        status: SolveStatus::Degraded { message },
    }
}

/// Evaluates both formulas over every grid node.
///
/// Malformed or disallowed formulas, and formulas that hit a numeric
/// domain error anywhere on the grid, yield a zero field of the same
/// shape; no error escapes as a panic or a short result.
pub fn evaluate(spec: &FieldSpec) -> VectorField {
    let n = spec.resolution.max(MIN_RESOLUTION);
    let xs = axis(spec.x_max, n);
    let ys = axis(spec.y_max, n);

    let fx = match compile(&spec.fx, &["X", "Y"]) {
        Ok(p) => p,
        Err(err) => return zero_field(&xs, &ys, format!("dx/dt: {err}")),
    };
    let fy = match compile(&spec.fy, &["X", "Y"]) {
        Ok(p) => p,
        Err(err) => return zero_field(&xs, &ys, format!("dy/dt: {err}")),
    };

    let mut arrows = Vec::with_capacity(n * n);
    let mut stack = Vec::with_capacity(16);
    let mut mag_min = f64::INFINITY;
    let mut mag_max = f64::NEG_INFINITY;

    for &y in &ys {
        for &x in &xs {
            let dx = fx.eval(&[x, y], &mut stack);
            let dy = fy.eval(&[x, y], &mut stack);
            if !dx.is_finite() || !dy.is_finite() {
                return zero_field(
                    &xs,
                    &ys,
                    format!("non-finite value at ({x:.2}, {y:.2})"),
                );
            }
            let arrow = Arrow { x, y, dx, dy };
            let mag = arrow.magnitude();
            mag_min = mag_min.min(mag);
            mag_max = mag_max.max(mag);
            arrows.push(arrow);
        }
    }

    VectorField {
        arrows,
        magnitude_min: mag_min,
        magnitude_max: mag_max,
        status: SolveStatus::Converged,
    }
}

/// Compiles a single formula against the grid variables; exposed so a form
/// layer can validate a field before redrawing.
pub fn check_formula(src: &str) -> Result<Program, crate::expr::ExprError> {
    compile(src, &["X", "Y"])
}
