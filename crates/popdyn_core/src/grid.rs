use serde::{Deserialize, Serialize};

/// An evenly spaced time grid on [0, t_max].
///
/// Built fresh from form input on every recomputation. Out-of-domain input
/// is clamped rather than rejected: the dashboard always draws something.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    pub t_max: f64,
    pub points: usize,
}

impl TimeGrid {
    pub const MIN_T_MAX: f64 = 1.0;
    pub const MIN_POINTS: usize = 10;

    /// Creates a grid, clamping t_max to at least 1.0 and the point count
    /// to at least 10.
    pub fn new(t_max: f64, points: usize) -> Self {
        let t_max = if t_max.is_finite() {
            t_max.max(Self::MIN_T_MAX)
        } else {
            Self::MIN_T_MAX
        };
        Self {
            t_max,
            points: points.max(Self::MIN_POINTS),
        }
    }

    pub fn len(&self) -> usize {
        self.points
    }

    pub fn is_empty(&self) -> bool {
        self.points == 0
    }

    /// Materializes the grid: `points` values from 0 to t_max inclusive.
    pub fn sample(&self) -> Vec<f64> {
        let n = self.points;
        let step = self.t_max / (n - 1) as f64;
        (0..n).map(|i| i as f64 * step).collect()
    }
}

impl Default for TimeGrid {
    fn default() -> Self {
        Self::new(100.0, 200)
    }
}

/// One named compartment curve, aligned index-for-index with its grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub name: String,
    pub values: Vec<f64>,
}

impl Trajectory {
    pub fn new(name: impl Into<String>, values: Vec<f64>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }

    /// A flat line at `value`, used when integration degrades.
    pub fn constant(name: impl Into<String>, value: f64, len: usize) -> Self {
        Self::new(name, vec![value; len])
    }
}

/// Whether a solution came out of the solver or from the constant fallback.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SolveStatus {
    Converged,
    /// Integration failed; the series are flat lines at the initial values.
    Degraded { message: String },
}

impl SolveStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SolveStatus::Degraded { .. })
    }
}

/// A full model evaluation: time samples plus one trajectory per compartment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub t: Vec<f64>,
    pub trajectories: Vec<Trajectory>,
    pub status: SolveStatus,
}

impl Solution {
    /// Looks a compartment up by name.
    pub fn trajectory(&self, name: &str) -> Option<&Trajectory> {
        self.trajectories.iter().find(|tr| tr.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_spans_zero_to_t_max() {
        let grid = TimeGrid::new(100.0, 11);
        let t = grid.sample();
        assert_eq!(t.len(), 11);
        assert_eq!(t[0], 0.0);
        assert!((t[10] - 100.0).abs() < 1e-12);
        assert!((t[5] - 50.0).abs() < 1e-12);
    }

    #[test]
    fn degenerate_input_is_clamped() {
        let grid = TimeGrid::new(0.0, 3);
        assert_eq!(grid.t_max, 1.0);
        assert_eq!(grid.points, 10);

        let grid = TimeGrid::new(f64::NAN, 0);
        assert_eq!(grid.t_max, 1.0);
        assert_eq!(grid.points, 10);
    }

    #[test]
    fn trajectory_lookup_by_name() {
        let sol = Solution {
            t: vec![0.0, 1.0],
            trajectories: vec![
                Trajectory::new("S", vec![9.0, 8.0]),
                Trajectory::new("I", vec![1.0, 2.0]),
            ],
            status: SolveStatus::Converged,
        };
        assert_eq!(sol.trajectory("I").unwrap().values, vec![1.0, 2.0]);
        assert!(sol.trajectory("E").is_none());
    }
}
