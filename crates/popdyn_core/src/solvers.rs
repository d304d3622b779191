use crate::grid::{SolveStatus, Solution, TimeGrid, Trajectory};
use crate::traits::{OdeSystem, Scalar, Steppable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classic Runge-Kutta 4th order solver (fixed step).
///
/// Kept alongside the adaptive solver as a cheap cross-check; the dashboard
/// models are all non-stiff and integrate cleanly with either.
pub struct Rk4<T: Scalar> {
    k1: Vec<T>,
    k2: Vec<T>,
    k3: Vec<T>,
    k4: Vec<T>,
    tmp: Vec<T>,
}

impl<T: Scalar> Rk4<T> {
    pub fn new(dim: usize) -> Self {
        let z = T::from_f64(0.0).unwrap();
        Self {
            k1: vec![z; dim],
            k2: vec![z; dim],
            k3: vec![z; dim],
            k4: vec![z; dim],
            tmp: vec![z; dim],
        }
    }
}

impl<T: Scalar> Steppable<T> for Rk4<T> {
    fn step(&mut self, system: &impl OdeSystem<T>, t: &mut T, state: &mut [T], dt: T) {
        let half = T::from_f64(0.5).unwrap();
        let sixth = T::from_f64(1.0 / 6.0).unwrap();
        let two = T::from_f64(2.0).unwrap();

        let t0 = *t;

        // k1 = f(t, y)
        system.apply(t0, state, &mut self.k1);

        // k2 = f(t + dt/2, y + dt*k1/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k1[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k2);

        // k3 = f(t + dt/2, y + dt*k2/2)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k2[i] * half;
        }
        system.apply(t0 + dt * half, &self.tmp, &mut self.k3);

        // k4 = f(t + dt, y + dt*k3)
        for i in 0..state.len() {
            self.tmp[i] = state[i] + dt * self.k3[i];
        }
        system.apply(t0 + dt, &self.tmp, &mut self.k4);

        // y_next = y + dt/6 * (k1 + 2k2 + 2k3 + k4)
        for i in 0..state.len() {
            state[i] = state[i]
                + dt * sixth * (self.k1[i] + two * self.k2[i] + two * self.k3[i] + self.k4[i]);
        }

        *t = t0 + dt;
    }
}

/// Errors the adaptive solver can hit. Callers going through [`integrate`]
/// never see these; they get the constant fallback instead.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SolverError {
    #[error("state became non-finite at t = {t}")]
    NonFiniteState { t: f64 },
    #[error("step size underflow at t = {t}")]
    StepSizeUnderflow { t: f64 },
    #[error("step budget of {max_steps} exhausted at t = {t}")]
    StepBudgetExhausted { max_steps: usize, t: f64 },
    #[error("initial state has dimension {got}, system expects {expected}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// Tolerances and limits for the adaptive solver.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SolverSettings {
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
}

impl Default for SolverSettings {
    fn default() -> Self {
        Self {
            rtol: 1e-6,
            atol: 1e-9,
            max_steps: 100_000,
        }
    }
}

/// Dormand-Prince 5(4) embedded pair with adaptive step-size control.
///
/// The 5th-order result advances the state; the embedded 4th-order result
/// drives the error estimate. Steps are clamped so the solution lands
/// exactly on every requested output time.
pub struct Dopri5 {
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    k5: Vec<f64>,
    k6: Vec<f64>,
    k7: Vec<f64>,
    tmp: Vec<f64>,
    y_next: Vec<f64>,
}

impl Dopri5 {
    pub fn new(dim: usize) -> Self {
        Self {
            k1: vec![0.0; dim],
            k2: vec![0.0; dim],
            k3: vec![0.0; dim],
            k4: vec![0.0; dim],
            k5: vec![0.0; dim],
            k6: vec![0.0; dim],
            k7: vec![0.0; dim],
            tmp: vec![0.0; dim],
            y_next: vec![0.0; dim],
        }
    }

    /// Takes one trial step of size dt from (t, y). Writes the candidate
    /// state into `self.y_next` and returns the scaled error norm
    /// (accept when <= 1).
    fn trial_step(
        &mut self,
        system: &impl OdeSystem<f64>,
        t: f64,
        y: &[f64],
        dt: f64,
        settings: &SolverSettings,
    ) -> f64 {
        // Dormand-Prince coefficients
        let c2 = 1.0 / 5.0;
        let c3 = 3.0 / 10.0;
        let c4 = 4.0 / 5.0;
        let c5 = 8.0 / 9.0;

        let a21 = 1.0 / 5.0;

        let a31 = 3.0 / 40.0;
        let a32 = 9.0 / 40.0;

        let a41 = 44.0 / 45.0;
        let a42 = -56.0 / 15.0;
        let a43 = 32.0 / 9.0;

        let a51 = 19372.0 / 6561.0;
        let a52 = -25360.0 / 2187.0;
        let a53 = 64448.0 / 6561.0;
        let a54 = -212.0 / 729.0;

        let a61 = 9017.0 / 3168.0;
        let a62 = -355.0 / 33.0;
        let a63 = 46732.0 / 5247.0;
        let a64 = 49.0 / 176.0;
        let a65 = -5103.0 / 18656.0;

        // b coefficients (5th order), also row 7 of the tableau
        let b1 = 35.0 / 384.0;
        let b3 = 500.0 / 1113.0;
        let b4 = 125.0 / 192.0;
        let b5 = -2187.0 / 6784.0;
        let b6 = 11.0 / 84.0;

        // b - b_hat: difference against the embedded 4th-order weights
        let e1 = b1 - 5179.0 / 57600.0;
        let e3 = b3 - 7571.0 / 16695.0;
        let e4 = b4 - 393.0 / 640.0;
        let e5 = b5 + 92097.0 / 339200.0;
        let e6 = b6 - 187.0 / 2100.0;
        let e7 = -1.0 / 40.0;

        let n = y.len();

        system.apply(t, y, &mut self.k1);

        for i in 0..n {
            self.tmp[i] = y[i] + dt * (a21 * self.k1[i]);
        }
        system.apply(t + c2 * dt, &self.tmp, &mut self.k2);

        for i in 0..n {
            self.tmp[i] = y[i] + dt * (a31 * self.k1[i] + a32 * self.k2[i]);
        }
        system.apply(t + c3 * dt, &self.tmp, &mut self.k3);

        for i in 0..n {
            self.tmp[i] = y[i] + dt * (a41 * self.k1[i] + a42 * self.k2[i] + a43 * self.k3[i]);
        }
        system.apply(t + c4 * dt, &self.tmp, &mut self.k4);

        for i in 0..n {
            self.tmp[i] = y[i]
                + dt * (a51 * self.k1[i] + a52 * self.k2[i] + a53 * self.k3[i] + a54 * self.k4[i]);
        }
        system.apply(t + c5 * dt, &self.tmp, &mut self.k5);

        for i in 0..n {
            self.tmp[i] = y[i]
                + dt * (a61 * self.k1[i]
                    + a62 * self.k2[i]
                    + a63 * self.k3[i]
                    + a64 * self.k4[i]
                    + a65 * self.k5[i]);
        }
        system.apply(t + dt, &self.tmp, &mut self.k6);

        // 5th-order solution
        for i in 0..n {
            self.y_next[i] = y[i]
                + dt * (b1 * self.k1[i]
                    + b3 * self.k3[i]
                    + b4 * self.k4[i]
                    + b5 * self.k5[i]
                    + b6 * self.k6[i]);
        }
        system.apply(t + dt, &self.y_next, &mut self.k7);

        // Scaled RMS error norm over all components
        let mut err_sq = 0.0;
        for i in 0..n {
            let err_i = dt
                * (e1 * self.k1[i]
                    + e3 * self.k3[i]
                    + e4 * self.k4[i]
                    + e5 * self.k5[i]
                    + e6 * self.k6[i]
                    + e7 * self.k7[i]);
            let scale = settings.atol + settings.rtol * y[i].abs().max(self.y_next[i].abs());
            let ratio = err_i / scale;
            err_sq += ratio * ratio;
        }
        (err_sq / n as f64).sqrt()
    }

    /// Integrates from `y0` and records the state at each time in `t_out`.
    /// `t_out` must be strictly increasing and start at the initial time.
    ///
    /// Returns one state vector per output time, or the first error hit.
    pub fn solve(
        &mut self,
        system: &impl OdeSystem<f64>,
        y0: &[f64],
        t_out: &[f64],
        settings: &SolverSettings,
    ) -> Result<Vec<Vec<f64>>, SolverError> {
        if y0.len() != system.dimension() {
            return Err(SolverError::DimensionMismatch {
                expected: system.dimension(),
                got: y0.len(),
            });
        }

        let mut output = Vec::with_capacity(t_out.len());
        if t_out.is_empty() {
            return Ok(output);
        }

        let mut t = t_out[0];
        let mut y = y0.to_vec();
        output.push(y.clone());

        let span = t_out[t_out.len() - 1] - t;
        let min_dt = (span.abs() * 1e-14).max(f64::MIN_POSITIVE * 16.0);
        let mut h = (span / 100.0).max(min_dt);
        let mut steps = 0usize;

        for &target in &t_out[1..] {
            while t < target {
                if steps >= settings.max_steps {
                    return Err(SolverError::StepBudgetExhausted {
                        max_steps: settings.max_steps,
                        t,
                    });
                }
                steps += 1;

                // Clamp so the step lands exactly on the output point, but
                // do not let a clamped step shrink the controller's h.
                let boundary_limited = target - t < h;
                let dt = h.min(target - t);
                let err = self.trial_step(system, t, &y, dt, settings);

                if !err.is_finite() {
                    return Err(SolverError::NonFiniteState { t });
                }

                if err <= 1.0 {
                    t += dt;
                    y.copy_from_slice(&self.y_next);
                    if y.iter().any(|v| !v.is_finite()) {
                        return Err(SolverError::NonFiniteState { t });
                    }
                    if !boundary_limited {
                        // Standard controller: grow gently, never more than 5x.
                        let factor = if err == 0.0 {
                            5.0
                        } else {
                            (0.9 * err.powf(-0.2)).clamp(0.2, 5.0)
                        };
                        h = (dt * factor).max(min_dt);
                    }
                } else {
                    h = dt * (0.9 * err.powf(-0.2)).clamp(0.1, 1.0);
                    if h < min_dt {
                        return Err(SolverError::StepSizeUnderflow { t });
                    }
                }
            }
            output.push(y.clone());
        }

        Ok(output)
    }
}

/// Integrates a system over a time grid and packages the result per
/// compartment. Never fails: if the solver errors out, every compartment
/// comes back as a flat line at its initial value and the status carries
/// the message (spuriously flat output is otherwise indistinguishable from
/// a genuine equilibrium).
pub fn integrate(
    system: &impl OdeSystem<f64>,
    y0: &[f64],
    names: &[&str],
    grid: &TimeGrid,
    settings: &SolverSettings,
) -> Solution {
    debug_assert_eq!(names.len(), y0.len());
    let t = grid.sample();
    let mut dopri = Dopri5::new(system.dimension());

    match dopri.solve(system, y0, &t, settings) {
        Ok(states) => {
            let trajectories = names
                .iter()
                .enumerate()
                .map(|(i, name)| {
                    Trajectory::new(*name, states.iter().map(|row| row[i]).collect())
                })
                .collect();
            Solution {
                t,
                trajectories,
                status: SolveStatus::Converged,
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "integration failed, returning constant fallback");
            let trajectories = names
                .iter()
                .zip(y0)
                .map(|(name, &v)| Trajectory::constant(*name, v, t.len()))
                .collect();
            Solution {
                t,
                trajectories,
                status: SolveStatus::Degraded {
                    message: err.to_string(),
                },
            }
        }
    }
}
