use crate::grid::{Solution, TimeGrid, Trajectory};
use crate::solvers::{integrate, SolverSettings};
use crate::traits::OdeSystem;
use serde::{Deserialize, Serialize};

/// Classic SIR model.
///
///   dS = -beta S I / N
///   dI =  beta S I / N - gamma I
///   dR =  gamma I
///
/// S + I + R is conserved. Defaults are the epidemiology page's values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SirParams {
    /// Total population N.
    pub n: f64,
    /// Transmission rate.
    pub beta: f64,
    /// Recovery rate.
    pub gamma: f64,
    /// Initially infected; S(0) = N - I(0) - R(0).
    pub i0: f64,
    pub r0: f64,
}

impl Default for SirParams {
    fn default() -> Self {
        Self {
            n: 1000.0,
            beta: 0.3,
            gamma: 0.1,
            i0: 1.0,
            r0: 0.0,
        }
    }
}

impl SirParams {
    pub fn initial_state(&self) -> [f64; 3] {
        [self.n - self.i0 - self.r0, self.i0, self.r0]
    }

    /// The page's default horizon: 100 days, 200 samples.
    pub fn default_grid() -> TimeGrid {
        TimeGrid::new(100.0, 200)
    }

    pub fn simulate(&self, grid: &TimeGrid, settings: &SolverSettings) -> Solution {
        integrate(self, &self.initial_state(), &["S", "I", "R"], grid, settings)
    }
}

impl OdeSystem<f64> for SirParams {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, i) = (x[0], x[1]);
        let infection = self.beta * s * i / self.n;
        out[0] = -infection;
        out[1] = infection - self.gamma * i;
        out[2] = self.gamma * i;
    }
}

/// SEIR model with an incubation compartment.
///
///   dS = -beta S I / N
///   dE =  beta S I / N - sigma E
///   dI =  sigma E - gamma I
///   dR =  gamma I
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeirParams {
    pub n: f64,
    pub beta: f64,
    /// Incubation rate (E -> I).
    pub sigma: f64,
    pub gamma: f64,
    /// Initially exposed; S(0) = N - E(0) - I(0).
    pub e0: f64,
    pub i0: f64,
}

impl Default for SeirParams {
    fn default() -> Self {
        Self {
            n: 1000.0,
            beta: 0.3,
            sigma: 0.2,
            gamma: 0.1,
            e0: 0.0,
            i0: 1.0,
        }
    }
}

impl SeirParams {
    pub fn initial_state(&self) -> [f64; 4] {
        [self.n - self.e0 - self.i0, self.e0, self.i0, 0.0]
    }

    /// The page's default horizon: 160 days, 300 samples.
    pub fn default_grid() -> TimeGrid {
        TimeGrid::new(160.0, 300)
    }

    pub fn simulate(&self, grid: &TimeGrid, settings: &SolverSettings) -> Solution {
        integrate(
            self,
            &self.initial_state(),
            &["S", "E", "I", "R"],
            grid,
            settings,
        )
    }
}

impl OdeSystem<f64> for SeirParams {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, e, i) = (x[0], x[1], x[2]);
        let infection = self.beta * s * i / self.n;
        out[0] = -infection;
        out[1] = infection - self.sigma * e;
        out[2] = self.sigma * e - self.gamma * i;
        out[3] = self.gamma * i;
    }
}

/// SIR variant for technology adoption: an external-adoption term alpha*S
/// moves people from S straight into I, independent of contact.
///
///   dS = -beta S I / N - alpha S
///   dI =  beta S I / N + alpha S - gamma I
///   dR =  gamma I
///
/// Defaults are the app-adoption project's cohort of 266 students.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AdoptionSirParams {
    pub n: f64,
    pub s0: f64,
    pub i0: f64,
    pub r0: f64,
    /// Word-of-mouth contact rate.
    pub beta: f64,
    /// Drop-out rate.
    pub gamma: f64,
    /// External adoption rate (ads, mandates).
    pub alpha: f64,
}

impl Default for AdoptionSirParams {
    fn default() -> Self {
        Self {
            n: 266.0,
            s0: 261.0,
            i0: 5.0,
            r0: 0.0,
            beta: 0.35,
            gamma: 0.08,
            alpha: 0.01,
        }
    }
}

impl AdoptionSirParams {
    pub fn initial_state(&self) -> [f64; 3] {
        [self.s0, self.i0, self.r0]
    }

    /// The project page's default horizon: 120 days, 1000 samples.
    pub fn default_grid() -> TimeGrid {
        TimeGrid::new(120.0, 1000)
    }

    pub fn simulate(&self, grid: &TimeGrid, settings: &SolverSettings) -> Solution {
        integrate(self, &self.initial_state(), &["S", "I", "R"], grid, settings)
    }

    /// Re-simulates once per beta value, in the given order.
    pub fn sweep_beta(
        &self,
        betas: &[f64],
        grid: &TimeGrid,
        settings: &SolverSettings,
    ) -> Vec<Solution> {
        betas
            .iter()
            .map(|&beta| Self { beta, ..*self }.simulate(grid, settings))
            .collect()
    }

    /// Re-simulates once per gamma value, in the given order.
    pub fn sweep_gamma(
        &self,
        gammas: &[f64],
        grid: &TimeGrid,
        settings: &SolverSettings,
    ) -> Vec<Solution> {
        gammas
            .iter()
            .map(|&gamma| Self { gamma, ..*self }.simulate(grid, settings))
            .collect()
    }
}

impl OdeSystem<f64> for AdoptionSirParams {
    fn dimension(&self) -> usize {
        3
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, i) = (x[0], x[1]);
        let contact = self.beta * s * i / self.n;
        let external = self.alpha * s;
        out[0] = -contact - external;
        out[1] = contact + external - self.gamma * i;
        out[2] = self.gamma * i;
    }
}

/// Normalized SEIR with vital dynamics and vaccination, from the Indonesia
/// COVID article the course reproduces:
///
///   dS = mu - (alpha I + mu + nu) S
///   dE = alpha I S - (beta + mu) E
///   dI = beta E - (mu_i + delta + mu) I
///   dR = delta I + nu S - mu R
///
/// S, E, I, R are fractions of N; initial counts are normalized on entry
/// and trajectories are rescaled back to people. Population is NOT
/// conserved here (births, deaths, vaccination), and the article's
/// alpha = 0.62e-8 sits oddly against per-person initial conditions — a
/// unit inconsistency in the source material, reproduced as-is so the
/// plotted output matches the coursework.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VitalSeirParams {
    /// Total population N (people).
    pub n: f64,
    /// Initial counts, in people (Table 2 of the article).
    pub s0: f64,
    pub e0: f64,
    pub i0: f64,
    pub r0: f64,
    /// Birth/natural-death rate.
    pub mu: f64,
    /// Contagion rate S -> E.
    pub alpha: f64,
    /// Progression rate E -> I (the article's swept parameter).
    pub beta: f64,
    /// Recovery rate I -> R.
    pub delta: f64,
    /// Disease-induced mortality.
    pub mu_i: f64,
    /// Vaccination rate S -> R.
    pub nu: f64,
}

impl Default for VitalSeirParams {
    fn default() -> Self {
        Self {
            n: 269_600_000.0,
            s0: 37_538.0,
            e0: 13_923.0,
            i0: 23_191.0,
            r0: 13_213.0,
            mu: 6.25e-3,
            alpha: 0.62e-8,
            beta: 1.0 / 3.0,
            delta: 6.667e-4,
            mu_i: 7.344e-7,
            nu: 0.50,
        }
    }
}

impl VitalSeirParams {
    /// The article page's default beta comparison: 1/3, 1/7, 1/14.
    pub fn default_betas() -> [f64; 3] {
        [1.0 / 3.0, 1.0 / 7.0, 1.0 / 14.0]
    }

    /// The article page's default horizon: 60 days, 1500 samples.
    pub fn default_grid() -> TimeGrid {
        TimeGrid::new(60.0, 1500)
    }

    /// Initial state as fractions of N.
    pub fn initial_state(&self) -> [f64; 4] {
        [
            self.s0 / self.n,
            self.e0 / self.n,
            self.i0 / self.n,
            self.r0 / self.n,
        ]
    }

    /// Integrates the normalized system and rescales every compartment back
    /// to people.
    pub fn simulate(&self, grid: &TimeGrid, settings: &SolverSettings) -> Solution {
        let mut solution = integrate(
            self,
            &self.initial_state(),
            &["S", "E", "I", "R"],
            grid,
            settings,
        );
        for Trajectory { values, .. } in &mut solution.trajectories {
            for v in values {
                *v *= self.n;
            }
        }
        solution
    }

    /// One solution per beta, output order matching `betas`.
    pub fn sweep_beta(
        &self,
        betas: &[f64],
        grid: &TimeGrid,
        settings: &SolverSettings,
    ) -> Vec<Solution> {
        betas
            .iter()
            .map(|&beta| Self { beta, ..*self }.simulate(grid, settings))
            .collect()
    }
}

impl OdeSystem<f64> for VitalSeirParams {
    fn dimension(&self) -> usize {
        4
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let (s, e, i, r) = (x[0], x[1], x[2], x[3]);
        out[0] = self.mu - (self.alpha * i + self.mu + self.nu) * s;
        out[1] = self.alpha * i * s - (self.beta + self.mu) * e;
        out[2] = self.beta * e - (self.mu_i + self.delta + self.mu) * i;
        out[3] = self.delta * i + self.nu * s - self.mu * r;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::SolveStatus;

    const SETTINGS: SolverSettings = SolverSettings {
        rtol: 1e-8,
        atol: 1e-10,
        max_steps: 100_000,
    };

    #[test]
    fn sir_conserves_population() {
        let params = SirParams::default();
        let solution = params.simulate(&SirParams::default_grid(), &SETTINGS);
        assert_eq!(solution.status, SolveStatus::Converged);

        let s = &solution.trajectory("S").unwrap().values;
        let i = &solution.trajectory("I").unwrap().values;
        let r = &solution.trajectory("R").unwrap().values;

        for idx in 0..s.len() {
            let total = s[idx] + i[idx] + r[idx];
            assert!(
                (total - 1000.0).abs() / 1000.0 < 1e-3,
                "t index {idx}: total {total}"
            );
        }
    }

    #[test]
    fn sir_epidemic_rises_then_falls_once() {
        let params = SirParams::default();
        let solution = params.simulate(&SirParams::default_grid(), &SETTINGS);
        let i = &solution.trajectory("I").unwrap().values;

        let peak = i
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(idx, _)| idx)
            .unwrap();
        assert!(peak > 0 && peak < i.len() - 1, "peak at boundary: {peak}");
        assert!(i[peak] > 100.0);

        // Single peak: rising before it, falling after it.
        for w in i[..peak].windows(2) {
            assert!(w[1] >= w[0] - 1e-6);
        }
        for w in i[peak..].windows(2) {
            assert!(w[1] <= w[0] + 1e-6);
        }
    }

    #[test]
    fn seir_initial_conditions_round_trip() {
        let params = SeirParams {
            e0: 7.0,
            i0: 3.0,
            ..Default::default()
        };
        let solution = params.simulate(&SeirParams::default_grid(), &SETTINGS);

        assert_eq!(solution.trajectory("S").unwrap().values[0], 990.0);
        assert_eq!(solution.trajectory("E").unwrap().values[0], 7.0);
        assert_eq!(solution.trajectory("I").unwrap().values[0], 3.0);
        assert_eq!(solution.trajectory("R").unwrap().values[0], 0.0);
    }

    #[test]
    fn adoption_sir_with_zero_alpha_matches_plain_sir() {
        let adoption = AdoptionSirParams {
            n: 1000.0,
            s0: 999.0,
            i0: 1.0,
            r0: 0.0,
            beta: 0.3,
            gamma: 0.1,
            alpha: 0.0,
        };
        let sir = SirParams::default();
        let grid = TimeGrid::new(100.0, 200);

        let a = adoption.simulate(&grid, &SETTINGS);
        let b = sir.simulate(&grid, &SETTINGS);

        let ia = &a.trajectory("I").unwrap().values;
        let ib = &b.trajectory("I").unwrap().values;
        for (x, y) in ia.iter().zip(ib) {
            assert!((x - y).abs() < 1e-4);
        }
    }

    #[test]
    fn adoption_term_drains_susceptibles_without_contact() {
        // beta = 0: adoption happens purely through the alpha channel.
        let params = AdoptionSirParams {
            beta: 0.0,
            gamma: 0.0,
            alpha: 0.05,
            ..Default::default()
        };
        let solution = params.simulate(&AdoptionSirParams::default_grid(), &SETTINGS);
        let s = &solution.trajectory("S").unwrap().values;
        let i = &solution.trajectory("I").unwrap().values;

        // S decays exponentially at rate alpha, I picks up the difference.
        let t_end: f64 = 120.0;
        let expected_s = 261.0 * (-0.05 * t_end).exp();
        assert!((s.last().unwrap() - expected_s).abs() < 1e-3);
        assert!(*i.last().unwrap() > 260.0);
    }

    #[test]
    fn sweep_order_matches_input_order() {
        let params = AdoptionSirParams::default();
        let grid = TimeGrid::new(60.0, 100);
        let betas = [0.50, 0.20, 0.35];
        let sweep = params.sweep_beta(&betas, &grid, &SETTINGS);
        assert_eq!(sweep.len(), 3);

        // Higher beta means an earlier, higher adoption peak; check that the
        // results line up with the (deliberately unsorted) input order.
        let peak = |sol: &Solution| {
            sol.trajectory("I")
                .unwrap()
                .values
                .iter()
                .cloned()
                .fold(f64::MIN, f64::max)
        };
        assert!(peak(&sweep[0]) > peak(&sweep[2]));
        assert!(peak(&sweep[2]) > peak(&sweep[1]));
    }

    #[test]
    fn vital_seir_rescales_to_people() {
        let params = VitalSeirParams::default();
        let solution = params.simulate(&VitalSeirParams::default_grid(), &SETTINGS);
        assert_eq!(solution.status, SolveStatus::Converged);

        let e = &solution.trajectory("E").unwrap().values;
        let i = &solution.trajectory("I").unwrap().values;
        assert!((e[0] - 13_923.0).abs() < 1e-6);
        assert!((i[0] - 23_191.0).abs() < 1e-6);
        assert!(e.iter().all(|v| v.is_finite()));
        assert!(i.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn vital_seir_beta_sweep_produces_distinct_curves() {
        let params = VitalSeirParams::default();
        let grid = TimeGrid::new(60.0, 200);
        let sweep = params.sweep_beta(&VitalSeirParams::default_betas(), &grid, &SETTINGS);
        assert_eq!(sweep.len(), 3);

        // Faster progression (larger beta) drains E faster.
        let e_end = |sol: &Solution| *sol.trajectory("E").unwrap().values.last().unwrap();
        assert!(e_end(&sweep[0]) < e_end(&sweep[1]));
        assert!(e_end(&sweep[1]) < e_end(&sweep[2]));
    }
}
