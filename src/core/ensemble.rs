//! Kuramoto oscillator ensemble.
//!
//! Integrates N coupled phase oscillators with classical fixed-step RK4:
//!
//! ```text
//! dtheta_i/dt = omega_i + eta_i + (K/N) sum_{j != i} S_ij sin(theta_j - theta_i - alpha)
//! ```
//!
//! `S_ij` comes from an optional `Topology`; without one, coupling is uniform
//! all-to-all with weight 1. Phases are wrapped into (-pi, pi] after every
//! step. The global order parameter r in [0, 1] measures synchrony.

use std::f64::consts::PI;

use crate::error::EngineError;
use crate::history::{EvictionPolicy, History, DEFAULT_APPEND_CAP};
use crate::prng::Prng;
use crate::topology::Topology;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnsembleConfig {
    /// Oscillator count. Changing it later reinitializes the whole ensemble.
    pub n: usize,
    /// Coupling strength K.
    pub coupling: f64,
    /// Integration step.
    pub dt: f64,
    /// Noise amplitude; the per-evaluation noise std is `noise_level * 0.1`.
    pub noise_level: f64,
    /// Phase lag alpha inside the coupling sine.
    pub phase_lag: f64,
    /// History cap (oldest entries evicted past it).
    pub history_cap: usize,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            n: 50,
            coupling: 1.0,
            dt: 0.05,
            noise_level: 0.0,
            phase_lag: 0.0,
            history_cap: DEFAULT_APPEND_CAP,
            seed: None,
        }
    }
}

impl EnsembleConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.n == 0 {
            return Err(EngineError::Config("oscillator count must be > 0".into()));
        }
        if !(self.dt > 0.0) {
            return Err(EngineError::Config("dt must be > 0".into()));
        }
        Ok(())
    }
}

/// Scalar parameter update. Every field optional; absent fields keep their
/// current value. A present `n` that differs from the current count is
/// destructive: state is reallocated, frequencies redrawn, history cleared
/// and any installed topology dropped.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ParamUpdate {
    pub n: Option<usize>,
    pub coupling: Option<f64>,
    pub noise_level: Option<f64>,
    pub phase_lag: Option<f64>,
    pub dt: Option<f64>,
}

/// One history entry per step.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnsembleEntry {
    pub time: f64,
    pub order_parameter: f64,
    pub phases: Vec<f64>,
}

/// Defensive state snapshot for rendering/persistence collaborators.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EnsembleSnapshot {
    pub phases: Vec<f64>,
    pub frequencies: Vec<f64>,
    pub time: f64,
    pub order_parameter: f64,
}

pub struct KuramotoEnsemble {
    cfg: EnsembleConfig,
    theta: Vec<f64>,
    omega: Vec<f64>,
    network: Option<Topology>,
    time: f64,
    history: History<EnsembleEntry>,
    rng: Prng,
}

impl KuramotoEnsemble {
    pub fn new(cfg: EnsembleConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let rng = Prng::new(cfg.seed.unwrap_or(1));
        let mut ens = Self {
            theta: vec![0.0; cfg.n],
            omega: vec![0.0; cfg.n],
            network: None,
            time: 0.0,
            history: History::new(EvictionPolicy::BoundedAppend {
                cap: cfg.history_cap,
            }),
            cfg,
            rng,
        };
        ens.initialize();
        Ok(ens)
    }

    /// Re-randomize phases and natural frequencies, reset the clock and drop
    /// history. Callable repeatedly.
    pub fn initialize(&mut self) {
        for theta in &mut self.theta {
            // PI - u * 2PI lands exactly in (-pi, pi].
            *theta = PI - self.rng.next_f64() * 2.0 * PI;
        }
        for omega in &mut self.omega {
            *omega = self.rng.next_normal();
        }
        self.time = 0.0;
        self.history.clear();
    }

    /// Advance the system by one dt with classical RK4 (stage weights
    /// (1,2,2,1)/6), then wrap phases and append one history entry.
    pub fn step(&mut self) {
        let n = self.cfg.n;
        let dt = self.cfg.dt;

        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut stage = self.theta.clone();

        self.derivative(&stage, &mut k1);
        for i in 0..n {
            stage[i] = self.theta[i] + 0.5 * dt * k1[i];
        }
        self.derivative(&stage, &mut k2);
        for i in 0..n {
            stage[i] = self.theta[i] + 0.5 * dt * k2[i];
        }
        self.derivative(&stage, &mut k3);
        for i in 0..n {
            stage[i] = self.theta[i] + dt * k3[i];
        }
        self.derivative(&stage, &mut k4);

        for i in 0..n {
            let delta = dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            self.theta[i] = wrap_phase(self.theta[i] + delta);
        }

        self.time += dt;
        let r = self.order_parameter();
        self.history.push(EnsembleEntry {
            time: self.time,
            order_parameter: r,
            phases: self.theta.clone(),
        });
    }

    /// Phase velocities for a given phase vector. Noise is drawn fresh on
    /// every evaluation, so each RK4 stage sees an independent perturbation.
    fn derivative(&mut self, theta: &[f64], dtheta: &mut [f64]) {
        let n = theta.len();
        let k_over_n = self.cfg.coupling / n as f64;
        let alpha = self.cfg.phase_lag;

        let noise: Option<Vec<f64>> = if self.cfg.noise_level > 0.0 {
            let std = self.cfg.noise_level * 0.1;
            Some((0..n).map(|_| self.rng.next_normal() * std).collect())
        } else {
            None
        };

        let omega = &self.omega;
        let network = &self.network;
        let eval = |i: usize| -> f64 {
            let mut sum = 0.0;
            match network {
                Some(t) => {
                    for j in 0..n {
                        if j == i {
                            continue;
                        }
                        let w = t.weight(i, j);
                        if w != 0.0 {
                            sum += w * (theta[j] - theta[i] - alpha).sin();
                        }
                    }
                }
                None => {
                    for j in 0..n {
                        if j == i {
                            continue;
                        }
                        sum += (theta[j] - theta[i] - alpha).sin();
                    }
                }
            }
            let eta = noise.as_ref().map_or(0.0, |v| v[i]);
            omega[i] + eta + k_over_n * sum
        };

        #[cfg(feature = "parallel")]
        {
            use rayon::prelude::*;
            dtheta
                .par_iter_mut()
                .enumerate()
                .for_each(|(i, d)| *d = eval(i));
        }
        #[cfg(not(feature = "parallel"))]
        for (i, d) in dtheta.iter_mut().enumerate() {
            *d = eval(i);
        }
    }

    /// Global order parameter r = |mean_i e^{i theta_i}|, recomputed fresh.
    pub fn order_parameter(&self) -> f64 {
        order_parameter_of(&self.theta)
    }

    /// Merge a subset of scalar parameters in place. A changed `n`
    /// reinitializes the ensemble (see `ParamUpdate`). Validation happens
    /// before any mutation.
    pub fn update_parameters(&mut self, update: ParamUpdate) -> Result<(), EngineError> {
        let mut next = self.cfg;
        if let Some(n) = update.n {
            next.n = n;
        }
        if let Some(k) = update.coupling {
            next.coupling = k;
        }
        if let Some(noise) = update.noise_level {
            next.noise_level = noise;
        }
        if let Some(alpha) = update.phase_lag {
            next.phase_lag = alpha;
        }
        if let Some(dt) = update.dt {
            next.dt = dt;
        }
        next.validate()?;

        let resized = next.n != self.cfg.n;
        self.cfg = next;
        if resized {
            self.theta = vec![0.0; self.cfg.n];
            self.omega = vec![0.0; self.cfg.n];
            self.network = None;
            self.initialize();
        }
        Ok(())
    }

    /// Swap the coupling source without touching phases.
    pub fn set_network(&mut self, topology: Topology) -> Result<(), EngineError> {
        if topology.n() != self.cfg.n {
            return Err(EngineError::TopologyMismatch {
                expected: self.cfg.n,
                got: topology.n(),
            });
        }
        self.network = Some(topology);
        Ok(())
    }

    /// Back to uniform all-to-all coupling.
    pub fn clear_network(&mut self) {
        self.network = None;
    }

    pub fn network(&self) -> Option<&Topology> {
        self.network.as_ref()
    }

    pub fn config(&self) -> &EnsembleConfig {
        &self.cfg
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    pub fn snapshot(&self) -> EnsembleSnapshot {
        EnsembleSnapshot {
            phases: self.theta.clone(),
            frequencies: self.omega.clone(),
            time: self.time,
            order_parameter: self.order_parameter(),
        }
    }

    pub fn history(&self) -> &History<EnsembleEntry> {
        &self.history
    }

    /// (times, order parameters) extracted from history, in step order.
    pub fn order_series(&self) -> (Vec<f64>, Vec<f64>) {
        let times = self.history.iter().map(|e| e.time).collect();
        let order = self.history.iter().map(|e| e.order_parameter).collect();
        (times, order)
    }

    /// Summarize the run so far.
    pub fn run_summary(&self) -> crate::metrics::RunSummary {
        let (times, order) = self.order_series();
        crate::metrics::summarize(&times, &order)
    }
}

/// Wrap into (-pi, pi] by repeated +-2pi adjustment; handles arbitrarily
/// large excursions, not just single wraps.
pub(crate) fn wrap_phase(mut x: f64) -> f64 {
    let two_pi = 2.0 * PI;
    while x > PI {
        x -= two_pi;
    }
    while x <= -PI {
        x += two_pi;
    }
    x
}

pub(crate) fn order_parameter_of(theta: &[f64]) -> f64 {
    if theta.is_empty() {
        return 0.0;
    }
    let n = theta.len() as f64;
    let cos_mean = theta.iter().map(|t| t.cos()).sum::<f64>() / n;
    let sin_mean = theta.iter().map(|t| t.sin()).sum::<f64>() / n;
    (cos_mean * cos_mean + sin_mean * sin_mean).sqrt()
}
