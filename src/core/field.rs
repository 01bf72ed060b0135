//! Spatial attention field.
//!
//! A grid_size x grid_size lattice of phase oscillators (flat index
//! `idx = row * grid_size + col`) coupled through two gated terms:
//!
//! ```text
//! dtheta_i/dt = omega_i + eta_i
//!             + (K/N) * ( K_stim * sum_j w_ij * avg(s_i, s_j)    * sin(theta_j - theta_i - alpha)
//!                       + K_feat * sum_j w_ij * cos_sim(f_i, f_j) * sin(theta_j - theta_i - alpha) )
//! ```
//!
//! where the feature term only includes pairs with cosine similarity > 0.5
//! (hard gate). `w_ij` is a precomputed spatial decay weight
//! `exp(-decay * dist)` within `spatial_range`, unless an explicit topology
//! override is installed. Stimulus and feature fields are re-projected from
//! the moving stimulus objects once per step and frozen across the four RK4
//! stage evaluations; object positions advance once per step, not per stage.
//!
//! The per-cell attention map is the local order parameter over spatial
//! neighbors. It always uses the spatial weight support, even when an
//! explicit topology override drives the coupling.

use std::f64::consts::PI;

use crate::ensemble::{order_parameter_of, wrap_phase};
use crate::error::EngineError;
use crate::history::{EvictionPolicy, History, DEFAULT_RING_CAP};
use crate::prng::Prng;
use crate::topology::Topology;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Std of per-cell natural frequencies. Kept narrow so a unit-intensity
/// stimulus can phase-lock its neighborhood at the documented defaults: with
/// K/N normalization over grid_size^2 cells the stimulus channel delivers an
/// effective coupling of order 0.1-0.4 inside the stimulus disc, which must
/// sit well above the locking threshold (~1.6x this value) out to roughly
/// twice the stimulus radius.
const CELL_OMEGA_STD: f64 = 0.02;

/// Grid-edge margin (cells) at which moving objects bounce.
const BOUNCE_PADDING: f64 = 2.0;

/// Velocity factor applied on a bounce (inelastic reflecting wall).
const BOUNCE_DAMPING: f64 = -0.95;

/// Feature blending only happens where the object's activation exceeds this.
const BLEND_ACTIVATION_FLOOR: f64 = 0.1;

/// Hard gate on the feature-similarity coupling term.
const SIMILARITY_GATE: f64 = 0.5;

/// Average local attention above which an object counts as tracked.
const TRACKED_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldConfig {
    /// Lattice side length; the cell count is grid_size^2.
    pub grid_size: usize,
    /// Shared base coupling strength K.
    pub coupling: f64,
    /// Integration step.
    pub dt: f64,
    /// Noise amplitude; per-evaluation noise std is `noise_level * 0.1`.
    pub noise_level: f64,
    /// Phase lag alpha inside the coupling sine.
    pub phase_lag: f64,
    /// Weight of the stimulus-gated coupling term (K_stim).
    pub stimulus_coupling: f64,
    /// Weight of the feature-similarity coupling term (K_feat).
    pub feature_coupling: f64,
    /// Spatial coupling cutoff distance (cells).
    pub spatial_range: f64,
    /// Exponential decay rate of spatial weights.
    pub spatial_decay: f64,
    /// Feature vector dimension per cell.
    pub num_features: usize,
    /// History ring capacity.
    pub history_cap: usize,
    /// Fixed seed for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for FieldConfig {
    fn default() -> Self {
        Self {
            grid_size: 32,
            coupling: 12.0,
            dt: 0.05,
            noise_level: 0.0,
            phase_lag: 0.0,
            stimulus_coupling: 2.0,
            feature_coupling: 0.05,
            spatial_range: 4.0,
            spatial_decay: 0.2,
            num_features: 3,
            history_cap: DEFAULT_RING_CAP,
            seed: None,
        }
    }
}

impl FieldConfig {
    fn validate(&self) -> Result<(), EngineError> {
        if self.grid_size == 0 {
            return Err(EngineError::Config("grid size must be > 0".into()));
        }
        if !(self.dt > 0.0) {
            return Err(EngineError::Config("dt must be > 0".into()));
        }
        if self.num_features == 0 {
            return Err(EngineError::Config("num_features must be > 0".into()));
        }
        Ok(())
    }
}

/// Scalar parameter update for the field. A present `grid_size` that differs
/// from the current one is destructive (full reinitialize); a changed
/// `spatial_range` or `spatial_decay` recomputes the weight tensor.
#[derive(Debug, Clone, Copy, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldParamUpdate {
    pub grid_size: Option<usize>,
    pub coupling: Option<f64>,
    pub dt: Option<f64>,
    pub noise_level: Option<f64>,
    pub phase_lag: Option<f64>,
    pub stimulus_coupling: Option<f64>,
    pub feature_coupling: Option<f64>,
    pub spatial_range: Option<f64>,
    pub spatial_decay: Option<f64>,
}

/// A moving, Gaussian-profile activation source projected onto the grid.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StimulusObject {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub radius: f64,
    pub intensity: f64,
    pub features: Vec<f64>,
}

/// Partial stimulus-object description. Missing fields get defaults (grid
/// center, zero velocity, radius 3, intensity 1, neutral 0.5 features);
/// malformed input is never rejected.
#[derive(Debug, Clone, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StimulusSpec {
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
    pub radius: Option<f64>,
    pub intensity: Option<f64>,
    pub features: Option<Vec<f64>>,
}

/// Per-object detection result derived from the attention map.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrackedObject {
    pub id: u32,
    pub x: f64,
    pub y: f64,
    /// Attention map averaged over the 3x3 neighborhood at the object.
    pub attention: f64,
    pub tracked: bool,
}

/// One ring-history entry per step.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldEntry {
    pub time: f64,
    pub attention_map: Vec<f64>,
    pub tracked: Vec<TrackedObject>,
}

/// Defensive state snapshot for rendering/persistence collaborators.
/// `features` is row-major flat: cell idx spans
/// `features[idx * num_features .. (idx + 1) * num_features]`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct FieldSnapshot {
    pub phases: Vec<f64>,
    pub stimulus: Vec<f64>,
    pub features: Vec<f64>,
    pub num_features: usize,
    pub attention_map: Vec<f64>,
    pub objects: Vec<StimulusObject>,
    pub tracked: Vec<TrackedObject>,
    pub time: f64,
}

/// Which weights drive the coupling sums. The explicit variant overrides the
/// spatial tensor for integration but never for the attention map.
#[derive(Debug, Clone)]
enum CouplingSource {
    Spatial,
    Explicit(Topology),
}

pub struct AttentionField {
    cfg: FieldConfig,
    theta: Vec<f64>,
    omega: Vec<f64>,
    stimulus: Vec<f64>,
    /// Flat cell features, `num_features` per cell.
    features: Vec<f64>,
    /// Dense n*n spatial decay weights; cached until range/decay change.
    spatial_weights: Vec<f64>,
    /// Nonzero-weight support per cell, derived from `spatial_weights`.
    neighbors: Vec<Vec<(u32, f64)>>,
    coupling: CouplingSource,
    objects: Vec<StimulusObject>,
    next_object_id: u32,
    attention_map: Vec<f64>,
    tracked: Vec<TrackedObject>,
    time: f64,
    history: History<FieldEntry>,
    rng: Prng,
    // Per-step pair-term buffers, reused across steps. The stimulus/feature
    // factors are frozen across the four RK4 stages, so they are computed
    // once per step here.
    pair_offsets: Vec<usize>,
    pair_targets: Vec<u32>,
    pair_stim: Vec<f64>,
    pair_feat: Vec<f64>,
}

impl AttentionField {
    pub fn new(cfg: FieldConfig) -> Result<Self, EngineError> {
        cfg.validate()?;
        let n = cfg.grid_size * cfg.grid_size;
        let rng = Prng::new(cfg.seed.unwrap_or(1));
        let mut field = Self {
            theta: vec![0.0; n],
            omega: vec![0.0; n],
            stimulus: vec![0.0; n],
            features: vec![0.5; n * cfg.num_features],
            spatial_weights: Vec::new(),
            neighbors: Vec::new(),
            coupling: CouplingSource::Spatial,
            objects: Vec::new(),
            next_object_id: 0,
            attention_map: vec![0.0; n],
            tracked: Vec::new(),
            time: 0.0,
            history: History::new(EvictionPolicy::FixedRing {
                cap: cfg.history_cap,
            }),
            cfg,
            rng,
            pair_offsets: Vec::new(),
            pair_targets: Vec::new(),
            pair_stim: Vec::new(),
            pair_feat: Vec::new(),
        };
        field.compute_spatial_weights();
        field.initialize();
        Ok(field)
    }

    /// Re-randomize phases and natural frequencies, clear the derived fields
    /// and history, reset the clock. Stimulus objects are kept.
    pub fn initialize(&mut self) {
        let n = self.cell_count();
        for theta in &mut self.theta {
            *theta = PI - self.rng.next_f64() * 2.0 * PI;
        }
        for omega in &mut self.omega {
            *omega = self.rng.next_normal() * CELL_OMEGA_STD;
        }
        self.stimulus.iter_mut().for_each(|s| *s = 0.0);
        self.features.iter_mut().for_each(|f| *f = 0.5);
        self.attention_map = vec![0.0; n];
        self.tracked.clear();
        self.time = 0.0;
        self.history.clear();
    }

    pub fn cell_count(&self) -> usize {
        self.cfg.grid_size * self.cfg.grid_size
    }

    pub fn config(&self) -> &FieldConfig {
        &self.cfg
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Add a moving stimulus; missing spec fields are defaulted. Returns the
    /// object's id.
    pub fn add_stimulus_object(&mut self, spec: StimulusSpec) -> u32 {
        let center = self.cfg.grid_size as f64 / 2.0;
        let nf = self.cfg.num_features;
        let mut features = spec.features.unwrap_or_else(|| vec![0.5; nf]);
        // Wrong-length feature vectors are padded/truncated, never rejected.
        features.resize(nf, 0.5);

        let id = self.next_object_id;
        self.next_object_id += 1;
        self.objects.push(StimulusObject {
            id,
            x: spec.x.unwrap_or(center),
            y: spec.y.unwrap_or(center),
            vx: spec.vx.unwrap_or(0.0),
            vy: spec.vy.unwrap_or(0.0),
            radius: spec.radius.unwrap_or(3.0),
            intensity: spec.intensity.unwrap_or(1.0),
            features,
        });
        id
    }

    pub fn clear_stimulus_objects(&mut self) {
        self.objects.clear();
        self.tracked.clear();
    }

    pub fn objects(&self) -> &[StimulusObject] {
        &self.objects
    }

    /// Install an explicit coupling topology (indexed by flat grid index).
    /// Phases are untouched; the attention map keeps using spatial neighbors.
    pub fn set_network(&mut self, topology: Topology) -> Result<(), EngineError> {
        let n = self.cell_count();
        if topology.n() != n {
            return Err(EngineError::TopologyMismatch {
                expected: n,
                got: topology.n(),
            });
        }
        self.coupling = CouplingSource::Explicit(topology);
        Ok(())
    }

    /// Back to spatial-decay coupling.
    pub fn clear_network(&mut self) {
        self.coupling = CouplingSource::Spatial;
    }

    pub fn network(&self) -> Option<&Topology> {
        match &self.coupling {
            CouplingSource::Spatial => None,
            CouplingSource::Explicit(t) => Some(t),
        }
    }

    /// Merge a subset of scalar parameters. Validates before mutating; see
    /// `FieldParamUpdate` for the destructive cases.
    pub fn update_parameters(&mut self, update: FieldParamUpdate) -> Result<(), EngineError> {
        let mut next = self.cfg;
        if let Some(g) = update.grid_size {
            next.grid_size = g;
        }
        if let Some(k) = update.coupling {
            next.coupling = k;
        }
        if let Some(dt) = update.dt {
            next.dt = dt;
        }
        if let Some(noise) = update.noise_level {
            next.noise_level = noise;
        }
        if let Some(alpha) = update.phase_lag {
            next.phase_lag = alpha;
        }
        if let Some(ks) = update.stimulus_coupling {
            next.stimulus_coupling = ks;
        }
        if let Some(kf) = update.feature_coupling {
            next.feature_coupling = kf;
        }
        if let Some(range) = update.spatial_range {
            next.spatial_range = range;
        }
        if let Some(decay) = update.spatial_decay {
            next.spatial_decay = decay;
        }
        next.validate()?;

        let resized = next.grid_size != self.cfg.grid_size;
        let reweight = next.spatial_range != self.cfg.spatial_range
            || next.spatial_decay != self.cfg.spatial_decay;
        self.cfg = next;

        if resized {
            let n = self.cell_count();
            self.theta = vec![0.0; n];
            self.omega = vec![0.0; n];
            self.stimulus = vec![0.0; n];
            self.features = vec![0.5; n * self.cfg.num_features];
            self.coupling = CouplingSource::Spatial;
            self.compute_spatial_weights();
            self.initialize();
        } else if reweight {
            self.compute_spatial_weights();
        }
        Ok(())
    }

    /// Advance the field by one dt: move objects, re-project stimulus and
    /// feature fields, integrate phases with RK4, derive the attention map
    /// and tracked objects, append history.
    pub fn step(&mut self) {
        self.advance_objects();
        self.project_stimuli();
        self.build_pair_terms();
        self.integrate();

        self.time += self.cfg.dt;
        self.compute_attention_map();
        self.detect_tracked_objects();

        self.history.push(FieldEntry {
            time: self.time,
            attention_map: self.attention_map.clone(),
            tracked: self.tracked.clone(),
        });
    }

    pub fn snapshot(&self) -> FieldSnapshot {
        FieldSnapshot {
            phases: self.theta.clone(),
            stimulus: self.stimulus.clone(),
            features: self.features.clone(),
            num_features: self.cfg.num_features,
            attention_map: self.attention_map.clone(),
            objects: self.objects.clone(),
            tracked: self.tracked.clone(),
            time: self.time,
        }
    }

    pub fn history(&self) -> &History<FieldEntry> {
        &self.history
    }

    pub fn attention_map(&self) -> &[f64] {
        &self.attention_map
    }

    pub fn tracked_objects(&self) -> &[TrackedObject] {
        &self.tracked
    }

    pub fn spatial_weight(&self, i: usize, j: usize) -> f64 {
        self.spatial_weights[i * self.cell_count() + j]
    }

    /// O(grid_size^4) setup cost; cached until spatial_range/spatial_decay
    /// change, never recomputed per step.
    fn compute_spatial_weights(&mut self) {
        let gs = self.cfg.grid_size;
        let n = gs * gs;
        let range = self.cfg.spatial_range;
        let decay = self.cfg.spatial_decay;

        let mut weights = vec![0.0; n * n];
        let mut neighbors: Vec<Vec<(u32, f64)>> = vec![Vec::new(); n];
        for i in 0..n {
            let (row_i, col_i) = (i / gs, i % gs);
            for j in 0..n {
                if i == j {
                    continue;
                }
                let (row_j, col_j) = (j / gs, j % gs);
                let dr = row_i as f64 - row_j as f64;
                let dc = col_i as f64 - col_j as f64;
                let dist = (dr * dr + dc * dc).sqrt();
                if dist <= range {
                    let w = (-decay * dist).exp();
                    weights[i * n + j] = w;
                    neighbors[i].push((j as u32, w));
                }
            }
        }
        self.spatial_weights = weights;
        self.neighbors = neighbors;
    }

    /// Position integration plus boundary bounce: the wall sits a 2-cell
    /// padding inside the grid; a bounce clamps the position and flips the
    /// velocity with damping, so objects never leave the grid.
    fn advance_objects(&mut self) {
        let dt = self.cfg.dt;
        let hi = self.cfg.grid_size as f64 - BOUNCE_PADDING;
        for obj in &mut self.objects {
            obj.x += obj.vx * dt;
            obj.y += obj.vy * dt;
            if obj.x < BOUNCE_PADDING {
                obj.x = BOUNCE_PADDING;
                obj.vx *= BOUNCE_DAMPING;
            } else if obj.x > hi {
                obj.x = hi;
                obj.vx *= BOUNCE_DAMPING;
            }
            if obj.y < BOUNCE_PADDING {
                obj.y = BOUNCE_PADDING;
                obj.vy *= BOUNCE_DAMPING;
            } else if obj.y > hi {
                obj.y = hi;
                obj.vy *= BOUNCE_DAMPING;
            }
        }
    }

    /// Overwrite (not accumulate) the stimulus and feature fields from the
    /// current object positions. Stimulus takes the max across overlapping
    /// objects; features blend in object iteration order, which makes
    /// overlaps order-dependent. That ordering is part of the observable
    /// behavior and must not be reassociated.
    fn project_stimuli(&mut self) {
        let gs = self.cfg.grid_size;
        let nf = self.cfg.num_features;
        self.stimulus.iter_mut().for_each(|s| *s = 0.0);
        self.features.iter_mut().for_each(|f| *f = 0.5);

        for obj in &self.objects {
            let reach = obj.radius * 2.0;
            if obj.radius <= 0.0 {
                continue;
            }
            let row_lo = (obj.y - reach).floor().max(0.0) as usize;
            let row_hi = (obj.y + reach).ceil().min(gs as f64 - 1.0) as usize;
            let col_lo = (obj.x - reach).floor().max(0.0) as usize;
            let col_hi = (obj.x + reach).ceil().min(gs as f64 - 1.0) as usize;

            for row in row_lo..=row_hi {
                for col in col_lo..=col_hi {
                    let dr = row as f64 - obj.y;
                    let dc = col as f64 - obj.x;
                    let dist = (dr * dr + dc * dc).sqrt();
                    if dist > reach {
                        continue;
                    }
                    let idx = row * gs + col;
                    let activation =
                        obj.intensity * (-0.5 * (dist / obj.radius).powi(2)).exp();
                    if activation > self.stimulus[idx] {
                        self.stimulus[idx] = activation;
                    }
                    if activation > BLEND_ACTIVATION_FLOOR {
                        let w = activation.min(1.0);
                        let base = idx * nf;
                        for f in 0..nf {
                            self.features[base + f] =
                                (1.0 - w) * self.features[base + f] + w * obj.features[f];
                        }
                    }
                }
            }
        }
    }

    /// Precompute the per-pair stimulus and feature factors for this step.
    /// Both depend only on fields that stay frozen across the RK4 stages.
    fn build_pair_terms(&mut self) {
        let n = self.cell_count();
        let nf = self.cfg.num_features;

        let mut offsets = std::mem::take(&mut self.pair_offsets);
        let mut targets = std::mem::take(&mut self.pair_targets);
        let mut stim = std::mem::take(&mut self.pair_stim);
        let mut feat = std::mem::take(&mut self.pair_feat);
        offsets.clear();
        targets.clear();
        stim.clear();
        feat.clear();

        let mut push_pair = |i: usize,
                             j: usize,
                             w: f64,
                             targets: &mut Vec<u32>,
                             stim: &mut Vec<f64>,
                             feat: &mut Vec<f64>| {
            let s = 0.5 * (self.stimulus[i] + self.stimulus[j]);
            let sim = cosine_similarity(
                &self.features[i * nf..(i + 1) * nf],
                &self.features[j * nf..(j + 1) * nf],
            );
            targets.push(j as u32);
            stim.push(w * s);
            feat.push(if sim > SIMILARITY_GATE { w * sim } else { 0.0 });
        };

        for i in 0..n {
            offsets.push(targets.len());
            match &self.coupling {
                CouplingSource::Spatial => {
                    for &(j, w) in &self.neighbors[i] {
                        push_pair(i, j as usize, w, &mut targets, &mut stim, &mut feat);
                    }
                }
                CouplingSource::Explicit(t) => {
                    for j in 0..n {
                        if j == i {
                            continue;
                        }
                        let w = t.weight(i, j);
                        if w != 0.0 {
                            push_pair(i, j, w, &mut targets, &mut stim, &mut feat);
                        }
                    }
                }
            }
        }
        offsets.push(targets.len());

        self.pair_offsets = offsets;
        self.pair_targets = targets;
        self.pair_stim = stim;
        self.pair_feat = feat;
    }

    /// Classical RK4 over the phase vector; the four stage evaluations share
    /// the frozen pair terms, each stage sees a consistent phase vector.
    fn integrate(&mut self) {
        let n = self.cell_count();
        let dt = self.cfg.dt;

        let mut k1 = vec![0.0; n];
        let mut k2 = vec![0.0; n];
        let mut k3 = vec![0.0; n];
        let mut k4 = vec![0.0; n];
        let mut stage = self.theta.clone();

        self.stage_derivative(&stage, &mut k1);
        for i in 0..n {
            stage[i] = self.theta[i] + 0.5 * dt * k1[i];
        }
        self.stage_derivative(&stage, &mut k2);
        for i in 0..n {
            stage[i] = self.theta[i] + 0.5 * dt * k2[i];
        }
        self.stage_derivative(&stage, &mut k3);
        for i in 0..n {
            stage[i] = self.theta[i] + dt * k3[i];
        }
        self.stage_derivative(&stage, &mut k4);

        for i in 0..n {
            let delta = dt / 6.0 * (k1[i] + 2.0 * k2[i] + 2.0 * k3[i] + k4[i]);
            self.theta[i] = wrap_phase(self.theta[i] + delta);
        }
    }

    fn stage_derivative(&mut self, theta: &[f64], dtheta: &mut [f64]) {
        let n = theta.len();
        let k_over_n = self.cfg.coupling / n as f64;
        let k_stim = self.cfg.stimulus_coupling;
        let k_feat = self.cfg.feature_coupling;
        let alpha = self.cfg.phase_lag;

        let noise: Option<Vec<f64>> = if self.cfg.noise_level > 0.0 {
            let std = self.cfg.noise_level * 0.1;
            Some((0..n).map(|_| self.rng.next_normal() * std).collect())
        } else {
            None
        };

        let omega = &self.omega;
        let offsets = &self.pair_offsets;
        let targets = &self.pair_targets;
        let stim = &self.pair_stim;
        let feat = &self.pair_feat;

        let eval = |i: usize| -> f64 {
            let mut stim_sum = 0.0;
            let mut feat_sum = 0.0;
            for p in offsets[i]..offsets[i + 1] {
                let j = targets[p] as usize;
                let s = (theta[j] - theta[i] - alpha).sin();
                stim_sum += stim[p] * s;
                feat_sum += feat[p] * s;
            }
            let eta = noise.as_ref().map_or(0.0, |v| v[i]);
            omega[i] + eta + k_over_n * (k_stim * stim_sum + k_feat * feat_sum)
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

    /// Local order parameter per cell over its spatial-neighbor support.
    fn compute_attention_map(&mut self) {
        let cos_t: Vec<f64> = self.theta.iter().map(|t| t.cos()).collect();
        let sin_t: Vec<f64> = self.theta.iter().map(|t| t.sin()).collect();
        for i in 0..self.cell_count() {
            let neigh = &self.neighbors[i];
            if neigh.is_empty() {
                self.attention_map[i] = 0.0;
                continue;
            }
            let mut cos_sum = 0.0;
            let mut sin_sum = 0.0;
            for &(j, _) in neigh {
                cos_sum += cos_t[j as usize];
                sin_sum += sin_t[j as usize];
            }
            let m = neigh.len() as f64;
            let (c, s) = (cos_sum / m, sin_sum / m);
            self.attention_map[i] = (c * c + s * s).sqrt();
        }
    }

    /// Sample the attention map over the 3x3 neighborhood (modular indexing)
    /// around each object's integer cell.
    fn detect_tracked_objects(&mut self) {
        let gs = self.cfg.grid_size as i64;
        self.tracked.clear();
        for obj in &self.objects {
            let cx = obj.x.floor() as i64;
            let cy = obj.y.floor() as i64;
            let mut sum = 0.0;
            for dy in -1..=1 {
                for dx in -1..=1 {
                    let row = (cy + dy).rem_euclid(gs) as usize;
                    let col = (cx + dx).rem_euclid(gs) as usize;
                    sum += self.attention_map[row * self.cfg.grid_size + col];
                }
            }
            let avg = sum / 9.0;
            self.tracked.push(TrackedObject {
                id: obj.id,
                x: obj.x,
                y: obj.y,
                attention: avg,
                tracked: avg > TRACKED_THRESHOLD,
            });
        }
    }

    /// Global order parameter over all cells (diagnostic; the attention map
    /// is the primary derived quantity for this engine).
    pub fn order_parameter(&self) -> f64 {
        order_parameter_of(&self.theta)
    }
}

/// Cosine similarity; 0 when either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f64], b: &[f64]) -> f64 {
    let mut dot = 0.0;
    let mut na = 0.0;
    let mut nb = 0.0;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_cfg(grid: usize, seed: u64) -> FieldConfig {
        FieldConfig {
            grid_size: grid,
            seed: Some(seed),
            ..FieldConfig::default()
        }
    }

    #[test]
    fn rejects_degenerate_configs() {
        assert!(AttentionField::new(FieldConfig {
            grid_size: 0,
            ..FieldConfig::default()
        })
        .is_err());
        assert!(AttentionField::new(FieldConfig {
            dt: 0.0,
            ..FieldConfig::default()
        })
        .is_err());
    }

    #[test]
    fn spatial_weights_decay_and_cut_off() {
        let field = AttentionField::new(small_cfg(8, 1)).unwrap();
        let gs = 8;
        let a = 3 * gs + 3;
        // Self weight is zero.
        assert_eq!(field.spatial_weight(a, a), 0.0);
        // Adjacent cell: exp(-decay * 1).
        let b = 3 * gs + 4;
        let expected = (-field.config().spatial_decay).exp();
        assert!((field.spatial_weight(a, b) - expected).abs() < 1e-12);
        // Symmetric.
        assert_eq!(field.spatial_weight(a, b), field.spatial_weight(b, a));
        // Distance 2 still inside the default range of 4.
        let far = 3 * gs + 1;
        let d = 2.0;
        assert!(
            (field.spatial_weight(a, far) - (-field.config().spatial_decay * d).exp()).abs()
                < 1e-12
        );
        // (3,3) -> (7,7) is distance sqrt(32) > 4: cut off.
        let beyond = 7 * gs + 7;
        assert_eq!(field.spatial_weight(a, beyond), 0.0);
    }

    #[test]
    fn stimulus_projection_peaks_at_object() {
        let mut field = AttentionField::new(small_cfg(16, 2)).unwrap();
        field.add_stimulus_object(StimulusSpec {
            x: Some(8.0),
            y: Some(8.0),
            intensity: Some(1.0),
            radius: Some(2.0),
            features: Some(vec![1.0, 0.0, 0.0]),
            ..StimulusSpec::default()
        });
        field.step();
        let snap = field.snapshot();
        let center = 8 * 16 + 8;
        assert!((snap.stimulus[center] - 1.0).abs() < 1e-12);
        // One cell away: exp(-0.5 * (1/2)^2).
        let near = 8 * 16 + 9;
        assert!((snap.stimulus[near] - (-0.125f64).exp()).abs() < 1e-12);
        // Far corner untouched.
        assert_eq!(snap.stimulus[0], 0.0);
        // Features blended toward the object's red vector at the center,
        // neutral elsewhere.
        assert!(snap.features[center * 3] > 0.9);
        assert!(snap.features[center * 3 + 1] < 0.1);
        assert_eq!(snap.features[0], 0.5);
    }

    #[test]
    fn overlapping_stimuli_take_max_activation() {
        let mut field = AttentionField::new(small_cfg(16, 2)).unwrap();
        field.add_stimulus_object(StimulusSpec {
            x: Some(8.0),
            y: Some(8.0),
            intensity: Some(0.4),
            radius: Some(2.0),
            ..StimulusSpec::default()
        });
        field.add_stimulus_object(StimulusSpec {
            x: Some(8.0),
            y: Some(8.0),
            intensity: Some(0.9),
            radius: Some(2.0),
            ..StimulusSpec::default()
        });
        field.step();
        let center = 8 * 16 + 8;
        assert!((field.snapshot().stimulus[center] - 0.9).abs() < 1e-12);
    }

    #[test]
    fn objects_bounce_with_damping() {
        let mut field = AttentionField::new(FieldConfig {
            grid_size: 16,
            dt: 1.0,
            seed: Some(3),
            ..FieldConfig::default()
        })
        .unwrap();
        field.add_stimulus_object(StimulusSpec {
            x: Some(3.0),
            y: Some(8.0),
            vx: Some(-4.0),
            ..StimulusSpec::default()
        });
        field.step();
        let obj = &field.objects()[0];
        // Clamped to the padding margin, velocity flipped and damped.
        assert_eq!(obj.x, 2.0);
        assert!((obj.vx - 3.8).abs() < 1e-12);
        assert_eq!(obj.vy, 0.0);
    }

    #[test]
    fn stimulus_spec_defaults_fill_in() {
        let mut field = AttentionField::new(small_cfg(10, 4)).unwrap();
        let id = field.add_stimulus_object(StimulusSpec::default());
        let obj = &field.objects()[0];
        assert_eq!(obj.id, id);
        assert_eq!(obj.x, 5.0);
        assert_eq!(obj.y, 5.0);
        assert_eq!(obj.vx, 0.0);
        assert_eq!(obj.radius, 3.0);
        assert_eq!(obj.intensity, 1.0);
        assert_eq!(obj.features, vec![0.5, 0.5, 0.5]);
        // Wrong-length feature vectors are padded, not rejected.
        field.add_stimulus_object(StimulusSpec {
            features: Some(vec![1.0]),
            ..StimulusSpec::default()
        });
        assert_eq!(field.objects()[1].features, vec![1.0, 0.5, 0.5]);
    }

    #[test]
    fn phases_stay_wrapped() {
        let mut field = AttentionField::new(small_cfg(8, 5)).unwrap();
        field.add_stimulus_object(StimulusSpec::default());
        for _ in 0..30 {
            field.step();
            for &t in &field.theta {
                assert!(t > -PI && t <= PI, "phase {t}");
            }
        }
    }

    #[test]
    fn history_ring_never_exceeds_cap() {
        let mut field = AttentionField::new(FieldConfig {
            grid_size: 6,
            history_cap: 20,
            seed: Some(6),
            ..FieldConfig::default()
        })
        .unwrap();
        for _ in 0..45 {
            field.step();
            assert!(field.history().len() <= 20);
        }
        assert_eq!(field.history().len(), 20);
    }

    #[test]
    fn cosine_similarity_handles_zero_vectors() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-12);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-12);
    }

    #[test]
    fn network_override_is_size_checked() {
        let mut field = AttentionField::new(small_cfg(4, 7)).unwrap();
        assert!(field.set_network(Topology::all_to_all(16)).is_ok());
        assert!(field.network().is_some());
        let err = field.set_network(Topology::all_to_all(9)).unwrap_err();
        assert_eq!(
            err,
            EngineError::TopologyMismatch {
                expected: 16,
                got: 9
            }
        );
        field.step();
        field.clear_network();
        assert!(field.network().is_none());
    }

    #[test]
    fn spatial_range_update_recomputes_weights() {
        let mut field = AttentionField::new(small_cfg(8, 8)).unwrap();
        let a = 0;
        let b = 4; // distance 4, exactly at the default range
        assert!(field.spatial_weight(a, b) > 0.0);
        field
            .update_parameters(FieldParamUpdate {
                spatial_range: Some(2.0),
                ..FieldParamUpdate::default()
            })
            .unwrap();
        assert_eq!(field.spatial_weight(a, b), 0.0);
    }

    #[test]
    fn grid_resize_reinitializes() {
        let mut field = AttentionField::new(small_cfg(6, 9)).unwrap();
        for _ in 0..3 {
            field.step();
        }
        field
            .update_parameters(FieldParamUpdate {
                grid_size: Some(10),
                ..FieldParamUpdate::default()
            })
            .unwrap();
        assert_eq!(field.cell_count(), 100);
        assert_eq!(field.time(), 0.0);
        assert!(field.history().is_empty());
        assert_eq!(field.snapshot().phases.len(), 100);
    }

    #[test]
    fn stationary_object_becomes_tracked() {
        // Grid 32, unit-intensity object at the center, stimulus coupling
        // 1.5, 300 steps at dt = 0.05: the driven neighborhood phase-locks
        // and the 3x3 attention average at the object exceeds 0.6. Run under
        // multiple seeds so the outcome does not hinge on one frequency draw.
        for seed in [7u64, 42] {
            let mut field = AttentionField::new(FieldConfig {
                grid_size: 32,
                stimulus_coupling: 1.5,
                dt: 0.05,
                noise_level: 0.0,
                seed: Some(seed),
                ..FieldConfig::default()
            })
            .unwrap();
            field.add_stimulus_object(StimulusSpec {
                x: Some(16.0),
                y: Some(16.0),
                intensity: Some(1.0),
                radius: Some(3.0),
                ..StimulusSpec::default()
            });
            for _ in 0..300 {
                field.step();
            }
            let tracked = field.tracked_objects();
            assert_eq!(tracked.len(), 1);
            assert!(
                tracked[0].tracked,
                "seed {seed}: attention at object = {}",
                tracked[0].attention
            );
        }
    }
}
