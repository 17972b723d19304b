//! Periodic advection-diffusion in one dimension
//!
//! # Semi-discrete system
//!
//! On `n` equidistant points `x_j = j h`, `h = 1 / n`, of the periodic unit
//! interval:
//!
//! ```text
//! u_j' = -v (u_{j+1} - u_{j-1}) / 2h  +  ν (u_{j+1} - 2 u_j + u_{j-1}) / h²
//!        └──────── explicit ────────┘    └──────────── implicit ──────────┘
//! ```
//!
//! # Exact solution
//!
//! A single Fourier mode `sin(k x)`, `k = 2π`, stays a single mode. With the
//! discrete symbols of both difference operators
//!
//! ```text
//! λ = ν (2 cos(k h) - 2) / h²      (decay)
//! ω = v sin(k h) / h               (phase speed)
//! u_j(t) = exp(λ t) sin(k x_j - ω t)
//! ```
//!
//! solves the semi-discrete system exactly, so any error measured against it
//! is time integration error only.
//!
//! # Implicit solve
//!
//! `(I - ds ν L) u = rhs` is solved with a dense LU factorisation. A
//! sweep uses one distinct `ds` per node, so factorisations are cached by
//! `ds`.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{DMatrix, DVector, Dyn, LU};

use crate::encap::{StateContainer, VectorEncapsulation};
use crate::error::{PfasstError, Result, ensure_size};
use crate::sweeper::ImexProblem;

const WAVE_NUMBER: f64 = 2.0 * PI;

/// Periodic advection-diffusion on `n` grid points
#[derive(Clone, Debug)]
pub struct AdvectionDiffusion {
    num_points: usize,
    velocity: f64,
    viscosity: f64,
    factorizations: HashMap<u64, LU<f64, Dyn, Dyn>>,
}

impl AdvectionDiffusion {
    pub fn new(num_points: usize, velocity: f64, viscosity: f64) -> Self {
        Self {
            num_points,
            velocity,
            viscosity,
            factorizations: HashMap::new(),
        }
    }

    pub fn num_points(&self) -> usize {
        self.num_points
    }

    fn spacing(&self) -> f64 {
        1.0 / self.num_points as f64
    }

    /// Grid coordinates `x_j = j h`
    pub fn grid_points(&self) -> Vec<f64> {
        let h = self.spacing();
        (0..self.num_points).map(|j| j as f64 * h).collect()
    }

    /// `u(0)`
    pub fn initial_state(&self) -> VectorEncapsulation {
        let h = self.spacing();
        VectorEncapsulation::from_fn(self.num_points, |j| (WAVE_NUMBER * j as f64 * h).sin())
    }

    /// Decay rate of the discrete mode
    pub fn decay_rate(&self) -> f64 {
        let h = self.spacing();
        self.viscosity * (2.0 * (WAVE_NUMBER * h).cos() - 2.0) / (h * h)
    }

    fn phase_speed(&self) -> f64 {
        let h = self.spacing();
        self.velocity * (WAVE_NUMBER * h).sin() / h
    }

    fn neighbours(&self, j: usize) -> (usize, usize) {
        let n = self.num_points;
        ((j + n - 1) % n, (j + 1) % n)
    }

    fn laplacian(&self, u: &VectorEncapsulation) -> VectorEncapsulation {
        let h2 = self.spacing() * self.spacing();
        VectorEncapsulation::from_fn(self.num_points, |j| {
            let (left, right) = self.neighbours(j);
            (u[right] - 2.0 * u[j] + u[left]) / h2
        })
    }

    fn factorization(&mut self, ds: f64) -> &LU<f64, Dyn, Dyn> {
        let n = self.num_points;
        let h2 = self.spacing() * self.spacing();
        let coefficient = ds * self.viscosity / h2;

        self.factorizations.entry(ds.to_bits()).or_insert_with(|| {
            let mut matrix = DMatrix::<f64>::identity(n, n) * (1.0 + 2.0 * coefficient);
            for j in 0..n {
                let (left, right) = ((j + n - 1) % n, (j + 1) % n);
                matrix[(j, left)] -= coefficient;
                matrix[(j, right)] -= coefficient;
            }
            matrix.lu()
        })
    }
}

impl ImexProblem<VectorEncapsulation> for AdvectionDiffusion {
    fn name(&self) -> &str {
        "advection-diffusion"
    }

    fn evaluate_rhs_expl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        ensure_size("advection", self.num_points, u.len())?;
        let scale = -self.velocity / (2.0 * self.spacing());
        Ok(VectorEncapsulation::from_fn(self.num_points, |j| {
            let (left, right) = self.neighbours(j);
            scale * (u[right] - u[left])
        }))
    }

    fn evaluate_rhs_impl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        ensure_size("diffusion", self.num_points, u.len())?;
        let mut f = self.laplacian(u);
        *f.data_mut() *= self.viscosity;
        Ok(f)
    }

    fn implicit_solve(
        &mut self,
        f: &mut VectorEncapsulation,
        u: &mut VectorEncapsulation,
        t: f64,
        ds: f64,
        rhs: &VectorEncapsulation,
    ) -> Result<()> {
        ensure_size("implicit solve", self.num_points, rhs.len())?;

        let solution: DVector<f64> = self
            .factorization(ds)
            .solve(rhs.data())
            .ok_or_else(|| PfasstError::Numerical(format!("singular implicit system for ds={}", ds)))?;

        *u = VectorEncapsulation::from(solution);
        *f = self.evaluate_rhs_impl(t, u)?;
        Ok(())
    }

    fn exact(&self, t: f64) -> Result<VectorEncapsulation> {
        let h = self.spacing();
        let amplitude = (self.decay_rate() * t).exp();
        let shift = self.phase_speed() * t;
        Ok(VectorEncapsulation::from_fn(self.num_points, |j| {
            amplitude * (WAVE_NUMBER * j as f64 * h - shift).sin()
        }))
    }
}
