//! Mock problems for integration tests

use pfasst_rs::encap::{StateContainer, VectorEncapsulation};
use pfasst_rs::error::Result;
use pfasst_rs::sweeper::ImexProblem;

/// Rotation treated explicitly, damping treated implicitly
///
/// ```text
/// u' = ω J u - d u,    J = [[0, -1], [1, 0]]
/// u(t) = exp(-d t) R(ω t) u_0
/// ```
#[derive(Clone, Debug)]
pub struct DampedRotation {
    pub omega: f64,
    pub damping: f64,
}

impl DampedRotation {
    pub fn new(omega: f64, damping: f64) -> Self {
        Self { omega, damping }
    }

    pub fn initial_state(&self) -> VectorEncapsulation {
        VectorEncapsulation::from_slice(&[1.0, 0.0])
    }
}

impl ImexProblem<VectorEncapsulation> for DampedRotation {
    fn name(&self) -> &str {
        "DampedRotation"
    }

    fn evaluate_rhs_expl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        Ok(VectorEncapsulation::from_slice(&[-self.omega * u[1], self.omega * u[0]]))
    }

    fn evaluate_rhs_impl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        Ok(VectorEncapsulation::from_slice(&[-self.damping * u[0], -self.damping * u[1]]))
    }

    fn implicit_solve(
        &mut self,
        f: &mut VectorEncapsulation,
        u: &mut VectorEncapsulation,
        _t: f64,
        ds: f64,
        rhs: &VectorEncapsulation,
    ) -> Result<()> {
        u.copy_from(rhs)?;
        *u.data_mut() /= 1.0 + ds * self.damping;
        f.copy_from(u)?;
        *f.data_mut() *= -self.damping;
        Ok(())
    }

    fn exact(&self, t: f64) -> Result<VectorEncapsulation> {
        let decay = (-self.damping * t).exp();
        let (sin, cos) = (self.omega * t).sin_cos();
        Ok(VectorEncapsulation::from_slice(&[decay * cos, decay * sin]))
    }
}

/// Explicit time-dependent forcing on top of implicit decay
///
/// ```text
/// u' = cos(t) - λ u,    u(0) = 0
/// u(t) = (λ cos t + sin t - λ exp(-λ t)) / (1 + λ²)
/// ```
#[derive(Clone, Debug)]
pub struct TimeForcedDecay {
    pub lambda: f64,
}

impl TimeForcedDecay {
    pub fn new(lambda: f64) -> Self {
        Self { lambda }
    }

    pub fn initial_state(&self) -> VectorEncapsulation {
        VectorEncapsulation::zeros(1)
    }
}

impl ImexProblem<VectorEncapsulation> for TimeForcedDecay {
    fn name(&self) -> &str {
        "TimeForcedDecay"
    }

    fn evaluate_rhs_expl(&mut self, t: f64, _u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        Ok(VectorEncapsulation::from_slice(&[t.cos()]))
    }

    fn evaluate_rhs_impl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        Ok(VectorEncapsulation::from_slice(&[-self.lambda * u[0]]))
    }

    fn implicit_solve(
        &mut self,
        f: &mut VectorEncapsulation,
        u: &mut VectorEncapsulation,
        _t: f64,
        ds: f64,
        rhs: &VectorEncapsulation,
    ) -> Result<()> {
        u[0] = rhs[0] / (1.0 + ds * self.lambda);
        f[0] = -self.lambda * u[0];
        Ok(())
    }

    fn exact(&self, t: f64) -> Result<VectorEncapsulation> {
        let l = self.lambda;
        let value = (l * t.cos() + t.sin() - l * (-l * t).exp()) / (1.0 + l * l);
        Ok(VectorEncapsulation::from_slice(&[value]))
    }
}
