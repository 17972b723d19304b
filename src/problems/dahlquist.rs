//! Dahlquist test equation with an IMEX splitting
//!
//! ```text
//! u'(t) = λ_E u(t) + λ_I u(t),    u(0) = u_0
//! u(t)  = u_0 exp((λ_E + λ_I) t)
//! ```

use crate::encap::{StateContainer, VectorEncapsulation};
use crate::error::Result;
use crate::sweeper::ImexProblem;

/// Linear scalar problem, replicated over `size` independent entries
#[derive(Clone, Debug)]
pub struct Dahlquist {
    lambda_expl: f64,
    lambda_impl: f64,
    initial_value: f64,
    size: usize,
    num_expl_evals: usize,
    num_impl_solves: usize,
}

impl Dahlquist {
    pub fn new(lambda_expl: f64, lambda_impl: f64) -> Self {
        Self {
            lambda_expl,
            lambda_impl,
            initial_value: 1.0,
            size: 1,
            num_expl_evals: 0,
            num_impl_solves: 0,
        }
    }

    pub fn with_initial_value(mut self, initial_value: f64) -> Self {
        self.initial_value = initial_value;
        self
    }

    pub fn with_size(mut self, size: usize) -> Self {
        self.size = size;
        self
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// `u(0)`
    pub fn initial_state(&self) -> VectorEncapsulation {
        VectorEncapsulation::from_vec(vec![self.initial_value; self.size])
    }

    /// Number of explicit evaluations so far
    pub fn num_expl_evals(&self) -> usize {
        self.num_expl_evals
    }

    /// Number of implicit solves so far
    pub fn num_impl_solves(&self) -> usize {
        self.num_impl_solves
    }
}

impl ImexProblem<VectorEncapsulation> for Dahlquist {
    fn name(&self) -> &str {
        "Dahlquist"
    }

    fn evaluate_rhs_expl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        self.num_expl_evals += 1;
        Ok(VectorEncapsulation::from(u.data() * self.lambda_expl))
    }

    fn evaluate_rhs_impl(&mut self, _t: f64, u: &VectorEncapsulation) -> Result<VectorEncapsulation> {
        Ok(VectorEncapsulation::from(u.data() * self.lambda_impl))
    }

    fn implicit_solve(
        &mut self,
        f: &mut VectorEncapsulation,
        u: &mut VectorEncapsulation,
        _t: f64,
        ds: f64,
        rhs: &VectorEncapsulation,
    ) -> Result<()> {
        self.num_impl_solves += 1;
        u.copy_from(rhs)?;
        *u.data_mut() /= 1.0 - ds * self.lambda_impl;
        f.copy_from(u)?;
        *f.data_mut() *= self.lambda_impl;
        Ok(())
    }

    fn exact(&self, t: f64) -> Result<VectorEncapsulation> {
        let value = self.initial_value * ((self.lambda_expl + self.lambda_impl) * t).exp();
        Ok(VectorEncapsulation::from_vec(vec![value; self.size]))
    }
}
