//! Quadrature rules on the unit interval
//!
//! A sweeper only consumes a rule through the [`Quadrature`] trait: the
//! nodes, three integration matrices and whether the step's endpoints are
//! among the nodes. The endpoint flags drive several branches of the
//! sweepers (end-state computation, carrying right-hand sides into the next
//! step), Gauss-Radau with only the right endpoint being the canonical case.
//!
//! [`CollocationQuadrature`] builds a rule for any of the families in
//! [`QuadratureType`] or for custom nodes.
//!
//! ```rust
//! use pfasst_rs::quadrature::{quadrature_factory, QuadratureType};
//!
//! let quad = quadrature_factory(3, QuadratureType::GaussRadau).unwrap();
//! assert_eq!(quad.num_nodes(), 3);
//! assert!(!quad.left_is_node());
//! assert!(quad.right_is_node());
//! ```

mod collocation;
pub mod nodes;

pub use collocation::CollocationQuadrature;

use std::fmt;
use std::sync::Arc;

use nalgebra::DMatrix;

use crate::error::Result;

/// Nodes and integration matrices of one quadrature rule
pub trait Quadrature: Send + Sync + fmt::Debug {
    fn num_nodes(&self) -> usize;

    /// Ascending nodes in `[0, 1]`
    fn nodes(&self) -> &[f64];

    /// Integration from the start of the step to each node
    fn q_mat(&self) -> &DMatrix<f64>;

    /// Integration from the previous node (or the start) to each node
    fn s_mat(&self) -> &DMatrix<f64>;

    /// Integration over the whole step, a single row
    fn b_mat(&self) -> &DMatrix<f64>;

    fn left_is_node(&self) -> bool;

    fn right_is_node(&self) -> bool;

    /// Distance of each node to its predecessor, the first to `0`
    fn delta_nodes(&self) -> Vec<f64> {
        let nodes = self.nodes();
        nodes
            .iter()
            .enumerate()
            .map(|(m, &t)| if m == 0 { t } else { t - nodes[m - 1] })
            .collect()
    }
}

/// Supported node families
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum QuadratureType {
    GaussLegendre,
    GaussLobatto,
    GaussRadau,
    ClenshawCurtis,
    Uniform,
}

impl QuadratureType {
    pub fn name(&self) -> &'static str {
        match self {
            QuadratureType::GaussLegendre => "Gauss-Legendre",
            QuadratureType::GaussLobatto => "Gauss-Lobatto",
            QuadratureType::GaussRadau => "Gauss-Radau",
            QuadratureType::ClenshawCurtis => "Clenshaw-Curtis",
            QuadratureType::Uniform => "Uniform",
        }
    }

    /// Smallest node count the family supports
    pub fn min_nodes(&self) -> usize {
        match self {
            QuadratureType::GaussLegendre | QuadratureType::GaussRadau => 1,
            QuadratureType::GaussLobatto
            | QuadratureType::ClenshawCurtis
            | QuadratureType::Uniform => 2,
        }
    }

    pub fn left_is_node(&self) -> bool {
        !matches!(self, QuadratureType::GaussLegendre | QuadratureType::GaussRadau)
    }

    pub fn right_is_node(&self) -> bool {
        !matches!(self, QuadratureType::GaussLegendre)
    }
}

impl std::str::FromStr for QuadratureType {
    type Err = crate::error::PfasstError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace(['-', '_', ' '], "").as_str() {
            "gausslegendre" | "legendre" => Ok(QuadratureType::GaussLegendre),
            "gausslobatto" | "lobatto" => Ok(QuadratureType::GaussLobatto),
            "gaussradau" | "radau" => Ok(QuadratureType::GaussRadau),
            "clenshawcurtis" => Ok(QuadratureType::ClenshawCurtis),
            "uniform" | "equidistant" => Ok(QuadratureType::Uniform),
            _ => Err(crate::error::PfasstError::configuration(format!(
                "unknown quadrature type '{}'",
                s
            ))),
        }
    }
}

/// Shared rule of the requested family, ready to hand to sweepers
pub fn quadrature_factory(num_nodes: usize, kind: QuadratureType) -> Result<Arc<dyn Quadrature>> {
    Ok(Arc::new(CollocationQuadrature::new(kind, num_nodes)?))
}
