//! Collocation matrices built from arbitrary nodes
//!
//! Every matrix entry is an integral of a Lagrange basis polynomial over the
//! nodes. The basis polynomials are expanded into monomial coefficients by
//! multiplying out their factors, then integrated exactly.
//!
//! ```text
//! q_mat[m][j] = ∫_0^{τ_m}        ℓ_j(s) ds     (start of step to node m)
//! s_mat[m][j] = ∫_{τ_{m-1}}^{τ_m} ℓ_j(s) ds     (node to node, τ_{-1} = 0)
//! b_mat[0][j] = ∫_0^1            ℓ_j(s) ds     (whole step)
//! ```

use nalgebra::DMatrix;

use crate::error::{PfasstError, Result};
use crate::quadrature::{Quadrature, QuadratureType, nodes};

/// Quadrature rule over a fixed set of nodes in `[0, 1]`
#[derive(Clone, Debug)]
pub struct CollocationQuadrature {
    kind: Option<QuadratureType>,
    nodes: Vec<f64>,
    q_mat: DMatrix<f64>,
    s_mat: DMatrix<f64>,
    b_mat: DMatrix<f64>,
    left_is_node: bool,
    right_is_node: bool,
}

impl CollocationQuadrature {
    /// Rule of the given family with `num_nodes` nodes
    pub fn new(kind: QuadratureType, num_nodes: usize) -> Result<Self> {
        if num_nodes < kind.min_nodes() {
            return Err(PfasstError::configuration(format!(
                "{} quadrature requires at least {} nodes, got {}",
                kind.name(),
                kind.min_nodes(),
                num_nodes
            )));
        }

        let points = match kind {
            QuadratureType::GaussLegendre => nodes::gauss_legendre(num_nodes),
            QuadratureType::GaussLobatto => nodes::gauss_lobatto(num_nodes),
            QuadratureType::GaussRadau => nodes::gauss_radau_right(num_nodes),
            QuadratureType::ClenshawCurtis => nodes::clenshaw_curtis(num_nodes),
            QuadratureType::Uniform => nodes::uniform(num_nodes),
        };

        let mut quadrature = Self::build(points, kind.left_is_node(), kind.right_is_node())?;
        quadrature.kind = Some(kind);
        Ok(quadrature)
    }

    /// Rule over caller-supplied ascending nodes
    ///
    /// Endpoint flags are derived from whether `0` and `1` are among the nodes.
    pub fn from_nodes(nodes: Vec<f64>) -> Result<Self> {
        if nodes.is_empty() {
            return Err(PfasstError::configuration("quadrature needs at least one node"));
        }
        if nodes.iter().any(|t| !(0.0..=1.0).contains(t)) {
            return Err(PfasstError::configuration("quadrature nodes must lie in [0, 1]"));
        }
        if nodes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PfasstError::configuration("quadrature nodes must be strictly ascending"));
        }

        let left = nodes[0] == 0.0;
        let right = nodes[nodes.len() - 1] == 1.0;
        Self::build(nodes, left, right)
    }

    fn build(nodes: Vec<f64>, left_is_node: bool, right_is_node: bool) -> Result<Self> {
        let n = nodes.len();
        let basis: Vec<Vec<f64>> = (0..n).map(|j| lagrange_coefficients(&nodes, j)).collect();

        let q_mat = DMatrix::from_fn(n, n, |m, j| integrate_polynomial(&basis[j], nodes[m]));
        let b_mat = DMatrix::from_fn(1, n, |_, j| integrate_polynomial(&basis[j], 1.0));

        let s_mat = DMatrix::from_fn(n, n, |m, j| {
            if m == 0 {
                q_mat[(0, j)]
            } else {
                q_mat[(m, j)] - q_mat[(m - 1, j)]
            }
        });

        if q_mat.iter().chain(b_mat.iter()).any(|w| !w.is_finite()) {
            return Err(PfasstError::Numerical("quadrature weights are not finite".to_string()));
        }

        Ok(Self {
            kind: None,
            nodes,
            q_mat,
            s_mat,
            b_mat,
            left_is_node,
            right_is_node,
        })
    }

    /// Family this rule was built from, `None` for custom nodes
    pub fn kind(&self) -> Option<QuadratureType> {
        self.kind
    }
}

impl Quadrature for CollocationQuadrature {
    fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    fn nodes(&self) -> &[f64] {
        &self.nodes
    }

    fn q_mat(&self) -> &DMatrix<f64> {
        &self.q_mat
    }

    fn s_mat(&self) -> &DMatrix<f64> {
        &self.s_mat
    }

    fn b_mat(&self) -> &DMatrix<f64> {
        &self.b_mat
    }

    fn left_is_node(&self) -> bool {
        self.left_is_node
    }

    fn right_is_node(&self) -> bool {
        self.right_is_node
    }
}

/// Monomial coefficients (lowest degree first) of the `j`-th Lagrange basis polynomial
fn lagrange_coefficients(nodes: &[f64], j: usize) -> Vec<f64> {
    let mut coefficients = vec![1.0];

    for (k, &tau) in nodes.iter().enumerate() {
        if k == j {
            continue;
        }
        let scale = 1.0 / (nodes[j] - tau);

        // multiply by (t - tau) * scale
        let mut next = vec![0.0; coefficients.len() + 1];
        for (degree, &c) in coefficients.iter().enumerate() {
            next[degree + 1] += c * scale;
            next[degree] -= c * tau * scale;
        }
        coefficients = next;
    }

    coefficients
}

/// `∫_0^upper p(s) ds` for coefficients lowest degree first
fn integrate_polynomial(coefficients: &[f64], upper: f64) -> f64 {
    coefficients
        .iter()
        .enumerate()
        .rev()
        .fold(0.0, |acc, (degree, &c)| acc * upper + c / (degree as f64 + 1.0))
        * upper
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_lagrange_basis_is_cardinal() {
        let nodes = [0.0, 0.3, 1.0];
        for j in 0..3 {
            let c = lagrange_coefficients(&nodes, j);
            for (k, &t) in nodes.iter().enumerate() {
                let value: f64 = c.iter().enumerate().map(|(d, ci)| ci * t.powi(d as i32)).sum();
                assert_relative_eq!(value, if j == k { 1.0 } else { 0.0 }, epsilon = 1e-14);
            }
        }
    }

    #[test]
    fn test_integrate_polynomial() {
        // ∫_0^2 (1 + 3s²) ds = 2 + 8
        assert_relative_eq!(integrate_polynomial(&[1.0, 0.0, 3.0], 2.0), 10.0);
    }

    #[test]
    fn test_lobatto_three_is_simpson() {
        let q = CollocationQuadrature::new(QuadratureType::GaussLobatto, 3).unwrap();

        assert_relative_eq!(q.b_mat()[(0, 0)], 1.0 / 6.0, epsilon = 1e-14);
        assert_relative_eq!(q.b_mat()[(0, 1)], 4.0 / 6.0, epsilon = 1e-14);
        assert_relative_eq!(q.b_mat()[(0, 2)], 1.0 / 6.0, epsilon = 1e-14);

        // first row integrates over an empty interval
        assert!(q.q_mat().row(0).iter().all(|w| w.abs() < 1e-15));
        // the last row of q_mat is the full-step rule
        for j in 0..3 {
            assert_relative_eq!(q.q_mat()[(2, j)], q.b_mat()[(0, j)], epsilon = 1e-14);
        }
        assert!(q.left_is_node() && q.right_is_node());
    }

    #[test]
    fn test_radau_two_weights() {
        let q = CollocationQuadrature::new(QuadratureType::GaussRadau, 2).unwrap();

        // Radau IIA, order 3
        assert_relative_eq!(q.q_mat()[(0, 0)], 5.0 / 12.0, epsilon = 1e-14);
        assert_relative_eq!(q.q_mat()[(0, 1)], -1.0 / 12.0, epsilon = 1e-14);
        assert_relative_eq!(q.q_mat()[(1, 0)], 3.0 / 4.0, epsilon = 1e-14);
        assert_relative_eq!(q.q_mat()[(1, 1)], 1.0 / 4.0, epsilon = 1e-14);
        assert!(!q.left_is_node() && q.right_is_node());
    }

    #[test]
    fn test_rows_of_s_mat_sum_to_node_spacing() {
        for kind in [QuadratureType::GaussRadau, QuadratureType::GaussLegendre, QuadratureType::ClenshawCurtis] {
            let q = CollocationQuadrature::new(kind, 5).unwrap();
            let deltas = q.delta_nodes();
            for m in 0..5 {
                assert_relative_eq!(q.s_mat().row(m).sum(), deltas[m], epsilon = 1e-13);
            }
            assert_relative_eq!(q.b_mat().sum(), 1.0, epsilon = 1e-13);
        }
    }

    #[test]
    fn test_gauss_legendre_integrates_high_degree_exactly() {
        // three Gauss points integrate degree five exactly
        let q = CollocationQuadrature::new(QuadratureType::GaussLegendre, 3).unwrap();
        let integral: f64 = q
            .nodes()
            .iter()
            .zip(q.b_mat().iter())
            .map(|(t, w)| w * t.powi(5))
            .sum();
        assert_relative_eq!(integral, 1.0 / 6.0, epsilon = 1e-14);
        assert!(!q.left_is_node() && !q.right_is_node());
    }

    #[test]
    fn test_invalid_node_counts_and_sets() {
        assert!(CollocationQuadrature::new(QuadratureType::GaussLobatto, 1).is_err());
        assert!(CollocationQuadrature::from_nodes(vec![]).is_err());
        assert!(CollocationQuadrature::from_nodes(vec![0.5, 0.2]).is_err());
        assert!(CollocationQuadrature::from_nodes(vec![0.5, 1.5]).is_err());

        let custom = CollocationQuadrature::from_nodes(vec![0.0, 0.5, 1.0]).unwrap();
        assert!(custom.left_is_node() && custom.right_is_node());
        assert!(custom.kind().is_none());
    }
}
