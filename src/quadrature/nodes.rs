//! Node placement on the unit interval
//!
//! Gauss-type nodes are the roots of Legendre polynomial combinations and
//! are found with Newton's method started from Chebyshev-like guesses. All
//! functions return ascending nodes in `[0, 1]`.
//!
//! | Rule             | Polynomial on [-1, 1]          | Endpoints        |
//! |------------------|--------------------------------|------------------|
//! | Gauss-Legendre   | `P_n`                          | none             |
//! | Gauss-Lobatto    | `(1 - x²) P'_{n-1}`            | both             |
//! | Gauss-Radau      | `P_{n-1} + P_n` (reflected)    | right only       |
//! | Clenshaw-Curtis  | Chebyshev extrema              | both             |
//! | Uniform          | equidistant                    | both             |

use std::f64::consts::PI;

const MAX_NEWTON_ITERATIONS: usize = 100;
const NEWTON_TOLERANCE: f64 = 4.0 * f64::EPSILON;

/// `(P_{n-1}(x), P_n(x))` by the three-term recurrence, `n >= 1`
fn legendre_pair(n: usize, x: f64) -> (f64, f64) {
    let mut previous = 1.0;
    let mut current = x;
    for k in 2..=n {
        let k = k as f64;
        let next = ((2.0 * k - 1.0) * x * current - (k - 1.0) * previous) / k;
        previous = current;
        current = next;
    }
    (previous, current)
}

fn to_unit_interval(mut points: Vec<f64>) -> Vec<f64> {
    for x in points.iter_mut() {
        *x = ((1.0 - *x) / 2.0).clamp(0.0, 1.0);
    }
    points.sort_by(|a, b| a.total_cmp(b));
    points
}

/// Roots of `P_n`, `n >= 1`
pub fn gauss_legendre(n: usize) -> Vec<f64> {
    let points = (0..n)
        .map(|i| {
            let mut z = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
            for _ in 0..MAX_NEWTON_ITERATIONS {
                let (p_prev, p) = legendre_pair(n, z);
                let derivative = n as f64 * (z * p - p_prev) / (z * z - 1.0);
                let step = p / derivative;
                z -= step;
                if step.abs() <= NEWTON_TOLERANCE {
                    break;
                }
            }
            z
        })
        .collect();

    to_unit_interval(points)
}

/// Gauss-Lobatto points including both endpoints, `n >= 2`
pub fn gauss_lobatto(n: usize) -> Vec<f64> {
    let degree = n - 1;

    let points = (0..n)
        .map(|j| {
            let mut x = (PI * j as f64 / degree as f64).cos();
            if j == 0 || j == degree {
                return x.signum();
            }
            for _ in 0..MAX_NEWTON_ITERATIONS {
                let (p_prev, p) = legendre_pair(degree, x);
                let step = (x * p - p_prev) / (n as f64 * p);
                x -= step;
                if step.abs() <= NEWTON_TOLERANCE {
                    break;
                }
            }
            x
        })
        .collect();

    to_unit_interval(points)
}

/// Gauss-Radau points including the right endpoint, `n >= 1`
pub fn gauss_radau_right(n: usize) -> Vec<f64> {
    // left Radau points on [-1, 1] (fixed at -1); the map to [0, 1]
    // reflects them onto the right endpoint
    let points = (0..n)
        .map(|j| {
            if j == 0 {
                return -1.0;
            }
            let mut x = -(2.0 * PI * j as f64 / (2.0 * n as f64 - 1.0)).cos();
            for _ in 0..MAX_NEWTON_ITERATIONS {
                let (p_prev, p) = legendre_pair(n, x);
                let step = ((1.0 - x) / n as f64) * (p_prev + p) / (p_prev - p);
                x -= step;
                if step.abs() <= NEWTON_TOLERANCE {
                    break;
                }
            }
            x
        })
        .collect();

    to_unit_interval(points)
}

/// Chebyshev extrema including both endpoints, `n >= 2`
pub fn clenshaw_curtis(n: usize) -> Vec<f64> {
    let points = (0..n)
        .map(|j| (PI * j as f64 / (n - 1) as f64).cos())
        .collect();
    to_unit_interval(points)
}

/// Equidistant points including both endpoints, `n >= 2`
pub fn uniform(n: usize) -> Vec<f64> {
    (0..n).map(|j| j as f64 / (n - 1) as f64).collect()
}
