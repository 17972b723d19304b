//! Spatial operators between two grids

use crate::encap::{StateContainer, VectorEncapsulation};
use crate::error::{Result, ensure_size};

/// Prolongation and restriction of a single state
pub trait SpatialTransfer<E: StateContainer>: Send {
    /// Overwrite `fine` with the prolongation of `coarse`
    fn interpolate(&self, coarse: &E, fine: &mut E) -> Result<()>;

    /// Overwrite `coarse` with the restriction of `fine`
    fn restrict(&self, fine: &E, coarse: &mut E) -> Result<()>;
}

/// Both levels share one grid
#[derive(Clone, Copy, Debug, Default)]
pub struct IdentitySpace;

impl<E: StateContainer> SpatialTransfer<E> for IdentitySpace {
    fn interpolate(&self, coarse: &E, fine: &mut E) -> Result<()> {
        fine.copy_from(coarse)
    }

    fn restrict(&self, fine: &E, coarse: &mut E) -> Result<()> {
        coarse.copy_from(fine)
    }
}

/// Periodic 1D grids where the fine grid has twice the points of the coarse one
///
/// ```text
/// coarse:  x_0       x_1       x_2   ...
/// fine:    x_0  x_½  x_1  x_3/2 x_2  ...
/// ```
///
/// Interpolation is linear with wrap-around, restriction is injection.
#[derive(Clone, Copy, Debug, Default)]
pub struct PeriodicLinear1d;

impl SpatialTransfer<VectorEncapsulation> for PeriodicLinear1d {
    fn interpolate(&self, coarse: &VectorEncapsulation, fine: &mut VectorEncapsulation) -> Result<()> {
        let n = coarse.len();
        ensure_size("periodic interpolation", 2 * n, fine.len())?;

        for i in 0..n {
            let right = coarse[(i + 1) % n];
            fine[2 * i] = coarse[i];
            fine[2 * i + 1] = 0.5 * (coarse[i] + right);
        }
        Ok(())
    }

    fn restrict(&self, fine: &VectorEncapsulation, coarse: &mut VectorEncapsulation) -> Result<()> {
        let n = coarse.len();
        ensure_size("periodic restriction", 2 * n, fine.len())?;

        for i in 0..n {
            coarse[i] = fine[2 * i];
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PfasstError;
    use approx::assert_relative_eq;

    #[test]
    fn test_periodic_interpolation_wraps_around() {
        let coarse = VectorEncapsulation::from_slice(&[1.0, 3.0, 5.0]);
        let mut fine = VectorEncapsulation::zeros(6);

        PeriodicLinear1d.interpolate(&coarse, &mut fine).unwrap();
        assert_eq!(fine.as_slice(), &[1.0, 2.0, 3.0, 4.0, 5.0, 3.0]);
    }

    #[test]
    fn test_restriction_after_interpolation_is_identity() {
        let coarse = VectorEncapsulation::from_fn(8, |i| (i as f64 * 0.7).sin());
        let mut fine = VectorEncapsulation::zeros(16);
        let mut back = VectorEncapsulation::zeros(8);

        PeriodicLinear1d.interpolate(&coarse, &mut fine).unwrap();
        PeriodicLinear1d.restrict(&fine, &mut back).unwrap();
        for i in 0..8 {
            assert_relative_eq!(back[i], coarse[i]);
        }
    }

    #[test]
    fn test_periodic_transfer_requires_two_to_one_grids() {
        let coarse = VectorEncapsulation::zeros(4);
        let mut fine = VectorEncapsulation::zeros(7);

        let err = PeriodicLinear1d.interpolate(&coarse, &mut fine).unwrap_err();
        assert!(matches!(err, PfasstError::SizeMismatch { expected: 8, found: 7, .. }));
    }

    #[test]
    fn test_identity_space_copies() {
        let fine = VectorEncapsulation::from_slice(&[1.0, 2.0]);
        let mut coarse = VectorEncapsulation::zeros(2);

        SpatialTransfer::<VectorEncapsulation>::restrict(&IdentitySpace, &fine, &mut coarse).unwrap();
        assert_eq!(coarse, fine);
    }
}
