//! Dense vector state
//!
//! [`VectorEncapsulation`] stores its payload in a `nalgebra::DVector<f64>`.
//! The contiguous storage is what goes over the wire unchanged: `send`,
//! `recv` and `bcast` hand the slice directly to the communicator.

use std::ops::{Index, IndexMut};

use nalgebra::DVector;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::comm::Communicator;
use crate::encap::{StateContainer, StateFactory, nan_max, parallel_threshold};
use crate::error::{Result, ensure_size};

/// Dense `f64` state vector
#[derive(Clone, Debug, PartialEq)]
pub struct VectorEncapsulation {
    data: DVector<f64>,
}

impl VectorEncapsulation {
    /// Zero vector of length `size`
    pub fn zeros(size: usize) -> Self {
        Self { data: DVector::zeros(size) }
    }

    pub fn from_slice(values: &[f64]) -> Self {
        Self { data: DVector::from_column_slice(values) }
    }

    pub fn from_vec(values: Vec<f64>) -> Self {
        Self { data: DVector::from_vec(values) }
    }

    /// Vector of length `size` filled with `f(i)`
    pub fn from_fn(size: usize, f: impl Fn(usize) -> f64) -> Self {
        Self { data: DVector::from_fn(size, |i, _| f(i)) }
    }

    pub fn data(&self) -> &DVector<f64> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DVector<f64> {
        &mut self.data
    }

    pub fn as_slice(&self) -> &[f64] {
        self.data.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [f64] {
        self.data.as_mut_slice()
    }

    pub fn into_inner(self) -> DVector<f64> {
        self.data
    }
}

impl From<DVector<f64>> for VectorEncapsulation {
    fn from(data: DVector<f64>) -> Self {
        Self { data }
    }
}

impl AsRef<[f64]> for VectorEncapsulation {
    fn as_ref(&self) -> &[f64] {
        self.data.as_slice()
    }
}

impl Index<usize> for VectorEncapsulation {
    type Output = f64;

    fn index(&self, index: usize) -> &f64 {
        &self.data[index]
    }
}

impl IndexMut<usize> for VectorEncapsulation {
    fn index_mut(&mut self, index: usize) -> &mut f64 {
        &mut self.data[index]
    }
}

impl StateContainer for VectorEncapsulation {
    fn len(&self) -> usize {
        self.data.len()
    }

    fn zero(&mut self) {
        self.data.fill(0.0);
    }

    fn scaled_add(&mut self, a: f64, other: &Self) -> Result<()> {
        ensure_size("scaled_add", self.data.len(), other.data.len())?;

        if self.data.len() > parallel_threshold() {
            #[cfg(feature = "parallel")]
            self.data
                .as_mut_slice()
                .par_iter_mut()
                .zip(other.data.as_slice().par_iter())
                .for_each(|(x, y)| *x += a * y);
            #[cfg(not(feature = "parallel"))]
            self.data.axpy(a, &other.data, 1.0);
        } else {
            self.data.axpy(a, &other.data, 1.0);
        }

        Ok(())
    }

    fn norm0(&self) -> f64 {
        // empty payloads report the additive identity
        self.data.iter().fold(0.0_f64, |acc, x| nan_max(acc, x.abs()))
    }

    fn copy_from(&mut self, other: &Self) -> Result<()> {
        ensure_size("copy_from", self.data.len(), other.data.len())?;
        self.data.copy_from(&other.data);
        Ok(())
    }

    fn is_finite(&self) -> bool {
        self.data.iter().all(|x| x.is_finite())
    }

    fn send(&self, comm: &dyn Communicator, dest: usize, tag: i32, blocking: bool) -> Result<()> {
        if blocking {
            comm.send(self.data.as_slice(), dest, tag)
        } else {
            comm.isend(self.data.as_slice(), dest, tag)
        }
    }

    fn recv(&mut self, comm: &dyn Communicator, src: usize, tag: i32, blocking: bool) -> Result<()> {
        if blocking {
            comm.recv(self.data.as_mut_slice(), src, tag)
        } else {
            comm.irecv(src, tag)
        }
    }

    fn bcast(&mut self, comm: &dyn Communicator, root: usize) -> Result<()> {
        comm.bcast(self.data.as_mut_slice(), root)
    }
}

// =================================================================================================
// Factory
// =================================================================================================

/// Creates zero vectors of a fixed length
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VectorFactory {
    size: usize,
}

impl VectorFactory {
    pub fn new(size: usize) -> Self {
        Self { size }
    }

    pub fn set_size(&mut self, size: usize) {
        self.size = size;
    }
}

impl StateFactory<VectorEncapsulation> for VectorFactory {
    fn create(&self) -> VectorEncapsulation {
        VectorEncapsulation::zeros(self.size)
    }

    fn size(&self) -> usize {
        self.size
    }
}

// =================================================================================================
// Tests
// =================================================================================================
