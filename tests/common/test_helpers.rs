//! Helper functions for integration tests

use std::sync::Arc;

use pfasst_rs::prelude::*;
use pfasst_rs::transfer::SpatialTransfer;

/// Time domain and iteration settings shared by the builders
#[derive(Clone, Copy, Debug)]
pub struct RunSetup {
    pub dt: f64,
    pub t_end: f64,
    pub max_iterations: usize,
    pub abs_tol: f64,
    pub num_nodes: usize,
    pub kind: QuadratureType,
}

impl RunSetup {
    pub fn new(dt: f64, t_end: f64, max_iterations: usize) -> Self {
        Self {
            dt,
            t_end,
            max_iterations,
            abs_tol: 0.0,
            num_nodes: 3,
            kind: QuadratureType::GaussLobatto,
        }
    }

    pub fn tol(mut self, abs_tol: f64) -> Self {
        self.abs_tol = abs_tol;
        self
    }

    pub fn nodes(mut self, num_nodes: usize, kind: QuadratureType) -> Self {
        self.num_nodes = num_nodes;
        self.kind = kind;
        self
    }

    fn apply(&self, controller: &mut Controller<VectorEncapsulation>) {
        let status = controller.status_mut();
        status.set_dt(self.dt);
        status.set_t_end(self.t_end);
        status.set_max_iterations(self.max_iterations);
    }
}

fn level<P>(problem: P, size: usize, setup: &RunSetup, name: &str) -> Sweeper<VectorEncapsulation>
where
    P: ImexProblem<VectorEncapsulation> + 'static,
{
    let quadrature = quadrature_factory(setup.num_nodes, setup.kind).expect("valid quadrature");
    let mut sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(size)))
        .with_quadrature(quadrature)
        .with_name(name);
    sweeper.set_abs_residual_tol(setup.abs_tol);
    sweeper
}

/// Set up single-level SDC and assign the initial state
pub fn build_sdc<P>(problem: P, initial: VectorEncapsulation, setup: RunSetup) -> Sdc<VectorEncapsulation>
where
    P: ImexProblem<VectorEncapsulation> + 'static,
{
    let mut sdc = Sdc::new();
    sdc.controller_mut().add_sweeper(level(problem, initial.len(), &setup, "fine"), false);
    setup.apply(sdc.controller_mut());
    sdc.setup().expect("SDC setup");
    *sdc.controller_mut().finest_mut().unwrap().initial_state_mut() = initial;
    sdc
}

/// Coarse and fine level of a two-level hierarchy
pub struct TwoLevelSetup<P, S> {
    pub fine: P,
    pub coarse: P,
    pub coarse_size: usize,
    pub space: S,
}

impl<P: Clone> TwoLevelSetup<P, IdentitySpace> {
    /// Both levels solve `problem` on the same grid
    pub fn identical(problem: P, size: usize) -> Self {
        Self {
            fine: problem.clone(),
            coarse: problem,
            coarse_size: size,
            space: IdentitySpace,
        }
    }
}

impl TwoLevelSetup<AdvectionDiffusion, PeriodicLinear1d> {
    /// Advection-diffusion with the coarse level on every second grid point
    pub fn coarsened(num_points: usize, velocity: f64, viscosity: f64) -> Self {
        Self {
            fine: AdvectionDiffusion::new(num_points, velocity, viscosity),
            coarse: AdvectionDiffusion::new(num_points / 2, velocity, viscosity),
            coarse_size: num_points / 2,
            space: PeriodicLinear1d,
        }
    }
}

fn assemble<T, P, S>(
    mut integrator: T,
    levels: TwoLevelSetup<P, S>,
    initial: VectorEncapsulation,
    setup: RunSetup,
) -> Result<T>
where
    T: TimeIntegrator<VectorEncapsulation>,
    P: ImexProblem<VectorEncapsulation> + 'static,
    S: SpatialTransfer<VectorEncapsulation> + 'static,
{
    let controller = integrator.controller_mut();
    controller.add_sweeper(level(levels.fine, initial.len(), &setup, "fine"), false);
    controller.add_sweeper(level(levels.coarse, levels.coarse_size, &setup, "coarse"), true);
    controller.set_transfer(FasTransfer::new(levels.space));
    setup.apply(controller);
    integrator.setup()?;
    *integrator.controller_mut().finest_mut()?.initial_state_mut() = initial;
    Ok(integrator)
}

/// Set up two-level MLSDC with identical levels
pub fn build_mlsdc<P>(problem: P, initial: VectorEncapsulation, setup: RunSetup) -> TwoLevelMlsdc<VectorEncapsulation>
where
    P: ImexProblem<VectorEncapsulation> + Clone + 'static,
{
    let levels = TwoLevelSetup::identical(problem, initial.len());
    build_mlsdc_levels(levels, initial, setup)
}

/// Set up two-level MLSDC on the given hierarchy
pub fn build_mlsdc_levels<P, S>(
    levels: TwoLevelSetup<P, S>,
    initial: VectorEncapsulation,
    setup: RunSetup,
) -> TwoLevelMlsdc<VectorEncapsulation>
where
    P: ImexProblem<VectorEncapsulation> + 'static,
    S: SpatialTransfer<VectorEncapsulation> + 'static,
{
    assemble(TwoLevelMlsdc::new(), levels, initial, setup).expect("MLSDC setup")
}

/// Set up two-level PFASST with identical levels on one rank of a world
pub fn build_pfasst<P>(
    comm: Arc<dyn Communicator>,
    problem: P,
    initial: VectorEncapsulation,
    setup: RunSetup,
) -> Result<TwoLevelPfasst<VectorEncapsulation>>
where
    P: ImexProblem<VectorEncapsulation> + Clone + 'static,
{
    let levels = TwoLevelSetup::identical(problem, initial.len());
    build_pfasst_levels(comm, levels, initial, setup)
}

/// Set up two-level PFASST on the given hierarchy on one rank of a world
pub fn build_pfasst_levels<P, S>(
    comm: Arc<dyn Communicator>,
    levels: TwoLevelSetup<P, S>,
    initial: VectorEncapsulation,
    setup: RunSetup,
) -> Result<TwoLevelPfasst<VectorEncapsulation>>
where
    P: ImexProblem<VectorEncapsulation> + 'static,
    S: SpatialTransfer<VectorEncapsulation> + 'static,
{
    let mut pfasst = TwoLevelPfasst::new();
    pfasst.controller_mut().set_communicator(comm);
    pfasst.controller_mut().set_observer(pfasst_rs::controller::SilentObserver);
    assemble(pfasst, levels, initial, setup)
}

/// Largest entrywise difference
pub fn max_abs_error(actual: &VectorEncapsulation, expected: &VectorEncapsulation) -> f64 {
    assert_eq!(actual.len(), expected.len(), "state lengths differ");
    actual
        .as_slice()
        .iter()
        .zip(expected.as_slice())
        .map(|(a, e)| (a - e).abs())
        .fold(0.0, f64::max)
}

/// Observed orders `log2(e_i / e_{i+1})` for errors at halved step widths
pub fn convergence_orders(errors: &[f64]) -> Vec<f64> {
    errors.windows(2).map(|w| (w[0] / w[1]).log2()).collect()
}

/// Compute relative error: |actual - expected| / |expected|
pub fn relative_error(actual: f64, expected: f64) -> f64 {
    if expected.abs() < 1e-10 {
        (actual - expected).abs()
    } else {
        (actual - expected).abs() / expected.abs()
    }
}
