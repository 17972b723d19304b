//! Controller behaviour observable through the public API

use std::sync::Arc;

use clap::Parser;
use parking_lot::Mutex;
use pfasst_rs::config::RunArgs;
use pfasst_rs::controller::RunObserver;
use pfasst_rs::prelude::*;

mod common;
use common::{DampedRotation, RunSetup, build_sdc};

#[derive(Default)]
struct Counts {
    iterations: usize,
    steps: Vec<usize>,
}

struct CountingObserver(Arc<Mutex<Counts>>);

impl RunObserver for CountingObserver {
    fn on_iteration(&mut self, _status: &Status) {
        self.0.lock().iterations += 1;
    }

    fn on_step(&mut self, status: &Status) {
        self.0.lock().steps.push(status.step());
    }
}

#[test]
fn test_observer_sees_every_check_and_step() {
    let problem = DampedRotation::new(1.0, 0.5);
    let initial = problem.initial_state();
    let mut sdc = build_sdc(problem, initial, RunSetup::new(0.25, 1.0, 3));

    let counts = Arc::new(Mutex::new(Counts::default()));
    sdc.controller_mut().set_observer(CountingObserver(Arc::clone(&counts)));
    sdc.run().unwrap();

    let counts = counts.lock();
    // checks after the predictor and after each of the three sweeps
    assert_eq!(counts.iterations, 4 * 4);
    assert_eq!(counts.steps, vec![0, 1, 2, 3]);
}

#[test]
fn test_options_from_command_line() {
    let problem = Dahlquist::new(-1.0, 0.0);
    let initial = problem.initial_state();
    let sweeper = Sweeper::new(Box::new(Imex::new(problem)), Arc::new(VectorFactory::new(1)))
        .with_quadrature(quadrature_factory(3, QuadratureType::GaussLobatto).unwrap());

    let args = RunArgs::try_parse_from(["sdc", "--dt=0.05", "--num_steps", "6", "--max_iters=2", "--abs_res_tol=1e-9"])
        .unwrap();
    let options = Options::from(&args);

    let mut sdc = Sdc::new();
    sdc.controller_mut().add_sweeper(sweeper, false);
    sdc.controller_mut().set_options(&options).unwrap();
    sdc.setup().unwrap();
    *sdc.controller_mut().finest_mut().unwrap().initial_state_mut() = initial;

    let status = *sdc.controller().status();
    assert_eq!(status.num_steps(), 6);
    assert_eq!(status.max_iterations(), 2);
    assert!((status.t_end() - 0.3).abs() < 1e-12);
    assert_eq!(sdc.controller().finest().unwrap().abs_residual_tol(), 1e-9);

    assert_eq!(sdc.run().unwrap().num_steps(), 6);
}

#[test]
fn test_invalid_option_value() {
    let mut sdc: Sdc<VectorEncapsulation> = Sdc::new();
    let err = sdc
        .controller_mut()
        .set_options(&Options::new().with("dt", "fast"))
        .unwrap_err();
    assert!(matches!(err, PfasstError::InvalidOption { ref key, .. } if key == "dt"));
}

#[test]
fn test_changing_time_domain_requires_new_setup() {
    let problem = DampedRotation::new(1.0, 0.5);
    let initial = problem.initial_state();
    let mut sdc = build_sdc(problem, initial, RunSetup::new(0.25, 1.0, 3));
    assert!(sdc.controller().is_ready());

    sdc.controller_mut().status_mut().set_dt(0.3);
    assert!(!sdc.controller().is_ready());
    assert!(matches!(sdc.run(), Err(PfasstError::Configuration(_))));
    assert!(matches!(sdc.setup(), Err(PfasstError::Configuration(_))));
}

#[test]
fn test_nan_state_is_reported() {
    let problem = Dahlquist::new(0.0, -1.0);
    let mut sdc = build_sdc(problem, VectorEncapsulation::from_slice(&[f64::NAN]), RunSetup::new(0.5, 1.0, 1));

    assert!(matches!(sdc.run(), Err(PfasstError::Numerical(_))));
}

#[test]
fn test_status_travels_between_ranks() {
    let mut world = ThreadCommunicator::world(2);
    let second = world.pop().unwrap();
    let first = world.pop().unwrap();

    let mut status = Status::new();
    status.set_step(3);
    status.set_iteration(2);
    status.set_dt(0.125);
    status.set_state(State::Converged);
    status.send(&first, 1, 11, true).unwrap();

    let mut received = Status::new();
    received.recv(&second, 0, 11, true).unwrap();
    assert_eq!(received, status);
}
