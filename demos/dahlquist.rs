//! Example: SDC on the Dahlquist test equation
//!
//! Sweeps `u' = λ_E u + λ_I u` with a growing number of iterations and
//! prints the error of each run, showing the order gained per sweep.
//!
//! ```bash
//! cargo run --example dahlquist -- --lambda_expl=-0.5 --lambda_impl=-2 --dt=0.1
//! ```

use std::sync::Arc;

use clap::Parser;
use pfasst_rs::config::RunArgs;
use pfasst_rs::prelude::*;

/// SDC error against the number of sweeps on `u' = λ_E u + λ_I u`
#[derive(Parser, Debug)]
#[command(name = "dahlquist")]
struct Cli {
    /// Explicit part of λ
    #[arg(long = "lambda_expl", default_value_t = -0.5, allow_negative_numbers = true)]
    lambda_expl: f64,

    /// Implicit part of λ
    #[arg(long = "lambda_impl", default_value_t = -1.0, allow_negative_numbers = true)]
    lambda_impl: f64,

    /// Gauss-Radau nodes
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    #[command(flatten)]
    run: RunArgs,
}

fn run(cli: &Cli, options: &Options, max_iterations: usize) -> Result<(usize, f64)> {
    let problem = Dahlquist::new(cli.lambda_expl, cli.lambda_impl);
    let initial = problem.initial_state();

    let sweeper = Sweeper::new(Box::new(Imex::new(problem.clone())), Arc::new(VectorFactory::new(1)))
        .with_quadrature(quadrature_factory(cli.nodes, QuadratureType::GaussRadau)?);

    let mut sdc = Sdc::new();
    let controller = sdc.controller_mut();
    controller.add_sweeper(sweeper, false);
    controller.set_observer(pfasst_rs::controller::SilentObserver);
    let status = controller.status_mut();
    status.set_dt(0.1);
    status.set_t_end(1.0);
    controller.set_options(options)?;
    controller.status_mut().set_max_iterations(max_iterations);

    sdc.setup()?;
    *sdc.controller_mut().finest_mut()?.initial_state_mut() = initial;
    let result = sdc.run()?;
    let exact = problem.exact(result.final_time())?;

    Ok((result.num_steps(), (result.final_state[0] - exact[0]).abs()))
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let cli = Cli::parse();
    let options = Options::from(&cli.run);

    println!("Dahlquist λ_E = {}, λ_I = {}\n", cli.lambda_expl, cli.lambda_impl);
    println!("{:>10} {:>8} {:>14}", "sweeps", "steps", "error");

    for sweeps in 0..=6 {
        let (steps, error) = run(&cli, &options, sweeps)?;
        println!("{:>10} {:>8} {:>14.6e}", sweeps, steps, error);
    }

    Ok(())
}
