//! Example: periodic advection-diffusion with SDC, MLSDC or PFASST
//!
//! Integrates a single Fourier mode on the periodic unit interval and
//! compares the final state against the exact solution of the
//! semi-discrete system.
//!
//! ```bash
//! RUST_LOG=pfasst=info cargo run --example heat1d -- --algorithm=pfasst --ranks=4
//! cargo run --example heat1d -- --algorithm=mlsdc --num_points=128 --output=/tmp/heat
//! ```
//!
//! Run `cargo run --example heat1d -- --help` for all options.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use clap::{Parser, ValueEnum};
use pfasst_rs::config::RunArgs;
use pfasst_rs::output::{CsvConfig, CsvExporter, CsvMetadata, Exporter};
use pfasst_rs::prelude::*;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Algorithm {
    Sdc,
    Mlsdc,
    Pfasst,
}

/// Periodic advection-diffusion with SDC, MLSDC or PFASST
#[derive(Parser, Debug)]
#[command(name = "heat1d")]
struct Cli {
    /// Integrator to run
    #[arg(long, value_enum, default_value_t = Algorithm::Mlsdc)]
    algorithm: Algorithm,

    /// PFASST ranks
    #[arg(long, default_value_t = 4)]
    ranks: usize,

    /// Fine grid size, even
    #[arg(long = "num_points", default_value_t = 64)]
    num_points: usize,

    /// Advection velocity
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    velocity: f64,

    /// Diffusion coefficient
    #[arg(long, default_value_t = 0.02)]
    viscosity: f64,

    /// Gauss-Lobatto nodes per level
    #[arg(long, default_value_t = 5)]
    nodes: usize,

    /// Directory for CSV history and trajectory
    #[arg(long)]
    output: Option<PathBuf>,

    #[command(flatten)]
    run: RunArgs,
}

struct Setup {
    num_points: usize,
    velocity: f64,
    viscosity: f64,
    nodes: usize,
    options: Options,
}

impl Setup {
    fn problem(&self, num_points: usize) -> AdvectionDiffusion {
        AdvectionDiffusion::new(num_points, self.velocity, self.viscosity)
    }

    fn level(&self, num_points: usize, name: &str) -> Result<Sweeper<VectorEncapsulation>> {
        Ok(Sweeper::new(Box::new(Imex::new(self.problem(num_points))), Arc::new(VectorFactory::new(num_points)))
            .with_quadrature(quadrature_factory(self.nodes, QuadratureType::GaussLobatto)?)
            .with_name(name))
    }

    fn defaults(controller: &mut Controller<VectorEncapsulation>) {
        let status = controller.status_mut();
        status.set_dt(0.01);
        status.set_t_end(0.32);
        status.set_max_iterations(8);
    }

    fn two_level<T: TimeIntegrator<VectorEncapsulation>>(&self, mut integrator: T) -> Result<T> {
        let controller = integrator.controller_mut();
        controller.add_sweeper(self.level(self.num_points, "fine")?, false);
        controller.add_sweeper(self.level(self.num_points / 2, "coarse")?, true);
        controller.set_transfer(FasTransfer::new(PeriodicLinear1d));
        Self::defaults(controller);
        controller.set_options(&self.options)?;

        integrator.setup()?;
        *integrator.controller_mut().finest_mut()?.initial_state_mut() = self.problem(self.num_points).initial_state();
        Ok(integrator)
    }

    fn sdc(&self) -> Result<Sdc<VectorEncapsulation>> {
        let mut sdc = Sdc::new();
        let controller = sdc.controller_mut();
        controller.add_sweeper(self.level(self.num_points, "fine")?, false);
        Self::defaults(controller);
        controller.set_options(&self.options)?;

        sdc.setup()?;
        *sdc.controller_mut().finest_mut()?.initial_state_mut() = self.problem(self.num_points).initial_state();
        Ok(sdc)
    }
}

fn max_error(state: &VectorEncapsulation, exact: &VectorEncapsulation) -> f64 {
    state
        .as_slice()
        .iter()
        .zip(exact.as_slice())
        .map(|(u, e)| (u - e).abs())
        .fold(0.0, f64::max)
}

fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("pfasst=warn")).init();

    let cli = Cli::parse();
    let setup = Setup {
        num_points: cli.num_points,
        velocity: cli.velocity,
        viscosity: cli.viscosity,
        nodes: cli.nodes,
        options: Options::from(&cli.run),
    };

    println!("═══════════════════════════════════════════════════════");
    println!("  Periodic advection-diffusion, {:?}", cli.algorithm);
    println!("═══════════════════════════════════════════════════════\n");
    println!("  grid points : {}", setup.num_points);
    println!("  velocity    : {}", setup.velocity);
    println!("  viscosity   : {}", setup.viscosity);
    println!("  nodes       : {} (Gauss-Lobatto)\n", setup.nodes);

    let start = Instant::now();
    let results = match cli.algorithm {
        Algorithm::Sdc => vec![setup.sdc()?.run()?],
        Algorithm::Mlsdc => vec![setup.two_level(TwoLevelMlsdc::new())?.run()?],
        Algorithm::Pfasst => run_pfasst_world(cli.ranks, |comm| {
            let mut pfasst = TwoLevelPfasst::new();
            pfasst.controller_mut().set_communicator(comm);
            setup.two_level(pfasst)
        })?,
    };
    let elapsed = start.elapsed();

    let last = results.last().ok_or("no result")?;
    let exact = setup.problem(setup.num_points).exact(last.final_time())?;

    println!("Results:");
    for (rank, result) in results.iter().enumerate() {
        println!(
            "  rank {}: {} steps, {} iterations",
            rank,
            result.num_steps(),
            result.total_iterations()
        );
    }
    println!("  final time  : {:.6}", last.final_time());
    println!("  max error   : {:.6e}", max_error(&last.final_state, &exact));
    println!("  wall time   : {:.3} s", elapsed.as_secs_f64());

    if let Some(dir) = cli.output {
        std::fs::create_dir_all(&dir)?;
        for (rank, result) in results.iter().enumerate() {
            let metadata = CsvMetadata::from_result(result).with_problem("advection-diffusion");
            let exporter = CsvExporter::new(CsvConfig::default().with_metadata(metadata));
            exporter.export_history(result, dir.join(format!("history_{}.csv", rank)))?;
            exporter.export_trajectory(result, None, dir.join(format!("trajectory_{}.csv", rank)))?;
        }
        println!("\n  CSV written to {}", dir.display());
    }

    Ok(())
}
