//! Partitions points by their distance to a random pivot across in-process ranks, or across the
//! processes of an MPI run with `--mpi`.
//!
//! Points are either drawn uniformly from the unit cube or read from a point file, see
//! [`ndarray_pivot::dataset`].

use anyhow::{Context, bail};
use clap::Parser;
use ndarray_pivot::{
	Config, Error, LocalPoints, Pivot, Report, comm::Communicator, dataset, local,
	ndarray::Array2,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use std::{fs::File, io::BufReader, path::PathBuf};
use tracing_subscriber::{EnvFilter, fmt};

/// Partitions points by their distance to a random pivot.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
	/// Number of ranks, a power of two, ignored with `--mpi`.
	#[arg(short, long, default_value_t = 4)]
	processes: usize,
	/// Runs one rank per process of the surrounding MPI run.
	#[cfg(feature = "mpi")]
	#[arg(long)]
	mpi: bool,
	/// Points generated per rank, ignored with `--input`.
	#[arg(short = 'n', long, default_value_t = 1024)]
	points_per_process: usize,
	/// Dimensions of generated points, ignored with `--input`.
	#[arg(short, long, default_value_t = 3)]
	dims: usize,
	/// Seed of the pivot choice and of generated points.
	#[arg(short, long, default_value_t = 0)]
	seed: u64,
	/// Point file of little-endian `i64` dimensions and count followed by `f32` coordinates.
	#[arg(short, long)]
	input: Option<PathBuf>,
	/// Balancing rounds per level before giving up, defaulting to the group size.
	#[arg(short, long)]
	max_rounds: Option<usize>,
	/// Skips the order check.
	#[arg(long)]
	no_validate: bool,
	/// Verbosity level (-v, -vv, -vvv).
	#[arg(short, long, action = clap::ArgAction::Count)]
	verbose: u8,
}

// What a rank reports back once partitioned.
struct Outcome {
	points: usize,
	bounds: (f32, f32),
	report: Report<f32>,
}

fn main() -> anyhow::Result<()> {
	let cli = Cli::parse();

	let filter = match cli.verbose {
		0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
		1 => EnvFilter::new("info"),
		2 => EnvFilter::new("debug"),
		_ => EnvFilter::new("trace"),
	};
	fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	if cli.input.is_none() && (cli.points_per_process == 0 || cli.dims == 0) {
		bail!("generated points need at least one point per rank and one dimension");
	}
	let mut config = Config::default().with_validation(!cli.no_validate);
	if let Some(max_rounds) = cli.max_rounds {
		config = config.with_max_rounds(max_rounds);
	}
	config.validate()?;

	#[cfg(feature = "mpi")]
	{
		if cli.mpi {
			return run_mpi(&cli, &config);
		}
	}

	let results = local::run(cli.processes, |comm| run(&cli, &config, &comm))
		.context("ranks did not complete")?;
	// Peers of a failed rank merely see it disconnect.
	let failed = results
		.iter()
		.enumerate()
		.filter_map(|(rank, result)| Some((rank, result.as_ref().err()?)))
		.min_by_key(|(_, error)| matches!(error.root_cause(), Error::Disconnected { .. }));
	if let Some((rank, error)) = failed {
		bail!("rank {rank} failed: {error}");
	}
	let outcomes = results.into_iter().collect::<Result<Vec<_>, _>>()?;

	for (rank, outcome) in outcomes.iter().enumerate() {
		print_outcome(rank, outcome);
	}
	match outcomes.first() {
		Some(outcome) => check_verdict(outcome),
		None => Ok(()),
	}
}

#[cfg(feature = "mpi")]
fn run_mpi(cli: &Cli, config: &Config) -> anyhow::Result<()> {
	let universe = mpi::initialize().context("MPI was initialized before")?;
	let comm = ndarray_pivot::process::MpiComm::new(universe.world());
	let outcome = run(cli, config, &comm).with_context(|| format!("rank {} failed", comm.rank()))?;
	print_outcome(comm.rank(), &outcome);
	if comm.rank() == 0 {
		check_verdict(&outcome)?;
	}
	Ok(())
}

fn print_outcome(rank: usize, outcome: &Outcome) {
	let (min, max) = outcome.bounds;
	println!(
		"rank {rank:>4}: {} points, distances {min:.6} ..= {max:.6}, {} rounds",
		outcome.points,
		outcome.report.rounds()
	);
}

fn check_verdict(outcome: &Outcome) -> anyhow::Result<()> {
	match &outcome.report.verdict {
		Some(verdict) if verdict.is_ordered() => println!("ordered"),
		Some(verdict) => bail!("ranks out of order: {:?}", verdict.out_of_order),
		None => {}
	}
	Ok(())
}

fn run<C: Communicator>(cli: &Cli, config: &Config, comm: &C) -> ndarray_pivot::Result<Outcome> {
	let points = match &cli.input {
		Some(path) => {
			let reader = if comm.rank() == 0 {
				Some(BufReader::new(File::open(path)?))
			} else {
				None
			};
			dataset::scatter::<_, f32, _>(comm, reader)?
		}
		None => {
			let mut rng = StdRng::seed_from_u64(cli.seed.wrapping_add(comm.rank() as u64 + 1));
			Array2::from_shape_fn((cli.points_per_process, cli.dims), |_| rng.random::<f32>())
		}
	};

	let mut rng = StdRng::seed_from_u64(cli.seed);
	let pivot = Pivot::choose(comm, points.view(), &mut rng)?;
	let mut local = LocalPoints::new(points, &pivot)?;
	let report = ndarray_pivot::partition(comm, &mut local, &pivot, config)?;
	Ok(Outcome {
		points: local.len(),
		bounds: local.distance_bounds(),
		report,
	})
}
