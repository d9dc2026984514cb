//! Recursive halving of the process group until every rank holds its share of the global order.
//!
//! A level computes the median distance over its group, splits the points of every member by
//! it, and balances the group so that the lower half holds the points nearest to the pivot.
//! Every member then continues with the half holding it, down to single-member groups.

use crate::{
	Error, Result, Scalar,
	balance::{Balance, balance},
	comm::Communicator,
	config::Config,
	group::ProcessGroup,
	partition::{Split, split_by_median},
	pivot::Pivot,
	points::LocalPoints,
	select,
	validate::{Verdict, validate_order},
};
use ndarray::aview_mut1;

/// Statistics of one recursion level, as seen by one member.
#[derive(Debug, Clone, PartialEq)]
pub struct Level<T> {
	/// Recursion depth, 0 for the world group.
	pub depth: usize,
	/// Members of the active group.
	pub size: usize,
	/// Median distance of the active group.
	pub median: T,
	/// Local split by the median before balancing.
	pub split: Split,
	/// Balancing outcome.
	pub balance: Balance,
}

/// Outcome of [`partition`] on one rank.
#[derive(Debug, Clone, PartialEq)]
pub struct Report<T> {
	/// One entry per recursion level, outermost first.
	pub levels: Vec<Level<T>>,
	/// Order check, if enabled.
	pub verdict: Option<Verdict>,
}

impl<T> Report<T> {
	/// Balancing rounds summed over all levels.
	pub fn rounds(&self) -> usize {
		self.levels.iter().map(|level| level.balance.rounds).sum()
	}
}

/// Returns the median of the distances held by the members of `group`.
///
/// The distances are gathered at the group root, which selects the median and broadcasts it.
pub fn group_median<C, T>(group: &ProcessGroup<'_, C>, local: &LocalPoints<T>) -> Result<T>
where
	C: Communicator,
	T: Scalar,
{
	let median = group
		.gather_scalars(&local.distances().to_vec())?
		.map(|mut distances| select::median(aview_mut1(&mut distances)))
		.transpose()?;
	group.broadcast_scalar(median)
}

/// Reorders the points of all ranks by their distance to `pivot`.
///
/// Afterwards, every point of a rank is at most as distant as every point of the next rank, up
/// to ties at a median. Every rank of `comm` must call this with the same `pivot` and `config`.
///
/// # Errors
///
/// Returns [`Error::ProcessCount`] unless the number of ranks is a power of two and
/// [`Error::UnevenLayout`] unless every rank holds as many points of as many dimensions as rank 0.
/// Errors raised within a level are wrapped in [`Error::Level`].
///
/// # Examples
///
/// ```
/// use ndarray_pivot::{Config, LocalPoints, Pivot, comm::Communicator, local, ndarray};
///
/// let values = [[8.0, 3.0], [1.0, 6.0], [5.0, 2.0], [7.0, 4.0]];
/// let held = local::run(4, |comm| -> ndarray_pivot::Result<Vec<f64>> {
/// 	let pivot = Pivot::new(ndarray::arr1(&[1.0]))?;
/// 	let points = ndarray::Array2::from_shape_vec((2, 1), values[comm.rank()].to_vec())?;
/// 	let mut local = LocalPoints::new(points, &pivot)?;
/// 	let report = ndarray_pivot::partition(&comm, &mut local, &pivot, &Config::default())?;
/// 	assert_eq!(report.levels.len(), 2);
/// 	let mut held = local.points().iter().copied().collect::<Vec<_>>();
/// 	held.sort_by(f64::total_cmp);
/// 	Ok(held)
/// })
/// .unwrap();
/// assert_eq!(held[0].as_ref().unwrap(), &[1.0, 2.0]);
/// assert_eq!(held[3].as_ref().unwrap(), &[7.0, 8.0]);
/// ```
pub fn partition<C, T>(
	comm: &C,
	local: &mut LocalPoints<T>,
	pivot: &Pivot<T>,
	config: &Config,
) -> Result<Report<T>>
where
	C: Communicator,
	T: Scalar,
{
	config.validate()?;
	let world = ProcessGroup::world(comm)?;
	if pivot.dims() != local.dims() {
		return Err(Error::DimensionMismatch {
			pivot: pivot.dims(),
			points: local.dims(),
		});
	}
	check_layout(&world, local)?;

	let mut levels = Vec::new();
	let mut group = world;
	while !group.is_terminal() {
		let level = run_level(&group, local, pivot, config).map_err(|source| Error::Level {
			depth: group.depth(),
			size: group.size(),
			source: Box::new(source),
		})?;
		levels.push(level);
		group = group.split();
	}

	let verdict = if config.validate {
		Some(validate_order(comm, local)?)
	} else {
		None
	};
	Ok(Report { levels, verdict })
}

fn check_layout<C, T>(world: &ProcessGroup<'_, C>, local: &LocalPoints<T>) -> Result<()>
where
	C: Communicator,
	T: Scalar,
{
	let layouts = world.all_gather_count_tuples(&[local.len(), local.dims()])?;
	let expected = &layouts[0];
	for (rank, layout) in layouts.iter().enumerate().skip(1) {
		if let ([points, dims], [expected_points, expected_dims]) = (&layout[..], &expected[..]) {
			if (points, dims) != (expected_points, expected_dims) {
				return Err(Error::UnevenLayout {
					rank,
					points: *points,
					dims: *dims,
					expected_points: *expected_points,
					expected_dims: *expected_dims,
				});
			}
		} else {
			return Err(Error::Malformed(format!("layout of rank {rank}")));
		}
	}
	Ok(())
}

fn run_level<C, T>(
	group: &ProcessGroup<'_, C>,
	local: &mut LocalPoints<T>,
	pivot: &Pivot<T>,
	config: &Config,
) -> Result<Level<T>>
where
	C: Communicator,
	T: Scalar,
{
	let _span = tracing::debug_span!("level", depth = group.depth(), size = group.size()).entered();

	let median = group_median(group, local)?;
	let split = split_by_median(local, median, group.side());
	let balance = balance(group, local, pivot, split, config.round_limit(group.size()))?;
	tracing::debug!(
		%median,
		kept = split.kept,
		ties = split.ties,
		discard = split.discard,
		rounds = balance.rounds,
		traded = balance.traded,
		"balanced"
	);

	Ok(Level {
		depth: group.depth(),
		size: group.size(),
		median,
		split,
		balance,
	})
}

#[cfg(test)]
mod test {
	use super::{Report, partition};
	use crate::{
		Error, comm::Communicator, config::Config, local, pivot::Pivot, points::LocalPoints,
	};
	use ndarray::{Array2, arr1};
	use quickcheck::TestResult;
	use quickcheck_macros::quickcheck;

	// Runs one-dimensional points, returning every rank's sorted values and report.
	fn run(
		blocks: &[Vec<f64>],
		pivot: f64,
		config: Config,
	) -> Vec<crate::Result<(Vec<f64>, Report<f64>)>> {
		local::run(blocks.len(), |comm| -> crate::Result<_> {
			let pivot = Pivot::new(arr1(&[pivot]))?;
			let block = &blocks[comm.rank()];
			let points = Array2::from_shape_vec((block.len(), 1), block.clone())?;
			let mut local = LocalPoints::new(points, &pivot)?;
			let report = partition(&comm, &mut local, &pivot, &config)?;
			let mut values = local.points().iter().copied().collect::<Vec<_>>();
			values.sort_by(f64::total_cmp);
			Ok((values, report))
		})
		.unwrap()
	}

	#[test]
	fn four_ranks_of_two() {
		let blocks = [vec![8.0, 3.0], vec![1.0, 6.0], vec![5.0, 2.0], vec![7.0, 4.0]];
		let results = run(&blocks, 1.0, Config::default());
		let expected = [[1.0, 2.0], [3.0, 4.0], [5.0, 6.0], [7.0, 8.0]];
		for (result, expected) in results.into_iter().zip(expected) {
			let (values, report) = result.unwrap();
			assert_eq!(values, expected);
			assert_eq!(report.levels.len(), 2);
			assert_eq!(report.levels[0].median, 12.5);
			assert!(report.verdict.unwrap().is_ordered());
		}
	}

	#[test]
	fn round_cap_exceeded() {
		// Unwanted counts start at 2, 1, 1, 2 and need two rounds.
		let blocks = [vec![7.0, 8.0], vec![1.0, 5.0], vec![2.0, 6.0], vec![3.0, 4.0]];
		let results = run(&blocks, 0.0, Config::default().with_max_rounds(1));
		for result in results {
			match result {
				Err(Error::Level {
					depth: 0,
					size: 4,
					source,
				}) => assert!(matches!(
					*source,
					Error::NotConverged { rounds: 1, ref unwanted } if unwanted == &[1, 0, 0, 1]
				)),
				result => panic!("unexpected {result:?}"),
			}
		}
		let results = run(&blocks, 0.0, Config::default());
		assert!(results.into_iter().all(|result| result.unwrap().1.levels[0].balance.rounds == 2));
	}

	#[test]
	fn uneven_layout() {
		let blocks = [vec![1.0, 2.0], vec![3.0]];
		for result in run(&blocks, 0.0, Config::default()) {
			assert!(matches!(
				result,
				Err(Error::UnevenLayout {
					rank: 1,
					points: 1,
					expected_points: 2,
					..
				})
			));
		}
	}

	#[test]
	fn all_equal() {
		let blocks = vec![vec![3.0; 4]; 4];
		for result in run(&blocks, 0.0, Config::default()) {
			let (values, report) = result.unwrap();
			assert_eq!(values, vec![3.0; 4]);
			assert_eq!(report.rounds(), 0);
		}
	}

	#[quickcheck]
	fn ordered_and_conserved(values: Vec<i8>, log: u8) -> TestResult {
		let log = usize::from(log % 4);
		let size = 1 << log;
		let per_rank = values.len() / size;
		if per_rank == 0 {
			return TestResult::discard();
		}
		let blocks = values
			.chunks_exact(per_rank)
			.take(size)
			.map(|chunk| chunk.iter().map(|&value| f64::from(value)).collect::<Vec<_>>())
			.collect::<Vec<_>>();
		let mut before = blocks.concat();
		before.sort_by(f64::total_cmp);

		let mut after = Vec::new();
		for result in run(&blocks, 0.0, Config::default()) {
			let (values, report) = result.unwrap();
			assert_eq!(values.len(), per_rank);
			assert_eq!(report.levels.len(), log);
			assert!(report.verdict.unwrap().is_ordered());
			after.extend(values);
		}
		after.sort_by(f64::total_cmp);
		assert_eq!(after, before);
		TestResult::passed()
	}
}
