//! Distributed partitioning of *D*-dimensional points by their distance to a fixed [pivot] across a
//! power-of-two number of ranks, in place on [`ndarray`] arrays.
//!
//! After [`partition()`], rank order corresponds to distance order: every point held by a rank is at
//! most as distant from the pivot as every point held by the next rank, up to ties at a median.
//! Each recursion level computes the [median] distance of its group, splits the local points of
//! every member [by it](partition::split_by_median), and [balances](balance::balance) the group
//! by trading points between its lower and upper half, before both halves recurse on their own.
//!
//! Ranks communicate through the [`Communicator`](comm::Communicator) trait. The [`local`]
//! substrate runs every rank on its own thread of the calling process, the `process` substrate
//! every rank in its own MPI process.
//!
//! # Example
//!
//! ```
//! use ndarray_pivot::{Config, LocalPoints, Pivot, comm::Communicator, local, ndarray::Array2};
//! use rand::{Rng, SeedableRng, rngs::StdRng};
//!
//! let bounds = local::run(8, |comm| -> ndarray_pivot::Result<(f32, f32)> {
//! 	// 64 points of 3 dimensions per rank.
//! 	let mut rng = StdRng::seed_from_u64(comm.rank() as u64);
//! 	let points = Array2::from_shape_fn((64, 3), |_| rng.random_range(-1.0f32..1.0));
//!
//! 	let pivot = Pivot::choose(&comm, points.view(), &mut rng)?;
//! 	let mut local = LocalPoints::new(points, &pivot)?;
//! 	let report = ndarray_pivot::partition(&comm, &mut local, &pivot, &Config::default())?;
//!
//! 	assert_eq!(report.levels.len(), 3);
//! 	assert!(report.verdict.is_some_and(|verdict| verdict.is_ordered()));
//! 	Ok(local.distance_bounds())
//! })
//! .unwrap()
//! .into_iter()
//! .collect::<Result<Vec<_>, _>>()
//! .unwrap();
//!
//! // Ranks hold consecutive distance ranges.
//! assert!(bounds.windows(2).all(|pair| pair[0].1 <= pair[1].0));
//! ```
//!
//! # Current Implementation
//!
//! Complexities per level where *n* is the number of points of the group and *p* its size.
//!
//! | Resource      | Median (root)      | Split (member) | Balancing (member)          |
//! |---------------|--------------------|----------------|-----------------------------|
//! | Time, average | *O*(*n*)           | *O*(*n*/*p*)   | *O*(*p* · *n*/*p*)          |
//! | Time, worst   | *O*(*n* log *n*)   | *O*(*n*/*p*)   | *O*(*p* · *n*/*p*)          |
//! | Messages      | *O*(*p*)           | none           | *O*(*p*) rounds of *O*(*p*) |
//!
//! [pivot]: Pivot
//! [median]: select::median
//!
//! # Features
//!
//!   * `cli` for the `pivot-split` binary.
//!   * `mpi` for the `process` substrate over an installed MPI library, and the `--mpi` option of
//!     the `pivot-split` binary.

#![deny(
	missing_docs,
	rustdoc::broken_intra_doc_links,
	rustdoc::missing_crate_level_docs
)]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

mod error;
mod heap_select;
mod insertion_sort;
mod scalar;

pub mod balance;
pub mod comm;
pub mod config;
pub mod controller;
pub mod dataset;
pub mod group;
pub mod local;
pub mod partition;
pub mod pivot;
pub mod points;
#[cfg(feature = "mpi")]
pub mod process;
pub mod select;
pub mod validate;

use ndarray::{ArrayBase, DataMut, Ix1};

pub use crate::{
	config::Config,
	controller::{Level, Report, partition},
	error::{Error, Result},
	pivot::Pivot,
	points::LocalPoints,
	scalar::Scalar,
	validate::Verdict,
};
pub use ndarray;

/// Extension trait for 1-dimensional [`ArrayBase<S, Ix1>`](`ArrayBase`) array or (sub)view with
/// arbitrary memory layout (e.g., non-contiguous) providing order statistics of distances.
pub trait Select1Ext<A, S>
where
	S: DataMut<Elem = A>,
{
	/// Returns the median, reordering the array.
	///
	/// See [`select::median`].
	///
	/// # Examples
	///
	/// ```
	/// use ndarray_pivot::{Select1Ext, ndarray::arr2};
	///
	/// let mut v = arr2(&[[4.0, 1.0], [2.0, 8.0], [6.0, 3.0]]);
	/// // Second column is non-contiguous.
	/// assert_eq!(v.column_mut(1).median().unwrap(), 3.0);
	/// assert_eq!(v.column_mut(0).median().unwrap(), 4.0);
	/// ```
	fn median(&mut self) -> Result<A>
	where
		A: Scalar;

	/// Returns the element of rank `index`, reordering the array around it.
	///
	/// See [`select::select_nth`].
	///
	/// # Panics
	///
	/// Panics when `index >= len()`.
	fn select_nth(&mut self, index: usize) -> A
	where
		A: Scalar;
}

impl<A, S> Select1Ext<A, S> for ArrayBase<S, Ix1>
where
	S: DataMut<Elem = A>,
{
	#[inline]
	fn median(&mut self) -> Result<A>
	where
		A: Scalar,
	{
		select::median(self.view_mut())
	}
	#[inline]
	fn select_nth(&mut self, index: usize) -> A
	where
		A: Scalar,
	{
		select::select_nth(self.view_mut(), index)
	}
}
