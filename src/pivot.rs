//! Reference point of a run.

use crate::{
	Error, Result, Scalar,
	comm::{Communicator, decode, encode},
	group::ProcessGroup,
};
use ndarray::{Array1, ArrayView1, ArrayView2, Zip};
use rand::Rng;

/// Fixed reference point every distance is measured against.
#[derive(Debug, Clone, PartialEq)]
pub struct Pivot<T> {
	coords: Array1<T>,
}

impl<T: Scalar> Pivot<T> {
	/// Creates a pivot from its coordinates.
	///
	/// # Errors
	///
	/// Returns [`Error::EmptyPointSet`] without coordinates and [`Error::NonFinite`] if any
	/// coordinate is infinite or NaN.
	pub fn new(coords: Array1<T>) -> Result<Self> {
		if coords.is_empty() {
			return Err(Error::EmptyPointSet);
		}
		if !coords.iter().all(|coord| coord.is_finite()) {
			return Err(Error::NonFinite { row: 0 });
		}
		Ok(Self { coords })
	}

	/// Picks a uniformly random point of the root's own point set and broadcasts it.
	///
	/// Every rank of `comm` must call this. Only the root's `points` and `rng` are used.
	pub fn choose<C, R>(comm: &C, points: ArrayView2<'_, T>, rng: &mut R) -> Result<Self>
	where
		C: Communicator,
		R: Rng + ?Sized,
	{
		let world = ProcessGroup::world(comm)?;
		let coords = if world.rank() == 0 {
			if points.nrows() == 0 || points.ncols() == 0 {
				return Err(Error::EmptyPointSet);
			}
			let row = rng.random_range(0..points.nrows());
			tracing::debug!(row, "chose pivot");
			Some(encode(&points.row(row).to_vec()))
		} else {
			None
		};
		let coords = decode::<T>(&world.broadcast(coords)?)?;
		Self::new(Array1::from_vec(coords))
	}

	/// Dimensionality.
	#[inline]
	pub fn dims(&self) -> usize {
		self.coords.len()
	}

	/// Coordinates.
	#[inline]
	pub fn coords(&self) -> ArrayView1<'_, T> {
		self.coords.view()
	}

	/// Squared Euclidean distance of `point` to the pivot.
	#[inline]
	pub fn distance(&self, point: ArrayView1<'_, T>) -> T {
		Zip::from(&point)
			.and(&self.coords)
			.fold(T::ZERO, |sum, &p, &q| {
				let d = p - q;
				sum + d * d
			})
	}
}

#[cfg(test)]
mod test {
	use super::Pivot;
	use crate::{Error, comm::Communicator, local};
	use ndarray::{Array2, arr1, arr2};
	use rand::{SeedableRng, rngs::StdRng};

	#[test]
	fn distance() {
		let pivot = Pivot::new(arr1(&[1.0f64, 2.0, 3.0])).unwrap();
		assert_eq!(pivot.distance(arr1(&[1.0, 2.0, 3.0]).view()), 0.0);
		assert_eq!(pivot.distance(arr1(&[2.0, 4.0, 0.0]).view()), 14.0);
	}

	#[test]
	fn rejects_non_finite() {
		assert!(matches!(
			Pivot::new(arr1(&[0.0f32, f32::INFINITY])),
			Err(Error::NonFinite { .. })
		));
		assert!(matches!(
			Pivot::<f32>::new(arr1(&[])),
			Err(Error::EmptyPointSet)
		));
	}

	#[test]
	fn chosen_from_root() {
		let pivots = local::run(4, |comm| {
			let points = if comm.rank() == 0 {
				arr2(&[[1.0f64, 1.0], [2.0, 2.0], [3.0, 3.0]])
			} else {
				Array2::from_elem((3, 2), -1.0)
			};
			let mut rng = StdRng::seed_from_u64(comm.rank() as u64);
			Pivot::choose(&comm, points.view(), &mut rng)
		})
		.unwrap();
		let first = pivots[0].as_ref().unwrap();
		assert!(first.coords()[0] > 0.0);
		for pivot in &pivots {
			assert_eq!(pivot.as_ref().unwrap(), first);
		}
	}
}
