//! Points held by one process and their distances to the pivot.

use crate::{Error, Result, Scalar, pivot::Pivot};
use core::{mem, ops::Range};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Zip, s};

/// Point set of one process together with the distance of every point to the pivot.
///
/// Row `i` of the points always corresponds to distance `i`; all reordering goes through
/// [`swap`](Self::swap) or whole-row replacement, both of which keep the two in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalPoints<T> {
	points: Array2<T>,
	distances: Array1<T>,
}

impl<T: Scalar> LocalPoints<T> {
	/// Takes ownership of `points`, one point per row, and measures them against `pivot`.
	///
	/// # Errors
	///
	/// Returns [`Error::EmptyPointSet`] without rows or columns, [`Error::DimensionMismatch`] if
	/// the pivot has another dimensionality, and [`Error::NonFinite`] for infinite or NaN
	/// coordinates.
	pub fn new(points: Array2<T>, pivot: &Pivot<T>) -> Result<Self> {
		if points.nrows() == 0 || points.ncols() == 0 {
			return Err(Error::EmptyPointSet);
		}
		if points.ncols() != pivot.dims() {
			return Err(Error::DimensionMismatch {
				pivot: pivot.dims(),
				points: points.ncols(),
			});
		}
		if let Some(row) = points
			.rows()
			.into_iter()
			.position(|point| !point.iter().all(|coord| coord.is_finite()))
		{
			return Err(Error::NonFinite { row });
		}
		let mut local = Self {
			distances: Array1::from_elem(points.nrows(), T::ZERO),
			points,
		};
		local.measure(0..local.len(), pivot);
		Ok(local)
	}

	/// Number of points.
	#[inline]
	pub fn len(&self) -> usize {
		self.distances.len()
	}

	/// Whether there are no points, which [`new`](Self::new) rules out.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.distances.is_empty()
	}

	/// Dimensionality of every point.
	#[inline]
	pub fn dims(&self) -> usize {
		self.points.ncols()
	}

	/// Points, one per row.
	#[inline]
	pub fn points(&self) -> ArrayView2<'_, T> {
		self.points.view()
	}

	/// Distances to the pivot, parallel to the rows of [`points`](Self::points).
	#[inline]
	pub fn distances(&self) -> ArrayView1<'_, T> {
		self.distances.view()
	}

	/// Distance of point `i`.
	#[inline]
	pub fn distance(&self, i: usize) -> T {
		self.distances[i]
	}

	/// Swaps points `i` and `j` together with their distances.
	pub fn swap(&mut self, i: usize, j: usize) {
		if i == j {
			return;
		}
		self.distances.swap(i, j);
		let (mut a, mut b) = self.points.multi_slice_mut((s![i, ..], s![j, ..]));
		Zip::from(&mut a).and(&mut b).for_each(mem::swap);
	}

	/// Smallest and greatest distance.
	pub fn distance_bounds(&self) -> (T, T) {
		let first = self.distances[0];
		self.distances
			.iter()
			.fold((first, first), |(min, max), &d| {
				(if d < min { d } else { min }, if max < d { d } else { max })
			})
	}

	/// Copies the coordinates of `rows` in row-major order.
	pub fn rows(&self, rows: Range<usize>) -> Vec<T> {
		self.points.slice(s![rows, ..]).iter().copied().collect()
	}

	/// Overwrites consecutive rows starting at `start` with `coords` in row-major order and
	/// measures them against `pivot`.
	///
	/// # Errors
	///
	/// Returns [`Error::Malformed`] if `coords` does not hold whole rows fitting behind `start`.
	pub fn replace_rows(&mut self, start: usize, coords: &[T], pivot: &Pivot<T>) -> Result<()> {
		let dims = self.dims();
		if coords.len() % dims != 0 || start + coords.len() / dims > self.len() {
			return Err(Error::Malformed(format!(
				"{} coordinates do not fit as rows of {} at {} of {}",
				coords.len(),
				dims,
				start,
				self.len()
			)));
		}
		let rows = start..start + coords.len() / dims;
		let incoming = ArrayView2::from_shape((rows.len(), dims), coords)?;
		self.points.slice_mut(s![rows.clone(), ..]).assign(&incoming);
		self.measure(rows, pivot);
		Ok(())
	}

	/// Returns the points and distances.
	pub fn into_parts(self) -> (Array2<T>, Array1<T>) {
		(self.points, self.distances)
	}

	fn measure(&mut self, rows: Range<usize>, pivot: &Pivot<T>) {
		Zip::from(self.points.slice(s![rows.clone(), ..]).rows())
			.and(self.distances.slice_mut(s![rows]))
			.for_each(|point, distance| *distance = pivot.distance(point));
	}
}

#[cfg(test)]
mod test {
	use super::LocalPoints;
	use crate::{Error, pivot::Pivot};
	use ndarray::{arr1, arr2};

	fn pivot() -> Pivot<f64> {
		Pivot::new(arr1(&[0.0, 0.0])).unwrap()
	}

	#[test]
	fn measured() {
		let local = LocalPoints::new(arr2(&[[1.0, 0.0], [3.0, 4.0], [0.0, 2.0]]), &pivot()).unwrap();
		assert_eq!(local.distances(), arr1(&[1.0, 25.0, 4.0]));
		assert_eq!(local.distance_bounds(), (1.0, 25.0));
	}

	#[test]
	fn swap_in_lockstep() {
		let mut local =
			LocalPoints::new(arr2(&[[1.0, 0.0], [3.0, 4.0], [0.0, 2.0]]), &pivot()).unwrap();
		local.swap(0, 1);
		local.swap(2, 2);
		assert_eq!(local.points(), arr2(&[[3.0, 4.0], [1.0, 0.0], [0.0, 2.0]]));
		assert_eq!(local.distances(), arr1(&[25.0, 1.0, 4.0]));
	}

	#[test]
	fn replaced_rows_are_measured() {
		let mut local =
			LocalPoints::new(arr2(&[[1.0, 0.0], [3.0, 4.0], [0.0, 2.0]]), &pivot()).unwrap();
		assert_eq!(local.rows(1..3), vec![3.0, 4.0, 0.0, 2.0]);
		local.replace_rows(1, &[6.0, 8.0], &pivot()).unwrap();
		assert_eq!(local.points(), arr2(&[[1.0, 0.0], [6.0, 8.0], [0.0, 2.0]]));
		assert!(matches!(
			local.replace_rows(2, &[1.0, 1.0, 2.0, 2.0], &pivot()),
			Err(Error::Malformed(_))
		));
		let (points, distances) = local.into_parts();
		assert_eq!(points.row(1), arr1(&[6.0, 8.0]));
		assert_eq!(distances, arr1(&[1.0, 100.0, 4.0]));
	}

	#[test]
	fn rejects_bad_input() {
		assert!(matches!(
			LocalPoints::new(arr2(&[[1.0, 2.0, 3.0]]), &pivot()),
			Err(Error::DimensionMismatch { pivot: 2, points: 3 })
		));
		assert!(matches!(
			LocalPoints::new(arr2(&[[1.0, 2.0], [f64::NAN, 0.0]]), &pivot()),
			Err(Error::NonFinite { row: 1 })
		));
	}
}
