//! Order statistics over flat distance arrays.
//!
//! Selection is iterative: a deterministic median-of-three pivot splits the active range with a
//! three-way Lomuto partition into elements less than, equal to, and greater than the pivot, and
//! only the part holding the requested rank is kept. Runs of equal distances are therefore
//! discarded in a single step. Imbalanced partitions shuffle a few elements to defeat adversarial
//! patterns and, after too many of them, the remaining range falls back to heap selection.
//!
//! Pivot choice and pattern breaking are derivative work of [`core::slice::sort`] licensed under
//! `MIT OR Apache-2.0`.
//!
//! [`core::slice::sort`]: https://doc.rust-lang.org/src/core/slice/sort.rs.html

use crate::{Error, Result, Scalar, heap_select::heap_select, insertion_sort::insertion_sort};
use core::cmp;
use ndarray::{ArrayViewMut1, Axis, IndexLonger};

// Views of up to this length are simply sorted.
const MAX_INSERTION: usize = 10;

/// Returns the median of `v`.
///
/// If the length *n* is odd, this is the element of rank *n*/2. If it is even, this is the mean of
/// the elements of rank *n*/2 − 1 and *n*/2. The view is reordered in the process but keeps all
/// of its elements.
///
/// # Errors
///
/// Returns [`Error::EmptySelection`] for an empty view and [`Error::NotANumber`] if any element
/// is NaN.
///
/// # Examples
///
/// ```
/// use ndarray_pivot::{ndarray::arr1, select::median};
///
/// let mut v = arr1(&[2.3, 3.3, 6.0, 7.45, 5.87, 3.65, 9.07, 10.65, 7.98, 6.09]);
/// let m = median(v.view_mut()).unwrap();
/// assert!((m - 6.045f64).abs() < 1e-12);
/// ```
pub fn median<T: Scalar>(v: ArrayViewMut1<'_, T>) -> Result<T> {
	let len = v.len();
	if len == 0 {
		return Err(Error::EmptySelection);
	}
	if v.iter().any(|value| value.is_nan()) {
		return Err(Error::NotANumber);
	}

	let (left, upper, _right) = partition_at_index(v, len / 2, &mut |a: &T, b: &T| a < b);
	if len % 2 == 1 {
		return Ok(*upper);
	}

	// Every element left of rank `len / 2` is less than or equal to it, so the element of rank
	// `len / 2 - 1` is their maximum.
	let lower = left
		.iter()
		.copied()
		.reduce(|max, value| if max < value { value } else { max })
		.ok_or(Error::EmptySelection)?;
	Ok(lower.midpoint(*upper))
}

/// Returns the element of rank `index` of `v`, reordering `v` around it.
///
/// # Panics
///
/// Panics when `index >= len()`, meaning it always panics on empty views.
pub fn select_nth<T: Scalar>(v: ArrayViewMut1<'_, T>, index: usize) -> T {
	*partition_at_index(v, index, &mut |a: &T, b: &T| a < b).1
}

/// Reorders `v` such that the element at `index` is at its final sorted position.
///
/// Returns the subview before `index`, the element at `index`, and the subview after `index`,
/// whose elements are respectively less than or equal to and greater than or equal to the
/// element at `index`.
///
/// # Panics
///
/// Panics when `index >= len()`.
pub fn partition_at_index<'a, T, F>(
	mut v: ArrayViewMut1<'a, T>,
	index: usize,
	is_less: &mut F,
) -> (ArrayViewMut1<'a, T>, &'a mut T, ArrayViewMut1<'a, T>)
where
	F: FnMut(&T, &T) -> bool,
{
	if index >= v.len() {
		panic!(
			"partition_at_index index {} greater than length of view {}",
			index,
			v.len()
		);
	}

	select_loop(v.view_mut(), index, is_less);

	let (left, right) = v.split_at(Axis(0), index);
	let (pivot, right) = right.split_at(Axis(0), 1);
	(left, pivot.index(0), right)
}

fn select_loop<T, F>(mut v: ArrayViewMut1<'_, T>, mut index: usize, is_less: &mut F)
where
	F: FnMut(&T, &T) -> bool,
{
	// Limit the number of imbalanced partitions before falling back to heap selection.
	let mut limit = 16;

	// True if the last partitioning was reasonably balanced.
	let mut was_balanced = true;

	loop {
		let len = v.len();

		if len <= MAX_INSERTION {
			insertion_sort(v, is_less);
			return;
		}

		if limit == 0 {
			heap_select(v, index, is_less);
			return;
		}

		// If the last partitioning was imbalanced, try breaking patterns in the view by shuffling
		// some elements around. Hopefully we'll choose a better pivot this time.
		if !was_balanced {
			break_patterns(v.view_mut());
			limit -= 1;
		}

		let pivot = choose_pivot(v.view_mut(), is_less);
		let (lt, eq) = partition_lomuto(v.view_mut(), pivot, is_less);
		was_balanced = cmp::max(lt, len - eq) <= len - len / 8;

		if index < lt {
			let (left, _) = v.split_at(Axis(0), lt);
			v = left;
		} else if index < eq {
			// The requested rank falls into the run of elements equal to the pivot.
			return;
		} else {
			let (_, right) = v.split_at(Axis(0), eq);
			v = right;
			index -= eq;
		}
	}
}

/// Partitions `v` into elements less than `v[pivot]`, elements equal to it, and elements greater
/// than it, in this order.
///
/// Returns the end of the first and of the second region. The second region is never empty.
pub fn partition_lomuto<T, F>(
	mut v: ArrayViewMut1<'_, T>,
	pivot: usize,
	is_less: &mut F,
) -> (usize, usize)
where
	F: FnMut(&T, &T) -> bool,
{
	// Park the pivot at the end.
	let last = v.len() - 1;
	v.swap(pivot, last);

	// Move elements less than the pivot to the front.
	let mut lt = 0;
	for i in 0..last {
		if is_less(&v[i], &v[last]) {
			v.swap(i, lt);
			lt += 1;
		}
	}

	// Move elements not greater than the pivot, hence equal to it, behind them.
	let mut eq = lt;
	for i in lt..last {
		if !is_less(&v[last], &v[i]) {
			v.swap(i, eq);
			eq += 1;
		}
	}

	// Place the pivot at the end of the equal run.
	v.swap(eq, last);
	(lt, eq + 1)
}

/// Chooses a pivot in `v` as the median of three samples, each of which is itself the median of
/// its neighborhood for longer views, and returns its index.
fn choose_pivot<T, F>(v: ArrayViewMut1<'_, T>, is_less: &mut F) -> usize
where
	F: FnMut(&T, &T) -> bool,
{
	// Minimum length to choose the median of the neighborhoods.
	const SHORTEST_MEDIAN_OF_MEDIANS: usize = 50;

	let len = v.len();

	// Three indices near which we are going to choose a pivot.
	let mut a = len / 4;
	let mut b = len / 4 * 2;
	let mut c = len / 4 * 3;

	if len >= 8 {
		let v = v.view();

		// Swaps indices so that `v[a] <= v[b]`.
		let mut sort2 = |a: &mut usize, b: &mut usize| {
			if is_less(&v[*b], &v[*a]) {
				core::mem::swap(a, b);
			}
		};

		// Swaps indices so that `v[a] <= v[b] <= v[c]`.
		let mut sort3 = |a: &mut usize, b: &mut usize, c: &mut usize| {
			sort2(a, b);
			sort2(b, c);
			sort2(a, b);
		};

		if len >= SHORTEST_MEDIAN_OF_MEDIANS {
			// Finds the median of `v[a - 1], v[a], v[a + 1]` and stores the index into `a`.
			let mut sort_adjacent = |a: &mut usize| {
				let tmp = *a;
				sort3(&mut (tmp - 1), a, &mut (tmp + 1));
			};

			sort_adjacent(&mut a);
			sort_adjacent(&mut b);
			sort_adjacent(&mut c);
		}

		sort3(&mut a, &mut b, &mut c);
	}

	b
}

/// Scatters some elements around in an attempt to break patterns that might cause imbalanced
/// partitions.
fn break_patterns<T>(mut v: ArrayViewMut1<'_, T>) {
	let len = v.len();
	if len >= 8 {
		// Pseudorandom number generator from the "Xorshift RNGs" paper by George Marsaglia.
		let mut random = len as u64;
		let mut gen_u64 = || {
			random ^= random << 13;
			random ^= random >> 7;
			random ^= random << 17;
			random
		};

		// Take random numbers modulo this number. It fits into `usize` because `len` does.
		let modulus = len.next_power_of_two() as u64;

		// Some pivot candidates will be in the nearby of this index. Let's randomize them.
		let pos = len / 4 * 2;

		for i in 0..3 {
			// Generate a random number modulo `len`. However, in order to avoid costly operations
			// we first take it modulo a power of two, and then decrease by `len` until it fits.
			let mut other = (gen_u64() & (modulus - 1)) as usize;
			if other >= len {
				other -= len;
			}

			v.swap(pos - 1 + i, other);
		}
	}
}
