//! Derivative work of [`core::slice::sort`] licensed under `MIT OR Apache-2.0`.
//!
//! [`core::slice::sort`]: https://doc.rust-lang.org/src/core/slice/sort.rs.html

use ndarray::ArrayViewMut1;

/// Reorders `v` such that `v[index]` holds the element of rank `index`, using a bounded max-heap,
/// which guarantees *O*(*n* \* log(*index*)) worst-case.
///
/// Afterwards every element before `index` is less than or equal to `v[index]` and every element
/// after it is greater than or equal to it.
#[cold]
pub fn heap_select<T, F>(mut v: ArrayViewMut1<'_, T>, index: usize, is_less: &mut F)
where
	F: FnMut(&T, &T) -> bool,
{
	debug_assert!(index < v.len());

	// The heap occupies `v[..bound]`.
	let bound = index + 1;

	// Build the heap in linear time.
	for node in (0..bound / 2).rev() {
		sift_down(&mut v, node, bound, is_less);
	}

	// Replace the heap maximum by every smaller element found beyond the heap.
	for i in bound..v.len() {
		if is_less(&v[i], &v[0]) {
			v.swap(0, i);
			sift_down(&mut v, 0, bound, is_less);
		}
	}

	// The heap now holds the `index + 1` smallest elements with the greatest of them on top.
	v.swap(0, index);
}

/// Restores the invariant `parent >= child` below `node` within `v[..bound]`.
fn sift_down<T, F>(v: &mut ArrayViewMut1<'_, T>, mut node: usize, bound: usize, is_less: &mut F)
where
	F: FnMut(&T, &T) -> bool,
{
	loop {
		// Children of `node`.
		let mut child = 2 * node + 1;
		if child >= bound {
			break;
		}

		// Choose the greater child.
		if child + 1 < bound && is_less(&v[child], &v[child + 1]) {
			child += 1;
		}

		// Stop if the invariant holds at `node`.
		if !is_less(&v[node], &v[child]) {
			break;
		}

		// Swap `node` with the greater child, move one step down, and continue sifting.
		v.swap(node, child);
		node = child;
	}
}
