//! Derivative work of [`core::slice::sort`] licensed under `MIT OR Apache-2.0`.
//!
//! [`core::slice::sort`]: https://doc.rust-lang.org/src/core/slice/sort.rs.html

use ndarray::ArrayViewMut1;

/// Sorts a short view using insertion sort, which is *O*(*n*^2) worst-case.
///
/// Elements are moved by swapping only, so a panicking `is_less` leaves `v` a permutation of its
/// input.
pub fn insertion_sort<T, F>(mut v: ArrayViewMut1<'_, T>, is_less: &mut F)
where
	F: FnMut(&T, &T) -> bool,
{
	for i in 1..v.len() {
		// Shift the tail element to the left until it meets a smaller or equal one.
		let mut j = i;
		while j > 0 && is_less(&v[j], &v[j - 1]) {
			v.swap(j, j - 1);
			j -= 1;
		}
	}
}
