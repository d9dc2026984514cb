//! Three-way split of a process's points by the group median.

use crate::{Scalar, points::LocalPoints};

/// Half of a group a member belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
	/// First half of the ranks, collecting the points nearest to the pivot.
	Lower,
	/// Second half of the ranks, collecting the points farthest from the pivot.
	Upper,
}

impl Side {
	/// Side of member `rank` in a group of `size`.
	#[inline]
	pub fn of(rank: usize, size: usize) -> Self {
		if rank < size / 2 {
			Side::Lower
		} else {
			Side::Upper
		}
	}

	/// The other side.
	#[inline]
	pub fn opposite(self) -> Self {
		match self {
			Side::Lower => Side::Upper,
			Side::Upper => Side::Lower,
		}
	}

	/// Flips `value` for the upper side so that wanted values always compare less.
	#[inline]
	pub fn orient<T: Scalar>(self, value: T) -> T {
		match self {
			Side::Lower => value,
			Side::Upper => -value,
		}
	}
}

/// Sizes of the three consecutive regions left by [`split_by_median`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Split {
	/// Points strictly on the wanted side of the median.
	pub kept: usize,
	/// Points exactly at the median.
	pub ties: usize,
	/// Points strictly on the unwanted side of the median.
	pub discard: usize,
}

impl Split {
	/// Total number of points.
	#[inline]
	pub fn len(&self) -> usize {
		self.kept + self.ties + self.discard
	}

	/// Whether there are no points.
	#[inline]
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

/// Reorders `local` into points strictly on the wanted side of `median`, points at `median`, and
/// points strictly on the unwanted side, in this order.
///
/// The lower side wants distances below the median, the upper side distances above it. Points at
/// the median end up adjacent to the unwanted ones, so surrendering some of them keeps the
/// unwanted region a suffix.
pub fn split_by_median<T: Scalar>(local: &mut LocalPoints<T>, median: T, side: Side) -> Split {
	let median = side.orient(median);

	// Invariants: `[..lo]` wanted, `[lo..mid]` ties, `[mid..hi]` unscanned, `[hi..]` unwanted.
	let mut lo = 0;
	let mut mid = 0;
	let mut hi = local.len();
	while mid < hi {
		let distance = side.orient(local.distance(mid));
		if distance < median {
			local.swap(lo, mid);
			lo += 1;
			mid += 1;
		} else if distance > median {
			hi -= 1;
			local.swap(mid, hi);
		} else {
			mid += 1;
		}
	}

	Split {
		kept: lo,
		ties: mid - lo,
		discard: local.len() - mid,
	}
}
