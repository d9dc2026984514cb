use bytemuck::Pod;
use core::{
	fmt::{Debug, Display},
	ops::{Add, Mul, Neg, Sub},
};

/// Floating-point coordinate and distance type.
///
/// Implemented for [`f32`] and [`f64`]. Values cross process boundaries as plain old data.
pub trait Scalar:
	Pod
	+ PartialOrd
	+ Debug
	+ Display
	+ Send
	+ Sync
	+ Add<Output = Self>
	+ Sub<Output = Self>
	+ Mul<Output = Self>
	+ Neg<Output = Self>
{
	/// Additive identity.
	const ZERO: Self;

	/// Arithmetic mean of `self` and `other`, without overflowing for large finite inputs.
	fn midpoint(self, other: Self) -> Self;
	/// Whether `self` is NaN.
	fn is_nan(self) -> bool;
	/// Whether `self` is neither infinite nor NaN.
	fn is_finite(self) -> bool;
	/// Converts a stored `f32` coordinate.
	fn from_f32(value: f32) -> Self;
}

macro_rules! impl_scalar {
	($($t:ty),*) => {$(
		impl Scalar for $t {
			const ZERO: Self = 0.0;

			#[inline]
			fn midpoint(self, other: Self) -> Self {
				let sum = self + other;
				if sum.is_finite() {
					sum / 2.0
				} else {
					self / 2.0 + other / 2.0
				}
			}
			#[inline]
			fn is_nan(self) -> bool {
				<$t>::is_nan(self)
			}
			#[inline]
			fn is_finite(self) -> bool {
				<$t>::is_finite(self)
			}
			#[inline]
			fn from_f32(value: f32) -> Self {
				value as $t
			}
		}
	)*};
}

impl_scalar!(f32, f64);
