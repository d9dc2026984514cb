//! Message-passing substrate.
//!
//! A [`Communicator`] connects the ranks of one run. It offers blocking point-to-point messages
//! matched by source and [`Tag`], plus a one-sided window per rank that other ranks may read
//! between two fences. Collectives are layered on top by [`ProcessGroup`].
//!
//! Payloads are untyped bytes; [`encode`] and [`decode`] convert slices of plain old data.
//!
//! [`ProcessGroup`]: crate::group::ProcessGroup

use crate::{Error, Result};
use bytemuck::Pod;
use core::mem;

/// Kind of a point-to-point message.
///
/// Messages from one source are delivered in order; a receive for one tag skips and retains
/// messages of other tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Tag {
	/// Contribution to a gather at the group root.
	Gather,
	/// Payload sent from the group root to every member.
	Broadcast,
	/// Block sent from the group root to one member.
	Scatter,
	/// Points traded between balancing peers.
	Exchange,
	/// Synchronization closing a window epoch.
	Fence,
}

/// Connection of one rank to every rank of a run.
pub trait Communicator {
	/// Rank of the caller, in `0..size()`.
	fn rank(&self) -> usize;
	/// Number of ranks.
	fn size(&self) -> usize;
	/// Sends `payload` to `dest` without waiting for it to be received.
	fn send(&self, dest: usize, tag: Tag, payload: Vec<u8>) -> Result<()>;
	/// Blocks until a message with `tag` from `source` arrives and returns its payload.
	fn receive(&self, source: usize, tag: Tag) -> Result<Vec<u8>>;
	/// Sends `payload` to `peer` and returns the message `peer` sent with `tag` in turn.
	///
	/// Both peers must call this with each other's rank. Backends whose sends block until
	/// matched override this to post the send before receiving.
	fn exchange(&self, peer: usize, tag: Tag, payload: Vec<u8>) -> Result<Vec<u8>> {
		self.send(peer, tag, payload)?;
		self.receive(peer, tag)
	}
	/// Publishes `payload` as the caller's window content.
	///
	/// Content exposed before a [`fence`](Self::fence) is visible to every rank after it.
	fn expose(&self, payload: Vec<u8>) -> Result<()>;
	/// Blocks until every rank of the run has reached the fence.
	fn fence(&self) -> Result<()>;
	/// Reads the window content of `target` without its participation.
	fn get(&self, target: usize) -> Result<Vec<u8>>;
}

/// Encodes `values` as bytes.
pub fn encode<T: Pod>(values: &[T]) -> Vec<u8> {
	bytemuck::cast_slice(values).to_vec()
}

/// Decodes bytes into values.
///
/// # Errors
///
/// Returns [`Error::Malformed`] if the length is not a multiple of the size of `T`.
pub fn decode<T: Pod>(bytes: &[u8]) -> Result<Vec<T>> {
	if bytes.len() % mem::size_of::<T>() != 0 {
		return Err(Error::Malformed(format!(
			"{} bytes are no whole number of {}-byte values",
			bytes.len(),
			mem::size_of::<T>()
		)));
	}
	Ok(bytemuck::pod_collect_to_vec(bytes))
}

/// Encodes one count.
pub fn encode_count(count: usize) -> Vec<u8> {
	encode(&[count as u64])
}

/// Decodes counts encoded by [`encode_count`] or as a `u64` slice.
pub fn decode_counts(bytes: &[u8]) -> Result<Vec<usize>> {
	decode::<u64>(bytes)?
		.into_iter()
		.map(|count| {
			usize::try_from(count).map_err(|_| Error::Malformed(format!("count {count} overflows")))
		})
		.collect()
}

/// Decodes exactly one value.
pub fn decode_one<T: Pod>(bytes: &[u8]) -> Result<T> {
	match decode::<T>(bytes)?.as_slice() {
		&[value] => Ok(value),
		values => Err(Error::Malformed(format!(
			"expected one value, got {}",
			values.len()
		))),
	}
}

#[cfg(test)]
mod test {
	use super::{decode, decode_counts, decode_one, encode, encode_count};
	use crate::Error;

	#[test]
	fn misaligned_payload() {
		let bytes = encode(&[1.5f64, -2.0]);
		// Shift by one byte so that the values are misaligned in memory.
		let mut shifted = vec![0u8];
		shifted.extend_from_slice(&bytes);
		assert_eq!(decode::<f64>(&shifted[1..]).unwrap(), vec![1.5, -2.0]);
	}

	#[test]
	fn truncated_payload() {
		let bytes = encode(&[1.0f32]);
		assert!(matches!(decode::<f32>(&bytes[..3]), Err(Error::Malformed(_))));
		assert!(matches!(decode_one::<f32>(&[]), Err(Error::Malformed(_))));
	}

	#[test]
	fn counts() {
		assert_eq!(decode_counts(&encode_count(42)).unwrap(), vec![42]);
		assert_eq!(decode_one::<u64>(&encode_count(7)).unwrap(), 7);
	}
}
