//! Binary point files and their even distribution across ranks.
//!
//! A file starts with two little-endian `i64`, the dimensionality and the number of points,
//! followed by the coordinates of every point as little-endian `f32`, point after point. Only the
//! largest power of two of points not exceeding the count is distributed, in equal consecutive
//! blocks.

use crate::{
	Error, Result, Scalar,
	comm::{Communicator, decode, decode_counts, encode},
	group::ProcessGroup,
};
use core::mem;
use ndarray::Array2;
use std::io::{self, Read};

/// Returns the largest power of two not exceeding `n`, or 0 if `n` is 0.
///
/// # Examples
///
/// ```
/// use ndarray_pivot::dataset::floor_pow2;
///
/// assert_eq!(floor_pow2(69), 64);
/// assert_eq!(floor_pow2(64), 64);
/// assert_eq!(floor_pow2(0), 0);
/// ```
#[inline]
pub fn floor_pow2(n: usize) -> usize {
	match n {
		0 => 0,
		n => 1 << n.ilog2(),
	}
}

/// Header of a point file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
	/// Dimensionality.
	pub dims: usize,
	/// Number of points.
	pub points: usize,
}

/// Reads the header of a point file.
///
/// # Errors
///
/// Returns [`Error::Io`] if the reader ends early and [`Error::Malformed`] on negative values.
pub fn read_header<R: Read + ?Sized>(reader: &mut R) -> Result<Header> {
	let mut read = || -> Result<usize> {
		let mut bytes = [0; 8];
		reader.read_exact(&mut bytes)?;
		let value = i64::from_le_bytes(bytes);
		usize::try_from(value).map_err(|_| Error::Malformed(format!("negative header value {value}")))
	};
	let dims = read()?;
	let points = read()?;
	Ok(Header { dims, points })
}

/// Distribution of a point file across ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
	/// Dimensionality.
	pub dims: usize,
	/// Points in the file.
	pub total_points: usize,
	/// Number of ranks.
	pub processes: usize,
}

impl Layout {
	/// Creates the layout of `total_points` points of `dims` dimensions across `processes` ranks.
	///
	/// # Errors
	///
	/// Returns [`Error::ProcessCount`] unless `processes` is a power of two,
	/// [`Error::EmptyPointSet`] without dimensions, [`Error::Config`] if there are fewer points
	/// than ranks, and [`Error::Malformed`] if the block of a rank is not addressable.
	pub fn new(dims: usize, total_points: usize, processes: usize) -> Result<Self> {
		if !processes.is_power_of_two() {
			return Err(Error::ProcessCount(processes));
		}
		if dims == 0 {
			return Err(Error::EmptyPointSet);
		}
		if floor_pow2(total_points) < processes {
			return Err(Error::Config(format!(
				"{total_points} points cannot be distributed across {processes} processes"
			)));
		}
		let layout = Self {
			dims,
			total_points,
			processes,
		};
		layout.block_bytes()?;
		Ok(layout)
	}

	/// Points every rank receives.
	#[inline]
	pub fn points_per_process(&self) -> usize {
		floor_pow2(self.total_points) / self.processes
	}

	/// Coordinates every rank receives.
	///
	/// # Errors
	///
	/// Returns [`Error::Malformed`] if the count overflows.
	pub fn block_len(&self) -> Result<usize> {
		self.points_per_process()
			.checked_mul(self.dims)
			.ok_or_else(|| self.overflow())
	}

	/// Bytes of the block of every rank in the file.
	///
	/// # Errors
	///
	/// Returns [`Error::Malformed`] if the count overflows.
	pub fn block_bytes(&self) -> Result<usize> {
		self.block_len()?
			.checked_mul(mem::size_of::<f32>())
			.ok_or_else(|| self.overflow())
	}

	fn overflow(&self) -> Error {
		Error::Malformed(format!(
			"blocks of {} points of {} dimensions overflow",
			self.points_per_process(),
			self.dims
		))
	}
}

/// Reads a point file at rank 0 and hands every rank its block of points.
///
/// Only rank 0 needs a `reader`; the others pass `None`. Every rank of `comm` must call this.
///
/// # Errors
///
/// Returns [`Error::Config`] if rank 0 has no reader and the errors of [`read_header`] and
/// [`Layout::new`].
pub fn scatter<C, T, R>(comm: &C, reader: Option<R>) -> Result<Array2<T>>
where
	C: Communicator,
	T: Scalar,
	R: Read,
{
	let world = ProcessGroup::world(comm)?;
	let (layout, blocks) = if world.rank() == 0 {
		let mut reader = reader.ok_or_else(|| Error::Config("rank 0 needs a point file".into()))?;
		let header = read_header(&mut reader)?;
		let layout = Layout::new(header.dims, header.points, world.size())?;
		tracing::debug!(
			dims = layout.dims,
			total_points = layout.total_points,
			points_per_process = layout.points_per_process(),
			"read header"
		);
		let bytes = layout.block_bytes()?;
		let blocks = (0..world.size())
			.map(|_| read_block::<T, _>(&mut reader, bytes).map(|block| encode(&block)))
			.collect::<Result<Vec<_>>>()?;
		let layout = encode(&[layout.dims as u64, layout.points_per_process() as u64]);
		(Some(layout), Some(blocks))
	} else {
		(None, None)
	};

	let (dims, points) = match decode_counts(&world.broadcast(layout)?)?[..] {
		[dims, points] => (dims, points),
		ref counts => return Err(Error::Malformed(format!("layout of {} counts", counts.len()))),
	};
	let coords = decode::<T>(&world.scatter(blocks)?)?;
	Ok(Array2::from_shape_vec((points, dims), coords)?)
}

fn read_block<T: Scalar, R: Read>(reader: &mut R, bytes: usize) -> Result<Vec<T>> {
	// Grows with the data actually read, not with what the header claims.
	let mut block = Vec::new();
	reader.by_ref().take(bytes as u64).read_to_end(&mut block)?;
	if block.len() != bytes {
		return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
	}
	Ok(block
		.chunks_exact(mem::size_of::<f32>())
		.map(|chunk| T::from_f32(f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]])))
		.collect())
}

#[cfg(test)]
mod test {
	use super::{Header, Layout, floor_pow2, read_header, scatter};
	use crate::{Error, comm::Communicator, local};
	use std::io::{Cursor, ErrorKind};

	fn file(dims: i64, points: i64, coords: &[f32]) -> Vec<u8> {
		let mut bytes = Vec::new();
		bytes.extend(dims.to_le_bytes());
		bytes.extend(points.to_le_bytes());
		for coord in coords {
			bytes.extend(coord.to_le_bytes());
		}
		bytes
	}

	#[test]
	fn powers_of_two() {
		assert_eq!(floor_pow2(1), 1);
		assert_eq!(floor_pow2(1023), 512);
		assert_eq!(floor_pow2(1024), 1024);
	}

	#[test]
	fn header() {
		let bytes = file(784, 60000, &[]);
		let header = read_header(&mut Cursor::new(bytes)).unwrap();
		assert_eq!(
			header,
			Header {
				dims: 784,
				points: 60000
			}
		);
		assert!(matches!(
			read_header(&mut Cursor::new(file(-1, 3, &[]))),
			Err(Error::Malformed(_))
		));
		assert!(matches!(
			read_header(&mut &[0u8; 12][..]),
			Err(Error::Io(error)) if error.kind() == ErrorKind::UnexpectedEof
		));
	}

	#[test]
	fn layouts() {
		assert_eq!(Layout::new(3, 60000, 16).unwrap().points_per_process(), 2048);
		assert!(matches!(Layout::new(3, 100, 6), Err(Error::ProcessCount(6))));
		assert!(matches!(Layout::new(0, 100, 4), Err(Error::EmptyPointSet)));
		assert!(matches!(Layout::new(3, 3, 4), Err(Error::Config(_))));
		assert_eq!(Layout::new(3, 60000, 16).unwrap().block_bytes().unwrap(), 2048 * 3 * 4);
		assert!(matches!(Layout::new(1 << 62, 4, 4), Err(Error::Malformed(_))));
		assert!(matches!(Layout::new(usize::MAX, 8, 1), Err(Error::Malformed(_))));
	}

	#[test]
	fn oversized_header() {
		// Coordinate bytes of one block overflow.
		let bytes = file(1 << 62, 4, &[0.0; 4]);
		let blocks = local::run(4, |comm| {
			let reader = (comm.rank() == 0).then_some(&bytes[..]);
			scatter::<_, f32, _>(&comm, reader)
		})
		.unwrap();
		assert!(matches!(blocks[0], Err(Error::Malformed(_))));
		assert!(blocks[1..]
			.iter()
			.all(|block| matches!(block, Err(Error::Disconnected { rank: 0 }))));

		// Blocks of two gibibytes each, backed by no data.
		let bytes = file(1 << 28, 4, &[0.0; 4]);
		let blocks = local::run(2, |comm| {
			let reader = (comm.rank() == 0).then_some(&bytes[..]);
			scatter::<_, f32, _>(&comm, reader)
		})
		.unwrap();
		assert!(matches!(
			&blocks[0],
			Err(Error::Io(error)) if error.kind() == ErrorKind::UnexpectedEof
		));
	}

	#[test]
	fn scattered_blocks() {
		// Ten points of two dimensions, of which eight are distributed.
		let coords = (0..20).map(|coord| coord as f32).collect::<Vec<_>>();
		let bytes = file(2, 10, &coords);
		let blocks = local::run(4, |comm| {
			let reader = (comm.rank() == 0).then_some(&bytes[..]);
			scatter::<_, f64, _>(&comm, reader)
		})
		.unwrap();
		for (rank, block) in blocks.into_iter().enumerate() {
			let block = block.unwrap();
			assert_eq!(block.dim(), (2, 2));
			assert_eq!(block[(0, 0)], (rank * 4) as f64);
			assert_eq!(block[(1, 1)], (rank * 4 + 3) as f64);
		}
	}

	#[test]
	fn truncated_file() {
		let bytes = file(2, 8, &[0.0; 10]);
		let blocks = local::run(2, |comm| {
			let reader = (comm.rank() == 0).then_some(&bytes[..]);
			scatter::<_, f32, _>(&comm, reader)
		})
		.unwrap();
		assert!(matches!(blocks[0], Err(Error::Io(_))));
		assert!(matches!(blocks[1], Err(Error::Disconnected { rank: 0 })));
	}
}
