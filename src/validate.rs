//! Check of the global order by one-sided reads of the successor's minimum.

use crate::{
	Result, Scalar,
	comm::{Communicator, decode, encode},
	group::ProcessGroup,
	points::LocalPoints,
};

/// Result of [`validate_order`], identical on every rank.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Verdict {
	/// Ranks whose maximum distance exceeds the minimum distance of the next rank, ascending.
	pub out_of_order: Vec<usize>,
}

impl Verdict {
	/// Whether the distances are non-decreasing across ranks.
	#[inline]
	pub fn is_ordered(&self) -> bool {
		self.out_of_order.is_empty()
	}
}

/// Checks that the maximum distance of every rank does not exceed the minimum distance of the
/// next rank.
///
/// Every rank exposes its minimum distance and reads the one of its successor without the
/// successor's participation. The flags are then collected at rank 0 and the verdict is
/// broadcast. Every rank of `comm` must call this.
pub fn validate_order<C, T>(comm: &C, local: &LocalPoints<T>) -> Result<Verdict>
where
	C: Communicator,
	T: Scalar,
{
	let world = ProcessGroup::world(comm)?;
	let rank = comm.rank();
	let (min, max) = local.distance_bounds();

	comm.expose(encode(&[min]))?;
	comm.fence()?;
	let successor = if rank + 1 < comm.size() {
		decode::<T>(&comm.get(rank + 1)?)?.first().copied()
	} else {
		None
	};
	comm.fence()?;

	let flagged = successor.is_some_and(|successor| max > successor);
	if flagged {
		tracing::warn!(rank, %max, "distance exceeds minimum of next rank");
	}

	let gathered = world.gather(encode(&[u8::from(flagged)]))?;
	let out_of_order = gathered.map(|flags| {
		flags
			.iter()
			.enumerate()
			.filter(|(_, flag)| flag.first().is_some_and(|&flag| flag != 0))
			.map(|(rank, _)| rank as u64)
			.collect::<Vec<_>>()
	});
	let out_of_order = decode::<u64>(&world.broadcast(out_of_order.map(|ranks| encode(&ranks)))?)?;
	Ok(Verdict {
		out_of_order: out_of_order.into_iter().map(|rank| rank as usize).collect(),
	})
}

#[cfg(test)]
mod test {
	use super::validate_order;
	use crate::{comm::Communicator, local, pivot::Pivot, points::LocalPoints};
	use ndarray::{Array2, arr1};

	fn run(values: &'static [[f64; 2]]) -> Vec<Vec<usize>> {
		local::run(values.len(), |comm| -> crate::Result<Vec<usize>> {
			let pivot = Pivot::new(arr1(&[0.0]))?;
			let row = values[comm.rank()];
			let points = Array2::from_shape_vec((2, 1), row.to_vec())?;
			let local = LocalPoints::new(points, &pivot)?;
			validate_order(&comm, &local).map(|verdict| verdict.out_of_order)
		})
		.unwrap()
		.into_iter()
		.collect::<crate::Result<Vec<_>>>()
		.unwrap()
	}

	#[test]
	fn ordered() {
		let verdicts = run(&[[2.0, 1.0], [2.0, 3.0], [4.0, 3.0], [5.0, 6.0]]);
		assert!(verdicts.iter().all(Vec::is_empty));
	}

	#[test]
	fn disordered() {
		let verdicts = run(&[[1.0, 2.0], [5.0, 3.0], [4.0, 6.0], [7.0, 8.0]]);
		assert!(verdicts.iter().all(|ranks| ranks == &[1]));
		let verdicts = run(&[[9.0, 2.0], [1.0, 3.0]]);
		assert_eq!(verdicts, vec![vec![0], vec![0]]);
	}

	#[test]
	fn single_rank() {
		assert_eq!(run(&[[3.0, 1.0]]), vec![Vec::<usize>::new()]);
	}
}
