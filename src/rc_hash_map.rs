//! Reference-counted values keyed by identity, with deferred removal.
//!
//! [`WebTree`](`crate::web::WebTree`) shares one JavaScript closure between all bindings of the same [`EventHandler`](`crate::EventHandler`).
//! Entries whose count drops to zero stay around until the next [`sweep`](`RcHashMap::sweep`),
//! so a handler that is released and re-acquired within one update keeps its closure.

use core::{
	borrow::Borrow,
	fmt::{self, Debug, Display, Formatter},
	hash::{BuildHasher, Hash},
};
use hashbrown::{
	hash_map::{DefaultHashBuilder, Entry},
	HashMap,
};
use num_traits::{CheckedAdd, CheckedSub, One, Zero};

pub struct RcHashMap<K, C, V, S = DefaultHashBuilder>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	entries: HashMap<K, (C, V), S>,
}

impl<K, C, V, S> Default for RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: Default + BuildHasher,
{
	fn default() -> Self {
		Self { entries: HashMap::with_hasher(S::default()) }
	}
}

impl<K, C, V, S> RcHashMap<K, C, V, S>
where
	K: Hash + Eq,
	C: CheckedAdd + CheckedSub + One + Zero,
	S: BuildHasher,
{
	/// Counts one more reference to `key`, creating its value with `create` if there was none.
	pub fn acquire(&mut self, key: K, create: impl FnOnce(&K) -> V) -> Result<&V, CountSaturatedError> {
		match self.entries.entry(key) {
			Entry::Occupied(occupied) => {
				let (count, value) = occupied.into_mut();
				*count = count.checked_add(&C::one()).ok_or(CountSaturatedError)?;
				Ok(value)
			}
			Entry::Vacant(vacant) => {
				let value = create(vacant.key());
				let (_, value) = vacant.insert((C::one(), value));
				Ok(value)
			}
		}
	}

	/// Counts one reference to `key` less. The value is only dropped by [`sweep`](`RcHashMap::sweep`).
	pub fn release<Q>(&mut self, key: &Q) -> Result<Option<&V>, CountSaturatedError>
	where
		K: Borrow<Q>,
		Q: ?Sized + Eq + Hash,
	{
		match self.entries.get_mut(key) {
			Some((count, value)) => {
				*count = count.checked_sub(&C::one()).ok_or(CountSaturatedError)?;
				Ok(Some(value))
			}
			None => Ok(None),
		}
	}

	/// Drops all entries that are no longer referenced. Returns how many were dropped.
	pub fn sweep(&mut self) -> usize {
		let before = self.entries.len();
		self.entries.retain(|_, (count, _)| !count.is_zero());
		before - self.entries.len()
	}

	#[must_use]
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	#[must_use]
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	#[must_use]
	pub fn capacity(&self) -> usize {
		self.entries.capacity()
	}
}

impl<K, C, V, S> Debug for RcHashMap<K, C, V, S>
where
	K: Hash + Eq + Debug,
	C: CheckedAdd + CheckedSub + One + Zero + Debug,
	S: BuildHasher,
{
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.debug_map().entries(self.entries.iter().map(|(key, (count, _))| (key, count))).finish()
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountSaturatedError;

impl Display for CountSaturatedError {
	fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
		f.write_str("reference count saturated")
	}
}
