/*!
# Subtool: Block Cache
*/

use ahash::AHashMap;
use std::{
	collections::VecDeque,
	fmt,
	sync::Arc,
};



#[derive(Debug)]
/// # Block Cache.
///
/// A bounded LRU mapping opaque keys, section names like `"dt"` and block
/// indices like `"block-7"`, to immutable byte buffers. The streaming
/// transforms lean on it heavily; repointing, for example, visits each data
/// block three times as the window slides past.
///
/// Keys collide by value; a second `add` under the same key simply replaces
/// the first. Entries live until evicted from the cold end or flushed.
pub struct BlockCache {
	/// # Capacity (bytes).
	cap: usize,

	/// # Bytes Currently Retained.
	used: usize,

	/// # Keyed Buffers.
	map: AHashMap<Box<str>, Arc<[u8]>>,

	/// # Recency Order (hottest first).
	order: VecDeque<Box<str>>,

	/// # Running Statistics.
	stats: CacheStats,
}

impl BlockCache {
	#[must_use]
	/// # New Instance.
	pub fn new(cap: usize) -> Self {
		Self {
			cap,
			used: 0,
			map: AHashMap::new(),
			order: VecDeque::new(),
			stats: CacheStats::default(),
		}
	}

	/// # Add a Buffer.
	///
	/// Insert `buf` at the hot end under `key`, evicting cold entries as
	/// needed to make room. Returns `false`, without evicting anything, if
	/// the buffer could never fit.
	pub fn add(&mut self, key: &str, buf: Arc<[u8]>) -> bool {
		let len = buf.len();
		if self.cap < len { return false; }

		// Last write wins.
		if self.map.contains_key(key) { self.remove(key); }

		// Clear room from the cold end.
		while self.cap < self.used + len {
			let Some(cold) = self.order.back().cloned() else { break; };
			self.remove(&cold);
		}

		self.used += len;
		self.stats.inserts += 1;
		self.stats.bytes_retained += len as u64;
		self.order.push_front(Box::from(key));
		self.map.insert(Box::from(key), buf);
		true
	}

	/// # Fetch a Buffer.
	///
	/// Return the buffer stored under `key`, if any, refreshing its recency.
	pub fn get(&mut self, key: &str) -> Option<Arc<[u8]>> {
		if let Some(buf) = self.map.get(key) {
			let buf = Arc::clone(buf);
			self.stats.hits += 1;

			// Move it back to the hot end.
			if let Some(pos) = self.order.iter().position(|k| (**k).eq(key)) {
				if let Some(k) = self.order.remove(pos) { self.order.push_front(k); }
			}

			Some(buf)
		}
		else {
			self.stats.misses += 1;
			None
		}
	}

	/// # Flush.
	///
	/// Drop every entry, leaving capacity unchanged.
	pub fn flush(&mut self) {
		self.stats.flushes += 1;
		self.stats.bytes_released += self.used as u64;
		self.used = 0;
		self.map.clear();
		self.order.clear();
	}

	/// # Change Capacity.
	///
	/// Shrinking evicts from the cold end until the retained bytes fit
	/// again.
	pub fn set_capacity(&mut self, cap: usize) {
		self.cap = cap;
		while self.cap < self.used {
			let Some(cold) = self.order.back().cloned() else { break; };
			self.remove(&cold);
		}
	}

	#[must_use]
	/// # Statistics.
	pub const fn stats(&self) -> &CacheStats { &self.stats }

	#[must_use]
	/// # Retained Bytes.
	pub const fn used(&self) -> usize { self.used }

	/// # Remove an Entry.
	fn remove(&mut self, key: &str) {
		if let Some(old) = self.map.remove(key) {
			self.used -= old.len();
			self.stats.deletes += 1;
			self.stats.bytes_released += old.len() as u64;
			if let Some(pos) = self.order.iter().position(|k| (**k).eq(key)) {
				self.order.remove(pos);
			}
		}
	}
}



#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
/// # Cache Statistics.
///
/// Strictly observational; nothing reads these back to make decisions.
pub struct CacheStats {
	/// # Lookup Hits.
	pub hits: u64,

	/// # Lookup Misses.
	pub misses: u64,

	/// # Insertions.
	pub inserts: u64,

	/// # Evictions/Removals.
	pub deletes: u64,

	/// # Whole-Cache Flushes.
	pub flushes: u64,

	/// # Total Bytes Taken In.
	pub bytes_retained: u64,

	/// # Total Bytes Let Go.
	pub bytes_released: u64,
}

impl fmt::Display for CacheStats {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		writeln!(f, "cache hits:      {}", self.hits)?;
		writeln!(f, "cache misses:    {}", self.misses)?;
		writeln!(f, "cache inserts:   {}", self.inserts)?;
		writeln!(f, "cache deletes:   {}", self.deletes)?;
		writeln!(f, "cache flushes:   {}", self.flushes)?;
		writeln!(f, "bytes retained:  {}", self.bytes_retained)?;
		write!(f,   "bytes released:  {}", self.bytes_released)
	}
}



#[cfg(test)]
mod test {
	use super::*;

	/// # Shorthand Buffer.
	fn buf(len: usize, fill: u8) -> Arc<[u8]> { vec![fill; len].into() }

	#[test]
	fn t_cache_round_trip() {
		let mut cache = BlockCache::new(64);
		assert!(cache.add("a", buf(8, 1)), "Insert within capacity failed.");
		assert_eq!(
			cache.get("a").as_deref(),
			Some(vec![1_u8; 8].as_slice()),
			"Cached buffer came back wrong."
		);
		assert!(cache.get("b").is_none(), "Phantom entry!");
		assert_eq!(cache.stats().hits, 1);
		assert_eq!(cache.stats().misses, 1);
	}

	#[test]
	fn t_cache_lru() {
		// Capacity thirty, three ten-byte entries, refresh "a", then force
		// one eviction; "b" should be the casualty.
		let mut cache = BlockCache::new(30);
		assert!(cache.add("a", buf(10, 1)), "Insert failed.");
		assert!(cache.add("b", buf(10, 2)), "Insert failed.");
		assert!(cache.add("c", buf(10, 3)), "Insert failed.");
		assert!(cache.get("a").is_some(), "Entry went missing early.");

		assert!(cache.add("d", buf(10, 4)), "Insert failed.");
		assert!(cache.get("b").is_none(), "Expected b to be evicted.");
		assert!(cache.get("a").is_some(), "Refreshed entry was evicted.");
		assert!(cache.get("c").is_some(), "Entry went missing.");
		assert!(cache.get("d").is_some(), "Entry went missing.");
		assert_eq!(cache.used(), 30, "Retained byte count drifted.");
	}

	#[test]
	fn t_cache_eviction_order() {
		// With no lookups mixed in, eviction follows insertion order.
		let mut cache = BlockCache::new(20);
		assert!(cache.add("a", buf(10, 1)), "Insert failed.");
		assert!(cache.add("b", buf(10, 2)), "Insert failed.");
		assert!(cache.add("c", buf(10, 3)), "Insert failed.");
		assert!(cache.add("d", buf(10, 4)), "Insert failed.");
		assert!(
			cache.get("a").is_none() && cache.get("b").is_none(),
			"Eviction skipped the cold end."
		);
		assert_eq!(cache.stats().deletes, 2);
	}

	#[test]
	fn t_cache_oversize() {
		let mut cache = BlockCache::new(16);
		assert!(cache.add("a", buf(8, 1)), "Insert failed.");
		assert!(! cache.add("big", buf(17, 2)), "Oversized insert should be refused.");
		assert!(cache.get("a").is_some(), "Refused insert still evicted.");
	}

	#[test]
	fn t_cache_alias() {
		let mut cache = BlockCache::new(32);
		assert!(cache.add("a", buf(8, 1)), "Insert failed.");
		assert!(cache.add("a", buf(4, 9)), "Replacement insert failed.");
		assert_eq!(
			cache.get("a").as_deref(),
			Some(vec![9_u8; 4].as_slice()),
			"Last write should win."
		);
		assert_eq!(cache.used(), 4, "Aliased bytes were double counted.");
	}

	#[test]
	fn t_cache_shrink() {
		let mut cache = BlockCache::new(30);
		assert!(cache.add("a", buf(10, 1)), "Insert failed.");
		assert!(cache.add("b", buf(10, 2)), "Insert failed.");
		assert!(cache.add("c", buf(10, 3)), "Insert failed.");
		cache.set_capacity(15);
		assert!(cache.get("a").is_none(), "Shrink should drop the coldest.");
		assert!(cache.get("b").is_none(), "Shrink should drop the coldest.");
		assert!(cache.get("c").is_some(), "Shrink dropped too much.");
	}
}
