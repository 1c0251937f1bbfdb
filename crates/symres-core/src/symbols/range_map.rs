//! Non-overlapping address ranges keyed by start address.

use std::collections::BTreeMap;

/// Ordered set of `[base, base + size)` ranges, each carrying a value.
///
/// Ranges never overlap; [`RangeMap::store`] rejects any range that would.
#[derive(Debug, Clone)]
pub(crate) struct RangeMap<T>
{
    entries: BTreeMap<u64, (u64, T)>,
}

impl<T> Default for RangeMap<T>
{
    fn default() -> Self
    {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

impl<T> RangeMap<T>
{
    /// Store `value` for `[base, base + size)`.
    ///
    /// Returns `false` (and drops `value`) for empty ranges, ranges that wrap
    /// past `u64::MAX`, and ranges overlapping an existing one.
    pub(crate) fn store(&mut self, base: u64, size: u64, value: T) -> bool
    {
        if size == 0 {
            return false;
        }
        let Some(last) = base.checked_add(size - 1) else {
            return false;
        };

        if self.entries.range(base..=last).next().is_some() {
            return false;
        }
        if let Some((&prev_base, &(prev_size, _))) = self.entries.range(..base).next_back() {
            if base - prev_base < prev_size {
                return false;
            }
        }

        self.entries.insert(base, (size, value));
        true
    }

    /// The range containing `address`, as `(base, size, value)`.
    pub(crate) fn retrieve(&self, address: u64) -> Option<(u64, u64, &T)>
    {
        self.retrieve_nearest(address)
            .filter(|&(base, size, _)| address - base < size)
    }

    /// The range with the greatest base at or below `address`, whether or not
    /// it contains `address`.
    pub(crate) fn retrieve_nearest(&self, address: u64) -> Option<(u64, u64, &T)>
    {
        self.entries
            .range(..=address)
            .next_back()
            .map(|(&base, (size, value))| (base, *size, value))
    }

    pub(crate) fn len(&self) -> usize
    {
        self.entries.len()
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn test_store_rejects_overlap()
    {
        let mut map = RangeMap::default();
        assert!(map.store(0x100, 0x10, "a"));
        assert!(!map.store(0x108, 0x10, "b"));
        assert!(!map.store(0xf8, 0x10, "c"));
        assert!(map.store(0x110, 0x10, "d"));
        assert!(!map.store(0x200, 0, "empty"));
        assert!(!map.store(u64::MAX, 2, "wraps"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_retrieve_and_nearest()
    {
        let mut map = RangeMap::default();
        map.store(0x100, 0x10, "a");
        map.store(0x200, 0x10, "b");

        assert_eq!(map.retrieve(0x105), Some((0x100, 0x10, &"a")));
        assert_eq!(map.retrieve(0x150), None);
        assert_eq!(map.retrieve_nearest(0x150), Some((0x100, 0x10, &"a")));
        assert_eq!(map.retrieve_nearest(0x50), None);
        assert_eq!(map.retrieve(0x20f), Some((0x200, 0x10, &"b")));
        assert_eq!(map.retrieve(0x210), None);
    }
}
