//! Addresses resolved during one evaluation

use std::collections::BTreeMap;

/// Maps small ids to the addresses a formula read
///
/// Ids start at 1 and grow monotonically; callers use them to build
/// dependency edges after a compile.
#[derive(Debug, Clone, Default)]
pub struct AddressCache {
    entries: BTreeMap<u32, String>,
    last_id: u32,
}

impl AddressCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a resolved address and return its id
    pub fn add(&mut self, address: impl Into<String>) -> u32 {
        self.last_id += 1;
        self.entries.insert(self.last_id, address.into());
        self.last_id
    }

    pub fn get(&self, id: u32) -> Option<&str> {
        self.entries.get(&id).map(String::as_str)
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.entries.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &str)> {
        self.entries.iter().map(|(id, a)| (*id, a.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Forget every entry; ids keep growing
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let mut cache = AddressCache::new();
        assert_eq!(cache.add("Sheet1!A1"), 1);
        assert_eq!(cache.add("Sheet1!A1"), 2);
        assert_eq!(cache.get(1), Some("Sheet1!A1"));

        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.add("Sheet1!B2"), 3);
        assert_eq!(cache.ids().collect::<Vec<_>>(), vec![3]);
    }
}
