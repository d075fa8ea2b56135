//! Key to count mappings and their reduction.

use rustc_hash::FxHashMap;

use crate::error::{CountError, Result};

/// Per-key occurrence totals.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    counts: FxHashMap<String, u64>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `count` to the total for `key`.
    ///
    /// Fails with [`CountError::Overflow`] rather than wrapping when the
    /// total no longer fits in a `u64`; the tally is left unchanged.
    pub fn add(&mut self, key: &str, count: u64) -> Result<()> {
        // Only allocate the owned key the first time it is seen.
        match self.counts.get_mut(key) {
            Some(total) => *total = checked_sum(key, *total, count)?,
            None => {
                self.counts.insert(key.to_owned(), count);
            }
        }
        Ok(())
    }

    /// Total for `key`, zero when it never occurred.
    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.counts.contains_key(key)
    }

    /// Number of distinct keys.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Fold `other` into `self`, key by key.
    ///
    /// On overflow the error names the key and `self` holds a partial
    /// merge; the run is abandoned at that point anyway.
    pub fn merge(&mut self, mut other: Tally) -> Result<()> {
        // Walk the smaller map.
        if other.counts.len() > self.counts.len() {
            std::mem::swap(&mut self.counts, &mut other.counts);
        }
        for (key, count) in other.counts {
            match self.counts.get_mut(&key) {
                Some(total) => *total = checked_sum(&key, *total, count)?,
                None => {
                    self.counts.insert(key, count);
                }
            }
        }
        Ok(())
    }
}

fn checked_sum(key: &str, total: u64, count: u64) -> Result<u64> {
    total.checked_add(count).ok_or_else(|| CountError::Overflow {
        key: key.to_owned(),
    })
}

/// Sum any number of tallies key-wise.
///
/// The result does not depend on the order or grouping of the inputs, so
/// partial tallies can be fed in whatever order their workers finished.
pub fn reduce<I>(tallies: I) -> Result<Tally>
where
    I: IntoIterator<Item = Tally>,
{
    let mut total = Tally::new();
    for tally in tallies {
        total.merge(tally)?;
    }
    Ok(total)
}

#[cfg(test)]
impl<K: Into<String>> FromIterator<(K, u64)> for Tally {
    fn from_iter<I: IntoIterator<Item = (K, u64)>>(iter: I) -> Self {
        let mut tally = Tally::new();
        for (key, count) in iter {
            *tally.counts.entry(key.into()).or_insert(0) += count;
        }
        tally
    }
}
