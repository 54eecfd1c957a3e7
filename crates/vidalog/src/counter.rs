use std::collections::HashMap;
use std::hash::Hash;
use std::ops::{Index, IndexMut};

/// Occurrence counter, used to track how many readings were skipped per
/// reason without dropping that information on the floor.
#[derive(Debug)]
pub struct Counter<T>
where
    T: Eq + Hash,
{
    counts: HashMap<T, u64>,
}

impl<T> Default for Counter<T>
where
    T: Eq + Hash,
{
    fn default() -> Counter<T> {
        Counter {
            counts: HashMap::new(),
        }
    }
}

impl<T> Counter<T>
where
    T: Eq + Hash,
{
    pub fn new(values: impl IntoIterator<Item = T>) -> Counter<T> {
        let mut this = Counter {
            counts: HashMap::new(),
        };
        for value in values.into_iter() {
            this[value] += 1;
        }
        this
    }

    pub fn single_most_common(&self) -> Option<(&T, &u64)> {
        if self.counts.is_empty() {
            return None;
        }

        let mut max = 0;
        let mut candidate = None;
        for (key, count) in self.counts.iter() {
            if count > &max {
                max = *count;
                candidate = Some((key, count));
            }
        }
        candidate
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.counts.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn iter(&self) -> std::collections::hash_map::Iter<T, u64> {
        self.counts.iter()
    }
}

impl<T> Index<T> for Counter<T>
where
    T: Eq + Hash,
{
    type Output = u64;

    fn index(&self, key: T) -> &u64 {
        self.counts.get(&key).unwrap_or(&0)
    }
}

impl<T> IndexMut<T> for Counter<T>
where
    T: Eq + Hash,
{
    fn index_mut(&mut self, key: T) -> &mut u64 {
        self.counts.entry(key).or_insert(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_iterator() {
        let values = [1, 2, 2, 3, 3, 3];
        let counter = Counter::new(values);

        assert_eq!(counter[0], 0); // 0 not in the counter
        assert_eq!(counter[1], 1);
        assert_eq!(counter[2], 2);
        assert_eq!(counter[3], 3);
        assert_eq!(counter.total(), 6);
    }

    #[test]
    fn test_index_mut() {
        let values = [1, 2, 2, 3, 3, 3];
        let mut counter = Counter::default();

        for v in values {
            counter[v] += 1;
        }

        assert_eq!(counter[0], 0); // 0 not in the counter
        assert_eq!(counter[1], 1);
        assert_eq!(counter[2], 2);
        assert_eq!(counter[3], 3);
    }

    #[test]
    fn test_most_common() {
        let values = [1, 2, 2, 3, 3, 3];
        let counter = Counter::new(values);

        assert_eq!(counter.single_most_common(), Some((&3, &3)));
        assert_eq!(Counter::<u32>::default().single_most_common(), None);
    }
}
