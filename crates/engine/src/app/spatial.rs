use std::collections::{BTreeSet, HashMap};

use super::entity::EntityId;

/// Tile-index buckets of the entities overlapping each tile.
///
/// Only non-empty buckets are stored.
#[derive(Debug, Default, Clone)]
pub struct SpatialHash {
    buckets: HashMap<usize, BTreeSet<EntityId>>,
}

impl SpatialHash {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: &EntityId, tiles: &BTreeSet<usize>) {
        for tile in tiles {
            self.buckets.entry(*tile).or_default().insert(id.clone());
        }
    }

    pub fn remove(&mut self, id: &EntityId, tiles: &BTreeSet<usize>) {
        for tile in tiles {
            let Some(bucket) = self.buckets.get_mut(tile) else {
                continue;
            };
            bucket.remove(id);
            if bucket.is_empty() {
                self.buckets.remove(tile);
            }
        }
    }

    pub fn bucket(&self, tile: usize) -> Option<&BTreeSet<EntityId>> {
        self.buckets.get(&tile)
    }

    pub fn contains(&self, tile: usize, id: &EntityId) -> bool {
        self.buckets
            .get(&tile)
            .is_some_and(|bucket| bucket.contains(id))
    }

    /// Union of the buckets for `tiles`, sorted by id.
    pub fn collect<'a>(&self, tiles: impl IntoIterator<Item = &'a usize>) -> BTreeSet<EntityId> {
        let mut found = BTreeSet::new();
        for tile in tiles {
            if let Some(bucket) = self.buckets.get(tile) {
                found.extend(bucket.iter().cloned());
            }
        }
        found
    }

    pub fn occupied_tiles(&self) -> BTreeSet<usize> {
        self.buckets.keys().copied().collect()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles(values: &[usize]) -> BTreeSet<usize> {
        values.iter().copied().collect()
    }

    #[test]
    fn insert_creates_buckets_and_remove_drops_empty_ones() {
        let mut hash = SpatialHash::new();
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        hash.insert(&a, &tiles(&[1, 2]));
        hash.insert(&b, &tiles(&[2, 3]));
        assert_eq!(hash.bucket_count(), 3);
        assert!(hash.contains(2, &a));
        assert!(hash.contains(2, &b));

        hash.remove(&a, &tiles(&[1, 2]));
        assert!(hash.bucket(1).is_none());
        assert_eq!(hash.bucket(2).map(BTreeSet::len), Some(1));
        assert_eq!(hash.occupied_tiles(), tiles(&[2, 3]));

        hash.remove(&b, &tiles(&[2, 3]));
        assert!(hash.is_empty());
    }

    #[test]
    fn removing_unindexed_entity_is_a_no_op() {
        let mut hash = SpatialHash::new();
        let a = EntityId::from("a");
        hash.insert(&a, &tiles(&[4]));
        hash.remove(&EntityId::from("ghost"), &tiles(&[4, 5]));
        assert!(hash.contains(4, &a));
        assert_eq!(hash.bucket_count(), 1);
    }

    #[test]
    fn collect_unions_buckets_without_duplicates() {
        let mut hash = SpatialHash::new();
        let a = EntityId::from("a");
        let b = EntityId::from("b");
        hash.insert(&a, &tiles(&[0, 1]));
        hash.insert(&b, &tiles(&[1]));
        let found = hash.collect(&[0, 1, 7]);
        assert_eq!(found.into_iter().collect::<Vec<_>>(), vec![a, b]);
    }
}
