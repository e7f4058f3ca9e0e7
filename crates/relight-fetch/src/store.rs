//! Per-tile texture storage.

/// Loaded state of one tile.
#[derive(Debug)]
pub struct TileNode<T> {
    /// One texture per component plane.
    pub textures: Vec<Option<T>>,
    /// Planes still missing. `0` is complete; [`TileNode::FAILED`] marks a
    /// tile that will not be retried.
    pub missing: i32,
}

impl<T> TileNode<T> {
    /// Marker for a tile whose fetch failed.
    pub const FAILED: i32 = -1;

    fn empty(planes: usize) -> Self {
        Self {
            textures: (0..planes).map(|_| None).collect(),
            missing: i32::try_from(planes).unwrap_or(i32::MAX),
        }
    }

    /// Every plane is loaded.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.missing == 0
    }

    /// The tile failed to load.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.missing == Self::FAILED
    }
}

/// Result of installing a plane.
#[derive(Debug, PartialEq, Eq)]
pub enum Installed<T> {
    /// The tile is now complete.
    Ready,
    /// More planes are outstanding.
    Pending,
    /// The tile was failed, unknown or already had the plane; the texture
    /// was not stored and should be released.
    Discarded(T),
}

/// Flat array of tile nodes indexed by pyramid tile index.
#[derive(Debug)]
pub struct TileStore<T> {
    nodes: Vec<Option<TileNode<T>>>,
    planes: usize,
}

impl<T> TileStore<T> {
    /// Store for `tile_count` tiles of `planes` components each.
    #[must_use]
    pub fn new(tile_count: usize, planes: usize) -> Self {
        Self {
            nodes: (0..tile_count).map(|_| None).collect(),
            planes,
        }
    }

    /// Planes per tile.
    #[must_use]
    pub fn planes(&self) -> usize {
        self.planes
    }

    /// Node of tile `index`, if any request touched it.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&TileNode<T>> {
        self.nodes.get(index)?.as_ref()
    }

    /// Whether tile `index` is loaded and drawable.
    #[must_use]
    pub fn is_complete(&self, index: usize) -> bool {
        self.get(index).is_some_and(TileNode::is_complete)
    }

    /// Whether tile `index` failed.
    #[must_use]
    pub fn is_failed(&self, index: usize) -> bool {
        self.get(index).is_some_and(TileNode::is_failed)
    }

    /// Whether tile `index` has a node (loaded, loading or failed).
    #[must_use]
    pub fn is_known(&self, index: usize) -> bool {
        self.get(index).is_some()
    }

    /// Create the node of a tile about to be requested.
    pub fn begin(&mut self, index: usize) {
        if let Some(slot) = self.nodes.get_mut(index)
            && slot.is_none()
        {
            *slot = Some(TileNode::empty(self.planes));
        }
    }

    /// Store the texture of one plane.
    pub fn install(&mut self, index: usize, plane: usize, texture: T) -> Installed<T> {
        let Some(Some(node)) = self.nodes.get_mut(index) else {
            return Installed::Discarded(texture);
        };
        if node.missing <= 0 {
            return Installed::Discarded(texture);
        }
        match node.textures.get_mut(plane) {
            Some(entry @ None) => *entry = Some(texture),
            _ => return Installed::Discarded(texture),
        }
        node.missing -= 1;
        if node.missing == 0 {
            Installed::Ready
        } else {
            Installed::Pending
        }
    }

    /// Mark a tile failed and hand back any planes it already had.
    pub fn mark_failed(&mut self, index: usize) -> Vec<T> {
        let Some(slot) = self.nodes.get_mut(index) else {
            return Vec::new();
        };
        let node = slot.get_or_insert_with(|| TileNode::empty(0));
        node.missing = TileNode::<T>::FAILED;
        node.textures.iter_mut().filter_map(Option::take).collect()
    }

    /// Forget every tile, returning all stored textures.
    pub fn reset(&mut self) -> Vec<T> {
        let mut released = Vec::new();
        for slot in &mut self.nodes {
            if let Some(node) = slot.take() {
                released.extend(node.textures.into_iter().flatten());
            }
        }
        released
    }

    /// Textures of a complete tile, in plane order.
    pub fn textures(&self, index: usize) -> Option<impl Iterator<Item = &T> + '_> {
        let node = self.get(index).filter(|n| n.is_complete())?;
        Some(node.textures.iter().flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tile_completes_after_all_planes() {
        let mut store = TileStore::new(4, 3);
        store.begin(2);
        assert_eq!(store.install(2, 0, 'a'), Installed::Pending);
        assert_eq!(store.install(2, 2, 'c'), Installed::Pending);
        assert!(!store.is_complete(2));
        assert_eq!(store.install(2, 1, 'b'), Installed::Ready);
        assert!(store.is_complete(2));
        assert_eq!(
            store.textures(2).unwrap().copied().collect::<Vec<_>>(),
            ['a', 'b', 'c']
        );
    }

    #[test]
    fn test_duplicate_and_unknown_planes_are_discarded() {
        let mut store = TileStore::new(2, 2);
        assert_eq!(store.install(0, 0, 1), Installed::Discarded(1));
        store.begin(0);
        assert_eq!(store.install(0, 0, 1), Installed::Pending);
        assert_eq!(store.install(0, 0, 2), Installed::Discarded(2));
        assert_eq!(store.install(0, 5, 3), Installed::Discarded(3));
        assert_eq!(store.install(7, 0, 4), Installed::Discarded(4));
    }

    #[test]
    fn test_failed_tile_releases_and_refuses_planes() {
        let mut store = TileStore::new(1, 2);
        store.begin(0);
        store.install(0, 1, 10);
        assert_eq!(store.mark_failed(0), [10]);
        assert!(store.is_failed(0));
        assert!(store.is_known(0));
        assert_eq!(store.install(0, 0, 11), Installed::Discarded(11));
        assert!(store.textures(0).is_none());
    }

    #[test]
    fn test_reset_returns_everything() {
        let mut store = TileStore::new(3, 1);
        for i in 0..3 {
            store.begin(i);
            store.install(i, 0, i);
        }
        let mut released = store.reset();
        released.sort_unstable();
        assert_eq!(released, [0, 1, 2]);
        assert!(!store.is_known(0));
    }
}
