//! Quad-tree spatial index over normalized memory regions
//!
//! Each region is placed as the point `(normalized_address, normalized_size)`
//! in the unit square. A leaf holds at most one region; inserting into an
//! occupied leaf splits it into four equal quadrants until `max_level` is
//! reached, after which colliding regions are dropped and counted.
//!
//! Points lying exactly on a midpoint go to the upper/right quadrant, so every
//! point has exactly one home and no region is lost to boundary straddling.
//!
//! The tree is rebuilt from scratch on every [`QuadTree::update`].

use crate::config::QuadTreeConfig;
use crate::region::{normalize_regions, MemoryRegion, RegionKey, RegionType};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle in unit-square coordinates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Bounds {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Closed-interval overlap test
    pub fn intersects(&self, other: &Bounds) -> bool {
        self.x <= other.x + other.width
            && other.x <= self.x + self.width
            && self.y <= other.y + other.height
            && other.y <= self.y + self.height
    }

    pub fn contains_point(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }

    fn midpoint(&self) -> (f64, f64) {
        (self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Lower-left, lower-right, upper-left, upper-right
    fn quadrants(&self) -> [Bounds; 4] {
        let w = self.width / 2.0;
        let h = self.height / 2.0;
        let (mx, my) = self.midpoint();
        [
            Bounds::new(self.x, self.y, w, h),
            Bounds::new(mx, self.y, w, h),
            Bounds::new(self.x, my, w, h),
            Bounds::new(mx, my, w, h),
        ]
    }

    fn quadrant_index(&self, x: f64, y: f64) -> usize {
        let (mx, my) = self.midpoint();
        usize::from(x >= mx) + 2 * usize::from(y >= my)
    }
}

/// A node is an empty leaf, a leaf holding one region, or an internal node
/// with exactly four children.
#[derive(Debug, Clone)]
pub struct QuadTreeNode {
    bounds: Bounds,
    level: u32,
    data: Option<MemoryRegion>,
    children: Option<Box<[QuadTreeNode; 4]>>,
}

impl QuadTreeNode {
    fn new(bounds: Bounds, level: u32) -> Self {
        Self {
            bounds,
            level,
            data: None,
            children: None,
        }
    }

    pub fn bounds(&self) -> Bounds {
        self.bounds
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn data(&self) -> Option<&MemoryRegion> {
        self.data.as_ref()
    }

    pub fn children(&self) -> Option<&[QuadTreeNode; 4]> {
        self.children.as_deref()
    }

    /// Returns false when the region collided at `max_level` and was dropped
    fn insert(&mut self, region: MemoryRegion, max_level: u32) -> bool {
        let (x, y) = region.point();

        if let Some(children) = self.children.as_mut() {
            let index = self.bounds.quadrant_index(x, y);
            return children[index].insert(region, max_level);
        }

        if self.data.is_none() {
            self.data = Some(region);
            return true;
        }

        if self.level >= max_level {
            return false;
        }

        self.split(max_level);
        let index = self.bounds.quadrant_index(x, y);
        match self.children.as_mut() {
            Some(children) => children[index].insert(region, max_level),
            None => false,
        }
    }

    /// Move the held region into a fresh set of four children
    fn split(&mut self, max_level: u32) {
        let level = self.level + 1;
        let mut children = Box::new(self.bounds.quadrants().map(|b| QuadTreeNode::new(b, level)));

        if let Some(previous) = self.data.take() {
            let (x, y) = previous.point();
            let index = self.bounds.quadrant_index(x, y);
            children[index].insert(previous, max_level);
        }

        self.children = Some(children);
    }

    fn query<'a>(&'a self, rect: &Bounds, out: &mut Vec<&'a MemoryRegion>) {
        if !self.bounds.intersects(rect) {
            return;
        }
        if let Some(region) = &self.data {
            out.push(region);
        }
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query(rect, out);
            }
        }
    }

    fn collect_state(&self, out: &mut Vec<NodeState>) {
        out.push(NodeState {
            bounds: self.bounds,
            level: self.level,
            region: self.data.as_ref().map(MemoryRegion::key),
            region_type: self.data.as_ref().map(|r| r.region_type),
            child_count: self.children.as_ref().map_or(0, |c| c.len()),
        });
        if let Some(children) = &self.children {
            for child in children.iter() {
                child.collect_state(out);
            }
        }
    }
}

/// Flattened view of one node, for visualization
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeState {
    pub bounds: Bounds,
    pub level: u32,
    pub region: Option<RegionKey>,
    pub region_type: Option<RegionType>,
    pub child_count: usize,
}

/// Immutable snapshot of the tree after an update
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuadTreeState {
    pub nodes: Vec<NodeState>,
    pub stored: usize,
    pub dropped: usize,
}

/// Region index rebuilt every scan
#[derive(Debug, Clone)]
pub struct QuadTree {
    root: QuadTreeNode,
    config: QuadTreeConfig,
    stored: usize,
    dropped: usize,
}

impl QuadTree {
    pub fn new(config: QuadTreeConfig) -> Self {
        Self {
            root: QuadTreeNode::new(Bounds::unit(), 0),
            config,
            stored: 0,
            dropped: 0,
        }
    }

    pub fn clear(&mut self) {
        self.root = QuadTreeNode::new(Bounds::unit(), 0);
        self.stored = 0;
        self.dropped = 0;
    }

    /// Rebuild the tree from a batch of regions
    ///
    /// Regions are normalized in place against the batch's largest
    /// `address + size` before insertion.
    pub fn update(&mut self, regions: &mut [MemoryRegion]) {
        self.clear();
        normalize_regions(regions);
        for region in regions.iter() {
            self.insert(region.clone());
        }
        if self.dropped > 0 {
            tracing::debug!(
                stored = self.stored,
                dropped = self.dropped,
                "Quad-tree dropped regions at capacity"
            );
        }
    }

    /// Insert one already-normalized region; returns whether it was stored
    pub fn insert(&mut self, region: MemoryRegion) -> bool {
        if self.stored >= self.config.max_items {
            self.dropped += 1;
            return false;
        }
        let (x, y) = region.point();
        if !self.root.bounds.contains_point(x, y) {
            self.dropped += 1;
            return false;
        }
        if self.root.insert(region, self.config.max_level) {
            self.stored += 1;
            true
        } else {
            self.dropped += 1;
            false
        }
    }

    /// Regions held by nodes whose bounds intersect `rect`
    pub fn query(&self, rect: &Bounds) -> Vec<&MemoryRegion> {
        let mut out = Vec::new();
        self.root.query(rect, &mut out);
        out
    }

    pub fn root(&self) -> &QuadTreeNode {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.stored
    }

    pub fn is_empty(&self) -> bool {
        self.stored == 0
    }

    pub fn dropped(&self) -> usize {
        self.dropped
    }

    /// Depth-first flattened list of all nodes
    pub fn state(&self) -> QuadTreeState {
        let mut nodes = Vec::new();
        self.root.collect_state(&mut nodes);
        QuadTreeState {
            nodes,
            stored: self.stored,
            dropped: self.dropped,
        }
    }
}

impl Default for QuadTree {
    fn default() -> Self {
        Self::new(QuadTreeConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point_region(address: u64, x: f64, y: f64) -> MemoryRegion {
        let mut region = MemoryRegion::new(address, 0, RegionType::Data, 1);
        region.normalized_address = x;
        region.normalized_size = y;
        region
    }

    fn assert_split_invariant(tree: &QuadTree) {
        for node in tree.state().nodes {
            assert!(
                node.child_count == 0 || node.child_count == 4,
                "node at level {} has {} children",
                node.level,
                node.child_count
            );
            assert!(!(node.region.is_some() && node.child_count > 0));
        }
    }

    #[test]
    fn test_first_insert_stays_at_root() {
        let mut tree = QuadTree::default();
        assert!(tree.insert(point_region(1, 0.2, 0.2)));
        assert!(tree.root().data().is_some());
        assert!(tree.root().children().is_none());
    }

    #[test]
    fn test_second_insert_splits() {
        let mut tree = QuadTree::default();
        tree.insert(point_region(1, 0.2, 0.2));
        tree.insert(point_region(2, 0.8, 0.8));

        let root = tree.root();
        assert!(root.data().is_none());
        let children = root.children().unwrap();
        assert_eq!(children[0].data().unwrap().address, 1);
        assert_eq!(children[3].data().unwrap().address, 2);
        assert_eq!(children[0].bounds(), Bounds::new(0.0, 0.0, 0.5, 0.5));
        assert_split_invariant(&tree);
    }

    #[test]
    fn test_midpoint_goes_upper_right() {
        let mut tree = QuadTree::default();
        tree.insert(point_region(1, 0.1, 0.1));
        tree.insert(point_region(2, 0.5, 0.5));
        let children = tree.root().children().unwrap();
        assert_eq!(children[3].data().unwrap().address, 2);
    }

    #[test]
    fn test_duplicates_dropped_at_max_level() {
        let mut tree = QuadTree::new(QuadTreeConfig {
            max_level: 3,
            max_items: 100,
        });
        assert!(tree.insert(point_region(1, 0.3, 0.3)));
        assert!(!tree.insert(point_region(2, 0.3, 0.3)));

        assert_eq!(tree.len(), 1);
        assert_eq!(tree.dropped(), 1);
        let deepest = tree.state().nodes.iter().map(|n| n.level).max().unwrap();
        assert_eq!(deepest, 3);
        assert_split_invariant(&tree);
    }

    #[test]
    fn test_max_items_cap() {
        let mut tree = QuadTree::new(QuadTreeConfig {
            max_level: 8,
            max_items: 2,
        });
        tree.insert(point_region(1, 0.1, 0.1));
        tree.insert(point_region(2, 0.9, 0.1));
        assert!(!tree.insert(point_region(3, 0.1, 0.9)));
        assert_eq!(tree.len(), 2);
        assert_eq!(tree.dropped(), 1);
    }

    #[test]
    fn test_query_prunes_disjoint_quadrants() {
        let mut tree = QuadTree::default();
        tree.insert(point_region(1, 0.1, 0.1));
        tree.insert(point_region(2, 0.9, 0.9));
        tree.insert(point_region(3, 0.9, 0.1));

        let hits = tree.query(&Bounds::new(0.0, 0.0, 0.2, 0.2));
        let addresses: Vec<u64> = hits.iter().map(|r| r.address).collect();
        assert_eq!(addresses, vec![1]);
    }

    #[test]
    fn test_unit_query_returns_everything_stored() {
        let mut tree = QuadTree::default();
        for i in 0..50u64 {
            let x = (i as f64) / 50.0;
            tree.insert(point_region(i, x, 1.0 - x));
        }
        assert_eq!(tree.dropped(), 0);
        assert_eq!(tree.query(&Bounds::unit()).len(), 50);
    }

    #[test]
    fn test_update_rebuilds_from_scratch() {
        let mut tree = QuadTree::default();
        let mut first = vec![
            MemoryRegion::new(0, 100, RegionType::Heap, 1),
            MemoryRegion::new(500, 100, RegionType::Heap, 1),
        ];
        tree.update(&mut first);
        assert_eq!(tree.len(), 2);

        let mut second = vec![MemoryRegion::new(0, 4096, RegionType::Stack, 2)];
        tree.update(&mut second);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.query(&Bounds::unit())[0].process_id, 2);
        assert_eq!(second[0].normalized_size, 1.0);
    }

    #[test]
    fn test_update_with_zero_span_does_not_panic() {
        let mut tree = QuadTree::default();
        let mut regions = vec![MemoryRegion::new(0, 0, RegionType::Unknown, 1)];
        tree.update(&mut regions);
        assert_eq!(tree.len(), 1);
        assert_eq!(regions[0].point(), (0.0, 0.0));
    }

    #[test]
    fn test_state_lists_every_node() {
        let mut tree = QuadTree::default();
        tree.insert(point_region(1, 0.2, 0.2));
        tree.insert(point_region(2, 0.8, 0.8));
        let state = tree.state();
        assert_eq!(state.nodes.len(), 5);
        assert_eq!(state.stored, 2);
        assert_eq!(state.nodes.iter().filter(|n| n.region.is_some()).count(), 2);
    }
}
