//! Property-based tests for normalization and the quad-tree index
//!
//! Invariants checked on random region batches:
//! 1. Normalized coordinates always land in the unit square
//! 2. Every stored region lies inside the bounds of the node holding it
//! 3. Nodes have zero or four children and never hold data while split
//! 4. Stored plus dropped accounts for every input region
//! 5. A unit-square query returns every stored region

use memlens::config::QuadTreeConfig;
use memlens::quadtree::{Bounds, QuadTree, QuadTreeNode};
use memlens::region::{normalize_regions, MemoryRegion, RegionType};
use proptest::prelude::*;

fn region_strategy() -> impl Strategy<Value = MemoryRegion> {
    (0u64..1 << 40, 0u64..1 << 24).prop_map(|(address, size)| {
        MemoryRegion::new(address, size, RegionType::Heap, 1)
    })
}

fn walk<'a>(node: &'a QuadTreeNode, out: &mut Vec<&'a QuadTreeNode>) {
    out.push(node);
    if let Some(children) = node.children() {
        for child in children.iter() {
            walk(child, out);
        }
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_normalized_coordinates_in_unit_square(
        mut regions in prop::collection::vec(region_strategy(), 1..200),
    ) {
        normalize_regions(&mut regions);
        for r in &regions {
            prop_assert!((0.0..=1.0).contains(&r.normalized_address));
            prop_assert!((0.0..=1.0).contains(&r.normalized_size));
        }
    }

    #[test]
    fn prop_stored_regions_inside_node_bounds(
        mut regions in prop::collection::vec(region_strategy(), 1..300),
        max_level in 1u32..12,
    ) {
        let mut tree = QuadTree::new(QuadTreeConfig { max_level, max_items: 100_000 });
        tree.update(&mut regions);

        let mut nodes = Vec::new();
        walk(tree.root(), &mut nodes);
        for node in nodes {
            if let Some(region) = node.data() {
                let (x, y) = region.point();
                prop_assert!(node.bounds().contains_point(x, y));
            }
            prop_assert!(node.level() <= max_level);
        }
    }

    #[test]
    fn prop_split_invariant_and_accounting(
        mut regions in prop::collection::vec(region_strategy(), 0..300),
        max_items in 1usize..400,
    ) {
        let total = regions.len();
        let mut tree = QuadTree::new(QuadTreeConfig { max_level: 10, max_items });
        tree.update(&mut regions);

        let state = tree.state();
        for node in &state.nodes {
            prop_assert!(node.child_count == 0 || node.child_count == 4);
            prop_assert!(!(node.region.is_some() && node.child_count > 0));
        }
        prop_assert_eq!(state.stored + state.dropped, total);
        prop_assert!(state.stored <= max_items);
        prop_assert_eq!(
            state.nodes.iter().filter(|n| n.region.is_some()).count(),
            state.stored
        );
        prop_assert_eq!(tree.query(&Bounds::unit()).len(), state.stored);
    }

    #[test]
    fn prop_query_results_intersect_rect(
        mut regions in prop::collection::vec(region_strategy(), 1..200),
        x in 0.0f64..1.0,
        y in 0.0f64..1.0,
        w in 0.0f64..0.5,
        h in 0.0f64..0.5,
    ) {
        let mut tree = QuadTree::default();
        tree.update(&mut regions);
        let rect = Bounds::new(x, y, w, h);

        // Every stored region whose point lies in the rect must be returned
        let hits = tree.query(&rect);
        for stored in tree.query(&Bounds::unit()) {
            let (px, py) = stored.point();
            if rect.contains_point(px, py) {
                prop_assert!(hits.iter().any(|h| std::ptr::eq(*h, stored)));
            }
        }
    }
}

#[test]
fn test_rebuild_drops_previous_batch() {
    let mut tree = QuadTree::default();
    let mut first: Vec<MemoryRegion> = (0..10u64)
        .map(|i| MemoryRegion::new(i * 4096, 4096, RegionType::Heap, 1))
        .collect();
    tree.update(&mut first);
    assert_eq!(tree.len(), 10);

    let mut second = vec![MemoryRegion::new(0x9000, 64, RegionType::Stack, 2)];
    tree.update(&mut second);
    assert_eq!(tree.len(), 1);
    assert_eq!(tree.query(&Bounds::unit())[0].process_id, 2);
}

#[test]
fn test_identical_regions_drop_at_max_level() {
    let mut regions: Vec<MemoryRegion> = (0..5)
        .map(|_| MemoryRegion::new(0x1000, 0x1000, RegionType::Data, 1))
        .collect();
    let mut tree = QuadTree::new(QuadTreeConfig {
        max_level: 4,
        max_items: 100,
    });
    tree.update(&mut regions);

    assert_eq!(tree.len(), 1);
    assert_eq!(tree.dropped(), 4);
}
