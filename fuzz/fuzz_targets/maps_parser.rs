#![no_main]

use libfuzzer_sys::fuzz_target;
use memlens::platform::linux::parse_maps;
use memlens::quadtree::QuadTree;

fuzz_target!(|data: &[u8]| {
    if let Ok(input) = std::str::from_utf8(data) {
        // Malformed lines are skipped; whatever parses must index cleanly
        let mut regions = parse_maps(input, 1, "fuzz");
        let mut tree = QuadTree::default();
        tree.update(&mut regions);
        assert_eq!(tree.len() + tree.dropped(), regions.len());
    }
});
