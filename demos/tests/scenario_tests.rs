//! The demo scenarios run end to end on the demo device.

use rivet_demos::scenarios;
use rivet_stack::{StackKind, StackOptions};
use rivet_transpiler::{FragmentCache, Stitcher};

fn options() -> StackOptions {
    StackOptions::new().with_seed(42)
}

#[test]
fn test_chain_keeps_three_virtual_qubits() {
    let cache = FragmentCache::new();
    let stitcher = Stitcher::new(&cache);
    let summary = scenarios::chain(&stitcher, &scenarios::demo_device(), &options()).unwrap();
    assert_eq!(summary.full_map.len(), 3);
    assert!(summary.cost.is_some());
    // at most one entry per link
    assert!((1..=3).contains(&cache.len()));
}

#[test]
fn test_right_shares_the_prefix() {
    let cache = FragmentCache::new();
    let stitcher = Stitcher::new(&cache);
    let summaries = scenarios::right(&stitcher, &scenarios::demo_device(), &options()).unwrap();
    assert_eq!(summaries.len(), 3);
    assert!(summaries.iter().all(|s| s.full_map.len() == 4));
    // prefix plus one entry per basis
    assert_eq!(cache.len(), 4);
}

#[test]
fn test_left_and_compress() {
    let stitcher = Stitcher::uncached().with_stack(StackKind::Search);
    let device = scenarios::demo_device();

    let left = scenarios::left(&stitcher, &device, &options()).unwrap();
    assert_eq!(left.full_map.len(), 3);

    let compressed = scenarios::compress(&stitcher, &device, &options()).unwrap();
    assert!(compressed.touched <= 3);
}

#[test]
fn test_pack_fills_the_device() {
    let device = scenarios::demo_device();
    let summary = scenarios::pack(&device, &options()).unwrap();
    assert_eq!(summary.full_map.len(), device.num_qubits() as usize);
}
