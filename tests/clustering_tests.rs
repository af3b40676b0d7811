use geocluster::quadtree::{MAX_DEPTH, PointQuadTree};
use geocluster::{
    Algorithm, Bounds, CacheConfig, ClusterItem, ClusterSet, GeoItem, GridBasedAlgorithm,
    NonHierarchicalDistanceBasedAlgorithm, PreCachingAlgorithm, ProjectedPoint,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn uniform_items(count: u64, seed: u64) -> Vec<GeoItem> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..count)
        .map(|id| GeoItem::new(id, rng.gen_range(-180.0..180.0), rng.gen_range(-85.0..85.0)))
        .collect()
}

fn assert_partition(clusters: &ClusterSet<GeoItem>, items: &[GeoItem]) {
    let mut seen: HashMap<u64, usize> = HashMap::new();
    for cluster in clusters.iter() {
        assert!(cluster.size() > 0, "empty cluster");
        for item in cluster.items() {
            *seen.entry(item.id).or_default() += 1;
        }
    }
    assert_eq!(seen.len(), items.len());
    assert!(seen.values().all(|&count| count == 1));
}

fn algorithms() -> Vec<(&'static str, Box<dyn Algorithm<GeoItem>>)> {
    vec![
        (
            "distance",
            Box::new(NonHierarchicalDistanceBasedAlgorithm::new()),
        ),
        ("grid", Box::new(GridBasedAlgorithm::new())),
        (
            "precached",
            Box::new(PreCachingAlgorithm::new(
                Box::new(NonHierarchicalDistanceBasedAlgorithm::new()),
                CacheConfig::default().with_precache(false),
            )),
        ),
    ]
}

#[test]
fn test_every_item_in_exactly_one_cluster() {
    init_logging();
    let items = uniform_items(1000, 7);
    for (name, mut algorithm) in algorithms() {
        algorithm.add_items(items.clone());
        for zoom in [0.0, 3.0, 7.5, 12.0, 20.0] {
            let clusters = algorithm.clusters(zoom);
            assert_eq!(clusters.item_count(), 1000, "{} at zoom {}", name, zoom);
            assert_partition(&clusters, &items);
        }
    }
}

#[test]
fn test_clusters_idempotent_without_mutation() {
    let items = uniform_items(300, 11);
    for (name, mut algorithm) in algorithms() {
        algorithm.add_items(items.clone());
        let first = algorithm.clusters(6.0);
        let second = algorithm.clusters(6.0);
        assert_eq!(first, second, "{}", name);
        assert_eq!(algorithm.clusters(6.9), first, "{} truncates zoom", name);
    }
}

#[test]
fn test_cache_never_stale_after_mutation() {
    init_logging();
    let algorithm = PreCachingAlgorithm::new(
        Box::new(NonHierarchicalDistanceBasedAlgorithm::new()),
        CacheConfig::default(),
    );
    let mut algorithm: Box<dyn Algorithm<GeoItem>> = Box::new(algorithm);
    let items = uniform_items(200, 3);
    algorithm.add_items(items.clone());
    assert_eq!(algorithm.clusters(5.0).item_count(), 200);

    algorithm.add_item(GeoItem::new(10_000, 1.0, 1.0));
    assert_eq!(algorithm.clusters(5.0).item_count(), 201);

    assert!(algorithm.remove_item(&items[0]));
    let clusters = algorithm.clusters(5.0);
    assert_eq!(clusters.item_count(), 200);
    assert!(
        clusters
            .iter()
            .all(|cluster| !cluster.items().contains(&items[0]))
    );

    algorithm.clear_items();
    assert!(algorithm.clusters(5.0).is_empty());
    assert!(algorithm.clusters(4.0).is_empty());
}

#[test]
fn test_close_pair_and_distant_outlier() {
    let mut algorithm = NonHierarchicalDistanceBasedAlgorithm::new();
    algorithm.add_items(vec![
        GeoItem::new(1, 0.0, 0.0),
        GeoItem::new(2, 0.0001, 0.0001),
        GeoItem::new(3, 50.0, 50.0),
    ]);

    let clusters = algorithm.clusters(14.0);
    let mut sizes: Vec<usize> = clusters.iter().map(|cluster| cluster.size()).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![1, 2]);

    let outlier = clusters
        .iter()
        .find(|cluster| cluster.is_singleton())
        .unwrap();
    assert_eq!(outlier.items()[0].id, 3);
    assert_eq!(outlier.position(), outlier.items()[0].position());
}

#[test]
fn test_empty_input_gives_empty_set() {
    for (name, algorithm) in algorithms() {
        for zoom in [0.0, 10.0, 25.0] {
            assert!(algorithm.clusters(zoom).is_empty(), "{}", name);
        }
        assert!(algorithm.items().is_empty());
    }
}

#[test]
fn test_quadtree_full_search_matches_contents() {
    let domain = Bounds::new(0.0, 1.0, 0.0, 1.0);
    let mut tree = PointQuadTree::new(domain);
    let mut rng = StdRng::seed_from_u64(42);
    let points: Vec<ProjectedPoint> = (0..5000)
        .map(|_| ProjectedPoint::new(rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
        .collect();
    for point in &points {
        tree.add(*point);
    }
    for point in points.iter().step_by(3) {
        assert!(tree.remove(point));
    }

    let found = tree.search(&domain);
    let expected = points.len() - points.iter().step_by(3).count();
    assert_eq!(found.len(), expected);
    assert_eq!(tree.len(), expected);
    for (i, point) in points.iter().enumerate() {
        let hits = found.iter().filter(|p| *p == point).count();
        assert_eq!(hits, if i % 3 == 0 { 0 } else { 1 });
    }
}

#[test]
fn test_quadtree_depth_bounded_for_colocated_points() {
    let mut tree = PointQuadTree::new(Bounds::new(0.0, 1.0, 0.0, 1.0));
    for _ in 0..1000 {
        tree.add(ProjectedPoint::new(0.25, 0.25));
    }
    assert!(tree.depth() <= MAX_DEPTH);
    assert_eq!(tree.len(), 1000);
    assert_eq!(
        tree.search(&Bounds::new(0.2, 0.3, 0.2, 0.3)).len(),
        1000
    );
}
