//! Point quadtree over projected coordinates.
//!
//! Leaves hold items until they exceed [`MAX_ELEMENTS`], then split into four
//! equal quadrants. Splitting stops at [`MAX_DEPTH`], which bounds the tree
//! even when many items share a position. Not thread safe; callers serialize
//! access.

use geocluster_types::bounds::Bounds;
use geocluster_types::point::ProjectedPoint;

/// Items stored in a leaf before it splits.
pub const MAX_ELEMENTS: usize = 50;

/// Deepest level a node may be created at.
pub const MAX_DEPTH: usize = 40;

/// Anything with a fixed projected position.
pub trait QuadItem {
    fn point(&self) -> ProjectedPoint;
}

impl QuadItem for ProjectedPoint {
    fn point(&self) -> ProjectedPoint {
        *self
    }
}

#[derive(Debug, Clone)]
enum Node<I> {
    Leaf(Vec<I>),
    /// Top-left, top-right, bottom-left, bottom-right.
    Internal(Box<[PointQuadTree<I>; 4]>),
}

/// A quadtree keyed on [`QuadItem::point`].
///
/// # Examples
///
/// ```
/// use geocluster::quadtree::PointQuadTree;
/// use geocluster_types::bounds::Bounds;
/// use geocluster_types::point::ProjectedPoint;
///
/// let mut tree = PointQuadTree::new(Bounds::new(0.0, 100.0, 0.0, 100.0));
/// tree.add(ProjectedPoint::new(10.0, 10.0));
/// tree.add(ProjectedPoint::new(90.0, 90.0));
/// tree.add(ProjectedPoint::new(500.0, 500.0)); // outside, dropped
///
/// let hits = tree.search(&Bounds::new(0.0, 50.0, 0.0, 50.0));
/// assert_eq!(hits, vec![ProjectedPoint::new(10.0, 10.0)]);
/// assert_eq!(tree.len(), 2);
/// ```
#[derive(Debug, Clone)]
pub struct PointQuadTree<I> {
    bounds: Bounds,
    depth: usize,
    node: Node<I>,
}

impl<I: QuadItem + PartialEq> PointQuadTree<I> {
    /// Create an empty tree covering `bounds`. Points outside are never stored.
    pub fn new(bounds: Bounds) -> Self {
        Self::with_depth(bounds, 0)
    }

    fn with_depth(bounds: Bounds, depth: usize) -> Self {
        Self {
            bounds,
            depth,
            node: Node::Leaf(Vec::new()),
        }
    }

    pub fn bounds(&self) -> &Bounds {
        &self.bounds
    }

    /// Insert an item. Items whose point lies outside the root bounds are
    /// dropped without error.
    pub fn add(&mut self, item: I) {
        let point = item.point();
        if self.bounds.contains(point.x, point.y) {
            self.insert(point.x, point.y, item);
        }
    }

    fn insert(&mut self, x: f64, y: f64, item: I) {
        let quadrant = self.quadrant(x, y);
        let overflowing = match &mut self.node {
            Node::Internal(children) => {
                children[quadrant].insert(x, y, item);
                false
            }
            Node::Leaf(items) => {
                items.push(item);
                items.len() > MAX_ELEMENTS
            }
        };
        if overflowing && self.depth < MAX_DEPTH {
            self.split();
        }
    }

    #[inline]
    fn quadrant(&self, x: f64, y: f64) -> usize {
        match (y < self.bounds.mid_y, x < self.bounds.mid_x) {
            (true, true) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (false, false) => 3,
        }
    }

    fn split(&mut self) {
        let depth = self.depth + 1;
        let children = self
            .bounds
            .quadrants()
            .map(|bounds| PointQuadTree::with_depth(bounds, depth));

        let Node::Leaf(items) = std::mem::replace(&mut self.node, Node::Internal(Box::new(children)))
        else {
            return;
        };

        // Redistribute by quadrant only; the parent already accepted these points.
        for item in items {
            let point = item.point();
            self.insert(point.x, point.y, item);
        }
    }

    /// Remove an item, returning whether it was present.
    pub fn remove(&mut self, item: &I) -> bool {
        let point = item.point();
        if !self.bounds.contains(point.x, point.y) {
            return false;
        }
        self.remove_at(point.x, point.y, item)
    }

    fn remove_at(&mut self, x: f64, y: f64, item: &I) -> bool {
        let quadrant = self.quadrant(x, y);
        match &mut self.node {
            Node::Internal(children) => children[quadrant].remove_at(x, y, item),
            Node::Leaf(items) => match items.iter().position(|candidate| candidate == item) {
                Some(index) => {
                    items.remove(index);
                    true
                }
                None => false,
            },
        }
    }

    /// Remove every item and collapse the tree back to a single leaf.
    pub fn clear(&mut self) {
        self.node = Node::Leaf(Vec::new());
    }

    /// Visit every item whose point lies inside `search_bounds`.
    pub fn for_each_in<F: FnMut(&I)>(&self, search_bounds: &Bounds, f: &mut F) {
        if !self.bounds.intersects_bounds(search_bounds) {
            return;
        }

        match &self.node {
            Node::Internal(children) => {
                for child in children.iter() {
                    child.for_each_in(search_bounds, f);
                }
            }
            Node::Leaf(items) => {
                if search_bounds.contains_bounds(&self.bounds) {
                    items.iter().for_each(|item| f(item));
                } else {
                    items
                        .iter()
                        .filter(|item| search_bounds.contains_point(&item.point()))
                        .for_each(|item| f(item));
                }
            }
        }
    }

    /// Number of stored items.
    pub fn len(&self) -> usize {
        match &self.node {
            Node::Leaf(items) => items.len(),
            Node::Internal(children) => children.iter().map(PointQuadTree::len).sum(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deepest level of any node in the tree (0 for an unsplit root).
    pub fn depth(&self) -> usize {
        match &self.node {
            Node::Leaf(_) => self.depth,
            Node::Internal(children) => children
                .iter()
                .map(PointQuadTree::depth)
                .max()
                .unwrap_or(self.depth),
        }
    }
}

impl<I: QuadItem + PartialEq + Clone> PointQuadTree<I> {
    /// Collect every item whose point lies inside `search_bounds`.
    pub fn search(&self, search_bounds: &Bounds) -> Vec<I> {
        let mut results = Vec::new();
        self.for_each_in(search_bounds, &mut |item: &I| results.push(item.clone()));
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged {
        id: usize,
        point: ProjectedPoint,
    }

    impl QuadItem for Tagged {
        fn point(&self) -> ProjectedPoint {
            self.point
        }
    }

    fn world() -> Bounds {
        Bounds::new(0.0, 1.0, 0.0, 1.0)
    }

    fn grid_items(n: usize) -> Vec<Tagged> {
        (0..n)
            .map(|id| {
                let x = (id % 37) as f64 / 37.0;
                let y = (id / 37) as f64 / (n / 37 + 1) as f64;
                Tagged {
                    id,
                    point: ProjectedPoint::new(x, y),
                }
            })
            .collect()
    }

    fn sorted_ids(items: &[Tagged]) -> Vec<usize> {
        let mut ids: Vec<usize> = items.iter().map(|item| item.id).collect();
        ids.sort_unstable();
        ids
    }

    #[test]
    fn test_empty_tree() {
        let tree: PointQuadTree<ProjectedPoint> = PointQuadTree::new(world());
        assert!(tree.is_empty());
        assert!(tree.search(&world()).is_empty());
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_search_returns_inserted_minus_removed() {
        let items = grid_items(500);
        let mut tree = PointQuadTree::new(world());
        for item in &items {
            tree.add(item.clone());
        }
        assert_eq!(tree.len(), 500);
        assert!(tree.depth() > 0);

        for item in items.iter().filter(|item| item.id % 3 == 0) {
            assert!(tree.remove(item));
        }

        let expected: Vec<usize> = (0..500).filter(|id| id % 3 != 0).collect();
        assert_eq!(sorted_ids(&tree.search(&world())), expected);
    }

    #[test]
    fn test_search_has_no_duplicates() {
        let mut tree = PointQuadTree::new(world());
        for item in grid_items(300) {
            tree.add(item);
        }
        let found = tree.search(&Bounds::new(0.2, 0.8, 0.1, 0.9));
        let ids = sorted_ids(&found);
        let mut deduped = ids.clone();
        deduped.dedup();
        assert_eq!(ids, deduped);
        assert!(found.iter().all(|item| {
            item.point.x >= 0.2 && item.point.x <= 0.8 && item.point.y >= 0.1 && item.point.y <= 0.9
        }));
    }

    #[test]
    fn test_out_of_bounds_is_dropped() {
        let mut tree = PointQuadTree::new(world());
        let outside = ProjectedPoint::new(1.5, 0.5);
        tree.add(outside);
        assert!(tree.is_empty());
        assert!(!tree.remove(&outside));
    }

    #[test]
    fn test_remove_missing_item() {
        let mut tree = PointQuadTree::new(world());
        tree.add(ProjectedPoint::new(0.25, 0.25));
        assert!(!tree.remove(&ProjectedPoint::new(0.75, 0.75)));
        assert!(tree.remove(&ProjectedPoint::new(0.25, 0.25)));
        assert!(!tree.remove(&ProjectedPoint::new(0.25, 0.25)));
    }

    #[test]
    fn test_split_after_threshold() {
        let mut tree = PointQuadTree::new(world());
        for i in 0..MAX_ELEMENTS {
            tree.add(ProjectedPoint::new(i as f64 / 100.0, 0.5));
        }
        assert_eq!(tree.depth(), 0);

        tree.add(ProjectedPoint::new(0.99, 0.99));
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.len(), MAX_ELEMENTS + 1);
    }

    #[test]
    fn test_depth_bound_with_colocated_points() {
        let mut tree = PointQuadTree::new(world());
        for id in 0..(MAX_ELEMENTS * 4) {
            tree.add(Tagged {
                id,
                point: ProjectedPoint::new(0.1, 0.1),
            });
        }
        assert_eq!(tree.depth(), MAX_DEPTH);
        assert_eq!(tree.len(), MAX_ELEMENTS * 4);
        assert_eq!(tree.search(&Bounds::new(0.0, 0.2, 0.0, 0.2)).len(), MAX_ELEMENTS * 4);
    }

    #[test]
    fn test_depth_bound_with_distinct_points_in_one_quadrant() {
        let mut tree = PointQuadTree::new(world());
        for i in 0..2_000 {
            let offset = i as f64 * 1e-12;
            tree.add(ProjectedPoint::new(0.1 + offset, 0.1 + offset));
        }
        assert!(tree.depth() <= MAX_DEPTH);
        assert_eq!(tree.len(), 2_000);
    }

    #[test]
    fn test_clear() {
        let mut tree = PointQuadTree::new(world());
        for item in grid_items(200) {
            tree.add(item);
        }
        tree.clear();
        assert!(tree.is_empty());
        assert_eq!(tree.depth(), 0);
    }

    #[test]
    fn test_partial_leaf_filters_items() {
        let mut tree = PointQuadTree::new(world());
        tree.add(ProjectedPoint::new(0.1, 0.1));
        tree.add(ProjectedPoint::new(0.9, 0.9));
        let hits = tree.search(&Bounds::new(0.0, 0.5, 0.0, 0.5));
        assert_eq!(hits, vec![ProjectedPoint::new(0.1, 0.1)]);
    }
}
