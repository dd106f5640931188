//! Point quadtree for range and radius queries
//!
//! Each zoom level of the cluster index keeps one of these over its points in unit
//! Mercator space. Items are stored by index so the owning level can mutate its
//! point data while the tree is being queried.

use geo::{Coord, Rect};

/// Maximum depth of the quadtree to prevent infinite recursion on duplicate points
const MAX_DEPTH: u32 = 20;

/// A point stored in the quadtree
#[derive(Clone, Copy, Debug)]
struct TreeItem {
    /// Index of the point in the owning level
    index: u32,
    coord: Coord<f64>,
}

/// Root container for the point quadtree
#[derive(Debug, Clone)]
pub(crate) struct Quadtree {
    /// Root node covering the unit square
    root: QuadtreeNode,
    /// Number of items a leaf holds before it is subdivided
    node_capacity: usize,
    /// Number of stored items
    len: usize,
}

/// A single node in the quadtree
#[derive(Debug, Clone)]
struct QuadtreeNode {
    /// Bounding box in unit Mercator coordinates
    bounding_box: Rect<f64>,
    /// Depth level in the tree (0 = root)
    level: u32,
    /// Items stored at this node (only leaves hold items)
    items: Vec<TreeItem>,
    /// Child nodes if subdivided, ordered by quadrant index
    children: Option<Box<[QuadtreeNode; 4]>>,
}

impl Quadtree {
    /// Create a new empty quadtree covering the unit square
    pub(crate) fn new(node_capacity: usize) -> Self {
        Self {
            root: QuadtreeNode::new_root(),
            node_capacity: node_capacity.max(1),
            len: 0,
        }
    }

    /// Build a quadtree over the given coordinates, indexed by position
    pub(crate) fn build(
        coords: impl IntoIterator<Item = Coord<f64>>,
        node_capacity: usize,
    ) -> Self {
        let mut quadtree = Self::new(node_capacity);
        for (index, coord) in coords.into_iter().enumerate() {
            quadtree.insert(index as u32, coord);
        }
        quadtree
    }

    /// Insert a point; coordinates are expected inside the unit square
    pub(crate) fn insert(&mut self, index: u32, coord: Coord<f64>) {
        self.root.insert(TreeItem { index, coord }, self.node_capacity);
        self.len += 1;
    }

    /// Collect the indices of all points inside `[min, max]` (inclusive)
    pub(crate) fn range(&self, min: Coord<f64>, max: Coord<f64>, results: &mut Vec<u32>) {
        let query = Rect::new(min, max);
        self.root.query_range(query, results);
    }

    /// Collect the indices of all points within `radius` of `center`
    pub(crate) fn within(&self, center: Coord<f64>, radius: f64, results: &mut Vec<u32>) {
        self.root.query_within(center, radius * radius, results);
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }
}

impl QuadtreeNode {
    /// Create a root node covering the unit square
    fn new_root() -> Self {
        Self::new_child(
            Rect::new(Coord { x: 0.0, y: 0.0 }, Coord { x: 1.0, y: 1.0 }),
            0,
        )
    }

    /// Create a child node with the given bounding box and level
    fn new_child(bounding_box: Rect<f64>, level: u32) -> Self {
        Self {
            bounding_box,
            level,
            items: Vec::new(),
            children: None,
        }
    }

    /// Subdivide this node into 4 children and push its items down
    fn subdivide(&mut self, node_capacity: usize) {
        if self.children.is_some() {
            return; // Already subdivided
        }

        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let mid = self.bounding_box.center();
        let child_level = self.level + 1;

        let mut children = Box::new([
            QuadtreeNode::new_child(Rect::new(min, mid), child_level),
            QuadtreeNode::new_child(
                Rect::new(Coord { x: mid.x, y: min.y }, Coord { x: max.x, y: mid.y }),
                child_level,
            ),
            QuadtreeNode::new_child(
                Rect::new(Coord { x: min.x, y: mid.y }, Coord { x: mid.x, y: max.y }),
                child_level,
            ),
            QuadtreeNode::new_child(Rect::new(mid, max), child_level),
        ]);

        for item in std::mem::take(&mut self.items) {
            children[quadrant(item.coord, mid)].insert(item, node_capacity);
        }

        self.children = Some(children);
    }

    /// Insert an item, subdividing once the node exceeds its capacity
    fn insert(&mut self, item: TreeItem, node_capacity: usize) {
        if let Some(children) = &mut self.children {
            let mid = self.bounding_box.center();
            children[quadrant(item.coord, mid)].insert(item, node_capacity);
            return;
        }

        self.items.push(item);
        if self.items.len() > node_capacity && self.level < MAX_DEPTH {
            self.subdivide(node_capacity);
        }
    }

    /// Query this node and its children for items inside the rectangle
    fn query_range(&self, query: Rect<f64>, results: &mut Vec<u32>) {
        if !self.intersects_rect(query) {
            return;
        }

        let min = query.min();
        let max = query.max();
        for item in &self.items {
            let c = item.coord;
            if c.x >= min.x && c.x <= max.x && c.y >= min.y && c.y <= max.y {
                results.push(item.index);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_range(query, results);
            }
        }
    }

    /// Query this node and its children for items within a squared distance
    fn query_within(&self, center: Coord<f64>, radius_squared: f64, results: &mut Vec<u32>) {
        if self.distance_squared_to(center) > radius_squared {
            return;
        }

        for item in &self.items {
            let dx = item.coord.x - center.x;
            let dy = item.coord.y - center.y;
            if dx * dx + dy * dy <= radius_squared {
                results.push(item.index);
            }
        }

        if let Some(children) = &self.children {
            for child in children.iter() {
                child.query_within(center, radius_squared, results);
            }
        }
    }

    /// Check if this node intersects the rectangle
    fn intersects_rect(&self, rect: Rect<f64>) -> bool {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let rmin = rect.min();
        let rmax = rect.max();

        !(max.x < rmin.x || min.x > rmax.x || max.y < rmin.y || min.y > rmax.y)
    }

    /// Squared distance from a point to this node's bounding box (0 if inside)
    fn distance_squared_to(&self, coord: Coord<f64>) -> f64 {
        let min = self.bounding_box.min();
        let max = self.bounding_box.max();
        let dx = (min.x - coord.x).max(0.0).max(coord.x - max.x);
        let dy = (min.y - coord.y).max(0.0).max(coord.y - max.y);
        dx * dx + dy * dy
    }
}

/// Quadrant of `coord` relative to `mid`
///
/// Bit 0 is set for the high-x half, bit 1 for the high-y half.
#[inline]
fn quadrant(coord: Coord<f64>, mid: Coord<f64>) -> usize {
    usize::from(coord.x >= mid.x) | (usize::from(coord.y >= mid.y) << 1)
}
