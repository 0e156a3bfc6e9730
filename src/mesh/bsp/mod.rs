//! Binary Space Partitioning (BSP) tree used by the boolean operations.
//!
//! The algorithms live behind [`BspOps`] so the node type stays a plain
//! container; [`SerialBspOps`] is the implementation the kernel uses.

pub mod serial;
pub mod traits;

pub use serial::SerialBspOps;
pub use traits::{BalancedSplittingStrategy, BspOps, SplittingPlaneStrategy};

use crate::mesh::plane::Plane;
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use std::fmt::Debug;

/// A BSP tree node, containing polygons plus optional front/back subtrees
#[derive(Debug, Clone)]
pub struct Node<S: Clone> {
    /// Splitting plane, or `None` for an empty leaf
    pub plane: Option<Plane>,

    /// Subtree of the front half-space
    pub front: Option<Box<Node<S>>>,

    /// Subtree of the back half-space
    pub back: Option<Box<Node<S>>>,

    /// Polygons lying on `plane`
    pub polygons: Vec<Polygon<S>>,
}

impl<S: Clone + Send + Sync + Debug> Default for Node<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Clone + Send + Sync + Debug> Node<S> {
    pub const fn new() -> Self {
        Self {
            plane: None,
            front: None,
            back: None,
            polygons: Vec::new(),
        }
    }

    /// Creates a new BSP tree from polygons
    pub fn from_polygons(polygons: &[Polygon<S>]) -> Self {
        let mut node = Self::new();
        if !polygons.is_empty() {
            node.build(polygons);
        }
        node
    }

    /// Invert all polygons in the BSP tree (swap solid and empty space)
    pub fn invert(&mut self) {
        SerialBspOps::new().invert(self);
    }

    /// Recursively remove all polygons that are inside this BSP tree
    pub fn clip_polygons(&self, polygons: &[Polygon<S>]) -> Vec<Polygon<S>> {
        SerialBspOps::new().clip_polygons(self, polygons)
    }

    /// Remove all polygons in this BSP tree that are inside the other BSP tree
    pub fn clip_to(&mut self, bsp: &Node<S>) {
        SerialBspOps::new().clip_to(self, bsp);
    }

    /// Return all polygons in this BSP tree
    pub fn all_polygons(&self) -> Vec<Polygon<S>> {
        SerialBspOps::new().all_polygons(self)
    }

    /// Build (or extend) the BSP tree from the given polygons
    pub fn build(&mut self, polygons: &[Polygon<S>]) {
        SerialBspOps::new().build(self, polygons);
    }

    /// Polygons coplanar with `slicing_plane`, and the segments where the
    /// remaining polygons cross it
    pub fn slice(&self, slicing_plane: &Plane) -> (Vec<Polygon<S>>, Vec<[Vertex; 2]>) {
        SerialBspOps::new().slice(self, slicing_plane)
    }

    /// Number of nodes on the longest root-to-leaf path
    pub fn depth(&self) -> usize {
        let front = self.front.as_ref().map_or(0, |n| n.depth());
        let back = self.back.as_ref().map_or(0, |n| n.depth());
        1 + front.max(back)
    }
}
