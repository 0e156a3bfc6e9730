//! Serial implementation of BSP operations

use crate::float_types::EPSILON;
use crate::mesh::bsp::Node;
use crate::mesh::bsp::traits::{BalancedSplittingStrategy, BspOps, SplittingPlaneStrategy};
use crate::mesh::plane::{BACK, COPLANAR, FRONT, Plane, SPANNING};
use crate::mesh::polygon::Polygon;
use crate::mesh::vertex::Vertex;
use std::fmt::Debug;
use std::marker::PhantomData;

/// Serial implementation of BSP operations
pub struct SerialBspOps<SP: SplittingPlaneStrategy<S> = BalancedSplittingStrategy, S: Clone = ()> {
    splitting_strategy: SP,
    _phantom: PhantomData<S>,
}

impl<S: Clone> SerialBspOps<BalancedSplittingStrategy, S> {
    pub fn new() -> Self {
        Self::with_strategy(BalancedSplittingStrategy::default())
    }
}

impl<S: Clone> Default for SerialBspOps<BalancedSplittingStrategy, S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<SP: SplittingPlaneStrategy<S>, S: Clone> SerialBspOps<SP, S> {
    pub const fn with_strategy(strategy: SP) -> Self {
        Self {
            splitting_strategy: strategy,
            _phantom: PhantomData,
        }
    }
}

impl<SP: SplittingPlaneStrategy<S>, S: Clone + Send + Sync + Debug> BspOps<S>
    for SerialBspOps<SP, S>
{
    fn invert(&self, node: &mut Node<S>) {
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            current.polygons.iter_mut().for_each(|p| p.flip());
            if let Some(ref mut plane) = current.plane {
                plane.flip();
            }
            std::mem::swap(&mut current.front, &mut current.back);

            if let Some(ref mut front) = current.front {
                stack.push(front.as_mut());
            }
            if let Some(ref mut back) = current.back {
                stack.push(back.as_mut());
            }
        }
    }

    fn clip_polygons(&self, node: &Node<S>, polygons: &[Polygon<S>]) -> Vec<Polygon<S>> {
        let Some(plane) = node.plane.as_ref() else {
            return polygons.to_vec();
        };

        let mut front_polys = Vec::with_capacity(polygons.len());
        let mut back_polys = Vec::with_capacity(polygons.len());

        for polygon in polygons {
            let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                plane.split_polygon(polygon);

            for coplanar_poly in coplanar_front.into_iter().chain(coplanar_back) {
                if plane.orient_plane(&coplanar_poly.plane) == FRONT {
                    front_parts.push(coplanar_poly);
                } else {
                    back_parts.push(coplanar_poly);
                }
            }

            front_polys.append(&mut front_parts);
            back_polys.append(&mut back_parts);
        }

        let mut result = match &node.front {
            Some(front_node) => self.clip_polygons(front_node, &front_polys),
            None => front_polys,
        };

        // polygons reaching an empty back leaf are inside the solid and dropped
        if let Some(back_node) = &node.back {
            result.extend(self.clip_polygons(back_node, &back_polys));
        }

        result
    }

    fn clip_to(&self, node: &mut Node<S>, bsp: &Node<S>) {
        let mut stack = vec![node];
        while let Some(current) = stack.pop() {
            current.polygons = self.clip_polygons(bsp, &current.polygons);
            if let Some(ref mut front) = current.front {
                stack.push(front.as_mut());
            }
            if let Some(ref mut back) = current.back {
                stack.push(back.as_mut());
            }
        }
    }

    fn all_polygons(&self, node: &Node<S>) -> Vec<Polygon<S>> {
        let mut result = Vec::new();
        let mut stack = vec![node];

        while let Some(current) = stack.pop() {
            result.extend_from_slice(&current.polygons);
            stack.extend(
                [&current.front, &current.back]
                    .into_iter()
                    .filter_map(|child| child.as_deref()),
            );
        }
        result
    }

    fn build(&self, node: &mut Node<S>, polygons: &[Polygon<S>]) {
        if polygons.is_empty() {
            return;
        }

        let plane = node
            .plane
            .get_or_insert_with(|| self.splitting_strategy.pick_best_splitting_plane(polygons))
            .clone();

        let mut front = Vec::with_capacity(polygons.len() / 2);
        let mut back = Vec::with_capacity(polygons.len() / 2);

        for polygon in polygons {
            let (coplanar_front, coplanar_back, mut front_parts, mut back_parts) =
                plane.split_polygon(polygon);

            node.polygons.extend(coplanar_front);
            node.polygons.extend(coplanar_back);
            front.append(&mut front_parts);
            back.append(&mut back_parts);
        }

        if !front.is_empty() {
            let child = node.front.get_or_insert_with(|| Box::new(Node::new()));
            self.build(child, &front);
        }

        if !back.is_empty() {
            let child = node.back.get_or_insert_with(|| Box::new(Node::new()));
            self.build(child, &back);
        }
    }

    fn slice(
        &self,
        node: &Node<S>,
        slicing_plane: &Plane,
    ) -> (Vec<Polygon<S>>, Vec<[Vertex; 2]>) {
        let mut coplanar_polygons = Vec::new();
        let mut intersection_edges = Vec::new();

        for poly in self.all_polygons(node) {
            let vcount = poly.vertices.len();
            if vcount < 3 {
                continue;
            }

            let types: Vec<_> = poly
                .vertices
                .iter()
                .map(|vertex| slicing_plane.orient_point(&vertex.pos))
                .collect();
            let polygon_type = types.iter().fold(COPLANAR, |acc, &t| acc | t);

            match polygon_type {
                COPLANAR => coplanar_polygons.push(poly),
                FRONT | BACK => {},
                _ => {
                    // vertices lying on the plane count as crossings too,
                    // otherwise a face touching the plane at a corner loses its segment
                    let mut crossing_points = Vec::with_capacity(2);
                    for i in 0..vcount {
                        let j = (i + 1) % vcount;
                        let (ti, tj) = (types[i], types[j]);
                        let vi = &poly.vertices[i];
                        let vj = &poly.vertices[j];

                        if ti == COPLANAR {
                            crossing_points.push(vi.clone());
                        } else if (ti | tj) == SPANNING {
                            let denom = slicing_plane.normal().dot(&(vj.pos - vi.pos));
                            if denom.abs() > EPSILON {
                                let t = (slicing_plane.offset()
                                    - slicing_plane.normal().dot(&vi.pos.coords))
                                    / denom;
                                crossing_points.push(vi.interpolate(vj, t));
                            }
                        }
                    }

                    // a convex polygon crosses a plane in at most one segment
                    if let [a, b] = crossing_points.as_slice() {
                        if (a.pos - b.pos).norm() > EPSILON {
                            intersection_edges.push([a.clone(), b.clone()]);
                        }
                    }
                },
            }
        }

        (coplanar_polygons, intersection_edges)
    }
}
