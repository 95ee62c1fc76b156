// Copyright 2025 John Brosnihan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//! Quadtree over particle positions
//!
//! Cells live in an arena (`Vec<QuadCell>`) and refer to each other through
//! [`CellId`] handles, parents included. A leaf holds at most one point,
//! except at [`MAX_DEPTH`] where coincident points are stacked instead of
//! splitting forever.
//!
//! The tree is a snapshot: it is rebuilt from the particle positions whenever
//! a query needs current data.

use crate::particle::{Particle, ParticleId};
use glam::DVec2;

/// Depth at which leaves stop splitting
pub const MAX_DEPTH: usize = 24;

/// Handle of a cell in the tree arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellId(pub usize);

/// Child quadrant of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quadrant {
    /// `x >= cx`, `y >= cy`
    NorthEast = 0,
    /// `x < cx`, `y >= cy`
    NorthWest = 1,
    /// `x < cx`, `y < cy`
    SouthWest = 2,
    /// `x >= cx`, `y < cy`
    SouthEast = 3,
}

impl Quadrant {
    /// All quadrants in storage order
    pub const ALL: [Quadrant; 4] = [
        Quadrant::NorthEast,
        Quadrant::NorthWest,
        Quadrant::SouthWest,
        Quadrant::SouthEast,
    ];

    /// Quadrant of `pos` relative to `center`
    pub fn of(center: DVec2, pos: DVec2) -> Self {
        match (pos.x >= center.x, pos.y >= center.y) {
            (true, true) => Quadrant::NorthEast,
            (false, true) => Quadrant::NorthWest,
            (false, false) => Quadrant::SouthWest,
            (true, false) => Quadrant::SouthEast,
        }
    }

    fn offset(self) -> DVec2 {
        match self {
            Quadrant::NorthEast => DVec2::new(1.0, 1.0),
            Quadrant::NorthWest => DVec2::new(-1.0, 1.0),
            Quadrant::SouthWest => DVec2::new(-1.0, -1.0),
            Quadrant::SouthEast => DVec2::new(1.0, -1.0),
        }
    }
}

/// A square region of the plane
#[derive(Debug, Clone, PartialEq)]
pub struct QuadCell {
    center: DVec2,
    half_size: f64,
    occupants: Vec<ParticleId>,
    children: [Option<CellId>; 4],
    parent: Option<CellId>,
    depth: usize,
}

impl QuadCell {
    fn new(center: DVec2, half_size: f64, parent: Option<CellId>, depth: usize) -> Self {
        QuadCell {
            center,
            half_size,
            occupants: Vec::new(),
            children: [None; 4],
            parent,
            depth,
        }
    }

    /// Center of the cell
    pub fn center(&self) -> DVec2 {
        self.center
    }

    /// Half the side length
    pub fn half_size(&self) -> f64 {
        self.half_size
    }

    /// Points stored directly in this cell (leaves only)
    pub fn occupants(&self) -> &[ParticleId] {
        &self.occupants
    }

    /// Child in `quadrant`, if it was ever needed
    pub fn child(&self, quadrant: Quadrant) -> Option<CellId> {
        self.children[quadrant as usize]
    }

    /// Enclosing cell; `None` for the root
    pub fn parent(&self) -> Option<CellId> {
        self.parent
    }

    /// Distance from the root
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Whether the cell was never split
    pub fn is_leaf(&self) -> bool {
        self.children.iter().all(Option::is_none)
    }

    /// The four corners
    pub fn corners(&self) -> [DVec2; 4] {
        Quadrant::ALL.map(|q| self.center + q.offset() * self.half_size)
    }

    /// Whether the disc of `radius` around `pos` sticks out of the cell
    pub fn disc_leaves(&self, pos: DVec2, radius: f64) -> bool {
        let min = self.center - DVec2::splat(self.half_size);
        let max = self.center + DVec2::splat(self.half_size);
        pos.x - radius < min.x || pos.x + radius > max.x || pos.y - radius < min.y || pos.y + radius > max.y
    }
}

/// Point quadtree
#[derive(Debug, Clone, PartialEq)]
pub struct QuadTree {
    cells: Vec<QuadCell>,
    points: Vec<DVec2>,
}

impl QuadTree {
    /// Empty tree whose root covers the square around `center`
    pub fn new(center: DVec2, half_size: f64) -> Self {
        QuadTree {
            cells: vec![QuadCell::new(center, half_size, None, 0)],
            points: Vec::new(),
        }
    }

    /// Tree over particle positions; ids are indices into `particles`
    pub fn build(particles: &[Particle]) -> Self {
        Self::from_points(particles.iter().map(|p| p.p))
    }

    /// Tree over arbitrary points; ids are the iteration order
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = DVec2>,
    {
        let points: Vec<DVec2> = points.into_iter().collect();
        let (center, half_size) = bounding_square(&points);
        let mut tree = QuadTree::new(center, half_size);
        for pos in points {
            tree.insert(pos);
        }
        tree
    }

    /// Insert a point and return its id
    ///
    /// Points outside the root square are still stored, in the border cell
    /// nearest to them.
    pub fn insert(&mut self, pos: DVec2) -> ParticleId {
        let id = self.points.len();
        self.points.push(pos);

        let mut cell = self.root();
        loop {
            if self.cells[cell.0].is_leaf() {
                let leaf = &self.cells[cell.0];
                if leaf.occupants.is_empty() || leaf.depth >= MAX_DEPTH {
                    self.cells[cell.0].occupants.push(id);
                    return id;
                }
                self.split(cell);
            }
            let quadrant = Quadrant::of(self.cells[cell.0].center, pos);
            cell = self.child_or_create(cell, quadrant);
        }
    }

    fn split(&mut self, cell: CellId) {
        let occupants = std::mem::take(&mut self.cells[cell.0].occupants);
        for id in occupants {
            let quadrant = Quadrant::of(self.cells[cell.0].center, self.points[id]);
            let child = self.child_or_create(cell, quadrant);
            self.cells[child.0].occupants.push(id);
        }
    }

    fn child_or_create(&mut self, cell: CellId, quadrant: Quadrant) -> CellId {
        if let Some(child) = self.cells[cell.0].child(quadrant) {
            return child;
        }
        let parent = &self.cells[cell.0];
        let half_size = parent.half_size * 0.5;
        let center = parent.center + quadrant.offset() * half_size;
        let depth = parent.depth + 1;

        let child = CellId(self.cells.len());
        self.cells.push(QuadCell::new(center, half_size, Some(cell), depth));
        self.cells[cell.0].children[quadrant as usize] = Some(child);
        child
    }

    /// The root cell
    pub fn root(&self) -> CellId {
        CellId(0)
    }

    /// Cell behind a handle
    ///
    /// # Panics
    ///
    /// Panics if the handle does not come from this tree.
    pub fn cell(&self, id: CellId) -> &QuadCell {
        &self.cells[id.0]
    }

    /// Number of stored points
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Whether no point was stored
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Number of cells allocated
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Position of a stored point
    pub fn point(&self, id: ParticleId) -> DVec2 {
        self.points[id]
    }

    /// Smallest cell found that covers the disc of `radius` around `(x, y)`
    ///
    /// Descends from the root along the query point's quadrants. As soon as a
    /// corner of the current cell lies within `radius`, or the disc leaves the
    /// cell, the walk backs up to the parent (which covers the disc since the
    /// walk entered the current cell from it). The walk also stops at a leaf
    /// or a missing child.
    pub fn bounding_quad(&self, x: f64, y: f64, radius: f64) -> CellId {
        let pos = DVec2::new(x, y);
        let mut id = self.root();
        loop {
            let cell = &self.cells[id.0];
            let corner_hit = cell.corners().iter().any(|c| c.distance(pos) <= radius);
            if corner_hit || cell.disc_leaves(pos, radius) {
                return cell.parent.unwrap_or(id);
            }
            match cell.child(Quadrant::of(cell.center, pos)) {
                Some(child) => id = child,
                None => return id,
            }
        }
    }

    /// Every point stored at or below `cell`
    pub fn children_particles(&self, cell: CellId) -> Vec<ParticleId> {
        let mut found = Vec::new();
        let mut stack = vec![cell];
        while let Some(id) = stack.pop() {
            let cell = &self.cells[id.0];
            found.extend_from_slice(&cell.occupants);
            stack.extend(cell.children.iter().flatten());
        }
        found
    }

    /// Points within `radius` of `(x, y)`, in no particular order
    pub fn neighbors(&self, x: f64, y: f64, radius: f64) -> Vec<ParticleId> {
        let pos = DVec2::new(x, y);
        let cell = self.bounding_quad(x, y, radius);
        let mut found = self.children_particles(cell);
        found.retain(|&id| self.points[id].distance(pos) <= radius);
        found
    }
}

fn bounding_square(points: &[DVec2]) -> (DVec2, f64) {
    let finite: Vec<DVec2> = points.iter().copied().filter(|p| p.is_finite()).collect();
    if finite.is_empty() {
        return (DVec2::ZERO, 1.0);
    }
    let min = finite.iter().copied().fold(DVec2::splat(f64::INFINITY), DVec2::min);
    let max = finite.iter().copied().fold(DVec2::splat(f64::NEG_INFINITY), DVec2::max);
    let extent = (max - min).max_element();
    let half_size = if extent > 0.0 { extent * 0.5 * 1.01 } else { 1.0 };
    ((min + max) * 0.5, half_size)
}
