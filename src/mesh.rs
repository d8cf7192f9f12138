//! Structured quadrilateral meshes with explicit edge numbering.
//!
//! Nodes are numbered row by row, `node(i, j) = j * (nx + 1) + i`. Horizontal edges come
//! first, `x_edge(i, j) = j * nx + i`, followed by vertical edges,
//! `y_edge(i, j) = nx * (ny + 1) + j * (nx + 1) + i`. Every edge is oriented along the
//! positive coordinate direction.
//!
//! The four sides of the mesh carry the boundary attributes 1 (bottom), 2 (right), 3 (top)
//! and 4 (left).
use crate::error::AmsError;
use nalgebra::{Point2, Vector2};
use serde::{Deserialize, Serialize};

/// The number of distinct boundary attributes of a [`UniformQuadMesh`].
pub const NUM_BOUNDARY_ATTRIBUTES: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BoundarySide {
    Bottom,
    Right,
    Top,
    Left,
}

impl BoundarySide {
    pub const ALL: [BoundarySide; NUM_BOUNDARY_ATTRIBUTES] = [Self::Bottom, Self::Right, Self::Top, Self::Left];

    /// The (one-based) boundary attribute of the side.
    pub fn attribute(&self) -> usize {
        match self {
            Self::Bottom => 1,
            Self::Right => 2,
            Self::Top => 3,
            Self::Left => 4,
        }
    }

    /// Whether the side is selected by a boundary marker.
    ///
    /// Entry `k` of the marker selects attribute `k + 1`. Missing entries are unselected.
    pub fn is_marked(&self, marker: &[bool]) -> bool {
        marker.get(self.attribute() - 1).copied().unwrap_or(false)
    }
}

/// The coordinate direction of a mesh edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeDirection {
    Horizontal,
    Vertical,
}

impl EdgeDirection {
    /// The index of the coordinate the edge is aligned with.
    pub fn component(&self) -> usize {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
        }
    }
}

/// A rectangular mesh of square cells.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UniformQuadMesh {
    cells_x: usize,
    cells_y: usize,
    cell_size: f64,
    origin: Point2<f64>,
}

impl UniformQuadMesh {
    pub fn new(cells_x: usize, cells_y: usize, cell_size: f64) -> Self {
        Self::with_origin(cells_x, cells_y, cell_size, Point2::origin())
    }

    /// Creates a mesh whose lower-left corner is `origin`.
    ///
    /// # Panics
    ///
    /// Panics if the mesh has no cells or the cell size is not positive.
    pub fn with_origin(cells_x: usize, cells_y: usize, cell_size: f64, origin: Point2<f64>) -> Self {
        assert!(cells_x > 0 && cells_y > 0, "Mesh must have at least one cell");
        assert!(cell_size > 0.0, "Cell size must be positive");
        Self {
            cells_x,
            cells_y,
            cell_size,
            origin,
        }
    }

    pub fn unit_square(cells_per_dim: usize) -> Self {
        Self::new(cells_per_dim, cells_per_dim, 1.0 / cells_per_dim as f64)
    }

    pub fn cells_x(&self) -> usize {
        self.cells_x
    }

    pub fn cells_y(&self) -> usize {
        self.cells_y
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    pub fn origin(&self) -> &Point2<f64> {
        &self.origin
    }

    pub fn num_nodes(&self) -> usize {
        (self.cells_x + 1) * (self.cells_y + 1)
    }

    pub fn num_horizontal_edges(&self) -> usize {
        self.cells_x * (self.cells_y + 1)
    }

    pub fn num_vertical_edges(&self) -> usize {
        (self.cells_x + 1) * self.cells_y
    }

    pub fn num_edges(&self) -> usize {
        self.num_horizontal_edges() + self.num_vertical_edges()
    }

    pub fn num_cells(&self) -> usize {
        self.cells_x * self.cells_y
    }

    pub fn node_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i <= self.cells_x && j <= self.cells_y);
        j * (self.cells_x + 1) + i
    }

    /// The edge from node `(i, j)` to node `(i + 1, j)`.
    pub fn horizontal_edge_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i < self.cells_x && j <= self.cells_y);
        j * self.cells_x + i
    }

    /// The edge from node `(i, j)` to node `(i, j + 1)`.
    pub fn vertical_edge_index(&self, i: usize, j: usize) -> usize {
        debug_assert!(i <= self.cells_x && j < self.cells_y);
        self.num_horizontal_edges() + j * (self.cells_x + 1) + i
    }

    pub fn node_position(&self, node: usize) -> Point2<f64> {
        let i = node % (self.cells_x + 1);
        let j = node / (self.cells_x + 1);
        self.origin + Vector2::new(i as f64, j as f64) * self.cell_size
    }

    /// Nodes of a cell, counter-clockwise from the lower-left corner.
    pub fn cell_nodes(&self, cell: usize) -> [usize; 4] {
        let (i, j) = (cell % self.cells_x, cell / self.cells_x);
        [
            self.node_index(i, j),
            self.node_index(i + 1, j),
            self.node_index(i + 1, j + 1),
            self.node_index(i, j + 1),
        ]
    }

    /// Edges of a cell, ordered bottom, top, left, right.
    pub fn cell_edges(&self, cell: usize) -> [usize; 4] {
        let (i, j) = (cell % self.cells_x, cell / self.cells_x);
        [
            self.horizontal_edge_index(i, j),
            self.horizontal_edge_index(i, j + 1),
            self.vertical_edge_index(i, j),
            self.vertical_edge_index(i + 1, j),
        ]
    }

    pub fn cell_centroid(&self, cell: usize) -> Point2<f64> {
        let (i, j) = (cell % self.cells_x, cell / self.cells_x);
        self.origin + Vector2::new(i as f64 + 0.5, j as f64 + 0.5) * self.cell_size
    }

    pub fn edge_direction(&self, edge: usize) -> EdgeDirection {
        if edge < self.num_horizontal_edges() {
            EdgeDirection::Horizontal
        } else {
            EdgeDirection::Vertical
        }
    }

    /// The start and end nodes of an edge.
    pub fn edge_endpoints(&self, edge: usize) -> [usize; 2] {
        match self.edge_direction(edge) {
            EdgeDirection::Horizontal => {
                let (i, j) = (edge % self.cells_x, edge / self.cells_x);
                [self.node_index(i, j), self.node_index(i + 1, j)]
            }
            EdgeDirection::Vertical => {
                let local = edge - self.num_horizontal_edges();
                let (i, j) = (local % (self.cells_x + 1), local / (self.cells_x + 1));
                [self.node_index(i, j), self.node_index(i, j + 1)]
            }
        }
    }

    fn check_marker(marker: &[bool]) -> Result<(), AmsError> {
        match marker.iter().skip(NUM_BOUNDARY_ATTRIBUTES).position(|&marked| marked) {
            Some(offset) => Err(AmsError::InvalidBoundaryMarker {
                attribute: NUM_BOUNDARY_ATTRIBUTES + offset + 1,
            }),
            None => Ok(()),
        }
    }

    /// Sorted nodes lying on a marked side of the boundary.
    pub fn boundary_nodes(&self, marker: &[bool]) -> Result<Vec<usize>, AmsError> {
        Self::check_marker(marker)?;
        let (nx, ny) = (self.cells_x, self.cells_y);
        let mut nodes = Vec::new();
        for side in BoundarySide::ALL.iter().filter(|side| side.is_marked(marker)) {
            match side {
                BoundarySide::Bottom => nodes.extend((0..=nx).map(|i| self.node_index(i, 0))),
                BoundarySide::Top => nodes.extend((0..=nx).map(|i| self.node_index(i, ny))),
                BoundarySide::Left => nodes.extend((0..=ny).map(|j| self.node_index(0, j))),
                BoundarySide::Right => nodes.extend((0..=ny).map(|j| self.node_index(nx, j))),
            }
        }
        nodes.sort_unstable();
        nodes.dedup();
        Ok(nodes)
    }

    /// Sorted edges lying on a marked side of the boundary.
    pub fn boundary_edges(&self, marker: &[bool]) -> Result<Vec<usize>, AmsError> {
        Self::check_marker(marker)?;
        let (nx, ny) = (self.cells_x, self.cells_y);
        let mut edges = Vec::new();
        for side in BoundarySide::ALL.iter().filter(|side| side.is_marked(marker)) {
            match side {
                BoundarySide::Bottom => edges.extend((0..nx).map(|i| self.horizontal_edge_index(i, 0))),
                BoundarySide::Top => edges.extend((0..nx).map(|i| self.horizontal_edge_index(i, ny))),
                BoundarySide::Left => edges.extend((0..ny).map(|j| self.vertical_edge_index(0, j))),
                BoundarySide::Right => edges.extend((0..ny).map(|j| self.vertical_edge_index(nx, j))),
            }
        }
        edges.sort_unstable();
        Ok(edges)
    }

    /// The low-order refined mesh for a discretisation of the given polynomial order.
    ///
    /// Every cell is split into `order x order` cells, so that the vertices of the refined mesh
    /// coincide with the nodes of an order `order` nodal space on this mesh.
    ///
    /// # Panics
    ///
    /// Panics if `order` is zero.
    pub fn low_order_refined(&self, order: usize) -> Self {
        assert!(order > 0, "Refinement order must be positive");
        Self::with_origin(
            self.cells_x * order,
            self.cells_y * order,
            self.cell_size / order as f64,
            self.origin,
        )
    }
}
