//! Element kinds, their corner nodes and linear shape functions.
//!
//! Node ordering follows VTK: corner nodes first, then edge midpoints, then
//! face and volume centers. Linear shape functions are defined over the corner
//! nodes only; they are what enforced-linear interpolation uses to recover
//! values on the remaining nodes of a higher-order element.

use serde::{Deserialize, Serialize};

/// Supported element and facet shapes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    Point1,
    Line2,
    Line3,
    Tri3,
    Tri6,
    Quad4,
    Quad8,
    Quad9,
    Tet4,
    Tet10,
    Hex8,
    Hex20,
    Hex27,
}

const LINE_CORNERS: [[f64; 3]; 2] = [[-1.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
const TRI_CORNERS: [[f64; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
const QUAD_CORNERS: [[f64; 3]; 4] = [
    [-1.0, -1.0, 0.0],
    [1.0, -1.0, 0.0],
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
];
const TET_CORNERS: [[f64; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
];
const HEX_CORNERS: [[f64; 3]; 8] = [
    [-1.0, -1.0, -1.0],
    [1.0, -1.0, -1.0],
    [1.0, 1.0, -1.0],
    [-1.0, 1.0, -1.0],
    [-1.0, -1.0, 1.0],
    [1.0, -1.0, 1.0],
    [1.0, 1.0, 1.0],
    [-1.0, 1.0, 1.0],
];

// Non-corner nodes, each given by the corners it sits in the middle of.
const LINE3_EXTRA: &[&[usize]] = &[&[0, 1]];
const TRI6_EXTRA: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0]];
const QUAD8_EXTRA: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0]];
const QUAD9_EXTRA: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 3], &[3, 0], &[0, 1, 2, 3]];
const TET10_EXTRA: &[&[usize]] = &[&[0, 1], &[1, 2], &[2, 0], &[0, 3], &[1, 3], &[2, 3]];
const HEX20_EXTRA: &[&[usize]] = &[
    &[0, 1],
    &[1, 2],
    &[2, 3],
    &[3, 0],
    &[4, 5],
    &[5, 6],
    &[6, 7],
    &[7, 4],
    &[0, 4],
    &[1, 5],
    &[2, 6],
    &[3, 7],
];
const HEX27_EXTRA: &[&[usize]] = &[
    &[0, 1],
    &[1, 2],
    &[2, 3],
    &[3, 0],
    &[4, 5],
    &[5, 6],
    &[6, 7],
    &[7, 4],
    &[0, 4],
    &[1, 5],
    &[2, 6],
    &[3, 7],
    &[0, 3, 7, 4],
    &[1, 2, 6, 5],
    &[0, 1, 5, 4],
    &[3, 2, 6, 7],
    &[0, 1, 2, 3],
    &[4, 5, 6, 7],
    &[0, 1, 2, 3, 4, 5, 6, 7],
];

impl ElementKind {
    /// Topological dimension.
    pub fn dimension(self) -> u8 {
        use ElementKind::*;
        match self {
            Point1 => 0,
            Line2 | Line3 => 1,
            Tri3 | Tri6 | Quad4 | Quad8 | Quad9 => 2,
            Tet4 | Tet10 | Hex8 | Hex20 | Hex27 => 3,
        }
    }

    pub fn num_nodes(self) -> usize {
        self.num_corners() + self.extra_nodes().len()
    }

    pub fn num_corners(self) -> usize {
        self.corner_coords().len()
    }

    /// True if the element has no nodes besides its corners.
    pub fn is_linear(self) -> bool {
        self.extra_nodes().is_empty()
    }

    fn corner_coords(self) -> &'static [[f64; 3]] {
        use ElementKind::*;
        match self {
            Point1 => &[[0.0, 0.0, 0.0]],
            Line2 | Line3 => &LINE_CORNERS,
            Tri3 | Tri6 => &TRI_CORNERS,
            Quad4 | Quad8 | Quad9 => &QUAD_CORNERS,
            Tet4 | Tet10 => &TET_CORNERS,
            Hex8 | Hex20 | Hex27 => &HEX_CORNERS,
        }
    }

    fn extra_nodes(self) -> &'static [&'static [usize]] {
        use ElementKind::*;
        match self {
            Line3 => LINE3_EXTRA,
            Tri6 => TRI6_EXTRA,
            Quad8 => QUAD8_EXTRA,
            Quad9 => QUAD9_EXTRA,
            Tet10 => TET10_EXTRA,
            Hex20 => HEX20_EXTRA,
            Hex27 => HEX27_EXTRA,
            _ => &[],
        }
    }

    /// Reference coordinates of local node `i`.
    pub fn reference_coords(self, i: usize) -> Option<[f64; 3]> {
        let corners = self.corner_coords();
        if let Some(c) = corners.get(i) {
            return Some(*c);
        }
        let members = self.extra_nodes().get(i - corners.len())?;
        let mut x = [0.0; 3];
        for &m in members.iter() {
            for d in 0..3 {
                x[d] += corners[m][d];
            }
        }
        let n = members.len() as f64;
        Some([x[0] / n, x[1] / n, x[2] / n])
    }

    /// Linear (corner-node) shape functions evaluated at `xi`.
    pub fn linear_shape(self, xi: [f64; 3]) -> Vec<f64> {
        use ElementKind::*;
        let [x, y, z] = xi;
        match self {
            Point1 => vec![1.0],
            Line2 | Line3 => vec![0.5 * (1.0 - x), 0.5 * (1.0 + x)],
            Tri3 | Tri6 => vec![1.0 - x - y, x, y],
            Quad4 | Quad8 | Quad9 => QUAD_CORNERS
                .iter()
                .map(|c| 0.25 * (1.0 + c[0] * x) * (1.0 + c[1] * y))
                .collect(),
            Tet4 | Tet10 => vec![1.0 - x - y - z, x, y, z],
            Hex8 | Hex20 | Hex27 => HEX_CORNERS
                .iter()
                .map(|c| 0.125 * (1.0 + c[0] * x) * (1.0 + c[1] * y) * (1.0 + c[2] * z))
                .collect(),
        }
    }

    /// Weights that express node `i` as a combination of the corner nodes.
    pub fn linear_weights(self, i: usize) -> Option<Vec<f64>> {
        self.reference_coords(i).map(|xi| self.linear_shape(xi))
    }

    /// Length, area or volume of the straight-sided element spanned by
    /// `corners` (physical coordinates of the corner nodes).
    pub fn measure(self, corners: &[[f64; 3]]) -> f64 {
        use ElementKind::*;
        if corners.len() < self.num_corners() {
            return 0.0;
        }
        let c = corners;
        match self {
            Point1 => 1.0,
            Line2 | Line3 => norm(sub(c[1], c[0])),
            Tri3 | Tri6 => tri_area(c[0], c[1], c[2]),
            Quad4 | Quad8 | Quad9 => tri_area(c[0], c[1], c[2]) + tri_area(c[0], c[2], c[3]),
            Tet4 | Tet10 => tet_volume(c[0], c[1], c[2], c[3]),
            Hex8 | Hex20 | Hex27 => {
                const RING: [usize; 6] = [1, 2, 3, 7, 4, 5];
                (0..6)
                    .map(|k| tet_volume(c[0], c[RING[k]], c[RING[(k + 1) % 6]], c[6]))
                    .sum()
            }
        }
    }
}

fn sub(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn norm(a: [f64; 3]) -> f64 {
    (a[0] * a[0] + a[1] * a[1] + a[2] * a[2]).sqrt()
}

fn tri_area(a: [f64; 3], b: [f64; 3], c: [f64; 3]) -> f64 {
    0.5 * norm(cross(sub(b, a), sub(c, a)))
}

fn tet_volume(a: [f64; 3], b: [f64; 3], c: [f64; 3], d: [f64; 3]) -> f64 {
    let n = cross(sub(b, a), sub(c, a));
    let e = sub(d, a);
    ((n[0] * e[0] + n[1] * e[1] + n[2] * e[2]) / 6.0).abs()
}
