use ndarray::Array2;

/// Single coordinate axis used for board width, height, and positions.
pub type Coord = u8;

/// Count type used for mine counts and total-cell counts.
pub type CellCount = u16;

/// Two-dimensional coordinates `(x, y)`.
pub type Coord2 = (Coord, Coord);

pub trait ToNdIndex {
    type Output;
    fn to_nd_index(self) -> Self::Output;
}

impl ToNdIndex for Coord2 {
    type Output = [usize; 2];

    fn to_nd_index(self) -> Self::Output {
        [self.0.into(), self.1.into()]
    }
}

pub const fn mult(a: Coord, b: Coord) -> CellCount {
    let a = a as CellCount;
    let b = b as CellCount;
    a.saturating_mul(b)
}

const DISPLACEMENTS: [(i16, i16); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Iterates the in-bounds 8-neighborhood of `center` within `bounds`.
pub fn neighbors(center: Coord2, bounds: Coord2) -> impl Iterator<Item = Coord2> {
    DISPLACEMENTS.into_iter().filter_map(move |(dx, dy)| {
        let x = i16::from(center.0) + dx;
        let y = i16::from(center.1) + dy;
        if x >= 0 && y >= 0 && x < i16::from(bounds.0) && y < i16::from(bounds.1) {
            Some((x as Coord, y as Coord))
        } else {
            None
        }
    })
}

pub trait NeighborIterExt {
    fn iter_neighbors(&self, index: Coord2) -> impl Iterator<Item = Coord2>;
}

impl<T> NeighborIterExt for Array2<T> {
    fn iter_neighbors(&self, index: Coord2) -> impl Iterator<Item = Coord2> {
        let dim = self.dim();
        let bounds = (dim.0 as Coord, dim.1 as Coord);
        neighbors(index, bounds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn corner_has_three_neighbors() {
        let found: alloc::vec::Vec<_> = neighbors((0, 0), (5, 5)).collect();
        assert_eq!(found, [(1, 0), (0, 1), (1, 1)]);
    }

    #[test]
    fn interior_has_eight_neighbors() {
        assert_eq!(neighbors((2, 2), (5, 5)).count(), 8);
    }

    #[test]
    fn one_by_one_board_has_no_neighbors() {
        assert_eq!(neighbors((0, 0), (1, 1)).count(), 0);
    }
}
