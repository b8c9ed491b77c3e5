//! Specialized collection types

pub use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Generational key into the component object arena
    pub struct ObjectKey;
}

/// Handle-based map using slot map for stable references
pub type HandleMap<T> = SlotMap<ObjectKey, T>;

/// Fixed-size grid of occupancy flags used for cell allocation
#[derive(Debug, Clone)]
pub struct CellGrid {
    columns: u32,
    rows: u32,
    used: Vec<bool>,
}

impl CellGrid {
    /// Create an empty grid
    pub fn new(columns: u32, rows: u32) -> Self {
        Self {
            columns,
            rows,
            used: vec![false; (columns * rows) as usize],
        }
    }

    /// Number of columns
    pub const fn columns(&self) -> u32 {
        self.columns
    }

    /// Number of rows
    pub const fn rows(&self) -> u32 {
        self.rows
    }

    /// First-fit search for a free `width x height` block of cells
    ///
    /// Returns the top-left cell of the block and marks it used.
    pub fn allocate(&mut self, width: u32, height: u32) -> Option<(u32, u32)> {
        if width == 0 || height == 0 || width > self.columns || height > self.rows {
            return None;
        }
        for row in 0..=(self.rows - height) {
            for col in 0..=(self.columns - width) {
                if self.is_block_free(col, row, width, height) {
                    self.set_block(col, row, width, height, true);
                    return Some((col, row));
                }
            }
        }
        None
    }

    /// Release a block previously returned by [`CellGrid::allocate`]
    pub fn release(&mut self, col: u32, row: u32, width: u32, height: u32) {
        self.set_block(col, row, width, height, false);
    }

    /// True when no cell is in use
    pub fn is_empty(&self) -> bool {
        !self.used.iter().any(|used| *used)
    }

    fn is_block_free(&self, col: u32, row: u32, width: u32, height: u32) -> bool {
        (row..row + height).all(|r| (col..col + width).all(|c| !self.used[self.index(c, r)]))
    }

    fn set_block(&mut self, col: u32, row: u32, width: u32, height: u32, value: bool) {
        for r in row..(row + height).min(self.rows) {
            for c in col..(col + width).min(self.columns) {
                let index = self.index(c, r);
                self.used[index] = value;
            }
        }
    }

    const fn index(&self, col: u32, row: u32) -> usize {
        (row * self.columns + col) as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_grid_first_fit() {
        let mut grid = CellGrid::new(4, 4);
        assert_eq!(grid.allocate(2, 2), Some((0, 0)));
        assert_eq!(grid.allocate(2, 2), Some((2, 0)));
        assert_eq!(grid.allocate(4, 1), Some((0, 2)));
        assert_eq!(grid.allocate(4, 2), None);
    }

    #[test]
    fn test_cell_grid_release() {
        let mut grid = CellGrid::new(2, 2);
        let (c, r) = grid.allocate(2, 2).unwrap();
        assert!(grid.allocate(1, 1).is_none());
        grid.release(c, r, 2, 2);
        assert!(grid.is_empty());
        assert_eq!(grid.allocate(1, 1), Some((0, 0)));
    }

    #[test]
    fn test_cell_grid_rejects_oversized() {
        let mut grid = CellGrid::new(2, 2);
        assert!(grid.allocate(3, 1).is_none());
        assert!(grid.allocate(0, 1).is_none());
    }
}
