use std::collections::HashMap;

use crate::config::{CellProgram, ConfigError};

/// One rectangular region of the grid. Shape is fixed at construction; the
/// per-layer programs are written once at scene build time and read on every
/// voice fire afterwards.
#[derive(Debug, Default)]
pub struct Cell {
    pub row: usize,
    pub col: usize,
    programs: HashMap<String, CellProgram>,
}

impl Cell {
    pub fn program(&self, layer: &str) -> Option<&CellProgram> {
        self.programs.get(layer)
    }

    pub fn set_program(&mut self, layer: impl Into<String>, program: CellProgram) {
        self.programs.insert(layer.into(), program);
    }
}

/// Fixed rows×cols partition of the field with O(1) position lookup.
pub struct Grid {
    rows: usize,
    cols: usize,
    cell_width: f32,
    cell_height: f32,
    cells: Vec<Cell>,
}

impl Grid {
    pub fn new(
        rows: usize,
        cols: usize,
        cell_width: f32,
        cell_height: f32,
    ) -> Result<Self, ConfigError> {
        if rows == 0 || cols == 0 {
            return Err(ConfigError::InvalidGridShape { rows, cols });
        }
        if !(cell_width > 0.0 && cell_height > 0.0) {
            return Err(ConfigError::InvalidCellSize {
                width: cell_width,
                height: cell_height,
            });
        }
        let cells = (0..rows * cols)
            .map(|i| Cell {
                row: i / cols,
                col: i % cols,
                programs: HashMap::new(),
            })
            .collect();
        Ok(Self {
            rows,
            cols,
            cell_width,
            cell_height,
            cells,
        })
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    /// Pure position lookup. Positions left of / above the origin and at or
    /// beyond the right/bottom edge map to no cell.
    pub fn cell_at(&self, x: f32, y: f32) -> Option<&Cell> {
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let col = (x / self.cell_width) as usize;
        let row = (y / self.cell_height) as usize;
        if col >= self.cols || row >= self.rows {
            return None;
        }
        Some(&self.cells[row * self.cols + col])
    }

    pub fn cell_mut(&mut self, row: usize, col: usize) -> Option<&mut Cell> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        Some(&mut self.cells[row * self.cols + col])
    }
}
