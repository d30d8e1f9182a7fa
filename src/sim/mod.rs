pub mod field;
pub mod grid;
pub mod node;
