pub mod main;
pub mod matrix;
pub use main::{AssembleCommand, AssembleSummary, discover_block_files, run};
pub use matrix::{AssembleError, BlockRecord, Component, assemble_files, fill_matrix};
