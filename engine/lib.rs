#![deny(dead_code)]
#![deny(unused_imports)]

pub mod bins;
pub mod blocks;
pub mod config;
pub mod driver;
pub mod grid;
pub mod index;
pub mod io;
pub mod partition;
pub mod predicates;
pub mod setup;
pub mod theory;
pub mod types;

#[path = "../assemble/mod.rs"]
pub mod assemble;
