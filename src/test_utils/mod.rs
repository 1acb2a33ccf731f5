//! Stream and collaborator doubles shared by the unit tests
mod opener;

pub use opener::*;
