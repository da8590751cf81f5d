//! Built-in tools and collaborators for the planloop runtime.

pub mod factory;
pub mod memory;
pub mod strategy;
pub mod tools;
