//! Bookstore application library
//!
//! Wires the user registration and book catalog modules onto the kernel,
//! database and HTTP crates.

pub mod app;
pub mod modules;

pub use app::{prepare, run, Prepared};
