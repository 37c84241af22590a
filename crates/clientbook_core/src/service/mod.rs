//! Use-case layer: cached controllers and the session that drives them.

pub mod collection;
pub mod controller;
pub mod session;
