//! Chat delivery adapters.

pub mod chatwork;

pub use chatwork::ChatworkAdapter;
