//! 编排层

pub mod batch;

pub use batch::BatchRunner;
