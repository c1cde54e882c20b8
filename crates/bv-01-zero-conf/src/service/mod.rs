//! Zero-conf engine service: the public handle and its single-writer actor.

mod actor;
mod engine;

pub use engine::{EngineStats, ZeroConfEngine};
