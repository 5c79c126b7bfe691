pub mod engine;
pub mod task;
pub mod transcript;

pub use engine::Agent;
