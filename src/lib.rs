pub mod config;
pub mod control;
pub mod error;
pub mod gesture;
pub mod monitor;
pub mod operator;
pub mod pipeline;
pub mod sampler;
pub mod session;
pub mod storage;
pub mod types;
