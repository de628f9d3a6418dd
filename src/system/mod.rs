pub mod collector;
pub mod command;
pub mod monitor;
pub mod platform;
pub mod process;
pub mod rate;
pub mod sampler;
pub mod snapshot;
pub mod store;
