pub mod ai;
pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod processing;
pub mod review;
pub mod template;
pub mod util;

#[cfg(test)]
pub(crate) mod testing;
