//! Test doubles and fixtures shared across unit tests.

pub mod fixtures;
pub mod mock_ai;
pub mod mock_git;
