//! Factories for test environments

mod environment;

pub use environment::FixtureEnvironment;
