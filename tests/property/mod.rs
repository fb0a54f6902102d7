//! Property-based tests

mod concurrency_proptest;
mod convergence_proptest;
