//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod registry_mock;
pub mod socket_guard;
