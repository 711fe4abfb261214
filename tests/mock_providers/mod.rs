//! Mock recognition services for integration tests.

#![allow(dead_code)]

pub mod websocket_mock;
