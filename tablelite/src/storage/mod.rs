// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! In-memory storage: values, records and named collections

pub mod collections;
pub mod value;

pub use collections::{Collection, Collections};
pub use value::{record_from_json, Record, Value};

use thiserror::Error;

/// Errors raised while loading or addressing collections
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StorageError {
    #[error("Invalid fixture: {0}")]
    InvalidFixture(String),
}
