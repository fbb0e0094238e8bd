// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Declared column and cast target types

use serde::{Deserialize, Serialize};
use std::fmt;

/// Target type of a cast or a declared column
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    SmallInt,
    Integer,
    BigInt,
    Real,
    Double,
    Numeric { scale: Option<u32> },
    Text { length: Option<usize> },
    Date,
    Timestamp,
    Json,
    List(Box<DataType>),
}

impl DataType {
    pub fn text() -> Self {
        DataType::Text { length: None }
    }

    pub fn varchar(length: usize) -> Self {
        DataType::Text {
            length: Some(length),
        }
    }

    pub fn numeric(scale: u32) -> Self {
        DataType::Numeric { scale: Some(scale) }
    }

    pub fn list_of(inner: DataType) -> Self {
        DataType::List(Box::new(inner))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, DataType::SmallInt | DataType::Integer | DataType::BigInt)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Boolean => write!(f, "BOOLEAN"),
            DataType::SmallInt => write!(f, "SMALLINT"),
            DataType::Integer => write!(f, "INTEGER"),
            DataType::BigInt => write!(f, "BIGINT"),
            DataType::Real => write!(f, "REAL"),
            DataType::Double => write!(f, "DOUBLE"),
            DataType::Numeric { scale: Some(s) } => write!(f, "NUMERIC({})", s),
            DataType::Numeric { scale: None } => write!(f, "NUMERIC"),
            DataType::Text { length: Some(n) } => write!(f, "VARCHAR({})", n),
            DataType::Text { length: None } => write!(f, "TEXT"),
            DataType::Date => write!(f, "DATE"),
            DataType::Timestamp => write!(f, "TIMESTAMP"),
            DataType::Json => write!(f, "JSON"),
            DataType::List(inner) => write!(f, "{}[]", inner),
        }
    }
}
