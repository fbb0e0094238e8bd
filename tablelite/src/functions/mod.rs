// Copyright (c) 2024-2025 DeepGraph Inc.
// SPDX-License-Identifier: Apache-2.0
//
//! Scalar function registry
//!
//! The registry is an explicit value threaded into the compiler, so callers
//! can extend or replace the builtins without global state.

pub mod conditional_functions;
pub mod function_trait;
pub mod math_functions;
pub mod string_functions;

pub use function_trait::{Function, FunctionContext, FunctionError, FunctionResult};

use conditional_functions::{CoalesceFunction, ExtremumFunction, NowFunction, NullIfFunction};
use math_functions::{RoundFunction, UnaryMath, UnaryMathFunction};
use std::collections::HashMap;
use std::sync::Arc;
use string_functions::{
    CaseFunction, CaseMode, ConcatFunction, LengthFunction, ReplaceFunction, SubstrFunction,
    TrimFunction, TrimMode,
};

/// Name to implementation table; names are case-insensitive
#[derive(Debug, Clone)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn Function>>,
}

impl FunctionRegistry {
    /// A registry without any functions
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    pub fn register(&mut self, function: Arc<dyn Function>) {
        let key = function.name().to_lowercase();
        log::trace!("Registering function '{}'", key);
        self.functions.insert(key, function);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(&name.to_lowercase()).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(&name.to_lowercase())
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.functions.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register(Arc::new(CaseFunction::new(CaseMode::Lower)));
        registry.register(Arc::new(CaseFunction::new(CaseMode::Upper)));
        registry.register(Arc::new(LengthFunction));
        registry.register(Arc::new(TrimFunction::new(TrimMode::Both)));
        registry.register(Arc::new(TrimFunction::new(TrimMode::Leading)));
        registry.register(Arc::new(TrimFunction::new(TrimMode::Trailing)));
        registry.register(Arc::new(SubstrFunction));
        registry.register(Arc::new(ReplaceFunction));
        registry.register(Arc::new(ConcatFunction));
        registry.register(Arc::new(CoalesceFunction));
        registry.register(Arc::new(NullIfFunction));
        registry.register(Arc::new(ExtremumFunction::greatest()));
        registry.register(Arc::new(ExtremumFunction::least()));
        registry.register(Arc::new(UnaryMathFunction::new(UnaryMath::Abs)));
        registry.register(Arc::new(UnaryMathFunction::new(UnaryMath::Floor)));
        registry.register(Arc::new(UnaryMathFunction::new(UnaryMath::Ceil)));
        registry.register(Arc::new(RoundFunction));
        registry.register(Arc::new(NowFunction));
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        let registry = FunctionRegistry::default();
        assert!(registry.get("UPPER").is_some());
        assert!(registry.get("upper").is_some());
        assert!(registry.get("no_such_function").is_none());
    }

    #[test]
    fn test_builtins_are_registered() {
        let registry = FunctionRegistry::default();
        for name in [
            "lower", "upper", "length", "trim", "ltrim", "rtrim", "substr", "replace", "concat",
            "coalesce", "nullif", "abs", "round", "floor", "ceil", "greatest", "least", "now",
        ] {
            assert!(registry.contains(name), "missing builtin {}", name);
        }
    }

    #[test]
    fn test_arity() {
        let registry = FunctionRegistry::default();
        let substr = registry.get("substr").unwrap();
        assert!(!substr.accepts(1));
        assert!(substr.accepts(3));
        assert!(registry.get("concat").unwrap().accepts(10));
    }
}
