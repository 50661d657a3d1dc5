// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2012-2025 Andrei Maltsev

//! The method registry: unique-name computation and dispatch table.
//!
//! Rust has no runtime reflection over trait impls, so registration is
//! explicit: a service author lists its methods (simple name, parameter type
//! names, handler) once via [`MethodSpec`], and [`MethodRegistry::register_all`]
//! computes overload-safe unique names the same way a reflection-based scan
//! would, by counting simple-name collisions across the whole batch.

use std::{collections::HashMap, future::Future, sync::Arc};

use async_trait::async_trait;

use crate::error::{Result, RpcError};

/// A boxed, type-erased invocation target. Implementors receive the raw
/// (already decompressed) native-serialized argument tuple and return the
/// raw native-serialized return value; [`crate::server::ServerDispatcher`]
/// handles framing and status codes around the call.
#[async_trait]
pub trait Handler: Send + Sync {
    async fn call(&self, args: &[u8]) -> Result<Vec<u8>>;
}

/// One method a service exposes: its simple name, the type names of its
/// parameters (used only to disambiguate overloads), and its handler.
pub struct MethodSpec {
    pub simple_name: String,
    pub param_type_names: Vec<String>,
    pub handler: Arc<dyn Handler>,
}

impl MethodSpec {
    pub fn new(simple_name: impl Into<String>, param_type_names: Vec<String>, handler: Arc<dyn Handler>) -> Self {
        Self {
            simple_name: simple_name.into(),
            param_type_names,
            handler,
        }
    }
}

/// Read-only after construction: `simpleName` or
/// `simpleName#paramType1,paramType2,...` → handler.
#[derive(Default)]
pub struct MethodRegistry {
    methods: HashMap<String, Arc<dyn Handler>>,
}

impl MethodRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every method in `specs`, computing each one's unique name
    /// by counting how many other specs in this same batch share its simple
    /// name: a unique simple name is used bare, otherwise every spec sharing
    /// it is qualified with `#type1,type2,...`. Fails if two specs in the
    /// batch (or one in the batch and one already registered) resolve to
    /// the same unique name.
    pub fn register_all(&mut self, specs: Vec<MethodSpec>) -> Result<()> {
        let mut simple_name_counts: HashMap<&str, usize> = HashMap::new();
        for spec in &specs {
            *simple_name_counts.entry(spec.simple_name.as_str()).or_insert(0) += 1;
        }

        for spec in specs {
            let unique_name = if simple_name_counts.get(spec.simple_name.as_str()).copied().unwrap_or(0) > 1 {
                format!("{}#{}", spec.simple_name, spec.param_type_names.join(","))
            } else {
                spec.simple_name.clone()
            };

            if self.methods.contains_key(&unique_name) {
                return Err(RpcError::DuplicateMethod(unique_name));
            }
            self.methods.insert(unique_name, spec.handler);
        }

        Ok(())
    }

    pub fn lookup(&self, unique_name: &str) -> Option<Arc<dyn Handler>> {
        self.methods.get(unique_name).cloned()
    }

    pub fn len(&self) -> usize {
        self.methods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.methods.is_empty()
    }
}

struct TypedHandler<F, A, R> {
    f: F,
    _marker: std::marker::PhantomData<fn(A) -> R>,
}

#[async_trait]
impl<F, Fut, A, R> Handler for TypedHandler<F, A, R>
where
    A: serde::de::DeserializeOwned + Send + Sync,
    R: serde::Serialize + Send + Sync,
    F: Fn(A) -> Fut + Send + Sync,
    Fut: Future<Output = Result<R>> + Send,
{
    async fn call(&self, args: &[u8]) -> Result<Vec<u8>> {
        let args: A = crate::serializer::deserialize(args)?;
        let result = (self.f)(args).await?;
        crate::serializer::serialize(&result)
    }
}

/// Wraps a typed async closure `A -> Result<R>` into a boxed [`Handler`],
/// handling native-serializer decode/encode so service authors write plain
/// Rust functions rather than byte-slice handlers.
pub fn typed<A, R, F, Fut>(f: F) -> Arc<dyn Handler>
where
    A: serde::de::DeserializeOwned + Send + Sync + 'static,
    R: serde::Serialize + Send + Sync + 'static,
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<R>> + Send + 'static,
{
    Arc::new(TypedHandler {
        f,
        _marker: std::marker::PhantomData,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl Handler for Echo {
        async fn call(&self, args: &[u8]) -> Result<Vec<u8>> {
            Ok(args.to_vec())
        }
    }

    #[test]
    fn unique_simple_name_stays_bare() {
        let mut registry = MethodRegistry::new();
        registry
            .register_all(vec![MethodSpec::new("echo", vec!["String".to_string()], Arc::new(Echo))])
            .expect("register");
        assert!(registry.lookup("echo").is_some());
    }

    #[test]
    fn overloaded_simple_name_gets_qualified() {
        let mut registry = MethodRegistry::new();
        registry
            .register_all(vec![
                MethodSpec::new("f", vec!["String".to_string()], Arc::new(Echo)),
                MethodSpec::new("f", vec!["i32".to_string(), "i32".to_string()], Arc::new(Echo)),
            ])
            .expect("register");
        assert!(registry.lookup("f").is_none());
        assert!(registry.lookup("f#String").is_some());
        assert!(registry.lookup("f#i32,i32").is_some());
    }

    #[test]
    fn duplicate_unique_name_fails() {
        let mut registry = MethodRegistry::new();
        let result = registry.register_all(vec![
            MethodSpec::new("echo", vec![], Arc::new(Echo)),
            MethodSpec::new("echo", vec![], Arc::new(Echo)),
        ]);
        assert!(matches!(result, Err(RpcError::DuplicateMethod(_))));
    }

    #[tokio::test]
    async fn typed_handler_roundtrips() {
        let handler = typed(|s: String| async move { Ok(format!("{s}!")) });
        let args = crate::serializer::serialize(&"hi".to_string()).unwrap();
        let raw = handler.call(&args).await.unwrap();
        let out: String = crate::serializer::deserialize(&raw).unwrap();
        assert_eq!(out, "hi!");
    }
}
