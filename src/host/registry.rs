//! Type-keyed instance registry
//!
//! Stands in for the host's dependency-injection container: components bind
//! shared instances by type at setup and look them up again at teardown.
//! The registry only keeps weak references; whoever bound an instance owns
//! it, and lookups fail once the owner has dropped it.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Registry lookup errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// No instance bound for the requested type
    NotBound(&'static str),
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::NotBound(name) => write!(f, "No instance bound for {}", name),
        }
    }
}

impl std::error::Error for RegistryError {}

/// Shared, non-owning lookup of instances by type
pub struct Registry {
    instances: RwLock<HashMap<TypeId, Weak<dyn Any + Send + Sync>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
        }
    }

    /// Bind an instance, replacing any previous binding for the same type
    pub fn bind_instance<T: Any + Send + Sync>(&self, instance: Arc<T>) {
        let instance: Arc<dyn Any + Send + Sync> = instance;
        self.instances
            .write()
            .insert(TypeId::of::<T>(), Arc::downgrade(&instance));
    }

    /// Look up the instance bound for `T`
    pub fn inject<T: Any + Send + Sync>(&self) -> Result<Arc<T>, RegistryError> {
        let instance = self
            .instances
            .read()
            .get(&TypeId::of::<T>())
            .and_then(Weak::upgrade)
            .ok_or(RegistryError::NotBound(type_name::<T>()))?;

        instance
            .downcast::<T>()
            .map_err(|_| RegistryError::NotBound(type_name::<T>()))
    }

    /// Check whether a live instance is bound for `T`
    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.instances
            .read()
            .get(&TypeId::of::<T>())
            .is_some_and(|instance| instance.strong_count() > 0)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
