// src/task/services.rs

//! Minimal type-keyed service container shared by the registry and jobs.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

use crate::errors::{JobkitError, Result};

type ServiceMap = HashMap<TypeId, (&'static str, Arc<dyn Any + Send + Sync>)>;

/// Register / resolve services by their concrete type.
///
/// Jobs populate it from [`Job::register_services`](crate::job::Job::register_services);
/// tasks resolve from it through their [`TaskContext`](crate::task::TaskContext).
#[derive(Default)]
pub struct ServiceContainer {
    services: RwLock<ServiceMap>,
}

impl fmt::Debug for ServiceContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let guard = self.services.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<&str> = guard.values().map(|(name, _)| *name).collect();
        names.sort_unstable();
        f.debug_struct("ServiceContainer")
            .field("services", &names)
            .finish()
    }
}

impl ServiceContainer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a service, replacing any previous instance of the same type.
    pub fn register<T: Send + Sync + 'static>(&self, service: T) {
        self.register_arc(Arc::new(service));
    }

    pub fn register_arc<T: Send + Sync + 'static>(&self, service: Arc<T>) {
        let mut guard = self.services.write().unwrap_or_else(|e| e.into_inner());
        guard.insert(TypeId::of::<T>(), (std::any::type_name::<T>(), service));
    }

    pub fn resolve<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        let guard = self.services.read().unwrap_or_else(|e| e.into_inner());
        let (_, service) = guard.get(&TypeId::of::<T>())?;
        Arc::clone(service).downcast::<T>().ok()
    }

    /// Resolve a service that must be present.
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>> {
        self.resolve::<T>().ok_or_else(|| {
            JobkitError::ServiceUnavailable(std::any::type_name::<T>().to_string())
        })
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        let guard = self.services.read().unwrap_or_else(|e| e.into_inner());
        guard.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.services.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
