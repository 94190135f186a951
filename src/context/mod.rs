//! Per-request state handed through the middleware chain.
//!
//! Middleware stores values in the [`Extensions`] map by type and handlers
//! read them back, the way the trace layer hands each handler its
//! [`RequestTrace`](crate::trace::RequestTrace).

use std::any::{Any, TypeId};
use std::collections::HashMap;

use crate::Request;

/// Values keyed by their type; at most one value per type.
#[derive(Default)]
pub struct Extensions {
    values: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl Extensions {
    /// Stores `value`, handing back the value of the same type it replaced.
    pub fn insert<T: Send + Sync + 'static>(&mut self, value: T) -> Option<T> {
        let replaced = self.values.insert(TypeId::of::<T>(), Box::new(value))?;
        replaced.downcast().ok().map(|boxed: Box<T>| *boxed)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.values.get(&TypeId::of::<T>())?.downcast_ref()
    }
}

/// A request together with the state middleware attached to it.
pub struct Context {
    request: Request,
    extensions: Extensions,
}

impl Context {
    pub fn new(request: Request) -> Self {
        Self {
            request,
            extensions: Extensions::default(),
        }
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    pub fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    pub fn extensions_mut(&mut self) -> &mut Extensions {
        &mut self.extensions
    }
}
