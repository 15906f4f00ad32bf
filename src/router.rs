//! Radix-tree request router.
//!
//! One tree per HTTP method. A path that matches under some other method is
//! reported as [`Route::MethodNotAllowed`] so the server can answer 405
//! instead of 404.

use std::collections::HashMap;
use std::sync::Arc;

use matchit::Router as MatchitRouter;

use crate::handler::{BoxedHandler, Handler};
use crate::method::Method;

/// The application router.
///
/// Build it once at startup; pass it to [`Server::serve`](crate::Server::serve).
pub struct Router {
    routes: HashMap<Method, MatchitRouter<BoxedHandler>>,
}

/// Outcome of a router lookup.
pub(crate) enum Route {
    Found(BoxedHandler, HashMap<String, String>),
    MethodNotAllowed,
    NotFound,
}

impl Router {
    pub fn new() -> Self {
        Self { routes: HashMap::new() }
    }

    /// Register a handler for a method + path pair. Returns `self` for chaining.
    ///
    /// Path parameters use matchit's `{name}` and `{*rest}` syntax.
    ///
    /// # Panics
    ///
    /// Panics if `path` is not a valid route or conflicts with one already
    /// registered for `method`. Routes are fixed at startup.
    pub fn on(mut self, method: Method, path: &str, handler: impl Handler) -> Self {
        self.routes
            .entry(method)
            .or_default()
            .insert(path, handler.into_boxed_handler())
            .unwrap_or_else(|e| panic!("invalid route `{path}`: {e}"));
        self
    }

    /// Register the same handler on `/` and on every path below it.
    pub fn on_any_path(self, method: Method, handler: impl Handler + Clone) -> Self {
        self.on(method, "/", handler.clone())
            .on(method, "/{*path}", handler)
    }

    pub(crate) fn lookup(&self, method: Option<Method>, path: &str) -> Route {
        if let Some(tree) = method.and_then(|m| self.routes.get(&m)) {
            if let Ok(matched) = tree.at(path) {
                let params = matched.params.iter()
                    .map(|(k, v)| (k.to_owned(), v.to_owned()))
                    .collect();
                return Route::Found(Arc::clone(matched.value), params);
            }
        }

        let elsewhere = self.routes.iter()
            .filter(|(m, _)| Some(**m) != method)
            .any(|(_, tree)| tree.at(path).is_ok());
        if elsewhere { Route::MethodNotAllowed } else { Route::NotFound }
    }
}

impl Default for Router {
    fn default() -> Self { Self::new() }
}
