//! Modules and the handler registry.
//!
//! A [`Module`] groups controllers, scope controllers, module-wide
//! middlewares and imported modules. Building it yields a [`Registry`]:
//!
//! ```text
//! Module::build()
//! ├── imports, depth-first, in declaration order
//! └── own controllers, in declaration order
//!     └── each route → HandlerEntry
//!         middlewares: module → controller → route
//! ```
//!
//! A module's middlewares apply to its own controllers only, not to the
//! controllers of modules it imports.

use std::collections::HashSet;

use tracing::debug;

use crate::controller::{Controller, ControllerDef};
use crate::entry::HandlerEntry;
use crate::error::{FrameworkError, FrameworkResult};
use crate::handler::{BoxedMiddleware, Middleware, boxed_middleware};
use crate::scope::ScopeDefinition;

/// A composable unit of controllers.
pub struct Module {
    name: String,
    imports: Vec<Module>,
    controllers: Vec<(Option<String>, Box<dyn ControllerDef>)>,
    middlewares: Vec<BoxedMiddleware>,
}

impl Module {
    /// Creates an empty module.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            imports: Vec::new(),
            controllers: Vec::new(),
            middlewares: Vec::new(),
        }
    }

    /// Returns the module name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Imports another module. Its entries come before this module's own.
    pub fn import(mut self, module: Module) -> Self {
        self.imports.push(module);
        self
    }

    /// Adds a controller whose routes serve every chat member without an
    /// open scope.
    pub fn controller<C: Send + Sync + 'static>(mut self, controller: Controller<C>) -> Self {
        self.controllers.push((None, Box::new(controller)));
        self
    }

    /// Adds a scope controller: its routes only serve members who entered
    /// the scope `name`.
    pub fn scope<C: Send + Sync + 'static>(
        mut self,
        name: impl Into<String>,
        controller: Controller<C>,
    ) -> Self {
        self.controllers
            .push((Some(name.into()), Box::new(controller)));
        self
    }

    /// Adds a middleware run before every route of this module's own
    /// controllers.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// Builds the registry.
    ///
    /// # Errors
    /// [`FrameworkError::DuplicateScope`] if two scope controllers share a
    /// name anywhere in the import tree.
    pub fn build(self) -> FrameworkResult<Registry> {
        let mut registry = Registry::default();
        let mut seen = HashSet::new();
        self.collect(&mut registry, &mut seen)?;

        debug!(
            handler_count = registry.handlers.len(),
            scope_count = registry.scopes.len(),
            "Built handler registry"
        );
        Ok(registry)
    }

    fn collect(self, registry: &mut Registry, seen: &mut HashSet<String>) -> FrameworkResult<()> {
        let Module {
            name,
            imports,
            controllers,
            middlewares,
        } = self;

        for import in imports {
            import.collect(registry, seen)?;
        }

        for (scope, controller) in controllers {
            debug!(
                module = %name,
                controller = %controller.name(),
                scope = ?scope,
                "Registering controller"
            );
            let entries = controller.into_entries(&middlewares, scope.as_deref());

            if let Some(scope) = scope {
                if !seen.insert(scope.clone()) {
                    return Err(FrameworkError::DuplicateScope(scope));
                }
                registry
                    .scopes
                    .push(ScopeDefinition::new(scope, entries.clone()));
            }
            registry.handlers.extend(entries);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name)
            .field("imports", &self.imports)
            .field("controller_count", &self.controllers.len())
            .field("middleware_count", &self.middlewares.len())
            .finish()
    }
}

/// Every handler entry of a built module tree, plus its scopes.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    handlers: Vec<HandlerEntry>,
    scopes: Vec<ScopeDefinition>,
}

impl Registry {
    /// All entries in registration order, scoped ones included.
    pub fn handlers(&self) -> &[HandlerEntry] {
        &self.handlers
    }

    /// Entries that serve members without an open scope.
    pub fn global_handlers(&self) -> impl Iterator<Item = &HandlerEntry> {
        self.handlers.iter().filter(|entry| entry.scope().is_none())
    }

    pub fn scopes(&self) -> &[ScopeDefinition] {
        &self.scopes
    }

    pub fn into_parts(self) -> (Vec<HandlerEntry>, Vec<ScopeDefinition>) {
        (self.handlers, self.scopes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Route;
    use crate::answer::Answer;
    use nestgram_core::Update;
    use std::sync::Arc;
    use tower::BoxError;

    struct A;
    struct B;

    async fn noop<C>(_this: Arc<C>, _update: Arc<Update>, _answer: Answer) -> Result<(), BoxError> {
        Ok(())
    }

    fn keys(registry: &Registry) -> Vec<String> {
        registry
            .handlers()
            .iter()
            .map(|e| format!("{}.{}", e.controller(), e.method_key()))
            .collect()
    }

    #[test]
    fn test_imports_are_built_first() {
        let inner = Module::new("inner")
            .controller(Controller::new(B).route(Route::any("b1", noop::<B>)));
        let root = Module::new("root")
            .controller(Controller::new(A).route(Route::any("a1", noop::<A>)))
            .import(inner);

        let registry = root.build().unwrap();
        assert_eq!(keys(&registry), ["B.b1", "A.a1"]);
    }

    #[test]
    fn test_module_middlewares_prepend_own_controllers_only() {
        let mw = |_update: Arc<Update>, _answer: Answer| async {
            Ok::<_, BoxError>(crate::Flow::Continue)
        };
        let inner = Module::new("inner")
            .controller(Controller::new(B).route(Route::any("b", noop::<B>)));
        let root = Module::new("root")
            .middleware(mw)
            .import(inner)
            .controller(Controller::new(A).route(Route::any("a", noop::<A>).middleware(mw)));

        let registry = root.build().unwrap();
        assert_eq!(registry.handlers()[0].middleware_count(), 0);
        assert_eq!(registry.handlers()[1].middleware_count(), 2);
    }

    #[test]
    fn test_scope_entries_are_tagged() {
        let registry = Module::new("root")
            .controller(Controller::new(A).route(Route::any("a", noop::<A>)))
            .scope("wizard", Controller::new(B).route(Route::any("step", noop::<B>)))
            .build()
            .unwrap();

        assert_eq!(registry.handlers().len(), 2);
        assert_eq!(registry.global_handlers().count(), 1);
        assert_eq!(registry.scopes().len(), 1);
        assert_eq!(registry.scopes()[0].name(), "wizard");
        assert_eq!(registry.scopes()[0].handlers()[0].scope(), Some("wizard"));
    }

    #[test]
    fn test_duplicate_scope_across_imports() {
        let inner = Module::new("inner")
            .scope("wizard", Controller::new(B).route(Route::any("x", noop::<B>)));
        let err = Module::new("root")
            .import(inner)
            .scope("wizard", Controller::new(A).route(Route::any("y", noop::<A>)))
            .build()
            .unwrap_err();

        assert!(matches!(err, FrameworkError::DuplicateScope(name) if name == "wizard"));
    }
}
