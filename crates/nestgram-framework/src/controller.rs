//! Controllers and routes.
//!
//! A controller is any `Send + Sync` value shared behind an `Arc`; its
//! methods are plain async closures registered as [`Route`]s:
//!
//! ```rust,ignore
//! struct Greeter { greeting: String }
//!
//! let controller = Controller::new(Greeter { greeting: "Hello".into() })
//!     .route(Route::message("start", |this: Arc<Greeter>, _update, answer: Answer| async move {
//!         answer.send(&this.greeting).await?;
//!         Ok::<_, BoxError>(())
//!     })
//!     .command("start")
//!     .middleware(only_private));
//! ```
//!
//! Dependencies such as the API client or shared services are passed to the
//! controller's constructor; nothing is injected after construction.

use std::future::Future;
use std::sync::Arc;

use tower::BoxError;

use crate::answer::Answer;
use crate::entry::{CheckFn, EntryParts, HandlerEntry};
use crate::handler::{BoxedMiddleware, Middleware, MethodFn, bind_method, boxed_middleware};
use crate::predicate;
use nestgram_core::{Update, UpdateType};

// ============================================================================
// Route
// ============================================================================

type Binder<C> = Box<dyn FnOnce(Arc<C>) -> MethodFn + Send>;

/// One method of a controller of type `C`, with its matching rules.
pub struct Route<C> {
    key: String,
    kind: Option<UpdateType>,
    check: Option<CheckFn>,
    middlewares: Vec<BoxedMiddleware>,
    block: bool,
    bind: Binder<C>,
}

impl<C: Send + Sync + 'static> Route<C> {
    /// Creates a route for updates of `kind`, or of every kind when `None`.
    pub fn new<F, Fut, E>(key: impl Into<String>, kind: Option<UpdateType>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            key: key.into(),
            kind,
            check: None,
            middlewares: Vec::new(),
            block: false,
            bind: Box::new(move |controller| bind_method(controller, method)),
        }
    }

    /// Route for every update kind.
    pub fn any<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, None, method)
    }

    /// Route for new messages.
    pub fn message<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, Some(UpdateType::Message), method)
    }

    /// Route for edited messages.
    pub fn edited_message<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, Some(UpdateType::EditedMessage), method)
    }

    /// Route for channel posts.
    pub fn channel_post<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, Some(UpdateType::ChannelPost), method)
    }

    /// Route for inline keyboard button presses.
    pub fn callback_query<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, Some(UpdateType::CallbackQuery), method)
    }

    /// Route for inline-mode queries.
    pub fn inline_query<F, Fut, E>(key: impl Into<String>, method: F) -> Self
    where
        F: Fn(Arc<C>, Arc<Update>, Answer) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self::new(key, Some(UpdateType::InlineQuery), method)
    }

    /// Adds a predicate. Several predicates must all pass.
    pub fn check<F>(mut self, f: F) -> Self
    where
        F: Fn(&Update) -> bool + Send + Sync + 'static,
    {
        let check: CheckFn = match self.check.take() {
            Some(previous) => Arc::new(move |update: &Update| previous(update) && f(update)),
            None => Arc::new(f),
        };
        self.check = Some(check);
        self
    }

    /// Only runs for the bot command `/name`.
    pub fn command(self, name: impl Into<String>) -> Self {
        self.check(predicate::command(name))
    }

    /// Only runs when the message text equals `text`.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.check(predicate::text_eq(text))
    }

    /// Only runs for button presses carrying `data`.
    pub fn callback_data(self, data: impl Into<String>) -> Self {
        self.check(predicate::callback_data(data))
    }

    /// Appends a middleware to this method's chain.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// When `true`, later matching entries are skipped once this one
    /// completes.
    pub fn block(mut self, block: bool) -> Self {
        self.block = block;
        self
    }
}

// ============================================================================
// Controller
// ============================================================================

/// A shared controller instance and its routes.
pub struct Controller<C> {
    instance: Arc<C>,
    name: String,
    middlewares: Vec<BoxedMiddleware>,
    routes: Vec<Route<C>>,
}

/// Last path segment of a type name: `my_bot::EchoController` → `EchoController`.
fn short_type_name<C>() -> String {
    let full = std::any::type_name::<C>();
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

impl<C: Send + Sync + 'static> Controller<C> {
    /// Wraps a controller instance.
    pub fn new(instance: C) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    /// Uses an instance that is also shared elsewhere.
    pub fn from_arc(instance: Arc<C>) -> Self {
        Self {
            instance,
            name: short_type_name::<C>(),
            middlewares: Vec::new(),
            routes: Vec::new(),
        }
    }

    /// Overrides the name used in logs (defaults to the type name).
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a middleware run before every route of this controller.
    pub fn middleware(mut self, middleware: impl Middleware) -> Self {
        self.middlewares.push(boxed_middleware(middleware));
        self
    }

    /// Adds a route.
    pub fn route(mut self, route: Route<C>) -> Self {
        self.routes.push(route);
        self
    }

    /// Returns the shared instance.
    pub fn instance(&self) -> &Arc<C> {
        &self.instance
    }
}

/// Type-erased controller, as stored by a module.
pub(crate) trait ControllerDef: Send {
    fn name(&self) -> &str;

    /// Turns every route into an entry. `outer` middlewares run first, then
    /// the controller's, then the route's own.
    fn into_entries(
        self: Box<Self>,
        outer: &[BoxedMiddleware],
        scope: Option<&str>,
    ) -> Vec<HandlerEntry>;
}

impl<C: Send + Sync + 'static> ControllerDef for Controller<C> {
    fn name(&self) -> &str {
        &self.name
    }

    fn into_entries(
        self: Box<Self>,
        outer: &[BoxedMiddleware],
        scope: Option<&str>,
    ) -> Vec<HandlerEntry> {
        let Controller {
            instance,
            name,
            middlewares,
            routes,
        } = *self;

        routes
            .into_iter()
            .map(|route| {
                let chain = outer
                    .iter()
                    .chain(&middlewares)
                    .chain(&route.middlewares)
                    .cloned()
                    .collect();

                HandlerEntry::from_parts(EntryParts {
                    controller: name.clone(),
                    method_key: route.key,
                    kind: route.kind,
                    check: route.check,
                    middlewares: chain,
                    method: (route.bind)(Arc::clone(&instance)),
                    scope: scope.map(str::to_string),
                    block: route.block,
                })
            })
            .collect()
    }
}
