//! Binding surface: scope evaluation and the load-more callback contract.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;

use crate::error::ConfigError;
use crate::source::BoundItems;

/// Position handed to the load-more handler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ScrollContext {
    pub top_index: usize,
    pub is_at_top: bool,
    pub is_at_bottom: bool,
}

/// Result of a load-more handler.
pub enum LoadMoreOutcome {
    /// Finished synchronously.
    Done,
    /// Loading continues; no further requests fire until the future completes.
    Deferred(Pin<Box<dyn Future<Output = ()>>>),
}

impl LoadMoreOutcome {
    pub fn deferred(future: impl Future<Output = ()> + 'static) -> Self {
        LoadMoreOutcome::Deferred(Box::pin(future))
    }
}

impl fmt::Debug for LoadMoreOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMoreOutcome::Done => f.write_str("Done"),
            LoadMoreOutcome::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

/// Function members are called as `(top_index, is_at_bottom, is_at_top)`.
pub type ContextFunction = Rc<dyn Fn(usize, bool, bool) -> LoadMoreOutcome>;
pub type ContextExpression = Rc<dyn Fn(&ScrollContext) -> LoadMoreOutcome>;

/// A named member of the binding context.
#[derive(Clone)]
pub enum ContextMember {
    Function(ContextFunction),
    Value(String),
}

/// Evaluation context the repeat is bound into.
pub trait BindingContext<T> {
    /// Evaluates the bound collection expression.
    fn evaluate_items(&self) -> BoundItems<T>;

    fn member(&self, name: &str) -> Option<ContextMember>;
}

/// The `infinite-scroll-next` attribute.
#[derive(Clone, Default)]
pub enum LoadMoreBinding {
    #[default]
    Absent,
    /// Names a function member of the binding context.
    Named(String),
    /// Bound expression evaluated with `$scrollContext`.
    Expression(ContextExpression),
}

impl fmt::Debug for LoadMoreBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadMoreBinding::Absent => f.write_str("Absent"),
            LoadMoreBinding::Named(name) => f.debug_tuple("Named").field(name).finish(),
            LoadMoreBinding::Expression(_) => f.write_str("Expression(..)"),
        }
    }
}

/// Everything `bind` receives.
pub struct BindingScope<T> {
    pub item_name: String,
    pub context: Rc<dyn BindingContext<T>>,
    pub load_more: LoadMoreBinding,
}

impl<T> BindingScope<T> {
    pub fn new(item_name: impl Into<String>, context: Rc<dyn BindingContext<T>>) -> Self {
        Self {
            item_name: item_name.into(),
            context,
            load_more: LoadMoreBinding::Absent,
        }
    }

    pub fn with_load_more(mut self, load_more: LoadMoreBinding) -> Self {
        self.load_more = load_more;
        self
    }
}

/// A callable load-more handler.
#[derive(Clone)]
pub(crate) enum LoadMoreHandler {
    Function(ContextFunction),
    Expression(ContextExpression),
}

impl LoadMoreHandler {
    pub(crate) fn invoke(&self, context: &ScrollContext) -> LoadMoreOutcome {
        match self {
            LoadMoreHandler::Function(function) => {
                function(context.top_index, context.is_at_bottom, context.is_at_top)
            }
            LoadMoreHandler::Expression(expression) => expression(context),
        }
    }
}

/// Checks that a present load-more binding is callable.
pub(crate) fn validate_load_more<T>(scope: &BindingScope<T>) -> Result<(), ConfigError> {
    match &scope.load_more {
        LoadMoreBinding::Absent | LoadMoreBinding::Expression(_) => Ok(()),
        LoadMoreBinding::Named(name) => match scope.context.member(name) {
            Some(ContextMember::Function(_)) => Ok(()),
            Some(ContextMember::Value(_)) | None => {
                Err(ConfigError::LoadMoreNotCallable { name: name.clone() })
            }
        },
    }
}

/// Looks the handler up again. Named members may have been reassigned since bind.
pub(crate) fn resolve_load_more<T>(scope: &BindingScope<T>) -> Option<LoadMoreHandler> {
    match &scope.load_more {
        LoadMoreBinding::Absent => None,
        LoadMoreBinding::Expression(expression) => {
            Some(LoadMoreHandler::Expression(Rc::clone(expression)))
        }
        LoadMoreBinding::Named(name) => match scope.context.member(name) {
            Some(ContextMember::Function(function)) => Some(LoadMoreHandler::Function(function)),
            _ => {
                log::debug!("load-more member `{name}` is no longer callable");
                None
            }
        },
    }
}
