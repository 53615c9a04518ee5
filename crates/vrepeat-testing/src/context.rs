use std::cell::{Cell, RefCell};
use std::rc::Rc;

use vrepeat::{BindingContext, BoundItems, ContextFunction, ContextMember, LoadMoreOutcome};
use vrepeat_core::collections::map::HashMap;

/// Binding context with a settable collection value and named members.
pub struct TestBindingContext<T> {
    items: RefCell<BoundItems<T>>,
    members: RefCell<HashMap<String, ContextMember>>,
    evaluations: Cell<usize>,
}

impl<T> TestBindingContext<T> {
    pub fn new(items: BoundItems<T>) -> Rc<Self> {
        Rc::new(Self {
            items: RefCell::new(items),
            members: RefCell::new(HashMap::default()),
            evaluations: Cell::new(0),
        })
    }

    pub fn set_items(&self, items: BoundItems<T>) {
        *self.items.borrow_mut() = items;
    }

    pub fn set_member(&self, name: &str, member: ContextMember) {
        self.members.borrow_mut().insert(name.to_string(), member);
    }

    pub fn set_function(
        &self,
        name: &str,
        function: impl Fn(usize, bool, bool) -> LoadMoreOutcome + 'static,
    ) {
        let function: ContextFunction = Rc::new(function);
        self.set_member(name, ContextMember::Function(function));
    }

    /// Times the collection expression has been evaluated.
    pub fn evaluations(&self) -> usize {
        self.evaluations.get()
    }
}

impl<T> BindingContext<T> for TestBindingContext<T> {
    fn evaluate_items(&self) -> BoundItems<T> {
        self.evaluations.set(self.evaluations.get() + 1);
        self.items.borrow().clone()
    }

    fn member(&self, name: &str) -> Option<ContextMember> {
        self.members.borrow().get(name).cloned()
    }
}
