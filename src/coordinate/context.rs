//! Scope stack - which coordinate is active while a template is walked.
//!
//! Same pattern as a parent-context stack: tree construction pushes the
//! coordinate of the scope it is about to build, binders read the top of the
//! stack, and the scope is popped when construction of that subtree returns.
//!
//! Deferred construction (a keyed item inserted long after its group was
//! built) captures the group's coordinate and restores it with
//! [`with_scope`] before building the item.

use std::cell::RefCell;

use super::Coordinate;

thread_local! {
    /// Coordinates of the scopes currently under construction.
    static SCOPE_STACK: RefCell<Vec<Coordinate>> = const { RefCell::new(Vec::new()) };
}

/// Pops the scope pushed by [`with_scope`] even if construction unwinds.
struct ScopeGuard;

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        SCOPE_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Coordinate of the innermost scope under construction (root if none).
pub fn current_coordinate() -> Coordinate {
    SCOPE_STACK.with(|stack| stack.borrow().last().cloned().unwrap_or_default())
}

/// Number of scopes currently pushed.
pub fn scope_depth() -> usize {
    SCOPE_STACK.with(|stack| stack.borrow().len())
}

/// Run `f` with `coordinate` as the active scope.
pub fn with_scope<R>(coordinate: Coordinate, f: impl FnOnce() -> R) -> R {
    SCOPE_STACK.with(|stack| stack.borrow_mut().push(coordinate));
    let _guard = ScopeGuard;
    f()
}

/// Run `f` inside the item `key` of the active scope.
pub fn with_key<R>(key: &str, f: impl FnOnce() -> R) -> R {
    with_scope(current_coordinate().child(key), f)
}

/// Reset the stack (for testing).
pub fn reset_scope_stack() {
    SCOPE_STACK.with(|stack| stack.borrow_mut().clear());
}
