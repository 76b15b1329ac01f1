//! Ambient customer and metadata context.
//!
//! Two scopes are supported:
//! - **Thread scope**: [`customer_context`] / [`metadata_context`] return
//!   guards that set a value for the current thread and restore the previous
//!   one on drop. Guards are `!Send`, so they cannot leak to another thread.
//! - **Task scope**: [`scope_customer`] / [`scope_metadata`] attach a value
//!   to an async task so it survives `.await` points and executor thread
//!   hops. Task scope wins over thread scope.
//!
//! ```rust,ignore
//! use cmdrdata::core::context::{customer_context, get_customer_context};
//!
//! {
//!     let _customer = customer_context("customer-789");
//!     assert_eq!(get_customer_context().as_deref(), Some("customer-789"));
//! }
//! assert_eq!(get_customer_context(), None);
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use serde_json::{Map, Value};

/// Free-form event metadata.
pub type Metadata = Map<String, Value>;

thread_local! {
    static CUSTOMER: RefCell<Option<String>> = const { RefCell::new(None) };
    static METADATA: RefCell<Metadata> = RefCell::new(Metadata::new());
}

tokio::task_local! {
    static TASK_CUSTOMER: String;
    static TASK_METADATA: Metadata;
}

// =============================================================================
// Customer Context
// =============================================================================

/// Set the current thread's customer id.
pub fn set_customer_context(customer_id: impl Into<String>) {
    let customer_id = customer_id.into();
    CUSTOMER.with(|cell| *cell.borrow_mut() = Some(customer_id));
}

/// Current customer id: task scope first, then thread scope.
#[must_use]
pub fn get_customer_context() -> Option<String> {
    TASK_CUSTOMER
        .try_with(Clone::clone)
        .ok()
        .or_else(|| CUSTOMER.with(|cell| cell.borrow().clone()))
}

/// Clear the current thread's customer id.
pub fn clear_customer_context() {
    CUSTOMER.with(|cell| *cell.borrow_mut() = None);
}

/// Guard restoring the previous thread customer id on drop.
#[must_use = "the customer context is cleared as soon as the guard is dropped"]
pub struct CustomerContextGuard {
    previous: Option<String>,
    _not_send: PhantomData<*const ()>,
}

impl Drop for CustomerContextGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        CUSTOMER.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Set the thread customer id until the returned guard is dropped.
pub fn customer_context(customer_id: impl Into<String>) -> CustomerContextGuard {
    let customer_id = customer_id.into();
    let previous = CUSTOMER.with(|cell| cell.borrow_mut().replace(customer_id));
    CustomerContextGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Run `future` with `customer_id` as its task-scoped customer.
pub async fn scope_customer<F: Future>(customer_id: impl Into<String>, future: F) -> F::Output {
    TASK_CUSTOMER.scope(customer_id.into(), future).await
}

// =============================================================================
// Metadata Context
// =============================================================================

/// Replace the current thread's metadata.
pub fn set_metadata_context(metadata: Metadata) {
    METADATA.with(|cell| *cell.borrow_mut() = metadata);
}

/// Current metadata: thread scope overlaid with task scope.
#[must_use]
pub fn get_metadata_context() -> Metadata {
    let mut metadata = METADATA.with(|cell| cell.borrow().clone());
    if let Ok(task) = TASK_METADATA.try_with(Clone::clone) {
        merge_into(&mut metadata, task);
    }
    metadata
}

/// Clear the current thread's metadata.
pub fn clear_metadata_context() {
    METADATA.with(|cell| cell.borrow_mut().clear());
}

/// Guard restoring the previous thread metadata on drop.
#[must_use = "the metadata context is cleared as soon as the guard is dropped"]
pub struct MetadataContextGuard {
    previous: Metadata,
    _not_send: PhantomData<*const ()>,
}

impl Drop for MetadataContextGuard {
    fn drop(&mut self) {
        let previous = std::mem::take(&mut self.previous);
        METADATA.with(|cell| *cell.borrow_mut() = previous);
    }
}

/// Merge `metadata` into the thread metadata until the guard is dropped.
///
/// Nested contexts stack: inner keys override outer keys while the inner
/// guard lives.
pub fn metadata_context(metadata: Metadata) -> MetadataContextGuard {
    let previous = METADATA.with(|cell| {
        let mut current = cell.borrow_mut();
        let previous = current.clone();
        merge_into(&mut current, metadata);
        previous
    });
    MetadataContextGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// Run `future` with `metadata` merged into its task-scoped metadata.
pub async fn scope_metadata<F: Future>(metadata: Metadata, future: F) -> F::Output {
    let mut scoped = TASK_METADATA.try_with(Clone::clone).unwrap_or_default();
    merge_into(&mut scoped, metadata);
    TASK_METADATA.scope(scoped, future).await
}

/// Overlay `overlay` onto `base`; keys in `overlay` win.
pub(crate) fn merge_into(base: &mut Metadata, overlay: Metadata) {
    for (key, value) in overlay {
        base.insert(key, value);
    }
}
