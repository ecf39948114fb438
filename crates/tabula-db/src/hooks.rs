//! Lifecycle hooks for record operations.
//!
//! A [`ModelHooks`] value holds at most one handler per lifecycle event.
//! Handlers run synchronously inside the operation, strictly before the next
//! pipeline stage. A `before_*` handler may mutate the data, filter or builder
//! it receives; an error from any handler aborts the operation immediately.
//!
//! ```
//! use tabula_db::hooks::ModelHooks;
//! use tabula_db::value::Value;
//!
//! let hooks = ModelHooks::new().before_create(|data| {
//!     if data.is_unset("status") {
//!         data.set("status", "draft");
//!     }
//!     Ok(())
//! });
//! assert!(hooks.has_before_create());
//! ```

use std::fmt;
use std::sync::Arc;

use tabula_core::TabulaResult;

use crate::query::{Filter, QueryBuilder};
use crate::record::Record;

/// Handler for `before_create`: may rewrite the payload.
pub type BeforeCreateHook = Arc<dyn Fn(&mut Record) -> TabulaResult<()> + Send + Sync>;
/// Handler for `after_create` and `after_update`: sees the stored record.
pub type AfterRecordHook = Arc<dyn Fn(&Record) -> TabulaResult<()> + Send + Sync>;
/// Handler for `before_update`: may rewrite the payload and the filter.
pub type BeforeUpdateHook = Arc<dyn Fn(&mut Record, &mut Filter) -> TabulaResult<()> + Send + Sync>;
/// Handler for `before_delete`: may rewrite the filter.
pub type BeforeDeleteHook = Arc<dyn Fn(&mut Filter) -> TabulaResult<()> + Send + Sync>;
/// Handler for `after_delete`: receives the number of deleted rows.
pub type AfterDeleteHook = Arc<dyn Fn(u64) -> TabulaResult<()> + Send + Sync>;
/// Handler for `before_find`: may rewrite the query.
pub type BeforeFindHook = Arc<dyn Fn(&mut QueryBuilder) -> TabulaResult<()> + Send + Sync>;
/// Handler for `after_find`: may rewrite the fetched records.
pub type AfterFindHook = Arc<dyn Fn(&mut Vec<Record>) -> TabulaResult<()> + Send + Sync>;

/// The hook registry of one model.
#[derive(Clone, Default)]
pub struct ModelHooks {
    before_create: Option<BeforeCreateHook>,
    after_create: Option<AfterRecordHook>,
    before_update: Option<BeforeUpdateHook>,
    after_update: Option<AfterRecordHook>,
    before_delete: Option<BeforeDeleteHook>,
    after_delete: Option<AfterDeleteHook>,
    before_find: Option<BeforeFindHook>,
    after_find: Option<AfterFindHook>,
}

impl ModelHooks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the `before_create` handler, replacing any previous one.
    #[must_use]
    pub fn before_create(
        mut self,
        hook: impl Fn(&mut Record) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.before_create = Some(Arc::new(hook));
        self
    }

    /// Registers the `after_create` handler.
    #[must_use]
    pub fn after_create(
        mut self,
        hook: impl Fn(&Record) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_create = Some(Arc::new(hook));
        self
    }

    /// Registers the `before_update` handler.
    #[must_use]
    pub fn before_update(
        mut self,
        hook: impl Fn(&mut Record, &mut Filter) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.before_update = Some(Arc::new(hook));
        self
    }

    /// Registers the `after_update` handler. It fires on the by-id path only.
    #[must_use]
    pub fn after_update(
        mut self,
        hook: impl Fn(&Record) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_update = Some(Arc::new(hook));
        self
    }

    /// Registers the `before_delete` handler.
    #[must_use]
    pub fn before_delete(
        mut self,
        hook: impl Fn(&mut Filter) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.before_delete = Some(Arc::new(hook));
        self
    }

    /// Registers the `after_delete` handler.
    #[must_use]
    pub fn after_delete(mut self, hook: impl Fn(u64) -> TabulaResult<()> + Send + Sync + 'static) -> Self {
        self.after_delete = Some(Arc::new(hook));
        self
    }

    /// Registers the `before_find` handler.
    #[must_use]
    pub fn before_find(
        mut self,
        hook: impl Fn(&mut QueryBuilder) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.before_find = Some(Arc::new(hook));
        self
    }

    /// Registers the `after_find` handler.
    #[must_use]
    pub fn after_find(
        mut self,
        hook: impl Fn(&mut Vec<Record>) -> TabulaResult<()> + Send + Sync + 'static,
    ) -> Self {
        self.after_find = Some(Arc::new(hook));
        self
    }

    /// Returns `true` if a `before_create` handler is registered.
    pub const fn has_before_create(&self) -> bool {
        self.before_create.is_some()
    }

    // ── Dispatch ────────────────────────────────────────────────────────

    pub(crate) fn run_before_create(&self, data: &mut Record) -> TabulaResult<()> {
        self.before_create.as_ref().map_or(Ok(()), |hook| hook(data))
    }

    pub(crate) fn run_after_create(&self, record: &Record) -> TabulaResult<()> {
        self.after_create.as_ref().map_or(Ok(()), |hook| hook(record))
    }

    pub(crate) fn run_before_update(&self, data: &mut Record, filter: &mut Filter) -> TabulaResult<()> {
        self.before_update
            .as_ref()
            .map_or(Ok(()), |hook| hook(data, filter))
    }

    pub(crate) fn run_after_update(&self, record: &Record) -> TabulaResult<()> {
        self.after_update.as_ref().map_or(Ok(()), |hook| hook(record))
    }

    pub(crate) fn run_before_delete(&self, filter: &mut Filter) -> TabulaResult<()> {
        self.before_delete.as_ref().map_or(Ok(()), |hook| hook(filter))
    }

    pub(crate) fn run_after_delete(&self, count: u64) -> TabulaResult<()> {
        self.after_delete.as_ref().map_or(Ok(()), |hook| hook(count))
    }

    pub(crate) fn run_before_find(&self, query: &mut QueryBuilder) -> TabulaResult<()> {
        self.before_find.as_ref().map_or(Ok(()), |hook| hook(query))
    }

    pub(crate) fn run_after_find(&self, records: &mut Vec<Record>) -> TabulaResult<()> {
        self.after_find.as_ref().map_or(Ok(()), |hook| hook(records))
    }
}

impl fmt::Debug for ModelHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = [
            ("before_create", self.before_create.is_some()),
            ("after_create", self.after_create.is_some()),
            ("before_update", self.before_update.is_some()),
            ("after_update", self.after_update.is_some()),
            ("before_delete", self.before_delete.is_some()),
            ("after_delete", self.after_delete.is_some()),
            ("before_find", self.before_find.is_some()),
            ("after_find", self.after_find.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect();
        f.debug_struct("ModelHooks")
            .field("registered", &registered)
            .finish()
    }
}
