//! Reconciliation engine: diff virtual trees and land the patches on a host
//! tree through one batched update per patch.
//!
//! A [`Reconciler`] owns its scheduler, its result cache and a shared handle
//! to the host. Patches are applied on the scheduler's next flush; call
//! [`Reconciler::flush_sync`] when mutations must be visible right away.
//!
//! `render` diffs when its update runs, against the tree that last landed in
//! the container, so dropped or failed updates never leave the recorded tree
//! ahead of the host. A render whose patch fails marks the container stale;
//! the next render clears the container's root and rebuilds it.

mod config;
mod patcher;

pub use crate::config::{ConfigError, ReconcilerConfig};
pub use crate::patcher::{PatchError, apply_patch, describe, materialize};

use core_types::HostId;
use host::HostTree;
use scheduler::{FlushStats, ScheduleFlush, Update, UpdateError, UpdateScheduler};
use std::cell::{Ref, RefCell};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use vdom::{Dependency, Event, MemoCache, Patch, VNode};

/// What the host holds at child 0 of a container.
enum Mounted {
    Tree(VNode),
    /// A patch failed part way; the host content is unknown.
    Stale,
}

type MountTable = Rc<RefCell<HashMap<HostId, Mounted>>>;

pub struct Reconciler<H: HostTree + 'static> {
    host: Rc<RefCell<H>>,
    scheduler: UpdateScheduler,
    cache: MemoCache,
    config: ReconcilerConfig,
    mounted: MountTable,
}

impl<H: HostTree + 'static> Reconciler<H> {
    pub fn new(host: H, runtime: Rc<dyn ScheduleFlush>, config: ReconcilerConfig) -> Self {
        Self {
            host: Rc::new(RefCell::new(host)),
            scheduler: UpdateScheduler::new(runtime),
            cache: config.build_cache(),
            config,
            mounted: Rc::default(),
        }
    }

    pub fn host(&self) -> Ref<'_, H> {
        self.host.borrow()
    }

    /// Shared handle for callers that mutate the host outside of patches.
    pub fn host_handle(&self) -> Rc<RefCell<H>> {
        Rc::clone(&self.host)
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.scheduler
    }

    pub fn cache(&self) -> &MemoCache {
        &self.cache
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn diff(&self, old: Option<&VNode>, new: Option<&VNode>) -> Option<Patch> {
        vdom::diff(old, new)
    }

    /// Queue `patch` for the child of `parent` at `index`.
    ///
    /// The whole patch tree lands in a single scheduled update.
    pub fn patch(&self, parent: HostId, patch: Patch, index: usize) {
        log::debug!(
            target: "reconciler.patch",
            "queue {} under {} at {index} ({} ops)",
            patch.kind_name(),
            parent.0,
            patch.op_count()
        );
        let host = Rc::clone(&self.host);
        self.scheduler.enqueue(Update::new(move || {
            let mut host = host
                .try_borrow_mut()
                .map_err(|_| UpdateError::failed(PatchError::HostBusy))?;
            apply_patch(&mut *host, parent, &patch, index).map_err(UpdateError::failed)
        }));
    }

    /// Queue a render of `node` into `container`. The rendered root lives at
    /// child index 0.
    ///
    /// The diff is taken when the update runs, against whatever last landed
    /// there, so several renders queued before one flush apply in order.
    pub fn render(&self, container: HostId, node: VNode) {
        log::trace!(target: "reconciler.patch", "queue render into {}", container.0);
        self.queue_landing(container, Some(node));
    }

    /// Queue removal of the tree rendered into `container`, if any.
    pub fn unmount(&self, container: HostId) {
        self.queue_landing(container, None);
    }

    fn queue_landing(&self, container: HostId, next: Option<VNode>) {
        let host = Rc::clone(&self.host);
        let mounted = Rc::clone(&self.mounted);
        self.scheduler.enqueue(Update::new(move || {
            let mut host = host
                .try_borrow_mut()
                .map_err(|_| UpdateError::failed(PatchError::HostBusy))?;
            land(&mut *host, &mounted, container, next.as_ref()).map_err(UpdateError::failed)
        }));
    }

    /// The last tree that landed in `container`.
    pub fn rendered(&self, container: HostId) -> Option<VNode> {
        match self.mounted.borrow().get(&container) {
            Some(Mounted::Tree(node)) => Some(node.clone()),
            Some(Mounted::Stale) | None => None,
        }
    }

    /// `true` when a failed render left `container` awaiting a rebuild.
    pub fn is_stale(&self, container: HostId) -> bool {
        matches!(self.mounted.borrow().get(&container), Some(Mounted::Stale))
    }

    pub fn flush_sync(&self) -> FlushStats {
        self.scheduler.flush_sync()
    }

    pub fn set_error_hook(&self, hook: impl Fn(&UpdateError) + 'static) {
        self.scheduler.set_error_hook(hook);
    }

    pub fn memoize(&mut self, key: &str, node: &VNode, dependencies: &[Dependency]) -> Rc<VNode> {
        self.cache.memoize(key, node, dependencies)
    }

    pub fn memoize_with(
        &mut self,
        key: &str,
        dependencies: &[Dependency],
        build: impl FnOnce() -> VNode,
    ) -> Rc<VNode> {
        self.cache.memoize_with(key, dependencies, build)
    }

    /// Materialize `node` immediately, outside the scheduler.
    pub fn materialize(&self, node: &VNode) -> Result<HostId, PatchError> {
        let mut host = self.host.try_borrow_mut().map_err(|_| PatchError::HostBusy)?;
        materialize(&mut *host, node)
    }

    /// Deliver `event` to the listeners bound on `target`. Returns how many
    /// handlers ran.
    pub fn dispatch(&self, target: HostId, event: &str) -> usize {
        let handlers = self.host.borrow().listeners(target, event);
        let payload = Event {
            name: event.into(),
            target,
        };
        for handler in &handlers {
            handler.call(&payload);
        }
        handlers.len()
    }
}

/// Bring child 0 of `container` from its recorded tree to `next`.
fn land<H: HostTree + ?Sized>(
    host: &mut H,
    mounted: &MountTable,
    container: HostId,
    next: Option<&VNode>,
) -> Result<(), PatchError> {
    let previous = mounted.borrow_mut().remove(&container);
    let base = match previous {
        Some(Mounted::Tree(node)) => Some(node),
        Some(Mounted::Stale) => {
            if let Some(root) = host.child_at(container, 0) {
                if let Err(err) = host.remove_child(container, root) {
                    mounted.borrow_mut().insert(container, Mounted::Stale);
                    return Err(err.into());
                }
            }
            log::debug!(target: "reconciler.patch", "rebuilding stale container {}", container.0);
            None
        }
        None => None,
    };
    let result = match vdom::diff(base.as_ref(), next) {
        Some(patch) if !patch.is_noop() => {
            log::debug!(
                target: "reconciler.patch",
                "render {} into {} ({} ops)",
                patch.kind_name(),
                container.0,
                patch.op_count()
            );
            apply_patch(host, container, &patch, 0)
        }
        _ => Ok(()),
    };
    match (result, next) {
        (Ok(()), Some(node)) => {
            mounted.borrow_mut().insert(container, Mounted::Tree(node.clone()));
            Ok(())
        }
        (Ok(()), None) => Ok(()),
        (Err(err), _) => {
            // A failed create leaves nothing behind; anything else may have
            // touched the mounted root.
            if base.is_some() {
                mounted.borrow_mut().insert(container, Mounted::Stale);
            }
            Err(err)
        }
    }
}

impl<H: HostTree + 'static> fmt::Debug for Reconciler<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("scheduler", &self.scheduler)
            .field("cached", &self.cache.len())
            .field("containers", &self.mounted.borrow().len())
            .finish()
    }
}
