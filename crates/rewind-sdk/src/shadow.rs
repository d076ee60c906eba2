//! Shadow root controller.
//!
//! Tree change notifications do not cross shadow boundaries, so every
//! shadow root met during serialization gets its own observation scope.
//! Once removed, a root's scope is gone and anything routed to it later
//! is dropped.

use crate::config::RecorderConfig;
use crate::scope::{ScopeTrackers, TimerKey};
use rewind_core::dom::{Dom, NodeKey, RawMutation};
use rewind_core::scheduler::Scheduler;
use tracing::debug;

#[derive(Debug)]
pub struct ShadowRootController {
    config: RecorderConfig,
    /// Registration order.
    scopes: Vec<ScopeTrackers>,
}

impl ShadowRootController {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config,
            scopes: Vec::new(),
        }
    }

    /// Start observing `root`. Returns `false` when it is already observed.
    pub fn add_shadow_root(&mut self, root: NodeKey) -> bool {
        if self.contains(root) {
            return false;
        }
        debug!(?root, "observing shadow root");
        self.scopes.push(ScopeTrackers::new(root, &self.config));
        true
    }

    /// Stop observing `root`, cancelling its timers and dropping anything
    /// pending.
    pub fn remove_shadow_root(&mut self, root: NodeKey, scheduler: &mut Scheduler<TimerKey>) -> bool {
        let Some(position) = self.scopes.iter().position(|s| s.root == root) else {
            return false;
        };
        let mut scope = self.scopes.remove(position);
        scope.stop(scheduler);
        debug!(?root, "stopped observing shadow root");
        true
    }

    pub fn contains(&self, root: NodeKey) -> bool {
        self.scopes.iter().any(|s| s.root == root)
    }

    pub fn get_mut(&mut self, root: NodeKey) -> Option<&mut ScopeTrackers> {
        self.scopes.iter_mut().find(|s| s.root == root)
    }

    pub fn roots(&self) -> Vec<NodeKey> {
        self.scopes.iter().map(|s| s.root).collect()
    }

    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Drain the pending mutations of every scope.
    pub fn flush(&mut self, scheduler: &mut Scheduler<TimerKey>) -> Vec<(NodeKey, Vec<RawMutation>)> {
        self.scopes
            .iter_mut()
            .map(|s| (s.root, s.take_batch(scheduler)))
            .filter(|(_, batch)| !batch.is_empty())
            .collect()
    }

    /// Remove scopes whose root no longer exists in `dom`.
    pub fn prune(&mut self, dom: &Dom, scheduler: &mut Scheduler<TimerKey>) -> Vec<NodeKey> {
        let stale: Vec<NodeKey> = self
            .scopes
            .iter()
            .map(|s| s.root)
            .filter(|root| !dom.is_shadow_root(*root))
            .collect();
        for root in &stale {
            self.remove_shadow_root(*root, scheduler);
        }
        stale
    }

    pub fn stop(&mut self, scheduler: &mut Scheduler<TimerKey>) {
        for mut scope in self.scopes.drain(..) {
            scope.stop(scheduler);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scope::ScopeId;

    fn shadow_dom() -> (Dom, NodeKey, NodeKey) {
        let mut dom = Dom::new("https://example.com/");
        let host = dom.create_element("div");
        dom.append_child(dom.document(), host).unwrap();
        let root = dom.attach_shadow(host).unwrap();
        (dom, host, root)
    }

    #[test]
    fn test_add_is_idempotent() {
        let (_, _, root) = shadow_dom();
        let mut controller = ShadowRootController::new(RecorderConfig::default());

        assert!(controller.add_shadow_root(root));
        assert!(!controller.add_shadow_root(root));
        assert_eq!(controller.len(), 1);
    }

    #[test]
    fn test_remove_cancels_timers() {
        let (mut dom, _, root) = shadow_dom();
        let mut controller = ShadowRootController::new(RecorderConfig::default());
        let mut scheduler = Scheduler::new(0);
        controller.add_shadow_root(root);

        let span = dom.create_element("span");
        dom.append_child(root, span).unwrap();
        controller
            .get_mut(root)
            .unwrap()
            .observe(ScopeId::Shadow(root), dom.take_mutations(), &mut scheduler);
        assert_eq!(scheduler.len(), 2);

        assert!(controller.remove_shadow_root(root, &mut scheduler));
        assert!(scheduler.is_empty());
        assert!(!controller.contains(root));
        assert!(!controller.remove_shadow_root(root, &mut scheduler));
    }

    #[test]
    fn test_flush_drains_every_scope() {
        let (mut dom, _, root) = shadow_dom();
        let mut controller = ShadowRootController::new(RecorderConfig::default());
        let mut scheduler = Scheduler::new(0);
        controller.add_shadow_root(root);

        let span = dom.create_element("span");
        dom.append_child(root, span).unwrap();
        controller
            .get_mut(root)
            .unwrap()
            .observe(ScopeId::Shadow(root), dom.take_mutations(), &mut scheduler);

        let batches = controller.flush(&mut scheduler);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, root);
        assert!(scheduler.is_empty());
        assert!(controller.flush(&mut scheduler).is_empty());
    }
}
