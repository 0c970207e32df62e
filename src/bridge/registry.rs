//! Handle registry: host resources keyed by handle, scoped to owners.
//!
//! Every entry is torn down exactly once, whichever side asks first: the
//! resource's user, the host, an owner going invisible, or the registry
//! itself being dropped. Teardown removes the entry before notifying
//! anyone, so a repeated or racing dispose finds nothing and does nothing.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};
use tracing::{debug, info};

use crate::bridge::host::{Handle, HostBridge, OwnerId, ResourceOptions};
use crate::error::RegistryError;

/// Everything a resource factory gets to build its resource from
pub struct ResourceContext {
    pub handle: Handle,
    pub owner: OwnerId,
    pub options: ResourceOptions,
    pub bridge: Arc<dyn HostBridge>,
    /// Messages the host sends to this resource. Closed on disposal.
    pub messages: mpsc::UnboundedReceiver<Value>,
    /// Fires once when the resource is disposed
    pub disposed: oneshot::Receiver<()>,
}

struct ResourceEntry {
    owner: OwnerId,
    sink: mpsc::UnboundedSender<Value>,
    on_dispose: oneshot::Sender<()>,
}

pub struct HandleRegistry {
    bridge: Arc<dyn HostBridge>,

    /// Subscription to the visible-owner set; released with the registry
    visibility: watch::Receiver<BTreeSet<OwnerId>>,

    entries: BTreeMap<Handle, ResourceEntry>,
    next_handle: u64,
}

impl HandleRegistry {
    pub fn new(bridge: Arc<dyn HostBridge>, visibility: watch::Receiver<BTreeSet<OwnerId>>) -> Self {
        Self {
            bridge,
            visibility,
            entries: BTreeMap::new(),
            next_handle: 0,
        }
    }

    /// Create a resource for a visible owner.
    ///
    /// The host is told about the resource before `factory` runs, and the
    /// resource is live as soon as this returns.
    pub fn create<R, F>(
        &mut self,
        owner: OwnerId,
        options: ResourceOptions,
        factory: F,
    ) -> Result<(Handle, R), RegistryError>
    where
        F: FnOnce(ResourceContext) -> R,
    {
        if !self.visibility.borrow().contains(&owner) {
            return Err(RegistryError::InvalidOwner(owner));
        }

        let handle = Handle(self.next_handle);
        self.next_handle += 1;

        self.bridge.create_resource(handle, owner, &options);

        let (sink, messages) = mpsc::unbounded_channel();
        let (on_dispose, disposed) = oneshot::channel();
        let resource = factory(ResourceContext {
            handle,
            owner,
            options,
            bridge: Arc::clone(&self.bridge),
            messages,
            disposed,
        });

        self.entries.insert(
            handle,
            ResourceEntry {
                owner,
                sink,
                on_dispose,
            },
        );
        info!(target: "bridge", "created {} for {}", handle, owner);
        Ok((handle, resource))
    }

    /// Tear down one resource. Returns false if it was already gone.
    pub fn dispose_by_handle(&mut self, handle: Handle) -> bool {
        let Some(entry) = self.entries.remove(&handle) else {
            debug!(target: "bridge", "{} already disposed", handle);
            return false;
        };

        self.bridge.destroy_resource(handle);
        // receiver may already be gone, nobody to tell then
        let _ = entry.on_dispose.send(());
        drop(entry.sink);
        info!(target: "bridge", "disposed {} of {}", handle, entry.owner);
        true
    }

    /// Host reports the resource went away on its side
    pub fn on_host_disposed(&mut self, handle: Handle) {
        self.dispose_by_handle(handle);
    }

    /// Dispose every live resource; returns how many there were
    pub fn dispose_all(&mut self) -> usize {
        let handles: Vec<Handle> = self.entries.keys().copied().collect();
        handles
            .into_iter()
            .filter(|&handle| self.dispose_by_handle(handle))
            .count()
    }

    /// Dispose every resource whose owner is not in `visible`
    pub fn sweep_by_owner_visibility(&mut self, visible: &BTreeSet<OwnerId>) -> Vec<Handle> {
        let doomed: Vec<Handle> = self
            .entries
            .iter()
            .filter(|(_, entry)| !visible.contains(&entry.owner))
            .map(|(&handle, _)| handle)
            .collect();

        for &handle in &doomed {
            self.dispose_by_handle(handle);
        }
        if !doomed.is_empty() {
            debug!(target: "bridge", "visibility sweep disposed {} resource(s)", doomed.len());
        }
        doomed
    }

    /// Sweep if the visible-owner set changed since the last sweep
    pub fn sync_visibility(&mut self) -> Vec<Handle> {
        match self.visibility.has_changed() {
            Ok(true) => {
                let visible = self.visibility.borrow_and_update().clone();
                self.sweep_by_owner_visibility(&visible)
            }
            // unchanged, or the source is gone and never changes again
            Ok(false) | Err(_) => Vec::new(),
        }
    }

    /// Wait for the next visibility change and sweep. `None` once the
    /// visibility source has shut down.
    pub async fn visibility_changed(&mut self) -> Option<Vec<Handle>> {
        self.visibility.changed().await.ok()?;
        let visible = self.visibility.borrow_and_update().clone();
        Some(self.sweep_by_owner_visibility(&visible))
    }

    /// Forward a host message to a live resource. Messages for disposed
    /// handles are dropped.
    pub fn deliver_message(&self, handle: Handle, message: Value) -> bool {
        match self.entries.get(&handle) {
            Some(entry) => entry.sink.send(message).is_ok(),
            None => {
                debug!(target: "bridge", "dropping message for disposed {}", handle);
                false
            }
        }
    }

    pub fn is_live(&self, handle: Handle) -> bool {
        self.entries.contains_key(&handle)
    }

    pub fn owner_of(&self, handle: Handle) -> Option<OwnerId> {
        self.entries.get(&handle).map(|entry| entry.owner)
    }

    pub fn live_handles(&self) -> Vec<Handle> {
        self.entries.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Drop for HandleRegistry {
    fn drop(&mut self) {
        let disposed = self.dispose_all();
        if disposed > 0 {
            debug!(target: "bridge", "registry dropped with {} live resource(s)", disposed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct NullHost {
        destroyed: Mutex<Vec<Handle>>,
    }

    impl HostBridge for NullHost {
        fn create_resource(&self, _: Handle, _: OwnerId, _: &ResourceOptions) {}
        fn set_resource_option(&self, _: Handle, _: &str, _: Value) {}
        fn send_to_resource(&self, _: Handle, _: Value) -> bool {
            true
        }
        fn destroy_resource(&self, handle: Handle) {
            self.destroyed.lock().unwrap().push(handle);
        }
    }

    fn owners(ids: &[u64]) -> BTreeSet<OwnerId> {
        ids.iter().copied().map(OwnerId).collect()
    }

    #[test]
    fn test_handles_increase_and_are_not_reused() {
        let (_tx, rx) = watch::channel(owners(&[1]));
        let mut registry = HandleRegistry::new(Arc::new(NullHost::default()), rx);

        let (a, _) = registry.create(OwnerId(1), ResourceOptions::default(), |_| ()).unwrap();
        registry.dispose_by_handle(a);
        let (b, _) = registry.create(OwnerId(1), ResourceOptions::default(), |_| ()).unwrap();
        assert_eq!(a, Handle(0));
        assert_eq!(b, Handle(1));
    }

    #[test]
    fn test_invisible_owner_rejected() {
        let (_tx, rx) = watch::channel(owners(&[1]));
        let mut registry = HandleRegistry::new(Arc::new(NullHost::default()), rx);
        let err = registry
            .create(OwnerId(7), ResourceOptions::default(), |_| ())
            .unwrap_err();
        assert_eq!(err, RegistryError::InvalidOwner(OwnerId(7)));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dispose_closes_sink_and_fires_once() {
        let host = Arc::new(NullHost::default());
        let (_tx, rx) = watch::channel(owners(&[1]));
        let mut registry = HandleRegistry::new(host.clone(), rx);

        let (handle, mut ctx) = registry
            .create(OwnerId(1), ResourceOptions::default(), |ctx| ctx)
            .unwrap();
        assert!(registry.deliver_message(handle, json!({"n": 1})));
        assert_eq!(ctx.messages.try_recv().unwrap(), json!({"n": 1}));

        assert!(registry.dispose_by_handle(handle));
        assert!(!registry.dispose_by_handle(handle));
        assert_eq!(ctx.disposed.try_recv(), Ok(()));
        assert_eq!(
            ctx.messages.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        );
        assert!(!registry.deliver_message(handle, json!("late")));
        assert_eq!(*host.destroyed.lock().unwrap(), vec![handle]);
    }

    #[test]
    fn test_drop_disposes_everything() {
        let host = Arc::new(NullHost::default());
        let (_tx, rx) = watch::channel(owners(&[1, 2]));
        {
            let mut registry = HandleRegistry::new(host.clone(), rx);
            registry.create(OwnerId(1), ResourceOptions::default(), |_| ()).unwrap();
            registry.create(OwnerId(2), ResourceOptions::default(), |_| ()).unwrap();
        }
        assert_eq!(host.destroyed.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_sync_visibility_only_sweeps_on_change() {
        let (tx, rx) = watch::channel(owners(&[1, 2]));
        let mut registry = HandleRegistry::new(Arc::new(NullHost::default()), rx);
        registry.create(OwnerId(1), ResourceOptions::default(), |_| ()).unwrap();
        let (h2, _) = registry.create(OwnerId(2), ResourceOptions::default(), |_| ()).unwrap();

        assert!(registry.sync_visibility().is_empty());
        tx.send(owners(&[1])).unwrap();
        assert_eq!(registry.sync_visibility(), vec![h2]);
        assert!(registry.sync_visibility().is_empty());

        drop(tx);
        assert!(registry.sync_visibility().is_empty());
        assert_eq!(registry.len(), 1);
    }
}
