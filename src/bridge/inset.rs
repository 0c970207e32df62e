use std::sync::Arc;

use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::bridge::host::{Handle, HostBridge, OwnerId, ResourceOptions};
use crate::bridge::registry::ResourceContext;

/// An embedded web panel shown inside an owner.
///
/// Holds its own copy of options and html and proxies every change to the
/// host. It knows nothing about the registry; disposing it goes through
/// [`crate::bridge::HandleRegistry::dispose_by_handle`].
pub struct EmbeddedPanel {
    handle: Handle,
    owner: OwnerId,
    options: ResourceOptions,
    html: String,
    bridge: Arc<dyn HostBridge>,
    messages: mpsc::UnboundedReceiver<Value>,
    disposed: oneshot::Receiver<()>,
    disposed_seen: bool,
}

impl EmbeddedPanel {
    /// Factory for [`crate::bridge::HandleRegistry::create`]
    pub fn from_context(ctx: ResourceContext) -> Self {
        Self {
            handle: ctx.handle,
            owner: ctx.owner,
            options: ctx.options,
            html: String::new(),
            bridge: ctx.bridge,
            messages: ctx.messages,
            disposed: ctx.disposed,
            disposed_seen: false,
        }
    }

    pub fn handle(&self) -> Handle {
        self.handle
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    pub fn html(&self) -> &str {
        &self.html
    }

    pub fn set_options(&mut self, options: ResourceOptions) {
        match serde_json::to_value(&options) {
            Ok(value) => self.bridge.set_resource_option(self.handle, "options", value),
            Err(e) => warn!(target: "bridge", "could not encode options for {}: {}", self.handle, e),
        }
        self.options = options;
    }

    pub fn set_html(&mut self, html: impl Into<String>) {
        self.html = html.into();
        self.bridge
            .set_resource_option(self.handle, "html", Value::String(self.html.clone()));
    }

    /// Send a message to the panel's content. False if the host refused it.
    pub fn post_message(&self, payload: Value) -> bool {
        self.bridge.send_to_resource(self.handle, payload)
    }

    /// Next message from the host, if one is queued
    pub fn try_recv_message(&mut self) -> Option<Value> {
        self.messages.try_recv().ok()
    }

    /// Wait for the next message; `None` once the panel is disposed
    pub async fn recv_message(&mut self) -> Option<Value> {
        self.messages.recv().await
    }

    pub fn is_disposed(&mut self) -> bool {
        if !self.disposed_seen {
            self.disposed_seen = !matches!(
                self.disposed.try_recv(),
                Err(oneshot::error::TryRecvError::Empty)
            );
        }
        self.disposed_seen
    }

    /// Resolve when the panel is disposed
    pub async fn wait_disposed(&mut self) {
        if !self.disposed_seen {
            let _ = (&mut self.disposed).await;
            self.disposed_seen = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::HandleRegistry;
    use serde_json::json;
    use std::collections::BTreeSet;
    use std::sync::Mutex;
    use tokio::sync::watch;

    #[derive(Default)]
    struct OptionHost {
        options: Mutex<Vec<(Handle, String, Value)>>,
    }

    impl HostBridge for OptionHost {
        fn create_resource(&self, _: Handle, _: OwnerId, _: &ResourceOptions) {}
        fn set_resource_option(&self, handle: Handle, key: &str, value: Value) {
            self.options
                .lock()
                .unwrap()
                .push((handle, key.to_string(), value));
        }
        fn send_to_resource(&self, _: Handle, payload: Value) -> bool {
            payload != Value::Null
        }
        fn destroy_resource(&self, _: Handle) {}
    }

    #[test]
    fn test_panel_proxies_to_host() {
        let host = Arc::new(OptionHost::default());
        let (_tx, rx) = watch::channel(BTreeSet::from([OwnerId(3)]));
        let mut registry = HandleRegistry::new(host.clone(), rx);

        let (handle, mut panel) = registry
            .create(
                OwnerId(3),
                ResourceOptions::default(),
                EmbeddedPanel::from_context,
            )
            .unwrap();
        assert_eq!(panel.owner(), OwnerId(3));

        panel.set_html("<b>hi</b>");
        panel.set_options(ResourceOptions {
            enable_scripts: true,
            ..Default::default()
        });
        assert!(panel.options().enable_scripts);
        assert_eq!(panel.html(), "<b>hi</b>");

        let calls = host.options.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[0], (handle, "html".to_string(), json!("<b>hi</b>")));
        assert_eq!(calls[1].1, "options");
        assert_eq!(calls[1].2["enable_scripts"], json!(true));

        assert!(panel.post_message(json!({"ping": 1})));
        assert!(!panel.post_message(Value::Null));
    }

    #[test]
    fn test_panel_sees_disposal() {
        let (_tx, rx) = watch::channel(BTreeSet::from([OwnerId(1)]));
        let mut registry = HandleRegistry::new(Arc::new(OptionHost::default()), rx);
        let (handle, mut panel) = registry
            .create(OwnerId(1), ResourceOptions::default(), EmbeddedPanel::from_context)
            .unwrap();

        registry.deliver_message(handle, json!("queued"));
        assert!(!panel.is_disposed());
        registry.on_host_disposed(handle);
        assert!(panel.is_disposed());
        assert!(panel.is_disposed());
        // queued before disposal, still readable
        assert_eq!(panel.try_recv_message(), Some(json!("queued")));
        assert_eq!(panel.try_recv_message(), None);
    }

    #[tokio::test]
    async fn test_recv_ends_after_dispose() {
        let (_tx, rx) = watch::channel(BTreeSet::from([OwnerId(1)]));
        let mut registry = HandleRegistry::new(Arc::new(OptionHost::default()), rx);
        let (handle, mut panel) = registry
            .create(OwnerId(1), ResourceOptions::default(), EmbeddedPanel::from_context)
            .unwrap();

        registry.deliver_message(handle, json!(1));
        registry.dispose_by_handle(handle);

        assert_eq!(panel.recv_message().await, Some(json!(1)));
        assert_eq!(panel.recv_message().await, None);
        panel.wait_disposed().await;
        assert!(panel.is_disposed());
    }
}
