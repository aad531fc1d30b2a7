//! Watch adapter - cluster API to router callbacks
//!
//! Bridges the control plane's event watch to the router's
//! add/update/delete contract. A local uid map stands in for the watch
//! cache so an `Apply` can be classified as creation or update, and a
//! `Delete` can report the last known object.
//!
//! The watcher re-establishes itself with backoff on transient API
//! errors; only client construction is fatal.

use std::collections::HashMap;
use std::sync::Arc;

use futures_util::StreamExt;
use k8s_openapi::api::core::v1::Event as CoreEvent;
use kube::{
    Api, Client,
    runtime::{WatchStreamExt, watcher},
};
use tokio_util::sync::CancellationToken;

use eventcast_events::{ClusterEvent, EventKind, EventSource, ObjectRef, WatchObject};
use eventcast_router::EventRouter;

/// Watches cluster events and drives the router
pub struct WatchSource {
    api: Api<CoreEvent>,
    router: EventRouter,
    /// uid -> last observed snapshot; stands in for the watch cache
    seen: HashMap<String, Arc<ClusterEvent>>,
}

impl WatchSource {
    /// Watch one namespace, or all namespaces when `namespace` is `None`
    pub fn new(client: Client, namespace: Option<&str>, router: EventRouter) -> Self {
        let api = match namespace {
            Some(ns) => Api::namespaced(client, ns),
            None => Api::all(client),
        };
        Self {
            api,
            router,
            seen: HashMap::new(),
        }
    }

    /// Run until the token is cancelled
    pub async fn run(mut self, cancel: CancellationToken) {
        tracing::info!("watch source starting");

        let stream = watcher(self.api.clone(), watcher::Config::default()).default_backoff();
        let mut stream = std::pin::pin!(stream);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                item = stream.next() => match item {
                    Some(Ok(notification)) => self.dispatch(notification),
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "watch stream error, re-establishing");
                    }
                    None => {
                        tracing::warn!("watch stream ended");
                        break;
                    }
                },
            }
        }

        let snapshot = self.router.metrics().snapshot();
        tracing::info!(
            added = snapshot.added,
            updated = snapshot.updated,
            deletes_ignored = snapshot.deletes_ignored,
            malformed = snapshot.malformed,
            "watch source shutting down"
        );
    }

    fn dispatch(&mut self, notification: watcher::Event<CoreEvent>) {
        use watcher::Event as W;

        match notification {
            W::Init => tracing::debug!("watch (re)list starting"),
            W::InitDone => tracing::debug!("watch (re)list complete"),
            W::InitApply(obj) | W::Apply(obj) => self.apply(obj),
            W::Delete(obj) => self.delete(obj),
        }
    }

    fn apply(&mut self, obj: CoreEvent) {
        let event = Arc::new(convert(&obj));

        let Some(uid) = obj.metadata.uid else {
            // No uid means no update tracking; still worth shipping
            self.router.on_add(WatchObject::Event(event));
            return;
        };

        match self.seen.insert(uid, Arc::clone(&event)) {
            Some(previous) => self.router.on_update(
                WatchObject::Event(previous),
                WatchObject::Event(event),
            ),
            None => self.router.on_add(WatchObject::Event(event)),
        }
    }

    fn delete(&mut self, obj: CoreEvent) {
        let last_known = obj
            .metadata
            .uid
            .as_ref()
            .and_then(|uid| self.seen.remove(uid));

        match last_known {
            Some(event) => self.router.on_delete(WatchObject::Tombstone {
                last_known: Some(event),
            }),
            None => self
                .router
                .on_delete(WatchObject::Event(Arc::new(convert(&obj)))),
        }
    }
}

/// Total conversion from the control plane's event shape; missing
/// fields stay unset rather than failing
fn convert(event: &CoreEvent) -> ClusterEvent {
    ClusterEvent {
        namespace: event.metadata.namespace.clone(),
        name: event.metadata.name.clone(),
        uid: event.metadata.uid.clone(),
        reason: event.reason.clone(),
        message: event.message.clone(),
        kind: event
            .type_
            .as_deref()
            .map(EventKind::from_type_str)
            .unwrap_or_default(),
        source: event
            .source
            .as_ref()
            .map(|s| EventSource {
                component: s.component.clone(),
                host: s.host.clone(),
            })
            .unwrap_or_default(),
        involved: ObjectRef {
            api_version: event.involved_object.api_version.clone(),
            kind: event.involved_object.kind.clone(),
            namespace: event.involved_object.namespace.clone(),
            name: event.involved_object.name.clone(),
            uid: event.involved_object.uid.clone(),
        },
        count: event.count.unwrap_or(0),
        first_timestamp: event.first_timestamp.as_ref().map(|t| t.0),
        last_timestamp: event.last_timestamp.as_ref().map(|t| t.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::{EventSource as CoreEventSource, ObjectReference};
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};

    fn core_event() -> CoreEvent {
        CoreEvent {
            metadata: ObjectMeta {
                name: Some("pod-x.17abc".into()),
                namespace: Some("default".into()),
                uid: Some("uid-1".into()),
                ..Default::default()
            },
            involved_object: ObjectReference {
                api_version: Some("v1".into()),
                kind: Some("Pod".into()),
                name: Some("pod-x".into()),
                namespace: Some("default".into()),
                uid: Some("uid-pod".into()),
                ..Default::default()
            },
            reason: Some("BackOff".into()),
            message: Some("Back-off restarting failed container".into()),
            type_: Some("Warning".into()),
            count: Some(3),
            source: Some(CoreEventSource {
                component: Some("kubelet".into()),
                host: Some("node-1".into()),
            }),
            first_timestamp: Some(Time(
                chrono::DateTime::from_timestamp(100, 0).expect("valid timestamp"),
            )),
            last_timestamp: Some(Time(
                chrono::DateTime::from_timestamp(200, 0).expect("valid timestamp"),
            )),
            ..Default::default()
        }
    }

    #[test]
    fn test_convert_full_event() {
        let converted = convert(&core_event());

        assert_eq!(converted.uid.as_deref(), Some("uid-1"));
        assert_eq!(converted.reason.as_deref(), Some("BackOff"));
        assert_eq!(converted.kind, EventKind::Warning);
        assert_eq!(converted.count, 3);
        assert_eq!(converted.involved.name.as_deref(), Some("pod-x"));
        assert_eq!(converted.source.component.as_deref(), Some("kubelet"));
        assert_eq!(converted.last_seen_millis(), Some(200_000));
        assert_eq!(converted.display_name(), "default/pod-x");
    }

    #[test]
    fn test_convert_sparse_event() {
        let converted = convert(&CoreEvent::default());

        assert_eq!(converted.kind, EventKind::Normal);
        assert_eq!(converted.count, 0);
        assert!(converted.uid.is_none());
        assert!(converted.last_seen_millis().is_none());
    }

    #[test]
    fn test_convert_unrecognized_type_string() {
        let mut event = core_event();
        event.type_ = Some("Flaky".into());
        assert_eq!(convert(&event).kind, EventKind::Other);
    }
}
