//! Listener registry and per-method event lanes.
//!
//! Registration and clearing take the write lock. Dispatch takes the read lock
//! only long enough to clone the listener list, and that snapshot travels with
//! the event to its lane. A listener added after a frame was read never sees
//! it; clearing does not recall events already queued. Callbacks run with no
//! lock held, so a callback may register listeners or send commands.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tabwire_protocol::Event;
use tokio::sync::mpsc;
use tracing::{trace, warn};

type Listener = Arc<dyn Fn(u64, Value) + Send + Sync>;

struct Delivery {
    sequence: u64,
    params: Value,
    listeners: Vec<Listener>,
}

/// Listeners keyed by event method.
#[derive(Default)]
pub(crate) struct ListenerRegistry {
    listeners: RwLock<HashMap<String, Vec<Listener>>>,
    /// One delivery task per method; keeps per-method order.
    lanes: Mutex<HashMap<String, mpsc::UnboundedSender<Delivery>>>,
}

impl ListenerRegistry {
    pub fn add<T, F>(&self, event: &Event<T>, callback: F)
    where
        T: 'static,
        F: Fn(u64, T) + Send + Sync + 'static,
    {
        let method = event.method().to_string();
        let decode = event.decoder();
        let name = method.clone();
        let listener: Listener = Arc::new(move |sequence, params| match decode(params) {
            Ok(payload) => callback(sequence, payload),
            Err(e) => warn!("Dropping {} event #{}: {}", name, sequence, e),
        });

        self.listeners.write().entry(method).or_default().push(listener);
    }

    pub fn clear(&self) {
        self.listeners.write().clear();
    }

    pub fn count(&self, method: &str) -> usize {
        self.listeners.read().get(method).map_or(0, Vec::len)
    }

    fn snapshot(&self, method: &str) -> Vec<Listener> {
        self.listeners.read().get(method).cloned().unwrap_or_default()
    }

    /// Queue one event for delivery on its method's lane.
    pub fn dispatch(&self, method: &str, sequence: u64, params: Value) {
        let listeners = self.snapshot(method);
        if listeners.is_empty() {
            trace!("No listeners for {} event #{}", method, sequence);
            return;
        }

        let mut delivery = Delivery {
            sequence,
            params,
            listeners,
        };
        let mut lanes = self.lanes.lock();
        if let Some(lane) = lanes.get(method) {
            match lane.send(delivery) {
                Ok(()) => return,
                Err(mpsc::error::SendError(undelivered)) => {
                    warn!("Event lane for {} stopped, restarting", method);
                    delivery = undelivered;
                }
            }
        }

        let lane = Self::spawn_lane(method.to_string());
        // a freshly spawned lane holds its receiver
        let _ = lane.send(delivery);
        lanes.insert(method.to_string(), lane);
    }

    fn spawn_lane(method: String) -> mpsc::UnboundedSender<Delivery> {
        let (tx, mut rx) = mpsc::unbounded_channel::<Delivery>();
        tokio::spawn(async move {
            while let Some(delivery) = rx.recv().await {
                trace!(
                    "Delivering {} event #{} to {} listener(s)",
                    method,
                    delivery.sequence,
                    delivery.listeners.len()
                );
                for listener in delivery.listeners {
                    listener(delivery.sequence, delivery.params.clone());
                }
            }
        });
        tx
    }

    /// Stop every lane. Queued deliveries still drain.
    pub fn stop_lanes(&self) {
        self.lanes.lock().clear();
    }
}
