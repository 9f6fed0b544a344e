//! "Today's steps changed" push stream.
//!
//! At most one sink is attached. Delivery is fire-and-forget: whatever the
//! sink does with a value, the publisher never waits or buffers.

use std::sync::{Arc, Mutex};

use log::warn;

pub trait StepSink: Send + Sync {
    fn success(&self, today_steps: u64);
}

#[derive(Clone, Default)]
pub struct StepEvents {
    sink: Arc<Mutex<Option<Arc<dyn StepSink>>>>,
}

impl StepEvents {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `sink`, replacing any previous one, and hands it `current`.
    pub fn listen(&self, sink: Arc<dyn StepSink>, current: u64) {
        match self.sink.lock() {
            Ok(mut guard) => *guard = Some(sink.clone()),
            Err(poisoned) => *poisoned.into_inner() = Some(sink.clone()),
        }
        sink.success(current);
    }

    pub fn cancel(&self) {
        match self.sink.lock() {
            Ok(mut guard) => *guard = None,
            Err(poisoned) => *poisoned.into_inner() = None,
        }
    }

    pub fn is_listening(&self) -> bool {
        self.sink
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    pub fn publish(&self, today_steps: u64) {
        let sink = match self.sink.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => {
                warn!("step event sink lock poisoned; dropping update");
                return;
            }
        };

        if let Some(sink) = sink {
            sink.success(today_steps);
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    #[derive(Default)]
    pub(crate) struct CollectingSink(pub Mutex<Vec<u64>>);

    impl CollectingSink {
        pub(crate) fn values(&self) -> Vec<u64> {
            self.0.lock().unwrap().clone()
        }
    }

    impl StepSink for CollectingSink {
        fn success(&self, today_steps: u64) {
            self.0.lock().unwrap().push(today_steps);
        }
    }

    #[test]
    fn listen_delivers_current_value_first() {
        let events = StepEvents::new();
        let sink = Arc::new(CollectingSink::default());
        events.listen(sink.clone(), 42);
        events.publish(50);
        assert_eq!(sink.values(), vec![42, 50]);
    }

    #[test]
    fn new_listener_replaces_previous() {
        let events = StepEvents::new();
        let first = Arc::new(CollectingSink::default());
        let second = Arc::new(CollectingSink::default());
        events.listen(first.clone(), 1);
        events.listen(second.clone(), 1);
        events.publish(2);
        assert_eq!(first.values(), vec![1]);
        assert_eq!(second.values(), vec![1, 2]);
    }

    #[test]
    fn cancel_stops_delivery() {
        let events = StepEvents::new();
        let sink = Arc::new(CollectingSink::default());
        events.listen(sink.clone(), 0);
        events.cancel();
        events.publish(9);
        assert!(!events.is_listening());
        assert_eq!(sink.values(), vec![0]);
    }
}
