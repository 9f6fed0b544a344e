//! Capability implementations for a headless host speaking JSON lines.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use serde_json::json;
use tokio::sync::mpsc;

use super::{Notification, Notifier, Permissions, SensorSource};

/// Line-oriented output shared by every writer in the host.
#[derive(Clone)]
pub struct JsonLines {
    out: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl JsonLines {
    pub fn new(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Arc::new(Mutex::new(out)),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Box::new(std::io::stdout()))
    }

    pub fn emit<T: Serialize>(&self, message: &T) -> Result<()> {
        let line = serde_json::to_string(message)?;
        let mut guard = self
            .out
            .lock()
            .map_err(|_| anyhow!("output lock poisoned"))?;
        writeln!(guard, "{line}")?;
        guard.flush()?;
        Ok(())
    }
}

/// Sensor fed by hand (or by the stdio host) through a [`SensorFeed`].
pub struct ChannelSensor {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<f64>>>>,
    available: bool,
}

#[derive(Clone)]
pub struct SensorFeed {
    current: Arc<Mutex<Option<mpsc::UnboundedSender<f64>>>>,
}

impl ChannelSensor {
    pub fn new() -> (Self, SensorFeed) {
        let current = Arc::new(Mutex::new(None));
        (
            Self {
                current: current.clone(),
                available: true,
            },
            SensorFeed { current },
        )
    }

    /// A device without a step counter.
    pub fn unavailable() -> Self {
        Self {
            current: Arc::new(Mutex::new(None)),
            available: false,
        }
    }
}

impl SensorSource for ChannelSensor {
    fn open(&self) -> Result<mpsc::UnboundedReceiver<f64>> {
        if !self.available {
            bail!("step counter sensor not available on this device");
        }
        let (tx, rx) = mpsc::unbounded_channel();
        let mut guard = self
            .current
            .lock()
            .map_err(|_| anyhow!("sensor lock poisoned"))?;
        *guard = Some(tx);
        Ok(rx)
    }
}

impl SensorFeed {
    /// Delivers a raw reading. Returns false when nobody is listening.
    pub fn push(&self, value: f64) -> bool {
        let Ok(guard) = self.current.lock() else {
            return false;
        };
        match guard.as_ref() {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

pub struct JsonLinesNotifier {
    out: JsonLines,
}

impl JsonLinesNotifier {
    pub fn new(out: JsonLines) -> Self {
        Self { out }
    }
}

impl Notifier for JsonLinesNotifier {
    fn post(&self, notification: &Notification) -> Result<()> {
        log::info!("notification {}: {}", notification.id, notification.text);
        self.out.emit(&json!({ "notification": notification }))
    }

    fn cancel(&self, id: i32) -> Result<()> {
        self.out.emit(&json!({ "cancel_notification": id }))
    }
}

pub struct ConfiguredPermissions {
    activity_recognition: bool,
}

impl ConfiguredPermissions {
    pub fn new(activity_recognition: bool) -> Self {
        Self {
            activity_recognition,
        }
    }
}

impl Permissions for ConfiguredPermissions {
    fn activity_recognition_granted(&self) -> bool {
        self.activity_recognition
    }
}
