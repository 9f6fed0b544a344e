//! Line-delimited JSON bridge over stdin/stdout.
//!
//! Inbound lines:
//! - `{"id": .., "method": "getTodaySteps", "args": ..}` calls the channel
//! - `{"sensor": 1234.0}` feeds one raw counter reading
//! - `{"listen": true}` / `{"listen": false}` toggles the event stream
//!
//! Outbound lines are `{"id", "ok"}`, `{"id", "error": {code, message}}`,
//! `{"event": "today_steps", "value": n}` and the notifier's messages.

use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};

use crate::{
    channel::{ChannelError, ChannelFailure, StepSink},
    config::HostConfig,
    db::Database,
    platform::{
        host::{ChannelSensor, ConfiguredPermissions, JsonLines, JsonLinesNotifier, SensorFeed},
        SystemClock,
    },
    Platform, StepCounter,
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Inbound {
    Call {
        id: Value,
        method: String,
        #[serde(default)]
        args: Value,
    },
    Sensor {
        sensor: f64,
    },
    Listen {
        listen: bool,
    },
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Outbound {
    Ok { id: Value, ok: Value },
    Error { id: Value, error: ChannelFailure },
    Event { event: &'static str, value: u64 },
}

struct JsonLinesSink(JsonLines);

impl StepSink for JsonLinesSink {
    fn success(&self, today_steps: u64) {
        let event = Outbound::Event {
            event: "today_steps",
            value: today_steps,
        };
        if let Err(err) = self.0.emit(&event) {
            log_warn!("failed to emit step event: {err:?}");
        }
    }
}

pub struct Bridge {
    app: StepCounter,
    feed: SensorFeed,
    out: JsonLines,
}

impl Bridge {
    pub fn new(app: StepCounter, feed: SensorFeed, out: JsonLines) -> Self {
        Self { app, feed, out }
    }

    /// Service create plus boot start.
    pub async fn boot(&self) {
        if let Some(report) = self.app.tracking.on_create().await {
            log_info!("startup cleanup removed {} days", report.removed.day_totals);
        }
        match self.app.tracking.on_boot().await {
            Ok(outcome) => log_info!(
                "boot start: {outcome:?}, sampling={}",
                self.app.tracking.is_sampling().await
            ),
            Err(err) => log_error!("boot start failed: {err:?}"),
        }
    }

    pub async fn handle_line(&self, line: &str) -> Result<()> {
        let inbound: Inbound = match serde_json::from_str(line) {
            Ok(inbound) => inbound,
            Err(err) => {
                log_warn!("unreadable host line: {err}");
                let error = ChannelError::argument(format!("unreadable request: {err}"));
                return self.out.emit(&Outbound::Error {
                    id: Value::Null,
                    error: error.failure(),
                });
            }
        };

        match inbound {
            Inbound::Call { id, method, args } => {
                let reply = match self.app.channel.handle(&method, args).await {
                    Ok(ok) => Outbound::Ok { id, ok },
                    Err(err) => {
                        log_warn!("{method} failed: {err}");
                        Outbound::Error {
                            id,
                            error: err.failure(),
                        }
                    }
                };
                self.out.emit(&reply)
            }
            Inbound::Sensor { sensor } => {
                if !self.feed.push(sensor) {
                    log_debug!("sensor reading {sensor} dropped; sampling not running");
                }
                Ok(())
            }
            Inbound::Listen { listen: true } => {
                let sink = Arc::new(JsonLinesSink(self.out.clone()));
                if let Err(err) = self.app.channel.listen(sink).await {
                    self.out.emit(&Outbound::Error {
                        id: Value::Null,
                        error: err.failure(),
                    })?;
                }
                Ok(())
            }
            Inbound::Listen { listen: false } => {
                if !self.app.events.is_listening() {
                    log_debug!("listen cancelled with no active listener");
                }
                self.app.channel.cancel();
                Ok(())
            }
        }
    }

    /// Serves lines until the reader is exhausted or the output breaks, then
    /// stops sampling. The first failure is returned after shutdown.
    pub async fn serve_lines<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let served = self.read_until_closed(reader).await;
        match &served {
            Ok(()) => log_info!("input closed; shutting down"),
            Err(err) => log_error!("host bridge failed; shutting down: {err:?}"),
        }
        let stopped = self.app.tracking.shutdown().await;
        served.and(stopped)
    }

    async fn read_until_closed<R>(&self, reader: R) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.handle_line(&line).await?;
        }
        Ok(())
    }
}

pub async fn serve(db: Database, config: HostConfig) -> Result<()> {
    let out = JsonLines::stdout();
    let (sensor, feed) = ChannelSensor::new();
    let app = StepCounter::new(
        db,
        Platform {
            sensor: Arc::new(sensor),
            notifier: Arc::new(JsonLinesNotifier::new(out.clone())),
            permissions: Arc::new(ConfiguredPermissions::new(config.activity_permission)),
            clock: Arc::new(SystemClock),
        },
    );

    let bridge = Bridge::new(app, feed, out);
    bridge.boot().await;
    bridge.serve_lines(BufReader::new(tokio::io::stdin())).await
}
