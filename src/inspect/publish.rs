//! Publishing decoded frames
//!
//! The proxy hands every decoded record and status frame to a
//! [`Publisher`]. Brokers and home-automation clients live outside the
//! crate; [`LogPublisher`] renders the messages such a client would send
//! and writes them to the log.

use chrono::Utc;
use log::{debug, info};
use serde_json::{Map, Value};

use crate::protocol::{StatusFrame, TelemetryRecord};

/// Default topic prefix
pub const DEFAULT_BASE_TOPIC: &str = "enverproxy";

/// Sink for decoded frames
#[cfg_attr(test, mockall::automock)]
pub trait Publisher {
    /// Publish one telemetry record
    fn publish_record(&mut self, record: &TelemetryRecord);

    /// Publish one portal status frame
    fn publish_status(&mut self, frame: &StatusFrame);
}

/// How records are rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishSettings {
    /// Topic prefix, records go to `<base_topic>/<wrid>`
    pub base_topic: String,
    /// One JSON document per record instead of one message per value
    pub send_json: bool,
}

impl Default for PublishSettings {
    fn default() -> Self {
        Self {
            base_topic: DEFAULT_BASE_TOPIC.to_string(),
            send_json: false,
        }
    }
}

/// Publisher writing topic/payload pairs to the log
#[derive(Debug, Clone, Default)]
pub struct LogPublisher {
    settings: PublishSettings,
    published: u64,
}

impl LogPublisher {
    /// Create a log publisher
    pub fn new(settings: PublishSettings) -> Self {
        Self { settings, published: 0 }
    }

    /// Number of messages written so far
    pub fn published(&self) -> u64 {
        self.published
    }

    /// Topic/payload pairs for one record
    ///
    /// Flat mode yields `<base>/<wrid>/<key> value` for every value except
    /// the id. JSON mode yields a single `<base>/<wrid>` document with a
    /// `timestamp` field added.
    pub fn render_record(&self, record: &TelemetryRecord) -> Vec<(String, String)> {
        let wrid = record.device_id.to_hex();
        let base = &self.settings.base_topic;

        if self.settings.send_json {
            let mut doc: Map<String, Value> = record
                .values()
                .into_iter()
                .map(|(key, value)| (key.to_string(), Value::String(value)))
                .collect();
            doc.insert("timestamp".to_string(), Value::String(Utc::now().to_rfc3339()));
            return vec![(format!("{}/{}", base, wrid), Value::Object(doc).to_string())];
        }

        record
            .values()
            .into_iter()
            .filter(|(key, _)| *key != "wrid")
            .map(|(key, value)| (format!("{}/{}/{}", base, wrid, key), value))
            .collect()
    }

    /// Topic/payload pair for one status frame
    pub fn render_status(&self, frame: &StatusFrame) -> (String, String) {
        let topic = format!(
            "{}/portal/{}/{}",
            self.settings.base_topic,
            frame.account(),
            frame.kind()
        );
        let payload = if self.settings.send_json {
            serde_json::to_string(frame).unwrap_or_else(|_| frame.to_string())
        } else {
            frame.to_string()
        };
        (topic, payload)
    }
}

impl Publisher for LogPublisher {
    fn publish_record(&mut self, record: &TelemetryRecord) {
        for (topic, payload) in self.render_record(record) {
            info!("send {} :{}", topic, payload);
            self.published += 1;
        }
    }

    fn publish_status(&mut self, frame: &StatusFrame) {
        let (topic, payload) = self.render_status(frame);
        debug!("send {} :{}", topic, payload);
        self.published += 1;
    }
}
