//! Newline-delimited JSON ingestion
//!
//! Each line is an object with a `kind` of `sensor` or `hub`; the remaining
//! fields are a raw device or hub event. Sensor events are keyed by sensor
//! id, hub events by hub id.

use hub_config::TopicsConfig;
use hub_core::raw::{hub_event_from_raw, sensor_event_from_raw};
use hub_core::CoreError;
use hub_event_log::{EventProducer, LogError, OutboundRecord, Shutdown};
use serde_json::Value;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// Why a line was not ingested
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("line is not a JSON object")]
    NotAnObject,

    #[error("unknown kind '{0}', expected 'sensor' or 'hub'")]
    UnknownKind(String),

    #[error(transparent)]
    Event(#[from] CoreError),

    #[error(transparent)]
    Log(#[from] LogError),
}

/// What a line was published as
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ingested {
    Sensor,
    Hub,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub sensor_events: u64,
    pub hub_events: u64,
    pub rejected: u64,
}

/// Convert one line and publish it, flushing immediately
pub async fn ingest_line(
    line: &str,
    producer: &dyn EventProducer,
    topics: &TopicsConfig,
) -> Result<Ingested, IngestError> {
    let Value::Object(mut raw) = serde_json::from_str::<Value>(line)? else {
        return Err(IngestError::NotAnObject);
    };
    let kind = match raw.remove("kind") {
        Some(Value::String(kind)) => kind,
        Some(other) => return Err(IngestError::UnknownKind(other.to_string())),
        None => return Err(IngestError::UnknownKind(String::new())),
    };

    let (record, ingested) = match kind.as_str() {
        "sensor" => {
            let event = sensor_event_from_raw(&raw)?;
            let record = OutboundRecord::json(&topics.sensors, &event.sensor_id, &event)?;
            (record, Ingested::Sensor)
        }
        "hub" => {
            let event = hub_event_from_raw(&raw)?;
            let record = OutboundRecord::json(&topics.hubs, &event.hub_id, &event)?;
            (record, Ingested::Hub)
        }
        _ => return Err(IngestError::UnknownKind(kind)),
    };

    producer.send(record).await?;
    producer.flush().await?;
    Ok(ingested)
}

/// Ingest lines until end of input or shutdown
///
/// Bad lines are logged and skipped. Only a read failure ends ingestion early.
pub async fn ingest_stream<R>(
    reader: R,
    producer: &dyn EventProducer,
    topics: &TopicsConfig,
    shutdown: &Shutdown,
) -> std::io::Result<IngestStats>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut stats = IngestStats::default();
    let mut line_no = 0u64;

    loop {
        let line = tokio::select! {
            _ = shutdown.requested() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else {
            info!("End of input after {} lines", line_no);
            break;
        };
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match ingest_line(&line, producer, topics).await {
            Ok(Ingested::Sensor) => stats.sensor_events += 1,
            Ok(Ingested::Hub) => stats.hub_events += 1,
            Err(e) => {
                warn!(line = line_no, "Skipping input line: {}", e);
                stats.rejected += 1;
            }
        }
    }

    debug!(?stats, "Ingestion finished");
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use hub_core::{HubEvent, HubEventPayload, SensorEvent, SensorPayload};
    use hub_event_log::MemoryLog;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_ingest_sensor_line() {
        let log = Arc::new(MemoryLog::new());
        let producer = log.producer();
        let topics = TopicsConfig::default();

        let kind = ingest_line(
            r#"{"kind":"sensor","id":"s1","hubId":"H1","state":true,"timestamp":100000}"#,
            &producer,
            &topics,
        )
        .await
        .unwrap();
        assert_eq!(kind, Ingested::Sensor);

        let records = log.records("sensors");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key, "s1");
        let event: SensorEvent = records[0].decode().unwrap();
        assert!(matches!(event.payload, SensorPayload::Switch(r) if r.state));
        assert_eq!(event.timestamp.timestamp(), 100);
    }

    #[tokio::test]
    async fn test_ingest_hub_line() {
        let log = Arc::new(MemoryLog::new());
        let producer = log.producer();

        ingest_line(
            r#"{"kind":"hub","type":"DEVICE_ADDED","hubId":"H1","id":"s1","deviceType":"SWITCH_SENSOR"}"#,
            &producer,
            &TopicsConfig::default(),
        )
        .await
        .unwrap();

        let records = log.records("hubs");
        assert_eq!(records[0].key, "H1");
        let event: HubEvent = records[0].decode().unwrap();
        assert!(matches!(event.payload, HubEventPayload::DeviceAdded { ref id, .. } if id == "s1"));
    }

    #[tokio::test]
    async fn test_ingest_rejects_bad_lines() {
        let log = Arc::new(MemoryLog::new());
        let producer = log.producer();
        let topics = TopicsConfig::default();

        for (line, check) in [
            ("not json", "invalid JSON"),
            ("[1,2]", "not a JSON object"),
            (r#"{"kind":"door","id":"x"}"#, "unknown kind"),
            (r#"{"kind":"sensor","id":"s1","hubId":"H1"}"#, "s1"),
        ] {
            let err = ingest_line(line, &producer, &topics).await.unwrap_err();
            if check != "s1" {
                assert!(err.to_string().contains(check), "{line}: {err}");
            } else {
                assert!(matches!(err, IngestError::Event(_)), "{line}: {err}");
            }
        }
        assert!(log.is_empty("sensors"));
    }

    #[tokio::test]
    async fn test_ingest_stream_skips_bad_lines() {
        let log = Arc::new(MemoryLog::new());
        let producer = log.producer();
        let input = concat!(
            r#"{"kind":"hub","type":"DEVICE_ADDED","hubId":"H1","id":"s1","deviceType":"SWITCH_SENSOR"}"#,
            "\n",
            "garbage\n",
            "\n",
            r#"{"kind":"sensor","id":"s1","hubId":"H1","state":false}"#,
            "\n",
        );

        let stats = ingest_stream(
            input.as_bytes(),
            &producer,
            &TopicsConfig::default(),
            &Shutdown::new(),
        )
        .await
        .unwrap();

        assert_eq!(
            stats,
            IngestStats {
                sensor_events: 1,
                hub_events: 1,
                rejected: 1
            }
        );
        assert_eq!(log.len("sensors"), 1);
        assert_eq!(log.len("hubs"), 1);
    }
}
