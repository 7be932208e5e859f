use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

use crate::callbacks::{CustomLogger, LogEvent};
use crate::payload::StandardLoggingPayload;
use crate::util::env_truthy;

#[derive(Error, Debug)]
pub enum AnalyticsError {
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Sled error: {0}")]
    Sled(String),
}

/// Totals over the payloads recorded in a time range.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PayloadAggregation {
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub streaming_requests: u64,
    pub total_prompt_tokens: u64,
    pub total_completion_tokens: u64,
    pub total_tokens: u64,
    pub total_cost: f64,
    pub avg_response_time: f64,
    pub cost_by_model: HashMap<String, f64>,
    pub models_used: HashMap<String, u64>,
    pub period_start: u64,
    pub period_end: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_payloads: usize,
    pub backend_type: String,
    pub max_payloads: Option<usize>,
}

pub(crate) struct JsonlBackend {
    path: PathBuf,
    writer: Arc<tokio::sync::Mutex<File>>,
    total: Arc<tokio::sync::RwLock<usize>>,
}

enum StoreBackend {
    #[cfg(feature = "sled")]
    Sled(sled::Db),
    Memory(Arc<tokio::sync::RwLock<Vec<StandardLoggingPayload>>>),
    Jsonl(JsonlBackend),
}

pub struct PayloadStore {
    backend: StoreBackend,
    /// Maximum payloads kept in memory mode
    max_payloads: usize,
}

/// Whole seconds of the payload's end time, used for range queries.
fn payload_ts(payload: &StandardLoggingPayload) -> u64 {
    payload.end_time.max(0.0) as u64
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

impl PayloadStore {
    /// Create with Sled backend
    #[cfg(feature = "sled")]
    pub fn new_sled(path: &str) -> Result<Self, AnalyticsError> {
        let db = sled::open(path).map_err(|e| AnalyticsError::Sled(e.to_string()))?;
        Ok(Self {
            backend: StoreBackend::Sled(db),
            max_payloads: usize::MAX,
        })
    }

    /// Create with JSONL backend; parent directories are created as needed.
    pub fn new_jsonl<P: Into<PathBuf>>(path: P) -> Result<Self, AnalyticsError> {
        let path = path.into();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| AnalyticsError::Storage(e.to_string()))?;

        let initial_count = count_jsonl_lines(&path)?;

        Ok(Self {
            backend: StoreBackend::Jsonl(JsonlBackend {
                path,
                writer: Arc::new(tokio::sync::Mutex::new(file)),
                total: Arc::new(tokio::sync::RwLock::new(initial_count)),
            }),
            max_payloads: usize::MAX,
        })
    }

    /// Create with in-memory backend keeping the newest `max_payloads` entries.
    pub fn new_memory(max_payloads: usize) -> Self {
        Self {
            backend: StoreBackend::Memory(Arc::new(tokio::sync::RwLock::new(Vec::new()))),
            max_payloads,
        }
    }

    /// Create from environment configuration. `Ok(None)` when no store is configured.
    ///
    /// Environment, in order of precedence:
    /// - LLM_RESPONSES_LOG_SLED_PATH      -> sled database (feature `sled`)
    /// - LLM_RESPONSES_LOG_JSONL_PATH     -> JSONL file
    /// - LLM_RESPONSES_LOG_FORCE_MEMORY   -> in-memory store
    /// - LLM_RESPONSES_LOG_MAX_EVENTS     -> memory bound (default 10000)
    pub fn from_env() -> Result<Option<Self>, AnalyticsError> {
        #[cfg(feature = "sled")]
        if let Some(path) = non_empty_env("LLM_RESPONSES_LOG_SLED_PATH") {
            return Self::new_sled(&path).map(Some);
        }

        if let Some(path) = non_empty_env("LLM_RESPONSES_LOG_JSONL_PATH") {
            return match Self::new_jsonl(&path) {
                Ok(store) => Ok(Some(store)),
                Err(err) => {
                    tracing::warn!("Failed to initialize JSONL payload store: {}", err);
                    Ok(Some(Self::new_memory(max_events_from_env())))
                }
            };
        }

        if env_truthy("LLM_RESPONSES_LOG_FORCE_MEMORY") {
            return Ok(Some(Self::new_memory(max_events_from_env())));
        }

        Ok(None)
    }

    pub fn backend_type(&self) -> &'static str {
        match &self.backend {
            #[cfg(feature = "sled")]
            StoreBackend::Sled(_) => "sled",
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Jsonl(_) => "jsonl",
        }
    }

    /// Record one payload
    pub async fn record(&self, payload: &StandardLoggingPayload) -> Result<(), AnalyticsError> {
        match &self.backend {
            #[cfg(feature = "sled")]
            StoreBackend::Sled(db) => {
                let key = format!("payload:{}", payload.trace_id);
                let value = serde_json::to_vec(payload)?;
                db.insert(key.as_bytes(), value)
                    .map_err(|e| AnalyticsError::Sled(e.to_string()))?;

                // Zero-padded so lexicographic order is numeric order.
                let ts_key = format!("ts:{:020}:{}", payload_ts(payload), payload.trace_id);
                db.insert(ts_key.as_bytes(), payload.trace_id.as_bytes())
                    .map_err(|e| AnalyticsError::Sled(e.to_string()))?;

                Ok(())
            }
            StoreBackend::Memory(payloads) => {
                let mut payloads = payloads.write().await;
                payloads.push(payload.clone());

                if payloads.len() > self.max_payloads {
                    let excess = payloads.len() - self.max_payloads;
                    payloads.drain(0..excess);
                }

                Ok(())
            }
            StoreBackend::Jsonl(backend) => {
                let serialized = serde_json::to_string(payload)?;
                {
                    let mut file = backend.writer.lock().await;
                    file.write_all(serialized.as_bytes())
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                    file.write_all(b"\n")
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                    file.flush()
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                }

                *backend.total.write().await += 1;

                Ok(())
            }
        }
    }

    /// Payloads whose end time falls in `[start_ts, end_ts]` (epoch seconds), oldest first.
    pub async fn query_range(
        &self,
        start_ts: u64,
        end_ts: u64,
        limit: Option<usize>,
    ) -> Result<Vec<StandardLoggingPayload>, AnalyticsError> {
        let in_range = |p: &StandardLoggingPayload| {
            let ts = payload_ts(p);
            ts >= start_ts && ts <= end_ts
        };

        match &self.backend {
            #[cfg(feature = "sled")]
            StoreBackend::Sled(db) => {
                let mut payloads = Vec::new();
                let start_key = format!("ts:{:020}", start_ts);
                let end_key = format!("ts:{:020}", end_ts.saturating_add(1));

                for (_, id_bytes) in db.range(start_key.as_bytes()..end_key.as_bytes()).flatten() {
                    let Ok(trace_id) = String::from_utf8(id_bytes.to_vec()) else {
                        continue;
                    };
                    let key = format!("payload:{}", trace_id);
                    if let Ok(Some(bytes)) = db.get(key.as_bytes()) {
                        if let Ok(payload) = serde_json::from_slice(&bytes) {
                            payloads.push(payload);
                            if limit.is_some_and(|l| payloads.len() >= l) {
                                break;
                            }
                        }
                    }
                }

                Ok(payloads)
            }
            StoreBackend::Memory(payloads) => {
                let payloads = payloads.read().await;
                let mut filtered: Vec<_> =
                    payloads.iter().filter(|p| in_range(p)).cloned().collect();

                if let Some(limit) = limit {
                    filtered.truncate(limit);
                }

                Ok(filtered)
            }
            StoreBackend::Jsonl(backend) => {
                let file = match File::open(&backend.path) {
                    Ok(file) => file,
                    Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
                    Err(err) => return Err(AnalyticsError::Storage(err.to_string())),
                };

                let mut payloads = Vec::new();
                for line in BufReader::new(file).lines() {
                    let line = line.map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    match serde_json::from_str::<StandardLoggingPayload>(trimmed) {
                        Ok(payload) if in_range(&payload) => {
                            payloads.push(payload);
                            if limit.is_some_and(|l| payloads.len() >= l) {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::warn!("Skipping malformed logging payload: {}", err);
                        }
                    }
                }

                Ok(payloads)
            }
        }
    }

    /// Aggregate payloads in a time range
    pub async fn aggregate(
        &self,
        start_ts: u64,
        end_ts: u64,
    ) -> Result<PayloadAggregation, AnalyticsError> {
        let payloads = self.query_range(start_ts, end_ts, None).await?;

        let mut agg = PayloadAggregation {
            period_start: start_ts,
            period_end: end_ts,
            ..PayloadAggregation::default()
        };
        let mut total_response_time = 0.0;

        for p in payloads {
            agg.total_requests += 1;
            if p.is_success() {
                agg.successful_requests += 1;
            } else {
                agg.failed_requests += 1;
            }
            if p.stream {
                agg.streaming_requests += 1;
            }

            agg.total_prompt_tokens += p.prompt_tokens;
            agg.total_completion_tokens += p.completion_tokens;
            agg.total_tokens += p.total_tokens;
            agg.total_cost += p.response_cost;
            total_response_time += p.response_time;

            *agg.cost_by_model.entry(p.model.clone()).or_insert(0.0) += p.response_cost;
            *agg.models_used.entry(p.model).or_insert(0) += 1;
        }

        if agg.total_requests > 0 {
            agg.avg_response_time = total_response_time / agg.total_requests as f64;
        }

        Ok(agg)
    }

    pub async fn stats(&self) -> Result<StoreStats, AnalyticsError> {
        let (total_payloads, max_payloads) = match &self.backend {
            #[cfg(feature = "sled")]
            StoreBackend::Sled(db) => (db.scan_prefix("payload:").count(), None),
            StoreBackend::Memory(payloads) => {
                (payloads.read().await.len(), Some(self.max_payloads))
            }
            StoreBackend::Jsonl(backend) => (*backend.total.read().await, None),
        };

        Ok(StoreStats {
            total_payloads,
            backend_type: self.backend_type().to_string(),
            max_payloads,
        })
    }

    /// Remove every stored payload
    pub async fn clear(&self) -> Result<(), AnalyticsError> {
        match &self.backend {
            #[cfg(feature = "sled")]
            StoreBackend::Sled(db) => {
                db.clear().map_err(|e| AnalyticsError::Sled(e.to_string()))?;
                Ok(())
            }
            StoreBackend::Memory(payloads) => {
                payloads.write().await.clear();
                Ok(())
            }
            StoreBackend::Jsonl(backend) => {
                {
                    let mut file = backend.writer.lock().await;
                    file.set_len(0)
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                    file.seek(SeekFrom::Start(0))
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                    file.flush()
                        .map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                }

                *backend.total.write().await = 0;

                Ok(())
            }
        }
    }
}

#[async_trait]
impl CustomLogger for PayloadStore {
    async fn log_success_event(&self, event: &LogEvent) -> anyhow::Result<()> {
        self.record(&event.standard_logging_object).await?;
        Ok(())
    }

    async fn log_failure_event(&self, event: &LogEvent) -> anyhow::Result<()> {
        self.record(&event.standard_logging_object).await?;
        Ok(())
    }
}

fn max_events_from_env() -> usize {
    non_empty_env("LLM_RESPONSES_LOG_MAX_EVENTS")
        .and_then(|s| s.parse().ok())
        .unwrap_or(10000)
}

fn count_jsonl_lines(path: &Path) -> Result<usize, AnalyticsError> {
    match File::open(path) {
        Ok(file) => {
            let mut count = 0usize;
            for line in BufReader::new(file).lines() {
                let content = line.map_err(|e| AnalyticsError::Storage(e.to_string()))?;
                if !content.trim().is_empty() {
                    count += 1;
                }
            }
            Ok(count)
        }
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(0),
        Err(err) => Err(AnalyticsError::Storage(err.to_string())),
    }
}
