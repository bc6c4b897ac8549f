//! Bounded embedding worker pool (component C).

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, Notify};

use crate::embeddings::embedder::Embedder;
use crate::storage::Storage;

/// A unit of embedding work: embed `text` under `model_id` and upsert the
/// resulting vector against `reference`.
#[derive(Debug, Clone)]
pub struct Job {
    pub reference: String,
    pub text: String,
    pub model_id: String,
}

/// Exponential backoff with jitter for transient embedder failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: u32,
    pub max_attempts: u32,
    pub jitter_fraction: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(500),
            multiplier: 2,
            max_attempts: 5,
            jitter_fraction: 0.2,
        }
    }
}

impl RetryPolicy {
    /// The delay before attempt `attempt` (0-indexed), with jitter applied.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = self.multiplier.pow(attempt);
        let base = self.base_delay.as_millis() as f64 * exponent as f64;
        let jitter = 1.0 + (fastrand::f64() * 2.0 - 1.0) * self.jitter_fraction;
        Duration::from_millis((base * jitter).max(0.0) as u64)
    }
}

/// Snapshot of pipeline health, per the `stats()` operation.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub queued: usize,
    pub in_flight: usize,
    pub succeeded: u64,
    pub failed: u64,
    pub pending_records: i64,
}

struct Counters {
    in_flight: AtomicU64,
    succeeded: AtomicU64,
    failed: AtomicU64,
}

/// A bounded FIFO queue of embedding jobs drained by a fixed worker pool.
/// At capacity, enqueuing drops the oldest unstarted job rather than
/// blocking the caller (freshness over completeness).
pub struct Pipeline {
    queue: Arc<Mutex<VecDeque<Job>>>,
    notify: Arc<Notify>,
    capacity: usize,
    counters: Arc<Counters>,
    storage: Arc<Storage>,
    embedder: Arc<dyn Embedder>,
    retry: RetryPolicy,
}

impl Pipeline {
    pub fn new(storage: Arc<Storage>, embedder: Arc<dyn Embedder>, workers: usize, capacity: usize) -> Arc<Self> {
        let pipeline = Arc::new(Self {
            queue: Arc::new(Mutex::new(VecDeque::with_capacity(capacity))),
            notify: Arc::new(Notify::new()),
            capacity,
            counters: Arc::new(Counters {
                in_flight: AtomicU64::new(0),
                succeeded: AtomicU64::new(0),
                failed: AtomicU64::new(0),
            }),
            storage,
            embedder,
            retry: RetryPolicy::default(),
        });

        for _ in 0..workers {
            let pipeline = Arc::clone(&pipeline);
            tokio::spawn(async move { pipeline.worker_loop().await });
        }

        pipeline
    }

    /// Enqueue a job, dropping the oldest unstarted job if at capacity.
    pub async fn enqueue(&self, job: Job) {
        let mut queue = self.queue.lock().await;
        if queue.len() >= self.capacity {
            queue.pop_front();
        }
        queue.push_back(job);
        drop(queue);
        self.notify.notify_one();
    }

    async fn worker_loop(self: Arc<Self>) {
        loop {
            let job = loop {
                let mut queue = self.queue.lock().await;
                if let Some(job) = queue.pop_front() {
                    break job;
                }
                drop(queue);
                self.notify.notified().await;
            };

            self.counters.in_flight.fetch_add(1, Ordering::SeqCst);
            self.run_with_retry(job).await;
            self.counters.in_flight.fetch_sub(1, Ordering::SeqCst);
        }
    }

    async fn run_with_retry(&self, job: Job) {
        for attempt in 0..self.retry.max_attempts {
            match self.embedder.embed(&[job.text.clone()], &job.model_id).await {
                Ok(vectors) => {
                    if let Some(vector) = vectors.into_iter().next() {
                        if self.upsert(&job.reference, &job.model_id, &vector).is_ok() {
                            self.counters.succeeded.fetch_add(1, Ordering::SeqCst);
                            return;
                        }
                    }
                }
                Err(_) if attempt + 1 < self.retry.max_attempts => {
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    continue;
                }
                Err(_) => {}
            }
        }
        self.counters.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn upsert(&self, reference: &str, model_id: &str, vector: &[f32]) -> crate::error::Result<()> {
        let bytes: Vec<u8> = vector.iter().flat_map(|f| f.to_le_bytes()).collect();
        let conn = self.storage.writer();
        conn.execute(
            "INSERT INTO embeddings (ref, model_id, vector, dim, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(ref, model_id) DO UPDATE SET vector = excluded.vector, dim = excluded.dim, created_at = excluded.created_at",
            rusqlite::params![reference, model_id, bytes, vector.len() as i64, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn stats(&self, model_id: &str) -> crate::error::Result<PipelineStats> {
        let queued = self.queue.lock().await.len();
        let pending_records: i64 = {
            let conn = self.storage.reader();
            conn.query_row(
                "SELECT COUNT(*) FROM records r WHERE r.authority = 'approved'
                 AND NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.ref = r.id AND e.model_id = ?1)",
                [model_id],
                |row| row.get(0),
            )?
        };

        Ok(PipelineStats {
            queued,
            in_flight: self.counters.in_flight.load(Ordering::SeqCst) as usize,
            succeeded: self.counters.succeeded.load(Ordering::SeqCst),
            failed: self.counters.failed.load(Ordering::SeqCst),
            pending_records,
        })
    }

    /// Backfill embeddings for records lacking one under `model_id`.
    pub async fn sync(&self, model_id: &str, kind: Option<&str>, limit: i64) -> crate::error::Result<usize> {
        let rows: Vec<(String, String)> = {
            let conn = self.storage.reader();
            let mut sql = "SELECT r.id, r.content FROM records r WHERE r.authority = 'approved'
                 AND NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.ref = r.id AND e.model_id = ?1)"
                .to_string();
            if kind.is_some() {
                sql.push_str(" AND r.kind = ?2");
            }
            sql.push_str(" LIMIT ?3");

            let mut stmt = conn.prepare(&sql)?;
            let mapped = if let Some(kind) = kind {
                stmt.query_map(rusqlite::params![model_id, kind, limit], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            } else {
                stmt.query_map(rusqlite::params![model_id, limit], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<rusqlite::Result<Vec<_>>>()?
            };
            mapped
        };

        let count = rows.len();
        for (reference, text) in rows {
            self.enqueue(Job { reference, text, model_id: model_id.to_string() }).await;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use async_trait::async_trait;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed(&self, texts: &[String], _model: &str) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![1.0, 0.0]).collect())
        }
    }

    #[test]
    fn retry_policy_doubles_each_attempt() {
        let policy = RetryPolicy { jitter_fraction: 0.0, ..Default::default() };
        assert_eq!(policy.delay_for(0), Duration::from_millis(500));
        assert_eq!(policy.delay_for(1), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(2000));
    }

    #[tokio::test]
    async fn enqueue_drops_oldest_at_capacity() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder);
        let pipeline = Pipeline::new(storage, embedder, 0, 2);

        pipeline.enqueue(Job { reference: "a".into(), text: "a".into(), model_id: "m".into() }).await;
        pipeline.enqueue(Job { reference: "b".into(), text: "b".into(), model_id: "m".into() }).await;
        pipeline.enqueue(Job { reference: "c".into(), text: "c".into(), model_id: "m".into() }).await;

        let queue = pipeline.queue.lock().await;
        let refs: Vec<&str> = queue.iter().map(|j| j.reference.as_str()).collect();
        assert_eq!(refs, vec!["b", "c"]);
    }

    #[tokio::test]
    async fn worker_embeds_and_upserts() {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(Storage::open_temp(dir.path()).unwrap());
        let embedder: Arc<dyn Embedder> = Arc::new(FakeEmbedder);
        let pipeline = Pipeline::new(Arc::clone(&storage), embedder, 1, 8);

        pipeline
            .enqueue(Job { reference: "r1".into(), text: "hello".into(), model_id: "m".into() })
            .await;

        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let stats = pipeline.stats("m").await.unwrap();
            if stats.succeeded == 1 {
                return;
            }
        }
        panic!("embedding job never completed");
    }
}
