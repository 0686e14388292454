use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub to_number: String,
    pub content: String,
    #[serde(default)]
    pub from_number: Option<String>,
    #[serde(default)]
    pub media_url: Option<String>,
    pub priority: i32,
    pub created_at: i64,
    #[serde(default)]
    pub attempts: u32,
    #[serde(default)]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    pub queued: u64,
    pub processing: u64,
    pub dead: u64,
}

fn score(priority: i32, created_at: i64) -> f64 {
    (priority as f64) * -1_000_000.0 + created_at as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn higher_priority_sorts_before_lower_priority() {
        let high = score(10, 1_000_000);
        let low = score(1, 0);
        assert!(high < low, "higher priority must pop first (lower score)");
    }

    #[test]
    fn same_priority_orders_by_created_at_fifo() {
        let earlier = score(5, 100);
        let later = score(5, 200);
        assert!(earlier < later, "earlier created_at must pop first under equal priority");
    }
}

/// Durable priority queue over outbound WhatsApp sends (C7). Backed by a
/// Redis sorted set (`:queued`) ordered by `score`, a second sorted set
/// (`:processing`) scored by pop time (so visibility-timeout recovery can
/// find stale entries), and a `:dead` hash for exhausted items.
#[derive(Clone)]
pub struct OutboundQueue {
    conn: ConnectionManager,
    prefix: String,
}

impl OutboundQueue {
    pub async fn connect(redis_url: &str, prefix: String) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)
            .map_err(|e| AppError::StorageUnavailable(format!("invalid redis url: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AppError::StorageUnavailable(format!("redis connect failed: {e}")))?;
        Ok(OutboundQueue { conn, prefix })
    }

    fn queued_key(&self) -> String {
        format!("{}:queued", self.prefix)
    }

    fn processing_key(&self) -> String {
        format!("{}:processing", self.prefix)
    }

    fn dead_key(&self) -> String {
        format!("{}:dead", self.prefix)
    }

    fn item_key(&self, id: &str) -> String {
        format!("{}:items:{}", self.prefix, id)
    }

    pub async fn enqueue(
        &self,
        to: String,
        content: String,
        from: Option<String>,
        priority: i32,
        now: i64,
    ) -> AppResult<String> {
        let id = uuid::Uuid::new_v4().to_string();
        let item = QueueItem {
            id: id.clone(),
            to_number: to,
            content,
            from_number: from,
            media_url: None,
            priority,
            created_at: now,
            attempts: 0,
            last_error: None,
        };
        let payload = serde_json::to_string(&item)
            .map_err(|e| AppError::Internal(format!("queue item serialize failed: {e}")))?;

        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .set(self.item_key(&id), payload)
            .zadd(self.queued_key(), &id, score(priority, now))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(id)
    }

    /// Atomically moves the lowest-scored queued item into processing,
    /// scored by `popped_at` so a later visibility-timeout scan can find it.
    pub async fn pop_next(&self, popped_at: i64) -> AppResult<Option<QueueItem>> {
        const POP_SCRIPT: &str = r#"
            local id = redis.call('ZPOPMIN', KEYS[1])
            if table.getn(id) == 0 then
                return false
            end
            redis.call('ZADD', KEYS[2], ARGV[1], id[1])
            return redis.call('GET', KEYS[3] .. id[1])
        "#;
        let mut conn = self.conn.clone();
        let result: Option<String> = Script::new(POP_SCRIPT)
            .key(self.queued_key())
            .key(self.processing_key())
            .key(format!("{}:items:", self.prefix))
            .arg(popped_at)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        match result {
            None => Ok(None),
            Some(payload) => serde_json::from_str(&payload)
                .map(Some)
                .map_err(|e| AppError::Internal(format!("corrupt queue item: {e}"))),
        }
    }

    pub async fn ack_success(&self, item: &QueueItem) -> AppResult<()> {
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .zrem(self.processing_key(), &item.id)
            .del(self.item_key(&item.id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    /// Bumps `attempts` and rewrites the item in place for an in-process
    /// retry (the caller sleeps the backoff itself, per the worker
    /// protocol); does not touch `:processing`.
    pub async fn record_retry(&self, item: &mut QueueItem, error: &str) -> AppResult<()> {
        item.attempts += 1;
        item.last_error = Some(error.to_string());
        let payload = serde_json::to_string(item)
            .map_err(|e| AppError::Internal(format!("queue item serialize failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = conn
            .set(self.item_key(&item.id), payload)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    pub async fn move_to_dead(&self, item: &QueueItem, error: &str) -> AppResult<()> {
        let mut dead = item.clone();
        dead.last_error = Some(error.to_string());
        let payload = serde_json::to_string(&dead)
            .map_err(|e| AppError::Internal(format!("queue item serialize failed: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = redis::pipe()
            .atomic()
            .zrem(self.processing_key(), &item.id)
            .hset(self.dead_key(), &item.id, payload)
            .del(self.item_key(&item.id))
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(())
    }

    /// `PING` plus an `INFO memory` summary, for the health probe (§4.9).
    pub async fn ping(&self) -> AppResult<String> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async(&mut conn).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))
    }

    pub async fn memory_summary(&self) -> AppResult<String> {
        let mut conn = self.conn.clone();
        let info: String =
            redis::cmd("INFO").arg("memory").query_async(&mut conn).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let used = info
            .lines()
            .find(|l| l.starts_with("used_memory_human:"))
            .and_then(|l| l.split(':').nth(1))
            .unwrap_or("unknown")
            .trim()
            .to_string();
        Ok(used)
    }

    pub async fn stats(&self) -> AppResult<QueueStats> {
        let mut conn = self.conn.clone();
        let queued: u64 = conn.zcard(self.queued_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let processing: u64 =
            conn.zcard(self.processing_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let dead: u64 = conn.hlen(self.dead_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(QueueStats { queued, processing, dead })
    }

    pub async fn clear_dead(&self) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let count: u64 = conn.hlen(self.dead_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let _: () = conn.del(self.dead_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        Ok(count)
    }

    /// Moves every dead-lettered item back onto the live queue with
    /// `attempts` reset to zero.
    pub async fn requeue_dead(&self, now: i64) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let dead: std::collections::HashMap<String, String> =
            conn.hgetall(self.dead_key()).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
        let mut requeued = 0u64;
        for (id, payload) in dead {
            let Ok(mut item) = serde_json::from_str::<QueueItem>(&payload) else { continue };
            item.attempts = 0;
            item.last_error = None;
            let new_payload = serde_json::to_string(&item)
                .map_err(|e| AppError::Internal(format!("queue item serialize failed: {e}")))?;
            let _: () = redis::pipe()
                .atomic()
                .hdel(self.dead_key(), &id)
                .set(self.item_key(&id), new_payload)
                .zadd(self.queued_key(), &id, score(item.priority, now))
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
            requeued += 1;
        }
        Ok(requeued)
    }

    /// Startup crash recovery: moves processing entries older than
    /// `visibility_timeout_secs` back onto `:queued` with `attempts` bumped.
    pub async fn recover_stale_processing(&self, now: i64, visibility_timeout_secs: i64) -> AppResult<u64> {
        let mut conn = self.conn.clone();
        let cutoff = now - visibility_timeout_secs;
        let stale: Vec<String> = conn
            .zrangebyscore(self.processing_key(), 0, cutoff)
            .await
            .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;

        let mut recovered = 0u64;
        for id in stale {
            let payload: Option<String> =
                conn.get(self.item_key(&id)).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
            let Some(payload) = payload else {
                let _: () = conn.zrem(self.processing_key(), &id).await.map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
                continue;
            };
            let Ok(mut item) = serde_json::from_str::<QueueItem>(&payload) else { continue };
            item.attempts += 1;
            let new_payload = serde_json::to_string(&item)
                .map_err(|e| AppError::Internal(format!("queue item serialize failed: {e}")))?;
            let _: () = redis::pipe()
                .atomic()
                .zrem(self.processing_key(), &id)
                .set(self.item_key(&id), new_payload)
                .zadd(self.queued_key(), &id, score(item.priority, now))
                .query_async(&mut conn)
                .await
                .map_err(|e| AppError::StorageUnavailable(e.to_string()))?;
            recovered += 1;
        }
        tracing::info!(count = recovered, "recovered stale processing queue items on startup");
        Ok(recovered)
    }
}
