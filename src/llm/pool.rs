// src/llm/pool.rs
// The credential slot pool: one slot = one permission to hold a specific
// API key. Pre-filled with `len(keys) * per_key_concurrency` slot items;
// acquiring blocks until one frees up, pinning the caller to one key for
// the duration of its retry loop.

use tokio::sync::{mpsc, Mutex};

/// A bounded FIFO of key slots. Cloning is cheap (the sender is `Clone`);
/// the receiver is behind a `Mutex` since only one task may `recv` at a
/// time, but many tasks may hold outstanding `Slot`s concurrently.
pub struct CredentialPool {
    tx: mpsc::UnboundedSender<String>,
    rx: Mutex<mpsc::UnboundedReceiver<String>>,
}

impl CredentialPool {
    /// `keys` should already be the deduplicated effective list (see
    /// `AiConfig::effective_keys`); an empty list falls back to a single
    /// empty-string slot upstream, never here.
    pub fn new(keys: Vec<String>, per_key_concurrency: usize) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        for key in &keys {
            for _ in 0..per_key_concurrency.max(1) {
                // Channel has no fixed capacity; prefill can never fail.
                let _ = tx.send(key.clone());
            }
        }
        Self {
            tx,
            rx: Mutex::new(rx),
        }
    }

    /// Blocks until a slot is free, returning a guard pinned to one key.
    /// Dropping the guard (explicitly or via scope exit) returns the slot
    /// to the pool — this is the single "finally"-equivalent the retry
    /// loop in `Client::chat` relies on to guarantee slot return on every
    /// exit path.
    pub async fn acquire(&self) -> Slot {
        let key = self
            .rx
            .lock()
            .await
            .recv()
            .await
            .expect("credential pool outlives every outstanding slot");
        Slot {
            key: Some(key),
            tx: self.tx.clone(),
        }
    }
}

pub struct Slot {
    key: Option<String>,
    tx: mpsc::UnboundedSender<String>,
}

impl Slot {
    pub fn key(&self) -> &str {
        self.key.as_deref().expect("slot key taken before drop")
    }
}

impl Drop for Slot {
    fn drop(&mut self) {
        if let Some(key) = self.key.take() {
            // Pool is unbounded and outlives every slot within the
            // summarizer's lifetime; a send failure here would only mean
            // the pool itself was already dropped, which is harmless.
            let _ = self.tx.send(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[tokio::test]
    async fn acquire_release_round_trips() {
        let pool = Arc::new(CredentialPool::new(vec!["a".into(), "b".into()], 1));
        let slot = pool.acquire().await;
        let key = slot.key().to_string();
        assert!(key == "a" || key == "b");
        drop(slot);
        // The slot should be back in the pool immediately.
        let slot2 = pool.acquire().await;
        assert_eq!(slot2.key(), key);
    }

    #[tokio::test]
    async fn fairness_under_burst() {
        let keys = vec!["k1".to_string(), "k2".to_string(), "k3".to_string()];
        let per_key = 3usize;
        let pool = Arc::new(CredentialPool::new(keys.clone(), per_key));

        let m = 2 * keys.len() * per_key + 5;
        let mut handles = Vec::new();
        for _ in 0..m {
            let pool = pool.clone();
            handles.push(tokio::spawn(async move {
                let slot = pool.acquire().await;
                let key = slot.key().to_string();
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                key
            }));
        }

        let mut counts: HashMap<String, usize> = HashMap::new();
        for h in handles {
            let key = h.await.unwrap();
            *counts.entry(key).or_insert(0) += 1;
        }

        let bound = m.div_ceil(keys.len()) + 1;
        for key in &keys {
            let used = counts.get(key).copied().unwrap_or(0);
            assert!(used <= bound, "key {key} used {used} times, bound {bound}");
        }
        assert_eq!(counts.values().sum::<usize>(), m);
    }
}
