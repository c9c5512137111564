use crate::error::TradeError;
use crate::state_machine::{ClosureRecord, TradeSession};
use crate::storage::ArchiveStore;
use log::*;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{OwnedRwLockReadGuard, OwnedRwLockWriteGuard, RwLock};

/// All live trade sessions, keyed by trade id.
///
/// Sessions are checked out for writing one caller at a time, so every operation on a trade sees and updates its
/// stage atomically. Different trades never contend beyond the brief map lookup.
#[derive(Default)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Arc<RwLock<TradeSession>>>>>,
}

impl Clone for SessionStore {
    fn clone(&self) -> Self {
        SessionStore { sessions: Arc::clone(&self.sessions) }
    }
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new session. Fails if a session with the same trade id exists.
    pub async fn create(&self, session: TradeSession) -> Result<(), TradeError> {
        let key = session.trade_id().to_string();
        let mut lock = self.sessions.write().await;
        if lock.contains_key(&key) {
            return Err(TradeError::AlreadyExists(key));
        }
        trace!("Adding trade {key}");
        lock.insert(key, Arc::new(RwLock::new(session)));
        Ok(())
    }

    pub async fn exists(&self, trade_id: &str) -> bool {
        self.sessions.read().await.contains_key(trade_id)
    }

    /// Check the session out for writing. Waits while another caller has it checked out.
    pub async fn checkout(&self, trade_id: &str) -> Result<OwnedRwLockWriteGuard<TradeSession>, TradeError> {
        trace!("Trying to check out trade {trade_id}");
        let session = self.get(trade_id).await?;
        let guard = session.write_owned().await;
        trace!("Check out trade {trade_id} success");
        Ok(guard)
    }

    pub async fn peek(&self, trade_id: &str) -> Result<OwnedRwLockReadGuard<TradeSession>, TradeError> {
        let session = self.get(trade_id).await?;
        Ok(session.read_owned().await)
    }

    async fn get(&self, trade_id: &str) -> Result<Arc<RwLock<TradeSession>>, TradeError> {
        let lock = self.sessions.read().await;
        lock.get(trade_id).cloned().ok_or_else(|| TradeError::NotFound(trade_id.to_string()))
    }

    /// Run `f` with exclusive access to the session. The check-and-set in `f` cannot interleave with any other
    /// operation on the same trade.
    pub async fn with_exclusive_access<F, T>(&self, trade_id: &str, f: F) -> Result<T, TradeError>
    where
        F: FnOnce(&mut TradeSession) -> Result<T, TradeError>,
    {
        let mut session = self.checkout(trade_id).await?;
        f(&mut session)
    }

    pub async fn list(&self) -> Vec<String> {
        let lock = self.sessions.read().await;
        lock.keys().cloned().collect()
    }

    pub async fn remove(&self, trade_id: &str) -> Result<(), TradeError> {
        let mut lock = self.sessions.write().await;
        lock.remove(trade_id).map(|_| ()).ok_or_else(|| TradeError::NotFound(trade_id.to_string()))
    }

    /// Drop every closed session, archiving its closure record first. Sessions that fail to archive stay in the
    /// store. Returns the records that were archived.
    pub async fn evict_closed<A: ArchiveStore>(&self, archive: &mut A) -> Vec<ClosureRecord> {
        let mut lock = self.sessions.write().await;
        let mut evicted = Vec::new();
        let mut keep = HashMap::with_capacity(lock.len());
        for (trade_id, session) in lock.drain() {
            // Sessions that are checked out are busy, so by definition not finished with
            let record = match session.try_read() {
                Ok(s) => s.closure().cloned(),
                Err(_) => None,
            };
            match record {
                Some(record) => match archive.archive(&record) {
                    Ok(()) => {
                        debug!("⚡️ Archived closed trade {trade_id}");
                        evicted.push(record);
                    }
                    Err(e) => {
                        error!("Could not archive trade {trade_id}: {e}");
                        keep.insert(trade_id, session);
                    }
                },
                None => {
                    keep.insert(trade_id, session);
                }
            }
        }
        *lock = keep;
        evicted
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::storage::MemoryStore;
    use crate::{StatusCode, TradePolicy, TradeRole, TradeStage};
    use std::time::Duration;

    fn session(id: &str) -> TradeSession {
        TradeSession::new(id, TradeRole::BuyerAsMaker, TradePolicy::default())
    }

    #[tokio::test]
    async fn create_and_get() {
        let store = SessionStore::new();
        store.create(session("t1")).await.unwrap();
        let err = store.create(session("t1")).await.unwrap_err();
        assert_eq!(err.code(), StatusCode::AlreadyExists);
        assert_eq!(store.peek("t1").await.unwrap().stage(), TradeStage::Created);
        assert_eq!(store.checkout("t2").await.unwrap_err().code(), StatusCode::NotFound);
        assert_eq!(store.list().await, vec!["t1".to_string()]);
        store.remove("t1").await.unwrap();
        assert!(!store.exists("t1").await);
    }

    #[tokio::test]
    async fn checkout_is_exclusive() {
        let store = SessionStore::new();
        store.create(session("t1")).await.unwrap();
        store.create(session("t2")).await.unwrap();
        let guard = store.checkout("t1").await.unwrap();
        let other = store.clone();
        let waiting = tokio::spawn(async move { other.checkout("t1").await.map(|s| s.trade_id().to_string()) });
        // Other trades are not blocked
        assert_eq!(store.checkout("t2").await.unwrap().trade_id(), "t2");
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());
        drop(guard);
        assert_eq!(waiting.await.unwrap().unwrap(), "t1");
    }

    #[tokio::test]
    async fn evict_keeps_open_sessions() {
        let store = SessionStore::new();
        store.create(session("open")).await.unwrap();
        let mut archive = MemoryStore::default();
        let evicted = store.evict_closed(&mut archive).await;
        assert!(evicted.is_empty());
        assert!(archive.is_empty());
        assert!(store.exists("open").await);
    }
}
