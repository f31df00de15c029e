use crate::api::RequestId;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Randomness collaborator. `request_randomness` returns an opaque sequence
/// number; the provider later calls back into the ledger with the entropy for
/// that sequence, exactly once.
#[async_trait]
pub trait EntropySource {
    async fn request_randomness(&self) -> Result<RequestId>;
}

#[derive(Debug, Default, Clone)]
pub struct TestEntropySource {
    last_sequence: Arc<Mutex<RequestId>>,
}
#[async_trait]
impl EntropySource for TestEntropySource {
    async fn request_randomness(&self) -> Result<RequestId> {
        let mut last = self.last_sequence.lock().unwrap();
        *last += 1;
        Ok(*last)
    }
}
impl TestEntropySource {
    /// Resumes issuance after a previously issued sequence number, so ids
    /// stay unique across restarts against a persistent store.
    pub fn starting_after(last: RequestId) -> Self {
        Self {
            last_sequence: Arc::new(Mutex::new(last)),
        }
    }
    /// How many requests were issued so far.
    pub fn issued(&self) -> RequestId {
        *self.last_sequence.lock().unwrap()
    }
}
