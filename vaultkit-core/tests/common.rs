//! Common test utilities shared across integration tests.
#![allow(missing_docs)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use vaultkit_core::{KitConfig, Signer, SignerError};

pub const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
#[allow(dead_code, reason = "used in tests")]
pub const BOB: &str = "0xB0B0000000000000000000000000000000000002";

/// Signer that counts requests, can be told to reject and can hold its answer
/// until released.
pub struct CountingSigner {
    address: String,
    reject: AtomicBool,
    gated: bool,
    calls: AtomicUsize,
    signed: Mutex<Vec<String>>,
    pub started: Notify,
    pub release: Notify,
}

impl CountingSigner {
    pub fn new(address: &str) -> Arc<Self> {
        Arc::new(Self::build(address, false))
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn gated(address: &str) -> Arc<Self> {
        Arc::new(Self::build(address, true))
    }

    fn build(address: &str, gated: bool) -> Self {
        Self {
            address: address.to_string(),
            reject: AtomicBool::new(false),
            gated,
            calls: AtomicUsize::new(0),
            signed: Mutex::new(Vec::new()),
            started: Notify::new(),
            release: Notify::new(),
        }
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn set_reject(&self, reject: bool) {
        self.reject.store(reject, Ordering::SeqCst);
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    #[allow(dead_code, reason = "used in tests")]
    pub fn signed(&self) -> Vec<String> {
        self.signed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Signer for CountingSigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, text: &str) -> Result<String, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.started.notify_one();
            self.release.notified().await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected);
        }
        self.signed.lock().unwrap().push(text.to_string());
        Ok(format!("0xsig{}", text.len()))
    }
}

/// Configuration pointing every service at `base_url` over plain HTTP.
#[allow(dead_code, reason = "used in tests")]
pub fn local_config(base_url: &str) -> KitConfig {
    KitConfig {
        witness_url: base_url.to_string(),
        allow_insecure_http: true,
        max_retries: 0,
        ..KitConfig::default()
    }
}

pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}
