use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::*;
use crate::signer::SignerError;
use crate::vault::{MemoryVault, VaultEntry, VaultError, VaultResult};

struct TestSigner {
    address: String,
    reject: AtomicBool,
    calls: AtomicUsize,
    gate: Option<Gate>,
}

#[derive(Default)]
struct Gate {
    started: Notify,
    release: Notify,
}

impl TestSigner {
    fn new(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            reject: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            gate: None,
        })
    }

    fn gated(address: &str) -> Arc<Self> {
        Arc::new(Self {
            address: address.to_string(),
            reject: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
            gate: Some(Gate::default()),
        })
    }

    fn gate(&self) -> &Gate {
        self.gate.as_ref().unwrap()
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Signer for TestSigner {
    fn address(&self) -> String {
        self.address.clone()
    }

    async fn sign_message(&self, text: &str) -> Result<String, SignerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.started.notify_one();
            gate.release.notified().await;
        }
        if self.reject.load(Ordering::SeqCst) {
            return Err(SignerError::Rejected);
        }
        Ok(format!("signed:{}", text.len()))
    }
}

/// Host whose existence check never answers while `hang` is set.
#[derive(Default)]
struct HangingVault {
    hang: AtomicBool,
    inner: MemoryVault,
}

#[async_trait]
impl VaultClient for HangingVault {
    async fn exists(&self, vault: &VaultId) -> VaultResult<bool> {
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        self.inner.exists(vault).await
    }

    async fn create(&self, vault: &VaultId) -> VaultResult<()> {
        self.inner.create(vault).await
    }

    async fn get(&self, vault: &VaultId, key: &str) -> VaultResult<Option<VaultEntry>> {
        self.inner.get(vault, key).await
    }

    async fn put(&self, vault: &VaultId, key: &str, value: &str) -> VaultResult<()> {
        self.inner.put(vault, key, value).await
    }

    async fn delete(&self, vault: &VaultId, key: &str) -> VaultResult<()> {
        self.inner.delete(vault, key).await
    }

    async fn share(&self, vault: &VaultId, key: &str) -> VaultResult<String> {
        self.inner.share(vault, key).await
    }
}

const ALICE: &str = "0xA11CE00000000000000000000000000000000001";
const BOB: &str = "0xB0B0000000000000000000000000000000000002";

fn manager(vault: &Arc<MemoryVault>) -> SessionManager {
    SessionManager::new(KitConfig::default(), vault.clone())
}

#[tokio::test]
async fn test_sign_in_then_create_vault() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    assert!(manager.session().is_none());

    let signer = TestSigner::new(ALICE);
    manager.bind(signer.clone());
    assert_eq!(manager.state(), SessionState::Disconnected);

    let proof = manager.sign_in().await.unwrap();
    assert!(proof.message.contains(ALICE));
    assert!(proof.message.contains("Sign into ChatBot!"));
    assert_eq!(manager.state(), SessionState::SessionEstablished);
    assert_eq!(manager.proof(), Some(proof));

    assert!(!manager.check_vault().await.unwrap());
    assert_eq!(manager.state(), SessionState::VaultMissing);
    assert!(manager.vault().is_none());

    let handle = manager.create_vault().await.unwrap();
    assert_eq!(handle.id(), &VaultId::for_address(ALICE, 1));
    let session = manager.session().unwrap();
    assert_eq!(session.state, SessionState::Ready);
    assert!(session.vault_ready);
    assert_eq!(session.signer_address, ALICE);
    assert!(manager.vault().is_some());
    assert_eq!(vault.create_calls(), 1);
}

#[tokio::test]
async fn test_existing_vault_goes_straight_to_ready() {
    let vault = Arc::new(MemoryVault::with_vault(&VaultId::for_address(ALICE, 1)));
    let manager = manager(&vault);
    manager.bind(TestSigner::new(ALICE));

    manager.sign_in().await.unwrap();
    assert!(manager.check_vault().await.unwrap());
    assert_eq!(manager.state(), SessionState::Ready);
    assert_eq!(vault.create_calls(), 0);

    let err = manager.create_vault().await.unwrap_err();
    assert!(matches!(err, VaultKitError::InvalidState { .. }));
}

#[tokio::test]
async fn test_rejected_signature_records_error_and_allows_retry() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let signer = TestSigner::new(ALICE);
    signer.reject.store(true, Ordering::SeqCst);
    manager.bind(signer.clone());

    let err = manager.sign_in().await.unwrap_err();
    assert!(err.is_rejection());
    let session = manager.session().unwrap();
    assert_eq!(session.signer_address, ALICE);
    assert!(matches!(
        session.state,
        SessionState::Error {
            stage: FailedStage::SignIn,
            ..
        }
    ));
    assert!(manager.proof().is_none());

    signer.reject.store(false, Ordering::SeqCst);
    manager.sign_in().await.unwrap();
    assert_eq!(manager.state(), SessionState::SessionEstablished);
    assert_eq!(signer.calls(), 2);
}

#[tokio::test]
async fn test_vault_check_failure_can_be_retried() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    manager.bind(TestSigner::new(ALICE));
    manager.sign_in().await.unwrap();

    vault.set_unavailable(true);
    let err = manager.check_vault().await.unwrap_err();
    assert!(matches!(err, VaultKitError::Vault(VaultError::Transport(_))));
    assert!(matches!(
        manager.state(),
        SessionState::Error {
            stage: FailedStage::VaultCheck,
            ..
        }
    ));

    vault.set_unavailable(false);
    assert!(!manager.check_vault().await.unwrap());
    assert_eq!(manager.state(), SessionState::VaultMissing);
}

#[tokio::test]
async fn test_failed_creation_returns_to_vault_missing() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    manager.bind(TestSigner::new(ALICE));
    manager.sign_in().await.unwrap();
    manager.check_vault().await.unwrap();

    vault.set_unavailable(true);
    assert!(manager.create_vault().await.is_err());
    assert_eq!(manager.state(), SessionState::VaultMissing);
    assert!(manager.vault().is_none());

    vault.set_unavailable(false);
    manager.create_vault().await.unwrap();
    assert_eq!(manager.state(), SessionState::Ready);
}

#[tokio::test]
async fn test_operations_out_of_order_are_rejected() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);

    let err = manager.sign_in().await.unwrap_err();
    assert!(matches!(err, VaultKitError::InvalidState { state, .. } if state == "unbound"));

    manager.bind(TestSigner::new(ALICE));
    let err = manager.check_vault().await.unwrap_err();
    assert!(
        matches!(err, VaultKitError::InvalidState { operation, state } if operation == "check vault" && state == "disconnected")
    );
    assert!(manager.create_vault().await.is_err());

    manager.sign_in().await.unwrap();
    assert!(matches!(
        manager.sign_in().await.unwrap_err(),
        VaultKitError::InvalidState { .. }
    ));
    assert_eq!(vault.exists_calls(), 0);
}

#[tokio::test]
async fn test_rebinding_same_signer_keeps_session() {
    let vault = Arc::new(MemoryVault::with_vault(&VaultId::for_address(ALICE, 1)));
    let manager = manager(&vault);
    let signer = TestSigner::new(ALICE);
    manager.bind(signer.clone());
    manager.sign_in().await.unwrap();
    manager.check_vault().await.unwrap();

    manager.bind(signer.clone());
    manager.bind(TestSigner::new(&ALICE.to_lowercase()));

    assert_eq!(manager.state(), SessionState::Ready);
    assert_eq!(signer.calls(), 1);
    assert!(manager.proof().is_some());
}

#[tokio::test]
async fn test_binding_other_signer_tears_down() {
    let vault = Arc::new(MemoryVault::with_vault(&VaultId::for_address(ALICE, 1)));
    let manager = manager(&vault);
    manager.bind(TestSigner::new(ALICE));
    manager.sign_in().await.unwrap();
    manager.check_vault().await.unwrap();

    manager.bind(TestSigner::new(BOB));

    let session = manager.session().unwrap();
    assert_eq!(session.signer_address, BOB);
    assert_eq!(session.state, SessionState::Disconnected);
    assert!(!session.vault_ready);
    assert!(manager.proof().is_none());
    assert!(manager.vault().is_none());
}

#[tokio::test]
async fn test_sign_in_is_not_reentrant() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let signer = TestSigner::gated(ALICE);
    manager.bind(signer.clone());

    let (first, ()) = tokio::join!(manager.sign_in(), async {
        signer.gate().started.notified().await;
        assert_eq!(manager.state(), SessionState::AwaitingSignature);
        let second = manager.sign_in().await;
        assert!(matches!(second, Err(VaultKitError::SignInInProgress)));
        signer.gate().release.notify_one();
    });

    first.unwrap();
    assert_eq!(signer.calls(), 1);
    assert_eq!(manager.state(), SessionState::SessionEstablished);
}

#[tokio::test]
async fn test_late_signature_for_replaced_signer_is_discarded() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let alice = TestSigner::gated(ALICE);
    manager.bind(alice.clone());

    let (result, ()) = tokio::join!(manager.sign_in(), async {
        alice.gate().started.notified().await;
        manager.bind(TestSigner::new(BOB));
        alice.gate().release.notify_one();
    });

    assert!(matches!(result, Err(VaultKitError::StaleSession)));
    let session = manager.session().unwrap();
    assert_eq!(session.signer_address, BOB);
    assert_eq!(session.state, SessionState::Disconnected);
    assert!(manager.proof().is_none());

    manager.sign_in().await.unwrap();
    assert_eq!(manager.state(), SessionState::SessionEstablished);
}

#[tokio::test]
async fn test_sign_out_during_sign_in_is_final() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let signer = TestSigner::gated(ALICE);
    manager.bind(signer.clone());

    let (result, ()) = tokio::join!(manager.sign_in(), async {
        signer.gate().started.notified().await;
        manager.sign_out();
        signer.gate().release.notify_one();
    });

    assert!(matches!(result, Err(VaultKitError::StaleSession)));
    assert!(manager.session().is_none());
    assert_eq!(manager.state(), SessionState::Disconnected);
}

#[tokio::test]
async fn test_abandoned_sign_in_can_be_restarted() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let signer = TestSigner::gated(ALICE);
    manager.bind(signer.clone());

    let abandoned = tokio::time::timeout(Duration::from_millis(20), manager.sign_in()).await;
    assert!(abandoned.is_err());
    assert_eq!(manager.state(), SessionState::AwaitingSignature);

    signer.gate().release.notify_one();
    manager.sign_in().await.unwrap();
    assert_eq!(manager.state(), SessionState::SessionEstablished);
    assert_eq!(signer.calls(), 2);
}

#[tokio::test]
async fn test_abandoned_vault_check_can_be_restarted() {
    let vault = Arc::new(HangingVault::default());
    vault.hang.store(true, Ordering::SeqCst);
    let manager = SessionManager::new(KitConfig::default(), vault.clone());
    manager.bind(TestSigner::new(ALICE));
    manager.sign_in().await.unwrap();

    let abandoned = tokio::time::timeout(Duration::from_millis(20), manager.check_vault()).await;
    assert!(abandoned.is_err());
    assert_eq!(manager.state(), SessionState::SessionEstablished);

    vault.hang.store(false, Ordering::SeqCst);
    assert!(!manager.check_vault().await.unwrap());
    assert_eq!(manager.state(), SessionState::VaultMissing);
}

#[tokio::test]
async fn test_abandoned_vault_check_after_sign_out_stays_signed_out() {
    let vault = Arc::new(HangingVault::default());
    vault.hang.store(true, Ordering::SeqCst);
    let manager = SessionManager::new(KitConfig::default(), vault.clone());
    manager.bind(TestSigner::new(ALICE));
    manager.sign_in().await.unwrap();

    let check = manager.check_vault();
    tokio::pin!(check);
    let pending = tokio::time::timeout(Duration::from_millis(20), check.as_mut()).await;
    assert!(pending.is_err());
    manager.sign_out();
    drop(check);

    assert_eq!(manager.state(), SessionState::Disconnected);
    assert!(manager.session().is_none());
}

#[tokio::test]
async fn test_subscribers_see_transitions() {
    let vault = Arc::new(MemoryVault::new());
    let manager = manager(&vault);
    let mut updates = manager.subscribe();
    assert!(updates.borrow_and_update().is_none());

    manager.on_wallet_change(Some(TestSigner::new(ALICE)));
    assert!(updates.has_changed().unwrap());
    let seen = updates.borrow_and_update().clone().unwrap();
    assert_eq!(seen.state, SessionState::Disconnected);

    manager.sign_in().await.unwrap();
    let seen = updates.borrow_and_update().clone().unwrap();
    assert_eq!(seen.state, SessionState::SessionEstablished);

    manager.on_wallet_change(None);
    assert!(updates.borrow_and_update().is_none());
}
