//! Gate and registry implementation
//!
//! Concurrency discipline: all gate state lives behind one mutex, so
//! concurrent signals from unrelated subsystem threads (WAL fsync
//! thread, replication thread) linearize to exactly one firing. The
//! action is taken out of the state under the lock and invoked after
//! the lock is released, so a slow action never blocks signalers.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use crate::txn::TransactionId;

use super::errors::{CommitError, CommitResult};

/// Subsystems that contribute to commit durability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DurabilitySubsystem {
    /// Local WAL persistence (fsync returned)
    WalFsync,
    /// Replication durability per the configured mode
    Replication,
}

impl DurabilitySubsystem {
    /// Returns the string representation
    pub fn as_str(self) -> &'static str {
        match self {
            DurabilitySubsystem::WalFsync => "WAL_FSYNC",
            DurabilitySubsystem::Replication => "REPLICATION",
        }
    }
}

/// The externally-visible completion, invoked at most once.
pub type CommitAction = Box<dyn FnOnce() + Send>;

/// Outcome of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateProgress {
    /// Signal recorded; other subsystems still outstanding.
    Pending { outstanding: usize },
    /// This was the last required signal; the action fired.
    Fired,
}

impl GateProgress {
    /// Check if the action fired.
    pub fn is_fired(&self) -> bool {
        matches!(self, Self::Fired)
    }
}

/// A per-transaction completion gate.
///
/// Shared by every subsystem that must signal it; no subsystem may
/// signal more than once.
pub struct CommitGate {
    txn: TransactionId,
    inner: Mutex<GateInner>,
}

struct GateInner {
    /// Subsystems whose signal is required.
    required: HashSet<DurabilitySubsystem>,
    /// Subsystems that have signaled.
    signaled: HashSet<DurabilitySubsystem>,
    /// The action, present until it fires.
    action: Option<CommitAction>,
}

impl std::fmt::Debug for CommitGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommitGate").field("txn", &self.txn).finish()
    }
}

impl CommitGate {
    /// Create a gate for a transaction with its required signal set.
    pub fn new(
        txn: TransactionId,
        required: &[DurabilitySubsystem],
        action: CommitAction,
    ) -> CommitResult<Self> {
        if required.is_empty() {
            return Err(CommitError::empty_required_set(txn));
        }
        Ok(Self {
            txn,
            inner: Mutex::new(GateInner {
                required: required.iter().copied().collect(),
                signaled: HashSet::new(),
                action: Some(action),
            }),
        })
    }

    /// The transaction this gate belongs to.
    pub fn txn(&self) -> TransactionId {
        self.txn
    }

    /// Record one subsystem's durability signal.
    ///
    /// Fires the action if and only if this was the last outstanding
    /// required subsystem. Double signals and signals from subsystems
    /// outside the required set are invariant-violation errors.
    pub fn signal(&self, subsystem: DurabilitySubsystem) -> CommitResult<GateProgress> {
        let fired_action = {
            let mut inner = self.inner.lock().unwrap();

            if !inner.required.contains(&subsystem) {
                return Err(CommitError::unexpected_signal(self.txn, subsystem));
            }
            if !inner.signaled.insert(subsystem) {
                return Err(CommitError::double_signal(self.txn, subsystem));
            }

            let outstanding = inner.required.len() - inner.signaled.len();
            if outstanding > 0 {
                return Ok(GateProgress::Pending { outstanding });
            }

            // Last required signal: take the action, run it unlocked.
            inner.action.take()
        };

        if let Some(action) = fired_action {
            action();
        }
        Ok(GateProgress::Fired)
    }

    /// Whether the action has fired.
    pub fn is_fired(&self) -> bool {
        self.inner.lock().unwrap().action.is_none()
    }

    /// Required signals not yet received.
    pub fn outstanding(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.required.len() - inner.signaled.len()
    }
}

/// Registry of commit gates, keyed by transaction.
///
/// Shared across the batching thread (which registers) and every
/// subsystem thread (which signals), so the map lives behind a mutex.
/// A gate is removed when it fires.
#[derive(Debug, Default)]
pub struct CommitGateRegistry {
    gates: Mutex<HashMap<TransactionId, Arc<CommitGate>>>,
}

impl CommitGateRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a commit gate for a transaction.
    pub fn register(
        &self,
        txn: TransactionId,
        required: &[DurabilitySubsystem],
        action: CommitAction,
    ) -> CommitResult<Arc<CommitGate>> {
        let gate = Arc::new(CommitGate::new(txn, required, action)?);
        let mut gates = self.gates.lock().unwrap();
        if gates.contains_key(&txn) {
            return Err(CommitError::duplicate_registration(txn));
        }
        gates.insert(txn, Arc::clone(&gate));
        Ok(gate)
    }

    /// Signal a subsystem's contribution for a transaction.
    ///
    /// Removes the gate when it fires.
    pub fn signal(
        &self,
        txn: TransactionId,
        subsystem: DurabilitySubsystem,
    ) -> CommitResult<GateProgress> {
        let gate = {
            let gates = self.gates.lock().unwrap();
            gates
                .get(&txn)
                .cloned()
                .ok_or_else(|| CommitError::unknown_transaction(txn))?
        };

        // Signal outside the registry lock: the action may be slow,
        // and other transactions must not be blocked behind it.
        let progress = gate.signal(subsystem)?;
        if progress.is_fired() {
            self.gates.lock().unwrap().remove(&txn);
        }
        Ok(progress)
    }

    /// Look up the gate for a transaction, if still pending.
    pub fn gate(&self, txn: TransactionId) -> Option<Arc<CommitGate>> {
        self.gates.lock().unwrap().get(&txn).cloned()
    }

    /// Number of unfired gates.
    pub fn pending(&self) -> usize {
        self.gates.lock().unwrap().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const BOTH: &[DurabilitySubsystem] = &[
        DurabilitySubsystem::WalFsync,
        DurabilitySubsystem::Replication,
    ];

    fn counting_action(counter: &Arc<AtomicUsize>) -> CommitAction {
        let counter = Arc::clone(counter);
        Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    // ==================== CommitGate Tests ====================

    #[test]
    fn test_fires_after_all_required_signals() {
        let fired = Arc::new(AtomicUsize::new(0));
        let gate =
            CommitGate::new(TransactionId::new(1), BOTH, counting_action(&fired)).unwrap();

        let p = gate.signal(DurabilitySubsystem::WalFsync).unwrap();
        assert_eq!(p, GateProgress::Pending { outstanding: 1 });
        assert_eq!(fired.load(Ordering::SeqCst), 0);

        let p = gate.signal(DurabilitySubsystem::Replication).unwrap();
        assert!(p.is_fired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        assert!(gate.is_fired());
    }

    #[test]
    fn test_never_fires_with_missing_signal() {
        let fired = Arc::new(AtomicUsize::new(0));
        let gate =
            CommitGate::new(TransactionId::new(1), BOTH, counting_action(&fired)).unwrap();

        gate.signal(DurabilitySubsystem::WalFsync).unwrap();
        assert_eq!(fired.load(Ordering::SeqCst), 0);
        assert_eq!(gate.outstanding(), 1);
    }

    #[test]
    fn test_double_signal_detected() {
        let fired = Arc::new(AtomicUsize::new(0));
        let gate =
            CommitGate::new(TransactionId::new(1), BOTH, counting_action(&fired)).unwrap();

        gate.signal(DurabilitySubsystem::WalFsync).unwrap();
        let err = gate.signal(DurabilitySubsystem::WalFsync).unwrap_err();

        assert!(err.is_invariant_violation());
        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unexpected_subsystem_detected() {
        let fired = Arc::new(AtomicUsize::new(0));
        let gate = CommitGate::new(
            TransactionId::new(1),
            &[DurabilitySubsystem::WalFsync],
            counting_action(&fired),
        )
        .unwrap();

        let err = gate.signal(DurabilitySubsystem::Replication).unwrap_err();
        assert!(err.is_invariant_violation());
    }

    #[test]
    fn test_empty_required_set_rejected() {
        let result = CommitGate::new(TransactionId::new(1), &[], Box::new(|| {}));
        assert!(result.is_err());
    }

    #[test]
    fn test_concurrent_last_signals_fire_exactly_once() {
        // The race between the last two decrementers must not
        // double-fire or never-fire.
        for _ in 0..100 {
            let fired = Arc::new(AtomicUsize::new(0));
            let gate = Arc::new(
                CommitGate::new(TransactionId::new(1), BOTH, counting_action(&fired))
                    .unwrap(),
            );

            let g1 = Arc::clone(&gate);
            let g2 = Arc::clone(&gate);
            let h1 =
                std::thread::spawn(move || g1.signal(DurabilitySubsystem::WalFsync));
            let h2 =
                std::thread::spawn(move || g2.signal(DurabilitySubsystem::Replication));

            h1.join().unwrap().unwrap();
            h2.join().unwrap().unwrap();

            assert_eq!(fired.load(Ordering::SeqCst), 1);
        }
    }

    // ==================== CommitGateRegistry Tests ====================

    #[test]
    fn test_registry_register_and_signal() {
        let registry = CommitGateRegistry::new();
        let fired = Arc::new(AtomicUsize::new(0));
        let txn = TransactionId::new(7);

        registry.register(txn, BOTH, counting_action(&fired)).unwrap();
        assert_eq!(registry.pending(), 1);

        registry.signal(txn, DurabilitySubsystem::WalFsync).unwrap();
        let p = registry.signal(txn, DurabilitySubsystem::Replication).unwrap();

        assert!(p.is_fired());
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Fired gate is removed
        assert_eq!(registry.pending(), 0);
        assert!(registry.gate(txn).is_none());
    }

    #[test]
    fn test_registry_rejects_duplicate_registration() {
        let registry = CommitGateRegistry::new();
        let txn = TransactionId::new(7);

        registry.register(txn, BOTH, Box::new(|| {})).unwrap();
        assert!(registry.register(txn, BOTH, Box::new(|| {})).is_err());
    }

    #[test]
    fn test_registry_unknown_transaction() {
        let registry = CommitGateRegistry::new();
        let err = registry
            .signal(TransactionId::new(9), DurabilitySubsystem::WalFsync)
            .unwrap_err();
        assert_eq!(err.kind, crate::commit::CommitErrorKind::UnknownTransaction);
    }
}
