//! Poll creation and voting.
//!
//! # Responsibilities
//! - Validate a new poll before it reaches the wallet
//! - Build the `create_poll` and `vote` transaction arguments
//! - Allow one vote in flight per poll
//! - After a vote: record it optimistically, nudge a refresh and confirm it
//!   with a point read when a poller is configured
//!
//! # Data Flow
//! ```text
//! NewPoll / (poll_id, option_id)
//!     → PollActions (validate, in-flight guard)
//!     → TransactionSubmitter (wallet → /tx → decode)
//!     → StateReconciler (overlay, refresh signal)
//!     → StatePoller (optional confirmation of the written key)
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;

use crate::bridge::TransactionIntent;
use crate::chain::{
    ChainError, ConfirmationStatus, StatePoller, TransactionOutcome, TransactionSubmitter,
};
use crate::config::ActionsConfig;
use crate::state::projection::vote_choice;
use crate::state::reconciler::StateReconciler;

/// Reasons a poll action never reached the chain, or failed in the bridge.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error("Poll title must not be blank")]
    BlankTitle,

    #[error("Poll option {0} must not be blank")]
    BlankOption(usize),

    #[error("Poll needs at least one option")]
    NoOptions,

    #[error("Poll end date is required")]
    MissingEndDate,

    #[error("A vote on poll {0} is already in flight")]
    VoteInFlight(u64),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

pub type ActionResult<T> = std::result::Result<T, ActionError>;

/// Input for `create_poll`.
#[derive(Debug, Clone, Default)]
pub struct NewPoll {
    pub title: String,
    pub options: Vec<String>,
    /// Token weighting the votes; the configured default when `None`.
    pub token_contract: Option<String>,
    pub end_date: Option<NaiveDate>,
}

impl NewPoll {
    fn validate(&self) -> ActionResult<()> {
        if self.title.trim().is_empty() {
            return Err(ActionError::BlankTitle);
        }
        if self.options.is_empty() {
            return Err(ActionError::NoOptions);
        }
        if let Some(index) = self.options.iter().position(|o| o.trim().is_empty()) {
            return Err(ActionError::BlankOption(index));
        }
        if self.end_date.is_none() {
            return Err(ActionError::MissingEndDate);
        }
        Ok(())
    }
}

/// What happened to a submitted action.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionReport {
    pub outcome: TransactionOutcome,
    /// Point-read confirmation of the written key, when one was attempted.
    pub confirmation: Option<ConfirmationStatus>,
}

/// Poll-level operations on top of the submitter, reconciler and poller.
pub struct PollActions {
    submitter: Arc<TransactionSubmitter>,
    reconciler: Arc<StateReconciler>,
    poller: Option<Arc<StatePoller>>,
    contract: String,
    default_token: String,
    voting: Mutex<HashSet<u64>>,
}

/// Clears a poll's in-flight mark when the vote finishes, however it finishes.
struct VoteGuard<'a> {
    voting: &'a Mutex<HashSet<u64>>,
    poll_id: u64,
}

impl Drop for VoteGuard<'_> {
    fn drop(&mut self) {
        self.voting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.poll_id);
    }
}

impl PollActions {
    pub fn new(
        submitter: Arc<TransactionSubmitter>,
        reconciler: Arc<StateReconciler>,
        config: &ActionsConfig,
    ) -> Self {
        Self {
            submitter,
            reconciler,
            poller: None,
            contract: config.contract.clone(),
            default_token: config.default_token_contract.clone(),
            voting: Mutex::new(HashSet::new()),
        }
    }

    /// Confirm written keys with `poller` after each accepted action.
    pub fn with_poller(mut self, poller: Arc<StatePoller>) -> Self {
        self.poller = Some(poller);
        self
    }

    /// True while a vote on `poll_id` is awaiting its outcome.
    pub fn is_voting(&self, poll_id: u64) -> bool {
        self.voting
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&poll_id)
    }

    /// Validate and submit a new poll.
    ///
    /// Blank options are rejected rather than dropped. On acceptance the
    /// reconciler is nudged and, with a poller, `poll_counter` is watched until
    /// it moves past the last reconciled value.
    pub async fn create_poll(&self, poll: NewPoll) -> ActionResult<ActionReport> {
        poll.validate()?;
        let end_date = match poll.end_date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => return Err(ActionError::MissingEndDate),
        };
        let token_contract = poll
            .token_contract
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty())
            .unwrap_or_else(|| self.default_token.clone());
        let options: Vec<String> = poll.options.iter().map(|o| o.trim().to_string()).collect();

        let kwargs = json!({
            "title": poll.title.trim(),
            "options": options,
            "token_contract": token_contract,
            "end_date": end_date,
        });
        let known_counter = self.reconciler.snapshot().poll_counter;
        let outcome = self
            .submitter
            .submit(TransactionIntent::new(&self.contract, "create_poll", kwargs))
            .await?;
        if matches!(outcome, TransactionOutcome::Rejected(_)) {
            return Ok(ActionReport {
                outcome,
                confirmation: None,
            });
        }

        tracing::info!(options = options.len(), end_date = %end_date, "Poll submitted");
        self.reconciler.refresh_signal().notify_one();

        let confirmation = match &self.poller {
            Some(poller) => Some(
                poller
                    .wait_until("poll_counter", |observed| {
                        observed.and_then(counter_value).unwrap_or(0) > known_counter
                    })
                    .await,
            ),
            None => None,
        };
        Ok(ActionReport {
            outcome,
            confirmation,
        })
    }

    /// Cast a vote for `option_id` on `poll_id`.
    ///
    /// A second vote on the same poll while the first is outstanding fails
    /// with [`ActionError::VoteInFlight`] without touching the wallet.
    pub async fn vote(&self, poll_id: u64, option_id: u64) -> ActionResult<ActionReport> {
        let _guard = self.begin_vote(poll_id)?;

        let kwargs = json!({ "poll_id": poll_id, "option_id": option_id });
        let outcome = self
            .submitter
            .submit(TransactionIntent::new(&self.contract, "vote", kwargs))
            .await?;
        if matches!(outcome, TransactionOutcome::Rejected(_)) {
            return Ok(ActionReport {
                outcome,
                confirmation: None,
            });
        }

        self.reconciler.record_local_vote(poll_id, option_id);
        self.reconciler.refresh_signal().notify_one();

        let confirmation = match (&self.poller, self.reconciler.user()) {
            (Some(poller), Some(user)) => {
                let key = format!("user_votes:{}:{}", user, poll_id);
                Some(
                    poller
                        .wait_until(&key, |observed| {
                            observed.and_then(vote_choice) == Some(option_id)
                        })
                        .await,
                )
            }
            (Some(_), None) => {
                tracing::debug!(poll_id = poll_id, "No wallet address, skipping vote confirmation");
                None
            }
            (None, _) => None,
        };
        Ok(ActionReport {
            outcome,
            confirmation,
        })
    }

    fn begin_vote(&self, poll_id: u64) -> ActionResult<VoteGuard<'_>> {
        let mut voting = self.voting.lock().unwrap_or_else(PoisonError::into_inner);
        if !voting.insert(poll_id) {
            tracing::debug!(poll_id = poll_id, "Vote already in flight");
            return Err(ActionError::VoteInFlight(poll_id));
        }
        Ok(VoteGuard {
            voting: &self.voting,
            poll_id,
        })
    }
}

impl std::fmt::Debug for PollActions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PollActions")
            .field("contract", &self.contract)
            .field("default_token", &self.default_token)
            .field("confirming", &self.poller.is_some())
            .finish()
    }
}

fn counter_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{
        HostContext, InboundEvent, MpscEventChannel, OutboundEvent, OutboundRequest,
        ReplyPayload, TxStatus, WalletSession,
    };
    use crate::chain::{ChainResult, LedgerRpc};
    use crate::config::{BridgeConfig, ConfirmationConfig, ReconcilerConfig, TransactionConfig};
    use crate::state::graphql::StateSource;
    use crate::state::types::{StateEntry, StateResult};
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use std::time::Duration;
    use tokio::sync::mpsc::UnboundedReceiver;

    struct EmptySource;

    #[async_trait]
    impl StateSource for EmptySource {
        async fn get_state(&self, _key: &str) -> StateResult<Option<Value>> {
            Ok(None)
        }

        async fn scan_prefix(&self, _prefix: &str) -> StateResult<Vec<StateEntry>> {
            Ok(Vec::new())
        }
    }

    /// Finds every transaction and stores `state` under every key.
    struct LedgerStub {
        state: String,
        reads: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LedgerRpc for LedgerStub {
        async fn tx(&self, _hash: &str) -> ChainResult<Value> {
            let data = STANDARD.encode(json!({ "ok": true }).to_string());
            Ok(json!({ "result": { "tx_result": { "data": data } } }))
        }

        async fn abci_get(&self, contract: &str, key: &str) -> ChainResult<Option<String>> {
            self.reads.lock().unwrap().push(format!("{}.{}", contract, key));
            Ok(Some(STANDARD.encode(&self.state)))
        }
    }

    struct Fixture {
        actions: Arc<PollActions>,
        session: Arc<WalletSession>,
        reconciler: Arc<StateReconciler>,
        ledger: Arc<LedgerStub>,
        outbound: UnboundedReceiver<OutboundEvent>,
    }

    fn fixture(state: &str, user: Option<&str>) -> Fixture {
        let (channel, outbound) = MpscEventChannel::new();
        let session = WalletSession::open(HostContext::attached(channel), BridgeConfig::default());
        session.deliver(InboundEvent::AgentReady);

        let ledger = Arc::new(LedgerStub {
            state: state.to_string(),
            reads: Mutex::new(Vec::new()),
        });
        let reconciler = Arc::new(StateReconciler::new(
            Arc::new(EmptySource),
            &ReconcilerConfig {
                user: user.map(str::to_string),
                ..ReconcilerConfig::default()
            },
        ));
        let submitter = Arc::new(TransactionSubmitter::new(
            session.clone(),
            ledger.clone(),
            &TransactionConfig::default(),
        ));
        let poller = Arc::new(StatePoller::new(ledger.clone(), &ConfirmationConfig::default()));
        let actions = PollActions::new(submitter, reconciler.clone(), &ActionsConfig::default())
            .with_poller(poller);

        Fixture {
            actions: Arc::new(actions),
            session,
            reconciler,
            ledger,
            outbound,
        }
    }

    /// Answer the next wallet request with `status`, returning the request.
    async fn answer(
        session: &WalletSession,
        outbound: &mut UnboundedReceiver<OutboundEvent>,
        status: TxStatus,
    ) -> OutboundEvent {
        let event = outbound.recv().await.unwrap();
        session.deliver(InboundEvent::reply_to(
            event.request_id,
            ReplyPayload::TxStatus(status),
        ));
        event
    }

    fn intent(event: &OutboundEvent) -> &TransactionIntent {
        match &event.request {
            OutboundRequest::SendTransaction(intent) => intent,
            other => panic!("unexpected request {:?}", other),
        }
    }

    fn accepted() -> TxStatus {
        TxStatus::Accepted {
            txid: "ABC".to_string(),
        }
    }

    fn lunch() -> NewPoll {
        NewPoll {
            title: "  Lunch ".to_string(),
            options: vec!["Pizza".to_string(), " Tacos".to_string()],
            token_contract: None,
            end_date: NaiveDate::from_ymd_opt(2026, 11, 2),
        }
    }

    #[tokio::test]
    async fn test_invalid_polls_never_reach_wallet() {
        let mut f = fixture("1", None);

        let blank_title = NewPoll {
            title: " ".to_string(),
            ..lunch()
        };
        let blank_option = NewPoll {
            options: vec!["Pizza".to_string(), "  ".to_string()],
            ..lunch()
        };
        let no_date = NewPoll {
            end_date: None,
            ..lunch()
        };

        assert!(matches!(
            f.actions.create_poll(blank_title).await,
            Err(ActionError::BlankTitle)
        ));
        assert!(matches!(
            f.actions.create_poll(blank_option).await,
            Err(ActionError::BlankOption(1))
        ));
        assert!(matches!(
            f.actions.create_poll(no_date).await,
            Err(ActionError::MissingEndDate)
        ));
        assert!(f.outbound.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_poll_sends_normalized_arguments() {
        let mut f = fixture("1", None);
        let actions = f.actions.clone();
        let task = tokio::spawn(async move { actions.create_poll(lunch()).await });

        let event = answer(&f.session, &mut f.outbound, accepted()).await;
        let report = task.await.unwrap().unwrap();

        let intent = intent(&event);
        assert_eq!(intent.contract, "con_xipoll_v0");
        assert_eq!(intent.method, "create_poll");
        assert_eq!(
            Value::Object(intent.kwargs.clone()),
            json!({
                "title": "Lunch",
                "options": ["Pizza", "Tacos"],
                "token_contract": "currency",
                "end_date": "2026-11-02"
            })
        );
        assert_eq!(
            report.confirmation,
            Some(ConfirmationStatus::Confirmed { attempts: 1 })
        );
        assert_eq!(
            f.ledger.reads.lock().unwrap().as_slice(),
            ["con_xipoll_v0.poll_counter".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_vote_records_overlay_and_confirms() {
        let mut f = fixture(r#"{"option_id": 2}"#, Some("ab12"));
        let signal = f.reconciler.refresh_signal();
        let actions = f.actions.clone();
        let task = tokio::spawn(async move { actions.vote(7, 2).await });

        let event = answer(&f.session, &mut f.outbound, accepted()).await;
        let report = task.await.unwrap().unwrap();

        let intent = intent(&event);
        assert_eq!(intent.method, "vote");
        assert_eq!(
            Value::Object(intent.kwargs.clone()),
            json!({ "poll_id": 7, "option_id": 2 })
        );
        assert_eq!(report.outcome, TransactionOutcome::Decoded(Some(json!({ "ok": true }))));
        assert_eq!(
            report.confirmation,
            Some(ConfirmationStatus::Confirmed { attempts: 1 })
        );
        assert_eq!(
            f.ledger.reads.lock().unwrap().as_slice(),
            ["con_xipoll_v0.user_votes:ab12:7".to_string()]
        );
        tokio::time::timeout(Duration::from_millis(1), signal.notified())
            .await
            .expect("refresh requested");
        assert!(!f.actions.is_voting(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_vote_on_same_poll_is_refused() {
        let mut f = fixture("1", None);
        let actions = f.actions.clone();
        let first = tokio::spawn(async move { actions.vote(7, 1).await });

        let event = f.outbound.recv().await.unwrap();
        assert!(f.actions.is_voting(7));
        assert!(matches!(
            f.actions.vote(7, 2).await,
            Err(ActionError::VoteInFlight(7))
        ));
        assert!(f.outbound.try_recv().is_err());

        f.session.deliver(InboundEvent::reply_to(
            event.request_id,
            ReplyPayload::TxStatus(accepted()),
        ));
        let report = first.await.unwrap().unwrap();
        assert_eq!(report.confirmation, None);
        assert!(!f.actions.is_voting(7));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_vote_leaves_no_trace() {
        let mut f = fixture("1", Some("ab12"));
        let actions = f.actions.clone();
        let task = tokio::spawn(async move { actions.vote(7, 1).await });

        let errors = vec!["poll ended".to_string()];
        answer(&f.session, &mut f.outbound, TxStatus::Rejected { errors: errors.clone() }).await;
        let report = task.await.unwrap().unwrap();

        assert_eq!(report.outcome, TransactionOutcome::Rejected(errors));
        assert_eq!(report.confirmation, None);
        assert!(f.ledger.reads.lock().unwrap().is_empty());
        assert!(f.reconciler.view().is_empty());
        assert!(!f.actions.is_voting(7));
    }
}
