//! Staff-initiated state changes.
//!
//! The coordinator checks an action against the live store and the
//! transition table before anything leaves the process, holds a per-record
//! in-flight claim until the backend answers, and reconciles the store once
//! the request succeeds.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use tracing::Instrument;

use crate::action::{ActionContext, ActionType};
use crate::client::{Backend, Document, NotificationRequest, StatusUpdate};
use crate::error::ActionError;
use crate::lifecycle::{IllegalTransition, Step, transition};
use crate::notice::{Confirm, ConfirmPrompt, NetworkStatus, Notice, Notifier};
use crate::store::TransactionStore;
use crate::template::{DocumentRequest, TemplateError, TemplateTable};
use crate::transaction::{Status, Transaction, TransactionId, TransactionPatch};

/// Result of an action that was not refused.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionOutcome {
    /// The backend accepted the status change.
    ///
    /// `document` is set for generation when the file was produced.
    Applied {
        transaction_id: TransactionId,
        status: Status,
        document: Option<Document>,
    },
    /// The document was produced again; the status did not change.
    Regenerated {
        transaction_id: TransactionId,
        document: Document,
    },
    /// The user declined the confirmation prompt. Nothing was sent.
    Cancelled,
}

/// Releases a transaction's in-flight claim when dropped.
struct InFlightClaim {
    ids: Arc<Mutex<HashSet<TransactionId>>>,
    id: TransactionId,
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        self.ids
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.id);
    }
}

/// Mediates approve / reject / generate / ready / complete requests.
///
/// `Clone` is cheap: all collaborators are `Arc`-wrapped and clones share
/// the in-flight set, so two clones still cannot act on the same record at
/// once.
#[derive(Clone)]
pub struct ActionCoordinator {
    store: TransactionStore,
    backend: Arc<dyn Backend>,
    network: Arc<dyn NetworkStatus>,
    confirm: Arc<dyn Confirm>,
    notifier: Arc<dyn Notifier>,
    templates: Arc<TemplateTable>,
    in_flight: Arc<Mutex<HashSet<TransactionId>>>,
}

impl std::fmt::Debug for ActionCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionCoordinator")
            .field("store", &self.store)
            .finish_non_exhaustive()
    }
}

impl ActionCoordinator {
    pub fn new(
        store: TransactionStore,
        backend: Arc<dyn Backend>,
        network: Arc<dyn NetworkStatus>,
        confirm: Arc<dyn Confirm>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            store,
            backend,
            network,
            confirm,
            notifier,
            templates: Arc::new(TemplateTable::default()),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Use a custom template table for document generation.
    pub fn with_templates(mut self, templates: TemplateTable) -> Self {
        self.templates = Arc::new(templates);
        self
    }

    pub fn store(&self) -> &TransactionStore {
        &self.store
    }

    /// Returns `true` while an action on `id` is awaiting its outcome.
    pub fn is_in_flight(&self, id: TransactionId) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&id)
    }

    /// Run a staff action on one record.
    ///
    /// Generation on a record that is already `On Process` regenerates the
    /// document instead of changing status.
    ///
    /// # Errors
    ///
    /// * [`ActionError::NotFound`] -- the record is not in the live store.
    /// * [`ActionError::Offline`] -- no network; nothing was sent.
    /// * [`ActionError::IllegalTransition`] -- not allowed from the current
    ///   status; nothing was sent.
    /// * [`ActionError::Template`] -- generation requested for details that
    ///   name no usable template; nothing was sent.
    /// * [`ActionError::AlreadyInProgress`] -- another action on this record
    ///   has not resolved.
    /// * [`ActionError::RequestFailed`] -- the backend refused; the store is
    ///   unchanged.
    pub async fn perform_action(
        &self,
        id: TransactionId,
        action: ActionType,
    ) -> Result<ActionOutcome, ActionError> {
        self.perform_action_with(id, action, ActionContext::default())
            .await
    }

    /// [`perform_action`](Self::perform_action) with explicit context.
    pub async fn perform_action_with(
        &self,
        id: TransactionId,
        action: ActionType,
        ctx: ActionContext,
    ) -> Result<ActionOutcome, ActionError> {
        let span = tracing::info_span!(
            "action",
            transaction_id = id,
            %action,
            correlation_id = %ctx.correlation_id,
            actor = ctx.actor.as_deref().unwrap_or("-"),
        );
        self.run(id, action, false).instrument(span).await
    }

    /// Re-issue the document for a record that is already `On Process`.
    ///
    /// # Errors
    ///
    /// As [`perform_action`](Self::perform_action); records in any other
    /// status yield [`ActionError::IllegalTransition`].
    pub async fn regenerate(&self, id: TransactionId) -> Result<ActionOutcome, ActionError> {
        let ctx = ActionContext::default();
        let span = tracing::info_span!(
            "regenerate",
            transaction_id = id,
            correlation_id = %ctx.correlation_id,
        );
        self.run(id, ActionType::Generate, true)
            .instrument(span)
            .await
    }

    async fn run(
        &self,
        id: TransactionId,
        action: ActionType,
        regenerate_only: bool,
    ) -> Result<ActionOutcome, ActionError> {
        // 1. The record must be live.
        let record = self.lookup(id)?;

        // 2. Never contact the backend while offline.
        if !self.network.is_online() {
            tracing::info!("offline, action not sent");
            self.notifier.notify(Notice::Offline);
            return Err(ActionError::Offline);
        }

        // 3. Validate against the current status. The document request is
        // only checked here; it is rebuilt after the prompt.
        let step = self.validate(&record, action, regenerate_only)?;
        self.document_request(&record, step)?;

        // 4. One action per record at a time.
        let _claim = self.claim(id)?;

        // 5. Ask the user.
        let prompt = ConfirmPrompt {
            transaction_id: id,
            action,
            regenerate: step == Step::Regenerate,
        };
        if !self.confirm.confirm(&prompt).await {
            tracing::debug!("declined by user");
            return Ok(ActionOutcome::Cancelled);
        }

        // The record may have moved while the prompt was open.
        let record = self.lookup(id)?;
        let step = self.validate(&record, action, regenerate_only)?;
        let document_request = self.document_request(&record, step)?;

        match step {
            Step::Regenerate => {
                // `document_request` is always built for generation steps.
                let Some(request) = document_request else {
                    return Err(ActionError::Template(TemplateError::Missing));
                };
                self.regenerate_document(id, &request).await
            }
            Step::Advance(target) => {
                self.advance(&record, action, target, document_request)
                    .await
            }
        }
    }

    fn lookup(&self, id: TransactionId) -> Result<Transaction, ActionError> {
        self.store.get(id).ok_or_else(|| {
            tracing::info!("transaction not in live store");
            ActionError::NotFound(id)
        })
    }

    fn validate(
        &self,
        record: &Transaction,
        action: ActionType,
        regenerate_only: bool,
    ) -> Result<Step, ActionError> {
        let illegal = IllegalTransition {
            from: record.status,
            action,
        };
        let step = match transition(record.status, action) {
            Ok(Step::Advance(_)) if regenerate_only => Err(illegal),
            other => other,
        };
        step.map_err(|err| {
            tracing::info!(status = %record.status, "illegal transition refused");
            self.notifier.notify(Notice::IllegalTransition {
                transaction_id: record.transaction_id,
                message: err.notice_text(),
            });
            ActionError::IllegalTransition(err)
        })
    }

    fn document_request(
        &self,
        record: &Transaction,
        step: Step,
    ) -> Result<Option<DocumentRequest>, ActionError> {
        let generates = matches!(step, Step::Regenerate | Step::Advance(Status::OnProcess));
        if !generates {
            return Ok(None);
        }
        self.templates
            .document_request(&record.certificate_details)
            .map(Some)
            .map_err(|err| {
                tracing::info!(error = %err, "certificate details unusable");
                self.notifier.notify(Notice::DocumentFailed {
                    transaction_id: record.transaction_id,
                    message: err.to_string(),
                });
                ActionError::Template(err)
            })
    }

    fn claim(&self, id: TransactionId) -> Result<InFlightClaim, ActionError> {
        let mut ids = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if !ids.insert(id) {
            tracing::info!("action already in flight");
            return Err(ActionError::AlreadyInProgress(id));
        }
        Ok(InFlightClaim {
            ids: Arc::clone(&self.in_flight),
            id,
        })
    }

    async fn advance(
        &self,
        record: &Transaction,
        action: ActionType,
        target: Status,
        document_request: Option<DocumentRequest>,
    ) -> Result<ActionOutcome, ActionError> {
        let id = record.transaction_id;
        let update = StatusUpdate::to(target, Utc::now());

        if let Err(e) = self.backend.update_status(id, &update).await {
            tracing::error!(error = %e, "state change failed");
            self.notifier.notify(Notice::RequestFailed {
                transaction_id: id,
                message: e.to_string(),
            });
            return Err(ActionError::RequestFailed(e));
        }
        tracing::info!(status = %target, "state change accepted");

        // Terminal records leave the live view through the server's
        // `remove_transaction` push.
        if !target.is_terminal() {
            self.store.patch(id, TransactionPatch::status(target));
        }

        if let Some(request) = NotificationRequest::for_action(record, action)
            && let Err(e) = self.backend.send_notification(&request).await
        {
            tracing::warn!(
                error = %e,
                email = %request.email,
                "notification failed, state change kept"
            );
        }

        let document = match document_request {
            Some(request) => match self.backend.generate_document(&request).await {
                Ok(document) => Some(document),
                Err(e) => {
                    tracing::error!(error = %e, "document generation failed");
                    self.notifier.notify(Notice::DocumentFailed {
                        transaction_id: id,
                        message: e.to_string(),
                    });
                    None
                }
            },
            None => None,
        };

        self.notifier.notify(Notice::Succeeded {
            transaction_id: id,
            action,
        });
        Ok(ActionOutcome::Applied {
            transaction_id: id,
            status: target,
            document,
        })
    }

    async fn regenerate_document(
        &self,
        id: TransactionId,
        request: &DocumentRequest,
    ) -> Result<ActionOutcome, ActionError> {
        match self.backend.generate_document(request).await {
            Ok(document) => {
                tracing::info!(file = %document.file_name, "document regenerated");
                self.notifier.notify(Notice::Succeeded {
                    transaction_id: id,
                    action: ActionType::Generate,
                });
                Ok(ActionOutcome::Regenerated {
                    transaction_id: id,
                    document,
                })
            }
            Err(e) => {
                tracing::error!(error = %e, "document regeneration failed");
                self.notifier.notify(Notice::DocumentFailed {
                    transaction_id: id,
                    message: e.to_string(),
                });
                Err(ActionError::RequestFailed(e))
            }
        }
    }
}
