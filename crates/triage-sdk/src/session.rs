use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{debug, info};
use triage_ledger::{
    AuditProjection, AuditTrail, Emitter, EventKind, EventRecord, InMemoryLedger, LedgerError,
    LedgerReader, ReplayEngine, ReplayResult, Status, StreamValidator, ValidationError,
    ValidationReport,
};
use triage_types::{ActionId, Bucket, EntityId, EntityType, SessionId};

use crate::config::SessionConfig;
use crate::error::{SdkError, SdkResult};

/// The pair of records written for one sub-action transition.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionEvents {
    /// Record on the owning email's history.
    pub on_email: EventRecord,
    /// Mirror on the action's own history.
    pub on_action: EventRecord,
}

/// One triage session and the ledger it owns.
///
/// Nothing is shared between sessions: opening a session starts from an
/// empty ledger, and "once per session" checks only see this session's
/// records.
pub struct Session {
    id: SessionId,
    config: SessionConfig,
    ledger: InMemoryLedger,
    // One guard per email serializes the check-then-append in `classify_once`.
    classify_guards: Mutex<HashMap<EntityId, Arc<Mutex<()>>>>,
}

impl Session {
    pub fn open(config: SessionConfig) -> Self {
        let ledger = InMemoryLedger::new(config.ledger.clone());
        Self::with_ledger(config, ledger)
    }

    /// Open a session over records exported by [`Session::export_all`].
    pub fn import(json: &str, config: SessionConfig) -> SdkResult<Self> {
        let records: Vec<EventRecord> =
            serde_json::from_str(json).map_err(|e| SdkError::Export(e.to_string()))?;
        let ledger = InMemoryLedger::restore(records, config.ledger.clone())?;
        Ok(Self::with_ledger(config, ledger))
    }

    fn with_ledger(config: SessionConfig, ledger: InMemoryLedger) -> Self {
        let id = SessionId::new();
        info!(session = %id, strict = config.ledger.strict_entity_types, "session opened");
        Self {
            id,
            config,
            ledger,
            classify_guards: Mutex::new(HashMap::new()),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn ledger(&self) -> &InMemoryLedger {
        &self.ledger
    }

    fn emitter(&self) -> Emitter<'_, InMemoryLedger> {
        Emitter::with_config(&self.ledger, &self.config.ledger)
    }

    fn role<'a>(&'a self, actor_role: Option<&'a str>) -> &'a str {
        actor_role.unwrap_or(&self.config.default_actor_role)
    }

    /// Classify `email_id` unless it already has a classification.
    ///
    /// Returns `None` when an earlier `CLASSIFIED` record exists, so
    /// re-selecting an email never re-records it.
    pub fn classify_once(
        &self,
        email_id: &str,
        bucket: Bucket,
        confidence: f64,
        reasoning: Vec<String>,
    ) -> SdkResult<Option<EventRecord>> {
        let entity_id = parse_entity(email_id)?;
        let guard = self.classify_guard(&entity_id)?;
        let _held = guard.lock().map_err(|_| SdkError::LockPoisoned)?;

        if self
            .ledger
            .latest_of_kind(&entity_id, &EventKind::Classified)?
            .is_some()
        {
            debug!(session = %self.id, entity = %entity_id, "already classified");
            return Ok(None);
        }

        let record = self.emitter().classified(
            email_id,
            EntityType::Email,
            bucket,
            confidence,
            reasoning,
        )?;
        Ok(Some(record))
    }

    fn classify_guard(&self, entity_id: &EntityId) -> SdkResult<Arc<Mutex<()>>> {
        let mut guards = self
            .classify_guards
            .lock()
            .map_err(|_| SdkError::LockPoisoned)?;
        Ok(guards.entry(entity_id.clone()).or_default().clone())
    }

    /// Record that the action at `index` within `email_id` began.
    pub fn start_action(
        &self,
        email_id: &str,
        index: usize,
        actor_role: Option<&str>,
    ) -> SdkResult<ActionEvents> {
        self.action_transition(false, email_id, index, actor_role)
    }

    /// Record that the action at `index` within `email_id` is done.
    ///
    /// Repeated calls append repeated records; the derived finished set
    /// still contains the action once.
    pub fn finish_action(
        &self,
        email_id: &str,
        index: usize,
        actor_role: Option<&str>,
    ) -> SdkResult<ActionEvents> {
        self.action_transition(true, email_id, index, actor_role)
    }

    fn action_transition(
        &self,
        finished: bool,
        email_id: &str,
        index: usize,
        actor_role: Option<&str>,
    ) -> SdkResult<ActionEvents> {
        let email = parse_entity(email_id)?;
        let action_id = ActionId::for_position(&email, index);
        let action_entity = action_id.to_entity_id();
        let role = self.role(actor_role);
        let emit = self.emitter();

        let record = |entity_id: &EntityId, entity_type: EntityType| {
            if finished {
                emit.work_finished(entity_id.as_str(), entity_type, action_id.as_str(), role)
            } else {
                emit.work_started(entity_id.as_str(), entity_type, action_id.as_str(), role)
            }
        };

        Ok(ActionEvents {
            on_email: record(&email, EntityType::Email)?,
            on_action: record(&action_entity, EntityType::Action)?,
        })
    }

    /// Record an acknowledged reply to `email_id`.
    pub fn record_reply(&self, email_id: &str, subject: &str) -> SdkResult<EventRecord> {
        Ok(self.emitter().replied(email_id, EntityType::Email, subject)?)
    }

    pub fn history(&self, entity_id: &str) -> SdkResult<Vec<EventRecord>> {
        Ok(self.ledger.history(&parse_entity(entity_id)?)?)
    }

    /// Current status of any entity; unknown entities have the zero status.
    pub fn status(&self, entity_id: &str) -> SdkResult<Status> {
        let history = self.history(entity_id)?;
        Ok(triage_ledger::derive_status(&history))
    }

    pub fn replay(&self, entity_id: &str) -> SdkResult<ReplayResult> {
        Ok(ReplayEngine::replay(&self.ledger, &parse_entity(entity_id)?)?)
    }

    pub fn audit(&self, entity_id: &str) -> SdkResult<AuditTrail> {
        Ok(AuditProjection::trail(&self.ledger, &parse_entity(entity_id)?)?)
    }

    pub fn validate(&self) -> SdkResult<Vec<ValidationReport>> {
        Ok(StreamValidator::new(&self.config.ledger).validate_all(&self.ledger)?)
    }

    /// One entity's history as pretty-printed JSON.
    pub fn export(&self, entity_id: &str) -> SdkResult<String> {
        to_json(&self.history(entity_id)?)
    }

    /// Every record in the session as pretty-printed JSON, loadable with
    /// [`Session::import`].
    pub fn export_all(&self) -> SdkResult<String> {
        to_json(&self.ledger.export()?)
    }
}

fn parse_entity(raw: &str) -> Result<EntityId, LedgerError> {
    EntityId::new(raw).map_err(|_| ValidationError::MissingField { field: "entity_id" }.into())
}

fn to_json(records: &[EventRecord]) -> SdkResult<String> {
    serde_json::to_string_pretty(records).map_err(|e| SdkError::Export(e.to_string()))
}
