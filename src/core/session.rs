use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::{
    config::PlannerConfig,
    core::{
        conversation::Conversation,
        prompts::{generation_prompt, refinement_prompt, SYSTEM_INSTRUCTION},
    },
    error::{PlannerError, Result},
    schemas::CompletionSchema,
    services::{request_itinerary, Exchange, GenerationService, OpenAIClient},
    types::{DayCountExpectation, Itinerary, TripPreferences, TurnKind, TurnRecord},
};

const GENERATE_FAILURE_PREFIX: &str = "Failed to generate itinerary. Please try again.";
const REFINE_FAILURE_PREFIX: &str = "Failed to update itinerary.";

/// Whether a trip conversation is currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Idle,
    Active,
}

/// What a display layer needs to render the planner.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlannerState {
    pub is_loading: bool,
    pub error: Option<String>,
    pub itinerary: Option<Itinerary>,
}

#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Reject refinements whose day count differs from the current itinerary.
    pub lock_day_count: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            lock_day_count: true,
        }
    }
}

impl From<&PlannerConfig> for SessionSettings {
    fn from(config: &PlannerConfig) -> Self {
        Self {
            lock_day_count: config.lock_day_count,
        }
    }
}

/// One open trip: the preferences it was created from, its conversational
/// context with the service, and the latest accepted itinerary.
#[derive(Debug, Clone)]
pub struct TripSession {
    id: u64,
    preferences: TripPreferences,
    conversation: Conversation,
    itinerary: Itinerary,
    history: Vec<TurnRecord>,
}

impl TripSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn preferences(&self) -> &TripPreferences {
        &self.preferences
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn itinerary(&self) -> &Itinerary {
        &self.itinerary
    }

    pub fn history(&self) -> &[TurnRecord] {
        &self.history
    }

    fn accept(&mut self, kind: TurnKind, prompt: String, exchange: Exchange) {
        self.conversation.commit(&prompt, &exchange.reply_text);
        self.history.push(TurnRecord {
            kind,
            prompt,
            day_count: exchange.itinerary.day_count(),
            tokens: exchange.usage,
            duration: exchange.elapsed,
        });
        self.itinerary = exchange.itinerary;
        info!(
            target: "wanderplan::session",
            session = self.id,
            turn = self.history.len(),
            kind = kind.as_str(),
            days = self.itinerary.day_count(),
            "itinerary accepted"
        );
    }

    /// Plain-text trace of the session.
    pub fn replay(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("=== Trip Session #{} ===", self.id));
        lines.push(format!(
            "Destination: {} ({} days from {})",
            self.preferences.destination(),
            self.preferences.duration(),
            self.preferences.start_date()
        ));
        lines.push(String::new());
        lines.push("--- Turns ---".to_string());
        for (idx, record) in self.history.iter().enumerate() {
            lines.push(format!("{}. {}", idx + 1, record.describe()));
        }
        lines.push(String::new());
        lines.push("--- Current Itinerary ---".to_string());
        lines.push(format!(
            "{}: {} day(s), {} activities",
            self.itinerary.title,
            self.itinerary.day_count(),
            self.itinerary.activity_count()
        ));

        lines.join("\n")
    }
}

#[derive(Debug, Default)]
struct ManagerState {
    session: Option<TripSession>,
    /// Bumped whenever pending work must be disregarded.
    epoch: u64,
    in_flight: Option<u64>,
    next_ticket: u64,
    next_session_id: u64,
    last_error: Option<String>,
}

/// Owns the single active trip conversation and mediates every call to the
/// generation service.
///
/// At most one call may be outstanding. Overlapping calls fail with
/// [`PlannerError::SessionBusy`]; a call whose result arrives after
/// [`SessionManager::abandon`], [`SessionManager::reset`] or a newer
/// `start_session` is discarded with [`PlannerError::Superseded`].
#[derive(Debug)]
pub struct SessionManager {
    service: Arc<dyn GenerationService>,
    settings: SessionSettings,
    state: Mutex<ManagerState>,
}

impl SessionManager {
    pub fn new(service: Arc<dyn GenerationService>, settings: SessionSettings) -> Self {
        Self {
            service,
            settings,
            state: Mutex::new(ManagerState {
                next_session_id: 1,
                ..ManagerState::default()
            }),
        }
    }

    /// Manager talking to the OpenAI-compatible endpoint described by `config`.
    pub fn from_config(config: &PlannerConfig) -> Self {
        Self::new(
            Arc::new(OpenAIClient::from_config(config)),
            SessionSettings::from(config),
        )
    }

    /// Discard any current trip and open a new conversation for `prefs`.
    pub async fn start_session(&self, prefs: TripPreferences) -> Result<Itinerary> {
        let (ticket, session_id) = {
            let mut state = self.lock();
            if state.in_flight.is_some() {
                return Err(PlannerError::SessionBusy);
            }
            if let Some(previous) = state.session.take() {
                debug!(target: "wanderplan::session", session = previous.id, "discarding previous session");
            }
            state.epoch += 1;
            state.last_error = None;
            let session_id = state.next_session_id;
            state.next_session_id += 1;
            (self.begin_call(&mut state), session_id)
        };

        info!(
            target: "wanderplan::session",
            session = session_id,
            destination = prefs.destination(),
            days = prefs.duration(),
            "starting trip session"
        );

        let prompt = generation_prompt(&prefs);
        let conversation = Conversation::new(SYSTEM_INSTRUCTION, Itinerary::schema().clone());
        let outcome = request_itinerary(
            self.service.as_ref(),
            conversation.request_for(&prompt),
            DayCountExpectation::exactly(prefs.duration() as usize),
            prefs.start_date(),
        )
        .await;

        let mut state = self.lock();
        ticket.settle(&mut state)?;

        match outcome {
            Ok(exchange) => {
                let mut session = TripSession {
                    id: session_id,
                    preferences: prefs,
                    conversation,
                    itinerary: exchange.itinerary.clone(),
                    history: Vec::new(),
                };
                session.accept(TurnKind::Generate, prompt, exchange);
                let itinerary = session.itinerary.clone();
                state.session = Some(session);
                Ok(itinerary)
            }
            Err(err) => {
                warn!(target: "wanderplan::session", session = session_id, error = %err, "trip generation failed");
                state.last_error = Some(format!("{} {}", GENERATE_FAILURE_PREFIX, err));
                Err(err)
            }
        }
    }

    /// Ask the service to revise the current itinerary according to `feedback`.
    ///
    /// On failure the active session and its itinerary are left untouched.
    pub async fn refine(&self, feedback: &str) -> Result<Itinerary> {
        let (ticket, session_id, request, prompt, expectation, start_date) = {
            let mut state = self.lock();
            let session = state.session.as_ref().ok_or(PlannerError::NoActiveSession)?;

            let feedback = feedback.trim();
            if feedback.is_empty() {
                return Err(PlannerError::InvalidFeedback(
                    "feedback must not be empty".to_string(),
                ));
            }
            if state.in_flight.is_some() {
                return Err(PlannerError::SessionBusy);
            }

            let current_days = session.itinerary.day_count();
            let (locked_days, expectation) = if self.settings.lock_day_count {
                (Some(current_days), DayCountExpectation::exactly(current_days))
            } else {
                (None, DayCountExpectation::any())
            };
            let prompt = refinement_prompt(feedback, locked_days);
            let request = session.conversation.request_for(&prompt);
            let session_id = session.id;
            let start_date = session.preferences.start_date();

            state.last_error = None;
            let ticket = self.begin_call(&mut state);
            (ticket, session_id, request, prompt, expectation, start_date)
        };

        debug!(target: "wanderplan::session", session = session_id, "refining itinerary");

        let outcome =
            request_itinerary(self.service.as_ref(), request, expectation, start_date).await;

        let mut state = self.lock();
        ticket.settle(&mut state)?;

        match outcome {
            Ok(exchange) => {
                let session = state.session.as_mut().ok_or(PlannerError::Superseded)?;
                session.accept(TurnKind::Refine, prompt, exchange);
                Ok(session.itinerary.clone())
            }
            Err(err) => {
                warn!(target: "wanderplan::session", session = session_id, error = %err, "refinement failed");
                state.last_error = Some(format!("{} {}", REFINE_FAILURE_PREFIX, err));
                Err(err)
            }
        }
    }

    /// Give up on the outstanding call, if any. Its result will be discarded.
    pub fn abandon(&self) -> bool {
        let mut state = self.lock();
        let had_call = state.in_flight.take().is_some();
        if had_call {
            state.epoch += 1;
            debug!(target: "wanderplan::session", "in-flight call abandoned");
        }
        had_call
    }

    /// Back to a blank planner: no session, no itinerary, no error.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.session = None;
        state.in_flight = None;
        state.last_error = None;
        state.epoch += 1;
        debug!(target: "wanderplan::session", "planner reset");
    }

    pub fn status(&self) -> SessionStatus {
        if self.lock().session.is_some() {
            SessionStatus::Active
        } else {
            SessionStatus::Idle
        }
    }

    pub fn is_busy(&self) -> bool {
        self.lock().in_flight.is_some()
    }

    pub fn session_id(&self) -> Option<u64> {
        self.lock().session.as_ref().map(TripSession::id)
    }

    pub fn current_itinerary(&self) -> Option<Itinerary> {
        self.lock().session.as_ref().map(|s| s.itinerary.clone())
    }

    pub fn preferences(&self) -> Option<TripPreferences> {
        self.lock().session.as_ref().map(|s| s.preferences.clone())
    }

    pub fn history(&self) -> Vec<TurnRecord> {
        self.lock()
            .session
            .as_ref()
            .map(|s| s.history.clone())
            .unwrap_or_default()
    }

    /// Copy of the active session, conversation included.
    pub fn session(&self) -> Option<TripSession> {
        self.lock().session.clone()
    }

    pub fn snapshot(&self) -> PlannerState {
        let state = self.lock();
        PlannerState {
            is_loading: state.in_flight.is_some(),
            error: state.last_error.clone(),
            itinerary: state.session.as_ref().map(|s| s.itinerary.clone()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ManagerState> {
        // State stays consistent across a panicking holder; recover the guard.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn begin_call(&self, state: &mut ManagerState) -> CallTicket<'_> {
        let id = state.next_ticket;
        state.next_ticket += 1;
        state.in_flight = Some(id);
        CallTicket {
            state: &self.state,
            id,
            epoch: state.epoch,
            settled: false,
        }
    }
}

/// Marks one outstanding call. Dropping it unsettled (the caller abandoned
/// the future) releases the in-flight slot.
struct CallTicket<'a> {
    state: &'a Mutex<ManagerState>,
    id: u64,
    epoch: u64,
    settled: bool,
}

impl CallTicket<'_> {
    /// Release the in-flight slot, or report that the call went stale.
    fn settle(mut self, state: &mut ManagerState) -> Result<()> {
        self.settled = true;
        if state.epoch != self.epoch || state.in_flight != Some(self.id) {
            debug!(target: "wanderplan::session", ticket = self.id, "discarding late response");
            return Err(PlannerError::Superseded);
        }
        state.in_flight = None;
        Ok(())
    }
}

impl Drop for CallTicket<'_> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if state.in_flight == Some(self.id) {
            state.in_flight = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        services::{generation::mock::ScriptedService, GenerationReply, GenerationRequest},
        types::parse_start_date,
    };
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::Notify;

    fn plan_text(title: &str, days: u32) -> String {
        let days: Vec<_> = (1..=days)
            .map(|n| {
                json!({
                    "dayNumber": n,
                    "theme": format!("Theme {n}"),
                    "morning": [{"title": "Walk", "description": "Easy stroll", "location": "Center"}],
                    "afternoon": [],
                    "evening": []
                })
            })
            .collect();
        json!({"title": title, "summary": "Summary", "days": days}).to_string()
    }

    fn prefs(destination: &str, days: u32) -> TripPreferences {
        TripPreferences::builder(destination, parse_start_date("2026-11-02").unwrap())
            .duration(days)
            .build()
            .unwrap()
    }

    fn scripted_manager(replies: Vec<Result<GenerationReply>>) -> (Arc<ScriptedService>, SessionManager) {
        let service = Arc::new(ScriptedService::new(replies));
        let manager = SessionManager::new(service.clone(), SessionSettings::default());
        (service, manager)
    }

    #[tokio::test]
    async fn test_refine_without_session_never_calls_service() {
        let (service, manager) = scripted_manager(vec![]);
        let err = manager.refine("More museums").await.unwrap_err();
        assert!(matches!(err, PlannerError::NoActiveSession));
        assert!(!err.is_retryable());
        assert_eq!(service.call_count(), 0);
    }

    #[tokio::test]
    async fn test_start_session_activates() {
        let (service, manager) = scripted_manager(vec![Ok(GenerationReply::text(plan_text("Oslo", 3)))]);
        assert_eq!(manager.status(), SessionStatus::Idle);

        let plan = manager.start_session(prefs("Oslo", 3)).await.unwrap();
        assert_eq!(plan.days.len(), 3);
        assert_eq!(
            plan.days.iter().map(|d| d.day_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(manager.status(), SessionStatus::Active);
        assert_eq!(manager.history().len(), 1);

        let request = &service.requests()[0];
        assert_eq!(request.system_instruction, SYSTEM_INSTRUCTION);
        assert_eq!(request.schema.schema_name(), "Itinerary");
        assert!(request
            .latest_user_message()
            .unwrap()
            .starts_with("Create a 3-day trip to Oslo"));
    }

    #[tokio::test]
    async fn test_empty_feedback_rejected_before_sending() {
        let (service, manager) = scripted_manager(vec![Ok(GenerationReply::text(plan_text("Oslo", 2)))]);
        manager.start_session(prefs("Oslo", 2)).await.unwrap();

        for feedback in ["", "   ", "\n\t"] {
            let err = manager.refine(feedback).await.unwrap_err();
            assert!(matches!(err, PlannerError::InvalidFeedback(_)));
        }
        assert_eq!(service.call_count(), 1);
    }

    #[tokio::test]
    async fn test_refine_carries_conversation_and_replaces_itinerary() {
        let (service, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("First", 2))),
            Ok(GenerationReply::text(plan_text("Relaxed", 2))),
        ]);
        manager.start_session(prefs("Kyoto, Japan", 2)).await.unwrap();

        let updated = manager.refine("Make day 2 more relaxing").await.unwrap();
        assert_eq!(updated.title, "Relaxed");
        assert_eq!(manager.current_itinerary().unwrap().title, "Relaxed");

        let refine_request = &service.requests()[1];
        assert_eq!(refine_request.messages.len(), 3);
        assert_eq!(refine_request.messages[1]["role"], "assistant");
        assert_eq!(refine_request.messages[1]["content"], plan_text("First", 2));
        assert!(refine_request
            .latest_user_message()
            .unwrap()
            .contains("Make day 2 more relaxing"));

        let session = manager.session().unwrap();
        assert_eq!(session.conversation().exchange_count(), 2);
        assert_eq!(session.history()[1].kind, TurnKind::Refine);
    }

    #[tokio::test]
    async fn test_failed_refine_keeps_previous_state() {
        let (_, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("Keep me", 2))),
            Ok(GenerationReply::text("{\"title\": \"Broken\", \"summary\": \"x\"}")),
            Ok(GenerationReply::empty()),
        ]);
        manager.start_session(prefs("Oslo", 2)).await.unwrap();
        let before = manager.session().unwrap();

        let err = manager.refine("Add a zoo").await.unwrap_err();
        assert!(matches!(err, PlannerError::SchemaViolation(_)));
        let err = manager.refine("Add a zoo").await.unwrap_err();
        assert!(matches!(err, PlannerError::EmptyResponse));

        let after = manager.session().unwrap();
        assert_eq!(after.itinerary(), before.itinerary());
        assert_eq!(after.conversation().messages(), before.conversation().messages());
        assert_eq!(manager.status(), SessionStatus::Active);

        let state = manager.snapshot();
        assert!(!state.is_loading);
        assert_eq!(state.itinerary.unwrap().title, "Keep me");
        assert!(state.error.unwrap().starts_with("Failed to update itinerary."));
    }

    #[tokio::test]
    async fn test_refine_day_count_locked_by_default() {
        let (service, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("Two", 2))),
            Ok(GenerationReply::text(plan_text("Three", 3))),
        ]);
        manager.start_session(prefs("Oslo", 2)).await.unwrap();
        let err = manager.refine("Add a day").await.unwrap_err();
        assert!(err.to_string().contains("expected 2 days, got 3"));
        assert!(service.requests()[1]
            .latest_user_message()
            .unwrap()
            .contains("exactly 2 days"));
    }

    #[tokio::test]
    async fn test_refine_day_count_unlocked() {
        let service = Arc::new(ScriptedService::new(vec![
            Ok(GenerationReply::text(plan_text("Two", 2))),
            Ok(GenerationReply::text(plan_text("Three", 3))),
        ]));
        let manager = SessionManager::new(
            service,
            SessionSettings {
                lock_day_count: false,
            },
        );
        manager.start_session(prefs("Oslo", 2)).await.unwrap();
        let plan = manager.refine("Add a day").await.unwrap();
        assert_eq!(plan.days.len(), 3);
        assert!(plan.days[2].date.is_some());
    }

    #[tokio::test]
    async fn test_second_start_replaces_session() {
        let (service, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("Paris", 2))),
            Ok(GenerationReply::text(plan_text("Rome", 3))),
            Ok(GenerationReply::text(plan_text("Rome relaxed", 3))),
        ]);
        manager.start_session(prefs("Paris, France", 2)).await.unwrap();
        let first_id = manager.session_id().unwrap();
        manager.start_session(prefs("Rome, Italy", 3)).await.unwrap();
        assert_ne!(manager.session_id().unwrap(), first_id);

        manager.refine("Fewer churches").await.unwrap();
        let refine_request = &service.requests()[2];
        let transcript = serde_json::to_string(&refine_request.messages).unwrap();
        assert!(transcript.contains("Rome, Italy"));
        assert!(!transcript.contains("Paris"));
    }

    #[tokio::test]
    async fn test_failed_start_leaves_manager_idle() {
        let (_, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("Paris", 2))),
            Err(PlannerError::Transport("unauthorized".into())),
        ]);
        manager.start_session(prefs("Paris", 2)).await.unwrap();
        let err = manager.start_session(prefs("Rome", 2)).await.unwrap_err();
        assert!(err.is_transport());
        assert_eq!(manager.status(), SessionStatus::Idle);
        assert!(manager
            .snapshot()
            .error
            .unwrap()
            .starts_with("Failed to generate itinerary. Please try again."));
        assert!(matches!(
            manager.refine("anything").await,
            Err(PlannerError::NoActiveSession)
        ));
    }

    #[tokio::test]
    async fn test_reset_returns_to_idle() {
        let (_, manager) = scripted_manager(vec![Ok(GenerationReply::text(plan_text("Oslo", 1)))]);
        manager.start_session(prefs("Oslo", 1)).await.unwrap();
        manager.reset();
        assert_eq!(manager.status(), SessionStatus::Idle);
        assert_eq!(manager.snapshot(), PlannerState::default());
    }

    #[tokio::test]
    async fn test_replay_lists_turns() {
        let (_, manager) = scripted_manager(vec![
            Ok(GenerationReply::text(plan_text("Oslo Fun", 2))),
            Ok(GenerationReply::text(plan_text("Oslo Calm", 2))),
        ]);
        manager.start_session(prefs("Oslo", 2)).await.unwrap();
        manager.refine("calmer").await.unwrap();
        let replay = manager.session().unwrap().replay();
        assert!(replay.contains("Destination: Oslo (2 days from 2026-11-02)"));
        assert!(replay.contains("1. generate -> 2 day(s)"));
        assert!(replay.contains("2. refine -> 2 day(s)"));
        assert!(replay.contains("Oslo Calm: 2 day(s), 2 activities"));
    }

    /// Holds every call until released.
    #[derive(Debug, Default)]
    struct GatedService {
        entered: Notify,
        release: Notify,
        reply: String,
    }

    #[async_trait]
    impl GenerationService for GatedService {
        async fn generate(&self, _request: GenerationRequest) -> Result<GenerationReply> {
            self.entered.notify_one();
            self.release.notified().await;
            Ok(GenerationReply::text(self.reply.clone()))
        }
    }

    #[tokio::test]
    async fn test_overlapping_calls_rejected_and_late_reply_discarded() {
        let service = Arc::new(GatedService {
            reply: plan_text("Late", 2),
            ..GatedService::default()
        });
        let manager = Arc::new(SessionManager::new(
            service.clone(),
            SessionSettings::default(),
        ));

        let pending = tokio::spawn({
            let manager = manager.clone();
            async move { manager.start_session(prefs("Oslo", 2)).await }
        });
        service.entered.notified().await;

        assert!(manager.is_busy());
        assert!(manager.snapshot().is_loading);
        assert!(matches!(
            manager.start_session(prefs("Bergen", 2)).await,
            Err(PlannerError::SessionBusy)
        ));

        assert!(manager.abandon());
        service.release.notify_one();

        let late = pending.await.unwrap();
        assert!(matches!(late, Err(PlannerError::Superseded)));
        assert_eq!(manager.status(), SessionStatus::Idle);
        assert!(!manager.is_busy());
    }

    #[tokio::test]
    async fn test_dropped_call_releases_slot() {
        let service = Arc::new(GatedService {
            reply: plan_text("Never", 1),
            ..GatedService::default()
        });
        let manager = SessionManager::new(service, SessionSettings::default());

        let timed_out = tokio::time::timeout(
            Duration::from_millis(20),
            manager.start_session(prefs("Oslo", 1)),
        )
        .await;
        assert!(timed_out.is_err());
        assert!(!manager.is_busy());
        assert_eq!(manager.status(), SessionStatus::Idle);
    }
}
