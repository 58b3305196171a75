//! Debate orchestration logic.
//!
//! A [`DebateSession`] holds the state of one debate; the
//! [`DebateOrchestrator`] drives it through the six rounds, deciding whose
//! turn it is, building the conversation sent to the completion service and
//! requesting the final evaluation.
//!
//! Sessions are only mutated after a completion call has succeeded, so an
//! upstream failure, a timeout or a dropped future leaves the session exactly
//! as it was and the same call can simply be retried.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use crate::completion::{ChatMessage, CompletionService, complete_within};
use crate::config::{Config, PromptsConfig, render};
use crate::debate_format::{ROUND_COUNT, Round, agenda};
use crate::error::DebateError;
use crate::participant::{Side, Speaker};

/// Where a debate is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebateState {
    /// No debate has been started (or it was reset).
    NotStarted,
    /// One of the six rounds is waiting to be spoken.
    ActiveRound(Round),
    /// All rounds are done; the verdict has not been produced yet.
    Evaluating,
    /// The verdict is in the transcript. Terminal.
    Evaluated,
}

impl DebateState {
    pub fn is_terminal(self) -> bool {
        matches!(self, DebateState::Evaluated)
    }
}

impl fmt::Display for DebateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DebateState::NotStarted => write!(f, "not started"),
            DebateState::ActiveRound(round) => write!(f, "in round {} ({})", round.number(), round),
            DebateState::Evaluating => write!(f, "awaiting evaluation"),
            DebateState::Evaluated => write!(f, "evaluated"),
        }
    }
}

/// One entry in the debate transcript.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Turn {
    pub speaker: Speaker,
    /// Set on user and bot statements; absent on instructions and the verdict.
    pub round: Option<Round>,
    pub content: String,
}

impl Turn {
    fn statement(speaker: Speaker, round: Round, content: String) -> Self {
        Self {
            speaker,
            round: Some(round),
            content,
        }
    }

    fn unlabelled(speaker: Speaker, content: String) -> Self {
        Self {
            speaker,
            round: None,
            content,
        }
    }

    /// The message this turn becomes when replayed to the completion service.
    pub fn to_chat_message(&self) -> ChatMessage {
        match self.speaker {
            Speaker::System => ChatMessage::system(self.content.clone()),
            Speaker::User => ChatMessage::user(self.content.clone()),
            Speaker::Bot => ChatMessage::assistant(self.content.clone()),
        }
    }
}

/// State of a single debate.
#[derive(Debug, Clone, Serialize)]
pub struct DebateSession {
    topic: String,
    user_side: Side,
    bot_side: Side,
    /// Next round to be spoken; `ROUND_COUNT + 1` once every round is done.
    round: u8,
    transcript: Vec<Turn>,
    evaluated: bool,
}

impl DebateSession {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn user_side(&self) -> Side {
        self.user_side
    }

    pub fn bot_side(&self) -> Side {
        self.bot_side
    }

    /// Raw round counter, 1 through 7.
    pub fn round(&self) -> u8 {
        self.round
    }

    pub fn transcript(&self) -> &[Turn] {
        &self.transcript
    }

    pub fn is_evaluated(&self) -> bool {
        self.evaluated
    }

    pub fn state(&self) -> DebateState {
        match Round::from_number(self.round) {
            Some(round) => DebateState::ActiveRound(round),
            None if self.evaluated => DebateState::Evaluated,
            None => DebateState::Evaluating,
        }
    }

    /// The round waiting to be spoken, if the debate is still running.
    pub fn current_round(&self) -> Option<Round> {
        Round::from_number(self.round)
    }

    /// Who speaks next, or `None` once every round is done.
    pub fn next_speaker(&self) -> Option<Speaker> {
        self.current_round().map(|round| {
            if round.scheduled_side() == self.user_side {
                Speaker::User
            } else {
                Speaker::Bot
            }
        })
    }

    /// Whether the next `advance_turn` needs text from the user.
    pub fn awaiting_user(&self) -> bool {
        self.next_speaker() == Some(Speaker::User)
    }

    /// The final verdict, once produced.
    pub fn evaluation(&self) -> Option<&Turn> {
        self.transcript.last().filter(|_| self.evaluated)
    }

    /// The transcript as a completion conversation.
    pub fn conversation(&self) -> Vec<ChatMessage> {
        self.transcript.iter().map(Turn::to_chat_message).collect()
    }
}

/// Callback for debate events.
pub type DebateCallback = Box<dyn Fn(DebateEvent) + Send + Sync>;

/// Events emitted during a debate.
#[derive(Debug, Clone)]
pub enum DebateEvent {
    /// A session has been created.
    DebateStart {
        topic: String,
        user_side: Side,
        bot_side: Side,
    },
    /// A round is about to be played by `speaker`.
    RoundStart { round: Round, speaker: Speaker },
    /// A user or bot statement has been recorded.
    TurnAppended {
        speaker: Speaker,
        round: Round,
        content: String,
    },
    /// The verdict has been recorded.
    Evaluated { content: String },
}

/// Drives debate sessions through their rounds.
pub struct DebateOrchestrator {
    completion: Arc<dyn CompletionService>,
    prompts: PromptsConfig,
    timeout: Duration,
    /// Event callback.
    callback: Option<DebateCallback>,
}

impl DebateOrchestrator {
    pub fn new(completion: Arc<dyn CompletionService>, config: &Config) -> Self {
        Self {
            completion,
            prompts: config.prompts.clone(),
            timeout: config.completion.timeout(),
            callback: None,
        }
    }

    /// Set a callback for debate events.
    pub fn with_callback(mut self, callback: DebateCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    /// Override the per-call completion timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Begin a debate on `topic` with the user holding `user_side`.
    pub fn start(&self, topic: &str, user_side: Side) -> Result<DebateSession, DebateError> {
        let topic = topic.trim();
        if topic.is_empty() {
            return Err(DebateError::EmptyTopic);
        }

        let bot_side = user_side.complement();
        let agenda = agenda();
        let system_prompt = render(
            &self.prompts.system,
            &[
                ("topic", topic),
                ("agenda", agenda.as_str()),
                ("user_side", user_side.display_name()),
                ("bot_side", bot_side.display_name()),
            ],
        );

        let session = DebateSession {
            topic: topic.to_string(),
            user_side,
            bot_side,
            round: 1,
            transcript: vec![Turn::unlabelled(Speaker::System, system_prompt)],
            evaluated: false,
        };

        info!(topic, %user_side, %bot_side, "debate started");
        self.emit_event(DebateEvent::DebateStart {
            topic: session.topic.clone(),
            user_side,
            bot_side,
        });

        Ok(session)
    }

    /// Play the current round.
    ///
    /// On the user's rounds `user_text` is required; on the bot's rounds it is
    /// ignored and the completion service is asked for the statement. Returns
    /// the recorded turn.
    pub async fn advance_turn(
        &self,
        session: &mut DebateSession,
        user_text: Option<&str>,
    ) -> Result<Turn, DebateError> {
        let round = match session.state() {
            DebateState::ActiveRound(round) => round,
            state => {
                return Err(DebateError::InvalidState {
                    operation: "advance the debate",
                    state,
                });
            }
        };

        let user_round = round.scheduled_side() == session.user_side;
        self.emit_event(DebateEvent::RoundStart {
            round,
            speaker: if user_round { Speaker::User } else { Speaker::Bot },
        });

        if user_round {
            let text = user_text
                .filter(|text| !text.trim().is_empty())
                .ok_or(DebateError::MissingStatement { round })?;

            let content = format!("[{}] {}", round.title(), text);
            return Ok(self.record_statement(session, Turn::statement(Speaker::User, round, content)));
        }

        let mut conversation = session.conversation();
        conversation.push(ChatMessage::user(self.bot_instruction(session, round)));

        let reply = complete_within(&*self.completion, &conversation, self.timeout)
            .await
            .inspect_err(|e| warn!(round = round.number(), error = %e, "bot turn failed"))?;

        Ok(self.record_statement(session, Turn::statement(Speaker::Bot, round, reply)))
    }

    /// Ask for the 100-point verdict once every round has been spoken.
    ///
    /// Calling it again after success returns the recorded verdict without
    /// another completion request.
    pub async fn evaluate(&self, session: &mut DebateSession) -> Result<Turn, DebateError> {
        match session.state() {
            DebateState::Evaluating => {}
            DebateState::Evaluated => {
                return session
                    .evaluation()
                    .cloned()
                    .ok_or(DebateError::InvalidState {
                        operation: "evaluate",
                        state: DebateState::Evaluated,
                    });
            }
            state => {
                return Err(DebateError::InvalidState {
                    operation: "evaluate",
                    state,
                });
            }
        }

        let instruction = Turn::unlabelled(Speaker::User, self.prompts.evaluation.clone());
        let mut conversation = session.conversation();
        conversation.push(instruction.to_chat_message());

        let reply = complete_within(&*self.completion, &conversation, self.timeout)
            .await
            .inspect_err(|e| warn!(error = %e, "evaluation failed"))?;

        let verdict = Turn::unlabelled(Speaker::Bot, reply);
        session.transcript.push(instruction);
        session.transcript.push(verdict.clone());
        session.evaluated = true;

        info!(topic = %session.topic, "debate evaluated");
        self.emit_event(DebateEvent::Evaluated {
            content: verdict.content.clone(),
        });

        Ok(verdict)
    }

    /// The cue appended after the transcript when the bot speaks in `round`.
    ///
    /// Only the Pro opening against a Con user carries a hand-off asking for
    /// the Con opening; every other bot round gets the bare title.
    pub fn bot_instruction(&self, session: &DebateSession, round: Round) -> String {
        if round == Round::ProOpening && session.user_side == Side::Con {
            render(
                &self.prompts.opening_handoff,
                &[
                    ("round_title", round.title()),
                    ("next_round_title", Round::ConOpening.title()),
                ],
            )
        } else {
            render(&self.prompts.round_cue, &[("round_title", round.title())])
        }
    }

    fn record_statement(&self, session: &mut DebateSession, turn: Turn) -> Turn {
        let round = session.round;
        session.transcript.push(turn.clone());
        session.round += 1;

        info!(
            round,
            speaker = turn.speaker.display_name(),
            "statement recorded"
        );
        if session.round > ROUND_COUNT {
            info!("all rounds spoken, awaiting evaluation");
        }

        if let Some(label) = turn.round {
            self.emit_event(DebateEvent::TurnAppended {
                speaker: turn.speaker,
                round: label,
                content: turn.content.clone(),
            });
        }

        turn
    }

    /// Emit an event if a callback is registered.
    fn emit_event(&self, event: DebateEvent) {
        if let Some(ref callback) = self.callback {
            callback(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::{ChatRole, CompletionError};
    use crate::config::default_config;
    use crate::mock::ScriptedCompletion;
    use std::sync::Mutex;

    fn orchestrator(service: Arc<ScriptedCompletion>) -> DebateOrchestrator {
        DebateOrchestrator::new(service, &default_config())
    }

    #[test]
    fn test_start_rejects_blank_topic() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("x")));
        assert!(matches!(orch.start("   ", Side::Pro), Err(DebateError::EmptyTopic)));
    }

    #[test]
    fn test_start_seeds_single_system_turn() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("x")));
        let session = orch.start("  Homework should be banned.  ", Side::Con).unwrap();

        assert_eq!(session.topic(), "Homework should be banned.");
        assert_eq!(session.user_side(), Side::Con);
        assert_eq!(session.bot_side(), Side::Pro);
        assert_eq!(session.round(), 1);
        assert_eq!(session.state(), DebateState::ActiveRound(Round::ProOpening));
        assert!(!session.is_evaluated());

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript[0].speaker, Speaker::System);
        assert_eq!(transcript[0].round, None);

        let system = &transcript[0].content;
        assert!(system.contains("Homework should be banned."));
        assert!(system.contains("The student argues the Con side and you argue the Pro side."));
        assert!(system.contains("100 points"));
        for round in Round::ALL {
            assert!(system.contains(round.title()));
        }
    }

    #[test]
    fn test_sides_are_complements() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("x")));
        for side in [Side::Pro, Side::Con] {
            let session = orch.start("t", side).unwrap();
            assert_eq!(session.bot_side(), session.user_side().complement());
        }
    }

    #[tokio::test]
    async fn test_user_turn_requires_text() {
        let service = Arc::new(ScriptedCompletion::constant("x"));
        let orch = orchestrator(service.clone());
        let mut session = orch.start("t", Side::Pro).unwrap();

        for text in [None, Some(""), Some("  \n ")] {
            let err = orch.advance_turn(&mut session, text).await.unwrap_err();
            assert!(matches!(
                err,
                DebateError::MissingStatement {
                    round: Round::ProOpening
                }
            ));
        }
        assert_eq!(session.round(), 1);
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(service.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_user_turn_prefixes_round_title() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("x")));
        let mut session = orch.start("t", Side::Pro).unwrap();

        let turn = orch
            .advance_turn(&mut session, Some("Robots deserve protection."))
            .await
            .unwrap();

        assert_eq!(turn.speaker, Speaker::User);
        assert_eq!(turn.round, Some(Round::ProOpening));
        assert_eq!(turn.content, "[Pro Opening] Robots deserve protection.");
        assert_eq!(session.round(), 2);
    }

    #[tokio::test]
    async fn test_bot_turn_ignores_user_text() {
        let service = Arc::new(ScriptedCompletion::constant("Con says no."));
        let orch = orchestrator(service.clone());
        let mut session = orch.start("t", Side::Pro).unwrap();
        orch.advance_turn(&mut session, Some("yes")).await.unwrap();

        let turn = orch
            .advance_turn(&mut session, Some("should be ignored"))
            .await
            .unwrap();

        assert_eq!(turn.speaker, Speaker::Bot);
        assert_eq!(turn.round, Some(Round::ConOpening));
        assert_eq!(turn.content, "Con says no.");

        let calls = service.calls().await;
        assert_eq!(calls.len(), 1);
        let sent = &calls[0];
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].role, ChatRole::System);
        assert_eq!(sent[1], ChatMessage::user("[Pro Opening] yes"));
        assert_eq!(sent[2], ChatMessage::user("[Con Opening]"));
        assert!(!sent.iter().any(|m| m.content.contains("should be ignored")));
    }

    #[tokio::test]
    async fn test_bot_instruction_is_not_recorded() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("opening")));
        let mut session = orch.start("t", Side::Con).unwrap();
        orch.advance_turn(&mut session, None).await.unwrap();

        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].content, "opening");
    }

    #[test]
    fn test_handoff_only_on_pro_opening_against_con_user() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("x")));
        let con_user = orch.start("t", Side::Con).unwrap();
        let pro_user = orch.start("t", Side::Pro).unwrap();

        let handoff = orch.bot_instruction(&con_user, Round::ProOpening);
        assert!(handoff.starts_with("[Pro Opening]"));
        assert!(handoff.contains("Please give the Con Opening."));

        assert_eq!(orch.bot_instruction(&con_user, Round::ProRebuttal), "[Pro Rebuttal]");
        assert_eq!(orch.bot_instruction(&con_user, Round::ProClosing), "[Pro Closing]");
        assert_eq!(orch.bot_instruction(&pro_user, Round::ConOpening), "[Con Opening]");
    }

    #[tokio::test]
    async fn test_round_advances_by_one_per_success() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("bot")));
        let mut session = orch.start("t", Side::Con).unwrap();

        let mut previous = session.round();
        while session.current_round().is_some() {
            let text = session.awaiting_user().then_some("user");
            orch.advance_turn(&mut session, text).await.unwrap();
            assert_eq!(session.round(), previous + 1);
            previous = session.round();
        }

        assert_eq!(session.state(), DebateState::Evaluating);
        assert_eq!(session.next_speaker(), None);
        let speakers: Vec<Speaker> = session.transcript().iter().map(|t| t.speaker).collect();
        assert_eq!(
            speakers,
            vec![
                Speaker::System,
                Speaker::Bot,
                Speaker::User,
                Speaker::Bot,
                Speaker::User,
                Speaker::Bot,
                Speaker::User,
            ]
        );
    }

    #[tokio::test]
    async fn test_advance_after_final_round_is_invalid() {
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("bot")));
        let mut session = orch.start("t", Side::Pro).unwrap();
        for _ in 0..6 {
            let text = session.awaiting_user().then_some("user");
            orch.advance_turn(&mut session, text).await.unwrap();
        }

        let err = orch.advance_turn(&mut session, Some("more")).await.unwrap_err();
        assert!(matches!(
            err,
            DebateError::InvalidState {
                state: DebateState::Evaluating,
                ..
            }
        ));
        assert_eq!(session.transcript().len(), 7);
    }

    #[tokio::test]
    async fn test_evaluate_before_final_round_is_invalid() {
        let service = Arc::new(ScriptedCompletion::constant("verdict"));
        let orch = orchestrator(service.clone());
        let mut session = orch.start("t", Side::Pro).unwrap();

        let err = orch.evaluate(&mut session).await.unwrap_err();
        assert!(matches!(
            err,
            DebateError::InvalidState {
                state: DebateState::ActiveRound(Round::ProOpening),
                ..
            }
        ));
        assert_eq!(service.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_evaluate_failure_leaves_session_unchanged() {
        let service = Arc::new(
            ScriptedCompletion::new(vec![Err(CompletionError::Request("down".to_string()))])
                .with_fallback("Pro wins 80 to 70."),
        );
        let orch = orchestrator(service.clone());
        let mut session = orch.start("t", Side::Pro).unwrap();
        session.round = ROUND_COUNT + 1;

        assert!(orch.evaluate(&mut session).await.is_err());
        assert_eq!(session.state(), DebateState::Evaluating);
        assert_eq!(session.transcript().len(), 1);

        let verdict = orch.evaluate(&mut session).await.unwrap();
        assert_eq!(verdict.content, "Pro wins 80 to 70.");
        assert_eq!(session.state(), DebateState::Evaluated);
        assert_eq!(session.transcript().len(), 3);
        assert_eq!(session.transcript()[1].speaker, Speaker::User);
        assert_eq!(session.transcript()[1].content, default_config().prompts.evaluation);
    }

    #[tokio::test]
    async fn test_events_are_emitted() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let orch = orchestrator(Arc::new(ScriptedCompletion::constant("bot")))
            .with_callback(Box::new(move |event| {
                let label = match event {
                    DebateEvent::DebateStart { .. } => "start".to_string(),
                    DebateEvent::RoundStart { round, speaker } => {
                        format!("{:?} begins {}", speaker, round.title())
                    }
                    DebateEvent::TurnAppended { round, .. } => round.title().to_string(),
                    DebateEvent::Evaluated { .. } => "evaluated".to_string(),
                };
                sink.lock().unwrap().push(label);
            }));

        let mut session = orch.start("t", Side::Pro).unwrap();
        orch.advance_turn(&mut session, None).await.unwrap_err();
        orch.advance_turn(&mut session, Some("yes")).await.unwrap();
        orch.advance_turn(&mut session, None).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![
                "start",
                "User begins Pro Opening",
                "User begins Pro Opening",
                "Pro Opening",
                "Bot begins Con Opening",
                "Con Opening",
            ]
        );
    }

    #[tokio::test]
    async fn test_round_start_precedes_failed_bot_turn() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let service = Arc::new(ScriptedCompletion::new(vec![Err(CompletionError::Request(
            "down".to_string(),
        ))]));
        let orch = orchestrator(service).with_callback(Box::new(move |event| {
            if let DebateEvent::RoundStart { round, speaker } = event {
                sink.lock().unwrap().push((round, speaker));
            }
        }));

        let mut session = orch.start("t", Side::Con).unwrap();
        orch.advance_turn(&mut session, None).await.unwrap_err();
        assert_eq!(*seen.lock().unwrap(), vec![(Round::ProOpening, Speaker::Bot)]);
        assert_eq!(session.round(), 1);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(
            DebateState::ActiveRound(Round::ConRebuttal).to_string(),
            "in round 4 (Con Rebuttal)"
        );
        assert!(DebateState::Evaluated.is_terminal());
        assert!(!DebateState::Evaluating.is_terminal());
    }
}
