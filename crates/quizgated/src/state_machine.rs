use quizgate_core::config::Config;
use quizgate_core::evaluate::{self, Response};
use quizgate_core::ipc::{DaemonMsg, QuestionView};
use quizgate_core::labels::Labels;
use quizgate_core::question::{Question, QuestionKind};
use quizgate_core::timeline::{self, Marker, SeekOutcome};
use quizgate_core::trigger::Matcher;
use std::collections::HashSet;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Presentation states. At most one question is ever outside `Idle`.
#[derive(Debug, Clone, PartialEq)]
enum State {
    /// Playing; the matcher may select a question.
    Idle,
    /// Pause issued; waiting for fullscreen exit (or the settle delay) before showing.
    Pausing {
        question: usize,
        interrupted: bool,
        awaiting_exit: bool,
        deadline: Instant,
    },
    /// Modal is up.
    Active {
        question: usize,
        interrupted: bool,
        phase: Phase,
    },
}

#[derive(Debug, Clone, PartialEq)]
enum Phase {
    /// Continue is disabled until a selection exists.
    Awaiting { selection: Option<Response> },
    /// Feedback is on screen; continue is held until `until`.
    Feedback { until: Instant },
    /// Continue dismisses the modal.
    Ready,
}

/// Actions that the state machine wants the caller to perform.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Best-effort command for the player.
    Player(DaemonMsg),
    /// Update for the rendering surface.
    Render(DaemonMsg),
}

/// Last known player state.
#[derive(Debug, Clone, Copy, Default)]
struct PlayerState {
    attached: bool,
    position: f64,
    duration: f64,
    fullscreen: bool,
}

pub struct StateMachine {
    state: State,
    course: Option<String>,
    questions: Vec<Question>,
    /// Answered this session; reset on every load.
    answered: HashSet<String>,
    matcher: Matcher,
    player: PlayerState,
    markers_pending: bool,
    labels: Labels,
    api_base: String,
    exit_timeout: Duration,
    settle: Duration,
    feedback_hold: Duration,
    seek_margin: f64,
}

impl StateMachine {
    pub fn new(config: &Config) -> Self {
        Self {
            state: State::Idle,
            course: None,
            questions: Vec::new(),
            answered: HashSet::new(),
            matcher: Matcher::new(config.trigger.settings()),
            player: PlayerState::default(),
            markers_pending: false,
            labels: config.labels(),
            api_base: config.source.base_url.clone(),
            exit_timeout: Duration::from_millis(config.modal.fullscreen_exit_timeout_ms),
            settle: Duration::from_millis(config.modal.settle_ms),
            feedback_hold: Duration::from_millis(config.modal.feedback_hold_ms),
            seek_margin: config.timeline.seek_margin_s,
        }
    }

    /// Replace the question list for a course. Starts a fresh session:
    /// the answered set and trigger history are cleared.
    pub fn load_questions(&mut self, course_id: &str, questions: Vec<Question>) -> Vec<Action> {
        let mut actions = self.release();
        info!(course = %course_id, count = questions.len(), "questions loaded");
        self.course = Some(course_id.to_string());
        self.questions = questions;
        self.answered.clear();
        self.matcher.reset();
        self.markers_pending = true;
        actions.extend(self.render_markers());
        actions
    }

    /// Drop the question list and release any active question.
    pub fn unload(&mut self) -> Vec<Action> {
        let mut actions = self.release();
        self.course = None;
        self.questions.clear();
        self.answered.clear();
        self.matcher.reset();
        self.markers_pending = false;
        actions.push(Action::Render(DaemonMsg::Markers { markers: Vec::new() }));
        actions
    }

    pub fn attach_player(&mut self) {
        self.player = PlayerState {
            attached: true,
            ..PlayerState::default()
        };
        self.markers_pending = !self.questions.is_empty();
    }

    /// The player went away. Any question on screen is force-released.
    pub fn detach_player(&mut self) -> Vec<Action> {
        self.player.attached = false;
        let was_busy = self.state != State::Idle;
        self.state = State::Idle;
        if was_busy {
            debug!("player detached, releasing question");
            vec![Action::Render(DaemonMsg::HideQuestion)]
        } else {
            Vec::new()
        }
    }

    pub fn on_player_state(&mut self, position: f64, duration: f64, fullscreen: bool) -> Vec<Action> {
        self.on_player_state_at(position, duration, fullscreen, Instant::now())
    }

    /// Feed one playback sample: update progress and markers, then run the matcher.
    pub fn on_player_state_at(
        &mut self,
        position: f64,
        duration: f64,
        fullscreen: bool,
        now: Instant,
    ) -> Vec<Action> {
        if !self.player.attached {
            debug!(position, "no player attached, ignoring sample");
            return Vec::new();
        }
        self.player.position = position;
        self.player.duration = duration;
        self.player.fullscreen = fullscreen;

        let mut actions = Vec::new();
        if let Some(fraction) = timeline::progress(position, duration) {
            actions.push(Action::Render(DaemonMsg::Progress { fraction }));
        }
        if self.markers_pending {
            actions.extend(self.render_markers());
        }

        let active = self.state != State::Idle;
        if let Some(idx) = self
            .matcher
            .select(position, &self.questions, &self.answered, active, now)
        {
            actions.extend(self.begin(idx, now));
        }
        actions
    }

    pub fn on_fullscreen_changed(&mut self, fullscreen: bool) -> Vec<Action> {
        if !self.player.attached {
            return Vec::new();
        }
        self.player.fullscreen = fullscreen;
        match self.state {
            State::Pausing {
                question,
                interrupted,
                awaiting_exit: true,
                ..
            } if !fullscreen => {
                debug!("fullscreen exited, showing question");
                self.show(question, interrupted)
            }
            _ => Vec::new(),
        }
    }

    /// Single-select an option of the active choice question.
    pub fn select_option(&mut self, index: usize) -> Vec<Action> {
        let Some(question) = self.active_question() else {
            return Vec::new();
        };
        let count = match question.kind {
            QuestionKind::MultipleChoice => question.options.len(),
            QuestionKind::TrueFalse => 2,
            QuestionKind::Text => 0,
        };
        if index >= count {
            return Vec::new();
        }
        let label = self.labels.answer_to_continue.clone();
        if let State::Active {
            phase: Phase::Awaiting { selection },
            ..
        } = &mut self.state
        {
            *selection = Some(Response::Choice { index });
            return vec![
                Action::Render(DaemonMsg::SelectOption { index }),
                Action::Render(DaemonMsg::SetContinue { enabled: true, label }),
            ];
        }
        Vec::new()
    }

    /// Track the text input of the active text question.
    pub fn text_input(&mut self, text: &str) -> Vec<Action> {
        let Some(question) = self.active_question() else {
            return Vec::new();
        };
        if question.kind != QuestionKind::Text {
            return Vec::new();
        }
        let trimmed = text.trim();
        let label = self.labels.answer_to_continue.clone();
        if let State::Active {
            phase: Phase::Awaiting { selection },
            ..
        } = &mut self.state
        {
            *selection = (!trimmed.is_empty()).then(|| Response::Text {
                text: trimmed.to_string(),
            });
            return vec![Action::Render(DaemonMsg::SetContinue {
                enabled: selection.is_some(),
                label,
            })];
        }
        Vec::new()
    }

    pub fn continue_pressed(&mut self) -> Vec<Action> {
        self.continue_pressed_at(Instant::now())
    }

    /// Continue/confirm. Submits the pending answer, or dismisses once allowed.
    pub fn continue_pressed_at(&mut self, now: Instant) -> Vec<Action> {
        let State::Active {
            question,
            interrupted,
            phase,
        } = &self.state
        else {
            return Vec::new();
        };
        let (question, interrupted) = (*question, *interrupted);

        match phase {
            Phase::Ready => self.dismiss(interrupted),
            Phase::Feedback { .. } | Phase::Awaiting { selection: None } => Vec::new(),
            Phase::Awaiting {
                selection: Some(response),
            } => {
                let response = response.clone();
                self.submit(question, interrupted, &response, now)
            }
        }
    }

    /// Click on the timeline track; forward skips over unanswered questions are gated.
    /// `current` is the live position reported with the click; the last sample is
    /// used when it is missing or unusable.
    pub fn timeline_click(&mut self, fraction: f64, current: Option<f64>) -> Vec<Action> {
        if self.state != State::Idle {
            debug!("ignoring timeline click while a question is up");
            return Vec::new();
        }
        let Some(target) = timeline::seek_target(fraction, self.player.duration) else {
            return Vec::new();
        };
        let current = current
            .filter(|p| p.is_finite() && *p >= 0.0)
            .unwrap_or(self.player.position);
        match timeline::gate_seek(
            current,
            target,
            &self.questions,
            &self.answered,
            self.seek_margin,
        ) {
            SeekOutcome::Proceed(position) => {
                self.player.position = position;
                vec![Action::Player(DaemonMsg::Seek { position })]
            }
            SeekOutcome::Blocked {
                position,
                question_id,
            } => {
                info!(question = %question_id, target, position, "blocked skip over unanswered question");
                self.player.position = position;
                vec![
                    Action::Player(DaemonMsg::Seek { position }),
                    Action::Player(DaemonMsg::Pause),
                ]
            }
        }
    }

    /// Jump straight to a marker's question. Not gated.
    pub fn marker_activate(&mut self, index: usize) -> Vec<Action> {
        if self.state != State::Idle {
            return Vec::new();
        }
        let Some(question) = self.questions.get(index) else {
            return Vec::new();
        };
        let position = question.timestamp;
        debug!(question = %question.id, position, "jumping to marker");
        self.player.position = position;
        vec![Action::Player(DaemonMsg::Seek { position })]
    }

    pub fn check_timer(&mut self) -> Vec<Action> {
        self.check_timer_at(Instant::now())
    }

    /// Fire the pending deadline if it has passed.
    pub fn check_timer_at(&mut self, now: Instant) -> Vec<Action> {
        match self.state {
            State::Pausing {
                question,
                interrupted,
                awaiting_exit,
                deadline,
            } if now >= deadline => {
                if awaiting_exit {
                    debug!("fullscreen exit not observed, showing question anyway");
                }
                self.show(question, interrupted)
            }
            State::Active {
                question,
                interrupted,
                phase: Phase::Feedback { until },
            } if now >= until => {
                self.state = State::Active {
                    question,
                    interrupted,
                    phase: Phase::Ready,
                };
                vec![Action::Render(DaemonMsg::SetContinue {
                    enabled: true,
                    label: self.labels.continue_video.clone(),
                })]
            }
            _ => Vec::new(),
        }
    }

    /// Return the next `Instant` at which `check_timer()` needs to run,
    /// or `None` if no timer is needed.
    pub fn next_deadline(&self) -> Option<Instant> {
        match &self.state {
            State::Pausing { deadline, .. } => Some(*deadline),
            State::Active {
                phase: Phase::Feedback { until },
                ..
            } => Some(*until),
            _ => None,
        }
    }

    /// Whether the daemon should poll a player that does not push time updates.
    pub fn wants_poll(&self) -> bool {
        self.player.attached && !self.questions.is_empty() && self.state == State::Idle
    }

    /// Tear down: release any question and forget the course.
    pub fn dispose(&mut self) -> Vec<Action> {
        let actions = self.unload();
        self.player = PlayerState::default();
        actions
    }

    pub fn markers(&self) -> Option<Vec<Marker>> {
        timeline::build_markers(
            &self.questions,
            &self.answered,
            self.player.duration,
            &self.labels,
        )
    }

    pub fn course(&self) -> Option<&str> {
        self.course.as_deref()
    }

    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    pub fn answered_count(&self) -> usize {
        self.answered.len()
    }

    pub fn state_name(&self) -> &'static str {
        match self.state {
            State::Idle => "idle",
            State::Pausing { .. } => "pausing",
            State::Active { .. } => "active",
        }
    }

    fn active_question(&self) -> Option<&Question> {
        match self.state {
            State::Active { question, .. } => self.questions.get(question),
            _ => None,
        }
    }

    /// Idle -> Pausing (or straight to Active when there is nothing to wait for).
    fn begin(&mut self, idx: usize, now: Instant) -> Vec<Action> {
        let interrupted = self.player.attached;
        let mut actions = Vec::new();
        if interrupted {
            actions.push(Action::Player(DaemonMsg::Pause));
        }

        if self.player.fullscreen {
            actions.push(Action::Player(DaemonMsg::ExitFullscreen));
            self.state = State::Pausing {
                question: idx,
                interrupted,
                awaiting_exit: true,
                deadline: now + self.exit_timeout,
            };
        } else if !self.settle.is_zero() {
            self.state = State::Pausing {
                question: idx,
                interrupted,
                awaiting_exit: false,
                deadline: now + self.settle,
            };
        } else {
            actions.extend(self.show(idx, interrupted));
        }
        actions
    }

    /// Enter Active and render the question.
    fn show(&mut self, idx: usize, interrupted: bool) -> Vec<Action> {
        let Some(question) = self.questions.get(idx) else {
            self.state = State::Idle;
            return Vec::new();
        };
        let already_answered = self.answered.contains(&question.id);
        let options = match question.kind {
            QuestionKind::MultipleChoice => question.options.clone(),
            QuestionKind::TrueFalse => self.labels.true_false_options(),
            QuestionKind::Text => Vec::new(),
        };
        let view = QuestionView {
            id: question.id.clone(),
            kind: question.kind,
            prompt: question.prompt.clone(),
            image: question.resolve_image(&self.api_base),
            options,
            text_input: question.kind == QuestionKind::Text,
            already_answered,
        };
        debug!(question = %view.id, kind = ?view.kind, already_answered, "showing question");

        let (phase, label) = if already_answered {
            (Phase::Ready, self.labels.continue_video.clone())
        } else {
            (
                Phase::Awaiting { selection: None },
                self.labels.answer_to_continue.clone(),
            )
        };
        self.state = State::Active {
            question: idx,
            interrupted,
            phase,
        };
        vec![
            Action::Render(DaemonMsg::ShowQuestion { view }),
            Action::Render(DaemonMsg::SetContinue {
                enabled: already_answered,
                label,
            }),
        ]
    }

    /// Evaluate, mark answered and show feedback. Answering, not correctness,
    /// opens the gate.
    fn submit(
        &mut self,
        idx: usize,
        interrupted: bool,
        response: &Response,
        now: Instant,
    ) -> Vec<Action> {
        if idx >= self.questions.len() {
            return self.dismiss(interrupted);
        }
        let question = &self.questions[idx];
        let eval = evaluate::evaluate(question, response, &self.labels);
        info!(question = %question.id, correct = eval.correct, "answer submitted");
        self.answered.insert(question.id.clone());

        let mut actions = vec![
            Action::Render(DaemonMsg::Feedback {
                correct: eval.correct,
                title: if eval.correct {
                    self.labels.correct_title.clone()
                } else {
                    self.labels.incorrect_title.clone()
                },
                correct_answer: eval.correct_answer,
                correct_answer_prefix: self.labels.correct_answer_prefix.clone(),
                explanation: eval
                    .explanation
                    .unwrap_or_else(|| self.labels.no_explanation.clone()),
            }),
        ];
        self.markers_pending = true;
        actions.extend(self.render_markers());

        if self.feedback_hold.is_zero() {
            self.state = State::Active {
                question: idx,
                interrupted,
                phase: Phase::Ready,
            };
            actions.push(Action::Render(DaemonMsg::SetContinue {
                enabled: true,
                label: self.labels.continue_video.clone(),
            }));
        } else {
            self.state = State::Active {
                question: idx,
                interrupted,
                phase: Phase::Feedback {
                    until: now + self.feedback_hold,
                },
            };
            actions.push(Action::Render(DaemonMsg::SetContinue {
                enabled: false,
                label: self.labels.answer_to_continue.clone(),
            }));
        }
        actions
    }

    /// Active -> Idle: hide the modal and resume playback if we paused it.
    fn dismiss(&mut self, interrupted: bool) -> Vec<Action> {
        debug!("question dismissed");
        self.state = State::Idle;
        let mut actions = vec![Action::Render(DaemonMsg::HideQuestion)];
        if interrupted && self.player.attached {
            actions.push(Action::Player(DaemonMsg::Play));
        }
        actions
    }

    /// Force-release whatever is on screen without evaluating.
    fn release(&mut self) -> Vec<Action> {
        match self.state {
            State::Idle => Vec::new(),
            State::Pausing { interrupted, .. } | State::Active { interrupted, .. } => {
                self.dismiss(interrupted)
            }
        }
    }

    fn render_markers(&mut self) -> Vec<Action> {
        match self.markers() {
            Some(markers) => {
                self.markers_pending = false;
                vec![Action::Render(DaemonMsg::Markers { markers })]
            }
            None => Vec::new(),
        }
    }

    #[cfg(test)]
    fn is_idle(&self) -> bool {
        self.state == State::Idle
    }
}
