use crate::question::QuestionKind;
use crate::timeline::Marker;
use serde::{Deserialize, Serialize};

/// What the overlay needs to render a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionView {
    pub id: String,
    pub kind: QuestionKind,
    pub prompt: String,
    pub image: Option<String>,
    /// Option labels; fixed localised pair for true/false, empty for text.
    pub options: Vec<String>,
    /// Render a free-text input.
    pub text_input: bool,
    /// The question was answered earlier this session; continue just dismisses.
    pub already_answered: bool,
}

/// Messages from daemon to player, overlay and control clients (JSON-lines over Unix socket).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum DaemonMsg {
    // Player commands.
    #[serde(rename = "pause")]
    Pause,
    #[serde(rename = "play")]
    Play,
    #[serde(rename = "seek")]
    Seek { position: f64 },
    #[serde(rename = "exit_fullscreen")]
    ExitFullscreen,
    /// Ask a polling-mode player for a `player_state` reply.
    #[serde(rename = "query_player")]
    QueryPlayer,

    // Rendering surface updates.
    #[serde(rename = "show_question")]
    ShowQuestion { view: QuestionView },
    #[serde(rename = "hide_question")]
    HideQuestion,
    /// Highlight exactly this option.
    #[serde(rename = "select_option")]
    SelectOption { index: usize },
    #[serde(rename = "set_continue")]
    SetContinue { enabled: bool, label: String },
    #[serde(rename = "feedback")]
    Feedback {
        correct: bool,
        title: String,
        correct_answer: String,
        correct_answer_prefix: String,
        explanation: String,
    },
    #[serde(rename = "markers")]
    Markers { markers: Vec<Marker> },
    #[serde(rename = "progress")]
    Progress { fraction: f64 },

    /// Status response.
    #[serde(rename = "status")]
    Status {
        version: String,
        course: Option<String>,
        questions: usize,
        answered: usize,
        state: String,
        player: bool,
        overlays: usize,
    },
    /// Acknowledgement for commands.
    #[serde(rename = "ack")]
    Ack { ok: bool, message: String },
}

/// Messages from clients to daemon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientMsg {
    /// Player client announcing itself. `time_updates` means it pushes
    /// `player_state` on its own; otherwise the daemon polls.
    #[serde(rename = "register_player")]
    RegisterPlayer {
        #[serde(default)]
        course_id: Option<String>,
        #[serde(default)]
        time_updates: bool,
    },
    /// Overlay client announcing itself (receives rendering updates).
    #[serde(rename = "register_overlay")]
    RegisterOverlay,
    /// Current playback state, pushed or in reply to `query_player`.
    #[serde(rename = "player_state")]
    PlayerState {
        position: f64,
        duration: f64,
        #[serde(default)]
        fullscreen: bool,
    },
    #[serde(rename = "fullscreen_changed")]
    FullscreenChanged { fullscreen: bool },
    /// User picked an option (0-indexed).
    #[serde(rename = "select")]
    Select { index: usize },
    /// Current content of the text answer input.
    #[serde(rename = "text_input")]
    TextInput { text: String },
    /// User pressed the continue/confirm control.
    #[serde(rename = "continue")]
    Continue,
    /// Click on the timeline track at this fraction of its length. `position`
    /// is the player's live time when the surface knows it.
    #[serde(rename = "timeline_click")]
    TimelineClick {
        fraction: f64,
        #[serde(default)]
        position: Option<f64>,
    },
    /// Marker clicked or keyboard-activated.
    #[serde(rename = "marker_activate")]
    MarkerActivate { index: usize },
    /// Load the questions of a course (resets the answered set).
    #[serde(rename = "load")]
    Load { course_id: String },
    #[serde(rename = "unload")]
    Unload,
    #[serde(rename = "get_status")]
    GetStatus,
    #[serde(rename = "get_markers")]
    GetMarkers,
}

/// Serialize a message as a JSON line (with trailing newline).
pub fn encode(msg: &impl Serialize) -> String {
    let mut s = serde_json::to_string(msg).expect("serialize IPC message");
    s.push('\n');
    s
}

/// Deserialize a JSON line. Returns None on empty/whitespace input.
pub fn decode_daemon(line: &str) -> Option<DaemonMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

pub fn decode_client(line: &str) -> Option<ClientMsg> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}
