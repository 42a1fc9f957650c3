use crate::state_machine::Action;
use anyhow::{anyhow, Result};
use quizgate_core::ipc::{self, DaemonMsg};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Something that accepts encoded JSON lines for one connected client.
pub trait Sink {
    fn deliver(&mut self, line: &str) -> Result<()>;
}

impl Sink for mpsc::UnboundedSender<String> {
    fn deliver(&mut self, line: &str) -> Result<()> {
        self.send(line.to_string())
            .map_err(|_| anyhow!("client disconnected"))
    }
}

/// Where actions go: one player, any number of overlays.
pub struct Outputs<S> {
    pub player: Option<S>,
    pub overlays: Vec<S>,
}

impl<S> Default for Outputs<S> {
    fn default() -> Self {
        Self {
            player: None,
            overlays: Vec::new(),
        }
    }
}

impl<S: Sink> Outputs<S> {
    pub fn dispatch(&mut self, actions: Vec<Action>) {
        for action in actions {
            match action {
                Action::Player(msg) => self.command_player(&msg),
                Action::Render(msg) => self.render(&msg),
            }
        }
    }

    /// Player commands are best-effort: a failed send is logged and dropped.
    fn command_player(&mut self, msg: &DaemonMsg) {
        let Some(player) = self.player.as_mut() else {
            debug!(?msg, "no player attached, dropping command");
            return;
        };
        if let Err(e) = player.deliver(&ipc::encode(msg)) {
            warn!(error = %e, ?msg, "player command failed");
        }
    }

    /// Rendering goes to overlays. Without a live overlay the player client
    /// renders instead, so a question never stays invisibly blocking playback.
    fn render(&mut self, msg: &DaemonMsg) {
        let line = ipc::encode(msg);
        self.overlays.retain_mut(|overlay| overlay.deliver(&line).is_ok());
        if !self.overlays.is_empty() {
            return;
        }
        match self.player.as_mut() {
            Some(player) => {
                if let Err(e) = player.deliver(&line) {
                    warn!(error = %e, "fallback render via player failed");
                }
            }
            None => debug!("no rendering surface attached"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Records delivered lines; can be told to fail.
    #[derive(Clone, Default)]
    struct Recorder {
        lines: Rc<RefCell<Vec<String>>>,
        broken: bool,
    }

    impl Sink for Recorder {
        fn deliver(&mut self, line: &str) -> Result<()> {
            if self.broken {
                anyhow::bail!("broken pipe");
            }
            self.lines.borrow_mut().push(line.to_string());
            Ok(())
        }
    }

    impl Recorder {
        fn broken() -> Self {
            Self {
                broken: true,
                ..Self::default()
            }
        }
        fn decoded(&self) -> Vec<DaemonMsg> {
            self.lines
                .borrow()
                .iter()
                .filter_map(|l| ipc::decode_daemon(l))
                .collect()
        }
    }

    #[test]
    fn player_commands_go_to_player_only() {
        let player = Recorder::default();
        let overlay = Recorder::default();
        let mut out = Outputs {
            player: Some(player.clone()),
            overlays: vec![overlay.clone()],
        };
        out.dispatch(vec![Action::Player(DaemonMsg::Pause)]);
        assert_eq!(player.decoded(), vec![DaemonMsg::Pause]);
        assert!(overlay.decoded().is_empty());
    }

    #[test]
    fn render_goes_to_overlays_not_player() {
        let player = Recorder::default();
        let overlay = Recorder::default();
        let mut out = Outputs {
            player: Some(player.clone()),
            overlays: vec![overlay.clone()],
        };
        out.dispatch(vec![Action::Render(DaemonMsg::HideQuestion)]);
        assert_eq!(overlay.decoded(), vec![DaemonMsg::HideQuestion]);
        assert!(player.decoded().is_empty());
    }

    #[test]
    fn render_falls_back_to_player_without_overlay() {
        let player = Recorder::default();
        let mut out = Outputs {
            player: Some(player.clone()),
            overlays: Vec::new(),
        };
        out.dispatch(vec![Action::Render(DaemonMsg::HideQuestion)]);
        assert_eq!(player.decoded(), vec![DaemonMsg::HideQuestion]);
    }

    #[test]
    fn broken_overlay_is_dropped_and_player_renders() {
        let player = Recorder::default();
        let mut out = Outputs {
            player: Some(player.clone()),
            overlays: vec![Recorder::broken()],
        };
        out.dispatch(vec![Action::Render(DaemonMsg::HideQuestion)]);
        assert!(out.overlays.is_empty());
        assert_eq!(player.decoded(), vec![DaemonMsg::HideQuestion]);
    }

    #[test]
    fn failing_player_does_not_stop_later_actions() {
        let overlay = Recorder::default();
        let mut out = Outputs {
            player: Some(Recorder::broken()),
            overlays: vec![overlay.clone()],
        };
        out.dispatch(vec![
            Action::Player(DaemonMsg::Pause),
            Action::Render(DaemonMsg::HideQuestion),
            Action::Player(DaemonMsg::Play),
        ]);
        assert_eq!(overlay.decoded(), vec![DaemonMsg::HideQuestion]);
        assert!(out.player.is_some());
    }

    #[test]
    fn no_outputs_is_harmless() {
        let mut out: Outputs<Recorder> = Outputs::default();
        out.dispatch(vec![
            Action::Player(DaemonMsg::Pause),
            Action::Render(DaemonMsg::HideQuestion),
        ]);
    }
}
