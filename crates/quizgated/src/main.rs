mod dispatch;
mod source;
mod state_machine;

use anyhow::{Context, Result};
use dispatch::Outputs;
use quizgate_core::config::{self, Config};
use quizgate_core::ipc::{self, ClientMsg, DaemonMsg};
use source::QuestionSource;
use state_machine::{Action, StateMachine};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{mpsc, Mutex, Notify};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Shared state between the event loop and IPC handlers.
struct Shared {
    sm: StateMachine,
    outputs: Outputs<mpsc::UnboundedSender<String>>,
    /// The attached player pushes `player_state` itself; no polling needed.
    player_pushes: bool,
    /// Connection id of the attached player.
    player_conn: Option<u64>,
}

/// What a connection registered as.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Role {
    Control,
    Player,
    Overlay,
}

/// Handles cloned into every IPC task.
#[derive(Clone)]
struct Ctx {
    shared: Arc<Mutex<Shared>>,
    source: Arc<dyn QuestionSource>,
    /// Poked after every mutation so the event loop recomputes its deadline.
    wake: Arc<Notify>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("quizgated=info".parse().unwrap()),
        )
        .init();

    info!("quizgated starting");

    let config = Config::load().context("loading config")?;
    info!(
        locale = %config.locale.active,
        tolerance_s = config.trigger.tolerance_s,
        "config loaded"
    );
    let source = source::from_config(&config.source).context("creating question source")?;

    let ctx = Ctx {
        shared: Arc::new(Mutex::new(Shared {
            sm: StateMachine::new(&config),
            outputs: Outputs::default(),
            player_pushes: false,
            player_conn: None,
        })),
        source,
        wake: Arc::new(Notify::new()),
    };

    // Start IPC listener
    let socket_path = config::socket_path();
    // Remove stale socket
    let _ = std::fs::remove_file(&socket_path);
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("creating {}", parent.display()))?;
    }
    let listener = UnixListener::bind(&socket_path)
        .with_context(|| format!("binding socket {}", socket_path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(&socket_path, std::fs::Permissions::from_mode(0o600)).ok();
    }
    info!(path = %socket_path.display(), "IPC socket listening");

    let ctx_ipc = ctx.clone();
    tokio::spawn(async move {
        let mut next_conn: u64 = 0;
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    next_conn += 1;
                    tokio::spawn(handle_ipc_client(stream, next_conn, ctx_ipc.clone()));
                }
                Err(e) => {
                    warn!(error = %e, "IPC accept error");
                }
            }
        }
    });

    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    // Main event loop: sleeps until the state machine's next deadline, a poll
    // tick, or a wake-up from an IPC handler.
    loop {
        let (deadline, polling) = {
            let shared = ctx.shared.lock().await;
            (
                shared.sm.next_deadline(),
                shared.sm.wants_poll() && !shared.player_pushes,
            )
        };
        let sleep_fut = match deadline {
            Some(dl) => tokio::time::sleep_until(tokio::time::Instant::from_std(dl)),
            None => tokio::time::sleep_until(
                tokio::time::Instant::now() + Duration::from_secs(86400),
            ),
        };
        let has_deadline = deadline.is_some();

        tokio::select! {
            _ = sleep_fut, if has_deadline => {
                let mut shared = ctx.shared.lock().await;
                let actions = shared.sm.check_timer();
                shared.outputs.dispatch(actions);
            }
            _ = poll.tick(), if polling => {
                let mut shared = ctx.shared.lock().await;
                shared.outputs.dispatch(vec![Action::Player(DaemonMsg::QueryPlayer)]);
            }
            _ = ctx.wake.notified() => {}
            res = &mut shutdown => {
                if let Err(e) = res {
                    warn!(error = %e, "signal handler failed");
                }
                break;
            }
        }
    }

    info!("quizgated shutting down");
    {
        let mut shared = ctx.shared.lock().await;
        let actions = shared.sm.dispose();
        shared.outputs.dispatch(actions);
    }
    let _ = std::fs::remove_file(&socket_path);
    Ok(())
}

/// Fetch a course without holding the lock, then install it.
async fn load_course(ctx: &Ctx, course_id: &str) -> usize {
    let questions = source::load_or_empty(ctx.source.as_ref(), course_id).await;
    let mut shared = ctx.shared.lock().await;
    let count = questions.len();
    let actions = shared.sm.load_questions(course_id, questions);
    shared.outputs.dispatch(actions);
    count
}

fn send(tx: &mpsc::UnboundedSender<String>, msg: &DaemonMsg) {
    let _ = tx.send(ipc::encode(msg));
}

fn ack(tx: &mpsc::UnboundedSender<String>, ok: bool, message: impl Into<String>) {
    send(
        tx,
        &DaemonMsg::Ack {
            ok,
            message: message.into(),
        },
    );
}

async fn handle_ipc_client(stream: UnixStream, conn: u64, ctx: Ctx) {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    // Channel for sending messages back to this client
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    // Writer task
    let write_handle = tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            if writer.write_all(line.as_bytes()).await.is_err() {
                break;
            }
        }
    });

    let mut role = Role::Control;

    while let Ok(Some(line)) = lines.next_line().await {
        let Some(msg) = ipc::decode_client(&line) else {
            debug!(conn, "ignoring malformed IPC line");
            continue;
        };

        match msg {
            // Loads await the question source, so they run outside the lock.
            ClientMsg::Load { course_id } => {
                info!(conn, course = %course_id, "load requested");
                let count = load_course(&ctx, &course_id).await;
                ack(&tx, true, format!("loaded {count} questions for {course_id}"));
            }
            ClientMsg::RegisterPlayer {
                course_id,
                time_updates,
            } => {
                {
                    let mut shared = ctx.shared.lock().await;
                    if shared.player_conn.is_some() {
                        info!(conn, "replacing attached player");
                        let actions = shared.sm.detach_player();
                        shared.outputs.dispatch(actions);
                    }
                    role = Role::Player;
                    shared.outputs.player = Some(tx.clone());
                    shared.player_conn = Some(conn);
                    shared.player_pushes = time_updates;
                    shared.sm.attach_player();
                }
                info!(conn, time_updates, "player registered");
                ack(&tx, true, "player registered");
                if let Some(course_id) = course_id {
                    load_course(&ctx, &course_id).await;
                }
            }
            msg => {
                let mut shared = ctx.shared.lock().await;
                handle_msg(&mut shared, msg, conn, &tx, &mut role);
            }
        }
        ctx.wake.notify_one();
    }

    // Client disconnected
    {
        let mut shared = ctx.shared.lock().await;
        match role {
            Role::Player if shared.player_conn == Some(conn) => {
                info!(conn, "player disconnected");
                let actions = shared.sm.detach_player();
                shared.outputs.player = None;
                shared.player_conn = None;
                shared.player_pushes = false;
                shared.outputs.dispatch(actions);
            }
            Role::Overlay => {
                info!(conn, "overlay disconnected");
                shared.outputs.overlays.retain(|t| !t.is_closed() && !t.same_channel(&tx));
            }
            _ => {}
        }
    }
    ctx.wake.notify_one();

    write_handle.abort();
}

/// Messages that only need the lock.
fn handle_msg(
    shared: &mut Shared,
    msg: ClientMsg,
    conn: u64,
    tx: &mpsc::UnboundedSender<String>,
    role: &mut Role,
) {
    let actions = match msg {
        ClientMsg::RegisterOverlay => {
            *role = Role::Overlay;
            shared.outputs.overlays.push(tx.clone());
            info!(conn, overlays = shared.outputs.overlays.len(), "overlay registered");
            ack(tx, true, "overlay registered");
            if let Some(markers) = shared.sm.markers() {
                send(tx, &DaemonMsg::Markers { markers });
            }
            Vec::new()
        }
        // Only the attached player reports playback.
        ClientMsg::PlayerState { .. } | ClientMsg::FullscreenChanged { .. }
            if !(*role == Role::Player && shared.player_conn == Some(conn)) =>
        {
            debug!(conn, ?role, "ignoring playback report from non-player");
            Vec::new()
        }
        ClientMsg::PlayerState {
            position,
            duration,
            fullscreen,
        } => shared.sm.on_player_state(position, duration, fullscreen),
        ClientMsg::FullscreenChanged { fullscreen } => shared.sm.on_fullscreen_changed(fullscreen),
        ClientMsg::Select { index } => shared.sm.select_option(index),
        ClientMsg::TextInput { text } => shared.sm.text_input(&text),
        ClientMsg::Continue => shared.sm.continue_pressed(),
        ClientMsg::TimelineClick { fraction, position } => {
            shared.sm.timeline_click(fraction, position)
        }
        ClientMsg::MarkerActivate { index } => shared.sm.marker_activate(index),
        ClientMsg::Unload => {
            info!(conn, "unload requested");
            let actions = shared.sm.unload();
            ack(tx, true, "unloaded");
            actions
        }
        ClientMsg::GetStatus => {
            let status = DaemonMsg::Status {
                version: env!("CARGO_PKG_VERSION").to_string(),
                course: shared.sm.course().map(str::to_string),
                questions: shared.sm.question_count(),
                answered: shared.sm.answered_count(),
                state: shared.sm.state_name().to_string(),
                player: shared.player_conn.is_some(),
                overlays: shared.outputs.overlays.len(),
            };
            send(tx, &status);
            Vec::new()
        }
        ClientMsg::GetMarkers => {
            let markers = shared.sm.markers().unwrap_or_default();
            send(tx, &DaemonMsg::Markers { markers });
            Vec::new()
        }
        // Handled by the caller outside the lock.
        ClientMsg::Load { .. } | ClientMsg::RegisterPlayer { .. } => Vec::new(),
    };
    shared.outputs.dispatch(actions);
}
