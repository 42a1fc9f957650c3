use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use quizgate_core::config;
use quizgate_core::ipc::{self, ClientMsg, DaemonMsg};
use quizgate_core::timeline::{Marker, MarkerState};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;

#[derive(Parser)]
#[command(name = "quizctl", about = "Control the quizgated daemon")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show daemon status
    Status,
    /// Load the questions of a course (resets answered questions)
    Load {
        /// Course id as known to the course API
        course_id: String,
    },
    /// Drop the loaded course
    Unload,
    /// List timeline markers for the loaded course
    Markers,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let socket_path = config::socket_path();
    let stream = UnixStream::connect(&socket_path).with_context(|| {
        format!(
            "connecting to quizgated at {}\nIs the daemon running?",
            socket_path.display()
        )
    })?;

    let mut writer = stream.try_clone().context("cloning stream")?;
    let reader = BufReader::new(stream);

    let msg: ClientMsg = match cli.command {
        Command::Status => ClientMsg::GetStatus,
        Command::Load { course_id } => ClientMsg::Load { course_id },
        Command::Unload => ClientMsg::Unload,
        Command::Markers => ClientMsg::GetMarkers,
    };

    let line = ipc::encode(&msg);
    writer
        .write_all(line.as_bytes())
        .context("sending command")?;

    // Read response
    for line in reader.lines() {
        let line = line.context("reading response")?;
        if let Some(resp) = ipc::decode_daemon(&line) {
            match resp {
                DaemonMsg::Status {
                    version,
                    course,
                    questions,
                    answered,
                    state,
                    player,
                    overlays,
                } => {
                    println!("quizgated v{}", version);
                    println!("  course:    {}", course.as_deref().unwrap_or("-"));
                    println!("  questions: {} ({} answered)", questions, answered);
                    println!("  state:     {}", state);
                    println!("  player:    {}", if player { "attached" } else { "none" });
                    println!("  overlays:  {}", overlays);
                }
                DaemonMsg::Markers { markers } => print_markers(&markers),
                DaemonMsg::Ack { ok, message } => {
                    if ok {
                        println!("{}", message);
                    } else {
                        eprintln!("error: {}", message);
                        std::process::exit(1);
                    }
                }
                _ => continue,
            }
            break;
        }
    }

    Ok(())
}

fn print_markers(markers: &[Marker]) {
    if markers.is_empty() {
        println!("no markers (no course loaded or duration unknown)");
        return;
    }
    for marker in markers {
        let mark = match marker.state {
            MarkerState::Answered => "x",
            MarkerState::Upcoming => " ",
        };
        println!(
            "[{}] {:>5.1}%  {}  {}",
            mark,
            marker.fraction * 100.0,
            marker.question_id,
            marker.tooltip
        );
    }
}
