//! C11 — AdminConsole: a synchronous line REPL read from the operator's
//! stdin (§4.10, §9 "run it on a dedicated thread ... inject commands into
//! the match controller via the same serialization boundary as network
//! messages"). Runs on a blocking thread so it never occupies an async
//! worker; every command goes through the same `MatchController` methods
//! the session loop uses, so there is exactly one lock for all state
//! mutation.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::coordinator::{AdminError, MatchController};
use crate::turn::RotatePolicy;

const LOG_TARGET: &str = "hascill::admin";

/// Run the REPL until `quit` or the shutdown token fires. Intended to be
/// spawned with `tokio::task::spawn_blocking`.
pub fn run_repl(controller: Arc<MatchController>, shutdown: CancellationToken) {
    let stdin = io::stdin();
    print_help();
    loop {
        print!("hascill> ");
        let _ = io::stdout().flush();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).unwrap_or(0) == 0 {
            break; // stdin closed (e.g. running as a daemon)
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let tokens = match shell_words::split(line) {
            Ok(t) => t,
            Err(e) => {
                println!("error: could not parse command: {e}");
                continue;
            }
        };
        let Some((cmd, args)) = tokens.split_first() else {
            continue;
        };

        if cmd == "quit" {
            println!("shutting down; final scoreboard:");
            print_scoreboard(&controller);
            shutdown.cancel();
            break;
        }

        if let Err(e) = dispatch(&controller, cmd, args) {
            println!("error: {e}");
        }
    }
}

fn dispatch(controller: &Arc<MatchController>, cmd: &str, args: &[String]) -> Result<(), AdminError> {
    match cmd {
        "kick" => {
            let team = parse_team(args.first())?;
            let client_id = args.get(1).map(|s| s.parse::<u64>()).transpose().map_err(|_| AdminError::BadArgs("client_id must be a number".into()))?;
            controller.kick(team, client_id)?;
            println!("kicked team {team} client {client_id:?}");
            Ok(())
        }
        "start-now" => {
            controller.start_now();
            println!("forcing start, ignoring ready gate");
            Ok(())
        }
        "set-message" => {
            let msg = parse_challenge_token(args.first(), "set-message")?;
            controller.set_message(msg);
            println!("message updated; match reset");
            Ok(())
        }
        "set-password" => {
            let pw = parse_challenge_token(args.first(), "set-password")?;
            controller.set_password(pw);
            println!("password updated; match reset");
            Ok(())
        }
        "pause" => {
            controller.pause();
            println!("match paused");
            Ok(())
        }
        "resume" => {
            controller.resume();
            println!("match resumed");
            Ok(())
        }
        "reset" => {
            controller.reset();
            println!("match reset");
            Ok(())
        }
        "set-rotate" => {
            let policy = match args.first().map(String::as_str) {
                Some("phase") => RotatePolicy::Phase,
                Some("block") => RotatePolicy::Block,
                _ => return Err(AdminError::BadArgs("usage: set-rotate phase|block".into())),
            };
            controller.set_rotate(policy)?;
            println!("rotate policy set to {args:?}");
            Ok(())
        }
        "status" => {
            print_status(controller);
            Ok(())
        }
        "team-info" => {
            let team = parse_team(args.first())?;
            let info = controller.team_info(team)?;
            println!("{info:#?}");
            Ok(())
        }
        "broadcast" => {
            let text = args.join(" ");
            if text.is_empty() {
                return Err(AdminError::BadArgs("usage: broadcast \"<text>\"".into()));
            }
            controller.broadcast_text(text);
            println!("broadcast sent");
            Ok(())
        }
        "help" => {
            print_help();
            Ok(())
        }
        other => Err(AdminError::BadArgs(format!("unknown command: {other}"))),
    }
}

fn parse_team(arg: Option<&String>) -> Result<u32, AdminError> {
    arg.ok_or_else(|| AdminError::BadArgs("team number required".into()))?
        .parse::<u32>()
        .map_err(|_| AdminError::BadArgs("team must be a number".into()))
}

/// `set-message`/`set-password` both take exactly 4 ASCII characters
/// (spec §4.10, §6): `Phase::expected_arity` hardcodes arity 4 for
/// `TPW`/`TMSG`, so any other length permanently breaks that match's ASCII
/// phases with no further operator-facing error.
fn parse_challenge_token(arg: Option<&String>, cmd: &str) -> Result<String, AdminError> {
    let token = arg.ok_or_else(|| AdminError::BadArgs(format!("usage: {cmd} <4-ASCII>")))?;
    if token.len() != 4 || !token.is_ascii() {
        return Err(AdminError::BadArgs(format!(
            "{cmd} requires exactly 4 ASCII characters, got {token:?}"
        )));
    }
    Ok(token.clone())
}

fn print_status(controller: &Arc<MatchController>) {
    let snap = controller.status();
    println!(
        "start={} paused={} game_over={} winner={:?} rotate={:?}",
        snap.start_flag, snap.paused, snap.game_over, snap.winner_team, snap.rotate
    );
    println!("password={} message={}", snap.password, snap.message);
    for team in &snap.teams {
        println!(
            "  team {}: connected={} ready={} phase={} blocks={}/{} errors={}",
            team.team_id, team.connected, team.ready_count, team.phase, team.blocks_done, team.total_blocks, team.errors
        );
    }
}

fn print_scoreboard(controller: &Arc<MatchController>) {
    for row in controller.quit() {
        println!(
            "  team {} finished={} blocks={}/{} errors={} time={:?}",
            row.team, row.finished, row.blocks_done, row.total_blocks, row.errors, row.time_sec
        );
    }
}

fn print_help() {
    info!(target: LOG_TARGET, "admin console ready");
    println!(
        "commands: kick <team> [client_id] | start-now | set-message <4-ASCII> | set-password <4-ASCII> | \
         pause | resume | reset | set-rotate phase|block | status | team-info <team> | broadcast \"<text>\" | help | quit"
    );
}
