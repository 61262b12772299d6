//! C9 — SessionLoop: the strictly sequential per-connection protocol
//! handler (§4.8). One task owns the reader half and runs this loop; a
//! second task (spawned here) owns the writer half and just drains the
//! connection's outbound channel, so a slow client can never stall another
//! client's broadcast.

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::config::PROTO_VERSION;
use crate::coordinator::{JoinError, MatchController};
use crate::net::{read_frame, write_frame, ClientMessage, ServerMessage};

const LOG_TARGET: &str = "hascill::session";

/// Drive one accepted connection end to end. `reader`/`writer` are split
/// halves of the same stream (or, in tests, of an in-memory duplex pipe).
pub async fn run_session<R, W>(reader: R, mut writer: W, controller: Arc<MatchController>)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let mut reader = reader;

    let hello = ServerMessage::Hello {
        proto: PROTO_VERSION,
        msg: "welcome to HASCILL crypto race".to_string(),
    };
    if write_frame(&mut writer, &hello).await.is_err() {
        return;
    }

    let team_id = match read_frame::<ClientMessage, _>(&mut reader).await {
        Ok(ClientMessage::Join { team }) => team,
        Ok(_) => {
            let _ = write_frame(&mut writer, &ServerMessage::error("first message must be join")).await;
            return;
        }
        Err(_) => return,
    };

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<ServerMessage>();
    let (outcome, kill) = match controller.join(team_id, outbound_tx.clone()) {
        Ok(pair) => pair,
        Err(JoinError::BadTeam(max)) => {
            let _ = write_frame(&mut writer, &ServerMessage::error(format!("team must be between 1 and {max}"))).await;
            return;
        }
    };
    let cid = outcome.client_id;

    info!(target: LOG_TARGET, team = team_id, client_id = cid, "session started");

    // Writer task: the only thing allowed to touch the socket's write half.
    let writer_task = tokio::spawn(async move {
        while let Some(msg) = outbound_rx.recv().await {
            if write_frame(&mut writer, &msg).await.is_err() {
                break;
            }
        }
        let _ = writer.shutdown().await;
    });

    let joined = ServerMessage::Joined {
        team: team_id,
        your_id: cid,
        info: outcome.info,
    };
    let _ = outbound_tx.send(joined);

    controller.announce_join(team_id);
    controller.send_ready_task(team_id, cid);
    controller.send_turn_status(team_id);

    loop {
        tokio::select! {
            biased;
            _ = kill.cancelled() => {
                debug!(target: LOG_TARGET, team = team_id, client_id = cid, "connection killed by admin");
                break;
            }
            frame = read_frame::<ClientMessage, _>(&mut reader) => {
                match frame {
                    Ok(ClientMessage::Join { .. }) => {
                        let _ = outbound_tx.send(ServerMessage::hint("already joined"));
                    }
                    Ok(ClientMessage::Ready {}) => {
                        controller.mark_ready(team_id, cid);
                    }
                    Ok(ClientMessage::StepAnswer { phase, block, vector }) => {
                        controller.step_answer(team_id, cid, phase, block, vector);
                    }
                    Ok(ClientMessage::Pong { .. }) => {
                        controller.pong(team_id, cid);
                    }
                    Err(e) => {
                        debug!(target: LOG_TARGET, team = team_id, client_id = cid, error = %e, "disconnecting");
                        break;
                    }
                }
            }
        }
    }

    controller.disconnect(team_id, cid);
    drop(outbound_tx);
    let _ = writer_task.await;
    warn!(target: LOG_TARGET, team = team_id, client_id = cid, "session ended");
}
