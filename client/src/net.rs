//! Transport channel — one WebSocket per room, with reconnect/resync.
//!
//! DESIGN
//! ======
//! The channel task owns the socket. Intents arrive on an mpsc receiver and
//! go out as JSON text frames; inbound frames are decoded and forwarded to
//! the session's inbound queue. On any socket failure the task reconnects
//! with exponential backoff and first replays the caller-provided resync
//! intents (`join-room`, then `join-project` if one was active) — the
//! responses are authoritative full snapshots, so everything local-only is
//! discarded by the session when they land.
//!
//! A malformed inbound frame is logged and dropped; it never kills the
//! channel.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{info, warn};

use events::{ClientEvent, ServerEvent, decode_server_event, encode_client_event};

use crate::consts;

#[derive(Debug, thiserror::Error)]
pub enum NetError {
    #[error("RELAY_URL is not set")]
    MissingUrl,
}

/// Relay endpoint configuration. The only environment-level setting the
/// engine has.
#[derive(Debug, Clone)]
pub struct ChannelConfig {
    pub url: String,
}

impl ChannelConfig {
    /// Read `RELAY_URL` from the environment.
    ///
    /// # Errors
    ///
    /// [`NetError::MissingUrl`] when the variable is absent.
    pub fn from_env() -> Result<Self, NetError> {
        let url = std::env::var("RELAY_URL").map_err(|_| NetError::MissingUrl)?;
        Ok(Self { url })
    }
}

/// Run the room channel until the outbound sender side is dropped.
///
/// `resync` is called on every (re)connect and must return the intents that
/// re-establish room and project membership.
pub async fn run_channel<F>(
    config: ChannelConfig,
    mut outbound: mpsc::Receiver<ClientEvent>,
    inbound: mpsc::Sender<ServerEvent>,
    mut resync: F,
) where
    F: FnMut() -> Vec<ClientEvent> + Send,
{
    let mut delay = consts::RECONNECT_BASE_DELAY;
    loop {
        match connect_async(&config.url).await {
            Ok((mut socket, _)) => {
                info!(url = %config.url, "channel connected");
                delay = consts::RECONNECT_BASE_DELAY;

                let mut replay_failed = false;
                for event in resync() {
                    let frame = Message::Text(encode_client_event(&event).into());
                    if socket.send(frame).await.is_err() {
                        replay_failed = true;
                        break;
                    }
                }

                if !replay_failed && !pump(&mut socket, &mut outbound, &inbound).await {
                    // Outbound side is gone: the engine shut down.
                    return;
                }
                warn!("channel lost, reconnecting");
            }
            Err(e) => {
                warn!(url = %config.url, error = %e, "channel connect failed");
            }
        }

        tokio::time::sleep(delay).await;
        delay = next_delay(delay);
    }
}

/// Shuttle frames until the socket dies (returns true) or the outbound
/// sender is dropped (returns false).
async fn pump<S>(
    socket: &mut S,
    outbound: &mut mpsc::Receiver<ClientEvent>,
    inbound: &mpsc::Sender<ServerEvent>,
) -> bool
where
    S: futures_util::Sink<Message, Error = tokio_tungstenite::tungstenite::Error>
        + futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
        + Unpin,
{
    loop {
        tokio::select! {
            msg = socket.next() => {
                let Some(Ok(msg)) = msg else { return true };
                match msg {
                    Message::Text(text) => match decode_server_event(text.as_str()) {
                        Ok(event) => {
                            if inbound.send(event).await.is_err() {
                                return false;
                            }
                        }
                        Err(e) => warn!(error = %e, "undecodable frame dropped"),
                    },
                    Message::Close(_) => return true,
                    _ => {}
                }
            }
            event = outbound.recv() => {
                let Some(event) = event else { return false };
                let frame = Message::Text(encode_client_event(&event).into());
                if socket.send(frame).await.is_err() {
                    return true;
                }
            }
        }
    }
}

/// Exponential backoff, capped.
fn next_delay(current: Duration) -> Duration {
    (current * 2).min(consts::RECONNECT_MAX_DELAY)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let mut delay = consts::RECONNECT_BASE_DELAY;
        let mut seen = vec![delay];
        for _ in 0..10 {
            delay = next_delay(delay);
            seen.push(delay);
        }
        assert_eq!(seen[1], consts::RECONNECT_BASE_DELAY * 2);
        assert!(seen.windows(2).all(|w| w[1] >= w[0]));
        assert_eq!(*seen.last().unwrap(), consts::RECONNECT_MAX_DELAY);
    }
}
