// =============================================================================
// Realtime Feed Connector
// =============================================================================
//
// Connects to the upstream WebSocket feed, authenticates, subscribes to
// trades and bars for the configured symbol list, and republishes every
// parsed message onto the durable log. A single `connect, split, loop {
// read.next().await }` body returns on disconnect so the caller owns
// reconnection.
// =============================================================================

use anyhow::Context;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::log::producer::LogProducer;
use crate::types::{BarMessage, LogMessage, TradeMessage};

#[derive(Debug, Deserialize)]
struct InboundFrame {
    #[serde(rename = "T")]
    kind: String,
    #[serde(flatten)]
    rest: serde_json::Value,
}

/// Everything that can end one connection lifetime. `AuthRejected` is
/// distinguished from every other variant because it means the configured
/// credentials are bad — reconnecting will only repeat the same rejection,
/// so the caller must treat it as fatal rather than retry it like a
/// transient disconnect.
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("feed authentication rejected: {0}")]
    AuthRejected(String),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

/// Run one connection lifetime: connect, authenticate, subscribe, then read
/// frames until the socket closes or errors. Returns `Ok(())` on a clean
/// disconnect, `Err(FeedError::AuthRejected)` if the credentials were
/// rejected, and `Err(FeedError::Transport)` for every other protocol or
/// transport failure.
pub async fn run_feed(
    ws_url: &str,
    api_key: &str,
    api_secret: &str,
    symbols: &[String],
    producer: &LogProducer,
) -> Result<(), FeedError> {
    info!(url = %ws_url, "connecting to market data feed");
    let (ws_stream, _response) = connect_async(ws_url)
        .await
        .context("failed to connect to market data feed")?;
    info!("market data feed connected");

    let (mut write, mut read) = ws_stream.split();

    let auth_frame = json!({
        "action": "auth",
        "key": api_key,
        "secret": api_secret,
    });
    write
        .send(Message::Text(auth_frame.to_string()))
        .await
        .context("failed to send auth frame")?;

    match read.next().await {
        Some(Ok(Message::Text(text))) => {
            if !auth_succeeded(&text) {
                return Err(FeedError::AuthRejected(text));
            }
            info!("market data feed authenticated");
        }
        Some(Ok(other)) => {
            return Err(anyhow::anyhow!("unexpected frame during auth handshake: {other:?}").into());
        }
        Some(Err(e)) => {
            return Err(anyhow::Error::from(e)
                .context("transport error during auth handshake")
                .into())
        }
        None => return Err(anyhow::anyhow!("feed closed connection during auth handshake").into()),
    }

    let subscribe_frame = json!({
        "action": "subscribe",
        "trades": symbols,
        "bars": symbols,
    });
    write
        .send(Message::Text(subscribe_frame.to_string()))
        .await
        .context("failed to send subscribe frame")?;

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Err(e) = dispatch_frames(&text, producer).await {
                    warn!(error = %e, "failed to handle inbound feed frame");
                }
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(frame))) => {
                warn!(?frame, "market data feed sent close frame");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                error!(error = %e, "market data feed read error");
                return Err(anyhow::Error::from(e).into());
            }
            None => {
                warn!("market data feed stream ended");
                return Ok(());
            }
        }
    }
}

/// The feed sends arrays of frames per text message. Each frame is tagged
/// by `T`: `success`/`subscription` are control frames we only log, `t` is a
/// trade, `b` is a minute bar, anything else is ignored.
async fn dispatch_frames(text: &str, producer: &LogProducer) -> anyhow::Result<()> {
    let frames: Vec<InboundFrame> =
        serde_json::from_str(text).context("failed to parse feed frame array")?;

    for frame in frames {
        match frame.kind.as_str() {
            "success" | "subscription" => {
                info!(frame = %frame.rest, "feed control frame");
            }
            "t" => match serde_json::from_value::<TradeMessage>(frame.rest) {
                Ok(trade) => producer.publish(&LogMessage::Trade(trade)).await,
                Err(e) => warn!(error = %e, "failed to parse trade frame"),
            },
            "b" => match serde_json::from_value::<BarMessage>(frame.rest) {
                Ok(bar) => producer.publish(&LogMessage::Bar(bar)).await,
                Err(e) => warn!(error = %e, "failed to parse bar frame"),
            },
            other => {
                warn!(kind = other, "ignoring unrecognized feed frame kind");
            }
        }
    }
    Ok(())
}

fn auth_succeeded(text: &str) -> bool {
    let Ok(frames) = serde_json::from_str::<Vec<serde_json::Value>>(text) else {
        return false;
    };
    frames.iter().any(|f| {
        f.get("T").and_then(|v| v.as_str()) == Some("success")
            && matches!(
                f.get("msg").and_then(|v| v.as_str()),
                Some("authenticated")
            )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_succeeded_accepts_documented_success_frame() {
        let text = r#"[{"T":"success","msg":"authenticated"}]"#;
        assert!(auth_succeeded(text));
    }

    #[test]
    fn auth_succeeded_rejects_error_frame() {
        let text = r#"[{"T":"error","code":402,"msg":"auth failed"}]"#;
        assert!(!auth_succeeded(text));
    }

    #[test]
    fn auth_succeeded_rejects_garbage() {
        assert!(!auth_succeeded("not json"));
    }
}
