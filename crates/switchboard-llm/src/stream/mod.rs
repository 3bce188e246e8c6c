//! Simulated streaming
//!
//! The stream opens before the upstream answers. A pump task sends heartbeat
//! frames on a fixed interval while the complete response is produced, then
//! feeds the rendered protocol frames to the client over a bounded channel,
//! still interleaving heartbeats while the client is slow to drain it. Both
//! kinds of frame go through the same channel whole, so a heartbeat never
//! lands inside an event.

pub mod anthropic;
pub mod openai;

use std::convert::Infallible;
use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;
use futures_util::stream::{self, BoxStream};
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

/// Framed protocol events ready to be written to the response body
pub type FrameStream = BoxStream<'static, Result<Bytes, Infallible>>;

const CHANNEL_CAPACITY: usize = 16;

/// Heartbeat frame and how often to send it
#[derive(Debug, Clone)]
pub struct Heartbeat {
    pub frame: Bytes,
    pub interval: Duration,
}

/// Start pumping `frames` to a new stream
pub fn spawn(frames: Vec<Bytes>, heartbeat: Heartbeat) -> FrameStream {
    spawn_pending(std::future::ready(frames), heartbeat)
}

/// Open a stream now and pump the frames `pending` resolves to
///
/// Heartbeats cover the wait. If the client goes away first, `pending` is
/// dropped without being polled to completion.
pub fn spawn_pending<F>(pending: F, heartbeat: Heartbeat) -> FrameStream
where
    F: Future<Output = Vec<Bytes>> + Send + 'static,
{
    spawn_bounded(pending, heartbeat, CHANNEL_CAPACITY).0
}

fn spawn_bounded<F>(pending: F, heartbeat: Heartbeat, capacity: usize) -> (FrameStream, JoinHandle<()>)
where
    F: Future<Output = Vec<Bytes>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let task = tokio::spawn(pump(pending, heartbeat, tx));

    let frames = stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|frame| (Ok(frame), rx)) }).boxed();
    (frames, task)
}

async fn pump<F>(pending: F, heartbeat: Heartbeat, tx: mpsc::Sender<Bytes>)
where
    F: Future<Output = Vec<Bytes>>,
{
    let mut ticker = time::interval_at(Instant::now() + heartbeat.interval, heartbeat.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    tokio::pin!(pending);
    let frames = loop {
        tokio::select! {
            frames = &mut pending => break frames,
            _ = ticker.tick() => match tx.try_send(heartbeat.frame.clone()) {
                // Heartbeats already queued keep the connection alive
                Ok(()) | Err(TrySendError::Full(_)) => {}
                Err(TrySendError::Closed(_)) => {
                    tracing::debug!("client disconnected before upstream replied");
                    return;
                }
            },
            () = tx.closed() => {
                tracing::debug!("client disconnected before upstream replied");
                return;
            }
        }
    };

    let mut frames = frames.into_iter();
    let mut next = frames.next();

    while let Some(frame) = next.take() {
        tokio::select! {
            biased;

            permit = tx.reserve() => {
                let Ok(permit) = permit else {
                    tracing::debug!("client disconnected during stream");
                    return;
                };
                permit.send(frame);
                next = frames.next();
            }
            _ = ticker.tick() => {
                if tx.send(heartbeat.frame.clone()).await.is_err() {
                    tracing::debug!("client disconnected during stream");
                    return;
                }
                next = Some(frame);
            }
        }
    }
}

/// JSON payload for one frame, or `None` after logging if it cannot be encoded
pub(crate) fn encode<T: Serialize>(value: &T) -> Option<String> {
    match serde_json::to_string(value) {
        Ok(data) => Some(data),
        Err(error) => {
            tracing::error!(error = %error, "dropping stream frame that failed to serialize");
            None
        }
    }
}

/// Split `text` into pieces of at most `size` characters
pub(crate) fn text_chunks(text: &str, size: usize) -> Vec<&str> {
    let size = size.max(1);
    let mut chunks = Vec::with_capacity(text.len() / size + 1);
    let mut start = 0;

    for (count, (offset, _)) in text.char_indices().enumerate() {
        if count > 0 && count % size == 0 {
            chunks.push(&text[start..offset]);
            start = offset;
        }
    }

    if start < text.len() {
        chunks.push(&text[start..]);
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heartbeat(secs: u64) -> Heartbeat {
        Heartbeat {
            frame: Bytes::from_static(b": hb\n\n"),
            interval: Duration::from_secs(secs),
        }
    }

    #[tokio::test]
    async fn frames_arrive_in_order() {
        let frames: Vec<Bytes> = (0..40).map(|i| Bytes::from(format!("data: {i}\n\n"))).collect();
        let received: Vec<_> = spawn(frames.clone(), heartbeat(60))
            .map(|frame| frame.unwrap_or_default())
            .collect()
            .await;

        assert_eq!(received, frames);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_client_receives_whole_heartbeats() {
        let frames: Vec<Bytes> = (0..3).map(|i| Bytes::from(format!("data: {i}\n\n"))).collect();
        let beat = heartbeat(1).frame;
        let (mut stream, _) = spawn_bounded(std::future::ready(frames.clone()), heartbeat(1), 1);

        let mut received = Vec::new();
        while let Some(Ok(frame)) = stream.next().await {
            received.push(frame);
            time::sleep(Duration::from_secs(3)).await;
        }

        let payload: Vec<_> = received.iter().filter(|frame| **frame != beat).cloned().collect();
        assert_eq!(payload, frames);
        assert!(received.contains(&beat));
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_cover_a_slow_upstream() {
        let frames = vec![Bytes::from_static(b"data: late\n\n")];
        let pending = {
            let frames = frames.clone();
            async move {
                time::sleep(Duration::from_millis(4500)).await;
                frames
            }
        };
        let beat = heartbeat(1).frame;

        let received: Vec<_> = spawn_pending(pending, heartbeat(1))
            .map(|frame| frame.unwrap_or_default())
            .collect()
            .await;

        let (last, beats) = received.split_last().unwrap();
        assert_eq!(*last, frames[0]);
        assert_eq!(beats.len(), 4);
        assert!(beats.iter().all(|frame| *frame == beat));
    }

    #[tokio::test]
    async fn pump_stops_when_client_disconnects() {
        let frames: Vec<Bytes> = (0..100).map(|i| Bytes::from(format!("data: {i}\n\n"))).collect();
        let (mut stream, task) = spawn_bounded(std::future::ready(frames), heartbeat(60), 1);

        assert!(stream.next().await.is_some());
        drop(stream);

        time::timeout(Duration::from_secs(5), task)
            .await
            .expect("pump still running after disconnect")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_while_waiting_drops_pending_work() {
        let (guard, dropped) = tokio::sync::oneshot::channel::<()>();
        let pending = async move {
            let _guard = guard;
            std::future::pending::<Vec<Bytes>>().await
        };
        let (mut stream, task) = spawn_bounded(pending, heartbeat(1), 4);

        assert_eq!(stream.next().await.unwrap().unwrap(), heartbeat(1).frame);
        drop(stream);

        task.await.unwrap();
        assert!(dropped.await.is_err());
    }

    #[test]
    fn unencodable_payload_yields_no_frame() {
        let keyed_by_tuple: std::collections::HashMap<(u8, u8), u8> = [((1, 2), 3)].into_iter().collect();

        assert!(encode(&keyed_by_tuple).is_none());
        assert_eq!(encode(&serde_json::json!({"a": 1})).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn text_chunks_respect_char_boundaries() {
        assert_eq!(text_chunks("héllo wörld", 4), ["héll", "o wö", "rld"]);
        assert_eq!(text_chunks("abc", 10), ["abc"]);
        assert!(text_chunks("", 4).is_empty());
    }
}
