//! Back-to-back playback of independently synthesized clips.
//!
//! A single driver task owns the pending queue. It takes the head clip,
//! decodes it on the blocking pool, hands it to the [`ClipSink`] and waits
//! for it to finish before taking the next. A clip that fails to decode or play is logged and
//! skipped, so the rest of the queue always drains in enqueue order.

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::decode::decode_audio;
use crate::{DecodedAudio, PlaybackError};

/// One encoded clip waiting to be played.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clip {
    pub audio: Vec<u8>,
    /// Set on the last clip of a selection.
    pub is_final: bool,
}

impl Clip {
    pub fn new(audio: Vec<u8>, is_final: bool) -> Self {
        Self { audio, is_final }
    }
}

/// Device side of the queued player.
#[async_trait]
pub trait ClipSink: Send + Sync {
    /// Play a decoded clip and resolve once it has finished sounding.
    async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError>;

    /// Cut off the clip currently sounding.
    fn stop(&self);
}

/// Sink that finishes every clip immediately.
#[derive(Debug, Default)]
pub struct NullClipSink;

#[async_trait]
impl ClipSink for NullClipSink {
    async fn play(&self, _audio: DecodedAudio) -> Result<(), PlaybackError> {
        Ok(())
    }

    fn stop(&self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueStatus {
    Idle,
    Playing {
        /// Zero-based position of the clip in enqueue order.
        index: usize,
        is_final: bool,
    },
}

enum QueueCommand {
    Enqueue(Clip),
    Stop,
}

/// Handle to the driver task.
pub struct QueuedPlayer {
    commands: mpsc::UnboundedSender<QueueCommand>,
    status: watch::Receiver<QueueStatus>,
    driver: JoinHandle<()>,
}

impl QueuedPlayer {
    /// Spawn the driver on the current tokio runtime.
    pub fn spawn(sink: Arc<dyn ClipSink>) -> Self {
        let (commands, rx) = mpsc::unbounded_channel();
        let (status_tx, status) = watch::channel(QueueStatus::Idle);
        let driver = tokio::spawn(drive(rx, sink, status_tx));
        Self {
            commands,
            status,
            driver,
        }
    }

    /// Append a clip; playback starts right away if nothing is sounding.
    pub fn enqueue(&self, clip: Clip) -> Result<(), PlaybackError> {
        self.commands
            .send(QueueCommand::Enqueue(clip))
            .map_err(|_| PlaybackError::OutputUnavailable("queued player has shut down".into()))
    }

    /// Drop pending clips and cut off the one sounding.
    pub fn stop(&self) {
        let _ = self.commands.send(QueueCommand::Stop);
    }

    pub fn status(&self) -> QueueStatus {
        *self.status.borrow()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<QueueStatus> {
        self.status.clone()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.status(), QueueStatus::Playing { .. })
    }

    /// Close the queue and wait until every enqueued clip has been played.
    pub async fn finish(self) {
        let Self {
            commands, driver, ..
        } = self;
        drop(commands);
        if let Err(e) = driver.await {
            log::error!("Queued player driver panicked: {e}");
        }
    }
}

async fn drive(
    mut commands: mpsc::UnboundedReceiver<QueueCommand>,
    sink: Arc<dyn ClipSink>,
    status: watch::Sender<QueueStatus>,
) {
    let mut pending: VecDeque<(usize, Clip)> = VecDeque::new();
    let mut next_index = 0usize;
    let mut closed = false;

    loop {
        if pending.is_empty() {
            status.send_replace(QueueStatus::Idle);
            if closed {
                break;
            }
            match commands.recv().await {
                Some(QueueCommand::Enqueue(clip)) => {
                    pending.push_back((next_index, clip));
                    next_index += 1;
                }
                Some(QueueCommand::Stop) => continue,
                None => break,
            }
        }

        let Some((index, clip)) = pending.pop_front() else {
            continue;
        };

        let Clip { audio, is_final } = clip;
        let audio = match tokio::task::spawn_blocking(move || decode_audio(&audio)).await {
            Ok(Ok(audio)) => audio,
            Ok(Err(e)) => {
                log::error!("Skipping clip {index}: {e}");
                continue;
            }
            Err(e) => {
                log::error!("Skipping clip {index}: decode task failed: {e}");
                continue;
            }
        };

        status.send_replace(QueueStatus::Playing { index, is_final });
        log::debug!("Playing clip {index} ({:.2}s)", audio.duration_secs());

        let playing = sink.play(audio);
        tokio::pin!(playing);

        loop {
            if closed {
                if let Err(e) = playing.as_mut().await {
                    log::error!("Clip {index} failed during playback: {e}");
                }
                break;
            }
            tokio::select! {
                result = playing.as_mut() => {
                    if let Err(e) = result {
                        log::error!("Clip {index} failed during playback: {e}");
                    }
                    break;
                }
                command = commands.recv() => match command {
                    Some(QueueCommand::Enqueue(clip)) => {
                        pending.push_back((next_index, clip));
                        next_index += 1;
                    }
                    Some(QueueCommand::Stop) => {
                        log::info!("Queued playback stopped, dropping {} pending clips", pending.len());
                        pending.clear();
                        sink.stop();
                        break;
                    }
                    None => closed = true,
                },
            }
        }

        if is_final && pending.is_empty() {
            log::info!("Finished playing final clip");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::wav_fixture;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records the sample rate of each clip it plays, in order.
    #[derive(Default)]
    struct RecordingSink {
        played: Mutex<Vec<u32>>,
        stops: Mutex<usize>,
        fail_on_frames: Option<usize>,
        hold: Option<Duration>,
    }

    #[async_trait]
    impl ClipSink for RecordingSink {
        async fn play(&self, audio: DecodedAudio) -> Result<(), PlaybackError> {
            self.played.lock().unwrap().push(audio.sample_rate);
            if let Some(hold) = self.hold {
                tokio::time::sleep(hold).await;
            }
            if self.fail_on_frames == Some(audio.frames()) {
                return Err(PlaybackError::Output("device underrun".into()));
            }
            Ok(())
        }

        fn stop(&self) {
            *self.stops.lock().unwrap() += 1;
        }
    }

    /// Clips are told apart by sample rate.
    fn clip(rate: u32, is_final: bool) -> Clip {
        Clip::new(wav_fixture(0.01, 1, rate), is_final)
    }

    #[tokio::test]
    async fn plays_clips_in_enqueue_order() {
        let sink = Arc::new(RecordingSink::default());
        let player = QueuedPlayer::spawn(sink.clone());
        player.enqueue(clip(8000, false)).unwrap();
        player.enqueue(clip(11025, false)).unwrap();
        player.enqueue(clip(16000, true)).unwrap();
        player.finish().await;

        assert_eq!(*sink.played.lock().unwrap(), vec![8000, 11025, 16000]);
    }

    #[tokio::test]
    async fn undecodable_clip_is_skipped_without_stalling() {
        let sink = Arc::new(RecordingSink::default());
        let player = QueuedPlayer::spawn(sink.clone());
        player.enqueue(clip(8000, false)).unwrap();
        player.enqueue(Clip::new(b"not audio".to_vec(), false)).unwrap();
        player.enqueue(clip(16000, true)).unwrap();
        player.finish().await;

        assert_eq!(*sink.played.lock().unwrap(), vec![8000, 16000]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn decodes_on_blocking_pool_in_order() {
        let sink = Arc::new(RecordingSink::default());
        let player = QueuedPlayer::spawn(sink.clone());
        // A long stereo clip first, so its decode outlasts the short ones.
        player
            .enqueue(Clip::new(wav_fixture(20.0, 2, 44_100), false))
            .unwrap();
        player.enqueue(Clip::new(b"garbage".to_vec(), false)).unwrap();
        player.enqueue(clip(8000, true)).unwrap();
        player.finish().await;

        assert_eq!(*sink.played.lock().unwrap(), vec![44_100, 8000]);
    }

    #[tokio::test]
    async fn playback_failure_advances_to_next_clip() {
        let sink = Arc::new(RecordingSink {
            // 0.01s at 11025 Hz
            fail_on_frames: Some(110),
            ..Default::default()
        });
        let player = QueuedPlayer::spawn(sink.clone());
        player.enqueue(clip(11025, false)).unwrap();
        player.enqueue(clip(8000, true)).unwrap();
        player.finish().await;

        assert_eq!(*sink.played.lock().unwrap(), vec![11025, 8000]);
    }

    #[tokio::test]
    async fn reports_playing_then_idle() {
        let sink = Arc::new(RecordingSink {
            hold: Some(Duration::from_millis(50)),
            ..Default::default()
        });
        let player = QueuedPlayer::spawn(sink);
        let mut status = player.subscribe();
        assert_eq!(player.status(), QueueStatus::Idle);

        player.enqueue(clip(8000, true)).unwrap();
        status
            .wait_for(|s| {
                *s == QueueStatus::Playing {
                    index: 0,
                    is_final: true,
                }
            })
            .await
            .unwrap();
        assert!(player.is_playing());
        status.wait_for(|s| *s == QueueStatus::Idle).await.unwrap();
        player.finish().await;
    }

    #[tokio::test]
    async fn stop_drops_pending_clips() {
        let sink = Arc::new(RecordingSink {
            hold: Some(Duration::from_secs(30)),
            ..Default::default()
        });
        let player = QueuedPlayer::spawn(sink.clone());
        let mut status = player.subscribe();
        player.enqueue(clip(8000, false)).unwrap();
        player.enqueue(clip(16000, true)).unwrap();
        status
            .wait_for(|s| matches!(s, QueueStatus::Playing { index: 0, .. }))
            .await
            .unwrap();

        player.stop();
        status.wait_for(|s| *s == QueueStatus::Idle).await.unwrap();
        player.finish().await;

        assert_eq!(*sink.played.lock().unwrap(), vec![8000]);
        assert_eq!(*sink.stops.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn queue_keeps_working_after_idle() {
        let sink = Arc::new(RecordingSink {
            hold: Some(Duration::from_millis(20)),
            ..Default::default()
        });
        let player = QueuedPlayer::spawn(sink.clone());
        let mut status = player.subscribe();
        player.enqueue(clip(8000, true)).unwrap();
        status
            .wait_for(|s| matches!(s, QueueStatus::Playing { .. }))
            .await
            .unwrap();
        status.wait_for(|s| *s == QueueStatus::Idle).await.unwrap();

        player.enqueue(clip(16000, true)).unwrap();
        player.finish().await;
        assert_eq!(*sink.played.lock().unwrap(), vec![8000, 16000]);
    }
}
