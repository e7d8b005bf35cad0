//! Audio output seam.  The core drives a `MediaBackend`; the real one is an
//! mpv child process, tests use a recorder.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::core::StoreEvent;
use crate::mpv::{MpvDriver, MpvEvent, MpvHandle, OBSERVED};

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("audio player unavailable: {0}")]
    Unavailable(String),
    #[error("{0}")]
    Command(String),
}

impl From<anyhow::Error> for MediaError {
    fn from(e: anyhow::Error) -> Self {
        MediaError::Command(e.to_string())
    }
}

#[async_trait]
pub trait MediaBackend: Send {
    /// Load `path` and start playing from the beginning.
    async fn load(&mut self, path: &str, volume: u8) -> Result<(), MediaError>;
    async fn set_pause(&mut self, paused: bool) -> Result<(), MediaError>;
    async fn seek_relative(&mut self, secs: f64) -> Result<(), MediaError>;
    async fn seek_percent(&mut self, percent: f64) -> Result<(), MediaError>;
    async fn set_volume(&mut self, volume: u8) -> Result<(), MediaError>;
    /// Start property notifications.  Calling it twice is harmless.
    async fn subscribe(&mut self) -> Result<(), MediaError>;
    /// Stop property notifications.  Calling it twice is harmless.
    async fn unsubscribe(&mut self) -> Result<(), MediaError>;
    async fn shutdown(&mut self);
}

/// mpv-backed player.  Spawns mpv on first use and again if it dies.
pub struct MediaSession {
    driver: MpvDriver,
    handle: Option<MpvHandle>,
    forward_tx: mpsc::Sender<StoreEvent>,
    subscribed: bool,
}

impl MediaSession {
    pub fn new(volume: u8, forward_tx: mpsc::Sender<StoreEvent>) -> Self {
        Self {
            driver: MpvDriver::new(volume),
            handle: None,
            forward_tx,
            subscribed: false,
        }
    }

    async fn ensure_handle(&mut self) -> Result<MpvHandle, MediaError> {
        if let Some(h) = &self.handle {
            if !h.is_closed() && self.driver.process_alive() {
                return Ok(h.clone());
            }
            warn!("MediaSession: mpv connection lost, respawning");
            self.handle = None;
            self.subscribed = false;
        }

        let (mpv_tx, mut mpv_rx) = mpsc::channel::<MpvEvent>(256);
        let forward = self.forward_tx.clone();
        tokio::spawn(async move {
            while let Some(evt) = mpv_rx.recv().await {
                if forward.send(StoreEvent::Media(evt)).await.is_err() {
                    break;
                }
            }
        });

        let handle = match self.driver.try_reconnect(mpv_tx.clone()).await {
            Some(h) => h,
            None => self
                .driver
                .spawn_and_connect(mpv_tx)
                .await
                .map_err(|e| MediaError::Unavailable(e.to_string()))?,
        };
        self.handle = Some(handle.clone());
        Ok(handle)
    }
}

#[async_trait]
impl MediaBackend for MediaSession {
    async fn load(&mut self, path: &str, volume: u8) -> Result<(), MediaError> {
        let h = self.ensure_handle().await?;
        self.driver.last_volume = volume;
        h.load_file(path, volume).await?;
        Ok(())
    }

    async fn set_pause(&mut self, paused: bool) -> Result<(), MediaError> {
        let h = self.ensure_handle().await?;
        h.set_pause(paused).await?;
        Ok(())
    }

    async fn seek_relative(&mut self, secs: f64) -> Result<(), MediaError> {
        let h = self.ensure_handle().await?;
        h.seek_relative(secs).await?;
        Ok(())
    }

    async fn seek_percent(&mut self, percent: f64) -> Result<(), MediaError> {
        let h = self.ensure_handle().await?;
        h.seek_percent(percent).await?;
        Ok(())
    }

    async fn set_volume(&mut self, volume: u8) -> Result<(), MediaError> {
        self.driver.last_volume = volume;
        // nothing to tell an mpv that isn't running; the next spawn picks it up
        if let Some(h) = &self.handle {
            h.set_volume(volume).await?;
        }
        Ok(())
    }

    async fn subscribe(&mut self) -> Result<(), MediaError> {
        let h = self.ensure_handle().await?;
        if self.subscribed {
            return Ok(());
        }
        for (id, name) in OBSERVED {
            if let Err(e) = h.observe(id, name).await {
                warn!("MediaSession: observe {} failed: {}", name, e);
            }
        }
        self.subscribed = true;
        Ok(())
    }

    async fn unsubscribe(&mut self) -> Result<(), MediaError> {
        if !self.subscribed {
            return Ok(());
        }
        self.subscribed = false;
        if let Some(h) = &self.handle {
            for (id, _) in OBSERVED {
                let _ = h.unobserve(id).await;
            }
        }
        Ok(())
    }

    async fn shutdown(&mut self) {
        if let Some(h) = self.handle.take() {
            let _ = h.stop().await;
        }
        self.driver.kill().await;
        info!("MediaSession: mpv stopped");
    }
}
