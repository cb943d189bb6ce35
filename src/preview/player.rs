use std::io::Cursor;
use std::sync::mpsc::{self, Receiver, Sender, SyncSender};
use std::thread::{self, JoinHandle};

use rodio::{Decoder, OutputStreamBuilder, Sink};

use crate::error::ServiceError;

#[derive(Debug)]
enum PreviewCmd {
    /// Replace whatever is playing with this encoded clip.
    Play(Vec<u8>),
    Stop,
    Shutdown,
}

/// Handle to the preview audio thread.
///
/// `rodio`'s output stream is not `Send`, so it lives on its own thread and
/// is driven through a command channel. Commands never block the caller.
pub struct PreviewPlayer {
    tx: Sender<PreviewCmd>,
    handle: Option<JoinHandle<()>>,
}

impl PreviewPlayer {
    /// Start the audio thread. Fails when no output device can be opened.
    pub fn spawn() -> Result<Self, ServiceError> {
        let (tx, rx) = mpsc::channel::<PreviewCmd>();
        let (ready_tx, ready_rx) = mpsc::sync_channel::<Result<(), String>>(1);

        let handle = thread::Builder::new()
            .name("preview-audio".to_string())
            .spawn(move || run(rx, ready_tx))
            .map_err(|e| ServiceError::PreviewUnavailable(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                tracing::debug!("Preview audio thread started");
                Ok(Self {
                    tx,
                    handle: Some(handle),
                })
            }
            Ok(Err(reason)) => {
                let _ = handle.join();
                tracing::warn!(reason = %reason, "No audio output, previews disabled");
                Err(ServiceError::PreviewUnavailable(reason))
            }
            Err(_) => Err(ServiceError::PreviewUnavailable(
                "audio thread exited during startup".to_string(),
            )),
        }
    }

    pub fn play(&self, clip: Vec<u8>) -> Result<(), ServiceError> {
        self.tx
            .send(PreviewCmd::Play(clip))
            .map_err(|_| ServiceError::PreviewUnavailable("audio thread stopped".to_string()))
    }

    pub fn stop(&self) {
        let _ = self.tx.send(PreviewCmd::Stop);
    }
}

impl Drop for PreviewPlayer {
    fn drop(&mut self) {
        let _ = self.tx.send(PreviewCmd::Shutdown);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn run(rx: Receiver<PreviewCmd>, ready: SyncSender<Result<(), String>>) {
    let mut stream = match OutputStreamBuilder::open_default_stream() {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(e.to_string()));
            return;
        }
    };
    // rodio prints to stderr when the stream is dropped, which would land in
    // the middle of the prompt.
    stream.log_on_drop(false);
    let _ = ready.send(Ok(()));

    let mut sink: Option<Sink> = None;
    while let Ok(cmd) = rx.recv() {
        match cmd {
            PreviewCmd::Play(clip) => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
                match Decoder::new(Cursor::new(clip)) {
                    Ok(source) => {
                        let new_sink = Sink::connect_new(stream.mixer());
                        new_sink.append(source);
                        new_sink.play();
                        sink = Some(new_sink);
                    }
                    Err(e) => tracing::warn!(error = %e, "Could not decode preview clip"),
                }
            }
            PreviewCmd::Stop => {
                if let Some(old) = sink.take() {
                    old.stop();
                }
            }
            PreviewCmd::Shutdown => break,
        }
    }

    if let Some(old) = sink.take() {
        old.stop();
    }
    tracing::debug!("Preview audio thread stopped");
}
