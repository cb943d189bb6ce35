//! Controller module - the interactive organizing loop
//!
//! Binds terminal input and the view to the session engine: renders the
//! current track, reads a line, parses it, asks for a playlist name when
//! needed, applies the action and shows what happened.
//!
//! - `input`: prompted line reading and the intro menu
//! - `devices`: startup device selection

mod devices;
mod input;


use std::io::Write;

use tokio::io::AsyncBufRead;

use crate::model::Track;
use crate::session::{
    parse, Action, ApplyResult, Next, PlaybackController, PlaybackStatus, SessionEngine,
    SessionSummary, TrackSource,
};

pub use input::Console;

/// Opens a track's web page outside the terminal.
pub type Opener = Box<dyn Fn(&str) -> std::io::Result<()> + Send>;

#[derive(Clone, Debug, Default)]
pub struct ControllerOptions {
    /// Ask for a playback device before the first track
    pub choose_device: bool,
    /// Name of our own Connect receiver, offered when nothing is active
    pub local_device_name: Option<String>,
}

pub struct SessionController<S, P, R, W: Write> {
    engine: SessionEngine<S, P>,
    console: Console<R, W>,
    options: ControllerOptions,
    opener: Opener,
    /// Outcome of the last action, shown under the next card
    pending: Option<ApplyResult>,
}

impl<S, P, R, W> SessionController<S, P, R, W>
where
    S: TrackSource,
    P: PlaybackController,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    pub fn new(
        engine: SessionEngine<S, P>,
        console: Console<R, W>,
        options: ControllerOptions,
        opener: Opener,
    ) -> Self {
        Self {
            engine,
            console,
            options,
            opener,
            pending: None,
        }
    }

    /// Run the session to completion and print the summary.
    ///
    /// The resume log is flushed on every exit path, including a fatal
    /// authentication failure, which is returned after the summary.
    pub async fn run(mut self) -> anyhow::Result<SessionSummary> {
        let outcome = self.organize().await;

        if !self.engine.is_finished() {
            self.engine.finish().await?;
        }
        let summary = self.engine.summary();
        self.console
            .view()
            .summary(&summary, self.engine.resume_path())?;

        outcome.map(|_| summary)
    }

    #[cfg(test)]
    pub(crate) fn into_parts(self) -> (SessionEngine<S, P>, Console<R, W>) {
        (self.engine, self.console)
    }

    async fn organize(&mut self) -> anyhow::Result<()> {
        if self.options.choose_device {
            self.choose_device().await?;
        }

        loop {
            let (track, playback) = match self.engine.next().await {
                Next::Complete => return Ok(()),
                Next::Track { track, playback } => (track, playback),
            };
            self.render(&track, &playback)?;
            if !self.decide().await? {
                return Ok(());
            }
        }
    }

    fn render(&mut self, track: &Track, playback: &PlaybackStatus) -> std::io::Result<()> {
        let summary = self.engine.summary();
        let view = self.console.view();
        view.track_card(track, self.engine.progress(), &summary, playback)?;
        view.menu(
            self.engine.collections(),
            &summary.created,
            self.engine.preview_available(),
        )?;
        if let Some(result) = self.pending.take() {
            view.outcome(&result)?;
        }
        Ok(())
    }

    /// Prompt until the current track is left behind. Returns `false` once
    /// the session is over.
    async fn decide(&mut self) -> anyhow::Result<bool> {
        loop {
            let action = match self.console.read_line("\nEnter your choice: ").await? {
                None => Action::Quit,
                Some(line) => match parse(&line, &self.engine.parse_context()) {
                    Ok(action) => action,
                    Err(e) => {
                        self.console.view().parse_error(&e)?;
                        continue;
                    }
                },
            };

            let action = match action {
                Action::CreateAndAssign(None) => {
                    match self.console.read_line("Enter new playlist name: ").await? {
                        Some(name) => Action::CreateAndAssign(Some(name)),
                        None => Action::Quit,
                    }
                }
                other => other,
            };

            match self.engine.apply(action).await {
                Ok(ApplyResult::Quit) => {
                    self.console.view().outcome(&ApplyResult::Quit)?;
                    return Ok(false);
                }
                Ok(ApplyResult::Open(url)) => {
                    self.console.view().outcome(&ApplyResult::Open(url.clone()))?;
                    if let Err(e) = (self.opener)(&url) {
                        tracing::warn!(error = %e, url = %url, "Could not open browser");
                        self.console
                            .view()
                            .warning(&format!("Could not open a browser: {}", e))?;
                    }
                }
                Ok(result) if result.advances() || matches!(result, ApplyResult::Reverted(_)) => {
                    self.pending = Some(result);
                    return Ok(true);
                }
                Ok(result) => self.console.view().outcome(&result)?,
                Err(e) if e.is_fatal() => {
                    tracing::error!(error = %e, "Ending session");
                    self.console.view().session_error(&e)?;
                    return Err(e.into());
                }
                Err(e) => self.console.view().session_error(&e)?,
            }
        }
    }
}
