//! View module - terminal rendering
//!
//! Line-oriented output for the organizer: intro screen, the card for the
//! current track, the collection menu, outcome messages and the closing
//! summary. Everything is written to a generic writer so screens can be
//! rendered into a buffer in tests.

mod utils;

use std::io::{self, Write};
use std::path::Path;

use crossterm::{
    cursor::MoveTo,
    queue,
    style::{Print, PrintStyledContent, Stylize},
    terminal::{Clear, ClearType},
};

use crate::error::SessionError;
use crate::model::{Collection, DeviceInfo, Track};
use crate::session::{
    ApplyResult, AssignReport, ParseError, PlaybackStatus, RevertReport, SessionSummary,
};

use utils::{format_duration, index_width, plural, progress_bar, truncate_string};

const RULE_WIDTH: usize = 60;
const BANNER_WIDTH: usize = 70;
const BAR_WIDTH: usize = 40;
const NAME_WIDTH: usize = 48;

pub struct View<W: Write> {
    out: W,
    clear_screen: bool,
}

impl<W: Write> View<W> {
    pub fn new(out: W, clear_screen: bool) -> Self {
        Self { out, clear_screen }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    fn clear(&mut self) -> io::Result<()> {
        if self.clear_screen {
            queue!(self.out, Clear(ClearType::All), MoveTo(0, 0))?;
        } else {
            queue!(self.out, Print("\n\n\n"))?;
        }
        Ok(())
    }

    fn line(&mut self, text: impl std::fmt::Display) -> io::Result<()> {
        queue!(self.out, Print(text), Print("\n"))
    }

    fn rule(&mut self, width: usize) -> io::Result<()> {
        self.line("─".repeat(width))
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }

    /// Print `text` without a newline and flush so the cursor waits after it.
    pub fn prompt(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, PrintStyledContent(text.yellow().bold()))?;
        self.out.flush()
    }

    pub fn info(&mut self, text: &str) -> io::Result<()> {
        self.line(text)?;
        self.flush()
    }

    pub fn warning(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, PrintStyledContent(format!("! {}", text).yellow()), Print("\n"))?;
        self.flush()
    }

    pub fn failure(&mut self, text: &str) -> io::Result<()> {
        queue!(self.out, PrintStyledContent(format!("x {}", text).red()), Print("\n"))?;
        self.flush()
    }

    pub fn intro(&mut self) -> io::Result<()> {
        self.clear()?;
        let border = "═".repeat(BANNER_WIDTH);
        let blank = " ".repeat(BANNER_WIDTH);
        let banner = [
            format!("╔{}╗", border),
            format!("║{}║", blank),
            format!("║{:^BANNER_WIDTH$}║", "SPOTIFY PLAYLIST ORGANIZER"),
            format!("║{:^BANNER_WIDTH$}║", "♪ ♫ ♪  ORGANIZE YOUR LIKED SONGS  ♪ ♫ ♪"),
            format!("║{}║", blank),
            format!("╚{}╝", border),
        ];
        for row in banner {
            queue!(self.out, PrintStyledContent(row.green()), Print("\n"))?;
        }

        self.line("")?;
        self.line("Walk through your liked songs one at a time and file each one")?;
        self.line("into one or more of your playlists.")?;
        self.line("")?;
        self.line("Features:")?;
        self.line("  • Auto-play each song on a Spotify device while you decide")?;
        self.line("  • Add a song to several playlists at once (1,3,5)")?;
        self.line("  • Create playlists on the fly")?;
        self.line("  • Resume where you left off")?;
        self.line("  • Optional 30 second local previews")?;
        self.line("")?;
        self.controls_help()?;
        self.line("")?;
        self.line("  1. Start organizing songs")?;
        self.line("  2. Exit")?;
        self.flush()
    }

    fn controls_help(&mut self) -> io::Result<()> {
        self.line("Controls:")?;
        self.line("  Enter / s    skip song")?;
        self.line("  1,2,3...     add to playlist(s) by number")?;
        self.line("  n [name]     create a playlist and add the song")?;
        self.line("  p            play/stop local preview")?;
        self.line("  o            open in Spotify")?;
        self.line("  b            go back to the previous song")?;
        self.line("  q            quit and save progress")
    }

    pub fn devices(&mut self, devices: &[DeviceInfo], preferred: Option<usize>) -> io::Result<()> {
        self.line("")?;
        self.line("Available devices:")?;
        for (i, device) in devices.iter().enumerate() {
            let mut label = format!("  {}. {} - {}", i + 1, device.name, device.kind);
            if device.is_active {
                label.push_str(" (active)");
            }
            if preferred == Some(i) {
                queue!(self.out, PrintStyledContent(label.bold()), Print("\n"))?;
            } else {
                self.line(label)?;
            }
        }
        self.flush()
    }

    /// Header, progress, track details and the device playback status.
    pub fn track_card(
        &mut self,
        track: &Track,
        progress: (usize, usize),
        summary: &SessionSummary,
        playback: &PlaybackStatus,
    ) -> io::Result<()> {
        self.clear()?;
        let border = "=".repeat(RULE_WIDTH);
        queue!(self.out, PrintStyledContent(border.as_str().green()), Print("\n"))?;
        self.line(format!("{:^RULE_WIDTH$}", "SPOTIFY PLAYLIST ORGANIZER"))?;
        queue!(self.out, PrintStyledContent(border.as_str().green()), Print("\n"))?;

        let (current, total) = progress;
        self.line("")?;
        self.line(format!("Progress: {}", progress_bar(current, total, BAR_WIDTH)))?;
        self.line(format!(
            "Skipped: {}   Filed: {}",
            plural(summary.skipped, "song"),
            plural(summary.assigned, "song")
        ))?;

        self.line("")?;
        queue!(
            self.out,
            Print("Song:       "),
            PrintStyledContent(track.title.as_str().bold()),
            Print("\n")
        )?;
        self.line(format!("Artist:     {}", track.artist_line()))?;
        self.line(format!("Album:      {}", track.album))?;
        self.line(format!(
            "Year:       {}",
            track.year.as_deref().unwrap_or("Unknown")
        ))?;
        self.line(format!("Duration:   {}", format_duration(track.duration_ms)))?;
        match track.popularity {
            Some(p) => self.line(format!("Popularity: {}/100", p))?,
            None => self.line("Popularity: Unknown")?,
        }
        self.rule(RULE_WIDTH)?;

        match playback {
            PlaybackStatus::Started(device) => {
                self.line(format!("▶ Playing on {}", device.name))?;
            }
            PlaybackStatus::Continuing => self.line("▶ Still playing")?,
            PlaybackStatus::Disabled | PlaybackStatus::NoTarget => {}
            PlaybackStatus::Unavailable(reason) => {
                queue!(
                    self.out,
                    PrintStyledContent(
                        format!("x Could not play on a device ({}). Previews only.", reason).red()
                    ),
                    Print("\n")
                )?;
            }
        }
        self.flush()
    }

    /// Numbered collection list followed by the command keys.
    pub fn menu(
        &mut self,
        collections: &[Collection],
        created: &[Collection],
        preview_available: bool,
    ) -> io::Result<()> {
        self.line("")?;
        self.line("PLAYLISTS:")?;
        self.rule(40)?;

        let width = index_width(collections.len());
        if collections.is_empty() {
            self.line("  (none yet)")?;
        }
        for (i, collection) in collections.iter().enumerate() {
            let name = truncate_string(&collection.name, NAME_WIDTH);
            if created.contains(collection) {
                self.line(format!("  {:>width$}. {} (new)", i + 1, name))?;
            } else {
                self.line(format!("  {:>width$}. {}", i + 1, name))?;
            }
        }

        self.line("")?;
        self.line("  n.  Create new playlist (adds this song)")?;
        self.line("  s.  Skip this song (also Enter)")?;
        if preview_available {
            self.line("  p.  Play/stop 30s local preview")?;
        }
        self.line("  o.  Open in Spotify")?;
        self.line("  b.  Go back to previous song")?;
        self.line("  q.  Quit and save progress")?;
        self.line("")?;
        queue!(
            self.out,
            PrintStyledContent(
                "Tip: enter several numbers separated by commas, e.g. 1,3,5".dark_grey()
            ),
            Print("\n")
        )?;
        self.flush()
    }

    pub fn outcome(&mut self, result: &ApplyResult) -> io::Result<()> {
        match result {
            ApplyResult::Skipped { track } => self.info(&format!("Skipped '{}'", track.title)),
            ApplyResult::Assigned(report) | ApplyResult::AssignFailed(report) => {
                self.assign_report(report)
            }
            ApplyResult::PreviewStarted(source) => {
                self.info(&format!("♪ Playing 30s preview from {}...", source))
            }
            ApplyResult::PreviewStopped => self.info("Preview stopped"),
            ApplyResult::Open(url) => self.info(&format!("Opening {}", url)),
            ApplyResult::Reverted(report) => self.revert_report(report),
            ApplyResult::Quit => self.info("Progress saved."),
        }
    }

    fn assign_report(&mut self, report: &AssignReport) -> io::Result<()> {
        if let Some(created) = &report.created {
            queue!(
                self.out,
                PrintStyledContent(format!("+ Created playlist '{}'", created.name).green()),
                Print("\n")
            )?;
        }
        for collection in &report.succeeded {
            queue!(
                self.out,
                PrintStyledContent(format!("✓ Added to '{}'", collection.name).green()),
                Print("\n")
            )?;
        }
        for (collection, err) in &report.failed {
            queue!(
                self.out,
                PrintStyledContent(
                    format!("x Could not add to '{}': {}", collection.name, err).red()
                ),
                Print("\n")
            )?;
        }
        if report.succeeded.is_empty() {
            self.line("The song stays current. Try again or pick another option.")?;
        } else if !report.persisted {
            self.warning("Progress could not be saved for this song")?;
        }
        self.flush()
    }

    fn revert_report(&mut self, report: &RevertReport) -> io::Result<()> {
        self.line(format!("↩ Back to '{}'", report.track.title))?;
        for (collection, err) in &report.irreversible {
            self.warning(&format!(
                "'{}' may still contain this song ({})",
                collection.name, err
            ))?;
        }
        if let Some(orphan) = &report.orphaned {
            self.warning(&format!(
                "Playlist '{}' was kept on Spotify and stays in the list",
                orphan.name
            ))?;
        }
        if !report.persisted {
            self.warning("Progress could not be saved for this song")?;
        }
        self.flush()
    }

    pub fn session_error(&mut self, err: &SessionError) -> io::Result<()> {
        let text = match err {
            SessionError::InvalidSelection { count, .. } => {
                format!("Enter numbers between 1 and {}, separated by commas.", count)
            }
            SessionError::DuplicateCollection(name) => {
                format!("A playlist named '{}' already exists!", name)
            }
            SessionError::EmptyCollectionName => "Please enter a valid name!".to_string(),
            SessionError::NothingToUndo => "Nothing to go back to.".to_string(),
            SessionError::PreviewUnavailable => "No preview available".to_string(),
            other => other.to_string(),
        };
        self.failure(&text)
    }

    pub fn parse_error(&mut self, err: &ParseError) -> io::Result<()> {
        self.failure(&err.to_string())
    }

    pub fn summary(&mut self, summary: &SessionSummary, resume_path: &Path) -> io::Result<()> {
        self.line("")?;
        queue!(
            self.out,
            PrintStyledContent("ORGANIZING COMPLETE!".green().bold()),
            Print("\n")
        )?;
        self.line("=".repeat(50))?;
        self.line(format!(
            "Songs handled this session: {}",
            summary.skipped + summary.assigned
        ))?;
        self.line(format!("Songs filed: {}", summary.assigned))?;
        self.line(format!("Songs skipped: {}", summary.skipped))?;
        if !summary.created.is_empty() {
            self.line(format!("New playlists created: {}", summary.created.len()))?;
            for collection in &summary.created {
                self.line(format!("  • {}", collection.name))?;
            }
        }
        if summary.remaining > 0 {
            self.line(format!(
                "{} left for next time (progress in {})",
                plural(summary.remaining, "song"),
                resume_path.display()
            ))?;
        } else {
            self.line("Every liked song has been handled.")?;
        }
        self.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ServiceError;
    use crate::session::mocks::{collection, device, track};

    fn render(f: impl FnOnce(&mut View<Vec<u8>>) -> io::Result<()>) -> String {
        let mut view = View::new(Vec::new(), false);
        f(&mut view).unwrap();
        String::from_utf8(view.into_inner()).unwrap()
    }

    #[test]
    fn track_card_shows_details_and_progress() {
        let out = render(|v| {
            v.track_card(
                &track("A"),
                (2, 4),
                &SessionSummary::default(),
                &PlaybackStatus::Started(device("d1", true)),
            )
        });
        assert!(out.contains("Song A"));
        assert!(out.contains("Artist A"));
        assert!(out.contains("Year:       2001"));
        assert!(out.contains("Duration:   3:00"));
        assert!(out.contains("2/4 (50.0%)"));
        assert!(out.contains("Playing on Device d1"));
    }

    #[test]
    fn menu_numbers_collections_and_marks_new_ones() {
        let collections = vec![collection("c1", "Chill"), collection("n1", "Road Trip")];
        let created = vec![collection("n1", "Road Trip")];
        let out = render(|v| v.menu(&collections, &created, false));
        assert!(out.contains(" 1. Chill\n"));
        assert!(out.contains(" 2. Road Trip (new)"));
        assert!(!out.contains("preview"));
    }

    #[test]
    fn partial_assignment_lists_each_destination() {
        let report = AssignReport {
            track: track("A"),
            succeeded: vec![collection("c1", "Chill")],
            failed: vec![(
                collection("c2", "Gym"),
                ServiceError::Network("timed out".to_string()),
            )],
            created: None,
            persisted: true,
        };
        let out = render(|v| v.outcome(&ApplyResult::Assigned(report)));
        assert!(out.contains("Added to 'Chill'"));
        assert!(out.contains("Could not add to 'Gym'"));
    }

    #[test]
    fn revert_warns_about_leftovers() {
        let report = RevertReport {
            track: track("A"),
            disposition: crate::session::Disposition::Skip,
            irreversible: vec![(
                collection("c1", "Chill"),
                ServiceError::Network("reset".to_string()),
            )],
            orphaned: Some(collection("n1", "Fresh")),
            persisted: true,
        };
        let out = render(|v| v.outcome(&ApplyResult::Reverted(report)));
        assert!(out.contains("Back to 'Song A'"));
        assert!(out.contains("'Chill' may still contain this song"));
        assert!(out.contains("Playlist 'Fresh' was kept"));
    }

    #[test]
    fn summary_counts_and_points_at_resume_file() {
        let summary = SessionSummary {
            skipped: 2,
            assigned: 3,
            created: vec![collection("n1", "Fresh")],
            remaining: 1,
            total: 6,
        };
        let out = render(|v| v.summary(&summary, Path::new("processed_tracks.log")));
        assert!(out.contains("Songs handled this session: 5"));
        assert!(out.contains("• Fresh"));
        assert!(out.contains("1 song left for next time (progress in processed_tracks.log)"));
    }
}
