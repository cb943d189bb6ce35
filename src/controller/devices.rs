//! Choosing the Spotify Connect device tracks are started on

use std::io::Write;

use tokio::io::AsyncBufRead;

use super::SessionController;
use crate::model::DeviceInfo;
use crate::session::{PlaybackController, TrackSource};

impl<S, P, R, W> SessionController<S, P, R, W>
where
    S: TrackSource,
    P: PlaybackController,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    /// Pick a device once at startup. A single device is used as is; with
    /// none the user can retry or carry on without device playback.
    pub(super) async fn choose_device(&mut self) -> anyhow::Result<()> {
        loop {
            let devices = match self.engine.targets().await {
                Ok(devices) => devices,
                Err(e) if e.is_auth() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(error = %e, "Could not list devices");
                    self.console
                        .view()
                        .warning(&format!("Could not list devices: {}", e))?;
                    Vec::new()
                }
            };

            if devices.is_empty() {
                self.console.view().warning("No Spotify devices found.")?;
                let retry = self
                    .console
                    .read_line(
                        "Open Spotify on your phone or desktop, then press Enter to retry (or type 'skip'): ",
                    )
                    .await?;
                if retry.is_some_and(|l| l.trim().is_empty()) {
                    continue;
                }
                self.console
                    .view()
                    .info("Continuing without device playback.")?;
                return Ok(());
            }

            if let [device] = devices.as_slice() {
                self.console
                    .view()
                    .info(&format!("Using device: {} ({})", device.name, device.kind))?;
                self.engine.select_target(device.clone());
                return Ok(());
            }

            let preferred = default_device(&devices, self.options.local_device_name.as_deref());
            self.console.view().devices(&devices, preferred)?;
            loop {
                let Some(line) = self
                    .console
                    .read_line("Select device number to auto-use for playback: ")
                    .await?
                else {
                    return Ok(());
                };
                match pick_device(&line, devices.len(), preferred) {
                    Some(index) => {
                        let device = devices[index].clone();
                        self.console
                            .view()
                            .info(&format!("Selected: {}", device.name))?;
                        self.engine.select_target(device);
                        return Ok(());
                    }
                    None => self.console.view().failure("Invalid selection. Try again.")?,
                }
            }
        }
    }
}

/// Index offered when the user just presses Enter: the active device, else
/// our own Connect receiver.
pub(super) fn default_device(devices: &[DeviceInfo], local_name: Option<&str>) -> Option<usize> {
    devices.iter().position(|d| d.is_active).or_else(|| {
        let local = local_name?;
        devices.iter().position(|d| d.name == local)
    })
}

fn pick_device(line: &str, count: usize, preferred: Option<usize>) -> Option<usize> {
    let line = line.trim();
    if line.is_empty() {
        return preferred;
    }
    match line.parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::mocks::device;

    #[test]
    fn default_prefers_active_then_local() {
        let mut devices = vec![device("a", false), device("b", false)];
        devices[1].name = "organizer".to_string();
        assert_eq!(default_device(&devices, Some("organizer")), Some(1));
        assert_eq!(default_device(&devices, None), None);

        devices[0].is_active = true;
        assert_eq!(default_device(&devices, Some("organizer")), Some(0));
    }

    #[test]
    fn pick_accepts_numbers_in_range_and_enter() {
        assert_eq!(pick_device("2", 3, None), Some(1));
        assert_eq!(pick_device(" 3 ", 3, None), Some(2));
        assert_eq!(pick_device("", 3, Some(0)), Some(0));
        assert_eq!(pick_device("", 3, None), None);
        assert_eq!(pick_device("0", 3, None), None);
        assert_eq!(pick_device("4", 3, None), None);
        assert_eq!(pick_device("two", 3, None), None);
    }
}
