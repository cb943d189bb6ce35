//! Line input from the terminal

use std::io::{self, Write};

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::view::View;

/// Prompted line reader paired with the view it prompts on.
pub struct Console<R, W: Write> {
    reader: R,
    view: View<W>,
}

impl<R: AsyncBufRead + Unpin, W: Write> Console<R, W> {
    pub fn new(reader: R, view: View<W>) -> Self {
        Self { reader, view }
    }

    pub fn view(&mut self) -> &mut View<W> {
        &mut self.view
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.view.into_inner()
    }

    /// Show `prompt` and read one line. `None` means end of input.
    pub async fn read_line(&mut self, prompt: &str) -> io::Result<Option<String>> {
        self.view.prompt(prompt)?;

        let mut line = String::new();
        if self.reader.read_line(&mut line).await? == 0 {
            // Ctrl-D leaves the cursor after the prompt
            self.view.info("")?;
            return Ok(None);
        }
        Ok(Some(line.trim_end_matches(&['\r', '\n'][..]).to_string()))
    }

    /// Show the intro screen and ask whether to start. End of input exits.
    pub async fn intro(&mut self) -> io::Result<bool> {
        self.view.intro()?;
        loop {
            let Some(choice) = self.read_line("\nWhat would you like to do? ").await? else {
                return Ok(false);
            };
            match choice.trim() {
                "1" => return Ok(true),
                "2" => return Ok(false),
                _ => self.view.failure("Please enter 1 or 2.")?,
            }
        }
    }
}
