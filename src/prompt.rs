use std::io::{stdin, stdout, BufRead, StdinLock, Stdout, Write};

use anyhow::{anyhow, Result};

/// Line oriented terminal prompts. Secrets are read without echo when the
/// prompt is attached to a terminal.
pub struct Prompt<R, W> {
    input: R,
    output: W,
    hide_secrets: bool,
}

impl Prompt<StdinLock<'static>, Stdout> {
    pub fn stdio() -> Self {
        Self {
            input: stdin().lock(),
            output: stdout(),
            hide_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> Prompt<R, W> {
    #[cfg(test)]
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            hide_secrets: false,
        }
    }

    #[cfg(test)]
    pub fn into_output(self) -> W {
        self.output
    }

    fn read_line(&mut self) -> Result<String> {
        let mut buf = String::new();
        if self.input.read_line(&mut buf)? == 0 {
            return Err(anyhow!("input closed before setup finished"));
        }

        Ok(buf.trim().to_string())
    }

    /// Asks for a value, falling back to `default` on empty input. Without a
    /// default the question repeats until something is entered.
    pub fn ask(&mut self, label: &str, default: Option<&str>) -> Result<String> {
        loop {
            match default {
                Some(d) if !d.is_empty() => write!(self.output, "{} [{}]: ", label, d)?,
                _ => write!(self.output, "{}: ", label)?,
            }
            self.output.flush()?;

            let answer = self.read_line()?;
            if !answer.is_empty() {
                return Ok(answer);
            }
            if let Some(d) = default.filter(|d| !d.is_empty()) {
                return Ok(d.to_string());
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    pub fn confirm(&mut self, label: &str, default: bool) -> Result<bool> {
        let hint = if default { "Y/n" } else { "y/N" };
        loop {
            write!(self.output, "{} [{}]: ", label, hint)?;
            self.output.flush()?;

            match self.read_line()?.to_lowercase().as_str() {
                "" => return Ok(default),
                "y" | "yes" => return Ok(true),
                "n" | "no" => return Ok(false),
                _ => writeln!(self.output, "Please answer y or n.")?,
            }
        }
    }

    /// Reads a secret. When `keep_existing` is set an empty answer keeps the
    /// stored value and `None` is returned.
    pub fn secret(&mut self, label: &str, keep_existing: bool) -> Result<Option<String>> {
        let label = if keep_existing {
            format!("{} [leave empty to keep current]: ", label)
        } else {
            format!("{}: ", label)
        };

        loop {
            let answer = if self.hide_secrets {
                rpassword::prompt_password(&label)
                    .map_err(|e| anyhow!("failed to read secret: {}", e))?
                    .trim()
                    .to_string()
            } else {
                write!(self.output, "{}", label)?;
                self.output.flush()?;
                self.read_line()?
            };

            if !answer.is_empty() {
                return Ok(Some(answer));
            }
            if keep_existing {
                return Ok(None);
            }
            writeln!(self.output, "A value is required.")?;
        }
    }

    pub fn say(&mut self, message: &str) -> Result<()> {
        writeln!(self.output, "{}", message)?;
        Ok(())
    }
}
