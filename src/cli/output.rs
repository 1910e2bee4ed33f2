//! Colored terminal output for the CLI.

use cyrup_termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use std::io::{self, IsTerminal, Write};

/// Writes user-facing progress to stdout and warnings to stderr.
///
/// Colors are used only when the stream is a terminal; CI logs and
/// redirected output get plain text.
#[derive(Debug, Clone, Copy)]
pub struct OutputManager {
    quiet: bool,
}

impl OutputManager {
    pub fn new(quiet: bool) -> Self {
        Self { quiet }
    }

    fn stdout() -> StandardStream {
        StandardStream::stdout(choice(io::stdout().is_terminal()))
    }

    fn stderr() -> StandardStream {
        StandardStream::stderr(choice(io::stderr().is_terminal()))
    }

    pub fn println(&self, message: &str) -> io::Result<()> {
        if !self.quiet {
            writeln!(Self::stdout(), "{message}")?;
        }
        Ok(())
    }

    pub fn progress(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = Self::stdout();
        colored(&mut out, ColorSpec::new().set_fg(Some(Color::Cyan)), "⏳ ")?;
        writeln!(out, "{message}")
    }

    pub fn success(&self, message: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = Self::stdout();
        colored(
            &mut out,
            ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true),
            &format!("✅ {message}"),
        )?;
        writeln!(out)
    }

    /// Warnings are printed even in quiet mode.
    pub fn warn(&self, message: &str) -> io::Result<()> {
        let mut err = Self::stderr();
        colored(
            &mut err,
            ColorSpec::new().set_fg(Some(Color::Yellow)).set_bold(true),
            &format!("⚠️  {message}"),
        )?;
        writeln!(err)
    }

    pub fn section(&self, title: &str) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        let mut out = Self::stdout();
        writeln!(out)?;
        colored(&mut out, ColorSpec::new().set_bold(true), title)?;
        writeln!(out)?;
        colored(
            &mut out,
            ColorSpec::new().set_dimmed(true),
            &"─".repeat(title.chars().count()),
        )?;
        writeln!(out)
    }

    pub fn indent(&self, message: &str) -> io::Result<()> {
        self.println(&format!("  {message}"))
    }
}

fn choice(is_terminal: bool) -> ColorChoice {
    if is_terminal {
        ColorChoice::Auto
    } else {
        ColorChoice::Never
    }
}

/// Writes `text` in `spec`, then resets the stream's color.
fn colored<W: WriteColor>(out: &mut W, spec: &ColorSpec, text: &str) -> io::Result<()> {
    out.set_color(spec)?;
    write!(out, "{text}")?;
    out.reset()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cyrup_termcolor::{Ansi, NoColor};

    #[test]
    fn plain_writer_gets_no_escape_codes() {
        let mut out = NoColor::new(Vec::new());
        colored(&mut out, ColorSpec::new().set_fg(Some(Color::Green)), "done").unwrap();
        assert_eq!(out.into_inner(), b"done");
    }

    #[test]
    fn color_is_reset_after_text() {
        let mut out = Ansi::new(Vec::new());
        colored(&mut out, ColorSpec::new().set_fg(Some(Color::Yellow)), "careful").unwrap();
        let written = String::from_utf8(out.into_inner()).unwrap();
        assert!(written.starts_with("\x1b["));
        assert!(written.contains("careful"));
        assert!(written.ends_with("\x1b[0m"));
    }

    #[test]
    fn non_terminal_streams_are_never_colored() {
        assert_eq!(choice(false), ColorChoice::Never);
        assert_eq!(choice(true), ColorChoice::Auto);
    }
}
