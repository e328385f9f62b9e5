// src/console.rs

//! The operator's terminal.
//!
//! Before streaming starts the console is in cooked mode and asks for the
//! initial offset. After that it switches to raw mode so single keys (and
//! arrow keys) arrive without Enter, and Ctrl-C arrives as a key instead of a
//! signal. Raw mode is undone on drop.

use crate::dispatch::{Reply, Status};
use crate::keys::KeyDecoder;
use crate::session::Offset;
use anyhow::{Context, Result};
use libc::STDIN_FILENO;
use log::{debug, error, info, trace, warn};
use std::io::{self, stdin, stdout, BufRead, Read, Stdin, Stdout, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use termios::{tcsetattr, Termios, ECHO, ICANON, ISIG, TCSANOW, VMIN, VTIME};

const CURSOR_HIDE: &str = "\x1b[?25l";
const CURSOR_SHOW: &str = "\x1b[?25h";

/// Parses `"x,y"` into an offset. Whitespace around either number is allowed.
pub fn parse_offset(text: &str) -> Option<Offset> {
    let (right, up) = text.trim().split_once(',')?;
    let right = right.trim().parse().ok()?;
    let up = up.trim().parse().ok()?;
    Some(Offset::new(right, up))
}

/// Asks for the starting offset. Empty or malformed input falls back to
/// `(0, 0)`; only I/O failures are errors.
pub fn prompt_initial_offset<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> Result<Offset> {
    write!(
        out,
        "Enter the initial offset (x,y) in mirrors (default is 0,0): "
    )?;
    out.flush().context("Failed to flush offset prompt")?;

    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read initial offset")?;

    let offset = if line.trim().is_empty() {
        writeln!(out, "Using default offset of x=0, y=0.")?;
        Offset::default()
    } else if let Some(offset) = parse_offset(&line) {
        writeln!(out, "Initial offset set to {}", offset)?;
        offset
    } else {
        warn!("Console: unparseable offset {:?}", line.trim());
        writeln!(out, "Invalid input. Using default offset of x=0, y=0.")?;
        Offset::default()
    };
    Ok(offset)
}

/// Reads keys until the handler asks to stop, the cancel flag is raised, or
/// input ends.
pub struct KeyListener<R> {
    input: R,
    decoder: KeyDecoder,
    cancel: Arc<AtomicBool>,
    /// With raw-mode `VMIN = 0` an empty read is a timeout, not end of input.
    empty_read_is_eof: bool,
}

impl<R: Read> KeyListener<R> {
    pub fn new(input: R, empty_read_is_eof: bool) -> Self {
        KeyListener {
            input,
            decoder: KeyDecoder::new(),
            cancel: Arc::new(AtomicBool::new(false)),
            empty_read_is_eof,
        }
    }

    /// Raising this flag stops [`KeyListener::run`] at its next read timeout.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// Feeds every key to `handler` and writes its reply lines to `out`.
    pub fn run<W, F>(&mut self, out: &mut W, line_ending: &str, mut handler: F) -> Result<()>
    where
        W: Write,
        F: FnMut(&str) -> Reply,
    {
        let mut buf = [0u8; 64];
        while !self.cancel.load(Ordering::Acquire) {
            let n = match self.input.read(&mut buf) {
                Ok(0) if self.empty_read_is_eof => {
                    info!("Console: end of input");
                    return Ok(());
                }
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e).context("Failed to read keyboard input"),
            };
            if n > 0 {
                trace!("Console: read {} bytes", n);
            }

            for key in self.decoder.feed(&buf[..n]) {
                let reply = handler(&key);
                write_lines(out, &reply.lines, line_ending)?;
                if reply.status == Status::Shutdown {
                    self.cancel.store(true, Ordering::Release);
                    return Ok(());
                }
            }
        }
        debug!("Console: listener cancelled");
        Ok(())
    }
}

pub fn write_lines<W: Write>(out: &mut W, lines: &[String], line_ending: &str) -> Result<()> {
    for line in lines {
        write!(out, "{}{}", line, line_ending)?;
    }
    out.flush().context("Failed to flush console output")
}

/// Writes `CURSOR_SHOW` if the cursor is still hidden.
fn show_cursor<W: Write>(out: &mut W, hidden: &mut bool) -> Result<()> {
    if !*hidden {
        return Ok(());
    }
    write!(out, "{}", CURSOR_SHOW)?;
    out.flush()
        .context("Console: Failed to flush for CURSOR_SHOW cleanup")?;
    *hidden = false;
    Ok(())
}

/// Stdin in raw mode plus stdout.
pub struct Console {
    original_termios: Option<Termios>,
    cursor_hidden: bool,
    listener: KeyListener<Stdin>,
    out: Stdout,
}

impl Console {
    /// Switches stdin to raw mode and hides the cursor. When stdin is not a
    /// terminal the console still works, line-buffered.
    pub fn enter_raw_mode() -> Result<Self> {
        let original_termios = match Termios::from_fd(STDIN_FILENO) {
            Ok(ts) => Some(ts),
            Err(e) => {
                warn!(
                    "Console: Failed to get initial termios: {}. Proceeding without raw mode.",
                    e
                );
                None
            }
        };

        let mut raw_active = false;
        if let Some(ref ots) = original_termios {
            let mut raw_termios = *ots;
            raw_termios.c_lflag &= !(ECHO | ICANON | ISIG);
            raw_termios.c_iflag &=
                !(libc::IXON | libc::IXOFF | libc::ICRNL | libc::INLCR | libc::IGNCR);
            raw_termios.c_oflag &= !libc::OPOST;
            // Reads return after at most 100 ms so cancellation is noticed.
            raw_termios.c_cc[VMIN] = 0;
            raw_termios.c_cc[VTIME] = 1;

            if let Err(e) = tcsetattr(STDIN_FILENO, TCSANOW, &raw_termios) {
                warn!(
                    "Console: Failed to set raw terminal attributes: {}. Keys need Enter.",
                    e
                );
            } else {
                debug!("Console: Terminal set to raw mode.");
                raw_active = true;
            }
        }

        let mut out = stdout();
        write!(out, "{}", CURSOR_HIDE)?;
        out.flush()
            .context("Console: Failed to flush stdout for CURSOR_HIDE")?;

        Ok(Console {
            original_termios: original_termios.filter(|_| raw_active),
            cursor_hidden: true,
            listener: KeyListener::new(stdin(), !raw_active),
            out,
        })
    }

    fn line_ending(&self) -> &'static str {
        if self.original_termios.is_some() {
            "\r\n"
        } else {
            "\n"
        }
    }

    pub fn print(&mut self, lines: &[String]) -> Result<()> {
        let ending = self.line_ending();
        write_lines(&mut self.out, lines, ending)
    }

    /// Runs the command loop until quit, cancellation or end of input.
    pub fn run<F: FnMut(&str) -> Reply>(&mut self, handler: F) -> Result<()> {
        let ending = self.line_ending();
        self.listener.run(&mut self.out, ending, handler)
    }

    /// Shows the cursor and restores the saved terminal attributes. Only the
    /// first call does anything, so the drop after an explicit restore is
    /// silent.
    pub fn restore(&mut self) -> Result<()> {
        show_cursor(&mut self.out, &mut self.cursor_hidden)?;
        if let Some(original) = self.original_termios.take() {
            debug!("Console: Restoring original terminal attributes.");
            tcsetattr(STDIN_FILENO, TCSANOW, &original)
                .context("Console: Failed to restore original terminal attributes")?;
        }
        Ok(())
    }
}

impl Drop for Console {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            error!("Console: Error during cleanup in drop: {}", e);
        }
    }
}
