use std::io::{BufRead, Write};

use clap::Parser;
use tracing::{debug, info, warn};

use crate::cli::{Command, ShellLine, split_words};
use crate::commands::{CommandContext, dispatch};
use crate::render::Renderer;
use crate::session::Session;

/// Runs commands line by line against one session until `exit`, `quit` or
/// end of input. A failing line is reported and the session continues.
#[tracing::instrument(skip_all)]
pub fn run_shell<R: BufRead, W: Write>(
    session: &mut Session,
    ctx: &CommandContext,
    renderer: &Renderer,
    input: R,
    out: &mut W,
    prompt: bool,
) -> anyhow::Result<()> {
    let mut executed = 0usize;
    let mut failed = 0usize;

    if prompt {
        write!(out, "maxtask> ")?;
        out.flush()?;
    }

    for line in input.lines() {
        let line = line?;
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('#') {
            if prompt {
                write!(out, "maxtask> ")?;
                out.flush()?;
            }
            continue;
        }
        if matches!(trimmed, "exit" | "quit") {
            break;
        }

        match run_line(session, ctx, renderer, trimmed, out) {
            Ok(()) => executed += 1,
            Err(err) => {
                failed += 1;
                warn!(line = %trimmed, error = %err, "shell command failed");
                writeln!(out, "error: {err:#}")?;
            }
        }

        if prompt {
            write!(out, "maxtask> ")?;
            out.flush()?;
        }
    }

    info!(executed, failed, "shell finished");
    Ok(())
}

fn run_line<W: Write>(
    session: &mut Session,
    ctx: &CommandContext,
    renderer: &Renderer,
    line: &str,
    out: &mut W,
) -> anyhow::Result<()> {
    let words = split_words(line)?;
    let parsed = match ShellLine::try_parse_from(&words) {
        Ok(parsed) => parsed,
        Err(err) => {
            // Help and usage errors are shown, not treated as failures.
            write!(out, "{}", err.render())?;
            return Ok(());
        }
    };

    if parsed.command == Command::Shell {
        writeln!(out, "Already in the shell.")?;
        return Ok(());
    }

    debug!(command = ?parsed.command, "shell line parsed");
    dispatch(session, ctx, renderer, parsed.command, out)
}
