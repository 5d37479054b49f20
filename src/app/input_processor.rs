//! Company number collection and the start confirmation.

use std::io::{self, BufRead, IsTerminal, Read, Write};

use anyhow::{Context, Result, bail};
use dumpany_core::{EntityId, parse_entity_list};

use crate::cli::Args;

const COMPANY_PROMPT: &str = "Company numbers (comma separated): ";
const CONFIRM_PROMPT: &str = "Download all filings for these companies? [y/N] ";

/// Returns the requested company numbers, normalized and deduplicated.
///
/// Positional arguments win; otherwise one line is read interactively, or
/// all of stdin when it is piped.
pub(crate) fn collect_company_ids(args: &Args) -> Result<Vec<EntityId>> {
    if !args.companies.is_empty() {
        return Ok(parse_entity_list(&args.companies)?);
    }

    let stdin = io::stdin();
    let text = if stdin.is_terminal() {
        prompt_line(&mut stdin.lock(), &mut io::stderr(), COMPANY_PROMPT)?.unwrap_or_default()
    } else {
        let mut buffer = String::new();
        stdin
            .lock()
            .read_to_string(&mut buffer)
            .context("Failed to read company numbers from stdin")?;
        buffer
    };

    Ok(parse_entity_list([text])?)
}

/// The user agreed to start the run, or passed `--yes`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StartConfirmed(());

/// Fails early when the start prompt could never be answered.
pub(crate) fn ensure_can_confirm(yes: bool, stdin_is_terminal: bool) -> Result<()> {
    if yes || stdin_is_terminal {
        return Ok(());
    }
    bail!(
        "Cannot ask for confirmation: stdin is not a terminal\n  Suggestion: pass --yes to start without the prompt"
    )
}

/// Asks for a yes/no answer on the terminal unless `yes` is set; EOF counts
/// as no.
pub(crate) fn confirm_start(yes: bool) -> Result<Option<StartConfirmed>> {
    confirm_with(yes, &mut io::stdin().lock(), &mut io::stderr())
}

fn confirm_with<R: BufRead, W: Write>(
    yes: bool,
    reader: &mut R,
    writer: &mut W,
) -> Result<Option<StartConfirmed>> {
    if yes {
        return Ok(Some(StartConfirmed(())));
    }
    let answer = prompt_line(reader, writer, CONFIRM_PROMPT)?;
    Ok(answer
        .as_deref()
        .is_some_and(is_affirmative)
        .then_some(StartConfirmed(())))
}

/// Writes `prompt` and reads one line; `None` on EOF.
fn prompt_line<R: BufRead, W: Write>(
    reader: &mut R,
    writer: &mut W,
    prompt: &str,
) -> Result<Option<String>> {
    write!(writer, "{prompt}")?;
    writer.flush()?;

    let mut line = String::new();
    let read = reader
        .read_line(&mut line)
        .context("Failed to read from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn is_affirmative(answer: &str) -> bool {
    matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}
