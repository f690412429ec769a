//! Human-friendly CLI output formatters.
//!
//! Paths are printed as `path:line` so that the editor can open them with
//! a click. When `color` is true, ANSI escape codes are emitted via
//! `owo_colors`.

use crate::config::Project;
use crate::protocol::{LineMatch, Response};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::path::Path;

// ── matches ─────────────────────────────────────────────────────────────────

pub fn fmt_matches(
    w: &mut impl Write,
    matches: &[LineMatch],
    truncated: bool,
    color: bool,
) -> io::Result<()> {
    for m in matches {
        if color {
            writeln!(
                w,
                "{}{} {}",
                m.path.display().bold(),
                format_args!(":{}:", m.line).green(),
                m.text
            )?;
        } else {
            writeln!(w, "{}:{}: {}", m.path.display(), m.line, m.text)?;
        }
    }

    if truncated {
        let note = format!("... output cut at {} matches", matches.len());
        if color {
            writeln!(w, "{}", note.dimmed())?;
        } else {
            writeln!(w, "{note}")?;
        }
    }

    Ok(())
}

// ── located ─────────────────────────────────────────────────────────────────

pub fn fmt_located(
    w: &mut impl Write,
    path: &Path,
    line: Option<u64>,
    color: bool,
) -> io::Result<()> {
    match (line, color) {
        (Some(line), true) => writeln!(
            w,
            "{}{}",
            path.display().bold(),
            format_args!(":{line}").green()
        ),
        (Some(line), false) => writeln!(w, "{}:{line}", path.display()),
        (None, true) => writeln!(w, "{}", path.display().bold()),
        (None, false) => writeln!(w, "{}", path.display()),
    }
}

// ── projects ────────────────────────────────────────────────────────────────

/// Prints each project with the chords it accepts, its locations and its
/// exclusions.
pub fn fmt_projects(w: &mut impl Write, projects: &[Project], color: bool) -> io::Result<()> {
    for p in projects {
        if color {
            writeln!(w, "{}:", p.name.bold())?;
        } else {
            writeln!(w, "{}:", p.name)?;
        }

        for lang in &p.languages {
            let elements = lang
                .elements()
                .iter()
                .map(ToString::to_string)
                .chain(std::iter::once("all".to_string()))
                .collect::<Vec<_>>()
                .join(" ");
            if color {
                writeln!(w, "\t{}: {}", lang.cyan(), elements)?;
            } else {
                writeln!(w, "\t{lang}: {elements}")?;
            }
        }

        for loc in &p.locations {
            writeln!(w, "\t{loc}")?;
        }

        if !p.excluded.is_empty() {
            let excluded = p.excluded.join(" ");
            if color {
                writeln!(w, "\t{} {}", "excluded:".dimmed(), excluded.dimmed())?;
            } else {
                writeln!(w, "\texcluded: {excluded}")?;
            }
        }
    }

    Ok(())
}

// ── any response ────────────────────────────────────────────────────────────

/// Prints a response; errors go to `err` instead of `w`.
pub fn fmt_response(
    w: &mut impl Write,
    err: &mut impl Write,
    response: &Response,
    color: bool,
) -> io::Result<()> {
    match response {
        Response::Matches { matches, truncated } => fmt_matches(w, matches, *truncated, color),
        Response::Located { path, line } => fmt_located(w, path, *line, color),
        Response::Projects { projects } => fmt_projects(w, projects, color),
        Response::Ack { message } => writeln!(err, "{message}"),
        Response::Error { code, message } => {
            if color {
                writeln!(err, "{} {message}", format_args!("[{code}]").red())
            } else {
                writeln!(err, "[{code}] {message}")
            }
        }
    }
}
