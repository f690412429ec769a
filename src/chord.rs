//! Chord translation.
//!
//! A chord is a location descriptor typed next to a target in the editor:
//!
//! | chord                 | request                                          |
//! |-----------------------|--------------------------------------------------|
//! | `proj:all`            | regex search, target used as a regex             |
//! | `proj:go:all`         | regex search over go files, target literal       |
//! | `proj:go:func`        | go function definition search                    |
//! | `proj:loc:/src/x`     | regex search in one location, target literal     |
//! | `proj:/src/x`         | same as `proj:loc:/src/x`                        |

use crate::config::Project;
use crate::dispatch::{ALL, LOC};
use crate::error::DispatchError;
use crate::protocol::Request;
use crate::security::escape_specials;
use crate::types::{Action, Language};

/// Translates a chord and its target into a request.
///
/// # Errors
///
/// Returns `MalformedLocation` for a chord without a scope,
/// `UnknownLanguage` or `UnknownElement` when the chord names a language
/// or element that does not exist.
pub fn translate(chord: &str, target: &str) -> Result<Request, DispatchError> {
    let malformed = || DispatchError::MalformedLocation(chord.to_string());
    let chord = chord.trim();
    let (project, rest) = chord.split_once(':').ok_or_else(malformed)?;
    if project.is_empty() || rest.is_empty() {
        return Err(malformed());
    }

    if rest == ALL {
        return Ok(Request::new(Action::Regex, chord, target));
    }

    if let Some(path) = rest.strip_prefix(LOC).and_then(|r| r.strip_prefix(':')) {
        return location_search(project, path, target).ok_or_else(malformed);
    }
    if rest.starts_with('/') {
        return location_search(project, rest, target).ok_or_else(malformed);
    }

    let (language, element) = rest.split_once(':').unwrap_or((rest, ALL));
    let lang: Language = language
        .parse()
        .map_err(|_| DispatchError::UnknownLanguage {
            project: project.to_string(),
            language: language.to_string(),
        })?;
    let location = format!("{project}:{lang}");

    if element == ALL {
        return Ok(Request::new(Action::Regex, location, escape_specials(target)));
    }
    let element = lang
        .element(element)
        .ok_or_else(|| DispatchError::UnknownElement {
            language: lang.to_string(),
            element: element.to_string(),
        })?;
    Ok(Request::new(element.action(), location, target))
}

/// Literal search for `text` in location number `index` of `project`.
///
/// A project without locations is searched as a whole.
///
/// # Errors
///
/// Returns `UnknownLocation` if the project has locations but fewer than
/// `index + 1`.
pub fn text_search(project: &Project, index: usize, text: &str) -> Result<Request, DispatchError> {
    if project.locations.is_empty() {
        return Ok(Request::new(
            Action::Regex,
            format!("{}:{ALL}", project.name),
            escape_specials(text),
        ));
    }
    let path = project
        .locations
        .get(index)
        .ok_or_else(|| DispatchError::UnknownLocation {
            project: project.name.clone(),
            location: format!("#{index}"),
        })?;
    location_search(&project.name, path, text)
        .ok_or_else(|| DispatchError::MalformedLocation(format!("{}:{LOC}:", project.name)))
}

fn location_search(project: &str, path: &str, target: &str) -> Option<Request> {
    if path.is_empty() {
        return None;
    }
    Some(Request::new(
        Action::Regex,
        format!("{project}:{LOC}:{path}"),
        escape_specials(target),
    ))
}
