//! Request dispatch.
//!
//! A request names a scope (`proj:all`, `proj:loc:<path>` or
//! `proj:<language>`) and a target. The scope is checked against the
//! project configuration before anything touches the filesystem; a scope
//! naming an unknown project, location or language is rejected outright.
//! The action then selects one of three strategies: regex search over the
//! scope, definition lookup, or file/directory resolution.

use crate::config::ProjectSet;
use crate::error::{DispatchError, ResolveError, SearchError, ServerError};
use crate::protocol::{Request, Response};
use crate::security::unescape_ext;
use crate::services::elements::{self, LinePattern, Plan};
use crate::services::{first_match, resolve, EntryKind, FileFilter, GrepService, Opener};
use crate::types::{Action, Element, Language};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Scope keyword for "every location of the project".
pub const ALL: &str = "all";
/// Scope keyword introducing a single location.
pub const LOC: &str = "loc";

/// A parsed location descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Scope {
    /// `proj:all`
    All { project: String },
    /// `proj:loc:<path>`
    Location { project: String, path: String },
    /// `proj:<language>`
    Language { project: String, language: String },
}

impl Scope {
    /// Parses a location descriptor.
    ///
    /// The path of a `loc` scope is everything after `proj:loc:`, colons
    /// included.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::MalformedLocation` if there are fewer than
    /// two fields or `loc` is not followed by a path.
    pub fn parse(descriptor: &str) -> Result<Self, DispatchError> {
        let malformed = || DispatchError::MalformedLocation(descriptor.to_string());
        let mut fields = descriptor.splitn(3, ':');
        let project = fields.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
        let sub = fields.next().filter(|s| !s.is_empty()).ok_or_else(malformed)?;
        let project = project.to_string();

        match sub {
            ALL => Ok(Self::All { project }),
            LOC => {
                let path = fields.next().filter(|p| !p.is_empty()).ok_or_else(malformed)?;
                Ok(Self::Location {
                    project,
                    path: path.to_string(),
                })
            }
            language => Ok(Self::Language {
                project,
                language: language.to_string(),
            }),
        }
    }

    #[must_use]
    pub fn project(&self) -> &str {
        match self {
            Self::All { project }
            | Self::Location { project, .. }
            | Self::Language { project, .. } => project,
        }
    }
}

/// Everything a search needs to know about its scope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchEnv {
    pub project: String,
    pub roots: Vec<PathBuf>,
    pub exts: Vec<String>,
    pub excluded: Vec<String>,
    pub language: Option<Language>,
}

impl SearchEnv {
    /// File filter for the env's own extensions.
    fn filter(&self) -> crate::Result<FileFilter> {
        Ok(FileFilter::new(&self.exts, &self.excluded)?)
    }

    /// File filter for `language`'s extensions, keeping the exclusions.
    fn language_filter(&self, language: Language) -> crate::Result<FileFilter> {
        let excluded: Vec<&str> = self.excluded.iter().map(String::as_str).collect();
        Ok(FileFilter::new(language.exts(), &excluded)?)
    }
}

/// Checks `scope` against the configuration and builds its search env.
///
/// # Errors
///
/// Returns `UnknownProject`, `UnknownLocation` or `UnknownLanguage` when
/// the scope names something the project does not have.
pub fn resolve_scope(projects: &ProjectSet, scope: &Scope) -> Result<SearchEnv, DispatchError> {
    let project = projects
        .get(scope.project())
        .ok_or_else(|| DispatchError::UnknownProject(scope.project().to_string()))?;

    let all_roots = || project.locations.iter().map(PathBuf::from).collect::<Vec<_>>();
    let (roots, exts, language) = match scope {
        Scope::All { .. } => (all_roots(), project.exts.clone(), None),
        Scope::Location { path, .. } => {
            if !project.contains_location(path) {
                return Err(DispatchError::UnknownLocation {
                    project: project.name.clone(),
                    location: path.clone(),
                });
            }
            (vec![PathBuf::from(path)], project.exts.clone(), None)
        }
        Scope::Language { language, .. } => {
            let unknown = || DispatchError::UnknownLanguage {
                project: project.name.clone(),
                language: language.clone(),
            };
            let lang: Language = language.parse().map_err(|_| unknown())?;
            if !project.supports(lang) {
                return Err(unknown());
            }
            let exts = lang.exts().iter().map(ToString::to_string).collect();
            (all_roots(), exts, Some(lang))
        }
    };

    Ok(SearchEnv {
        project: project.name.clone(),
        roots,
        exts,
        excluded: project.excluded.clone(),
        language,
    })
}

/// Candidate names for a `File` request.
///
/// A target that already looks like a path (has a `/` or an extension) is
/// used as is; otherwise each of the env's extensions is appended in turn.
#[must_use]
pub fn file_candidates(exts: &[String], target: &str) -> Vec<String> {
    let target = target.trim();
    if target.contains('/') || Path::new(target).extension().is_some() || exts.is_empty() {
        return vec![target.to_string()];
    }
    exts.iter()
        .map(|ext| format!("{target}{}", unescape_ext(ext)))
        .collect()
}

/// Executes project-level requests.
///
/// Server control actions (`ListProjects`, `Reload`, `Kill`) need server
/// state and are answered by the server itself.
pub struct Dispatcher {
    grep: GrepService,
    opener: Arc<dyn Opener>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(grep: GrepService, opener: Arc<dyn Opener>) -> Self {
        Self { grep, opener }
    }

    /// Answers `request` against the `projects` snapshot.
    ///
    /// Never fails: every error becomes an `Error` response.
    pub fn handle(
        &self,
        projects: &ProjectSet,
        request: &Request,
        cancel: &CancellationToken,
    ) -> Response {
        let Request {
            action,
            location,
            target,
        } = request;
        let action = *action;
        if action.is_control() {
            return ServerError::from(DispatchError::ServerAction(action.code())).into();
        }
        if target.trim().is_empty() {
            return Response::ack("empty target, nothing to do");
        }

        match self.execute(projects, action, location, target, cancel) {
            Ok(response) => response,
            Err(e) => {
                match e.code() {
                    "NOT_FOUND" | "CANCELLED" => {
                        tracing::info!("{action:?} {location} {target}: {e}");
                    }
                    _ => tracing::warn!("{action:?} {location} {target}: {e}"),
                }
                e.into()
            }
        }
    }

    fn execute(
        &self,
        projects: &ProjectSet,
        action: Action,
        location: &str,
        target: &str,
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        let scope = Scope::parse(location)?;
        let env = resolve_scope(projects, &scope)?;

        match (action, action.element()) {
            (Action::Regex, _) => {
                self.search(&env, &LinePattern::new(target), env.filter()?, cancel)
            }
            (Action::File, _) => {
                self.open_file(&env, &file_candidates(&env.exts, target), cancel)
            }
            (_, Some(element)) => self.find_element(&env, element, target, cancel),
            _ => Err(DispatchError::ServerAction(action.code()).into()),
        }
    }

    fn search(
        &self,
        env: &SearchEnv,
        pattern: &LinePattern,
        filter: FileFilter,
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        let outcome = self.grep.search(pattern, &env.roots, &filter, cancel)?;
        tracing::info!(
            "{}: {} matches in {} files for {}",
            env.project,
            outcome.matches.len(),
            outcome.files_searched,
            pattern.regex
        );
        Ok(Response::Matches {
            matches: outcome.matches,
            truncated: outcome.truncated,
        })
    }

    fn find_element(
        &self,
        env: &SearchEnv,
        element: Element,
        target: &str,
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        match elements::plan(element, target)? {
            Plan::DefinitionFile {
                candidates,
                pattern,
            } => self.find_definition(env, &candidates, &pattern, cancel),
            Plan::Scoped { language, pattern } => {
                self.search(env, &pattern, env.language_filter(language)?, cancel)
            }
            Plan::OpenFile { candidates } => self.open_file(env, &candidates, cancel),
            Plan::OpenDir { fragment } => {
                let path = resolve(&fragment, &env.roots, EntryKind::Dir).ok_or_else(|| {
                    ResolveError::NotFound {
                        fragment: fragment.clone(),
                        roots: env.roots.len(),
                    }
                })?;
                self.located(path, None, cancel)
            }
        }
    }

    /// Scans the first resolvable candidate file for the definition line.
    fn find_definition(
        &self,
        env: &SearchEnv,
        candidates: &[String],
        pattern: &LinePattern,
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        let mut scanned = Vec::new();
        for candidate in candidates {
            if cancel.is_cancelled() {
                return Err(SearchError::Cancelled.into());
            }
            let Some(path) = resolve(candidate, &env.roots, EntryKind::Any) else {
                continue;
            };
            if let Some(line) = first_match(&path, pattern)? {
                return self.located(path, Some(line), cancel);
            }
            scanned.push(path.display().to_string());
        }

        if scanned.is_empty() {
            return Err(ResolveError::NotFound {
                fragment: candidates.join(" or "),
                roots: env.roots.len(),
            }
            .into());
        }
        Err(DispatchError::NotFound(format!("{} in {}", pattern.regex, scanned.join(", "))).into())
    }

    fn open_file(
        &self,
        env: &SearchEnv,
        candidates: &[String],
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        let path = candidates
            .iter()
            .find_map(|c| resolve(c, &env.roots, EntryKind::Any))
            .ok_or_else(|| ResolveError::NotFound {
                fragment: candidates.join(" or "),
                roots: env.roots.len(),
            })?;
        self.located(path, None, cancel)
    }

    /// Hands a resolved path to the opener, unless the request was killed.
    fn located(
        &self,
        path: PathBuf,
        line: Option<u64>,
        cancel: &CancellationToken,
    ) -> crate::Result<Response> {
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled.into());
        }
        self.opener.open(&path, line);
        Ok(Response::Located { path, line })
    }
}
