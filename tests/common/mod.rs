//! Common test utilities for chordfind integration tests.
//!
//! Provides `TestEnv` for setting up isolated projects on disk with a
//! dispatcher and a recording opener wired together.

#![allow(dead_code)] // Test utilities may not all be used in every test file

use chordfind::config::{ConfigStore, Project, ProjectSet};
use chordfind::dispatch::Dispatcher;
use chordfind::protocol::{Request, Response};
use chordfind::server::{Server, ServerConfig};
use chordfind::services::{GrepService, Opener};
use chordfind::{Action, Language};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Opener that remembers what it was asked to open.
#[derive(Default)]
pub struct RecordingOpener {
    pub opened: Mutex<Vec<(PathBuf, Option<u64>)>>,
}

impl RecordingOpener {
    pub fn opened(&self) -> Vec<(PathBuf, Option<u64>)> {
        self.opened.lock().unwrap().clone()
    }
}

impl Opener for RecordingOpener {
    fn open(&self, path: &Path, line: Option<u64>) {
        self.opened.lock().unwrap().push((path.to_path_buf(), line));
    }
}

/// A test project on disk with everything wired together.
pub struct TestEnv {
    pub dir: TempDir,
    pub project: Project,
    pub opener: Arc<RecordingOpener>,
}

impl TestEnv {
    /// Creates a project named `p` with one root, browsed in every language.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp directory");
        let root = dir.path().join("root");
        fs::create_dir_all(&root).expect("Failed to create root");
        let project = Project {
            name: "p".to_string(),
            languages: Language::ALL.to_vec(),
            locations: vec![root.display().to_string()],
            exts: Language::ALL
                .iter()
                .flat_map(|l| l.exts().iter().map(ToString::to_string))
                .collect(),
            excluded: vec![],
        };
        Self {
            dir,
            project,
            opener: Arc::new(RecordingOpener::default()),
        }
    }

    /// Adds another root directory `name` to the project.
    pub fn add_root(&mut self, name: &str) -> PathBuf {
        let root = self.dir.path().join(name);
        fs::create_dir_all(&root).expect("Failed to create root");
        self.project.locations.push(root.display().to_string());
        root
    }

    /// The first root.
    pub fn root(&self) -> PathBuf {
        PathBuf::from(&self.project.locations[0])
    }

    /// Writes a file relative to the temp directory.
    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        fs::write(&path, content).expect("Failed to write test file");
    }

    /// Gets the full path to a file in the temp directory.
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    pub fn projects(&self) -> ProjectSet {
        ProjectSet::from_projects(vec![self.project.clone()]).expect("Invalid test project")
    }

    pub fn dispatcher(&self) -> Dispatcher {
        Dispatcher::new(GrepService::new(), Arc::clone(&self.opener) as Arc<dyn Opener>)
    }

    /// Dispatches one request against the current project.
    pub fn handle(&self, action: Action, location: &str, target: &str) -> Response {
        self.dispatcher().handle(
            &self.projects(),
            &Request::new(action, location, target),
            &CancellationToken::new(),
        )
    }

    /// Writes the project to a config file and returns its path.
    pub fn write_config(&self) -> PathBuf {
        let path = self.path("projects.json");
        let json = serde_json::to_string_pretty(&vec![&self.project]).expect("Bad project");
        fs::write(&path, json).expect("Failed to write config");
        path
    }

    pub fn server(&self) -> Server {
        self.server_with(Arc::clone(&self.opener) as Arc<dyn Opener>)
    }

    /// A server over the current project forwarding paths to `opener`.
    pub fn server_with(&self, opener: Arc<dyn Opener>) -> Server {
        let store = ConfigStore::open(self.write_config()).expect("Failed to load config");
        Server::new(store, ServerConfig::default(), opener)
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}

/// Matched `(relative path, line)` pairs of a `Matches` response.
pub fn matched_lines(env: &TestEnv, response: &Response) -> Vec<(String, u64)> {
    match response {
        Response::Matches { matches, .. } => matches
            .iter()
            .map(|m| {
                let rel = m.path.strip_prefix(env.dir.path()).unwrap_or(&m.path);
                (rel.display().to_string(), m.line)
            })
            .collect(),
        other => panic!("expected matches, got {other:?}"),
    }
}

/// Error code of an `Error` response.
pub fn error_code(response: &Response) -> &str {
    match response {
        Response::Error { code, .. } => code,
        other => panic!("expected an error, got {other:?}"),
    }
}

/// Creates a test environment with a small multi-language code base.
pub fn polyglot_codebase() -> TestEnv {
    let env = TestEnv::new();

    env.write_file(
        "root/server/http/server.go",
        r#"package http

import (
	"net"
)

type Server struct {
	Addr string
}

func ListenAndServe(addr string) error {
	return nil
}

func (s *Server) Serve(l net.Listener) error {
	return nil
}
"#,
    );
    env.write_file(
        "root/server/http/server_test.go",
        "package http\n\nfunc TestServe(t *testing.T) {}\n",
    );
    env.write_file(
        "root/tools/gen.py",
        r#"import os


def generate(path):
    return os.path.join(path, "out")


class Gen:
    def generate(self):
        pass
"#,
    );
    env.write_file("root/tools/pkg/__init__.py", "VERSION = 1\n");
    env.write_file(
        "root/numeric/solver.f90",
        r#"module solver
  implicit none
contains
  subroutine food(x)
    real :: x
  end subroutine food

  subroutine foo(x, y)
    real :: x, y
  end subroutine foo

  real function area(r)
    real :: r
    area = 3.14 * r * r
  end function area
end module solver
"#,
    );
    env.write_file(
        "root/lib/Shape.h",
        r#"#pragma once

class Shape {
public:
    double area() const;
    static int count_;
    int width_, height_;
};
"#,
    );
    env.write_file(
        "root/lib/Shape.cc",
        r#"#include "Shape.h"

int Shape::count_ = 0;

double Shape::area() const {
    return width_ * height_;
}
"#,
    );
    env.write_file("root/README.txt", "func ListenAndServe is documented here\n");

    env
}
