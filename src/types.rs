//! Closed vocabularies shared by client and server.
//!
//! `Action` is the wire-level request code, `Language` and `Element` are
//! what a chord names. Keeping them as enums means an unknown code or
//! element is rejected at the edge instead of deep inside a search.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// What kind of search a request asks for.
///
/// The integer codes are part of the wire format and must not be
/// renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Action {
    Regex,
    File,
    FortranFunction,
    FortranModule,
    FortranSubroutine,
    FortranType,
    CppInclude,
    CppClassMethod,
    CppClassMember,
    GoPackage,
    GoFunction,
    GoMethod,
    GoType,
    PythonFunction,
    ListProjects,
    Reload,
    Kill,
    PythonModule,
}

impl Action {
    /// Every action, indexed by its wire code.
    pub const ALL: [Self; 18] = [
        Self::Regex,
        Self::File,
        Self::FortranFunction,
        Self::FortranModule,
        Self::FortranSubroutine,
        Self::FortranType,
        Self::CppInclude,
        Self::CppClassMethod,
        Self::CppClassMember,
        Self::GoPackage,
        Self::GoFunction,
        Self::GoMethod,
        Self::GoType,
        Self::PythonFunction,
        Self::ListProjects,
        Self::Reload,
        Self::Kill,
        Self::PythonModule,
    ];

    #[must_use]
    pub const fn code(self) -> u32 {
        self as u32
    }

    /// Actions that operate on server state rather than on a project.
    #[must_use]
    pub const fn is_control(self) -> bool {
        matches!(self, Self::ListProjects | Self::Reload | Self::Kill)
    }

    /// The language element an action searches for, if any.
    #[must_use]
    pub const fn element(self) -> Option<Element> {
        match self {
            Self::FortranFunction => Some(Element::FortranFunction),
            Self::FortranModule => Some(Element::FortranModule),
            Self::FortranSubroutine => Some(Element::FortranSubroutine),
            Self::FortranType => Some(Element::FortranType),
            Self::CppInclude => Some(Element::CppInclude),
            Self::CppClassMethod => Some(Element::CppStaticMethod),
            Self::CppClassMember => Some(Element::CppStaticMember),
            Self::GoPackage => Some(Element::GoPackage),
            Self::GoFunction => Some(Element::GoFunction),
            Self::GoMethod => Some(Element::GoMethod),
            Self::GoType => Some(Element::GoType),
            Self::PythonFunction => Some(Element::PythonDef),
            Self::PythonModule => Some(Element::PythonModule),
            _ => None,
        }
    }
}

impl From<Action> for u32 {
    fn from(action: Action) -> Self {
        action.code()
    }
}

impl TryFrom<u32> for Action {
    type Error = UnknownAction;

    fn try_from(code: u32) -> Result<Self, Self::Error> {
        usize::try_from(code)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(UnknownAction(code))
    }
}

/// An action code outside the known range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAction(pub u32);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action code {}", self.0)
    }
}

/// Languages a project can be browsed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    #[serde(rename = "go")]
    Go,
    #[serde(rename = "python")]
    Python,
    #[serde(rename = "fortran")]
    Fortran,
    #[serde(rename = "c++")]
    Cpp,
}

impl Language {
    pub const ALL: [Self; 4] = [Self::Go, Self::Python, Self::Fortran, Self::Cpp];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Go => "go",
            Self::Python => "python",
            Self::Fortran => "fortran",
            Self::Cpp => "c++",
        }
    }

    /// Extension patterns for this language, as regexes matched at the end
    /// of a path.
    ///
    /// For c++ the header pattern is last: class sources are looked up in
    /// every pattern but the last, class headers in the last one only.
    #[must_use]
    pub const fn exts(self) -> &'static [&'static str] {
        match self {
            Self::Go => &[r"\.go"],
            Self::Python => &[r"\.py"],
            Self::Fortran => &[r"\.f", r"\.F", r"\.f90", r"\.F90"],
            Self::Cpp => &[r"\.cc", r"\.cpp", r"\.h"],
        }
    }

    /// Elements a chord may name for this language.
    #[must_use]
    pub const fn elements(self) -> &'static [Element] {
        match self {
            Self::Go => &[
                Element::GoFunction,
                Element::GoMethod,
                Element::GoType,
                Element::GoPackage,
            ],
            Self::Python => &[Element::PythonDef, Element::PythonModule],
            Self::Fortran => &[
                Element::FortranFunction,
                Element::FortranModule,
                Element::FortranSubroutine,
                Element::FortranType,
            ],
            Self::Cpp => &[
                Element::CppStaticMethod,
                Element::CppStaticMember,
                Element::CppInclude,
            ],
        }
    }

    /// Looks up an element of this language by its chord name.
    #[must_use]
    pub fn element(self, name: &str) -> Option<Element> {
        self.elements().iter().copied().find(|e| e.name() == name)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|l| l.name() == s)
            .ok_or_else(|| format!("unknown language: '{s}'"))
    }
}

/// A syntactic category a chord can search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Element {
    GoFunction,
    GoMethod,
    GoType,
    GoPackage,
    PythonDef,
    PythonModule,
    FortranFunction,
    FortranModule,
    FortranSubroutine,
    FortranType,
    CppInclude,
    CppStaticMethod,
    CppStaticMember,
}

impl Element {
    /// Name of the element as written in a chord.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::GoFunction => "func",
            Self::GoMethod => "method",
            Self::GoType => "type",
            Self::GoPackage => "package",
            Self::PythonDef => "def",
            Self::PythonModule => "module",
            Self::FortranFunction => "function",
            Self::FortranModule => "module",
            Self::FortranSubroutine => "subroutine",
            Self::FortranType => "type",
            Self::CppInclude => "include",
            Self::CppStaticMethod => "staticMethod",
            Self::CppStaticMember => "staticMember",
        }
    }

    #[must_use]
    pub const fn language(self) -> Language {
        match self {
            Self::GoFunction | Self::GoMethod | Self::GoType | Self::GoPackage => Language::Go,
            Self::PythonDef | Self::PythonModule => Language::Python,
            Self::FortranFunction
            | Self::FortranModule
            | Self::FortranSubroutine
            | Self::FortranType => Language::Fortran,
            Self::CppInclude | Self::CppStaticMethod | Self::CppStaticMember => Language::Cpp,
        }
    }

    /// The request action that searches for this element.
    #[must_use]
    pub const fn action(self) -> Action {
        match self {
            Self::GoFunction => Action::GoFunction,
            Self::GoMethod => Action::GoMethod,
            Self::GoType => Action::GoType,
            Self::GoPackage => Action::GoPackage,
            Self::PythonDef => Action::PythonFunction,
            Self::PythonModule => Action::PythonModule,
            Self::FortranFunction => Action::FortranFunction,
            Self::FortranModule => Action::FortranModule,
            Self::FortranSubroutine => Action::FortranSubroutine,
            Self::FortranType => Action::FortranType,
            Self::CppInclude => Action::CppInclude,
            Self::CppStaticMethod => Action::CppClassMethod,
            Self::CppStaticMember => Action::CppClassMember,
        }
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// Compile-time assertions for thread safety.
#[cfg(test)]
const _: () = {
    const fn assert_send_sync<T: Send + Sync>() {}

    assert_send_sync::<Action>();
    assert_send_sync::<Language>();
    assert_send_sync::<Element>();
};
