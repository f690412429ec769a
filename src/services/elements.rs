//! Per-language element lookup plans.
//!
//! Turns a chord target such as `Foo<T>::bar(` or `Serve` into a
//! [`Plan`]: which file(s) to resolve, which line pattern to look for,
//! and whether the pattern is scanned in one conventionally named file
//! or searched across the whole scope.
//!
//! No overload or signature disambiguation happens here: the first
//! definition-shaped line wins, templated class names are cut at `<`,
//! and declarations spanning several lines are not recognized.

use crate::error::{DispatchError, SearchError};
use crate::security::{escape_specials, unescape_ext};
use crate::types::{Element, Language};
use grep_regex::{RegexMatcher, RegexMatcherBuilder};

/// A line-oriented regular expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinePattern {
    pub regex: String,
    pub case_insensitive: bool,
}

impl LinePattern {
    #[must_use]
    pub fn new(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            case_insensitive: false,
        }
    }

    #[must_use]
    pub fn case_insensitive(regex: impl Into<String>) -> Self {
        Self {
            regex: regex.into(),
            case_insensitive: true,
        }
    }

    /// Compiles the pattern into a line matcher.
    ///
    /// # Errors
    ///
    /// Returns `SearchError::InvalidPattern` if the regex does not compile.
    pub fn matcher(&self) -> Result<RegexMatcher, SearchError> {
        RegexMatcherBuilder::new()
            .case_insensitive(self.case_insensitive)
            .line_terminator(Some(b'\n'))
            .build(&self.regex)
            .map_err(|e| SearchError::InvalidPattern(e.to_string()))
    }
}

/// How to find a language element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    /// Resolve the first candidate file that exists, report the first
    /// line matching `pattern` in it.
    DefinitionFile {
        candidates: Vec<String>,
        pattern: LinePattern,
    },
    /// Search every file of the language in scope, report all matches.
    Scoped {
        language: Language,
        pattern: LinePattern,
    },
    /// Resolve the first candidate file that exists.
    OpenFile { candidates: Vec<String> },
    /// Resolve a directory.
    OpenDir { fragment: String },
}

/// Builds the lookup plan for `element` named by `target`.
///
/// # Errors
///
/// Returns `DispatchError::MalformedTarget` when `target` does not have
/// the shape the element needs (e.g. a class method without `::`).
pub fn plan(element: Element, target: &str) -> Result<Plan, DispatchError> {
    let target = target.trim();
    match element {
        Element::CppStaticMethod => {
            let (class, rest) = split_class(target)?;
            let method = identifier(before_paren(rest), target)?;
            let sources = &Language::Cpp.exts()[..Language::Cpp.exts().len() - 1];
            Ok(Plan::DefinitionFile {
                candidates: sources
                    .iter()
                    .map(|ext| format!("{class}{}", unescape_ext(ext)))
                    .collect(),
                pattern: LinePattern::new(format!(
                    r"{}.*::{}\b",
                    escape_specials(class),
                    escape_specials(method)
                )),
            })
        }
        Element::CppStaticMember => {
            let (class, rest) = split_class(target)?;
            let member = identifier(rest, target)?;
            let header = Language::Cpp.exts().last().copied().unwrap_or(r"\.h");
            Ok(Plan::DefinitionFile {
                candidates: vec![format!("{class}{}", unescape_ext(header))],
                pattern: LinePattern::new(format!(r".* +{} *(;|,)", escape_specials(member))),
            })
        }
        Element::CppInclude => {
            let name = target.trim_matches(|c| matches!(c, '"' | '<' | '>'));
            if name.is_empty() {
                return Err(malformed(target, "empty include"));
            }
            Ok(Plan::OpenFile {
                candidates: vec![name.to_string()],
            })
        }
        Element::FortranSubroutine => {
            let name = identifier(before_paren(target), target)?;
            Ok(scoped_ci(
                Language::Fortran,
                format!(r"^ *subroutine {} *\(", escape_specials(name)),
            ))
        }
        Element::FortranFunction => {
            let name = identifier(before_paren(target), target)?;
            Ok(scoped_ci(
                Language::Fortran,
                format!(r"^[\w ,()*]*\bfunction +{} *\(", escape_specials(name)),
            ))
        }
        Element::FortranModule => {
            let name = identifier(target, target)?;
            Ok(scoped_ci(
                Language::Fortran,
                format!(r"^ *module +{}\b", escape_specials(name)),
            ))
        }
        Element::FortranType => {
            let name = identifier(target, target)?;
            Ok(scoped_ci(
                Language::Fortran,
                format!(r"^ *type *(,[^:]*)?(::)? *{}\b", escape_specials(name)),
            ))
        }
        Element::GoFunction => {
            let name = identifier(last_segment(before_paren(target)), target)?;
            Ok(scoped(
                Language::Go,
                format!(r"^func +{} *[\[(]", escape_specials(name)),
            ))
        }
        Element::GoMethod => {
            let name = identifier(last_segment(before_call(target)), target)?;
            Ok(scoped(
                Language::Go,
                format!(r"^func +\([^)]*\) +{} *[\[(]", escape_specials(name)),
            ))
        }
        Element::GoType => {
            let name = identifier(last_segment(target), target)?;
            Ok(scoped(
                Language::Go,
                format!(r"^type +{}\b", escape_specials(name)),
            ))
        }
        Element::GoPackage => {
            let fragment = clean_go_import(target);
            if fragment.is_empty() {
                return Err(malformed(target, "empty import path"));
            }
            Ok(Plan::OpenDir { fragment })
        }
        Element::PythonDef => {
            let name = identifier(last_segment(before_paren(target)), target)?;
            Ok(scoped(
                Language::Python,
                format!(r"^ *def +{} *\(", escape_specials(name)),
            ))
        }
        Element::PythonModule => {
            let dotted = identifier_path(target)?;
            let base = dotted.replace('.', "/");
            Ok(Plan::OpenFile {
                candidates: vec![format!("{base}.py"), format!("{base}/__init__.py")],
            })
        }
    }
}

/// Reduces an import line to its path: `  foo "a/b/c"` becomes `a/b/c`.
#[must_use]
pub fn clean_go_import(line: &str) -> String {
    let line = line.trim();
    let quoted = match (line.find('"'), line.rfind('"')) {
        (Some(start), Some(end)) if end > start => &line[start + 1..end],
        _ => line.trim_matches('"'),
    };
    quoted.trim().to_string()
}

fn scoped(language: Language, regex: String) -> Plan {
    Plan::Scoped {
        language,
        pattern: LinePattern::new(regex),
    }
}

// Fortran is case-insensitive
fn scoped_ci(language: Language, regex: String) -> Plan {
    Plan::Scoped {
        language,
        pattern: LinePattern::case_insensitive(regex),
    }
}

fn malformed(target: &str, reason: &'static str) -> DispatchError {
    DispatchError::MalformedTarget {
        target: target.to_string(),
        reason,
    }
}

/// Splits `Class<T>::rest` into `("Class", "rest")`.
fn split_class(target: &str) -> Result<(&str, &str), DispatchError> {
    let (class, rest) = target
        .split_once("::")
        .ok_or_else(|| malformed(target, "expected Class::name"))?;
    let class = class.split('<').next().unwrap_or(class).trim();
    let class = identifier(class, target)?;
    Ok((class, rest.trim()))
}

fn before_paren(s: &str) -> &str {
    s.split('(').next().unwrap_or(s).trim()
}

/// Like `before_paren`, but keeps a leading receiver such as `(*T).M`.
fn before_call(s: &str) -> &str {
    let s = s.trim();
    match s.rfind(')') {
        Some(close) if s.starts_with('(') => {
            let tail = &s[close + 1..];
            before_paren(tail)
        }
        _ => before_paren(s),
    }
}

fn last_segment(s: &str) -> &str {
    s.rsplit('.').next().unwrap_or(s).trim()
}

fn is_ident(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_')
        && chars.all(|c| c.is_alphanumeric() || c == '_')
}

fn identifier<'a>(name: &'a str, target: &str) -> Result<&'a str, DispatchError> {
    let name = name.trim();
    if is_ident(name) {
        Ok(name)
    } else {
        Err(malformed(target, "expected an identifier"))
    }
}

fn identifier_path(target: &str) -> Result<&str, DispatchError> {
    if !target.is_empty() && target.split('.').all(is_ident) {
        Ok(target)
    } else {
        Err(malformed(target, "expected a dotted module name"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn regex_of(plan: &Plan) -> regex::Regex {
        let pattern = match plan {
            Plan::DefinitionFile { pattern, .. } | Plan::Scoped { pattern, .. } => pattern,
            other => panic!("plan has no pattern: {other:?}"),
        };
        regex::RegexBuilder::new(&pattern.regex)
            .case_insensitive(pattern.case_insensitive)
            .build()
            .unwrap()
    }

    #[test]
    fn test_fortran_subroutine_template() {
        let plan = plan(Element::FortranSubroutine, "foo(a, b)").unwrap();
        let re = regex_of(&plan);
        assert_eq!(re.as_str(), r"^ *subroutine foo *\(");
        assert!(re.is_match("subroutine foo(x, y)"));
        assert!(re.is_match("SUBROUTINE FOO (x)"));
        assert!(!re.is_match("subroutine food(x)"));
        assert!(re.is_match("  subroutine foo(x)"));
        assert!(!re.is_match("  call foo(x)"));
        assert!(!re.is_match("end subroutine foo"));
    }

    #[test]
    fn test_fortran_function_and_type() {
        let func = regex_of(&plan(Element::FortranFunction, "area").unwrap());
        assert!(func.is_match("real(kind=8) function area(r)"));
        assert!(func.is_match("function area (r)"));
        assert!(!func.is_match("x = area(r)"));

        let ty = regex_of(&plan(Element::FortranType, "point").unwrap());
        assert!(ty.is_match("type point"));
        assert!(ty.is_match("  type, public :: point"));
        assert!(ty.is_match("type :: point"));
        assert!(!ty.is_match("type(point) :: p"));
        assert!(!ty.is_match("type pointer"));
    }

    #[test]
    fn test_cpp_class_method() {
        let plan = plan(Element::CppStaticMethod, "Foo<int>::bar(").unwrap();
        match &plan {
            Plan::DefinitionFile { candidates, .. } => {
                assert_eq!(candidates, &vec!["Foo.cc".to_string(), "Foo.cpp".to_string()]);
            }
            other => panic!("unexpected plan {other:?}"),
        }
        let re = regex_of(&plan);
        assert!(re.is_match("void Foo<T>::bar(int x)"));
        assert!(re.is_match("int Foo::bar() const"));
        assert!(!re.is_match("int Foo::barbaz()"));
    }

    #[test]
    fn test_cpp_class_member_uses_header() {
        let plan = plan(Element::CppStaticMember, "Foo::count_").unwrap();
        match &plan {
            Plan::DefinitionFile { candidates, .. } => {
                assert_eq!(candidates, &vec!["Foo.h".to_string()]);
            }
            other => panic!("unexpected plan {other:?}"),
        }
        let re = regex_of(&plan);
        assert!(re.is_match("    static int count_;"));
        assert!(re.is_match("    int count_, total_;"));
        assert!(!re.is_match("    count_ = 0;"));
    }

    #[test]
    fn test_cpp_method_without_class_rejected() {
        assert!(matches!(
            plan(Element::CppStaticMethod, "bar("),
            Err(DispatchError::MalformedTarget { .. })
        ));
    }

    #[test]
    fn test_cpp_include_strips_delimiters() {
        assert_eq!(
            plan(Element::CppInclude, "<net/socket.h>").unwrap(),
            Plan::OpenFile {
                candidates: vec!["net/socket.h".to_string()]
            }
        );
    }

    #[test]
    fn test_go_patterns() {
        let func = regex_of(&plan(Element::GoFunction, "http.ListenAndServe(").unwrap());
        assert!(func.is_match("func ListenAndServe(addr string) error {"));
        assert!(func.is_match("func ListenAndServe[T any](x T) {"));
        assert!(!func.is_match("func (s *Server) ListenAndServe() error {"));

        let meth = regex_of(&plan(Element::GoMethod, "(*Server).Serve").unwrap());
        assert!(meth.is_match("func (s *Server) Serve(l net.Listener) error {"));
        assert!(!meth.is_match("func Serve(l net.Listener) error {"));

        let ty = regex_of(&plan(Element::GoType, "Server").unwrap());
        assert!(ty.is_match("type Server struct {"));
        assert!(!ty.is_match("type ServerConfig struct {"));
    }

    #[test]
    fn test_go_package_import_line() {
        assert_eq!(clean_go_import("\t\"net/http\""), "net/http");
        assert_eq!(clean_go_import(r#"  pb "camlistore.org/pkg/blob""#), "camlistore.org/pkg/blob");
        assert_eq!(
            plan(Element::GoPackage, " \"fmt\"").unwrap(),
            Plan::OpenDir {
                fragment: "fmt".to_string()
            }
        );
    }

    #[test]
    fn test_python_def_and_module() {
        let def = regex_of(&plan(Element::PythonDef, "self.load(").unwrap());
        assert!(def.is_match("    def load(self, path):"));
        assert!(!def.is_match("    def loader(self):"));

        assert_eq!(
            plan(Element::PythonModule, "pkg.sub.mod").unwrap(),
            Plan::OpenFile {
                candidates: vec![
                    "pkg/sub/mod.py".to_string(),
                    "pkg/sub/mod/__init__.py".to_string(),
                ]
            }
        );
        assert!(plan(Element::PythonModule, "pkg..mod").is_err());
    }

    #[test]
    fn test_non_identifier_rejected() {
        assert!(plan(Element::GoType, "a b").is_err());
        assert!(plan(Element::FortranSubroutine, "(x)").is_err());
    }
}
