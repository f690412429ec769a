//! Pattern hygiene for user-supplied search targets.
//!
//! A regex typed into a chord goes straight into a search over every file
//! of a project, so it is checked for length, nesting depth and nested
//! quantifiers before compilation. Literal targets are escaped instead.

use thiserror::Error;

/// Pattern rejection.
#[derive(Error, Debug, Clone)]
pub enum SecurityError {
    #[error("Regex pattern rejected: {reason}")]
    DangerousPattern { pattern: String, reason: &'static str },
}

impl SecurityError {
    /// Returns a machine-readable error code.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::DangerousPattern { .. } => "DANGEROUS_PATTERN",
        }
    }
}

// ============================================================================
// Escaping
// ============================================================================

/// Characters escaped by [`escape_specials`].
const SPECIALS: &[char] = &[
    '\\', '(', ')', '*', '+', '?', '.', '[', ']', '{', '}', '|', '^', '$',
];

/// Escapes regex metacharacters so `s` matches itself literally.
///
/// Whitespace and other characters are kept as they are, so a target
/// like `foo(bar, baz)` still reads naturally in the logs.
///
/// # Example
///
/// ```
/// use chordfind::security::escape_specials;
///
/// assert_eq!(escape_specials("a.b(c)*"), r"a\.b\(c\)\*");
/// ```
#[must_use]
pub fn escape_specials(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len() + 8);
    for c in s.chars() {
        if SPECIALS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Removes regex escapes from an extension pattern: `\.cpp` becomes `.cpp`.
#[must_use]
pub fn unescape_ext(pattern: &str) -> String {
    pattern.replace('\\', "")
}

// ============================================================================
// ReDoS Protection
// ============================================================================

/// Maximum allowed pattern length.
pub const MAX_PATTERN_LENGTH: usize = 500;

/// Maximum nesting depth for groups.
pub const MAX_NESTING_DEPTH: usize = 5;

/// Validates a regex pattern for potential ReDoS vulnerabilities.
///
/// Checks for:
/// 1. Pattern length limits
/// 2. Excessive nesting depth
/// 3. Known dangerous patterns (e.g., `(a+)+`, `(.*)*`)
///
/// # Example
///
/// ```
/// use chordfind::security::validate_regex_pattern;
///
/// // Safe patterns
/// assert!(validate_regex_pattern(r"^subroutine foo *\(").is_ok());
/// assert!(validate_regex_pattern("Foo.*::bar").is_ok());
///
/// // Dangerous patterns
/// assert!(validate_regex_pattern("(a+)+$").is_err());
/// assert!(validate_regex_pattern("(.*)*").is_err());
/// ```
pub fn validate_regex_pattern(pattern: &str) -> Result<(), SecurityError> {
    if pattern.len() > MAX_PATTERN_LENGTH {
        return Err(SecurityError::DangerousPattern {
            pattern: pattern.chars().take(50).collect::<String>() + "...",
            reason: "pattern exceeds maximum length",
        });
    }

    if count_nesting_depth(pattern) > MAX_NESTING_DEPTH {
        return Err(SecurityError::DangerousPattern {
            pattern: pattern.to_string(),
            reason: "excessive nesting depth",
        });
    }

    if has_dangerous_quantifier_nesting(pattern) {
        return Err(SecurityError::DangerousPattern {
            pattern: pattern.to_string(),
            reason: "nested quantifiers can cause exponential backtracking",
        });
    }

    Ok(())
}

/// Counts the maximum nesting depth of groups in a pattern.
fn count_nesting_depth(pattern: &str) -> usize {
    let mut max_depth: usize = 0;
    let mut current_depth: usize = 0;
    let mut chars = pattern.chars();

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                chars.next();
            }
            '(' => {
                current_depth += 1;
                max_depth = max_depth.max(current_depth);
            }
            ')' => {
                current_depth = current_depth.saturating_sub(1);
            }
            '[' => {
                // Skip character class
                while let Some(c) = chars.next() {
                    if c == '\\' {
                        chars.next();
                    } else if c == ']' {
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    max_depth
}

/// Detects groups that contain a quantifier and are themselves quantified,
/// like `(a+)+`, `(.*)*` or `(\w+)*`.
fn has_dangerous_quantifier_nesting(pattern: &str) -> bool {
    let dangerous_patterns = [
        r"(\w+)+",
        r"(.*)+",
        r"(.+)+",
        r"(\d+)+",
        r"(\s+)+",
        r"(\w*)*",
        r"(.*)*",
        r"(.+)*",
        r"(\d*)*",
        r"(\s*)*",
        r"(a|a)+",
        r"(a|aa)+",
        r"(.*|.*)+",
    ];

    let pattern_lower = pattern.to_lowercase();
    if dangerous_patterns
        .iter()
        .any(|d| pattern_lower.contains(&d.to_lowercase()))
    {
        return true;
    }

    // An unescaped group holding a quantifier, followed by another quantifier
    regex::Regex::new(r"(^|[^\\])\([^)]*[^\\)][+*][^)]*\)[+*]")
        .map(|re| re.is_match(pattern))
        .unwrap_or(false)
}
