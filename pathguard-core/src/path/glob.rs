//! Shell-style wildcard matching for basenames.
//!
//! `*` matches any run of units, `?` matches exactly one. Text patterns are
//! matched per character, byte patterns per byte.

use crate::types::PathString;

/// Returns true if `name` matches `pattern`.
///
/// Names starting with `.` only match patterns that also start with `.`.
pub fn matches(pattern: &PathString, name: &PathString) -> bool {
    match (pattern, name) {
        (PathString::Text(p), PathString::Text(n)) => {
            let p: Vec<char> = p.chars().collect();
            let n: Vec<char> = n.chars().collect();
            hidden_ok(p.first() == Some(&'.'), n.first() == Some(&'.'))
                && glob_match(&p, &n, '*', '?')
        }
        _ => {
            let (p, n) = (pattern.as_bytes(), name.as_bytes());
            hidden_ok(p.first() == Some(&b'.'), n.first() == Some(&b'.'))
                && glob_match(p, n, b'*', b'?')
        }
    }
}

fn hidden_ok(pattern_dot: bool, name_dot: bool) -> bool {
    pattern_dot || !name_dot
}

fn glob_match<T: PartialEq + Copy>(pattern: &[T], text: &[T], star: T, any: T) -> bool {
    glob_match_recursive(pattern, text, 0, 0, star, any)
}

fn glob_match_recursive<T: PartialEq + Copy>(
    pattern: &[T],
    text: &[T],
    p_idx: usize,
    t_idx: usize,
    star: T,
    any: T,
) -> bool {
    if p_idx == pattern.len() {
        return t_idx == text.len();
    }

    if t_idx == text.len() {
        return pattern[p_idx..].iter().all(|&c| c == star);
    }

    let c = pattern[p_idx];
    if c == star {
        // Try matching zero or more units
        glob_match_recursive(pattern, text, p_idx + 1, t_idx, star, any)
            || glob_match_recursive(pattern, text, p_idx, t_idx + 1, star, any)
    } else if c == any || text[t_idx] == c {
        glob_match_recursive(pattern, text, p_idx + 1, t_idx + 1, star, any)
    } else {
        false
    }
}
