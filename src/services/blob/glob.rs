//! Glob matching for object keys.
//!
//! Blob listing only filters on a literal prefix, so a glob is split in two:
//! [`shared_prefix`] gives the part the service can filter on and
//! [`match_key`] checks every listed key against the full pattern, one `/`
//! separated segment at a time.

// `?` ends the listing prefix too, so `a?b` is listed and matched rather
// than returned as a literal path.
const WILDCARDS: &[char] = &['*', '?', '[', '\\'];

/// Literal part of `pattern` before its first wildcard.
///
/// Returns `None` when the pattern contains no wildcard at all.
pub fn shared_prefix(pattern: &str) -> Option<&str> {
    pattern.find(WILDCARDS).map(|pos| &pattern[..pos])
}

/// Whether `key` matches `pattern`, comparing `/` separated segments.
pub fn match_key(key: &str, pattern: &str) -> bool {
    let key: Vec<&str> = key.split('/').collect();
    let pattern: Vec<&str> = pattern.split('/').collect();
    match_segments(&key, &pattern)
}

/// Segment matcher. `**` consumes zero or more whole segments, any other
/// pattern segment matches exactly one key segment through [`glob_segment`].
pub fn match_segments(key: &[&str], pattern: &[&str]) -> bool {
    let (mut key, mut pattern) = (key, pattern);

    while let (Some(segment), Some(pat)) = (key.first(), pattern.first()) {
        if *pat == "**" {
            if pattern.len() == 1 {
                return true;
            }
            return (0..=key.len()).any(|skip| match_segments(&key[skip..], &pattern[1..]));
        }
        if !glob_segment(segment, pat) {
            return false;
        }
        key = &key[1..];
        pattern = &pattern[1..];
    }

    key.is_empty() && pattern.iter().all(|pat| *pat == "**")
}

/// Match a single segment against a glob supporting `*`, `?`, `[...]`
/// classes (ranges and `!`/`^` negation) and `\` escapes.
pub fn glob_segment(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    let (mut ti, mut pi) = (0, 0);
    // Position after the last `*` and the text index it is currently covering.
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < text.len() {
        if pi < pattern.len() && pattern[pi] == '*' {
            pi += 1;
            backtrack = Some((pi, ti));
            continue;
        }

        if let Some(next) = match_one(&pattern, pi, text[ti]) {
            pi = next;
            ti += 1;
            continue;
        }

        match backtrack {
            Some((star_pi, star_ti)) => {
                pi = star_pi;
                ti = star_ti + 1;
                backtrack = Some((star_pi, star_ti + 1));
            }
            None => return false,
        }
    }

    pattern[pi..].iter().all(|c| *c == '*')
}

/// Match the single-character token at `pattern[pi]` against `c`.
///
/// Returns the index of the next token on success.
fn match_one(pattern: &[char], pi: usize, c: char) -> Option<usize> {
    let token = *pattern.get(pi)?;
    match token {
        '?' => Some(pi + 1),
        '\\' if pi + 1 < pattern.len() => (pattern[pi + 1] == c).then_some(pi + 2),
        '[' => match match_class(pattern, pi, c) {
            Some((matched, next)) => matched.then_some(next),
            // Unterminated class, `[` is a literal.
            None => (c == '[').then_some(pi + 1),
        },
        literal => (literal == c).then_some(pi + 1),
    }
}

/// Evaluate the class starting at `pattern[start] == '['`.
///
/// Returns whether `c` is accepted and the index after the closing `]`, or
/// `None` if the class is never closed.
fn match_class(pattern: &[char], start: usize, c: char) -> Option<(bool, usize)> {
    let mut i = start + 1;
    let negate = matches!(pattern.get(i), Some('!') | Some('^'));
    if negate {
        i += 1;
    }

    let mut matched = false;
    let mut first = true;
    while i < pattern.len() {
        let mut lo = pattern[i];
        if lo == ']' && !first {
            return Some((matched != negate, i + 1));
        }
        first = false;

        if lo == '\\' && i + 1 < pattern.len() {
            i += 1;
            lo = pattern[i];
        }

        if i + 2 < pattern.len() && pattern[i + 1] == '-' && pattern[i + 2] != ']' {
            let hi = pattern[i + 2];
            if lo <= c && c <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if lo == c {
                matched = true;
            }
            i += 1;
        }
    }

    None
}
