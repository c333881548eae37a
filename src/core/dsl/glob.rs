//! Glob matching for the restriction DSL's `matches` operator (spec §4.2).
//!
//! Two distinct glob dialects are needed: path globs (`*`, `**`, `?`,
//! segment-aware) for `capability.params.path`-shaped fields, and host globs
//! (`*.example.com`) for net allowlist entries. Both are pure string
//! operations — path comparison never touches the filesystem.

/// Lexically normalize a path string: collapse `./` segments and resolve
/// `..` against the preceding segment, without touching the filesystem.
/// Absolute paths (leading `/`) cannot be resolved above the root; leading
/// `..` segments in a relative path are preserved (there is nothing to pop).
pub fn normalize_path(path: &str) -> String {
    let is_absolute = path.starts_with('/');
    let mut stack: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                let can_pop = matches!(stack.last(), Some(top) if *top != "..");
                if can_pop {
                    stack.pop();
                } else if !is_absolute {
                    stack.push("..");
                }
                // Absolute path: ".." beyond the root is simply dropped.
            }
            seg => stack.push(seg),
        }
    }

    let joined = stack.join("/");
    if is_absolute {
        format!("/{joined}")
    } else if joined.is_empty() {
        ".".to_string()
    } else {
        joined
    }
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

/// Match a single path segment against a `*`/`?` glob pattern (no `/` is
/// meaningful inside a segment — callers split on `/` first).
fn match_segment(pattern: &[u8], text: &[u8]) -> bool {
    match (pattern.first(), text.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            match_segment(&pattern[1..], text)
                || (!text.is_empty() && match_segment(pattern, &text[1..]))
        }
        (Some(b'?'), Some(_)) => match_segment(&pattern[1..], &text[1..]),
        (Some(&p), Some(&t)) if p == t => match_segment(&pattern[1..], &text[1..]),
        _ => false,
    }
}

fn match_path_segments(pattern: &[&str], text: &[&str]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some(&"**") => {
            match_path_segments(&pattern[1..], text)
                || (!text.is_empty() && match_path_segments(pattern, &text[1..]))
        }
        Some(seg) => {
            !text.is_empty()
                && match_segment(seg.as_bytes(), text[0].as_bytes())
                && match_path_segments(&pattern[1..], &text[1..])
        }
    }
}

/// Match a normalized candidate path against a path glob. `*` matches a
/// single segment component, `**` matches zero or more segments, `?`
/// matches a single non-`/` character. Both sides are normalized first so
/// `./docs/**` matches `./docs/a/b.md`.
pub fn path_glob_match(pattern: &str, candidate: &str) -> bool {
    let pattern_norm = normalize_path(pattern);
    let candidate_norm = normalize_path(candidate);
    match_path_segments(&segments(&pattern_norm), &segments(&candidate_norm))
}

/// Match a host against a host glob. Plain patterns are an exact match;
/// `*.example.com` matches any strict subdomain (one or more labels to the
/// left) but never the apex `example.com` itself.
pub fn host_glob_match(pattern: &str, host: &str) -> bool {
    let pattern = pattern.to_ascii_lowercase();
    let host = host.to_ascii_lowercase();

    match pattern.strip_prefix("*.") {
        Some(suffix) => host != suffix && host.ends_with(&format!(".{suffix}")),
        None => host == pattern,
    }
}

/// Boundary-match a normalized path against a root path: true if `path` is
/// the root itself or lexically nested under it.
pub fn path_within_root(path: &str, root: &str) -> bool {
    let path = normalize_path(path);
    let root = normalize_path(root);
    path == root || path.starts_with(&format!("{root}/"))
}
