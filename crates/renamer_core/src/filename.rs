use std::collections::HashSet;

/// Split `name` at its last `.` into `(base, extension)`.
///
/// Names without a `.` have an empty extension. The separator itself belongs
/// to neither part, so `"archive.tar.gz"` yields `("archive.tar", "gz")`.
pub fn split_name(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) => (&name[..idx], &name[idx + 1..]),
        None => (name, ""),
    }
}

/// Inverse of [`split_name`]: `base.extension`, or just `base` when the
/// extension is empty.
pub fn join_name(base: &str, extension: &str) -> String {
    if extension.is_empty() {
        base.to_string()
    } else {
        format!("{base}.{extension}")
    }
}

/// Normalize raw namer output: trim surrounding whitespace, then drop every
/// carriage return and line feed.
pub fn clean_candidate(raw: &str) -> String {
    raw.trim().chars().filter(|c| !matches!(c, '\n' | '\r')).collect()
}

/// Return `name` unchanged when it is not in `existing`, otherwise the first
/// free `stem_N.ext` for N = 1, 2, ...
///
/// Terminates after at most `existing.len() + 1` probes.
pub fn resolve_duplicate(name: &str, existing: &HashSet<String>) -> String {
    if !existing.contains(name) {
        return name.to_string();
    }
    let (stem, extension) = split_name(name);
    let mut counter: usize = 1;
    loop {
        let probe = join_name(&format!("{stem}_{counter}"), extension);
        if !existing.contains(&probe) {
            return probe;
        }
        counter += 1;
    }
}
