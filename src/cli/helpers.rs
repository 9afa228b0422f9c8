//! Shared helper functions for CLI commands.

/// Truncate a string to `max` characters, appending an ellipsis when cut.
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let cut: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{}…", cut)
}

/// Parse a `--pick` argument of the form `PAGE=BACKEND`.
///
/// Pages are 1-based on the command line (matching what the user sees in
/// the progress output); the returned page index is 0-based. The backend
/// half is returned as-is for resolution against the backend set.
pub fn parse_pick(arg: &str) -> Result<(usize, String), String> {
    let Some((page, backend)) = arg.split_once('=') else {
        return Err(format!("invalid --pick '{}': expected PAGE=BACKEND", arg));
    };
    let page: usize = page
        .trim()
        .parse()
        .map_err(|_| format!("invalid --pick '{}': page must be a number", arg))?;
    if page == 0 {
        return Err(format!("invalid --pick '{}': pages start at 1", arg));
    }
    let backend = backend.trim();
    if backend.is_empty() {
        return Err(format!("invalid --pick '{}': backend is empty", arg));
    }
    Ok((page - 1, backend.to_string()))
}
