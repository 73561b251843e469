//! Ranked-candidate selection.
//!
//! Every artifact heuristic is the same shape: glob the candidate files,
//! then narrow them through regex tiers from most to least specific, keeping
//! the first tier that matches anything. Failing outright when a looser
//! match would do is worse than a best-effort guess, so the unfiltered
//! candidate set is the final tier.

use super::LocateError;
use regex::Regex;
use std::path::{Path, PathBuf};

/// All paths matching `pattern` under `base`, in filesystem order.
pub(crate) fn glob_under(base: &Path, pattern: &str) -> Result<Vec<PathBuf>, LocateError> {
    let full = base.join(pattern);
    let entries = glob::glob(&full.to_string_lossy())?;

    let mut paths = Vec::new();
    for entry in entries {
        paths.push(entry?);
    }
    Ok(paths)
}

/// Narrows `candidates` through `tiers`; the first non-empty filtered set
/// wins, the full set is the fallback. Regexes match against the whole path.
pub(crate) fn narrow(candidates: Vec<PathBuf>, tiers: &[Regex]) -> Vec<PathBuf> {
    for tier in tiers {
        let matched: Vec<PathBuf> = candidates
            .iter()
            .filter(|path| tier.is_match(&path.to_string_lossy()))
            .cloned()
            .collect();
        if !matched.is_empty() {
            return matched;
        }
    }
    candidates
}

/// Compiles one heuristic tier; callers escape any interpolated names.
pub(crate) fn tier(pattern: String) -> Result<Regex, LocateError> {
    Regex::new(&pattern).map_err(LocateError::Pattern)
}
