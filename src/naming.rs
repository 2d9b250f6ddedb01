//! SQL identifier cleaning for CSV headers and file names.

use std::{collections::HashSet, path::Path, sync::OnceLock};

use regex::Regex;

/// Identifier used when a name has no legal characters left after cleaning.
pub const PLACEHOLDER_NAME: &str = "column";

fn illegal_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("valid identifier regex"))
}

fn underscore_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_+").expect("valid underscore regex"))
}

fn date_suffix() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"_\d{8}$").expect("valid date suffix regex"))
}

/// Converts a CSV column or file name into a lowercase SQL identifier.
///
/// Runs of characters outside `[a-z0-9_]` become a single underscore, repeated
/// underscores collapse and leading/trailing underscores are dropped. Applying
/// the function to its own output returns the same string.
pub fn clean_for_sql_name(raw: &str) -> String {
    let lowered = raw.to_lowercase();
    let replaced = illegal_run().replace_all(&lowered, "_");
    let collapsed = underscore_run().replace_all(&replaced, "_");
    let trimmed = collapsed.trim_matches('_');
    if trimmed.is_empty() {
        PLACEHOLDER_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Derives the table name for a source from its file stem.
///
/// Extract files carry a `_YYYYMMDD` release date which is dropped when
/// `strip_date_suffix` is set so successive releases land in the same table.
pub fn table_name_for(source_name: &str, strip_date_suffix: bool) -> String {
    let member = source_name.rsplit('!').next().unwrap_or(source_name);
    let stem = Path::new(member)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(member);
    let cleaned = clean_for_sql_name(stem);
    if !strip_date_suffix {
        return cleaned;
    }
    let stripped = date_suffix().replace(&cleaned, "");
    if stripped.is_empty() {
        cleaned
    } else {
        stripped.into_owned()
    }
}

/// Cleans every header and suffixes duplicates (`_2`, `_3`, ...) so each
/// identifier in the returned list is unique.
pub fn unique_sql_names<I, S>(headers: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let cleaned = headers
        .into_iter()
        .map(|h| clean_for_sql_name(h.as_ref()))
        .collect::<Vec<_>>();
    let mut taken: HashSet<String> = HashSet::with_capacity(cleaned.len());
    let mut names = Vec::with_capacity(cleaned.len());
    for base in &cleaned {
        let mut candidate = base.clone();
        let mut counter = 2usize;
        while taken.contains(&candidate) {
            candidate = format!("{base}_{counter}");
            counter += 1;
        }
        taken.insert(candidate.clone());
        names.push(candidate);
    }
    names
}
