//! Chapter numbering from artifact filenames.

use std::sync::LazyLock;

use anyhow::{Result, anyhow};
use regex::Regex;

static CHAPTER_FILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^chapter_(\d+)\.([A-Za-z0-9]+)$").expect("chapter file regex"));

/// Canonical artifact filename, e.g. `chapter_3.txt`.
pub fn chapter_file_name(number: u32, extension: &str) -> String {
    format!("chapter_{number}.{extension}")
}

/// Parse `chapter_<N>.<extension>` into `N`. Zero is not a chapter.
///
/// Names that do not follow the pattern are `Ok(None)`. A chapter file whose
/// number does not fit in `u32` is an error, since skipping it would let the
/// next number fall below the real maximum.
pub fn parse_chapter_number(file_name: &str, extension: &str) -> Result<Option<u32>> {
    let Some(caps) = CHAPTER_FILE_RE.captures(file_name) else {
        return Ok(None);
    };
    if &caps[2] != extension {
        return Ok(None);
    }
    let number: u32 = caps[1]
        .parse()
        .map_err(|_| anyhow!("chapter number out of range in {file_name}"))?;
    Ok(Some(number).filter(|n| *n > 0))
}

/// `max(existing) + 1`, or 1 when nothing exists. Gaps are never filled.
pub fn next_number<I>(existing: I) -> Result<u32>
where
    I: IntoIterator<Item = u32>,
{
    match existing.into_iter().max() {
        None => Ok(1),
        Some(max) => max
            .checked_add(1)
            .ok_or_else(|| anyhow!("chapter numbers exhausted after {max}")),
    }
}
