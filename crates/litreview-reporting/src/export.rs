//! CSV export of the result store.
//!
//! Two columns, `reference,summary`, UTF-8 with a BOM so spreadsheet tools
//! detect the encoding. Rows are sorted with CJK-script citations ahead of
//! Latin-script ones: CJK keys are pinyin transliterations when the
//! `pinyin` feature is enabled (lowercased raw text otherwise), Latin keys
//! are alphanumeric-normalized lowercase. Ties break on the normalized text
//! itself, so the order is deterministic for a given input set.

use std::io::Write;
use std::path::Path;

use litreview_core::SummaryOutcome;

const UTF8_BOM: &str = "\u{feff}";

fn contains_cjk(text: &str) -> bool {
    text.chars().any(|c| ('\u{4e00}'..='\u{9fff}').contains(&c))
}

/// Normalize a Latin citation: alphanumeric runs only, single-spaced,
/// lowercase.
fn latin_key(text: &str) -> String {
    let mut key = String::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.trim().chars() {
        if c.is_ascii_alphanumeric() {
            if pending_space && !key.is_empty() {
                key.push(' ');
            }
            pending_space = false;
            key.push(c.to_ascii_lowercase());
        } else {
            pending_space = true;
        }
    }
    key
}

#[cfg(feature = "pinyin")]
fn cjk_key(text: &str) -> String {
    use pinyin::ToPinyin;
    let mut key = String::with_capacity(text.len());
    for c in text.trim().chars() {
        match c.to_pinyin() {
            Some(p) => key.push_str(p.plain()),
            None => key.extend(c.to_lowercase()),
        }
    }
    key
}

#[cfg(not(feature = "pinyin"))]
fn cjk_key(text: &str) -> String {
    text.trim().to_lowercase()
}

/// Sort key: CJK bucket before Latin bucket, then the normalized text.
fn sort_key(reference: &str) -> (u8, String) {
    if contains_cjk(reference) {
        (0, cjk_key(reference))
    } else {
        (1, latin_key(reference))
    }
}

fn csv_escape(s: &str) -> String {
    if s.contains('"') || s.contains(',') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Render the sorted CSV document. Entries carrying an error are excluded;
/// they are legacy/anomalous in a store that only persists successes.
pub fn export_csv(outcomes: &[SummaryOutcome]) -> String {
    let mut rows: Vec<&SummaryOutcome> =
        outcomes.iter().filter(|o| o.error.is_none()).collect();
    rows.sort_by_cached_key(|o| sort_key(&o.reference));

    let mut out = String::from(UTF8_BOM);
    out.push_str("reference,summary\n");
    for outcome in rows {
        out.push_str(&format!(
            "{},{}\n",
            csv_escape(outcome.reference.trim()),
            csv_escape(&outcome.summary),
        ));
    }
    out
}

/// Write the CSV to `path` (creating parent directories), returning the
/// number of exported rows.
pub fn export_csv_file(outcomes: &[SummaryOutcome], path: &Path) -> Result<usize, String> {
    let rows = outcomes.iter().filter(|o| o.error.is_none()).count();
    let content = export_csv(outcomes);

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create directory: {}", e))?;
    }
    let mut file =
        std::fs::File::create(path).map_err(|e| format!("Failed to create file: {}", e))?;
    file.write_all(content.as_bytes())
        .map_err(|e| format!("Failed to write: {}", e))?;

    tracing::info!(path = %path.display(), rows, "exported CSV");
    Ok(rows)
}
