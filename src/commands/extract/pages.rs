use std::path::Path;
use std::process::Command;

use anyhow::{Context, Result, bail};

use crate::cli::OcrMode;
use crate::model::DocumentKind;

pub(crate) fn non_whitespace_char_count(text: &str) -> usize {
    text.chars()
        .filter(|character| !character.is_whitespace())
        .count()
}

pub(crate) fn extract_pages_with_pdftotext(
    pdf_path: &Path,
    max_pages_per_doc: Option<usize>,
) -> Result<Vec<String>> {
    let mut command = Command::new("pdftotext");
    command.arg("-enc").arg("UTF-8").arg("-f").arg("1");
    if let Some(max_pages) = max_pages_per_doc {
        command.arg("-l").arg(max_pages.to_string());
    }
    command.arg(pdf_path).arg("-");

    let output = command
        .output()
        .with_context(|| format!("failed to execute pdftotext for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdftotext returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let raw = String::from_utf8_lossy(&output.stdout);
    let mut pages: Vec<String> = raw
        .split('\u{000C}')
        .map(|chunk| chunk.replace('\u{0000}', ""))
        .collect();

    while let Some(last_page) = pages.last() {
        if last_page.trim().is_empty() {
            pages.pop();
            continue;
        }
        break;
    }

    Ok(pages)
}

pub(crate) fn page_count_with_pdfinfo(pdf_path: &Path) -> Result<usize> {
    let output = Command::new("pdfinfo")
        .arg(pdf_path)
        .output()
        .with_context(|| format!("failed to execute pdfinfo for {}", pdf_path.display()))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "pdfinfo returned non-zero exit status for {}: {}",
            pdf_path.display(),
            stderr.trim()
        );
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    for line in stdout.lines() {
        if let Some(rest) = line.strip_prefix("Pages:") {
            return rest
                .trim()
                .parse::<usize>()
                .with_context(|| format!("unexpected pdfinfo page count for {}", pdf_path.display()));
        }
    }

    bail!(
        "pdfinfo output for {} did not include a page count",
        pdf_path.display()
    );
}

pub(crate) fn classify_pages(pages: &[String], min_text_chars: usize) -> DocumentKind {
    match pages.first() {
        Some(first) if non_whitespace_char_count(first) >= min_text_chars => DocumentKind::Digital,
        _ => DocumentKind::Scanned,
    }
}

pub(crate) fn ocr_candidate_pages(
    kind: DocumentKind,
    ocr_mode: OcrMode,
    page_count: usize,
) -> Vec<usize> {
    match ocr_mode {
        OcrMode::Off => Vec::new(),
        OcrMode::Force => (1..=page_count).collect(),
        OcrMode::Auto => match kind {
            DocumentKind::Scanned => (1..=page_count).collect(),
            _ => Vec::new(),
        },
    }
}

pub(crate) fn normalize_pages(pages: &mut [String]) -> usize {
    let mut dehyphen_merges = 0usize;

    for page in pages.iter_mut() {
        let mut lines = page
            .lines()
            .map(|line| line.to_string())
            .collect::<Vec<String>>();

        lines.retain(|line| !line_is_noise(line));

        let (merged, merges) = merge_hyphenated_lines(lines);
        dehyphen_merges += merges;
        *page = merged.join("\n");
    }

    dehyphen_merges
}

pub(crate) fn line_is_noise(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    if lower.is_empty() {
        return false;
    }

    lower.starts_with("impresso em ")
        || lower.starts_with("gerado eletronicamente")
        || lower.starts_with("emitido via ")
        || is_page_footer(&lower)
}

fn is_page_footer(lower: &str) -> bool {
    let Some(rest) = lower
        .strip_prefix("página ")
        .or_else(|| lower.strip_prefix("pagina "))
    else {
        return false;
    };

    let mut parts = rest.split(' ');
    matches!(
        (parts.next(), parts.next(), parts.next(), parts.next()),
        (Some(current), Some("de"), Some(total), None)
            if !current.is_empty()
                && current.chars().all(|character| character.is_ascii_digit())
                && !total.is_empty()
                && total.chars().all(|character| character.is_ascii_digit())
    )
}

pub(crate) fn merge_hyphenated_lines(lines: Vec<String>) -> (Vec<String>, usize) {
    let mut merged = Vec::<String>::new();
    let mut merges = 0usize;
    let mut index = 0usize;

    while index < lines.len() {
        let current = lines[index].clone();
        if index + 1 < lines.len() && should_merge_hyphenated_pair(&current, &lines[index + 1]) {
            let joined = format!(
                "{}{}",
                current.trim_end().trim_end_matches('-'),
                lines[index + 1].trim_start()
            );
            merged.push(joined);
            merges += 1;
            index += 2;
            continue;
        }

        merged.push(current);
        index += 1;
    }

    (merged, merges)
}

fn should_merge_hyphenated_pair(current: &str, next: &str) -> bool {
    let left = current.trim_end();
    if !left.ends_with('-') {
        return false;
    }

    let starts_with_lowercase = next
        .trim_start()
        .chars()
        .next()
        .map(|character| character.is_lowercase())
        .unwrap_or(false);
    if !starts_with_lowercase {
        return false;
    }

    left.trim_end_matches('-')
        .chars()
        .last()
        .map(|character| character.is_alphabetic())
        .unwrap_or(false)
}
