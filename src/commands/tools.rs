use std::process::Command;

use anyhow::Result;
use tracing::{info, warn};

use crate::model::ToolVersions;

pub fn run() -> Result<()> {
    let versions = collect_tool_versions();

    report(
        "pdftotext",
        versions.pdftotext.as_deref(),
        "text layer extraction unavailable, every PDF will be treated as scanned",
    );
    report(
        "pdfinfo",
        versions.pdfinfo.as_deref(),
        "page counts unavailable for PDFs without a text layer",
    );
    report(
        "pdftoppm",
        versions.pdftoppm.as_deref(),
        "scanned PDFs cannot be rasterized for OCR",
    );
    report(
        "tesseract",
        versions.tesseract.as_deref(),
        "OCR unavailable for scanned PDFs and images",
    );

    Ok(())
}

fn report(program: &str, version: Option<&str>, consequence: &str) {
    match version {
        Some(version) => info!(tool = program, version = %version, "tool available"),
        None => warn!(tool = program, consequence = consequence, "tool missing"),
    }
}

pub fn collect_tool_versions() -> ToolVersions {
    ToolVersions {
        pdftotext: command_version_optional("pdftotext", &["-v"]),
        pdfinfo: command_version_optional("pdfinfo", &["-v"]),
        pdftoppm: command_version_optional("pdftoppm", &["-v"]),
        tesseract: command_version_optional("tesseract", &["--version"]),
    }
}

fn command_version_optional(program: &str, args: &[&str]) -> Option<String> {
    let output = Command::new(program).args(args).output().ok()?;

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let source = if stdout.trim().is_empty() {
        stderr.trim()
    } else {
        stdout.trim()
    };

    source
        .lines()
        .next()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| line.to_string())
}
