use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::ExtractArgs;
use crate::commands::tools;
use crate::export;
use crate::model::{DocumentRecord, ExtractRunManifest, FieldKind};
use crate::util::{now_utc_string, sha256_file, write_json_pretty};

use super::{DocumentExtractor, ExtractOptions};

pub fn run(args: ExtractArgs) -> Result<()> {
    let extractor = DocumentExtractor::new(ExtractOptions::from(&args.ocr))?;

    let mut records = Vec::with_capacity(args.inputs.len());
    let mut warnings = Vec::new();

    for path in &args.inputs {
        let record = match extractor.extract(path) {
            Ok(record) => record,
            Err(error) => {
                warn!(path = %path.display(), error = %error, "extraction failed");
                warnings.push(format!("extraction failed for {}: {error:#}", path.display()));
                let filename = path
                    .file_name()
                    .and_then(|name| name.to_str())
                    .unwrap_or("(unnamed)")
                    .to_string();
                DocumentRecord::failed(
                    filename,
                    sha256_file(path).unwrap_or_default(),
                    format!("{error:#}"),
                )
            }
        };

        info!(
            file = %record.filename,
            kind = record.kind.as_str(),
            pages = record.page_count,
            ocr_pages = record.ocr_page_count,
            matched_fields = record.fields.matched_count(),
            "processed document"
        );
        for kind in FieldKind::ALL {
            if let Some(value) = record.fields.get(kind) {
                info!(field = kind.column_name(), value = %value, "field extracted");
            }
        }

        records.push(record);
    }

    export::write_csv_file(&args.out, &records)?;
    info!(path = %args.out.display(), rows = records.len(), "wrote csv export");

    if args.json {
        let rendered =
            serde_json::to_string_pretty(&records).context("failed to serialize records")?;
        println!("{rendered}");
    }

    if let Some(report_path) = &args.report_path {
        let manifest = ExtractRunManifest {
            manifest_version: 1,
            generated_at: now_utc_string(),
            command: render_extract_command(&args),
            tool_versions: tools::collect_tool_versions(),
            document_count: records.len(),
            ocr_page_count: records.iter().map(|record| record.ocr_page_count).sum(),
            documents: records,
            warnings,
        };
        write_json_pretty(report_path, &manifest)?;
        info!(path = %report_path.display(), "wrote extraction run manifest");
    }

    Ok(())
}

fn render_extract_command(args: &ExtractArgs) -> String {
    let mut command = vec![
        "guiamed".to_string(),
        "extract".to_string(),
        "--out".to_string(),
        args.out.display().to_string(),
        "--ocr-mode".to_string(),
        args.ocr.ocr_mode.as_str().to_string(),
        "--ocr-lang".to_string(),
        args.ocr.ocr_lang.clone(),
        "--ocr-min-text-chars".to_string(),
        args.ocr.ocr_min_text_chars.to_string(),
        "--ocr-dpi".to_string(),
        args.ocr.ocr_dpi.to_string(),
    ];

    if let Some(max_pages) = args.ocr.max_pages_per_doc {
        command.push("--max-pages-per-doc".to_string());
        command.push(max_pages.to_string());
    }
    for input in &args.inputs {
        command.push(input.display().to_string());
    }

    command.join(" ")
}
