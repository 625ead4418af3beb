use std::path::Path;

use anyhow::{Context, Result, bail};
use tracing::warn;

use crate::cli::{OcrArgs, OcrMode};
use crate::model::{DocumentKind, DocumentRecord, PageProvenance};
use crate::util::sha256_file;

mod fields;
mod ocr;
mod pages;
mod run;
#[cfg(test)]
mod tests;

pub use run::run;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub ocr_mode: OcrMode,
    pub ocr_lang: String,
    pub ocr_min_text_chars: usize,
    pub ocr_dpi: u32,
    pub max_pages_per_doc: Option<usize>,
}

impl From<&OcrArgs> for ExtractOptions {
    fn from(args: &OcrArgs) -> Self {
        Self {
            ocr_mode: args.ocr_mode,
            ocr_lang: args.ocr_lang.clone(),
            ocr_min_text_chars: args.ocr_min_text_chars,
            ocr_dpi: args.ocr_dpi,
            max_pages_per_doc: args.max_pages_per_doc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Pdf,
    Image,
}

fn source_kind_for(path: &Path) -> Result<SourceKind> {
    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "pdf" => Ok(SourceKind::Pdf),
        "png" | "jpg" | "jpeg" => Ok(SourceKind::Image),
        _ => bail!("unsupported file type: {}", path.display()),
    }
}

pub struct DocumentExtractor {
    options: ExtractOptions,
    fields: fields::FieldExtractor,
}

impl DocumentExtractor {
    pub fn new(options: ExtractOptions) -> Result<Self> {
        Ok(Self {
            fields: fields::FieldExtractor::new()?,
            options,
        })
    }

    pub fn extract(&self, path: &Path) -> Result<DocumentRecord> {
        let sha256 = sha256_file(path)?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(ToOwned::to_owned)
            .with_context(|| format!("invalid UTF-8 filename: {}", path.display()))?;

        match source_kind_for(path)? {
            SourceKind::Pdf => self.extract_pdf(path, filename, sha256),
            SourceKind::Image => self.extract_image(path, filename, sha256),
        }
    }

    fn extract_image(
        &self,
        path: &Path,
        filename: String,
        sha256: String,
    ) -> Result<DocumentRecord> {
        if !ocr::command_available("tesseract") {
            bail!(
                "tesseract is required to process image file {}",
                path.display()
            );
        }

        let text = ocr::ocr_image_file(path, &self.options.ocr_lang)?;
        let text_char_count = pages::non_whitespace_char_count(&text);
        let fields = self.fields.extract(&text);

        Ok(DocumentRecord {
            filename,
            sha256,
            kind: DocumentKind::Image,
            page_count: 1,
            ocr_page_count: 1,
            text_char_count,
            fields,
            text,
            provenance: vec![PageProvenance {
                page: 1,
                backend: "ocr".to_string(),
                reason: "image_source".to_string(),
                text_char_count,
                ocr_char_count: Some(text_char_count),
            }],
            warnings: Vec::new(),
        })
    }

    fn extract_pdf(&self, path: &Path, filename: String, sha256: String) -> Result<DocumentRecord> {
        let mut warnings = Vec::new();

        let (mut text_pages, kind) =
            match pages::extract_pages_with_pdftotext(path, self.options.max_pages_per_doc) {
                Ok(text_pages) if !text_pages.is_empty() => {
                    let kind =
                        pages::classify_pages(&text_pages, self.options.ocr_min_text_chars);
                    (text_pages, kind)
                }
                Ok(_) => {
                    // no text layer at all: a scanned document
                    let page_count = self.scanned_page_count(path, &mut warnings);
                    (vec![String::new(); page_count], DocumentKind::Scanned)
                }
                Err(error) => {
                    // an unreadable text layer also counts as scanned
                    warn!(path = %path.display(), error = %error, "text layer extraction failed");
                    warnings.push(format!("text layer extraction failed: {error:#}"));
                    let page_count = self.scanned_page_count(path, &mut warnings);
                    (vec![String::new(); page_count], DocumentKind::Scanned)
                }
            };

        let mut provenance = text_pages
            .iter()
            .enumerate()
            .map(|(index, page)| {
                let chars = pages::non_whitespace_char_count(page);
                PageProvenance {
                    page: index + 1,
                    backend: "text_layer".to_string(),
                    reason: if chars == 0 {
                        "text_layer_empty".to_string()
                    } else {
                        "text_layer_default".to_string()
                    },
                    text_char_count: chars,
                    ocr_char_count: None,
                }
            })
            .collect::<Vec<PageProvenance>>();

        let candidates =
            pages::ocr_candidate_pages(kind, self.options.ocr_mode, text_pages.len());
        let mut ocr_page_count = 0usize;

        if !candidates.is_empty() {
            if !ocr::command_available("pdftoppm") || !ocr::command_available("tesseract") {
                let message = format!(
                    "OCR mode '{}' selected for {} pages but pdftoppm/tesseract are unavailable",
                    self.options.ocr_mode.as_str(),
                    candidates.len()
                );
                if matches!(self.options.ocr_mode, OcrMode::Force) {
                    bail!(message);
                }

                warn!(path = %path.display(), "{message}");
                for page_number in &candidates {
                    if let Some(entry) = provenance.get_mut(page_number - 1) {
                        entry.reason = "ocr_unavailable_text_layer_fallback".to_string();
                    }
                }
                warnings.push(message);
            } else {
                for page_number in candidates {
                    let page_index = page_number - 1;
                    match ocr::ocr_pdf_page(
                        path,
                        page_number,
                        &self.options.ocr_lang,
                        self.options.ocr_dpi,
                    ) {
                        Ok(ocr_text) => {
                            let ocr_chars = pages::non_whitespace_char_count(&ocr_text);
                            if ocr_chars == 0 && matches!(self.options.ocr_mode, OcrMode::Auto) {
                                warnings
                                    .push(format!("OCR produced no text for page {page_number}"));
                                if let Some(entry) = provenance.get_mut(page_index) {
                                    entry.reason = "ocr_empty_text_layer_fallback".to_string();
                                    entry.ocr_char_count = Some(0);
                                }
                                continue;
                            }

                            if let Some(page) = text_pages.get_mut(page_index) {
                                *page = ocr_text;
                            }
                            ocr_page_count += 1;
                            if let Some(entry) = provenance.get_mut(page_index) {
                                entry.backend = "ocr".to_string();
                                entry.reason = if matches!(self.options.ocr_mode, OcrMode::Force) {
                                    "ocr_force_mode".to_string()
                                } else {
                                    "ocr_scanned_document".to_string()
                                };
                                entry.text_char_count = ocr_chars;
                                entry.ocr_char_count = Some(ocr_chars);
                            }
                        }
                        Err(error) => {
                            if matches!(self.options.ocr_mode, OcrMode::Force) {
                                return Err(error).with_context(|| {
                                    format!(
                                        "failed OCR extraction for {} page {}",
                                        path.display(),
                                        page_number
                                    )
                                });
                            }

                            warn!(
                                path = %path.display(),
                                page = page_number,
                                error = %error,
                                "OCR fallback failed"
                            );
                            warnings.push(format!("OCR failed for page {page_number}: {error:#}"));
                            if let Some(entry) = provenance.get_mut(page_index) {
                                entry.reason = "ocr_failed_text_layer_fallback".to_string();
                            }
                        }
                    }
                }
            }
        }

        let page_count = text_pages.len();
        pages::normalize_pages(&mut text_pages);
        let text = text_pages.join("\n").trim().to_string();
        let text_char_count = pages::non_whitespace_char_count(&text);
        let fields = self.fields.extract(&text);

        Ok(DocumentRecord {
            filename,
            sha256,
            kind,
            page_count,
            ocr_page_count,
            text_char_count,
            fields,
            text,
            provenance,
            warnings,
        })
    }

    fn scanned_page_count(&self, path: &Path, warnings: &mut Vec<String>) -> usize {
        let page_count = match pages::page_count_with_pdfinfo(path) {
            Ok(page_count) => page_count.max(1),
            Err(error) => {
                warn!(path = %path.display(), error = %error, "page count probe failed");
                warnings.push(format!(
                    "page count unavailable, processing first page only: {error:#}"
                ));
                1
            }
        };

        match self.options.max_pages_per_doc {
            Some(max_pages) => page_count.min(max_pages.max(1)),
            None => page_count,
        }
    }
}
