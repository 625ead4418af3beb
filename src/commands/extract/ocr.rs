use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result, bail};
use chrono::Utc;
use image::imageops;

pub(crate) fn command_available(program: &str) -> bool {
    Command::new(program).arg("--version").output().is_ok()
}

pub(crate) fn ocr_pdf_page(
    pdf_path: &Path,
    page_number: usize,
    ocr_lang: &str,
    ocr_dpi: u32,
) -> Result<String> {
    let output_root = scratch_path(pdf_path, &format!("page{page_number}"));
    let png_path = PathBuf::from(format!("{}.png", output_root.display()));

    let pdftoppm_output = Command::new("pdftoppm")
        .arg("-f")
        .arg(page_number.to_string())
        .arg("-l")
        .arg(page_number.to_string())
        .arg("-r")
        .arg(ocr_dpi.to_string())
        .arg("-singlefile")
        .arg("-png")
        .arg(pdf_path)
        .arg(&output_root)
        .output()
        .with_context(|| format!("failed to execute pdftoppm for {}", pdf_path.display()))?;

    if !pdftoppm_output.status.success() {
        let stderr = String::from_utf8_lossy(&pdftoppm_output.stderr);
        bail!(
            "pdftoppm returned non-zero exit status for {} page {}: {}",
            pdf_path.display(),
            page_number,
            stderr.trim()
        );
    }

    if !png_path.exists() {
        bail!(
            "pdftoppm did not produce expected image for {} page {}",
            pdf_path.display(),
            page_number
        );
    }

    let prepared = preprocess_for_ocr(&png_path);
    let _ = fs::remove_file(&png_path);
    let prepared = prepared?;

    let text = run_tesseract(&prepared, ocr_lang);
    let _ = fs::remove_file(&prepared);
    text.with_context(|| {
        format!(
            "failed OCR recognition for {} page {}",
            pdf_path.display(),
            page_number
        )
    })
}

pub(crate) fn ocr_image_file(image_path: &Path, ocr_lang: &str) -> Result<String> {
    let prepared = preprocess_for_ocr(image_path)?;
    let text = run_tesseract(&prepared, ocr_lang);
    let _ = fs::remove_file(&prepared);
    text.with_context(|| format!("failed OCR recognition for {}", image_path.display()))
}

fn run_tesseract(image_path: &Path, ocr_lang: &str) -> Result<String> {
    let tesseract_output = Command::new("tesseract")
        .arg(image_path)
        .arg("stdout")
        .arg("-l")
        .arg(ocr_lang)
        .output()
        .with_context(|| format!("failed to execute tesseract for {}", image_path.display()))?;

    if !tesseract_output.status.success() {
        let stderr = String::from_utf8_lossy(&tesseract_output.stderr);
        bail!(
            "tesseract returned non-zero exit status for {}: {}",
            image_path.display(),
            stderr.trim()
        );
    }

    Ok(String::from_utf8_lossy(&tesseract_output.stdout)
        .replace('\u{0000}', "")
        .trim()
        .to_string())
}

// grayscale + contrast + sharpen before recognition; low-resolution scans
// lose too many glyph edges otherwise
fn preprocess_for_ocr(image_path: &Path) -> Result<PathBuf> {
    let decoded = image::open(image_path)
        .with_context(|| format!("failed to decode image {}", image_path.display()))?;

    let grayscale = decoded.into_luma8();
    let contrasted = imageops::contrast(&grayscale, 30.0);
    let sharpened = imageops::filter3x3(
        &contrasted,
        &[0.0, -1.0, 0.0, -1.0, 5.0, -1.0, 0.0, -1.0, 0.0],
    );

    let prepared_path = PathBuf::from(format!("{}.png", scratch_path(image_path, "prep").display()));
    sharpened
        .save_with_format(&prepared_path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write prepared image {}", prepared_path.display()))?;

    Ok(prepared_path)
}

fn scratch_path(source_path: &Path, suffix: &str) -> PathBuf {
    let source_stem = source_path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("doc");
    let safe_stem = source_stem
        .chars()
        .map(|character| {
            if character.is_ascii_alphanumeric() {
                character
            } else {
                '_'
            }
        })
        .collect::<String>();

    let stamp = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    std::env::temp_dir().join(format!(
        "guiamed_{}_{}_{}_{}",
        safe_stem,
        std::process::id(),
        suffix,
        stamp
    ))
}
