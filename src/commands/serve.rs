use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Json, Redirect, Response};
use axum::routing::{get, post};
use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::cli::ServeArgs;
use crate::commands::extract::{DocumentExtractor, ExtractOptions};
use crate::export;
use crate::model::{DocumentRecord, FieldKind};
use crate::util::{now_utc_string, sha256_bytes};

pub fn run(args: ServeArgs) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start tokio runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: ServeArgs) -> Result<()> {
    let extractor = DocumentExtractor::new(ExtractOptions::from(&args.ocr))?;
    let state = AppState {
        extractor: Arc::new(extractor),
        batch: Arc::new(Mutex::new(None)),
        start_time: Instant::now(),
    };

    let app = Router::new()
        .route("/", get(index_handler))
        .route("/upload", post(upload_handler))
        .route("/export.csv", get(export_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(args.max_upload_bytes))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind to {}", args.bind))?;
    info!(bind = %args.bind, "listening");

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    extractor: Arc<DocumentExtractor>,
    batch: Arc<Mutex<Option<SessionBatch>>>,
    start_time: Instant,
}

struct SessionBatch {
    generated_at: String,
    records: Vec<DocumentRecord>,
}

struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into())
}

fn internal(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::INTERNAL_SERVER_ERROR, msg.into())
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    documents: usize,
    uptime_secs: u64,
}

async fn index_handler(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    let batch = state
        .batch
        .lock()
        .map_err(|_| internal("session state lock poisoned"))?;
    Ok(Html(render_index(batch.as_ref())))
}

async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Redirect, AppError> {
    let mut uploads: Vec<(String, Vec<u8>)> = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|error| bad_request(format!("invalid multipart payload: {error}")))?
    {
        if field.name() != Some("files") {
            continue;
        }
        let Some(file_name) = field.file_name().map(ToOwned::to_owned) else {
            continue;
        };
        if file_name.is_empty() {
            continue;
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|error| bad_request(format!("failed to read upload {file_name}: {error}")))?;
        if bytes.is_empty() {
            continue;
        }
        uploads.push((file_name, bytes.to_vec()));
    }

    if uploads.is_empty() {
        return Err(bad_request("no files uploaded"));
    }

    let extractor = state.extractor.clone();
    let records = tokio::task::spawn_blocking(move || process_uploads(&extractor, uploads))
        .await
        .map_err(|error| internal(format!("extraction task failed: {error}")))?;

    info!(documents = records.len(), "processed upload batch");

    // a new upload replaces the previous session results
    let mut batch = state
        .batch
        .lock()
        .map_err(|_| internal("session state lock poisoned"))?;
    *batch = Some(SessionBatch {
        generated_at: now_utc_string(),
        records,
    });

    Ok(Redirect::to("/"))
}

async fn export_handler(State(state): State<AppState>) -> Result<Response, AppError> {
    let batch = state
        .batch
        .lock()
        .map_err(|_| internal("session state lock poisoned"))?;
    let Some(batch) = batch.as_ref() else {
        return Err(AppError(
            StatusCode::NOT_FOUND,
            "no extraction results to export".to_string(),
        ));
    };

    let bytes = export::csv_bytes(&batch.records)
        .map_err(|error| internal(format!("csv rendering failed: {error:#}")))?;

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"extracted_fields.csv\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn health_handler(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let batch = state
        .batch
        .lock()
        .map_err(|_| internal("session state lock poisoned"))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        documents: batch.as_ref().map(|batch| batch.records.len()).unwrap_or(0),
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

fn process_uploads(
    extractor: &DocumentExtractor,
    uploads: Vec<(String, Vec<u8>)>,
) -> Vec<DocumentRecord> {
    uploads
        .into_iter()
        .map(|(file_name, bytes)| match stage_and_extract(extractor, &file_name, &bytes) {
            Ok(record) => record,
            Err(error) => {
                warn!(file = %file_name, error = %error, "extraction failed");
                DocumentRecord::failed(file_name, sha256_bytes(&bytes), format!("{error:#}"))
            }
        })
        .collect()
}

fn stage_and_extract(
    extractor: &DocumentExtractor,
    file_name: &str,
    bytes: &[u8],
) -> Result<DocumentRecord> {
    let staged = stage_upload(file_name, bytes)?;
    let result = extractor.extract(&staged);
    let _ = fs::remove_file(&staged);

    let mut record = result?;
    // keep the name the user uploaded, not the staging name
    record.filename = file_name.to_string();
    Ok(record)
}

fn stage_upload(file_name: &str, bytes: &[u8]) -> Result<PathBuf> {
    let source = Path::new(file_name);
    let extension = source
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.to_ascii_lowercase())
        .unwrap_or_default();
    let stem = source
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let safe_stem = stem
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
    let mut staged = std::env::temp_dir().join(format!(
        "guiamed_upload_{}_{}_{}",
        std::process::id(),
        stamp,
        safe_stem
    ));
    if !extension.is_empty() {
        staged.set_extension(&extension);
    }

    fs::write(&staged, bytes)
        .with_context(|| format!("failed to stage upload {}", staged.display()))?;
    Ok(staged)
}

fn render_index(batch: Option<&SessionBatch>) -> String {
    let mut page = String::new();
    page.push_str("<!doctype html><html lang=\"pt-BR\"><head><meta charset=\"utf-8\">");
    page.push_str("<title>Extração de Guias Médicas</title>");
    page.push_str(
        "<style>body{font-family:sans-serif;margin:2rem;max-width:70rem}\
         table{border-collapse:collapse;margin:1rem 0;width:100%}\
         th,td{border:1px solid #999;padding:0.35rem 0.6rem;text-align:left}\
         th{background:#eee}pre{background:#f6f6f6;padding:0.75rem;overflow-x:auto}\
         .warn{color:#a33}</style></head><body>",
    );
    page.push_str("<h1>Extração de Guias Médicas</h1>");
    page.push_str(
        "<p>Envie guias em PDF (digitais ou escaneadas) ou imagens (PNG, JPEG). \
         Os campos reconhecidos aparecem na tabela abaixo e podem ser baixados em CSV.</p>",
    );
    page.push_str(
        "<form action=\"/upload\" method=\"post\" enctype=\"multipart/form-data\">\
         <input type=\"file\" name=\"files\" accept=\".pdf,.png,.jpg,.jpeg\" multiple required> \
         <button type=\"submit\">Extrair</button></form>",
    );

    if let Some(batch) = batch {
        page.push_str(&format!(
            "<p>Processado em {} — {} documento(s). <a href=\"/export.csv\">Baixar CSV</a></p>",
            html_escape::encode_text(&batch.generated_at),
            batch.records.len()
        ));

        page.push_str("<table><thead><tr><th>File</th>");
        for kind in FieldKind::ALL {
            page.push_str(&format!("<th>{}</th>", kind.column_name()));
        }
        page.push_str("</tr></thead><tbody>");
        for record in &batch.records {
            page.push_str("<tr>");
            page.push_str(&format!(
                "<td>{}</td>",
                html_escape::encode_text(&record.filename)
            ));
            for kind in FieldKind::ALL {
                page.push_str(&format!(
                    "<td>{}</td>",
                    html_escape::encode_text(record.fields.get(kind).unwrap_or(""))
                ));
            }
            page.push_str("</tr>");
        }
        page.push_str("</tbody></table>");

        page.push_str("<h2>Conteúdo extraído por arquivo</h2>");
        for record in &batch.records {
            let summary = format!(
                "{} — {} ({} página(s), {} por OCR)",
                record.filename,
                record.kind.as_str(),
                record.page_count,
                record.ocr_page_count
            );
            page.push_str(&format!(
                "<details><summary>{}</summary>",
                html_escape::encode_text(&summary)
            ));
            for warning in &record.warnings {
                page.push_str(&format!(
                    "<p class=\"warn\">{}</p>",
                    html_escape::encode_text(warning)
                ));
            }
            let preview = record.text.chars().take(5000).collect::<String>();
            page.push_str(&format!(
                "<pre>{}</pre></details>",
                html_escape::encode_text(&preview)
            ));
        }
    }

    page.push_str("</body></html>");
    page
}
