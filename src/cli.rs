use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(
    name = "guiamed",
    version,
    about = "Local medical guia field extraction and export tooling"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Extract(ExtractArgs),
    Serve(ServeArgs),
    Tools,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    #[arg(required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = "extracted_fields.csv")]
    pub out: PathBuf,

    #[arg(long)]
    pub report_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub ocr: OcrArgs,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    #[arg(long, default_value = "127.0.0.1:3747")]
    pub bind: String,

    #[arg(long, default_value_t = 25 * 1024 * 1024)]
    pub max_upload_bytes: usize,

    #[command(flatten)]
    pub ocr: OcrArgs,
}

#[derive(Args, Debug, Clone)]
pub struct OcrArgs {
    #[arg(long, value_enum, default_value_t = OcrMode::Auto)]
    pub ocr_mode: OcrMode,

    #[arg(long, default_value = "por+eng")]
    pub ocr_lang: String,

    #[arg(long, default_value_t = 32)]
    pub ocr_min_text_chars: usize,

    #[arg(long, default_value_t = 200)]
    pub ocr_dpi: u32,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum OcrMode {
    Off,
    Auto,
    Force,
}

impl OcrMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Auto => "auto",
            Self::Force => "force",
        }
    }
}
