use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    PatientName,
    Date,
    Procedure,
    Physician,
    LicenseNumber,
}

impl FieldKind {
    pub const ALL: [FieldKind; 5] = [
        FieldKind::PatientName,
        FieldKind::Date,
        FieldKind::Procedure,
        FieldKind::Physician,
        FieldKind::LicenseNumber,
    ];

    pub fn column_name(self) -> &'static str {
        match self {
            Self::PatientName => "Name",
            Self::Date => "Date",
            Self::Procedure => "Procedure",
            Self::Physician => "Physician",
            Self::LicenseNumber => "License-Number",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ExtractionResult {
    pub patient_name: Option<String>,
    pub date: Option<String>,
    pub procedure: Option<String>,
    pub physician: Option<String>,
    pub license_number: Option<String>,
}

impl ExtractionResult {
    pub fn get(&self, kind: FieldKind) -> Option<&str> {
        match kind {
            FieldKind::PatientName => self.patient_name.as_deref(),
            FieldKind::Date => self.date.as_deref(),
            FieldKind::Procedure => self.procedure.as_deref(),
            FieldKind::Physician => self.physician.as_deref(),
            FieldKind::LicenseNumber => self.license_number.as_deref(),
        }
    }

    pub fn set(&mut self, kind: FieldKind, value: String) {
        match kind {
            FieldKind::PatientName => self.patient_name = Some(value),
            FieldKind::Date => self.date = Some(value),
            FieldKind::Procedure => self.procedure = Some(value),
            FieldKind::Physician => self.physician = Some(value),
            FieldKind::LicenseNumber => self.license_number = Some(value),
        }
    }

    pub fn matched_count(&self) -> usize {
        FieldKind::ALL
            .iter()
            .filter(|kind| self.get(**kind).is_some())
            .count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Digital,
    Scanned,
    Image,
}

impl DocumentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Digital => "digital",
            Self::Scanned => "scanned",
            Self::Image => "image",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PageProvenance {
    pub page: usize,
    pub backend: String,
    pub reason: String,
    pub text_char_count: usize,
    pub ocr_char_count: Option<usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub filename: String,
    pub sha256: String,
    pub kind: DocumentKind,
    pub page_count: usize,
    pub ocr_page_count: usize,
    pub text_char_count: usize,
    pub fields: ExtractionResult,
    #[serde(skip_serializing)]
    pub text: String,
    pub provenance: Vec<PageProvenance>,
    pub warnings: Vec<String>,
}

impl DocumentRecord {
    pub fn failed(filename: String, sha256: String, warning: String) -> Self {
        Self {
            filename,
            sha256,
            kind: DocumentKind::Scanned,
            page_count: 0,
            ocr_page_count: 0,
            text_char_count: 0,
            fields: ExtractionResult::default(),
            text: String::new(),
            provenance: Vec::new(),
            warnings: vec![warning],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ToolVersions {
    pub pdftotext: Option<String>,
    pub pdfinfo: Option<String>,
    pub pdftoppm: Option<String>,
    pub tesseract: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExtractRunManifest {
    pub manifest_version: u32,
    pub generated_at: String,
    pub command: String,
    pub tool_versions: ToolVersions,
    pub document_count: usize,
    pub ocr_page_count: usize,
    pub documents: Vec<DocumentRecord>,
    pub warnings: Vec<String>,
}
