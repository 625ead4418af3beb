use anyhow::{Context, Result};
use regex::Regex;

use crate::model::{ExtractionResult, FieldKind};

pub(crate) struct FieldExtractor {
    patterns: Vec<(FieldKind, Vec<Regex>)>,
}

impl FieldExtractor {
    pub(crate) fn new() -> Result<Self> {
        let mut patterns = Vec::with_capacity(FieldKind::ALL.len());

        for kind in FieldKind::ALL {
            let compiled = pattern_sources(kind)
                .iter()
                .map(|source| {
                    Regex::new(source).with_context(|| {
                        format!("failed to compile {} field regex", kind.column_name())
                    })
                })
                .collect::<Result<Vec<Regex>>>()?;
            patterns.push((kind, compiled));
        }

        Ok(Self { patterns })
    }

    pub(crate) fn extract(&self, text: &str) -> ExtractionResult {
        let flat = collapse_whitespace(text);
        let mut result = ExtractionResult::default();

        for (kind, regexes) in &self.patterns {
            for regex in regexes {
                let Some(captures) = regex.captures(&flat) else {
                    continue;
                };
                let Some(value) = captures.get(1) else {
                    continue;
                };
                if let Some(accepted) = post_process(*kind, value.as_str()) {
                    result.set(*kind, accepted);
                    break;
                }
            }
        }

        result
    }
}

// label patterns in precedence order; the first accepted match wins
fn pattern_sources(kind: FieldKind) -> &'static [&'static str] {
    match kind {
        FieldKind::PatientName => &[
            r"(?:\d{1,2}\s*-\s*)?(?:Paciente|Benefici[áa]rio|Nome(?:\s+d[oa]\s+(?:Paciente|Benefici[áa]rio))?)\s*[:\-]\s*([A-ZÀ-Ý][A-Za-zÀ-ÿ'\s]+?)(?:\s+(?:CPF|RG|Cart(?:eira|ão)|Nascimento|Data|Procedimento|M[ée]dico|CRM|Conv[êe]nio)\b|\s+\d|$)",
            r"(?i)\b(?:paciente|nome)\b\s*[:\-]\s*([A-Za-zÀ-ÿ][A-Za-zÀ-ÿ'\s]{2,79}?)(?:\s+(?:cpf|rg|data|crm)\b|\s+\d|$)",
        ],
        FieldKind::Date => &[
            r"(?:\d{1,2}\s*-\s*)?Data(?:\s+d[aeo]\s+[A-Za-zÀ-ÿ]+)?\s*[:\-]?\s*(\d{2}/\d{2}/\d{4})",
            r"\b(\d{2}/\d{2}/\d{4})\b",
        ],
        FieldKind::Procedure => &[
            r"(?:\d{1,2}\s*-\s*)?(?:Descri[çc][ãa]o\s+d[oa]\s+)?(?:Procedimento|Exame|Servi[çc]o)(?:\s+(?:Solicitado|Realizado))?\s*[:\-]\s*([A-Za-zÀ-ÿ0-9][A-Za-zÀ-ÿ0-9\s,\./\-]*?)(?:\s+(?:M[ée]dico|CRM|Data|Valor|Paciente|Quantidade|Assinatura)\b|$)",
        ],
        FieldKind::Physician => &[
            r"(?:\d{1,2}\s*-\s*)?(?:M[ée]dico(?:\s+(?:Respons[áa]vel|Solicitante|Executante))?|Profissional(?:\s+(?:Solicitante|Executante))?)\s*[:\-]\s*((?:Dr[a]?\.?\s+)?[A-ZÀ-Ý][A-Za-zÀ-ÿ'\.\s]+?)(?:\s+(?:CRM|CPF|Data|Procedimento|Assinatura|Conselho)\b|\s+\d|$)",
            r"\b(Dr[a]?\.\s+[A-ZÀ-Ý][A-Za-zÀ-ÿ'\s]+?)(?:\s+CRM\b|\s+\d|$)",
        ],
        FieldKind::LicenseNumber => &[
            r"CRM(?:[\s/\-]*[A-Z]{2})?\s*[:\.\-]?\s*[Nn]?[º°]?\s*(\d{1,3}(?:\.\d{3})+|\d{4,7})",
            r"(?:Conselho|Registro)(?:\s+(?:Regional|Profissional))?(?:\s+de\s+Medicina)?\s*[:\-]?\s*(\d{4,8})",
        ],
    }
}

pub(crate) fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<&str>>().join(" ")
}

fn post_process(kind: FieldKind, raw: &str) -> Option<String> {
    let value = collapse_whitespace(raw);
    let value = value.trim_end_matches([',', ';', '-']).trim();
    if value.is_empty() {
        return None;
    }

    match kind {
        FieldKind::PatientName | FieldKind::Physician => {
            if value.split_whitespace().count() < 2 {
                return None;
            }
            Some(value.to_string())
        }
        FieldKind::LicenseNumber => {
            // validated but never rewritten, so the value stays a substring
            // of the source text
            let digit_count = value
                .chars()
                .filter(|character| character.is_ascii_digit())
                .count();
            if digit_count < 4 {
                return None;
            }
            Some(value.to_string())
        }
        _ => Some(value.to_string()),
    }
}
