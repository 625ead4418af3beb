use std::fs;
use std::io::Write;

use super::*;

fn pages_of(texts: &[&str]) -> Vec<String> {
    texts.iter().map(|text| text.to_string()).collect()
}

fn extractor() -> fields::FieldExtractor {
    fields::FieldExtractor::new().expect("field patterns compile")
}

#[test]
fn classify_reports_digital_when_first_page_has_text() {
    let pages = pages_of(&[
        "GUIA DE CONSULTA Nome: João da Silva Data: 12/03/2024 Procedimento: Consulta",
        "",
    ]);
    assert_eq!(pages::classify_pages(&pages, 32), DocumentKind::Digital);
}

#[test]
fn classify_reports_scanned_when_first_page_is_blank() {
    let pages = pages_of(&["  \n \n", "texto apenas na segunda página, longo o bastante"]);
    assert_eq!(pages::classify_pages(&pages, 32), DocumentKind::Scanned);
}

#[test]
fn classify_reports_scanned_for_missing_pages() {
    assert_eq!(pages::classify_pages(&[], 32), DocumentKind::Scanned);
}

#[test]
fn classify_threshold_is_inclusive() {
    let exactly_32 = "a".repeat(32);
    assert_eq!(
        pages::classify_pages(&[exactly_32], 32),
        DocumentKind::Digital
    );
    let short = "a".repeat(31);
    assert_eq!(pages::classify_pages(&[short], 32), DocumentKind::Scanned);
}

#[test]
fn ocr_candidates_follow_mode_and_classification() {
    assert!(pages::ocr_candidate_pages(DocumentKind::Scanned, OcrMode::Off, 3).is_empty());
    assert_eq!(
        pages::ocr_candidate_pages(DocumentKind::Digital, OcrMode::Force, 3),
        vec![1, 2, 3]
    );
    assert!(pages::ocr_candidate_pages(DocumentKind::Digital, OcrMode::Auto, 3).is_empty());
    assert_eq!(
        pages::ocr_candidate_pages(DocumentKind::Scanned, OcrMode::Auto, 2),
        vec![1, 2]
    );
}

#[test]
fn source_kind_detection_ignores_extension_case() {
    use std::path::Path;

    assert_eq!(
        source_kind_for(Path::new("guia.PDF")).expect("pdf source"),
        SourceKind::Pdf
    );
    assert_eq!(
        source_kind_for(Path::new("guia.jpeg")).expect("image source"),
        SourceKind::Image
    );
    assert!(source_kind_for(Path::new("guia.txt")).is_err());
}

#[test]
fn noise_lines_are_dropped_during_normalization() {
    assert!(pages::line_is_noise("Impresso em 01/02/2024 10:31"));
    assert!(pages::line_is_noise("Página 1 de 2"));
    assert!(pages::line_is_noise("pagina 12 de 30"));
    assert!(!pages::line_is_noise("Página de rosto da guia"));
    assert!(!pages::line_is_noise("Nome: João da Silva"));
}

#[test]
fn hyphenated_line_breaks_are_merged() {
    let lines = vec![
        "Solicito autoriza-".to_string(),
        "ção do procedimento".to_string(),
        "Guia-".to_string(),
        "Data: 12/03/2024".to_string(),
    ];

    let (merged, merges) = pages::merge_hyphenated_lines(lines);
    assert_eq!(merges, 1);
    assert_eq!(merged[0], "Solicito autorização do procedimento");
    assert_eq!(merged[1], "Guia-");
}

#[test]
fn normalize_pages_drops_banners_and_merges_hyphens() {
    let mut pages_text = vec![
        "Impresso em 01/02/2024\nSolicito autoriza-\nção do exame\nPágina 1 de 1".to_string(),
    ];

    let merges = pages::normalize_pages(&mut pages_text);
    assert_eq!(merges, 1);
    assert_eq!(pages_text[0], "Solicito autorização do exame");
}

#[test]
fn extracts_exact_value_for_labeled_name() {
    let result = extractor().extract("Nome: John Doe");
    assert_eq!(result.patient_name.as_deref(), Some("John Doe"));
}

#[test]
fn single_word_names_are_rejected() {
    let result = extractor().extract("Nome: Maria");
    assert_eq!(result.patient_name, None);
}

#[test]
fn absent_labels_leave_fields_empty() {
    let result = extractor().extract("guia sem campos reconhecíveis, apenas texto corrido");
    assert_eq!(result.matched_count(), 0);
}

#[test]
fn empty_text_yields_empty_result() {
    let result = extractor().extract("");
    assert_eq!(result.matched_count(), 0);
}

#[test]
fn labeled_date_wins_over_other_numbers() {
    let result = extractor().extract("Carteira 998877 Data de Autorização: 12/03/2024");
    assert_eq!(result.date.as_deref(), Some("12/03/2024"));
}

#[test]
fn bare_date_is_used_when_no_label_matches() {
    let result = extractor().extract("Guia emitida em 05/10/2023 sem rótulo de data");
    assert_eq!(result.date.as_deref(), Some("05/10/2023"));
}

#[test]
fn license_number_accepts_state_prefix_and_dots() {
    let result = extractor().extract("Médico: Carlos Souza CRM/SP 123.456");
    assert_eq!(result.license_number.as_deref(), Some("123.456"));

    let result = extractor().extract("CRM: 98765");
    assert_eq!(result.license_number.as_deref(), Some("98765"));
}

#[test]
fn license_label_without_digits_is_ignored() {
    let result = extractor().extract("CRM do solicitante pendente de preenchimento");
    assert_eq!(result.license_number, None);
}

#[test]
fn extracts_all_fields_from_guia_text() {
    let text = "GUIA DE SERVIÇO PROFISSIONAL\n\
                Nome do Paciente: Ana Beatriz Costa CPF 111.222.333-44\n\
                Data de Atendimento: 07/08/2025\n\
                Procedimento Solicitado: Consulta em consultório Valor: R$ 150,00\n\
                Médico Responsável: Dra. Maria Silva CRM/SP 123.456";

    let result = extractor().extract(text);
    assert_eq!(result.patient_name.as_deref(), Some("Ana Beatriz Costa"));
    assert_eq!(result.date.as_deref(), Some("07/08/2025"));
    assert_eq!(
        result.procedure.as_deref(),
        Some("Consulta em consultório")
    );
    assert_eq!(result.physician.as_deref(), Some("Dra. Maria Silva"));
    assert_eq!(result.license_number.as_deref(), Some("123.456"));
}

#[test]
fn extracted_values_are_substrings_of_the_collapsed_text() {
    let text = "Nome: Pedro Alves\nProcedimento: Raio X de tórax\n\
                Médico: Dr. Luis Prado CRM 4321\nData: 01/02/2024";
    let collapsed = fields::collapse_whitespace(text);

    let result = extractor().extract(text);
    for kind in crate::model::FieldKind::ALL {
        if let Some(value) = result.get(kind) {
            assert!(
                collapsed.contains(value),
                "{value:?} not found in {collapsed:?}"
            );
        }
    }
    assert_eq!(result.matched_count(), 5);
}

#[test]
fn extract_rejects_unsupported_file_types() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("nota.txt");
    let mut file = fs::File::create(&path).expect("create file");
    file.write_all(b"apenas texto").expect("write file");

    let document_extractor = DocumentExtractor::new(ExtractOptions {
        ocr_mode: OcrMode::Off,
        ocr_lang: "por+eng".to_string(),
        ocr_min_text_chars: 32,
        ocr_dpi: 200,
        max_pages_per_doc: None,
    })
    .expect("extractor builds");

    let error = document_extractor
        .extract(&path)
        .expect_err("txt is unsupported");
    assert!(error.to_string().contains("unsupported file type"));
}
