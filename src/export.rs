use std::fs::File;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};

use crate::model::{DocumentRecord, FieldKind};

pub fn write_csv<W: Write>(writer: W, records: &[DocumentRecord]) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["File"];
    header.extend(FieldKind::ALL.iter().map(|kind| kind.column_name()));
    csv_writer
        .write_record(&header)
        .context("failed to write csv header")?;

    for record in records {
        let mut row = vec![record.filename.as_str()];
        for kind in FieldKind::ALL {
            row.push(record.fields.get(kind).unwrap_or(""));
        }
        csv_writer
            .write_record(&row)
            .with_context(|| format!("failed to write csv row for {}", record.filename))?;
    }

    csv_writer.flush().context("failed to flush csv output")?;
    Ok(())
}

pub fn csv_bytes(records: &[DocumentRecord]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_csv(&mut buffer, records)?;
    Ok(buffer)
}

pub fn write_csv_file(path: &Path, records: &[DocumentRecord]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create csv file: {}", path.display()))?;
    write_csv(file, records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentKind, ExtractionResult};

    fn record(filename: &str, fields: ExtractionResult) -> DocumentRecord {
        DocumentRecord {
            filename: filename.to_string(),
            sha256: "deadbeef".to_string(),
            kind: DocumentKind::Digital,
            page_count: 1,
            ocr_page_count: 0,
            text_char_count: 0,
            fields,
            text: String::new(),
            provenance: Vec::new(),
            warnings: Vec::new(),
        }
    }

    #[test]
    fn csv_header_matches_table_columns_in_order() {
        let bytes = csv_bytes(&[]).expect("csv renders");
        let rendered = String::from_utf8(bytes).expect("utf-8 csv");
        assert_eq!(
            rendered.lines().next(),
            Some("File,Name,Date,Procedure,Physician,License-Number")
        );
    }

    #[test]
    fn absent_fields_render_as_empty_cells() {
        let fields = ExtractionResult {
            date: Some("12/03/2024".to_string()),
            ..ExtractionResult::default()
        };
        let bytes = csv_bytes(&[record("guia.pdf", fields)]).expect("csv renders");
        let rendered = String::from_utf8(bytes).expect("utf-8 csv");
        assert_eq!(
            rendered.lines().nth(1),
            Some("guia.pdf,,12/03/2024,,,")
        );
    }

    #[test]
    fn values_with_delimiters_are_quoted() {
        let fields = ExtractionResult {
            procedure: Some("Consulta, avaliação clínica".to_string()),
            ..ExtractionResult::default()
        };
        let bytes = csv_bytes(&[record("guia.pdf", fields)]).expect("csv renders");
        let rendered = String::from_utf8(bytes).expect("utf-8 csv");
        assert!(rendered.contains("\"Consulta, avaliação clínica\""));
    }

    #[test]
    fn one_row_per_document() {
        let records = vec![
            record("a.pdf", ExtractionResult::default()),
            record("b.pdf", ExtractionResult::default()),
        ];
        let bytes = csv_bytes(&records).expect("csv renders");
        let rendered = String::from_utf8(bytes).expect("utf-8 csv");
        assert_eq!(rendered.lines().count(), 3);
    }
}
