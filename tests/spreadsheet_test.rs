use ledgerlift::application::ports::{RenderError, SpreadsheetRenderer};
use ledgerlift::domain::TableData;
use ledgerlift::infrastructure::extraction::sanitize_extracted_text;
use ledgerlift::infrastructure::spreadsheet::XlsxRenderer;

fn sample_table() -> TableData {
    TableData::new(
        vec![
            "Date".to_string(),
            "Description".to_string(),
            "Amount".to_string(),
        ],
        vec![
            vec![
                "2024-05-01".to_string(),
                "Coffee shop".to_string(),
                "-5800".to_string(),
            ],
            vec![
                "2024-05-02".to_string(),
                "Salary deposit".to_string(),
                "100000".to_string(),
            ],
        ],
    )
}

#[tokio::test]
async fn given_table_when_rendering_then_a_zip_container_comes_back() {
    let renderer = XlsxRenderer::new();
    let bytes = renderer.render(&sample_table()).await.unwrap();

    // xlsx is a zip archive; the magic bytes are stable.
    assert!(bytes.len() > 4);
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn given_headers_only_when_rendering_then_workbook_still_builds() {
    let renderer = XlsxRenderer::new();
    let table = TableData::new(vec!["Date".to_string()], vec![]);
    let bytes = renderer.render(&table).await.unwrap();
    assert_eq!(&bytes[..2], b"PK");
}

#[tokio::test]
async fn given_empty_headers_when_rendering_then_rejected() {
    let renderer = XlsxRenderer::new();
    let table = TableData::new(vec![], vec![]);
    let result = renderer.render(&table).await;
    assert!(matches!(result, Err(RenderError::EmptyTable(_))));
}

#[test]
fn given_preview_rows_then_every_row_is_keyed_by_header() {
    let table = sample_table();
    let preview = table.preview_rows();

    assert_eq!(preview.len(), table.rows.len());
    for row in &preview {
        assert!(row.contains_key("Date"));
        assert!(row.contains_key("Description"));
        assert!(row.contains_key("Amount"));
    }
    assert_eq!(preview[0]["Description"], "Coffee shop");
}

#[test]
fn given_short_row_when_previewing_then_missing_cells_are_padded() {
    let table = TableData::new(
        vec!["A".to_string(), "B".to_string()],
        vec![vec!["only-a".to_string()]],
    );
    let preview = table.preview_rows();
    assert_eq!(preview.len(), 1);
    assert_eq!(preview[0]["A"], "only-a");
    assert_eq!(preview[0]["B"], "");
}

#[test]
fn given_padded_layout_text_when_sanitizing_then_whitespace_collapses() {
    let raw = "  2024-05-01    Coffee   shop      -5800  \r\n\r\n\r\n  Next   line  \n";
    let clean = sanitize_extracted_text(raw);
    assert_eq!(clean, "2024-05-01 Coffee shop -5800\nNext line");
}

#[test]
fn given_blank_input_when_sanitizing_then_empty_string() {
    assert_eq!(sanitize_extracted_text("   \n \t \n"), "");
}
