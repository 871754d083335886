use async_trait::async_trait;
use rust_xlsxwriter::{Color, Format, FormatAlign, FormatBorder, Workbook};

use crate::application::ports::{RenderError, SpreadsheetRenderer};
use crate::domain::TableData;

const SHEET_NAME: &str = "Bank Statement";
const HEADER_FILL: u32 = 0x4CAF50;
const MIN_COLUMN_WIDTH: f64 = 12.0;

/// Renders table data into an xlsx workbook: styled header row, bordered
/// cells, amounts written as numbers, auto-filter and a frozen header.
/// Workbook assembly is CPU-bound and runs on the blocking pool.
#[derive(Default)]
pub struct XlsxRenderer;

impl XlsxRenderer {
    pub fn new() -> Self {
        Self
    }

    fn build_workbook(table: &TableData) -> Result<Vec<u8>, RenderError> {
        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(SHEET_NAME)
            .map_err(|e| RenderError::GenerationFailed(e.to_string()))?;

        let header_format = Format::new()
            .set_bold()
            .set_background_color(Color::RGB(HEADER_FILL))
            .set_font_color(Color::White)
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Center)
            .set_align(FormatAlign::VerticalCenter);
        let cell_format = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Left);
        let number_format = Format::new()
            .set_border(FormatBorder::Thin)
            .set_align(FormatAlign::Right)
            .set_num_format("#,##0.00");

        for (col, header) in table.headers.iter().enumerate() {
            let col = col as u16;
            worksheet
                .write_string_with_format(0, col, header, &header_format)
                .map_err(|e| RenderError::GenerationFailed(e.to_string()))?;
            let width = (header.len() as f64 + 2.0).max(MIN_COLUMN_WIDTH);
            worksheet
                .set_column_width(col, width)
                .map_err(|e| RenderError::GenerationFailed(e.to_string()))?;
        }

        for (row_idx, row) in table.rows.iter().enumerate() {
            let row_idx = row_idx as u32 + 1;
            for (col_idx, cell) in row.iter().enumerate() {
                let col_idx = col_idx as u16;
                let written = match cell.replace(',', "").parse::<f64>() {
                    Ok(number) => worksheet.write_number_with_format(
                        row_idx,
                        col_idx,
                        number,
                        &number_format,
                    ),
                    Err(_) => {
                        worksheet.write_string_with_format(row_idx, col_idx, cell, &cell_format)
                    }
                };
                written.map_err(|e| RenderError::GenerationFailed(e.to_string()))?;
            }
        }

        if !table.headers.is_empty() && !table.rows.is_empty() {
            let last_row = table.rows.len() as u32;
            let last_col = (table.headers.len() - 1) as u16;
            worksheet
                .autofilter(0, 0, last_row, last_col)
                .map_err(|e| RenderError::GenerationFailed(e.to_string()))?;
        }
        worksheet
            .set_freeze_panes(1, 0)
            .map_err(|e| RenderError::GenerationFailed(e.to_string()))?;

        workbook
            .save_to_buffer()
            .map_err(|e| RenderError::GenerationFailed(e.to_string()))
    }
}

#[async_trait]
impl SpreadsheetRenderer for XlsxRenderer {
    async fn render(&self, table: &TableData) -> Result<Vec<u8>, RenderError> {
        if table.headers.is_empty() {
            return Err(RenderError::EmptyTable("no header row".to_string()));
        }

        let table = table.clone();
        let bytes = tokio::task::spawn_blocking(move || Self::build_workbook(&table))
            .await
            .map_err(|e| RenderError::GenerationFailed(format!("task join error: {e}")))??;

        tracing::debug!(bytes = bytes.len(), "Workbook rendered");
        Ok(bytes)
    }
}
