use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use shared::protocol::ExportRow;

const HEADERS: [&str; 9] = [
    "Date",
    "Restaurant",
    "Category",
    "Item",
    "Price",
    "Calories",
    "Proteins",
    "Fats",
    "Carbohydrates",
];

static REPORT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Renders export rows into an xlsx workbook and returns the file bytes.
pub fn stats_workbook(rows: &[ExportRow]) -> anyhow::Result<Vec<u8>> {
    let mut book = umya_spreadsheet::new_file();
    let sheet = book
        .get_sheet_by_name_mut("Sheet1")
        .context("default worksheet missing")?;

    for (column, header) in HEADERS.iter().enumerate() {
        sheet.get_cell_mut(cell_ref(column, 0).as_str()).set_value(*header);
    }

    for (line, row) in rows.iter().enumerate() {
        let line = line + 1;
        sheet
            .get_cell_mut(cell_ref(0, line).as_str())
            .set_value(row.created.format("%Y-%m-%d %H:%M").to_string());
        sheet
            .get_cell_mut(cell_ref(1, line).as_str())
            .set_value(row.restaurant.clone());
        sheet
            .get_cell_mut(cell_ref(2, line).as_str())
            .set_value(row.category.clone());
        sheet
            .get_cell_mut(cell_ref(3, line).as_str())
            .set_value(row.item.clone());
        sheet
            .get_cell_mut(cell_ref(4, line).as_str())
            .set_value_number(row.price);
        sheet
            .get_cell_mut(cell_ref(5, line).as_str())
            .set_value_number(row.calories);
        sheet
            .get_cell_mut(cell_ref(6, line).as_str())
            .set_value_number(row.proteins);
        sheet
            .get_cell_mut(cell_ref(7, line).as_str())
            .set_value_number(row.fats);
        sheet
            .get_cell_mut(cell_ref(8, line).as_str())
            .set_value_number(row.carbohydrates);
    }

    // The writer wants a path, so stage through a scratch file.
    let sequence = REPORT_SEQ.fetch_add(1, Ordering::Relaxed);
    let scratch = std::env::temp_dir().join(format!(
        "menu_stats_{}_{sequence}.xlsx",
        std::process::id()
    ));
    umya_spreadsheet::writer::xlsx::write(&book, &scratch)
        .context("failed to write workbook")?;
    let bytes = std::fs::read(&scratch).context("failed to read workbook back")?;
    let _ = std::fs::remove_file(&scratch);
    Ok(bytes)
}

fn cell_ref(column: usize, row: usize) -> String {
    // Nine columns, so single letters are enough.
    format!("{}{}", (b'A' + column as u8) as char, row + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn cell_refs_are_a1_style() {
        assert_eq!(cell_ref(0, 0), "A1");
        assert_eq!(cell_ref(8, 3), "I4");
    }

    #[test]
    fn workbook_bytes_look_like_a_zip_archive() {
        let rows = vec![ExportRow {
            created: Utc::now(),
            restaurant: "Canteen".to_string(),
            category: "Soups".to_string(),
            item: "Borscht".to_string(),
            price: 250.0,
            calories: 310.0,
            proteins: 12.0,
            fats: 9.0,
            carbohydrates: 40.0,
        }];
        let bytes = stats_workbook(&rows).expect("workbook");
        assert!(bytes.starts_with(b"PK"), "xlsx must be a zip container");
    }
}
