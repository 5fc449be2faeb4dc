use crate::model::{RowAction, RowEvent, TableData};

const COLUMN_GAP: usize = 3;

pub fn table_lines(data: &TableData, all_rows: bool) -> Vec<String> {
    let visible = data
        .rows
        .values()
        .filter(|row| all_rows || row.action != RowAction::Unchanged)
        .collect::<Vec<_>>();
    let widths = column_widths(&data.header, &visible);

    let mut lines = Vec::with_capacity(visible.len() + data.unavailable.len() + 1);
    lines.push(format!("  {}", pad_cells(&data.header, &widths)));
    for row in visible {
        let mut line = format!("{} {}", row.action.marker(), pad_cells(&row.fields, &widths));
        if let Some(changes) = describe_deltas(&data.header, row) {
            line.push_str("   ");
            line.push_str(&changes);
        }
        lines.push(line);
    }
    if data.is_empty() {
        lines.push("  (no objects)".to_string());
    }
    for key in &data.unavailable {
        lines.push(format!("! {key} (unavailable)"));
    }
    lines
}

pub fn describe_deltas(header: &[String], row: &RowEvent) -> Option<String> {
    if row.action != RowAction::Modified || !row.has_deltas() {
        return None;
    }

    let changes = row
        .deltas
        .iter()
        .zip(&row.fields)
        .enumerate()
        .filter(|(_, (delta, _))| !delta.is_empty())
        .map(|(index, (delta, field))| {
            let column = header.get(index).map(String::as_str).unwrap_or("?");
            format!("{column}: {delta} -> {field}")
        })
        .collect::<Vec<_>>();
    Some(changes.join(", "))
}

fn column_widths(header: &[String], rows: &[&RowEvent]) -> Vec<usize> {
    let mut widths = header
        .iter()
        .map(|cell| cell.chars().count())
        .collect::<Vec<_>>();
    for row in rows {
        for (index, cell) in row.fields.iter().enumerate() {
            let width = cell.chars().count();
            match widths.get_mut(index) {
                Some(current) => *current = (*current).max(width),
                None => widths.push(width),
            }
        }
    }
    widths
}

fn pad_cells(cells: &[String], widths: &[usize]) -> String {
    let last = cells.len().saturating_sub(1);
    cells
        .iter()
        .enumerate()
        .map(|(index, cell)| {
            if index == last {
                cell.clone()
            } else {
                let width = widths.get(index).copied().unwrap_or(0) + COLUMN_GAP;
                format!("{cell:<width$}")
            }
        })
        .collect()
}
