// src/render.rs
use crate::grid::{GridCell, PresenceGrid, StatusTotals};

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn html_cell(cell: &GridCell) -> String {
    let mut detail = String::new();
    if let Some(time) = cell.scan_time() {
        detail.push_str(&format!("<br><small>{}</small>", escape_html(time)));
    }
    if let Some(window) = &cell.verdict.window {
        detail.push_str(&format!("<br><small>{}</small>", escape_html(window)));
    }
    format!(
        "<td style='background:{};color:{};text-align:center' title='{}'>\
         <strong>{}</strong> {}<br><small>{}</small>{}</td>",
        cell.color,
        cell.text_color,
        escape_html(cell.verdict.message),
        cell.label,
        cell.badge,
        escape_html(&cell.schedule),
        detail
    )
}

fn html_totals(totals: &StatusTotals) -> String {
    format!(
        "<p>Présents: {} | Absents: {} | Repos: {} | Horaires invalides: {} | Inconnus: {}</p>",
        totals.present, totals.absent, totals.dayoff, totals.invalid, totals.unknown
    )
}

/// Server-rendered table with inline cell colors.
pub fn html_grid(grid: &PresenceGrid) -> String {
    let mut html = String::new();
    html.push_str(&format!("<h2>{}</h2>", escape_html(&grid.title)));
    html.push_str(&html_totals(&grid.totals));
    html.push_str("<table border='1' cellpadding='4' style='border-collapse:collapse'><thead><tr>");
    html.push_str("<th>Matricule</th><th>Nom</th><th>Segment</th><th>Badge</th>");
    for column in &grid.columns {
        html.push_str(&format!("<th>{}</th>", escape_html(column)));
    }
    html.push_str("</tr></thead><tbody>");

    if grid.rows.is_empty() {
        html.push_str(&format!(
            "<tr><td colspan='{}'>Aucun employé</td></tr>",
            grid.columns.len() + 4
        ));
    }
    for row in &grid.rows {
        let employee = &row.employee;
        html.push_str(&format!(
            "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td>",
            escape_html(employee.matricule.as_deref().unwrap_or("")),
            escape_html(&employee.name),
            escape_html(employee.segment.as_deref().unwrap_or("")),
            escape_html(&employee.nfc_token),
        ));
        for cell in &row.cells {
            html.push_str(&html_cell(cell));
        }
        html.push_str("</tr>");
    }
    html.push_str("</tbody></table>");
    html
}

fn text_cell(cell: &GridCell) -> String {
    match cell.scan_time() {
        Some(time) => format!("{} {}", cell.label, time),
        None => cell.label.to_string(),
    }
}

fn pad(value: &str, width: usize) -> String {
    let len = value.chars().count();
    format!("{}{}", value, " ".repeat(width.saturating_sub(len)))
}

/// Fixed-width table for terminals and cron mail.
pub fn text_table(grid: &PresenceGrid) -> String {
    let mut header: Vec<String> = vec!["Matricule".into(), "Nom".into(), "Segment".into()];
    header.extend(grid.columns.iter().cloned());

    let body: Vec<Vec<String>> = grid
        .rows
        .iter()
        .map(|row| {
            let mut line = vec![
                row.employee.matricule.clone().unwrap_or_default(),
                row.employee.name.clone(),
                row.employee.segment.clone().unwrap_or_default(),
            ];
            line.extend(row.cells.iter().map(text_cell));
            line
        })
        .collect();

    let widths: Vec<usize> = (0..header.len())
        .map(|i| {
            body.iter()
                .map(|line| line[i].chars().count())
                .chain(std::iter::once(header[i].chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |line: &[String]| -> String {
        line.iter()
            .zip(&widths)
            .map(|(value, width)| pad(value, *width))
            .collect::<Vec<_>>()
            .join(" | ")
            .trim_end()
            .to_string()
    };

    let mut lines = vec![
        grid.title.clone(),
        format_line(&header),
        widths.iter().map(|w| "-".repeat(*w)).collect::<Vec<_>>().join("-+-"),
    ];
    lines.extend(body.iter().map(|line| format_line(line)));
    let totals = &grid.totals;
    lines.push(format!(
        "Présents: {}  Absents: {}  Repos: {}  Invalides: {}  Inconnus: {}",
        totals.present, totals.absent, totals.dayoff, totals.invalid, totals.unknown
    ));

    let mut out = lines.join("\n");
    out.push('\n');
    out
}
