use serde_json::Value;

use crate::domain::rows::Row;

pub const NO_SIMILAR_EXCHANGES: &str = "Nessuna conversazione simile.";
const MISSING_CELL: &str = "NaN";
const EMPTY_SAMPLE: &str = "(nessuna riga)";

/// Everything the prompt is grounded on for one question.
#[derive(Debug, Clone)]
pub struct PromptContext<'a> {
    pub similar_exchanges: &'a [String],
    pub sales_summary: &'a str,
    pub data_sample: &'a str,
    pub question: &'a str,
}

pub fn build_prompt(ctx: &PromptContext<'_>) -> String {
    let similar = if ctx.similar_exchanges.is_empty() {
        NO_SIMILAR_EXCHANGES.to_string()
    } else {
        ctx.similar_exchanges.join("\n")
    };

    format!(
        "Sei un assistente esperto nell'analisi di dati tabellari di vendita.\n\
         Rispondi alla domanda dell'utente usando i dati qui sotto e, se pertinenti, \
         le conversazioni precedenti.\n\
         Se la risposta non è presente nei dati e non si può ricavare, dillo chiaramente.\n\
         Rispondi in modo conciso, diretto e professionale.\n\
         \n\
         Domande simili:\n{similar}\n\
         \n\
         Statistiche vendite per anno:\n{stats}\n\
         \n\
         Campione del dataset:\n{sample}\n\
         \n\
         Domanda attuale: {question}\n\
         \n\
         Risposta:\n",
        similar = similar,
        stats = ctx.sales_summary,
        sample = ctx.data_sample,
        question = ctx.question,
    )
}

/// Renders the first `limit` rows as a right-aligned fixed-width table.
///
/// Columns appear in upload order, extended by keys first seen in later rows; absent or null
/// cells print as `NaN`.
pub fn render_table(rows: &[Row], limit: usize) -> String {
    let sample = &rows[..rows.len().min(limit)];
    if sample.is_empty() {
        return EMPTY_SAMPLE.to_string();
    }

    let mut columns: Vec<&str> = Vec::new();
    for row in sample {
        for key in row.keys() {
            if !columns.contains(&key.as_str()) {
                columns.push(key);
            }
        }
    }

    let cells: Vec<Vec<String>> = sample
        .iter()
        .map(|row| columns.iter().map(|c| cell_text(row.get(*c))).collect())
        .collect();

    let widths: Vec<usize> = columns
        .iter()
        .enumerate()
        .map(|(i, name)| {
            cells
                .iter()
                .map(|r| r[i].chars().count())
                .chain(std::iter::once(name.chars().count()))
                .max()
                .unwrap_or(0)
        })
        .collect();

    let format_line = |values: Vec<&str>| -> String {
        values
            .iter()
            .zip(&widths)
            .map(|(v, w)| format!("{:>width$}", v, width = *w))
            .collect::<Vec<_>>()
            .join("  ")
    };

    let mut lines = Vec::with_capacity(cells.len() + 1);
    lines.push(format_line(columns.clone()));
    for row in &cells {
        lines.push(format_line(row.iter().map(String::as_str).collect()));
    }
    lines.join("\n")
}

fn cell_text(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => MISSING_CELL.to_string(),
        Some(Value::String(s)) => s.replace('\n', " "),
        Some(other) => other.to_string(),
    }
}
