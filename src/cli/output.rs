use crate::model::{Domain, SchemaRegistry};
use crate::query::EvaluationResult;
use crate::util::unicode;

/// Widest a plain-table column is allowed to grow.
const MAX_COLUMN_WIDTH: usize = 40;

/// Print an evaluation result as a plain aligned table. Warnings go to
/// stderr so stdout stays pipeable.
pub fn print_table(result: &EvaluationResult, schema: &SchemaRegistry, domain: Domain) {
    for warning in &result.warnings {
        eprintln!("warning: {warning}");
    }
    if result.columns.is_empty() {
        println!("(no columns)");
        return;
    }

    let rendered: Vec<Vec<String>> = result
        .rows
        .iter()
        .map(|row| {
            result
                .columns
                .iter()
                .map(|col| match row.field(col) {
                    Some(v) => schema.format(domain, col, &v),
                    None => String::new(),
                })
                .collect()
        })
        .collect();

    let widths: Vec<usize> = result
        .columns
        .iter()
        .enumerate()
        .map(|(i, col)| {
            let body = rendered
                .iter()
                .map(|row| unicode::display_width(&row[i]))
                .max()
                .unwrap_or(0);
            body.max(unicode::display_width(col)).min(MAX_COLUMN_WIDTH)
        })
        .collect();

    let header: Vec<String> = result
        .columns
        .iter()
        .zip(&widths)
        .map(|(col, &w)| unicode::fit_to_width(col, w))
        .collect();
    println!("{}", header.join("  "));
    let rule: Vec<String> = widths.iter().map(|&w| "-".repeat(w)).collect();
    println!("{}", rule.join("  "));

    for row in &rendered {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| unicode::fit_to_width(cell, w))
            .collect();
        println!("{}", line.join("  "));
    }

    if result.actual_row_count != result.estimated_row_count {
        println!(
            "({} of {} rows)",
            result.actual_row_count, result.estimated_row_count
        );
    }
}
