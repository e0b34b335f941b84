use crate::model::{Domain, SchemaRegistry};

/// Cells reserved at the left edge for the selection indicator.
pub const INDICATOR_MARGIN: usize = 2;
/// Gap between adjacent columns.
const COLUMN_GAP: usize = 1;
/// Floor for flexible columns.
const FLEX_MIN: usize = 8;
/// Width given to columns with no schema entry (metrics, relations, group).
const DERIVED_WIDTH: usize = 10;

/// A display column with its allocated width in cells.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub width: usize,
}

/// Allocate widths: schema-fixed columns get their declared width (never
/// below the schema minimum), derived columns a standard width, and the
/// remaining space is split evenly among flexible columns with a floor of
/// eight cells. The total never exceeds the terminal width minus the
/// selection-indicator margin.
pub fn allocate_columns(
    names: &[String],
    schema: &SchemaRegistry,
    domain: Domain,
    term_width: usize,
) -> Vec<Column> {
    if names.is_empty() {
        return Vec::new();
    }
    let avail = term_width
        .saturating_sub(INDICATOR_MARGIN)
        .saturating_sub(COLUMN_GAP * names.len().saturating_sub(1));

    let mut widths: Vec<Option<usize>> = Vec::with_capacity(names.len());
    let mut fixed_total = 0;
    let mut flex_count = 0;
    for name in names {
        match schema.get(domain, name) {
            Some(field) => match field.fixed_width {
                Some(w) => {
                    let w = w.max(field.min_width);
                    widths.push(Some(w));
                    fixed_total += w;
                }
                None => {
                    widths.push(None);
                    flex_count += 1;
                }
            },
            None => {
                widths.push(Some(DERIVED_WIDTH));
                fixed_total += DERIVED_WIDTH;
            }
        }
    }

    let flex_width = if flex_count > 0 {
        (avail.saturating_sub(fixed_total) / flex_count).max(FLEX_MIN)
    } else {
        0
    };

    let mut columns: Vec<Column> = names
        .iter()
        .zip(widths)
        .map(|(name, w)| Column {
            name: name.clone(),
            width: w.unwrap_or(flex_width),
        })
        .collect();

    // Clip overflowing columns so the row never paints past the edge
    // (gaps were already carved out of `avail`)
    let mut used = 0;
    for col in &mut columns {
        let remaining = avail.saturating_sub(used);
        if col.width > remaining {
            col.width = remaining;
        }
        used += col.width;
    }
    columns.retain(|c| c.width > 0);
    columns
}

/// Starting x position of each column, after the indicator margin.
pub fn column_offsets(columns: &[Column]) -> Vec<usize> {
    let mut offsets = Vec::with_capacity(columns.len());
    let mut x = INDICATOR_MARGIN;
    for col in columns {
        offsets.push(x);
        x += col.width + COLUMN_GAP;
    }
    offsets
}
