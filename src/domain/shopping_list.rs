use std::collections::BTreeMap;

use crate::{schema::CartLine, validation::ValidationError};

pub const SHOPPING_LIST_HEADER: &str = "Shopping list:";

/// Sums cart lines per `(name, measurement_unit)` and formats one line per
/// group, ordered by name and then unit.
pub fn aggregate_shopping_list(lines: &[CartLine]) -> Result<Vec<String>, ValidationError> {
    if lines.is_empty() {
        return Err(ValidationError::EmptyCart);
    }

    let mut totals: BTreeMap<(&str, &str), i64> = BTreeMap::new();
    for line in lines {
        *totals
            .entry((line.name.as_str(), line.measurement_unit.as_str()))
            .or_insert(0) += line.amount;
    }

    Ok(totals
        .into_iter()
        .map(|((name, unit), total)| format!("{name} ({unit}) - {total}"))
        .collect())
}

/// Plain-text document offered for download.
pub fn render_shopping_list(lines: &[CartLine]) -> Result<String, ValidationError> {
    let items = aggregate_shopping_list(lines)?;

    let mut document = format!("{SHOPPING_LIST_HEADER}\n\n");
    items.iter().for_each(|item| {
        document += item;
        document.push('\n');
    });

    Ok(document)
}
