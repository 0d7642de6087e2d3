use std::io::{self, Write};

use crate::catalog::Catalog;
use crate::model::Plan;

const HEADER: &str = "day_index,day_label,exercise_id,exercise_name,primary_muscles,function,equipment,sets,reps,rest_seconds";

/// Quote a field if it contains a delimiter, quote, or line break.
fn field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_owned()
    }
}

fn joined<I, T>(items: I) -> String
where
    I: IntoIterator<Item = T>,
    T: ToString,
{
    items
        .into_iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join(";")
}

/// Write one row per block, preceded by a header row.
pub fn write_csv<W: Write>(plan: &Plan, catalog: &Catalog, writer: &mut W) -> io::Result<()> {
    writeln!(writer, "{HEADER}")?;

    for day in &plan.days {
        for block in &day.blocks {
            let exercise = catalog.get(&block.exercise_id);
            let (name, muscles, function, equipment) = match exercise {
                Some(e) => (
                    e.name.clone(),
                    joined(&e.primary_muscles),
                    e.function.to_string(),
                    joined(&e.equipment),
                ),
                None => (
                    block.exercise_id.to_string(),
                    String::new(),
                    String::new(),
                    String::new(),
                ),
            };
            let scheme = &block.set_scheme;
            writeln!(
                writer,
                "{},{},{},{},{},{},{},{},{},{}",
                day.day_index,
                field(&day.label),
                field(block.exercise_id.as_str()),
                field(&name),
                field(&muscles),
                field(&function),
                field(&equipment),
                scheme.sets,
                scheme.reps,
                scheme.rest_seconds,
            )?;
        }
    }
    Ok(())
}

/// [`write_csv`] into a string.
pub fn to_csv(plan: &Plan, catalog: &Catalog) -> String {
    let mut buf = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = write_csv(plan, catalog, &mut buf);
    String::from_utf8_lossy(&buf).into_owned()
}
