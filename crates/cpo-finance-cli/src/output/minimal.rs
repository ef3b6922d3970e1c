use serde_json::Value;

/// Paths to the headline figure of each command, most specific first.
const PRIORITY_PATHS: &[&[&str]] = &[
    &["metrics", "npv"],
    &["npv"],
    &["probability_weighted_npv"],
    &["annual_profit"],
    &["annual_revenue"],
    &["periodic_payment"],
    &["summary", "total_impact"],
    &["total_repair_cost", "mean"],
    &["totals", "total_profit"],
];

/// Print just the key answer value from the output.
///
/// Looks up the headline paths in order (skipping nulls), then falls back to
/// the last row of a series result or the first field of an object.
pub fn print_minimal(value: &Value) {
    let result_obj = value
        .as_object()
        .and_then(|m| m.get("result"))
        .unwrap_or(value);

    for path in PRIORITY_PATHS {
        if let Some(val) = lookup(result_obj, path) {
            if !val.is_null() {
                println!("{}", format_minimal(val));
                return;
            }
        }
    }

    match result_obj {
        // Monthly rows: the closing cumulative position
        Value::Array(rows) => {
            if let Some(last) = rows.last() {
                if let Some(cumulative) = last.get("cumulative_cash_flow") {
                    println!("{}", format_minimal(cumulative));
                    return;
                }
            }
        }
        Value::Object(map) => {
            if let Some((key, val)) = map.iter().next() {
                println!("{}: {}", key, format_minimal(val));
                return;
            }
        }
        _ => {}
    }

    println!("{}", format_minimal(result_obj));
}

fn lookup<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

fn format_minimal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        _ => serde_json::to_string(value).unwrap_or_default(),
    }
}
