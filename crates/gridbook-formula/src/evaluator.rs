use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use gridbook_core::{Address, ErrorKind};

use crate::{expr, parser, FormulaError};

static SUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)SUM\s*\(([^)]+)\)").expect("sum regex"));
static AVERAGE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)AVERAGE\s*\(([^)]+)\)").expect("average regex"));
static COUNT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)COUNT\s*\(([^)]+)\)").expect("count regex"));

static CELL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[A-Z]+[0-9]+").expect("cell regex"));

#[derive(Clone, Copy)]
enum Aggregate {
    Sum,
    Average,
    Count,
}

/// Evaluate a raw cell input against the computed values of its
/// dependencies. Non-formulas come back verbatim; formula failures come back
/// as their error symbol. Pure: same inputs, same output.
pub fn evaluate(raw: &str, values: &HashMap<Address, String>) -> String {
    if !parser::is_formula(raw) {
        return raw.to_string();
    }

    match evaluate_body(raw, values) {
        Ok(rendered) => rendered,
        Err(err) => err.symbol().to_string(),
    }
}

fn evaluate_body(
    raw: &str,
    values: &HashMap<Address, String>,
) -> Result<String, FormulaError> {
    let body = raw.trim().strip_prefix('=').unwrap_or(raw).trim().to_string();

    // Aggregates first: their arguments disappear into a numeric literal,
    // so the plain-reference pass below never sees them.
    let body = fold_aggregates(&SUM_RE, Aggregate::Sum, &body, values)?;
    let body = fold_aggregates(&AVERAGE_RE, Aggregate::Average, &body, values)?;
    let body = fold_aggregates(&COUNT_RE, Aggregate::Count, &body, values)?;

    let body = substitute_refs(&body, values)?;

    let result = expr::evaluate(&body).map_err(|err| match err {
        expr::ExprError::UnknownName(name) => {
            FormulaError::Name(format!("unknown function: {name}"))
        }
        expr::ExprError::Malformed(msg) => FormulaError::Parse(msg),
    })?;

    if result.is_infinite() {
        return Ok(ErrorKind::DivZero.symbol().to_string());
    }
    if result.is_nan() {
        return Ok(ErrorKind::NumError.symbol().to_string());
    }

    Ok(render_number(result))
}

/// Replace every `NAME(args)` occurrence with the aggregate's numeric
/// literal. Nesting of the three aggregates within each other is not
/// supported by the grammar.
fn fold_aggregates(
    re: &Regex,
    agg: Aggregate,
    body: &str,
    values: &HashMap<Address, String>,
) -> Result<String, FormulaError> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for caps in re.captures_iter(body) {
        let whole = caps.get(0).expect("match");
        let numbers = numeric_arguments(&caps[1], values)?;

        let literal = match agg {
            Aggregate::Sum => render_number(numbers.iter().sum()),
            Aggregate::Average => {
                if numbers.is_empty() {
                    "0".to_string()
                } else {
                    render_number(numbers.iter().sum::<f64>() / numbers.len() as f64)
                }
            }
            Aggregate::Count => numbers.len().to_string(),
        };

        out.push_str(&body[last..whole.start()]);
        out.push_str(&literal);
        last = whole.end();
    }
    out.push_str(&body[last..]);

    Ok(out)
}

/// Resolve an aggregate's argument list to the numeric values it covers.
/// Absent cells read as 0; non-numeric values are skipped; a referenced
/// error value poisons the whole formula.
fn numeric_arguments(
    args: &str,
    values: &HashMap<Address, String>,
) -> Result<Vec<f64>, FormulaError> {
    let refs = parser::extract_refs(&format!("={args}"))?;

    let mut numbers = Vec::with_capacity(refs.len());
    for addr in refs {
        let value = values.get(&addr).map(String::as_str).unwrap_or("0");
        if ErrorKind::is_error_value(value) {
            return Err(FormulaError::Value(format!(
                "referenced cell {addr} contains an error"
            )));
        }
        if let Ok(n) = value.parse::<f64>() {
            numbers.push(n);
        }
    }

    Ok(numbers)
}

/// Replace each remaining cell reference with the numeric form of its
/// computed value: absent or unaddressable reads as 0, non-numeric text
/// reads as 0, error values poison the formula.
fn substitute_refs(
    body: &str,
    values: &HashMap<Address, String>,
) -> Result<String, FormulaError> {
    let mut out = String::with_capacity(body.len());
    let mut last = 0;

    for m in CELL_RE.find_iter(body) {
        out.push_str(&body[last..m.start()]);

        let value = match Address::from_a1(m.as_str()) {
            Ok(addr) => {
                let value = values.get(&addr).map(String::as_str).unwrap_or("0");
                if ErrorKind::is_error_value(value) {
                    return Err(FormulaError::Value(format!(
                        "referenced cell {addr} contains an error"
                    )));
                }
                value
            }
            // Matched the lexical shape but not a real address (e.g. A0).
            Err(_) => "0",
        };

        if value.parse::<f64>().is_ok() {
            out.push_str(value);
        } else {
            out.push('0');
        }
        last = m.end();
    }
    out.push_str(&body[last..]);

    Ok(out)
}

/// Whole numbers render without a fractional part; everything else as a
/// plain decimal.
fn render_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn values(pairs: &[(&str, &str)]) -> HashMap<Address, String> {
        pairs
            .iter()
            .map(|(a, v)| (Address::from_a1(a).unwrap(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_non_formula_is_verbatim() {
        let vals = values(&[]);
        assert_eq!(evaluate("42", &vals), "42");
        assert_eq!(evaluate("hello", &vals), "hello");
    }

    #[test]
    fn test_simple_arithmetic() {
        let vals = values(&[("A1", "10"), ("A2", "20")]);
        assert_eq!(evaluate("=A1+A2", &vals), "30");
        assert_eq!(evaluate("=A2-A1", &vals), "10");
        assert_eq!(evaluate("=A1*A2", &vals), "200");
        assert_eq!(evaluate("=A2/A1", &vals), "2");
    }

    #[test]
    fn test_precedence_and_grouping() {
        let vals = values(&[("A1", "2"), ("B1", "3"), ("C1", "4")]);
        assert_eq!(evaluate("=A1+B1*C1", &vals), "14");
        assert_eq!(evaluate("=(A1+B1)*C1", &vals), "20");
    }

    #[test]
    fn test_missing_reference_reads_as_zero() {
        let vals = values(&[("A1", "10")]);
        assert_eq!(evaluate("=A1+Z99", &vals), "10");
    }

    #[test]
    fn test_text_reference_reads_as_zero() {
        let vals = values(&[("A1", "hello"), ("A2", "5")]);
        assert_eq!(evaluate("=A1+A2", &vals), "5");
    }

    #[test]
    fn test_error_reference_propagates_as_value_error() {
        let vals = values(&[("A1", "#DIV/0!"), ("A2", "5")]);
        assert_eq!(evaluate("=A1+A2", &vals), "#VALUE!");
    }

    #[test]
    fn test_division_by_zero() {
        let vals = values(&[]);
        assert_eq!(evaluate("=10/0", &vals), "#DIV/0!");
        assert_eq!(evaluate("=0/0", &vals), "#NUM!");
    }

    #[test]
    fn test_sum_over_range() {
        let vals = values(&[("A1", "10"), ("A2", "20"), ("A3", "30")]);
        assert_eq!(evaluate("=SUM(A1:A3)", &vals), "60");
        assert_eq!(evaluate("=SUM(A1:A3)+5", &vals), "65");
        assert_eq!(evaluate("=sum(A1:A3)", &vals), "60");
    }

    #[test]
    fn test_sum_skips_non_numeric() {
        let vals = values(&[("A1", "10"), ("A2", "hello"), ("A3", "30")]);
        assert_eq!(evaluate("=SUM(A1:A3)", &vals), "40");
    }

    #[test]
    fn test_sum_over_explicit_cells() {
        let vals = values(&[("A1", "1"), ("B2", "2"), ("C3", "3")]);
        assert_eq!(evaluate("=SUM(A1,B2,C3)", &vals), "6");
    }

    #[test]
    fn test_average() {
        let vals = values(&[("A1", "10"), ("A2", "20"), ("A3", "30")]);
        assert_eq!(evaluate("=AVERAGE(A1:A3)", &vals), "20");
    }

    #[test]
    fn test_average_counts_numeric_values_only() {
        let vals = values(&[("A1", "10"), ("A2", "text"), ("A3", "30")]);
        assert_eq!(evaluate("=AVERAGE(A1:A3)", &vals), "20");
    }

    #[test]
    fn test_count_counts_numeric_values_only() {
        let vals = values(&[("A1", "10"), ("A2", "text"), ("A3", "30")]);
        assert_eq!(evaluate("=COUNT(A1:A3)", &vals), "2");
    }

    #[test]
    fn test_absent_range_cells_read_as_zero() {
        // Unmaterialized cells default to "0", which is numeric.
        let vals = values(&[]);
        assert_eq!(evaluate("=COUNT(B1:B3)", &vals), "3");
        assert_eq!(evaluate("=AVERAGE(B1:B3)", &vals), "0");
    }

    #[test]
    fn test_error_inside_aggregate_propagates() {
        let vals = values(&[("A1", "#REF!"), ("A2", "5")]);
        assert_eq!(evaluate("=SUM(A1:A2)", &vals), "#VALUE!");
    }

    #[test]
    fn test_two_aggregates_in_one_formula() {
        let vals = values(&[("A1", "1"), ("A2", "3"), ("B1", "10"), ("B2", "20")]);
        assert_eq!(evaluate("=SUM(A1:A2)+AVERAGE(B1:B2)", &vals), "19");
    }

    #[test]
    fn test_fractional_result_renders_as_decimal() {
        let vals = values(&[("A1", "10"), ("A2", "4")]);
        assert_eq!(evaluate("=A1/A2", &vals), "2.5");
    }

    #[test]
    fn test_unknown_function_is_name_error() {
        let vals = values(&[("A1", "1")]);
        assert_eq!(evaluate("=MEDIAN(A1)", &vals), "#NAME?");
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let vals = values(&[]);
        assert_eq!(evaluate("=1+", &vals), "#ERROR!");
        assert_eq!(evaluate("=A1:A3", &vals), "#ERROR!");
    }

    #[test]
    fn test_invalid_range_is_ref_error() {
        let vals = values(&[]);
        assert_eq!(evaluate("=SUM(A0:A3)", &vals), "#REF!");
    }

    #[test]
    fn test_negative_aggregate_result_substitutes_cleanly() {
        let vals = values(&[("A1", "-10"), ("A2", "-20")]);
        assert_eq!(evaluate("=5-SUM(A1:A2)", &vals), "35");
    }

    #[test]
    fn test_evaluator_is_pure() {
        let vals = values(&[("A1", "7")]);
        let first = evaluate("=A1*3", &vals);
        let second = evaluate("=A1*3", &vals);
        assert_eq!(first, second);
    }
}
