//! ---
//! ems_section: "11-simulation-test-harness"
//! ems_subsection: "module"
//! ems_type: "source"
//! ems_scope: "code"
//! ems_description: "Parser for formula declarations embedded in point names."
//! ems_version: "v0.0.0-prealpha"
//! ems_owner: "tbd"
//! ---
use std::collections::BTreeSet;

use r_player_model::SIMULATION_MARKER;

use crate::errors::FormulaError;
use crate::expression::Expression;

/// Reserved variable bound to the fractional second of the wall clock.
pub const TIME_VARIABLE: &str = "t";

/// A parsed `#name(var1,var2)[hz]:expression` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct FormulaDeclaration {
    pub display_name: String,
    pub free_variables: BTreeSet<String>,
    pub update_frequency_hz: u32,
    pub expression: Expression,
}

impl FormulaDeclaration {
    /// Variables that must be supplied by other measurement points.
    pub fn point_variables(&self) -> impl Iterator<Item = &str> + '_ {
        self.free_variables
            .iter()
            .map(String::as_str)
            .filter(|name| *name != TIME_VARIABLE)
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_alphabetic() || first == '_' => {
            chars.all(|c| c.is_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

/// Parse a configured point name carrying a formula declaration.
pub fn parse_declaration(raw: &str) -> Result<FormulaDeclaration, FormulaError> {
    let rest = raw
        .trim()
        .strip_prefix(SIMULATION_MARKER)
        .ok_or(FormulaError::MissingMarker)?;

    let open = rest.find('(').ok_or(FormulaError::MissingVariableList)?;
    let display_name = rest[..open].trim();
    if display_name.is_empty() {
        return Err(FormulaError::EmptyDisplayName);
    }
    let rest = &rest[open + 1..];
    let close = rest.find(')').ok_or(FormulaError::MissingVariableList)?;
    let mut free_variables = BTreeSet::new();
    for variable in rest[..close].split(',').map(str::trim) {
        if variable.is_empty() && close == 0 {
            break;
        }
        if !is_identifier(variable) {
            return Err(FormulaError::InvalidVariable(variable.to_owned()));
        }
        free_variables.insert(variable.to_owned());
    }

    let rest = rest[close + 1..]
        .trim_start()
        .strip_prefix('[')
        .ok_or(FormulaError::MissingFrequency)?;
    let close = rest.find(']').ok_or(FormulaError::MissingFrequency)?;
    let frequency = rest[..close].trim();
    let update_frequency_hz = frequency
        .parse::<u32>()
        .ok()
        .filter(|hz| *hz > 0 && frequency.chars().all(|c| c.is_ascii_digit()))
        .ok_or_else(|| FormulaError::InvalidFrequency(frequency.to_owned()))?;

    let body = rest[close + 1..]
        .trim_start()
        .strip_prefix(':')
        .ok_or(FormulaError::MissingExpression)?;
    if body.trim().is_empty() {
        return Err(FormulaError::MissingExpression);
    }
    let expression = Expression::parse(body, &free_variables)?;

    Ok(FormulaDeclaration {
        display_name: display_name.to_owned(),
        free_variables,
        update_frequency_hz,
        expression,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ExpressionError;

    #[test]
    fn parses_time_only_formula() {
        let decl = parse_declaration("#calc(t)[10]:sin(2*t)").unwrap();
        assert_eq!(decl.display_name, "calc");
        assert_eq!(decl.free_variables, BTreeSet::from(["t".to_owned()]));
        assert_eq!(decl.update_frequency_hz, 10);
        assert_eq!(decl.expression.source(), "sin(2*t)");
        assert_eq!(decl.point_variables().count(), 0);
    }

    #[test]
    fn parses_point_variables_and_whitespace() {
        let decl = parse_declaration("#power( t , Line1_Sensor1_Current )[ 5 ] : 230 * Line1_Sensor1_Current")
            .unwrap();
        assert_eq!(decl.display_name, "power");
        let vars: Vec<_> = decl.point_variables().collect();
        assert_eq!(vars, vec!["Line1_Sensor1_Current"]);
        assert_eq!(decl.update_frequency_hz, 5);
    }

    #[test]
    fn constant_formula_without_variables() {
        let decl = parse_declaration("#one()[1]:1").unwrap();
        assert!(decl.free_variables.is_empty());
    }

    #[test]
    fn reports_each_malformed_part() {
        assert_eq!(parse_declaration("calc(t)[1]:t"), Err(FormulaError::MissingMarker));
        assert_eq!(parse_declaration("#(t)[1]:t"), Err(FormulaError::EmptyDisplayName));
        assert_eq!(parse_declaration("#calc[1]:t"), Err(FormulaError::MissingVariableList));
        assert_eq!(parse_declaration("#calc(t,)[1]:t"), Err(FormulaError::InvalidVariable(String::new())));
        assert_eq!(parse_declaration("#calc(t):t"), Err(FormulaError::MissingFrequency));
        assert_eq!(
            parse_declaration("#calc(t)[fast]:t"),
            Err(FormulaError::InvalidFrequency("fast".into()))
        );
        assert_eq!(
            parse_declaration("#calc(t)[0]:t"),
            Err(FormulaError::InvalidFrequency("0".into()))
        );
        assert_eq!(parse_declaration("#calc(t)[1]"), Err(FormulaError::MissingExpression));
        assert_eq!(parse_declaration("#calc(t)[1]:  "), Err(FormulaError::MissingExpression));
        assert_eq!(
            parse_declaration("#calc(t)[1]:x*t"),
            Err(FormulaError::Expression(ExpressionError::UnknownVariable("x".into())))
        );
    }
}
