use crate::core::config::BaseMetricNames;
use crate::core::field::{CustomFieldDefinition, FieldDataType, FieldId, FieldKind, FieldValue};
use crate::core::position::HedgePosition;
use crate::formula::dependency::{formula_references, DependencyGraph};
use crate::formula::expression::{evaluate, ExpressionError};
use log::debug;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

/// Why a calculated field has no value for a position.
#[derive(Debug, Error, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldIssue {
    #[error("calculated field has no formula")]
    NoFormula,
    #[error("field is part of a dependency cycle")]
    Cyclic,
    #[error("depends on unresolved field {dependency:?}")]
    Blocked { dependency: String },
    #[error("no numeric value for {name:?}")]
    MissingInput { name: String },
    #[error("invalid expression: {error}")]
    Invalid { error: ExpressionError },
}

/// Custom field values for one position plus the calculated fields that
/// could not be resolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldResolution {
    pub values: BTreeMap<FieldId, FieldValue>,
    pub issues: BTreeMap<FieldId, FieldIssue>,
}

impl FieldResolution {
    pub fn value(&self, id: &FieldId) -> Option<&FieldValue> {
        self.values.get(id)
    }

    pub fn is_complete(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Resolves calculated custom fields for a position.
///
/// The formula row is seeded with the position's base metrics and every
/// numeric manual field, keyed by *name*. Calculated fields are then
/// evaluated in dependency order; each one resolved becomes available to
/// the formulas that reference it.
///
/// # Examples
///
/// ```
/// use hedge_mtm_engine::core::field::{CustomFieldDefinition, FieldId, FieldValue};
/// use hedge_mtm_engine::core::position::{HedgePosition, Side};
/// use hedge_mtm_engine::formula::engine::CustomFieldFormulaEngine;
/// use chrono::NaiveDate;
/// use rust_decimal_macros::dec;
///
/// let date = |m, d| NaiveDate::from_ymd_opt(2024, m, d).unwrap();
/// let position = HedgePosition::new(
///     "H-1", "DLR/FEB24", Side::Sold, dec!(100_000),
///     date(1, 2), date(2, 25), dec!(1080),
/// ).unwrap();
/// let defs = vec![CustomFieldDefinition::calculated("f", "Notional", "{Monto USD}")];
///
/// let resolved = CustomFieldFormulaEngine::default().resolve(&position, &defs);
/// assert_eq!(
///     resolved.value(&FieldId::new("f")),
///     Some(&FieldValue::Number(dec!(100_000)))
/// );
/// ```
#[derive(Debug, Clone, Default)]
pub struct CustomFieldFormulaEngine {
    metrics: BaseMetricNames,
}

impl CustomFieldFormulaEngine {
    pub fn new(metrics: BaseMetricNames) -> Self {
        Self { metrics }
    }

    pub fn resolve(
        &self,
        position: &HedgePosition,
        definitions: &[CustomFieldDefinition],
    ) -> FieldResolution {
        let mut resolution = FieldResolution::default();
        let mut row = self.base_row(position);

        for def in definitions.iter().filter(|d| d.kind == FieldKind::Manual) {
            let Some(value) = position.custom_field_values().get(&def.id) else {
                continue;
            };
            if def.data_type == FieldDataType::Number {
                if let Some(number) = value.as_number() {
                    row.insert(def.name.clone(), number);
                }
            }
            resolution.values.insert(def.id.clone(), value.clone());
        }

        let calculated: Vec<&CustomFieldDefinition> =
            definitions.iter().filter(|d| d.is_calculated()).collect();
        let graph = DependencyGraph::build(&calculated);
        let mut resolved: HashSet<usize> = HashSet::new();

        for &idx in graph.evaluation_order() {
            let def = calculated[idx];
            let outcome = if graph.is_cyclic(idx) {
                Err(FieldIssue::Cyclic)
            } else {
                self.evaluate_field(def, &graph, &resolved, &row)
            };

            match outcome {
                Ok(value) => {
                    if graph.field_named(&def.name) == Some(idx) {
                        row.insert(def.name.clone(), value);
                    }
                    resolved.insert(idx);
                    resolution
                        .values
                        .insert(def.id.clone(), FieldValue::Number(value));
                }
                Err(issue) => {
                    debug!(
                        "position {}: field {:?} unresolved: {}",
                        position.id(),
                        def.name,
                        issue
                    );
                    resolution.issues.insert(def.id.clone(), issue);
                }
            }
        }

        resolution
    }

    fn base_row(&self, position: &HedgePosition) -> HashMap<String, Decimal> {
        let mut row = HashMap::new();
        row.insert(self.metrics.notional.clone(), position.notional_usd());
        row.insert(self.metrics.agreed_rate.clone(), position.agreed_rate());
        if let Some(rate) = position.close_rate() {
            row.insert(self.metrics.close_rate.clone(), rate);
        }
        row
    }

    fn evaluate_field(
        &self,
        def: &CustomFieldDefinition,
        graph: &DependencyGraph,
        resolved: &HashSet<usize>,
        row: &HashMap<String, Decimal>,
    ) -> Result<Decimal, FieldIssue> {
        let formula = match def.formula.as_deref() {
            Some(f) if !f.trim().is_empty() => f,
            _ => return Err(FieldIssue::NoFormula),
        };

        for name in formula_references(formula) {
            if let Some(dep) = graph.field_named(name) {
                if !resolved.contains(&dep) {
                    return Err(FieldIssue::Blocked {
                        dependency: name.to_string(),
                    });
                }
            }
        }

        let expression = substitute(formula, row)?;
        evaluate(&expression).map_err(|error| FieldIssue::Invalid { error })
    }
}

/// Replace every `{name}` token with its value from `row`.
fn substitute(formula: &str, row: &HashMap<String, Decimal>) -> Result<String, FieldIssue> {
    let mut out = String::with_capacity(formula.len());
    let mut rest = formula;
    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            break;
        };
        let name = &after[..close];
        let value = row.get(name).ok_or_else(|| FieldIssue::MissingInput {
            name: name.to_string(),
        })?;
        out.push_str(&rest[..open]);
        out.push_str(&value.to_string());
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::position::Side;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, m, d).unwrap()
    }

    fn position() -> HedgePosition {
        HedgePosition::new(
            "H-1",
            "DLR/FEB24",
            Side::Sold,
            dec!(100_000),
            date(1, 2),
            date(2, 25),
            dec!(1080),
        )
        .unwrap()
        .with_custom_value("fee", FieldValue::Number(dec!(250)))
        .with_custom_value("broker", FieldValue::from("ACME"))
        .with_custom_value("bps", FieldValue::from("12.5"))
    }

    fn manual_defs() -> Vec<CustomFieldDefinition> {
        vec![
            CustomFieldDefinition::manual("fee", "Comision", FieldDataType::Number),
            CustomFieldDefinition::manual("broker", "Broker", FieldDataType::Text),
            CustomFieldDefinition::manual("bps", "Spread", FieldDataType::Number),
        ]
    }

    fn number(res: &FieldResolution, id: &str) -> Option<Decimal> {
        res.value(&FieldId::new(id)).and_then(|v| v.as_number())
    }

    #[test]
    fn test_notional_round_trip() {
        let defs = vec![CustomFieldDefinition::calculated("n", "N", "{Monto USD}")];
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);
        assert_eq!(number(&res, "n"), Some(dec!(100_000)));
        assert!(res.is_complete());
    }

    #[test]
    fn test_manual_fields_feed_formulas() {
        let mut defs = manual_defs();
        defs.push(CustomFieldDefinition::calculated(
            "net",
            "Neto",
            "{Monto USD} * {Tipo de Cambio} - {Comision}",
        ));
        defs.push(CustomFieldDefinition::calculated("s", "S", "{Spread} * 2"));
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);

        assert_eq!(number(&res, "net"), Some(dec!(107_999_750)));
        assert_eq!(number(&res, "s"), Some(dec!(25)));
        assert_eq!(
            res.value(&FieldId::new("broker")),
            Some(&FieldValue::from("ACME"))
        );
    }

    #[test]
    fn test_text_field_is_not_numeric_input() {
        let mut defs = manual_defs();
        defs.push(CustomFieldDefinition::calculated("x", "X", "{Broker} + 1"));
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);
        assert_eq!(
            res.issues.get(&FieldId::new("x")),
            Some(&FieldIssue::MissingInput {
                name: "Broker".to_string()
            })
        );
    }

    #[test]
    fn test_close_rate_metric_only_when_present() {
        let defs = vec![CustomFieldDefinition::calculated(
            "gain",
            "Gain",
            "({Tipo de Cambio} - {Tipo de Cambio Cierre}) * {Monto USD}",
        )];
        let engine = CustomFieldFormulaEngine::default();

        let open = engine.resolve(&position(), &defs);
        assert!(matches!(
            open.issues.get(&FieldId::new("gain")),
            Some(FieldIssue::MissingInput { .. })
        ));

        let closed = engine.resolve(
            &position().with_close(date(1, 20), Some(dec!(1060))),
            &defs,
        );
        assert_eq!(number(&closed, "gain"), Some(dec!(2_000_000)));
    }

    #[test]
    fn test_chain_declared_out_of_order() {
        let defs = vec![
            CustomFieldDefinition::calculated("c", "C", "{B} * 2"),
            CustomFieldDefinition::calculated("b", "B", "{A} + 1"),
            CustomFieldDefinition::calculated("a", "A", "{Monto USD} / 1000"),
        ];
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);
        assert_eq!(number(&res, "a"), Some(dec!(100)));
        assert_eq!(number(&res, "b"), Some(dec!(101)));
        assert_eq!(number(&res, "c"), Some(dec!(202)));
    }

    #[test]
    fn test_cycle_and_dependents_reported() {
        let defs = vec![
            CustomFieldDefinition::calculated("a", "A", "{B} + 1"),
            CustomFieldDefinition::calculated("b", "B", "{A} + 1"),
            CustomFieldDefinition::calculated("c", "C", "{A} * 2"),
            CustomFieldDefinition::calculated("d", "D", "3"),
        ];
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);
        assert_eq!(res.issues.get(&FieldId::new("a")), Some(&FieldIssue::Cyclic));
        assert_eq!(res.issues.get(&FieldId::new("b")), Some(&FieldIssue::Cyclic));
        assert_eq!(
            res.issues.get(&FieldId::new("c")),
            Some(&FieldIssue::Blocked {
                dependency: "A".to_string()
            })
        );
        assert_eq!(number(&res, "d"), Some(dec!(3)));
    }

    #[test]
    fn test_invalid_expressions_do_not_abort_others() {
        let defs = vec![
            CustomFieldDefinition::calculated("bad", "Bad", "{Monto USD} / 0"),
            CustomFieldDefinition::calculated("inj", "Inj", "process.exit()"),
            CustomFieldDefinition {
                formula: None,
                ..CustomFieldDefinition::calculated("none", "None", "")
            },
            CustomFieldDefinition::calculated("ok", "Ok", "{Monto USD} + 1"),
        ];
        let res = CustomFieldFormulaEngine::default().resolve(&position(), &defs);
        assert!(matches!(
            res.issues.get(&FieldId::new("bad")),
            Some(FieldIssue::Invalid {
                error: ExpressionError::DivisionByZero
            })
        ));
        assert!(matches!(
            res.issues.get(&FieldId::new("inj")),
            Some(FieldIssue::Invalid {
                error: ExpressionError::DisallowedCharacter(_)
            })
        ));
        assert_eq!(res.issues.get(&FieldId::new("none")), Some(&FieldIssue::NoFormula));
        assert_eq!(number(&res, "ok"), Some(dec!(100_001)));
    }

    #[test]
    fn test_custom_metric_names() {
        let engine = CustomFieldFormulaEngine::new(BaseMetricNames {
            notional: "Notional".to_string(),
            ..BaseMetricNames::default()
        });
        let defs = vec![CustomFieldDefinition::calculated("n", "N", "{Notional}")];
        assert_eq!(
            number(&engine.resolve(&position(), &defs), "n"),
            Some(dec!(100_000))
        );
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let mut defs = manual_defs();
        defs.push(CustomFieldDefinition::calculated("x", "X", "{Comision} / 3"));
        let engine = CustomFieldFormulaEngine::default();
        assert_eq!(
            engine.resolve(&position(), &defs),
            engine.resolve(&position(), &defs)
        );
    }
}
