//! Rule Compiler - turns authored rule rows into a sorted `RuleTable`.
//!
//! Compilation happens once, at load time:
//! 1. **Lex**: split each criteria/remember cell into codes, each code into parts
//! 2. **Interpret**: type the value (`timestamp`, `rule`, float, int, bool, string)
//! 3. **Build**: construct typed predicates and effects, or look up custom ones
//! 4. **Group**: bucket rules by `(concept, who)`
//! 5. **Sort**: order each bucket by descending specificity
//!
//! A row with any bad code is logged and skipped; the rest still load.

mod code;
mod table;

pub use code::*;
pub use table::*;

use std::collections::HashSet;
use std::path::Path;

use crate::effect::{Effect, EffectOp, FloatOperand};
use crate::error::{CodeError, CompileError, LoadError};
use crate::predicate::{Comparison, Predicate};
use crate::registry::CodeRegistry;
use crate::rule::Rule;

/// The outcome of compiling a whole table.
#[derive(Debug)]
pub struct CompiledRules {
    pub table: RuleTable,
    /// Every row that was refused, in row order.
    pub errors: Vec<CompileError>,
}

/// Compiles rule rows against a registry of custom codes.
#[derive(Debug, Clone)]
pub struct RuleCompiler {
    registry: CodeRegistry,
}

impl Default for RuleCompiler {
    fn default() -> Self {
        Self::new(CodeRegistry::with_builtins())
    }
}

impl RuleCompiler {
    pub fn new(registry: CodeRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &CodeRegistry {
        &self.registry
    }

    /// Compile one criteria code into a predicate.
    pub fn compile_criterion(&self, raw: &str, rule_id: i64) -> Result<Predicate, CodeError> {
        let (source, key, op, value) = match parse_code(raw, CRITERIA_OPERATORS)? {
            Code::Custom(name) => return self.registry.predicate(name),
            Code::Op {
                source,
                key,
                op,
                value,
            } => (source, key, op, value),
        };
        let comparison = Comparison::from_operator(op).ok_or(CodeError::MissingOperator {
            expected: "= > < !",
        })?;

        let predicate = match interpret_value(value, rule_id)? {
            Literal::Timestamp => Predicate::compare_now(key, source, comparison),
            Literal::Int(v) => Predicate::compare(key, source, comparison, v),
            Literal::Float(v) => Predicate::compare(key, source, comparison, v),
            Literal::Str(v) => Predicate::compare(key, source, comparison, v),
            Literal::Bool(v) => match comparison {
                Comparison::Equal | Comparison::NotEqual => {
                    Predicate::compare(key, source, comparison, v)
                }
                _ => return Err(CodeError::UnsupportedOperator { op, kind: "bool" }),
            },
        };
        Ok(predicate)
    }

    /// Compile one remember code into an effect.
    pub fn compile_effect(&self, raw: &str, rule_id: i64) -> Result<Effect, CodeError> {
        let (source, key, op, value) = match parse_code(raw, REMEMBER_OPERATORS)? {
            Code::Custom(name) => return self.registry.effect(name),
            Code::Op {
                source,
                key,
                op,
                value,
            } => (source, key, op, value),
        };
        if source.is_read_only() {
            return Err(CodeError::ReadOnlyTarget(source));
        }
        let effect_op = EffectOp::from_operator(op).ok_or(CodeError::MissingOperator {
            expected: "= + - * /",
        })?;

        let literal = interpret_value(value, rule_id)?;
        match (literal, effect_op) {
            (Literal::Timestamp, _) => Ok(Effect::float(key, source, effect_op, FloatOperand::Now)),
            (Literal::Float(v), _) => Ok(Effect::float(
                key,
                source,
                effect_op,
                FloatOperand::Literal(v),
            )),
            (Literal::Int(v), _) => Effect::int(key, source, effect_op, v),
            (Literal::Bool(v), EffectOp::Set) => Ok(Effect::set(key, source, v)),
            (Literal::Str(v), EffectOp::Set) => Ok(Effect::set(key, source, v)),
            (literal, _) => Err(CodeError::UnsupportedOperator {
                op,
                kind: literal.kind(),
            }),
        }
    }

    /// Compile a single row into a rule.
    pub fn compile_row(&self, row: &RuleRow) -> Result<Rule, CompileError> {
        let code_error = |code: &str, cause: CodeError| CompileError::Code {
            rule_id: row.id,
            code: code.to_string(),
            cause,
        };

        let predicates = split_codes(&row.criteria)
            .map(|code| {
                self.compile_criterion(code, row.id)
                    .map_err(|cause| code_error(code, cause))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let effects = split_codes(&row.remember)
            .map(|code| {
                self.compile_effect(code, row.id)
                    .map_err(|cause| code_error(code, cause))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut rule = Rule::new(row.id, &row.concept, &row.who, &row.response)
            .with_predicates(predicates)
            .with_effects(effects);

        if let Some(cooldown) = row.cooldown {
            if !cooldown.is_finite() || cooldown < 0.0 {
                return Err(CompileError::InvalidCooldown {
                    rule_id: row.id,
                    cooldown,
                });
            }
            rule = rule.with_cooldown(cooldown);
        }

        Ok(rule)
    }

    /// Compile every row into a table.
    ///
    /// Refused rows are logged and reported back; they never stop the rest
    /// of the table from loading. A row reusing an accepted id is refused.
    pub fn compile(&self, rows: &[RuleRow]) -> CompiledRules {
        let mut table = RuleTable::new();
        let mut errors = Vec::new();
        let mut ids = HashSet::new();

        for row in rows {
            let compiled = if ids.contains(&row.id) {
                Err(CompileError::DuplicateId(row.id))
            } else {
                self.compile_row(row)
            };

            match compiled {
                Ok(rule) => {
                    ids.insert(rule.id());
                    table.push(rule);
                }
                Err(e) => {
                    tracing::warn!(rule_id = e.rule_id(), "Skipping rule: {}", e);
                    errors.push(e);
                }
            }
        }

        table.sort_buckets();
        tracing::debug!(
            rules = table.len(),
            skipped = errors.len(),
            "Compiled rule table"
        );

        CompiledRules { table, errors }
    }

    /// Compile a TOML rule document.
    pub fn compile_toml(&self, src: &str) -> Result<CompiledRules, LoadError> {
        Ok(self.compile(&rows_from_toml(src)?))
    }

    /// Compile a JSON rule document.
    pub fn compile_json(&self, src: &str) -> Result<CompiledRules, LoadError> {
        Ok(self.compile(&rows_from_json(src)?))
    }

    /// Compile a `.toml` or `.json` rule file.
    pub fn compile_file(&self, path: impl AsRef<Path>) -> Result<CompiledRules, LoadError> {
        Ok(self.compile(&load_rows(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use npc_state::{EntityMemories, Query, QueryArgs, StateMap, StateSource};

    fn compiler() -> RuleCompiler {
        RuleCompiler::default()
    }

    fn eval(predicate: &Predicate, event: StateMap, memory: &mut StateMap) -> bool {
        let args = QueryArgs::new("SeeObject", "Player").with_event(event);
        let mut world = StateMap::new();
        let mut targets = EntityMemories::new();
        let mut query = Query::new(&args, memory, &mut world, &mut targets, 30.0);
        predicate.eval(&mut query)
    }

    fn fire(effect: &Effect, memory: &mut StateMap) {
        let args = QueryArgs::new("SeeObject", "Player");
        let mut world = StateMap::new();
        let mut targets = EntityMemories::new();
        let mut query = Query::new(&args, memory, &mut world, &mut targets, 30.0);
        effect.apply(&mut query).unwrap();
    }

    #[test]
    fn test_string_criterion() {
        let pred = compiler().compile_criterion("e TargetName = Barrel", 1).unwrap();
        let mut memory = StateMap::new();
        assert!(eval(&pred, StateMap::new().with("TargetName", "Barrel"), &mut memory));
        assert!(!eval(&pred, StateMap::new().with("TargetName", "Crate"), &mut memory));
    }

    #[test]
    fn test_typed_criteria() {
        let c = compiler();
        let mut memory = StateMap::new()
            .with("SeenBarrels", 3)
            .with("Fear", 0.75)
            .with("Brave", true);

        assert!(eval(&c.compile_criterion("m SeenBarrels > 2", 1).unwrap(), StateMap::new(), &mut memory));
        assert!(eval(&c.compile_criterion("m SeenBarrels ! 0", 1).unwrap(), StateMap::new(), &mut memory));
        assert!(eval(&c.compile_criterion("m Fear < 1.0", 1).unwrap(), StateMap::new(), &mut memory));
        assert!(eval(&c.compile_criterion("m Brave = true", 1).unwrap(), StateMap::new(), &mut memory));
        assert!(!eval(&c.compile_criterion("m Brave != true", 1).unwrap(), StateMap::new(), &mut memory));
    }

    #[test]
    fn test_rule_and_timestamp_criteria() {
        let c = compiler();
        let mut memory = StateMap::new().with("LastRule", 12).with("LastSeen", 10.0);

        assert!(eval(&c.compile_criterion("m LastRule = rule", 12).unwrap(), StateMap::new(), &mut memory));
        assert!(!eval(&c.compile_criterion("m LastRule = rule", 13).unwrap(), StateMap::new(), &mut memory));
        // Query time is 30.0
        assert!(eval(&c.compile_criterion("m LastSeen < timestamp", 1).unwrap(), StateMap::new(), &mut memory));
    }

    #[test]
    fn test_bool_ordering_is_rejected() {
        assert_eq!(
            compiler().compile_criterion("m Brave > true", 1).unwrap_err(),
            CodeError::UnsupportedOperator { op: '>', kind: "bool" }
        );
    }

    #[test]
    fn test_custom_criterion() {
        let c = compiler();
        assert!(c.compile_criterion("TargetNotSeen", 1).is_ok());
        assert_eq!(
            c.compile_criterion("NoSuchThing", 1).unwrap_err(),
            CodeError::UnknownPredicate("NoSuchThing".into())
        );
    }

    #[test]
    fn test_effects() {
        let c = compiler();
        let mut memory = StateMap::new();

        fire(&c.compile_effect("m SeenBarrels + 1", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m SeenBarrels + 1", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m Fear = 2.0", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m Fear * 1.5", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m LastComment = timestamp", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m LastRule = rule", 9).unwrap(), &mut memory);
        fire(&c.compile_effect("m Mood = calm", 1).unwrap(), &mut memory);
        fire(&c.compile_effect("m Calm = true", 1).unwrap(), &mut memory);

        assert_eq!(memory.get_as::<i64>("SeenBarrels"), Some(2));
        assert_eq!(memory.get_as::<f64>("Fear"), Some(3.0));
        assert_eq!(memory.get_as::<f64>("LastComment"), Some(30.0));
        assert_eq!(memory.get_as::<i64>("LastRule"), Some(9));
        assert_eq!(memory.get_as::<String>("Mood"), Some("calm".into()));
        assert_eq!(memory.get_as::<bool>("Calm"), Some(true));
    }

    #[test]
    fn test_effect_errors() {
        let c = compiler();
        assert_eq!(
            c.compile_effect("m Count * 2", 1).unwrap_err(),
            CodeError::IntegerMultiplicative("multiplication")
        );
        assert_eq!(
            c.compile_effect("m Count / 2", 1).unwrap_err(),
            CodeError::IntegerMultiplicative("division")
        );
        assert_eq!(
            c.compile_effect("m Mood + calm", 1).unwrap_err(),
            CodeError::UnsupportedOperator { op: '+', kind: "string" }
        );
        assert_eq!(
            c.compile_effect("e TargetName = Crate", 1).unwrap_err(),
            CodeError::ReadOnlyTarget(StateSource::Event)
        );
        assert_eq!(
            c.compile_effect("q Count = 1", 1).unwrap_err(),
            CodeError::UnknownSource('q')
        );
        assert!(c.compile_effect("MarkTargetSeen", 1).is_ok());
    }

    #[test]
    fn test_compile_row() {
        let row = RuleRow::new(1, "SeeObject", "Player", "Oh look! A barrel!")
            .with_criteria(&["e TargetName = Barrel", "m SeenBarrels = 0"])
            .with_remember(&["m SeenBarrels + 1"]);

        let rule = compiler().compile_row(&row).unwrap();
        assert_eq!(rule.num_criteria(), 2);
        assert_eq!(rule.effects().len(), 1);
        assert!(rule.is_one_shot());
    }

    #[test]
    fn test_bad_rows_are_skipped() {
        let rows = vec![
            RuleRow::new(1, "SeeObject", "Player", "good").with_criteria(&["e TargetName = Barrel"]),
            RuleRow::new(2, "SeeObject", "Player", "bad source").with_criteria(&["z Key = 1"]),
            RuleRow::new(3, "SeeObject", "Player", "int multiply").with_remember(&["m Count * 2"]),
            RuleRow::new(1, "SeeObject", "Player", "duplicate id"),
            RuleRow::new(4, "SeeObject", "Player", "bad cooldown").with_cooldown(-1.0),
            RuleRow::new(5, "Hurt", "Guard", "Ow!").with_cooldown(2.0),
        ];

        let compiled = compiler().compile(&rows);

        assert_eq!(compiled.table.len(), 2);
        assert!(compiled.table.get(1).is_some());
        assert!(compiled.table.get(5).is_some());

        let refused: Vec<_> = compiled.errors.iter().map(CompileError::rule_id).collect();
        assert_eq!(refused, vec![2, 3, 1, 4]);
        assert_eq!(compiled.errors[2], CompileError::DuplicateId(1));
        assert!(matches!(
            &compiled.errors[0],
            CompileError::Code { code, cause: CodeError::UnknownSource('z'), .. } if code == "z Key = 1"
        ));
    }

    #[test]
    fn test_compile_sorts_buckets() {
        let rows = vec![
            RuleRow::new(1, "SeeObject", "Player", "A thing.").with_criteria(&["e TargetName = Barrel"]),
            RuleRow::new(2, "SeeObject", "Player", "Oh look! A barrel!")
                .with_criteria(&["e TargetName = Barrel", "m SeenBarrels = 0"]),
        ];

        let compiled = compiler().compile(&rows);
        let ids: Vec<_> = compiled
            .table
            .bucket("SeeObject", "Player")
            .iter()
            .map(Rule::id)
            .collect();
        assert_eq!(ids, vec![2, 1]);
    }

    #[test]
    fn test_compile_toml_document() {
        let src = r#"
            [[rule]]
            Id = 1
            Concept = "SeeObject"
            Who = "Player"
            Response = "Oh look! A barrel!"
            Criteria = "e TargetName = Barrel"
        "#;

        let compiled = compiler().compile_toml(src).unwrap();
        assert!(compiled.errors.is_empty());
        assert_eq!(compiled.table.bucket("SeeObject", "Player").len(), 1);
    }
}
