//! Module: filter
//! Responsibility: the logical query expression tree handed to the scan
//! planner.
//! Does not own: range planning (scan) or any evaluation over stored rows.
//! Boundary: expressions reference fields by name; resolution against a
//! schema happens in the planner.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::ops::{BitAnd, BitOr, Bound, Not};

///
/// FilterExpr
///
/// Represents logical expressions for querying/filtering data.
///
/// Expressions can be:
/// - `True` or `False` constants
/// - Single clauses comparing a field with a value
/// - Half-open or closed ranges over one field
/// - Composite expressions: `And`, `Or`, and negation `Not`.
///

#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterExpr {
    #[default]
    True,
    False,
    Clause(FilterClause),
    Range {
        field: String,
        lower: Bound<Value>,
        upper: Bound<Value>,
    },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
}

impl FilterExpr {
    // --- Clause ---

    /// Create a single clause: `field cmp value`.
    pub fn clause(field: impl Into<String>, cmp: FilterCmp, value: impl Into<Value>) -> Self {
        Self::Clause(FilterClause::new(field, cmp, value))
    }

    // --- Equality ---

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Eq, value)
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Ne, value)
    }

    // --- Ordering ---

    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Lt, value)
    }

    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Lte, value)
    }

    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Gt, value)
    }

    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::clause(field, FilterCmp::Gte, value)
    }

    // --- Range ---

    /// Bound one field on both sides at once.
    pub fn range(
        field: impl Into<String>,
        lower: Bound<impl Into<Value>>,
        upper: Bound<impl Into<Value>>,
    ) -> Self {
        Self::Range {
            field: field.into(),
            lower: lower.map(Into::into),
            upper: upper.map(Into::into),
        }
    }

    // --- Membership ---

    pub fn value_in<I>(field: impl Into<String>, vals: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Value>,
    {
        Self::clause(
            field,
            FilterCmp::In,
            Value::List(vals.into_iter().map(Into::into).collect()),
        )
    }

    /// Combine two expressions into an `And` expression.
    ///
    /// This flattens nested `And`s to avoid deep nesting (e.g., `(a AND b) AND c` becomes `AND[a,b,c]`).
    #[must_use]
    pub fn and(self, other: Self) -> Self {
        match (self, other) {
            (Self::And(mut a), Self::And(mut b)) => {
                a.append(&mut b);
                Self::And(a)
            }
            (Self::And(mut a), b) => {
                a.push(b);
                Self::And(a)
            }
            (a, Self::And(mut b)) => {
                let mut list = vec![a];
                list.append(&mut b);
                Self::And(list)
            }
            (a, b) => Self::And(vec![a, b]),
        }
    }

    /// Negate this expression.
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }

    /// Combine two expressions into an `Or` expression,
    /// flattening nested `Or`s similarly to `and`.
    #[must_use]
    pub fn or(self, other: Self) -> Self {
        match (self, other) {
            (Self::Or(mut a), Self::Or(mut b)) => {
                a.append(&mut b);
                Self::Or(a)
            }
            (Self::Or(mut a), b) => {
                a.push(b);
                Self::Or(a)
            }
            (a, Self::Or(mut b)) => {
                let mut list = vec![a];
                list.append(&mut b);
                Self::Or(list)
            }
            (a, b) => Self::Or(vec![a, b]),
        }
    }

    /// Simplifies the logical expression recursively, applying rules like:
    /// - Eliminate double negation `NOT NOT x` -> `x`
    /// - Apply De Morgan's laws:
    ///   - `NOT (AND [a, b])` -> `OR [NOT a, NOT b]`
    ///   - `NOT (OR [a, b])` -> `AND [NOT a, NOT b]`
    /// - Flatten nested `And` and `Or` expressions
    /// - Remove neutral elements:
    ///   - `AND [True, x]` -> `x`
    ///   - `OR [False, x]` -> `x`
    /// - Short circuit on constants:
    ///   - `AND` with `False` -> `False`
    ///   - `OR` with `True` -> `True`
    #[must_use]
    pub fn simplify(self) -> Self {
        match self {
            Self::Not(inner) => match *inner {
                Self::True => Self::False,
                Self::False => Self::True,
                Self::Not(inner2) => (*inner2).simplify(),
                Self::And(children) => {
                    // De Morgan's: NOT(AND(...)) == OR(NOT(...))
                    Self::Or(children.into_iter().map(|c| c.not().simplify()).collect())
                }
                Self::Or(children) => {
                    // De Morgan's: NOT(OR(...)) == AND(NOT(...))
                    Self::And(children.into_iter().map(|c| c.not().simplify()).collect())
                }
                x @ (Self::Clause(_) | Self::Range { .. }) => Self::Not(Box::new(x)),
            },

            Self::And(children) => {
                // Recursively simplify and flatten `And` children
                let flat = Self::simplify_children(children, |e| matches!(e, Self::And(_)));

                // If any child is `False`, whole AND is False (short circuit)
                if flat.iter().any(|e| matches!(e, Self::False)) {
                    Self::False
                } else {
                    // Remove neutral elements `True`
                    let filtered: Vec<_> = flat
                        .into_iter()
                        .filter(|e| !matches!(e, Self::True))
                        .collect();

                    // If empty after filtering, all were True -> return True
                    match filtered.len() {
                        0 => Self::True,
                        1 => filtered.into_iter().next().unwrap(),
                        _ => Self::And(filtered),
                    }
                }
            }

            Self::Or(children) => {
                // Recursively simplify and flatten `Or` children
                let flat = Self::simplify_children(children, |e| matches!(e, Self::Or(_)));

                // If any child is `True`, whole OR is True (short circuit)
                if flat.iter().any(|e| matches!(e, Self::True)) {
                    Self::True
                } else {
                    // Remove neutral elements `False`
                    let filtered: Vec<_> = flat
                        .into_iter()
                        .filter(|e| !matches!(e, Self::False))
                        .collect();

                    // If empty after filtering, all were False -> return False
                    match filtered.len() {
                        0 => Self::False,
                        1 => filtered.into_iter().next().unwrap(),
                        _ => Self::Or(filtered),
                    }
                }
            }

            // Clauses, ranges, and constants are already simplest forms
            x => x,
        }
    }

    /// Helper to simplify and flatten nested `And` or `Or` children.
    ///
    /// - `children`: the children expressions to simplify and flatten
    /// - `flatten_if`: a predicate to decide if the child should be flattened
    fn simplify_children(children: Vec<Self>, flatten_if: fn(&Self) -> bool) -> Vec<Self> {
        let mut flat = Vec::with_capacity(children.len());

        for child in children {
            let simplified = child.simplify();
            if flatten_if(&simplified) {
                if let Self::And(nested) | Self::Or(nested) = simplified {
                    flat.extend(nested);
                }
            } else {
                flat.push(simplified);
            }
        }

        flat
    }
}

///
/// Bit Operations
/// allow us to do | & and ! on expressions
///

impl BitAnd for FilterExpr {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitOr for FilterExpr {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl Not for FilterExpr {
    type Output = Self;

    fn not(self) -> Self::Output {
        Self::Not(Box::new(self))
    }
}

///
/// FilterCmp
/// comparison operator of one clause
///

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub enum FilterCmp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
}

///
/// FilterClause
/// represents a basic comparison expression: `field cmp value`
///

#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct FilterClause {
    pub field: String,
    pub cmp: FilterCmp,
    pub value: Value,
}

impl FilterClause {
    #[must_use]
    pub fn new(field: impl Into<String>, cmp: FilterCmp, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            cmp,
            value: value.into(),
        }
    }
}

///
/// TESTS
///

#[cfg(test)]
mod tests {
    use super::*;

    fn clause(field: &str) -> FilterExpr {
        FilterExpr::Clause(FilterClause::new(field, FilterCmp::Eq, "foo"))
    }

    #[test]
    fn constructors_cover_every_cmp() {
        fn assert_clause(expr: FilterExpr, field: &str, cmp: FilterCmp, value: Value) {
            match expr {
                FilterExpr::Clause(c) => {
                    assert_eq!(c.field, field);
                    assert_eq!(c.cmp, cmp);
                    assert_eq!(c.value, value);
                }
                _ => panic!("expected Clause"),
            }
        }

        assert_clause(FilterExpr::eq("a", 1i64), "a", FilterCmp::Eq, Value::Int(1));
        assert_clause(FilterExpr::ne("a", 1i64), "a", FilterCmp::Ne, Value::Int(1));
        assert_clause(FilterExpr::lt("a", 1i64), "a", FilterCmp::Lt, Value::Int(1));
        assert_clause(FilterExpr::lte("a", 1i64), "a", FilterCmp::Lte, Value::Int(1));
        assert_clause(FilterExpr::gt("a", 1i64), "a", FilterCmp::Gt, Value::Int(1));
        assert_clause(FilterExpr::gte("a", 1i64), "a", FilterCmp::Gte, Value::Int(1));

        assert_clause(
            FilterExpr::value_in("a", [1i64, 2i64]),
            "a",
            FilterCmp::In,
            Value::List(vec![Value::Int(1), Value::Int(2)]),
        );
    }

    #[test]
    fn range_builder_maps_bounds_into_values() {
        let expr = FilterExpr::range("id", Bound::Included(5u64), Bound::Excluded(10u64));

        match expr {
            FilterExpr::Range {
                field,
                lower,
                upper,
            } => {
                assert_eq!(field, "id");
                assert_eq!(lower, Bound::Included(Value::Uint(5)));
                assert_eq!(upper, Bound::Excluded(Value::Uint(10)));
            }
            _ => panic!("expected Range"),
        }
    }

    #[test]
    fn simplify_drops_neutral_true_from_and() {
        let expr = FilterExpr::And(vec![FilterExpr::True, clause("a")]);
        assert!(matches!(expr.simplify(), FilterExpr::Clause(_)));
    }

    #[test]
    fn simplify_short_circuits_and_on_false() {
        let expr = FilterExpr::And(vec![clause("a"), FilterExpr::False]);
        assert_eq!(expr.simplify(), FilterExpr::False);
    }

    #[test]
    fn simplify_eliminates_double_negation() {
        let expr = FilterExpr::Not(Box::new(FilterExpr::Not(Box::new(clause("x")))));
        let simplified = expr.simplify();
        assert!(matches!(simplified, FilterExpr::Clause(_)));
    }

    #[test]
    fn simplify_flattens_nested_and() {
        let expr = FilterExpr::And(vec![
            clause("a"),
            FilterExpr::And(vec![clause("b"), clause("c")]),
        ]);
        let simplified = expr.simplify();

        if let FilterExpr::And(children) = simplified {
            assert_eq!(children.len(), 3);
        } else {
            panic!("Expected And");
        }
    }

    #[test]
    fn simplify_applies_de_morgan_over_and() {
        let expr = FilterExpr::Not(Box::new(FilterExpr::And(vec![clause("a"), clause("b")])));
        let simplified = expr.simplify();
        if let FilterExpr::Or(children) = simplified {
            assert_eq!(children.len(), 2);
        } else {
            panic!("Expected Or");
        }
    }

    #[test]
    fn simplify_applies_de_morgan_over_or() {
        let expr = FilterExpr::Not(Box::new(FilterExpr::Or(vec![clause("a"), clause("b")])));
        let simplified = expr.simplify();
        if let FilterExpr::And(children) = simplified {
            assert_eq!(children.len(), 2);
        } else {
            panic!("Expected And");
        }
    }

    #[test]
    fn simplify_collapses_constant_only_groups() {
        let conjunction = FilterExpr::And(vec![FilterExpr::True, FilterExpr::True]);
        assert_eq!(conjunction.simplify(), FilterExpr::True);

        let disjunction = FilterExpr::Or(vec![FilterExpr::False, FilterExpr::False]);
        assert_eq!(disjunction.simplify(), FilterExpr::False);
    }

    #[test]
    fn simplify_negates_constants() {
        assert_eq!(
            FilterExpr::Not(Box::new(FilterExpr::True)).simplify(),
            FilterExpr::False
        );
        assert_eq!(
            FilterExpr::Not(Box::new(FilterExpr::False)).simplify(),
            FilterExpr::True
        );
    }

    #[test]
    fn simplify_keeps_negated_leaves_intact() {
        let expr = FilterExpr::Not(Box::new(clause("foo")));
        match expr.simplify() {
            FilterExpr::Not(boxed) => {
                assert!(matches!(*boxed, FilterExpr::Clause(_)));
            }
            _ => panic!("Expected Not"),
        }
    }

    // --- Operators: &, |, ! ---

    #[test]
    fn ops_bitor_bitand_not() {
        let f = (clause("a") & clause("b")) | !clause("c");
        match f {
            FilterExpr::Or(children) => {
                assert_eq!(children.len(), 2);
                match &children[0] {
                    FilterExpr::And(left) => assert_eq!(left.len(), 2),
                    _ => panic!("left should be And"),
                }
                assert!(matches!(&children[1], FilterExpr::Not(_)));
            }
            _ => panic!("expected Or at root"),
        }
    }

    #[test]
    fn and_flattening_via_ops() {
        let f = (clause("a") & (clause("b") & clause("c"))) & clause("d");
        match f {
            FilterExpr::And(children) => assert_eq!(children.len(), 4),
            _ => panic!("expected And"),
        }
    }

    #[test]
    fn or_flattening_via_ops() {
        let f = (clause("x") | (clause("y") | clause("z"))) | clause("w");
        match f {
            FilterExpr::Or(children) => assert_eq!(children.len(), 4),
            _ => panic!("expected Or"),
        }
    }
}
