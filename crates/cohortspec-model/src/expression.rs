//! Boolean expressions over other variables, used by `satisfying`

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    NotEq,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    LtEq,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    GtEq,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
        }
    }

    /// Ordering comparisons only make sense for numbers and dates
    pub fn is_ordering(&self) -> bool {
        !matches!(self, CompareOp::Eq | CompareOp::NotEq)
    }
}

/// Right-hand side of a comparison
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Literal {
    Number(f64),
    String(String),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{}", n),
            Literal::String(s) if s.contains('\'') => write!(f, "\"{}\"", s),
            Literal::String(s) => write!(f, "'{}'", s),
        }
    }
}

/// Expression tree of a `satisfying` definition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PopulationExpr {
    /// A variable used as a boolean
    Variable { name: String },
    Not { operand: Box<PopulationExpr> },
    And { left: Box<PopulationExpr>, right: Box<PopulationExpr> },
    Or { left: Box<PopulationExpr>, right: Box<PopulationExpr> },
    Compare {
        variable: String,
        op: CompareOp,
        value: Literal,
    },
}

impl PopulationExpr {
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable { name: name.into() }
    }

    pub fn not(operand: PopulationExpr) -> Self {
        Self::Not {
            operand: Box::new(operand),
        }
    }

    pub fn and(left: PopulationExpr, right: PopulationExpr) -> Self {
        Self::And {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn or(left: PopulationExpr, right: PopulationExpr) -> Self {
        Self::Or {
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    pub fn compare(variable: impl Into<String>, op: CompareOp, value: Literal) -> Self {
        Self::Compare {
            variable: variable.into(),
            op,
            value,
        }
    }

    /// Names of every variable the expression reads
    pub fn referenced_variables(&self) -> BTreeSet<&str> {
        let mut names = BTreeSet::new();
        self.collect_variables(&mut names);
        names
    }

    fn collect_variables<'a>(&'a self, names: &mut BTreeSet<&'a str>) {
        match self {
            PopulationExpr::Variable { name } => {
                names.insert(name);
            }
            PopulationExpr::Compare { variable, .. } => {
                names.insert(variable);
            }
            PopulationExpr::Not { operand } => operand.collect_variables(names),
            PopulationExpr::And { left, right } | PopulationExpr::Or { left, right } => {
                left.collect_variables(names);
                right.collect_variables(names);
            }
        }
    }

    fn precedence(&self) -> u8 {
        match self {
            PopulationExpr::Or { .. } => 1,
            PopulationExpr::And { .. } => 2,
            PopulationExpr::Not { .. } => 3,
            PopulationExpr::Variable { .. } | PopulationExpr::Compare { .. } => 4,
        }
    }

    fn fmt_operand(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        if self.precedence() < parent {
            write!(f, "({})", self)
        } else {
            write!(f, "{}", self)
        }
    }
}

impl fmt::Display for PopulationExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PopulationExpr::Variable { name } => write!(f, "{}", name),
            PopulationExpr::Compare { variable, op, value } => {
                write!(f, "{} {} {}", variable, op.symbol(), value)
            }
            PopulationExpr::Not { operand } => {
                write!(f, "NOT ")?;
                operand.fmt_operand(f, 3)
            }
            PopulationExpr::And { left, right } => {
                left.fmt_operand(f, 2)?;
                write!(f, " AND ")?;
                right.fmt_operand(f, 3)
            }
            PopulationExpr::Or { left, right } => {
                left.fmt_operand(f, 1)?;
                write!(f, " OR ")?;
                right.fmt_operand(f, 2)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_referenced_variables() {
        let expr = PopulationExpr::and(
            PopulationExpr::variable("hf"),
            PopulationExpr::not(PopulationExpr::or(
                PopulationExpr::variable("dialysis"),
                PopulationExpr::compare("age", CompareOp::Lt, Literal::Number(18.0)),
            )),
        );

        let names: Vec<_> = expr.referenced_variables().into_iter().collect();
        assert_eq!(names, vec!["age", "dialysis", "hf"]);
    }

    #[test]
    fn test_display_parenthesises_by_precedence() {
        let expr = PopulationExpr::and(
            PopulationExpr::or(PopulationExpr::variable("a"), PopulationExpr::variable("b")),
            PopulationExpr::not(PopulationExpr::variable("c")),
        );
        assert_eq!(expr.to_string(), "(a OR b) AND NOT c");

        let cmp = PopulationExpr::compare("ethnicity", CompareOp::Eq, Literal::String("1".into()));
        assert_eq!(cmp.to_string(), "ethnicity = '1'");
    }
}
