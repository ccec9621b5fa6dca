use std::fmt;

use chrono::{Datelike, NaiveDate};

/// Parse tree of the lambda-form notation. Built once per utterance by the
/// parser, consumed once by the semantic analyzer, then discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum LambdaForm {
    /// A bare identifier, typically a namespaced tag like `tt:root.special.hello`.
    Atom(String),
    /// Left-associated function application; a chain of applies encodes a
    /// curried call `f(a)(b)(c)`.
    Apply(Box<LambdaForm>, Box<LambdaForm>),
    /// Variable binding. Parsed but never evaluated; the analyzer rejects it.
    Lambda(String, Box<LambdaForm>),
    StringLit(String),
    NumberLit(f64),
    DateLit(NaiveDate),
    Variable(String),
}

impl LambdaForm {
    pub fn is_literal(&self) -> bool {
        matches!(
            self,
            LambdaForm::StringLit(_) | LambdaForm::NumberLit(_) | LambdaForm::DateLit(_)
        )
    }

    /// Render in atom position: atoms are bare tokens, everything else is a
    /// parenthesized list.
    fn fmt_atom(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LambdaForm::Atom(name) => write!(f, "{}", name),
            _ => {
                write!(f, "(")?;
                self.fmt_list(f)?;
                write!(f, ")")
            }
        }
    }

    /// Render the interior of a list, without the surrounding parentheses.
    fn fmt_list(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LambdaForm::Atom(name) => write!(f, "{}", name),
            LambdaForm::Apply(left, right) => {
                match left.as_ref() {
                    LambdaForm::Atom(name) => write!(f, "{}", name)?,
                    other => {
                        write!(f, "(")?;
                        other.fmt_list(f)?;
                        write!(f, ")")?;
                    }
                }
                write!(f, " ")?;
                right.fmt_atom(f)
            }
            LambdaForm::Lambda(varname, body) => {
                write!(f, "lambda {} ", varname)?;
                body.fmt_atom(f)
            }
            LambdaForm::StringLit(value) => {
                write!(f, "string \"")?;
                for c in value.chars() {
                    match c {
                        '"' => write!(f, "\\\"")?,
                        '\n' => write!(f, "\\n")?,
                        c => write!(f, "{}", c)?,
                    }
                }
                write!(f, "\"")
            }
            LambdaForm::NumberLit(value) => {
                if value.fract() == 0.0 && value.abs() < 1e15 {
                    write!(f, "number {}", *value as i64)
                } else {
                    write!(f, "number {}", value)
                }
            }
            LambdaForm::DateLit(date) => {
                write!(f, "date {} {} {}", date.year(), date.month(), date.day())
            }
            LambdaForm::Variable(name) => write!(f, "var {}", name),
        }
    }
}

/// The textual rendering round-trips through the parser: for any form `f`,
/// `parse(&f.to_string())` reconstructs a structurally equal tree (strings
/// containing raw backslashes excepted, since the escape rules cannot
/// represent them).
impl fmt::Display for LambdaForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_atom(f)
    }
}
