use thiserror::Error;

use crate::grammar::LambdaForm;

use super::catalog::{ActionCatalog, ArgValue, ParameterSpec, ValueCategory};

pub const SPECIAL_PREFIX: &str = "tt:root.special.";
pub const VALUE_MARKER: &str = "tt:root.token.value";
pub const ACTION_PREFIX: &str = "tt:device.action.";
pub const DEVICE_PREFIX: &str = "tt:device.";

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SemanticError {
    #[error("unexpected lambda form not in normal form")]
    UnexpectedLambda,
    #[error("unbound variable {0}")]
    UnboundVariable(String),
    #[error("unexpected call head {0}")]
    InvalidHead(String),
    #[error("unknown action {0}")]
    UnknownAction(String),
    #[error("no device selector for action {0} and no fallback declared")]
    MissingDeviceSelector(String),
    #[error("invalid first parameter to {0} (must be a device)")]
    InvalidDeviceSelector(String),
    #[error("action {action} is not valid for device {device}")]
    UnknownDevice { action: String, device: String },
    #[error("parameter {0} is not a literal value")]
    NonLiteralParameter(String),
    #[error("cannot classify {0}")]
    Unclassifiable(String),
}

/// An invocable action plus any parameters already bound positionally.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionCommand {
    pub kind: String,
    pub channel: String,
    pub schema: Vec<ParameterSpec>,
    pub params: Vec<ArgValue>,
}

/// Speech-act classification of a parsed utterance. Exactly one variant by
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ClassifiedCommand {
    /// A fixed system utterance (`hello`, `help`, `nevermind`, ...) carrying
    /// no data; the name is the suffix after the special namespace.
    Special(String),
    Affirm,
    Deny,
    Value(ValueCategory, ArgValue),
    Action(ActionCommand),
}

/// Classify a parsed lambda form against the action catalog.
pub fn analyze(
    form: &LambdaForm,
    catalog: &ActionCatalog,
) -> Result<ClassifiedCommand, SemanticError> {
    match form {
        LambdaForm::Atom(name) => {
            if let Some(suffix) = name.strip_prefix(SPECIAL_PREFIX) {
                return Ok(match suffix {
                    "yes" => ClassifiedCommand::Affirm,
                    "no" => ClassifiedCommand::Deny,
                    other => ClassifiedCommand::Special(other.to_string()),
                });
            }
            if name.starts_with(ACTION_PREFIX) {
                // Bare action with no arguments: fallback resolution only.
                return resolve_action(name, &[], catalog);
            }
            Err(SemanticError::Unclassifiable(form.to_string()))
        }
        LambdaForm::Apply(left, right)
            if matches!(left.as_ref(), LambdaForm::Atom(n) if n == VALUE_MARKER) =>
        {
            let value = literal_value(right)?;
            Ok(ClassifiedCommand::Value(value.category(), value))
        }
        LambdaForm::Apply(..) => {
            let (head, args) = uncurry(form)?;
            if !head.starts_with(ACTION_PREFIX) {
                return Err(SemanticError::InvalidHead(head.to_string()));
            }
            resolve_action(head, &args, catalog)
        }
        LambdaForm::Lambda(..) => Err(SemanticError::UnexpectedLambda),
        LambdaForm::Variable(name) => Err(SemanticError::UnboundVariable(name.clone())),
        _ => Err(SemanticError::Unclassifiable(form.to_string())),
    }
}

/// Walk the left spine of an apply chain, collecting the right-hand arguments
/// outermost-last so the returned list reads in call order.
fn uncurry(form: &LambdaForm) -> Result<(&str, Vec<&LambdaForm>), SemanticError> {
    let mut args = Vec::new();
    let mut cursor = form;
    loop {
        match cursor {
            LambdaForm::Apply(left, right) => {
                args.push(right.as_ref());
                cursor = left.as_ref();
            }
            LambdaForm::Lambda(..) => return Err(SemanticError::UnexpectedLambda),
            LambdaForm::Variable(name) => {
                return Err(SemanticError::UnboundVariable(name.clone()))
            }
            LambdaForm::Atom(name) => {
                args.reverse();
                return Ok((name, args));
            }
            other => return Err(SemanticError::InvalidHead(other.to_string())),
        }
    }
}

fn resolve_action(
    name: &str,
    args: &[&LambdaForm],
    catalog: &ActionCatalog,
) -> Result<ClassifiedCommand, SemanticError> {
    let entry = catalog
        .lookup(name)
        .ok_or_else(|| SemanticError::UnknownAction(name.to_string()))?;

    let (action, bound) = match args.split_first() {
        None => {
            // No device selector at all: consult the per-action fallback.
            let action = entry
                .resolve_fallback()
                .ok_or_else(|| SemanticError::MissingDeviceSelector(name.to_string()))?;
            (action, &args[..])
        }
        Some((first, rest)) => match first {
            LambdaForm::Atom(device) if device.starts_with(DEVICE_PREFIX) => {
                // An explicit but unknown selector is an error, never a
                // silent fallback.
                let action =
                    entry
                        .device(device)
                        .ok_or_else(|| SemanticError::UnknownDevice {
                            action: name.to_string(),
                            device: device.clone(),
                        })?;
                (action, rest)
            }
            _ => return Err(SemanticError::InvalidDeviceSelector(name.to_string())),
        },
    };

    let params = bound
        .iter()
        .map(|form| literal_value(form))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ClassifiedCommand::Action(ActionCommand {
        kind: action.kind.clone(),
        channel: action.channel.clone(),
        schema: action.schema.clone(),
        params,
    }))
}

/// Map a literal form to its value. Numeric atoms coerce to numbers, since
/// the grammar tokenizes digits as identifiers.
fn literal_value(form: &LambdaForm) -> Result<ArgValue, SemanticError> {
    match form {
        LambdaForm::NumberLit(n) => Ok(ArgValue::Number(*n)),
        LambdaForm::StringLit(s) => Ok(ArgValue::Text(s.clone())),
        LambdaForm::DateLit(d) => Ok(ArgValue::Date(*d)),
        LambdaForm::Atom(name) => name
            .parse::<f64>()
            .map(ArgValue::Number)
            .map_err(|_| SemanticError::NonLiteralParameter(name.clone())),
        LambdaForm::Lambda(..) => Err(SemanticError::UnexpectedLambda),
        LambdaForm::Variable(name) => Err(SemanticError::UnboundVariable(name.clone())),
        other => Err(SemanticError::NonLiteralParameter(other.to_string())),
    }
}
