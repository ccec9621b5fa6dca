pub mod analyzer;
pub mod catalog;

pub use analyzer::{analyze, ActionCommand, ClassifiedCommand, SemanticError};
pub use catalog::{ActionCatalog, ArgValue, ParameterSpec, ValueCategory};
