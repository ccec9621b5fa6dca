pub mod form;
pub mod parser;

pub use form::LambdaForm;
pub use parser::{parse, SyntaxError};
