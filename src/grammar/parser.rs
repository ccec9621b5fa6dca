use chrono::NaiveDate;
use thiserror::Error;

use super::form::LambdaForm;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("unexpected end of input")]
    UnexpectedEof,
    #[error("unterminated string literal")]
    UnterminatedString,
    #[error("invalid escape sequence '\\{0}'")]
    InvalidEscape(char),
    #[error("expected identifier at offset {0}")]
    ExpectedIdentifier(usize),
    #[error("unexpected close parenthesis")]
    UnexpectedClose,
    #[error("expected {expected}")]
    Expected { expected: &'static str },
    #[error("cannot apply value {0}")]
    ApplyToValue(String),
    #[error("invalid number literal '{0}'")]
    InvalidNumber(String),
    #[error("invalid date literal")]
    InvalidDate,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Open,
    Close,
    Word(String),
    Quoted(String),
}

impl Token {
    /// The bare text of a word or quoted token; lists have none.
    fn text(self) -> Option<String> {
        match self {
            Token::Word(s) | Token::Quoted(s) => Some(s),
            _ => None,
        }
    }
}

/// Recursive-descent parser for the lambda-form grammar.
///
/// An atom position is `(` list `)`, a bare identifier (`[0-9a-zA-Z:.]+`), or
/// a quoted string. A list's head token selects its shape: `string`, `date`,
/// `number`, `lambda`, `var`, a parenthesized sub-list applied to a following
/// atom, or a generic head applied to a following atom. A one-element list
/// `( tok )` is equivalent to the bare token.
pub struct FormParser {
    chars: Vec<char>,
    idx: usize,
}

/// Parse a single lambda form. Trailing text after the form is ignored, as
/// upstream producers terminate each utterance with exactly one form.
pub fn parse(text: &str) -> Result<LambdaForm, SyntaxError> {
    FormParser::new(text).parse_atom()
}

impl FormParser {
    pub fn new(text: &str) -> Self {
        Self {
            chars: text.chars().collect(),
            idx: 0,
        }
    }

    fn eat_string(&mut self) -> Result<String, SyntaxError> {
        self.idx += 1; // open quote
        let mut buffer = String::new();
        while self.idx < self.chars.len() {
            match self.chars[self.idx] {
                '"' => {
                    self.idx += 1; // close quote
                    return Ok(buffer);
                }
                '\\' => {
                    if self.idx + 1 >= self.chars.len() {
                        return Err(SyntaxError::UnterminatedString);
                    }
                    match self.chars[self.idx + 1] {
                        '"' => buffer.push('"'),
                        'n' => buffer.push('\n'),
                        other => return Err(SyntaxError::InvalidEscape(other)),
                    }
                    self.idx += 2;
                }
                c => {
                    buffer.push(c);
                    self.idx += 1;
                }
            }
        }
        Err(SyntaxError::UnterminatedString)
    }

    fn eat_name(&mut self) -> Result<String, SyntaxError> {
        let start = self.idx;
        while self.idx < self.chars.len() {
            let c = self.chars[self.idx];
            if c.is_ascii_alphanumeric() || c == ':' || c == '.' {
                self.idx += 1;
            } else {
                break;
            }
        }
        if self.idx == start {
            return Err(SyntaxError::ExpectedIdentifier(start));
        }
        Ok(self.chars[start..self.idx].iter().collect())
    }

    fn next_token(&mut self) -> Result<Token, SyntaxError> {
        while self.idx < self.chars.len() && self.chars[self.idx].is_whitespace() {
            self.idx += 1;
        }
        if self.idx >= self.chars.len() {
            return Err(SyntaxError::UnexpectedEof);
        }
        match self.chars[self.idx] {
            '(' => {
                self.idx += 1;
                Ok(Token::Open)
            }
            ')' => {
                self.idx += 1;
                Ok(Token::Close)
            }
            '"' => Ok(Token::Quoted(self.eat_string()?)),
            _ => Ok(Token::Word(self.eat_name()?)),
        }
    }

    fn expect_close(&mut self) -> Result<(), SyntaxError> {
        match self.next_token()? {
            Token::Close => Ok(()),
            _ => Err(SyntaxError::Expected { expected: "')'" }),
        }
    }

    /// A plain text token, rejecting parentheses.
    fn text_token(&mut self, expected: &'static str) -> Result<String, SyntaxError> {
        self.next_token()?
            .text()
            .ok_or(SyntaxError::Expected { expected })
    }

    fn parse_list(&mut self) -> Result<LambdaForm, SyntaxError> {
        match self.next_token()? {
            Token::Open => {
                let left = self.parse_list()?;
                if left.is_literal() {
                    return Err(SyntaxError::ApplyToValue(left.to_string()));
                }
                let right = self.parse_atom()?;
                self.expect_close()?;
                Ok(LambdaForm::Apply(Box::new(left), Box::new(right)))
            }
            Token::Close => Err(SyntaxError::UnexpectedClose),
            Token::Word(head) if head == "string" => {
                let value = self.text_token("string")?;
                self.expect_close()?;
                Ok(LambdaForm::StringLit(value))
            }
            Token::Word(head) if head == "number" => {
                let raw = self.text_token("number")?;
                let value: f64 = raw
                    .parse()
                    .map_err(|_| SyntaxError::InvalidNumber(raw.clone()))?;
                self.expect_close()?;
                Ok(LambdaForm::NumberLit(value))
            }
            Token::Word(head) if head == "date" => {
                let year = self.text_token("date")?;
                let month = self.text_token("date")?;
                let day = self.text_token("date")?;
                self.expect_close()?;
                let date = NaiveDate::from_ymd_opt(
                    year.parse().map_err(|_| SyntaxError::InvalidDate)?,
                    month.parse().map_err(|_| SyntaxError::InvalidDate)?,
                    day.parse().map_err(|_| SyntaxError::InvalidDate)?,
                )
                .ok_or(SyntaxError::InvalidDate)?;
                Ok(LambdaForm::DateLit(date))
            }
            Token::Word(head) if head == "lambda" => {
                let varname = self.text_token("variable name")?;
                let body = self.parse_atom()?;
                self.expect_close()?;
                Ok(LambdaForm::Lambda(varname, Box::new(body)))
            }
            Token::Word(head) if head == "var" => {
                let varname = self.text_token("variable name")?;
                self.expect_close()?;
                Ok(LambdaForm::Variable(varname))
            }
            Token::Word(head) | Token::Quoted(head) => {
                // Generic head applied to a following atom; a lone token in
                // parentheses is the token itself.
                match self.next_token()? {
                    Token::Close => Ok(LambdaForm::Atom(head)),
                    Token::Open => {
                        let right = self.parse_list()?;
                        self.expect_close()?;
                        Ok(LambdaForm::Apply(
                            Box::new(LambdaForm::Atom(head)),
                            Box::new(right),
                        ))
                    }
                    token => {
                        let right = match token.text() {
                            Some(text) => LambdaForm::Atom(text),
                            None => return Err(SyntaxError::Expected { expected: "atom" }),
                        };
                        self.expect_close()?;
                        Ok(LambdaForm::Apply(
                            Box::new(LambdaForm::Atom(head)),
                            Box::new(right),
                        ))
                    }
                }
            }
        }
    }

    fn parse_atom(&mut self) -> Result<LambdaForm, SyntaxError> {
        match self.next_token()? {
            Token::Open => self.parse_list(),
            Token::Close => Err(SyntaxError::UnexpectedClose),
            Token::Word(name) | Token::Quoted(name) => Ok(LambdaForm::Atom(name)),
        }
    }
}
