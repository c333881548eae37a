//! Hand-rolled recursive-descent parser for the restriction DSL.
//!
//! The grammar is four productions — a parser-combinator or grammar-file
//! dependency would be more machinery than the language needs. Parse errors
//! report `{line, column, message}` (spec §4.2); compilation downstream is
//! pure and idempotent.

use crate::core::dsl::ast::{Condition, Effect, Op, RestrictionAst};
use crate::core::error::ArchonError;
use crate::core::taxonomy::CapabilityType;

#[derive(Debug, Clone, PartialEq, Eq)]
enum TokKind {
    Allow,
    Deny,
    Where,
    And,
    Matches,
    Ident(String),
    Str(String),
}

#[derive(Debug, Clone)]
struct Tok {
    kind: TokKind,
    line: usize,
    column: usize,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

fn tokenize(source: &str) -> Result<Vec<Tok>, ArchonError> {
    let mut toks = Vec::new();
    let mut line = 1usize;
    let mut col = 1usize;
    let chars: Vec<char> = source.chars().collect();
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\n' => {
                line += 1;
                col = 1;
                i += 1;
            }
            c if c.is_whitespace() => {
                col += 1;
                i += 1;
            }
            '"' | '\'' => {
                let quote = c;
                let (start_line, start_col) = (line, col);
                i += 1;
                col += 1;
                let mut value = String::new();
                let mut closed = false;
                while i < chars.len() {
                    let cc = chars[i];
                    if cc == quote {
                        closed = true;
                        i += 1;
                        col += 1;
                        break;
                    }
                    if cc == '\n' {
                        line += 1;
                        col = 1;
                    } else {
                        col += 1;
                    }
                    value.push(cc);
                    i += 1;
                }
                if !closed {
                    return Err(ArchonError::DslParse {
                        line: start_line,
                        column: start_col,
                        message: "unterminated string literal".to_string(),
                    });
                }
                toks.push(Tok {
                    kind: TokKind::Str(value),
                    line: start_line,
                    column: start_col,
                });
            }
            c if is_ident_char(c) => {
                let (start_line, start_col) = (line, col);
                let mut value = String::new();
                while i < chars.len() && is_ident_char(chars[i]) {
                    value.push(chars[i]);
                    i += 1;
                    col += 1;
                }
                let kind = match value.as_str() {
                    "allow" => TokKind::Allow,
                    "deny" => TokKind::Deny,
                    "where" => TokKind::Where,
                    "and" => TokKind::And,
                    "matches" => TokKind::Matches,
                    _ => TokKind::Ident(value),
                };
                toks.push(Tok {
                    kind,
                    line: start_line,
                    column: start_col,
                });
            }
            other => {
                return Err(ArchonError::DslParse {
                    line,
                    column: col,
                    message: format!("unexpected character '{other}'"),
                });
            }
        }
    }

    Ok(toks)
}

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Tok> {
        self.toks.get(self.pos)
    }

    fn advance(&mut self) -> Option<Tok> {
        let t = self.toks.get(self.pos).cloned();
        self.pos += 1;
        t
    }

    fn err_here(&self, message: impl Into<String>) -> ArchonError {
        let (line, column) = self
            .peek()
            .map(|t| (t.line, t.column))
            .or_else(|| self.toks.last().map(|t| (t.line, t.column + 1)))
            .unwrap_or((1, 1));
        ArchonError::DslParse {
            line,
            column,
            message: message.into(),
        }
    }

    fn parse_rule(&mut self) -> Result<RestrictionAst, ArchonError> {
        let effect = match self.advance().map(|t| t.kind) {
            Some(TokKind::Allow) => Effect::Allow,
            Some(TokKind::Deny) => Effect::Deny,
            _ => {
                return Err(self.err_here("expected 'allow' or 'deny'"));
            }
        };

        let capability_type = match self.advance() {
            Some(Tok {
                kind: TokKind::Ident(name),
                line,
                column,
            }) => CapabilityType::parse(&name).ok_or_else(|| ArchonError::DslParse {
                line,
                column,
                message: format!("unknown capability type '{name}'"),
            })?,
            _ => return Err(self.err_here("expected a capability type")),
        };

        let mut conditions = Vec::new();
        if matches!(self.peek().map(|t| &t.kind), Some(TokKind::Where)) {
            self.advance();
            conditions.push(self.parse_condition()?);
            while matches!(self.peek().map(|t| &t.kind), Some(TokKind::And)) {
                self.advance();
                conditions.push(self.parse_condition()?);
            }
        }

        if let Some(tok) = self.peek() {
            return Err(ArchonError::DslParse {
                line: tok.line,
                column: tok.column,
                message: "unexpected trailing tokens".to_string(),
            });
        }

        Ok(RestrictionAst {
            capability_type,
            effect,
            conditions,
        })
    }

    fn parse_condition(&mut self) -> Result<Condition, ArchonError> {
        let field = match self.advance() {
            Some(Tok {
                kind: TokKind::Ident(name),
                line,
                column,
            }) => {
                if !name.starts_with(Condition::FIELD_PREFIX) {
                    return Err(ArchonError::DslParse {
                        line,
                        column,
                        message: format!(
                            "field '{name}' must start with '{}'",
                            Condition::FIELD_PREFIX
                        ),
                    });
                }
                name
            }
            _ => return Err(self.err_here("expected a dotted field")),
        };

        match self.advance().map(|t| t.kind) {
            Some(TokKind::Matches) => {}
            _ => return Err(self.err_here("expected 'matches'")),
        }

        let value = match self.advance() {
            Some(Tok {
                kind: TokKind::Str(s),
                ..
            }) => s,
            _ => return Err(self.err_here("expected a string glob literal")),
        };

        Ok(Condition {
            field,
            op: Op::Matches,
            value,
        })
    }
}

/// Parse a single restriction rule from source text.
pub fn parse_rule(source: &str) -> Result<RestrictionAst, ArchonError> {
    let toks = tokenize(source)?;
    if toks.is_empty() {
        return Err(ArchonError::DslParse {
            line: 1,
            column: 1,
            message: "empty rule".to_string(),
        });
    }
    let mut parser = Parser { toks, pos: 0 };
    parser.parse_rule()
}

/// Parse one rule per non-blank line, for bulk input (`restrict add-dsl`).
/// Line numbers in reported errors refer to the position within `source`.
pub fn parse_rules(source: &str) -> Result<Vec<RestrictionAst>, ArchonError> {
    let mut rules = Vec::new();
    let mut line_offset = 0usize;
    for line in source.lines() {
        line_offset += 1;
        if line.trim().is_empty() {
            continue;
        }
        let rule = parse_rule(line).map_err(|e| match e {
            ArchonError::DslParse {
                line: l,
                column,
                message,
            } => ArchonError::DslParse {
                line: line_offset + l - 1,
                column,
                message,
            },
            other => other,
        })?;
        rules.push(rule);
    }
    Ok(rules)
}
