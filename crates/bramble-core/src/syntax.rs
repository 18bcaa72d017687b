//! Lexer and parsers for spec strings and guard conditions.
//!
//! Spec strings name a package and constrain it:
//! `netcdf-c@4.8: +mpi build_type=Release`.
//!
//! Guard conditions are boolean expressions over the same atoms:
//! `@2.4.0: +fix | !platform=darwin`, where juxtaposition is conjunction,
//! `|` is disjunction, `!` is negation, and parentheses group. A `^name`
//! atom collects every plain atom that follows it in the same conjunction
//! (`^hdf5@1.14: +mpi`), so conditions on the spec itself must come first.

use crate::config::ArchKey;
use crate::error::RecipeError;
use crate::guard::{Atom, DependencyAtom, Guard};
use crate::spec::SpecRequest;
use crate::variant::VariantRequirement;
use crate::version::VersionConstraint;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind<'a> {
    At(&'a str),
    Plus(&'a str),
    Tilde(&'a str),
    Assign(&'a str, &'a str),
    Caret(&'a str),
    Name(&'a str),
    Bang,
    LParen,
    RParen,
    Pipe,
}

#[derive(Debug, Clone, Copy)]
struct Token<'a> {
    kind: TokenKind<'a>,
    offset: usize,
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '_' | '-')
}

fn is_version_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ':' | ',')
}

fn is_value_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ',' | ':' | '/' | '*')
}

fn scan(text: &str, start: usize, pred: fn(char) -> bool) -> usize {
    text[start..]
        .char_indices()
        .find(|&(_, c)| !pred(c))
        .map_or(text.len(), |(i, _)| start + i)
}

fn tokenize(text: &str) -> Result<Vec<Token<'_>>, RecipeError> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while let Some(c) = text[i..].chars().next() {
        if c.is_whitespace() {
            i += c.len_utf8();
            continue;
        }
        let offset = i;
        let kind = match c {
            '(' | ')' | '|' | '!' => {
                i += 1;
                match c {
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    '|' => TokenKind::Pipe,
                    _ => TokenKind::Bang,
                }
            }
            '@' => {
                let end = scan(text, i + 1, is_version_char);
                if end == i + 1 {
                    return Err(RecipeError::syntax(text, offset, "expected a version after `@`"));
                }
                let body = &text[i + 1..end];
                i = end;
                TokenKind::At(body)
            }
            '+' | '~' => {
                let end = scan(text, i + 1, is_key_char);
                if end == i + 1 {
                    return Err(RecipeError::syntax(
                        text,
                        offset,
                        format!("expected a variant name after `{c}`"),
                    ));
                }
                let name = &text[i + 1..end];
                i = end;
                if c == '+' {
                    TokenKind::Plus(name)
                } else {
                    TokenKind::Tilde(name)
                }
            }
            '^' => {
                let end = scan(text, i + 1, is_name_char);
                if end == i + 1 {
                    return Err(RecipeError::syntax(
                        text,
                        offset,
                        "expected a package name after `^`",
                    ));
                }
                let name = &text[i + 1..end];
                i = end;
                TokenKind::Caret(name)
            }
            c if is_name_char(c) => {
                let end = scan(text, i, is_name_char);
                let word = &text[i..end];
                if text[end..].starts_with('=') {
                    if !word.chars().all(is_key_char) {
                        return Err(RecipeError::syntax(
                            text,
                            offset,
                            format!("`{word}` is not a valid variant name"),
                        ));
                    }
                    let value_start = end + 1;
                    let value_end = scan(text, value_start, is_value_char);
                    if value_end == value_start {
                        return Err(RecipeError::syntax(
                            text,
                            end,
                            format!("expected a value after `{word}=`"),
                        ));
                    }
                    i = value_end;
                    TokenKind::Assign(word, &text[value_start..value_end])
                } else {
                    i = end;
                    TokenKind::Name(word)
                }
            }
            other => {
                return Err(RecipeError::syntax(
                    text,
                    offset,
                    format!("unexpected character `{other}`"),
                ))
            }
        };
        tokens.push(Token { kind, offset });
    }
    Ok(tokens)
}

fn arch_key(key: &str) -> Option<ArchKey> {
    match key {
        "platform" => Some(ArchKey::Platform),
        "os" => Some(ArchKey::Os),
        "target" => Some(ArchKey::Target),
        _ => None,
    }
}

fn values_requirement(key: &str, value: &str) -> VariantRequirement {
    VariantRequirement::values(key, value.split(',').filter(|v| !v.is_empty()))
}

struct Parser<'a> {
    text: &'a str,
    tokens: Vec<Token<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<Token<'a>> {
        self.tokens.get(self.pos).copied()
    }

    fn advance(&mut self) -> Option<Token<'a>> {
        let token = self.peek();
        self.pos += 1;
        token
    }

    fn end_offset(&self) -> usize {
        self.text.len()
    }

    fn error(&self, offset: usize, reason: impl Into<String>) -> RecipeError {
        RecipeError::syntax(self.text, offset, reason)
    }

    fn parse_or(&mut self) -> Result<Guard, RecipeError> {
        let mut terms = vec![self.parse_and()?];
        while matches!(self.peek(), Some(Token { kind: TokenKind::Pipe, .. })) {
            self.advance();
            terms.push(self.parse_and()?);
        }
        Ok(Guard::any(terms))
    }

    fn parse_and(&mut self) -> Result<Guard, RecipeError> {
        let mut factors = Vec::new();
        while let Some(token) = self.peek() {
            if matches!(token.kind, TokenKind::Pipe | TokenKind::RParen) {
                break;
            }
            factors.push(self.parse_factor()?);
        }
        if factors.is_empty() {
            let offset = self.peek().map_or(self.end_offset(), |t| t.offset);
            return Err(self.error(offset, "expected a condition"));
        }
        Ok(Guard::all(factors))
    }

    fn parse_factor(&mut self) -> Result<Guard, RecipeError> {
        let Some(token) = self.advance() else {
            return Err(self.error(self.end_offset(), "expected a condition"));
        };
        match token.kind {
            TokenKind::Bang => Ok(Guard::Not(Box::new(self.parse_factor()?))),
            TokenKind::LParen => {
                let inner = self.parse_or()?;
                match self.advance() {
                    Some(Token {
                        kind: TokenKind::RParen,
                        ..
                    }) => Ok(inner),
                    _ => Err(self.error(token.offset, "unclosed parenthesis")),
                }
            }
            TokenKind::Caret(name) => {
                let mut dep = DependencyAtom {
                    name: name.to_string(),
                    version: None,
                    variants: Vec::new(),
                };
                while let Some(next) = self.peek() {
                    match next.kind {
                        TokenKind::At(body) => {
                            let constraint = VersionConstraint::parse(body)?;
                            dep.version = Some(self.narrow(dep.version.take(), constraint, next.offset)?);
                        }
                        TokenKind::Plus(var) => dep.variants.push(VariantRequirement::flag(var, true)),
                        TokenKind::Tilde(var) => {
                            dep.variants.push(VariantRequirement::flag(var, false))
                        }
                        TokenKind::Assign(key, value) if arch_key(key).is_none() => {
                            dep.variants.push(values_requirement(key, value))
                        }
                        _ => break,
                    }
                    self.advance();
                }
                Ok(Guard::Atom(Atom::Dependency(dep)))
            }
            TokenKind::At(body) => Ok(Guard::Atom(Atom::Version(VersionConstraint::parse(body)?))),
            TokenKind::Plus(var) => Ok(Guard::Atom(Atom::Variant(VariantRequirement::flag(var, true)))),
            TokenKind::Tilde(var) => Ok(Guard::Atom(Atom::Variant(VariantRequirement::flag(
                var, false,
            )))),
            TokenKind::Assign(key, value) => Ok(Guard::Atom(match arch_key(key) {
                Some(key) => Atom::Arch {
                    key,
                    tag: value.to_string(),
                },
                None => Atom::Variant(values_requirement(key, value)),
            })),
            TokenKind::Name(name) => Err(self.error(
                token.offset,
                format!("unexpected package name `{name}` in condition; use `^{name}` to refer to a dependency"),
            )),
            TokenKind::RParen | TokenKind::Pipe => {
                Err(self.error(token.offset, "expected a condition"))
            }
        }
    }

    fn narrow(
        &self,
        current: Option<VersionConstraint>,
        next: VersionConstraint,
        offset: usize,
    ) -> Result<VersionConstraint, RecipeError> {
        match current {
            None => Ok(next),
            Some(current) => current
                .intersect(&next)
                .ok_or_else(|| self.error(offset, "contradictory version constraints")),
        }
    }
}

/// Parse a guard condition. Empty text is the always-true guard.
pub fn parse_guard(text: &str) -> Result<Guard, RecipeError> {
    let tokens = tokenize(text)?;
    if tokens.is_empty() {
        return Ok(Guard::Always);
    }
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };
    let guard = parser.parse_or()?;
    if let Some(extra) = parser.peek() {
        return Err(parser.error(extra.offset, "unexpected `)`"));
    }
    Ok(guard)
}

/// Parse a spec string: a package name followed by version and variant
/// constraints on that package.
pub fn parse_spec(text: &str) -> Result<SpecRequest, RecipeError> {
    let tokens = tokenize(text)?;
    let mut parser = Parser {
        text,
        tokens,
        pos: 0,
    };

    let name = match parser.advance() {
        Some(Token {
            kind: TokenKind::Name(name),
            offset,
        }) => {
            if !name.starts_with(|c: char| c.is_ascii_alphanumeric()) {
                return Err(parser.error(offset, format!("`{name}` is not a valid package name")));
            }
            name
        }
        Some(token) => return Err(parser.error(token.offset, "a spec must start with a package name")),
        None => return Err(parser.error(0, "empty spec")),
    };

    let mut request = SpecRequest::new(name);
    while let Some(token) = parser.advance() {
        let requirement = match token.kind {
            TokenKind::At(body) => {
                let constraint = VersionConstraint::parse(body)?;
                request.version = Some(parser.narrow(request.version.take(), constraint, token.offset)?);
                continue;
            }
            TokenKind::Plus(var) => VariantRequirement::flag(var, true),
            TokenKind::Tilde(var) => VariantRequirement::flag(var, false),
            TokenKind::Assign(key, _) if arch_key(key).is_some() => {
                return Err(parser.error(
                    token.offset,
                    format!("`{key}=` cannot constrain a dependency; put it in the `when` condition"),
                ))
            }
            TokenKind::Assign(key, value) => values_requirement(key, value),
            TokenKind::Caret(_) => {
                return Err(parser.error(
                    token.offset,
                    "transitive constraints (`^`) are not supported in dependency specs",
                ))
            }
            _ => return Err(parser.error(token.offset, "unexpected token in spec")),
        };
        if request.variants.iter().any(|r| r.name == requirement.name) {
            return Err(parser.error(
                token.offset,
                format!("variant `{}` is constrained twice", requirement.name),
            ));
        }
        request.variants.push(requirement);
    }
    Ok(request)
}
