//! Single-line code text parser, the inverse of `Code`'s `Display`.
//!
//! All syntax characters are ASCII, so the cursor walks bytes and only
//! slices the input at ASCII boundaries.

use crate::code::{Code, CodeFlags, CodeType, KeywordType};
use crate::error::CodeParseError;
use crate::parameter::{POSITIONAL_LETTER, ParameterValue};

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.src.as_bytes().get(self.pos).map(|b| *b as char)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.src.as_bytes().get(self.pos + offset).map(|b| *b as char)
    }

    fn bump(&mut self) {
        self.pos += 1;
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
        self.pos - start
    }

    /// Consume bytes while `pred` holds and return the slice.
    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if !pred(c) {
                break;
            }
            self.bump();
        }
        &self.src[start..self.pos]
    }
}

// ── Public API ──────────────────────────────────────────────────────────

/// Parse one line into a [`Code`].
pub(crate) fn parse_line(line: &str) -> Result<Code, CodeParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let mut cur = Cursor::new(line);
    let indent = cur.skip_whitespace();
    if cur.rest().trim().is_empty() {
        return Err(CodeParseError::EmptyLine);
    }

    let mut code = Code {
        indent: u8::try_from(indent).unwrap_or(u8::MAX),
        ..Code::default()
    };

    if let Some(number) = line_number(&mut cur) {
        code.line_number = Some(number);
        cur.skip_whitespace();
    }

    if let Some(keyword) = keyword(&mut cur) {
        code.keyword = keyword;
        let argument = cur.rest().trim();
        code.keyword_argument = (!argument.is_empty()).then(|| argument.to_string());
        return Ok(code);
    }

    match cur.peek() {
        Some(';') => {
            cur.bump();
            code.comment = Some(cur.rest().to_string());
            return Ok(code);
        }
        Some('(') => {
            code.comment = Some(paren_comment(&mut cur));
            cur.skip_whitespace();
            if cur.at_end() {
                return Ok(code);
            }
        }
        _ => {}
    }

    command(&mut cur, &mut code)?;
    if code.is_major_number(53) && code.code_type == CodeType::GCode {
        let mut lookahead = Cursor {
            src: cur.src,
            pos: cur.pos,
        };
        lookahead.skip_whitespace();
        if starts_command(&lookahead) {
            code.flags |= CodeFlags::ENFORCE_ABSOLUTE_POSITION;
            cur = lookahead;
            command(&mut cur, &mut code)?;
        }
    }

    parameters(&mut cur, &mut code)?;
    Ok(code)
}

// ── Statement head ──────────────────────────────────────────────────────

fn line_number(cur: &mut Cursor<'_>) -> Option<i64> {
    let is_n = matches!(cur.peek(), Some('N' | 'n'));
    if !is_n || !cur.peek_at(1).is_some_and(|c| c.is_ascii_digit()) {
        return None;
    }
    let save = cur.pos;
    cur.bump();
    let digits = cur.take_while(|c| c.is_ascii_digit());
    match digits.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            cur.pos = save;
            None
        }
    }
}

fn keyword(cur: &mut Cursor<'_>) -> Option<KeywordType> {
    let word_len = cur
        .rest()
        .bytes()
        .take_while(|b| b.is_ascii_alphabetic())
        .count();
    let word = &cur.rest()[..word_len];
    let keyword = KeywordType::from_token(word)?;
    // `elif(x)` is not a keyword statement but `if x` and `break` are.
    if !matches!(cur.peek_at(word_len), None | Some(' ' | '\t')) {
        return None;
    }
    cur.pos += word_len;
    Some(keyword)
}

fn starts_command(cur: &Cursor<'_>) -> bool {
    let letter_ok = cur.peek().and_then(CodeType::from_letter).is_some();
    let next_ok = match cur.peek_at(1) {
        Some(c) => c.is_ascii_digit() || c == '-',
        None => false,
    };
    letter_ok && next_ok
}

/// Parse `G|M|T[major[.minor]]` into `code`.
fn command(cur: &mut Cursor<'_>, code: &mut Code) -> Result<(), CodeParseError> {
    let start = cur.pos;
    let Some(code_type) = cur.peek().and_then(CodeType::from_letter) else {
        let token = cur.take_while(|c| !c.is_ascii_whitespace());
        return Err(CodeParseError::InvalidCommandNumber {
            text: token.to_string(),
        });
    };
    // a letter glued to non-numeric text (e.g. `Gfoo`) is not a command
    if cur.peek_at(1).is_some_and(|c| !c.is_ascii_digit() && !matches!(c, '-' | '.' | ' ' | '\t' | ';' | '(')) {
        let token = cur.take_while(|c| !c.is_ascii_whitespace());
        return Err(CodeParseError::InvalidCommandNumber {
            text: token.to_string(),
        });
    }
    cur.bump();
    code.code_type = code_type;
    code.major_number = None;
    code.minor_number = None;

    let number = cur.take_while(|c| c.is_ascii_digit() || c == '.' || c == '-');
    if number.is_empty() {
        return Ok(());
    }
    let invalid = || CodeParseError::InvalidCommandNumber {
        text: cur.src[start..cur.pos].to_string(),
    };
    let (major, minor) = match number.split_once('.') {
        Some((major, minor)) => (major, Some(minor)),
        None => (number, None),
    };
    let major: i64 = major.parse().map_err(|_| invalid())?;
    if major < 0 && !(code_type == CodeType::TCode && major == -1) {
        return Err(invalid());
    }
    code.major_number = Some(major);
    if let Some(minor) = minor {
        code.minor_number = Some(minor.parse().map_err(|_| invalid())?);
    }
    Ok(())
}

// ── Parameters ──────────────────────────────────────────────────────────

fn parameters(cur: &mut Cursor<'_>, code: &mut Code) -> Result<(), CodeParseError> {
    loop {
        cur.skip_whitespace();
        let Some(c) = cur.peek() else {
            return Ok(());
        };
        match c {
            ';' => {
                cur.bump();
                code.comment = Some(cur.rest().to_string());
                return Ok(());
            }
            '(' => {
                let text = paren_comment(cur);
                code.comment = Some(match code.comment.take() {
                    Some(existing) => format!("{existing} {text}"),
                    None => text,
                });
            }
            '"' => {
                let content = quoted(cur)?;
                code.parameters
                    .push(ParameterValue::string(POSITIONAL_LETTER, content));
            }
            '{' => {
                let expr = expression(cur)?;
                code.parameters
                    .push(ParameterValue::parse(POSITIONAL_LETTER, expr));
            }
            c if c.is_ascii_alphabetic() => {
                cur.bump();
                code.parameters.push(tagged_value(cur, c)?);
            }
            _ => {
                let token = plain_token(cur);
                code.parameters
                    .push(ParameterValue::parse(POSITIONAL_LETTER, token));
            }
        }
    }
}

fn tagged_value(cur: &mut Cursor<'_>, letter: char) -> Result<ParameterValue, CodeParseError> {
    match cur.peek() {
        Some('"') => Ok(ParameterValue::string(letter, quoted(cur)?)),
        Some('{') => Ok(ParameterValue::parse(letter, expression(cur)?)),
        _ => Ok(ParameterValue::parse(letter, plain_token(cur))),
    }
}

fn plain_token<'a>(cur: &mut Cursor<'a>) -> &'a str {
    cur.take_while(|c| !matches!(c, ' ' | '\t' | ';' | '('))
}

/// `"..."` with `""` as an escaped quote. Returns the unescaped content.
fn quoted(cur: &mut Cursor<'_>) -> Result<String, CodeParseError> {
    cur.bump();
    let mut out = String::new();
    let mut seg_start = cur.pos;
    loop {
        match cur.peek() {
            None => return Err(CodeParseError::UnterminatedString),
            Some('"') if cur.peek_at(1) == Some('"') => {
                out.push_str(&cur.src[seg_start..cur.pos]);
                out.push('"');
                cur.pos += 2;
                seg_start = cur.pos;
            }
            Some('"') => {
                out.push_str(&cur.src[seg_start..cur.pos]);
                cur.bump();
                return Ok(out);
            }
            Some(_) => cur.bump(),
        }
    }
}

/// Balanced `{...}`, skipping over quoted strings. Returns the text including braces.
fn expression<'a>(cur: &mut Cursor<'a>) -> Result<&'a str, CodeParseError> {
    let start = cur.pos;
    let mut depth = 0usize;
    let mut in_string = false;
    while let Some(c) = cur.peek() {
        cur.bump();
        match c {
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Ok(&cur.src[start..cur.pos]);
                }
            }
            _ => {}
        }
    }
    Err(CodeParseError::UnterminatedExpression)
}

/// `( ... )` comment; an unclosed one runs to the end of the line.
fn paren_comment(cur: &mut Cursor<'_>) -> String {
    cur.bump();
    let text = cur.take_while(|c| c != ')');
    if cur.peek() == Some(')') {
        cur.bump();
    }
    text.to_string()
}
