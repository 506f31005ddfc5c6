//! Source tokenizer.
//!
//! Indentation is significant, string literals carry embedded expression
//! holes, and lines starting with `/` are raw commands, so the scanner keeps
//! explicit state: an indentation stack (synthesizing `Indent`/`Dedent`), a
//! bracket stack (newlines are suppressed inside brackets), and a
//! continuation flag. The output is a flat token stream ending in `Eof`.

mod token;

#[cfg(test)]
mod lexer_tests;

pub use token::{CmdSegment, StrSegment, Token, TokenKind};

use acacia_core::{Pos, Span};

use crate::diagnostics::{Diagnostic, DiagnosticKind};
use crate::source::SourceId;

/// Tokenize one source unit. Stops at the first lexical error.
pub fn tokenize(source: SourceId, src: &str) -> Result<Vec<Token>, Diagnostic> {
    let mut lexer = Lexer::new(source, src);
    lexer.run()?;
    Ok(lexer.tokens)
}

type Mark = (u32, Pos);

struct Lexer<'src> {
    src: &'src str,
    pos: usize,
    line: u32,
    col: u32,
    source: SourceId,
    indents: Vec<u32>,
    brackets: Vec<(char, Span)>,
    tokens: Vec<Token>,
    line_has_tokens: bool,
}

impl<'src> Lexer<'src> {
    fn new(source: SourceId, src: &'src str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            col: 1,
            source,
            indents: vec![0],
            brackets: Vec::new(),
            tokens: Vec::new(),
            line_has_tokens: false,
        }
    }

    fn run(&mut self) -> Result<(), Diagnostic> {
        loop {
            self.measure_indentation()?;
            if self.peek().is_none() {
                break;
            }
            self.lex_line()?;
        }

        if let Some(&(open, span)) = self.brackets.first() {
            return Err(self.err_at(DiagnosticKind::UnclosedBracket(open), span));
        }

        let eof_span = Span::point(self.pos as u32, Pos::new(self.line, self.col));
        if self.line_has_tokens {
            self.push_layout(TokenKind::Newline, eof_span);
            self.line_has_tokens = false;
        }
        while self.indents.len() > 1 {
            self.indents.pop();
            self.push_layout(TokenKind::Dedent, eof_span);
        }
        self.push_layout(TokenKind::Eof, eof_span);
        Ok(())
    }

    // ---- character access -------------------------------------------------

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn peek2(&self) -> Option<char> {
        let mut chars = self.src[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        if c == '\n' {
            self.line += 1;
            self.col = 1;
        } else {
            self.col += 1;
        }
        Some(c)
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn mark(&self) -> Mark {
        (self.pos as u32, Pos::new(self.line, self.col))
    }

    fn span_from(&self, mark: Mark) -> Span {
        Span::new(mark.0, self.pos as u32, mark.1, Pos::new(self.line, self.col))
    }

    fn err(&self, kind: DiagnosticKind, mark: Mark) -> Diagnostic {
        Diagnostic::new(kind, self.source, self.span_from(mark))
    }

    fn err_at(&self, kind: DiagnosticKind, span: Span) -> Diagnostic {
        Diagnostic::new(kind, self.source, span)
    }

    fn push(&mut self, token: Token) {
        self.line_has_tokens = true;
        self.tokens.push(token);
    }

    fn push_layout(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token { kind, span });
    }

    // ---- line structure ---------------------------------------------------

    /// Skip blank and comment-only lines, then compare the first non-blank
    /// line's indentation against the stack.
    fn measure_indentation(&mut self) -> Result<(), Diagnostic> {
        loop {
            let mark = self.mark();
            let mut width = 0u32;
            loop {
                match self.peek() {
                    Some(' ') => {
                        self.bump();
                        width += 1;
                    }
                    Some('\r') => {
                        self.bump();
                    }
                    Some('\t') => {
                        let tab = self.mark();
                        self.bump();
                        return Err(self.err(DiagnosticKind::InvalidChar('\t'), tab));
                    }
                    _ => break,
                }
            }
            match self.peek() {
                None => return Ok(()),
                Some('\n') => {
                    self.bump();
                }
                Some('#') => {
                    self.lex_comment()?;
                    if self.eat('\n') {
                        continue;
                    }
                    if self.peek().is_none() {
                        return Ok(());
                    }
                    // A long comment closed mid-line with code after it; the
                    // original line's indentation governs.
                    return self.apply_indent(width, mark);
                }
                Some(_) => return self.apply_indent(width, mark),
            }
        }
    }

    fn apply_indent(&mut self, width: u32, mark: Mark) -> Result<(), Diagnostic> {
        let span = Span::point(mark.0, mark.1);
        let top = *self.indents.last().expect("indent stack never empty");
        match width.cmp(&top) {
            std::cmp::Ordering::Greater => {
                self.indents.push(width);
                self.push_layout(TokenKind::Indent, span);
            }
            std::cmp::Ordering::Equal => {}
            std::cmp::Ordering::Less => {
                while *self.indents.last().expect("indent stack never empty") > width {
                    self.indents.pop();
                    self.push_layout(TokenKind::Dedent, span);
                }
                if *self.indents.last().expect("indent stack never empty") != width {
                    return Err(self.err_at(DiagnosticKind::InvalidDedent, span));
                }
            }
        }
        Ok(())
    }

    /// Lex tokens until the logical line ends with a `Newline`, or EOF.
    /// Newlines inside brackets and after a `\` continuation do not end the
    /// logical line.
    fn lex_line(&mut self) -> Result<(), Diagnostic> {
        self.line_has_tokens = false;
        loop {
            match self.peek() {
                None => return Ok(()),
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('\n') => {
                    let mark = self.mark();
                    self.bump();
                    if self.brackets.is_empty() {
                        if self.line_has_tokens {
                            self.push_layout(TokenKind::Newline, self.span_from(mark));
                            self.line_has_tokens = false;
                        }
                        return Ok(());
                    }
                }
                Some('\\') => self.lex_continuation()?,
                Some('#') => self.lex_comment()?,
                Some('/') if !self.line_has_tokens && self.brackets.is_empty() => {
                    self.lex_command()?;
                }
                Some(_) => {
                    let token = self.lex_atom()?;
                    self.track_brackets(&token)?;
                    self.push(token);
                }
            }
        }
    }

    fn track_brackets(&mut self, token: &Token) -> Result<(), Diagnostic> {
        let close_of = |open: char| match open {
            '(' => ')',
            '[' => ']',
            _ => '}',
        };
        match token.kind {
            TokenKind::LParen => self.brackets.push(('(', token.span)),
            TokenKind::LBracket => self.brackets.push(('[', token.span)),
            TokenKind::LBrace => self.brackets.push(('{', token.span)),
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                let found = match token.kind {
                    TokenKind::RParen => ')',
                    TokenKind::RBracket => ']',
                    _ => '}',
                };
                match self.brackets.pop() {
                    Some((open, _)) if close_of(open) == found => {}
                    _ => {
                        return Err(self.err_at(
                            DiagnosticKind::UnmatchedBracketPair(found),
                            token.span,
                        ));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn lex_continuation(&mut self) -> Result<(), Diagnostic> {
        let mark = self.mark();
        self.bump(); // backslash
        while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
            self.bump();
        }
        match self.peek() {
            Some('\n') => {
                self.bump();
                Ok(())
            }
            None => Err(self.err(DiagnosticKind::EofAfterContinuation, mark)),
            Some(_) => {
                let bad = self.mark();
                self.bump();
                Err(self.err(DiagnosticKind::CharAfterContinuation, bad))
            }
        }
    }

    /// `#` to end of line, or `#* ... *#` which may span lines.
    fn lex_comment(&mut self) -> Result<(), Diagnostic> {
        let mark = self.mark();
        self.bump(); // '#'
        if self.eat('*') {
            loop {
                match self.peek() {
                    None => {
                        return Err(self.err(DiagnosticKind::UnclosedLongComment, mark));
                    }
                    Some('*') if self.peek2() == Some('#') => {
                        self.bump();
                        self.bump();
                        return Ok(());
                    }
                    Some(_) => {
                        self.bump();
                    }
                }
            }
        }
        while !matches!(self.peek(), None | Some('\n')) {
            self.bump();
        }
        Ok(())
    }

    // ---- raw commands -----------------------------------------------------

    /// `/give @s apple` to end of line, or `/* ... */` joining its lines
    /// into one command. `${name}` interpolates a compile-time constant.
    fn lex_command(&mut self) -> Result<(), Diagnostic> {
        let mark = self.mark();
        self.bump(); // '/'
        let block = self.eat('*');
        let mut segments = Vec::new();
        let mut text = String::new();

        let flush = |text: &mut String, segments: &mut Vec<CmdSegment>| {
            if !text.is_empty() {
                segments.push(CmdSegment::Text(std::mem::take(text)));
            }
        };

        loop {
            match self.peek() {
                None if block => {
                    return Err(self.err(DiagnosticKind::UnclosedCommand, mark));
                }
                None => break,
                Some('\n') if !block => break,
                Some('\n') => {
                    self.bump();
                    while text.ends_with(' ') || text.ends_with('\t') {
                        text.pop();
                    }
                    text.push(' ');
                    while matches!(self.peek(), Some(' ') | Some('\t') | Some('\r')) {
                        self.bump();
                    }
                }
                Some('*') if block && self.peek2() == Some('/') => {
                    self.bump();
                    self.bump();
                    break;
                }
                Some('$') if self.peek2() == Some('{') => {
                    let interp_mark = self.mark();
                    self.bump();
                    self.bump();
                    flush(&mut text, &mut segments);
                    let mut name = String::new();
                    loop {
                        match self.peek() {
                            Some('}') => {
                                self.bump();
                                break;
                            }
                            Some(c) if c.is_ascii_alphanumeric() || c == '_' || c == '.' => {
                                self.bump();
                                name.push(c);
                            }
                            _ => {
                                return Err(self.err(
                                    DiagnosticKind::UnclosedInterpolation,
                                    interp_mark,
                                ));
                            }
                        }
                    }
                    segments.push(CmdSegment::Interp {
                        name,
                        span: self.span_from(interp_mark),
                    });
                }
                Some('\r') => {
                    self.bump();
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }

        flush(&mut text, &mut segments);
        self.push(Token {
            kind: TokenKind::Command(segments),
            span: self.span_from(mark),
        });
        Ok(())
    }

    // ---- atoms ------------------------------------------------------------

    /// One plain token: literal, name, or operator. Layout, comments, and
    /// commands are the caller's business.
    fn lex_atom(&mut self) -> Result<Token, Diagnostic> {
        let c = self.peek().expect("lex_atom called at EOF");
        if c == '"' {
            return self.lex_string();
        }
        if c.is_ascii_digit() {
            return self.lex_number();
        }
        if c.is_ascii_alphabetic() || c == '_' {
            return Ok(self.lex_ident());
        }

        use TokenKind::*;
        let mark = self.mark();
        self.bump();
        let kind = match c {
            '(' => LParen,
            ')' => RParen,
            '[' => LBracket,
            ']' => RBracket,
            '{' => LBrace,
            '}' => RBrace,
            ',' => Comma,
            '.' => Dot,
            '|' => Bar,
            '&' => Amp,
            ':' => {
                if self.eat('=') {
                    Walrus
                } else {
                    Colon
                }
            }
            '+' => {
                if self.eat('=') {
                    PlusAssign
                } else {
                    Plus
                }
            }
            '-' => {
                if self.eat('=') {
                    MinusAssign
                } else if self.eat('>') {
                    Arrow
                } else {
                    Minus
                }
            }
            '*' => {
                if self.eat('=') {
                    StarAssign
                } else {
                    Star
                }
            }
            '/' => {
                if self.eat('=') {
                    SlashAssign
                } else {
                    Slash
                }
            }
            '%' => {
                if self.eat('=') {
                    PercentAssign
                } else {
                    Percent
                }
            }
            '=' => {
                if self.eat('=') {
                    EqEq
                } else {
                    Assign
                }
            }
            '<' => {
                if self.eat('=') {
                    LtEq
                } else {
                    Lt
                }
            }
            '>' => {
                if self.eat('=') {
                    GtEq
                } else {
                    Gt
                }
            }
            '!' => {
                if self.eat('=') {
                    NotEq
                } else {
                    return Err(self.err(DiagnosticKind::InvalidChar('!'), mark));
                }
            }
            other => return Err(self.err(DiagnosticKind::InvalidChar(other), mark)),
        };
        Ok(Token {
            kind,
            span: self.span_from(mark),
        })
    }

    fn lex_ident(&mut self) -> Token {
        let mark = self.mark();
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.bump();
                name.push(c);
            } else {
                break;
            }
        }
        let kind = TokenKind::keyword(&name).unwrap_or(TokenKind::Ident(name));
        Token {
            kind,
            span: self.span_from(mark),
        }
    }

    fn lex_number(&mut self) -> Result<Token, Diagnostic> {
        let mark = self.mark();
        let first = self.bump().expect("caller checked digit");

        let radix = if first == '0' && matches!(self.peek(), Some('x') | Some('X')) {
            self.bump();
            Some(16)
        } else if first == '0' && matches!(self.peek(), Some('b') | Some('B')) {
            self.bump();
            Some(2)
        } else {
            None
        };

        if let Some(radix) = radix {
            let mut value: i64 = 0;
            let mut any = false;
            while let Some(d) = self.peek().and_then(|c| c.to_digit(radix)) {
                self.bump();
                any = true;
                value = value * i64::from(radix) + i64::from(d);
                if value > i64::from(i32::MAX) {
                    return Err(self.err(DiagnosticKind::IntOverflow, mark));
                }
            }
            if !any {
                let bad = self.peek().unwrap_or('\0');
                return Err(self.err(DiagnosticKind::InvalidChar(bad), mark));
            }
            return Ok(Token {
                kind: TokenKind::Int(value as i32),
                span: self.span_from(mark),
            });
        }

        let mut value: i64 = i64::from(first.to_digit(10).expect("caller checked digit"));
        while let Some(d) = self.peek().and_then(|c| c.to_digit(10)) {
            self.bump();
            value = value * 10 + i64::from(d);
            if value > i64::from(i32::MAX) {
                return Err(self.err(DiagnosticKind::IntOverflow, mark));
            }
        }

        if self.peek() == Some('.') && self.peek2().is_some_and(|c| c.is_ascii_digit()) {
            self.bump(); // '.'
            while self.peek().is_some_and(|c| c.is_ascii_digit()) {
                self.bump();
            }
            let text = &self.src[mark.0 as usize..self.pos];
            let value: f64 = text.parse().expect("scanned digits parse as f64");
            return Ok(Token {
                kind: TokenKind::Float(value),
                span: self.span_from(mark),
            });
        }

        Ok(Token {
            kind: TokenKind::Int(value as i32),
            span: self.span_from(mark),
        })
    }

    // ---- strings ----------------------------------------------------------

    fn lex_string(&mut self) -> Result<Token, Diagnostic> {
        let mark = self.mark();
        let quote_mark = self.mark();
        self.bump(); // opening quote
        let quote_span = self.span_from(quote_mark);

        let mut segments = Vec::new();
        let mut text = String::new();

        macro_rules! flush {
            () => {
                if !text.is_empty() {
                    segments.push(StrSegment::Text(std::mem::take(&mut text)));
                }
            };
        }

        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.err_at(DiagnosticKind::UnclosedQuote, quote_span));
                }
                Some('"') => {
                    self.bump();
                    flush!();
                    return Ok(Token {
                        kind: TokenKind::Str(segments),
                        span: self.span_from(mark),
                    });
                }
                Some('{') => {
                    self.bump();
                    flush!();
                    let tokens = self.lex_embedded(quote_span)?;
                    segments.push(StrSegment::Expr(tokens));
                }
                Some('\\') => {
                    let esc_mark = self.mark();
                    self.bump();
                    match self.peek() {
                        None => {
                            return Err(self.err_at(DiagnosticKind::UnclosedQuote, quote_span));
                        }
                        Some('f') => {
                            self.bump();
                            if !self.eat('{') {
                                return Err(
                                    self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                );
                            }
                            let mut spec = String::new();
                            loop {
                                match self.peek() {
                                    None | Some('\n') => {
                                        return Err(
                                            self.err(DiagnosticKind::UnclosedFont, esc_mark)
                                        );
                                    }
                                    Some('}') => {
                                        self.bump();
                                        break;
                                    }
                                    Some(c) => {
                                        self.bump();
                                        spec.push(c);
                                    }
                                }
                            }
                            flush!();
                            segments.push(StrSegment::Font(spec));
                        }
                        Some('u') => {
                            self.bump();
                            if !self.eat('{') {
                                return Err(
                                    self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                );
                            }
                            let mut code: u32 = 0;
                            let mut digits = 0;
                            while let Some(d) = self.peek().and_then(|c| c.to_digit(16)) {
                                self.bump();
                                digits += 1;
                                if digits > 6 {
                                    return Err(
                                        self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                    );
                                }
                                code = code * 16 + d;
                            }
                            if digits == 0 || !self.eat('}') {
                                return Err(
                                    self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                );
                            }
                            let Some(c) = char::from_u32(code) else {
                                return Err(
                                    self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                );
                            };
                            text.push(c);
                        }
                        Some(c) => {
                            self.bump();
                            let resolved = match c {
                                '\\' => '\\',
                                '"' => '"',
                                '\'' => '\'',
                                'n' => '\n',
                                't' => '\t',
                                'r' => '\r',
                                '0' => '\0',
                                '{' => '{',
                                '}' => '}',
                                _ => {
                                    return Err(
                                        self.err(DiagnosticKind::InvalidUnicodeEscape, esc_mark)
                                    );
                                }
                            };
                            text.push(resolved);
                        }
                    }
                }
                Some(c) => {
                    self.bump();
                    text.push(c);
                }
            }
        }
    }

    /// Tokens of a `{...}` hole, up to the matching close brace. The hole
    /// must stay on one line; brackets opened inside it nest.
    fn lex_embedded(&mut self, quote_span: Span) -> Result<Vec<Token>, Diagnostic> {
        let mut tokens = Vec::new();
        let mut depth = 0usize;
        loop {
            match self.peek() {
                None | Some('\n') => {
                    return Err(self.err_at(DiagnosticKind::InvalidFexpr, quote_span));
                }
                Some(' ') | Some('\t') | Some('\r') => {
                    self.bump();
                }
                Some('}') if depth == 0 => {
                    self.bump();
                    return Ok(tokens);
                }
                Some(_) => {
                    let token = self.lex_atom()?;
                    match token.kind {
                        TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => depth += 1,
                        TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                            depth = depth.saturating_sub(1);
                        }
                        _ => {}
                    }
                    tokens.push(token);
                }
            }
        }
    }
}
