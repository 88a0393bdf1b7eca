//! go.mod and go.work parsing
//!
//! Only the directives gococo acts on are interpreted (`module`, `use` and
//! `replace`); all other directives are tokenized and skipped. Every
//! replacement path remembers the byte span of its token, so a rewrite can
//! splice in a new path and leave every other byte of the file untouched.

use crate::error::{GococoError, GococoResult};
use std::ops::Range;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenKind {
    Ident,
    Quoted,
    Punct,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    text: String,
    span: Range<usize>,
}

impl Token {
    fn is_punct(&self, c: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == c
    }

    fn is_arrow(&self) -> bool {
        self.kind == TokenKind::Ident && self.text == "=>"
    }
}

/// A `replace` directive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replace {
    pub old_path: String,
    pub old_version: Option<String>,
    pub new_path: String,
    pub new_version: Option<String>,
    /// 1-based line of the directive
    pub line: usize,
    new_path_span: Range<usize>,
}

impl Replace {
    /// A replacement without a version points at a local directory
    pub fn is_local(&self) -> bool {
        self.new_version.is_none()
    }
}

/// A parsed go.mod or go.work file
#[derive(Debug, Clone)]
pub struct ModFile {
    path: PathBuf,
    source: String,
    module: Option<String>,
    uses: Vec<String>,
    replaces: Vec<Replace>,
}

impl ModFile {
    /// Read and parse a manifest from disk
    pub fn read(path: &Path) -> GococoResult<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|e| GococoError::io(format!("reading {}", path.display()), e))?;
        Self::parse(path, source)
    }

    /// Parse manifest text; `path` is only used for error messages
    pub fn parse(path: &Path, source: String) -> GococoResult<Self> {
        let mut file = Self {
            path: path.to_path_buf(),
            source: String::new(),
            module: None,
            uses: Vec::new(),
            replaces: Vec::new(),
        };

        let mut block: Option<(String, usize)> = None;
        let mut offset = 0;

        for (idx, line) in source.split_inclusive('\n').enumerate() {
            let line_no = idx + 1;
            let tokens = file.tokenize(line, offset, line_no)?;
            offset += line.len();

            if tokens.is_empty() {
                continue;
            }

            if let Some(verb) = block.as_ref().map(|(verb, _)| verb.clone()) {
                if tokens[0].is_punct(")") {
                    if tokens.len() > 1 {
                        return Err(file.error(line_no, "unexpected tokens after ')'"));
                    }
                    block = None;
                    continue;
                }
                file.directive(&verb, &tokens, line_no)?;
                continue;
            }

            if tokens[0].kind != TokenKind::Ident {
                return Err(file.error(line_no, format!("unexpected '{}'", tokens[0].text)));
            }
            let verb = tokens[0].text.clone();
            let args = &tokens[1..];

            if args.first().is_some_and(|t| t.is_punct("(")) {
                match args.len() {
                    1 => block = Some((verb, line_no)),
                    2 if args[1].is_punct(")") => {}
                    _ => return Err(file.error(line_no, "unexpected tokens after '('")),
                }
                continue;
            }

            file.directive(&verb, args, line_no)?;
        }

        if let Some((verb, start)) = block {
            return Err(file.error(start, format!("unterminated {} block", verb)));
        }

        file.source = source;
        Ok(file)
    }

    /// Path the manifest was read from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Declared module path (go.mod only)
    pub fn module_path(&self) -> Option<&str> {
        self.module.as_deref()
    }

    /// Declared `use` paths (go.work only)
    pub fn uses(&self) -> &[String] {
        &self.uses
    }

    /// All `replace` directives in file order
    pub fn replaces(&self) -> &[Replace] {
        &self.replaces
    }

    /// Render the manifest with some replacement paths swapped out.
    ///
    /// `new_path` is asked once per directive; returning a path different
    /// from the current one replaces that path token. Returns `None` when no
    /// directive changed.
    pub fn rewrite_replacements<F>(&self, mut new_path: F) -> Option<String>
    where
        F: FnMut(&Replace) -> Option<String>,
    {
        let mut out = String::with_capacity(self.source.len());
        let mut cursor = 0;
        let mut changed = false;

        for replace in &self.replaces {
            let Some(path) = new_path(replace) else {
                continue;
            };
            if path == replace.new_path {
                continue;
            }

            out.push_str(&self.source[cursor..replace.new_path_span.start]);
            out.push_str(&format_path(&path));
            cursor = replace.new_path_span.end;
            changed = true;
        }

        if !changed {
            return None;
        }
        out.push_str(&self.source[cursor..]);
        Some(out)
    }

    fn directive(&mut self, verb: &str, args: &[Token], line: usize) -> GococoResult<()> {
        match verb {
            "module" => {
                if args.len() != 1 {
                    return Err(self.error(line, "usage: module module/path"));
                }
                if self.module.is_some() {
                    return Err(self.error(line, "repeated module statement"));
                }
                self.module = Some(args[0].text.clone());
            }
            "use" => {
                if args.len() != 1 {
                    return Err(self.error(line, "usage: use local/dir"));
                }
                self.uses.push(args[0].text.clone());
            }
            "replace" => {
                let replace = self.parse_replace(args, line)?;
                self.replaces.push(replace);
            }
            _ => {}
        }
        Ok(())
    }

    fn parse_replace(&self, args: &[Token], line: usize) -> GococoResult<Replace> {
        let usage = "usage: replace module/path [v1.2.3] => other/module v1.4 \
                     or replace module/path [v1.2.3] => ../local/directory";

        let arrow = args
            .iter()
            .position(Token::is_arrow)
            .ok_or_else(|| self.error(line, usage))?;
        let (old, new) = (&args[..arrow], &args[arrow + 1..]);

        if !(1..=2).contains(&old.len()) || !(1..=2).contains(&new.len()) {
            return Err(self.error(line, usage));
        }
        if args.iter().any(|t| t.kind == TokenKind::Punct) {
            return Err(self.error(line, usage));
        }

        Ok(Replace {
            old_path: old[0].text.clone(),
            old_version: old.get(1).map(|t| t.text.clone()),
            new_path: new[0].text.clone(),
            new_version: new.get(1).map(|t| t.text.clone()),
            line,
            new_path_span: new[0].span.clone(),
        })
    }

    fn tokenize(&self, line: &str, offset: usize, line_no: usize) -> GococoResult<Vec<Token>> {
        let bytes = line.as_bytes();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < bytes.len() {
            match bytes[i] {
                b' ' | b'\t' | b'\r' | b'\n' => i += 1,
                b'/' if bytes.get(i + 1) == Some(&b'/') => break,
                b'(' | b')' => {
                    tokens.push(Token {
                        kind: TokenKind::Punct,
                        text: (bytes[i] as char).to_string(),
                        span: offset + i..offset + i + 1,
                    });
                    i += 1;
                }
                b'"' => {
                    let start = i;
                    i += 1;
                    while i < bytes.len() && bytes[i] != b'"' {
                        if bytes[i] == b'\\' {
                            i += 1;
                        }
                        i += 1;
                    }
                    if i >= bytes.len() {
                        return Err(self.error(line_no, "unterminated quoted string"));
                    }
                    i += 1;
                    let quoted = &line[start..i];
                    let text: String = serde_json::from_str(quoted).map_err(|_| {
                        self.error(line_no, format!("invalid quoted string {}", quoted))
                    })?;
                    tokens.push(Token {
                        kind: TokenKind::Quoted,
                        text,
                        span: offset + start..offset + i,
                    });
                }
                b'`' => {
                    let start = i;
                    let end = line[start + 1..]
                        .find('`')
                        .ok_or_else(|| self.error(line_no, "unterminated raw string"))?;
                    i = start + 1 + end + 1;
                    tokens.push(Token {
                        kind: TokenKind::Quoted,
                        text: line[start + 1..i - 1].to_string(),
                        span: offset + start..offset + i,
                    });
                }
                _ => {
                    let start = i;
                    while i < bytes.len()
                        && !bytes[i].is_ascii_whitespace()
                        && !(bytes[i] == b'/' && bytes.get(i + 1) == Some(&b'/'))
                    {
                        i += 1;
                    }
                    tokens.push(Token {
                        kind: TokenKind::Ident,
                        text: line[start..i].to_string(),
                        span: offset + start..offset + i,
                    });
                }
            }
        }

        Ok(tokens)
    }

    fn error(&self, line: usize, reason: impl Into<String>) -> GococoError {
        GococoError::manifest(&self.path, line, reason)
    }
}

/// Format a path for a manifest, quoting it when the bare form would not
/// survive re-tokenizing.
pub fn format_path(path: &str) -> String {
    let must_quote = path.is_empty()
        || path.contains("//")
        || path.contains("/*")
        || path.chars().any(|c| {
            matches!(c, ' ' | '"' | '\'' | '`')
                || (matches!(c, '(' | ')' | '[' | ']' | '{' | '}' | ',') && path.len() > 1)
                || c.is_whitespace()
                || c.is_control()
        });

    if must_quote {
        serde_json::to_string(path).unwrap_or_else(|_| format!("\"{}\"", path))
    } else {
        path.to_string()
    }
}
