//! S-expression reader: source text to [`Expr`] trees.
//!
//! A two-stage reader: a lexer that produces parenthesis, integer, string
//! and symbol tokens (with source positions for error reporting), and a
//! reader that folds the token stream into expression trees. `;` starts a
//! comment that runs to end of line.

use crate::ast::Expr;
use crate::error::LyreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SourceLoc {
    line: usize,
    col: usize,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LeftParen,
    RightParen,
    Integer(i64),
    Str(String),
    Symbol(String),
}

#[derive(Debug, Clone, PartialEq)]
struct TokenWithLoc {
    token: Token,
    loc: SourceLoc,
}

struct Lexer {
    input: Vec<char>,
    pos: usize,
    line: usize,
    col: usize,
}

impl Lexer {
    fn new(input: &str) -> Self {
        Lexer {
            input: input.chars().collect(),
            pos: 0,
            line: 1,
            col: 1,
        }
    }

    fn loc(&self) -> SourceLoc {
        SourceLoc {
            line: self.line,
            col: self.col,
        }
    }

    fn current(&self) -> Option<char> {
        self.input.get(self.pos).copied()
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.input.get(self.pos + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let c = self.current();
        if let Some(ch) = c {
            if ch == '\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
        self.pos += 1;
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.current() {
            if c.is_whitespace() {
                self.advance();
            } else if c == ';' {
                // comment runs to end of line
                while let Some(c) = self.advance() {
                    if c == '\n' {
                        break;
                    }
                }
            } else {
                break;
            }
        }
    }

    fn read_string(&mut self, loc: SourceLoc) -> Result<String, LyreError> {
        self.advance(); // opening quote
        let mut s = String::new();
        loop {
            match self.current() {
                None => return Err(LyreError::syntax("unterminated string", loc.line, loc.col)),
                Some('"') => {
                    self.advance();
                    return Ok(s);
                }
                Some('\\') => {
                    self.advance();
                    match self.current() {
                        Some('n') => s.push('\n'),
                        Some('t') => s.push('\t'),
                        Some('r') => s.push('\r'),
                        Some(c) => s.push(c),
                        None => {
                            return Err(LyreError::syntax(
                                "unterminated string escape",
                                loc.line,
                                loc.col,
                            ))
                        }
                    }
                    self.advance();
                }
                Some(c) => {
                    s.push(c);
                    self.advance();
                }
            }
        }
    }

    fn read_integer(&mut self, loc: SourceLoc) -> Result<Token, LyreError> {
        let mut num = String::new();
        if self.current() == Some('-') {
            num.push('-');
            self.advance();
        }
        while let Some(c) = self.current() {
            if c.is_ascii_digit() {
                num.push(c);
                self.advance();
            } else {
                break;
            }
        }
        num.parse::<i64>()
            .map(Token::Integer)
            .map_err(|_| LyreError::syntax(format!("invalid integer: {}", num), loc.line, loc.col))
    }

    fn read_symbol(&mut self) -> String {
        let mut sym = String::new();
        while let Some(c) = self.current() {
            if c.is_whitespace() || "();\"".contains(c) {
                break;
            }
            sym.push(c);
            self.advance();
        }
        sym
    }

    fn next_token(&mut self) -> Result<Option<TokenWithLoc>, LyreError> {
        self.skip_whitespace();
        let loc = self.loc();

        match self.current() {
            None => Ok(None),
            Some('(') => {
                self.advance();
                Ok(Some(TokenWithLoc {
                    token: Token::LeftParen,
                    loc,
                }))
            }
            Some(')') => {
                self.advance();
                Ok(Some(TokenWithLoc {
                    token: Token::RightParen,
                    loc,
                }))
            }
            Some('"') => self.read_string(loc).map(|s| {
                Some(TokenWithLoc {
                    token: Token::Str(s),
                    loc,
                })
            }),
            Some(c) if c.is_ascii_digit() => self
                .read_integer(loc)
                .map(|t| Some(TokenWithLoc { token: t, loc })),
            Some('-') if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => self
                .read_integer(loc)
                .map(|t| Some(TokenWithLoc { token: t, loc })),
            Some(_) => Ok(Some(TokenWithLoc {
                token: Token::Symbol(self.read_symbol()),
                loc,
            })),
        }
    }
}

struct Reader {
    tokens: Vec<TokenWithLoc>,
    pos: usize,
}

impl Reader {
    fn new(tokens: Vec<TokenWithLoc>) -> Self {
        Reader { tokens, pos: 0 }
    }

    fn current(&self) -> Option<&TokenWithLoc> {
        self.tokens.get(self.pos)
    }

    fn read(&mut self) -> Result<Expr, LyreError> {
        let twl = match self.current() {
            Some(twl) => twl.clone(),
            None => return Err(LyreError::syntax("unexpected end of input", 0, 0)),
        };
        match twl.token {
            Token::LeftParen => self.read_list(twl.loc),
            Token::RightParen => Err(LyreError::syntax(
                "unexpected )",
                twl.loc.line,
                twl.loc.col,
            )),
            Token::Integer(n) => {
                self.pos += 1;
                Ok(Expr::Int(n))
            }
            Token::Str(s) => {
                self.pos += 1;
                Ok(Expr::Str(s))
            }
            Token::Symbol(s) => {
                self.pos += 1;
                Ok(Expr::Sym(s))
            }
        }
    }

    fn read_list(&mut self, open: SourceLoc) -> Result<Expr, LyreError> {
        self.pos += 1; // skip (
        let mut items = Vec::new();
        loop {
            match self.current() {
                None => {
                    return Err(LyreError::syntax("unterminated list", open.line, open.col))
                }
                Some(twl) if twl.token == Token::RightParen => {
                    self.pos += 1;
                    return Ok(Expr::List(items));
                }
                Some(_) => items.push(self.read()?),
            }
        }
    }
}

/// Read every top-level form in `input`.
pub fn read_program(input: &str) -> Result<Vec<Expr>, LyreError> {
    let mut lexer = Lexer::new(input);
    let mut tokens = Vec::new();
    while let Some(token) = lexer.next_token()? {
        tokens.push(token);
    }

    let mut reader = Reader::new(tokens);
    let mut program = Vec::new();
    while reader.current().is_some() {
        program.push(reader.read()?);
    }
    Ok(program)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_integers() {
        assert_eq!(read_program("42").unwrap(), vec![Expr::Int(42)]);
        assert_eq!(read_program("-7").unwrap(), vec![Expr::Int(-7)]);
    }

    #[test]
    fn test_negative_vs_minus_symbol() {
        assert_eq!(
            read_program("(- 1 2)").unwrap(),
            vec![Expr::list(vec![Expr::sym("-"), Expr::Int(1), Expr::Int(2)])]
        );
    }

    #[test]
    fn test_read_nested_list() {
        let program = read_program("(+ 1 (f 2))").unwrap();
        assert_eq!(
            program,
            vec![Expr::list(vec![
                Expr::sym("+"),
                Expr::Int(1),
                Expr::list(vec![Expr::sym("f"), Expr::Int(2)]),
            ])]
        );
    }

    #[test]
    fn test_read_multiple_top_level_forms() {
        let program = read_program("(defn f (x) x) (f 1)").unwrap();
        assert_eq!(program.len(), 2);
    }

    #[test]
    fn test_read_string() {
        assert_eq!(
            read_program(r#""a\"b""#).unwrap(),
            vec![Expr::Str("a\"b".to_string())]
        );
    }

    #[test]
    fn test_comments_skipped() {
        let program = read_program("; ignored\n7 ; trailing\n").unwrap();
        assert_eq!(program, vec![Expr::Int(7)]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(read_program("").unwrap(), Vec::<Expr>::new());
    }

    #[test]
    fn test_unterminated_list() {
        assert!(matches!(
            read_program("(+ 1 2"),
            Err(LyreError::Syntax { .. })
        ));
    }

    #[test]
    fn test_stray_close_paren() {
        assert!(matches!(read_program(")"), Err(LyreError::Syntax { .. })));
    }

    #[test]
    fn test_set_bang_is_one_symbol() {
        assert_eq!(
            read_program("set!").unwrap(),
            vec![Expr::sym("set!")]
        );
    }
}
