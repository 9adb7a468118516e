//! Recursive-descent parser producing an arena-allocated parse tree.
//!
//! Precedence, lowest first:
//!
//! ```text
//! expr    := term (('+'|'-') term)*
//! term    := factor (('*'|'/'|'%') factor)*
//! factor  := base ('^' factor)?
//! base    := '-' base | '+' base | power
//! power   := atom ('^' base)?
//! atom    := NUMBER | IDENT | IDENT '(' args ')' | '(' expr ')'
//! args    := expr (',' expr)* | <empty>
//! ```
//!
//! so `-2^2` is `-(2^2)`, `2^-2` is `2^(-2)` and `2^3^2` is `2^(3^2)`.

use alloc::format;
use alloc::string::ToString;
use bumpalo::Bump;
use bumpalo::collections::Vec as BumpVec;

use crate::engine::CompileOptions;
use crate::error::{ExprError, Result};
use crate::lexer::{Lexer, Token};
use crate::symbols::{Resolved, SymbolTable};
use crate::types::{AstExpr, Callee, Operator, TokenKind, UnaryOp};

struct Parser<'a, 's, 'arena> {
    lexer: Lexer<'a>,
    current: Token<'a>,
    symbols: &'s SymbolTable,
    arena: &'arena Bump,
    depth: usize,
    max_depth: usize,
}

impl<'a, 's, 'arena> Parser<'a, 's, 'arena> {
    fn new(
        input: &'a str,
        symbols: &'s SymbolTable,
        options: &CompileOptions,
        arena: &'arena Bump,
    ) -> Result<Self> {
        let mut lexer = Lexer::new(input);
        let current = lexer.next_token()?;
        Ok(Self {
            lexer,
            current,
            symbols,
            arena,
            depth: 0,
            max_depth: options.max_depth,
        })
    }

    /// Consume the current token and load the next one.
    fn next(&mut self) -> Result<Token<'a>> {
        let token = self.current;
        self.current = self.lexer.next_token()?;
        Ok(token)
    }

    fn unexpected(&self, expected: &str) -> ExprError {
        ExprError::Syntax {
            position: self.current.position,
            message: format!("expected {}, found {}", expected, self.current),
        }
    }

    fn alloc(&self, expr: AstExpr<'arena>) -> &'arena AstExpr<'arena> {
        self.arena.alloc(expr)
    }

    fn current_operator(&self) -> Option<Operator> {
        match self.current.kind {
            TokenKind::Operator(op) => Some(op),
            _ => None,
        }
    }

    fn enter(&mut self) -> Result<()> {
        self.depth += 1;
        if self.depth > self.max_depth {
            return Err(ExprError::RecursionLimit {
                position: self.current.position,
                limit: self.max_depth,
            });
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    fn parse(&mut self) -> Result<AstExpr<'arena>> {
        let expr = self.parse_expr()?;
        if self.current.kind != TokenKind::End {
            return Err(ExprError::Syntax {
                position: self.current.position,
                message: format!("unexpected {} after complete expression", self.current),
            });
        }
        Ok(expr)
    }

    fn parse_expr(&mut self) -> Result<AstExpr<'arena>> {
        let mut lhs = self.parse_term()?;
        while let Some(op @ (Operator::Add | Operator::Sub)) = self.current_operator() {
            self.next()?;
            let rhs = self.parse_term()?;
            lhs = AstExpr::Binary {
                op,
                left: self.alloc(lhs),
                right: self.alloc(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<AstExpr<'arena>> {
        let mut lhs = self.parse_factor()?;
        while let Some(op @ (Operator::Mul | Operator::Div | Operator::Mod)) =
            self.current_operator()
        {
            self.next()?;
            let rhs = self.parse_factor()?;
            lhs = AstExpr::Binary {
                op,
                left: self.alloc(lhs),
                right: self.alloc(rhs),
            };
        }
        Ok(lhs)
    }

    fn parse_factor(&mut self) -> Result<AstExpr<'arena>> {
        let base = self.parse_base()?;
        if self.current_operator() == Some(Operator::Pow) {
            self.next()?;
            let exponent = self.parse_factor()?;
            return Ok(AstExpr::Binary {
                op: Operator::Pow,
                left: self.alloc(base),
                right: self.alloc(exponent),
            });
        }
        Ok(base)
    }

    /// Unary signs, then a power. Each level counts towards the depth limit.
    fn parse_base(&mut self) -> Result<AstExpr<'arena>> {
        self.enter()?;
        let result = match self.current_operator() {
            Some(Operator::Sub) => {
                self.next()?;
                self.parse_base().map(|operand| AstExpr::Unary {
                    op: UnaryOp::Neg,
                    operand: self.alloc(operand),
                })
            }
            Some(Operator::Add) => {
                self.next()?;
                self.parse_base()
            }
            _ => self.parse_power(),
        };
        self.leave();
        result
    }

    fn parse_power(&mut self) -> Result<AstExpr<'arena>> {
        let atom = self.parse_atom()?;
        if self.current_operator() == Some(Operator::Pow) {
            self.next()?;
            let exponent = self.parse_base()?;
            return Ok(AstExpr::Binary {
                op: Operator::Pow,
                left: self.alloc(atom),
                right: self.alloc(exponent),
            });
        }
        Ok(atom)
    }

    fn parse_atom(&mut self) -> Result<AstExpr<'arena>> {
        match self.current.kind {
            TokenKind::Number(value) => {
                self.next()?;
                Ok(AstExpr::Constant(value))
            }
            TokenKind::Identifier => self.parse_identifier(),
            TokenKind::Open => {
                self.next()?;
                let inner = self.parse_expr()?;
                if self.current.kind != TokenKind::Close {
                    return Err(self.unexpected("')'"));
                }
                self.next()?;
                Ok(inner)
            }
            _ => Err(self.unexpected("a number, name or '('")),
        }
    }

    fn parse_identifier(&mut self) -> Result<AstExpr<'arena>> {
        let ident = self.next()?;
        let Some(resolved) = self.symbols.resolve(ident.text) else {
            return Err(ExprError::UnknownSymbol {
                position: ident.position,
                name: ident.text.to_string(),
            });
        };

        match resolved {
            Resolved::Variable { slot } => {
                if self.current.kind == TokenKind::Open {
                    return Err(ExprError::Syntax {
                        position: self.current.position,
                        message: format!("variable '{}' cannot be called", ident.text),
                    });
                }
                Ok(AstExpr::Variable { slot })
            }
            Resolved::Function { callee, arity } => {
                if self.current.kind != TokenKind::Open {
                    if arity == 0 {
                        return Ok(AstExpr::Call { callee, args: &[] });
                    }
                    return Err(self.unexpected(&format!("'(' after function '{}'", ident.text)));
                }
                self.parse_call(ident, callee, arity)
            }
        }
    }

    fn parse_call(
        &mut self,
        ident: Token<'a>,
        callee: Callee,
        arity: usize,
    ) -> Result<AstExpr<'arena>> {
        let open = self.next()?;
        let mut args = BumpVec::new_in(self.arena);

        if self.current.kind != TokenKind::Close {
            loop {
                args.push(self.parse_expr()?);
                match self.current.kind {
                    TokenKind::Comma => {
                        self.next()?;
                    }
                    TokenKind::Close => break,
                    _ => return Err(self.unexpected("',' or ')'")),
                }
            }
        }
        self.next()?;

        if args.len() != arity {
            return Err(ExprError::ArityMismatch {
                position: open.position,
                name: ident.text.to_string(),
                expected: arity,
                found: args.len(),
            });
        }
        Ok(AstExpr::Call {
            callee,
            args: args.into_bump_slice(),
        })
    }
}

/// Parse `input` against `symbols` into a tree allocated in `arena`.
///
/// Fails with the first error found; no partial tree is returned.
pub fn parse_expression<'arena>(
    input: &str,
    symbols: &SymbolTable,
    options: &CompileOptions,
    arena: &'arena Bump,
) -> Result<AstExpr<'arena>> {
    if input.len() > options.max_length {
        return Err(ExprError::Syntax {
            position: overflow_position(input, options.max_length),
            message: format!(
                "expression too long: {} bytes (maximum is {})",
                input.len(),
                options.max_length
            ),
        });
    }
    Parser::new(input, symbols, options, arena)?.parse()
}

/// Start of the first token that does not end within `max_length` bytes.
///
/// Text the lexer rejects before that point, or whitespace running past it, reports the
/// last character boundary at or before `max_length`.
fn overflow_position(input: &str, max_length: usize) -> usize {
    let boundary = (0..=max_length)
        .rev()
        .find(|&i| input.is_char_boundary(i))
        .unwrap_or(0);
    let mut lexer = Lexer::new(input);
    loop {
        match lexer.next_token() {
            Ok(token) if token.kind == TokenKind::End => return boundary,
            Ok(token) if token.position + token.text.len() <= max_length => continue,
            Ok(token) => return token.position.min(boundary),
            Err(_) => return boundary,
        }
    }
}
