//! Top-down recursive descent over the grouped token stream.
//!
//! Failure is fatal at the first error; diagnostics carry the site of
//! the offending token.

use helios_primitives::{Site, Source};

use crate::ast::*;
use crate::error::{LangError, LangResult};
use crate::lex::{self, Bracket, Sym, Token, TokenKind};

/// Parses one source file into a script.
pub fn parse(source: &Source) -> LangResult<Script> {
    let tokens = lex::tokenize_grouped(source)?;
    let header_site = Site::at(source.id(), 0);

    let mut p = Parser::new(&tokens, header_site);
    let script = p.script()?;
    p.expect_end()?;

    Ok(script)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    fallback: Site,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token], fallback: Site) -> Self {
        Parser {
            tokens,
            pos: 0,
            fallback,
        }
    }

    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, ahead: usize) -> Option<&'a Token> {
        self.tokens.get(self.pos + ahead)
    }

    fn next(&mut self) -> Option<&'a Token> {
        let t = self.tokens.get(self.pos)?;
        self.pos += 1;
        Some(t)
    }

    fn here(&self) -> Site {
        self.peek()
            .map(|t| t.site)
            .unwrap_or_else(|| self.tokens.last().map(|t| t.site).unwrap_or(self.fallback))
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn error(&self, message: impl Into<String>) -> LangError {
        LangError::syntax(self.here(), message.into())
    }

    fn expect_end(&self) -> LangResult<()> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(LangError::syntax(
                t.site,
                format!("unexpected {}", t.describe()),
            )),
        }
    }

    fn expect_word(&mut self, what: &str) -> LangResult<Name> {
        match self.next() {
            Some(t) => match &t.kind {
                TokenKind::Word(w) => Ok(Name::new(w.clone(), t.site)),
                _ => Err(LangError::syntax(
                    t.site,
                    format!("expected {what}, found {}", t.describe()),
                )),
            },
            None => Err(self.error(format!("expected {what}"))),
        }
    }

    fn expect_sym(&mut self, sym: Sym) -> LangResult<Site> {
        match self.next() {
            Some(t) if t.is_sym(sym) => Ok(t.site),
            Some(t) => Err(LangError::syntax(
                t.site,
                format!("expected '{sym}', found {}", t.describe()),
            )),
            None => Err(self.error(format!("expected '{sym}'"))),
        }
    }

    fn eat_sym(&mut self, sym: Sym) -> bool {
        if matches!(self.peek(), Some(t) if t.is_sym(sym)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect_group(&mut self, bracket: Bracket, what: &str) -> LangResult<(&'a Token, &'a [Vec<Token>])> {
        match self.next() {
            Some(t) => match &t.kind {
                TokenKind::Group {
                    bracket: b,
                    fields,
                } if *b == bracket => Ok((t, fields.as_slice())),
                _ => Err(LangError::syntax(
                    t.site,
                    format!("expected {what}, found {}", t.describe()),
                )),
            },
            None => Err(self.error(format!("expected {what}"))),
        }
    }

    fn peek_group(&self, bracket: Bracket) -> bool {
        matches!(
            self.peek(),
            Some(Token {
                kind: TokenKind::Group { bracket: b, .. },
                ..
            }) if *b == bracket
        )
    }

    // ----- script & statements

    fn script(&mut self) -> LangResult<Script> {
        let purpose_name = self.expect_word("purpose keyword")?;

        let purpose = Purpose::from_keyword(&purpose_name.text).ok_or_else(|| {
            LangError::syntax(
                purpose_name.site,
                format!("unknown purpose '{}'", purpose_name.text),
            )
        })?;

        let name = self.expect_word("script name")?;

        let mut statements = Vec::new();

        while !self.at_end() {
            statements.push(self.statement()?);
        }

        Ok(Script {
            purpose,
            name,
            statements,
            site: purpose_name.site,
        })
    }

    fn statement(&mut self) -> LangResult<Statement> {
        let keyword = match self.peek() {
            Some(t) => t,
            None => return Err(self.error("expected statement")),
        };

        match keyword.word() {
            Some("const") => self.const_statement().map(Statement::Const),
            Some("func") => self.func_statement().map(Statement::Func),
            Some("struct") => self.struct_statement().map(Statement::Struct),
            Some("enum") => self.enum_statement().map(Statement::Enum),
            Some("impl") => self.impl_statement().map(Statement::Impl),
            Some("import") => self.import_statement().map(Statement::Import),
            _ => Err(LangError::syntax(
                keyword.site,
                format!("expected declaration, found {}", keyword.describe()),
            )),
        }
    }

    fn const_statement(&mut self) -> LangResult<ConstStatement> {
        let site = self.expect_word("'const'")?.site;
        let name = self.expect_word("constant name")?;

        let ty = if self.eat_sym(Sym::Colon) {
            Some(self.type_expr()?)
        } else {
            None
        };

        self.expect_sym(Sym::Assign)?;
        let value = self.expr()?;

        Ok(ConstStatement {
            name,
            ty,
            value,
            site,
        })
    }

    fn func_statement(&mut self) -> LangResult<FuncStatement> {
        let site = self.expect_word("'func'")?.site;
        let name = self.expect_word("function name")?;

        let type_params = if self.peek_group(Bracket::Square) {
            let (_, fields) = self.expect_group(Bracket::Square, "type parameters")?;
            fields
                .iter()
                .map(|field| {
                    let mut sub = Parser::new(field, site);
                    let param = sub.expect_word("type parameter")?;
                    sub.expect_end()?;
                    Ok(param)
                })
                .collect::<LangResult<Vec<_>>>()?
        } else {
            vec![]
        };

        let (group, fields) = self.expect_group(Bracket::Paren, "parameter list")?;
        let params = self.param_list(fields, group.site)?;

        self.expect_sym(Sym::Arrow)?;
        let ret = self.type_expr()?;
        let body = self.brace_block()?;

        Ok(FuncStatement {
            name,
            type_params,
            params,
            ret,
            body,
            site,
        })
    }

    /// `name: Type` fields, with a bare `self` allowed in first position
    /// for methods (given the pseudo-type `Self`).
    fn param_list(&mut self, fields: &[Vec<Token>], site: Site) -> LangResult<Vec<(Name, TypeExpr)>> {
        fields
            .iter()
            .enumerate()
            .map(|(i, field)| {
                let mut sub = Parser::new(field, site);
                let name = sub.expect_word("parameter name")?;

                if i == 0 && name.text == "self" && sub.at_end() {
                    let self_ty = TypeExpr::Named {
                        name: Name::new("Self", name.site),
                        args: vec![],
                        site: name.site,
                    };
                    return Ok((name, self_ty));
                }

                sub.expect_sym(Sym::Colon)?;
                let ty = sub.type_expr()?;
                sub.expect_end()?;
                Ok((name, ty))
            })
            .collect()
    }

    fn struct_statement(&mut self) -> LangResult<StructStatement> {
        let site = self.expect_word("'struct'")?.site;
        let name = self.expect_word("struct name")?;

        let (group, fields) = self.expect_group(Bracket::Brace, "struct body")?;
        let fields = self.param_list(fields, group.site)?;

        Ok(StructStatement { name, fields, site })
    }

    fn enum_statement(&mut self) -> LangResult<EnumStatement> {
        let site = self.expect_word("'enum'")?.site;
        let name = self.expect_word("enum name")?;

        let (group, fields) = self.expect_group(Bracket::Brace, "enum body")?;

        let variants = fields
            .iter()
            .map(|field| {
                let mut sub = Parser::new(field, group.site);
                let variant_name = sub.expect_word("variant name")?;

                let variant_fields = if sub.peek_group(Bracket::Brace) {
                    let (inner, inner_fields) = sub.expect_group(Bracket::Brace, "variant fields")?;
                    sub.param_list(inner_fields, inner.site)?
                } else {
                    vec![]
                };

                sub.expect_end()?;

                Ok(EnumVariant {
                    site: variant_name.site,
                    name: variant_name,
                    fields: variant_fields,
                })
            })
            .collect::<LangResult<Vec<_>>>()?;

        Ok(EnumStatement {
            name,
            variants,
            site,
        })
    }

    fn impl_statement(&mut self) -> LangResult<ImplStatement> {
        let site = self.expect_word("'impl'")?.site;
        let ty = self.expect_word("type name")?;

        let (group, fields) = self.expect_group(Bracket::Brace, "impl body")?;

        let mut methods = Vec::new();
        let mut consts = Vec::new();

        for field in fields {
            let mut sub = Parser::new(field, group.site);

            while !sub.at_end() {
                match sub.peek().and_then(Token::word) {
                    Some("func") => methods.push(sub.func_statement()?),
                    Some("const") => consts.push(sub.const_statement()?),
                    _ => {
                        return Err(sub.error("expected 'func' or 'const' in impl block"));
                    }
                }
            }
        }

        Ok(ImplStatement {
            ty,
            methods,
            consts,
            site,
        })
    }

    fn import_statement(&mut self) -> LangResult<ImportStatement> {
        let site = self.expect_word("'import'")?.site;
        let module = self.expect_word("module name")?;

        Ok(ImportStatement { module, site })
    }

    // ----- types

    fn type_expr(&mut self) -> LangResult<TypeExpr> {
        match self.peek() {
            // []T
            Some(Token {
                kind:
                    TokenKind::Group {
                        bracket: Bracket::Square,
                        fields,
                    },
                site,
            }) if fields.is_empty() => {
                let site = *site;
                self.pos += 1;
                let item = self.type_expr()?;
                Ok(TypeExpr::List {
                    site: site.merge(item.site()),
                    item: Box::new(item),
                })
            }
            // (A, B) -> C
            Some(Token {
                kind:
                    TokenKind::Group {
                        bracket: Bracket::Paren,
                        fields,
                    },
                site,
            }) => {
                let site = *site;
                let fields = fields.clone();
                self.pos += 1;

                let params = fields
                    .iter()
                    .map(|field| {
                        let mut sub = Parser::new(field, site);
                        let ty = sub.type_expr()?;
                        sub.expect_end()?;
                        Ok(ty)
                    })
                    .collect::<LangResult<Vec<_>>>()?;

                self.expect_sym(Sym::Arrow)?;
                let ret = self.type_expr()?;

                Ok(TypeExpr::Func {
                    params,
                    site: site.merge(ret.site()),
                    ret: Box::new(ret),
                })
            }
            Some(Token {
                kind: TokenKind::Word(w),
                site,
            }) if w == "Map" => {
                let site = *site;
                self.pos += 1;

                let (group, fields) = self.expect_group(Bracket::Square, "map key type")?;

                if fields.len() != 1 {
                    return Err(LangError::syntax(group.site, "expected one map key type"));
                }

                let mut sub = Parser::new(&fields[0], group.site);
                let key = sub.type_expr()?;
                sub.expect_end()?;

                let value = self.type_expr()?;

                Ok(TypeExpr::Map {
                    site: site.merge(value.site()),
                    key: Box::new(key),
                    value: Box::new(value),
                })
            }
            Some(Token {
                kind: TokenKind::Word(w),
                site,
            }) => {
                let name = Name::new(w.clone(), *site);
                let mut site = *site;
                self.pos += 1;

                let args = if self.peek_group(Bracket::Square) {
                    let (group, fields) = self.expect_group(Bracket::Square, "type arguments")?;
                    site = site.merge(group.site);

                    fields
                        .iter()
                        .map(|field| {
                            let mut sub = Parser::new(field, group.site);
                            let ty = sub.type_expr()?;
                            sub.expect_end()?;
                            Ok(ty)
                        })
                        .collect::<LangResult<Vec<_>>>()?
                } else {
                    vec![]
                };

                Ok(TypeExpr::Named { name, args, site })
            }
            Some(t) => Err(LangError::syntax(
                t.site,
                format!("expected type, found {}", t.describe()),
            )),
            None => Err(self.error("expected type")),
        }
    }

    // ----- expressions

    fn expr(&mut self) -> LangResult<Expr> {
        self.or_expr()
    }

    fn or_expr(&mut self) -> LangResult<Expr> {
        let mut left = self.and_expr()?;

        while self.eat_sym(Sym::PipePipe) {
            let right = self.and_expr()?;
            let site = left.site.merge(right.site);
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::Or,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                site,
            );
        }

        Ok(left)
    }

    fn and_expr(&mut self) -> LangResult<Expr> {
        let mut left = self.cmp_expr()?;

        while self.eat_sym(Sym::AmpAmp) {
            let right = self.cmp_expr()?;
            let site = left.site.merge(right.site);
            left = Expr::new(
                ExprKind::Binary {
                    op: BinaryOp::And,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                site,
            );
        }

        Ok(left)
    }

    fn cmp_expr(&mut self) -> LangResult<Expr> {
        let mut left = self.add_expr()?;

        loop {
            let op = match self.peek() {
                Some(t) if t.is_sym(Sym::EqEq) => BinaryOp::Eq,
                Some(t) if t.is_sym(Sym::BangEq) => BinaryOp::Neq,
                Some(t) if t.is_sym(Sym::Lt) => BinaryOp::Lt,
                Some(t) if t.is_sym(Sym::Le) => BinaryOp::Le,
                Some(t) if t.is_sym(Sym::Gt) => BinaryOp::Gt,
                Some(t) if t.is_sym(Sym::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.pos += 1;

            let right = self.add_expr()?;
            let site = left.site.merge(right.site);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                site,
            );
        }

        Ok(left)
    }

    fn add_expr(&mut self) -> LangResult<Expr> {
        let mut left = self.mul_expr()?;

        loop {
            let op = match self.peek() {
                Some(t) if t.is_sym(Sym::Plus) => BinaryOp::Add,
                Some(t) if t.is_sym(Sym::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.pos += 1;

            let right = self.mul_expr()?;
            let site = left.site.merge(right.site);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                site,
            );
        }

        Ok(left)
    }

    fn mul_expr(&mut self) -> LangResult<Expr> {
        let mut left = self.unary_expr()?;

        loop {
            let op = match self.peek() {
                Some(t) if t.is_sym(Sym::Star) => BinaryOp::Mul,
                Some(t) if t.is_sym(Sym::Slash) => BinaryOp::Div,
                Some(t) if t.is_sym(Sym::Percent) => BinaryOp::Rem,
                _ => break,
            };
            self.pos += 1;

            let right = self.unary_expr()?;
            let site = left.site.merge(right.site);
            left = Expr::new(
                ExprKind::Binary {
                    op,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                site,
            );
        }

        Ok(left)
    }

    fn unary_expr(&mut self) -> LangResult<Expr> {
        let op = match self.peek() {
            Some(t) if t.is_sym(Sym::Bang) => Some((UnaryOp::Not, t.site)),
            Some(t) if t.is_sym(Sym::Minus) => Some((UnaryOp::Neg, t.site)),
            _ => None,
        };

        match op {
            Some((op, site)) => {
                self.pos += 1;
                let operand = self.unary_expr()?;
                let site = site.merge(operand.site);
                Ok(Expr::new(
                    ExprKind::Unary {
                        op,
                        operand: Box::new(operand),
                    },
                    site,
                ))
            }
            None => self.postfix_expr(),
        }
    }

    fn postfix_expr(&mut self) -> LangResult<Expr> {
        let mut expr = self.primary_expr()?;

        loop {
            match self.peek() {
                Some(t) if t.is_sym(Sym::Dot) => {
                    self.pos += 1;
                    let name = self.expect_word("member name")?;

                    if name.text == "switch" && self.peek_group(Bracket::Brace) {
                        expr = self.switch_expr(expr)?;
                    } else {
                        let site = expr.site.merge(name.site);
                        expr = Expr::new(
                            ExprKind::Member {
                                object: Box::new(expr),
                                name,
                            },
                            site,
                        );
                    }
                }
                Some(Token {
                    kind:
                        TokenKind::Group {
                            bracket: Bracket::Paren,
                            fields,
                        },
                    site,
                }) => {
                    let call_site = expr.site.merge(*site);
                    let group_site = *site;
                    let fields = fields.clone();
                    self.pos += 1;

                    let args = fields
                        .iter()
                        .map(|field| {
                            let mut sub = Parser::new(field, group_site);
                            let arg = sub.expr()?;
                            sub.expect_end()?;
                            Ok(arg)
                        })
                        .collect::<LangResult<Vec<_>>>()?;

                    expr = Expr::new(
                        ExprKind::Call {
                            head: Box::new(expr),
                            args,
                        },
                        call_site,
                    );
                }
                Some(Token {
                    kind:
                        TokenKind::Group {
                            bracket: Bracket::Square,
                            fields,
                        },
                    site,
                }) if !fields.is_empty() => {
                    let apply_site = expr.site.merge(*site);
                    let group_site = *site;
                    let fields = fields.clone();
                    self.pos += 1;

                    let args = fields
                        .iter()
                        .map(|field| {
                            let mut sub = Parser::new(field, group_site);
                            let ty = sub.type_expr()?;
                            sub.expect_end()?;
                            Ok(ty)
                        })
                        .collect::<LangResult<Vec<_>>>()?;

                    expr = Expr::new(
                        ExprKind::TypeApply {
                            head: Box::new(expr),
                            args,
                        },
                        apply_site,
                    );
                }
                _ => return Ok(expr),
            }
        }
    }

    fn switch_expr(&mut self, scrutinee: Expr) -> LangResult<Expr> {
        let (group, fields) = self.expect_group(Bracket::Brace, "switch arms")?;

        let mut arms = Vec::new();
        let mut default = None;

        for field in fields {
            let mut sub = Parser::new(field, group.site);
            let first = sub.expect_word("variant name")?;

            if first.text == "else" {
                sub.expect_sym(Sym::FatArrow)?;
                let body = sub.expr()?;
                sub.expect_end()?;

                if default.replace(Box::new(body)).is_some() {
                    return Err(LangError::syntax(first.site, "duplicate else arm"));
                }
                continue;
            }

            let (binder, variant) = if sub.eat_sym(Sym::Colon) {
                let variant = sub.expect_word("variant name")?;
                (Some(first), variant)
            } else {
                (None, first)
            };

            sub.expect_sym(Sym::FatArrow)?;
            let body = sub.expr()?;
            sub.expect_end()?;

            arms.push(SwitchArm {
                site: variant.site,
                binder,
                variant,
                body,
            });
        }

        let site = scrutinee.site.merge(group.site);

        Ok(Expr::new(
            ExprKind::Switch {
                scrutinee: Box::new(scrutinee),
                arms,
                default,
            },
            site,
        ))
    }

    fn primary_expr(&mut self) -> LangResult<Expr> {
        let token = match self.peek() {
            Some(t) => t,
            None => return Err(self.error("expected expression")),
        };

        match &token.kind {
            TokenKind::Int(i) => {
                let expr = Expr::new(ExprKind::Int(i.clone()), token.site);
                self.pos += 1;
                Ok(expr)
            }
            TokenKind::Bool(b) => {
                let expr = Expr::new(ExprKind::Bool(*b), token.site);
                self.pos += 1;
                Ok(expr)
            }
            TokenKind::Str(s) => {
                let expr = Expr::new(ExprKind::Str(s.clone()), token.site);
                self.pos += 1;
                Ok(expr)
            }
            TokenKind::Bytes(bs) => {
                let expr = Expr::new(ExprKind::Bytes(bs.clone()), token.site);
                self.pos += 1;
                Ok(expr)
            }
            TokenKind::Group {
                bracket: Bracket::Paren,
                fields,
            } => {
                let group_site = token.site;
                let fields = fields.clone();
                self.pos += 1;

                // a paren group followed by '->' is a lambda
                if matches!(self.peek(), Some(t) if t.is_sym(Sym::Arrow)) {
                    self.pos += 1;
                    let params = self.lambda_params(&fields, group_site)?;
                    let ret = self.type_expr()?;
                    let body = self.brace_block()?;
                    let site = group_site.merge(body.site);

                    return Ok(Expr::new(
                        ExprKind::Lambda {
                            params,
                            ret: Box::new(ret),
                            body: Box::new(body),
                        },
                        site,
                    ));
                }

                if fields.len() != 1 {
                    return Err(LangError::syntax(
                        group_site,
                        "expected a single parenthesized expression",
                    ));
                }

                let mut sub = Parser::new(&fields[0], group_site);
                let inner = sub.expr()?;
                sub.expect_end()?;
                Ok(inner)
            }
            TokenKind::Group {
                bracket: Bracket::Brace,
                ..
            } => self.brace_block(),
            TokenKind::Group {
                bracket: Bracket::Square,
                fields,
            } if fields.is_empty() => {
                // []Type{item, ...}
                let open_site = token.site;
                self.pos += 1;
                let item = self.type_expr()?;

                let (group, fields) = self.expect_group(Bracket::Brace, "list items")?;

                let items = fields
                    .iter()
                    .map(|field| {
                        let mut sub = Parser::new(field, group.site);
                        let item = sub.expr()?;
                        sub.expect_end()?;
                        Ok(item)
                    })
                    .collect::<LangResult<Vec<_>>>()?;

                Ok(Expr::new(
                    ExprKind::ListLit { item, items },
                    open_site.merge(group.site),
                ))
            }
            TokenKind::Word(w) if w == "if" => self.if_expr(),
            TokenKind::Word(w) if w == "Map" => self.map_literal(),
            TokenKind::Word(w) => {
                let name = Name::new(w.clone(), token.site);
                self.pos += 1;

                // Type::member
                if self.eat_sym(Sym::ColonColon) {
                    let member = self.expect_word("member name")?;
                    let site = name.site.merge(member.site);
                    return Ok(Expr::new(ExprKind::Path { ty: name, member }, site));
                }

                // generic path: Option[Int]::Some
                if self.peek_group(Bracket::Square)
                    && matches!(self.peek_at(1), Some(t) if t.is_sym(Sym::ColonColon))
                {
                    let (group, fields) = self.expect_group(Bracket::Square, "type arguments")?;
                    let group_site = group.site;

                    let args = fields
                        .iter()
                        .map(|field| {
                            let mut sub = Parser::new(field, group_site);
                            let ty = sub.type_expr()?;
                            sub.expect_end()?;
                            Ok(ty)
                        })
                        .collect::<LangResult<Vec<_>>>()?;

                    self.expect_sym(Sym::ColonColon)?;
                    let member = self.expect_word("member name")?;
                    let site = name.site.merge(member.site);

                    let path = Expr::new(ExprKind::Path { ty: name, member }, site);

                    return Ok(Expr::new(
                        ExprKind::TypeApply {
                            head: Box::new(path),
                            args,
                        },
                        site,
                    ));
                }

                // Type{field: value, ...}
                if self.peek_group(Bracket::Brace) {
                    return self.struct_literal(name);
                }

                Ok(Expr::new(ExprKind::Name(name.clone()), name.site))
            }
            _ => Err(LangError::syntax(
                token.site,
                format!("expected expression, found {}", token.describe()),
            )),
        }
    }

    fn lambda_params(
        &mut self,
        fields: &[Vec<Token>],
        site: Site,
    ) -> LangResult<Vec<(Name, TypeExpr)>> {
        fields
            .iter()
            .map(|field| {
                let mut sub = Parser::new(field, site);
                let name = sub.expect_word("parameter name")?;
                sub.expect_sym(Sym::Colon)?;
                let ty = sub.type_expr()?;
                sub.expect_end()?;
                Ok((name, ty))
            })
            .collect()
    }

    fn if_expr(&mut self) -> LangResult<Expr> {
        let if_site = self.expect_word("'if'")?.site;

        let (group, fields) = self.expect_group(Bracket::Paren, "condition")?;

        if fields.len() != 1 {
            return Err(LangError::syntax(group.site, "expected a single condition"));
        }

        let mut sub = Parser::new(&fields[0], group.site);
        let cond = sub.expr()?;
        sub.expect_end()?;

        let then_branch = self.brace_block()?;

        let else_word = self.expect_word("'else'")?;
        if else_word.text != "else" {
            return Err(LangError::syntax(else_word.site, "expected 'else'"));
        }

        let else_branch = if matches!(self.peek(), Some(t) if t.is_word("if")) {
            self.if_expr()?
        } else {
            self.brace_block()?
        };

        let site = if_site.merge(else_branch.site);

        Ok(Expr::new(
            ExprKind::If {
                cond: Box::new(cond),
                then_branch: Box::new(then_branch),
                else_branch: Box::new(else_branch),
            },
            site,
        ))
    }

    fn map_literal(&mut self) -> LangResult<Expr> {
        let map_site = self.expect_word("'Map'")?.site;

        let (kgroup, kfields) = self.expect_group(Bracket::Square, "map key type")?;

        if kfields.len() != 1 {
            return Err(LangError::syntax(kgroup.site, "expected one map key type"));
        }

        let mut sub = Parser::new(&kfields[0], kgroup.site);
        let key = sub.type_expr()?;
        sub.expect_end()?;

        let value = self.type_expr()?;

        let (group, fields) = self.expect_group(Bracket::Brace, "map entries")?;

        let entries = fields
            .iter()
            .map(|field| {
                let split = field
                    .iter()
                    .position(|t| t.is_sym(Sym::Colon))
                    .ok_or_else(|| {
                        LangError::syntax(group.site, "expected 'key: value' map entry")
                    })?;

                let mut ksub = Parser::new(&field[..split], group.site);
                let k = ksub.expr()?;
                ksub.expect_end()?;

                let mut vsub = Parser::new(&field[split + 1..], group.site);
                let v = vsub.expr()?;
                vsub.expect_end()?;

                Ok((k, v))
            })
            .collect::<LangResult<Vec<_>>>()?;

        Ok(Expr::new(
            ExprKind::MapLit {
                key,
                value,
                entries,
            },
            map_site.merge(group.site),
        ))
    }

    fn struct_literal(&mut self, ty: Name) -> LangResult<Expr> {
        let (group, fields) = self.expect_group(Bracket::Brace, "struct fields")?;

        let fields = fields
            .iter()
            .map(|field| {
                // named form: `field: expr`, with care not to split a
                // bare expression that merely contains a colon
                let named = matches!(field.first().and_then(Token::word), Some(_))
                    && matches!(field.get(1), Some(t) if t.is_sym(Sym::Colon));

                if named {
                    let name = Name::new(
                        field[0].word().expect("checked above").to_string(),
                        field[0].site,
                    );

                    let mut sub = Parser::new(&field[2..], group.site);
                    let value = sub.expr()?;
                    sub.expect_end()?;

                    Ok((Some(name), value))
                } else {
                    let mut sub = Parser::new(field, group.site);
                    let value = sub.expr()?;
                    sub.expect_end()?;

                    Ok((None, value))
                }
            })
            .collect::<LangResult<Vec<_>>>()?;

        let site = ty.site.merge(group.site);

        Ok(Expr::new(ExprKind::StructLit { ty, fields }, site))
    }

    /// A `{ ... }` group parsed as a block of `;`-separated statements
    /// ending in a result expression.
    fn brace_block(&mut self) -> LangResult<Expr> {
        let (group, fields) = self.expect_group(Bracket::Brace, "block")?;

        if fields.len() != 1 {
            return Err(LangError::syntax(
                group.site,
                "expected a block of statements",
            ));
        }

        let tokens = &fields[0];
        let mut segments: Vec<&[Token]> = Vec::new();
        let mut from = 0;

        for (i, t) in tokens.iter().enumerate() {
            if t.is_sym(Sym::Semi) {
                segments.push(&tokens[from..i]);
                from = i + 1;
            }
        }
        segments.push(&tokens[from..]);

        let mut stmts = Vec::new();

        for segment in &segments[..segments.len() - 1] {
            stmts.push(self.block_stmt(segment, group.site)?);
        }

        let last = segments.last().expect("at least one segment");
        let mut sub = Parser::new(last, group.site);
        let result = sub.expr()?;
        sub.expect_end()?;

        if stmts.is_empty() {
            return Ok(result);
        }

        Ok(Expr::new(
            ExprKind::Block {
                stmts,
                result: Box::new(result),
            },
            group.site,
        ))
    }

    fn block_stmt(&mut self, segment: &[Token], site: Site) -> LangResult<BlockStmt> {
        let mut sub = Parser::new(segment, site);

        match sub.peek().and_then(Token::word) {
            Some("assert") if matches!(sub.peek_at(1), Some(t) if matches!(&t.kind, TokenKind::Group { bracket: Bracket::Paren, .. })) =>
            {
                let kw = sub.expect_word("'assert'")?;
                let (group, fields) = sub.expect_group(Bracket::Paren, "assert condition")?;

                if fields.is_empty() || fields.len() > 2 {
                    return Err(LangError::syntax(
                        group.site,
                        "expected 'assert(condition)' or 'assert(condition, message)'",
                    ));
                }

                let mut csub = Parser::new(&fields[0], group.site);
                let cond = csub.expr()?;
                csub.expect_end()?;

                let msg = match fields.get(1) {
                    Some(field) => {
                        let mut msub = Parser::new(field, group.site);
                        let msg = msub.expr()?;
                        msub.expect_end()?;
                        Some(msg)
                    }
                    None => None,
                };

                sub.expect_end()?;

                Ok(BlockStmt::Assert {
                    cond,
                    msg,
                    site: kw.site.merge(group.site),
                })
            }
            Some("print") if matches!(sub.peek_at(1), Some(t) if matches!(&t.kind, TokenKind::Group { bracket: Bracket::Paren, .. })) =>
            {
                let kw = sub.expect_word("'print'")?;
                let (group, fields) = sub.expect_group(Bracket::Paren, "print argument")?;

                if fields.len() != 1 {
                    return Err(LangError::syntax(group.site, "expected a single argument"));
                }

                let mut vsub = Parser::new(&fields[0], group.site);
                let value = vsub.expr()?;
                vsub.expect_end()?;
                sub.expect_end()?;

                Ok(BlockStmt::Print {
                    value,
                    site: kw.site.merge(group.site),
                })
            }
            Some(_) => {
                let name = sub.expect_word("binding name")?;

                let ty = if sub.eat_sym(Sym::Colon) {
                    Some(sub.type_expr()?)
                } else {
                    None
                };

                sub.expect_sym(Sym::Assign)?;
                let value = sub.expr()?;
                sub.expect_end()?;

                Ok(BlockStmt::Bind { name, ty, value })
            }
            None => Err(sub.error("expected block statement")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_str(text: &str) -> LangResult<Script> {
        parse(&Source::new(0, "test.hl", text))
    }

    #[test]
    fn parses_header_and_function() {
        let script = parse_str("testing adder func main(a: Int, b: Int) -> Int { a + b }").unwrap();

        assert_eq!(script.purpose, Purpose::Testing);
        assert_eq!(script.name.text, "adder");
        assert_eq!(script.statements.len(), 1);

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };
        assert_eq!(func.name.text, "main");
        assert_eq!(func.params.len(), 2);
    }

    #[test]
    fn precedence_nests_or_above_mul() {
        let script = parse_str("testing p func main() -> Bool { true || false && 1 + 2 * 3 == 7 }")
            .unwrap();

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };

        // top node must be ||
        let ExprKind::Binary { op, .. } = &func.body.kind else {
            panic!("expected binary");
        };
        assert_eq!(*op, BinaryOp::Or);
    }

    #[test]
    fn parses_struct_enum_impl() {
        let script = parse_str(
            r#"
            module shapes

            struct Point { x: Int, y: Int }

            enum Shape {
                Circle { radius: Int },
                Unit
            }

            impl Point {
                const ORIGIN: Point = Point{x: 0, y: 0}
                func flip(self) -> Point { Point{x: self.y, y: self.x} }
            }
            "#,
        )
        .unwrap();

        assert_eq!(script.statements.len(), 3);

        let Statement::Enum(e) = &script.statements[1] else {
            panic!("expected enum");
        };
        assert_eq!(e.variants.len(), 2);
        assert_eq!(e.variants[0].fields.len(), 1);

        let Statement::Impl(i) = &script.statements[2] else {
            panic!("expected impl");
        };
        assert_eq!(i.methods.len(), 1);
        assert_eq!(i.consts.len(), 1);
    }

    #[test]
    fn parses_switch_with_binder_and_else() {
        let script = parse_str(
            "testing s func main(o: Option[Int]) -> Int { o.switch { x: Some => x.some, else => 0 } }",
        )
        .unwrap();

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };
        let ExprKind::Switch { arms, default, .. } = &func.body.kind else {
            panic!("expected switch, got {:?}", func.body.kind);
        };
        assert_eq!(arms.len(), 1);
        assert!(arms[0].binder.is_some());
        assert!(default.is_some());
    }

    #[test]
    fn parses_blocks_with_bindings() {
        let script = parse_str(
            "testing b func main() -> Int { x = 1; y: Int = x + 1; print(\"hi\"); assert(y == 2); x + y }",
        )
        .unwrap();

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };
        let ExprKind::Block { stmts, .. } = &func.body.kind else {
            panic!("expected block");
        };
        assert_eq!(stmts.len(), 4);
        assert!(matches!(stmts[2], BlockStmt::Print { .. }));
        assert!(matches!(stmts[3], BlockStmt::Assert { .. }));
    }

    #[test]
    fn assert_takes_an_optional_message() {
        let script = parse_str(
            "testing a func main(x: Int) -> Int { assert(x > 0, \"boom\"); assert(x < 9); x }",
        )
        .unwrap();

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };
        let ExprKind::Block { stmts, .. } = &func.body.kind else {
            panic!("expected block");
        };

        assert!(matches!(&stmts[0], BlockStmt::Assert { msg: Some(_), .. }));
        assert!(matches!(&stmts[1], BlockStmt::Assert { msg: None, .. }));
    }

    #[test]
    fn parses_collection_literals_and_paths() {
        let script = parse_str(
            "testing c func main() -> Int { xs = []Int{1, 2, 3}; m = Map[Int]Int{1: 10}; o = Option[Int]::None; xs.length + m.length }",
        )
        .unwrap();

        let Statement::Func(func) = &script.statements[0] else {
            panic!("expected func");
        };
        let ExprKind::Block { stmts, .. } = &func.body.kind else {
            panic!("expected block");
        };
        assert!(matches!(
            &stmts[0],
            BlockStmt::Bind { value, .. } if matches!(value.kind, ExprKind::ListLit { .. })
        ));
        assert!(matches!(
            &stmts[1],
            BlockStmt::Bind { value, .. } if matches!(value.kind, ExprKind::MapLit { .. })
        ));
        assert!(matches!(
            &stmts[2],
            BlockStmt::Bind { value, .. } if matches!(value.kind, ExprKind::TypeApply { .. })
        ));
    }

    #[test]
    fn first_error_is_fatal_with_site() {
        let err = parse_str("testing x func main( -> Int { 1 }").unwrap_err();
        assert!(matches!(err, LangError::Syntax { .. }));
    }
}
