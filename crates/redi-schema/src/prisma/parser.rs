//! Phase 2 of the Prisma DSL parser (§4.2): recursive descent over the
//! token stream from [`crate::prisma::lexer`] into the [`crate::prisma::ast`]
//! tree.

use crate::error::{ParseError, ParseResult};
use crate::prisma::ast::*;
use crate::prisma::lexer::{Lexer, Pos, Spanned, Token};

pub struct Parser<'a> {
    file: &'a str,
    tokens: Vec<Spanned<Token>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn parse(file: &'a str, source: &str) -> ParseResult<Ast> {
        let tokens = Lexer::new(file, source).tokenize()?;
        let mut parser = Parser { file, tokens, pos: 0 };
        parser.parse_ast()
    }

    fn parse_ast(&mut self) -> ParseResult<Ast> {
        let mut statements = Vec::new();
        while !self.at_end() {
            match self.peek_ident() {
                Some("model") => statements.push(Statement::Model(self.parse_model()?)),
                Some("enum") => statements.push(Statement::Enum(self.parse_enum()?)),
                Some("datasource") | Some("generator") => {
                    self.skip_config_block()?;
                }
                _ => {
                    let found = self.describe_current();
                    return Err(ParseError::UnexpectedToken {
                        file: self.file.to_string(),
                        line: self.current_pos().line,
                        column: self.current_pos().column,
                        expected: "'model', 'enum', 'datasource', or 'generator'".into(),
                        found,
                    });
                }
            }
        }
        Ok(Ast { statements })
    }

    /// `datasource`/`generator` blocks are accepted syntactically (so a
    /// superset schema parses) but carry no IR meaning for this spec; skip
    /// to the matching closing brace.
    fn skip_config_block(&mut self) -> ParseResult<()> {
        self.advance(); // keyword
        self.expect_ident_any()?; // block name
        self.expect(Token::LBrace)?;
        let mut depth = 1;
        while depth > 0 {
            match self.advance() {
                Some(Token::LBrace) => depth += 1,
                Some(Token::RBrace) => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(ParseError::UnexpectedEof {
                        file: self.file.to_string(),
                        expected: "'}'".into(),
                    })
                }
            }
        }
        Ok(())
    }

    fn parse_model(&mut self) -> ParseResult<ModelDecl> {
        self.advance(); // "model"
        let name = self.expect_ident_any()?;
        self.expect(Token::LBrace)?;

        let mut fields = Vec::new();
        let mut block_attributes = Vec::new();

        while self.peek() != Some(&Token::RBrace) {
            if self.peek() == Some(&Token::AtAt) {
                block_attributes.push(self.parse_attribute(true)?);
            } else {
                fields.push(self.parse_field()?);
            }
        }
        self.expect(Token::RBrace)?;

        Ok(ModelDecl { name, fields, block_attributes })
    }

    fn parse_enum(&mut self) -> ParseResult<EnumDecl> {
        self.advance(); // "enum"
        let name = self.expect_ident_any()?;
        self.expect(Token::LBrace)?;

        let mut values = Vec::new();
        while self.peek() != Some(&Token::RBrace) {
            let value_name = self.expect_ident_any()?;
            let mut map = None;
            while self.peek() == Some(&Token::At) {
                let attr = self.parse_attribute(false)?;
                if attr.name == "map" {
                    if let Some(Argument { value: Expr::String(s), .. }) = attr.arguments.first() {
                        map = Some(s.clone());
                    }
                }
            }
            values.push(EnumValueDecl { name: value_name, map });
        }
        self.expect(Token::RBrace)?;

        Ok(EnumDecl { name, values })
    }

    fn parse_field(&mut self) -> ParseResult<FieldDecl> {
        let name = self.expect_ident_any()?;
        let field_type = self.parse_field_type()?;

        let mut attributes = Vec::new();
        while self.peek() == Some(&Token::At) {
            attributes.push(self.parse_attribute(false)?);
        }

        Ok(FieldDecl { name, field_type, attributes })
    }

    fn parse_field_type(&mut self) -> ParseResult<FieldTypeRef> {
        let name = self.expect_ident_any()?;
        let mut list = false;
        let mut optional = false;

        if self.peek() == Some(&Token::LBracket) {
            self.advance();
            self.expect(Token::RBracket)?;
            list = true;
        }
        if self.peek() == Some(&Token::Question) {
            self.advance();
            optional = true;
        }

        Ok(FieldTypeRef { name, list, optional })
    }

    /// Parses `@name(args)` or `@@name(args)`; `is_block` selects which
    /// leading token was already matched by the caller's `peek`.
    fn parse_attribute(&mut self, is_block: bool) -> ParseResult<Attribute> {
        if is_block {
            self.expect(Token::AtAt)?;
        } else {
            self.expect(Token::At)?;
        }

        let mut name = self.expect_ident_any()?;
        while self.peek() == Some(&Token::Dot) {
            self.advance();
            let next = self.expect_ident_any()?;
            name = format!("{name}.{next}");
        }

        let mut arguments = Vec::new();
        if self.peek() == Some(&Token::LParen) {
            self.advance();
            while self.peek() != Some(&Token::RParen) {
                arguments.push(self.parse_argument()?);
                if self.peek() == Some(&Token::Comma) {
                    self.advance();
                }
            }
            self.expect(Token::RParen)?;
        }

        Ok(Attribute { name, arguments })
    }

    fn parse_argument(&mut self) -> ParseResult<Argument> {
        // Named argument lookahead: `ident ':' expr`.
        if let Some(Token::Ident(ident)) = self.peek().cloned() {
            if self.tokens.get(self.pos + 1).map(|t| &t.value) == Some(&Token::Colon) {
                self.advance();
                self.advance();
                let value = self.parse_expr()?;
                return Ok(Argument { name: Some(ident), value });
            }
        }
        let value = self.parse_expr()?;
        Ok(Argument { name: None, value })
    }

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        match self.peek().cloned() {
            Some(Token::String(s)) => {
                self.advance();
                Ok(Expr::String(s))
            }
            Some(Token::Number(n)) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            Some(Token::LBracket) => {
                self.advance();
                let mut items = Vec::new();
                while self.peek() != Some(&Token::RBracket) {
                    items.push(self.parse_expr()?);
                    if self.peek() == Some(&Token::Comma) {
                        self.advance();
                    }
                }
                self.expect(Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::Ident(ident)) => {
                self.advance();
                if self.peek() == Some(&Token::LParen) {
                    self.advance();
                    let mut args = Vec::new();
                    while self.peek() != Some(&Token::RParen) {
                        args.push(self.parse_argument()?);
                        if self.peek() == Some(&Token::Comma) {
                            self.advance();
                        }
                    }
                    self.expect(Token::RParen)?;
                    Ok(Expr::Call(ident, args))
                } else if self.peek() == Some(&Token::Dot) {
                    let mut path = ident;
                    while self.peek() == Some(&Token::Dot) {
                        self.advance();
                        let next = self.expect_ident_any()?;
                        path = format!("{path}.{next}");
                    }
                    Ok(Expr::Ident(path))
                } else {
                    Ok(Expr::Ident(ident))
                }
            }
            _ => {
                let found = self.describe_current();
                Err(ParseError::UnexpectedToken {
                    file: self.file.to_string(),
                    line: self.current_pos().line,
                    column: self.current_pos().column,
                    expected: "an expression".into(),
                    found,
                })
            }
        }
    }

    // --- token-stream helpers -------------------------------------------------

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|t| &t.value)
    }

    fn peek_ident(&self) -> Option<&str> {
        match self.peek() {
            Some(Token::Ident(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    fn advance(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).map(|t| t.value.clone());
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn current_pos(&self) -> Pos {
        self.tokens
            .get(self.pos)
            .map(|t| t.pos)
            .unwrap_or(Pos { line: 0, column: 0 })
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(t) => format!("{t:?}"),
            None => "end of input".to_string(),
        }
    }

    fn expect(&mut self, token: Token) -> ParseResult<()> {
        if self.peek() == Some(&token) {
            self.advance();
            Ok(())
        } else {
            let found = self.describe_current();
            Err(ParseError::UnexpectedToken {
                file: self.file.to_string(),
                line: self.current_pos().line,
                column: self.current_pos().column,
                expected: format!("{token:?}"),
                found,
            })
        }
    }

    fn expect_ident_any(&mut self) -> ParseResult<String> {
        match self.advance() {
            Some(Token::Ident(s)) => Ok(s),
            Some(Token::String(s)) => Ok(s),
            other => Err(ParseError::UnexpectedToken {
                file: self.file.to_string(),
                line: self.current_pos().line,
                column: self.current_pos().column,
                expected: "an identifier".into(),
                found: other.map(|t| format!("{t:?}")).unwrap_or_else(|| "end of input".into()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_model() {
        let src = r#"
            model User {
              id    Int    @id @default(autoincrement())
              email String @unique
              name  String?
              posts Post[]
            }
        "#;
        let ast = Parser::parse("t.prisma", src).unwrap();
        assert_eq!(ast.statements.len(), 1);
        let Statement::Model(model) = &ast.statements[0] else { panic!("expected model") };
        assert_eq!(model.name, "User");
        assert_eq!(model.fields.len(), 4);
        assert_eq!(model.fields[0].name, "id");
        assert!(model.fields[0].attributes.iter().any(|a| a.name == "id"));
        assert_eq!(model.fields[2].field_type.optional, true);
        assert_eq!(model.fields[3].field_type.list, true);
    }

    #[test]
    fn parses_block_attributes_and_relation() {
        let src = r#"
            model Post {
              id       Int    @id
              authorId Int
              author   User   @relation(fields: [authorId], references: [id], onDelete: Cascade)

              @@index([authorId])
              @@map("posts")
            }
        "#;
        let ast = Parser::parse("t.prisma", src).unwrap();
        let Statement::Model(model) = &ast.statements[0] else { panic!() };
        assert_eq!(model.block_attributes.len(), 2);
        let relation_attr = model.fields[2]
            .attributes
            .iter()
            .find(|a| a.name == "relation")
            .unwrap();
        assert_eq!(relation_attr.arguments.len(), 3);
    }

    #[test]
    fn parses_enum_with_map() {
        let src = r#"
            enum Role {
              ADMIN
              USER  @map("regular_user")
            }
        "#;
        let ast = Parser::parse("t.prisma", src).unwrap();
        let Statement::Enum(e) = &ast.statements[0] else { panic!() };
        assert_eq!(e.values[0].name, "ADMIN");
        assert_eq!(e.values[1].map.as_deref(), Some("regular_user"));
    }

    #[test]
    fn skips_datasource_and_generator_blocks() {
        let src = r#"
            datasource db {
              provider = "postgresql"
              url      = env("DATABASE_URL")
            }
            generator client {
              provider = "prisma-client-js"
            }
            model User {
              id Int @id
            }
        "#;
        let ast = Parser::parse("t.prisma", src).unwrap();
        assert_eq!(ast.statements.len(), 1);
    }

    #[test]
    fn native_type_annotation_parses_as_attribute() {
        let src = r#"
            model Product {
              id    Int     @id
              price Decimal @db.Decimal(10, 2)
            }
        "#;
        let ast = Parser::parse("t.prisma", src).unwrap();
        let Statement::Model(model) = &ast.statements[0] else { panic!() };
        let native = model.fields[1].attributes.iter().find(|a| a.name == "db.Decimal").unwrap();
        assert_eq!(native.arguments.len(), 2);
    }

    #[test]
    fn reports_position_on_syntax_error() {
        let src = "model User {\n  id Int @id\n  bad field here\n}";
        let err = Parser::parse("t.prisma", src).unwrap_err();
        assert!(matches!(err, ParseError::UnexpectedToken { .. }));
    }
}
