use std::{iter::Peekable, ops::Range, str::FromStr};

use crate::{
    DataType, DatabaseError, Result, Value,
    db::table::{MatchOperator, Row},
    sql::lexer::{Lexer, Token},
};

pub use ast::*;
pub use keyword::Keyword;

pub(crate) mod ast;
pub(crate) mod keyword;

/// SQL parser that converts tokens into a [`Statement`].
///
/// Uses recursive descent over a peekable token stream. Errors carry the
/// span of the offending token so they render against the query text.
pub struct SqlParser<'src> {
    query: &'src str,

    /// Token stream from the lexer
    lexer: Peekable<Lexer<'src>>,

    /// Span of the most recently consumed token.
    last_span: Range<usize>,
}

impl<'src> SqlParser<'src> {
    /// Creates a new parser for the given SQL query string.
    pub fn new(query: &'src str) -> Self {
        Self {
            query,
            lexer: Lexer::new(query).peekable(),
            last_span: 0..0,
        }
    }

    /// Parses a single statement. A trailing `;` is allowed.
    pub fn parse(&mut self) -> Result<Statement> {
        let statement = match self.next_token()? {
            Token::Keyword(Keyword::Create) => match self.next_token()? {
                Token::Keyword(Keyword::Table) => self.parse_create_table()?,
                Token::Keyword(Keyword::Index) => self.parse_create_index()?,
                t => return Err(self.unexpected(&t, "TABLE or INDEX")),
            },
            Token::Keyword(Keyword::Drop) => match self.next_token()? {
                Token::Keyword(Keyword::Table) => self.parse_drop_table()?,
                Token::Keyword(Keyword::Index) => self.parse_drop_index()?,
                t => return Err(self.unexpected(&t, "TABLE or INDEX")),
            },
            Token::Keyword(Keyword::Insert) => self.parse_insert()?,
            Token::Keyword(Keyword::Select) => self.parse_select()?,
            Token::Keyword(Keyword::Update) => self.parse_update()?,
            Token::Keyword(Keyword::Delete) => self.parse_delete()?,
            t => {
                return Err(self.error(format!("Unsupported statement starting with '{t}'")));
            }
        };

        self.expect_end()?;
        Ok(statement)
    }

    fn parse_create_table(&mut self) -> Result<Statement> {
        let if_not_exists = if self.consume_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Not)?;
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };

        let table_name = self.expect_identifier()?;

        self.expect_token(Token::LeftParen)?;

        let mut columns = vec![self.parse_column_definition()?];
        while self.consume_if(Token::Comma) {
            columns.push(self.parse_column_definition()?);
        }

        self.expect_token(Token::RightParen)?;

        Ok(Statement::CreateTable(CreateStatement {
            table_name,
            if_not_exists,
            columns,
        }))
    }

    fn parse_column_definition(&mut self) -> Result<ColumnDefinition> {
        let name = self.expect_identifier()?;

        let data_type = match self.peek() {
            Some(Token::Identifier(_)) => {
                let ident = self.expect_identifier()?;
                let data_type = DataType::from_str(&ident)
                    .map_err(|_| self.error(format!("Unknown data type '{ident}'")))?;

                // Sizes such as VARCHAR(255) are accepted and ignored.
                if self.peek_is(&Token::LeftParen) {
                    self.skip_parenthesized()?;
                }

                data_type
            }
            _ => DataType::Text,
        };

        let mut constraints = vec![];

        while !self.peek_is(&Token::RightParen) && !self.peek_is(&Token::Comma) {
            let constraint = match self.next_token()? {
                Token::Keyword(Keyword::Not) => {
                    self.expect_keyword(Keyword::Null)?;
                    ColumnConstraint::NotNull
                }
                Token::Keyword(Keyword::Primary) => {
                    self.expect_keyword(Keyword::Key)?;
                    ColumnConstraint::PrimaryKey
                }
                Token::Keyword(Keyword::Unique) => ColumnConstraint::Unique,
                Token::Keyword(Keyword::Null) => ColumnConstraint::Nullable,
                t => return Err(self.unexpected(&t, "a column constraint")),
            };

            constraints.push(constraint);
        }

        Ok(ColumnDefinition {
            name,
            data_type,
            constraints,
        })
    }

    fn parse_drop_table(&mut self) -> Result<Statement> {
        let if_exists = if self.consume_keyword(Keyword::If) {
            self.expect_keyword(Keyword::Exists)?;
            true
        } else {
            false
        };

        Ok(Statement::DropTable {
            table_name: self.expect_identifier()?,
            if_exists,
        })
    }

    fn parse_create_index(&mut self) -> Result<Statement> {
        let index_name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table_name = self.expect_identifier()?;

        self.expect_token(Token::LeftParen)?;
        let column_name = self.expect_identifier()?;
        self.expect_token(Token::RightParen)?;

        Ok(Statement::CreateIndex {
            index_name,
            table_name,
            column_name,
        })
    }

    fn parse_drop_index(&mut self) -> Result<Statement> {
        let index_name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;
        let table_name = self.expect_identifier()?;

        Ok(Statement::DropIndex {
            index_name,
            table_name,
        })
    }

    fn parse_insert(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::Into)?;
        let table_name = self.expect_identifier()?;

        let columns = if self.consume_if(Token::LeftParen) {
            let columns = self.parse_identifier_list()?;
            self.expect_token(Token::RightParen)?;
            Some(columns)
        } else {
            None
        };

        self.expect_keyword(Keyword::Values)?;
        self.expect_token(Token::LeftParen)?;
        let values_start = self.last_span.start;

        let mut values = vec![self.parse_literal()?];
        while self.consume_if(Token::Comma) {
            values.push(self.parse_literal()?);
        }

        self.expect_token(Token::RightParen)?;

        if let Some(columns) = &columns
            && columns.len() != values.len()
        {
            return Err(DatabaseError::syntax(
                self.query,
                values_start..self.last_span.end,
                format!(
                    "{} columns listed but {} values given",
                    columns.len(),
                    values.len()
                ),
            ));
        }

        Ok(Statement::Insert(InsertStatement {
            table_name,
            columns,
            values,
        }))
    }

    fn parse_select(&mut self) -> Result<Statement> {
        let select_list = self.parse_targets()?;

        self.expect_keyword(Keyword::From)?;
        let table_name = self.expect_identifier()?;

        let mut filter = None;
        let mut order_by = None;
        let mut join = None;

        while let Some(Token::Keyword(keyword)) = self.peek() {
            let keyword = *keyword;
            match keyword {
                Keyword::Where if filter.is_none() => {
                    self.next_token()?;
                    filter = Some(self.parse_where()?);
                }
                Keyword::Order if order_by.is_none() => {
                    self.next_token()?;
                    order_by = Some(self.parse_order_by()?);
                }
                Keyword::Join | Keyword::Inner | Keyword::Left if join.is_none() => {
                    join = Some(self.parse_join(&table_name)?);
                }
                Keyword::Where | Keyword::Order | Keyword::Join | Keyword::Inner | Keyword::Left => {
                    self.next_token()?;
                    return Err(self.error(format!("{keyword} clause given more than once")));
                }
                _ => break,
            }
        }

        Ok(Statement::Select(SelectStatement {
            select_list,
            table_name,
            filter,
            order_by,
            join,
        }))
    }

    fn parse_targets(&mut self) -> Result<Vec<SelectTarget>> {
        let mut targets = Vec::new();

        loop {
            if self.consume_if(Token::Asterisk) {
                targets.push(SelectTarget::Star);
            } else {
                targets.push(SelectTarget::Column(self.parse_column_ref()?));
            }

            if !self.consume_if(Token::Comma) {
                break;
            }
        }

        Ok(targets)
    }

    /// `column (= | LIKE) literal [AND ...]`
    fn parse_where(&mut self) -> Result<WhereClause> {
        let mut operator = None;
        let mut conditions = Vec::new();

        loop {
            let column = self.parse_column_ref()?;

            let this = match self.next_token()? {
                Token::Equal => MatchOperator::Equal,
                Token::Keyword(Keyword::Like) => MatchOperator::Like,
                t => return Err(self.unexpected(&t, "'=' or LIKE")),
            };

            match operator {
                Some(op) if op != this => {
                    return Err(self.error("Cannot mix '=' and LIKE in one WHERE clause"));
                }
                _ => operator = Some(this),
            }

            conditions.push((column, self.parse_literal()?));

            if !self.consume_keyword(Keyword::And) {
                break;
            }
        }

        Ok(WhereClause {
            operator: operator.unwrap_or_default(),
            conditions,
        })
    }

    fn parse_order_by(&mut self) -> Result<OrderBy> {
        self.expect_keyword(Keyword::By)?;
        let column = self.parse_column_ref()?;

        let descending = if self.consume_keyword(Keyword::Desc) {
            true
        } else {
            self.consume_keyword(Keyword::Asc);
            false
        };

        Ok(OrderBy { column, descending })
    }

    fn parse_join(&mut self, from_table: &str) -> Result<JoinClause> {
        let kind = match self.next_token()? {
            Token::Keyword(Keyword::Inner) => {
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Inner
            }
            Token::Keyword(Keyword::Left) => {
                self.consume_keyword(Keyword::Outer);
                self.expect_keyword(Keyword::Join)?;
                JoinKind::Left
            }
            _ => JoinKind::Inner,
        };

        let table_name = self.expect_identifier()?;
        self.expect_keyword(Keyword::On)?;

        let mut left = self.parse_column_ref()?;
        self.expect_token(Token::Equal)?;
        let mut right = self.parse_column_ref()?;

        let names = |column: &ColumnRef, table: &str| column.table.as_deref() == Some(table);
        if (names(&right, from_table) && !names(&left, from_table))
            || (names(&left, table_name.as_str()) && !names(&right, table_name.as_str()))
        {
            std::mem::swap(&mut left, &mut right);
        }

        Ok(JoinClause {
            kind,
            table_name,
            left,
            right,
        })
    }

    fn parse_update(&mut self) -> Result<Statement> {
        let table_name = self.expect_identifier()?;
        self.expect_keyword(Keyword::Set)?;

        let mut assignments = Row::new();
        loop {
            let column = self.expect_identifier()?;
            self.expect_token(Token::Equal)?;
            let value = self.parse_literal()?;

            if assignments.set(column.clone(), value).is_some() {
                return Err(self.error(format!("Column {column} assigned more than once")));
            }

            if !self.consume_if(Token::Comma) {
                break;
            }
        }

        let filter = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_where()?)
        } else {
            None
        };

        Ok(Statement::Update(UpdateStatement {
            table_name,
            assignments,
            filter,
        }))
    }

    fn parse_delete(&mut self) -> Result<Statement> {
        self.expect_keyword(Keyword::From)?;
        let table_name = self.expect_identifier()?;

        let filter = if self.consume_keyword(Keyword::Where) {
            Some(self.parse_where()?)
        } else {
            None
        };

        Ok(Statement::Delete(DeleteStatement { table_name, filter }))
    }

    fn parse_column_ref(&mut self) -> Result<ColumnRef> {
        let first = self.expect_identifier()?;

        if self.consume_if(Token::Dot) {
            let column = self.expect_identifier()?;
            Ok(ColumnRef::qualified(&first, &column))
        } else {
            Ok(ColumnRef::new(&first))
        }
    }

    fn parse_identifier_list(&mut self) -> Result<Vec<String>> {
        let mut identifiers = vec![self.expect_identifier()?];
        while self.consume_if(Token::Comma) {
            identifiers.push(self.expect_identifier()?);
        }
        Ok(identifiers)
    }

    fn parse_literal(&mut self) -> Result<Value> {
        match self.next_token()? {
            Token::Integer(i) => Ok(Value::Integer(i)),
            Token::Float(f) => Ok(Value::Float(f)),
            Token::String(s) => Ok(Value::Text(s.into_owned())),
            Token::Keyword(Keyword::Null) => Ok(Value::Null),
            Token::Keyword(kw) if kw.is_bool_literal() => Ok(Value::Boolean(kw == Keyword::True)),
            t => Err(self.unexpected(&t, "a literal value")),
        }
    }

    /// Consumes a balanced `( ... )` group.
    fn skip_parenthesized(&mut self) -> Result<()> {
        self.expect_token(Token::LeftParen)?;

        let mut depth = 1;
        while depth > 0 {
            match self.next_token()? {
                Token::LeftParen => depth += 1,
                Token::RightParen => depth -= 1,
                _ => {}
            }
        }

        Ok(())
    }

    fn next_token(&mut self) -> Result<Token<'src>> {
        match self.lexer.next().transpose()? {
            Some((token, span)) => {
                self.last_span = span;
                Ok(token)
            }
            None => {
                self.last_span = self.query.len()..self.query.len();
                Err(self.error("Unexpected end of input"))
            }
        }
    }

    fn expect_token(&mut self, expected: Token<'src>) -> Result<()> {
        let token = self.next_token()?;
        if token == expected {
            Ok(())
        } else {
            Err(self.unexpected(&token, &format!("'{expected}'")))
        }
    }

    /// Peeks at the next token. Lexer errors surface on the next consume.
    fn peek(&mut self) -> Option<&Token<'src>> {
        match self.lexer.peek() {
            Some(Ok((token, _))) => Some(token),
            _ => None,
        }
    }

    fn peek_is(&mut self, expected: &Token) -> bool {
        self.peek() == Some(expected)
    }

    fn consume_if(&mut self, expected: Token) -> bool {
        if self.peek_is(&expected) {
            if let Some(Ok((_, span))) = self.lexer.next() {
                self.last_span = span;
            }
            true
        } else {
            false
        }
    }

    fn consume_keyword(&mut self, expected: Keyword) -> bool {
        self.consume_if(Token::Keyword(expected))
    }

    /// Reads an identifier and folds it to lower case.
    fn expect_identifier(&mut self) -> Result<String> {
        match self.next_token()? {
            Token::Identifier(ident) => Ok(ident.to_lowercase()),
            Token::Keyword(kw) if kw.is_non_reserved() => Ok(kw.to_string().to_lowercase()),
            got => Err(self.unexpected(&got, "an identifier")),
        }
    }

    fn expect_keyword(&mut self, expected: Keyword) -> Result<()> {
        match self.next_token()? {
            Token::Keyword(kw) if kw == expected => Ok(()),
            other => Err(self.unexpected(&other, &expected.to_string())),
        }
    }

    fn expect_end(&mut self) -> Result<()> {
        self.consume_if(Token::SemiColon);

        match self.lexer.next().transpose()? {
            None => Ok(()),
            Some((token, span)) => {
                self.last_span = span;
                Err(self.error(format!("Unexpected '{token}' after end of statement")))
            }
        }
    }

    fn unexpected(&self, found: &Token, expected: &str) -> DatabaseError {
        self.error(format!("Expected {expected}, found '{found}'"))
    }

    /// Syntax error pointing at the last consumed token.
    fn error(&self, message: impl Into<String>) -> DatabaseError {
        DatabaseError::syntax(self.query, self.last_span.clone(), message)
    }
}
