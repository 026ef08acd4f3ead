//! Embedded in-memory engine with snapshot persistence
//!
//! Executes the statement shapes listed in the module docs of
//! [`crate::engine`]. The whole statement is tokenized before any clause
//! splitting, so clause keywords inside string literals cannot break
//! parsing. Mutations rewrite the snapshot synchronously; results are
//! returned in primary-key order, which makes every read deterministic.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::predicate::{self, Cursor, Expr, Token};
use super::{snapshot, EngineError, EngineResult, GraphEngine, Params, Row, Rows, StoredRow, Value};

/// One projected item of a RETURN clause.
enum ReturnItem {
    /// `count(<alias>)`
    Count { label: String },
    /// `<alias>.<column>`
    Column { column: String, label: String },
}

/// An embedded engine holding one node table, persisted to a snapshot
/// file at the given path.
#[derive(Debug)]
pub struct MemoryEngine {
    path: PathBuf,
    /// Created node table name, if DDL has run.
    table: Option<String>,
    /// Rows keyed by primary key.
    rows: BTreeMap<String, StoredRow>,
}

impl MemoryEngine {
    /// Opens the engine at `path`, loading a prior snapshot if one exists.
    pub fn open(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref().to_path_buf();
        let rows = snapshot::load(&path)?;
        Ok(Self {
            path,
            // A snapshot implies the table was created before.
            table: rows.as_ref().map(|_| "documents".to_string()),
            rows: rows.unwrap_or_default(),
        })
    }

    /// Returns the snapshot path this engine persists to.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> EngineResult<()> {
        snapshot::save(&self.path, &self.rows)
    }

    fn check_table(&self, name: &str) -> EngineResult<()> {
        match &self.table {
            Some(table) if table == name => Ok(()),
            _ => Err(EngineError::UnknownTable(name.to_string())),
        }
    }

    /// `CREATE NODE TABLE IF NOT EXISTS <name>(...)`
    fn execute_ddl(&mut self, cursor: &mut Cursor) -> EngineResult<Rows> {
        for keyword in ["NODE", "TABLE", "IF", "NOT", "EXISTS"] {
            if !cursor.eat_keyword(keyword) {
                return Err(EngineError::Syntax(format!(
                    "malformed DDL: expected {keyword}"
                )));
            }
        }
        let name = cursor.expect_ident()?;

        // Column definitions are not interpreted; the engine's single
        // table has a fixed layout. Consume the balanced parens.
        cursor.expect(&Token::LParen)?;
        let mut depth = 1usize;
        while depth > 0 {
            match cursor.next() {
                Some(Token::LParen) => depth += 1,
                Some(Token::RParen) => depth -= 1,
                Some(_) => {}
                None => {
                    return Err(EngineError::Syntax(
                        "unbalanced parentheses in DDL".to_string(),
                    ))
                }
            }
        }
        Self::expect_end(cursor)?;

        if self.table.is_none() {
            self.table = Some(name);
        }
        Ok(Rows::default())
    }

    /// `CREATE (d:<table> {prop: $param, ...})`
    fn execute_create(&mut self, cursor: &mut Cursor, params: &Params) -> EngineResult<Rows> {
        cursor.expect(&Token::LParen)?;
        let _alias = cursor.expect_ident()?;
        cursor.expect(&Token::Colon)?;
        let table = cursor.expect_ident()?;
        self.check_table(&table)?;

        cursor.expect(&Token::LBrace)?;
        let mut props: BTreeMap<String, Value> = BTreeMap::new();
        loop {
            let name = cursor.expect_ident()?;
            cursor.expect(&Token::Colon)?;
            let value = match cursor.next() {
                Some(Token::Param(param)) => params
                    .get(&param)
                    .cloned()
                    .ok_or(EngineError::UnknownParameter(param))?,
                Some(Token::Str(s)) => Value::Str(s),
                Some(Token::Int(i)) => Value::Int(i),
                Some(Token::Float(f)) => Value::Float(f),
                other => {
                    return Err(EngineError::Syntax(format!(
                        "bad property value for '{name}': {other:?}"
                    )))
                }
            };
            props.insert(name, value);

            match cursor.next() {
                Some(Token::Comma) => continue,
                Some(Token::RBrace) => break,
                other => {
                    return Err(EngineError::Syntax(format!(
                        "malformed property map: {other:?}"
                    )))
                }
            }
        }
        cursor.expect(&Token::RParen)?;
        Self::expect_end(cursor)?;

        let row = Self::row_from_props(props)?;
        if self.rows.contains_key(&row.id) {
            return Err(EngineError::DuplicateKey(row.id));
        }
        self.rows.insert(row.id.clone(), row);
        self.persist()?;
        Ok(Rows::default())
    }

    fn row_from_props(mut props: BTreeMap<String, Value>) -> EngineResult<StoredRow> {
        fn take_str(props: &mut BTreeMap<String, Value>, name: &str) -> EngineResult<String> {
            match props.remove(name) {
                Some(Value::Str(s)) => Ok(s),
                Some(other) => Err(EngineError::TypeMismatch(format!(
                    "property '{name}' must be a string, got {other:?}"
                ))),
                None => Err(EngineError::TypeMismatch(format!(
                    "missing property '{name}'"
                ))),
            }
        }

        let id = take_str(&mut props, "id")?;
        let content = take_str(&mut props, "content")?;

        let meta_string = match props.remove("meta_STRING") {
            Some(Value::StrMap(map)) => map,
            None => BTreeMap::new(),
            Some(other) => {
                return Err(EngineError::TypeMismatch(format!(
                    "property 'meta_STRING' must be a string map, got {other:?}"
                )))
            }
        };
        let meta_int = match props.remove("meta_INT") {
            Some(Value::IntMap(map)) => map,
            None => BTreeMap::new(),
            Some(other) => {
                return Err(EngineError::TypeMismatch(format!(
                    "property 'meta_INT' must be an int map, got {other:?}"
                )))
            }
        };
        let meta_float = match props.remove("meta_FLOAT") {
            Some(Value::FloatMap(map)) => map,
            None => BTreeMap::new(),
            Some(other) => {
                return Err(EngineError::TypeMismatch(format!(
                    "property 'meta_FLOAT' must be a float map, got {other:?}"
                )))
            }
        };

        if let Some(extra) = props.keys().next() {
            return Err(EngineError::TypeMismatch(format!(
                "unknown property '{extra}'"
            )));
        }

        Ok(StoredRow {
            id,
            content,
            meta_string,
            meta_int,
            meta_float,
        })
    }

    /// `MATCH (d:<table>) [WHERE <expr>] (RETURN ... [LIMIT n] | DELETE d)`
    fn execute_match(&mut self, cursor: &mut Cursor, params: &Params) -> EngineResult<Rows> {
        cursor.expect(&Token::LParen)?;
        let alias = cursor.expect_ident()?;
        cursor.expect(&Token::Colon)?;
        let table = cursor.expect_ident()?;
        cursor.expect(&Token::RParen)?;
        self.check_table(&table)?;

        let filter = if cursor.eat_keyword("WHERE") {
            Some(predicate::parse_expr(cursor)?)
        } else {
            None
        };

        if cursor.eat_keyword("DELETE") {
            let target = cursor.expect_ident()?;
            if target != alias {
                return Err(EngineError::Syntax(format!(
                    "DELETE target '{target}' does not match pattern alias '{alias}'"
                )));
            }
            Self::expect_end(cursor)?;
            return self.delete_matching(filter.as_ref(), params);
        }

        if !cursor.eat_keyword("RETURN") {
            return Err(EngineError::Syntax(
                "expected RETURN or DELETE after pattern".to_string(),
            ));
        }
        let items = Self::parse_return_items(cursor)?;
        let limit = if cursor.eat_keyword("LIMIT") {
            match cursor.next() {
                Some(Token::Int(n)) if n >= 0 => Some(n as usize),
                other => {
                    return Err(EngineError::Syntax(format!(
                        "LIMIT requires a non-negative integer, got {other:?}"
                    )))
                }
            }
        } else {
            None
        };
        Self::expect_end(cursor)?;

        self.select(filter.as_ref(), &items, limit, params)
    }

    fn parse_return_items(cursor: &mut Cursor) -> EngineResult<Vec<ReturnItem>> {
        let mut items = Vec::new();
        loop {
            let first = cursor.expect_ident()?;
            let item = if first.eq_ignore_ascii_case("count") {
                cursor.expect(&Token::LParen)?;
                let counted = cursor.expect_ident()?;
                cursor.expect(&Token::RParen)?;
                let label = if cursor.eat_keyword("AS") {
                    cursor.expect_ident()?
                } else {
                    format!("count({counted})")
                };
                ReturnItem::Count { label }
            } else {
                cursor.expect(&Token::Dot)?;
                let column = cursor.expect_ident()?;
                let label = if cursor.eat_keyword("AS") {
                    cursor.expect_ident()?
                } else {
                    format!("{first}.{column}")
                };
                ReturnItem::Column { column, label }
            };
            items.push(item);

            if !matches!(cursor.peek(), Some(Token::Comma)) {
                break;
            }
            cursor.next();
        }
        Ok(items)
    }

    fn matching_ids(&self, filter: Option<&Expr>, params: &Params) -> EngineResult<Vec<String>> {
        let mut ids = Vec::new();
        for (id, row) in &self.rows {
            let hit = match filter {
                Some(expr) => predicate::eval(expr, row, params)?,
                None => true,
            };
            if hit {
                ids.push(id.clone());
            }
        }
        Ok(ids)
    }

    fn delete_matching(&mut self, filter: Option<&Expr>, params: &Params) -> EngineResult<Rows> {
        let ids = self.matching_ids(filter, params)?;
        if ids.is_empty() {
            return Ok(Rows::default());
        }
        for id in &ids {
            self.rows.remove(id);
        }
        self.persist()?;
        Ok(Rows::default())
    }

    fn select(
        &self,
        filter: Option<&Expr>,
        items: &[ReturnItem],
        limit: Option<usize>,
        params: &Params,
    ) -> EngineResult<Rows> {
        let ids = self.matching_ids(filter, params)?;

        // count(d) aggregates the whole match into a single row.
        if let Some(ReturnItem::Count { label }) = items.first() {
            let row = Row::new(vec![(label.clone(), Value::Int(ids.len() as i64))]);
            return Ok(Rows::new(vec![row]));
        }

        let mut out = Vec::new();
        for id in ids {
            let row = &self.rows[&id];
            let cells = items
                .iter()
                .map(|item| match item {
                    ReturnItem::Column { column, label } => {
                        (label.clone(), row.column(column))
                    }
                    ReturnItem::Count { label } => (label.clone(), Value::Null),
                })
                .collect();
            out.push(Row::new(cells));
            if limit.is_some_and(|n| out.len() >= n) {
                break;
            }
        }
        Ok(Rows::new(out))
    }

    fn expect_end(cursor: &mut Cursor) -> EngineResult<()> {
        match cursor.next() {
            None => Ok(()),
            Some(token) => Err(EngineError::Syntax(format!(
                "unexpected trailing token: {token:?}"
            ))),
        }
    }
}

impl GraphEngine for MemoryEngine {
    fn execute(&mut self, query: &str, params: Params) -> EngineResult<Rows> {
        let mut cursor = Cursor::new(predicate::tokenize(query)?);

        if cursor.eat_keyword("CREATE") {
            if cursor.peek_keyword("NODE") {
                self.execute_ddl(&mut cursor)
            } else {
                self.execute_create(&mut cursor, &params)
            }
        } else if cursor.eat_keyword("MATCH") {
            self.execute_match(&mut cursor, &params)
        } else {
            Err(EngineError::Syntax(
                "statement must start with CREATE or MATCH".to_string(),
            ))
        }
    }
}
