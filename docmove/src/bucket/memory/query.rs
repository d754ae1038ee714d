use crate::errors::{ErrorKind, MoveError, MoveResult};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

pub(crate) const PRIMARY_INDEX_NAME: &str = "#primary";

static CREATE_PRIMARY_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^CREATE\s+PRIMARY\s+INDEX(?:\s+`?(?P<name>[\w#-]+)`?)?\s+ON\s+`?(?P<keyspace>[\w.-]+)`?(?:\s+USING\s+GSI)?$")
        .expect("create primary index pattern is valid")
});

static CREATE_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^CREATE\s+INDEX\s+`?(?P<name>[\w-]+)`?\s+ON\s+`?(?P<keyspace>[\w.-]+)`?\s*\((?P<fields>.+)\)(?:\s+WHERE\s+.+?)?(?:\s+USING\s+GSI)?$")
        .expect("create index pattern is valid")
});

static DROP_PRIMARY_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^DROP\s+PRIMARY\s+INDEX\s+ON\s+`?(?P<keyspace>[\w.-]+)`?(?:\s+USING\s+GSI)?$")
        .expect("drop primary index pattern is valid")
});

static DROP_INDEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^DROP\s+INDEX\s+`?(?P<keyspace>[\w-]+)`?\.`?(?P<name>[\w#-]+)`?(?:\s+USING\s+GSI)?$")
        .expect("drop index pattern is valid")
});

static WRITE_DOCUMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^(?P<verb>INSERT|UPSERT)\s+INTO\s+`?(?P<keyspace>[\w.-]+)`?\s*\(\s*KEY\s*,\s*VALUE\s*\)\s*VALUES\s*\(\s*"(?P<key>(?:[^"\\]|\\.)*)"\s*,\s*(?P<value>.+)\)$"#)
        .expect("write document pattern is valid")
});

static DELETE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)^DELETE\s+FROM\s+`?(?P<keyspace>[\w.-]+)`?(?:\s+USE\s+KEYS\s+"(?P<key>(?:[^"\\]|\\.)*)")?$"#)
        .expect("delete pattern is valid")
});

static SELECT_IDS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^SELECT\s+RAW\s+META\(\s*\)\.id\s+FROM\s+`?(?P<keyspace>[\w.-]+)`?$")
        .expect("select ids pattern is valid")
});

/// A statement understood by the in-memory query engine.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Statement {
    CreateIndex {
        keyspace: String,
        name: String,
        fields: Vec<String>,
    },
    CreatePrimaryIndex {
        keyspace: String,
        name: String,
    },
    DropIndex {
        keyspace: String,
        name: String,
    },
    Insert {
        keyspace: String,
        key: String,
        value: Value,
    },
    Upsert {
        keyspace: String,
        key: String,
        value: Value,
    },
    Delete {
        keyspace: String,
        key: Option<String>,
    },
    SelectIds {
        keyspace: String,
    },
}

impl Statement {
    pub(crate) fn keyspace(&self) -> &str {
        match self {
            Statement::CreateIndex { keyspace, .. }
            | Statement::CreatePrimaryIndex { keyspace, .. }
            | Statement::DropIndex { keyspace, .. }
            | Statement::Insert { keyspace, .. }
            | Statement::Upsert { keyspace, .. }
            | Statement::Delete { keyspace, .. }
            | Statement::SelectIds { keyspace } => keyspace,
        }
    }
}

/// Parses a single statement, with or without a trailing `;`.
pub(crate) fn parse_statement(statement: &str) -> MoveResult<Statement> {
    let trimmed = statement.trim().trim_end_matches(';').trim();

    if let Some(c) = CREATE_PRIMARY_INDEX.captures(trimmed) {
        return Ok(Statement::CreatePrimaryIndex {
            keyspace: c["keyspace"].to_string(),
            name: c
                .name("name")
                .map(|m| m.as_str().to_string())
                .unwrap_or_else(|| PRIMARY_INDEX_NAME.to_string()),
        });
    }

    if let Some(c) = CREATE_INDEX.captures(trimmed) {
        let fields = c["fields"]
            .split(',')
            .map(|f| f.trim().trim_matches('`').to_string())
            .filter(|f| !f.is_empty())
            .collect::<Vec<_>>();
        return Ok(Statement::CreateIndex {
            keyspace: c["keyspace"].to_string(),
            name: c["name"].to_string(),
            fields,
        });
    }

    if let Some(c) = DROP_PRIMARY_INDEX.captures(trimmed) {
        return Ok(Statement::DropIndex {
            keyspace: c["keyspace"].to_string(),
            name: PRIMARY_INDEX_NAME.to_string(),
        });
    }

    if let Some(c) = DROP_INDEX.captures(trimmed) {
        return Ok(Statement::DropIndex {
            keyspace: c["keyspace"].to_string(),
            name: c["name"].to_string(),
        });
    }

    if let Some(c) = WRITE_DOCUMENT.captures(trimmed) {
        let keyspace = c["keyspace"].to_string();
        let key = unescape(&c["key"]);
        let value: Value = serde_json::from_str(c["value"].trim()).map_err(|e| {
            MoveError::new(
                &format!("Invalid document value in statement '{}': {}", trimmed, e),
                ErrorKind::QueryError,
            )
        })?;

        return Ok(if c["verb"].eq_ignore_ascii_case("INSERT") {
            Statement::Insert {
                keyspace,
                key,
                value,
            }
        } else {
            Statement::Upsert {
                keyspace,
                key,
                value,
            }
        });
    }

    if let Some(c) = DELETE.captures(trimmed) {
        return Ok(Statement::Delete {
            keyspace: c["keyspace"].to_string(),
            key: c.name("key").map(|m| unescape(m.as_str())),
        });
    }

    if let Some(c) = SELECT_IDS.captures(trimmed) {
        return Ok(Statement::SelectIds {
            keyspace: c["keyspace"].to_string(),
        });
    }

    Err(MoveError::new(
        &format!("Syntax error or unsupported statement: '{}'", trimmed),
        ErrorKind::QueryError,
    ))
}

fn unescape(raw: &str) -> String {
    let mut result = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(ch) = chars.next() {
        if ch == '\\' {
            if let Some(next) = chars.next() {
                result.push(next);
            }
        } else {
            result.push(ch);
        }
    }
    result
}
