use super::{execution_error, ChangesetHandler};
use crate::bucket::Bucket;
use crate::changeset::Changeset;
use crate::common::BUCKET_PLACEHOLDER;
use crate::errors::{ErrorKind, MoveError, MoveResult};
use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::fs;
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{(?P<name>[A-Za-z0-9_.-]+)\}").expect("placeholder pattern is valid")
});

/// Runs the statements of a query script in file order.
///
/// `${name}` placeholders are substituted before execution; `${bucket}` is
/// always bound to the target bucket's name.
#[derive(Debug, Default, Clone)]
pub struct QueryScriptHandler {
    placeholders: BTreeMap<String, String>,
}

impl QueryScriptHandler {
    pub fn new(placeholders: BTreeMap<String, String>) -> Self {
        QueryScriptHandler { placeholders }
    }

    /// Splits and resolves a script into the statements it will execute.
    pub fn statements(&self, script: &str, bucket_name: &str) -> MoveResult<Vec<String>> {
        split_statements(script)
            .iter()
            .map(|statement| self.substitute(statement, bucket_name))
            .collect()
    }

    fn substitute(&self, statement: &str, bucket_name: &str) -> MoveResult<String> {
        let mut unresolved = None;
        let resolved = PLACEHOLDER.replace_all(statement, |caps: &Captures| {
            let name = &caps["name"];
            if name == BUCKET_PLACEHOLDER {
                return bucket_name.to_string();
            }
            match self.placeholders.get(name) {
                Some(value) => value.clone(),
                None => {
                    unresolved.get_or_insert_with(|| name.to_string());
                    caps[0].to_string()
                }
            }
        });

        match unresolved {
            Some(name) => Err(MoveError::new(
                &format!("Unresolved placeholder ${{{}}} in statement '{}'", name, statement),
                ErrorKind::ValidationError,
            )),
            None => Ok(resolved.into_owned()),
        }
    }

    fn run(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<usize> {
        let script = fs::read_to_string(changeset.path())?;
        let statements = self.statements(&script, &bucket.name())?;

        for (index, statement) in statements.iter().enumerate() {
            log::debug!("Executing statement {} of {}: {}", index + 1, changeset.script(), statement);
            bucket.query(statement).map_err(|e| {
                MoveError::new_with_cause(
                    &format!(
                        "Statement {} of {} failed after {} succeeded",
                        index + 1,
                        statements.len(),
                        index
                    ),
                    ErrorKind::QueryError,
                    e,
                )
            })?;
        }
        Ok(statements.len())
    }
}

impl ChangesetHandler for QueryScriptHandler {
    fn execute(&self, changeset: &Changeset, bucket: &Bucket) -> MoveResult<()> {
        let count = self
            .run(changeset, bucket)
            .map_err(|e| execution_error(changeset, e))?;
        log::info!("Executed {} statements from {}", count, changeset.script());
        Ok(())
    }
}

/// Splits a script into statements on `;`, dropping comments and blank statements.
///
/// Line comments (`--`, `//`) and block comments (`/* */`) are removed unless
/// they appear inside a quoted string or identifier.
pub fn split_statements(script: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();
    let mut chars = script.chars().peekable();
    let mut quote: Option<char> = None;

    while let Some(ch) = chars.next() {
        if let Some(q) = quote {
            current.push(ch);
            if ch == '\\' {
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            } else if ch == q {
                quote = None;
            }
            continue;
        }

        match ch {
            '\'' | '"' | '`' => {
                quote = Some(ch);
                current.push(ch);
            }
            '-' if chars.peek() == Some(&'-') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'/') => skip_line(&mut chars),
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut previous = '\0';
                for c in chars.by_ref() {
                    if previous == '*' && c == '/' {
                        break;
                    }
                    previous = c;
                }
                current.push(' ');
            }
            ';' => push_statement(&mut statements, &mut current),
            _ => current.push(ch),
        }
    }
    push_statement(&mut statements, &mut current);
    statements
}

fn skip_line<I: Iterator<Item = char>>(chars: &mut I) {
    for c in chars.by_ref() {
        if c == '\n' {
            break;
        }
    }
}

fn push_statement(statements: &mut Vec<String>, current: &mut String) {
    let statement = current.trim();
    if !statement.is_empty() {
        statements.push(statement.to_string());
    }
    current.clear();
}
