use super::{Changeset, ChangesetType};
use crate::common::{
    checksum_file, checksum_files, Version, DESIGN_DOCUMENT_EXTENSION, DOCUMENT_FILE_EXTENSION,
    QUERY_SCRIPT_EXTENSION, SEARCH_INDEX_EXTENSION,
};
use crate::errors::{ErrorKind, MoveError, MoveResult};
use regex::Regex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static CHANGESET_NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[vV](?P<version>[^_]+)__(?P<description>.+)$")
        .expect("changeset name pattern is valid")
});

/// Scans a changesets root and builds the ordered catalogue of changesets.
///
/// The locator only reads the filesystem. Hidden entries (names starting with
/// `.`) are ignored, every other entry must be a valid changeset.
///
/// # Examples
///
/// ```rust,no_run
/// use docmove::changeset::ChangesetLocator;
///
/// let changesets = ChangesetLocator::new("db/migration").locate()?;
/// for changeset in &changesets {
///     println!("{}", changeset);
/// }
/// # Ok::<(), docmove::errors::MoveError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ChangesetLocator {
    root: PathBuf,
}

impl ChangesetLocator {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        ChangesetLocator {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Reads the root and returns its changesets sorted by version, then script.
    ///
    /// # Errors
    ///
    /// * `InvalidPath` if the root is missing or not a directory
    /// * `UnknownChangesetType` for an entry with an unmapped extension
    /// * `InvalidChangesetName` for an entry not named `V<version>__<description>`
    /// * `DuplicateChangeset` if two scripts differ only by letter case
    pub fn locate(&self) -> MoveResult<Vec<Changeset>> {
        validate_root(&self.root)?;

        let mut changesets = Vec::new();
        let mut scripts: HashMap<String, String> = HashMap::new();

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let script = file_name(&path)?;
            if script.starts_with('.') {
                log::debug!("Ignoring hidden entry {}", path.display());
                continue;
            }

            if let Some(existing) = scripts.insert(script.to_lowercase(), script.clone()) {
                return Err(MoveError::new(
                    &format!("Changesets '{}' and '{}' share the same script name", existing, script),
                    ErrorKind::DuplicateChangeset,
                ));
            }

            changesets.push(read_changeset(&path, &script)?);
        }

        changesets.sort_by(|a, b| {
            a.version()
                .cmp(b.version())
                .then_with(|| a.script().cmp(b.script()))
        });

        log::debug!(
            "Located {} changesets under {}",
            changesets.len(),
            self.root.display()
        );
        Ok(changesets)
    }
}

fn validate_root(root: &Path) -> MoveResult<()> {
    if !root.exists() {
        return Err(MoveError::new(
            &format!("Changesets root '{}' does not exist", root.display()),
            ErrorKind::InvalidPath,
        ));
    }
    if !root.is_dir() {
        return Err(MoveError::new(
            &format!("Changesets root '{}' is not a directory", root.display()),
            ErrorKind::InvalidPath,
        ));
    }
    Ok(())
}

fn file_name(path: &Path) -> MoveResult<String> {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.to_string())
        .ok_or_else(|| {
            MoveError::new(
                &format!("Changeset path '{}' is not valid UTF-8", path.display()),
                ErrorKind::InvalidChangesetName,
            )
        })
}

fn read_changeset(path: &Path, script: &str) -> MoveResult<Changeset> {
    let changeset_type = classify(path)?;
    let name = match changeset_type {
        ChangesetType::Documents => script,
        _ => path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or(script),
    };
    let (version, description) = parse_name(name)?;

    let checksum = match changeset_type {
        ChangesetType::Documents => checksum_files(&document_files(path)?)?,
        _ => checksum_file(path)?,
    };

    Ok(Changeset::new(
        changeset_type,
        version,
        &description,
        script,
        &checksum,
        path.to_path_buf(),
    ))
}

/// Determines the changeset type of `path`.
///
/// Directories hold documents; files are classified by extension, ignoring case.
///
/// ```rust
/// use docmove::changeset::{classify, ChangesetType};
/// use std::path::Path;
///
/// assert_eq!(classify(Path::new("V1__user.JSON")).unwrap(), ChangesetType::DesignDocument);
/// assert!(classify(Path::new("toto.toto")).is_err());
/// ```
pub fn classify(path: &Path) -> MoveResult<ChangesetType> {
    if path.is_dir() {
        return Ok(ChangesetType::Documents);
    }

    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        DESIGN_DOCUMENT_EXTENSION => Ok(ChangesetType::DesignDocument),
        QUERY_SCRIPT_EXTENSION => Ok(ChangesetType::QueryScript),
        SEARCH_INDEX_EXTENSION => Ok(ChangesetType::SearchIndex),
        _ => Err(MoveError::new(
            &format!("Unknown changeset type for '{}'", path.display()),
            ErrorKind::UnknownChangesetType,
        )),
    }
}

/// Splits a changeset name (without extension) into its version and description.
///
/// Underscores in the description are read as spaces.
///
/// ```rust
/// use docmove::changeset::parse_name;
///
/// let (version, description) = parse_name("V0.1__insert_users").unwrap();
/// assert_eq!(version.as_str(), "0.1");
/// assert_eq!(description, "insert users");
/// ```
pub fn parse_name(name: &str) -> MoveResult<(Version, String)> {
    let captures = CHANGESET_NAME.captures(name).ok_or_else(|| {
        MoveError::new(
            &format!(
                "Invalid changeset name '{}', expected V<version>__<description>",
                name
            ),
            ErrorKind::InvalidChangesetName,
        )
    })?;

    let version = Version::parse(&captures["version"]).map_err(|e| {
        MoveError::new_with_cause(
            &format!("Invalid version in changeset name '{}'", name),
            ErrorKind::InvalidChangesetName,
            e,
        )
    })?;

    let description = captures["description"].replace('_', " ").trim().to_string();
    if description.is_empty() {
        return Err(MoveError::new(
            &format!("Changeset name '{}' has an empty description", name),
            ErrorKind::InvalidChangesetName,
        ));
    }

    Ok((version, description))
}

/// Lists the json files of a documents changeset, sorted by file name.
pub fn document_files(folder: &Path) -> MoveResult<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(folder)? {
        let path = entry?.path();
        let is_json = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.eq_ignore_ascii_case(DOCUMENT_FILE_EXTENSION))
            .unwrap_or(false);

        if path.is_file() && is_json {
            files.push(path);
        } else {
            log::debug!("Ignoring non-document entry {}", path.display());
        }
    }
    files.sort();
    Ok(files)
}
