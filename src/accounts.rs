//! Demo signup/login backed by spreadsheet-like worksheets
//!
//! Rows are stored as lists of strings. The local backend keeps every
//! worksheet in one JSON document keyed by worksheet name.

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const SIGNUP_SHEET: &str = "Signup Data";
pub const SIGNIN_SHEET: &str = "Signin Data";
pub const DEFAULT_DB_FILE: &str = "local_db.json";

// Signup row layout: name, time, email, password digest
const NAME_COL: usize = 1;
const EMAIL_COL: usize = 3;
const PASSWORD_COL: usize = 4;

/// Account errors
#[derive(Error, Debug)]
pub enum AccountError {
    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("User already exists using this email.")]
    UserExists,

    #[error("User not found. Please Sign Up first.")]
    UserNotFound,

    #[error("Invalid password")]
    InvalidPassword,

    #[error("Storage error: {0}")]
    Storage(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 1-based position of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellRef {
    pub row: usize,
    pub col: usize,
}

/// Minimal spreadsheet surface the account flow needs
pub trait Worksheet {
    fn name(&self) -> &str;

    fn append_row(&mut self, row: Vec<String>) -> Result<(), AccountError>;

    /// Values of a 1-based column, skipping rows that are too short
    fn col_values(&self, col: usize) -> Vec<String>;

    /// First cell equal to `query`, scanning rows then columns
    fn find(&self, query: &str) -> Option<CellRef>;

    /// Values of a 1-based row, empty when out of range
    fn row_values(&self, row: usize) -> Vec<String>;
}

type Workbook = BTreeMap<String, Vec<Vec<String>>>;

/// Worksheet persisted into a shared local JSON file
#[derive(Debug)]
pub struct JsonWorksheet {
    name: String,
    path: PathBuf,
    rows: Vec<Vec<String>>,
}

impl JsonWorksheet {
    /// Open a worksheet, starting empty when the file is missing or unreadable
    pub fn open<P: AsRef<Path>>(path: P, name: &str) -> Self {
        let path = path.as_ref().to_path_buf();
        let rows = match read_workbook(&path) {
            Ok(mut book) => book.remove(name).unwrap_or_default(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable local database");
                Vec::new()
            }
        };
        debug!(worksheet = name, rows = rows.len(), "Local worksheet opened");

        Self {
            name: name.to_string(),
            path,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn save(&self) -> Result<(), AccountError> {
        // Other worksheets share the file; keep their rows
        let mut book = read_workbook(&self.path).unwrap_or_default();
        book.insert(self.name.clone(), self.rows.clone());
        let json = serde_json::to_string_pretty(&book)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

fn read_workbook(path: &Path) -> Result<Workbook, AccountError> {
    if !path.exists() {
        return Ok(Workbook::new());
    }
    let json = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&json)?)
}

impl Worksheet for JsonWorksheet {
    fn name(&self) -> &str {
        &self.name
    }

    fn append_row(&mut self, row: Vec<String>) -> Result<(), AccountError> {
        self.rows.push(row);
        self.save()
    }

    fn col_values(&self, col: usize) -> Vec<String> {
        let Some(idx) = col.checked_sub(1) else {
            return Vec::new();
        };
        self.rows.iter().filter_map(|r| r.get(idx).cloned()).collect()
    }

    fn find(&self, query: &str) -> Option<CellRef> {
        self.rows.iter().enumerate().find_map(|(r, row)| {
            row.iter()
                .position(|cell| cell == query)
                .map(|c| CellRef { row: r + 1, col: c + 1 })
        })
    }

    fn row_values(&self, row: usize) -> Vec<String> {
        row.checked_sub(1)
            .and_then(|idx| self.rows.get(idx))
            .cloned()
            .unwrap_or_default()
    }
}

/// A signed-up or signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub name: String,
    pub email: String,
}

/// Signup and login over two worksheets
pub struct AccountStore<S: Worksheet = JsonWorksheet> {
    signups: S,
    signins: S,
}

impl AccountStore<JsonWorksheet> {
    /// Open both worksheets from one local JSON file
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        info!(path = %path.display(), "Using local account database");
        Self::new(
            JsonWorksheet::open(path, SIGNUP_SHEET),
            JsonWorksheet::open(path, SIGNIN_SHEET),
        )
    }
}

impl<S: Worksheet> AccountStore<S> {
    pub fn new(signups: S, signins: S) -> Self {
        Self { signups, signins }
    }

    /// Register a new user
    pub fn signup(
        &mut self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountError> {
        validate_email(email)?;

        if self.signups.col_values(EMAIL_COL).iter().any(|e| e == email) {
            return Err(AccountError::UserExists);
        }

        self.signups.append_row(vec![
            name.to_string(),
            now_string(),
            email.to_string(),
            password_digest(password),
        ])?;
        info!(email = %email, "Signup saved");

        Ok(Account {
            name: name.to_string(),
            email: email.to_string(),
        })
    }

    /// Check credentials and record the sign-in
    pub fn login(&mut self, email: &str, password: &str) -> Result<Account, AccountError> {
        let cell = self.signups.find(email).ok_or(AccountError::UserNotFound)?;
        let row = self.signups.row_values(cell.row);

        let stored = row.get(PASSWORD_COL - 1).map(String::as_str).unwrap_or("");
        if stored != password_digest(password) {
            warn!(email = %email, "Login rejected");
            return Err(AccountError::InvalidPassword);
        }

        let name = row
            .get(NAME_COL - 1)
            .cloned()
            .unwrap_or_else(|| "Member".to_string());

        self.signins
            .append_row(vec![name.clone(), now_string(), email.to_string()])?;
        info!(email = %email, "Login recorded");

        Ok(Account {
            name,
            email: email.to_string(),
        })
    }

    pub fn signups(&self) -> &S {
        &self.signups
    }

    pub fn signins(&self) -> &S {
        &self.signins
    }
}

fn email_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email pattern"))
}

fn validate_email(email: &str) -> Result<(), AccountError> {
    if email_pattern().is_match(email) {
        Ok(())
    } else {
        Err(AccountError::InvalidEmail(email.to_string()))
    }
}

/// Hex SHA-256 of a password
pub fn password_digest(password: &str) -> String {
    format!("{:x}", Sha256::digest(password.as_bytes()))
}

fn now_string() -> String {
    Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> AccountStore {
        AccountStore::open(dir.path().join(DEFAULT_DB_FILE))
    }

    #[test]
    fn test_signup_then_login() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        let account = store.signup("Asha", "asha@example.com", "s3cret").unwrap();
        assert_eq!(account.name, "Asha");

        let logged_in = store.login("asha@example.com", "s3cret").unwrap();
        assert_eq!(logged_in.name, "Asha");
        assert_eq!(store.signins().len(), 1);
    }

    #[test]
    fn test_duplicate_signup_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);

        store.signup("Asha", "asha@example.com", "a").unwrap();
        let err = store.signup("Other", "asha@example.com", "b").unwrap_err();
        assert!(matches!(err, AccountError::UserExists));
    }

    #[test]
    fn test_invalid_email_rejected() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        let err = store.signup("X", "not-an-email", "pw").unwrap_err();
        assert!(matches!(err, AccountError::InvalidEmail(_)));
    }

    #[test]
    fn test_login_failures() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.signup("Asha", "asha@example.com", "right").unwrap();

        assert!(matches!(
            store.login("nobody@example.com", "x"),
            Err(AccountError::UserNotFound)
        ));
        assert!(matches!(
            store.login("asha@example.com", "wrong"),
            Err(AccountError::InvalidPassword)
        ));
        assert!(store.signins().is_empty());
    }

    #[test]
    fn test_password_is_not_stored_in_plain_text() {
        let dir = TempDir::new().unwrap();
        let mut store = store_in(&dir);
        store.signup("Asha", "asha@example.com", "hunter2").unwrap();

        let row = store.signups().row_values(1);
        assert_eq!(row.len(), 4);
        assert_ne!(row[3], "hunter2");
        assert_eq!(row[3], password_digest("hunter2"));
        assert_eq!(row[3].len(), 64);
    }

    #[test]
    fn test_data_persists_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let mut store = store_in(&dir);
            store.signup("Asha", "asha@example.com", "pw").unwrap();
            store.login("asha@example.com", "pw").unwrap();
        }

        let mut reopened = store_in(&dir);
        assert_eq!(reopened.signups().len(), 1);
        assert_eq!(reopened.signins().len(), 1);
        assert!(reopened.login("asha@example.com", "pw").is_ok());
    }

    #[test]
    fn test_corrupt_database_starts_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(DEFAULT_DB_FILE);
        std::fs::write(&path, "{not json").unwrap();

        let sheet = JsonWorksheet::open(&path, SIGNUP_SHEET);
        assert!(sheet.is_empty());
    }

    #[test]
    fn test_worksheet_lookups() {
        let dir = TempDir::new().unwrap();
        let mut sheet = JsonWorksheet::open(dir.path().join("db.json"), "Sheet");
        sheet
            .append_row(vec!["a".to_string(), "b".to_string()])
            .unwrap();
        sheet.append_row(vec!["c".to_string()]).unwrap();

        assert_eq!(sheet.col_values(2), vec!["b".to_string()]);
        assert_eq!(sheet.col_values(0), Vec::<String>::new());
        assert_eq!(sheet.find("c"), Some(CellRef { row: 2, col: 1 }));
        assert_eq!(sheet.find("zzz"), None);
        assert_eq!(sheet.row_values(1), vec!["a".to_string(), "b".to_string()]);
        assert!(sheet.row_values(0).is_empty());
        assert!(sheet.row_values(9).is_empty());
    }
}
