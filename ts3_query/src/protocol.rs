use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Marker ClientQuery puts in every successful status line
pub const SUCCESS_MARKER: &str = "msg=ok";

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("ClientQuery endpoint unavailable at {address}: {source}")]
    Unavailable {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Unexpected welcome banner: {0:?}")]
    UnexpectedBanner(String),

    #[error("Authentication rejected: {0}")]
    AuthRejected(Status),

    #[error("Command `{command}` rejected after {attempts} attempts: {status}")]
    Rejected {
        command: String,
        attempts: u32,
        status: Status,
    },

    #[error("Connection lost: {0}")]
    ConnectionLost(#[from] std::io::Error),

    #[error("No channel matching {0:?}")]
    NoMatch(String),

    #[error("Missing field `{0}` in response")]
    MissingField(String),

    #[error("Invalid value {value:?} for field `{field}`")]
    InvalidField { field: String, value: String },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl QueryError {
    /// Whether the error leaves the connection unusable.
    ///
    /// Fatal errors force the driver to drop the session so the next caller
    /// goes through connect, banner and auth again. A rejected command, a
    /// failed channel lookup or bad caller input leave the connection alone.
    pub fn is_fatal(&self) -> bool {
        match self {
            QueryError::Unavailable { .. }
            | QueryError::UnexpectedBanner(_)
            | QueryError::AuthRejected(_)
            | QueryError::ConnectionLost(_)
            | QueryError::MissingField(_)
            | QueryError::InvalidField { .. } => true,
            QueryError::Rejected { .. } | QueryError::NoMatch(_) | QueryError::InvalidInput(_) => {
                false
            }
        }
    }

    /// Failed before a session existed: endpoint down, wrong service or bad key
    pub fn is_setup(&self) -> bool {
        matches!(
            self,
            QueryError::Unavailable { .. }
                | QueryError::UnexpectedBanner(_)
                | QueryError::AuthRejected(_)
        )
    }
}

/// Escape text for use as a ClientQuery parameter value
pub fn escape(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '\\' => escaped.push_str("\\\\"),
            '/' => escaped.push_str("\\/"),
            ' ' => escaped.push_str("\\s"),
            '|' => escaped.push_str("\\p"),
            '\u{07}' => escaped.push_str("\\a"),
            '\u{08}' => escaped.push_str("\\b"),
            '\u{0C}' => escaped.push_str("\\f"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            '\u{0B}' => escaped.push_str("\\v"),
            other => escaped.push(other),
        }
    }
    escaped
}

/// Reverse of [`escape`]; unknown sequences are kept as-is
pub fn unescape(text: &str) -> String {
    let mut unescaped = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            unescaped.push(ch);
            continue;
        }
        match chars.next() {
            Some('\\') => unescaped.push('\\'),
            Some('/') => unescaped.push('/'),
            Some('s') => unescaped.push(' '),
            Some('p') => unescaped.push('|'),
            Some('a') => unescaped.push('\u{07}'),
            Some('b') => unescaped.push('\u{08}'),
            Some('f') => unescaped.push('\u{0C}'),
            Some('n') => unescaped.push('\n'),
            Some('r') => unescaped.push('\r'),
            Some('t') => unescaped.push('\t'),
            Some('v') => unescaped.push('\u{0B}'),
            Some(other) => {
                unescaped.push('\\');
                unescaped.push(other);
            }
            None => unescaped.push('\\'),
        }
    }
    unescaped
}

/// Success detection is a literal marker check, nothing more
pub fn is_success(text: &str) -> bool {
    text.contains(SUCCESS_MARKER)
}

/// Returns true for the `error id=.. msg=..` line closing every response
pub fn is_status_line(line: &str) -> bool {
    line.starts_with("error ")
}

/// Parsed status line (`error id=0 msg=ok`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub id: u32,
    pub message: String,
}

impl Status {
    pub fn parse(line: &str) -> Option<Self> {
        let rest = line.trim().strip_prefix("error ")?;
        let record = Record::parse(rest);
        let id = record.get("id")?.parse().ok()?;
        let message = record.get("msg").map(unescape).unwrap_or_default();
        Some(Status { id, message })
    }

    pub fn is_ok(&self) -> bool {
        self.id == 0
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "error {} ({})", self.id, self.message)
    }
}

/// One `|`-separated entry of a response body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Record {
    fields: Vec<(String, Option<String>)>,
}

impl Record {
    pub fn parse(entry: &str) -> Self {
        let fields = entry
            .split(' ')
            .filter(|token| !token.is_empty())
            .map(|token| match token.split_once('=') {
                Some((key, value)) => (key.to_string(), Some(value.to_string())),
                None => (token.to_string(), None),
            })
            .collect();
        Record { fields }
    }

    /// Raw (still escaped) value of `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name == key)
            .and_then(|(_, value)| value.as_deref())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.iter().any(|(name, _)| name == key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// A complete response block: body lines followed by a status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    raw: String,
    records: Vec<Record>,
    status: Option<Status>,
}

impl Response {
    /// Build a response from body lines and the closing status line
    pub fn from_lines(body: Vec<String>, status_line: Option<String>) -> Self {
        let records = body
            .iter()
            .flat_map(|line| line.split('|'))
            .map(Record::parse)
            .filter(|record| !record.is_empty())
            .collect();
        let status = status_line.as_deref().and_then(Status::parse);

        let mut raw = body.join("\n");
        if let Some(line) = status_line {
            if !raw.is_empty() {
                raw.push('\n');
            }
            raw.push_str(&line);
        }

        Response {
            raw,
            records,
            status,
        }
    }

    /// Parse a block of text as it comes off the wire (`\n` or `\n\r` separated)
    pub fn parse(text: &str) -> Self {
        let mut body = Vec::new();
        let mut status_line = None;
        for line in text
            .split(['\n', '\r'])
            .map(str::trim)
            .filter(|line| !line.is_empty())
        {
            if is_status_line(line) {
                status_line = Some(line.to_string());
                break;
            }
            body.push(line.to_string());
        }
        Response::from_lines(body, status_line)
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn is_ok(&self) -> bool {
        is_success(&self.raw)
    }

    pub fn status(&self) -> Option<&Status> {
        self.status.as_ref()
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// First value of `key` across all records
    pub fn field(&self, key: &str) -> Option<&str> {
        self.records.iter().find_map(|record| record.get(key))
    }

    pub fn require(&self, key: &str) -> Result<&str, QueryError> {
        self.field(key)
            .ok_or_else(|| QueryError::MissingField(key.to_string()))
    }

    pub fn parse_field<T: FromStr>(&self, key: &str) -> Result<T, QueryError> {
        let value = self.require(key)?;
        value.trim().parse().map_err(|_| QueryError::InvalidField {
            field: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Interpret a `0`/`1` client variable
    pub fn flag(&self, key: &str) -> Result<bool, QueryError> {
        match self.parse_field::<u8>(key)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(QueryError::InvalidField {
                field: key.to_string(),
                value: other.to_string(),
            }),
        }
    }

    /// Status to report when the response was not successful
    pub(crate) fn failure_status(&self) -> Status {
        self.status.clone().unwrap_or_else(|| Status {
            id: u32::MAX,
            message: "missing status line".to_string(),
        })
    }
}
