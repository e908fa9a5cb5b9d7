//! Error type shared by all planner crates.

use std::borrow::Cow;
use std::error::Error;
use std::fmt;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

/// Broad category of an error.
///
/// There's intentionally no "not found" kind. Lookups of unknown elements are
/// valid and produce singleton answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller passed something we can't work with (unknown setting, bad
    /// value).
    InvalidArgument,
    /// An invariant we rely on was broken. Always a bug.
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument => write!(f, "Invalid argument"),
            Self::Internal => write!(f, "Internal"),
        }
    }
}

#[macro_export]
macro_rules! internal {
    ($($arg:tt)+) => {
        $crate::DbError::with_kind($crate::ErrorKind::Internal, format!($($arg)+))
    };
}

#[derive(Debug)]
struct ErrorField {
    key: Cow<'static, str>,
    value: String,
}

#[derive(Debug)]
struct DbErrorInner {
    kind: ErrorKind,
    msg: Cow<'static, str>,
    fields: Vec<ErrorField>,
    source: Option<Box<dyn Error + Send + Sync + 'static>>,
}

/// Error with a message, kind, and optional structured fields.
///
/// Inner state is boxed to keep `Result<T>` small.
#[derive(Debug)]
pub struct DbError {
    inner: Box<DbErrorInner>,
}

impl DbError {
    /// Create a new error with `InvalidArgument` as the kind.
    pub fn new(msg: impl Into<Cow<'static, str>>) -> Self {
        Self::with_kind(ErrorKind::InvalidArgument, msg)
    }

    pub fn with_kind(kind: ErrorKind, msg: impl Into<Cow<'static, str>>) -> Self {
        DbError {
            inner: Box::new(DbErrorInner {
                kind,
                msg: msg.into(),
                fields: Vec::new(),
                source: None,
            }),
        }
    }

    pub fn with_source(
        msg: impl Into<Cow<'static, str>>,
        source: Box<dyn Error + Send + Sync + 'static>,
    ) -> Self {
        let mut err = Self::new(msg);
        err.inner.source = Some(source);
        err
    }

    /// Attach a key/value pair to the error for additional context.
    pub fn with_field<V>(mut self, key: impl Into<Cow<'static, str>>, value: V) -> Self
    where
        V: fmt::Display,
    {
        self.inner.fields.push(ErrorField {
            key: key.into(),
            value: value.to_string(),
        });
        self
    }

    pub fn kind(&self) -> ErrorKind {
        self.inner.kind
    }

    pub fn get_msg(&self) -> &str {
        self.inner.msg.as_ref()
    }

    /// Get the value for a field if it exists.
    pub fn get_field(&self, key: &str) -> Option<&str> {
        self.inner
            .fields
            .iter()
            .find(|f| f.key == key)
            .map(|f| f.value.as_str())
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner.msg)?;
        for field in &self.inner.fields {
            write!(f, "\n  {}: {}", field.key, field.value)?;
        }
        if let Some(source) = &self.inner.source {
            write!(f, "\nError source: {source}")?;
        }
        Ok(())
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.inner
            .source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Extension for converting foreign errors into a `DbError` with some extra
/// context.
pub trait ResultExt<T, E> {
    fn context(self, msg: &'static str) -> Result<T>;
    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ResultExt<T, E> for std::result::Result<T, E>
where
    E: Error + Send + Sync + 'static,
{
    fn context(self, msg: &'static str) -> Result<T> {
        self.map_err(|e| DbError::with_source(msg, Box::new(e)))
    }

    fn context_fn<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| DbError::with_source(f(), Box::new(e)))
    }
}

pub trait OptionExt<T> {
    /// Return an error if the option is None.
    fn required(self, what: &'static str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn required(self, what: &'static str) -> Result<T> {
        self.ok_or_else(|| DbError::new(format!("Missing required value: {what}")))
    }
}
