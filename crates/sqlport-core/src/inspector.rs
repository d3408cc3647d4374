//! Statement inspection: the last text transform before a statement is prepared.
//!
//! An inspector may return a rewritten statement or `None`, which means "use the
//! original text". Inspectors are either shared by every unit of work
//! ([`InspectorHandle::Shared`]) or owned by one ([`InspectorHandle::Scoped`]); the
//! only difference is who can see them.

use regex::Regex;
use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

/// Inspect (and possibly replace) SQL text before it is prepared.
pub trait StatementInspector: Send + Sync {
    /// Return the SQL to use instead, or `None` to keep `sql` unchanged.
    fn inspect(&self, sql: &str) -> Option<String>;
}

impl<F> StatementInspector for F
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn inspect(&self, sql: &str) -> Option<String> {
        self(sql)
    }
}

/// The inspector configured for a unit of work.
#[derive(Default)]
pub enum InspectorHandle {
    /// No inspection.
    #[default]
    None,
    /// Shared by many units of work.
    Shared(Arc<dyn StatementInspector>),
    /// Owned by a single unit of work.
    Scoped(Box<dyn StatementInspector>),
}

impl InspectorHandle {
    pub fn shared(inspector: Arc<dyn StatementInspector>) -> Self {
        InspectorHandle::Shared(inspector)
    }

    pub fn scoped(inspector: impl StatementInspector + 'static) -> Self {
        InspectorHandle::Scoped(Box::new(inspector))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, InspectorHandle::None)
    }

    /// Apply the inspector to `sql`.
    pub fn apply<'a>(&self, sql: &'a str) -> Cow<'a, str> {
        let inspector: &dyn StatementInspector = match self {
            InspectorHandle::None => return Cow::Borrowed(sql),
            InspectorHandle::Shared(i) => i.as_ref(),
            InspectorHandle::Scoped(i) => i.as_ref(),
        };
        match inspector.inspect(sql) {
            Some(rewritten) => {
                tracing::trace!(original = %sql, sql = %rewritten, "Statement rewritten by inspector");
                Cow::Owned(rewritten)
            }
            None => Cow::Borrowed(sql),
        }
    }
}

impl fmt::Debug for InspectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InspectorHandle::None => f.write_str("InspectorHandle::None"),
            InspectorHandle::Shared(_) => f.write_str("InspectorHandle::Shared(..)"),
            InspectorHandle::Scoped(_) => f.write_str("InspectorHandle::Scoped(..)"),
        }
    }
}

/// Prefixes every statement with a SQL comment, e.g. for tracing statements back to
/// the code that issued them.
#[derive(Debug, Clone)]
pub struct CommentInspector {
    comment: String,
}

impl CommentInspector {
    pub fn new(comment: impl Into<String>) -> Self {
        // A nested terminator would end the comment early.
        let comment = comment.into().replace("*/", "* /");
        Self { comment }
    }
}

impl StatementInspector for CommentInspector {
    fn inspect(&self, sql: &str) -> Option<String> {
        Some(format!("/* {} */ {}", self.comment, sql))
    }
}

/// Rewrites every match of a pattern. Statements without a match are left unchanged.
#[derive(Debug, Clone)]
pub struct RegexInspector {
    pattern: Regex,
    replacement: String,
}

impl RegexInspector {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }
}

impl StatementInspector for RegexInspector {
    fn inspect(&self, sql: &str) -> Option<String> {
        match self.pattern.replace_all(sql, self.replacement.as_str()) {
            Cow::Borrowed(_) => None,
            Cow::Owned(rewritten) => Some(rewritten),
        }
    }
}
