use helios_primitives::Site;
use thiserror::Error;

/// Compile-time failures. The first occurrence aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum LangError {
    #[error("syntax error at {site}: {message}")]
    Syntax { site: Site, message: String },

    #[error("type error at {site}: {message}")]
    Type { site: Site, message: String },

    #[error("reference error at {site}: {message}")]
    Reference { site: Site, message: String },
}

impl LangError {
    pub fn syntax(site: Site, message: impl Into<String>) -> Self {
        LangError::Syntax {
            site,
            message: message.into(),
        }
    }

    pub fn type_error(site: Site, message: impl Into<String>) -> Self {
        LangError::Type {
            site,
            message: message.into(),
        }
    }

    pub fn reference(site: Site, message: impl Into<String>) -> Self {
        LangError::Reference {
            site,
            message: message.into(),
        }
    }

    pub fn site(&self) -> Site {
        match self {
            LangError::Syntax { site, .. }
            | LangError::Type { site, .. }
            | LangError::Reference { site, .. } => *site,
        }
    }
}

pub type LangResult<T> = Result<T, LangError>;
