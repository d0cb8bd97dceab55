use std::fmt;
use std::time::Duration;

use crate::cache::CacheError;
use crate::http::HttpError;
use crate::model::Permissions;

/// Why a converter rejected an argument.
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionFailure {
    Int,
    Float,
    Bool,
    Literal(Vec<String>),
    User,
    Member,
    Channel,
    Role,
    Category,
    /// Every converter of a union failed, in declaration order.
    Union(Vec<ConversionFailure>),
    Custom(String),
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int => f.write_str("expected an integer"),
            Self::Float => f.write_str("expected a number"),
            Self::Bool => f.write_str("expected yes or no"),
            Self::Literal(choices) => write!(f, "expected one of: {}", choices.join(", ")),
            Self::User => f.write_str("no matching user"),
            Self::Member => f.write_str("no matching member"),
            Self::Channel => f.write_str("no matching channel"),
            Self::Role => f.write_str("no matching role"),
            Self::Category => f.write_str("no matching category"),
            Self::Union(failures) => {
                let parts: Vec<String> = failures.iter().map(ToString::to_string).collect();
                write!(f, "no converter matched ({})", parts.join("; "))
            }
            Self::Custom(reason) => f.write_str(reason),
        }
    }
}

/// Everything that can go wrong while handling one command invocation.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command `{0}` not found")]
    NotFound(String),
    #[error("no closing {quote} quote")]
    UnterminatedQuote { quote: char },
    #[error("missing required argument `{0}`")]
    MissingArgument(String),
    #[error("could not convert `{argument}` for parameter `{param}`: {failure}")]
    Conversion {
        param: String,
        argument: String,
        failure: ConversionFailure,
    },
    #[error("check failed: {0}")]
    CheckFailed(String),
    #[error("this command can only be used in a server")]
    ServerOnly,
    #[error("only the server owner can use this command")]
    NotServerOwner,
    #[error("only the bot owner can use this command")]
    NotBotOwner,
    #[error("missing permissions: {0:?}")]
    MissingPermissions(Permissions),
    #[error("command is on cooldown, retry after {:.2}s", .retry_after.as_secs_f64())]
    OnCooldown { retry_after: Duration },
    #[error("extension `{0}` has no setup function")]
    MissingSetup(String),
    #[error("extension `{0}` is not loaded")]
    ExtensionNotLoaded(String),
    #[error("extension `{0}` is already loaded")]
    ExtensionAlreadyLoaded(String),
    #[error(transparent)]
    Http(#[from] HttpError),
    #[error(transparent)]
    Cache(#[from] CacheError),
    /// The command callback itself failed.
    #[error("command raised an error: {0:#}")]
    Invocation(anyhow::Error),
}

impl CommandError {
    pub(crate) fn conversion(param: &str, argument: &str, failure: ConversionFailure) -> Self {
        Self::Conversion {
            param: param.to_string(),
            argument: argument.to_string(),
            failure,
        }
    }

    /// Errors raised by a check, as opposed to parsing or invocation.
    pub fn is_check_failure(&self) -> bool {
        matches!(
            self,
            Self::CheckFailed(_)
                | Self::ServerOnly
                | Self::NotServerOwner
                | Self::NotBotOwner
                | Self::MissingPermissions(_)
        )
    }
}
