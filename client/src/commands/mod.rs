//! Prefix commands: tokenizing, resolution, checks, cooldowns, argument
//! conversion and the error funnel.

pub mod checks;
pub mod command;
pub mod context;
pub mod converters;
pub mod cooldown;
pub mod errors;
pub mod help;
pub mod pipeline;
pub mod registry;
pub mod view;

pub use command::{Check, Command, CommandMap, ParamKind, Parameter};
pub use context::Context;
pub use converters::{Argument, Arguments, Converter};
pub use cooldown::{BucketType, Cooldown, CooldownMapping};
pub use errors::{CommandError, ConversionFailure};
pub use pipeline::{CommandOutcome, CommandPipeline, CommandsBuilder, GroupFallback, PrefixSource};
pub use registry::{Cog, CogInfo, CommandRegistry, Extension};
pub use view::StringView;
