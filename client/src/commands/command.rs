use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;

use super::context::Context;
use super::converters::{Argument, Arguments, Converter};
use super::cooldown::{BucketType, CooldownMapping};
use super::errors::CommandError;
use super::view::StringView;

pub type CommandCallback = Arc<dyn Fn(Context) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

/// A predicate gating an invocation. `Err` stops the command before it runs.
pub type Check = Arc<dyn Fn(Context) -> BoxFuture<'static, Result<(), CommandError>> + Send + Sync>;

pub type ErrorHandler = Arc<dyn Fn(Context, Arc<CommandError>) -> BoxFuture<'static, ()> + Send + Sync>;

pub(crate) fn boxed_check<F, Fut>(check: F) -> Check
where
    F: Fn(Context) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
{
    Arc::new(move |ctx| check(ctx).boxed())
}

/// How a parameter consumes input.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    /// One token. Missing input falls back to the default, if any.
    Positional { default: Option<Argument> },
    /// One token; a failed conversion pushes the token back and yields [`Argument::None`].
    Optional,
    /// Every remaining token.
    Variadic,
    /// The unparsed remainder of the input as one argument.
    Rest { default: Option<Argument> },
}

#[derive(Debug, Clone)]
pub struct Parameter {
    pub name: String,
    pub converter: Converter,
    pub kind: ParamKind,
}

impl Parameter {
    pub fn required(name: &str, converter: Converter) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Positional { default: None },
        }
    }

    pub fn with_default(name: &str, converter: Converter, default: Argument) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Positional { default: Some(default) },
        }
    }

    pub fn optional(name: &str, converter: Converter) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Optional,
        }
    }

    pub fn variadic(name: &str, converter: Converter) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Variadic,
        }
    }

    pub fn rest(name: &str, converter: Converter) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Rest { default: None },
        }
    }

    pub fn rest_with_default(name: &str, converter: Converter, default: Argument) -> Self {
        Self {
            name: name.to_string(),
            converter,
            kind: ParamKind::Rest { default: Some(default) },
        }
    }

    /// `<name>` when required, `[name]` when it can be left out; `...` marks
    /// parameters that take more than one token.
    pub fn signature(&self) -> String {
        match &self.kind {
            ParamKind::Positional { default: None } => format!("<{}>", self.name),
            ParamKind::Positional { default: Some(_) } | ParamKind::Optional => format!("[{}]", self.name),
            ParamKind::Rest { default: None } => format!("<{}...>", self.name),
            ParamKind::Rest { default: Some(_) } | ParamKind::Variadic => format!("[{}...]", self.name),
        }
    }

    async fn convert(&self, raw: &str, ctx: &Context) -> Result<Argument, CommandError> {
        if self.converter.requires_server() && ctx.server_id().is_none() {
            return Err(CommandError::ServerOnly);
        }
        self.converter
            .convert(raw, ctx)
            .await
            .map_err(|failure| CommandError::conversion(&self.name, raw, failure))
    }

    fn missing(&self, default: &Option<Argument>) -> Result<Argument, CommandError> {
        default
            .clone()
            .ok_or_else(|| CommandError::MissingArgument(self.name.clone()))
    }
}

/// Name and alias lookup over a set of commands.
#[derive(Clone, Default)]
pub struct CommandMap {
    entries: HashMap<String, Arc<Command>>,
    /// Lowercased key to the original keys, in registration order.
    folded: HashMap<String, Vec<String>>,
}

impl CommandMap {
    pub fn insert(&mut self, command: Arc<Command>) {
        for alias in &command.aliases {
            self.insert_key(alias.clone(), command.clone());
        }
        self.insert_key(command.name.clone(), command);
    }

    fn insert_key(&mut self, key: String, command: Arc<Command>) {
        let keys = self.folded.entry(key.to_lowercase()).or_default();
        if !keys.contains(&key) {
            keys.push(key.clone());
        }
        self.entries.insert(key, command);
    }

    /// Exact match first. With `case_insensitive`, the earliest registered
    /// key that matches ignoring case wins.
    pub fn get(&self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        if let Some(command) = self.entries.get(name) {
            return Some(command.clone());
        }
        if !case_insensitive {
            return None;
        }
        let key = self.folded.get(&name.to_lowercase())?.first()?;
        self.entries.get(key).cloned()
    }

    /// Remove a command by name or alias, together with all its other keys.
    pub fn remove(&mut self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        let command = self.get(name, case_insensitive)?;
        self.entries.retain(|_, c| !Arc::ptr_eq(c, &command));
        let entries = &self.entries;
        self.folded.retain(|_, keys| {
            keys.retain(|k| entries.contains_key(k));
            !keys.is_empty()
        });
        Some(command)
    }

    /// Each command once, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        let mut unique: Vec<Arc<Command>> = Vec::new();
        for command in self.entries.values() {
            if !unique.iter().any(|c| Arc::ptr_eq(c, command)) {
                unique.push(command.clone());
            }
        }
        unique.sort_by(|a, b| a.name.cmp(&b.name));
        unique
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A named command, or a group of subcommands when built with [`Command::group`].
pub struct Command {
    pub name: String,
    pub aliases: Vec<String>,
    pub description: Option<String>,
    usage: Option<String>,
    pub params: Vec<Parameter>,
    checks: Vec<Check>,
    cooldown: Option<CooldownMapping>,
    on_error: Option<ErrorHandler>,
    callback: CommandCallback,
    subcommands: Option<CommandMap>,
    pub(crate) cog: Option<String>,
}

impl Command {
    pub fn new<F, Fut>(name: &str, callback: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.to_string(),
            aliases: Vec::new(),
            description: None,
            usage: None,
            params: Vec::new(),
            checks: Vec::new(),
            cooldown: None,
            on_error: None,
            callback: Arc::new(move |ctx| callback(ctx).boxed()),
            subcommands: None,
            cog: None,
        }
    }

    /// A command that owns subcommands. `callback` runs when no subcommand is named.
    pub fn group<F, Fut>(name: &str, callback: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let mut command = Self::new(name, callback);
        command.subcommands = Some(CommandMap::default());
        command
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Override the generated usage line.
    pub fn usage(mut self, usage: &str) -> Self {
        self.usage = Some(usage.to_string());
        self
    }

    pub fn param(mut self, param: Parameter) -> Self {
        self.params.push(param);
        self
    }

    pub fn check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        self.checks.push(boxed_check(check));
        self
    }

    /// Attach a prebuilt check such as [`super::checks::server_only`].
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    pub fn cooldown(mut self, rate: u32, per: Duration, bucket: BucketType) -> Self {
        self.cooldown = Some(CooldownMapping::new(rate, per, bucket));
        self
    }

    pub fn on_error<F, Fut>(mut self, handler: F) -> Self
    where
        F: Fn(Context, Arc<CommandError>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.on_error = Some(Arc::new(move |ctx, err| handler(ctx, err).boxed()));
        self
    }

    /// Add a subcommand, turning this command into a group if it was not one.
    pub fn subcommand(mut self, command: Command) -> Self {
        self.subcommands
            .get_or_insert_with(CommandMap::default)
            .insert(Arc::new(command));
        self
    }

    pub fn is_group(&self) -> bool {
        self.subcommands.is_some()
    }

    pub fn get_subcommand(&self, name: &str, case_insensitive: bool) -> Option<Arc<Command>> {
        self.subcommands.as_ref()?.get(name, case_insensitive)
    }

    pub fn subcommands(&self) -> Vec<Arc<Command>> {
        self.subcommands.as_ref().map(CommandMap::commands).unwrap_or_default()
    }

    pub fn cog(&self) -> Option<&str> {
        self.cog.as_deref()
    }

    pub fn cooldown_mapping(&self) -> Option<&CooldownMapping> {
        self.cooldown.as_ref()
    }

    pub(crate) fn error_handler(&self) -> Option<&ErrorHandler> {
        self.on_error.as_ref()
    }

    /// First line of the description.
    pub fn short_description(&self) -> Option<&str> {
        self.description.as_deref().and_then(|d| d.lines().next())
    }

    /// Usage line, e.g. `role add <member> <role>` for a subcommand of `role`.
    pub fn usage_line(&self, parents: &[String]) -> String {
        if let Some(usage) = &self.usage {
            return usage.clone();
        }
        parents
            .iter()
            .cloned()
            .chain(std::iter::once(self.name.clone()))
            .chain(self.params.iter().map(Parameter::signature))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Run every check in order, stopping at the first failure.
    pub async fn run_checks(&self, ctx: &Context) -> Result<(), CommandError> {
        for check in &self.checks {
            check(ctx.clone()).await?;
        }
        Ok(())
    }

    /// Spend a cooldown token for this invocation.
    pub fn update_cooldown(&self, ctx: &Context) -> Result<(), CommandError> {
        match &self.cooldown {
            Some(mapping) => mapping.check(ctx),
            None => Ok(()),
        }
    }

    /// Convert the remaining input into this command's parameters.
    pub async fn parse_arguments(&self, view: &mut StringView<'_>, ctx: &Context) -> Result<Arguments, CommandError> {
        let mut args = Arguments::default();
        for param in &self.params {
            let value = match &param.kind {
                ParamKind::Positional { default } => match view.next_word()? {
                    Some(word) => param.convert(&word, ctx).await?,
                    None => param.missing(default)?,
                },
                ParamKind::Optional => match view.next_word()? {
                    Some(word) => match param.convert(&word, ctx).await {
                        Ok(value) => value,
                        Err(CommandError::Conversion { .. }) => {
                            view.undo();
                            Argument::None
                        }
                        Err(e) => return Err(e),
                    },
                    None => Argument::None,
                },
                ParamKind::Variadic => {
                    let mut items = Vec::new();
                    while let Some(word) = view.next_word()? {
                        items.push(param.convert(&word, ctx).await?);
                    }
                    Argument::List(items)
                }
                ParamKind::Rest { default } => {
                    let rest = view.get_rest();
                    if rest.is_empty() {
                        param.missing(default)?
                    } else {
                        param.convert(&rest, ctx).await?
                    }
                }
            };
            args.push(&param.name, value);
        }
        Ok(args)
    }

    pub(crate) async fn invoke(&self, ctx: Context) -> anyhow::Result<()> {
        (self.callback)(ctx).await
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("params", &self.params)
            .field("checks", &self.checks.len())
            .field("cooldown", &self.cooldown)
            .field("group", &self.is_group())
            .field("cog", &self.cog)
            .finish()
    }
}
