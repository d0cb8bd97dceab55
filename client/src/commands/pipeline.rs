use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use super::command::{Check, Command, boxed_check};
use super::context::{Context, Handles};
use super::errors::CommandError;
use super::help::help_command;
use super::registry::{Cog, CommandRegistry, Extension};
use super::view::StringView;
use crate::cache::Cache;
use crate::events::{Event, Listeners};
use crate::http::HttpClient;
use crate::model::Message;

pub type PrefixFn = Arc<dyn Fn(Message) -> BoxFuture<'static, Vec<String>> + Send + Sync>;

/// Where candidate prefixes come from. Candidates are tried in order and the
/// first one the content starts with wins.
#[derive(Clone)]
pub enum PrefixSource {
    Static(Vec<String>),
    Dynamic(PrefixFn),
}

impl PrefixSource {
    pub fn dynamic<F, Fut>(f: F) -> Self
    where
        F: Fn(Message) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Vec<String>> + Send + 'static,
    {
        Self::Dynamic(Arc::new(move |message| f(message).boxed()))
    }

    pub async fn prefixes(&self, message: &Message) -> Vec<String> {
        match self {
            Self::Static(prefixes) => prefixes.clone(),
            Self::Dynamic(f) => f(message.clone()).await,
        }
    }
}

impl Default for PrefixSource {
    fn default() -> Self {
        Self::Static(vec!["!".to_string()])
    }
}

impl fmt::Debug for PrefixSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(prefixes) => f.debug_tuple("Static").field(prefixes).finish(),
            Self::Dynamic(_) => f.write_str("Dynamic"),
        }
    }
}

/// The first prefix `content` starts with, in candidate order.
pub fn match_prefix<'a>(content: &str, prefixes: &'a [String]) -> Option<&'a str> {
    prefixes
        .iter()
        .map(String::as_str)
        .find(|p| content.starts_with(p))
}

/// What a group does with a token that names none of its subcommands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupFallback {
    /// Push the token back and invoke the group with it as an argument.
    #[default]
    InvokeGroup,
    /// Fail with a not-found error naming the full path.
    Error,
}

/// How processing one message ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    /// No prefix matched, or nothing followed it.
    NotCommand,
    NotFound,
    Failed,
    Succeeded,
}

/// Collects commands and settings before the client starts.
pub struct CommandsBuilder {
    prefixes: PrefixSource,
    case_insensitive: bool,
    group_fallback: GroupFallback,
    help_command: bool,
    global_check: Option<Check>,
    commands: Vec<Command>,
    cogs: Vec<Cog>,
    extensions: Vec<Extension>,
}

impl Default for CommandsBuilder {
    fn default() -> Self {
        Self {
            prefixes: PrefixSource::default(),
            case_insensitive: false,
            group_fallback: GroupFallback::default(),
            help_command: true,
            global_check: None,
            commands: Vec::new(),
            cogs: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

impl CommandsBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prefixes<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.prefixes = PrefixSource::Static(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn prefix_source(mut self, source: PrefixSource) -> Self {
        self.prefixes = source;
        self
    }

    pub fn case_insensitive(mut self, enabled: bool) -> Self {
        self.case_insensitive = enabled;
        self
    }

    pub fn group_fallback(mut self, fallback: GroupFallback) -> Self {
        self.group_fallback = fallback;
        self
    }

    pub fn help_command(mut self, enabled: bool) -> Self {
        self.help_command = enabled;
        self
    }

    /// A check every command must pass, evaluated before the command's own.
    pub fn global_check<F, Fut>(mut self, check: F) -> Self
    where
        F: Fn(Context) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), CommandError>> + Send + 'static,
    {
        self.global_check = Some(boxed_check(check));
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }

    pub fn cog(mut self, cog: Cog) -> Self {
        self.cogs.push(cog);
        self
    }

    pub fn extension(mut self, extension: Extension) -> Self {
        self.extensions.push(extension);
        self
    }

    pub(crate) fn build(
        self,
        cache: Arc<Cache>,
        http: HttpClient,
        listeners: Arc<Listeners>,
    ) -> Result<CommandPipeline, CommandError> {
        let registry = Arc::new(CommandRegistry::new(self.case_insensitive));
        if self.help_command {
            registry.add_command(help_command());
        }
        for command in self.commands {
            registry.add_command(command);
        }
        for cog in self.cogs {
            registry.add_cog(cog);
        }
        for extension in self.extensions {
            registry.load_extension(extension)?;
        }

        Ok(CommandPipeline {
            handles: Handles {
                cache,
                http,
                listeners,
                registry,
            },
            prefixes: self.prefixes,
            group_fallback: self.group_fallback,
            global_check: self.global_check,
        })
    }
}

/// Turns messages into command invocations.
///
/// Every failure is recovered here: the command's error handler runs, then a
/// `command_error` event is announced. Nothing escapes to the caller.
pub struct CommandPipeline {
    handles: Handles,
    prefixes: PrefixSource,
    group_fallback: GroupFallback,
    global_check: Option<Check>,
}

impl CommandPipeline {
    pub fn registry(&self) -> &Arc<CommandRegistry> {
        &self.handles.registry
    }

    pub async fn process_message(&self, message: Message) -> CommandOutcome {
        let prefixes = self.prefixes.prefixes(&message).await;
        let Some(prefix) = match_prefix(&message.content, &prefixes).map(str::to_string) else {
            return CommandOutcome::NotCommand;
        };

        let content = message.content[prefix.len()..].to_string();
        let mut view = StringView::new(&content);

        let name = match view.next_word() {
            Ok(Some(name)) => name,
            Ok(None) => return CommandOutcome::NotCommand,
            Err(e) => {
                let ctx = Context::new(self.handles.clone(), message, &prefix, "");
                self.fail(ctx, e).await;
                return CommandOutcome::Failed;
            }
        };

        let mut ctx = Context::new(self.handles.clone(), message, &prefix, &name);
        let Some(command) = self.handles.registry.get_command(&name) else {
            debug!(command = %name, "command not found");
            self.fail(ctx, CommandError::NotFound(name)).await;
            return CommandOutcome::NotFound;
        };
        ctx.command = Some(command);

        if let Err(e) = self.resolve_subcommand(&mut ctx, &mut view) {
            let outcome = match e {
                CommandError::NotFound(_) => CommandOutcome::NotFound,
                _ => CommandOutcome::Failed,
            };
            self.fail(ctx, e).await;
            return outcome;
        }

        self.handles.listeners.dispatch(Event::Command(Box::new(ctx.clone())));

        match self.run(&mut ctx, &mut view).await {
            Ok(()) => {
                self.handles
                    .listeners
                    .dispatch(Event::AfterCommandInvoke(Box::new(ctx)));
                CommandOutcome::Succeeded
            }
            Err(e) => {
                self.fail(ctx, e).await;
                CommandOutcome::Failed
            }
        }
    }

    /// Walk into groups while the next token names a subcommand.
    fn resolve_subcommand(&self, ctx: &mut Context, view: &mut StringView<'_>) -> Result<(), CommandError> {
        let case_insensitive = self.handles.registry.case_insensitive();
        while let Some(group) = ctx.command.clone().filter(|c| c.is_group()) {
            let Some(word) = view.next_word()? else {
                return Ok(());
            };
            match group.get_subcommand(&word, case_insensitive) {
                Some(sub) => {
                    let parent = std::mem::replace(&mut ctx.invoked_with, word);
                    ctx.invoked_parents.push(parent);
                    ctx.command = Some(sub);
                }
                None => match self.group_fallback {
                    GroupFallback::InvokeGroup => {
                        view.undo();
                        return Ok(());
                    }
                    GroupFallback::Error => {
                        let mut path = ctx.invoked_parents.clone();
                        path.push(ctx.invoked_with.clone());
                        path.push(word);
                        return Err(CommandError::NotFound(path.join(" ")));
                    }
                },
            }
        }
        Ok(())
    }

    /// Checks, cooldown, argument conversion and the callback, in that order.
    async fn run(&self, ctx: &mut Context, view: &mut StringView<'_>) -> Result<(), CommandError> {
        let Some(command) = ctx.command.clone() else {
            return Err(CommandError::NotFound(ctx.invoked_with.clone()));
        };

        if let Some(check) = &self.global_check {
            check(ctx.clone()).await?;
        }
        command.run_checks(ctx).await?;
        command.update_cooldown(ctx)?;

        ctx.args = command.parse_arguments(view, ctx).await?;
        command.invoke(ctx.clone()).await.map_err(|e| match e.downcast::<CommandError>() {
            Ok(command_error) => command_error,
            Err(other) => CommandError::Invocation(other),
        })
    }

    /// Run the command's error handler (or log), then announce `command_error`.
    async fn fail(&self, ctx: Context, error: CommandError) {
        let error = Arc::new(error);
        match ctx.command.as_ref().and_then(|c| c.error_handler()).cloned() {
            Some(handler) => handler(ctx.clone(), error.clone()).await,
            None => error!(
                command = %ctx.invoked_with,
                channel = %ctx.channel_id(),
                author = %ctx.author_id(),
                error = %error,
                "command failed"
            ),
        }
        self.handles.listeners.dispatch(Event::CommandError {
            context: Box::new(ctx),
            error,
        });
    }
}

impl fmt::Debug for CommandPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandPipeline")
            .field("prefixes", &self.prefixes)
            .field("group_fallback", &self.group_fallback)
            .field("registry", &self.handles.registry)
            .finish_non_exhaustive()
    }
}
