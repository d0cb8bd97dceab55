use std::collections::BTreeMap;
use std::sync::Arc;

use super::command::{Command, Parameter};
use super::context::Context;
use super::converters::{Argument, Converter};
use super::errors::CommandError;
use super::registry::{CogInfo, CommandRegistry};

const NO_COG: &str = "No Cog";
const NO_DESCRIPTION: &str = "No description";

/// The built-in `help` command.
///
/// `help` lists every command the author passes the checks of, grouped by
/// cog. `help <command> [subcommand...]` describes one command or group and
/// `help <cog>` lists a cog. Anything else fails with a not-found error.
pub fn help_command() -> Command {
    Command::new("help", |ctx: Context| async move {
        let query: Vec<String> = ctx
            .args
            .get("query")
            .map(Argument::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(|a| a.as_str().map(str::to_string))
            .collect();
        let text = render_help(&ctx, &query).await?;
        ctx.send(text).await?;
        Ok(())
    })
    .description("Shows help for a command, cog or the entire bot")
    .param(Parameter::variadic("query", Converter::String))
}

pub(crate) async fn render_help(ctx: &Context, query: &[String]) -> Result<String, CommandError> {
    let registry = ctx.commands();
    let Some((first, rest)) = query.split_first() else {
        return Ok(bot_help(ctx, registry).await);
    };

    let Some(mut command) = registry.get_command(first) else {
        return registry
            .get_cog(first)
            .map(|cog| cog_help(registry, &cog))
            .ok_or_else(|| CommandError::NotFound(first.clone()));
    };

    let mut parents = Vec::new();
    for name in rest {
        let Some(sub) = command.get_subcommand(name, registry.case_insensitive()) else {
            let mut path = parents.clone();
            path.push(command.name.clone());
            path.push(name.clone());
            return Err(CommandError::NotFound(path.join(" ")));
        };
        parents.push(command.name.clone());
        command = sub;
    }
    Ok(command_help(&command, &parents))
}

async fn bot_help(ctx: &Context, registry: &CommandRegistry) -> String {
    let mut by_cog: BTreeMap<String, Vec<Arc<Command>>> = BTreeMap::new();
    for command in registry.commands() {
        if command.run_checks(ctx).await.is_err() {
            continue;
        }
        let cog = command.cog().unwrap_or(NO_COG).to_string();
        by_cog.entry(cog).or_default().push(command);
    }

    let mut lines = vec!["```".to_string()];
    for (cog, commands) in &by_cog {
        lines.push(format!("{cog}:"));
        for command in commands {
            lines.push(summary_line(command, &[]));
        }
    }
    lines.push("```".to_string());
    lines.join("\n")
}

fn cog_help(registry: &CommandRegistry, cog: &CogInfo) -> String {
    let mut lines = vec!["```".to_string(), format!("{}:", cog.name)];
    if let Some(description) = &cog.description {
        lines.push(description.clone());
    }
    for name in &cog.commands {
        if let Some(command) = registry.get_command(name) {
            lines.push(summary_line(&command, &[]));
        }
    }
    lines.push("```".to_string());
    lines.join("\n")
}

fn command_help(command: &Command, parents: &[String]) -> String {
    let mut lines = vec![
        "```".to_string(),
        format!("{}:", command.name),
        format!("  Usage: {}", command.usage_line(parents)),
    ];
    if !command.aliases.is_empty() {
        lines.push(format!("  Aliases: {}", command.aliases.join(", ")));
    }
    if let Some(description) = &command.description {
        lines.push(description.clone());
    }
    if command.is_group() {
        let mut path = parents.to_vec();
        path.push(command.name.clone());
        for sub in command.subcommands() {
            lines.push(summary_line(&sub, &path));
        }
    }
    lines.push("```".to_string());
    lines.join("\n")
}

fn summary_line(command: &Command, parents: &[String]) -> String {
    format!(
        "  {} - {}",
        command.usage_line(parents),
        command.short_description().unwrap_or(NO_DESCRIPTION)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::checks;
    use crate::commands::context::tests::context_in;
    use crate::commands::registry::Cog;

    fn noop(name: &str) -> Command {
        Command::new(name, |_| async { Ok(()) })
    }

    fn populate(registry: &CommandRegistry) {
        registry.add_command(help_command());
        registry.add_command(
            noop("echo")
                .description("Repeats text\nSecond line")
                .param(Parameter::rest("text", Converter::String)),
        );
        registry.add_command(
            Command::group("role", |_| async { Ok(()) })
                .alias("r")
                .subcommand(noop("add").param(Parameter::required("role", Converter::Role))),
        );
        registry.add_command(noop("secret").with_check(checks::is_server_owner()));
        registry.add_cog(Cog::new("Music").command(noop("play").description("Plays a song")));
    }

    fn query(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[tokio::test]
    async fn test_bot_help_groups_by_cog_and_filters_checks() {
        let ctx = context_in("c1");
        populate(ctx.commands());
        let text = render_help(&ctx, &[]).await.unwrap();
        assert_eq!(
            text,
            [
                "```",
                "Music:",
                "  play - Plays a song",
                "No Cog:",
                "  echo <text...> - Repeats text",
                "  help [query...] - Shows help for a command, cog or the entire bot",
                "  role - No description",
                "```",
            ]
            .join("\n")
        );
    }

    #[tokio::test]
    async fn test_command_and_subcommand_help() {
        let ctx = context_in("c1");
        populate(ctx.commands());

        let text = render_help(&ctx, &query(&["r"])).await.unwrap();
        assert!(text.contains("role:\n  Usage: role\n  Aliases: r"));
        assert!(text.contains("  role add <role> - No description"));

        let text = render_help(&ctx, &query(&["role", "add"])).await.unwrap();
        assert!(text.contains("  Usage: role add <role>"));
    }

    #[tokio::test]
    async fn test_cog_help() {
        let ctx = context_in("c1");
        populate(ctx.commands());
        let text = render_help(&ctx, &query(&["Music"])).await.unwrap();
        assert_eq!(text, "```\nMusic:\n  play - Plays a song\n```");
    }

    #[tokio::test]
    async fn test_unknown_names_are_not_found() {
        let ctx = context_in("c1");
        populate(ctx.commands());
        let err = render_help(&ctx, &query(&["nope"])).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(name) if name == "nope"));

        let err = render_help(&ctx, &query(&["role", "zap"])).await.unwrap_err();
        assert!(matches!(err, CommandError::NotFound(name) if name == "role zap"));
    }
}
