use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::{debug, info};

use super::command::{Command, CommandMap};
use super::errors::CommandError;

/// A named bundle of commands added and removed together.
pub struct Cog {
    pub name: String,
    pub description: Option<String>,
    commands: Vec<Command>,
}

impl Cog {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            description: None,
            commands: Vec::new(),
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    pub fn command(mut self, command: Command) -> Self {
        self.commands.push(command);
        self
    }
}

/// What the registry remembers about an added cog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CogInfo {
    pub name: String,
    pub description: Option<String>,
    pub commands: Vec<String>,
}

pub type ExtensionHook = Arc<dyn Fn(&CommandRegistry) -> Result<(), CommandError> + Send + Sync>;

/// A loadable unit of commands. `setup` registers them; `teardown` runs on unload.
#[derive(Clone)]
pub struct Extension {
    pub name: String,
    setup: Option<ExtensionHook>,
    teardown: Option<ExtensionHook>,
}

impl Extension {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            setup: None,
            teardown: None,
        }
    }

    pub fn setup<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandRegistry) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.setup = Some(Arc::new(f));
        self
    }

    pub fn teardown<F>(mut self, f: F) -> Self
    where
        F: Fn(&CommandRegistry) -> Result<(), CommandError> + Send + Sync + 'static,
    {
        self.teardown = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Extension")
            .field("name", &self.name)
            .field("setup", &self.setup.is_some())
            .field("teardown", &self.teardown.is_some())
            .finish()
    }
}

struct LoadedExtension {
    extension: Extension,
    /// Cogs the setup hook added.
    cogs: Vec<String>,
}

/// Every registered command, cog and extension.
///
/// Commands are looked up by name or alias through one flat map. Mutations
/// take effect for the next message processed.
pub struct CommandRegistry {
    case_insensitive: bool,
    commands: RwLock<CommandMap>,
    cogs: RwLock<HashMap<String, CogInfo>>,
    extensions: Mutex<HashMap<String, LoadedExtension>>,
}

impl CommandRegistry {
    pub fn new(case_insensitive: bool) -> Self {
        Self {
            case_insensitive,
            commands: RwLock::new(CommandMap::default()),
            cogs: RwLock::new(HashMap::new()),
            extensions: Mutex::new(HashMap::new()),
        }
    }

    pub fn case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    // ── Commands ────────────────────────────────────────────────────

    /// Register a command under its name and aliases, replacing any
    /// command previously bound to those keys.
    pub fn add_command(&self, command: Command) -> Arc<Command> {
        let command = Arc::new(command);
        debug!(command = %command.name, aliases = ?command.aliases, "command registered");
        self.commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(command.clone());
        command
    }

    /// Remove a command by name or alias; its other aliases go with it.
    pub fn remove_command(&self, name: &str) -> Option<Arc<Command>> {
        self.commands
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name, self.case_insensitive)
    }

    pub fn get_command(&self, name: &str) -> Option<Arc<Command>> {
        self.commands
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name, self.case_insensitive)
    }

    /// Each top-level command once, sorted by name.
    pub fn commands(&self) -> Vec<Arc<Command>> {
        self.commands.read().unwrap_or_else(PoisonError::into_inner).commands()
    }

    // ── Cogs ────────────────────────────────────────────────────────

    /// Register every command of a cog. An existing cog of the same name is
    /// removed first.
    pub fn add_cog(&self, cog: Cog) {
        self.remove_cog(&cog.name);

        let mut names = Vec::with_capacity(cog.commands.len());
        for mut command in cog.commands {
            command.cog = Some(cog.name.clone());
            names.push(command.name.clone());
            self.add_command(command);
        }
        info!(cog = %cog.name, commands = names.len(), "cog added");
        self.cogs.write().unwrap_or_else(PoisonError::into_inner).insert(
            cog.name.clone(),
            CogInfo {
                name: cog.name,
                description: cog.description,
                commands: names,
            },
        );
    }

    /// Remove a cog and the commands it registered.
    pub fn remove_cog(&self, name: &str) -> Option<CogInfo> {
        let info = self.cogs.write().unwrap_or_else(PoisonError::into_inner).remove(name)?;
        let mut commands = self.commands.write().unwrap_or_else(PoisonError::into_inner);
        for command_name in &info.commands {
            // Only drop the command if it still belongs to this cog.
            if commands
                .get(command_name, false)
                .is_some_and(|c| c.cog() == Some(name))
            {
                commands.remove(command_name, false);
            }
        }
        info!(cog = %name, "cog removed");
        Some(info)
    }

    pub fn get_cog(&self, name: &str) -> Option<CogInfo> {
        self.cogs.read().unwrap_or_else(PoisonError::into_inner).get(name).cloned()
    }

    pub fn cogs(&self) -> Vec<CogInfo> {
        let mut cogs: Vec<CogInfo> = self
            .cogs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect();
        cogs.sort_by(|a, b| a.name.cmp(&b.name));
        cogs
    }

    // ── Extensions ──────────────────────────────────────────────────

    pub fn load_extension(&self, extension: Extension) -> Result<(), CommandError> {
        if self.is_extension_loaded(&extension.name) {
            return Err(CommandError::ExtensionAlreadyLoaded(extension.name));
        }
        let Some(setup) = extension.setup.clone() else {
            return Err(CommandError::MissingSetup(extension.name));
        };

        let before: Vec<String> = self.cogs().into_iter().map(|c| c.name).collect();
        setup(self)?;
        let cogs: Vec<String> = self
            .cogs()
            .into_iter()
            .map(|c| c.name)
            .filter(|name| !before.contains(name))
            .collect();

        info!(extension = %extension.name, cogs = cogs.len(), "extension loaded");
        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(extension.name.clone(), LoadedExtension { extension, cogs });
        Ok(())
    }

    /// Run the teardown hook, then remove the cogs the extension added.
    pub fn unload_extension(&self, name: &str) -> Result<Extension, CommandError> {
        let loaded = self
            .extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(name)
            .ok_or_else(|| CommandError::ExtensionNotLoaded(name.to_string()))?;

        if let Some(teardown) = &loaded.extension.teardown {
            teardown(self)?;
        }
        for cog in &loaded.cogs {
            self.remove_cog(cog);
        }
        info!(extension = %name, "extension unloaded");
        Ok(loaded.extension)
    }

    pub fn reload_extension(&self, name: &str) -> Result<(), CommandError> {
        let extension = self.unload_extension(name)?;
        self.load_extension(extension)
    }

    pub fn is_extension_loaded(&self, name: &str) -> bool {
        self.extensions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(name)
    }
}

impl fmt::Debug for CommandRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistry")
            .field("case_insensitive", &self.case_insensitive)
            .field("commands", &self.commands().len())
            .field("cogs", &self.cogs().len())
            .finish_non_exhaustive()
    }
}
