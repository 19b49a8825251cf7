//! Grammar registry: main commands, their options and priority assignment.

use crate::argument::Argument;
use crate::command::{NOP_COMMAND, Task};
use crate::config::{CommandConfig, MAIN_OPTION_PRIORITY};
use crate::error::ConfigError;
use std::collections::HashMap;
use tracing::debug;

/// Definition of a registered option. Aliases share one definition.
#[derive(Debug, Clone)]
pub struct OptionDef {
    priority: i32,
    task: Task,
}

impl OptionDef {
    pub fn new(priority: i32, task: Task) -> Self {
        Self { priority, task }
    }

    /// Execution priority; higher runs first.
    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn task(&self) -> &Task {
        &self.task
    }
}

/// A main command with its configuration, options and priority state.
#[derive(Debug)]
pub struct MainCommand {
    name: String,
    config: CommandConfig,
    options: HashMap<String, OptionDef>,
    priority_cursor: i32,
    last_assigned: Option<i32>,
    frozen: bool,
    main_last: bool,
}

impl MainCommand {
    fn new(name: &str, config: CommandConfig) -> Self {
        Self {
            name: name.to_string(),
            priority_cursor: config.running_policy,
            config,
            options: HashMap::new(),
            last_assigned: None,
            frozen: false,
            main_last: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &CommandConfig {
        &self.config
    }

    pub fn main_option_name(&self) -> &str {
        &self.config.main_option_name
    }

    /// Maps a missing or blank option name to the main option.
    pub fn resolve_option_name<'a>(&'a self, option: Option<&'a str>) -> &'a str {
        match option {
            Some(name) if !name.trim().is_empty() => name,
            _ => self.main_option_name(),
        }
    }

    pub fn contains_option(&self, option: &str) -> bool {
        self.options.contains_key(option)
    }

    /// Strict lookup of an option definition.
    pub fn option(&self, option: &str) -> Result<&OptionDef, ConfigError> {
        self.options
            .get(option)
            .ok_or_else(|| ConfigError::UnknownOption {
                main: self.name.clone(),
                option: option.to_string(),
            })
    }

    pub fn option_names(&self) -> impl Iterator<Item = &str> {
        self.options.keys().map(String::as_str)
    }

    /// Priority used when ordering `option` for execution.
    ///
    /// This is the registered priority, except for the main option once
    /// [`Registry::run_main_last`] has been applied.
    pub fn effective_priority(&self, option: &str) -> Result<i32, ConfigError> {
        let def = self.option(option)?;
        if self.main_last && option == self.main_option_name() {
            return Ok(i32::MIN);
        }
        Ok(def.priority())
    }

    /// Value the next auto-assigned option would start from.
    pub fn priority_cursor(&self) -> i32 {
        self.priority_cursor
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    pub fn runs_main_last(&self) -> bool {
        self.main_last
    }

    fn next_priority(&mut self) -> i32 {
        if !self.config.auto_priority {
            return self.config.running_policy;
        }
        if self.frozen {
            if let Some(priority) = self.last_assigned {
                return priority;
            }
        }
        let priority = self.priority_cursor;
        self.priority_cursor = self.priority_cursor.saturating_sub(1);
        self.last_assigned = Some(priority);
        priority
    }
}

/// All main commands known to one interpreter.
#[derive(Debug, Default)]
pub struct Registry {
    commands: HashMap<String, MainCommand>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding only the reserved no-op command that heads every
    /// batch.
    pub(crate) fn with_nop_command() -> Self {
        let mut registry = Self::new();
        let nop = registry.entry(NOP_COMMAND);
        let name = nop.main_option_name().to_string();
        nop.options
            .insert(name, OptionDef::new(MAIN_OPTION_PRIORITY, Task::noop()));
        registry
    }

    pub fn contains(&self, main: &str) -> bool {
        self.commands.contains_key(main)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.commands.keys().map(String::as_str)
    }

    /// Strict lookup of a main command.
    pub fn main_command(&self, main: &str) -> Result<&MainCommand, ConfigError> {
        self.commands
            .get(main)
            .ok_or_else(|| ConfigError::UnknownCommand(main.to_string()))
    }

    fn main_command_mut(&mut self, main: &str) -> Result<&mut MainCommand, ConfigError> {
        self.commands
            .get_mut(main)
            .ok_or_else(|| ConfigError::UnknownCommand(main.to_string()))
    }

    /// Strict lookup of an option of a main command.
    pub fn option(&self, main: &str, option: &str) -> Result<&OptionDef, ConfigError> {
        self.main_command(main)?.option(option)
    }

    /// Creates `main` with an explicit configuration.
    ///
    /// The configuration of a main command can only be given once.
    pub fn register_main(&mut self, main: &str, config: CommandConfig) -> Result<(), ConfigError> {
        if self.contains(main) {
            return Err(ConfigError::DuplicateConfig(main.to_string()));
        }
        debug!(main, ?config, "registering main command");
        self.commands
            .insert(main.to_string(), MainCommand::new(main, config));
        Ok(())
    }

    fn entry(&mut self, main: &str) -> &mut MainCommand {
        self.commands
            .entry(main.to_string())
            .or_insert_with(|| MainCommand::new(main, CommandConfig::default()))
    }

    /// Registers a task for `option` of `main`, creating `main` with the
    /// default configuration if needed.
    ///
    /// `None` or a blank name registers the main option. Naming the main option
    /// explicitly is rejected.
    pub fn register(
        &mut self,
        main: &str,
        option: Option<&str>,
        task: impl Fn(&[Argument]) -> anyhow::Result<()> + 'static,
    ) -> Result<(), ConfigError> {
        self.register_task(main, option, Task::new(task))
    }

    /// Same as [`register`](Self::register) with an already built [`Task`].
    pub fn register_task(
        &mut self,
        main: &str,
        option: Option<&str>,
        task: Task,
    ) -> Result<(), ConfigError> {
        match option {
            Some(name) if !name.trim().is_empty() => self.register_aliases_task(main, task, &[name]),
            _ => {
                let command = self.entry(main);
                let name = command.main_option_name().to_string();
                debug!(main, option = %name, "registering main option");
                command
                    .options
                    .insert(name, OptionDef::new(MAIN_OPTION_PRIORITY, task));
                Ok(())
            }
        }
    }

    /// Registers several names for one task. All aliases share one priority.
    ///
    /// An empty list registers the main option.
    pub fn register_aliases(
        &mut self,
        main: &str,
        task: impl Fn(&[Argument]) -> anyhow::Result<()> + 'static,
        options: &[&str],
    ) -> Result<(), ConfigError> {
        self.register_aliases_task(main, Task::new(task), options)
    }

    fn register_aliases_task(
        &mut self,
        main: &str,
        task: Task,
        options: &[&str],
    ) -> Result<(), ConfigError> {
        if options.is_empty() {
            return self.register_task(main, None, task);
        }
        let command = self.entry(main);
        if let Some(bad) = options
            .iter()
            .find(|o| o.trim().is_empty() || **o == command.main_option_name())
        {
            return Err(ConfigError::InvalidOptionName(bad.to_string()));
        }
        let def = OptionDef::new(command.next_priority(), task);
        debug!(main, ?options, priority = def.priority(), "registering options");
        for option in options {
            command.options.insert(option.to_string(), def.clone());
        }
        Ok(())
    }

    /// Removes options of `main`. An empty list or a blank name stands for the
    /// main option. Every name must exist.
    pub fn unregister(&mut self, main: &str, options: &[&str]) -> Result<(), ConfigError> {
        let command = self.main_command_mut(main)?;
        let names: Vec<String> = if options.is_empty() {
            vec![command.main_option_name().to_string()]
        } else {
            options
                .iter()
                .map(|o| command.resolve_option_name(Some(*o)).to_string())
                .collect()
        };
        for name in &names {
            command.option(name)?;
        }
        for name in &names {
            command.options.remove(name);
        }
        debug!(main, ?names, "unregistered options");
        Ok(())
    }

    /// Removes `main` with all its options.
    pub fn unregister_all(&mut self, main: &str) -> Result<(), ConfigError> {
        if self.commands.remove(main).is_none() {
            return Err(ConfigError::UnknownCommand(main.to_string()));
        }
        debug!(main, "unregistered main command");
        Ok(())
    }

    /// Toggles priority freezing for `main` and returns the new state.
    ///
    /// While frozen, newly registered options share the priority of the option
    /// registered last. Requires `auto_priority`.
    pub fn toggle_priority_freezing(&mut self, main: &str) -> Result<bool, ConfigError> {
        let command = self.main_command_mut(main)?;
        if !command.config.auto_priority {
            return Err(ConfigError::FreezeWithoutAutoPriority(main.to_string()));
        }
        command.frozen = !command.frozen;
        Ok(command.frozen)
    }

    /// Makes the main option of `main` run after every other option.
    pub fn run_main_last(&mut self, main: &str) -> Result<(), ConfigError> {
        self.main_command_mut(main)?.main_last = true;
        Ok(())
    }

    /// Options registered after this call get priorities below the main
    /// option, so they run after it.
    pub fn run_main_before_later_options(&mut self, main: &str) -> Result<(), ConfigError> {
        let command = self.main_command_mut(main)?;
        command.priority_cursor = MAIN_OPTION_PRIORITY - 1;
        command.last_assigned = None;
        Ok(())
    }
}
