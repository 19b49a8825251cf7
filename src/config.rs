//! Parser-wide and per-command configuration.
//!
//! Both records are plain values with defaults. Behaviour that a host may want
//! to customise (illegal input reporting, command construction) is carried as
//! function-valued fields, so "override a hook" means "build the config with a
//! different closure".

use crate::command::Command;
use crate::error::ConfigError;
use crate::parser::ParsedOption;
use crate::registry::Registry;
use std::fmt;
use std::rc::Rc;

/// Default token delimiter.
pub const DELIMITER: char = ' ';
/// Default escape character.
pub const ESCAPE: char = '\\';
/// Prefix of single-letter option tokens (`-abc`).
pub const OPTION_PREFIX: char = '-';
/// Prefix of long option tokens (`--name`).
pub const FULL_OPTION_PREFIX: &str = "--";

/// Name of the implicit option used when no option token follows the command.
pub const DEFAULT_OPTION_NAME: &str = "_DEFAULT_";
/// Priority of the main option. It never takes part in auto-decrement.
pub const MAIN_OPTION_PRIORITY: i32 = 0;
/// Running policy under which options run in command-line order.
pub const INORDER_POLICY: i32 = 0;

/// Called with the offending token when a command or option is unknown.
///
/// Returning an error makes `prepare` fail with that error; returning `Ok`
/// only discards the pending batch.
pub type IllegalInputHandler = Rc<dyn Fn(&str) -> anyhow::Result<()>>;

/// Builds a command node from a main command name and its resolved options.
pub type CommandFactory =
    Rc<dyn Fn(&str, Vec<ParsedOption>, &Registry) -> Result<Command, ConfigError>>;

/// Grammar of the text fed to the interpreter.
#[derive(Clone)]
pub struct ParserConfig {
    quotes: Vec<char>,
    delimiter: char,
    escape: Option<char>,
    end_of_statement: Option<char>,
    block_chars: Option<(char, char)>,
    on_illegal_command: IllegalInputHandler,
    on_illegal_option: IllegalInputHandler,
    command_factory: CommandFactory,
}

impl Default for ParserConfig {
    /// Space-delimited, backslash escape, no quoting, one statement per line,
    /// no blocks.
    fn default() -> Self {
        Self {
            quotes: Vec::new(),
            delimiter: DELIMITER,
            escape: Some(ESCAPE),
            end_of_statement: None,
            block_chars: None,
            on_illegal_command: Rc::new(|part: &str| {
                println!("Unknown command: {}", part);
                Ok(())
            }),
            on_illegal_option: Rc::new(|part: &str| {
                println!("Unknown option: {}", part);
                Ok(())
            }),
            command_factory: Rc::new(Command::from_parsed),
        }
    }
}

impl ParserConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Characters that open and close quoting. An empty string disables quoting.
    pub fn with_quotes(mut self, quotes: &str) -> Self {
        self.quotes = quotes.chars().collect();
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// `None` disables escaping.
    pub fn with_escape(mut self, escape: Option<char>) -> Self {
        self.escape = escape;
        self
    }

    /// Setting a terminator allows several statements per line and lets one
    /// statement span several lines.
    pub fn with_end_of_statement(mut self, end_of_statement: Option<char>) -> Self {
        self.end_of_statement = end_of_statement;
        self
    }

    /// Block open/close characters, e.g. `"{}"`. An empty string disables
    /// nesting; any other length is rejected.
    pub fn with_block_chars(mut self, block_chars: &str) -> Result<Self, ConfigError> {
        let chars: Vec<char> = block_chars.chars().collect();
        self.block_chars = match chars.as_slice() {
            [] => None,
            [open, close] => Some((*open, *close)),
            _ => return Err(ConfigError::InvalidBlockChars(block_chars.to_string())),
        };
        Ok(self)
    }

    pub fn on_illegal_command(
        mut self,
        handler: impl Fn(&str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.on_illegal_command = Rc::new(handler);
        self
    }

    pub fn on_illegal_option(
        mut self,
        handler: impl Fn(&str) -> anyhow::Result<()> + 'static,
    ) -> Self {
        self.on_illegal_option = Rc::new(handler);
        self
    }

    pub fn with_command_factory(
        mut self,
        factory: impl Fn(&str, Vec<ParsedOption>, &Registry) -> Result<Command, ConfigError>
            + 'static,
    ) -> Self {
        self.command_factory = Rc::new(factory);
        self
    }

    pub fn quotes(&self) -> &[char] {
        &self.quotes
    }

    pub fn is_quote(&self, c: char) -> bool {
        self.quotes.contains(&c)
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    pub fn escape(&self) -> Option<char> {
        self.escape
    }

    pub fn end_of_statement(&self) -> Option<char> {
        self.end_of_statement
    }

    pub fn block_chars(&self) -> Option<(char, char)> {
        self.block_chars
    }

    pub fn uses_blocks(&self) -> bool {
        self.block_chars.is_some()
    }

    pub(crate) fn illegal_command_handler(&self) -> &IllegalInputHandler {
        &self.on_illegal_command
    }

    pub(crate) fn illegal_option_handler(&self) -> &IllegalInputHandler {
        &self.on_illegal_option
    }

    pub(crate) fn command_factory(&self) -> &CommandFactory {
        &self.command_factory
    }
}

impl fmt::Debug for ParserConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParserConfig")
            .field("quotes", &self.quotes)
            .field("delimiter", &self.delimiter)
            .field("escape", &self.escape)
            .field("end_of_statement", &self.end_of_statement)
            .field("block_chars", &self.block_chars)
            .finish_non_exhaustive()
    }
}

/// Configuration of one main command. Fixed once the command is registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandConfig {
    /// Name of the implicit option. Change it if `_DEFAULT_` is needed as a
    /// regular option name.
    pub main_option_name: String,
    /// Priority given to registered options. With `auto_priority` this is the
    /// starting point of the descending sequence. A value above
    /// [`MAIN_OPTION_PRIORITY`] makes options run before the main option.
    pub running_policy: i32,
    /// Assign descending priorities on registration instead of
    /// `running_policy` for every option.
    pub auto_priority: bool,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            main_option_name: DEFAULT_OPTION_NAME.to_string(),
            running_policy: INORDER_POLICY,
            auto_priority: false,
        }
    }
}

impl CommandConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_main_option_name(mut self, name: impl Into<String>) -> Self {
        self.main_option_name = name.into();
        self
    }

    pub fn with_running_policy(mut self, policy: i32) -> Self {
        self.running_policy = policy;
        self
    }

    pub fn with_auto_priority(mut self, auto_priority: bool) -> Self {
        self.auto_priority = auto_priority;
        self
    }
}
