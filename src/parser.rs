//! Command building: resolves tokenized statements against the registry.
//!
//! The builder never touches the tree. It turns one batch of statements into
//! a flat list of staged commands that remember their block parent, so the
//! caller can attach the batch only when every statement resolved.

use crate::config::{CommandFactory, FULL_OPTION_PREFIX, OPTION_PREFIX};
use crate::command::Command;
use crate::error::ConfigError;
use crate::lexer::Statement;
use crate::registry::{MainCommand, Registry};
use crate::tree::NodeId;
use tracing::warn;

/// An option occurrence found on the command line, with its raw arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedOption {
    pub name: String,
    pub args: Vec<String>,
}

impl ParsedOption {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
        }
    }
}

/// Why a batch could not be built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
    /// The statement names a command that is not registered.
    IllegalCommand(String),
    /// An option token (or an implicit main option) is not registered.
    IllegalOption(String),
    /// The command factory rejected the resolved options.
    Config(ConfigError),
}

impl From<ConfigError> for BuildError {
    fn from(err: ConfigError) -> Self {
        BuildError::Config(err)
    }
}

/// Where a staged command goes once the batch is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Parent {
    /// The head of the batch.
    Anchor,
    /// A node attached by an earlier line.
    Attached(NodeId),
    /// An earlier command of the same batch, by index.
    Staged(usize),
}

/// A resolved command waiting to be attached.
#[derive(Debug)]
pub struct StagedCommand {
    pub parent: Parent,
    pub command: Command,
}

/// Block nesting carried from one line to the next.
///
/// A block opened on one line stays open until a later line closes it, so
/// the stack can hold nodes that are already in the tree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockScope {
    open: Vec<Parent>,
    last: Option<Parent>,
}

impl BlockScope {
    /// Number of blocks waiting for their close character.
    pub fn depth(&self) -> usize {
        self.open.len()
    }

    pub fn is_open(&self) -> bool {
        !self.open.is_empty()
    }

    /// Parent of the next command.
    pub fn current(&self) -> Parent {
        self.open.last().copied().unwrap_or(Parent::Anchor)
    }

    fn open_block(&mut self) {
        let parent = self.last.unwrap_or_else(|| self.current());
        self.open.push(parent);
    }

    fn close_block(&mut self) {
        if self.open.pop().is_none() {
            warn!("block close without an open block");
        }
    }

    /// Replaces staged indices with the nodes they were attached as.
    pub fn commit(&mut self, attached: &[NodeId]) {
        let resolve = |parent: Parent| match parent {
            Parent::Staged(i) => attached.get(i).map_or(Parent::Anchor, |id| Parent::Attached(*id)),
            other => other,
        };
        for parent in &mut self.open {
            *parent = resolve(*parent);
        }
        self.last = self.last.map(resolve);
    }
}

/// `true` for `-x`, `-abc`, `--name` and the bare prefixes.
pub fn is_option_token(token: &str) -> bool {
    token.starts_with(OPTION_PREFIX)
}

/// Option names a token opens: the text after the last dash for `--` tokens,
/// one name per letter for `-` tokens.
pub fn option_names(token: &str) -> Vec<String> {
    if token.starts_with(FULL_OPTION_PREFIX) {
        let name = token
            .rfind(OPTION_PREFIX)
            .map_or(token, |i| &token[i + OPTION_PREFIX.len_utf8()..]);
        vec![name.to_string()]
    } else if let Some(letters) = token.strip_prefix(OPTION_PREFIX) {
        letters.chars().map(String::from).collect()
    } else {
        Vec::new()
    }
}

/// Resolves the tokens following a command name into option occurrences.
///
/// The main option is opened first unless the first token is an option token.
/// Arguments attach to the most recently opened option.
pub fn resolve_options(tokens: &[String], main: &MainCommand) -> Result<Vec<ParsedOption>, BuildError> {
    let mut options: Vec<ParsedOption> = Vec::new();
    let open = |options: &mut Vec<ParsedOption>, name: &str| {
        if !main.contains_option(name) {
            return Err(BuildError::IllegalOption(name.to_string()));
        }
        options.push(ParsedOption::new(name));
        Ok(())
    };

    if !tokens.first().is_some_and(|t| is_option_token(t)) {
        open(&mut options, main.main_option_name())?;
    }

    for token in tokens {
        if is_option_token(token) {
            for name in option_names(token) {
                open(&mut options, &name)?;
            }
            continue;
        }
        // A bare "-" opens nothing; its arguments fall back to the main option.
        if options.is_empty() {
            open(&mut options, main.main_option_name())?;
        }
        if let Some(current) = options.last_mut() {
            current.args.push(token.clone());
        }
    }
    Ok(options)
}

/// Builds every command statement of a batch.
///
/// Command names are checked across the whole batch before any option is
/// resolved. A block start makes the last built command the parent of what
/// follows; a block end returns to the enclosing block. A close without an
/// open block is ignored. `scope` carries blocks left open by earlier lines
/// and is updated with the blocks this batch leaves open.
pub fn build_batch(
    statements: &[Statement],
    registry: &Registry,
    factory: &CommandFactory,
    scope: &mut BlockScope,
) -> Result<Vec<StagedCommand>, BuildError> {
    for statement in statements {
        if let Statement::Command(tokens) = statement {
            if let Some(name) = tokens.first().filter(|n| !registry.contains(n)) {
                return Err(BuildError::IllegalCommand(name.clone()));
            }
        }
    }

    let mut staged: Vec<StagedCommand> = Vec::new();
    for statement in statements {
        match statement {
            Statement::BlockStart => scope.open_block(),
            Statement::BlockEnd => scope.close_block(),
            Statement::Command(tokens) => {
                let Some((name, rest)) = tokens.split_first() else {
                    continue;
                };
                let main = registry
                    .main_command(name)
                    .map_err(|_| BuildError::IllegalCommand(name.clone()))?;
                let options = resolve_options(rest, main)?;
                let command = factory(name, options, registry)?;
                staged.push(StagedCommand {
                    parent: scope.current(),
                    command,
                });
                scope.last = Some(Parent::Staged(staged.len() - 1));
            }
        }
    }
    Ok(staged)
}
