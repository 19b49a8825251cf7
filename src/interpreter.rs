use crate::argument;
use crate::command::NOP_COMMAND;
use crate::config::ParserConfig;
use crate::error::{EngineError, EngineResult, TreeError};
use crate::lexer::Tokenizer;
use crate::parser::{self, BlockScope, BuildError, Parent, StagedCommand};
use crate::registry::Registry;
use crate::tree::{CommandTree, NodeId};
use std::rc::Rc;
use tracing::{debug, warn};

/// Parses command lines into a [`CommandTree`] and executes it.
///
/// Commands are registered on [`Interpreter::registry_mut`] first. Each call to
/// [`Interpreter::prepare`] adds the statements of one line to the pending
/// batch, [`Interpreter::execute`] runs the batch and clears it. Between the
/// two the tree can be inspected and edited.
///
/// Example
/// ```
/// use command_tree::{Interpreter, ParserConfig};
/// use std::cell::RefCell;
/// use std::rc::Rc;
///
/// let seen = Rc::new(RefCell::new(Vec::new()));
/// let mut cli = Interpreter::new(ParserConfig::new().with_quotes("\""));
/// let sink = Rc::clone(&seen);
/// cli.registry_mut()
///     .register("greet", None, move |args| {
///         sink.borrow_mut().extend(args.iter().map(|a| a.trim_quotes().to_string()));
///         Ok(())
///     })
///     .unwrap();
///
/// cli.run("greet \"big world\"").unwrap();
/// assert_eq!(*seen.borrow(), vec!["big world"]);
/// ```
pub struct Interpreter {
    config: ParserConfig,
    registry: Registry,
    tokenizer: Tokenizer,
    tree: CommandTree,
    blocks: BlockScope,
    quotes: Rc<[char]>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(ParserConfig::default())
    }
}

impl Interpreter {
    pub fn new(config: ParserConfig) -> Self {
        Self {
            tokenizer: Tokenizer::new(&config),
            quotes: Rc::from(config.quotes()),
            registry: Registry::with_nop_command(),
            tree: CommandTree::new(),
            blocks: BlockScope::default(),
            config,
        }
    }

    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    pub fn tree(&self) -> &CommandTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut CommandTree {
        &mut self.tree
    }

    /// Parses `line` and adds its complete statements to the pending batch.
    ///
    /// Statements of one call are attached all together or not at all. A
    /// block left open stays open for the following calls. An unknown command
    /// or option invokes the matching handler and discards the statements of
    /// this call, any unterminated remainder and the open blocks; nodes added
    /// by earlier calls stay.
    pub fn prepare(&mut self, line: &str) -> EngineResult {
        if line.trim().is_empty() {
            return Ok(());
        }
        let (statements, remainder) = self.tokenizer.feed(line);
        debug!(?statements, ?remainder, "tokenized");
        if statements.is_empty() {
            return Ok(());
        }
        if self.tree.is_empty() {
            // Nothing left to nest into.
            self.blocks = BlockScope::default();
        }

        let mut scope = self.blocks.clone();
        let built = parser::build_batch(
            &statements,
            &self.registry,
            self.config.command_factory(),
            &mut scope,
        );
        let staged = match built {
            Ok(staged) => staged,
            Err(err) => {
                self.clear_remaining_command();
                return self.reject(err);
            }
        };
        match self.attach(staged) {
            Ok(attached) => {
                scope.commit(&attached);
                self.blocks = scope;
                Ok(())
            }
            Err(err) => {
                self.clear_remaining_command();
                Err(err)
            }
        }
    }

    /// Executes the pending batch and clears it on success.
    ///
    /// On failure the tree is left as it was for the caller to inspect.
    pub fn execute(&mut self) -> EngineResult {
        let Some(head) = self.tree.head() else {
            return Ok(());
        };
        debug!(size = self.tree.size(), "executing batch");
        self.tree.execute(head, &self.registry, &self.quotes)?;
        self.tree.clear();
        self.blocks = BlockScope::default();
        Ok(())
    }

    /// Prepares `line` and executes the pending batch once the input is
    /// complete. While a statement or block is still open nothing runs.
    pub fn run(&mut self, line: &str) -> EngineResult {
        self.prepare(line)?;
        if !self.is_command_complete() {
            return Ok(());
        }
        self.execute()
    }

    /// `true` when no statement is waiting for its terminator or closing
    /// quote and every block is closed.
    pub fn is_command_complete(&self) -> bool {
        self.tokenizer.is_complete() && !self.blocks.is_open()
    }

    /// Number of blocks still waiting for their close character.
    pub fn open_blocks(&self) -> usize {
        self.blocks.depth()
    }

    /// Drops the unterminated statement and closes every open block.
    pub fn clear_remaining_command(&mut self) {
        self.tokenizer.reset();
        self.blocks = BlockScope::default();
    }

    /// Builds a detached node for `main` with no options.
    pub fn create_command(&mut self, main: &str) -> EngineResult<NodeId> {
        let command = (self.config.command_factory())(main, Vec::new(), &self.registry)?;
        Ok(self.tree.create(command))
    }

    /// Adds an occurrence of `option` (the main option for `None`) to a node.
    pub fn add_option(&mut self, node: NodeId, option: Option<&str>) -> EngineResult {
        let command = self
            .tree
            .command_mut(node)
            .ok_or(TreeError::UnknownNode(node))?;
        command.add_option(&self.registry, option)?;
        Ok(())
    }

    /// Renames a node. Every option it holds must exist on the new command.
    pub fn rename_command(&mut self, node: NodeId, name: &str) -> EngineResult {
        let command = self
            .tree
            .command_mut(node)
            .ok_or(TreeError::UnknownNode(node))?;
        command.set_name(&self.registry, name)?;
        Ok(())
    }

    /// The quote character enclosing `text`, if any, under this grammar.
    pub fn quoted_by(&self, text: &str) -> Option<char> {
        argument::quoted_by(text, &self.quotes)
    }

    pub fn is_quoted(&self, text: &str) -> bool {
        self.quoted_by(text).is_some()
    }

    pub fn trim_quotes<'a>(&self, text: &'a str) -> &'a str {
        argument::trim_quotes(text, &self.quotes)
    }

    fn reject(&self, err: BuildError) -> EngineResult {
        match err {
            BuildError::IllegalCommand(token) => {
                warn!(%token, "unknown command, batch discarded");
                (self.config.illegal_command_handler())(&token).map_err(EngineError::Handler)
            }
            BuildError::IllegalOption(token) => {
                warn!(%token, "unknown option, batch discarded");
                (self.config.illegal_option_handler())(&token).map_err(EngineError::Handler)
            }
            BuildError::Config(err) => Err(err.into()),
        }
    }

    /// Attaches a staged batch and returns the new nodes in staging order.
    fn attach(&mut self, staged: Vec<StagedCommand>) -> EngineResult<Vec<NodeId>> {
        // Nodes from earlier lines may have been edited away since.
        for s in &staged {
            if let Parent::Attached(id) = s.parent {
                if !self.tree.is_attached(id) {
                    return Err(TreeError::NotAttached(id).into());
                }
            }
        }
        let anchor = match self.tree.head() {
            Some(head) => head,
            None => {
                let nop = (self.config.command_factory())(NOP_COMMAND, Vec::new(), &self.registry)?;
                self.tree.insert(None, nop)?
            }
        };
        let mut ids = Vec::with_capacity(staged.len());
        for StagedCommand { parent, command } in staged {
            let parent = match parent {
                Parent::Anchor => anchor,
                Parent::Attached(id) => id,
                Parent::Staged(i) => ids[i],
            };
            ids.push(self.tree.insert(Some(parent), command)?);
        }
        debug!(added = ids.len(), size = self.tree.size(), "batch prepared");
        Ok(ids)
    }
}
