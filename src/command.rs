use crate::argument::Argument;
use crate::error::{ConfigError, EngineError, EngineResult};
use crate::parser::ParsedOption;
use crate::registry::{MainCommand, Registry};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Name of the no-op command that heads every batch.
pub const NOP_COMMAND: &str = "__NOP__";

/// Callback bound to an option.
///
/// Receives the arguments collected for one occurrence of the option. An error
/// aborts the rest of the batch.
#[derive(Clone)]
pub struct Task(Rc<dyn Fn(&[Argument]) -> anyhow::Result<()>>);

impl Task {
    pub fn new(task: impl Fn(&[Argument]) -> anyhow::Result<()> + 'static) -> Self {
        Self(Rc::new(task))
    }

    /// A task that does nothing.
    pub fn noop() -> Self {
        Self::new(|_| Ok(()))
    }

    pub fn run(&self, args: &[Argument]) -> anyhow::Result<()> {
        (self.0)(args)
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Task(..)")
    }
}

/// One occurrence of an option attached to a command node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunningOption {
    name: String,
    args: Vec<String>,
    registration_index: usize,
}

impl RunningOption {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn add_argument(&mut self, arg: impl Into<String>) {
        self.args.push(arg.into());
    }

    pub fn extend_arguments<I, S>(&mut self, args: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
    }

    /// Position among the node's options sharing the same priority, from 1.
    pub fn registration_index(&self) -> usize {
        self.registration_index
    }

    /// Renames the option. `None` or blank selects the main option.
    pub fn set_name(&mut self, main: &MainCommand, name: Option<&str>) -> Result<(), ConfigError> {
        let name = main.resolve_option_name(name);
        main.option(name)?;
        self.name = name.to_string();
        Ok(())
    }
}

impl fmt::Display for RunningOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=[{}]", self.name, self.args.join(", "))
    }
}

/// A command node: a resolved main command and the options it runs.
///
/// Tree links live in [`CommandTree`](crate::tree::CommandTree); the node
/// itself only carries what executes.
#[derive(Debug, Clone)]
pub struct Command {
    name: String,
    options: Vec<RunningOption>,
    priority_counts: HashMap<i32, usize>,
}

impl Command {
    /// Creates a command without options. `name` must be registered.
    pub fn new(name: &str, registry: &Registry) -> Result<Self, ConfigError> {
        registry.main_command(name)?;
        Ok(Self {
            name: name.to_string(),
            options: Vec::new(),
            priority_counts: HashMap::new(),
        })
    }

    /// Default construction used by the interpreter: every parsed option is
    /// attached in order with its arguments.
    pub fn from_parsed(
        name: &str,
        options: Vec<ParsedOption>,
        registry: &Registry,
    ) -> Result<Self, ConfigError> {
        let mut command = Self::new(name, registry)?;
        for parsed in options {
            command
                .add_option(registry, Some(parsed.name.as_str()))?
                .extend_arguments(parsed.args);
        }
        Ok(command)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Switches the node to another main command. Every attached option must
    /// exist there too.
    pub fn set_name(&mut self, registry: &Registry, name: &str) -> Result<(), ConfigError> {
        let main = registry.main_command(name)?;
        for option in &self.options {
            main.option(&option.name)?;
        }
        self.name = name.to_string();
        Ok(())
    }

    /// Options in the order they were added.
    pub fn options(&self) -> &[RunningOption] {
        &self.options
    }

    /// First attached occurrence of `option`.
    pub fn option(&self, option: &str) -> Option<&RunningOption> {
        self.options.iter().find(|o| o.name == option)
    }

    pub fn option_mut(&mut self, option: &str) -> Option<&mut RunningOption> {
        self.options.iter_mut().find(|o| o.name == option)
    }

    /// Attaches a new occurrence of `option` (`None` = main option).
    ///
    /// The same option may be attached several times; each occurrence runs.
    pub fn add_option(
        &mut self,
        registry: &Registry,
        option: Option<&str>,
    ) -> Result<&mut RunningOption, ConfigError> {
        let main = registry.main_command(&self.name)?;
        let name = main.resolve_option_name(option);
        let priority = main.option(name)?.priority();
        let count = self.priority_counts.entry(priority).or_insert(0);
        *count += 1;
        self.options.push(RunningOption {
            name: name.to_string(),
            args: Vec::new(),
            registration_index: *count,
        });
        let last = self.options.len() - 1;
        Ok(&mut self.options[last])
    }

    /// Detaches the first occurrence of `option`.
    pub fn remove_option(&mut self, option: &str) -> Option<RunningOption> {
        let index = self.options.iter().position(|o| o.name == option)?;
        Some(self.options.remove(index))
    }

    /// Options in execution order: priority descending, then registration
    /// index ascending.
    pub fn ordered_options(&self, registry: &Registry) -> Result<Vec<&RunningOption>, ConfigError> {
        let main = registry.main_command(&self.name)?;
        let mut keyed = self
            .options
            .iter()
            .map(|o| Ok((main.effective_priority(&o.name)?, o)))
            .collect::<Result<Vec<_>, ConfigError>>()?;
        keyed.sort_by(|(pa, a), (pb, b)| {
            pb.cmp(pa)
                .then(a.registration_index.cmp(&b.registration_index))
        });
        Ok(keyed.into_iter().map(|(_, o)| o).collect())
    }

    /// Runs the tasks of all attached options in execution order.
    ///
    /// Stops at the first failing task.
    pub fn execute(&self, registry: &Registry, quotes: &Rc<[char]>) -> EngineResult {
        let main = registry.main_command(&self.name)?;
        for option in self.ordered_options(registry)? {
            let task = main.option(&option.name)?.task();
            let args: Vec<Argument> = option
                .args
                .iter()
                .map(|a| Argument::new(a.as_str(), Rc::clone(quotes)))
                .collect();
            debug!(command = %self.name, option = %option.name, args = ?option.args, "running option");
            task.run(&args).map_err(|source| EngineError::Task {
                command: self.name.clone(),
                option: option.name.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[", self.name)?;
        for (i, option) in self.options.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", option)?;
        }
        f.write_str("]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CommandConfig;
    use std::cell::RefCell;

    type Log = Rc<RefCell<Vec<String>>>;

    fn recorder(log: &Log, label: &'static str) -> impl Fn(&[Argument]) -> anyhow::Result<()> + 'static {
        let log = Rc::clone(log);
        move |args: &[Argument]| {
            let args: Vec<&str> = args.iter().map(Argument::content).collect();
            log.borrow_mut().push(format!("{}{:?}", label, args));
            Ok(())
        }
    }

    fn quotes() -> Rc<[char]> {
        Rc::from(vec!['"'])
    }

    fn auto_registry(log: &Log) -> Registry {
        let mut registry = Registry::new();
        registry
            .register_main("cmd", CommandConfig::new().with_auto_priority(true).with_running_policy(0))
            .unwrap();
        registry.register("cmd", None, recorder(log, "main")).unwrap();
        registry.register("cmd", Some("a"), recorder(log, "a")).unwrap();
        registry.register("cmd", Some("b"), recorder(log, "b")).unwrap();
        registry.register("cmd", Some("c"), recorder(log, "c")).unwrap();
        registry
    }

    #[test]
    fn test_new_requires_registered_command() {
        let registry = Registry::new();
        assert_eq!(
            Command::new("nope", &registry).unwrap_err(),
            ConfigError::UnknownCommand("nope".to_string())
        );
    }

    #[test]
    fn test_add_option_validates_and_counts_per_priority() {
        let log = Log::default();
        let registry = auto_registry(&log);
        let mut command = Command::new("cmd", &registry).unwrap();

        command.add_option(&registry, None).unwrap().add_argument("x");
        command.add_option(&registry, Some("a")).unwrap();
        command.add_option(&registry, Some("b")).unwrap();
        command.add_option(&registry, Some("b")).unwrap();

        let indexes: Vec<(&str, usize)> = command
            .options()
            .iter()
            .map(|o| (o.name(), o.registration_index()))
            .collect();
        assert_eq!(
            indexes,
            vec![("_DEFAULT_", 1), ("a", 2), ("b", 1), ("b", 2)]
        );

        assert_eq!(
            command.add_option(&registry, Some("zz")).unwrap_err(),
            ConfigError::UnknownOption {
                main: "cmd".to_string(),
                option: "zz".to_string()
            }
        );
    }

    #[test]
    fn test_execution_order_follows_priority_then_index() {
        let log = Log::default();
        let registry = auto_registry(&log);
        let mut command = Command::new("cmd", &registry).unwrap();
        command.add_option(&registry, Some("c")).unwrap();
        command.add_option(&registry, Some("b")).unwrap().add_argument("1");
        command.add_option(&registry, Some("a")).unwrap();
        command.add_option(&registry, None).unwrap();
        command.add_option(&registry, Some("b")).unwrap().add_argument("2");

        command.execute(&registry, &quotes()).unwrap();
        assert_eq!(
            *log.borrow(),
            vec![
                "a[]".to_string(),
                "main[]".to_string(),
                "b[\"1\"]".to_string(),
                "b[\"2\"]".to_string(),
                "c[]".to_string(),
            ]
        );
    }

    #[test]
    fn test_task_error_stops_node() {
        let log = Log::default();
        let mut registry = auto_registry(&log);
        registry
            .register("cmd", Some("boom"), |_| Err(anyhow::anyhow!("boom")))
            .unwrap();
        let mut command = Command::new("cmd", &registry).unwrap();
        command.add_option(&registry, Some("a")).unwrap();
        command.add_option(&registry, Some("boom")).unwrap();

        let err = command.execute(&registry, &quotes()).unwrap_err();
        assert!(matches!(err, EngineError::Task { ref option, .. } if option == "boom"));
        assert_eq!(*log.borrow(), vec!["a[]".to_string()]);
    }

    #[test]
    fn test_unregistered_option_fails_at_execution() {
        let log = Log::default();
        let mut registry = auto_registry(&log);
        let mut command = Command::new("cmd", &registry).unwrap();
        command.add_option(&registry, Some("a")).unwrap();
        registry.unregister("cmd", &["a"]).unwrap();

        let err = command.execute(&registry, &quotes()).unwrap_err();
        assert!(matches!(err, EngineError::Config(ConfigError::UnknownOption { .. })));
        assert!(log.borrow().is_empty());
    }

    #[test]
    fn test_set_name_checks_options() {
        let log = Log::default();
        let mut registry = auto_registry(&log);
        registry.register("other", Some("a"), |_| Ok(())).unwrap();
        registry.register("bare", None, |_| Ok(())).unwrap();

        let mut command = Command::new("cmd", &registry).unwrap();
        command.add_option(&registry, Some("a")).unwrap();
        assert!(command.set_name(&registry, "bare").is_err());
        assert_eq!(command.name(), "cmd");
        command.set_name(&registry, "other").unwrap();
        assert_eq!(command.name(), "other");
    }

    #[test]
    fn test_remove_option_and_display() {
        let log = Log::default();
        let registry = auto_registry(&log);
        let mut command = Command::new("cmd", &registry).unwrap();
        command.add_option(&registry, Some("a")).unwrap().add_argument("x");
        command
            .add_option(&registry, Some("b"))
            .unwrap()
            .extend_arguments(["y", "z"]);
        assert_eq!(command.to_string(), "cmd[a=[x], b=[y, z]]");

        let removed = command.remove_option("a").unwrap();
        assert_eq!(removed.args(), ["x".to_string()]);
        assert!(command.remove_option("a").is_none());
        assert_eq!(command.options().len(), 1);
    }
}
