use argh::FromArgs;
use command_tree::{Argument, CommandConfig, Interpreter, ParserConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tracing_subscriber::EnvFilter;

#[derive(FromArgs)]
/// interactive playground for the command tree engine.
/// set RUST_LOG=debug to trace tokenizing and execution.
struct Args {
    #[argh(option, default = "String::from(\"\\\"'\")")]
    /// characters that quote arguments.
    quotes: String,

    #[argh(option, default = "' '")]
    /// character separating tokens.
    delimiter: char,

    #[argh(option)]
    /// character ending a statement; without it every line is one statement.
    eos: Option<char>,

    #[argh(option, default = "String::new()")]
    /// block open and close characters, e.g. "{}".
    blocks: String,
}

fn print_args(label: &'static str) -> impl Fn(&[Argument]) -> anyhow::Result<()> + 'static {
    move |args: &[Argument]| {
        let args: Vec<_> = args.iter().map(Argument::trim_quotes).collect();
        println!("{}: {}", label, args.join(" "));
        Ok(())
    }
}

fn register_demo_commands(cli: &mut Interpreter) -> anyhow::Result<()> {
    let registry = cli.registry_mut();

    registry.register("echo", None, |args: &[Argument]| {
        let words: Vec<_> = args.iter().map(Argument::trim_quotes).collect();
        println!("{}", words.join(" "));
        Ok(())
    })?;
    registry.register("echo", Some("u"), |args: &[Argument]| {
        let words: Vec<_> = args.iter().map(|a| a.trim_quotes().to_uppercase()).collect();
        println!("{}", words.join(" "));
        Ok(())
    })?;

    // Options of `deploy` run in a fixed order whatever their position:
    // check first, then the deployment itself, then notify.
    registry.register_main(
        "deploy",
        CommandConfig::new()
            .with_running_policy(1)
            .with_auto_priority(true),
    )?;
    registry.register("deploy", Some("check"), print_args("checking"))?;
    registry.run_main_before_later_options("deploy")?;
    registry.register("deploy", None, print_args("deploying"))?;
    registry.register_aliases("deploy", print_args("notifying"), &["n", "notify"])?;

    registry.register("fail", None, |args: &[Argument]| {
        anyhow::bail!("asked to fail with {} argument(s)", args.len())
    })?;
    Ok(())
}

fn repl(cli: &mut Interpreter) -> anyhow::Result<()> {
    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = if cli.is_command_complete() { "> " } else { ". " };
        match rl.readline(prompt) {
            Ok(line) => {
                rl.add_history_entry(line.as_str())?;
                if let Err(err) = cli.run(&line) {
                    println!("Error: {}", err);
                    cli.tree_mut().clear();
                }
            }
            Err(ReadlineError::Interrupted) => {
                if cli.is_command_complete() {
                    println!("Interrupted");
                    break;
                }
                cli.clear_remaining_command();
            }
            Err(ReadlineError::Eof) => {
                println!("Eof");
                break;
            }
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args: Args = argh::from_env();
    let config = ParserConfig::new()
        .with_quotes(&args.quotes)
        .with_delimiter(args.delimiter)
        .with_end_of_statement(args.eos)
        .with_block_chars(&args.blocks)?;

    let mut cli = Interpreter::new(config);
    register_demo_commands(&mut cli)?;
    repl(&mut cli)
}
