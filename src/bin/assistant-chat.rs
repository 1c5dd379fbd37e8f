//! Interactive terminal client for the assistant service.
//!
//! Questions typed at the prompt are sent to the server; answers arrive asynchronously on the
//! event channel and are printed as they come in.
//!
//! # Usage
//!
//! ```bash
//! # Talk to the server on localhost:8080 (or $ASSISTANT_SERVER_URL)
//! assistant-chat
//!
//! # Pick a server and label knowledge added from this terminal
//! assistant-chat --server http://10.0.0.2:8080/ --source terminal
//!
//! # Plain output and debug logs on stderr
//! assistant-chat --no-color --verbose
//! ```
//!
//! Type `/help` at the prompt for the list of slash commands.

use std::thread;

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use assistant_client::chat::{ChatCommand, ClientArgs, help_text, parse_command};
use assistant_client::{AssistantClient, ClientConfig, PromptKind, TerminalSink};

/// Something the user did.
enum Input {
    Line(String),
    Interrupted,
    Eof,
}

/// Main entry point for the assistant-chat application.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let (args, _) = ClientArgs::from_command_line_relaxed("assistant-chat [OPTIONS]");
    init_logging(args.verbose);

    let config = ClientConfig::from(args);
    let sink = TerminalSink::with_color(config.use_color);
    let mut client = AssistantClient::connect(config, Box::new(sink))?;

    let (input_tx, mut input_rx) = mpsc::unbounded_channel();

    // Ctrl+C outside the prompt ends the session.
    let interrupt_tx = input_tx.clone();
    ctrlc::set_handler(move || {
        let _ = interrupt_tx.send(Input::Interrupted);
    })?;

    thread::spawn(move || match DefaultEditor::new() {
        Ok(mut rl) => read_lines(&mut rl, input_tx),
        Err(err) => {
            eprintln!("Failed to open the terminal: {err}");
            let _ = input_tx.send(Input::Eof);
        }
    });

    println!("Assistant Chat (server: {})", client.config().base_url);
    println!("Type /help for commands, /quit to exit\n");

    client.start();
    let mut source: Option<String> = None;

    loop {
        tokio::select! {
            signal = client.next_signal() => match signal {
                Some(signal) => client.handle(signal),
                None => break,
            },
            input = input_rx.recv() => match input {
                Some(Input::Line(line)) => {
                    if !handle_line(&mut client, &mut source, &line) {
                        break;
                    }
                }
                Some(Input::Interrupted) | Some(Input::Eof) | None => {
                    println!("\nGoodbye!");
                    break;
                }
            },
        }
    }

    client.shutdown();
    // The prompt thread is still blocked in readline; leave without waiting for it.
    std::process::exit(0);
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        "assistant_client=debug"
    } else {
        "assistant_client=warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

/// Runs the blocking prompt, forwarding every line to the async side.
fn read_lines(rl: &mut DefaultEditor, tx: mpsc::UnboundedSender<Input>) {
    loop {
        match rl.readline("> ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);
                if tx.send(Input::Line(line.to_string())).is_err() {
                    return;
                }
            }
            Err(ReadlineError::Interrupted) => {
                // Ctrl+C at prompt - soft interrupt
                continue;
            }
            Err(ReadlineError::Eof) => {
                let _ = tx.send(Input::Eof);
                return;
            }
            Err(err) => {
                eprintln!("Input error: {err}");
                let _ = tx.send(Input::Eof);
                return;
            }
        }
    }
}

/// Acts on one line of input.  Returns false when the user asked to leave.
fn handle_line(client: &mut AssistantClient, source: &mut Option<String>, line: &str) -> bool {
    let Some(command) = parse_command(line) else {
        if let Err(err) = client.ask(line) {
            print_error(&err.to_string());
        }
        return true;
    };

    let result = match command {
        ChatCommand::Quit => {
            println!("Goodbye!");
            return false;
        }
        ChatCommand::Help => {
            for line in help_text().lines() {
                println!("    {}", line);
            }
            Ok(())
        }
        ChatCommand::Invalid(message) => {
            print_error(&message);
            Ok(())
        }
        ChatCommand::Source(label) => {
            match &label {
                Some(label) => println!("Knowledge source set to: {label}"),
                None => println!(
                    "Knowledge source reset to: {}",
                    client.config().knowledge_source
                ),
            }
            *source = label;
            Ok(())
        }
        ChatCommand::Knowledge(text) => client.add_knowledge(text, source.as_deref()),
        ChatCommand::Model(name) => client.switch_model(name),
        ChatCommand::Embedding(name) => client.switch_embedding_model(name),
        ChatCommand::Pull(name) => client.pull_model(name),
        ChatCommand::Prompt(PromptKind::Current, text) => client.update_current_prompt(text),
        ChatCommand::Prompt(kind, text) => client.update_prompt(kind, text),
        ChatCommand::ShowPrompts => {
            client.show_prompts();
            Ok(())
        }
        ChatCommand::ResetPrompts => client.reset_prompts(),
        ChatCommand::ToggleChatMode => client.toggle_chat_mode(),
        ChatCommand::ToggleCache => client.toggle_cache(),
        ChatCommand::ToggleSpeech => client.toggle_speech(),
        ChatCommand::ClearHistory => client.clear_history(),
        ChatCommand::ClearCache => client.clear_cache(),
        ChatCommand::Search(query) => client.search_knowledge(query),
        ChatCommand::Stats => {
            client.refresh_system_info();
            Ok(())
        }
        ChatCommand::Models => {
            client.list_models();
            Ok(())
        }
        ChatCommand::History => {
            client.reload_history(true);
            Ok(())
        }
        ChatCommand::Status => {
            println!("Event channel: {}", client.connection_state());
            client.check_status();
            Ok(())
        }
    };

    if let Err(err) = result {
        print_error(&err.to_string());
    }
    true
}

fn print_error(message: &str) {
    eprintln!("Error: {message}");
}
