//! Interactive security assistant
//!
//! A line-based chat over the same inference client used for threat
//! analysis. `exit` quits, `switch model` picks the active model by number.

use crate::analysis::{InferenceClient, TextGenerator};
use crate::theme::Theme;
use std::io::{self, BufRead, Write};

const TOPICS: &[&str] = &[
    "Cybersecurity best practices",
    "Malware and virus protection",
    "Network security",
    "Security tools and software",
    "Common vulnerabilities",
    "Security incident response",
    "CVE details and analysis",
];

/// What a line of chat input asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Exit,
    SwitchModel,
    Empty,
    Question(String),
}

pub fn parse_command(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    match trimmed.to_lowercase().as_str() {
        "" => ChatCommand::Empty,
        "exit" => ChatCommand::Exit,
        "switch model" => ChatCommand::SwitchModel,
        _ => ChatCommand::Question(trimmed.to_string()),
    }
}

/// Resolve a 1-based menu choice against `models`
pub fn select_model<'a>(models: &'a [String], choice: &str) -> Result<&'a str, &'static str> {
    let index: usize = choice
        .trim()
        .parse()
        .map_err(|_| "Please enter a valid number.")?;
    index
        .checked_sub(1)
        .and_then(|i| models.get(i))
        .map(String::as_str)
        .ok_or("Invalid model number.")
}

/// Print a prompt and read one line; `None` at end of input
fn prompt_line<R: BufRead, W: Write>(input: &mut R, out: &mut W, prompt: &str) -> io::Result<Option<String>> {
    write!(out, "{}", prompt)?;
    // Make sure the prompt is visible before blocking on input
    out.flush()?;

    let mut line = String::new();
    if input.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line))
}

fn print_welcome<W: Write>(out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", Theme::header("Security assistant is ready. You can ask questions about:"))?;
    for topic in TOPICS {
        writeln!(out, "- {}", topic)?;
    }
    writeln!(out)?;
    writeln!(out, "Type {} to quit.", Theme::command("exit"))?;
    writeln!(out, "Type {} to change between models.", Theme::command("switch model"))?;
    Ok(())
}

fn switch_model<R: BufRead, W: Write>(client: &InferenceClient, input: &mut R, out: &mut W) -> io::Result<()> {
    let models = client.available_models();
    writeln!(out, "\nAvailable models:")?;
    for (i, model) in models.iter().enumerate() {
        writeln!(out, "{}. {}", i + 1, model)?;
    }

    let Some(choice) = prompt_line(input, out, "\nSelect model number: ")? else {
        return Ok(());
    };
    match select_model(&models, &choice) {
        Ok(model) => {
            client.set_model(model);
            writeln!(out, "Model changed to {}", Theme::value(model))?;
        }
        Err(message) => writeln!(out, "{}", Theme::warning(message))?,
    }
    Ok(())
}

/// Run the chat loop until `exit` or end of input
pub fn run_chat<R: BufRead, W: Write>(client: &InferenceClient, mut input: R, mut out: W) -> io::Result<()> {
    print_welcome(&mut out)?;

    loop {
        let Some(line) = prompt_line(&mut input, &mut out, "\nYour question: ")? else {
            break;
        };

        match parse_command(&line) {
            ChatCommand::Exit => break,
            ChatCommand::SwitchModel => switch_model(client, &mut input, &mut out)?,
            ChatCommand::Empty => writeln!(out, "{}", Theme::warning("Please enter a valid question."))?,
            ChatCommand::Question(question) => {
                writeln!(out, "{}", Theme::muted("\nGenerating response..."))?;
                match client.generate(&question) {
                    Ok(answer) => writeln!(out, "\n{} {}", Theme::header("Answer:"), answer)?,
                    Err(e) => {
                        tracing::warn!(error = %e, "assistant request failed");
                        writeln!(out, "\n{}", Theme::error(&format!("Error: {}", e)))?;
                    }
                }
            }
        }
    }

    writeln!(out, "Goodbye.")?;
    Ok(())
}
