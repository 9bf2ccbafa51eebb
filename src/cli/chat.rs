use std::io::Write;

use anyhow::Result;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use tokio::sync::mpsc;

use crate::client::{ChatSession, TurnOutcome};

pub async fn run(url: &str, model: &str, token: Option<&str>) -> Result<()> {
    let mut rl = DefaultEditor::new().expect("Editor failed");

    let relay_url = format!("{}/api/relay", url.trim_end_matches('/'));
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    let mut builder = ChatSession::builder(&relay_url, model).deltas(tx);
    if let Some(token) = token {
        builder = builder.session_token(token);
    }
    let mut session = builder.build();

    // Print deltas as they stream in
    let printer = tokio::spawn(async move {
        while let Some(delta) = rx.recv().await {
            print!("{}", delta);
            let _ = std::io::stdout().flush();
        }
    });

    loop {
        let readline = rl.readline(">>> ");
        match readline {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let outcome = if line == "/regen" {
                    match session.regenerate().await {
                        Ok(outcome) => outcome,
                        Err(e) => {
                            println!("Error: {}", e);
                            continue;
                        }
                    }
                } else {
                    session.submit(line).await?
                };
                println!();
                if let TurnOutcome::Failed(message) = outcome {
                    println!("Error: {}", message);
                }
            }
            Err(ReadlineError::Interrupted) => break,
            Err(ReadlineError::Eof) => break,
            Err(err) => {
                println!("Error: {:?}", err);
                break;
            }
        }
    }

    printer.abort();
    Ok(())
}
