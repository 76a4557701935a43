use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use webpet_core::{Action, EngineEvent, Friend, Gate, Reward, SettingsBus, SettingsWriter};
use webpet_host::{VoiceOutcome, bootstrap, logging};

#[derive(Debug, Parser)]
#[command(name = "webpet", version)]
#[command(about = "A virtual pet companion in your terminal")]
struct Args {
    /// TOML config file; defaults apply when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// SQLite database, overriding `[persistence] path`
    #[arg(long)]
    db: Option<PathBuf>,
}

const HELP: &str = "\
commands:
  work | play | feed | pet      run an action
  hello                         say hi
  fetch                         throw the ball
  friend <name> <type>          add a friend
  visit <name>                  play with a friend
  say <text>                    voice command
  chat <text>                   talk to the pet
  rename <name>                 rename from settings
  apikey <key>                  set the chat credential
  api                           check the chat backend
  status                        show the pet
  quit";

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = bootstrap::load_config(args.config.as_deref())?;
    logging::init(&config.general)?;

    let store = bootstrap::open_store(&config, args.db.as_deref()).context("opening pet store")?;
    let bus = SettingsBus::default();
    let writer = SettingsWriter::new(Arc::clone(&store), bus.clone());

    let running = bootstrap::start(config, store, &bus);
    let pet = running.handle;
    let mut events = running.events;
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                EngineEvent::Notify(message) => println!("* {message}"),
                EngineEvent::ActivityChanged { to, .. } => println!("  [{to}]"),
                _ => {}
            }
        }
    });

    println!("{HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let (cmd, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match cmd {
            "" => {}
            "work" | "play" | "feed" | "pet" => {
                let action = match cmd {
                    "work" => Action::Work,
                    "play" => Action::Play,
                    "feed" => Action::Feed,
                    _ => Action::Pet,
                };
                report_gate(action, pet.perform(action).await?);
            }
            "hello" => pet.greet().await?,
            "fetch" => pet.grant_reward(Reward::FETCH).await?,
            "friend" => match rest.split_once(' ') {
                Some((name, kind)) => pet.add_friend(Friend::new(name, kind.trim())).await?,
                None => println!("usage: friend <name> <type>"),
            },
            "visit" => pet.play_with_friend(rest).await?,
            "say" => match pet.voice(rest).await? {
                VoiceOutcome::Acted(action, gate) => report_gate(action, gate),
                VoiceOutcome::Greeted => {}
                VoiceOutcome::Chatted(reply) => print_reply(reply),
            },
            "chat" => print_reply(pet.chat(rest).await?),
            "rename" => match writer.rename_pet(rest) {
                Ok(_) => {}
                Err(e) => println!("! {e}"),
            },
            "apikey" => match writer.set_api_key(rest) {
                Ok(()) => println!("API key saved."),
                Err(e) => println!("! {e}"),
            },
            "api" => println!("{:?}", pet.api_status().await),
            "status" => {
                let snap = pet.snapshot().await?;
                println!("{} ({})", snap.state.name, snap.activity);
                println!("{}", serde_json::to_string_pretty(&snap.state)?);
            }
            "quit" | "exit" => break,
            "help" => println!("{HELP}"),
            other => println!("unknown command: {other} (try `help`)"),
        }
    }

    drop(pet);
    running.watcher.abort();
    running.task.await.context("engine task panicked")?;
    printer.await.context("event printer panicked")?;
    Ok(())
}

fn report_gate(action: Action, gate: Gate) {
    match gate {
        Gate::Allowed => {}
        Gate::Asleep => println!("  (too sleepy to {action})"),
        Gate::TooTired => println!("  (too tired to {action})"),
    }
}

fn print_reply(reply: Option<webpet_llm::Reply>) {
    if let Some(reply) = reply {
        println!("> {}", reply.text);
    }
}
