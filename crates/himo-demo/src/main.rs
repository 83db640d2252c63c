#![forbid(unsafe_code)]

//! Headless sample form driven through himo bindings.
//!
//! A scripted user types into edit boxes and clicks buttons. Its input and
//! the binder's repaint requests share one message queue, the way a native
//! event loop would deliver them; each paint prints the form to stdout.
//!
//! Logs go to stderr. Set `RUST_LOG=himo_core=trace` to watch dispatch and
//! flushes.

mod form;
mod wiring;

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::form::{Control, Form};
use crate::wiring::{MAX_TEXT, Wiring};

#[derive(Debug, Parser)]
#[command(name = "himo-demo", version, about = "Drive a headless form through himo bindings")]
struct Args {
    /// How long the asynchronous append action takes, in milliseconds.
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// How many times the scripted user clicks the append button.
    #[arg(long, default_value_t = 3)]
    clicks: u32,

    /// Number of edit boxes (each with a mirroring label).
    #[arg(long, default_value_t = 3, value_parser = clap::value_parser!(u16).range(1..))]
    surfaces: u16,

    /// Pause between scripted user events, in milliseconds.
    #[arg(long, default_value_t = 50)]
    pace_ms: u64,
}

#[derive(Debug)]
enum Message {
    /// The user edited a control.
    Type(Control, String),
    /// Text arrived without a keystroke (paste, IME commit).
    Paste(Control, String),
    Click(Control),
    Paint,
    Quit,
}

fn main() -> Result<()> {
    init_logging();
    let args = Args::parse();
    tracing::info!(?args, "starting");

    let form = Arc::new(Form::new(args.surfaces));
    let (tx, rx) = mpsc::channel();
    let repaint = tx.clone();
    let wiring = Wiring::new(
        &form,
        args.surfaces,
        Duration::from_millis(args.delay_ms),
        move || {
            // Only fails once the pump has exited.
            let _ = repaint.send(Message::Paint);
        },
    )?;

    let user = {
        let script = script(&args);
        let pace = Duration::from_millis(args.pace_ms);
        thread::Builder::new()
            .name("scripted-user".to_owned())
            .spawn(move || play(&tx, script, pace))
            .context("spawning scripted user")?
    };

    pump(&rx, &form, &wiring);

    match user.join() {
        Ok(result) => result?,
        Err(_) => anyhow::bail!("scripted user panicked"),
    }
    Ok(())
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn script(args: &Args) -> Vec<Message> {
    let last = Control::Edit(args.surfaces - 1);
    let mut steps = vec![
        Message::Paint,
        Message::Type(Control::Edit(0), "hello".to_owned()),
        Message::Paste(last, "hello, world".to_owned()),
        Message::Type(Control::Edit(0), "x".repeat(MAX_TEXT + 8)),
    ];
    steps.extend((0..args.clicks).map(|_| Message::Click(Control::Append)));
    steps.push(Message::Click(Control::Toggle));
    steps.push(Message::Quit);
    steps
}

fn play(tx: &Sender<Message>, script: Vec<Message>, pace: Duration) -> Result<()> {
    for message in script {
        tx.send(message).context("message queue closed")?;
        thread::sleep(pace);
    }
    Ok(())
}

fn pump(rx: &Receiver<Message>, form: &Form, wiring: &Wiring) {
    for message in rx {
        match message {
            Message::Type(control, text) => {
                tracing::info!(%control, %text, "type");
                form.set_text(control, &text);
                wiring.binder.on_command(&control);
            }
            Message::Paste(control, text) => {
                tracing::info!(%control, %text, "paste");
                form.set_text(control, &text);
                wiring.binder.on_notify(&control);
            }
            Message::Click(control) => {
                tracing::info!(%control, "click");
                if wiring.append.is_busy() && control == Control::Append {
                    tracing::info!("append still running, click waits for it");
                }
                wiring.binder.on_command(&control);
            }
            Message::Paint => paint(form, wiring),
            Message::Quit => break,
        }
    }

    wiring.append.wait_idle();
    paint(form, wiring);
    tracing::info!(
        text = %wiring.text.get(),
        editable = wiring.editable.get(),
        toggle_enabled = wiring.toggle.is_enabled(),
        "final state"
    );
}

fn paint(form: &Form, wiring: &Wiring) {
    if wiring.binder.on_draw() {
        println!("{}", form.render());
    }
}
