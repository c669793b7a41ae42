//! `chatterbox connect <credential>` — interactive line client.
//!
//! Reads commands from stdin and prints every event the relay pushes:
//!
//! ```text
//! /dm <user> <text>        direct message
//! /group <id> <text>       group message
//! /typing <user> on|off    typing indicator
//! /raw <json>              send a frame verbatim
//! /quit                    close and exit
//! ```

use anyhow::{Context, Result};
use chatterbox_client::{ChatClient, ClientEvent};
use chatterbox_core::{Frame, ServerEvent};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

/// One parsed input line.
#[derive(Debug, PartialEq)]
pub enum Input {
    Send(Frame),
    Raw(String),
    Quit,
}

/// Parse a line typed by the user.
pub fn parse_line(line: &str) -> Result<Input> {
    let line = line.trim();
    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    let rest = rest.trim_start();

    match command {
        "/quit" | "/exit" => Ok(Input::Quit),
        "/raw" if !rest.is_empty() => Ok(Input::Raw(rest.to_string())),
        "/dm" => {
            let (user, text) = split_target(rest, "/dm <user> <text>")?;
            Ok(Input::Send(Frame::DirectMessage {
                recipient_id: user.to_string(),
                content: text.to_string(),
                timestamp: None,
                message_id: None,
            }))
        }
        "/group" => {
            let (group, text) = split_target(rest, "/group <id> <text>")?;
            Ok(Input::Send(Frame::GroupMessage {
                group_id: group.to_string(),
                content: text.to_string(),
                timestamp: None,
            }))
        }
        "/typing" => {
            let (user, state) = split_target(rest, "/typing <user> on|off")?;
            let is_typing = match state {
                "on" => true,
                "off" => false,
                other => anyhow::bail!("expected on or off, got '{other}'"),
            };
            Ok(Input::Send(Frame::Typing {
                recipient_id: user.to_string(),
                is_typing,
            }))
        }
        _ => anyhow::bail!("unknown command: {line}"),
    }
}

fn split_target<'a>(rest: &'a str, usage: &str) -> Result<(&'a str, &'a str)> {
    match rest.split_once(' ') {
        Some((target, text)) if !target.is_empty() && !text.trim().is_empty() => {
            Ok((target, text.trim()))
        }
        _ => anyhow::bail!("usage: {usage}"),
    }
}

/// Render an event for the terminal.
pub fn format_event(event: &ServerEvent) -> String {
    match event {
        ServerEvent::UserStatus { user_id, status } => format!("* {user_id} is {status}"),
        ServerEvent::Typing { user_id, is_typing } => {
            if *is_typing {
                format!("* {user_id} is typing")
            } else {
                format!("* {user_id} stopped typing")
            }
        }
        ServerEvent::Message {
            sender_id,
            group_id: Some(group_id),
            content,
            ..
        } => format!("[{group_id}] <{sender_id}> {content}"),
        ServerEvent::Message {
            sender_id, content, ..
        } => format!("<{sender_id}> {content}"),
        ServerEvent::Offer { sender_id, .. } => format!("* call offer from {sender_id}"),
        ServerEvent::Answer { sender_id, .. } => format!("* call answer from {sender_id}"),
        ServerEvent::IceCandidate { sender_id, data } => {
            format!("* ice candidate from {sender_id}: {data}")
        }
        ServerEvent::CallEnd { sender_id } => format!("* {sender_id} ended the call"),
        ServerEvent::Status { message_id, status } => format!("* message {message_id}: {status}"),
    }
}

pub async fn run(server: &str, credential: &str) -> Result<()> {
    let mut client = ChatClient::connect(server, credential)
        .await
        .with_context(|| format!("failed to connect to {server}"))?;
    eprintln!("connected to {server}; /quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = client.next_event() => match event {
                Some(ClientEvent::Event(event)) => println!("{}", format_event(&event)),
                Some(ClientEvent::Closed { code, reason }) => {
                    eprintln!("connection closed ({}) {reason}", code.map(|c| c.to_string()).unwrap_or_else(|| "-".into()));
                    return Ok(());
                }
                None => return Ok(()),
            },

            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                match parse_line(&line) {
                    Ok(Input::Quit) => break,
                    Ok(Input::Send(frame)) => {
                        debug!(kind = frame.kind(), "sending frame");
                        client.send(&frame).await.context("send failed")?;
                    }
                    Ok(Input::Raw(text)) => client.send_raw(&text).await.context("send failed")?,
                    Err(e) => eprintln!("{e}"),
                }
            }
        }
    }

    client.close().await?;
    Ok(())
}
