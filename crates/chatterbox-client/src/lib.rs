//! chatterbox-client: async client for the ChatterBox relay.
//!
//! ```no_run
//! use chatterbox_client::{ChatClient, ClientEvent};
//! use chatterbox_core::Frame;
//!
//! # async fn example() -> chatterbox_core::ChatResult<()> {
//! let mut client = ChatClient::connect("ws://127.0.0.1:8000", "<token>").await?;
//! client
//!     .send(&Frame::DirectMessage {
//!         recipient_id: "bob".into(),
//!         content: "hi".into(),
//!         timestamp: None,
//!         message_id: None,
//!     })
//!     .await?;
//!
//! while let Some(event) = client.next_event().await {
//!     match event {
//!         ClientEvent::Event(e) => println!("{e:?}"),
//!         ClientEvent::Closed { .. } => break,
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{endpoint_url, ChatClient, ClientEvent};
