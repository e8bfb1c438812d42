//! # Transport
//!
//! The two sides exchange ordered, asynchronous, structured messages. Any
//! carrier that preserves send order satisfies [`Transport`]; the in-process
//! [`duplex`] channel is the one used when both sides share a process.
//!
//! Messages serialise as internally tagged objects, e.g.
//! `{"type":"reveal","line":12}` or `{"type":"set-position","line":3,"silent":true}`.

use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};

use serde::{Deserialize, Serialize};

use crate::error::SyncError;

/// Position signals raised by the source editor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SourceSignal {
    Cursor {
        line: u32,
    },
    #[serde(rename_all = "camelCase")]
    Viewport {
        top_line: u32,
        bottom_line: u32,
    },
}

/// Source side to render side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToRender {
    /// Full updated source text; the render side re-renders from scratch.
    Content { text: String },
    Reveal { line: u32 },
}

/// Render side to source side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ToSource {
    SetPosition { line: u32, silent: bool },
}

/// One end of an ordered duplex message carrier.
pub trait Transport {
    type Outgoing;
    type Incoming;

    fn send(&self, message: Self::Outgoing) -> Result<(), SyncError>;

    /// Next delivered message, or `None` when nothing is waiting.
    fn try_recv(&self) -> Result<Option<Self::Incoming>, SyncError>;
}

/// In-process endpoint backed by a pair of channels.
#[derive(Debug)]
pub struct ChannelEndpoint<Out, In> {
    tx: Sender<Out>,
    rx: Receiver<In>,
}

/// Create two connected endpoints.
pub fn duplex<A, B>() -> (ChannelEndpoint<A, B>, ChannelEndpoint<B, A>) {
    let (a_tx, a_rx) = mpsc::channel();
    let (b_tx, b_rx) = mpsc::channel();
    (
        ChannelEndpoint { tx: a_tx, rx: b_rx },
        ChannelEndpoint { tx: b_tx, rx: a_rx },
    )
}

impl<Out, In> Transport for ChannelEndpoint<Out, In> {
    type Outgoing = Out;
    type Incoming = In;

    fn send(&self, message: Out) -> Result<(), SyncError> {
        self.tx.send(message).map_err(|_| SyncError::Disconnected)
    }

    fn try_recv(&self) -> Result<Option<In>, SyncError> {
        match self.rx.try_recv() {
            Ok(message) => Ok(Some(message)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(SyncError::Disconnected),
        }
    }
}
