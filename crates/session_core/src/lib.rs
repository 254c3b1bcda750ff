//! Client-side session layer for a Huskey vault backend.
//!
//! The [`SessionController`] owns the state of the open database and is the
//! only writer to it. Every user action becomes one remote command through
//! [`RemoteCommands`]; state advances only on a confirmed success and each
//! committed transition is broadcast as a [`SessionEvent`] for observers such
//! as the [`TitleDecorator`] and [`RouteGuard`].

pub mod commands;
pub mod controller;
pub mod error;
pub mod observers;
pub mod remote;
pub mod session;
pub mod transport;

pub use commands::BackendCommands;
pub use controller::SessionController;
pub use error::{RemoteCommandError, Result, SessionError};
pub use observers::{
    spawn_observer, Navigation, RouteGuard, SessionObserver, TitleDecorator, WindowTitle,
};
pub use remote::RemoteCommands;
pub use session::{Session, SessionChange, SessionEvent, SessionSnapshot, SessionStatus};
pub use transport::{HttpCommandTransport, TransportError};
