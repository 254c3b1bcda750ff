//! Consumers of committed session state: window title and route guard.

use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

use tokio::{
    sync::broadcast::{self, error::RecvError},
    task::JoinHandle,
};
use tracing::{debug, warn};

use crate::session::{SessionEvent, SessionSnapshot};

pub const UNSAVED_CHANGES_MARKER: &str = " (*)";
pub const LANDING_ROUTE: &str = "/";

pub trait SessionObserver: Send {
    fn session_changed(&mut self, snapshot: &SessionSnapshot);
}

impl<T> SessionObserver for Arc<Mutex<T>>
where
    T: SessionObserver,
{
    fn session_changed(&mut self, snapshot: &SessionSnapshot) {
        match self.lock() {
            Ok(mut observer) => observer.session_changed(snapshot),
            Err(poisoned) => poisoned.into_inner().session_changed(snapshot),
        }
    }
}

/// Feeds every committed session event to `observer` until the controller
/// goes away.
pub fn spawn_observer<O>(
    mut events: broadcast::Receiver<SessionEvent>,
    mut observer: O,
) -> JoinHandle<()>
where
    O: SessionObserver + 'static,
{
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    debug!(change = ?event.change, "session observer notified");
                    observer.session_changed(&event.snapshot);
                }
                // The next recv resumes at the oldest retained event. Snapshots are
                // complete, so replaying from there still ends on the newest state.
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "session observer lagged behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

pub trait WindowTitle: Send {
    fn set_title(&mut self, title: &str);
}

/// Marks the window title while the open session has unsaved changes.
pub struct TitleDecorator<W: WindowTitle> {
    window: W,
    base_title: String,
    decorated: bool,
}

impl<W: WindowTitle> TitleDecorator<W> {
    pub fn new(window: W, base_title: impl Into<String>) -> Self {
        Self {
            window,
            base_title: base_title.into(),
            decorated: false,
        }
    }

    pub fn title(&self) -> String {
        if self.decorated {
            format!("{}{UNSAVED_CHANGES_MARKER}", self.base_title)
        } else {
            self.base_title.clone()
        }
    }

    pub fn window(&self) -> &W {
        &self.window
    }
}

impl<W: WindowTitle> SessionObserver for TitleDecorator<W> {
    fn session_changed(&mut self, snapshot: &SessionSnapshot) {
        let decorated = snapshot.is_open() && snapshot.is_dirty();
        if decorated != self.decorated {
            self.decorated = decorated;
            let title = self.title();
            self.window.set_title(&title);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Navigation {
    Allowed(String),
    Redirected { from: String, to: String },
}

/// Keeps the user out of database views while no database is open.
#[derive(Debug, Clone)]
pub struct RouteGuard {
    landing: String,
    protected: BTreeSet<String>,
    current: String,
    session_open: bool,
}

impl RouteGuard {
    pub fn new<I, S>(landing: impl Into<String>, protected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let landing = landing.into();
        Self {
            current: landing.clone(),
            landing,
            protected: protected.into_iter().map(Into::into).collect(),
            session_open: false,
        }
    }

    pub fn current(&self) -> &str {
        &self.current
    }

    pub fn is_protected(&self, route: &str) -> bool {
        self.protected.contains(route)
    }

    pub fn navigate(&mut self, route: &str) -> Navigation {
        if self.is_protected(route) && !self.session_open {
            debug!(
                %route,
                landing = %self.landing,
                "protected route entered without an open database"
            );
            self.current = self.landing.clone();
            return Navigation::Redirected {
                from: route.to_string(),
                to: self.landing.clone(),
            };
        }
        self.current = route.to_string();
        Navigation::Allowed(self.current.clone())
    }
}

impl Default for RouteGuard {
    fn default() -> Self {
        Self::new(LANDING_ROUTE, ["/database", "/entry/new", "/entry/edit"])
    }
}

impl SessionObserver for RouteGuard {
    fn session_changed(&mut self, snapshot: &SessionSnapshot) {
        self.session_open = snapshot.is_open();
        if !self.session_open && self.is_protected(&self.current) {
            self.current = self.landing.clone();
        }
    }
}
