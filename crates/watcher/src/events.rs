//! Raw notification events and the logical events reported downstream
//!
//! A [`RawEvent`] is what the OS notifier told us about a single path. A
//! [`LogicalEvent`] is the classified, delivery-ready change that reaches the
//! sink. The wire form of a logical event is [`EventPayload`].

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Event as NotifyEvent, EventKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::BitOr;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Set of operation flags carried by a raw event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Ops(u8);

impl Ops {
    /// Data was written (not necessarily complete)
    pub const WRITE: Ops = Ops(1);
    /// Path was created, or moved into a watched directory
    pub const CREATE: Ops = Ops(1 << 1);
    /// Path was deleted
    pub const REMOVE: Ops = Ops(1 << 2);
    /// Path was renamed or moved
    pub const RENAME: Ops = Ops(1 << 3);
    /// A writer closed the file; the write has settled
    pub const CLOSE_WRITE: Ops = Ops(1 << 4);

    pub const fn empty() -> Self {
        Ops(0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Whether every flag in `other` is set
    pub const fn contains(self, other: Ops) -> bool {
        other.0 != 0 && self.0 & other.0 == other.0
    }
}

impl BitOr for Ops {
    type Output = Ops;

    fn bitor(self, rhs: Ops) -> Ops {
        Ops(self.0 | rhs.0)
    }
}

/// One notification for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    /// Affected path
    pub path: PathBuf,
    /// Operations observed
    pub ops: Ops,
    /// Whether the path names a directory
    pub is_dir: bool,
    /// Previous location for rename/move events
    pub moved_from: Option<PathBuf>,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, ops: Ops) -> Self {
        Self {
            path: path.into(),
            ops,
            is_dir: false,
            moved_from: None,
        }
    }

    /// Mark the event as concerning a directory
    pub fn directory(mut self) -> Self {
        self.is_dir = true;
        self
    }

    /// Attach the path this entry was moved from
    pub fn with_moved_from(mut self, from: impl Into<PathBuf>) -> Self {
        self.moved_from = Some(from.into());
        self
    }

    pub fn has(&self, op: Ops) -> bool {
        self.ops.contains(op)
    }

    /// Moved-from path, if present and non-empty
    pub fn moved_from(&self) -> Option<&Path> {
        self.moved_from
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Convert a notify event, probing the filesystem for directory flags
    pub fn from_notify(event: NotifyEvent) -> Vec<RawEvent> {
        Self::from_notify_with(event, |path| {
            std::fs::metadata(path)
                .map(|m| m.is_dir())
                .unwrap_or(false)
        })
    }

    /// Convert a notify event using `is_dir` to resolve directory flags
    ///
    /// Rename pairs (`RenameMode::Both`) become a single create event on the
    /// destination carrying the source as its moved-from path. Kinds that
    /// carry no meaning for reporting produce no raw events.
    pub fn from_notify_with<F>(event: NotifyEvent, is_dir: F) -> Vec<RawEvent>
    where
        F: Fn(&Path) -> bool,
    {
        let NotifyEvent { kind, paths, .. } = event;

        match kind {
            EventKind::Create(CreateKind::Folder) => paths
                .into_iter()
                .map(|p| RawEvent::new(p, Ops::CREATE).directory())
                .collect(),
            EventKind::Create(CreateKind::File) => paths
                .into_iter()
                .map(|p| RawEvent::new(p, Ops::CREATE))
                .collect(),
            EventKind::Create(_) => paths
                .into_iter()
                .map(|p| {
                    let dir = is_dir(&p);
                    RawEvent {
                        is_dir: dir,
                        ..RawEvent::new(p, Ops::CREATE)
                    }
                })
                .collect(),
            EventKind::Remove(remove_kind) => paths
                .into_iter()
                .map(|p| RawEvent {
                    is_dir: matches!(remove_kind, RemoveKind::Folder),
                    ..RawEvent::new(p, Ops::REMOVE)
                })
                .collect(),
            EventKind::Access(AccessKind::Close(AccessMode::Write)) => paths
                .into_iter()
                .map(|p| RawEvent::new(p, Ops::CLOSE_WRITE))
                .collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                let mut paths = paths.into_iter();
                match (paths.next(), paths.next()) {
                    (Some(from), Some(to)) => {
                        let dir = is_dir(&to);
                        vec![RawEvent {
                            is_dir: dir,
                            ..RawEvent::new(to, Ops::CREATE | Ops::RENAME).with_moved_from(from)
                        }]
                    }
                    _ => Vec::new(),
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => paths
                .into_iter()
                .map(|p| {
                    let dir = is_dir(&p);
                    RawEvent {
                        is_dir: dir,
                        ..RawEvent::new(p, Ops::CREATE)
                    }
                })
                .collect(),
            EventKind::Modify(ModifyKind::Name(_)) => paths
                .into_iter()
                .map(|p| RawEvent::new(p, Ops::RENAME))
                .collect(),
            EventKind::Modify(ModifyKind::Data(_))
            | EventKind::Modify(ModifyKind::Any)
            | EventKind::Modify(ModifyKind::Other) => paths
                .into_iter()
                .map(|p| RawEvent::new(p, Ops::WRITE))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Kind of a reported change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalEventKind {
    /// A write settled after the quiet period
    Write,
    /// The path was removed
    Remove,
    /// The path appeared by rename or move
    Create,
}

impl LogicalEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Write => "write",
            Self::Remove => "remove",
            Self::Create => "create",
        }
    }
}

impl fmt::Display for LogicalEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified change, ready for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogicalEvent {
    kind: LogicalEventKind,
    path: PathBuf,
    moved_from: Option<PathBuf>,
    timestamp: SystemTime,
}

impl LogicalEvent {
    /// A settled write observed last at `timestamp`
    pub fn write(path: impl Into<PathBuf>, timestamp: SystemTime) -> Self {
        Self {
            kind: LogicalEventKind::Write,
            path: path.into(),
            moved_from: None,
            timestamp,
        }
    }

    pub fn remove(path: impl Into<PathBuf>) -> Self {
        Self {
            kind: LogicalEventKind::Remove,
            path: path.into(),
            moved_from: None,
            timestamp: SystemTime::now(),
        }
    }

    /// A path that appeared by moving `from`
    pub fn moved(path: impl Into<PathBuf>, from: impl Into<PathBuf>) -> Self {
        Self {
            kind: LogicalEventKind::Create,
            path: path.into(),
            moved_from: Some(from.into()),
            timestamp: SystemTime::now(),
        }
    }

    pub fn kind(&self) -> LogicalEventKind {
        self.kind
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn moved_from(&self) -> Option<&Path> {
        self.moved_from.as_deref()
    }

    pub fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    /// Wire representation sent to the reporting endpoint
    pub fn payload(&self) -> EventPayload {
        EventPayload {
            event_type: self.kind,
            file_path: self.path.to_string_lossy().into_owned(),
            move_from_path: self
                .moved_from
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }
}

/// JSON body POSTed for each logical event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventPayload {
    pub event_type: LogicalEventKind,
    pub file_path: String,
    pub move_from_path: String,
}
