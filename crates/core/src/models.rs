//! Core domain models for lineage
//!
//! Process records are the immutable input collected from the operating
//! system; nodes are the units of the reconstructed forest.

use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use time::OffsetDateTime;

/// PID of the root service manager. The whole forest hangs off this process.
pub const ROOT_PID: u32 = 1;

/// PID of the kernel/idle entity, which cannot be observed and is never a node.
pub const KERNEL_PID: u32 = 0;

/// One live process as reported by a record source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessRecord {
    /// Process ID
    pub pid: u32,
    /// Parent process ID as reported by the kernel
    pub ppid: u32,
    /// Process the OS holds responsible for this one (equals `pid` when none)
    pub responsible_pid: u32,
    /// Full path to the executable image
    pub path: String,
    /// Process start time
    #[serde(with = "time::serde::rfc3339")]
    pub start_time: OffsetDateTime,
    /// PID of the process that asked launchd to start this one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by_pid: Option<u32>,
    /// Name of the submitting process
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub submitted_by_name: Option<String>,
    /// Launch descriptor (plist) that caused this process to start
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub plist_path: Option<String>,
    /// Program path launchd started before the image was replaced
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub program_path: Option<String>,
    /// Network connections owned by the process
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub connections: Vec<Connection>,
}

impl ProcessRecord {
    /// Create a record with only the kernel-level fields populated
    pub fn new(
        pid: u32,
        ppid: u32,
        responsible_pid: u32,
        path: impl Into<String>,
        start_time: OffsetDateTime,
    ) -> Self {
        Self {
            pid,
            ppid,
            responsible_pid,
            path: path.into(),
            start_time,
            submitted_by_pid: None,
            submitted_by_name: None,
            plist_path: None,
            program_path: None,
            connections: Vec::new(),
        }
    }

    /// Whether this record is the root service manager
    pub fn is_root(&self) -> bool {
        self.pid == ROOT_PID
    }
}

/// Final path component, ignoring trailing separators.
///
/// Returns the input unchanged when it has no separator.
pub fn file_name(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() {
        return path;
    }
    trimmed.rsplit('/').next().unwrap_or(trimmed)
}

/// Network protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Connection-oriented protocols report a remote endpoint and a state
    pub fn is_connection_oriented(self) -> bool {
        matches!(self, Protocol::Tcp)
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// TCP connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TcpState {
    Closed,
    Listen,
    SynSent,
    SynReceived,
    Established,
    FinWait1,
    FinWait2,
    CloseWait,
    Closing,
    LastAck,
    TimeWait,
}

impl std::fmt::Display for TcpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TcpState::Closed => write!(f, "CLOSED"),
            TcpState::Listen => write!(f, "LISTEN"),
            TcpState::SynSent => write!(f, "SYN_SENT"),
            TcpState::SynReceived => write!(f, "SYN_RCVD"),
            TcpState::Established => write!(f, "ESTABLISHED"),
            TcpState::FinWait1 => write!(f, "FIN_WAIT_1"),
            TcpState::FinWait2 => write!(f, "FIN_WAIT_2"),
            TcpState::CloseWait => write!(f, "CLOSE_WAIT"),
            TcpState::Closing => write!(f, "CLOSING"),
            TcpState::LastAck => write!(f, "LAST_ACK"),
            TcpState::TimeWait => write!(f, "TIME_WAIT"),
        }
    }
}

/// A socket owned by a process
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub protocol: Protocol,
    pub local_addr: IpAddr,
    pub local_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_addr: Option<IpAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_port: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<TcpState>,
}

impl Connection {
    /// One-line description used as the display text of a network leaf
    pub fn describe(&self) -> String {
        if !self.protocol.is_connection_oriented() {
            return format!("{} - Local Port: {}", self.protocol, self.local_port);
        }

        let remote_addr = self
            .remote_addr
            .map(|a| a.to_string())
            .unwrap_or_else(|| "*".to_string());
        let remote_port = self
            .remote_port
            .map(|p| p.to_string())
            .unwrap_or_else(|| "*".to_string());
        let state = self
            .state
            .map(|s| s.to_string())
            .unwrap_or_else(|| "UNKNOWN".to_string());

        format!(
            "{} - {}:{} -> {}:{} - {}",
            self.protocol, self.local_addr, self.local_port, remote_addr, remote_port, state
        )
    }
}

/// Handle of a node inside a forest arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Kinds of nodes that do not correspond to a live process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyntheticKind {
    /// A launch descriptor (plist) that started one or more processes
    LaunchOrigin,
    /// The image a process ran before replacing itself
    ExecMarker,
    /// A socket leaf under its owning process
    Network,
}

/// Identity of a node: a live process or a synthetic marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Identity {
    Real(u32),
    Synthetic(SyntheticKind),
}

impl Identity {
    /// The PID, if this is a real process
    pub fn pid(self) -> Option<u32> {
        match self {
            Identity::Real(pid) => Some(pid),
            Identity::Synthetic(_) => None,
        }
    }

    pub fn is_synthetic(self) -> bool {
        matches!(self, Identity::Synthetic(_))
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Identity::Real(pid) => write!(f, "{}", pid),
            Identity::Synthetic(SyntheticKind::LaunchOrigin) => write!(f, "launch-origin"),
            Identity::Synthetic(SyntheticKind::ExecMarker) => write!(f, "exec"),
            Identity::Synthetic(SyntheticKind::Network) => write!(f, "socket"),
        }
    }
}

/// How a node's parent was chosen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Evidence {
    /// The root service manager, never resolved
    Root,
    /// Submitter is alive and became the parent
    SubmittedByPid,
    /// Submitter has exited; fell back to the kernel parent
    SubmittedByTerminated,
    /// Started from a launch descriptor
    LaunchOrigin,
    /// Responsible process differs from the process itself
    ResponsiblePid,
    /// Kernel-reported parent
    RawPpid,
    /// Socket leaf
    Network,
}

impl Evidence {
    /// Stable label shown to analysts
    pub fn label(self) -> &'static str {
        match self {
            Evidence::Root => "root",
            Evidence::SubmittedByPid => "submitted-by-pid",
            Evidence::SubmittedByTerminated => "submitted-by-terminated",
            Evidence::LaunchOrigin => "launch-origin",
            Evidence::ResponsiblePid => "responsible-pid",
            Evidence::RawPpid => "raw-ppid",
            Evidence::Network => "network",
        }
    }
}

impl std::fmt::Display for Evidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Display class of a node, used for styling only
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayClass {
    Process,
    LaunchOrigin,
    Network,
    ExecMarker,
}

/// A node of the reconstructed forest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub identity: Identity,
    /// Display path; may carry diagnostic suffixes added during resolution
    pub path: String,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    pub evidence: Evidence,
    /// Children in discovery order
    pub children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn process(record: &ProcessRecord) -> Self {
        let evidence = if record.is_root() {
            Evidence::Root
        } else {
            Evidence::RawPpid
        };
        Self {
            identity: Identity::Real(record.pid),
            path: record.path.clone(),
            timestamp: record.start_time,
            evidence,
            children: Vec::new(),
        }
    }

    pub(crate) fn synthetic(
        kind: SyntheticKind,
        path: String,
        timestamp: OffsetDateTime,
        evidence: Evidence,
    ) -> Self {
        Self {
            identity: Identity::Synthetic(kind),
            path,
            timestamp,
            evidence,
            children: Vec::new(),
        }
    }

    pub fn display_class(&self) -> DisplayClass {
        match self.identity {
            Identity::Real(_) => DisplayClass::Process,
            Identity::Synthetic(SyntheticKind::LaunchOrigin) => DisplayClass::LaunchOrigin,
            Identity::Synthetic(SyntheticKind::Network) => DisplayClass::Network,
            Identity::Synthetic(SyntheticKind::ExecMarker) => DisplayClass::ExecMarker,
        }
    }
}
