//! Sockets owned by a process
//!
//! Walks a process's file descriptors through libproc and turns every TCP
//! and UDP socket into a [`Connection`]. Decoding is kept separate from the
//! syscalls so it can be tested on any platform.

use lineage_core::{Connection, Protocol, TcpState};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// `soi_kind` for a plain internet socket
const SOCKINFO_IN: i32 = 1;
/// `soi_kind` for a TCP socket
const SOCKINFO_TCP: i32 = 2;

/// `insi_vflag` bits
const INI_IPV4: u8 = 0x1;
const INI_IPV6: u8 = 0x2;

/// Socket fields needed to describe a connection, in kernel encoding
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RawSocket {
    pub kind: i32,
    pub protocol: i32,
    pub vflag: u8,
    /// Network byte order, stored in the low half of an int
    pub local_port: i32,
    pub remote_port: i32,
    /// IPv4 addresses occupy the last four bytes
    pub local_addr: [u8; 16],
    pub remote_addr: [u8; 16],
    pub tcp_state: Option<i32>,
}

/// Map a `TSI_S_*` value to a TCP state
pub(crate) fn tcp_state_from_kernel(state: i32) -> Option<TcpState> {
    let state = match state {
        0 => TcpState::Closed,
        1 => TcpState::Listen,
        2 => TcpState::SynSent,
        3 => TcpState::SynReceived,
        4 => TcpState::Established,
        5 => TcpState::CloseWait,
        6 => TcpState::FinWait1,
        7 => TcpState::Closing,
        8 => TcpState::LastAck,
        9 => TcpState::FinWait2,
        10 => TcpState::TimeWait,
        _ => return None,
    };
    Some(state)
}

fn decode_addr(vflag: u8, bytes: &[u8; 16]) -> Option<IpAddr> {
    if vflag & INI_IPV6 != 0 {
        Some(IpAddr::V6(Ipv6Addr::from(*bytes)))
    } else if vflag & INI_IPV4 != 0 {
        Some(IpAddr::V4(Ipv4Addr::new(
            bytes[12], bytes[13], bytes[14], bytes[15],
        )))
    } else {
        None
    }
}

fn decode_port(raw: i32) -> u16 {
    u16::from_be(raw as u16)
}

/// Turn a kernel socket description into a connection.
///
/// Sockets that are neither TCP nor UDP over IPv4/IPv6 yield `None`.
pub(crate) fn decode_socket(raw: &RawSocket) -> Option<Connection> {
    let local_addr = decode_addr(raw.vflag, &raw.local_addr)?;
    let local_port = decode_port(raw.local_port);

    match raw.kind {
        SOCKINFO_TCP => {
            let remote_port = decode_port(raw.remote_port);
            // Listening sockets have no peer yet
            let remote = (remote_port != 0)
                .then(|| decode_addr(raw.vflag, &raw.remote_addr))
                .flatten();
            Some(Connection {
                protocol: Protocol::Tcp,
                local_addr,
                local_port,
                remote_addr: remote,
                remote_port: remote.map(|_| remote_port),
                state: raw.tcp_state.and_then(tcp_state_from_kernel),
            })
        }
        SOCKINFO_IN if raw.protocol == libc::IPPROTO_UDP => Some(Connection {
            protocol: Protocol::Udp,
            local_addr,
            local_port,
            remote_addr: None,
            remote_port: None,
            state: None,
        }),
        _ => None,
    }
}

#[cfg(target_os = "macos")]
pub use live::list_connections;

#[cfg(target_os = "macos")]
mod live {
    use super::{decode_socket, RawSocket, SOCKINFO_TCP};
    use crate::error::{PlatformError, PlatformResult};
    use lineage_core::Connection;
    use std::mem;

    /// `PROC_PIDFDSOCKETINFO` flavor for `proc_pidfdinfo`
    const PROC_PIDFDSOCKETINFO: libc::c_int = 3;

    /// Headroom for descriptors opened between sizing and filling the list
    const FD_LIST_SLACK: usize = 16;

    // Mirrors of <sys/proc_info.h>; libc does not export the socket flavors.

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct ProcFileInfo {
        fi_openflags: u32,
        fi_status: u32,
        fi_offset: i64,
        fi_type: i32,
        fi_guardflags: u32,
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct SockbufInfo {
        sbi_cc: u32,
        sbi_hiwat: u32,
        sbi_mbcnt: u32,
        sbi_mbmax: u32,
        sbi_lowat: u32,
        sbi_flags: i16,
        sbi_timeo: i16,
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct InSockInfoV6 {
        in6_hlim: u8,
        in6_cksum: i32,
        in6_ifindex: u16,
        in6_hops: i16,
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct InSockInfo {
        insi_fport: i32,
        insi_lport: i32,
        insi_gencnt: u64,
        insi_flags: u32,
        insi_flow: u32,
        insi_vflag: u8,
        insi_ip_ttl: u8,
        rfu_1: u32,
        insi_faddr: [u8; 16],
        insi_laddr: [u8; 16],
        insi_v4_tos: u8,
        insi_v6: InSockInfoV6,
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct TcpSockInfo {
        tcpsi_ini: InSockInfo,
        tcpsi_state: i32,
        tcpsi_timer: [i32; 4],
        tcpsi_mss: i32,
        tcpsi_flags: u32,
        rfu_1: u32,
        tcpsi_tp: u64,
    }

    /// `soi_proto`; the unix-domain member is the largest at 528 bytes
    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    union SocketProto {
        pri_in: InSockInfo,
        pri_tcp: TcpSockInfo,
        _size: [u64; 66],
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct SocketInfo {
        soi_stat: libc::vinfo_stat,
        soi_so: u64,
        soi_pcb: u64,
        soi_type: i32,
        soi_protocol: i32,
        soi_family: i32,
        soi_options: i16,
        soi_linger: i16,
        soi_state: i16,
        soi_qlen: i16,
        soi_incqlen: i16,
        soi_qlimit: i16,
        soi_timeo: i16,
        soi_error: u16,
        soi_oobmark: u32,
        soi_rcv: SockbufInfo,
        soi_snd: SockbufInfo,
        soi_kind: i32,
        rfu_1: u32,
        soi_proto: SocketProto,
    }

    #[repr(C)]
    #[allow(dead_code)]
    #[derive(Clone, Copy)]
    struct SocketFdInfo {
        pfi: ProcFileInfo,
        psi: SocketInfo,
    }

    /// Every TCP and UDP socket the process holds open
    pub fn list_connections(pid: u32) -> PlatformResult<Vec<Connection>> {
        let fds = list_fds(pid)?;
        let connections: Vec<_> = fds
            .iter()
            .filter(|fd| fd.proc_fdtype == libc::PROX_FDTYPE_SOCKET as u32)
            .filter_map(|fd| socket_info(pid, fd.proc_fd))
            .filter_map(|raw| decode_socket(&raw))
            .collect();

        if !connections.is_empty() {
            log::trace!("PID {} holds {} sockets", pid, connections.len());
        }
        Ok(connections)
    }

    fn list_fds(pid: u32) -> PlatformResult<Vec<libc::proc_fdinfo>> {
        // A null buffer asks for the size of the descriptor table
        let needed = unsafe {
            libc::proc_pidinfo(
                pid as libc::c_int,
                libc::PROC_PIDLISTFDS,
                0,
                std::ptr::null_mut(),
                0,
            )
        };
        if needed < 0 {
            return Err(PlatformError::from_errno("proc_pidinfo", pid));
        }
        if needed == 0 {
            return Ok(Vec::new());
        }

        let entry = mem::size_of::<libc::proc_fdinfo>();
        let capacity = needed as usize / entry + FD_LIST_SLACK;
        let mut fds: Vec<libc::proc_fdinfo> = vec![
            libc::proc_fdinfo {
                proc_fd: 0,
                proc_fdtype: 0,
            };
            capacity
        ];
        let written = unsafe {
            libc::proc_pidinfo(
                pid as libc::c_int,
                libc::PROC_PIDLISTFDS,
                0,
                fds.as_mut_ptr().cast(),
                (capacity * entry) as libc::c_int,
            )
        };
        if written < 0 {
            return Err(PlatformError::from_errno("proc_pidinfo", pid));
        }

        fds.truncate((written as usize / entry).min(capacity));
        Ok(fds)
    }

    /// Read one socket descriptor. Descriptors closed in the meantime are skipped.
    fn socket_info(pid: u32, fd: i32) -> Option<RawSocket> {
        let mut info: SocketFdInfo = unsafe { mem::zeroed() };
        let size = mem::size_of::<SocketFdInfo>() as libc::c_int;
        let written = unsafe {
            libc::proc_pidfdinfo(
                pid as libc::c_int,
                fd,
                PROC_PIDFDSOCKETINFO,
                (&mut info as *mut SocketFdInfo).cast(),
                size,
            )
        };
        if written <= 0 {
            log::trace!("No socket info for fd {} of PID {}", fd, pid);
            return None;
        }

        let psi = &info.psi;
        // Both union members start with the internet socket info
        let (ini, tcp_state) = unsafe {
            if psi.soi_kind == SOCKINFO_TCP {
                (psi.soi_proto.pri_tcp.tcpsi_ini, Some(psi.soi_proto.pri_tcp.tcpsi_state))
            } else {
                (psi.soi_proto.pri_in, None)
            }
        };

        Some(RawSocket {
            kind: psi.soi_kind,
            protocol: psi.soi_protocol,
            vflag: ini.insi_vflag,
            local_port: ini.insi_lport,
            remote_port: ini.insi_fport,
            local_addr: ini.insi_laddr,
            remote_addr: ini.insi_faddr,
            tcp_state,
        })
    }

}
