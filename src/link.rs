use std::fmt;
use std::io;
use std::mem;
use std::os::unix::io::{AsRawFd, RawFd};

use thiserror::Error;

use crate::sys;

/// Negotiated duplex mode as reported by the device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Duplex {
    Half,
    Full,
    Unknown,
}

/// Raw fields taken from a successful ETHTOOL_GSET reply. `speed` is the
/// combined Mbps value; `u32::MAX` means the driver reported it unknown.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct LinkSettings {
    pub speed: u32,
    pub duplex: u8,
}

/// Link-layer status of one interface, assembled fresh per query.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct LinkStatus {
    name: String,
    index: Option<i32>,
    speed_mbps: Option<u32>,
    duplex: Duplex,
}

impl LinkStatus {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> Option<i32> {
        self.index
    }

    pub fn speed_mbps(&self) -> Option<u32> {
        self.speed_mbps
    }

    pub fn duplex(&self) -> Duplex {
        self.duplex
    }
}

impl fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}: interface {}", self.name, index)?,
            None => write!(f, "{}: (no interface index)", self.name)?,
        }
        match self.speed_mbps {
            Some(mbps) => write!(f, ", {} Mbps bandwidth", mbps)?,
            None => write!(f, ", unknown bandwidth")?,
        }
        match self.duplex {
            Duplex::Half => write!(f, ", half duplex."),
            Duplex::Full => write!(f, ", full duplex."),
            Duplex::Unknown => write!(f, ", unknown mode."),
        }
    }
}

#[derive(Error, Debug)]
pub enum QueryError {
    #[error("Error: NULL interface name.")]
    EmptyName,
    #[error("{name}: Cannot create AF_INET socket: {source}.")]
    Socket { name: String, source: io::Error },
    #[error("{name}: {request} ioctl: {source}.")]
    Ioctl {
        name: String,
        request: &'static str,
        source: io::Error,
    },
    #[error("{name}: Error closing socket: {source}.")]
    Close { name: String, source: io::Error },
}

/// The device-control channel the query runs over. `ControlSocket` talks to
/// the kernel; tests substitute a scripted channel.
pub trait LinkChannel: Sized {
    fn open() -> io::Result<Self>;
    fn link_settings(&self, name: &str) -> io::Result<LinkSettings>;
    fn ifindex(&self, name: &str) -> io::Result<i32>;
    fn close(self) -> io::Result<()>;
}

/// An AF_INET stream socket used purely as an ioctl handle, never for data
/// transfer. Dropped handles are closed; `close` reports the close error.
pub struct ControlSocket {
    fd: sys::c_int,
}

impl LinkChannel for ControlSocket {
    fn open() -> io::Result<ControlSocket> {
        let fd = unsafe { sys::socket(sys::AF_INET, sys::SOCK_STREAM, 0) };
        if fd == -1 {
            return Err(io::Error::last_os_error());
        }
        log::debug!("opened control socket, fd {}", fd);
        Ok(ControlSocket { fd })
    }

    fn link_settings(&self, name: &str) -> io::Result<LinkSettings> {
        let mut cmd: sys::ethtool_cmd = unsafe { mem::zeroed() };
        cmd.cmd = sys::ETHTOOL_GSET;

        let mut ifr = sys::ifreq_with_name(name);
        ifr.ifru.ifru_data = &mut cmd as *mut sys::ethtool_cmd as *mut sys::c_void;

        if unsafe { sys::ioctl(self.fd, sys::SIOCETHTOOL, &mut ifr as *mut sys::ifreq) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(LinkSettings {
            speed: sys::ethtool_cmd_speed(&cmd),
            duplex: cmd.duplex,
        })
    }

    fn ifindex(&self, name: &str) -> io::Result<i32> {
        let mut ifr = sys::ifreq_with_name(name);

        if unsafe { sys::ioctl(self.fd, sys::SIOCGIFINDEX, &mut ifr as *mut sys::ifreq) } < 0 {
            return Err(io::Error::last_os_error());
        }

        Ok(unsafe { ifr.ifru.ifru_ifindex })
    }

    fn close(self) -> io::Result<()> {
        let fd = self.fd;
        mem::forget(self);
        close_retrying(fd)
    }
}

impl AsRawFd for ControlSocket {
    fn as_raw_fd(&self) -> RawFd {
        self.fd
    }
}

impl Drop for ControlSocket {
    fn drop(&mut self) {
        let _ = close_retrying(self.fd);
    }
}

fn close_retrying(fd: sys::c_int) -> io::Result<()> {
    loop {
        if unsafe { sys::close(fd) } != -1 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() != Some(sys::EINTR) {
            return Err(err);
        }
    }
}

/// Queries index, negotiated speed and duplex mode of the named interface
/// through the kernel's ethtool interface.
pub fn query(name: &str) -> Result<LinkStatus, QueryError> {
    query_with::<ControlSocket>(name)
}

pub fn query_with<C: LinkChannel>(name: &str) -> Result<LinkStatus, QueryError> {
    if name.is_empty() {
        return report(QueryError::EmptyName);
    }

    let chan = match C::open() {
        Ok(chan) => chan,
        Err(e) => {
            return report(QueryError::Socket {
                name: name.to_string(),
                source: e,
            });
        }
    };

    let settings = match chan.link_settings(name) {
        Ok(settings) => settings,
        Err(e) => {
            // The channel must be released before the failure is reported.
            drop(chan);
            return report(QueryError::Ioctl {
                name: name.to_string(),
                request: "SIOCETHTOOL",
                source: e,
            });
        }
    };
    log::debug!(
        "{}: speed {} Mbps, duplex code 0x{:x}",
        name,
        settings.speed,
        settings.duplex
    );

    let speed_mbps = if settings.speed == u32::MAX {
        None
    } else {
        Some(settings.speed)
    };

    let duplex = match settings.duplex {
        sys::DUPLEX_HALF => Duplex::Half,
        sys::DUPLEX_FULL => Duplex::Full,
        code => {
            eprintln!("{}: Unknown mode (0x{:x}).", name, code);
            Duplex::Unknown
        }
    };

    // Best-effort: the query still succeeds without an index.
    let index = match chan.ifindex(name) {
        Ok(index) => Some(index),
        Err(e) => {
            log::debug!("{}: SIOCGIFINDEX failed: {}", name, e);
            None
        }
    };

    if let Err(e) = chan.close() {
        // A close failure discards the result obtained so far.
        return report(QueryError::Close {
            name: name.to_string(),
            source: e,
        });
    }

    Ok(LinkStatus {
        name: name.to_string(),
        index,
        speed_mbps,
        duplex,
    })
}

fn report(err: QueryError) -> Result<LinkStatus, QueryError> {
    eprintln!("{}", err);
    Err(err)
}

#[cfg(test)]
pub(crate) mod mock {
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::io;

    use super::{LinkChannel, LinkSettings};

    #[derive(Clone)]
    pub struct Iface {
        pub speed: u32,
        pub duplex: u8,
        pub index: Option<i32>,
    }

    /// Per-thread script: interfaces the fake kernel knows about, plus the
    /// errnos its open and close calls fail with.
    #[derive(Default)]
    pub struct Script {
        pub ifaces: HashMap<String, Iface>,
        pub open_errno: Option<i32>,
        pub close_errno: Option<i32>,
    }

    thread_local! {
        static SCRIPT: RefCell<Script> = RefCell::new(Script::default());
        static OPENS: Cell<usize> = Cell::new(0);
        static CLOSES: Cell<usize> = Cell::new(0);
    }

    pub fn install(script: Script) {
        SCRIPT.with(|s| *s.borrow_mut() = script);
        OPENS.with(|c| c.set(0));
        CLOSES.with(|c| c.set(0));
    }

    pub fn opens() -> usize {
        OPENS.with(Cell::get)
    }

    pub fn closes() -> usize {
        CLOSES.with(Cell::get)
    }

    pub struct MockChannel;

    impl LinkChannel for MockChannel {
        fn open() -> io::Result<MockChannel> {
            if let Some(errno) = SCRIPT.with(|s| s.borrow().open_errno) {
                return Err(io::Error::from_raw_os_error(errno));
            }
            OPENS.with(|c| c.set(c.get() + 1));
            Ok(MockChannel)
        }

        fn link_settings(&self, name: &str) -> io::Result<LinkSettings> {
            SCRIPT.with(|s| match s.borrow().ifaces.get(name) {
                Some(iface) => Ok(LinkSettings {
                    speed: iface.speed,
                    duplex: iface.duplex,
                }),
                None => Err(io::Error::from_raw_os_error(libc::ENODEV)),
            })
        }

        fn ifindex(&self, name: &str) -> io::Result<i32> {
            SCRIPT.with(|s| match s.borrow().ifaces.get(name) {
                Some(Iface {
                    index: Some(index), ..
                }) => Ok(*index),
                _ => Err(io::Error::from_raw_os_error(libc::ENXIO)),
            })
        }

        fn close(self) -> io::Result<()> {
            match SCRIPT.with(|s| s.borrow().close_errno) {
                Some(errno) => Err(io::Error::from_raw_os_error(errno)),
                None => Ok(()),
            }
        }
    }

    // Every release path, explicit close included, lands here.
    impl Drop for MockChannel {
        fn drop(&mut self) {
            CLOSES.with(|c| c.set(c.get() + 1));
        }
    }
}
