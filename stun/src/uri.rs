
use std::fmt;

use crate::error::*;

pub const DEFAULT_STUN_PORT: u16 = 3478;
pub const DEFAULT_TURN_PORT: u16 = 3478;

/// URI scheme for a NAT-traversal server.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub enum SchemeType {
    #[default]
    Stun,
    Turn,
}

impl SchemeType {
    pub fn srv_service(&self) -> &'static str {
        match self {
            SchemeType::Stun => "stun",
            SchemeType::Turn => "turn",
        }
    }
}

impl fmt::Display for SchemeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemeType::Stun => "stun",
            SchemeType::Turn => "turn",
        };
        write!(f, "{s}")
    }
}

/// Transport requested through the `?transport=` query parameter.
#[derive(PartialEq, Eq, Debug, Copy, Clone, Default)]
pub enum ProtoType {
    #[default]
    Udp,
    Tcp,
}

impl fmt::Display for ProtoType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProtoType::Udp => "udp",
            ProtoType::Tcp => "tcp",
        };
        write!(f, "{s}")
    }
}

/// A parsed `stun:`/`turn:` server URI (RFC 7064 / RFC 7065, no TLS
/// variants). `transport` is None when the URI leaves the choice
/// open.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct StunUri {
    pub scheme: SchemeType,
    pub host: String,
    pub port: u16,
    pub transport: Option<ProtoType>,
}

impl fmt::Display for StunUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.host.contains(':') {
            write!(f, "{}:[{}]:{}", self.scheme, self.host, self.port)?;
        } else {
            write!(f, "{}:{}:{}", self.scheme, self.host, self.port)?;
        }
        if let Some(transport) = self.transport {
            write!(f, "?transport={transport}")?;
        }
        Ok(())
    }
}

impl StunUri {
    /// Parses e.g. `turn:turn.example.com:3478?transport=tcp`. The
    /// port defaults per scheme; the transport defaults to UDP.
    pub fn parse(raw: &str) -> Result<StunUri> {
        // `url` treats these as cannot-be-a-base URLs: the authority
        // lands in the path and the query survives as-is.
        let parsed = url::Url::parse(raw)?;

        let scheme = match parsed.scheme() {
            "stun" => SchemeType::Stun,
            "turn" => SchemeType::Turn,
            _ => return Err(Error::ErrSchemeType),
        };

        let hostport = parsed.path();
        if hostport.is_empty() || hostport.contains('/') {
            return Err(Error::ErrInvalidUri);
        }

        let default_port = match scheme {
            SchemeType::Stun => DEFAULT_STUN_PORT,
            SchemeType::Turn => DEFAULT_TURN_PORT,
        };
        let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
            // bracketed IPv6 literal, optional :port after the bracket
            let Some((host, after)) = rest.split_once(']') else {
                return Err(Error::ErrInvalidUri);
            };
            let port = match after.strip_prefix(':') {
                Some(p) => p.parse().map_err(|_| Error::ErrInvalidUri)?,
                None if after.is_empty() => default_port,
                None => return Err(Error::ErrInvalidUri),
            };
            (host.to_owned(), port)
        } else {
            match hostport.rsplit_once(':') {
                Some((h, p)) if !h.contains(':') => {
                    let port: u16 = p.parse().map_err(|_| Error::ErrInvalidUri)?;
                    (h.to_owned(), port)
                }
                // a second colon means an unbracketed IPv6 literal
                Some(_) => return Err(Error::ErrInvalidUri),
                None => (hostport.to_owned(), default_port),
            }
        };
        if host.is_empty() {
            return Err(Error::ErrInvalidUri);
        }

        let mut transport = None;
        if let Some(query) = parsed.query() {
            for pair in query.split('&') {
                match pair.split_once('=') {
                    Some(("transport", "udp")) => transport = Some(ProtoType::Udp),
                    Some(("transport", "tcp")) => transport = Some(ProtoType::Tcp),
                    Some(("transport", _)) => return Err(Error::ErrInvalidUri),
                    _ => {}
                }
            }
        }

        Ok(StunUri {
            scheme,
            host,
            port,
            transport,
        })
    }
}
