//! Minimal SOCKS5 client: no authentication, CONNECT by domain name.
//!
//! Hidden-service addresses must be resolved by the proxy, so the target is
//! always sent as a domain (`ATYP 0x03`).

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use torchat_net_peers::Endpoint;

const VERSION: u8 = 0x05;
const METHOD_NO_AUTH: u8 = 0x00;
const CMD_CONNECT: u8 = 0x01;
const RESERVED: u8 = 0x00;
const REPLY_SUCCEEDED: u8 = 0x00;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

#[derive(Debug, Error)]
pub enum SocksError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("proxy answered with SOCKS version {0}")]
    Version(u8),

    #[error("proxy requires authentication")]
    NoAcceptableAuth,

    #[error("proxy refused the connection: {reason} ({code:#04x})")]
    Refused { code: u8, reason: &'static str },

    #[error("host name of {0} bytes does not fit a SOCKS5 request")]
    HostTooLong(usize),

    #[error("proxy answered with unknown address type {0}")]
    AddressType(u8),
}

/// Connect to `host:port` through the SOCKS5 proxy at `proxy`.
pub async fn connect(proxy: &Endpoint, host: &str, port: u16) -> Result<TcpStream, SocksError> {
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    if let Err(err) = stream.set_nodelay(true) {
        tracing::warn!(%err, "failed to set TCP_NODELAY");
    }
    handshake(&mut stream, host, port).await?;
    Ok(stream)
}

/// Run the greeting and CONNECT exchange on an already open stream.
pub async fn handshake<S>(stream: &mut S, host: &str, port: u16) -> Result<(), SocksError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let host_len = u8::try_from(host.len()).map_err(|_| SocksError::HostTooLong(host.len()))?;

    stream.write_all(&[VERSION, 1, METHOD_NO_AUTH]).await?;
    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    let [version, method] = choice;
    if version != VERSION {
        return Err(SocksError::Version(version));
    }
    if method != METHOD_NO_AUTH {
        return Err(SocksError::NoAcceptableAuth);
    }

    let mut request = Vec::with_capacity(7 + host.len());
    request.extend_from_slice(&[VERSION, CMD_CONNECT, RESERVED, ATYP_DOMAIN, host_len]);
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    let [version, reply, _reserved, atyp] = head;
    if version != VERSION {
        return Err(SocksError::Version(version));
    }
    if reply != REPLY_SUCCEEDED {
        return Err(SocksError::Refused {
            code: reply,
            reason: reply_reason(reply),
        });
    }

    // Bound address and port, unused.
    let address_len = match atyp {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => usize::from(stream.read_u8().await?),
        other => return Err(SocksError::AddressType(other)),
    };
    let mut bound = vec![0u8; address_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

fn reply_reason(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed by ruleset",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "TTL expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use tokio::io::duplex;
    use tokio::net::TcpListener;

    use super::*;

    /// Plays the proxy side of one exchange and returns the requested host and port.
    async fn serve<S>(stream: &mut S, reply: u8) -> (String, u16)
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut greeting = [0u8; 3];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(greeting, [VERSION, 1, METHOD_NO_AUTH]);
        stream.write_all(&[VERSION, METHOD_NO_AUTH]).await.unwrap();

        let mut head = [0u8; 5];
        stream.read_exact(&mut head).await.unwrap();
        assert_eq!(head[..4], [VERSION, CMD_CONNECT, RESERVED, ATYP_DOMAIN]);
        let mut host = vec![0u8; usize::from(head[4])];
        stream.read_exact(&mut host).await.unwrap();
        let port = stream.read_u16().await.unwrap();

        stream
            .write_all(&[VERSION, reply, RESERVED, ATYP_IPV4, 127, 0, 0, 1, 0x2b, 0x01])
            .await
            .unwrap();
        (String::from_utf8(host).unwrap(), port)
    }

    #[tokio::test]
    async fn test_handshake_sends_domain() {
        let (mut client, mut proxy) = duplex(1024);
        let server = tokio::spawn(async move { serve(&mut proxy, REPLY_SUCCEEDED).await });

        handshake(&mut client, "abcdefghijklmnop.onion", 11009)
            .await
            .unwrap();

        let (host, port) = server.await.unwrap();
        assert_eq!(host, "abcdefghijklmnop.onion");
        assert_eq!(port, 11009);
    }

    #[tokio::test]
    async fn test_refusal_is_reported() {
        let (mut client, mut proxy) = duplex(1024);
        tokio::spawn(async move { serve(&mut proxy, 0x04).await });

        assert_matches!(
            handshake(&mut client, "abcdefghijklmnop.onion", 11009).await,
            Err(SocksError::Refused { code: 0x04, reason: "host unreachable" })
        );
    }

    #[tokio::test]
    async fn test_auth_required_is_rejected() {
        let (mut client, mut proxy) = duplex(1024);
        tokio::spawn(async move {
            let mut greeting = [0u8; 3];
            proxy.read_exact(&mut greeting).await.unwrap();
            proxy.write_all(&[VERSION, 0xff]).await.unwrap();
        });

        assert_matches!(
            handshake(&mut client, "abcdefghijklmnop.onion", 11009).await,
            Err(SocksError::NoAcceptableAuth)
        );
    }

    #[tokio::test]
    async fn test_host_too_long() {
        let (mut client, _proxy) = duplex(1024);
        let host = "a".repeat(300);

        assert_matches!(
            handshake(&mut client, &host, 11009).await,
            Err(SocksError::HostTooLong(300))
        );
    }

    #[tokio::test]
    async fn test_connect_through_tcp_proxy() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let target = serve(&mut stream, REPLY_SUCCEEDED).await;
            stream.write_all(b"ready\n").await.unwrap();
            target
        });

        let proxy = Endpoint::new(addr.ip().to_string(), addr.port());
        let mut stream = connect(&proxy, "bbbbbbbbbbbbbbbb.onion", 11009)
            .await
            .unwrap();

        let mut greeting = [0u8; 6];
        stream.read_exact(&mut greeting).await.unwrap();
        assert_eq!(&greeting, b"ready\n");
        assert_eq!(
            server.await.unwrap(),
            ("bbbbbbbbbbbbbbbb.onion".to_string(), 11009)
        );
    }
}
