//! Plays a remote peer against a running node over real sockets: an incoming
//! connection for its ping and a fake SOCKS5 proxy for the dial back.

use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader, Lines};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use torchat_net_peers::Endpoint;
use torchat_node::Torchat;
use torchat_primitives::{OnionId, Status};
use torchat_session::Config;

const ALICE: &str = "aaaaaaaaaaaaaaaa";
const BOB: &str = "bbbbbbbbbbbbbbbb";

fn free_port() -> u16 {
    std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

async fn fake_proxy(listener: TcpListener) -> (TcpStream, String) {
    let (mut stream, _) = listener.accept().await.unwrap();
    let mut greeting = [0u8; 3];
    stream.read_exact(&mut greeting).await.unwrap();
    stream.write_all(&[0x05, 0x00]).await.unwrap();

    let mut head = [0u8; 5];
    stream.read_exact(&mut head).await.unwrap();
    let mut host = vec![0u8; usize::from(head[4])];
    stream.read_exact(&mut host).await.unwrap();
    let _port = stream.read_u16().await.unwrap();
    stream
        .write_all(&[0x05, 0x00, 0x00, 0x01, 0, 0, 0, 0, 0, 0])
        .await
        .unwrap();
    (stream, String::from_utf8(host).unwrap())
}

async fn next_line(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> String {
    lines.next_line().await.unwrap().unwrap()
}

#[tokio::test]
async fn test_handshake_over_sockets() {
    let proxy = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let proxy_addr = proxy.local_addr().unwrap();
    let listen_port = free_port();

    let config = Config::new(
        OnionId::parse(ALICE).unwrap(),
        Endpoint::new("127.0.0.1", listen_port),
        Endpoint::new(proxy_addr.ip().to_string(), proxy_addr.port()),
    );
    let mut torchat = Torchat::from_config(config);
    torchat.start().unwrap();

    let (stop, stopped) = oneshot::channel::<()>();

    let remote = async move {
        let proxied = tokio::spawn(fake_proxy(proxy));

        let incoming = TcpStream::connect(("127.0.0.1", listen_port)).await.unwrap();
        let (_incoming_read, mut incoming_write) = incoming.into_split();
        incoming_write
            .write_all(format!("ping {BOB} bob-cookie\n").as_bytes())
            .await
            .unwrap();

        let (outgoing, host) = proxied.await.unwrap();
        assert_eq!(host, format!("{BOB}.onion"));
        let (outgoing_read, _outgoing_write) = outgoing.into_split();
        let mut lines = BufReader::new(outgoing_read).lines();

        let ping = next_line(&mut lines).await;
        let cookie = ping
            .strip_prefix(&format!("ping {ALICE} "))
            .unwrap()
            .to_string();
        assert_eq!(next_line(&mut lines).await, "pong bob-cookie");

        incoming_write
            .write_all(format!("pong {cookie}\n").as_bytes())
            .await
            .unwrap();

        let mut bundle = Vec::new();
        for _ in 0..4 {
            bundle.push(next_line(&mut lines).await);
        }
        let _ = stop.send(());
        bundle
    };

    let shutdown = async {
        let _ = stopped.await;
    };
    let (ran, bundle) = tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(torchat.run_until(shutdown), remote)
    })
    .await
    .unwrap();
    ran.unwrap();

    assert_eq!(
        bundle,
        vec![
            "client torchat-rs".to_string(),
            format!("version {}", env!("CARGO_PKG_VERSION")),
            "add_me".to_string(),
            format!("status {}", Status::Available),
        ]
    );

    let session = torchat.session().unwrap();
    let bob = session.peer(BOB).unwrap();
    assert!(bob.is_verified());
    assert!(session.listener().is_none());
}
