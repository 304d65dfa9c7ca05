use std::sync::Arc;

use super::*;

#[tokio::test]
async fn test_udp_conn_send_recv() -> Result<()> {
    let a = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);
    let b = Arc::new(UdpSocket::bind("127.0.0.1:0").await?);

    let b_addr = Conn::local_addr(b.as_ref())?;
    let n = Conn::send_to(a.as_ref(), b"hello", b_addr).await?;
    assert_eq!(n, 5);

    let mut buf = [0u8; 16];
    let (n, from) = Conn::recv_from(b.as_ref(), &mut buf).await?;
    assert_eq!(&buf[..n], b"hello");
    assert_eq!(from, Conn::local_addr(a.as_ref())?);

    Ok(())
}

#[tokio::test]
async fn test_udp_conn_local_addr_is_bound() -> Result<()> {
    let s = UdpSocket::bind("127.0.0.1:0").await?;
    let addr = Conn::local_addr(&s)?;
    assert!(addr.port() != 0);
    Ok(())
}
