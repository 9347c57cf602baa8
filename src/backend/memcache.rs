//! memcached text protocol
//!
//! Storage commands:
//! ```text
//! <set|add> <key> <flags> <exptime> <bytes>\r\n<data>\r\n
//! cas <key> <flags> <exptime> <bytes> <cas unique>\r\n<data>\r\n
//! ```
//! answered by `STORED`, `NOT_STORED`, `EXISTS` or `NOT_FOUND`.
//! `delete <key>` answers `DELETED` or `NOT_FOUND`; `incr|decr <key> <delta>`
//! answers the new value or `NOT_FOUND`.

use crate::backend::connection::CacheConn;
use crate::common::{validate_key, Address, Error, Item, Result, Verb};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;

const STORED: &str = "STORED";
const NOT_STORED: &str = "NOT_STORED";
const EXISTS: &str = "EXISTS";
const NOT_FOUND: &str = "NOT_FOUND";
const DELETED: &str = "DELETED";

/// A connection to one memcached server.
pub struct MemcacheConn {
    addr: Address,
    stream: BufStream<TcpStream>,
    timeout: Duration,
}

impl MemcacheConn {
    /// Dial `addr`; `timeout` bounds the dial and every later round trip.
    pub async fn connect(addr: Address, timeout: Duration) -> Result<Self> {
        let stream = tokio::time::timeout(timeout, TcpStream::connect(addr.socket_addr()))
            .await
            .map_err(|_| Error::ConnectTimeout(addr))??;
        stream.set_nodelay(true)?;

        Ok(Self {
            addr,
            stream: BufStream::new(stream),
            timeout,
        })
    }

    pub fn address(&self) -> Address {
        self.addr
    }

    /// Write one command (and its data block, if any) and read the reply line.
    async fn round_trip(&mut self, command: String, data: Option<&[u8]>) -> Result<String> {
        let addr = self.addr;
        let timeout = self.timeout;
        let stream = &mut self.stream;

        let exchange = async {
            stream.write_all(command.as_bytes()).await?;
            if let Some(data) = data {
                stream.write_all(data).await?;
                stream.write_all(b"\r\n").await?;
            }
            stream.flush().await?;

            let mut line = String::new();
            if stream.read_line(&mut line).await? == 0 {
                return Err(Error::Io(std::io::ErrorKind::UnexpectedEof.into()));
            }
            Ok::<_, Error>(line.trim_end_matches(['\r', '\n']).to_string())
        };

        tokio::time::timeout(timeout, exchange)
            .await
            .map_err(|_| Error::Timeout(format!("{} did not answer within {:?}", addr, timeout)))?
    }

    async fn store(&mut self, verb: &str, item: &Item, cas_id: Option<u64>) -> Result<()> {
        validate_key(&item.key)?;

        let mut command = format!(
            "{} {} {} {} {}",
            verb,
            item.key,
            item.flags,
            item.expiration,
            item.value.len()
        );
        if let Some(cas_id) = cas_id {
            command.push_str(&format!(" {}", cas_id));
        }
        command.push_str("\r\n");

        let line = self.round_trip(command, Some(&item.value)).await?;
        match line.as_str() {
            STORED => Ok(()),
            NOT_STORED => Err(Error::NotStored),
            EXISTS => Err(Error::CasConflict),
            NOT_FOUND => Err(Error::CacheMiss),
            _ => Err(reply_error(&line)),
        }
    }
}

/// Map a reply line nobody expected onto an error.
fn reply_error(line: &str) -> Error {
    if let Some(msg) = line.strip_prefix("SERVER_ERROR ") {
        Error::ServerError(msg.to_string())
    } else if let Some(msg) = line.strip_prefix("CLIENT_ERROR ") {
        Error::ClientError(msg.to_string())
    } else if line == "ERROR" {
        Error::ServerError("unknown command".into())
    } else {
        Error::Protocol(line.to_string())
    }
}

#[async_trait]
impl CacheConn for MemcacheConn {
    async fn set(&mut self, item: &Item) -> Result<()> {
        self.store("set", item, None).await
    }

    async fn add(&mut self, item: &Item) -> Result<()> {
        self.store("add", item, None).await
    }

    async fn compare_and_swap(&mut self, item: &Item) -> Result<()> {
        let cas_id = item
            .cas_id
            .ok_or_else(|| Error::MissingCasToken(item.key.clone()))?;
        self.store("cas", item, Some(cas_id)).await
    }

    async fn delete(&mut self, key: &str) -> Result<()> {
        validate_key(key)?;

        let line = self.round_trip(format!("delete {}\r\n", key), None).await?;
        match line.as_str() {
            DELETED => Ok(()),
            NOT_FOUND => Err(Error::CacheMiss),
            _ => Err(reply_error(&line)),
        }
    }

    async fn incr_decr(&mut self, verb: Verb, key: &str, delta: u64) -> Result<u64> {
        validate_key(key)?;

        let line = self
            .round_trip(format!("{} {} {}\r\n", verb, key, delta), None)
            .await?;
        if line == NOT_FOUND {
            return Err(Error::CacheMiss);
        }
        match line.trim().parse::<u64>() {
            Ok(value) => Ok(value),
            Err(_) => Err(reply_error(&line)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, BufReader};
    use tokio::net::TcpListener;

    /// Accept one connection, check the bytes received and answer with `reply`.
    async fn scripted_server(expect: &'static [u8], reply: &'static [u8]) -> Address {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = Address::new(listener.local_addr().unwrap());

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let mut socket = BufReader::new(socket);
            let mut received = vec![0u8; expect.len()];
            socket.read_exact(&mut received).await.unwrap();
            assert_eq!(received, expect);
            socket.get_mut().write_all(reply).await.unwrap();
        });

        addr
    }

    async fn connect(addr: Address) -> MemcacheConn {
        MemcacheConn::connect(addr, Duration::from_secs(2)).await.unwrap()
    }

    #[tokio::test]
    async fn test_set_encoding() {
        let addr = scripted_server(b"set k 3 60 5\r\nhello\r\n", b"STORED\r\n").await;
        let mut conn = connect(addr).await;
        let item = Item::new("k", "hello").with_flags(3).with_expiration(60);
        conn.set(&item).await.unwrap();
    }

    #[tokio::test]
    async fn test_add_not_stored() {
        let addr = scripted_server(b"add k 0 0 1\r\nv\r\n", b"NOT_STORED\r\n").await;
        let mut conn = connect(addr).await;
        let err = conn.add(&Item::new("k", "v")).await.unwrap_err();
        assert!(matches!(err, Error::NotStored));
    }

    #[tokio::test]
    async fn test_cas_conflict() {
        let addr = scripted_server(b"cas k 0 0 1 99\r\nv\r\n", b"EXISTS\r\n").await;
        let mut conn = connect(addr).await;
        let err = conn
            .compare_and_swap(&Item::new("k", "v").with_cas(99))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CasConflict));
    }

    #[tokio::test]
    async fn test_cas_requires_token() {
        let addr = scripted_server(b"", b"").await;
        let mut conn = connect(addr).await;
        let err = conn.compare_and_swap(&Item::new("k", "v")).await.unwrap_err();
        assert!(matches!(err, Error::MissingCasToken(_)));
    }

    #[tokio::test]
    async fn test_delete_miss() {
        let addr = scripted_server(b"delete gone\r\n", b"NOT_FOUND\r\n").await;
        let mut conn = connect(addr).await;
        assert!(matches!(conn.delete("gone").await, Err(Error::CacheMiss)));
    }

    #[tokio::test]
    async fn test_incr_value() {
        let addr = scripted_server(b"incr n 5\r\n", b"12\r\n").await;
        let mut conn = connect(addr).await;
        assert_eq!(conn.incr_decr(Verb::Incr, "n", 5).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_server_error() {
        let addr = scripted_server(b"decr n 1\r\n", b"SERVER_ERROR out of memory\r\n").await;
        let mut conn = connect(addr).await;
        let err = conn.incr_decr(Verb::Decr, "n", 1).await.unwrap_err();
        assert!(matches!(err, Error::ServerError(msg) if msg == "out of memory"));
    }

    #[tokio::test]
    async fn test_malformed_key_sends_nothing() {
        let addr = scripted_server(b"", b"").await;
        let mut conn = connect(addr).await;
        assert!(matches!(
            conn.set(&Item::new("bad key", "v")).await,
            Err(Error::MalformedKey(_))
        ));
    }

    #[tokio::test]
    async fn test_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = Address::new(listener.local_addr().unwrap());
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let mut conn = MemcacheConn::connect(addr, Duration::from_millis(50)).await.unwrap();
        let err = conn.delete("k").await.unwrap_err();
        assert!(matches!(err, Error::Timeout(_)));
    }
}
