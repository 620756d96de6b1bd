//! MetricIO Client - wire protocol client
//!
//! Connects to a MetricIO server, appends observations, and runs
//! predicate queries. Adds are fire-and-forget; the protocol sends no
//! acknowledgement, so a rejected add only surfaces when a later
//! exchange finds the connection gone. Queries accumulate the response
//! stream until the terminator frame.

use metricio_common::{Error, MetricKind, Result};
use metricio_proto::frame::{self, FrameType};
use metricio_proto::msg::MAX_LOCATOR_SIZE;
use metricio_proto::{Add, Connection, PktBuf, Query, Response, ResponseCode, MAX_FRAME_SIZE};
use tokio::net::{TcpStream, ToSocketAddrs};
use tracing::debug;

/// One accumulated query result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryHit {
    pub locator: Vec<u8>,
    /// Ranking placeholder, always 0
    pub score: u8,
}

/// Connection to one MetricIO server
#[derive(Debug)]
pub struct Client {
    conn: Connection<TcpStream>,
}

impl Client {
    /// Connect to a server
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        let name = stream
            .peer_addr()
            .map_or_else(|_| "server".to_string(), |peer| peer.to_string());
        debug!(server = %name, "connected");
        Ok(Self {
            conn: Connection::new(stream, name, MAX_FRAME_SIZE),
        })
    }

    /// Append one observation. Fire-and-forget: a successful return
    /// means the frame was written, not that the server accepted it.
    pub async fn add(
        &mut self,
        kind: MetricKind,
        time: u64,
        value: u64,
        locator: &[u8],
    ) -> Result<()> {
        if locator.len() > MAX_LOCATOR_SIZE {
            return Err(Error::TooLarge {
                len: locator.len(),
                max: MAX_LOCATOR_SIZE,
            });
        }
        let add = Add {
            kind,
            time,
            value,
            locator: locator.to_vec(),
        };
        let mut buf = PktBuf::new(MAX_FRAME_SIZE);
        add.encode(&mut buf);
        self.conn.queue_write(&buf)?;
        self.conn.flush().await
    }

    /// Run one query, returning its accumulated hits.
    ///
    /// An error frame maps back to the matching [`Error`]; a clean
    /// stream with zero hits reports [`Error::NoResults`].
    pub async fn query(&mut self, query: &Query) -> Result<Vec<QueryHit>> {
        let mut buf = PktBuf::new(MAX_FRAME_SIZE);
        query.encode(&mut buf);
        self.conn.queue_write(&buf)?;
        self.conn.flush().await?;

        let mut hits = Vec::new();
        loop {
            let response = self.recv_response().await?;
            if response.is_terminator() {
                if response.code != ResponseCode::Ok as u8 {
                    let err = ResponseCode::from_u8(response.code)
                        .map_or(Error::Remote(response.code), ResponseCode::into_error);
                    return Err(err);
                }
                if hits.is_empty() {
                    return Err(Error::NoResults);
                }
                debug!(hits = hits.len(), "query finished");
                return Ok(hits);
            }
            hits.push(QueryHit {
                locator: response.locator,
                score: response.score,
            });
        }
    }

    /// Read frames until one complete response decodes
    async fn recv_response(&mut self) -> Result<Response> {
        loop {
            match frame::decode(self.conn.inbound()) {
                Ok(header) => {
                    if header.frame_type != FrameType::Response as u8 {
                        return Err(Error::unsupported(format!(
                            "frame type {}",
                            header.frame_type
                        )));
                    }
                    return Response::decode(self.conn.inbound(), &header);
                }
                Err(err) if err.is_again() => {
                    self.conn.fill().await?;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Close the connection
    pub async fn close(&mut self) {
        self.conn.disconnect().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricio_common::{CompareOp, LocatorType, Predicate};
    use metricio_proto::msg::QUERY_BODY_SIZE;
    use metricio_proto::HEADER_SIZE;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn rtt_query() -> Query {
        Query {
            loc_type: LocatorType::Domain,
            max_count: 10,
            predicate: Predicate {
                kind: MetricKind::Rtt,
                op: CompareOp::Lt,
                value: 50,
                start: 0,
                end: 0,
            },
        }
    }

    async fn read_frame(stream: &mut TcpStream) -> (u8, Vec<u8>) {
        let mut header = [0u8; HEADER_SIZE];
        stream.read_exact(&mut header).await.unwrap();
        let body_len = usize::from(u16::from_be_bytes([header[2], header[3]]));
        let mut body = vec![0u8; body_len];
        stream.read_exact(&mut body).await.unwrap();
        (header[1], body)
    }

    async fn write_responses(stream: &mut TcpStream, responses: &[Response]) {
        let mut buf = PktBuf::new(MAX_FRAME_SIZE);
        for response in responses {
            response.encode(&mut buf);
            stream.write_all(buf.as_slice()).await.unwrap();
        }
    }

    #[tokio::test]
    async fn test_query_accumulates_until_terminator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let (frame_type, body) = read_frame(&mut stream).await;
            assert_eq!(frame_type, FrameType::Query as u8);
            assert_eq!(body.len(), QUERY_BODY_SIZE);

            write_responses(
                &mut stream,
                &[
                    Response::record(1, 0, b"a.example.com".to_vec()),
                    Response::record(0, 0, b"b.example.com".to_vec()),
                    Response::terminator(ResponseCode::Ok),
                ],
            )
            .await;
        });

        let mut client = Client::connect(addr).await.unwrap();
        let hits = client.query(&rtt_query()).await.unwrap();
        assert_eq!(
            hits.iter().map(|h| h.locator.as_slice()).collect::<Vec<_>>(),
            vec![&b"a.example.com"[..], b"b.example.com"]
        );
    }

    #[tokio::test]
    async fn test_query_surfaces_error_frame() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await;
            write_responses(&mut stream, &[Response::terminator(ResponseCode::NoResults)])
                .await;
        });

        let mut client = Client::connect(addr).await.unwrap();
        assert!(matches!(
            client.query(&rtt_query()).await,
            Err(Error::NoResults)
        ));
    }

    #[tokio::test]
    async fn test_add_is_fire_and_forget() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let peer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            read_frame(&mut stream).await
        });

        let mut client = Client::connect(addr).await.unwrap();
        // returns without waiting for any reply
        client
            .add(MetricKind::CpuLoad, 123, 45, b"host-1")
            .await
            .unwrap();

        let (frame_type, body) = peer.await.unwrap();
        assert_eq!(frame_type, FrameType::Add as u8);
        assert_eq!(body[0], MetricKind::CpuLoad as u8);
        assert_eq!(&body[17..], b"host-1");
    }

    #[tokio::test]
    async fn test_add_rejects_oversize_locator() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let mut client = Client::connect(addr).await.unwrap();
        let huge = vec![b'x'; MAX_LOCATOR_SIZE + 1];
        assert!(matches!(
            client.add(MetricKind::CpuLoad, 1, 1, &huge).await,
            Err(Error::TooLarge { .. })
        ));
    }
}
