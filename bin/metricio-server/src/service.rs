//! Connection servicing
//!
//! A fixed pool of workers shares one listener; each worker accepts a
//! connection, drives it to completion through the frame handlers, and
//! only then accepts the next.
//!
//! Query frames always answer with a result stream capped by a
//! terminator, malformed ones included, and keep the connection open.
//! Add frames answer nothing; a failed add drops the connection so the
//! fire-and-forget client notices on its next exchange.

use metricio_common::{Error, Result, TIME_NOW};
use metricio_proto::frame::{self, FrameType, Header};
use metricio_proto::{
    Add, Connection, PktBuf, PktQueue, Query, Recv, Response, ResponseCode, MAX_FRAME_SIZE,
};
use metricio_storage::Database;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::TcpListener;
use tracing::{debug, error, info, warn};

/// Worker pool serving the MetricIO wire protocol
pub struct Server {
    db: Arc<Database>,
    workers: usize,
}

impl Server {
    /// Create a server over an opened database
    pub fn new(db: Arc<Database>, workers: usize) -> Self {
        Self { db, workers }
    }

    /// Accept and service connections until the task is dropped
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        let server = Arc::new(self);
        let listener = Arc::new(listener);
        info!(workers = server.workers, "starting worker pool");

        let mut tasks = Vec::with_capacity(server.workers);
        for id in 0..server.workers {
            let server = Arc::clone(&server);
            let listener = Arc::clone(&listener);
            tasks.push(tokio::spawn(async move {
                server.worker_loop(id, &listener).await;
            }));
        }
        futures::future::join_all(tasks).await;
        Ok(())
    }

    async fn worker_loop(&self, id: usize, listener: &TcpListener) {
        loop {
            let stream = match listener.accept().await {
                Ok((stream, _)) => stream,
                Err(err) => {
                    error!(worker = id, error = %err, "accept failed");
                    continue;
                }
            };
            let mut conn = Connection::accept(stream);
            debug!(worker = id, peer = conn.name(), "accepted connection");

            let db = Arc::clone(&self.db);
            match conn.run(|ibuf, obuf| on_frame(&db, ibuf, obuf)).await {
                Ok(()) => debug!(worker = id, peer = conn.name(), "connection closed"),
                Err(err) => {
                    warn!(worker = id, peer = conn.name(), error = %err, "connection failed");
                }
            }
        }
    }
}

fn on_frame(db: &Database, ibuf: &mut PktBuf, obuf: &mut PktQueue) -> Result<Recv> {
    let header = frame::decode(ibuf)?;
    match FrameType::from_u8(header.frame_type) {
        Some(FrameType::Query) => handle_query(db, ibuf, obuf, &header),
        Some(FrameType::Add) => handle_add(db, ibuf, &header),
        Some(FrameType::Del | FrameType::Reserved | FrameType::Response) | None => {
            Err(Error::unsupported(format!("frame type {}", header.frame_type)))
        }
    }
}

fn handle_query(
    db: &Database,
    ibuf: &mut PktBuf,
    obuf: &mut PktQueue,
    header: &Header,
) -> Result<Recv> {
    let mut out = PktBuf::new(MAX_FRAME_SIZE);
    let query = match Query::decode(ibuf, header) {
        Ok(query) => query,
        Err(err) => {
            warn!(error = %err, "rejected query");
            Response::terminator(ResponseCode::from_error(&err)).encode(&mut out);
            obuf.enqueue(&out);
            return Ok(Recv::More);
        }
    };
    debug!(
        kind = query.predicate.kind.name(),
        op = query.predicate.op.symbol(),
        value = query.predicate.value,
        max = query.max_count,
        "query"
    );

    let mut left = query.max_count;
    let result = db.search(&query.predicate, usize::from(query.max_count), |hit| {
        left = left.saturating_sub(1);
        Response::record(left, hit.score, hit.locator.clone()).encode(&mut out);
        obuf.enqueue(&out);
        Ok(())
    });
    let code = match result {
        Ok(matched) => {
            debug!(matched, "query finished");
            ResponseCode::Ok
        }
        Err(err) => {
            debug!(error = %err, "query produced no records");
            ResponseCode::from_error(&err)
        }
    };
    Response::terminator(code).encode(&mut out);
    obuf.enqueue(&out);
    Ok(Recv::More)
}

fn handle_add(db: &Database, ibuf: &mut PktBuf, header: &Header) -> Result<Recv> {
    let add = Add::decode(ibuf, header)?;
    let time = if add.time == TIME_NOW {
        unix_now()
    } else {
        add.time
    };
    db.add(add.kind, time, add.value, &add.locator)?;
    Ok(Recv::More)
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs())
}

#[cfg(test)]
mod tests {
    use super::*;
    use metricio_client::Client;
    use metricio_common::{CompareOp, LocatorType, MetricKind, Predicate};
    use std::net::SocketAddr;
    use std::path::Path;
    use tempfile::tempdir;

    async fn start_server(dir: &Path) -> (SocketAddr, Arc<Database>) {
        let db = Arc::new(Database::open(dir).unwrap());
        let server = Server::new(Arc::clone(&db), 2);
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server.serve(listener));
        (addr, db)
    }

    fn rtt_below(value: u64, max_count: u8) -> Query {
        Query {
            loc_type: LocatorType::Domain,
            max_count,
            predicate: Predicate {
                kind: MetricKind::Rtt,
                op: CompareOp::Lt,
                value,
                start: 0,
                end: 0,
            },
        }
    }

    #[tokio::test]
    async fn test_add_then_query_end_to_end() {
        let dir = tempdir().unwrap();
        let (addr, _db) = start_server(dir.path()).await;

        let mut client = Client::connect(addr).await.unwrap();
        client
            .add(MetricKind::Rtt, 100, 25, b"fast.example.com")
            .await
            .unwrap();
        client
            .add(MetricKind::Rtt, 110, 80, b"slow.example.com")
            .await
            .unwrap();

        let hits = client.query(&rtt_below(50, 10)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].locator, b"fast.example.com");
        assert_eq!(hits[0].score, 0);
    }

    #[tokio::test]
    async fn test_query_without_matches_reports_no_results() {
        let dir = tempdir().unwrap();
        let (addr, _db) = start_server(dir.path()).await;

        let mut client = Client::connect(addr).await.unwrap();
        client
            .add(MetricKind::Rtt, 100, 80, b"slow.example.com")
            .await
            .unwrap();

        assert!(matches!(
            client.query(&rtt_below(50, 10)).await,
            Err(Error::NoResults)
        ));

        // the connection stays usable after a no-result query
        let hits = client.query(&rtt_below(200, 10)).await.unwrap();
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn test_query_max_count_caps_results() {
        let dir = tempdir().unwrap();
        let (addr, _db) = start_server(dir.path()).await;

        let mut client = Client::connect(addr).await.unwrap();
        for i in 0..5 {
            client
                .add(MetricKind::Rtt, 100 + i, 10, b"host")
                .await
                .unwrap();
        }

        let hits = client.query(&rtt_below(50, 2)).await.unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[tokio::test]
    async fn test_add_with_time_now_gets_stamped() {
        let dir = tempdir().unwrap();
        let (addr, db) = start_server(dir.path()).await;

        let mut client = Client::connect(addr).await.unwrap();
        client
            .add(MetricKind::CpuLoad, TIME_NOW, 42, b"host-1")
            .await
            .unwrap();

        // a query on the same connection orders after the add
        let query = Query {
            loc_type: LocatorType::Domain,
            max_count: 1,
            predicate: Predicate {
                kind: MetricKind::CpuLoad,
                op: CompareOp::Eq,
                value: 42,
                start: 0,
                end: 0,
            },
        };
        client.query(&query).await.unwrap();

        let record = db.last_record(MetricKind::CpuLoad).unwrap().unwrap();
        assert!(record.time > 0);
    }

    #[tokio::test]
    async fn test_out_of_order_add_drops_connection() {
        let dir = tempdir().unwrap();
        let (addr, db) = start_server(dir.path()).await;

        let mut client = Client::connect(addr).await.unwrap();
        client.add(MetricKind::Rtt, 100, 1, b"host").await.unwrap();
        // fire-and-forget, the rejection surfaces on the next exchange
        client.add(MetricKind::Rtt, 50, 2, b"host").await.unwrap();

        assert!(client.query(&rtt_below(50, 1)).await.is_err());
        assert_eq!(db.last_record(MetricKind::Rtt).unwrap().unwrap().time, 100);
    }

    #[tokio::test]
    async fn test_workers_service_sequential_connections() {
        let dir = tempdir().unwrap();
        let (addr, db) = start_server(dir.path()).await;

        // more connections than workers, served one after another
        for time in [10u64, 20, 30, 40] {
            let mut client = Client::connect(addr).await.unwrap();
            client
                .add(MetricKind::Traffic, time, 1, b"shared-host")
                .await
                .unwrap();
            let hits = client
                .query(&Query {
                    loc_type: LocatorType::Domain,
                    max_count: 255,
                    predicate: Predicate {
                        kind: MetricKind::Traffic,
                        op: CompareOp::Ge,
                        value: 0,
                        start: 0,
                        end: 0,
                    },
                })
                .await
                .unwrap();
            assert_eq!(hits.last().unwrap().locator, b"shared-host");
        }

        let both = db.last_record(MetricKind::Traffic).unwrap().unwrap();
        assert_eq!(both.time, 40);
    }
}
