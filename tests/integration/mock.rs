//! In-memory server used as the heartbeat collaborator

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use server_monitor::connection::{
    BuildInfoResult, Connection, ConnectionError, Dialer, IsMasterResult,
};
use server_monitor::{ConnectionOptions, ServerMonitor, ServerOptions};

use crate::INTERVAL;

#[derive(Debug)]
struct MockState {
    reachable: bool,
    reply: IsMasterResult,
    dials: usize,
    probes: usize,
    closes: usize,
}

/// Scriptable server shared by the dialer and its connections
#[derive(Debug, Clone)]
pub struct MockServer {
    state: Arc<Mutex<MockState>>,
}

impl MockServer {
    /// A reachable replica-set primary
    pub fn primary() -> Self {
        let reply = IsMasterResult {
            ok: true,
            is_master: true,
            me: "db1.example.com:27017".to_string(),
            set_name: "rs0".to_string(),
            hosts: vec!["db1.example.com:27017".into(), "db2.example.com:27017".into()],
            max_write_batch_size: 1000,
            max_bson_object_size: 16 * 1024 * 1024,
            max_message_size_bytes: 48_000_000,
            min_wire_version: 0,
            max_wire_version: 5,
            ..Default::default()
        };
        Self {
            state: Arc::new(Mutex::new(MockState {
                reachable: true,
                reply,
                dials: 0,
                probes: 0,
                closes: 0,
            })),
        }
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.state.lock().reachable = reachable;
    }

    pub fn set_reply(&self, f: impl FnOnce(&mut IsMasterResult)) {
        f(&mut self.state.lock().reply);
    }

    pub fn dials(&self) -> usize {
        self.state.lock().dials
    }

    pub fn probes(&self) -> usize {
        self.state.lock().probes
    }

    pub fn closes(&self) -> usize {
        self.state.lock().closes
    }

    pub fn dialer(&self) -> Arc<dyn Dialer> {
        Arc::new(MockDialer {
            server: self.clone(),
        })
    }

    /// Start a monitor against this server with the test interval
    pub fn monitor(&self) -> ServerMonitor {
        let options = ServerOptions::new("db1.example.com:27017").with_heartbeat_interval(INTERVAL);
        ServerMonitor::start(options, self.dialer()).unwrap()
    }
}

struct MockDialer {
    server: MockServer,
}

#[async_trait]
impl Dialer for MockDialer {
    async fn dial(
        &self,
        _options: &ConnectionOptions,
    ) -> Result<Box<dyn Connection>, ConnectionError> {
        let mut state = self.server.state.lock();
        state.dials += 1;
        if !state.reachable {
            return Err(ConnectionError::Connect("connection refused".into()));
        }
        Ok(Box::new(MockConnection {
            server: self.server.clone(),
        }))
    }
}

struct MockConnection {
    server: MockServer,
}

#[async_trait]
impl Connection for MockConnection {
    async fn probe(&mut self) -> Result<(IsMasterResult, BuildInfoResult), ConnectionError> {
        let mut state = self.server.state.lock();
        if !state.reachable {
            return Err(ConnectionError::Io("connection reset by peer".into()));
        }
        state.probes += 1;

        // set_version doubles as a heartbeat counter
        let mut reply = state.reply.clone();
        reply.set_version = Some(state.probes as u32);
        let build_info = BuildInfoResult {
            version: "3.4.2".to_string(),
            version_array: vec![3, 4, 2, 0],
        };
        Ok((reply, build_info))
    }

    async fn close(&mut self) {
        self.server.state.lock().closes += 1;
    }
}
