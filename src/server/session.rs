use std::net::SocketAddr;
use uuid::Uuid;

/// Per-connection state. Owned by exactly one connection; nothing here is
/// shared with other clients.
#[derive(Debug, Clone)]
pub struct Session {
    id: String,
    client_addr: SocketAddr,
    current_dir: Vec<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl Session {
    pub fn new(client_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            client_addr,
            current_dir: Vec::new(),
            created_at: chrono::Utc::now(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn client_addr(&self) -> SocketAddr {
        self.client_addr
    }

    /// Segments below the server root; empty means the root itself.
    pub fn current_dir(&self) -> &[String] {
        &self.current_dir
    }

    pub fn current_dir_mut(&mut self) -> &mut Vec<String> {
        &mut self.current_dir
    }

    pub fn created_at(&self) -> chrono::DateTime<chrono::Utc> {
        self.created_at
    }

    pub fn prompt(&self) -> String {
        crate::protocol::prompt(&self.client_addr)
    }
}
