//! Saved SSH connections, grouped by folder
mod connection;
mod error;

pub use connection::{Connection, DEFAULT_FOLDER, DEFAULT_SSH_PORT};
pub use error::ConnectionError;

use tracing::{info, warn};

/// Ordered collection of saved connections with unique labels
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectionCatalog {
    connections: Vec<Connection>,
}

impl ConnectionCatalog {
    /// Build a catalog, keeping the first entry for any repeated label
    pub fn new(connections: Vec<Connection>) -> Self {
        let mut catalog = Self::default();
        for connection in connections {
            let label = connection.label.clone();
            if !catalog.add(connection) {
                warn!("Skipping duplicate connection label: {}", label);
            }
        }
        catalog
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn into_connections(self) -> Vec<Connection> {
        self.connections
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    pub fn find(&self, label: &str) -> Option<&Connection> {
        self.connections.iter().find(|c| c.label == label)
    }

    /// Append a connection. Returns false if the label is taken.
    pub fn add(&mut self, connection: Connection) -> bool {
        if self.find(&connection.label).is_some() {
            return false;
        }
        info!("Added connection: {}", connection.label);
        self.connections.push(connection);
        true
    }

    /// Replace the connection called `label` in place.
    ///
    /// Fails if `label` is unknown or the new label belongs to another entry.
    pub fn replace(&mut self, label: &str, connection: Connection) -> bool {
        let Some(index) = self.connections.iter().position(|c| c.label == label) else {
            return false;
        };
        let clashes = self
            .connections
            .iter()
            .enumerate()
            .any(|(i, c)| i != index && c.label == connection.label);
        if clashes {
            return false;
        }
        info!("Updated connection: {} -> {}", label, connection.label);
        self.connections[index] = connection;
        true
    }

    pub fn remove(&mut self, label: &str) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c.label != label);
        let removed = self.connections.len() < before;
        if removed {
            info!("Removed connection: {}", label);
        }
        removed
    }

    /// Connections grouped by folder, folders in order of first appearance
    pub fn folders(&self) -> Vec<(&str, Vec<&Connection>)> {
        let mut folders: Vec<(&str, Vec<&Connection>)> = Vec::new();
        for connection in &self.connections {
            match folders.iter().position(|(name, _)| *name == connection.folder) {
                Some(index) => folders[index].1.push(connection),
                None => folders.push((connection.folder.as_str(), vec![connection])),
            }
        }
        folders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> ConnectionCatalog {
        ConnectionCatalog::new(vec![
            Connection::new("web", "web.example.com", "alice").with_folder("Prod"),
            Connection::new("scratch", "dev.example.com", "alice"),
            Connection::new("db", "db.example.com", "bob").with_folder("Prod"),
        ])
    }

    #[test]
    fn groups_by_folder_in_first_seen_order() {
        let catalog = sample();
        let folders = catalog.folders();

        let names: Vec<&str> = folders.iter().map(|(name, _)| *name).collect();
        assert_eq!(names, vec!["Prod", DEFAULT_FOLDER]);

        let prod: Vec<&str> = folders[0].1.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(prod, vec!["web", "db"]);
    }

    #[test]
    fn labels_stay_unique() {
        let mut catalog = sample();
        assert!(!catalog.add(Connection::new("web", "other", "eve")));
        assert_eq!(catalog.len(), 3);

        let catalog = ConnectionCatalog::new(vec![
            Connection::new("a", "h1", "u"),
            Connection::new("a", "h2", "u"),
        ]);
        assert_eq!(catalog.len(), 1);
        assert_eq!(catalog.find("a").unwrap().host, "h1");
    }

    #[test]
    fn replace_keeps_position() {
        let mut catalog = sample();
        let renamed = Connection::new("www", "web.example.com", "alice").with_port(2200);

        assert!(catalog.replace("web", renamed));
        assert_eq!(catalog.connections()[0].label, "www");
        assert_eq!(catalog.connections()[0].port, 2200);

        // Renaming onto an existing label is refused
        assert!(!catalog.replace("www", Connection::new("db", "x", "y")));
        assert!(!catalog.replace("missing", Connection::new("z", "x", "y")));
    }

    #[test]
    fn remove_by_label() {
        let mut catalog = sample();
        assert!(catalog.remove("scratch"));
        assert!(!catalog.remove("scratch"));
        assert_eq!(catalog.folders().len(), 1);
    }

    #[test]
    fn destination_and_validation() {
        let connection = Connection::new("web", "web.example.com", "alice");
        assert_eq!(connection.destination(), "alice@web.example.com");
        assert!(connection.validate().is_ok());
        assert_eq!(
            connection.clone().with_port(0).validate(),
            Err(ConnectionError::InvalidPort("web".to_string()))
        );
        assert_eq!(
            Connection::new("", "h", "u").validate(),
            Err(ConnectionError::EmptyLabel)
        );
        assert_eq!(
            Connection::new("db", " ", "u").validate(),
            Err(ConnectionError::MissingHost("db".to_string()))
        );
    }
}
