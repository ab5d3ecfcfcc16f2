#![allow(dead_code)]

use std::collections::HashMap;

use sqldump_import::prelude::*;

/// In-memory connection that records every statement it receives.
#[derive(Debug, Default)]
pub struct RecordingConnection {
    pub executed: Vec<String>,
    /// Statements containing the key fail with the given error number.
    pub failures: Vec<(String, u32)>,
    /// Canned rows for exact statements.
    pub results: HashMap<String, Vec<Row>>,
    pub closed: bool,
}

impl RecordingConnection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, needle: &str, code: u32) -> Self {
        self.failures.push((needle.to_string(), code));
        self
    }

    pub fn returning(mut self, statement: &str, rows: Vec<Row>) -> Self {
        self.results.insert(statement.to_string(), rows);
        self
    }

    /// Serves `SHOW FULL TABLES` and `SHOW CREATE TABLE` for the given
    /// CREATE TABLE statements.
    pub fn with_tables(mut self, tables: &[(&str, &str)]) -> Self {
        let listing = tables
            .iter()
            .map(|(name, _)| vec![Some(name.to_string()), Some("BASE TABLE".to_string())])
            .collect();
        self = self.returning("SHOW FULL TABLES WHERE Table_type = 'BASE TABLE'", listing);
        for (name, create) in tables {
            self = self.returning(
                &format!("SHOW CREATE TABLE `{name}`"),
                vec![vec![Some(name.to_string()), Some(create.to_string())]],
            );
        }
        self
    }
}

impl Connection for RecordingConnection {
    async fn execute(&mut self, statement: &str) -> ConnResponse {
        self.executed.push(statement.to_string());
        if self.closed {
            return ConnResponse::failed(2006, "MySQL server has gone away");
        }
        if let Some((_, code)) = self.failures.iter().find(|(needle, _)| statement.contains(needle.as_str())) {
            return ConnResponse::failed(*code, format!("Error executing: {statement}"));
        }
        ConnResponse::ok(self.results.get(statement).cloned().unwrap_or_default())
    }

    async fn close(&mut self) {
        self.closed = true;
    }
}

/// A small dump with two related tables, data, an ALTER and a trigger.
pub const LIBRARY_DUMP: &str = r"/*!40101 SET NAMES utf8mb4 */;
DROP TABLE IF EXISTS `loans`;
CREATE TABLE `loans` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `book_id` int(11) NOT NULL,
  `due` date DEFAULT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `loans_ibfk_1` FOREIGN KEY (`book_id`) REFERENCES `books` (`id`)
) ENGINE=InnoDB;
DROP TABLE IF EXISTS `books`;
CREATE TABLE `books` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `title` varchar(200) NOT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
INSERT INTO `books` VALUES (1,'Dune'),(2,'Emma');
INSERT INTO `loans` VALUES (1,1,'2024-02-01');
ALTER TABLE `books` ADD UNIQUE KEY `title` (`title`);
DELIMITER ;;
CREATE TRIGGER `loans_bi` BEFORE INSERT ON `loans` FOR EACH ROW BEGIN SET NEW.due = IFNULL(NEW.due, CURDATE()); END ;;
DELIMITER ;
";
