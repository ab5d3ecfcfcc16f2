//! Import planning: the order in which the statements of a classified dump
//! are executed.

use serde::Serialize;
use sqldump_core::{
    quote_identifier, split_insert_rows, strip_foreign_keys, MiscPosition, ParsedQuery,
    StatementKind,
};
use tracing::{debug, warn};

use crate::config::{ImportOptions, WithData};
use crate::error::Result;

/// Execution phases, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Foreign key checks off, then the dump's leading session settings.
    Prepare,
    /// DROP TABLE in reverse creation order.
    Drop,
    /// CREATE TABLE in creation order.
    Create,
    /// INSERT statements, parents before children.
    Insert,
    /// The dump's ALTER TABLE statements.
    Alter,
    /// Foreign keys deferred out of CREATE TABLE.
    ForeignKeys,
    Views,
    Functions,
    Procedures,
    Triggers,
    /// Remaining statements, in dump order.
    Misc,
    /// Foreign key checks back on.
    Finish,
}

/// A statement scheduled for execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedStatement {
    /// Phase the statement runs in.
    pub phase: Phase,
    /// Table the statement belongs to, for table phases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Statement text without terminator.
    pub sql: String,
}

/// The ordered statements of an import.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ImportPlan {
    pub statements: Vec<PlannedStatement>,
}

impl ImportPlan {
    /// Orders the statements of `parsed` for execution.
    ///
    /// Foreign keys the resolver had to defer are removed from their
    /// CREATE TABLE and added back by ALTER statements once every table
    /// exists. The dump's own DROP statements are not replayed: tables are
    /// dropped in reverse creation order when `drop_first` is set.
    ///
    /// Other statements keep their place relative to the dump: session
    /// settings at its top run first, statements written right before a
    /// view, routine or trigger run right before it, and the rest run last.
    ///
    /// # Errors
    ///
    /// Returns an error if a CREATE TABLE whose foreign keys must be
    /// deferred cannot be rewritten.
    pub fn build(parsed: &ParsedQuery, options: &ImportOptions) -> Result<Self> {
        let mut plan = Self::default();
        plan.push(Phase::Prepare, None, "SET FOREIGN_KEY_CHECKS=0");
        let misc: Vec<(&str, MiscPosition)> = parsed.misc_with_positions().collect();
        for (sql, _) in misc.iter().filter(|(_, p)| *p == MiscPosition::Leading) {
            plan.push(Phase::Prepare, None, *sql);
        }

        if options.drop_first {
            for table in parsed.sort.iter().rev() {
                plan.push(
                    Phase::Drop,
                    Some(table),
                    format!("DROP TABLE IF EXISTS {}", quote_identifier(table)),
                );
            }
        }

        let mut deferred_keys = Vec::new();
        for table in &parsed.sort {
            let Some(statement) = parsed.create_statement(table) else {
                continue;
            };
            let referenced: Vec<String> = parsed
                .deferred
                .iter()
                .filter(|key| &key.table == table)
                .map(|key| key.references.clone())
                .collect();
            if referenced.is_empty() {
                plan.push(Phase::Create, Some(table), statement);
                continue;
            }
            let (rewritten, alters) = strip_foreign_keys(statement, &referenced)?;
            debug!(table = %table, keys = alters.len(), "Deferring foreign keys");
            plan.push(Phase::Create, Some(table), rewritten);
            deferred_keys.extend(alters.into_iter().map(|sql| (table, sql)));
        }

        if options.with_data != WithData::None {
            let leftover = parsed.insert.keys().filter(|t| !parsed.sort.contains(t));
            for table in parsed.sort.iter().chain(leftover) {
                for statement in parsed.insert.get(table).into_iter().flatten() {
                    plan.push_insert(table, statement, options.with_data);
                }
            }
        }

        for statement in &parsed.alter {
            plan.push(Phase::Alter, None, statement);
        }
        for (table, sql) in deferred_keys {
            plan.push(Phase::ForeignKeys, Some(table), sql);
        }

        let routines = [
            (StatementKind::View, Phase::Views, &parsed.view),
            (StatementKind::Function, Phase::Functions, &parsed.functions),
            (StatementKind::Procedure, Phase::Procedures, &parsed.procedures),
            (StatementKind::Trigger, Phase::Triggers, &parsed.triggers),
        ];
        for (kind, phase, statements) in routines {
            for (index, statement) in statements.iter().enumerate() {
                let before = MiscPosition::Before { kind, index };
                for (sql, _) in misc.iter().filter(|(_, p)| *p == before) {
                    plan.push(phase, None, *sql);
                }
                plan.push(phase, None, statement);
            }
        }
        for (sql, _) in misc.iter().filter(|(_, p)| *p == MiscPosition::Trailing) {
            plan.push(Phase::Misc, None, *sql);
        }

        plan.push(Phase::Finish, None, "SET FOREIGN_KEY_CHECKS=1");
        Ok(plan)
    }

    fn push(&mut self, phase: Phase, table: Option<&String>, sql: impl Into<String>) {
        self.statements.push(PlannedStatement {
            phase,
            table: table.cloned(),
            sql: sql.into(),
        });
    }

    fn push_insert(&mut self, table: &String, statement: &str, with_data: WithData) {
        if with_data != WithData::Single {
            self.push(Phase::Insert, Some(table), statement);
            return;
        }
        match split_insert_rows(statement) {
            Ok(rows) => {
                for row in rows {
                    self.push(Phase::Insert, Some(table), row);
                }
            }
            Err(e) => {
                warn!(table = %table, error = %e, "Cannot split INSERT, keeping it whole");
                self.push(Phase::Insert, Some(table), statement);
            }
        }
    }

    /// Number of planned statements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    /// Whether nothing is planned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statements in execution order.
    pub fn iter(&self) -> impl Iterator<Item = &PlannedStatement> {
        self.statements.iter()
    }

    /// Statements of one phase.
    pub fn phase(&self, phase: Phase) -> impl Iterator<Item = &str> {
        self.statements
            .iter()
            .filter(move |s| s.phase == phase)
            .map(|s| s.sql.as_str())
    }

    /// Renders the plan as a script, one statement per line.
    ///
    /// Routine and trigger bodies may contain `;`, so the script switches
    /// to `;;` around them.
    #[must_use]
    pub fn to_script(&self) -> String {
        let mut script = String::new();
        let mut delimited = false;
        for statement in &self.statements {
            let needs_delimiter = matches!(
                statement.phase,
                Phase::Functions | Phase::Procedures | Phase::Triggers
            );
            if needs_delimiter != delimited {
                script.push_str(if needs_delimiter { "DELIMITER ;;\n" } else { "DELIMITER ;\n" });
                delimited = needs_delimiter;
            }
            script.push_str(&statement.sql);
            script.push_str(if delimited { ";;\n" } else { ";\n" });
        }
        if delimited {
            script.push_str("DELIMITER ;\n");
        }
        script
    }
}

#[cfg(test)]
mod tests {
    use sqldump_core::classify;

    use super::*;

    const DUMP: &str = "
DROP TABLE IF EXISTS `b`;
CREATE TABLE `b` (`id` int NOT NULL, `a_id` int, PRIMARY KEY (`id`), CONSTRAINT `b_a` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`));
CREATE TABLE `a` (`id` int NOT NULL, PRIMARY KEY (`id`));
INSERT INTO `b` VALUES (1,1),(2,1);
INSERT INTO `a` VALUES (1);
ALTER TABLE `a` ADD KEY `id_2` (`id`);
CREATE VIEW v AS SELECT * FROM a;
SET @x = 1;
";

    fn plan(options: ImportOptions) -> ImportPlan {
        let (parsed, failed) = classify(DUMP).unwrap();
        assert!(failed.is_empty());
        ImportPlan::build(&parsed, &options).unwrap()
    }

    #[test]
    fn test_phases_are_ordered() {
        let plan = plan(ImportOptions::default());
        let phases: Vec<Phase> = plan.iter().map(|s| s.phase).collect();
        let mut sorted = phases.clone();
        sorted.sort();
        assert_eq!(phases, sorted);
        assert_eq!(plan.statements[0].sql, "SET FOREIGN_KEY_CHECKS=0");
        assert_eq!(plan.statements[plan.len() - 1].sql, "SET FOREIGN_KEY_CHECKS=1");
    }

    #[test]
    fn test_tables_follow_dependency_order() {
        let plan = plan(ImportOptions::default());
        let drops: Vec<&str> = plan.phase(Phase::Drop).collect();
        assert_eq!(drops, vec!["DROP TABLE IF EXISTS `b`", "DROP TABLE IF EXISTS `a`"]);

        let creates: Vec<_> = plan
            .iter()
            .filter(|s| s.phase == Phase::Create)
            .filter_map(|s| s.table.as_deref())
            .collect();
        assert_eq!(creates, vec!["a", "b"]);

        let inserts: Vec<&str> = plan.phase(Phase::Insert).collect();
        assert_eq!(inserts, vec!["INSERT INTO `a` VALUES (1)", "INSERT INTO `b` VALUES (1,1),(2,1)"]);
    }

    #[test]
    fn test_no_drop_and_no_data() {
        let plan = plan(ImportOptions::new().drop_first(false).with_data(WithData::None));
        assert_eq!(plan.phase(Phase::Drop).count(), 0);
        assert_eq!(plan.phase(Phase::Insert).count(), 0);
        assert_eq!(plan.phase(Phase::Alter).count(), 1);
        assert_eq!(plan.phase(Phase::Views).count(), 1);
        assert_eq!(plan.phase(Phase::Misc).count(), 1);
    }

    #[test]
    fn test_single_row_inserts() {
        let plan = plan(ImportOptions::new().with_data(WithData::Single));
        let inserts: Vec<&str> = plan.phase(Phase::Insert).collect();
        assert_eq!(
            inserts,
            vec![
                "INSERT INTO `a` VALUES (1)",
                "INSERT INTO `b` VALUES (1,1)",
                "INSERT INTO `b` VALUES (2,1)",
            ]
        );
    }

    #[test]
    fn test_cyclic_keys_are_added_after_creation() {
        let dump = "CREATE TABLE `a` (`id` int NOT NULL, `b_id` int, PRIMARY KEY (`id`), CONSTRAINT `a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`));
CREATE TABLE `b` (`id` int NOT NULL, `a_id` int, PRIMARY KEY (`id`), CONSTRAINT `b_a` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`));";
        let (parsed, _) = classify(dump).unwrap();
        let plan = ImportPlan::build(&parsed, &ImportOptions::default()).unwrap();

        let creates: Vec<&str> = plan.phase(Phase::Create).collect();
        assert!(!creates[0].contains("FOREIGN KEY"));
        assert!(creates[1].contains("FOREIGN KEY"));
        let keys: Vec<&str> = plan.phase(Phase::ForeignKeys).collect();
        assert_eq!(
            keys,
            vec!["ALTER TABLE `a` ADD CONSTRAINT `a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)"]
        );
    }

    #[test]
    fn test_misc_statements_keep_their_place() {
        let dump = "SET SQL_MODE='NO_AUTO_VALUE_ON_ZERO';
CREATE TABLE t (a int);
INSERT INTO t VALUES (0);
/*!50001 DROP VIEW IF EXISTS `v`*/;
CREATE VIEW `v` AS SELECT a FROM t;
SET @x = 1;";
        let (parsed, _) = classify(dump).unwrap();
        let plan = ImportPlan::build(&parsed, &ImportOptions::default()).unwrap();
        let position = |sql: &str| plan.iter().position(|s| s.sql == sql).unwrap();

        assert_eq!(plan.statements[1].sql, "SET SQL_MODE='NO_AUTO_VALUE_ON_ZERO'");
        assert_eq!(plan.statements[1].phase, Phase::Prepare);
        assert!(position("SET SQL_MODE='NO_AUTO_VALUE_ON_ZERO'") < position("INSERT INTO t VALUES (0)"));

        let drop_view = position("/*!50001 DROP VIEW IF EXISTS `v`*/");
        assert_eq!(drop_view + 1, position("CREATE VIEW `v` AS SELECT a FROM t"));
        assert_eq!(plan.statements[drop_view].phase, Phase::Views);

        let misc: Vec<&str> = plan.phase(Phase::Misc).collect();
        assert_eq!(misc, vec!["SET @x = 1"]);

        let phases: Vec<Phase> = plan.iter().map(|s| s.phase).collect();
        assert!(phases.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn test_script_switches_delimiter_for_routines() {
        let (parsed, _) = classify(
            "CREATE TABLE t (a int);
DELIMITER ;;
CREATE PROCEDURE p() BEGIN SELECT 1; END ;;
DELIMITER ;",
        )
        .unwrap();
        let script = ImportPlan::build(&parsed, &ImportOptions::default())
            .unwrap()
            .to_script();
        assert!(script.contains("DELIMITER ;;\nCREATE PROCEDURE p() BEGIN SELECT 1; END;;\nDELIMITER ;\n"));
        assert!(script.ends_with("SET FOREIGN_KEY_CHECKS=1;\n"));
    }
}
