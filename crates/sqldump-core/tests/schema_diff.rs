//! Schema diff properties over parsed dumps.

mod common;

use common::{classify_ok, schema_of, SHOP_DUMP};
use sqldump_core::{
    diff, parse_column, ColumnChange, DiffOptions, Schema, SchemaDiffer, TableInfo,
};

/// Applies the target side of every differing column (and table) to `source`.
fn converge(source: &Schema, target: &Schema) -> Schema {
    let report = diff(source, target);
    let mut result = source.clone();
    for (table_name, columns) in &report.tables {
        let Some(target_table) = target.get(table_name) else {
            result.remove(table_name);
            continue;
        };
        let table = result
            .entry(table_name.clone())
            .or_insert_with(|| TableInfo::new(table_name.clone()));
        for (column, entry) in columns {
            match entry.change {
                ColumnChange::Removed => {
                    table.columns.shift_remove(column);
                }
                _ => {
                    if let Some(definition) = target_table.column(column) {
                        table.columns.insert(column.clone(), definition.clone());
                    }
                }
            }
        }
    }
    result
}

#[test]
fn test_diff_of_dump_against_itself_is_empty() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let schema = parsed.schema();
    assert!(diff(&schema, &schema).is_empty());

    let full = SchemaDiffer::with_options(DiffOptions::new().with_same()).diff(&schema, &schema);
    assert!(!full.has_changes());
    assert_eq!(full.tables.len(), schema.len());
}

#[test]
fn test_varchar_growth_is_modified() {
    let source = schema_of(&["CREATE TABLE people (name VARCHAR(50) NOT NULL)"]);
    let target = schema_of(&["CREATE TABLE people (name VARCHAR(100) NOT NULL)"]);
    let report = diff(&source, &target);
    let entry = &report.tables["people"]["name"];
    assert_eq!(entry.change, ColumnChange::Modified);
    assert!(entry.source.is_some());
    assert!(entry.target.is_some());
}

#[test]
fn test_applying_the_diff_converges() {
    let source = schema_of(&[
        "CREATE TABLE a (id int NOT NULL, v varchar(10), old int)",
        "CREATE TABLE gone (x int)",
    ]);
    let target = schema_of(&[
        "CREATE TABLE a (id int NOT NULL AUTO_INCREMENT PRIMARY KEY, v varchar(20) DEFAULT 'x', fresh date)",
        "CREATE TABLE added (y int)",
    ]);
    assert!(diff(&source, &target).has_changes());

    let converged = converge(&source, &target);
    assert!(diff(&converged, &target).is_empty());
}

#[test]
fn test_live_snapshot_against_dump() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let dump_schema = parsed.schema();

    let mut live = dump_schema.clone();
    if let Some(customers) = live.get_mut("customers") {
        customers
            .columns
            .insert("name".to_string(), parse_column("varchar(30) NOT NULL").unwrap());
    }
    live.remove("products");

    let report = diff(&live, &dump_schema);
    assert_eq!(report.tables["customers"]["name"].change, ColumnChange::Modified);
    assert!(report.tables["products"]
        .values()
        .all(|c| c.change == ColumnChange::New));
    assert_eq!(report.tables.len(), 2);

    let sql = SchemaDiffer::new().migration_sql(&live, &dump_schema);
    assert_eq!(sql.len(), 2);
    assert!(sql[0].starts_with("ALTER TABLE `customers` MODIFY COLUMN `name` varchar(50) NOT NULL"));
    assert!(sql[1].starts_with("CREATE TABLE `products`"));
}

#[test]
fn test_new_tables_are_created_parents_first() {
    let target = schema_of(&[
        "CREATE TABLE a_orders (id int NOT NULL, c int, CONSTRAINT fk FOREIGN KEY (c) REFERENCES b_customers (id))",
        "CREATE TABLE b_customers (id int NOT NULL, PRIMARY KEY (id))",
    ]);
    let sql = SchemaDiffer::new().migration_sql(&Schema::new(), &target);
    assert_eq!(sql.len(), 2);
    assert!(sql[0].starts_with("CREATE TABLE `b_customers`"));
    assert!(sql[1].starts_with("CREATE TABLE `a_orders`"));
    assert!(sql[1].contains("REFERENCES `b_customers`"));
}

#[test]
fn test_cyclic_new_tables_defer_their_keys() {
    let target = schema_of(&[
        "CREATE TABLE a (id int NOT NULL, b_id int, PRIMARY KEY (id), CONSTRAINT a_b FOREIGN KEY (b_id) REFERENCES b (id))",
        "CREATE TABLE b (id int NOT NULL, a_id int, PRIMARY KEY (id), CONSTRAINT b_a FOREIGN KEY (a_id) REFERENCES a (id))",
    ]);
    let sql = SchemaDiffer::new().migration_sql(&Schema::new(), &target);
    assert_eq!(sql.len(), 3);
    assert!(sql[0].starts_with("CREATE TABLE `a`"));
    assert!(!sql[0].contains("FOREIGN KEY"));
    assert!(sql[1].starts_with("CREATE TABLE `b`"));
    assert!(sql[1].contains("CONSTRAINT `b_a` FOREIGN KEY"));
    assert_eq!(
        sql[2],
        "ALTER TABLE `a` ADD CONSTRAINT `a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)"
    );
}

#[test]
fn test_repeated_diffs_are_byte_identical() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let schema = parsed.schema();
    let empty = Schema::new();
    let first = serde_json::to_string(&diff(&schema, &empty)).unwrap();
    let second = serde_json::to_string(&diff(&schema, &empty)).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with(r#"{"customers":{"email":"#));
}

#[test]
fn test_column_round_trip_idempotence() {
    let fragments = [
        "int(11) NOT NULL AUTO_INCREMENT",
        "smallint(5) unsigned NOT NULL DEFAULT '1'",
        "decimal(10, 2) NOT NULL DEFAULT '0.00'",
        "timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP ON UPDATE CURRENT_TIMESTAMP",
        "varchar(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_unicode_ci DEFAULT NULL",
        "enum('draft','sent') NOT NULL DEFAULT 'draft'",
        "bigint unsigned zerofill",
        "int KEY",
        "char(36) UNIQUE",
    ];
    for fragment in fragments {
        let once = parse_column(fragment).unwrap();
        let twice = parse_column(&once.to_string()).unwrap();
        assert_eq!(once, twice, "{fragment}");
    }
}
