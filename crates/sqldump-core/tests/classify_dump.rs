//! Classification of complete dumps.

mod common;

use common::{classify_ok, position, SHOP_DUMP, SHOP_STATEMENTS};
use sqldump_core::{
    parse_alter_clause, parse_create_table, resolve, split_alter, split_insert_rows,
    split_statements, strip_foreign_keys, AlterType, TableInfo,
};

#[test]
fn test_every_statement_lands_in_one_bucket() {
    assert_eq!(split_statements(SHOP_DUMP).len(), SHOP_STATEMENTS);
    let (parsed, failed) = classify_ok(SHOP_DUMP);
    assert!(failed.is_empty(), "{failed:?}");
    assert_eq!(parsed.statement_count(), SHOP_STATEMENTS);

    assert_eq!(parsed.table.len(), 4);
    assert_eq!(parsed.drop.len(), 4);
    assert_eq!(parsed.alter.len(), 1);
    assert_eq!(parsed.view.len(), 1);
    assert_eq!(parsed.functions.len(), 1);
    assert_eq!(parsed.procedures.len(), 1);
    assert_eq!(parsed.triggers.len(), 1);
    assert_eq!(parsed.misc.len(), 3);
    assert_eq!(parsed.insert.len(), 4);
}

#[test]
fn test_failed_statements_plus_buckets_cover_the_dump() {
    let dump = format!("{SHOP_DUMP}\nCREATE TABLE broken (a int(11;\nINSERT INTO 'x' VALUES (1);\n");
    let (parsed, failed) = classify_ok(&dump);
    assert_eq!(failed.len(), 2);
    assert_eq!(parsed.statement_count() + failed.len(), SHOP_STATEMENTS + 2);
}

#[test]
fn test_sort_is_a_dependency_order() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    assert_eq!(parsed.sort, vec!["customers", "orders", "products", "order_items"]);

    let mut names: Vec<&str> = parsed.tables.iter().map(|t| t.name.as_str()).collect();
    let mut sorted: Vec<&str> = parsed.sort.iter().map(String::as_str).collect();
    names.sort_unstable();
    sorted.sort_unstable();
    assert_eq!(names, sorted);

    for table in &parsed.tables {
        for dependency in table.dependencies().dependencies {
            assert!(position(&parsed.sort, &dependency) < position(&parsed.sort, &table.name));
        }
    }
    assert!(parsed.deferred.is_empty());
}

#[test]
fn test_reversed_input_example() {
    let (parsed, failed) = classify_ok(
        "CREATE TABLE orders (id INT PRIMARY KEY, cust_id INT, FOREIGN KEY (cust_id) REFERENCES customers(id));
CREATE TABLE customers (id INT PRIMARY KEY);",
    );
    assert!(failed.is_empty());
    assert_eq!(parsed.table.len(), 2);
    assert_eq!(parsed.sort, vec!["customers", "orders"]);
}

#[test]
fn test_alter_foreign_keys_order_tables() {
    let (parsed, failed) = classify_ok(
        "CREATE TABLE `orders` (`id` int NOT NULL, `c` int);
CREATE TABLE `customers` (`id` int NOT NULL);
ALTER TABLE `orders` ADD CONSTRAINT `fk` FOREIGN KEY (`c`) REFERENCES `customers` (`id`);",
    );
    assert!(failed.is_empty(), "{failed:?}");
    assert_eq!(parsed.sort, vec!["customers", "orders"]);
    assert!(parsed.deferred.is_empty());

    let schema = parsed.schema();
    for (table, info) in &schema {
        for dependency in info.dependencies().dependencies {
            assert!(position(&parsed.sort, &dependency) < position(&parsed.sort, table));
        }
    }
}

#[test]
fn test_routines_keep_their_bodies() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    assert!(parsed.functions[0].contains("RETURN x * 2;"));
    assert!(parsed.procedures[0].ends_with("END"));
    assert!(parsed.triggers[0].starts_with("/*!50003 CREATE*/"));
    let routines = parsed.non_table_creates();
    assert_eq!(routines.functions, parsed.functions);
}

#[test]
fn test_schema_includes_alter_keys() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let schema = parsed.schema();
    let customers = &schema["customers"];
    assert_eq!(customers.primary_key(), vec!["id"]);
    assert_eq!(customers.column("email").map(|c| c.unique.len()), Some(1));

    let items = &schema["order_items"];
    assert_eq!(items.primary_key(), vec!["order_id", "product_id"]);
    assert_eq!(items.column("qty").and_then(|c| c.default.as_deref()), Some("'1'"));
}

#[test]
fn test_alter_example_decomposes() {
    let split =
        split_alter("ALTER TABLE t ADD PRIMARY KEY (id), ADD FOREIGN KEY (x) REFERENCES y(z)").unwrap();
    assert_eq!(split.key, vec!["ADD PRIMARY KEY (id)"]);
    assert_eq!(split.foreign, vec!["ADD FOREIGN KEY (x) REFERENCES y(z)"]);

    let parsed = parse_alter_clause(&split.foreign[0]).unwrap();
    assert_eq!(parsed.kind, AlterType::Foreign);
    let reference = parsed.reference.unwrap();
    assert_eq!((reference.table.as_str(), reference.column.as_str()), ("y", "z"));
}

#[test]
fn test_cyclic_tables_can_be_created_in_sort_order() {
    let dump = "CREATE TABLE `a` (`id` int NOT NULL, `b_id` int, PRIMARY KEY (`id`), CONSTRAINT `a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`));
CREATE TABLE `b` (`id` int NOT NULL, `a_id` int, PRIMARY KEY (`id`), CONSTRAINT `b_a` FOREIGN KEY (`a_id`) REFERENCES `a` (`id`));";
    let (parsed, _) = classify_ok(dump);
    assert_eq!(parsed.sort, vec!["a", "b"]);
    assert_eq!(parsed.deferred.len(), 1);

    let deferred = &parsed.deferred[0];
    let statement = parsed.create_statement(&deferred.table).unwrap();
    let (rewritten, alters) = strip_foreign_keys(statement, &[deferred.references.clone()]).unwrap();
    assert_eq!(alters, vec!["ALTER TABLE `a` ADD CONSTRAINT `a_b` FOREIGN KEY (`b_id`) REFERENCES `b` (`id`)"]);

    // With the key stripped, the remaining graph is acyclic.
    let a = parse_create_table(&rewritten).unwrap();
    let b = parsed.tables.iter().find(|t| t.name == "b").cloned().unwrap();
    let deps: Vec<_> = [a, b].iter().map(TableInfo::dependencies).collect();
    let resolution = resolve(&deps).unwrap();
    assert_eq!(resolution.order, vec!["a", "b"]);
    assert!(resolution.deferred.is_empty());
}

#[test]
fn test_single_row_inserts() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let rows = split_insert_rows(&parsed.insert["customers"][0]).unwrap();
    assert_eq!(
        rows,
        vec![
            "INSERT INTO `customers` VALUES (1,'a@example.com','Ann')",
            "INSERT INTO `customers` VALUES (2,'b@example.com','Bob; Jr.')",
        ]
    );
}

#[test]
fn test_classified_dump_serializes() {
    let (parsed, _) = classify_ok(SHOP_DUMP);
    let json = serde_json::to_value(&parsed).unwrap();
    assert_eq!(json["sort"][0], "customers");
    assert!(json["insert"]["orders"].is_array());
    assert!(json.get("deferred").is_none());
}
