#![allow(dead_code)]

use sqldump_core::{classify, parse_create_table, FailedQuery, ParsedQuery, Schema};

/// A mysqldump-style export with routines, a trigger, a view and keys added
/// by trailing ALTER statements.
pub const SHOP_DUMP: &str = r"-- MySQL dump 10.13  Distrib 8.0.36
/*!40101 SET @OLD_CHARACTER_SET_CLIENT=@@CHARACTER_SET_CLIENT */;
/*!40101 SET NAMES utf8mb4 */;

DROP TABLE IF EXISTS `order_items`;
CREATE TABLE `order_items` (
  `order_id` int(11) NOT NULL,
  `product_id` int(11) NOT NULL,
  `qty` smallint(5) unsigned NOT NULL DEFAULT '1',
  PRIMARY KEY (`order_id`,`product_id`),
  KEY `product_id` (`product_id`),
  CONSTRAINT `order_items_ibfk_1` FOREIGN KEY (`order_id`) REFERENCES `orders` (`id`) ON DELETE CASCADE,
  CONSTRAINT `order_items_ibfk_2` FOREIGN KEY (`product_id`) REFERENCES `products` (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

DROP TABLE IF EXISTS `orders`;
CREATE TABLE `orders` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `customer_id` int(11) DEFAULT NULL,
  `note` text COMMENT 'free; text',
  `created_at` timestamp NOT NULL DEFAULT CURRENT_TIMESTAMP,
  PRIMARY KEY (`id`),
  KEY `customer_id` (`customer_id`),
  CONSTRAINT `orders_ibfk_1` FOREIGN KEY (`customer_id`) REFERENCES `customers` (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

DROP TABLE IF EXISTS `customers`;
CREATE TABLE `customers` (
  `id` int(11) NOT NULL,
  `email` varchar(255) NOT NULL,
  `name` varchar(50) NOT NULL
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

DROP TABLE IF EXISTS `products`;
CREATE TABLE `products` (
  `id` int(11) NOT NULL AUTO_INCREMENT,
  `sku` varchar(32) NOT NULL,
  `price` decimal(10,2) NOT NULL DEFAULT '0.00',
  PRIMARY KEY (`id`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;

INSERT INTO `customers` VALUES (1,'a@example.com','Ann'),(2,'b@example.com','Bob; Jr.');
INSERT INTO `products` VALUES (1,'SKU-1','9.99');
INSERT INTO `orders` VALUES (1,1,'first','2024-01-01 00:00:00');
INSERT INTO `order_items` VALUES (1,1,2);

ALTER TABLE `customers`
  ADD PRIMARY KEY (`id`),
  ADD UNIQUE KEY `email` (`email`);

/*!50001 CREATE ALGORITHM=UNDEFINED */
/*!50013 DEFINER=`root`@`localhost` SQL SECURITY DEFINER */
/*!50001 VIEW `order_totals` AS select `order_id` AS `order_id`,sum(`qty`) AS `qty` from `order_items` group by `order_id` */;

DELIMITER ;;
CREATE DEFINER=`root`@`localhost` FUNCTION `double_it`(x INT) RETURNS int
    DETERMINISTIC
BEGIN
  RETURN x * 2;
END ;;
CREATE DEFINER=`root`@`localhost` PROCEDURE `touch_order`(IN oid INT)
BEGIN
  UPDATE `orders` SET `note` = 'touched' WHERE `id` = oid;
END ;;
/*!50003 CREATE*/ /*!50017 DEFINER=`root`@`localhost`*/ /*!50003 TRIGGER `orders_bi` BEFORE INSERT ON `orders` FOR EACH ROW SET NEW.note = IFNULL(NEW.note, '') */;;
DELIMITER ;

/*!40101 SET CHARACTER_SET_CLIENT=@OLD_CHARACTER_SET_CLIENT */;
";

/// Number of statements in [`SHOP_DUMP`].
pub const SHOP_STATEMENTS: usize = 20;

pub fn classify_ok(dump: &str) -> (ParsedQuery, Vec<FailedQuery>) {
    classify(dump).unwrap_or_else(|e| panic!("Failed to resolve dump order: {e}"))
}

pub fn schema_of(statements: &[&str]) -> Schema {
    statements
        .iter()
        .map(|sql| {
            let table = parse_create_table(sql)
                .unwrap_or_else(|e| panic!("Failed to parse: {sql}\nError: {e:?}"));
            (table.name.clone(), table)
        })
        .collect()
}

pub fn position(order: &[String], table: &str) -> usize {
    order
        .iter()
        .position(|t| t == table)
        .unwrap_or_else(|| panic!("{table} missing from {order:?}"))
}
