use crate::domain::order::Order;
use crate::error::Result;
use chrono::SecondsFormat;
use std::io::Write;

pub const HEADER: [&str; 11] = [
    "order_id",
    "item_name",
    "quantity",
    "price",
    "payment_method",
    "phone_number",
    "mpesa_receipt",
    "total_amount",
    "cash_received",
    "change_amount",
    "timestamp",
];

/// Writes orders as ledger rows, one CSV line per order line.
pub struct OrderWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> OrderWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_orders(&mut self, orders: impl IntoIterator<Item = Order>) -> Result<()> {
        self.writer.write_record(HEADER)?;
        for order in orders {
            for row in order.to_rows() {
                let opt = |v: Option<String>| v.unwrap_or_default();
                self.writer.write_record([
                    row.order_id.to_string(),
                    row.item_name,
                    row.quantity.to_string(),
                    row.price.to_string(),
                    row.payment_method.as_str().to_string(),
                    opt(row.phone_number),
                    opt(row.mpesa_receipt),
                    row.total_amount.to_string(),
                    opt(row.cash_received.map(|a| a.to_string())),
                    opt(row.change_amount.map(|a| a.to_string())),
                    row.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                ])?;
            }
        }
        self.writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use crate::domain::order::{OrderId, OrderItem, Payment};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    #[test]
    fn test_write_cash_order() {
        let order = Order {
            id: OrderId::from("ORDAAAAAA"),
            items: vec![OrderItem {
                id: "pilau".into(),
                name: "Pilau".into(),
                price: Amount::new(dec!(350)).unwrap(),
                quantity: 1,
            }],
            total: Amount::new(dec!(350)).unwrap(),
            payment: Payment::Cash {
                cash_received: Amount::new(dec!(500)).unwrap(),
                change: Amount::new(dec!(150)).unwrap(),
            },
            timestamp: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
        };

        let mut out = Vec::new();
        OrderWriter::new(&mut out).write_orders([order]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.starts_with("order_id,item_name,quantity,price,payment_method"));
        assert!(text.contains("ORDAAAAAA,Pilau,1,350,cash,,,350,500,150,2025-03-01T09:30:00Z"));
    }
}
