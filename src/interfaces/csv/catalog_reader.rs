use crate::domain::catalog::CatalogItem;
use crate::error::{PosError, Result};
use std::io::Read;

/// Reads menu entries (`id, name, price`) from a CSV source.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes catalog rows.
    pub fn items(self) -> impl Iterator<Item = Result<CatalogItem>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(PosError::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::money::Amount;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reader_valid_stream() {
        let data = "id, name, price\npilau, Pilau, 350\nchai, Masala Chai, 80.50";
        let reader = CatalogReader::new(data.as_bytes());
        let results: Vec<Result<CatalogItem>> = reader.items().collect();

        assert_eq!(results.len(), 2);
        let chai = results[1].as_ref().unwrap();
        assert_eq!(chai.name, "Masala Chai");
        assert_eq!(chai.price, Amount::new(dec!(80.50)).unwrap());
    }

    #[test]
    fn test_reader_rejects_negative_price() {
        let data = "id, name, price\nbad, Bad, -1";
        let reader = CatalogReader::new(data.as_bytes());
        let results: Vec<Result<CatalogItem>> = reader.items().collect();

        assert!(results[0].is_err());
    }
}
