use crate::domain::money::Amount;
use crate::error::{PosError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;
use std::str::FromStr;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum CommandKind {
    Add,
    SetQuantity,
    Clear,
    PayCash,
    PayMpesa,
    ClearHistory,
}

#[derive(Debug, Deserialize)]
struct ScriptRow {
    command: CommandKind,
    item: Option<String>,
    value: Option<String>,
}

/// One shopper action replayed from a session script.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Add { item: String },
    SetQuantity { item: String, quantity: i64 },
    Clear,
    PayCash { cash_received: Amount },
    PayMpesa { phone: String },
    ClearHistory,
}

impl TryFrom<ScriptRow> for SessionCommand {
    type Error = PosError;

    fn try_from(row: ScriptRow) -> Result<Self> {
        let item = || {
            row.item
                .clone()
                .ok_or_else(|| PosError::InvalidCommand(format!("{:?} needs an item", row.command)))
        };
        let value = || {
            row.value
                .clone()
                .ok_or_else(|| PosError::InvalidCommand(format!("{:?} needs a value", row.command)))
        };

        Ok(match row.command {
            CommandKind::Add => SessionCommand::Add { item: item()? },
            CommandKind::SetQuantity => {
                let raw = value()?;
                let quantity = raw
                    .parse()
                    .map_err(|_| PosError::InvalidCommand(format!("bad quantity '{raw}'")))?;
                SessionCommand::SetQuantity {
                    item: item()?,
                    quantity,
                }
            }
            CommandKind::Clear => SessionCommand::Clear,
            CommandKind::PayCash => {
                let raw = value()?;
                let decimal = Decimal::from_str(&raw)
                    .map_err(|_| PosError::InvalidCommand(format!("bad amount '{raw}'")))?;
                SessionCommand::PayCash {
                    cash_received: Amount::new(decimal)?,
                }
            }
            CommandKind::PayMpesa => SessionCommand::PayMpesa { phone: value()? },
            CommandKind::ClearHistory => SessionCommand::ClearHistory,
        })
    }
}

/// Reads a session script (`command, item, value`) from a CSV source.
pub struct ScriptReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> ScriptReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily parses commands; a bad row yields an error and reading goes on.
    pub fn commands(self) -> impl Iterator<Item = Result<SessionCommand>> {
        self.reader
            .into_deserialize::<ScriptRow>()
            .map(|result| result.map_err(PosError::from).and_then(SessionCommand::try_from))
    }
}
