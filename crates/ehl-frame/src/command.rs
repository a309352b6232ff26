//! EHL command codes.
//!
//! The table is fixed by dispenser firmware. Codes outside it decode as
//! [`CommandCode::Unknown`] so newer firmware does not break older hosts.

use std::fmt;

/// A command (request) or reply code carried in byte 3 of every frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    /// Positive acknowledgement.
    Ok,
    /// Negative acknowledgement.
    Error,
    /// Stop the current delivery.
    Stop,
    /// Delivered volume report.
    Volume,
    /// Dispenser state query / report.
    State,
    /// Unit price.
    Price,
    /// Block the dispenser.
    Block,
    /// Line test (ping).
    LineTest,
    /// Program a preset by amount.
    ProgI,
    /// Program a preset by volume.
    ProgW,
    /// Unblock the dispenser.
    Unblock,
    /// Zero the totalizer display.
    Zer,
    /// Program the unit price.
    ProgPrc,
    /// Tank data.
    Tank,
    /// A code this table does not know; the raw value is preserved.
    ///
    /// Build values through [`CommandCode::from_code`] so a known code is never
    /// wrapped here.
    Unknown(u8),
}

impl CommandCode {
    /// Every known code, in ascending numeric order.
    pub const KNOWN: [CommandCode; 14] = [
        CommandCode::Ok,
        CommandCode::Error,
        CommandCode::Stop,
        CommandCode::Volume,
        CommandCode::State,
        CommandCode::Price,
        CommandCode::Block,
        CommandCode::LineTest,
        CommandCode::ProgI,
        CommandCode::ProgW,
        CommandCode::Unblock,
        CommandCode::Zer,
        CommandCode::ProgPrc,
        CommandCode::Tank,
    ];

    /// Map a wire byte to a command code. Never fails.
    pub const fn from_code(code: u8) -> Self {
        match code {
            30 => CommandCode::Ok,
            37 => CommandCode::Error,
            47 => CommandCode::Stop,
            69 => CommandCode::Volume,
            75 => CommandCode::State,
            92 => CommandCode::Price,
            105 => CommandCode::Block,
            106 => CommandCode::LineTest,
            112 => CommandCode::ProgI,
            117 => CommandCode::ProgW,
            119 => CommandCode::Unblock,
            129 => CommandCode::Zer,
            169 => CommandCode::ProgPrc,
            197 => CommandCode::Tank,
            other => CommandCode::Unknown(other),
        }
    }

    /// The wire byte for this code.
    pub const fn code(self) -> u8 {
        match self {
            CommandCode::Ok => 30,
            CommandCode::Error => 37,
            CommandCode::Stop => 47,
            CommandCode::Volume => 69,
            CommandCode::State => 75,
            CommandCode::Price => 92,
            CommandCode::Block => 105,
            CommandCode::LineTest => 106,
            CommandCode::ProgI => 112,
            CommandCode::ProgW => 117,
            CommandCode::Unblock => 119,
            CommandCode::Zer => 129,
            CommandCode::ProgPrc => 169,
            CommandCode::Tank => 197,
            CommandCode::Unknown(code) => code,
        }
    }

    /// Upper-case mnemonic used in logs and CLI output.
    pub const fn name(self) -> &'static str {
        match self {
            CommandCode::Ok => "OK",
            CommandCode::Error => "ERROR",
            CommandCode::Stop => "STOP",
            CommandCode::Volume => "VOLUME",
            CommandCode::State => "STATE",
            CommandCode::Price => "PRICE",
            CommandCode::Block => "BLOCK",
            CommandCode::LineTest => "LINETEST",
            CommandCode::ProgI => "PROG_I",
            CommandCode::ProgW => "PROG_W",
            CommandCode::Unblock => "UNBLOCK",
            CommandCode::Zer => "ZER",
            CommandCode::ProgPrc => "PROG_PRC",
            CommandCode::Tank => "TANK",
            CommandCode::Unknown(_) => "UNKNOWN",
        }
    }

    /// Look a code up by mnemonic (case-insensitive). `UNKNOWN` is not accepted.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::KNOWN
            .iter()
            .copied()
            .find(|code| code.name().eq_ignore_ascii_case(name))
    }

    /// Returns true for codes outside the firmware table.
    pub const fn is_unknown(self) -> bool {
        matches!(self, CommandCode::Unknown(_))
    }
}

impl From<u8> for CommandCode {
    fn from(code: u8) -> Self {
        Self::from_code(code)
    }
}

impl From<CommandCode> for u8 {
    fn from(code: CommandCode) -> Self {
        code.code()
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandCode::Unknown(code) => write!(f, "UNKNOWN({code})"),
            known => f.write_str(known.name()),
        }
    }
}
