use strum::{Display, EnumString};

/// SQL keywords recognized by the parser.
///
/// These keywords are case-insensitive. Type names are not keywords; they are
/// read as identifiers and resolved through [`crate::DataType`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum Keyword {
    Create,
    Table,
    Drop,
    Index,
    If,
    Exists,

    Select,
    Insert,
    Update,
    Delete,
    Where,
    From,
    Into,
    Values,
    Set,

    Join,
    Inner,
    Left,
    Outer,
    On,

    Order,
    By,
    Asc,
    Desc,

    Primary,
    Key,
    Unique,
    True,
    False,
    Null,

    And,
    Not,
    Like,
}

impl Keyword {
    pub fn is_bool_literal(self) -> bool {
        matches!(self, Self::True | Self::False)
    }

    /// Keywords that may still be used as table or column names.
    pub fn is_non_reserved(self) -> bool {
        matches!(
            self,
            Self::Key | Self::Index | Self::Asc | Self::Desc | Self::Outer | Self::If | Self::Exists
        )
    }
}
