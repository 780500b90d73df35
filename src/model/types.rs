//! Fixed vocabularies used while interpreting clauses and documents.
//!
//! Parsing is case-insensitive, `Display` yields the canonical spelling.

use std::fmt;

use serde::Serialize;

use crate::err::Result;
use crate::invalid_content;

macro_rules! vocabulary {
    (
        $(#[$meta:meta])*
        $name:ident, $what:literal {
            $($variant:ident => [$($spelling:literal),+ $(,)?]),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Parse from any accepted spelling, ignoring ASCII case.
            pub fn parse(s: &str) -> Result<Self> {
                let s = s.trim();
                $(
                    if [$($spelling),+].iter().any(|c: &&str| c.eq_ignore_ascii_case(s)) {
                        return Ok($name::$variant);
                    }
                )+
                let expected: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                Err(invalid_content!(
                    "unknown {} `{}`, expected one of {}",
                    $what,
                    s,
                    expected.join(", ")
                ))
            }

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => stringify!($variant)),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

vocabulary! {
    /// Channel isolation type.
    ChannelType, "channel type" {
        Admin => ["Admin"],
        Operational => ["Operational"],
        Analytic => ["Analytic"],
        Debug => ["Debug"],
    }
}

vocabulary! {
    /// Status-code style severity of an event.
    Severity, "severity" {
        Success => ["Success"],
        Informational => ["Informational", "Info"],
        Warning => ["Warning"],
        Error => ["Error"],
    }
}

vocabulary! {
    /// Trace level of an event.
    Level, "level" {
        LogAlways => ["LogAlways", "win:LogAlways"],
        Critical => ["Critical", "win:Critical"],
        Error => ["Error", "win:Error"],
        Warning => ["Warning", "win:Warning"],
        Informational => ["Informational", "Info", "win:Informational"],
        Verbose => ["Verbose", "win:Verbose"],
    }
}

vocabulary! {
    /// Primitive input types an event parameter may carry.
    InType, "parameter type" {
        Int8 => ["Int8", "int8_t", "char"],
        UInt8 => ["UInt8", "uint8_t", "unsigned char", "BYTE"],
        Int16 => ["Int16", "int16_t", "short"],
        UInt16 => ["UInt16", "uint16_t", "unsigned short", "WORD"],
        Int32 => ["Int32", "int32_t", "int", "LONG"],
        UInt32 => ["UInt32", "uint32_t", "unsigned int", "unsigned", "DWORD", "ULONG"],
        Int64 => ["Int64", "int64_t", "long long", "LONGLONG"],
        UInt64 => ["UInt64", "uint64_t", "unsigned long long", "ULONGLONG"],
        Float => ["Float"],
        Double => ["Double"],
        Boolean => ["Boolean", "bool", "BOOL"],
        AnsiString => ["AnsiString", "string", "char*", "const char*", "LPCSTR"],
        UnicodeString => ["UnicodeString", "wstring", "wchar_t*", "const wchar_t*", "LPCWSTR"],
        Guid => ["Guid", "GUID"],
        Pointer => ["Pointer", "void*", "const void*"],
        FileTime => ["FileTime", "FILETIME"],
        SystemTime => ["SystemTime", "SYSTEMTIME"],
        Sid => ["Sid", "SID", "PSID"],
        Binary => ["Binary"],
        HexInt32 => ["HexInt32"],
        HexInt64 => ["HexInt64"],
    }
}

/// Opcodes every provider can reference without defining them.
pub const PREDEFINED_OPCODES: &[(&str, u32)] = &[
    ("Info", 0),
    ("Start", 1),
    ("Stop", 2),
    ("DC_Start", 3),
    ("DC_Stop", 4),
    ("Extension", 5),
    ("Reply", 6),
    ("Resume", 7),
    ("Suspend", 8),
    ("Send", 9),
];

/// The fixed value of a predefined opcode name, if it is one.
pub fn predefined_opcode(name: &str) -> Option<u32> {
    PREDEFINED_OPCODES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|&(_, v)| v)
}
