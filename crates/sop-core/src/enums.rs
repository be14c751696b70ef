//! Mode switches that travel on the command line as lowercase words

use std::fmt;
use std::str::FromStr;

use crate::error::{ErrorKind, SopError};

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($(#[$vmeta:meta])* $variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant),+
        }

        impl $name {
            pub const VALUES: &'static [&'static str] = &[$($text),+];

            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = SopError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok($name::$variant),)+
                    other => Err(SopError::new(
                        ErrorKind::UnsupportedOption,
                        format!(
                            "Unsupported value '{}' for {}, expected one of: {}",
                            other,
                            stringify!($name),
                            Self::VALUES.join(", ")
                        ),
                    )),
                }
            }
        }
    };
}

wire_enum! {
    /// Detached signature mode (`sop sign --as`)
    SignAs {
        Binary => "binary",
        Text => "text",
    }
}

wire_enum! {
    /// Inline signature mode (`sop inline-sign --as`)
    InlineSignAs {
        Binary => "binary",
        Text => "text",
        /// Cleartext Signature Framework
        Clearsigned => "clearsigned",
    }
}

wire_enum! {
    /// Literal data format of an encrypted message (`sop encrypt --as`)
    EncryptAs {
        Binary => "binary",
        Text => "text",
    }
}

wire_enum! {
    /// Purpose of message encryption, mapped onto the encryption key flags
    EncryptFor {
        Storage => "storage",
        Communications => "communications",
        Any => "any",
    }
}

wire_enum! {
    /// Signature type reported in a verification line (`mode:binary`, `mode:text`)
    SignatureMode {
        Binary => "binary",
        Text => "text",
    }
}

wire_enum! {
    ArmorLabel {
        Auto => "auto",
        Sig => "sig",
        Key => "key",
        Cert => "cert",
        Message => "message",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_names() {
        assert_eq!(InlineSignAs::Clearsigned.to_string(), "clearsigned");
        assert_eq!("communications".parse::<EncryptFor>().unwrap(), EncryptFor::Communications);
        assert_eq!(ArmorLabel::VALUES.len(), 5);
    }

    #[test]
    fn test_unknown_value_is_unsupported_option() {
        let err = "mime".parse::<EncryptAs>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedOption);
        assert!(err.to_string().contains("binary, text"));
    }
}
