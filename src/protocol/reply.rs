//! FTP reply handling
//!
//! Defines the reply code catalog and the wire formatting of replies.

use std::fmt;

/// Numeric FTP reply codes (RFC 959, RFC 2228, RFC 2428, RFC 4217).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum ReplyCode {
    RestartMarker = 110,
    ServiceReadyInMinutes = 120,
    DataConnectionAlreadyOpen = 125,
    FileStatusOk = 150,
    CommandOk = 200,
    CommandSuperfluous = 202,
    SystemStatus = 211,
    DirectoryStatus = 212,
    FileStatus = 213,
    HelpMessage = 214,
    NameSystemType = 215,
    ServiceReady = 220,
    ClosingControlConnection = 221,
    DataConnectionOpenNoTransfer = 225,
    ClosingDataConnection = 226,
    EnteringPassiveMode = 227,
    EnteringLongPassiveMode = 228,
    EnteringExtendedPassiveMode = 229,
    UserLoggedIn = 230,
    UserLoggedOut = 232,
    SecurityDataExchangeComplete = 234,
    SecurityDataExchangeSuccessful = 235,
    FileActionOk = 250,
    PathnameCreated = 257,
    UserNameOk = 331,
    NeedAccount = 332,
    SecurityMechanismOk = 334,
    SecurityDataAcceptable = 335,
    PendingFurtherInformation = 350,
    ServiceNotAvailable = 421,
    CantOpenDataConnection = 425,
    ConnectionClosedTransferAborted = 426,
    NeedUnavailableResource = 431,
    FileActionNotTaken = 450,
    ActionAbortedLocalError = 451,
    InsufficientStorage = 452,
    SyntaxError = 500,
    SyntaxErrorInParameters = 501,
    NotImplemented = 502,
    BadSequence = 503,
    NotImplementedForParameter = 504,
    NotLoggedIn = 530,
    NeedAccountForStoring = 532,
    CommandProtectionDenied = 533,
    RequestDeniedForPolicy = 534,
    FailedSecurityCheck = 535,
    ProtectionLevelNotSupported = 536,
    FileUnavailable = 550,
    PageTypeUnknown = 551,
    ExceededStorageAllocation = 552,
    FileNameNotAllowed = 553,
}

impl ReplyCode {
    const ALL: [ReplyCode; 51] = [
        ReplyCode::RestartMarker,
        ReplyCode::ServiceReadyInMinutes,
        ReplyCode::DataConnectionAlreadyOpen,
        ReplyCode::FileStatusOk,
        ReplyCode::CommandOk,
        ReplyCode::CommandSuperfluous,
        ReplyCode::SystemStatus,
        ReplyCode::DirectoryStatus,
        ReplyCode::FileStatus,
        ReplyCode::HelpMessage,
        ReplyCode::NameSystemType,
        ReplyCode::ServiceReady,
        ReplyCode::ClosingControlConnection,
        ReplyCode::DataConnectionOpenNoTransfer,
        ReplyCode::ClosingDataConnection,
        ReplyCode::EnteringPassiveMode,
        ReplyCode::EnteringLongPassiveMode,
        ReplyCode::EnteringExtendedPassiveMode,
        ReplyCode::UserLoggedIn,
        ReplyCode::UserLoggedOut,
        ReplyCode::SecurityDataExchangeComplete,
        ReplyCode::SecurityDataExchangeSuccessful,
        ReplyCode::FileActionOk,
        ReplyCode::PathnameCreated,
        ReplyCode::UserNameOk,
        ReplyCode::NeedAccount,
        ReplyCode::SecurityMechanismOk,
        ReplyCode::SecurityDataAcceptable,
        ReplyCode::PendingFurtherInformation,
        ReplyCode::ServiceNotAvailable,
        ReplyCode::CantOpenDataConnection,
        ReplyCode::ConnectionClosedTransferAborted,
        ReplyCode::NeedUnavailableResource,
        ReplyCode::FileActionNotTaken,
        ReplyCode::ActionAbortedLocalError,
        ReplyCode::InsufficientStorage,
        ReplyCode::SyntaxError,
        ReplyCode::SyntaxErrorInParameters,
        ReplyCode::NotImplemented,
        ReplyCode::BadSequence,
        ReplyCode::NotImplementedForParameter,
        ReplyCode::NotLoggedIn,
        ReplyCode::NeedAccountForStoring,
        ReplyCode::CommandProtectionDenied,
        ReplyCode::RequestDeniedForPolicy,
        ReplyCode::FailedSecurityCheck,
        ReplyCode::ProtectionLevelNotSupported,
        ReplyCode::FileUnavailable,
        ReplyCode::PageTypeUnknown,
        ReplyCode::ExceededStorageAllocation,
        ReplyCode::FileNameNotAllowed,
    ];

    /// Returns the numeric value sent on the wire.
    pub fn as_u16(self) -> u16 {
        self as u16
    }

    /// Looks up a reply code by its numeric value.
    pub fn from_u16(value: u16) -> Option<Self> {
        Self::ALL.iter().copied().find(|code| code.as_u16() == value)
    }

    /// Only these two codes end the control connection once flushed.
    pub fn is_closing(self) -> bool {
        matches!(
            self,
            ReplyCode::ServiceNotAvailable | ReplyCode::ClosingControlConnection
        )
    }

    /// Standard text used when no specific message is supplied.
    pub fn default_message(self) -> &'static str {
        match self {
            ReplyCode::RestartMarker => "Restart marker reply",
            ReplyCode::ServiceReadyInMinutes => "Service ready in a few minutes",
            ReplyCode::DataConnectionAlreadyOpen => "Data connection already open; transfer starting",
            ReplyCode::FileStatusOk => "File status okay; about to open data connection",
            ReplyCode::CommandOk => "Command okay",
            ReplyCode::CommandSuperfluous => "Command not implemented, superfluous at this site",
            ReplyCode::SystemStatus => "System status",
            ReplyCode::DirectoryStatus => "Directory status",
            ReplyCode::FileStatus => "File status",
            ReplyCode::HelpMessage => "Help message",
            ReplyCode::NameSystemType => "UNIX Type: L8",
            ReplyCode::ServiceReady => "Service ready for new user",
            ReplyCode::ClosingControlConnection => "Service closing control connection",
            ReplyCode::DataConnectionOpenNoTransfer => {
                "Data connection open; no transfer in progress"
            }
            ReplyCode::ClosingDataConnection => "Closing data connection",
            ReplyCode::EnteringPassiveMode => "Entering Passive Mode",
            ReplyCode::EnteringLongPassiveMode => "Entering Long Passive Mode",
            ReplyCode::EnteringExtendedPassiveMode => "Entering Extended Passive Mode",
            ReplyCode::UserLoggedIn => "User logged in, proceed",
            ReplyCode::UserLoggedOut => "User logged out",
            ReplyCode::SecurityDataExchangeComplete => "Security data exchange complete",
            ReplyCode::SecurityDataExchangeSuccessful => {
                "Security data exchange completed successfully"
            }
            ReplyCode::FileActionOk => "Requested file action okay, completed",
            ReplyCode::PathnameCreated => "Pathname created",
            ReplyCode::UserNameOk => "User name okay, need password",
            ReplyCode::NeedAccount => "Need account for login",
            ReplyCode::SecurityMechanismOk => "Security mechanism accepted",
            ReplyCode::SecurityDataAcceptable => "Security data is acceptable",
            ReplyCode::PendingFurtherInformation => {
                "Requested file action pending further information"
            }
            ReplyCode::ServiceNotAvailable => {
                "Service not available, closing control connection"
            }
            ReplyCode::CantOpenDataConnection => "Can't open data connection",
            ReplyCode::ConnectionClosedTransferAborted => "Connection closed; transfer aborted",
            ReplyCode::NeedUnavailableResource => "Need some unavailable resource",
            ReplyCode::FileActionNotTaken => "Requested file action not taken",
            ReplyCode::ActionAbortedLocalError => {
                "Requested action aborted: local error in processing"
            }
            ReplyCode::InsufficientStorage => "Requested action not taken: insufficient storage",
            ReplyCode::SyntaxError => "Syntax error, command unrecognized",
            ReplyCode::SyntaxErrorInParameters => "Syntax error in parameters or arguments",
            ReplyCode::NotImplemented => "Command not implemented",
            ReplyCode::BadSequence => "Bad sequence of commands",
            ReplyCode::NotImplementedForParameter => "Command not implemented for that parameter",
            ReplyCode::NotLoggedIn => "Not logged in",
            ReplyCode::NeedAccountForStoring => "Need account for storing files",
            ReplyCode::CommandProtectionDenied => "Command protection level denied",
            ReplyCode::RequestDeniedForPolicy => "Request denied for policy reasons",
            ReplyCode::FailedSecurityCheck => "Failed security check",
            ReplyCode::ProtectionLevelNotSupported => {
                "Requested protection level not supported by mechanism"
            }
            ReplyCode::FileUnavailable => "Requested action not taken: file unavailable",
            ReplyCode::PageTypeUnknown => "Requested action aborted: page type unknown",
            ReplyCode::ExceededStorageAllocation => {
                "Requested file action aborted: exceeded storage allocation"
            }
            ReplyCode::FileNameNotAllowed => "Requested action not taken: file name not allowed",
        }
    }
}

impl fmt::Display for ReplyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u16())
    }
}

/// A reply decided for the peer: code plus human readable text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    code: ReplyCode,
    message: String,
}

impl Reply {
    pub fn new(code: ReplyCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Reply carrying the code's standard text.
    pub fn from_code(code: ReplyCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn code(&self) -> ReplyCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn is_closing(&self) -> bool {
        self.code.is_closing()
    }

    /// Renders the reply as CRLF-terminated wire text.
    pub fn to_wire(&self) -> String {
        format_response(self.code, &self.message)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

/// Format an FTP response message.
///
/// Messages spanning several lines use the RFC 959 multi-line form: the first
/// line is `code-text`, continuation lines are indented by one space and the
/// last line is `code text`.
pub fn format_response(code: ReplyCode, message: &str) -> String {
    let lines: Vec<&str> = message.lines().collect();
    match lines.as_slice() {
        [] => format!("{} \r\n", code),
        [single] => format!("{} {}\r\n", code, single),
        [first, middle @ .., last] => {
            let mut out = format!("{}-{}\r\n", code, first);
            for line in middle {
                out.push(' ');
                out.push_str(line);
                out.push_str("\r\n");
            }
            out.push_str(&format!("{} {}\r\n", code, last));
            out
        }
    }
}
