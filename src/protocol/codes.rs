//! Command code catalog
//!
//! Every verb the control channel understands, the sentinel codes used
//! internally by the engine, and the legal command graph between them.

use std::fmt;

/// Identity of a control channel command.
///
/// Sentinel codes (`Connection`, `IncorrectCommand`, `IncorrectSequence`,
/// `InternalShutdown`) never come from a client verb.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandCode {
    Connection,
    IncorrectCommand,
    IncorrectSequence,
    InternalShutdown,

    // Access control
    User,
    Pass,
    Acct,
    Cwd,
    Cdup,
    Smnt,
    Quit,
    Rein,

    // Transfer parameters
    Port,
    Pasv,
    Type,
    Stru,
    Mode,
    Eprt,
    Epsv,

    // Service
    Retr,
    Stor,
    Stou,
    Appe,
    Allo,
    Rest,
    Rnfr,
    Rnto,
    Abor,
    Dele,
    Rmd,
    Mkd,
    Pwd,
    List,
    Nlst,
    Site,
    Syst,
    Stat,
    Help,
    Noop,

    // Security extensions
    Auth,
    Ccc,
    Pbsz,
    Prot,

    // Feature negotiation and extensions
    Feat,
    Opts,
    Lang,
    Mdtm,
    Size,
    Mlst,
    Mlsd,
}

/// Codes a client can send, in catalog order.
const CLIENT_VERBS: [CommandCode; 46] = [
    CommandCode::User,
    CommandCode::Pass,
    CommandCode::Acct,
    CommandCode::Cwd,
    CommandCode::Cdup,
    CommandCode::Smnt,
    CommandCode::Quit,
    CommandCode::Rein,
    CommandCode::Port,
    CommandCode::Pasv,
    CommandCode::Type,
    CommandCode::Stru,
    CommandCode::Mode,
    CommandCode::Eprt,
    CommandCode::Epsv,
    CommandCode::Retr,
    CommandCode::Stor,
    CommandCode::Stou,
    CommandCode::Appe,
    CommandCode::Allo,
    CommandCode::Rest,
    CommandCode::Rnfr,
    CommandCode::Rnto,
    CommandCode::Abor,
    CommandCode::Dele,
    CommandCode::Rmd,
    CommandCode::Mkd,
    CommandCode::Pwd,
    CommandCode::List,
    CommandCode::Nlst,
    CommandCode::Site,
    CommandCode::Syst,
    CommandCode::Stat,
    CommandCode::Help,
    CommandCode::Noop,
    CommandCode::Auth,
    CommandCode::Ccc,
    CommandCode::Pbsz,
    CommandCode::Prot,
    CommandCode::Feat,
    CommandCode::Opts,
    CommandCode::Lang,
    CommandCode::Mdtm,
    CommandCode::Size,
    CommandCode::Mlst,
    CommandCode::Mlsd,
];

impl CommandCode {
    /// The command a confused, unauthenticated client is steered back to.
    pub const AUTHENTICATION_ENTRY: CommandCode = CommandCode::User;

    /// Resolves a client verb (case-insensitive). Sentinels are never returned.
    pub fn from_verb(verb: &str) -> Option<Self> {
        let upper = verb.to_ascii_uppercase();
        match upper.as_str() {
            "XMKD" => return Some(CommandCode::Mkd),
            "XRMD" => return Some(CommandCode::Rmd),
            "XPWD" => return Some(CommandCode::Pwd),
            "XCUP" => return Some(CommandCode::Cdup),
            _ => {}
        }
        CLIENT_VERBS
            .iter()
            .copied()
            .find(|code| code.verb() == upper)
    }

    /// Canonical verb text; sentinels use an internal marker.
    pub fn verb(self) -> &'static str {
        match self {
            CommandCode::Connection => "<connection>",
            CommandCode::IncorrectCommand => "<incorrect>",
            CommandCode::IncorrectSequence => "<incorrect-sequence>",
            CommandCode::InternalShutdown => "<internal-shutdown>",
            CommandCode::User => "USER",
            CommandCode::Pass => "PASS",
            CommandCode::Acct => "ACCT",
            CommandCode::Cwd => "CWD",
            CommandCode::Cdup => "CDUP",
            CommandCode::Smnt => "SMNT",
            CommandCode::Quit => "QUIT",
            CommandCode::Rein => "REIN",
            CommandCode::Port => "PORT",
            CommandCode::Pasv => "PASV",
            CommandCode::Type => "TYPE",
            CommandCode::Stru => "STRU",
            CommandCode::Mode => "MODE",
            CommandCode::Eprt => "EPRT",
            CommandCode::Epsv => "EPSV",
            CommandCode::Retr => "RETR",
            CommandCode::Stor => "STOR",
            CommandCode::Stou => "STOU",
            CommandCode::Appe => "APPE",
            CommandCode::Allo => "ALLO",
            CommandCode::Rest => "REST",
            CommandCode::Rnfr => "RNFR",
            CommandCode::Rnto => "RNTO",
            CommandCode::Abor => "ABOR",
            CommandCode::Dele => "DELE",
            CommandCode::Rmd => "RMD",
            CommandCode::Mkd => "MKD",
            CommandCode::Pwd => "PWD",
            CommandCode::List => "LIST",
            CommandCode::Nlst => "NLST",
            CommandCode::Site => "SITE",
            CommandCode::Syst => "SYST",
            CommandCode::Stat => "STAT",
            CommandCode::Help => "HELP",
            CommandCode::Noop => "NOOP",
            CommandCode::Auth => "AUTH",
            CommandCode::Ccc => "CCC",
            CommandCode::Pbsz => "PBSZ",
            CommandCode::Prot => "PROT",
            CommandCode::Feat => "FEAT",
            CommandCode::Opts => "OPTS",
            CommandCode::Lang => "LANG",
            CommandCode::Mdtm => "MDTM",
            CommandCode::Size => "SIZE",
            CommandCode::Mlst => "MLST",
            CommandCode::Mlsd => "MLSD",
        }
    }

    pub fn is_sentinel(self) -> bool {
        matches!(
            self,
            CommandCode::Connection
                | CommandCode::IncorrectCommand
                | CommandCode::IncorrectSequence
                | CommandCode::InternalShutdown
        )
    }

    /// Commands that must always be servable, even while a transfer runs.
    pub fn is_special(self) -> bool {
        matches!(
            self,
            CommandCode::Abor | CommandCode::Quit | CommandCode::Stat | CommandCode::Noop
        )
    }

    /// Authentication and TLS negotiation commands skip the sequencing check.
    pub fn is_ssl_or_auth(self) -> bool {
        matches!(
            self,
            CommandCode::User
                | CommandCode::Pass
                | CommandCode::Acct
                | CommandCode::Auth
                | CommandCode::Ccc
                | CommandCode::Pbsz
                | CommandCode::Prot
        )
    }

    /// Commands that may legally follow this one. Empty means any command.
    pub fn next_valids(self) -> &'static [CommandCode] {
        match self {
            CommandCode::Connection => &[CommandCode::User, CommandCode::Auth],
            CommandCode::User => &[CommandCode::Pass, CommandCode::Acct],
            CommandCode::Rein => &[CommandCode::User, CommandCode::Auth],
            CommandCode::Rest => &[
                CommandCode::Retr,
                CommandCode::Stor,
                CommandCode::Stou,
                CommandCode::Appe,
            ],
            CommandCode::Rnfr => &[CommandCode::Rnto],
            CommandCode::Auth => &[CommandCode::Pbsz, CommandCode::Prot, CommandCode::User],
            CommandCode::Pbsz => &[CommandCode::Prot, CommandCode::User],
            _ => &[],
        }
    }

    /// Decides whether `next` may follow a command with this code.
    ///
    /// `expected` is an extra successor forced onto the session (for instance
    /// after a refused login); when set, only it and this code's own table
    /// are accepted.
    pub fn accepts_next(self, next: CommandCode, expected: Option<CommandCode>) -> bool {
        if next.is_special() {
            return true;
        }
        let table = self.next_valids();
        match expected {
            Some(extra) => extra == next || table.contains(&next),
            None => table.is_empty() || table.contains(&next),
        }
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.verb())
    }
}
