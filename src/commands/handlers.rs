//! Command handlers
//!
//! Executes built-in commands against the session. Each handler either
//! records the reply on the session or returns the error to reply with.

use log::debug;

use super::builtin::BuiltinCommand;
use crate::auth::{validate_password, validate_user};
use crate::error::ProtocolError;
use crate::protocol::{Command, CommandCode, ReplyCode};
use crate::session::{Session, TlsState};

/// Verbs with a built-in implementation, as listed by HELP.
const IMPLEMENTED: &[CommandCode] = &[
    CommandCode::User,
    CommandCode::Pass,
    CommandCode::Quit,
    CommandCode::Noop,
    CommandCode::Syst,
    CommandCode::Feat,
    CommandCode::Stat,
    CommandCode::Help,
    CommandCode::Auth,
    CommandCode::Ccc,
    CommandCode::Pbsz,
    CommandCode::Prot,
    CommandCode::Abor,
];

const AUTH_MECHANISMS: &[&str] = &["TLS", "SSL", "TLS-C", "TLS-P"];

type HandlerResult = Result<(), ProtocolError>;

pub(super) fn dispatch(command: &BuiltinCommand, session: &mut Session) -> HandlerResult {
    match command.code() {
        CommandCode::Connection => handle_connection(session),
        CommandCode::IncorrectCommand => handle_incorrect(command, session),
        CommandCode::IncorrectSequence => handle_incorrect_sequence(command, session),
        CommandCode::InternalShutdown => handle_internal_shutdown(session),
        CommandCode::User => handle_cmd_user(session, command.arg()),
        CommandCode::Pass => handle_cmd_pass(session, command.arg()),
        CommandCode::Quit => handle_cmd_quit(session),
        CommandCode::Noop => handle_cmd_noop(session),
        CommandCode::Syst => handle_cmd_syst(session),
        CommandCode::Feat => handle_cmd_feat(session),
        CommandCode::Stat => handle_cmd_stat(session),
        CommandCode::Help => handle_cmd_help(session),
        CommandCode::Auth => handle_cmd_auth(session, command.arg()),
        CommandCode::Ccc => handle_cmd_ccc(session),
        CommandCode::Pbsz => handle_cmd_pbsz(session),
        CommandCode::Prot => handle_cmd_prot(session, command.arg()),
        CommandCode::Abor => handle_cmd_abor(session),
        code => Err(ProtocolError::new(
            ReplyCode::NotImplemented,
            format!("{code} not implemented"),
        )),
    }
}

fn handle_connection(session: &mut Session) -> HandlerResult {
    let config = session.config();
    session.set_reply(ReplyCode::ServiceReady, config.banner());
    Ok(())
}

fn handle_incorrect(command: &BuiltinCommand, session: &mut Session) -> HandlerResult {
    session.restore_previous_command();
    let message = command
        .detail()
        .unwrap_or(ReplyCode::SyntaxError.default_message());
    Err(ProtocolError::new(ReplyCode::SyntaxError, message))
}

fn handle_incorrect_sequence(command: &BuiltinCommand, session: &mut Session) -> HandlerResult {
    debug!("Out of sequence command: {}", command.verb());
    session.restore_previous_command();
    Err(ProtocolError::from_code(ReplyCode::BadSequence))
}

fn handle_internal_shutdown(session: &mut Session) -> HandlerResult {
    session.set_reply(ReplyCode::ServiceNotAvailable, "Service shutting down");
    Ok(())
}

// Command handler for USER
fn handle_cmd_user(session: &mut Session, username: &str) -> HandlerResult {
    session.logout();
    let config = session.config();
    validate_user(config.credentials(), username, config.max_username_length())?;

    session.set_user_valid(true);
    session.set_username(Some(username.to_string()));
    session.set_next_command(CommandCode::Pass);
    session.set_reply(
        ReplyCode::UserNameOk,
        format!("User {username} okay, need password"),
    );
    Ok(())
}

// Command handler for PASS
fn handle_cmd_pass(session: &mut Session, password: &str) -> HandlerResult {
    let username = match session.username() {
        Some(name) if session.is_user_valid() => name.clone(),
        _ => {
            return Err(ProtocolError::new(
                ReplyCode::BadSequence,
                "Login with USER first",
            ));
        }
    };

    let config = session.config();
    if let Err(e) = validate_password(
        config.credentials(),
        &username,
        password,
        config.max_username_length(),
    ) {
        session.set_authenticated(false);
        session.set_next_command(CommandCode::AUTHENTICATION_ENTRY);
        return Err(e.into());
    }

    session.set_authenticated(true);
    session.set_reply(
        ReplyCode::UserLoggedIn,
        format!("User {username} logged in, proceed"),
    );
    Ok(())
}

// Command handler for QUIT
fn handle_cmd_quit(session: &mut Session) -> HandlerResult {
    session.logout();
    session.set_reply(ReplyCode::ClosingControlConnection, "Goodbye");
    Ok(())
}

fn handle_cmd_noop(session: &mut Session) -> HandlerResult {
    session.set_reply(ReplyCode::CommandOk, "NOOP ok");
    Ok(())
}

fn handle_cmd_syst(session: &mut Session) -> HandlerResult {
    session.set_reply_code(ReplyCode::NameSystemType);
    Ok(())
}

fn handle_cmd_feat(session: &mut Session) -> HandlerResult {
    let mut features = vec!["Extensions supported:", "UTF8"];
    if session.config().tls_available() {
        features.extend(["AUTH TLS", "PBSZ", "PROT", "CCC"]);
    }
    features.push("End");
    session.set_reply(ReplyCode::SystemStatus, features.join("\n"));
    Ok(())
}

fn handle_cmd_stat(session: &mut Session) -> HandlerResult {
    let login = match session.username() {
        Some(name) if session.is_authenticated() => format!("Logged in as {name}"),
        _ => "Not logged in".to_string(),
    };
    let protection = match session.tls_state() {
        TlsState::Secure => "Control connection protected by TLS",
        _ => "Control connection not protected",
    };
    let transfer = match session.data_transfer() {
        Some(transfer) if transfer.is_executing() => "Transfer in progress",
        _ => "No transfer in progress",
    };
    session.set_reply(
        ReplyCode::SystemStatus,
        format!("FTP gateway status:\n{login}\n{protection}\n{transfer}\nEnd of status"),
    );
    Ok(())
}

fn handle_cmd_help(session: &mut Session) -> HandlerResult {
    let verbs: Vec<&str> = IMPLEMENTED.iter().map(|code| code.verb()).collect();
    session.set_reply(
        ReplyCode::HelpMessage,
        format!(
            "The following commands are recognized:\n{}\nHelp OK",
            verbs.join(" ")
        ),
    );
    Ok(())
}

fn require_secure(session: &Session, verb: &str) -> HandlerResult {
    if session.tls_state() == TlsState::Secure {
        Ok(())
    } else {
        Err(ProtocolError::new(
            ReplyCode::BadSequence,
            format!("{verb} requires a protected control connection"),
        ))
    }
}

// Command handler for AUTH; the engine performs the handshake after the 234
fn handle_cmd_auth(session: &mut Session, mechanism: &str) -> HandlerResult {
    let mechanism = mechanism.to_ascii_uppercase();
    if !AUTH_MECHANISMS.contains(&mechanism.as_str()) {
        return Err(ProtocolError::new(
            ReplyCode::NotImplementedForParameter,
            format!("AUTH {mechanism} not supported"),
        ));
    }
    if !session.config().tls_available() {
        return Err(ProtocolError::new(
            ReplyCode::RequestDeniedForPolicy,
            "TLS not available",
        ));
    }
    if session.tls_state() != TlsState::Plain {
        return Err(ProtocolError::new(
            ReplyCode::BadSequence,
            "Control connection already protected",
        ));
    }

    session.logout();
    session.set_reply(
        ReplyCode::SecurityDataExchangeComplete,
        format!("AUTH {mechanism} successful"),
    );
    Ok(())
}

// Command handler for CCC; the engine removes TLS after the 200
fn handle_cmd_ccc(session: &mut Session) -> HandlerResult {
    if session.tls_state() != TlsState::Secure {
        return Err(ProtocolError::new(
            ReplyCode::CommandProtectionDenied,
            "CCC requires a protected control connection",
        ));
    }
    session.set_reply(ReplyCode::CommandOk, "Clearing control channel");
    Ok(())
}

fn handle_cmd_pbsz(session: &mut Session) -> HandlerResult {
    require_secure(session, "PBSZ")?;
    session.set_reply(ReplyCode::CommandOk, "PBSZ=0");
    Ok(())
}

fn handle_cmd_prot(session: &mut Session, level: &str) -> HandlerResult {
    require_secure(session, "PROT")?;
    let level = level.to_ascii_uppercase();
    match level.as_str() {
        "C" | "P" => {
            session.set_reply(
                ReplyCode::CommandOk,
                format!("Protection level set to {level}"),
            );
            Ok(())
        }
        "S" | "E" => Err(ProtocolError::new(
            ReplyCode::ProtectionLevelNotSupported,
            format!("Protection level {level} not supported"),
        )),
        _ => Err(ProtocolError::new(
            ReplyCode::NotImplementedForParameter,
            format!("Unknown protection level '{level}'"),
        )),
    }
}

// Command handler for ABOR
fn handle_cmd_abor(session: &mut Session) -> HandlerResult {
    match session.data_transfer() {
        Some(transfer) if transfer.is_executing() => {
            transfer.close_current_channel()?;
            session.set_reply(
                ReplyCode::ClosingDataConnection,
                "ABOR successful; transfer aborted",
            );
        }
        _ => session.set_reply(
            ReplyCode::DataConnectionOpenNoTransfer,
            "No transfer to abort",
        ),
    }
    Ok(())
}
