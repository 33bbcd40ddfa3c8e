use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::AbortHandle;

use rax_ftp_gateway::auth::CredentialStore;
use rax_ftp_gateway::commands::DefaultCommandFactory;
use rax_ftp_gateway::error::{EngineError, ProtocolError, TlsError, TransferError};
use rax_ftp_gateway::protocol::{CommandCode, CommandFactory, Reply, ReplyCode};
use rax_ftp_gateway::tls::TlsContextFactory;
use rax_ftp_gateway::transfer::{
    DataTransferControl, TransferDirection, TransferOutcome, TransferTracker,
};
use rax_ftp_gateway::{
    BusinessHooks, ControlChannel, ControlEngine, EngineSettings, EngineState, PeerInfo, Session,
    SessionConfig, ShutdownSignal, TlsState,
};

type Log = Arc<Mutex<Vec<String>>>;

fn record(log: &Log, event: impl Into<String>) {
    log.lock().unwrap().push(event.into());
}

// --------------------
// Doubles
// --------------------

struct MockHandler;

struct MockChannel {
    log: Log,
    open: bool,
    reads: bool,
    fail_handshake: bool,
    fail_writes: bool,
}

#[async_trait]
impl ControlChannel for MockChannel {
    type TlsHandler = MockHandler;

    fn is_open(&self) -> bool {
        self.open
    }

    fn reads_enabled(&self) -> bool {
        self.reads
    }

    fn set_reads_enabled(&mut self, enabled: bool) {
        self.reads = enabled;
        record(&self.log, if enabled { "reads on" } else { "reads off" });
    }

    async fn write_reply(&mut self, reply: &Reply) -> io::Result<()> {
        if !self.open || self.fail_writes {
            return Err(io::Error::from(io::ErrorKind::BrokenPipe));
        }
        record(&self.log, format!("write {}", reply.code()));
        Ok(())
    }

    async fn close(&mut self) {
        self.open = false;
        record(&self.log, "close");
    }

    async fn install_tls(&mut self, _handler: MockHandler) -> io::Result<()> {
        record(&self.log, "install");
        if self.fail_handshake {
            Err(io::Error::other("handshake failed"))
        } else {
            Ok(())
        }
    }

    async fn remove_tls(&mut self) -> io::Result<()> {
        record(&self.log, "remove");
        Ok(())
    }
}

struct MockTlsFactory {
    fail: bool,
}

impl TlsContextFactory for MockTlsFactory {
    type Handler = MockHandler;

    fn build_handler(&self, _require_client_auth: bool) -> Result<MockHandler, TlsError> {
        if self.fail {
            Err(TlsError::Disabled)
        } else {
            Ok(MockHandler)
        }
    }
}

struct MockHooks {
    log: Log,
    fail_connect: bool,
    fail_verb: Option<&'static str>,
    fail_observers: bool,
}

impl MockHooks {
    fn observed(&self, event: impl Into<String>) -> Result<(), ProtocolError> {
        record(&self.log, event);
        if self.fail_observers {
            return Err(ProtocolError::new(ReplyCode::FileUnavailable, "Quota exceeded"));
        }
        Ok(())
    }
}

fn verb_of(session: &Session) -> String {
    session.current_command().verb().to_string()
}

#[async_trait]
impl BusinessHooks for MockHooks {
    async fn on_connected(
        &self,
        _session: &mut Session,
        _peer: &PeerInfo,
    ) -> Result<(), ProtocolError> {
        record(&self.log, "on_connected");
        if self.fail_connect {
            return Err(ProtocolError::new(ReplyCode::NotLoggedIn, "Host not allowed"));
        }
        Ok(())
    }

    async fn on_closed(&self, session: &mut Session) -> Result<(), ProtocolError> {
        let user = session.username().cloned().unwrap_or_else(|| "-".into());
        self.observed(format!("on_closed {user}"))
    }

    async fn clear(&self) -> Result<(), ProtocolError> {
        self.observed("hooks clear")
    }

    async fn before_run(&self, session: &mut Session) -> Result<(), ProtocolError> {
        let verb = verb_of(session);
        record(&self.log, format!("before_run {verb}"));
        if self.fail_verb == Some(verb.as_str()) {
            return Err(ProtocolError::new(ReplyCode::FileUnavailable, "Refused by policy"));
        }
        Ok(())
    }

    async fn after_run_ok(&self, session: &mut Session) -> Result<(), ProtocolError> {
        record(&self.log, format!("after_run_ok {}", verb_of(session)));
        Ok(())
    }

    async fn after_run_ko(
        &self,
        _session: &mut Session,
        error: &ProtocolError,
    ) -> Result<(), ProtocolError> {
        self.observed(format!("after_run_ko {}", error.code()))
    }

    async fn on_local_exception(
        &self,
        _session: &mut Session,
        _cause: &EngineError,
    ) -> Result<(), ProtocolError> {
        self.observed("local_exception")
    }

    async fn after_transfer_done(
        &self,
        _session: &mut Session,
        _outcome: &TransferOutcome,
    ) -> Result<(), ProtocolError> {
        self.observed("transfer_done")
    }

    fn call_for_snmp(&self, message: &str, _detail: &str) {
        record(&self.log, format!("snmp {message}"));
    }
}

/// Real tracker that also records the calls the engine makes on it.
struct RecordingTransfer {
    log: Log,
    inner: Arc<TransferTracker>,
}

#[async_trait]
impl DataTransferControl for RecordingTransfer {
    fn is_executing(&self) -> bool {
        self.inner.is_executing()
    }

    async fn wait_until_idle(&self, timeout: Duration) -> bool {
        self.inner.wait_until_idle(timeout).await
    }

    fn clear(&self) {
        record(&self.log, "transfer clear");
        self.inner.clear();
    }

    fn close_current_channel(&self) -> Result<(), TransferError> {
        record(&self.log, "transfer close");
        self.inner.close_current_channel()
    }
}

// --------------------
// Harness
// --------------------

#[derive(Default)]
struct Options {
    fail_handshake: bool,
    fail_tls_context: bool,
    fail_writes: bool,
    fail_connect: bool,
    fail_verb: Option<&'static str>,
    /// Makes every hook that only observes an outcome fail.
    fail_observers: bool,
    admission_wait: Option<Duration>,
    disconnect_wait: Option<Duration>,
}

struct Harness {
    engine: ControlEngine<MockChannel>,
    log: Log,
    tracker: Arc<TransferTracker>,
    shutdown: ShutdownSignal,
}

impl Harness {
    fn new() -> Self {
        Self::with(Options::default())
    }

    fn with(options: Options) -> Self {
        let log: Log = Arc::default();
        let (tracker, _completions) = TransferTracker::new();
        let factory: Arc<dyn CommandFactory> = Arc::new(DefaultCommandFactory::default());

        let credentials = CredentialStore::from_accounts([("alice", "alice123")]);
        let config = SessionConfig::new("Test gateway ready", credentials).with_tls(true);
        let hooks: Arc<dyn BusinessHooks> = Arc::new(MockHooks {
            log: Arc::clone(&log),
            fail_connect: options.fail_connect,
            fail_verb: options.fail_verb,
            fail_observers: options.fail_observers,
        });
        let transfer: Arc<dyn DataTransferControl> = Arc::new(RecordingTransfer {
            log: Arc::clone(&log),
            inner: Arc::clone(&tracker),
        });
        let session = Session::new(
            Arc::new(config),
            factory.connection(),
            Some(hooks),
            Some(transfer),
        );

        let channel = MockChannel {
            log: Arc::clone(&log),
            open: true,
            reads: true,
            fail_handshake: options.fail_handshake,
            fail_writes: options.fail_writes,
        };
        let settings = EngineSettings {
            admission_wait: options.admission_wait.unwrap_or(Duration::from_millis(30)),
            disconnect_wait: options.disconnect_wait.unwrap_or(Duration::from_millis(30)),
            require_client_auth: false,
        };
        let tls: Arc<dyn TlsContextFactory<Handler = MockHandler>> = Arc::new(MockTlsFactory {
            fail: options.fail_tls_context,
        });
        let shutdown = ShutdownSignal::new();
        let peer = PeerInfo::new(
            "127.0.0.1:40000".parse().unwrap(),
            "127.0.0.1:2121".parse().unwrap(),
        );

        let engine = ControlEngine::new(session, channel, factory, shutdown.clone(), peer)
            .with_settings(settings)
            .with_tls(tls);

        Self {
            engine,
            log,
            tracker,
            shutdown,
        }
    }

    /// Drains and returns the events recorded so far.
    fn events(&self) -> Vec<String> {
        std::mem::take(&mut *self.log.lock().unwrap())
    }

    async fn connected() -> Self {
        let mut harness = Self::new();
        harness.engine.on_connect().await;
        harness.events();
        harness
    }

    async fn logged_in() -> Self {
        let mut harness = Self::connected().await;
        harness.engine.on_line("USER alice").await;
        harness.engine.on_line("PASS alice123").await;
        assert!(harness.engine.session().is_authenticated());
        harness.events();
        harness
    }

    fn start_transfer(&self) -> AbortHandle {
        let handle = tokio::spawn(std::future::pending::<()>()).abort_handle();
        self.tracker.start(handle.clone()).unwrap();
        handle
    }

    fn reply_code(&self) -> ReplyCode {
        self.engine.session().reply().code()
    }
}

// --------------------
// Connection lifecycle
// --------------------

#[tokio::test]
async fn test_connect_greets_and_becomes_ready() {
    let mut h = Harness::new();
    assert_eq!(h.engine.state(), EngineState::Init);

    h.engine.on_connect().await;

    assert_eq!(
        h.events(),
        vec![
            "on_connected",
            "before_run <connection>",
            "after_run_ok <connection>",
            "write 220",
        ]
    );
    assert_eq!(h.engine.session().reply().message(), "Test gateway ready");
    assert!(h.engine.session().is_ready());
    assert_eq!(h.engine.state(), EngineState::Ready);
}

#[tokio::test]
async fn test_connect_while_draining_runs_no_hooks() {
    let mut h = Harness::new();
    h.shutdown.trigger();

    h.engine.on_connect().await;

    let events = h.events();
    assert!(events.iter().all(|e| !e.starts_with("on_connected") && !e.starts_with("before_run")));
    assert_eq!(events, vec!["transfer clear", "write 421", "close"]);
    assert!(!h.engine.session().is_ready());
    assert_eq!(h.engine.state(), EngineState::Closed);
}

#[tokio::test]
async fn test_connect_hook_failure_replies_and_closes() {
    let mut h = Harness::with(Options {
        fail_connect: true,
        ..Options::default()
    });

    h.engine.on_connect().await;

    assert_eq!(
        h.events(),
        vec!["on_connected", "after_run_ko 530", "write 530", "close"]
    );
    assert!(!h.engine.session().is_ready());
}

#[tokio::test]
async fn test_lines_before_ready_get_non_closing_421() {
    let mut h = Harness::new();

    h.engine.on_line("NOOP").await;

    assert_eq!(h.events(), vec!["after_run_ko 421", "write 421"]);
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_disconnect_runs_hooks_once_with_live_session() {
    let mut h = Harness::logged_in().await;

    h.engine.on_disconnect().await;
    assert_eq!(h.events(), vec!["on_closed alice", "hooks clear", "close"]);
    assert!(h.engine.session().hooks().is_none());
    assert!(h.engine.session().data_transfer().is_none());
    assert_eq!(h.engine.state(), EngineState::Closed);

    h.engine.on_disconnect().await;
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_disconnect_waits_for_running_transfer() {
    let mut h = Harness::with(Options {
        disconnect_wait: Some(Duration::from_secs(5)),
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();
    h.start_transfer();

    let tracker = Arc::clone(&h.tracker);
    let log = Arc::clone(&h.log);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        record(&log, "transfer finished");
        tracker.complete(TransferOutcome::completed(TransferDirection::Upload, "a", 1));
    });

    h.engine.on_disconnect().await;
    assert_eq!(
        h.events(),
        vec!["transfer finished", "on_closed -", "hooks clear", "close"]
    );
}

#[tokio::test]
async fn test_disconnect_gives_up_on_stuck_transfer() {
    let mut h = Harness::connected().await;
    let task = h.start_transfer();

    h.engine.on_disconnect().await;

    assert_eq!(
        h.events(),
        vec!["transfer clear", "on_closed -", "hooks clear", "close"]
    );
    assert!(!h.tracker.is_executing());
    for _ in 0..10 {
        if task.is_finished() {
            break;
        }
        tokio::task::yield_now().await;
    }
    assert!(task.is_finished());
}

#[tokio::test]
async fn test_failing_close_hooks_still_finish_disconnect() {
    let mut h = Harness::with(Options {
        fail_observers: true,
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.engine.on_line("USER alice").await;
    h.engine.on_line("PASS alice123").await;
    h.events();

    h.engine.on_disconnect().await;

    assert_eq!(h.events(), vec!["on_closed alice", "hooks clear", "close"]);
    assert!(h.engine.session().hooks().is_none());
    assert_eq!(h.engine.state(), EngineState::Closed);
}

// --------------------
// Admission and sequencing
// --------------------

#[tokio::test]
async fn test_login_flow() {
    let mut h = Harness::connected().await;

    h.engine.on_line("USER alice").await;
    assert_eq!(h.reply_code(), ReplyCode::UserNameOk);
    h.engine.on_line("PASS alice123").await;
    assert_eq!(h.reply_code(), ReplyCode::UserLoggedIn);

    assert_eq!(
        h.events(),
        vec![
            "before_run USER",
            "after_run_ok USER",
            "write 331",
            "before_run PASS",
            "after_run_ok PASS",
            "write 230",
        ]
    );
    assert!(h.engine.session().is_authenticated());
}

#[tokio::test]
async fn test_unauthenticated_command_is_steered_to_user() {
    let mut h = Harness::connected().await;

    h.engine.on_line("SYST").await;

    assert_eq!(h.events(), vec!["write 530"]);
    assert_eq!(h.reply_code(), ReplyCode::NotLoggedIn);
    assert_eq!(
        h.engine.session().expected_next(),
        Some(CommandCode::AUTHENTICATION_ENTRY)
    );
    assert!(h.engine.channel().is_open());
    assert_eq!(
        h.engine.session().current_command().code(),
        CommandCode::Connection
    );
}

#[tokio::test]
async fn test_special_command_before_login_keeps_steering_to_user() {
    let mut h = Harness::connected().await;

    h.engine.on_line("NOOP").await;
    assert_eq!(h.reply_code(), ReplyCode::CommandOk);
    assert_eq!(
        h.engine.session().current_command().code(),
        CommandCode::Connection
    );
    h.events();

    h.engine.on_line("SYST").await;
    assert_eq!(h.events(), vec!["write 530"]);
    assert_eq!(h.reply_code(), ReplyCode::NotLoggedIn);

    h.engine.on_line("STAT").await;
    h.engine.on_line("STOR x").await;
    assert_eq!(h.reply_code(), ReplyCode::NotLoggedIn);
}

#[tokio::test]
async fn test_special_command_keeps_pending_rename() {
    let mut h = Harness::logged_in().await;
    h.engine.on_line("RNFR old.txt").await;

    h.engine.on_line("NOOP").await;
    assert_eq!(h.reply_code(), ReplyCode::CommandOk);
    h.engine.on_line("DELE other.txt").await;

    assert_eq!(h.reply_code(), ReplyCode::BadSequence);
    assert_eq!(h.engine.session().current_command().code(), CommandCode::Rnfr);
}

#[tokio::test]
async fn test_failed_login_then_command_gets_530() {
    let mut h = Harness::connected().await;
    h.engine.on_line("USER alice").await;
    h.engine.on_line("PASS wrong").await;
    assert_eq!(h.reply_code(), ReplyCode::NotLoggedIn);
    h.events();

    h.engine.on_line("LIST").await;
    assert_eq!(h.events(), vec!["write 530"]);
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_incorrect_sequence_when_authenticated() {
    let mut h = Harness::logged_in().await;
    h.engine.on_line("RNFR old.txt").await;
    h.events();

    h.engine.on_line("DELE other.txt").await;

    assert_eq!(
        h.events(),
        vec![
            "before_run DELE",
            "after_run_ko 503",
            "write 503",
        ]
    );
    assert_eq!(h.engine.session().reply().message(), "Bad sequence of commands");
    assert!(h.engine.channel().is_open());
    // Sequencing state is handed back to the command before the refusal.
    assert_eq!(h.engine.session().current_command().code(), CommandCode::Rnfr);
}

#[tokio::test]
async fn test_unknown_command_gets_500() {
    let mut h = Harness::logged_in().await;

    h.engine.on_line("FROB x").await;

    assert_eq!(h.reply_code(), ReplyCode::SyntaxError);
    assert_eq!(h.events(), vec!["before_run FROB", "after_run_ko 500", "write 500"]);
}

#[tokio::test]
async fn test_every_cycle_finishes_before_the_next() {
    let mut h = Harness::connected().await;
    for line in ["USER alice", "PASS alice123", "SYST", "NOOP", "FEAT", "BOGUS", "STAT"] {
        h.engine.on_line(line).await;
        assert!(h.engine.session().command_finished(), "after {line}");
        assert_eq!(h.engine.state(), EngineState::Ready, "after {line}");
    }
}

// --------------------
// Transfer mutual exclusion
// --------------------

#[tokio::test]
async fn test_running_transfer_refuses_ordinary_commands() {
    let mut h = Harness::logged_in().await;
    h.start_transfer();

    h.engine.on_line("STOR newfile.txt").await;

    let events = h.events();
    assert_eq!(events, vec!["after_run_ko 503", "write 503"]);
    assert!(!events.iter().any(|e| e == "before_run STOR"));
    assert_eq!(
        h.engine.session().reply().message(),
        "Previous transfer command is not finished yet"
    );
    assert!(h.engine.channel().is_open());
    assert!(h.tracker.is_executing());
}

#[tokio::test]
async fn test_transfer_ending_within_wait_admits_command() {
    let mut h = Harness::with(Options {
        admission_wait: Some(Duration::from_secs(5)),
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.engine.on_line("USER alice").await;
    h.engine.on_line("PASS alice123").await;
    h.events();
    h.start_transfer();

    let tracker = Arc::clone(&h.tracker);
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        tracker.complete(TransferOutcome::completed(TransferDirection::Download, "a", 1));
    });

    h.engine.on_line("SYST").await;
    assert_eq!(h.reply_code(), ReplyCode::NameSystemType);
}

#[tokio::test]
async fn test_special_commands_bypass_running_transfer() {
    let mut h = Harness::logged_in().await;
    h.start_transfer();

    h.engine.on_line("NOOP").await;
    assert_eq!(h.reply_code(), ReplyCode::CommandOk);
    h.engine.on_line("STAT").await;
    assert_eq!(h.reply_code(), ReplyCode::SystemStatus);
    assert!(h.engine.session().reply().message().contains("Transfer in progress"));

    h.engine.on_line("ABOR").await;
    assert_eq!(h.reply_code(), ReplyCode::ClosingDataConnection);
    assert!(!h.tracker.is_executing());
    assert!(h.events().contains(&"transfer close".to_string()));
}

#[tokio::test]
async fn test_failed_command_closes_orphan_transfer() {
    let mut h = Harness::with(Options {
        fail_verb: Some("NOOP"),
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();
    h.start_transfer();

    h.engine.on_line("NOOP").await;

    assert_eq!(
        h.events(),
        vec![
            "before_run NOOP",
            "after_run_ko 550",
            "write 550",
            "transfer close",
        ]
    );
    assert!(!h.tracker.is_executing());
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_transfer_done_writes_outcome() {
    let mut h = Harness::logged_in().await;

    h.engine
        .on_transfer_done(TransferOutcome::completed(TransferDirection::Upload, "a.txt", 5))
        .await;
    assert_eq!(h.events(), vec!["transfer_done", "write 226"]);

    h.engine
        .on_transfer_done(TransferOutcome::failed(
            TransferDirection::Upload,
            "b.txt",
            0,
            "disk full",
        ))
        .await;
    assert_eq!(h.events(), vec!["transfer_done", "write 451"]);
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_transfer_hook_failure_becomes_the_reply() {
    let mut h = Harness::with(Options {
        fail_observers: true,
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();

    h.engine
        .on_transfer_done(TransferOutcome::completed(TransferDirection::Upload, "a.txt", 5))
        .await;

    assert_eq!(h.events(), vec!["transfer_done", "write 550"]);
    assert_eq!(h.engine.session().reply().message(), "Quota exceeded");
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_failing_error_hook_keeps_original_reply() {
    let mut h = Harness::with(Options {
        fail_verb: Some("NOOP"),
        fail_observers: true,
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();

    h.engine.on_line("NOOP").await;

    assert_eq!(
        h.events(),
        vec!["before_run NOOP", "after_run_ko 550", "write 550"]
    );
    assert_eq!(h.engine.session().reply().message(), "Refused by policy");
    assert!(h.engine.channel().is_open());
}

// --------------------
// Close policy
// --------------------

#[tokio::test]
async fn test_quit_clears_transfer_before_closing() {
    let mut h = Harness::logged_in().await;

    h.engine.on_line("QUIT").await;

    assert_eq!(
        h.events(),
        vec![
            "before_run QUIT",
            "after_run_ok QUIT",
            "transfer clear",
            "write 221",
            "close",
        ]
    );
    assert!(!h.engine.channel().is_open());
    assert_eq!(h.engine.state(), EngineState::Closed);
}

#[tokio::test]
async fn test_non_closing_codes_keep_connection_open() {
    let mut h = Harness::connected().await;
    for line in ["SYST", "PASS nobody", "USER nobody", "USER alice", "PASS x", "PROT Q"] {
        h.engine.on_line(line).await;
        assert!(!h.reply_code().is_closing());
        assert!(h.engine.channel().is_open(), "after {line}");
    }
    assert!(!h.events().iter().any(|e| e == "close" || e == "transfer clear"));
}

#[tokio::test]
async fn test_lines_after_close_are_ignored() {
    let mut h = Harness::logged_in().await;
    h.engine.on_line("QUIT").await;
    h.events();

    h.engine.on_line("NOOP").await;
    assert!(h.events().is_empty());
}

#[tokio::test]
async fn test_write_failure_closes_connection() {
    let mut h = Harness::with(Options {
        fail_writes: true,
        ..Options::default()
    });

    h.engine.on_connect().await;

    assert!(!h.engine.channel().is_open());
    assert!(
        h.engine
            .session()
            .exit_reason()
            .is_some_and(|reason| reason.starts_with("Write failed"))
    );
}

// --------------------
// TLS upgrade and downgrade
// --------------------

#[tokio::test]
async fn test_auth_then_ccc_returns_to_plain() {
    let mut h = Harness::connected().await;

    h.engine.on_line("AUTH TLS").await;
    assert_eq!(
        h.events(),
        vec![
            "before_run AUTH",
            "after_run_ok AUTH",
            "reads off",
            "write 234",
            "install",
            "reads on",
        ]
    );
    assert_eq!(h.engine.session().tls_state(), TlsState::Secure);
    assert!(h.engine.channel().is_open());
    assert!(h.engine.channel().reads_enabled());

    h.engine.on_line("PBSZ 0").await;
    h.engine.on_line("PROT P").await;
    assert_eq!(h.reply_code(), ReplyCode::CommandOk);
    h.events();

    h.engine.on_line("CCC").await;
    assert_eq!(
        h.events(),
        vec![
            "before_run CCC",
            "after_run_ok CCC",
            "reads off",
            "write 200",
            "remove",
            "reads on",
        ]
    );
    assert_eq!(h.engine.session().tls_state(), TlsState::Plain);
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_failed_handshake_falls_back_to_plain_and_closes() {
    let mut h = Harness::with(Options {
        fail_handshake: true,
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();

    h.engine.on_line("AUTH TLS").await;

    assert_eq!(
        h.events(),
        vec![
            "before_run AUTH",
            "after_run_ok AUTH",
            "reads off",
            "write 234",
            "install",
            "snmp TLS handshake failed",
            "close",
        ]
    );
    assert_eq!(h.engine.session().tls_state(), TlsState::Plain);
    assert!(!h.engine.channel().is_open());
}

#[tokio::test]
async fn test_unavailable_tls_context_closes_without_handshake() {
    let mut h = Harness::with(Options {
        fail_tls_context: true,
        ..Options::default()
    });
    h.engine.on_connect().await;
    h.events();

    h.engine.on_line("AUTH TLS").await;

    let events = h.events();
    assert!(!events.iter().any(|e| e == "install"));
    assert!(events.contains(&"snmp TLS context unavailable".to_string()));
    assert_eq!(h.engine.session().tls_state(), TlsState::Plain);
    assert!(!h.engine.channel().is_open());
}

#[tokio::test]
async fn test_ccc_on_plain_connection_is_refused() {
    let mut h = Harness::connected().await;

    h.engine.on_line("CCC").await;

    assert_eq!(h.events(), vec!["before_run CCC", "after_run_ko 533", "write 533"]);
    assert_eq!(h.engine.session().tls_state(), TlsState::Plain);
}

// --------------------
// Errors and shutdown
// --------------------

#[tokio::test]
async fn test_protocol_error_replies_without_closing() {
    let mut h = Harness::connected().await;

    h.engine
        .on_error(EngineError::Protocol(ProtocolError::from_code(
            ReplyCode::NotLoggedIn,
        )))
        .await;

    assert_eq!(h.events(), vec!["after_run_ko 530", "write 530"]);
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_protocol_error_with_closing_code_closes() {
    let mut h = Harness::connected().await;

    h.engine
        .on_error(EngineError::Protocol(ProtocolError::from_code(
            ReplyCode::ServiceNotAvailable,
        )))
        .await;

    assert_eq!(
        h.events(),
        vec!["after_run_ko 421", "transfer clear", "write 421", "close"]
    );
}

#[tokio::test]
async fn test_io_failure_takes_generic_path() {
    let mut h = Harness::connected().await;

    h.engine
        .on_error(EngineError::Io(io::Error::from(io::ErrorKind::ConnectionReset)))
        .await;

    assert_eq!(
        h.events(),
        vec!["local_exception", "transfer clear", "write 421", "close"]
    );
    assert_eq!(h.engine.session().exit_reason(), Some("Internal error"));
}

#[tokio::test]
async fn test_invariant_violation_reports_local_exception() {
    let mut h = Harness::connected().await;

    h.engine
        .on_error(EngineError::InvariantViolation("bad state".into()))
        .await;

    assert_eq!(
        h.events(),
        vec!["local_exception", "transfer clear", "write 421", "close"]
    );
    assert!(
        h.engine
            .session()
            .exit_reason()
            .is_some_and(|reason| reason.contains("bad state"))
    );
}

#[tokio::test]
async fn test_log_only_errors_write_nothing() {
    let mut h = Harness::connected().await;

    h.engine
        .on_error(EngineError::ConnectFailure(io::Error::from(
            io::ErrorKind::ConnectionRefused,
        )))
        .await;
    h.engine
        .on_error(EngineError::Rejected("executor draining".into()))
        .await;

    assert!(h.events().is_empty());
    assert!(h.engine.channel().is_open());
}

#[tokio::test]
async fn test_already_closed_connection_gets_no_reply() {
    let mut h = Harness::logged_in().await;
    h.engine.on_line("QUIT").await;
    h.events();

    h.engine.on_error(EngineError::ConnectionAlreadyClosed).await;

    assert!(h.events().is_empty());
    assert_eq!(h.engine.session().exit_reason(), Some("Internal error"));
}

#[tokio::test]
async fn test_shutdown_runs_internal_command_then_421() {
    let mut h = Harness::logged_in().await;

    h.engine.on_shutdown().await;

    assert_eq!(
        h.events(),
        vec![
            "before_run <internal-shutdown>",
            "after_run_ok <internal-shutdown>",
            "transfer clear",
            "write 421",
            "close",
        ]
    );
}

#[tokio::test]
async fn test_lines_while_draining_get_421() {
    let mut h = Harness::logged_in().await;
    h.shutdown.trigger();

    h.engine.on_line("NOOP").await;

    assert_eq!(h.events(), vec!["transfer clear", "write 421", "close"]);
    assert!(!h.engine.channel().is_open());
}
