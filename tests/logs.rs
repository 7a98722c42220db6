mod common;

use common::{descriptor, Fixture};
use odoo_orchestrator_lib::instance::Environment;
use odoo_orchestrator_lib::logs::LogSource;
use odoo_orchestrator_lib::ErrorKind;

/// Records every invocation so tests can prove a backend was not touched.
fn spy_tool(fixture: &Fixture, name: &str) -> std::path::PathBuf {
    let marker = fixture.root().join(format!("{}.called", name));
    fixture.stub_tool(
        name,
        &format!("#!/bin/sh\ntouch {}\necho spied\n", marker.display()),
    );
    marker
}

fn with_instance(fixture: &Fixture) -> std::path::PathBuf {
    fixture.add_instance(
        Environment::Production,
        "acme",
        Some(&descriptor(8069, "acme.example.com", "odoo-up")),
    )
}

#[tokio::test]
async fn unsupported_source_is_rejected_without_running_anything() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    let journal_marker = spy_tool(&fixture, "journalctl");
    let grep_marker = spy_tool(&fixture, "grep");
    fixture.config.commands.journalctl = fixture.root().join("bin/journalctl");
    fixture.config.commands.grep = fixture.root().join("bin/grep");

    let state = fixture.state();
    let err = state
        .logs
        .get_instance_logs("acme", 100, "bogus")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    // Rejected before the instance lookup too.
    let err = state
        .logs
        .get_instance_logs("ghost", 100, "bogus")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);

    assert!(!journal_marker.exists());
    assert!(!grep_marker.exists());
}

#[tokio::test]
async fn journal_passes_unit_and_window() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    fixture.config.commands.journalctl =
        fixture.stub_tool("journalctl", "#!/bin/sh\necho \"journal $*\"\n");

    let result = fixture
        .state()
        .logs
        .get_instance_logs("acme", 25, "systemd")
        .await
        .unwrap();
    assert_eq!(result.source_type, LogSource::Journal);
    assert_eq!(result.line_count, 25);
    assert_eq!(result.logs, "journal -u odoo-up -n 25 --no-pager\n");
}

#[tokio::test]
async fn journal_requires_service() {
    let fixture = Fixture::new();
    fixture.add_instance(Environment::Production, "bare", None);

    let err = fixture
        .state()
        .logs
        .get_instance_logs("bare", 10, "systemd")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.get("resource"), Some("service"));
}

#[tokio::test]
async fn instance_log_file_is_tailed() {
    let mut fixture = Fixture::new();
    let dir = with_instance(&fixture);
    std::fs::write(dir.join("odoo.log"), "one\ntwo\nthree\n").unwrap();
    fixture.config.commands.tail = fixture.stub_tool(
        "tail",
        "#!/bin/sh\n# -n N FILE\nlast=\"\"\nwhile read l; do last=\"$l\"; done < \"$3\"\necho \"$2:$last\"\n",
    );

    let result = fixture
        .state()
        .logs
        .get_instance_logs("acme", 2, "odoo")
        .await
        .unwrap();
    assert_eq!(result.logs, "2:three\n");
    assert_eq!(result.source_type, LogSource::InstanceFile);
}

#[tokio::test]
async fn empty_instance_log_reports_no_logs() {
    let mut fixture = Fixture::new();
    let dir = with_instance(&fixture);
    std::fs::write(dir.join("odoo.log"), "").unwrap();
    fixture.config.commands.tail = fixture.stub_tool("tail", "#!/bin/sh\nexit 0\n");

    let result = fixture
        .state()
        .logs
        .get_instance_logs("acme", 10, "odoo")
        .await
        .unwrap();
    assert_eq!(result.logs, "No logs available");
}

#[tokio::test]
async fn missing_instance_log_is_not_found() {
    let fixture = Fixture::new();
    with_instance(&fixture);

    let err = fixture
        .state()
        .logs
        .get_instance_logs("acme", 10, "odoo")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.get("resource"), Some("odoo.log"));
}

#[tokio::test]
async fn access_log_keeps_last_matching_lines() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    fixture.config.commands.grep = fixture.stub_tool(
        "grep",
        "#!/bin/sh\n# -F -- DOMAIN FILE\nfor i in 1 2 3 4; do echo \"$3 hit $i\"; done\n",
    );

    let result = fixture
        .state()
        .logs
        .get_instance_logs("acme", 2, "nginx-access")
        .await
        .unwrap();
    assert_eq!(
        result.logs,
        "acme.example.com hit 3\nacme.example.com hit 4\n"
    );
    assert_eq!(result.source_type, LogSource::NginxAccess);
}

#[tokio::test]
async fn large_match_set_returns_only_requested_window() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    fixture.config.commands.grep = fixture.stub_tool(
        "grep",
        "#!/bin/sh\ni=0\nwhile [ $i -lt 50000 ]; do echo \"$3 GET /web $i\"; i=$((i+1)); done\n",
    );

    let result = fixture
        .state()
        .logs
        .get_instance_logs("acme", 5, "nginx-access")
        .await
        .unwrap();
    let lines: Vec<&str> = result.logs.lines().collect();
    assert_eq!(lines.len(), 5);
    assert_eq!(lines[0], "acme.example.com GET /web 49995");
    assert_eq!(lines[4], "acme.example.com GET /web 49999");
}

#[tokio::test]
async fn zero_matches_is_success_with_message() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    fixture.config.commands.grep = fixture.stub_tool("grep", "#!/bin/sh\nexit 1\n");

    let state = fixture.state();
    let access = state
        .logs
        .get_instance_logs("acme", 50, "nginx-access")
        .await
        .unwrap();
    assert_eq!(access.logs, "No access logs for domain acme.example.com");

    let error = state
        .logs
        .get_instance_logs("acme", 50, "nginx-error")
        .await
        .unwrap();
    assert_eq!(error.logs, "No error logs for domain acme.example.com");
}

#[tokio::test]
async fn grep_failure_surfaces_stderr() {
    let mut fixture = Fixture::new();
    with_instance(&fixture);
    fixture.config.commands.grep = fixture.stub_tool(
        "grep",
        "#!/bin/sh\necho \"grep: $4: Permission denied\" >&2\nexit 2\n",
    );

    let err = fixture
        .state()
        .logs
        .get_instance_logs("acme", 50, "nginx-error")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NonZeroExit);
    assert_eq!(err.get("exit_code"), Some("2"));
    assert!(err.get("detail").unwrap().contains("Permission denied"));
    assert!(err.get("detail").unwrap().contains("error.log"));
}

#[tokio::test]
async fn nginx_requires_domain() {
    let fixture = Fixture::new();
    fixture.add_instance(
        Environment::Production,
        "nodomain",
        Some("Servicio systemd: odoo-up\n"),
    );

    let err = fixture
        .state()
        .logs
        .get_instance_logs("nodomain", 10, "nginx-access")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ResourceNotFound);
    assert_eq!(err.get("resource"), Some("domain"));
}

#[tokio::test]
async fn unknown_instance_and_zero_lines() {
    let fixture = Fixture::new();
    with_instance(&fixture);
    let state = fixture.state();

    let err = state
        .logs
        .get_instance_logs("ghost", 10, "systemd")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InstanceNotFound);

    let err = state
        .logs
        .get_instance_logs("acme", 0, "systemd")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
}
