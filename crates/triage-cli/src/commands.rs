use std::io::Write;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use colored::Colorize;
use serde_json::json;
use tracing::debug;
use triage_ledger::{
    EventKind, EventPayload, EventRecord, LedgerReader, LedgerWriter, ReplayEngine, ReplayResult,
    Status, StreamValidator, ValidationReport,
};
use triage_sdk::{Session, SessionConfig};
use triage_types::{Bucket, EntityId, EntityType};

use crate::cli::*;

pub fn run_command(cli: Cli, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let config = load_config(cli.config.as_deref())?;
    let format = cli.format;
    match cli.command {
        Command::Status(args) => cmd_status(args, config, format, out),
        Command::Audit(args) => cmd_audit(args, config, format, out),
        Command::Validate(args) => cmd_validate(args, config, format, out),
        Command::Replay(args) => cmd_replay(args, config, format, out),
        Command::Demo => cmd_demo(config, out),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<SessionConfig> {
    match path {
        Some(path) => SessionConfig::from_path(path)
            .with_context(|| format!("loading config from {}", path.display())),
        None => Ok(SessionConfig::default()),
    }
}

fn load_session(path: &Path, config: SessionConfig) -> anyhow::Result<Session> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading export {}", path.display()))?;
    let session = Session::import(&raw, config)
        .with_context(|| format!("restoring ledger from {}", path.display()))?;
    debug!(session = %session.id(), path = %path.display(), "export loaded");
    Ok(session)
}

fn cmd_status(
    args: StatusArgs,
    config: SessionConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<ExitCode> {
    let session = load_session(&args.file, config)?;
    let entities = match args.entity {
        Some(raw) => vec![EntityId::new(raw)?],
        None => session.ledger().entities()?,
    };

    let mut rows = Vec::with_capacity(entities.len());
    for entity in &entities {
        let status = session.status(entity.as_str())?;
        let fingerprint = status.fingerprint_hex()?;
        rows.push((entity, status, fingerprint));
    }

    match format {
        OutputFormat::Json => {
            let value: Vec<_> = rows
                .iter()
                .map(|(entity, status, fingerprint)| {
                    json!({ "entity": entity, "status": status, "fingerprint": fingerprint })
                })
                .collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        OutputFormat::Text => {
            if rows.is_empty() {
                writeln!(out, "No entities.")?;
            }
            for (entity, status, fingerprint) in &rows {
                writeln!(out, "{}  {}", entity.as_str().bold(), fingerprint[..12].dimmed())?;
                write_status(out, status)?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_audit(
    args: AuditArgs,
    config: SessionConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<ExitCode> {
    let session = load_session(&args.file, config)?;
    let trail = session.audit(&args.entity)?;

    match format {
        OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&trail)?)?,
        OutputFormat::Text => {
            writeln!(out, "Audit trail for {}", trail.entity_id.as_str().bold())?;
            if trail.is_empty() {
                writeln!(out, "  no records")?;
            }
            for entry in &trail.entries {
                let kind = if entry.kind.is_known() {
                    entry.kind.as_str().cyan()
                } else {
                    entry.kind.as_str().yellow()
                };
                writeln!(
                    out,
                    "  {:>4}  {}  {:<14} {}",
                    entry.sequence,
                    entry.occurred_at.format("%Y-%m-%d %H:%M:%S").to_string().dimmed(),
                    kind,
                    entry.summary
                )?;
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn cmd_validate(
    args: ValidateArgs,
    config: SessionConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<ExitCode> {
    let raw = std::fs::read_to_string(&args.file)
        .with_context(|| format!("reading export {}", args.file.display()))?;
    let records: Vec<EventRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("parsing export {}", args.file.display()))?;
    let reports = StreamValidator::new(&config.ledger).validate_export(records);
    let all_valid = reports.iter().all(ValidationReport::is_valid);

    match format {
        OutputFormat::Json => {
            let value: Vec<_> = reports.iter().map(report_json).collect();
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        OutputFormat::Text => {
            for report in &reports {
                if report.is_valid() {
                    writeln!(
                        out,
                        "{} {} ({} records)",
                        "✓".green(),
                        report.entity_id.as_str(),
                        report.record_count
                    )?;
                    continue;
                }
                writeln!(out, "{} {}", "✗".red().bold(), report.entity_id.as_str())?;
                for violation in &report.violations {
                    writeln!(
                        out,
                        "    seq {}: {:?}: {}",
                        violation.seq, violation.kind, violation.description
                    )?;
                }
            }
            writeln!(out, "{} stream(s) checked", reports.len())?;
        }
    }

    Ok(if all_valid {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report_json(report: &ValidationReport) -> serde_json::Value {
    let violations: Vec<_> = report
        .violations
        .iter()
        .map(|v| json!({ "seq": v.seq, "kind": format!("{:?}", v.kind), "description": v.description }))
        .collect();
    json!({
        "entity": report.entity_id,
        "records": report.record_count,
        "valid": report.is_valid(),
        "violations": violations,
    })
}

fn cmd_replay(
    args: ReplayArgs,
    config: SessionConfig,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<ExitCode> {
    let session = load_session(&args.file, config)?;
    let entity = EntityId::new(args.entity.as_str())?;
    let result = match args.through {
        Some(seq) => ReplayEngine::replay_through(session.ledger(), &entity, seq)?,
        None => ReplayEngine::replay(session.ledger(), &entity)?,
    };
    let fingerprint = result.status.fingerprint_hex()?;

    match format {
        OutputFormat::Json => {
            let value = json!({
                "entity": result.entity_id,
                "through": result.last_sequence,
                "evaluated": result.evaluated,
                "applied": result.applied,
                "audit_only": result.audit_only,
                "skipped_unknown": result.skipped_unknown,
                "status": result.status,
                "fingerprint": fingerprint,
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        OutputFormat::Text => write_replay(out, &result, &fingerprint)?,
    }
    Ok(ExitCode::SUCCESS)
}

fn write_replay(out: &mut impl Write, result: &ReplayResult, fingerprint: &str) -> anyhow::Result<()> {
    let through = result
        .last_sequence
        .map_or_else(|| "genesis".to_string(), |seq| format!("seq {seq}"));
    writeln!(
        out,
        "{} Replayed {} through {}",
        "✓".green().bold(),
        result.entity_id.as_str().bold(),
        through
    )?;
    writeln!(
        out,
        "  {} evaluated, {} applied, {} audit-only, {} unknown",
        result.evaluated, result.applied, result.audit_only, result.skipped_unknown
    )?;
    writeln!(out, "  fingerprint {}", fingerprint.dimmed())?;
    write_status(out, &result.status)
}

fn write_status(out: &mut impl Write, status: &Status) -> anyhow::Result<()> {
    match &status.classification {
        Some(c) => writeln!(out, "  bucket:   {} ({})", c.bucket.as_str().yellow(), c.confidence)?,
        None => writeln!(out, "  bucket:   {}", "unclassified".dimmed())?,
    }
    let finished: Vec<_> = status.finished.iter().map(|a| a.as_str()).collect();
    if finished.is_empty() {
        writeln!(out, "  finished: none")?;
    } else {
        writeln!(out, "  finished: {}", finished.join(", "))?;
    }
    let replied = if status.replied { "yes".green() } else { "no".normal() };
    writeln!(out, "  replied:  {replied}")?;
    Ok(())
}

fn cmd_demo(config: SessionConfig, out: &mut impl Write) -> anyhow::Result<ExitCode> {
    let session = Session::open(config);

    session.classify_once(
        "msg-1001",
        Bucket::Urgent,
        0.92,
        vec![
            "Urgency keyword: asap".into(),
            "Sender is a direct manager".into(),
        ],
    )?;
    // Re-selecting the email must not classify it again.
    session.classify_once("msg-1001", Bucket::Fyi, 0.2, vec![])?;
    session.start_action("msg-1001", 0, None)?;
    session.finish_action("msg-1001", 0, None)?;
    session.record_reply("msg-1001", "RE: Q3 budget review")?;

    session.classify_once(
        "msg-1002",
        Bucket::Fyi,
        0.64,
        vec!["Newsletter sender".into()],
    )?;
    session.ledger().append(
        &EntityId::new("msg-1002")?,
        EntityType::Email,
        EventKind::Unknown("SNOOZED".into()),
        EventPayload::Opaque(json!({ "until": "tomorrow" })),
    )?;

    writeln!(out, "{}", session.export_all()?)?;
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use tempfile::TempDir;

    use super::*;

    fn demo_export() -> String {
        let mut buf = Vec::new();
        cmd_demo(SessionConfig::default(), &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn fixture(contents: &str) -> (TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        std::fs::write(&path, contents).unwrap();
        (dir, path)
    }

    fn run(cli_args: &[&str]) -> (ExitCode, String) {
        use clap::Parser;
        let cli = Cli::try_parse_from(cli_args).unwrap();
        let mut buf = Vec::new();
        let code = run_command(cli, &mut buf).unwrap();
        (code, String::from_utf8(buf).unwrap())
    }

    #[test]
    fn demo_export_holds_both_emails() {
        let records: serde_json::Value = serde_json::from_str(&demo_export()).unwrap();
        let records = records.as_array().unwrap();
        // msg-1001: CLASSIFIED, WORK_STARTED, WORK_FINISHED, REPLIED
        // msg-1001-action-0: WORK_STARTED, WORK_FINISHED
        // msg-1002: CLASSIFIED, SNOOZED
        assert_eq!(records.len(), 8);
        assert!(records.iter().any(|r| r["kind"] == "SNOOZED"));
    }

    #[test]
    fn status_json_reports_derived_state() {
        let (_dir, path) = fixture(&demo_export());
        let (code, output) = run(&[
            "triage",
            "status",
            path.to_str().unwrap(),
            "--entity",
            "msg-1001",
            "--format",
            "json",
        ]);

        assert_eq!(code, ExitCode::SUCCESS);
        let rows: serde_json::Value = serde_json::from_str(&output).unwrap();
        let status = &rows[0]["status"];
        assert_eq!(status["classification"]["bucket"], "urgent");
        assert_eq!(status["replied"], true);
        assert_eq!(status["finished"][0], "msg-1001-action-0");
        assert_eq!(rows[0]["fingerprint"].as_str().unwrap().len(), 64);
    }

    #[test]
    fn status_text_lists_every_entity() {
        let (_dir, path) = fixture(&demo_export());
        let (_, output) = run(&["triage", "status", path.to_str().unwrap()]);
        for entity in ["msg-1001", "msg-1001-action-0", "msg-1002"] {
            assert!(output.contains(entity), "missing {entity} in {output}");
        }
    }

    #[test]
    fn replay_through_earlier_sequence() {
        let (_dir, path) = fixture(&demo_export());
        let (_, output) = run(&[
            "triage",
            "replay",
            path.to_str().unwrap(),
            "--entity",
            "msg-1001",
            "--through",
            "3",
            "--format",
            "json",
        ]);

        let value: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(value["through"], 3);
        assert_eq!(value["status"]["replied"], false);
        assert_eq!(value["audit_only"], 1);
    }

    #[test]
    fn audit_shows_unknown_kinds() {
        let (_dir, path) = fixture(&demo_export());
        let (_, output) = run(&[
            "triage",
            "audit",
            path.to_str().unwrap(),
            "--entity",
            "msg-1002",
        ]);
        assert!(output.contains("unrecognized event SNOOZED"));
    }

    #[test]
    fn validate_passes_clean_export() {
        let (_dir, path) = fixture(&demo_export());
        let (code, output) = run(&["triage", "validate", path.to_str().unwrap()]);
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(output.contains("3 stream(s) checked"));
    }

    #[test]
    fn tampered_export_reports_violations_and_fails() {
        let mut records: serde_json::Value = serde_json::from_str(&demo_export()).unwrap();
        // msg-1001 seq 2 moves past the end of its stream
        records[1]["sequence"] = json!(7);
        let (_dir, path) = fixture(&records.to_string());

        let (code, output) = run(&["triage", "validate", path.to_str().unwrap()]);
        assert_eq!(code, ExitCode::FAILURE);
        assert!(output.contains("SequenceGap"), "{output}");
        assert!(output.contains("expected seq 2, got 3"), "{output}");
        assert!(output.contains("3 stream(s) checked"));

        let (code, output) = run(&[
            "triage",
            "validate",
            path.to_str().unwrap(),
            "--format",
            "json",
        ]);
        assert_eq!(code, ExitCode::FAILURE);
        let reports: serde_json::Value = serde_json::from_str(&output).unwrap();
        assert_eq!(reports[0]["entity"], "msg-1001");
        assert_eq!(reports[0]["valid"], false);
        assert_eq!(reports[1]["valid"], true);
        assert_eq!(reports[2]["valid"], true);
    }

    #[test]
    fn tampered_export_fails_other_commands() {
        let mut records: serde_json::Value = serde_json::from_str(&demo_export()).unwrap();
        records[1]["sequence"] = json!(7);
        let (_dir, path) = fixture(&records.to_string());

        let cli = {
            use clap::Parser;
            Cli::try_parse_from(["triage", "status", path.to_str().unwrap()]).unwrap()
        };
        let err = run_command(cli, &mut Vec::new()).unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("restoring ledger"));
        assert_eq!(message.matches("expected seq 2, got 3").count(), 1, "{message}");
    }

    #[test]
    fn config_file_is_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config = dir.path().join("triage.toml");
        std::fs::write(&config, "default_actor_role = \"reviewer\"\n").unwrap();

        let (_, output) = run(&["triage", "demo", "--config", config.to_str().unwrap()]);
        assert!(output.contains("\"actor_role\": \"reviewer\""));
    }

    #[test]
    fn missing_export_names_the_path() {
        let cli = {
            use clap::Parser;
            Cli::try_parse_from(["triage", "status", "/nonexistent/export.json"]).unwrap()
        };
        let err = run_command(cli, &mut Vec::new()).unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/export.json"));
    }
}
