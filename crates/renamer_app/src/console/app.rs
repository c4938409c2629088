use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use bytes::Bytes;
use renamer_core::{JobSnapshot, JobStatus, Mode};
use renamer_engine::{ApiKey, ExportOptions, KeyStatus, Orchestrator, OrchestratorError};
use renamer_logging::{renamer_info, renamer_warn};

use super::commands::{parse_command, Command, HELP};

/// Line-oriented front end over one [`Orchestrator`].
pub(crate) struct Console {
    orchestrator: Orchestrator,
    watch_interval: Duration,
    /// Staged ids as they stood when the last job started, so a finished
    /// job can be shown as old -> new pairs.
    started_from: Vec<String>,
}

impl Console {
    pub(crate) fn new(orchestrator: Orchestrator, watch_interval: Duration) -> Self {
        Self {
            orchestrator,
            watch_interval,
            started_from: Vec::new(),
        }
    }

    /// Read commands from `input` until `quit` or end of input.
    pub(crate) fn run(&mut self, input: impl BufRead, out: &mut impl Write) -> io::Result<()> {
        writeln!(out, "renamer ready; type help for commands")?;
        prompt(out)?;
        for line in input.lines() {
            let line = line?;
            match parse_command(&line) {
                Ok(None) => {}
                Ok(Some(Command::Quit)) => break,
                Ok(Some(command)) => self.execute(command, out)?,
                Err(message) => writeln!(out, "{message}")?,
            }
            prompt(out)?;
        }
        writeln!(out)?;
        self.shutdown(out)
    }

    fn execute(&mut self, command: Command, out: &mut impl Write) -> io::Result<()> {
        match command {
            Command::Add(paths) => self.add(&paths, out),
            Command::List => self.list(out),
            Command::Start { mode, instructions } => self.start(mode, instructions, out),
            Command::Poll => {
                let snapshot = self.orchestrator.poll();
                self.print_snapshot(&snapshot, out)
            }
            Command::Watch => self.watch(out),
            Command::Stop => match self.orchestrator.stop() {
                Ok(()) => {
                    let snapshot = self.orchestrator.poll();
                    self.print_snapshot(&snapshot, out)
                }
                Err(err) => report(&err, out),
            },
            Command::Clear => match self.orchestrator.clear_staged() {
                Ok(()) => {
                    self.started_from.clear();
                    writeln!(out, "staging area cleared")
                }
                Err(err) => report(&err, out),
            },
            Command::Key(key) => match self.orchestrator.configure_key(ApiKey::new(key)) {
                Ok(KeyStatus::Valid) => writeln!(out, "API key verified and stored"),
                Ok(KeyStatus::Invalid) => writeln!(out, "API key rejected; nothing stored"),
                Err(err) => report(&err, out),
            },
            Command::Export(dir) => self.export(&dir, out),
            Command::Help => writeln!(out, "{HELP}"),
            // Handled by the read loop.
            Command::Quit => Ok(()),
        }
    }

    fn add(&self, paths: &[PathBuf], out: &mut impl Write) -> io::Result<()> {
        for path in paths {
            let Some(id) = path.file_name().and_then(|name| name.to_str()) else {
                writeln!(out, "skipped {}: no usable file name", path.display())?;
                continue;
            };
            let content = match fs::read(path) {
                Ok(content) => content,
                Err(err) => {
                    writeln!(out, "skipped {}: {err}", path.display())?;
                    continue;
                }
            };
            let size = content.len();
            match self.orchestrator.stage_file(id, Bytes::from(content)) {
                Ok(()) => writeln!(out, "staged {id} ({size} bytes)")?,
                Err(err) => report(&err, out)?,
            }
        }
        Ok(())
    }

    fn list(&self, out: &mut impl Write) -> io::Result<()> {
        match self.orchestrator.staged_files() {
            Ok(ids) if ids.is_empty() => writeln!(out, "nothing staged"),
            Ok(ids) => {
                for (index, id) in ids.iter().enumerate() {
                    writeln!(out, "{:>4}. {id}", index + 1)?;
                }
                Ok(())
            }
            Err(err) => report(&err, out),
        }
    }

    fn start(&mut self, mode: Mode, instructions: String, out: &mut impl Write) -> io::Result<()> {
        let originals = match self.orchestrator.staged_files() {
            Ok(ids) => ids,
            Err(err) => return report(&err, out),
        };
        match self.orchestrator.start(mode, instructions) {
            Ok(snapshot) => {
                self.started_from = originals;
                writeln!(
                    out,
                    "job {} started: {} file(s), mode {}",
                    snapshot.job_id, snapshot.total, snapshot.mode
                )
            }
            Err(err) => report(&err, out),
        }
    }

    fn watch(&self, out: &mut impl Write) -> io::Result<()> {
        let mut followed = false;
        loop {
            let snapshot = self.orchestrator.poll();
            if !snapshot.is_running() {
                if followed {
                    writeln!(out)?;
                }
                return self.print_snapshot(&snapshot, out);
            }
            write!(out, "\r{}", progress_line(&snapshot))?;
            out.flush()?;
            followed = true;
            thread::sleep(self.watch_interval);
        }
    }

    fn export(&self, dir: &Path, out: &mut impl Write) -> io::Result<()> {
        let options = ExportOptions {
            exported_utc: chrono::Utc::now().to_rfc3339(),
            ..ExportOptions::default()
        };
        match self.orchestrator.export(dir, &options) {
            Ok(summary) => {
                writeln!(
                    out,
                    "exported {} file(s), {} bytes to {}",
                    summary.file_count,
                    summary.total_bytes,
                    summary.output_dir.display()
                )?;
                if let Some(manifest) = summary.manifest_path {
                    writeln!(out, "manifest: {}", manifest.display())?;
                }
                Ok(())
            }
            Err(err) => report(&err, out),
        }
    }

    fn print_snapshot(&self, snapshot: &JobSnapshot, out: &mut impl Write) -> io::Result<()> {
        match snapshot.status {
            JobStatus::Idle => writeln!(out, "idle"),
            JobStatus::Running => writeln!(out, "{}", progress_line(snapshot)),
            JobStatus::Completed => {
                writeln!(
                    out,
                    "job {}: completed, {} file(s) renamed",
                    snapshot.job_id,
                    snapshot.produced.len()
                )?;
                for (old, new) in self.started_from.iter().zip(&snapshot.produced) {
                    writeln!(out, "  {old} -> {new}")?;
                }
                Ok(())
            }
            JobStatus::Stopped => match &snapshot.failure_reason {
                Some(reason) => writeln!(
                    out,
                    "job {}: stopped after an error: {reason}; original names restored",
                    snapshot.job_id
                ),
                None => writeln!(
                    out,
                    "job {}: stopped; original names restored",
                    snapshot.job_id
                ),
            },
        }
    }

    fn shutdown(&self, out: &mut impl Write) -> io::Result<()> {
        if !self.orchestrator.poll().is_running() {
            return Ok(());
        }
        renamer_info!("Stopping the running job before exit");
        loop {
            match self.orchestrator.stop() {
                Ok(()) => break,
                Err(OrchestratorError::StopTimeout { waited }) => {
                    renamer_warn!("Job still running {:?} into exit; waiting", waited);
                    writeln!(out, "still stopping; waiting for the current file to finish")?;
                    out.flush()?;
                }
                Err(err) => return report(&err, out),
            }
        }
        writeln!(out, "running job stopped; original names restored")
    }
}

fn progress_line(snapshot: &JobSnapshot) -> String {
    let mut line = format!(
        "job {}: renaming files... {} of {} ({}%)",
        snapshot.job_id,
        snapshot.current,
        snapshot.total,
        snapshot.percent()
    );
    if snapshot.cancel_requested {
        line.push_str(" stopping");
    }
    line
}

fn prompt(out: &mut impl Write) -> io::Result<()> {
    write!(out, "> ")?;
    out.flush()
}

fn report(err: &OrchestratorError, out: &mut impl Write) -> io::Result<()> {
    writeln!(out, "error: {err}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use renamer_engine::{
        MemoryCredentialStore, MemoryStagingArea, NameRequest, Namer, NamerError,
        OrchestratorSettings, StagingArea,
    };

    use super::*;

    struct SuffixNamer;

    #[async_trait::async_trait]
    impl Namer for SuffixNamer {
        async fn generate_name(
            &self,
            _key: &ApiKey,
            request: &NameRequest<'_>,
        ) -> Result<String, NamerError> {
            Ok(format!("{}_renamed", request.base_name))
        }

        async fn verify_key(&self, key: &ApiKey) -> Result<KeyStatus, NamerError> {
            Ok(if key.expose() == "sk-good" {
                KeyStatus::Valid
            } else {
                KeyStatus::Invalid
            })
        }
    }

    /// Answers at once for `a`, slowly for everything else.
    struct SlowAfterFirst;

    #[async_trait::async_trait]
    impl Namer for SlowAfterFirst {
        async fn generate_name(
            &self,
            _key: &ApiKey,
            request: &NameRequest<'_>,
        ) -> Result<String, NamerError> {
            if request.base_name != "a" {
                tokio::time::sleep(Duration::from_millis(800)).await;
            }
            Ok(format!("{}_renamed", request.base_name))
        }

        async fn verify_key(&self, _key: &ApiKey) -> Result<KeyStatus, NamerError> {
            Ok(KeyStatus::Valid)
        }
    }

    fn console() -> Console {
        let orchestrator = Orchestrator::new(
            Arc::new(SuffixNamer),
            Arc::new(MemoryStagingArea::new()),
            Arc::new(MemoryCredentialStore::new()),
            OrchestratorSettings::default(),
        )
        .unwrap();
        Console::new(orchestrator, Duration::from_millis(10))
    }

    fn run_script(console: &mut Console, script: &str) -> String {
        let mut out = Vec::new();
        console.run(script.as_bytes(), &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn full_session_renames_and_exports() {
        let files = tempfile::tempdir().unwrap();
        let report = files.path().join("report.txt");
        let photo = files.path().join("photo.png");
        fs::write(&report, "quarterly numbers").unwrap();
        fs::write(&photo, "PNG!").unwrap();
        let export_dir = files.path().join("out");

        let script = format!(
            "add {} {}\nlist\nkey sk-good\nstart text\nwatch\nexport {}\nquit\n",
            report.display(),
            photo.display(),
            export_dir.display()
        );
        let output = run_script(&mut console(), &script);

        assert!(output.contains("staged report.txt (17 bytes)"), "{output}");
        assert!(output.contains("   1. report.txt"), "{output}");
        assert!(output.contains("API key verified and stored"), "{output}");
        assert!(output.contains("completed, 2 file(s) renamed"), "{output}");
        assert!(output.contains("report.txt -> report_renamed.txt"), "{output}");
        assert!(output.contains("photo.png -> photo_renamed.png"), "{output}");
        assert_eq!(
            fs::read_to_string(export_dir.join("report_renamed.txt")).unwrap(),
            "quarterly numbers"
        );
        assert!(export_dir.join("manifest.json").exists());
    }

    #[test]
    fn start_without_key_is_reported() {
        let files = tempfile::tempdir().unwrap();
        let path = files.path().join("a.txt");
        fs::write(&path, "a").unwrap();

        let script = format!("key sk-bad\nadd {}\nstart text\npoll\n", path.display());
        let output = run_script(&mut console(), &script);

        assert!(output.contains("API key rejected; nothing stored"), "{output}");
        assert!(
            output.contains("error: no verified API key is configured"),
            "{output}"
        );
        assert!(output.contains("idle"), "{output}");
    }

    #[test]
    fn bad_input_gets_a_message_and_the_loop_continues() {
        let output = run_script(&mut console(), "frobnicate\nadd /no/such/file.txt\nlist\n");

        assert!(output.contains("unknown command \"frobnicate\""), "{output}");
        assert!(output.contains("skipped /no/such/file.txt"), "{output}");
        assert!(output.contains("nothing staged"), "{output}");
    }

    #[test]
    fn quitting_waits_out_a_stop_timeout_and_restores_names() {
        let staging = Arc::new(MemoryStagingArea::with_files([
            ("a.txt", "1"),
            ("b.txt", "2"),
            ("c.txt", "3"),
        ]));
        let settings = OrchestratorSettings {
            stop_poll_interval: Duration::from_millis(20),
            stop_timeout: Duration::from_millis(100),
            ..OrchestratorSettings::default()
        };
        let orchestrator = Orchestrator::new(
            Arc::new(SlowAfterFirst),
            staging.clone(),
            Arc::new(MemoryCredentialStore::with_key(ApiKey::new("sk-test"))),
            settings,
        )
        .unwrap();
        let mut console = Console::new(orchestrator, Duration::from_millis(10));
        let mut out = Vec::new();

        console
            .execute(
                Command::Start {
                    mode: Mode::Text,
                    instructions: String::new(),
                },
                &mut out,
            )
            .unwrap();
        thread::sleep(Duration::from_millis(200));
        assert_eq!(
            staging.list_ids().unwrap(),
            ["a_renamed.txt", "b.txt", "c.txt"]
        );

        console.shutdown(&mut out).unwrap();
        let output = String::from_utf8(out).unwrap();

        assert!(output.contains("still stopping"), "{output}");
        assert!(output.contains("original names restored"), "{output}");
        assert_eq!(staging.list_ids().unwrap(), ["a.txt", "b.txt", "c.txt"]);
    }
}
