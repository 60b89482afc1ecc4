//! Interactive configuration session
//!
//! One cycle: refresh the record from the device, show it, run one command.
//! Errors inside a cycle are printed and end only the current command.

use std::io::{BufRead, Write};
use std::path::Path;

use colored::Colorize;
use errors::{Result, SlcError};
use slc_protocol::backup::{self, SizePolicy};
use slc_protocol::{ConfigurationRecord, ExchangeEngine, Transport};
use tracing::debug;

/// Backup prompt defaults
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupSettings {
    pub default_file: String,
    pub size_policy: SizePolicy,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            default_file: backup::DEFAULT_BACKUP_FILE.to_string(),
            size_policy: SizePolicy::default(),
        }
    }
}

/// One menu command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Edit field at this zero-based index
    Edit(usize),
    Display,
    Backup,
    Restore,
    Quit,
}

impl Command {
    /// Parse one input line; `None` for a blank line
    pub fn parse(line: &str, field_count: usize) -> Option<std::result::Result<Self, char>> {
        let c = line.trim().chars().next()?.to_ascii_uppercase();
        let command = match c {
            'D' => Self::Display,
            'B' => Self::Backup,
            'R' => Self::Restore,
            'Q' => Self::Quit,
            '1'..='9' => {
                let index = (c as usize) - ('1' as usize);
                if index >= field_count {
                    return Some(Err(c));
                }
                Self::Edit(index)
            },
            other => return Some(Err(other)),
        };
        Some(Ok(command))
    }
}

pub struct Session<T, R, W> {
    engine: ExchangeEngine,
    transport: T,
    record: ConfigurationRecord,
    backup: BackupSettings,
    input: R,
    output: W,
}

impl<T, R, W> Session<T, R, W>
where
    T: Transport,
    R: BufRead,
    W: Write,
{
    pub fn new(engine: ExchangeEngine, transport: T, backup: BackupSettings, input: R, output: W) -> Self {
        let record = ConfigurationRecord::new(engine.variant());
        Self {
            engine,
            transport,
            record,
            backup,
            input,
            output,
        }
    }

    pub fn record(&self) -> &ConfigurationRecord {
        &self.record
    }

    /// Run cycles until `Q` or end of input
    pub fn run(&mut self) -> Result<()> {
        loop {
            match self.engine.refresh(&mut self.transport) {
                Ok(record) => self.record = record,
                Err(e) => self.report(&e)?,
            }
            self.show_status()?;

            let Some(command) = self.read_command()? else {
                debug!("Input closed, leaving session");
                return Ok(());
            };
            match command {
                Command::Quit => return Ok(()),
                Command::Display => {},
                Command::Edit(index) => self.edit_field(index)?,
                Command::Backup => self.backup()?,
                Command::Restore => self.restore()?,
            }
        }
    }

    fn show_status(&mut self) -> Result<()> {
        writeln!(self.output)?;
        for (i, (spec, value)) in self.record.iter().enumerate() {
            writeln!(
                self.output,
                "{} - {:<28}[{}]",
                i + 1,
                spec.label,
                spec.kind.format_value(value)
            )?;
        }
        writeln!(self.output, "D - Display status")?;
        if self.engine.variant().supports_backup() {
            writeln!(self.output, "B - Backup")?;
            writeln!(self.output, "R - Restore")?;
        }
        writeln!(self.output, "Q - Quit")?;
        Ok(())
    }

    /// Prompt until a valid command arrives; `None` on end of input
    fn read_command(&mut self) -> Result<Option<Command>> {
        let field_count = self.record.len();
        write!(self.output, "\nCommand: ")?;
        loop {
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(None);
            };
            match Command::parse(&line, field_count) {
                None => continue,
                Some(Ok(Command::Backup | Command::Restore))
                    if !self.engine.variant().supports_backup() =>
                {
                    let err = SlcError::BackupUnsupported(self.engine.variant().to_string());
                    writeln!(self.output, "{}", err.to_string().yellow())?;
                },
                Some(Ok(command)) => return Ok(Some(command)),
                Some(Err(_)) => writeln!(self.output, "{}", "Invalid command".yellow())?,
            }
            write!(self.output, "\nCommand: ")?;
        }
    }

    fn edit_field(&mut self, index: usize) -> Result<()> {
        let Some(spec) = self.engine.variant().fields().get(index).copied() else {
            return self.report(&SlcError::FieldIndexOutOfRange {
                index,
                count: self.record.len(),
            });
        };
        let current = self.record.get(index).unwrap_or_default();
        write!(
            self.output,
            "{} [{}]: ",
            spec.label,
            spec.kind.format_value(current)
        )?;
        self.output.flush()?;
        let line = self.read_line()?.unwrap_or_default();

        let value = match spec.kind.parse_input(&line) {
            Ok(value) => value,
            Err(SlcError::MalformedFieldEdit(input)) => {
                debug!("Rejected input '{input}' for {}", spec.key);
                writeln!(self.output, "{}", "Not a number - ignored".yellow())?;
                return Ok(());
            },
            Err(e) => return self.report(&e),
        };

        match self.engine.apply_field_edit(&mut self.transport, index, value) {
            // Shown until the next refresh replaces it with the device's value
            Ok(()) => self.record.set(index, value),
            Err(e) => self.report(&e),
        }
    }

    fn backup(&mut self) -> Result<()> {
        let path = self.prompt_file_name()?;
        match backup::write_file(&path, &self.record) {
            Ok(()) => writeln!(
                self.output,
                "Configuration has been backed up to {path}\n"
            )?,
            Err(SlcError::Io(e)) => {
                writeln!(self.output, "{}", format!("Unable to write to file '{path}': {e}").red())?;
            },
            Err(e) => self.report(&e)?,
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<()> {
        let path = self.prompt_file_name()?;
        let blob = match backup::read_file(Path::new(&path)) {
            Ok(blob) => blob,
            Err(SlcError::Io(e)) => {
                writeln!(self.output, "{}", format!("Unable to read from file '{path}': {e}").red())?;
                return Ok(());
            },
            Err(e) => return self.report(&e),
        };

        writeln!(self.output, "Reading {} bytes...", blob.stated_len())?;
        let mut restored = self.record.clone();
        if let Err(e) = blob.restore_into(&mut restored, self.backup.size_policy) {
            return self.report(&e);
        }

        if !self.confirm("Confirm to upload (y/n) ")? {
            writeln!(self.output)?;
            return Ok(());
        }
        writeln!(self.output, "\nUploading...")?;
        match self.engine.upload_record(&mut self.transport, &restored) {
            Ok(()) => {
                self.record = restored;
                writeln!(self.output, "Configuration has been restored from {path}\n")?;
                Ok(())
            },
            Err(e) => self.report(&e),
        }
    }

    fn prompt_file_name(&mut self) -> Result<String> {
        write!(
            self.output,
            "Enter backup file name [{}]: ",
            self.backup.default_file
        )?;
        self.output.flush()?;
        let line = self.read_line()?.unwrap_or_default();
        let name = line.trim();
        Ok(if name.is_empty() {
            self.backup.default_file.clone()
        } else {
            name.to_string()
        })
    }

    /// Ask until `y` or `n`; end of input counts as `n`
    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        loop {
            write!(self.output, "{prompt}")?;
            self.output.flush()?;
            let Some(line) = self.read_line()? else {
                return Ok(false);
            };
            match line.trim().chars().next().map(|c| c.to_ascii_lowercase()) {
                Some('y') => return Ok(true),
                Some('n') => return Ok(false),
                _ => continue,
            }
        }
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }

    fn report(&mut self, err: &SlcError) -> Result<()> {
        debug!(code = err.error_code(), "{err}");
        writeln!(self.output, "{}", err.to_string().red())?;
        Ok(())
    }
}
