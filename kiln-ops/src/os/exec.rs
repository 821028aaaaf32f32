//! External process rule.

use crate::marks::FileNode;
use kiln_core::prelude::*;
use std::ffi::OsString;
use std::io::Read;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Lines of stderr kept in a failure message.
const STDERR_TAIL: usize = 5;

#[derive(Debug, Clone)]
enum Arg {
    Literal(OsString),
    Requisite(usize),
    Product(usize),
}

/// Runs a program whose argv names its requisite and product files.
///
/// Each requisite or product declared on the builder adds a slot and an
/// argv entry; when the rule applies, the entry becomes the path of the
/// [`FileNode`] bound to that slot. Products that are all newer than the
/// requisites make the rule skip.
///
/// ```ignore
/// let cc = Exec::builder("cc")
///     .arg("-c")
///     .requisite("src")
///     .arg("-o")
///     .product("obj")
///     .build()?;
/// ```
#[derive(Debug)]
pub struct Exec {
    id: EntityId,
    program: OsString,
    argv: Vec<Arg>,
    requisites: Schema,
    products: Schema,
}

impl Exec {
    /// Start declaring a rule that runs `program`.
    pub fn builder(program: impl Into<OsString>) -> ExecBuilder {
        ExecBuilder {
            program: program.into(),
            argv: Vec::new(),
            requisites: Vec::new(),
            products: Vec::new(),
        }
    }

    /// Name of the program run.
    pub fn program(&self) -> &OsString {
        &self.program
    }

    fn command(&self, requisites: &Storage, products: &Storage) -> Result<Command> {
        let mut command = Command::new(&self.program);
        for arg in &self.argv {
            match arg {
                Arg::Literal(value) => command.arg(value),
                Arg::Requisite(position) => command.arg(requisites.get_as::<FileNode>(*position)?.path()),
                Arg::Product(position) => command.arg(products.get_as::<FileNode>(*position)?.path()),
            };
        }
        command
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        Ok(command)
    }

    /// Whether every product is at least as fresh as the requisites.
    fn up_to_date(&self, action: &Action<'_>, products: &Storage) -> Result<bool> {
        if products.is_empty() || products.populated() < products.len() {
            return Ok(false);
        }
        for (_, mark) in products.marks() {
            // Reprobe, so a deleted product is not masked by its cached mtime.
            if action.is_stale(action.marks().reprobe(mark.as_ref())?.freshness) {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn products_freshness(&self, products: &Storage) -> Result<Freshness> {
        let mut latest = Freshness::MIN;
        for (_, mark) in products.marks() {
            latest = latest.max(mark.probe()?.freshness);
        }
        if latest.is_min() {
            latest = Freshness::now();
        }
        Ok(latest)
    }

    fn run(&self, action: &Action<'_>, requisites: &Storage, products: &Storage) -> Result<Outcome> {
        action.check_cancelled()?;
        if self.up_to_date(action, products)? {
            action.log().debug(LogCategory::Operator, "Products up to date");
            return Ok(Outcome::Skipped);
        }

        let name = self.program.to_string_lossy().into_owned();
        let mut command = self.command(requisites, products)?;
        tracing::debug!(
            schedule_id = %action.schedule_id(),
            vertex = %action.vertex(),
            command = ?command,
            "Spawning process"
        );
        action.log().log(
            LogEvent::info(LogCategory::Operator, "Spawning process")
                .with_field("command", format!("{:?}", command)),
        );

        let mut child = command
            .spawn()
            .map_err(|err| KilnError::io(&self.program, &err))?;
        let stderr = child.stderr.take();
        let reader = thread::spawn(move || {
            let mut buffer = String::new();
            if let Some(mut stderr) = stderr {
                let _ = stderr.read_to_string(&mut buffer);
            }
            buffer
        });

        // On error the reader is detached; it ends once the pipe closes.
        let status = wait(&mut child, action, &name)?;
        let stderr = reader.join().unwrap_or_default();

        if !status.success() {
            return Err(KilnError::operator(&name, failure_message(status, &stderr)));
        }
        Ok(Outcome::Updated(self.products_freshness(products)?))
    }
}

/// Poll `child` until it exits, killing it if the run is aborted.
fn wait(child: &mut Child, action: &Action<'_>, name: &str) -> Result<ExitStatus> {
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(err) => {
                stop(child);
                return Err(KilnError::operator(name, err));
            }
        }
        if action.is_cancelled() {
            tracing::warn!(vertex = %action.vertex(), program = name, "Killing process after abort");
            stop(child);
            return Err(KilnError::Cancelled);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kill `child` and reap it.
fn stop(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn failure_message(status: ExitStatus, stderr: &str) -> String {
    let lines: Vec<&str> = stderr.lines().filter(|l| !l.trim().is_empty()).collect();
    let tail = lines[lines.len().saturating_sub(STDERR_TAIL)..].join("; ");
    if tail.is_empty() {
        format!("exited with {}", status)
    } else {
        format!("exited with {}: {}", status, tail)
    }
}

impl Operator for Exec {
    fn id(&self) -> EntityId {
        self.id
    }

    fn info(&self) -> OperatorInfo {
        OperatorInfo::new("os", "exec")
            .with_description(format!("Run {}", self.program.to_string_lossy()))
    }

    fn requisite_schema(&self) -> Schema {
        self.requisites.clone()
    }

    fn product_schema(&self) -> Schema {
        self.products.clone()
    }

    fn apply(&self, action: &Action<'_>, requisites: &Storage, products: &mut Storage) -> Outcome {
        match self.run(action, requisites, products) {
            Ok(outcome) => outcome,
            Err(err) => Outcome::Failed(err),
        }
    }
}

/// Builder for [`Exec`].
#[derive(Debug)]
pub struct ExecBuilder {
    program: OsString,
    argv: Vec<Arg>,
    requisites: Vec<Option<String>>,
    products: Vec<Option<String>>,
}

impl ExecBuilder {
    /// Append a literal argument.
    pub fn arg(mut self, value: impl Into<OsString>) -> Self {
        self.argv.push(Arg::Literal(value.into()));
        self
    }

    /// Append a named requisite argument.
    pub fn requisite(mut self, name: impl Into<String>) -> Self {
        self.argv.push(Arg::Requisite(self.requisites.len()));
        self.requisites.push(Some(name.into()));
        self
    }

    /// Append an unnamed requisite argument.
    pub fn positional_requisite(mut self) -> Self {
        self.argv.push(Arg::Requisite(self.requisites.len()));
        self.requisites.push(None);
        self
    }

    /// Append a named product argument.
    pub fn product(mut self, name: impl Into<String>) -> Self {
        self.argv.push(Arg::Product(self.products.len()));
        self.products.push(Some(name.into()));
        self
    }

    /// Append an unnamed product argument.
    pub fn positional_product(mut self) -> Self {
        self.argv.push(Arg::Product(self.products.len()));
        self.products.push(None);
        self
    }

    /// Build the rule, failing on duplicate slot names.
    pub fn build(self) -> Result<Exec> {
        Ok(Exec {
            id: EntityId::new(),
            program: self.program,
            argv: self.argv,
            requisites: schema_of(self.requisites)?,
            products: schema_of(self.products)?,
        })
    }
}

fn schema_of(slots: Vec<Option<String>>) -> Result<Schema> {
    let mut builder = Schema::builder().positional_count(slots.len());
    for (position, name) in slots.into_iter().enumerate() {
        if let Some(name) = name {
            builder = builder.named(name, position);
        }
    }
    builder.build()
}
