use crate::engine::SpaEngine;
use crate::transport::Link;
use tracing::warn;

fn runtime() -> Result<tokio::runtime::Runtime, std::io::Error> {
    tokio::runtime::Builder::new_current_thread().enable_all().build()
}

/// Poll once so that writes are checked against what the controller currently reports.
///
/// Writes still go ahead without it; they are validated against whatever is known.
async fn prime<S: Link>(engine: &mut SpaEngine<S>) {
    if let Err(e) = engine.poll().await {
        warn!(
            message = "could not read the current state before writing",
            error = (&e as &dyn std::error::Error)
        );
    }
}

pub mod properties {
    use crate::mapper::{FIELDS, PUMP_INSTALL, PUMP_OK, PUMP_STATE, SPA_TIME, SPA_TIME_FIELDS};
    use crate::output;
    use crate::properties::{PUMP_COUNT, SpaProperties};
    use crate::property::Field;
    use crate::schema::{Firmware, Register};

    /// Search and output the properties the controller reports.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        output: output::Args,
        /// Only list properties whose name or description contains this text.
        filter: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not output the property list")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    pub struct PropertySchema {
        pub register: Register,
        pub offset: usize,
        pub name: String,
        pub kind: &'static str,
        /// Write command, for writable properties.
        pub command: Option<&'static str>,
        pub accepts: Option<String>,
        pub labels: Vec<&'static str>,
        pub firmware: Option<Firmware>,
        pub description: String,
    }

    impl PropertySchema {
        fn from_field(
            register: Register,
            offset: usize,
            name: String,
            field: &dyn Field,
            firmware: Option<Firmware>,
            description: String,
        ) -> Self {
            let command = field.command();
            Self {
                register,
                offset,
                name,
                kind: field.kind(),
                command: command.map(|c| c.code()),
                accepts: command.map(|c| c.constraint().to_string()),
                labels: field.label_names(),
                firmware,
                description,
            }
        }

        pub fn all(properties: &SpaProperties) -> Vec<Self> {
            let mut all: Vec<_> = FIELDS
                .iter()
                .map(|entry| {
                    Self::from_field(
                        entry.register,
                        entry.offset,
                        entry.name.to_string(),
                        (entry.view)(properties),
                        entry.only,
                        entry.description.to_string(),
                    )
                })
                .collect();
            all.push(Self {
                register: Register::R2,
                offset: SPA_TIME_FIELDS[0],
                name: SPA_TIME.to_string(),
                kind: "datetime",
                command: Some("S01"),
                accepts: Some("a date and time".to_string()),
                labels: vec![],
                firmware: None,
                description: "Spa clock; set with the `clock` command".to_string(),
            });
            for (index, pump) in properties.pumps().iter().enumerate() {
                let number = pump.number();
                all.push(Self::from_field(
                    PUMP_STATE.0,
                    PUMP_STATE.1 + index,
                    format!("Pump{number}State"),
                    &pump.state,
                    None,
                    format!("Pump {number} run state; set with the `pump` command"),
                ));
                all.push(Self::from_field(
                    PUMP_OK.0,
                    PUMP_OK.1 + index,
                    format!("Pump{number}OkToRun"),
                    &pump.ok_to_run,
                    Some(Firmware::Current),
                    format!("Pump {number} is allowed to run"),
                ));
                all.push(Self::from_field(
                    PUMP_INSTALL.0,
                    PUMP_INSTALL.1 + index,
                    format!("Pump{number}InstallState"),
                    &pump.install_state,
                    Some(Firmware::Current),
                    format!("Pump {number} install state and supported run states"),
                ));
            }
            debug_assert_eq!(all.len(), FIELDS.len() + 1 + 3 * PUMP_COUNT);
            all.sort_by_key(|p| (p.register, p.offset));
            all
        }

        pub fn is_match(&self, pattern: &str) -> bool {
            let pattern = pattern.to_uppercase();
            self.name.to_uppercase().contains(&pattern)
                || self.description.to_uppercase().contains(&pattern)
                || self.command.is_some_and(|c| c.contains(&pattern))
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let mut output = args.output.to_output().map_err(Error::Output)?;
        output
            .table_headers(vec![
                "Register",
                "Offset",
                "Name",
                "Type",
                "Command",
                "Accepts",
                "Labels",
                "Firmware",
                "Description",
            ])
            .map_err(Error::Output)?;
        let properties = SpaProperties::new();
        for property in PropertySchema::all(&properties) {
            if let Some(pattern) = &args.filter {
                if !property.is_match(pattern) {
                    continue;
                }
            }
            output
                .result(
                    || {
                        vec![
                            property.register.to_string(),
                            property.offset.to_string(),
                            property.name.clone(),
                            property.kind.to_string(),
                            property.command.unwrap_or_default().to_string(),
                            property.accepts.clone().unwrap_or_default(),
                            property.labels.join(", "),
                            property.firmware.map(<&str>::from).unwrap_or_default().to_string(),
                            property.description.clone(),
                        ]
                    },
                    || &property,
                )
                .map_err(Error::Output)?;
        }
        output.commit().map_err(Error::Output)
    }

}

pub mod read {
    use crate::connection;
    use crate::engine::{PollError, SpaEngine};
    use crate::output;
    use std::io::Write as _;

    /// Request the full status from the controller once and output every value.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
        /// Print the response exactly as received instead of the decoded values.
        ///
        /// The response is printed even if it fails to parse.
        #[arg(long)]
        raw: bool,
        /// Only output properties whose name contains this text.
        filter: Option<String>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the controller")]
        Connect(#[source] connection::Error),
        #[error("could not read the controller status")]
        Poll(#[source] PollError),
        #[error("could not write data to the terminal")]
        WriteStdout(#[source] std::io::Error),
        #[error("could not output the values")]
        Output(#[source] output::Error),
    }

    #[derive(serde::Serialize)]
    struct Value<'a> {
        name: &'a str,
        value: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        label: Option<&'a str>,
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let io = args.connection.open().await.map_err(Error::Connect)?;
            let mut engine = SpaEngine::new(io, args.connection.settings());
            let result = engine.poll().await;
            if args.raw {
                let mut stdout = std::io::stdout().lock();
                stdout.write_all(engine.last_response().as_bytes()).map_err(Error::WriteStdout)?;
                stdout.flush().map_err(Error::WriteStdout)?;
                return result.map_err(Error::Poll);
            }
            result.map_err(Error::Poll)?;

            let snapshot = engine.properties().snapshot();
            let mut values: Vec<(String, String, Option<&str>)> = snapshot
                .properties
                .iter()
                .map(|(name, p)| (name.to_string(), p.value.clone(), p.label))
                .collect();
            if let Some(time) = &snapshot.spa_time {
                values.push((crate::mapper::SPA_TIME.to_string(), time.clone(), None));
            }
            for pump in &snapshot.pumps {
                if let Some(state) = pump.state {
                    values.push((format!("Pump{}State", pump.number), state.to_string(), None));
                }
                if let Some(ok) = pump.ok_to_run {
                    let name = format!("Pump{}OkToRun", pump.number);
                    values.push((name, u8::from(ok).to_string(), None));
                }
                if let Some(install) = &pump.install {
                    let installed = if install.installed { "installed" } else { "not installed" };
                    let states: String = install.states.iter().map(u8::to_string).collect();
                    let value =
                        format!("{}-{}-{states}", u8::from(install.installed), install.speed_type);
                    let name = format!("Pump{}InstallState", pump.number);
                    values.push((name, value, Some(installed)));
                }
            }

            let mut output = args.output.to_output().map_err(Error::Output)?;
            output.table_headers(vec!["Name", "Value", "Label"]).map_err(Error::Output)?;
            for (name, value, label) in &values {
                if let Some(pattern) = &args.filter {
                    if !name.to_uppercase().contains(&pattern.to_uppercase()) {
                        continue;
                    }
                }
                output
                    .result(
                        || vec![name.clone(), value.clone(), label.unwrap_or_default().to_string()],
                        || Value { name, value, label: *label },
                    )
                    .map_err(Error::Output)?;
            }
            output.commit().map_err(Error::Output)
        })
    }
}

pub mod set {
    use crate::connection;
    use crate::engine::SpaEngine;
    use crate::property::WriteError;

    /// Write a single property, given its name and either a value or a label.
    ///
    /// See `properties` for the names, the values they accept and their labels.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        name: String,
        value: String,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the controller")]
        Connect(#[source] connection::Error),
        #[error("could not set {1} to `{2}`")]
        Write(#[source] WriteError, String, String),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let io = args.connection.open().await.map_err(Error::Connect)?;
            let mut engine = SpaEngine::new(io, args.connection.settings());
            super::prime(&mut engine).await;
            engine
                .set_by_name(&args.name, &args.value)
                .await
                .map_err(|e| Error::Write(e, args.name.clone(), args.value.clone()))?;
            let field = engine.properties().field(&args.name);
            let value = field.and_then(|f| f.display()).unwrap_or_default();
            match field.and_then(|f| f.label()) {
                Some(label) => println!("{} = {value} ({label})", args.name),
                None => println!("{} = {value}", args.name),
            }
            Ok(())
        })
    }
}

pub mod pump {
    use crate::connection;
    use crate::engine::SpaEngine;
    use crate::property::WriteError;

    /// Switch a pump to a run state.
    ///
    /// States are 0 (off), 1 (on), 2 (low), 3 (high) and 4 (auto); the pump's install state
    /// decides which of them it supports.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        /// Pump number, 1 to 5.
        pump: usize,
        state: i32,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the controller")]
        Connect(#[source] connection::Error),
        #[error("could not switch pump {1} to state {2}")]
        Write(#[source] WriteError, usize, i32),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let io = args.connection.open().await.map_err(Error::Connect)?;
            let mut engine = SpaEngine::new(io, args.connection.settings());
            super::prime(&mut engine).await;
            engine
                .set_pump(args.pump, args.state)
                .await
                .map_err(|e| Error::Write(e, args.pump, args.state))?;
            println!("Pump{}State = {}", args.pump, args.state);
            Ok(())
        })
    }
}

pub mod clock {
    use crate::connection;
    use crate::engine::SpaEngine;
    use crate::property::WriteError;

    /// Set the spa clock.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        /// Date and time to set, e.g. `2024-06-01T18:30`. Defaults to the local time.
        time: Option<jiff::civil::DateTime>,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the controller")]
        Connect(#[source] connection::Error),
        #[error("could not set the spa clock to {1}")]
        Write(#[source] WriteError, jiff::civil::DateTime),
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let time = args.time.unwrap_or_else(|| jiff::Zoned::now().datetime());
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let io = args.connection.open().await.map_err(Error::Connect)?;
            let mut engine = SpaEngine::new(io, args.connection.settings());
            engine.set_spa_time(time).await.map_err(|e| Error::Write(e, time))?;
            println!("{} = {}", crate::mapper::SPA_TIME, time.strftime("%Y-%m-%d %H:%M"));
            Ok(())
        })
    }
}

pub mod monitor {
    use crate::connection;
    use crate::engine::{SpaEngine, SpaEvent, SpaHandle};
    use crate::output;
    use tokio_stream::StreamExt as _;
    use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
    use tracing::{debug, info, warn};

    /// Keep polling the controller and output changes as they happen, until interrupted.
    ///
    /// Events are written as JSON lines unless CSV is requested.
    #[derive(clap::Parser)]
    pub struct Args {
        #[clap(flatten)]
        connection: connection::Args,
        #[clap(flatten)]
        output: output::Args,
    }

    #[derive(thiserror::Error, Debug)]
    pub enum Error {
        #[error("could not start the async runtime")]
        Runtime(#[source] std::io::Error),
        #[error("could not connect to the controller")]
        Connect(#[source] connection::Error),
        #[error("could not wait for the interrupt signal")]
        Signal(#[source] std::io::Error),
        #[error("could not output the events")]
        Output(#[source] output::Error),
    }

    fn row(event: &SpaEvent) -> Vec<String> {
        match event {
            SpaEvent::PropertyChanged { name, value } => {
                vec!["changed".to_string(), name.to_string(), value.clone()]
            }
            SpaEvent::PumpChanged { pump, state } => vec![
                "pump".to_string(),
                format!("Pump{pump}State"),
                state.map(|s| s.to_string()).unwrap_or_default(),
            ],
            SpaEvent::StateUpdated => vec!["updated".to_string(), String::new(), String::new()],
            SpaEvent::PollFailed { error } => {
                vec!["poll failed".to_string(), String::new(), error.clone()]
            }
        }
    }

    pub fn run(args: Args) -> Result<(), Error> {
        let runtime = super::runtime().map_err(Error::Runtime)?;
        runtime.block_on(async {
            let io = args.connection.open().await.map_err(Error::Connect)?;
            let handle = SpaHandle::spawn(SpaEngine::new(io, args.connection.settings()));
            let mut events = handle.events();
            let output_args = args.output.streaming();
            debug!(message = "writing events", format = ?output_args.format());
            let mut output = output_args.to_output().map_err(Error::Output)?;
            output.table_headers(vec!["Event", "Name", "Value"]).map_err(Error::Output)?;
            loop {
                tokio::select! {
                    signal = tokio::signal::ctrl_c() => {
                        signal.map_err(Error::Signal)?;
                        info!("interrupted, stopping");
                        break;
                    }
                    event = events.next() => match event {
                        None => break,
                        Some(Ok(event)) => {
                            output.result(|| row(&event), || &event).map_err(Error::Output)?;
                            output.flush().map_err(Error::Output)?;
                        }
                        Some(Err(BroadcastStreamRecvError::Lagged(count))) => {
                            warn!(message = "output fell behind, events were lost", count);
                        }
                    }
                }
            }
            output.commit().map_err(Error::Output)
        })
    }
}
