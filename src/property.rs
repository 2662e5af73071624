use crate::transport::{self, CommandLink};
use tracing::{debug, warn};

pub type Converter<T> = fn(&str) -> Result<T, ConversionError>;
pub type Label<T> = (&'static str, T);
pub type ChangeCallback<T> = Box<dyn FnMut(&T) + Send>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    #[error("`{0}` is not an integer")]
    Integer(String),
    #[error("`{0}` is not a boolean (expected 0 or 1)")]
    Boolean(String),
    #[error("`{0}` is not a tri-state value (expected 0 to 2)")]
    TriState(String),
    #[error("`{0}` is not a known spa mode")]
    Mode(String),
    #[error("`{0}` is not a pump install state")]
    InstallState(String),
    #[error("{0} do not form a valid date and time")]
    DateTime(String),
    #[error("the property is not updated from a single raw field")]
    NoConverter,
}

#[derive(thiserror::Error, Debug)]
pub enum WriteError {
    #[error("`{value}` is not accepted by this property (accepts {constraint})")]
    Invalid { value: String, constraint: Constraint },
    #[error("`{0}` is not a known label for this property")]
    UnknownLabel(String),
    #[error("`{0}` is not a value this property can hold")]
    Unparseable(String, #[source] ConversionError),
    #[error("the controller did not confirm `{command}` with `{expected}`")]
    Verification { command: String, expected: String },
    #[error("could not exchange the write command with the controller")]
    Transport(#[source] transport::Error),
    #[error("`{0}` flips the current state, which is not known yet")]
    StateUnknown(&'static str),
    #[error("there is no writable property named `{0}`")]
    NoSuchProperty(String),
    #[error("there is no pump {0}")]
    NoSuchPump(usize),
    #[error("pump {pump} does not support state {state} (supported: {supported:?})")]
    PumpStateUnsupported { pump: usize, state: i32, supported: Vec<u8> },
}

/// Strict converters from raw frame fields.
pub mod convert {
    use super::ConversionError;
    use crate::properties::SpaMode;

    /// An optional minus sign followed by decimal digits, nothing else.
    pub fn int(raw: &str) -> Result<i32, ConversionError> {
        let digits = raw.strip_prefix('-').unwrap_or(raw);
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ConversionError::Integer(raw.to_string()));
        }
        raw.parse().map_err(|_| ConversionError::Integer(raw.to_string()))
    }

    pub fn flag(raw: &str) -> Result<bool, ConversionError> {
        match raw {
            "0" => Ok(false),
            "1" => Ok(true),
            _ => Err(ConversionError::Boolean(raw.to_string())),
        }
    }

    pub fn tri_state(raw: &str) -> Result<i32, ConversionError> {
        match raw {
            "0" => Ok(0),
            "1" => Ok(1),
            "2" => Ok(2),
            _ => Err(ConversionError::TriState(raw.to_string())),
        }
    }

    pub fn text(raw: &str) -> Result<String, ConversionError> {
        Ok(raw.to_string())
    }

    pub fn mode(raw: &str) -> Result<SpaMode, ConversionError> {
        raw.parse().map_err(|_| ConversionError::Mode(raw.to_string()))
    }
}

/// Values that can live in a property cell.
pub trait FieldValue: Clone + PartialEq + Send + Sync + 'static {
    const KIND: &'static str;

    /// Textual form accepted back by the converters of this type.
    fn to_field(&self) -> String;

    /// Form used in write commands.
    fn to_wire(&self) -> String {
        self.to_field()
    }

    /// Check `self` against a write constraint, possibly normalizing it.
    fn constrain(self, constraint: &Constraint, labels: &[Label<Self>]) -> Option<Self> {
        match constraint {
            Constraint::Any => Some(self),
            Constraint::Labelled => labels.iter().any(|(_, v)| *v == self).then_some(self),
            _ => None,
        }
    }
}

impl FieldValue for i32 {
    const KIND: &'static str = "integer";

    fn to_field(&self) -> String {
        self.to_string()
    }

    fn constrain(self, constraint: &Constraint, labels: &[Label<Self>]) -> Option<Self> {
        match *constraint {
            Constraint::Any => Some(self),
            Constraint::Range { min, max, step } => {
                if !(min..=max).contains(&self) {
                    return None;
                }
                let remainder = self.rem_euclid(step);
                let value = if remainder == 0 { self } else { self + step - remainder };
                (value <= max).then_some(value)
            }
            Constraint::OneOf(values) => values.contains(&self).then_some(self),
            Constraint::TimeOfDay => {
                let (hour, minute) = (self / 256, self % 256);
                (self >= 0 && hour < 24 && minute < 60).then_some(self)
            }
            Constraint::Labelled => labels.iter().any(|(_, v)| *v == self).then_some(self),
        }
    }
}

impl FieldValue for bool {
    const KIND: &'static str = "boolean";

    fn to_field(&self) -> String {
        if *self { "1" } else { "0" }.to_string()
    }
}

impl FieldValue for String {
    const KIND: &'static str = "string";

    fn to_field(&self) -> String {
        self.clone()
    }
}

impl FieldValue for jiff::civil::DateTime {
    const KIND: &'static str = "datetime";

    fn to_field(&self) -> String {
        self.strftime("%Y-%m-%d %H:%M:%S").to_string()
    }
}

/// What a writable property accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Constraint {
    Any,
    /// Inclusive range. Values off the `step` grid are rounded up onto it.
    Range { min: i32, max: i32, step: i32 },
    OneOf(&'static [i32]),
    /// `hour * 256 + minute`.
    TimeOfDay,
    /// Only the values listed in the label map.
    Labelled,
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Constraint::Any => f.write_str("any value"),
            Constraint::Range { min, max, step: 1 } => write!(f, "{min}..={max}"),
            Constraint::Range { min, max, step } => write!(f, "{min}..={max} in steps of {step}"),
            Constraint::OneOf(values) => write!(f, "one of {values:?}"),
            Constraint::TimeOfDay => f.write_str("hour*256+minute"),
            Constraint::Labelled => f.write_str("labelled values"),
        }
    }
}

/// How the controller acknowledges a write.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Echo {
    /// `<CODE>-OK`
    CodeOk,
    /// The value that was written.
    Value,
    /// The value that was written, followed by a fixed suffix.
    ValueThen(&'static str),
    Literal(&'static str),
}

#[derive(Clone, Copy, Debug)]
pub struct WriteCommand {
    code: &'static str,
    echo: Echo,
    toggle: bool,
    constraint: Constraint,
}

pub const fn write(code: &'static str, echo: Echo) -> WriteCommand {
    WriteCommand { code, echo, toggle: false, constraint: Constraint::Any }
}

impl WriteCommand {
    pub const fn range(mut self, min: i32, max: i32) -> Self {
        self.constraint = Constraint::Range { min, max, step: 1 };
        self
    }

    pub const fn step(mut self, step: i32) -> Self {
        if let Constraint::Range { min, max, .. } = self.constraint {
            self.constraint = Constraint::Range { min, max, step };
        }
        self
    }

    pub const fn one_of(mut self, values: &'static [i32]) -> Self {
        self.constraint = Constraint::OneOf(values);
        self
    }

    pub const fn time_of_day(mut self) -> Self {
        self.constraint = Constraint::TimeOfDay;
        self
    }

    pub const fn labelled(mut self) -> Self {
        self.constraint = Constraint::Labelled;
        self
    }

    /// The command carries no value and flips the current state.
    pub const fn toggle(mut self) -> Self {
        self.toggle = true;
        self
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn constraint(&self) -> &Constraint {
        &self.constraint
    }

    /// Command text and the exact confirmation expected for writing `wire`.
    pub fn render(&self, wire: &str) -> (String, String) {
        let command =
            if self.toggle { self.code.to_string() } else { format!("{}:{wire}", self.code) };
        let expected = match self.echo {
            Echo::CodeOk => format!("{}-OK", self.code),
            Echo::Value => wire.to_string(),
            Echo::ValueThen(suffix) => format!("{wire}{suffix}"),
            Echo::Literal(literal) => literal.to_string(),
        };
        (command, expected)
    }
}

/// A write that passed validation and awaits confirmation from the controller.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedWrite<T> {
    pub command: String,
    pub expected: String,
    pub value: T,
}

/// Send a planned write and fail unless the controller echoes exactly what was expected.
pub async fn confirm<L: CommandLink, T>(
    link: &mut L,
    planned: &PlannedWrite<T>,
) -> Result<(), WriteError> {
    let confirmed = link
        .send_and_verify(&planned.command, &planned.expected)
        .await
        .map_err(WriteError::Transport)?;
    if confirmed {
        Ok(())
    } else {
        Err(WriteError::Verification {
            command: planned.command.clone(),
            expected: planned.expected.clone(),
        })
    }
}

/// A cached value populated from the status frame.
pub struct RoProperty<T: 'static> {
    value: Option<T>,
    convert: Option<Converter<T>>,
    labels: &'static [Label<T>],
    on_change: Option<ChangeCallback<T>>,
}

impl<T: FieldValue> RoProperty<T> {
    pub fn new(convert: Converter<T>) -> Self {
        Self { value: None, convert: Some(convert), labels: &[], on_change: None }
    }

    /// A property assembled from several fields by the caller.
    pub fn composite() -> Self {
        Self { value: None, convert: None, labels: &[], on_change: None }
    }

    pub fn labels(mut self, labels: &'static [Label<T>]) -> Self {
        self.labels = labels;
        self
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn has_value(&self) -> bool {
        self.value.is_some()
    }

    /// Label of the current value, if the property has a label map and the value is in it.
    pub fn label(&self) -> Option<&'static str> {
        let value = self.value.as_ref()?;
        self.labels.iter().find(|(_, v)| v == value).map(|(l, _)| *l)
    }

    pub fn label_map(&self) -> &'static [Label<T>] {
        self.labels
    }

    pub fn on_change(&mut self, callback: impl FnMut(&T) + Send + 'static) {
        self.on_change = Some(Box::new(callback));
    }

    pub fn clear_on_change(&mut self) {
        self.on_change = None;
    }

    /// Convert and store a raw field.
    ///
    /// Returns whether the cached value changed. A value that fails conversion leaves the
    /// cache untouched.
    pub fn update(&mut self, raw: &str) -> Result<bool, ConversionError> {
        let convert = self.convert.ok_or(ConversionError::NoConverter)?;
        let value = convert(raw)?;
        Ok(self.replace(value))
    }

    /// Store an already typed value. The first value ever stored counts as a change.
    pub fn replace(&mut self, value: T) -> bool {
        if self.value.as_ref() == Some(&value) {
            return false;
        }
        if let Some(callback) = &mut self.on_change {
            callback(&value);
        }
        self.value = Some(value);
        true
    }

    fn parse_input(&self, input: &str) -> Result<T, WriteError> {
        if let Some((_, value)) = self.labels.iter().find(|(label, _)| *label == input) {
            return Ok(value.clone());
        }
        let convert = self.convert.ok_or(WriteError::NoSuchProperty(input.to_string()))?;
        convert(input).map_err(|e| {
            if self.labels.is_empty() {
                WriteError::Unparseable(input.to_string(), e)
            } else {
                WriteError::UnknownLabel(input.to_string())
            }
        })
    }
}

/// A cached value that can also be written to the controller.
pub struct RwProperty<T: 'static> {
    cell: RoProperty<T>,
    command: WriteCommand,
}

impl<T: 'static> std::ops::Deref for RwProperty<T> {
    type Target = RoProperty<T>;
    fn deref(&self) -> &RoProperty<T> {
        &self.cell
    }
}

impl<T: 'static> std::ops::DerefMut for RwProperty<T> {
    fn deref_mut(&mut self) -> &mut RoProperty<T> {
        &mut self.cell
    }
}

impl<T: FieldValue> RwProperty<T> {
    pub fn new(convert: Converter<T>, command: WriteCommand) -> Self {
        Self { cell: RoProperty::new(convert), command }
    }

    pub fn labels(mut self, labels: &'static [Label<T>]) -> Self {
        self.cell.labels = labels;
        self
    }

    pub fn command(&self) -> &WriteCommand {
        &self.command
    }

    /// Validate `value` and work out the exchange that would write it.
    ///
    /// `None` means the value, once normalized, is already cached and nothing needs to be sent.
    /// A toggle can only be planned once the current state is known.
    pub fn plan(&self, value: T) -> Result<Option<PlannedWrite<T>>, WriteError> {
        if self.cell.get() == Some(&value) {
            return Ok(None);
        }
        let constraint = self.command.constraint;
        let value = value
            .clone()
            .constrain(&constraint, self.cell.labels)
            .ok_or_else(|| WriteError::Invalid { value: value.to_field(), constraint })?;
        if self.cell.get() == Some(&value) {
            return Ok(None);
        }
        if self.command.toggle && !self.cell.has_value() {
            return Err(WriteError::StateUnknown(self.command.code));
        }
        let (command, expected) = self.command.render(&value.to_wire());
        Ok(Some(PlannedWrite { command, expected, value }))
    }

    /// Write `value` and cache it once the controller confirms.
    pub async fn set<L: CommandLink>(&mut self, value: T, link: &mut L) -> Result<(), WriteError> {
        let Some(planned) = self.plan(value)? else {
            debug!(message = "value already cached, not writing", code = self.command.code);
            return Ok(());
        };
        if let Err(e) = confirm(link, &planned).await {
            warn!(
                message = "write was not confirmed",
                command = %planned.command,
                error = (&e as &dyn std::error::Error)
            );
            return Err(e);
        }
        self.cell.replace(planned.value);
        Ok(())
    }

    /// Write the value a label maps to.
    pub async fn set_label<L: CommandLink>(
        &mut self,
        label: &str,
        link: &mut L,
    ) -> Result<(), WriteError> {
        let value = self
            .cell
            .labels
            .iter()
            .find(|(l, _)| *l == label)
            .map(|(_, v)| v.clone())
            .ok_or_else(|| WriteError::UnknownLabel(label.to_string()))?;
        self.set(value, link).await
    }
}

/// Object safe view of a property, used by the field table and by name based access.
pub trait Field: Send {
    fn apply(&mut self, raw: &str) -> Result<bool, ConversionError>;
    fn display(&self) -> Option<String>;
    fn label(&self) -> Option<&'static str>;
    /// Every label the property knows about, in table order.
    fn label_names(&self) -> Vec<&'static str>;
    fn kind(&self) -> &'static str;
    fn command(&self) -> Option<&WriteCommand>;
    fn as_writable(&mut self) -> Option<&mut dyn WritableField>;
}

/// Name based writes: values arrive as text (a label or the value itself).
pub trait WritableField: Send {
    fn plan_text(&self, input: &str) -> Result<Option<PlannedWrite<String>>, WriteError>;
    /// Cache a write previously planned by [`Self::plan_text`] and confirmed by the controller.
    fn commit_text(&mut self, planned: &PlannedWrite<String>) -> Result<bool, ConversionError>;
}

impl<T: FieldValue> Field for RoProperty<T> {
    fn apply(&mut self, raw: &str) -> Result<bool, ConversionError> {
        self.update(raw)
    }
    fn display(&self) -> Option<String> {
        self.get().map(FieldValue::to_field)
    }
    fn label(&self) -> Option<&'static str> {
        RoProperty::label(self)
    }
    fn label_names(&self) -> Vec<&'static str> {
        self.labels.iter().map(|(label, _)| *label).collect()
    }
    fn kind(&self) -> &'static str {
        T::KIND
    }
    fn command(&self) -> Option<&WriteCommand> {
        None
    }
    fn as_writable(&mut self) -> Option<&mut dyn WritableField> {
        None
    }
}

impl<T: FieldValue> Field for RwProperty<T> {
    fn apply(&mut self, raw: &str) -> Result<bool, ConversionError> {
        self.cell.update(raw)
    }
    fn display(&self) -> Option<String> {
        self.cell.get().map(FieldValue::to_field)
    }
    fn label(&self) -> Option<&'static str> {
        self.cell.label()
    }
    fn label_names(&self) -> Vec<&'static str> {
        self.cell.label_names()
    }
    fn kind(&self) -> &'static str {
        T::KIND
    }
    fn command(&self) -> Option<&WriteCommand> {
        Some(&self.command)
    }
    fn as_writable(&mut self) -> Option<&mut dyn WritableField> {
        Some(self)
    }
}

impl<T: FieldValue> WritableField for RwProperty<T> {
    fn plan_text(&self, input: &str) -> Result<Option<PlannedWrite<String>>, WriteError> {
        let value = self.cell.parse_input(input)?;
        Ok(self.plan(value)?.map(|p| PlannedWrite {
            command: p.command,
            expected: p.expected,
            value: p.value.to_field(),
        }))
    }

    fn commit_text(&mut self, planned: &PlannedWrite<String>) -> Result<bool, ConversionError> {
        self.cell.update(&planned.value)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::convert::*;
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Replies to every command with the next scripted line.
    #[derive(Default)]
    pub(crate) struct ScriptedLink {
        pub replies: VecDeque<String>,
        pub sent: Vec<String>,
    }

    impl ScriptedLink {
        pub fn replying(replies: &[&str]) -> Self {
            Self { replies: replies.iter().map(|r| r.to_string()).collect(), sent: vec![] }
        }
    }

    impl CommandLink for ScriptedLink {
        fn send_and_verify(
            &mut self,
            command: &str,
            expected: &str,
        ) -> impl Future<Output = Result<bool, transport::Error>> + Send {
            self.sent.push(command.to_string());
            let reply = self.replies.pop_front().unwrap_or_default();
            let confirmed = reply == expected;
            async move { Ok(confirmed) }
        }
    }

    #[test]
    fn integer_conversion_is_strict() {
        assert_eq!(int("42"), Ok(42));
        assert_eq!(int("-7"), Ok(-7));
        assert_eq!(int("0"), Ok(0));
        for bad in ["", "-", "+4", "12a", " 1", "1.5", "0x10", "99999999999"] {
            assert!(int(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn boolean_and_tri_state_conversion() {
        assert_eq!(flag("1"), Ok(true));
        assert_eq!(flag("0"), Ok(false));
        assert_eq!(flag("2"), Err(ConversionError::Boolean("2".into())));
        assert_eq!(flag("true"), Err(ConversionError::Boolean("true".into())));
        assert_eq!(tri_state("2"), Ok(2));
        assert!(tri_state("3").is_err());
        assert!(tri_state("-1").is_err());
    }

    #[test]
    fn rejected_update_keeps_the_cached_value() {
        let mut cell = RoProperty::new(flag);
        assert_eq!(cell.update("1"), Ok(true));
        assert_eq!(cell.update("2"), Err(ConversionError::Boolean("2".into())));
        assert_eq!(cell.get(), Some(&true));
    }

    #[test]
    fn change_callback_fires_once_per_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut cell = RoProperty::new(int);
        let sink = Arc::clone(&seen);
        cell.on_change(move |v| sink.lock().unwrap().push(*v));
        assert_eq!(cell.update("5"), Ok(true));
        assert_eq!(cell.update("5"), Ok(false));
        assert_eq!(cell.update("x"), Err(ConversionError::Integer("x".into())));
        assert_eq!(cell.update("6"), Ok(true));
        assert_eq!(*seen.lock().unwrap(), vec![5, 6]);
    }

    #[test]
    fn constraints() {
        let temp = write("W40", Echo::Value).range(50, 410).step(2);
        assert_eq!(381.constrain(&temp.constraint, &[]), Some(382));
        assert_eq!(380.constrain(&temp.constraint, &[]), Some(380));
        assert_eq!(409.constrain(&temp.constraint, &[]), Some(410));
        assert_eq!(411.constrain(&temp.constraint, &[]), None);
        assert_eq!(49.constrain(&temp.constraint, &[]), None);
        assert_eq!((23 * 256 + 59).constrain(&Constraint::TimeOfDay, &[]), Some(23 * 256 + 59));
        assert_eq!((24 * 256).constrain(&Constraint::TimeOfDay, &[]), None);
        assert_eq!((5 * 256 + 60).constrain(&Constraint::TimeOfDay, &[]), None);
        assert_eq!(5.constrain(&Constraint::OneOf(&[1, 2, 3, 4, 6]), &[]), None);
        assert_eq!(6.constrain(&Constraint::OneOf(&[1, 2, 3, 4, 6]), &[]), Some(6));
    }

    #[test]
    fn rendering_commands() {
        assert_eq!(
            write("S22", Echo::CodeOk).render("2"),
            ("S22:2".to_string(), "S22-OK".to_string())
        );
        assert_eq!(
            write("S13", Echo::ValueThen("  S13")).render("3"),
            ("S13:3".to_string(), "3  S13".to_string())
        );
        assert_eq!(
            write("W14", Echo::Literal("W14")).toggle().render("1"),
            ("W14".to_string(), "W14".to_string())
        );
    }

    #[tokio::test]
    async fn writing_the_cached_value_sends_nothing() {
        let mut cell = RwProperty::new(int, write("W40", Echo::Value).range(50, 410));
        cell.update("380").unwrap();
        let mut link = ScriptedLink::default();
        cell.set(380, &mut link).await.unwrap();
        assert!(link.sent.is_empty());
        assert_eq!(cell.get(), Some(&380));
    }

    #[tokio::test]
    async fn mismatched_echo_leaves_the_cache_alone() {
        let mut cell = RwProperty::new(int, write("W40", Echo::Value).range(50, 410));
        cell.update("380").unwrap();
        let mut link = ScriptedLink::replying(&["38"]);
        let result = cell.set(390, &mut link).await;
        assert!(matches!(result, Err(WriteError::Verification { .. })), "{result:?}");
        assert_eq!(link.sent, ["W40:390"]);
        assert_eq!(cell.get(), Some(&380));
    }

    #[tokio::test]
    async fn confirmed_write_updates_the_cache() {
        let mut cell = RwProperty::new(int, write("W40", Echo::Value).range(50, 410).step(2));
        cell.update("380").unwrap();
        let mut link = ScriptedLink::replying(&["392"]);
        cell.set(391, &mut link).await.unwrap();
        assert_eq!(link.sent, ["W40:392"]);
        assert_eq!(cell.get(), Some(&392));
    }

    #[tokio::test]
    async fn values_rounded_onto_the_cached_one_send_nothing() {
        let mut cell = RwProperty::new(int, write("W40", Echo::Value).range(50, 410).step(2));
        cell.update("382").unwrap();
        let mut link = ScriptedLink::default();
        cell.set(381, &mut link).await.unwrap();
        assert!(link.sent.is_empty());
        assert_eq!(cell.get(), Some(&382));
    }

    #[tokio::test]
    async fn toggles_wait_for_a_known_state() {
        let mut cell = RwProperty::new(flag, write("W14", Echo::Literal("W14")).toggle());
        let mut link = ScriptedLink::replying(&["W14"]);
        let result = cell.set(true, &mut link).await;
        assert!(matches!(result, Err(WriteError::StateUnknown("W14"))), "{result:?}");
        assert!(link.sent.is_empty());
        assert!(!cell.has_value());

        cell.update("0").unwrap();
        cell.set(true, &mut link).await.unwrap();
        assert_eq!(link.sent, ["W14"]);
        assert_eq!(cell.get(), Some(&true));
    }

    #[tokio::test]
    async fn invalid_values_never_reach_the_wire() {
        let mut cell = RwProperty::new(tri_state, write("S21", Echo::Value).range(0, 2));
        let mut link = ScriptedLink::default();
        let result = cell.set(3, &mut link).await;
        assert!(matches!(result, Err(WriteError::Invalid { .. })), "{result:?}");
        assert!(link.sent.is_empty());
        assert!(!cell.has_value());
    }

    const DAYS: &[Label<i32>] = &[("Off", 128), ("Everyday", 127), ("Weekends", 96)];

    #[tokio::test]
    async fn labels_are_matched_exactly() {
        let mut cell =
            RwProperty::new(int, write("W67", Echo::Value).labelled()).labels(DAYS);
        let mut link = ScriptedLink::replying(&["127"]);
        cell.set_label("Everyday", &mut link).await.unwrap();
        assert_eq!(link.sent, ["W67:127"]);
        assert_eq!(cell.label(), Some("Everyday"));

        let result = cell.set_label("everyday", &mut link).await;
        assert!(matches!(result, Err(WriteError::UnknownLabel(_))), "{result:?}");
        let result = cell.set(5, &mut link).await;
        assert!(matches!(result, Err(WriteError::Invalid { .. })), "{result:?}");
        assert_eq!(link.sent.len(), 1);
    }

    #[test]
    fn planning_from_text() {
        let cell = RwProperty::new(int, write("W67", Echo::Value).labelled()).labels(DAYS);
        let planned = cell.plan_text("Weekends").unwrap().unwrap();
        assert_eq!(planned.command, "W67:96");
        assert_eq!(planned.value, "96");
        assert!(matches!(cell.plan_text("Weekdays"), Err(WriteError::UnknownLabel(_))));

        let cell = RwProperty::new(int, write("W60", Echo::Value).range(1, 24));
        assert!(matches!(cell.plan_text("x"), Err(WriteError::Unparseable(..))));
        assert_eq!(cell.plan_text("12").unwrap().unwrap().expected, "12");
    }
}
