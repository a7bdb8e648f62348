//! Typed command flags.
//!
//! Every command owns a [`FlagState`]: an immutable [`FlagSchema`] declared at
//! registration plus the values parsed for the invocation currently holding
//! the state's lock. Values are only reachable through a [`FlagGuard`], which
//! restores every flag to its declared default when it is dropped, before the
//! lock is released.
//!
//! Tokens are parsed by a `clap` command composed per invocation from every
//! schema in scope, then each matched value is written back into the guard
//! of the command that declared it. The accepted syntax:
//!
//! ```text
//! --name            boolean switch
//! --name=value      inline value
//! --name value      separate value (non-boolean flags)
//! -x / -x value     shorthand
//! -abc / -nvalue    shorthand cluster / attached value
//! --                end of flags, everything after is an argument
//! ```

use clap::builder::BoolishValueParser;
use clap::error::{ContextKind, ContextValue, ErrorKind};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command};
use parking_lot::{Mutex, MutexGuard};
use serde::Serialize;
use thiserror::Error;

use crate::error::RegistrationError;

/// Long name of the flag injected into every attached command.
pub const HELP_FLAG: &str = "help";

/// Shorthand of the injected help flag.
pub const HELP_SHORTHAND: char = 'h';

/// Errors produced while parsing flag tokens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FlagError {
    /// `--name` is not declared on the command or its ancestors.
    #[error("unknown flag: --{0}")]
    Unknown(String),

    /// `-x` is not declared on the command or its ancestors.
    #[error("unknown shorthand flag: '{0}'")]
    UnknownShorthand(char),

    /// A value-taking flag was the last token.
    #[error("flag needs an argument: {0}")]
    MissingValue(String),

    /// The value does not parse as the declared type.
    #[error("invalid argument \"{value}\" for \"{flag}\" flag: expected {expected}")]
    InvalidValue {
        /// Flag, as `--name`.
        flag: String,
        /// Offending value.
        value: String,
        /// Declared type.
        expected: FlagKind,
    },

    /// Any other parse failure, as the parser describes it.
    #[error("{0}")]
    Rejected(String),
}

/// Declared type of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlagKind {
    Bool,
    Str,
    Int,
    Float,
    List,
}

impl std::fmt::Display for FlagKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FlagKind::Bool => "bool",
            FlagKind::Str => "string",
            FlagKind::Int => "int",
            FlagKind::Float => "float",
            FlagKind::List => "stringSlice",
        };
        f.write_str(name)
    }
}

/// A flag value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FlagValue {
    Bool(bool),
    Str(String),
    Int(i64),
    Float(f64),
    List(Vec<String>),
}

impl FlagValue {
    /// The type this value belongs to.
    pub fn kind(&self) -> FlagKind {
        match self {
            FlagValue::Bool(_) => FlagKind::Bool,
            FlagValue::Str(_) => FlagKind::Str,
            FlagValue::Int(_) => FlagKind::Int,
            FlagValue::Float(_) => FlagKind::Float,
            FlagValue::List(_) => FlagKind::List,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FlagValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FlagValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            FlagValue::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            FlagValue::Float(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            FlagValue::List(items) => Some(items),
            _ => None,
        }
    }
}

/// Declaration of a single flag.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlagSpec {
    /// Long name, used as `--name`.
    pub name: String,
    /// Optional single-character shorthand, used as `-x`.
    pub shorthand: Option<char>,
    /// Value restored after every invocation.
    pub default: FlagValue,
    /// Help text.
    pub usage: String,
}

impl FlagSpec {
    pub fn new(
        name: impl Into<String>,
        shorthand: Option<char>,
        default: FlagValue,
        usage: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            shorthand,
            default,
            usage: usage.into(),
        }
    }

    pub fn kind(&self) -> FlagKind {
        self.default.kind()
    }
}

/// The set of flags a command declares.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FlagSchema {
    specs: Vec<FlagSpec>,
}

impl FlagSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a declaration without checking for duplicates.
    ///
    /// Used by the command builder; [`FlagSchema::check`] runs when the
    /// command is attached to the tree.
    pub(crate) fn push(&mut self, spec: FlagSpec) {
        self.specs.push(spec);
    }

    /// Append a declaration, rejecting duplicate names and shorthands.
    pub fn declare(&mut self, command: &str, spec: FlagSpec) -> Result<(), RegistrationError> {
        self.ensure_free(command, &spec)?;
        self.specs.push(spec);
        Ok(())
    }

    /// Verify no name or shorthand is declared twice.
    pub fn check(&self, command: &str) -> Result<(), RegistrationError> {
        for (i, spec) in self.specs.iter().enumerate() {
            let earlier = FlagSchema {
                specs: self.specs[..i].to_vec(),
            };
            earlier.ensure_free(command, spec)?;
        }
        Ok(())
    }

    fn ensure_free(&self, command: &str, spec: &FlagSpec) -> Result<(), RegistrationError> {
        if self.position(&spec.name).is_some() {
            return Err(RegistrationError::DuplicateFlag {
                flag: spec.name.clone(),
                command: command.to_string(),
            });
        }
        if let Some(c) = spec.shorthand
            && self.position_short(c).is_some()
        {
            return Err(RegistrationError::DuplicateShorthand {
                shorthand: c,
                command: command.to_string(),
            });
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FlagSpec> {
        self.position(name).map(|i| &self.specs[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FlagSpec> {
        self.specs.iter()
    }

    /// Declarations ordered by long name, as listed in help output.
    pub fn sorted(&self) -> Vec<&FlagSpec> {
        let mut specs: Vec<_> = self.specs.iter().collect();
        specs.sort_by(|a, b| a.name.cmp(&b.name));
        specs
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.specs.iter().position(|s| s.name == name)
    }

    fn position_short(&self, c: char) -> Option<usize> {
        self.specs.iter().position(|s| s.shorthand == Some(c))
    }
}

/// Values parsed for the current invocation, index-aligned with the schema.
#[derive(Debug, Clone)]
struct FlagValues {
    current: Vec<FlagValue>,
    changed: Vec<bool>,
}

impl FlagValues {
    fn defaults(schema: &FlagSchema) -> Self {
        Self {
            current: schema.specs.iter().map(|s| s.default.clone()).collect(),
            changed: vec![false; schema.len()],
        }
    }

    fn reset(&mut self, schema: &FlagSchema) {
        *self = Self::defaults(schema);
    }
}

/// A command's flag schema and its lock-guarded values.
#[derive(Debug)]
pub struct FlagState {
    schema: FlagSchema,
    values: Mutex<FlagValues>,
}

impl Default for FlagState {
    fn default() -> Self {
        Self::new(FlagSchema::default())
    }
}

impl FlagState {
    pub fn new(schema: FlagSchema) -> Self {
        let values = Mutex::new(FlagValues::defaults(&schema));
        Self { schema, values }
    }

    pub fn schema(&self) -> &FlagSchema {
        &self.schema
    }

    /// Declare a flag during registration.
    pub(crate) fn declare(&mut self, command: &str, spec: FlagSpec) -> Result<(), RegistrationError> {
        self.schema.declare(command, spec)?;
        let schema = &self.schema;
        self.values.get_mut().reset(schema);
        Ok(())
    }

    pub(crate) fn push_unchecked(&mut self, spec: FlagSpec) {
        self.schema.push(spec);
        let schema = &self.schema;
        self.values.get_mut().reset(schema);
    }

    /// Take exclusive access to the values.
    ///
    /// Blocks while another invocation holds this command's flags.
    pub fn acquire(&self) -> FlagGuard<'_> {
        FlagGuard {
            schema: &self.schema,
            values: self.values.lock(),
        }
    }

    /// Snapshot of the current values, waiting for any active invocation.
    pub fn snapshot(&self) -> Vec<(String, FlagValue)> {
        let values = self.values.lock();
        self.schema
            .specs
            .iter()
            .zip(values.current.iter())
            .map(|(spec, value)| (spec.name.clone(), value.clone()))
            .collect()
    }

    /// Whether every value equals its declared default.
    ///
    /// Floats compare by bit pattern, so a `NaN` default still counts.
    pub fn is_default(&self) -> bool {
        let values = self.values.lock();
        !values.changed.contains(&true)
            && self
                .schema
                .specs
                .iter()
                .zip(&values.current)
                .all(|(spec, value)| same_value(&spec.default, value))
    }
}

fn same_value(a: &FlagValue, b: &FlagValue) -> bool {
    match (a, b) {
        (FlagValue::Float(x), FlagValue::Float(y)) => x.to_bits() == y.to_bits(),
        _ => a == b,
    }
}

/// Exclusive, scoped access to one command's flag values.
///
/// Dropping the guard resets the values to their defaults and then releases
/// the lock.
pub struct FlagGuard<'a> {
    schema: &'a FlagSchema,
    values: MutexGuard<'a, FlagValues>,
}

impl FlagGuard<'_> {
    pub fn schema(&self) -> &FlagSchema {
        self.schema
    }

    pub fn get(&self, name: &str) -> Option<&FlagValue> {
        self.schema.position(name).map(|i| &self.values.current[i])
    }

    pub fn changed(&self, name: &str) -> bool {
        self.schema
            .position(name)
            .is_some_and(|i| self.values.changed[i])
    }

    fn set(&mut self, index: usize, value: FlagValue) {
        self.values.current[index] = value;
        self.values.changed[index] = true;
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        let schema = self.schema;
        self.values.reset(schema);
    }
}

/// Read-only view over the flags in scope for an invocation.
///
/// Lookups walk from the resolved command up through its ancestors; the
/// nearest declaration of a name wins.
#[derive(Clone, Copy)]
pub struct Flags<'a> {
    scope: &'a [FlagGuard<'a>],
}

impl<'a> Flags<'a> {
    pub(crate) fn new(scope: &'a [FlagGuard<'a>]) -> Self {
        Self { scope }
    }

    pub fn get(&self, name: &str) -> Option<&'a FlagValue> {
        self.scope.iter().rev().find_map(|g| g.get(name))
    }

    pub fn get_bool(&self, name: &str) -> Option<bool> {
        self.get(name).and_then(FlagValue::as_bool)
    }

    pub fn get_str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(FlagValue::as_str)
    }

    pub fn get_int(&self, name: &str) -> Option<i64> {
        self.get(name).and_then(FlagValue::as_int)
    }

    pub fn get_float(&self, name: &str) -> Option<f64> {
        self.get(name).and_then(FlagValue::as_float)
    }

    pub fn get_list(&self, name: &str) -> Option<&'a [String]> {
        self.get(name).and_then(FlagValue::as_list)
    }

    /// Whether the flag was given explicitly in this invocation.
    pub fn changed(&self, name: &str) -> bool {
        self.scope
            .iter()
            .rev()
            .find(|g| g.schema.contains(name))
            .is_some_and(|g| g.changed(name))
    }
}

impl std::fmt::Debug for Flags<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for guard in self.scope {
            for spec in guard.schema.iter() {
                map.entry(&spec.name, &guard.get(&spec.name));
            }
        }
        map.finish()
    }
}

/// Id of the trailing positional that collects arguments. Tokens never
/// contain whitespace, so no flag typed in chat can claim it.
const POSITIONAL: &str = "positional args";

/// A flag exposed to the parser and the guard/spec it writes back to.
#[derive(Debug)]
struct Slot {
    guard: usize,
    spec: usize,
    name: String,
    kind: FlagKind,
}

/// Build a parser over every flag in `scope`.
///
/// Guards are visited innermost first so the nearest declaration claims a
/// long name. A shorthand already claimed by a nearer command is dropped
/// from the outer flag.
fn compose(scope: &[FlagGuard<'_>]) -> (Command, Vec<Slot>) {
    let mut command = Command::new("flags")
        .no_binary_name(true)
        .disable_help_flag(true)
        .disable_version_flag(true)
        .args_override_self(true);
    let mut slots: Vec<Slot> = Vec::new();
    let mut shorts: Vec<char> = Vec::new();

    for (g, guard) in scope.iter().enumerate().rev() {
        for (s, spec) in guard.schema.specs.iter().enumerate() {
            if slots.iter().any(|slot| slot.name == spec.name) {
                continue;
            }
            let short = spec.shorthand.filter(|c| !shorts.contains(c));
            shorts.extend(short);
            command = command.arg(flag_arg(spec, short));
            slots.push(Slot {
                guard: g,
                spec: s,
                name: spec.name.clone(),
                kind: spec.kind(),
            });
        }
    }
    (command, slots)
}

fn flag_arg(spec: &FlagSpec, short: Option<char>) -> Arg {
    let mut arg = Arg::new(spec.name.clone())
        .long(spec.name.clone())
        .help(spec.usage.clone());
    if let Some(c) = short {
        arg = arg.short(c);
    }

    match spec.kind() {
        // `--name` alone means true; a value must be attached with `=` so the
        // next token is never swallowed.
        FlagKind::Bool => arg
            .action(ArgAction::Set)
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true")
            .value_parser(BoolishValueParser::new()),
        FlagKind::Str => arg.action(ArgAction::Set).allow_hyphen_values(true),
        FlagKind::Int => arg
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .value_parser(clap::value_parser!(i64)),
        FlagKind::Float => arg
            .action(ArgAction::Set)
            .allow_hyphen_values(true)
            .value_parser(clap::value_parser!(f64)),
        FlagKind::List => arg
            .action(ArgAction::Append)
            .allow_hyphen_values(true)
            .value_delimiter(','),
    }
}

/// Index of the first non-flag token, skipping flags known to `scope` along
/// with their values.
///
/// The scan stops at the first token the scope cannot parse; the resolved
/// command reports it when it parses its tokens for real.
pub(crate) fn first_positional(tokens: &[String], scope: &[FlagGuard<'_>]) -> Option<usize> {
    let (command, _) = compose(scope);
    let matches = command
        .allow_external_subcommands(true)
        .ignore_errors(true)
        .try_get_matches_from(tokens)
        .ok()?;

    // The first positional is taken as an external subcommand; everything
    // after it is kept raw.
    let (_, rest) = matches.subcommand()?;
    let trailing = rest.get_raw("").map_or(0, |values| values.count());
    tokens.len().checked_sub(trailing + 1)
}

/// Parse `tokens` against every schema in `scope`, writing values into the
/// guard of the nearest declaring command. Returns the leftover arguments.
pub(crate) fn parse(
    tokens: &[String],
    scope: &mut [FlagGuard<'_>],
) -> Result<Vec<String>, FlagError> {
    let (command, slots) = compose(scope);
    let matches = command
        .arg(
            Arg::new(POSITIONAL)
                .action(ArgAction::Append)
                .num_args(1..),
        )
        .try_get_matches_from(tokens)
        .map_err(|err| flag_error(&err, &slots))?;

    for slot in &slots {
        if matches.value_source(&slot.name) != Some(ValueSource::CommandLine) {
            continue;
        }
        if let Some(value) = matched_value(&matches, slot) {
            scope[slot.guard].set(slot.spec, value);
        }
    }

    Ok(matches
        .get_many::<String>(POSITIONAL)
        .map(|values| values.cloned().collect())
        .unwrap_or_default())
}

fn matched_value(matches: &ArgMatches, slot: &Slot) -> Option<FlagValue> {
    let id = slot.name.as_str();
    match slot.kind {
        FlagKind::Bool => matches.get_one::<bool>(id).copied().map(FlagValue::Bool),
        FlagKind::Str => matches.get_one::<String>(id).cloned().map(FlagValue::Str),
        FlagKind::Int => matches.get_one::<i64>(id).copied().map(FlagValue::Int),
        FlagKind::Float => matches.get_one::<f64>(id).copied().map(FlagValue::Float),
        FlagKind::List => matches.get_many::<String>(id).map(|items| {
            FlagValue::List(items.filter(|s| !s.is_empty()).cloned().collect())
        }),
    }
}

fn context(err: &clap::Error, kind: ContextKind) -> Option<&str> {
    match err.get(kind)? {
        ContextValue::String(s) => Some(s.as_str()),
        _ => None,
    }
}

fn flag_error(err: &clap::Error, slots: &[Slot]) -> FlagError {
    let arg = context(err, ContextKind::InvalidArg).unwrap_or_default();

    match err.kind() {
        ErrorKind::UnknownArgument => unknown_flag(arg),
        ErrorKind::InvalidValue
        | ErrorKind::ValueValidation
        | ErrorKind::NoEquals
        | ErrorKind::TooFewValues
        | ErrorKind::WrongNumberOfValues => {
            // The argument renders as `--name <value>` or `--name[=<value>]`.
            let flag = arg.split([' ', '[', '=']).next().unwrap_or(arg).to_string();
            match context(err, ContextKind::InvalidValue).filter(|v| !v.is_empty()) {
                Some(value) => {
                    let expected = slots
                        .iter()
                        .find(|slot| flag.strip_prefix("--") == Some(slot.name.as_str()))
                        .map_or(FlagKind::Str, |slot| slot.kind);
                    FlagError::InvalidValue {
                        flag,
                        value: value.to_string(),
                        expected,
                    }
                }
                None => FlagError::MissingValue(flag),
            }
        }
        _ => {
            let rendered = err.to_string();
            let line = rendered.lines().next().unwrap_or_default();
            FlagError::Rejected(line.trim_start_matches("error: ").to_string())
        }
    }
}

fn unknown_flag(arg: &str) -> FlagError {
    if let Some(long) = arg.strip_prefix("--") {
        let name = long.split('=').next().unwrap_or(long);
        return FlagError::Unknown(name.to_string());
    }
    let mut chars = arg.strip_prefix('-').unwrap_or(arg).chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => FlagError::UnknownShorthand(c),
        _ => FlagError::Unknown(arg.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn tokens(line: &str) -> Vec<String> {
        line.split_whitespace().map(str::to_string).collect()
    }

    fn echo_state() -> FlagState {
        let mut schema = FlagSchema::new();
        schema.push(FlagSpec::new("upper", Some('u'), FlagValue::Bool(false), "Shout"));
        schema.push(FlagSpec::new("repeat", Some('n'), FlagValue::Int(1), "Repeat count"));
        schema.push(FlagSpec::new("sep", None, FlagValue::Str(" ".into()), "Separator"));
        schema.push(FlagSpec::new("tag", Some('t'), FlagValue::List(vec![]), "Tags"));
        schema.push(FlagSpec::new("scale", None, FlagValue::Float(1.0), "Scale"));
        FlagState::new(schema)
    }

    #[test]
    fn test_parse_interspersed() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        let args = parse(&tokens("hello -u world --repeat 3 --sep=, again"), &mut scope).unwrap();

        assert_eq!(args, vec!["hello", "world", "again"]);
        let flags = Flags::new(&scope);
        assert_eq!(flags.get_bool("upper"), Some(true));
        assert_eq!(flags.get_int("repeat"), Some(3));
        assert_eq!(flags.get_str("sep"), Some(","));
        assert!(flags.changed("repeat"));
        assert!(!flags.changed("scale"));
    }

    #[test]
    fn test_parse_shorthand_cluster_and_attached_value() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        let args = parse(&tokens("-un5 x"), &mut scope).unwrap();

        assert_eq!(args, vec!["x"]);
        let flags = Flags::new(&scope);
        assert_eq!(flags.get_bool("upper"), Some(true));
        assert_eq!(flags.get_int("repeat"), Some(5));
    }

    #[test]
    fn test_parse_list_accumulates() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        parse(&tokens("-t a,b --tag c"), &mut scope).unwrap();

        let flags = Flags::new(&scope);
        assert_eq!(
            flags.get_list("tag"),
            Some(&["a".to_string(), "b".to_string(), "c".to_string()][..])
        );
    }

    #[test]
    fn test_parse_terminator_and_lone_dash() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        let args = parse(&tokens("- -- -u --repeat"), &mut scope).unwrap();

        assert_eq!(args, vec!["-", "-u", "--repeat"]);
        assert_eq!(Flags::new(&scope).get_bool("upper"), Some(false));
    }

    #[test]
    fn test_parse_errors() {
        let state = echo_state();

        let mut scope = vec![state.acquire()];
        assert_eq!(
            parse(&tokens("--nope"), &mut scope),
            Err(FlagError::Unknown("nope".to_string()))
        );
        drop(scope);

        let mut scope = vec![state.acquire()];
        assert_eq!(
            parse(&tokens("-uz"), &mut scope),
            Err(FlagError::UnknownShorthand('z'))
        );
        drop(scope);

        let mut scope = vec![state.acquire()];
        assert_eq!(
            parse(&tokens("--repeat"), &mut scope),
            Err(FlagError::MissingValue("--repeat".to_string()))
        );
        drop(scope);

        let mut scope = vec![state.acquire()];
        let err = parse(&tokens("-n many"), &mut scope).unwrap_err();
        assert_eq!(
            err,
            FlagError::InvalidValue {
                flag: "--repeat".to_string(),
                value: "many".to_string(),
                expected: FlagKind::Int,
            }
        );
        assert_eq!(
            err.to_string(),
            "invalid argument \"many\" for \"--repeat\" flag: expected int"
        );
    }

    #[test]
    fn test_parse_negative_values_and_bool_does_not_take_next_token() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        let args = parse(&tokens("-n -2 --scale -0.5 --upper loud"), &mut scope).unwrap();

        assert_eq!(args, vec!["loud"]);
        let flags = Flags::new(&scope);
        assert_eq!(flags.get_int("repeat"), Some(-2));
        assert_eq!(flags.get_float("scale"), Some(-0.5));
        assert_eq!(flags.get_bool("upper"), Some(true));
    }

    #[test]
    fn test_nearer_shorthand_shadows_outer_one() {
        let mut parent = FlagSchema::new();
        parent.push(FlagSpec::new("verbose", Some('v'), FlagValue::Bool(false), "Verbose"));
        let parent = FlagState::new(parent);

        let mut child = FlagSchema::new();
        child.push(FlagSpec::new("version", Some('v'), FlagValue::Bool(false), "Version"));
        let child = FlagState::new(child);

        let mut scope = vec![parent.acquire(), child.acquire()];
        parse(&tokens("-v --verbose"), &mut scope).unwrap();

        assert_eq!(scope[0].get("verbose"), Some(&FlagValue::Bool(true)));
        assert_eq!(scope[1].get("version"), Some(&FlagValue::Bool(true)));
        assert!(scope[0].changed("verbose"));
    }

    #[test]
    fn test_nan_default_is_default() {
        let mut schema = FlagSchema::new();
        schema.push(FlagSpec::new("ratio", None, FlagValue::Float(f64::NAN), "Ratio"));
        let state = FlagState::new(schema);

        assert!(state.is_default());
        {
            let mut scope = vec![state.acquire()];
            parse(&tokens("--ratio 0.5"), &mut scope).unwrap();
        }
        assert!(state.is_default());
    }

    #[test]
    fn test_guard_drop_resets_values() {
        let state = echo_state();
        {
            let mut scope = vec![state.acquire()];
            parse(&tokens("-u --repeat 9 --scale 2.5 -t x"), &mut scope).unwrap();
            assert!(scope[0].changed("upper"));
        }
        assert!(state.is_default());

        let snapshot = state.snapshot();
        assert_eq!(snapshot[1], ("repeat".to_string(), FlagValue::Int(1)));
    }

    #[test]
    fn test_guard_drop_resets_after_parse_error() {
        let state = echo_state();
        {
            let mut scope = vec![state.acquire()];
            assert!(parse(&tokens("-u --repeat nope"), &mut scope).is_err());
        }
        assert!(state.is_default());
    }

    #[test]
    fn test_nearest_declaration_wins() {
        let mut parent = FlagSchema::new();
        parent.push(FlagSpec::new("verbose", Some('v'), FlagValue::Bool(false), "Verbose"));
        parent.push(FlagSpec::new("limit", None, FlagValue::Int(10), "Parent limit"));
        let parent = FlagState::new(parent);

        let mut child = FlagSchema::new();
        child.push(FlagSpec::new("limit", None, FlagValue::Int(5), "Child limit"));
        let child = FlagState::new(child);

        let mut scope = vec![parent.acquire(), child.acquire()];
        let args = parse(&tokens("user -v --limit 2"), &mut scope).unwrap();

        assert_eq!(args, vec!["user"]);
        assert_eq!(scope[0].get("verbose"), Some(&FlagValue::Bool(true)));
        assert_eq!(scope[0].get("limit"), Some(&FlagValue::Int(10)));
        assert_eq!(scope[1].get("limit"), Some(&FlagValue::Int(2)));
    }

    #[test]
    fn test_first_positional_skips_flag_values() {
        let state = echo_state();
        let scope = vec![state.acquire()];

        assert_eq!(first_positional(&tokens("-n 3 sub x"), &scope), Some(2));
        assert_eq!(first_positional(&tokens("--repeat=3 -u sub"), &scope), Some(2));
        assert_eq!(first_positional(&tokens("sub -u x"), &scope), Some(0));
        assert_eq!(first_positional(&tokens("-u"), &scope), None);
        assert_eq!(first_positional(&tokens(""), &scope), None);

        // Tokens the scope cannot parse end the scan.
        assert_eq!(first_positional(&tokens("--unknown sub"), &scope), None);
    }

    #[test]
    fn test_schema_check_rejects_duplicates() {
        let mut schema = FlagSchema::new();
        schema.push(FlagSpec::new("verbose", Some('v'), FlagValue::Bool(false), ""));
        schema.push(FlagSpec::new("version", Some('v'), FlagValue::Bool(false), ""));

        assert_eq!(
            schema.check("info"),
            Err(RegistrationError::DuplicateShorthand {
                shorthand: 'v',
                command: "info".to_string(),
            })
        );

        let mut schema = FlagSchema::new();
        schema
            .declare("info", FlagSpec::new("verbose", None, FlagValue::Bool(false), ""))
            .unwrap();
        assert!(matches!(
            schema.declare("info", FlagSpec::new("verbose", None, FlagValue::Int(0), "")),
            Err(RegistrationError::DuplicateFlag { .. })
        ));
    }

    #[test]
    fn test_bool_flag_explicit_values() {
        let state = echo_state();
        let mut scope = vec![state.acquire()];

        parse(&tokens("--upper=false"), &mut scope).unwrap();
        assert_eq!(Flags::new(&scope).get_bool("upper"), Some(false));
        assert!(Flags::new(&scope).changed("upper"));

        let err = parse(&tokens("--upper=maybe"), &mut scope).unwrap_err();
        assert!(matches!(err, FlagError::InvalidValue { expected: FlagKind::Bool, .. }));
    }
}
